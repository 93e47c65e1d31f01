//! Secrets-file audit against the secrets schema

use serde::Serialize;

use super::{SecretKind, SecretSchema, SecretSpec};
use crate::envfile::syntax::SyntaxIssue;
use crate::envfile::EnvFile;

/// Fragments of the values shipped in the example templates.
pub const EXAMPLE_PATTERNS: &[&str] = &[
    "0123456789abcdef",
    "password",
    "did:example:labeler",
    "ExamplePass123_",
];

const PASSWORD_SYMBOLS: &str = "_-!@#$%^&*";
const MIN_PASSWORD_LENGTH: usize = 8;
const LONG_HEX_LENGTH: usize = 64;
const SHORT_HEX_LENGTH: usize = 32;

/// Whether `value` is empty or still carries a template placeholder.
pub fn is_example_value(value: &str) -> bool {
    value.is_empty() || EXAMPLE_PATTERNS.iter().any(|p| value.contains(p))
}

/// Check `value` against the rules of its kind. Returns the problem, if any.
pub fn validate_strength(value: &str, spec: &SecretSpec) -> Option<String> {
    if value.is_empty() {
        return Some("empty value".to_string());
    }

    let Some(kind) = spec.kind else {
        return Some("unknown secret type".to_string());
    };

    match kind {
        SecretKind::ComplexPassword => {
            if value.chars().count() < MIN_PASSWORD_LENGTH {
                return Some(format!(
                    "too short (minimum {MIN_PASSWORD_LENGTH} characters)"
                ));
            }
            let mut missing = Vec::new();
            if !value.chars().any(|c| c.is_uppercase()) {
                missing.push("uppercase letter");
            }
            if !value.chars().any(|c| c.is_lowercase()) {
                missing.push("lowercase letter");
            }
            if !value.chars().any(|c| c.is_ascii_digit()) {
                missing.push("digit");
            }
            if !value.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
                missing.push("symbol");
            }
            if !missing.is_empty() {
                return Some(format!("missing {}", missing.join(", ")));
            }
            None
        }
        SecretKind::ShortHex => check_hex(value, SHORT_HEX_LENGTH),
        SecretKind::LongHex => check_hex(value, LONG_HEX_LENGTH),
        SecretKind::FixedValue => match &spec.fixed_value {
            Some(expected) if !expected.is_empty() && value != expected => {
                Some(format!("should be '{expected}', got '{value}'"))
            }
            _ => None,
        },
        SecretKind::External => {
            if value.trim().is_empty() {
                Some("external secret must be set manually (currently empty)".to_string())
            } else {
                None
            }
        }
    }
}

fn check_hex(value: &str, expected: usize) -> Option<String> {
    let len = value.chars().count();
    if len != expected {
        return Some(format!(
            "wrong length (expected {expected} characters, got {len})"
        ));
    }
    if !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some("not valid hex".to_string());
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretFindingKind {
    SyntaxError,
    Missing,
    ExampleValue,
    WeakSecret,
    Extra,
}

impl SecretFindingKind {
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::SyntaxError | Self::Missing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretFinding {
    pub kind: SecretFindingKind,
    pub name: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SecretsAudit {
    pub findings: Vec<SecretFinding>,
}

impl SecretsAudit {
    pub fn has_critical(&self) -> bool {
        self.findings.iter().any(|f| f.kind.is_critical())
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn of_kind(&self, kind: SecretFindingKind) -> impl Iterator<Item = &SecretFinding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }
}

/// Audit a secrets file: missing secrets, placeholder values, weak values and
/// names the schema does not declare.
pub fn audit(
    schema: &SecretSchema,
    secrets: &EnvFile,
    syntax: Vec<SyntaxIssue>,
    allow_example_values: bool,
) -> SecretsAudit {
    let mut findings: Vec<SecretFinding> = syntax
        .into_iter()
        .map(|issue| SecretFinding {
            kind: SecretFindingKind::SyntaxError,
            name: issue.name.clone(),
            detail: Some(issue.to_string()),
        })
        .collect();

    for (name, spec) in schema.iter() {
        let Some(value) = secrets.get(name) else {
            findings.push(SecretFinding {
                kind: SecretFindingKind::Missing,
                name: name.to_string(),
                detail: None,
            });
            continue;
        };

        if !allow_example_values && is_example_value(value) {
            findings.push(SecretFinding {
                kind: SecretFindingKind::ExampleValue,
                name: name.to_string(),
                detail: Some("still using template/example value".to_string()),
            });
            continue;
        }

        if let Some(problem) = validate_strength(value, spec) {
            findings.push(SecretFinding {
                kind: SecretFindingKind::WeakSecret,
                name: name.to_string(),
                detail: Some(problem),
            });
        }
    }

    let mut extra: Vec<&str> = secrets
        .entries()
        .map(|e| e.name.as_str())
        .filter(|name| !schema.contains(name))
        .collect();
    extra.sort_unstable();
    findings.extend(extra.into_iter().map(|name| SecretFinding {
        kind: SecretFindingKind::Extra,
        name: name.to_string(),
        detail: None,
    }));

    SecretsAudit { findings }
}

/// Render an audit for `secrets check --json`.
pub fn to_json(audit: &SecretsAudit) -> serde_json::Result<String> {
    #[derive(Serialize)]
    struct Rendered<'a> {
        clean: bool,
        critical: bool,
        findings: &'a [SecretFinding],
    }

    serde_json::to_string_pretty(&Rendered {
        clean: audit.is_clean(),
        critical: audit.has_critical(),
        findings: &audit.findings,
    })
}

/// Print an audit the way operators read it in a terminal.
pub fn print_audit(audit: &SecretsAudit) {
    println!("=== SECRETS ANALYSIS ===");
    println!();

    let syntax: Vec<_> = audit.of_kind(SecretFindingKind::SyntaxError).collect();
    if !syntax.is_empty() {
        for finding in syntax {
            println!(
                "🚨 SYNTAX: {}",
                finding.detail.as_deref().unwrap_or(finding.name.as_str())
            );
        }
        println!();
    }

    for finding in &audit.findings {
        match finding.kind {
            SecretFindingKind::Missing => println!("❌ MISSING: {}", finding.name),
            SecretFindingKind::ExampleValue => println!(
                "⚠️  EXAMPLE VALUE: {} (still using template/example value)",
                finding.name
            ),
            SecretFindingKind::WeakSecret => println!(
                "🔒 WEAK SECRET: {} ({})",
                finding.name,
                finding.detail.as_deref().unwrap_or_default()
            ),
            SecretFindingKind::SyntaxError | SecretFindingKind::Extra => {}
        }
    }

    let extra: Vec<_> = audit
        .of_kind(SecretFindingKind::Extra)
        .map(|f| f.name.as_str())
        .collect();
    if !extra.is_empty() {
        println!("ℹ️  EXTRA VARIABLES: {}", extra.join(", "));
    }

    if audit.is_clean() {
        println!("✅ All secrets are properly configured!");
    } else if audit.has_critical() {
        let mut parts = Vec::new();
        if audit.of_kind(SecretFindingKind::SyntaxError).next().is_some() {
            parts.push("syntax errors");
        }
        if audit.of_kind(SecretFindingKind::Missing).next().is_some() {
            parts.push("missing variables");
        }
        println!("❌ Error: there are {} in this file", parts.join(" and "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envfile::{self, syntax};
    use pretty_assertions::assert_eq;

    fn spec(kind: SecretKind) -> SecretSpec {
        SecretSpec {
            kind: Some(kind),
            fixed_value: None,
            line: 1,
        }
    }

    #[test]
    fn hex_kinds_check_length_and_alphabet() {
        let long = spec(SecretKind::LongHex);
        assert_eq!(validate_strength(&"a".repeat(64), &long), None);
        assert_eq!(validate_strength(&"A".repeat(64), &long), None);
        assert_eq!(
            validate_strength(&"a".repeat(63), &long).as_deref(),
            Some("wrong length (expected 64 characters, got 63)")
        );
        assert_eq!(
            validate_strength(&"g".repeat(32), &spec(SecretKind::ShortHex)).as_deref(),
            Some("not valid hex")
        );
    }

    #[test]
    fn complex_password_lists_missing_classes() {
        let password = spec(SecretKind::ComplexPassword);
        assert_eq!(validate_strength("Abcdef1_", &password), None);
        assert_eq!(
            validate_strength("Ab1_", &password).as_deref(),
            Some("too short (minimum 8 characters)")
        );
        assert_eq!(
            validate_strength("abcdefgh", &password).as_deref(),
            Some("missing uppercase letter, digit, symbol")
        );
    }

    #[test]
    fn fixed_and_external_kinds() {
        let fixed = SecretSpec {
            kind: Some(SecretKind::FixedValue),
            fixed_value: Some("pg".to_string()),
            line: 1,
        };
        assert_eq!(validate_strength("pg", &fixed), None);
        assert_eq!(
            validate_strength("postgres", &fixed).as_deref(),
            Some("should be 'pg', got 'postgres'")
        );
        let blank = SecretSpec {
            fixed_value: Some(String::new()),
            ..fixed
        };
        assert_eq!(validate_strength("anything", &blank), None);
        assert!(validate_strength("   ", &spec(SecretKind::External)).is_some());
        assert_eq!(validate_strength("token", &spec(SecretKind::External)), None);
        assert_eq!(
            validate_strength("", &spec(SecretKind::External)).as_deref(),
            Some("empty value")
        );
    }

    #[test]
    fn recognises_template_placeholders() {
        assert!(is_example_value(""));
        assert!(is_example_value("password"));
        assert!(is_example_value("0123456789abcdef0123456789abcdef"));
        assert!(is_example_value("did:example:labeler"));
        assert!(!is_example_value("9f8e7d6c5b4a39281706f5e4d3c2b1a0"));
    }

    #[test]
    fn audit_classifies_each_secret() {
        let schema = SecretSchema::parse(
            "JWT=x # long_hex\nADMIN=x # short_hex\nPG_PASS=x # complex_password\nMISSING=x # external\n",
        );
        let source = format!(
            "JWT={}\nADMIN=password\nPG_PASS=weak\nSTRAY=1\nAN_EXTRA=2\n",
            "b".repeat(64)
        );
        let secrets = envfile::parse("secrets.env", &source);

        let report = audit(&schema, &secrets, syntax::check_source(&source), false);
        let kinds: Vec<_> = report
            .findings
            .iter()
            .map(|f| (f.kind, f.name.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (SecretFindingKind::ExampleValue, "ADMIN"),
                (SecretFindingKind::WeakSecret, "PG_PASS"),
                (SecretFindingKind::Missing, "MISSING"),
                (SecretFindingKind::Extra, "AN_EXTRA"),
                (SecretFindingKind::Extra, "STRAY"),
            ]
        );
        assert!(report.has_critical());
    }

    #[test]
    fn example_values_can_be_allowed() {
        let schema = SecretSchema::parse("ADMIN=x # short_hex\n");
        let secrets = envfile::parse("secrets.env", "ADMIN=0123456789abcdef0123456789abcdef\n");

        let report = audit(&schema, &secrets, Vec::new(), true);
        assert!(report.is_clean());
    }

    #[test]
    fn blank_fixed_value_accepts_any_value() {
        let schema = SecretSchema::parse("POSTGRES_USER=x # fixed_value:\n");
        let secrets = envfile::parse("secrets.env", "POSTGRES_USER=bsky\n");

        let report = audit(&schema, &secrets, Vec::new(), false);
        assert!(report.is_clean());
    }

    #[test]
    fn json_lists_findings_by_kind() {
        let schema = SecretSchema::parse("JWT=x # long_hex\n");
        let secrets = envfile::parse("secrets.env", "STRAY=1\n");

        let json = to_json(&audit(&schema, &secrets, Vec::new(), false)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["clean"], serde_json::Value::Bool(false));
        assert_eq!(parsed["critical"], serde_json::Value::Bool(true));
        assert_eq!(parsed["findings"][0]["kind"], "missing");
        assert_eq!(parsed["findings"][0]["name"], "JWT");
        assert_eq!(parsed["findings"][1]["kind"], "extra");
    }
}
