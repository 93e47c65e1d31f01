//! Advisory lint for parameter files

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;

use super::inline_comment_start;

static PLAIN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid reference regex"));

static FALLBACK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*:-").expect("Invalid fallback regex"));

static OPERATOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(:[=+?]|[-=+?])").expect("Invalid operator regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxIssueKind {
    TrailingWhitespace,
    UnsupportedFallback { token: String, operator: String },
    InvalidReference { token: String },
    UnterminatedReference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    pub line: usize,
    pub name: String,
    pub kind: SyntaxIssueKind,
}

impl fmt::Display for SyntaxIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SyntaxIssueKind::TrailingWhitespace => write!(
                f,
                "Line {}: '{}' has trailing whitespace, which would become part of its value",
                self.line, self.name
            ),
            SyntaxIssueKind::UnsupportedFallback { token, operator } => write!(
                f,
                "Line {}: '{}' uses unsupported fallback syntax '{}' ('{}'), only ${{NAME:-fallback}} is supported",
                self.line, self.name, token, operator
            ),
            SyntaxIssueKind::InvalidReference { token } => write!(
                f,
                "Line {}: '{}' has invalid variable reference '{}'",
                self.line, self.name, token
            ),
            SyntaxIssueKind::UnterminatedReference => write!(
                f,
                "Line {}: '{}' has a '${{' reference without a closing '}}'",
                self.line, self.name
            ),
        }
    }
}

/// Lint the contents of a parameter file.
pub fn check_source(source: &str) -> Vec<SyntaxIssue> {
    let mut issues = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((name, value)) = raw.split_once('=') else {
            continue;
        };
        let name = name.trim().to_string();

        let comment = inline_comment_start(value);
        let value = match comment {
            Some(idx) => &value[..idx],
            None => value,
        };

        // Whitespace ahead of an inline comment is dropped by the runtime.
        if comment.is_none() && raw.ends_with(|c: char| c == ' ' || c == '\t') {
            issues.push(SyntaxIssue {
                line,
                name: name.clone(),
                kind: SyntaxIssueKind::TrailingWhitespace,
            });
        }

        for kind in check_references(value) {
            issues.push(SyntaxIssue {
                line,
                name: name.clone(),
                kind,
            });
        }
    }

    issues
}

/// Lint a parameter file on disk. An unreadable file yields no findings.
pub fn check_file(path: &Path) -> Vec<SyntaxIssue> {
    match std::fs::read_to_string(path) {
        Ok(source) => check_source(&source),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping syntax check");
            Vec::new()
        }
    }
}

fn check_references(value: &str) -> Vec<SyntaxIssueKind> {
    let mut found = Vec::new();
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            found.push(SyntaxIssueKind::UnterminatedReference);
            break;
        };
        let inner = &after[..end];
        rest = &after[end + 1..];

        if PLAIN_REGEX.is_match(inner) || FALLBACK_REGEX.is_match(inner) {
            continue;
        }
        let token = format!("${{{inner}}}");
        match OPERATOR_REGEX.captures(inner) {
            Some(caps) => found.push(SyntaxIssueKind::UnsupportedFallback {
                token,
                operator: caps[1].to_string(),
            }),
            None => found.push(SyntaxIssueKind::InvalidReference { token }),
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn reports_trailing_whitespace() {
        let issues = check_source("FOO=bar   \nBAR=ok\n");

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, 1);
        assert_eq!(issues[0].name, "FOO");
        assert_eq!(issues[0].kind, SyntaxIssueKind::TrailingWhitespace);
        assert!(issues[0].to_string().contains("FOO"));
    }

    #[test]
    fn whitespace_before_inline_comment_is_fine() {
        assert!(check_source("FOO=bar   # note  \n").is_empty());
    }

    #[test]
    fn accepts_supported_references() {
        assert!(check_source("A=${B}\nC=${D:-x y}/${E}\n").is_empty());
    }

    #[test]
    fn flags_unsupported_fallback_operators() {
        let issues = check_source("A=${B:=x}\nC=${D:?err}\nE=${F-x}\n");

        let operators: Vec<_> = issues
            .iter()
            .map(|i| match &i.kind {
                SyntaxIssueKind::UnsupportedFallback { operator, .. } => operator.as_str(),
                other => panic!("unexpected issue {:?}", other),
            })
            .collect();
        assert_eq!(operators, vec![":=", ":?", "-"]);
        assert!(issues[0].to_string().contains("${B:=x}"));
    }

    #[test]
    fn flags_invalid_and_unterminated_references() {
        let issues = check_source("A=${1BAD}\nB=${}\nC=${OPEN\n");

        assert_eq!(
            issues.iter().map(|i| i.kind.clone()).collect::<Vec<_>>(),
            vec![
                SyntaxIssueKind::InvalidReference {
                    token: "${1BAD}".to_string()
                },
                SyntaxIssueKind::InvalidReference {
                    token: "${}".to_string()
                },
                SyntaxIssueKind::UnterminatedReference,
            ]
        );
    }

    #[test]
    fn skips_comments() {
        assert!(check_source("# A=${B:=x}   \n   # trailing   \n").is_empty());
    }

    #[test]
    fn missing_file_has_no_findings() {
        let dir = tempdir().unwrap();
        assert!(check_file(&dir.path().join("absent.env")).is_empty());
    }
}
