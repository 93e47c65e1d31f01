//! Template reconciliation
//!
//! Compares a target parameter file with its template and the secrets
//! schema, classifying every variable with the first rule that matches:
//!
//! 1. required by the template but absent from the target: missing
//! 2. template value built from references, target spelled differently:
//!    definition changed (opt-in)
//! 3. plain template value, different target value that is not the
//!    template's commented alternative: value changed (opt-in)
//! 4. unknown to the template but declared as a secret: exposed secret
//! 5. unknown to the template: extra (unless hidden)
//!
//! Syntax findings, interpolation cycles and the SSL cross-check are added
//! after the per-variable pass.

pub mod report;
pub mod ssl;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::envfile::interpolate::{has_references, InterpolationCycle};
use crate::envfile::syntax::{self, SyntaxIssue};
use crate::envfile::{self, is_variable_name, EnvFile};
use crate::error::EnvResult;
use crate::secrets::SecretSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Missing,
    ExposedSecret,
    ValueChanged,
    DefinitionChanged,
    Extra,
    SyntaxError,
    SslConfig,
}

impl DiagnosticKind {
    /// Critical findings fail a run; the rest are informational.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::Missing | Self::ExposedSecret | Self::SyntaxError | Self::SslConfig
        )
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "MISSING"),
            Self::ExposedSecret => write!(f, "EXPOSED PASSWORD"),
            Self::ValueChanged => write!(f, "VALUE CHANGE"),
            Self::DefinitionChanged => write!(f, "DEFINITION CHANGE"),
            Self::Extra => write!(f, "EXTRA"),
            Self::SyntaxError => write!(f, "SYNTAX"),
            Self::SslConfig => write!(f, "SSL_ERROR"),
        }
    }
}

/// A raw value next to its interpolated form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueView {
    pub raw: String,
    pub resolved: String,
}

impl ValueView {
    pub fn is_interpolated(&self) -> bool {
        self.raw != self.resolved
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<ValueView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<ValueView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Diagnostic {
    fn new(kind: DiagnosticKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            template: None,
            target: None,
            message: None,
        }
    }

    fn with_template(mut self, view: ValueView) -> Self {
        self.template = Some(view);
        self
    }

    fn with_target(mut self, view: ValueView) -> Self {
        self.target = Some(view);
        self
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Which informational findings to report, and whether they fail the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileOptions {
    pub show_definition_changes: bool,
    pub show_value_changes: bool,
    pub hide_extra_vars: bool,
    pub strict: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub target: PathBuf,
    pub template: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn has_critical(&self) -> bool {
        self.diagnostics.iter().any(|d| d.kind.is_critical())
    }

    /// A clean report exits 0. Strict mode fails on any finding.
    pub fn is_clean(&self, strict: bool) -> bool {
        if strict {
            self.diagnostics.is_empty()
        } else {
            !self.has_critical()
        }
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }
}

/// Read one target file and reconcile it against the template.
pub fn reconcile_file(
    template: &EnvFile,
    schema: &SecretSchema,
    options: ReconcileOptions,
    path: &Path,
) -> EnvResult<Report> {
    let target = envfile::read(path)?;
    if target.is_empty() {
        tracing::warn!(path = %path.display(), "parameter file has no assignments");
    }
    Ok(Reconciler::new(template, &target, schema, options)
        .syntax_issues(syntax::check_file(path))
        .run())
}

/// Reports across a multi-file check; any problem file fails the run.
#[derive(Debug, Default)]
pub struct CheckSummary {
    pub reports: Vec<Report>,
    pub problem_files: Vec<PathBuf>,
}

impl CheckSummary {
    /// Unreadable files count as problems.
    pub fn record(&mut self, path: &Path, outcome: EnvResult<Report>, strict: bool) {
        match outcome {
            Ok(report) => {
                if !report.is_clean(strict) {
                    self.problem_files.push(path.to_path_buf());
                }
                self.reports.push(report);
            }
            Err(_) => self.problem_files.push(path.to_path_buf()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.problem_files.is_empty()
    }
}

pub struct Reconciler<'a> {
    template: &'a EnvFile,
    target: &'a EnvFile,
    schema: &'a SecretSchema,
    options: ReconcileOptions,
    syntax: Vec<SyntaxIssue>,
}

struct ResolvedView {
    values: IndexMap<String, String>,
    cycle: Option<InterpolationCycle>,
}

impl ResolvedView {
    fn of(file: &EnvFile) -> Self {
        match file.resolved() {
            Ok(values) => Self {
                values,
                cycle: None,
            },
            Err(cycle) => {
                tracing::warn!(path = %file.path().display(), "{}", cycle);
                Self {
                    values: file.values(),
                    cycle: Some(cycle),
                }
            }
        }
    }

    fn view(&self, name: &str, raw: &str) -> ValueView {
        ValueView {
            raw: raw.to_string(),
            resolved: self
                .values
                .get(name)
                .cloned()
                .unwrap_or_else(|| raw.to_string()),
        }
    }
}

impl<'a> Reconciler<'a> {
    pub fn new(
        template: &'a EnvFile,
        target: &'a EnvFile,
        schema: &'a SecretSchema,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            template,
            target,
            schema,
            options,
            syntax: Vec::new(),
        }
    }

    /// Attach the target's syntax findings to the report.
    pub fn syntax_issues(mut self, issues: Vec<SyntaxIssue>) -> Self {
        self.syntax = issues;
        self
    }

    /// Template required, template optional, then target-only names.
    fn ordered_names(&self) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        let template = self.template;
        let target = self.target;

        template
            .required()
            .map(|e| e.name.as_str())
            .chain(template.optional_names())
            .chain(
                target
                    .entries()
                    .map(|e| e.name.as_str())
                    .filter(|name| is_variable_name(name)),
            )
            .filter(|name| seen.insert(*name))
            .collect()
    }

    pub fn run(self) -> Report {
        let template_view = ResolvedView::of(self.template);
        let target_view = ResolvedView::of(self.target);

        let mut diagnostics: Vec<Diagnostic> = self
            .ordered_names()
            .into_iter()
            .filter_map(|name| self.classify(name, &template_view, &target_view))
            .collect();

        for (file, view) in [(self.template, &template_view), (self.target, &target_view)] {
            if let Some(cycle) = &view.cycle {
                for name in &cycle.names {
                    diagnostics.push(
                        Diagnostic::new(DiagnosticKind::SyntaxError, name).with_message(format!(
                            "{}: '{}' never settles, {}",
                            file.path().display(),
                            name,
                            cycle
                        )),
                    );
                }
            }
        }

        diagnostics.extend(self.syntax.iter().map(|issue| {
            Diagnostic::new(DiagnosticKind::SyntaxError, &issue.name).with_message(issue.to_string())
        }));

        diagnostics.extend(ssl::check(self.target).into_iter().map(|finding| {
            Diagnostic::new(DiagnosticKind::SslConfig, &finding.name).with_message(finding.message)
        }));

        let report = Report {
            target: self.target.path().to_path_buf(),
            template: self.template.path().to_path_buf(),
            diagnostics,
        };
        tracing::info!(
            target = %report.target.display(),
            findings = report.diagnostics.len(),
            critical = report.has_critical(),
            "reconciled parameter file"
        );
        report
    }

    fn classify(
        &self,
        name: &str,
        template_view: &ResolvedView,
        target_view: &ResolvedView,
    ) -> Option<Diagnostic> {
        let options = &self.options;
        let template_value = self.template.get(name);
        let target_value = self.target.get(name);

        if self.template.is_required(name) && target_value.is_none() {
            let raw = template_value.unwrap_or_default();
            return Some(
                Diagnostic::new(DiagnosticKind::Missing, name)
                    .with_template(template_view.view(name, raw)),
            );
        }

        if let (Some(expected), Some(actual)) = (template_value, target_value) {
            let uses_references = has_references(expected);

            if options.show_definition_changes
                && uses_references
                && !expected.is_empty()
                && !actual.is_empty()
                && expected != actual
            {
                return Some(
                    Diagnostic::new(DiagnosticKind::DefinitionChanged, name)
                        .with_template(template_view.view(name, expected))
                        .with_target(target_view.view(name, actual)),
                );
            }

            if options.show_value_changes
                && !uses_references
                && expected != actual
                && self.template.optional_value(name) != Some(actual)
            {
                return Some(
                    Diagnostic::new(DiagnosticKind::ValueChanged, name)
                        .with_template(template_view.view(name, expected))
                        .with_target(target_view.view(name, actual)),
                );
            }
        }

        let actual = target_value?;
        if self.template.is_known(name) {
            return None;
        }

        if let Some(spec) = self.schema.get(name) {
            let exposed = Diagnostic::new(DiagnosticKind::ExposedSecret, name)
                .with_target(target_view.view(name, actual));
            return Some(match spec.kind {
                Some(kind) => exposed.with_message(format!("declared as a {kind} secret")),
                None => exposed,
            });
        }

        if !options.hide_extra_vars {
            return Some(
                Diagnostic::new(DiagnosticKind::Extra, name)
                    .with_target(target_view.view(name, actual)),
            );
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envfile::{self, syntax};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn run(template: &str, target: &str, secrets: &str, options: ReconcileOptions) -> Report {
        let template = envfile::parse("params.env.example", template);
        let target = envfile::parse(".env", target);
        let schema = SecretSchema::parse(secrets);
        Reconciler::new(&template, &target, &schema, options).run()
    }

    fn kinds(report: &Report) -> Vec<(DiagnosticKind, &str)> {
        report
            .diagnostics
            .iter()
            .map(|d| (d.kind, d.name.as_str()))
            .collect()
    }

    #[test]
    fn missing_required_but_not_optional() {
        let report = run("REQUIRED_A=1\n# OPT_B=2\n", "", "", ReconcileOptions::default());

        assert_eq!(kinds(&report), vec![(DiagnosticKind::Missing, "REQUIRED_A")]);
        assert!(!report.is_clean(false));
    }

    #[test]
    fn secret_outside_template_is_exposed() {
        let target = format!("SECRET_X={}\n", "de".repeat(32));
        let report = run(
            "DOMAIN=example.com\n",
            &format!("DOMAIN=example.com\n{target}"),
            "SECRET_X=abc # long_hex\n",
            ReconcileOptions::default(),
        );

        assert_eq!(kinds(&report), vec![(DiagnosticKind::ExposedSecret, "SECRET_X")]);
        assert_eq!(
            report.diagnostics[0].message.as_deref(),
            Some("declared as a long_hex secret")
        );
        assert!(report.has_critical());
    }

    #[test]
    fn extra_variables_are_informational() {
        let report = run("A=1\n", "A=1\nLOCAL_TWEAK=yes\n", "", ReconcileOptions::default());

        assert_eq!(kinds(&report), vec![(DiagnosticKind::Extra, "LOCAL_TWEAK")]);
        assert!(report.is_clean(false));
        assert!(!report.is_clean(true));

        let hidden = run(
            "A=1\n",
            "A=1\nLOCAL_TWEAK=yes\n",
            "",
            ReconcileOptions {
                hide_extra_vars: true,
                ..Default::default()
            },
        );
        assert!(hidden.diagnostics.is_empty());
    }

    #[test]
    fn changes_are_reported_only_when_asked() {
        let template = "DOMAIN=example.com\nPDS_HOST=pds.${DOMAIN}\nPORT=3000\n";
        let target = "DOMAIN=social.example\nPDS_HOST=pds.social.example\nPORT=3000\n";

        let quiet = run(template, target, "", ReconcileOptions::default());
        assert!(quiet.diagnostics.is_empty());

        let verbose = run(
            template,
            target,
            "",
            ReconcileOptions {
                show_definition_changes: true,
                show_value_changes: true,
                ..Default::default()
            },
        );
        assert_eq!(
            kinds(&verbose),
            vec![
                (DiagnosticKind::ValueChanged, "DOMAIN"),
                (DiagnosticKind::DefinitionChanged, "PDS_HOST"),
            ]
        );

        let definition = &verbose.diagnostics[1];
        assert_eq!(
            definition.template,
            Some(ValueView {
                raw: "pds.${DOMAIN}".to_string(),
                resolved: "pds.example.com".to_string(),
            })
        );
        assert!(verbose.is_clean(false));
    }

    #[test]
    fn commented_alternative_is_an_accepted_value() {
        let options = ReconcileOptions {
            show_value_changes: true,
            ..Default::default()
        };
        let template = "EMAIL4CERTS=admin@example.com\n# EMAIL4CERTS=internal\n";

        let accepted = run(
            template,
            "EMAIL4CERTS=internal\nCUSTOM_CERTS_DIR=/etc/ssl/certs\nUPDATE_CERTS_CMD=update-ca-certificates\n",
            "",
            ReconcileOptions {
                hide_extra_vars: true,
                ..options
            },
        );
        assert!(accepted.diagnostics.is_empty());

        let changed = run(template, "EMAIL4CERTS=me@example.org\n", "", options);
        assert_eq!(kinds(&changed), vec![(DiagnosticKind::ValueChanged, "EMAIL4CERTS")]);
    }

    #[test]
    fn first_matching_rule_wins() {
        // Present in the template, so never reported as exposed even though
        // the schema lists it.
        let report = run(
            "ADMIN_PASSWORD=changeme\n",
            "ADMIN_PASSWORD=hunter2\n",
            "ADMIN_PASSWORD=x # complex_password\n",
            ReconcileOptions {
                show_value_changes: true,
                ..Default::default()
            },
        );
        assert_eq!(kinds(&report), vec![(DiagnosticKind::ValueChanged, "ADMIN_PASSWORD")]);
    }

    #[test]
    fn iteration_follows_template_then_target_order() {
        let report = run(
            "B=1\nA=1\n# OPT_D=1\n_OPT_C=1\n",
            "Z=1\nY=1\n",
            "",
            ReconcileOptions::default(),
        );

        assert_eq!(
            kinds(&report),
            vec![
                (DiagnosticKind::Missing, "B"),
                (DiagnosticKind::Missing, "A"),
                (DiagnosticKind::Extra, "Z"),
                (DiagnosticKind::Extra, "Y"),
            ]
        );
    }

    #[test]
    fn syntax_and_ssl_findings_are_appended() {
        let source = "EMAIL4CERTS=internal\nTRAILING=x  \n";
        let template = envfile::parse("params.env.example", "EMAIL4CERTS=internal\nTRAILING=x\n");
        let target = envfile::parse(".env", source);
        let schema = SecretSchema::default();

        let report = Reconciler::new(&template, &target, &schema, ReconcileOptions::default())
            .syntax_issues(syntax::check_source(source))
            .run();

        assert_eq!(
            kinds(&report),
            vec![
                (DiagnosticKind::SyntaxError, "TRAILING"),
                (DiagnosticKind::SslConfig, "EMAIL4CERTS"),
                (DiagnosticKind::SslConfig, "CUSTOM_CERTS_DIR"),
                (DiagnosticKind::SslConfig, "UPDATE_CERTS_CMD"),
            ]
        );
        assert!(!report.is_clean(false));
    }

    #[test]
    fn interpolation_cycle_becomes_syntax_error() {
        let options = ReconcileOptions {
            hide_extra_vars: true,
            ..Default::default()
        };
        let report = run("A=1\n", "A=x${B}\nB=y${A}\n", "", options);

        let names: Vec<_> = report
            .of_kind(DiagnosticKind::SyntaxError)
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn shell_style_lines_are_not_extra() {
        let source = "A=1\nexport FOO=1\n";
        let report = run(source, source, "", ReconcileOptions::default());

        assert!(report.diagnostics.is_empty());
        assert!(report.is_clean(true));
    }

    #[test]
    fn summary_fails_when_any_file_has_problems() {
        let dir = tempdir().unwrap();
        let good = dir.path().join(".env");
        let bad = dir.path().join(".env.prod");
        let absent = dir.path().join(".env.staging");
        std::fs::write(&good, "REQUIRED_A=1\n").unwrap();
        std::fs::write(&bad, "OTHER=1\n").unwrap();

        let template = envfile::parse("params.env.example", "REQUIRED_A=1\n");
        let schema = SecretSchema::default();
        let options = ReconcileOptions::default();

        let mut summary = CheckSummary::default();
        for path in [&good, &bad, &absent] {
            let outcome = reconcile_file(&template, &schema, options, path);
            summary.record(path, outcome, options.strict);
        }

        assert!(!summary.is_success());
        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.problem_files, vec![bad, absent]);
    }

    #[test]
    fn summary_of_clean_files_succeeds() {
        let dir = tempdir().unwrap();
        let template = envfile::parse("params.env.example", "A=1\n");
        let schema = SecretSchema::default();

        let mut summary = CheckSummary::default();
        for name in [".env", ".env.prod"] {
            let path = dir.path().join(name);
            std::fs::write(&path, "A=1\nLOCAL=1\n").unwrap();
            let outcome = reconcile_file(&template, &schema, ReconcileOptions::default(), &path);
            summary.record(&path, outcome, false);
        }
        assert!(summary.is_success());

        let path = dir.path().join(".env");
        let strict = ReconcileOptions {
            strict: true,
            ..Default::default()
        };
        let outcome = reconcile_file(&template, &schema, strict, &path);
        summary.record(&path, outcome, strict.strict);
        assert_eq!(summary.problem_files, vec![path]);
    }
}
