//! `.env` parameter file parsing
//!
//! A parameter file is line oriented: `NAME=VALUE` assignments, `#` comments
//! (full-line, or inline when preceded by whitespace), and the optional
//! variable conventions used by the templates: `# NAME=VALUE` lines and
//! active names starting with an underscore.

pub mod interpolate;
pub mod syntax;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::error::{EnvError, EnvResult};
use interpolate::InterpolationCycle;

static NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("Invalid variable name regex"));

/// Whether `name` is a plain variable name that takes part in ordering.
pub fn is_variable_name(name: &str) -> bool {
    NAME_REGEX.is_match(name)
}

/// An active (uncommented) assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvEntry {
    pub name: String,
    pub value: String,
    pub optional: bool,
    pub line: usize,
}

/// A `# NAME=VALUE` line: an optional variable and its suggested value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentedEntry {
    pub value: String,
    pub line: usize,
}

/// One parsed parameter file. Immutable once parsed.
#[derive(Debug, Clone, Default)]
pub struct EnvFile {
    path: PathBuf,
    entries: IndexMap<String, EnvEntry>,
    commented: IndexMap<String, CommentedEntry>,
}

impl EnvFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw value of an active assignment.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Active assignments in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = &EnvEntry> {
        self.entries.values()
    }

    /// Active, non-underscore variables in declaration order.
    pub fn required(&self) -> impl Iterator<Item = &EnvEntry> {
        self.entries
            .values()
            .filter(|e| !e.optional && is_variable_name(&e.name))
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map(|e| !e.optional && is_variable_name(name))
            .unwrap_or(false)
    }

    /// Optional variable names ordered by where they first appear.
    ///
    /// A name that is also assigned as a required variable is not optional;
    /// its commented value still counts as an accepted alternative, see
    /// [`EnvFile::optional_value`].
    pub fn optional_names(&self) -> Vec<&str> {
        let mut found: Vec<(usize, &str)> = self
            .entries
            .values()
            .filter(|e| e.optional && is_variable_name(&e.name))
            .map(|e| (e.line, e.name.as_str()))
            .collect();

        for (name, entry) in &self.commented {
            if !self.entries.contains_key(name.as_str()) {
                found.push((entry.line, name.as_str()));
            }
        }

        found.sort_by_key(|(line, _)| *line);
        found.into_iter().map(|(_, name)| name).collect()
    }

    /// Value suggested for `name` by a commented line or an underscore entry.
    pub fn optional_value(&self, name: &str) -> Option<&str> {
        if let Some(entry) = self.commented.get(name) {
            return Some(entry.value.as_str());
        }
        self.entries
            .get(name)
            .filter(|e| e.optional)
            .map(|e| e.value.as_str())
    }

    /// Whether the file declares `name` at all, required or optional.
    pub fn is_known(&self, name: &str) -> bool {
        self.commented.contains_key(name)
            || (self.entries.contains_key(name) && is_variable_name(name))
    }

    /// Raw name to value mapping of the active assignments.
    pub fn values(&self) -> IndexMap<String, String> {
        self.entries
            .values()
            .map(|e| (e.name.clone(), e.value.clone()))
            .collect()
    }

    /// Interpolated view of the active assignments.
    pub fn resolved(&self) -> Result<IndexMap<String, String>, InterpolationCycle> {
        interpolate::resolve_all(self.values())
    }
}

/// Parse `source` as the contents of `path`.
pub fn parse(path: impl Into<PathBuf>, source: &str) -> EnvFile {
    let mut entries: IndexMap<String, EnvEntry> = IndexMap::new();
    let mut commented: IndexMap<String, CommentedEntry> = IndexMap::new();

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("# ") {
            if let Some((name, value)) = rest.split_once('=') {
                let name = name.trim();
                if is_variable_name(name) {
                    let value = value.split('#').next().unwrap_or_default().trim();
                    commented
                        .entry(name.to_string())
                        .and_modify(|e| e.value = value.to_string())
                        .or_insert_with(|| CommentedEntry {
                            value: value.to_string(),
                            line: line_no,
                        });
                }
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = strip_inline_comment(value).trim();

        // Last assignment wins, first one keeps the position.
        entries
            .entry(name.to_string())
            .and_modify(|e| e.value = value.to_string())
            .or_insert_with(|| EnvEntry {
                name: name.to_string(),
                value: value.to_string(),
                optional: name.starts_with('_'),
                line: line_no,
            });
    }

    EnvFile {
        path: path.into(),
        entries,
        commented,
    }
}

/// Read and parse a parameter file.
pub fn read(path: &Path) -> EnvResult<EnvFile> {
    let source = std::fs::read_to_string(path).map_err(|e| EnvError::io(path, e))?;
    let file = parse(path, &source);
    tracing::debug!(
        path = %path.display(),
        variables = file.len(),
        "parsed parameter file"
    );
    Ok(file)
}

/// Cut an inline comment: a `#` preceded by whitespace.
pub(crate) fn strip_inline_comment(value: &str) -> &str {
    match inline_comment_start(value) {
        Some(idx) => &value[..idx],
        None => value,
    }
}

pub(crate) fn inline_comment_start(value: &str) -> Option<usize> {
    let mut prev_ws = false;
    for (idx, ch) in value.char_indices() {
        if ch == '#' && prev_ws {
            return Some(idx);
        }
        prev_ws = ch.is_whitespace();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const TEMPLATE: &str = r#"
# Domain served by the deployment
DOMAIN=example.com
PDS_HOSTNAME=pds.${DOMAIN}   # the PDS host

# LOG_LEVEL=debug
_INTERNAL_PORT=2583
EMAIL4CERTS=admin@example.com
# EMAIL4CERTS=internal
# this line is just prose = not a variable
"#;

    #[test]
    fn classifies_required_and_optional_variables() {
        let file = parse("template.env", TEMPLATE);

        let required: Vec<_> = file.required().map(|e| e.name.as_str()).collect();
        assert_eq!(required, vec!["DOMAIN", "PDS_HOSTNAME", "EMAIL4CERTS"]);
        assert_eq!(file.optional_names(), vec!["LOG_LEVEL", "_INTERNAL_PORT"]);

        assert_eq!(file.get("PDS_HOSTNAME"), Some("pds.${DOMAIN}"));
        assert_eq!(file.optional_value("LOG_LEVEL"), Some("debug"));
        assert_eq!(file.optional_value("_INTERNAL_PORT"), Some("2583"));
    }

    #[test]
    fn required_name_keeps_commented_alternative() {
        let file = parse("template.env", TEMPLATE);

        assert!(file.is_required("EMAIL4CERTS"));
        assert!(!file.optional_names().contains(&"EMAIL4CERTS"));
        assert_eq!(file.optional_value("EMAIL4CERTS"), Some("internal"));
        assert!(file.is_known("EMAIL4CERTS"));
        assert!(file.is_known("LOG_LEVEL"));
        assert!(!file.is_known("UNRELATED"));
    }

    #[test]
    fn inline_comment_needs_leading_whitespace() {
        let file = parse(
            ".env",
            "URL=https://host/#fragment\nPORT=3000 # web\nEMPTY= # nothing\n",
        );

        assert_eq!(file.get("URL"), Some("https://host/#fragment"));
        assert_eq!(file.get("PORT"), Some("3000"));
        assert_eq!(file.get("EMPTY"), Some(""));
    }

    #[test]
    fn last_assignment_wins_in_first_position() {
        let file = parse(".env", "A=1\nB=2\nA=3\n");

        let entries: Vec<_> = file
            .entries()
            .map(|e| (e.name.as_str(), e.value.as_str(), e.line))
            .collect();
        assert_eq!(entries, vec![("A", "3", 1), ("B", "2", 2)]);
    }

    #[test]
    fn ignores_lines_without_assignment() {
        let file = parse(".env", "just words\n\n   \n#A=1\n=orphan\n");
        assert!(file.is_empty());
    }

    #[test]
    fn read_reports_missing_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join(".env.nope");

        let err = read(&missing).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains(".env.nope"));
    }

    #[test]
    fn read_parses_file_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "A=1\n_B=2\n").unwrap();

        let file = read(&path).expect("read env file");
        assert_eq!(file.get("A"), Some("1"));
        assert_eq!(file.optional_names(), vec!["_B"]);
    }

    #[test]
    fn plain_files_resolve_to_raw_values() {
        let file = parse(".env", "A=1\nB=two words\nC=\n");
        assert_eq!(file.resolved().expect("no cycles"), file.values());
    }
}
