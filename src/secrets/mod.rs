//! Secrets schema parsed from the secrets template
//!
//! Each template line carries its secret type in the trailing comment:
//!
//! ```text
//! PDS_JWT_SECRET=0123456789abcdef # long_hex
//! POSTGRES_USER=pg # fixed_value:pg
//! ```

pub mod generate;
pub mod validate;

use indexmap::IndexMap;
use std::path::Path;
use std::str::FromStr;

use crate::envfile::inline_comment_start;
use crate::error::{EnvError, EnvResult};

/// How a secret is generated and validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKind {
    /// 64 hex characters (256 bits)
    LongHex,
    /// 32 hex characters (128 bits)
    ShortHex,
    /// Mixed-case password with digits and symbols
    ComplexPassword,
    /// A literal declared in the template
    FixedValue,
    /// Supplied by a third party, entered by hand
    External,
}

impl SecretKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LongHex => "long_hex",
            Self::ShortHex => "short_hex",
            Self::ComplexPassword => "complex_password",
            Self::FixedValue => "fixed_value",
            Self::External => "external",
        }
    }
}

impl std::fmt::Display for SecretKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown secret type '{0}'")]
pub struct UnknownSecretKind(pub String);

impl FromStr for SecretKind {
    type Err = UnknownSecretKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long_hex" => Ok(Self::LongHex),
            "short_hex" => Ok(Self::ShortHex),
            "complex_password" => Ok(Self::ComplexPassword),
            "fixed_value" => Ok(Self::FixedValue),
            "external" => Ok(Self::External),
            other => Err(UnknownSecretKind(other.to_string())),
        }
    }
}

/// One declared secret. `kind` is `None` when the template names a type
/// this tool does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSpec {
    pub kind: Option<SecretKind>,
    pub fixed_value: Option<String>,
    pub line: usize,
}

/// Declared secrets in template order
#[derive(Debug, Clone, Default)]
pub struct SecretSchema {
    entries: IndexMap<String, SecretSpec>,
}

impl SecretSchema {
    pub fn parse(source: &str) -> Self {
        let mut entries = IndexMap::new();

        for (idx, raw) in source.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(comment_at) = inline_comment_start(line) else {
                continue;
            };
            let (assignment, comment) = line.split_at(comment_at);
            let Some((name, _)) = assignment.split_once('=') else {
                continue;
            };
            let name = name.trim();
            let comment = comment.trim_start_matches('#').trim();

            let (token, fixed_value) = match comment.split_once(':') {
                Some((token, literal)) => (token.trim(), Some(literal.trim().to_string())),
                None => (comment, None),
            };

            let kind = match token.parse::<SecretKind>() {
                Ok(kind) => Some(kind),
                Err(e) => {
                    tracing::warn!(name, line = line_no, "{}", e);
                    None
                }
            };

            entries.insert(
                name.to_string(),
                SecretSpec {
                    kind,
                    fixed_value,
                    line: line_no,
                },
            );
        }

        Self { entries }
    }

    pub fn load(path: &Path) -> EnvResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| EnvError::io(path, e))?;
        let schema = Self::parse(&source);
        tracing::debug!(path = %path.display(), secrets = schema.len(), "loaded secrets schema");
        Ok(schema)
    }

    /// Load the schema if the template exists, otherwise an empty schema.
    pub fn load_optional(path: &Path) -> EnvResult<Self> {
        match Self::load(path) {
            Err(e) if e.is_not_found() => {
                tracing::info!(path = %path.display(), "no secrets template, skipping exposure check");
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn get(&self, name: &str) -> Option<&SecretSpec> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SecretSpec)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
