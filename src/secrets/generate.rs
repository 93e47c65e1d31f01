//! Secret generators and secrets-file population

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use std::path::Path;

use super::{SecretKind, SecretSchema, SecretSpec};
use crate::envfile;
use crate::error::{EnvError, EnvResult};

const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const PASSWORD_SYMBOLS: &[u8] = b"_-";

/// Characters drawn before the trailing `_`.
const PASSWORD_BODY_LENGTH: usize = 10;

/// 256-bit key as 64 lowercase hex characters.
pub fn long_hex() -> String {
    random_hex(32)
}

/// 128-bit key as 32 lowercase hex characters.
pub fn short_hex() -> String {
    random_hex(16)
}

/// Password accepted by OpenSearch: upper, lower, digit and symbol, each at
/// least once.
pub fn complex_password() -> String {
    let mut rng = OsRng;
    let alphabet = [UPPER, LOWER, DIGITS, PASSWORD_SYMBOLS].concat();

    let mut chars = vec![
        pick(&mut rng, UPPER),
        pick(&mut rng, LOWER),
        pick(&mut rng, DIGITS),
        pick(&mut rng, PASSWORD_SYMBOLS),
    ];
    while chars.len() < PASSWORD_BODY_LENGTH {
        chars.push(pick(&mut rng, &alphabet));
    }
    chars.shuffle(&mut rng);

    let mut password: String = chars.into_iter().map(char::from).collect();
    password.push('_');
    password
}

fn pick(rng: &mut OsRng, set: &[u8]) -> u8 {
    set[rng.gen_range(0..set.len())]
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Value for a secret missing from the secrets file. External secrets and
/// unknown kinds get an empty placeholder.
pub fn generate_value(name: &str, spec: &SecretSpec) -> String {
    match spec.kind {
        Some(SecretKind::LongHex) => long_hex(),
        Some(SecretKind::ShortHex) => short_hex(),
        Some(SecretKind::ComplexPassword) => complex_password(),
        Some(SecretKind::FixedValue) => match &spec.fixed_value {
            Some(value) => value.clone(),
            None => {
                tracing::warn!(name, line = spec.line, "fixed_value secret declares no value");
                String::new()
            }
        },
        Some(SecretKind::External) => String::new(),
        None => {
            tracing::warn!(name, line = spec.line, "no generator for unknown secret type");
            String::new()
        }
    }
}

/// What [`generate_secrets_file`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOutcome {
    pub created: bool,
    pub added: Vec<String>,
    /// Newly added external secrets that still need a value
    pub external: Vec<String>,
}

/// Add every secret of `schema` missing from the file at `path`.
///
/// Existing lines are kept verbatim; new secrets are appended in template
/// order. A missing file is created.
pub fn generate_secrets_file(schema: &SecretSchema, path: &Path) -> EnvResult<GenerateOutcome> {
    let existing = match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(EnvError::io(path, e)),
    };
    let current = existing
        .as_deref()
        .map(|content| envfile::parse(path, content))
        .unwrap_or_default();

    let mut outcome = GenerateOutcome {
        created: existing.is_none(),
        ..Default::default()
    };
    let mut content = existing.unwrap_or_default();
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }

    for (name, spec) in schema.iter() {
        if current.contains(name) {
            continue;
        }
        if spec.kind == Some(SecretKind::External) {
            outcome.external.push(name.to_string());
        }
        let value = generate_value(name, spec);
        content.push_str(&format!("{name}={value}\n"));
        outcome.added.push(name.to_string());
    }

    if outcome.created || !outcome.added.is_empty() {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| EnvError::io(parent, e))?;
        }
        std::fs::write(path, content).map_err(|e| EnvError::io(path, e))?;
        tracing::info!(path = %path.display(), added = outcome.added.len(), "wrote secrets file");
    }

    Ok(outcome)
}
