//! `${NAME}` and `${NAME:-fallback}` substitution

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static FALLBACK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*):-([^}]*)\}").expect("Invalid fallback regex")
});

static PLAIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid reference regex")
});

static ANY_REFERENCE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{[^}]+\}").expect("Invalid reference regex"));

/// Values kept changing after every pass the mapping could need.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circular variable references: {}", names.join(", "))]
pub struct InterpolationCycle {
    pub names: Vec<String>,
}

/// Resolve the references in `src` once against `env`.
///
/// Fallback references are substituted first, then plain references in
/// name order, so a name that prefixes another never shadows it. Plain
/// references to names missing from `env` become empty.
pub fn interpolate(src: &str, env: &IndexMap<String, String>) -> String {
    let mut out = FALLBACK_REGEX
        .replace_all(src, |caps: &Captures| match env.get(&caps[1]) {
            Some(value) if !value.is_empty() => value.clone(),
            _ => caps[2].to_string(),
        })
        .into_owned();

    let mut pairs: Vec<(&String, &String)> = env.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in pairs {
        let token = format!("${{{name}}}");
        if out.contains(&token) {
            out = out.replace(&token, value);
        }
    }

    PLAIN_REGEX
        .replace_all(&out, |caps: &Captures| {
            if env.contains_key(&caps[1]) {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Apply [`interpolate`] over the whole mapping until a pass changes nothing.
///
/// Values are updated in place, so later entries of a pass already see the
/// earlier results. An acyclic mapping settles within `len + 1` passes; a
/// mapping still changing after that grows through a cycle.
pub fn resolve_all(
    mut env: IndexMap<String, String>,
) -> Result<IndexMap<String, String>, InterpolationCycle> {
    let max_passes = env.len() + 1;
    let mut changed = Vec::new();

    for _ in 0..max_passes {
        changed.clear();
        for idx in 0..env.len() {
            let next = interpolate(&env[idx], &env);
            if next != env[idx] {
                if let Some((name, slot)) = env.get_index_mut(idx) {
                    changed.push(name.to_string());
                    *slot = next;
                }
            }
        }
        if changed.is_empty() {
            return Ok(env);
        }
    }

    tracing::debug!(names = ?changed, "interpolation did not settle");
    Err(InterpolationCycle { names: changed })
}

pub fn has_references(value: &str) -> bool {
    ANY_REFERENCE_REGEX.is_match(value)
}
