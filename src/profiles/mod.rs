//! Environment profiles: `.env` and `.env.<profile>` files in the base directory

pub mod link;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::error::{EnvError, EnvResult};

static PROFILE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.+-]+$").expect("Invalid profile regex"));

pub const ENV_FILE: &str = ".env";
pub const DEFAULT_PROFILE: &str = "default";

pub fn validate_profile_name(name: &str) -> bool {
    PROFILE_REGEX.is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Profile {
    /// The plain `.env` file
    Default,
    Named(String),
}

impl Profile {
    /// Parse a profile name; `default` selects the plain `.env` file.
    pub fn parse(name: &str) -> EnvResult<Self> {
        if name == DEFAULT_PROFILE {
            return Ok(Self::Default);
        }
        if !validate_profile_name(name) {
            return Err(EnvError::InvalidProfile(name.to_string()));
        }
        Ok(Self::Named(name.to_string()))
    }

    pub fn named(name: &str) -> Self {
        Self::Named(name.to_string())
    }

    pub fn file_name(&self) -> String {
        match self {
            Self::Default => ENV_FILE.to_string(),
            Self::Named(name) => format!("{ENV_FILE}.{name}"),
        }
    }

    pub fn env_path(&self, base: &Path) -> PathBuf {
        base.join(self.file_name())
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "{DEFAULT_PROFILE}"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Profiles always considered by `--all-profiles`.
pub fn standard_profiles() -> Vec<Profile> {
    vec![
        Profile::Default,
        Profile::named("production"),
        Profile::named("staging"),
    ]
}

/// Profiles with a `.env.<name>` entry in `base`, sorted by name.
/// Template files (`.env.example`, `.env.prod.example`) are not profiles.
pub fn existing_profiles(base: &Path) -> Result<Vec<Profile>> {
    let prefix = format!("{ENV_FILE}.");
    let pattern = format!(
        "{}/{}*",
        glob::Pattern::escape(&base.to_string_lossy()),
        prefix
    );

    let mut names: Vec<String> = glob::glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter_map(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(&prefix))
                .map(str::to_string)
        })
        .filter(|name| validate_profile_name(name) && !name.ends_with("example"))
        .collect();
    names.sort();
    names.dedup();

    Ok(names.into_iter().map(Profile::Named).collect())
}

/// The profiles a check runs over: the requested ones, then with `all` every
/// existing and standard profile. Nothing requested means the default.
pub fn select_profiles(requested: &[Profile], all: bool, base: &Path) -> Result<Vec<Profile>> {
    let mut selected: Vec<Profile> = Vec::new();
    let mut push = |profile: Profile| {
        if !selected.contains(&profile) {
            selected.push(profile);
        }
    };

    requested.iter().cloned().for_each(&mut push);
    if all {
        existing_profiles(base)?.into_iter().for_each(&mut push);
        standard_profiles().into_iter().for_each(&mut push);
    }

    if selected.is_empty() {
        selected.push(Profile::Default);
    }
    Ok(selected)
}

/// Files a check runs over: the explicit `env_file` as given, or the
/// selected profiles whose files exist.
pub fn env_files(
    base: &Path,
    requested: &[Profile],
    all: bool,
    env_file: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    if let Some(file) = env_file {
        if !requested.is_empty() || all {
            anyhow::bail!("Either specify env file or profiles, not both");
        }
        return Ok(vec![base.join(file)]);
    }

    let selected = select_profiles(requested, all, base)?;
    let mut existing = Vec::new();
    for profile in &selected {
        let path = profile.env_path(base);
        if path.exists() {
            existing.push(path);
        } else {
            tracing::info!(%profile, path = %path.display(), "skipping missing profile file");
        }
    }

    if existing.is_empty() {
        let names: Vec<String> = selected.iter().map(Profile::file_name).collect();
        anyhow::bail!(
            "No environment files found for specified profiles: {}",
            names.join(", ")
        );
    }
    Ok(existing)
}
