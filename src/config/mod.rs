//! Configuration system for envcheck
//!
//! Settings come from the user config (`~/.config/envcheck/config.toml`),
//! then the project file (`.envcheck.toml` in the base directory), then
//! command-line flags, each layer overriding the previous one.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::EnvError;
use crate::reconcile::ReconcileOptions;

pub const PROJECT_CONFIG_FILE: &str = ".envcheck.toml";

/// Global application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub check: ReconcileOptions,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("envcheck").join("config.toml"))
    }

    /// Overlay the settings a project file sets explicitly.
    pub fn with_project(mut self, project: &ProjectConfig) -> Self {
        let paths = &project.paths;
        if let Some(template) = &paths.template_file {
            self.paths.template_file = template.clone();
        }
        if let Some(template) = &paths.secrets_template {
            self.paths.secrets_template = template.clone();
        }
        if let Some(file) = &paths.secrets_file {
            self.paths.secrets_file = file.clone();
        }

        let check = &project.check;
        let options = &mut self.check;
        options.show_definition_changes =
            check.show_definition_changes.unwrap_or(options.show_definition_changes);
        options.show_value_changes = check.show_value_changes.unwrap_or(options.show_value_changes);
        options.hide_extra_vars = check.hide_extra_vars.unwrap_or(options.hide_extra_vars);
        options.strict = check.strict.unwrap_or(options.strict);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub template_file: PathBuf,
    pub secrets_template: PathBuf,
    pub secrets_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            template_file: PathBuf::from("bluesky-params.env.example"),
            secrets_template: PathBuf::from("config/secrets-passwords.env.example"),
            secrets_file: PathBuf::from("config/secrets-passwords.env"),
        }
    }
}

/// Project-specific configuration (.envcheck.toml)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    pub project: ProjectInfo,
    pub paths: ProjectPathsConfig,
    pub check: ProjectCheckConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ProjectInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ProjectPathsConfig {
    pub template_file: Option<PathBuf>,
    pub secrets_template: Option<PathBuf>,
    pub secrets_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ProjectCheckConfig {
    pub show_definition_changes: Option<bool>,
    pub show_value_changes: Option<bool>,
    pub hide_extra_vars: Option<bool>,
    pub strict: Option<bool>,
}

impl ProjectConfig {
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(PROJECT_CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(config))
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(PROJECT_CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Initialize a new project configuration
pub fn init_project_config(dir: &Path, force: bool) -> Result<()> {
    let path = dir.join(PROJECT_CONFIG_FILE);

    if path.exists() && !force {
        return Err(EnvError::AlreadyExists { path }).context("use --force to overwrite");
    }

    let project_name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("project")
        .to_string();

    let defaults = PathsConfig::default();
    let config = ProjectConfig {
        project: ProjectInfo {
            name: project_name,
            description: String::new(),
        },
        paths: ProjectPathsConfig {
            template_file: Some(defaults.template_file),
            secrets_template: Some(defaults.secrets_template),
            secrets_file: Some(defaults.secrets_file),
        },
        ..Default::default()
    };

    config.save(dir)?;
    println!("Created {PROJECT_CONFIG_FILE}");
    Ok(())
}
