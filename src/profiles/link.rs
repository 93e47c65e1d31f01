//! Symlink management for profile files
//!
//! A profile file (`.env`, `.env.prod`, ...) is normally a symlink to a
//! named parameters file such as `myproject.env`. Replacing a link removes
//! the old one before creating the new one.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::error::{EnvError, EnvResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Symlink(PathBuf),
    RegularFile,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    Replaced { previous: PathBuf },
    /// The link already pointed at the requested file
    Unchanged,
}

pub fn status(env: &Path) -> EnvResult<LinkStatus> {
    let metadata = match std::fs::symlink_metadata(env) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LinkStatus::Absent),
        Err(e) => return Err(EnvError::io(env, e)),
    };

    if metadata.file_type().is_symlink() {
        let target = std::fs::read_link(env).map_err(|e| EnvError::io(env, e))?;
        Ok(LinkStatus::Symlink(target))
    } else {
        Ok(LinkStatus::RegularFile)
    }
}

/// Point `env` at `params`. A relative `params` is taken relative to the
/// directory holding `env`, the same way the link itself resolves it.
pub fn create(params: &Path, env: &Path) -> EnvResult<LinkOutcome> {
    let link_dir = env.parent().unwrap_or_else(|| Path::new(""));
    let resolved = link_dir.join(params);
    if !resolved.exists() {
        return Err(EnvError::NotFound { path: resolved });
    }

    let outcome = match status(env)? {
        LinkStatus::Symlink(current) if current.as_path() == params => {
            tracing::debug!(env = %env.display(), "link already points at {}", params.display());
            return Ok(LinkOutcome::Unchanged);
        }
        LinkStatus::Symlink(current) => {
            std::fs::remove_file(env).map_err(|e| EnvError::io(env, e))?;
            LinkOutcome::Replaced { previous: current }
        }
        LinkStatus::RegularFile => {
            return Err(EnvError::NotASymlink {
                path: env.to_path_buf(),
            })
        }
        LinkStatus::Absent => LinkOutcome::Created,
    };

    make_symlink(params, env).map_err(|e| EnvError::io(env, e))?;
    tracing::info!(env = %env.display(), params = %params.display(), "linked profile");
    Ok(outcome)
}

/// Remove the symlink at `env`, returning where it pointed.
pub fn delete(env: &Path) -> EnvResult<PathBuf> {
    match status(env)? {
        LinkStatus::Symlink(target) => {
            std::fs::remove_file(env).map_err(|e| EnvError::io(env, e))?;
            tracing::info!(env = %env.display(), "removed profile link");
            Ok(target)
        }
        LinkStatus::RegularFile => Err(EnvError::NotASymlink {
            path: env.to_path_buf(),
        }),
        LinkStatus::Absent => Err(EnvError::NotFound {
            path: env.to_path_buf(),
        }),
    }
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Parameter files a profile can be linked to: `*.env`, dot-files excluded.
pub fn candidate_files(base: &Path) -> Result<Vec<String>> {
    let pattern = format!("{}/*.env", glob::Pattern::escape(&base.to_string_lossy()));
    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..Default::default()
    };

    let mut names: Vec<String> = glob::glob_with(&pattern, options)?
        .filter_map(|entry| entry.ok())
        .filter_map(|path| path.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    Ok(names)
}

/// `path`, followed by where it resolves to when it is a symlink.
pub fn describe_path(path: &Path) -> String {
    match status(path) {
        Ok(LinkStatus::Symlink(_)) => match std::fs::canonicalize(path) {
            Ok(target) => format!("{} -> {}", path.display(), target.display()),
            Err(_) => format!("{} -> (dangling)", path.display()),
        },
        _ => std::fs::canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string(),
    }
}

/// Print what `env` currently is. Returns false when it does not exist.
pub fn print_status(env: &Path) -> EnvResult<bool> {
    let name = file_name(env);
    match status(env)? {
        LinkStatus::Symlink(target) => {
            println!("{} -> {}", name, target.display());
            Ok(true)
        }
        LinkStatus::RegularFile => {
            println!("{} (regular file)", name);
            Ok(true)
        }
        LinkStatus::Absent => {
            println!("No {} file found.", name);
            Ok(false)
        }
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
