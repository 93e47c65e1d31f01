//! Error types shared by the file-level operations

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("file '{}' not found", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("profile name '{0}' is not valid (only [a-zA-Z0-9_.+-] characters are allowed)")]
    InvalidProfile(String),

    #[error("'{}' is not a symlink: not removing, check and adjust manually", path.display())]
    NotASymlink { path: PathBuf },

    #[error("'{}' already exists", path.display())]
    AlreadyExists { path: PathBuf },
}

impl EnvError {
    /// Map an I/O error on `path`, folding `NotFound` into its own variant.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type EnvResult<T> = std::result::Result<T, EnvError>;
