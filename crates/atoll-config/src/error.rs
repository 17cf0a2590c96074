//! Errors from reading and writing `config.ron`.

use std::path::PathBuf;

/// Why `config.ron` could not be loaded or stored.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `config.ron` exists but could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// The config file.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config directory or `config.ron` could not be written.
    #[error("cannot write {path}: {source}")]
    Write {
        /// Directory or file being written.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `config.ron` is not a valid atoll config.
    #[error("invalid config in {path}: {source}")]
    Parse {
        /// The config file.
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    /// The settings could not be rendered as RON.
    #[error("cannot serialize config: {0}")]
    Serialize(#[source] ron::Error),
}

impl ConfigError {
    pub(crate) fn read(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn write(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}
