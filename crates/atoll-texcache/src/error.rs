//! Texture cache error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while producing or persisting a chunk texture.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem access failed.
    #[error("cache i/o error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Encoding or decoding a texture failed.
    #[error("texture image error: {0}")]
    Image(#[from] image::ImageError),

    /// The renderer could not produce a texture.
    #[error("render failed for chunk {coord}: {reason}")]
    Render {
        /// Chunk coordinate, formatted.
        coord: String,
        /// What went wrong.
        reason: String,
    },
}

impl CacheError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
