//! Terrain error types.

use std::path::PathBuf;

/// Errors raised while computing, persisting, or loading terrain data.
///
/// Load paths translate most of these into a cache miss; they only surface to
/// callers from explicit save calls and geometry validation.
#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    /// Filesystem access failed.
    #[error("terrain i/o error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Encoding or decoding a field image failed.
    #[error("terrain image error: {0}")]
    Image(#[from] image::ImageError),

    /// Encoding a bit-packed PNG failed.
    #[error("png encoding error: {0}")]
    PngEncode(#[from] png::EncodingError),

    /// Decoding a bit-packed PNG failed.
    #[error("png decoding error: {0}")]
    PngDecode(#[from] png::DecodingError),

    /// A min/max side table could not be (de)serialized.
    #[error("side table error: {0}")]
    SideTable(#[from] serde_json::Error),

    /// A persisted artifact does not match the expected dimensions.
    #[error("dimension mismatch: expected {expected_width}x{expected_height}, found {width}x{height}")]
    DimensionMismatch {
        /// Width the loader expected.
        expected_width: u32,
        /// Height the loader expected.
        expected_height: u32,
        /// Width found on disk.
        width: u32,
        /// Height found on disk.
        height: u32,
    },

    /// A persisted image uses an unexpected pixel format.
    #[error("unexpected pixel format in {0}")]
    PixelFormat(PathBuf),

    /// The field was saved before its last row band was computed.
    #[error("terrain layer {0} is still being generated")]
    Incomplete(&'static str),

    /// The cached field was generated with different noise parameters.
    #[error("cached terrain layer {0} was generated with different parameters")]
    StaleParameters(&'static str),

    /// The chunk geometry parameters are unusable.
    #[error("invalid chunk geometry: {0}")]
    InvalidGeometry(String),

    /// Building the bounded thread pool failed.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl TerrainError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
