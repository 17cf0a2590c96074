//! Upscaler error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating template art.
///
/// Every variant except [`Image`](UpscaleError::Image) and
/// [`Io`](UpscaleError::Io) is an authoring bug in the template set.
#[derive(Debug, Error)]
pub enum UpscaleError {
    /// A template image named in the table is not on disk.
    #[error("template '{name}' not found at {path}")]
    MissingAsset {
        /// Template name.
        name: String,
        /// Expected location.
        path: PathBuf,
    },

    /// Reading the template manifest failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The template manifest is malformed.
    #[error("template manifest parse error: {0}")]
    Manifest(#[from] ron::error::SpannedError),

    /// Decoding a template image failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// A variant's corners differ from its source's corners.
    #[error("corner colors of variant '{variant}' do not match source '{source_name}'")]
    CornerMismatch {
        /// Source template name.
        source_name: String,
        /// Offending variant name.
        variant: String,
    },

    /// A variant uses a color its source does not have.
    #[error("variant '{variant}' uses colors outside the palette of source '{source_name}'")]
    PaletteMismatch {
        /// Source template name.
        source_name: String,
        /// Offending variant name.
        variant: String,
    },

    /// A template has the wrong dimensions.
    #[error("template '{name}' is {width}x{height}, expected {expected_width}x{expected_height}")]
    BadTemplateSize {
        /// Template name.
        name: String,
        /// Actual width.
        width: u32,
        /// Actual height.
        height: u32,
        /// Required width.
        expected_width: u32,
        /// Required height.
        expected_height: u32,
    },
}
