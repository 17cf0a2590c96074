//! Pixel-art upscaling: a corner-rule smoother for terrain rasters and a
//! template matcher that swaps small tile patterns for hand-drawn art.

mod engine;
mod error;
mod palette;

pub mod corner;
pub mod template;

pub use engine::UpscaleEngine;
pub use error::UpscaleError;
pub use palette::IndexedBlock;
pub use template::{
    DEFAULT_TEMPLATE_TABLE, TemplateDictionary, TemplateEntry, TemplateManifest, TemplateSet,
    VariantPattern,
};
