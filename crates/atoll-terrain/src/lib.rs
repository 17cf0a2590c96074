//! World terrain: chunked noise layers, boolean property layers, and their rasterization to color.

mod bit_grid;
mod error;
mod ext_props;
mod geometry;
mod noise_field;
mod preview;
mod world;

pub mod raster;

pub use bit_grid::BitGrid;
pub use error::TerrainError;
pub use ext_props::{BIOME_DRY_MAX, BIOME_TEMPERATE_MAX, ExtProperty, ExtPropertyLayers};
pub use geometry::{ChunkBounds, ChunkCoord, ChunkGeometry};
pub use noise_field::{
    FractalSampler, NoiseField, NoiseParams, TerrainLayer, border_gradient, noise_to_byte,
};
pub use preview::build_preview_texture;
pub use raster::PixelRasterizer;
pub use world::{TerrainSettings, WorldTerrain};
