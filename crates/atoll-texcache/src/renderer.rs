//! Turning a chunk into its texture.

use std::sync::{Arc, Mutex, PoisonError};

use atoll_terrain::{PixelRasterizer, WorldTerrain};
use atoll_upscale::UpscaleEngine;
use image::RgbaImage;

use crate::chunk::Chunk;
use crate::error::CacheError;

/// Produces the texture of a chunk.
pub trait ChunkRenderer: Send + Sync {
    /// Render the chunk's texture.
    fn render_chunk(&self, chunk: &Chunk) -> Result<RgbaImage, CacheError>;

    /// Called by the worker whenever it has drained the queue.
    fn batch_finished(&self) {}
}

/// Renders chunks from world terrain: rasterize with a one-cell border
/// borrowed from the neighbours, then corner-rule upscale the interior.
pub struct TerrainChunkRenderer {
    world: Arc<WorldTerrain>,
    rasterizer: PixelRasterizer,
    engine: Mutex<UpscaleEngine>,
}

/// Border cells needed by the 3x3 corner rule.
const MARGIN: u32 = 1;

impl TerrainChunkRenderer {
    /// Create a renderer over a finished world.
    pub fn new(world: Arc<WorldTerrain>, rasterizer: PixelRasterizer, engine: UpscaleEngine) -> Self {
        Self {
            world,
            rasterizer,
            engine: Mutex::new(engine),
        }
    }

    /// The world being rendered.
    pub fn world(&self) -> &WorldTerrain {
        &self.world
    }
}

impl ChunkRenderer for TerrainChunkRenderer {
    fn render_chunk(&self, chunk: &Chunk) -> Result<RgbaImage, CacheError> {
        let coord = chunk.coord();
        if !self.world.geometry().contains_chunk(coord) {
            return Err(CacheError::Render {
                coord: coord.to_string(),
                reason: "chunk is outside the world".to_string(),
            });
        }

        let raster = self
            .rasterizer
            .rasterize_chunk_padded(&self.world, coord, MARGIN);
        // A panic in a previous render leaves only memo tables behind.
        let mut engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(engine.upscale_corner_rule_interior(&raster, MARGIN))
    }

    fn batch_finished(&self) {
        self.engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clean_up_after_upscaling_all();
    }
}
