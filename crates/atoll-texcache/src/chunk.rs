//! A chunk as the texture cache sees it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use atoll_terrain::{ChunkBounds, ChunkCoord, ChunkGeometry};
use image::RgbaImage;

/// One chunk: its position, an optional loaded texture, and whether its
/// texture is already cached on disk.
///
/// Shared between the game side and the background worker as `Arc<Chunk>`.
#[derive(Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    bounds: ChunkBounds,
    texture: Mutex<Option<Arc<RgbaImage>>>,
    saved_to_disk: AtomicBool,
}

impl Chunk {
    /// Create a chunk with no texture loaded.
    pub fn new(coord: ChunkCoord, bounds: ChunkBounds) -> Self {
        Self {
            coord,
            bounds,
            texture: Mutex::new(None),
            saved_to_disk: AtomicBool::new(false),
        }
    }

    /// Every chunk of `geometry`, row-major.
    pub fn all(geometry: &ChunkGeometry) -> Vec<Arc<Chunk>> {
        geometry
            .iter_chunks()
            .map(|coord| Arc::new(Chunk::new(coord, geometry.bounds(coord))))
            .collect()
    }

    /// Chunk coordinate.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Full-resolution pixel bounds.
    pub fn bounds(&self) -> ChunkBounds {
        self.bounds
    }

    /// Whether the texture is known to be on disk.
    pub fn is_saved_to_disk(&self) -> bool {
        self.saved_to_disk.load(Ordering::Acquire)
    }

    /// Record that the texture is on disk.
    pub fn mark_saved(&self) {
        self.saved_to_disk.store(true, Ordering::Release);
    }

    /// The loaded texture, if any.
    pub fn texture(&self) -> Option<Arc<RgbaImage>> {
        self.lock_texture().clone()
    }

    /// Whether a texture is loaded.
    pub fn has_texture(&self) -> bool {
        self.lock_texture().is_some()
    }

    /// Replace the loaded texture, returning the previous one.
    pub(crate) fn replace_texture(&self, texture: Option<Arc<RgbaImage>>) -> Option<Arc<RgbaImage>> {
        std::mem::replace(&mut *self.lock_texture(), texture)
    }

    fn lock_texture(&self) -> std::sync::MutexGuard<'_, Option<Arc<RgbaImage>>> {
        self.texture.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
