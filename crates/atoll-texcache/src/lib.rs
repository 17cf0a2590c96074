//! Per-chunk terrain texture cache, filled by one background worker that
//! serves the newest request first and ages out stale ones.

mod cache;
mod chunk;
mod error;
mod renderer;
mod request;
mod worker;

pub use cache::ChunkTextureCache;
pub use chunk::Chunk;
pub use error::CacheError;
pub use renderer::{ChunkRenderer, TerrainChunkRenderer};
pub use request::{GenerationRequest, RequestQueue};
pub use worker::{CacheSettings, texture_path};
