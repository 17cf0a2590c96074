//! Disk-backed chunk texture cache with a supervised background worker.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel::{Sender, bounded};
use image::RgbaImage;

use crate::chunk::Chunk;
use crate::error::CacheError;
use crate::renderer::ChunkRenderer;
use crate::request::RequestQueue;
use crate::worker::{CacheSettings, WorkerShared, spawn_worker, texture_path};

/// Caches one PNG per chunk under a directory and keeps it filled from a
/// single background worker.
///
/// Producers call [`request`](Self::request) from any thread. If the worker
/// thread has died, the next request starts a replacement.
pub struct ChunkTextureCache {
    shared: Arc<WorkerShared>,
    wake: Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
    restarts: AtomicU64,
    loaded_textures: AtomicUsize,
    stopped: AtomicBool,
}

impl ChunkTextureCache {
    /// Create the cache and start its worker.
    pub fn new(dir: impl Into<PathBuf>, renderer: Arc<dyn ChunkRenderer>, settings: CacheSettings) -> Self {
        let (wake, wake_rx) = bounded(1);
        let shared = Arc::new(WorkerShared {
            dir: dir.into(),
            queue: RequestQueue::new(),
            renderer,
            settings,
            disk_writes: AtomicU64::new(0),
            temp_seq: AtomicU64::new(0),
            busy: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            wake: wake_rx,
        });
        let worker = spawn_worker(Arc::clone(&shared));

        Self {
            shared,
            wake,
            worker: Mutex::new(Some(worker)),
            restarts: AtomicU64::new(0),
            loaded_textures: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    /// Directory holding the cached textures.
    pub fn dir(&self) -> &Path {
        &self.shared.dir
    }

    /// Path of a chunk's cached texture.
    pub fn texture_path(&self, chunk: &Chunk) -> PathBuf {
        texture_path(&self.shared.dir, chunk.coord())
    }

    /// Ask the worker to cache a chunk's texture.
    ///
    /// Repeated requests for the same chunk are kept; the worker serves the
    /// newest first and the rest become no-ops once the file exists.
    pub fn request(&self, chunk: Arc<Chunk>) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        self.shared.queue.push(chunk);
        self.ensure_worker();
        let _ = self.wake.try_send(());
    }

    /// Number of queued requests.
    pub fn pending_count(&self) -> usize {
        self.shared.queue.len()
    }

    /// Whether every queued request has been handled.
    ///
    /// Polling also supervises: if requests are queued and the worker has
    /// died, a replacement is started. A stopped cache is always idle.
    pub fn is_idle(&self) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            return true;
        }
        if !self.shared.queue.is_empty() {
            self.ensure_worker();
            return false;
        }
        !self.shared.busy.load(Ordering::Acquire) || !self.is_worker_running()
    }

    /// How many times a dead worker was replaced.
    pub fn worker_restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Number of texture files written so far.
    pub fn disk_writes(&self) -> u64 {
        self.shared.disk_writes.load(Ordering::Relaxed)
    }

    /// Whether a worker thread is currently alive.
    pub fn is_worker_running(&self) -> bool {
        self.lock_worker()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Render a chunk on the calling thread and try to cache it.
    ///
    /// Nothing is written if the chunk is already saved. A failed write is
    /// logged; the rendered texture is returned either way.
    pub fn generate_now(&self, chunk: &Chunk) -> Result<Arc<RgbaImage>, CacheError> {
        self.render_and_store(chunk, false)
    }

    fn render_and_store(&self, chunk: &Chunk, replace_saved: bool) -> Result<Arc<RgbaImage>, CacheError> {
        let image = self.shared.renderer.render_chunk(chunk)?;
        if (replace_saved || !chunk.is_saved_to_disk())
            && let Err(e) = self.shared.save(chunk, &image)
        {
            tracing::warn!(
                cell_x = chunk.coord().x,
                cell_y = chunk.coord().y,
                error = %e,
                "could not cache chunk texture, keeping it in memory"
            );
        }
        Ok(Arc::new(image))
    }

    /// Load a chunk's texture, from disk if cached, otherwise by rendering it.
    ///
    /// An unreadable cache file counts as a miss.
    pub fn load_texture(&self, chunk: &Chunk) -> Result<Arc<RgbaImage>, CacheError> {
        if let Some(texture) = chunk.texture() {
            return Ok(texture);
        }

        let path = self.texture_path(chunk);
        let mut unreadable = false;
        let cached = if path.exists() {
            match image::open(&path) {
                Ok(image) => {
                    chunk.mark_saved();
                    Some(Arc::new(image.to_rgba8()))
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "discarding unreadable chunk texture");
                    unreadable = true;
                    None
                }
            }
        } else {
            None
        };
        let texture = match cached {
            Some(texture) => texture,
            None => self.render_and_store(chunk, unreadable)?,
        };

        if chunk.replace_texture(Some(Arc::clone(&texture))).is_none() {
            self.loaded_textures.fetch_add(1, Ordering::Relaxed);
        }
        Ok(texture)
    }

    /// Release a chunk's texture. The disk cache is untouched.
    ///
    /// Returns `true` if a texture was loaded.
    pub fn unload_texture(&self, chunk: &Chunk) -> bool {
        let released = chunk.replace_texture(None).is_some();
        if released {
            self.loaded_textures.fetch_sub(1, Ordering::Relaxed);
        }
        released
    }

    /// Number of chunk textures currently loaded through this cache.
    pub fn loaded_texture_count(&self) -> usize {
        self.loaded_textures.load(Ordering::Relaxed)
    }

    /// Stop the worker and wait for it to exit. Pending requests are dropped.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.shutdown.store(true, Ordering::Release);
        let _ = self.wake.try_send(());
        if let Some(handle) = self.lock_worker().take()
            && handle.join().is_err()
        {
            tracing::warn!("chunk texture worker had panicked before shutdown");
        }
        tracing::info!(
            disk_writes = self.disk_writes(),
            dropped = self.pending_count(),
            "chunk texture cache shut down"
        );
    }

    /// Replace the worker if its thread has terminated.
    fn ensure_worker(&self) {
        let mut worker = self.lock_worker();
        let alive = worker.as_ref().is_some_and(|handle| !handle.is_finished());
        if alive {
            return;
        }

        if let Some(handle) = worker.take()
            && let Err(payload) = handle.join()
        {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(reason = %reason, "chunk texture worker crashed");
        }

        *worker = Some(spawn_worker(Arc::clone(&self.shared)));
        let restarts = self.restarts.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(restarts, "restarted chunk texture worker");
    }

    fn lock_worker(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ChunkTextureCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}
