//! The background worker loop and the state it shares with the cache.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use atoll_terrain::ChunkCoord;
use crossbeam_channel::Receiver;
use image::{ImageFormat, RgbaImage};

use crate::chunk::Chunk;
use crate::error::CacheError;
use crate::renderer::ChunkRenderer;
use crate::request::RequestQueue;

/// Timings of the background worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheSettings {
    /// Requests older than this are dropped by the sweep.
    pub stale_after: Duration,
    /// Minimum time between sweeps.
    pub sweep_interval: Duration,
    /// How long an idle worker waits for a wake-up before looking again.
    pub idle_sleep: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(10),
            idle_sleep: Duration::from_millis(50),
        }
    }
}

/// Path of a chunk's cached texture.
pub fn texture_path(dir: &Path, coord: ChunkCoord) -> PathBuf {
    dir.join(format!("background_{}_{}.png", coord.x, coord.y))
}

/// State owned jointly by the cache and its worker.
pub(crate) struct WorkerShared {
    pub(crate) dir: PathBuf,
    pub(crate) queue: RequestQueue,
    pub(crate) renderer: Arc<dyn ChunkRenderer>,
    pub(crate) settings: CacheSettings,
    pub(crate) disk_writes: AtomicU64,
    pub(crate) temp_seq: AtomicU64,
    pub(crate) busy: AtomicBool,
    pub(crate) shutdown: AtomicBool,
    pub(crate) wake: Receiver<()>,
}

impl WorkerShared {
    /// Render and save one chunk unless it is already on disk.
    ///
    /// Returns `true` if a file was written.
    pub(crate) fn process(&self, chunk: &Chunk) -> Result<bool, CacheError> {
        if chunk.is_saved_to_disk() {
            return Ok(false);
        }
        let path = texture_path(&self.dir, chunk.coord());
        if path.exists() {
            chunk.mark_saved();
            return Ok(false);
        }

        let start = Instant::now();
        let image = self.renderer.render_chunk(chunk)?;
        self.save(chunk, &image)?;
        tracing::debug!(
            cell_x = chunk.coord().x,
            cell_y = chunk.coord().y,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "chunk texture cached"
        );
        Ok(true)
    }

    /// Write a rendered texture and mark the chunk saved.
    ///
    /// The PNG is written to a temporary file and renamed into place, so a
    /// reader sees either no file or a complete one.
    pub(crate) fn save(&self, chunk: &Chunk, image: &RgbaImage) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CacheError::io(&self.dir, e))?;
        let mut encoded = Cursor::new(Vec::new());
        image.write_to(&mut encoded, ImageFormat::Png)?;

        let path = texture_path(&self.dir, chunk.coord());
        // Unique per write; the worker and a caller may save the same chunk.
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        let temp = path.with_extension(format!("png.{seq}.tmp"));
        write_then_rename(&temp, &path, encoded.get_ref())?;

        chunk.mark_saved();
        self.disk_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn write_then_rename(temp: &Path, path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    if let Err(e) = std::fs::write(temp, bytes) {
        let _ = std::fs::remove_file(temp);
        return Err(CacheError::io(temp, e));
    }
    if let Err(e) = std::fs::rename(temp, path) {
        let _ = std::fs::remove_file(temp);
        return Err(CacheError::io(path, e));
    }
    Ok(())
}

/// Start a worker thread over `shared`.
pub(crate) fn spawn_worker(shared: Arc<WorkerShared>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("chunk-texture-worker".into())
        .spawn(move || run(&shared))
        .expect("Failed to spawn chunk texture worker thread")
}

/// Worker loop: sweep stale requests now and then, serve the newest request,
/// wait for a wake-up when there is nothing to do.
///
/// Errors from a single request are logged and the loop carries on. A panic
/// ends the thread; the cache notices and starts a new one.
fn run(shared: &WorkerShared) {
    tracing::debug!("chunk texture worker started");
    let mut last_sweep = Instant::now();
    let mut batch_len = 0usize;

    while !shared.shutdown.load(Ordering::Acquire) {
        if last_sweep.elapsed() >= shared.settings.sweep_interval {
            let now = Instant::now();
            let dropped = shared.queue.sweep_stale(now, shared.settings.stale_after);
            if dropped > 0 {
                tracing::debug!(dropped, "dropped stale texture requests");
            }
            last_sweep = now;
        }

        // Raised before taking so an observer never sees an empty queue
        // and an idle worker while a request is in hand.
        shared.busy.store(true, Ordering::Release);
        match shared.queue.take_newest() {
            Some(request) => {
                let coord = request.chunk.coord();
                match shared.process(&request.chunk) {
                    Ok(true) => batch_len += 1,
                    Ok(false) => {}
                    Err(e) => tracing::warn!(
                        cell_x = coord.x,
                        cell_y = coord.y,
                        error = %e,
                        "chunk texture generation failed"
                    ),
                }
            }
            None => {
                shared.busy.store(false, Ordering::Release);
                if batch_len > 0 {
                    tracing::debug!(chunks = batch_len, "texture batch finished");
                    shared.renderer.batch_finished();
                    batch_len = 0;
                }
                let _ = shared.wake.recv_timeout(shared.settings.idle_sleep);
            }
        }
    }
    tracing::debug!("chunk texture worker stopped");
}
