//! Background worker behaviour: caching, ordering, eviction and restarts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use atoll_terrain::{ChunkCoord, ChunkGeometry};
use atoll_texcache::{CacheError, CacheSettings, Chunk, ChunkRenderer, ChunkTextureCache};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use image::{Rgba, RgbaImage};

fn geometry() -> ChunkGeometry {
    ChunkGeometry::new(512, 128, 64, 1).unwrap()
}

fn chunk(x: u32) -> Arc<Chunk> {
    let coord = ChunkCoord::new(x, 0);
    Arc::new(Chunk::new(coord, geometry().bounds(coord)))
}

fn fast_settings() -> CacheSettings {
    CacheSettings {
        stale_after: Duration::from_secs(30),
        sweep_interval: Duration::from_millis(10),
        idle_sleep: Duration::from_millis(5),
    }
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

/// Records render order. Optionally blocks the first render until released.
struct GatedRenderer {
    order: Mutex<Vec<ChunkCoord>>,
    started: Sender<ChunkCoord>,
    release: Option<Receiver<()>>,
    gate_open: AtomicBool,
}

impl GatedRenderer {
    fn new(gated: bool) -> (Arc<Self>, Receiver<ChunkCoord>, Option<Sender<()>>) {
        let (started, started_rx) = unbounded();
        let (release_tx, release_rx) = bounded(1);
        let renderer = Arc::new(Self {
            order: Mutex::new(Vec::new()),
            started,
            release: gated.then_some(release_rx),
            gate_open: AtomicBool::new(!gated),
        });
        (renderer, started_rx, gated.then_some(release_tx))
    }

    fn order(&self) -> Vec<ChunkCoord> {
        self.order.lock().unwrap().clone()
    }
}

impl ChunkRenderer for GatedRenderer {
    fn render_chunk(&self, chunk: &Chunk) -> Result<RgbaImage, CacheError> {
        let _ = self.started.send(chunk.coord());
        if !self.gate_open.swap(true, Ordering::AcqRel)
            && let Some(release) = &self.release
        {
            let _ = release.recv_timeout(Duration::from_secs(10));
        }
        self.order.lock().unwrap().push(chunk.coord());
        Ok(RgbaImage::from_pixel(4, 4, Rgba([chunk.coord().x as u8, 0, 0, 255])))
    }
}

#[test]
fn test_request_writes_texture_once() {
    let dir = tempfile::tempdir().unwrap();
    let (renderer, _started, _) = GatedRenderer::new(false);
    let cache = ChunkTextureCache::new(dir.path(), renderer.clone(), fast_settings());

    let c = chunk(0);
    cache.request(Arc::clone(&c));
    assert!(wait_until(Duration::from_secs(5), || c.is_saved_to_disk()));
    assert!(cache.texture_path(&c).exists());
    assert_eq!(cache.disk_writes(), 1);

    // Saved chunks are no-ops, even when requested repeatedly.
    cache.request(Arc::clone(&c));
    cache.request(Arc::clone(&c));
    assert!(wait_until(Duration::from_secs(5), || cache.pending_count() == 0));
    assert_eq!(cache.disk_writes(), 1);
    assert_eq!(renderer.order().len(), 1);
}

#[test]
fn test_existing_file_is_not_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    let (renderer, _started, _) = GatedRenderer::new(false);
    let cache = ChunkTextureCache::new(dir.path(), renderer.clone(), fast_settings());

    let first = chunk(1);
    cache.request(Arc::clone(&first));
    assert!(wait_until(Duration::from_secs(5), || first.is_saved_to_disk()));

    // A fresh handle for the same chunk finds the file on disk.
    let again = chunk(1);
    cache.request(Arc::clone(&again));
    assert!(wait_until(Duration::from_secs(5), || again.is_saved_to_disk()));
    assert_eq!(cache.disk_writes(), 1);
}

#[test]
fn test_newest_request_served_first() {
    let dir = tempfile::tempdir().unwrap();
    let (renderer, started, release) = GatedRenderer::new(true);
    let cache = ChunkTextureCache::new(dir.path(), renderer.clone(), fast_settings());

    cache.request(chunk(0));
    assert_eq!(
        started.recv_timeout(Duration::from_secs(5)).unwrap(),
        ChunkCoord::new(0, 0)
    );

    // Queued while the worker is busy with chunk 0.
    cache.request(chunk(1));
    std::thread::sleep(Duration::from_millis(2));
    cache.request(chunk(2));
    std::thread::sleep(Duration::from_millis(2));
    cache.request(chunk(3));

    release.unwrap().send(()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || cache.disk_writes() == 4));
    let xs: Vec<u32> = renderer.order().iter().map(|c| c.x).collect();
    assert_eq!(xs, vec![0, 3, 2, 1]);
}

#[test]
fn test_stale_requests_are_evicted() {
    let dir = tempfile::tempdir().unwrap();
    let (renderer, started, release) = GatedRenderer::new(true);
    let settings = CacheSettings {
        stale_after: Duration::from_millis(50),
        ..fast_settings()
    };
    let cache = ChunkTextureCache::new(dir.path(), renderer.clone(), settings);

    cache.request(chunk(0));
    started.recv_timeout(Duration::from_secs(5)).unwrap();
    cache.request(chunk(4));
    cache.request(chunk(5));
    assert_eq!(cache.pending_count(), 2);

    // Let the queued requests age past the limit before the worker is free.
    std::thread::sleep(Duration::from_millis(150));
    release.unwrap().send(()).unwrap();

    assert!(wait_until(Duration::from_secs(5), || cache.pending_count() == 0));
    assert!(wait_until(Duration::from_secs(5), || cache.disk_writes() == 1));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(cache.disk_writes(), 1);
    assert_eq!(renderer.order(), vec![ChunkCoord::new(0, 0)]);
}

/// Panics on the first chunk it sees, then renders normally.
struct CrashOnceRenderer {
    crashed: AtomicBool,
}

impl ChunkRenderer for CrashOnceRenderer {
    fn render_chunk(&self, chunk: &Chunk) -> Result<RgbaImage, CacheError> {
        if !self.crashed.swap(true, Ordering::AcqRel) {
            panic!("renderer blew up on chunk {}", chunk.coord());
        }
        Ok(RgbaImage::new(2, 2))
    }
}

#[test]
fn test_dead_worker_is_restarted() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = Arc::new(CrashOnceRenderer {
        crashed: AtomicBool::new(false),
    });
    let cache = ChunkTextureCache::new(dir.path(), renderer, fast_settings());

    cache.request(chunk(0));
    assert!(wait_until(Duration::from_secs(5), || !cache.is_worker_running()));
    assert_eq!(cache.worker_restarts(), 0);

    let c = chunk(1);
    cache.request(Arc::clone(&c));
    assert_eq!(cache.worker_restarts(), 1);
    assert!(cache.is_worker_running());
    assert!(wait_until(Duration::from_secs(5), || c.is_saved_to_disk()));
}

#[test]
fn test_polling_restarts_worker_with_queued_requests() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = Arc::new(CrashOnceRenderer {
        crashed: AtomicBool::new(false),
    });
    let cache = ChunkTextureCache::new(dir.path(), renderer, fast_settings());

    let chunks: Vec<_> = (0..3).map(chunk).collect();
    for c in &chunks {
        cache.request(Arc::clone(c));
    }

    // No further requests: polling alone must get the rest done.
    assert!(wait_until(Duration::from_secs(5), || cache.is_idle()));
    assert!(cache.worker_restarts() >= 1);
    assert_eq!(cache.pending_count(), 0);
    let saved = chunks.iter().filter(|c| c.is_saved_to_disk()).count();
    assert_eq!(saved, 2);
    assert_eq!(cache.disk_writes(), 2);
}

#[test]
fn test_stopped_cache_is_idle() {
    let dir = tempfile::tempdir().unwrap();
    let (renderer, _started, _) = GatedRenderer::new(false);
    let cache = ChunkTextureCache::new(dir.path(), renderer, fast_settings());
    cache.shutdown();
    assert!(cache.is_idle());
    assert!(!cache.is_worker_running());
}

/// Always fails.
struct FailingRenderer;

impl ChunkRenderer for FailingRenderer {
    fn render_chunk(&self, chunk: &Chunk) -> Result<RgbaImage, CacheError> {
        Err(CacheError::Render {
            coord: chunk.coord().to_string(),
            reason: "no terrain".to_string(),
        })
    }
}

#[test]
fn test_render_errors_do_not_stop_worker() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ChunkTextureCache::new(dir.path(), Arc::new(FailingRenderer), fast_settings());

    for x in 0..3 {
        cache.request(chunk(x));
    }
    assert!(wait_until(Duration::from_secs(5), || cache.pending_count() == 0));
    assert!(cache.is_worker_running());
    assert_eq!(cache.worker_restarts(), 0);
    assert_eq!(cache.disk_writes(), 0);
}
