//! Pending texture generation requests.
//!
//! Requests are keyed by arrival order, not by chunk, so the same chunk may
//! be queued several times. The consumer always takes the newest entry;
//! older duplicates are either aged out or processed later as no-ops.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::chunk::Chunk;

/// A chunk awaiting texture generation.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    /// The chunk to render.
    pub chunk: Arc<Chunk>,
    /// When the request was made.
    pub requested_at: Instant,
}

/// Concurrent queue of requests. Any thread may push; one consumer takes.
#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: DashMap<u64, GenerationRequest>,
    next_seq: AtomicU64,
}

impl RequestQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request stamped now. Returns its sequence number.
    pub fn push(&self, chunk: Arc<Chunk>) -> u64 {
        self.push_at(chunk, Instant::now())
    }

    /// Queue a request with an explicit timestamp.
    pub fn push_at(&self, chunk: Arc<Chunk>, requested_at: Instant) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            seq,
            GenerationRequest {
                chunk,
                requested_at,
            },
        );
        seq
    }

    /// Drop every request older than `max_age` at `now`. Returns how many were dropped.
    pub fn sweep_stale(&self, now: Instant, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, r| now.saturating_duration_since(r.requested_at) <= max_age);
        before.saturating_sub(self.entries.len())
    }

    /// Remove and return the most recent request.
    ///
    /// Ties on timestamp go to the later arrival.
    pub fn take_newest(&self) -> Option<GenerationRequest> {
        loop {
            let key = self
                .entries
                .iter()
                .max_by_key(|e| (e.value().requested_at, *e.key()))
                .map(|e| *e.key())?;
            // Another consumer may have raced us to it.
            if let Some((_, request)) = self.entries.remove(&key) {
                return Some(request);
            }
        }
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use atoll_terrain::{ChunkCoord, ChunkGeometry};

    use super::*;

    fn chunk(x: u32) -> Arc<Chunk> {
        let geometry = ChunkGeometry::new(256, 64, 64, 1).unwrap();
        let coord = ChunkCoord::new(x, 0);
        Arc::new(Chunk::new(coord, geometry.bounds(coord)))
    }

    #[test]
    fn test_take_newest_first() {
        let queue = RequestQueue::new();
        let t0 = Instant::now();
        queue.push_at(chunk(0), t0);
        queue.push_at(chunk(1), t0 + Duration::from_millis(20));
        queue.push_at(chunk(2), t0 + Duration::from_millis(10));

        let order: Vec<u32> = std::iter::from_fn(|| queue.take_newest())
            .map(|r| r.chunk.coord().x)
            .collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_duplicates_coexist() {
        let queue = RequestQueue::new();
        let c = chunk(3);
        let t0 = Instant::now();
        queue.push_at(Arc::clone(&c), t0);
        queue.push_at(Arc::clone(&c), t0);
        assert_eq!(queue.len(), 2);
        assert!(Arc::ptr_eq(&queue.take_newest().unwrap().chunk, &c));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_sweep_drops_only_stale() {
        let queue = RequestQueue::new();
        let now = Instant::now() + Duration::from_secs(60);
        queue.push_at(chunk(0), now - Duration::from_secs(45));
        queue.push_at(chunk(1), now - Duration::from_secs(31));
        queue.push_at(chunk(2), now - Duration::from_secs(5));

        let dropped = queue.sweep_stale(now, Duration::from_secs(30));
        assert_eq!(dropped, 2);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.take_newest().unwrap().chunk.coord().x, 2);
    }

    #[test]
    fn test_sweep_on_empty_queue() {
        let queue = RequestQueue::new();
        assert_eq!(queue.sweep_stale(Instant::now(), Duration::ZERO), 0);
    }
}
