//! Bounded FIFO of recent audio chunks.
//!
//! The only shared mutable structure in a capture session. The control loop
//! appends; probe and finalize paths take snapshots. Every operation holds
//! the lock for a bounded copy, so an append during a snapshot never tears
//! the returned chunks and a snapshot never blocks the producer for longer
//! than one clone of the window.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::chunk::AudioChunk;

struct RingInner {
    chunks: VecDeque<AudioChunk>,
    /// Bumped on every clear. Snapshots are stamped with the epoch they were
    /// taken in; a probe result whose epoch no longer matches is stale.
    epoch: u64,
}

/// Fixed-capacity rolling window of [`AudioChunk`]s. Oldest chunk is evicted
/// on overflow append; cleared only when a command is finalized or the
/// session is abandoned.
pub struct ChunkRing {
    inner: Mutex<RingInner>,
    capacity: usize,
}

impl ChunkRing {
    /// Ring sized for `capacity` chunks. Zero is pinned to one so an append
    /// is always observable.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RingInner {
                chunks: VecDeque::with_capacity(capacity.max(1)),
                epoch: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Append a chunk, evicting the oldest when at capacity.
    pub fn append(&self, chunk: AudioChunk) {
        let mut inner = self.inner.lock();
        if inner.chunks.len() == self.capacity {
            inner.chunks.pop_front();
        }
        inner.chunks.push_back(chunk);
    }

    /// Copy of the last `last_k` chunks in arrival order (all of them when
    /// `last_k` exceeds the current length), plus the epoch the copy was
    /// taken in.
    pub fn snapshot(&self, last_k: usize) -> (Vec<AudioChunk>, u64) {
        let inner = self.inner.lock();
        let len = inner.chunks.len();
        let skip = len.saturating_sub(last_k);
        let copy = inner.chunks.iter().skip(skip).cloned().collect();
        (copy, inner.epoch)
    }

    /// Copy of the entire window plus its epoch.
    pub fn snapshot_all(&self) -> (Vec<AudioChunk>, u64) {
        self.snapshot(usize::MAX)
    }

    /// Empty the ring and advance the epoch, invalidating any snapshot
    /// taken before this call.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.chunks.clear();
        inner.epoch += 1;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().chunks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current epoch (advanced by [`ChunkRing::clear`]).
    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn marker_chunk(value: i16) -> AudioChunk {
        AudioChunk::new(vec![value; 4], 16_000)
    }

    #[test]
    fn append_evicts_oldest_beyond_capacity() {
        let ring = ChunkRing::new(3);
        for v in 0..5 {
            ring.append(marker_chunk(v));
        }
        let (chunks, _) = ring.snapshot_all();
        let markers: Vec<i16> = chunks.iter().map(|c| c.samples[0]).collect();
        assert_eq!(markers, vec![2, 3, 4]);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn snapshot_last_k_returns_tail_in_order() {
        let ring = ChunkRing::new(8);
        for v in 0..6 {
            ring.append(marker_chunk(v));
        }
        let (chunks, _) = ring.snapshot(2);
        let markers: Vec<i16> = chunks.iter().map(|c| c.samples[0]).collect();
        assert_eq!(markers, vec![4, 5]);

        // k larger than length returns everything
        let (all, _) = ring.snapshot(100);
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn clear_empties_and_bumps_epoch() {
        let ring = ChunkRing::new(4);
        ring.append(marker_chunk(1));
        let (_, epoch_before) = ring.snapshot_all();
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.epoch(), epoch_before + 1);
    }

    #[test]
    fn concurrent_appends_never_tear_snapshots() {
        let ring = Arc::new(ChunkRing::new(16));
        let writer = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                for v in 0..2_000i16 {
                    ring.append(AudioChunk::new(vec![v; 32], 16_000));
                }
            })
        };

        for _ in 0..500 {
            let (chunks, _) = ring.snapshot_all();
            assert!(chunks.len() <= 16);
            for chunk in &chunks {
                // Every chunk is whole: all 32 samples carry the same marker.
                assert!(chunk.samples.iter().all(|&s| s == chunk.samples[0]));
            }
            // Arrival order is preserved.
            for pair in chunks.windows(2) {
                assert!(pair[0].samples[0] < pair[1].samples[0]);
            }
        }

        writer.join().unwrap();
    }
}
