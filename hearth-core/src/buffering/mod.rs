//! Audio buffering: the lock-free sample ring fed by the capture callback,
//! and the bounded chunk ring the session probes and finalizes from.
//!
//! Two distinct structures on purpose. The SPSC sample ring decouples the
//! real-time callback from the control loop; `ChunkRing` is the rolling
//! window of recent [`AudioChunk`]s that wake probing reads and finalize
//! snapshots.

pub mod chunk;
pub mod ring;

use ringbuf::{traits::Split, HeapRb};

pub use chunk::{AudioChunk, CommandAudio};
pub use ring::ChunkRing;
pub use ringbuf::traits::{Consumer, Producer};

/// Producer half of the sample ring — held by the audio callback thread.
pub type SampleProducer = ringbuf::HeapProd<f32>;

/// Consumer half of the sample ring — held by the control loop.
pub type SampleConsumer = ringbuf::HeapCons<f32>;

/// Sample ring capacity: 2^19 = 524 288 f32 samples ≈ 10.9 s at 48 kHz.
/// Enough slack for the control loop to fall behind during a slow iteration
/// without the callback dropping frames.
pub const SAMPLE_RING_CAPACITY: usize = 1 << 19;

/// Create a matched producer/consumer pair backed by a heap-allocated ring.
pub fn create_sample_ring() -> (SampleProducer, SampleConsumer) {
    HeapRb::<f32>::new(SAMPLE_RING_CAPACITY).split()
}
