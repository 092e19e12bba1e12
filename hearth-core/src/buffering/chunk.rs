//! Typed audio chunk — the unit the gate classifies and the ring stores.

/// A fixed-duration window of mono PCM samples at a known sample rate.
///
/// Built once per control-loop window (never on the capture callback) and
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Signed 16-bit PCM samples.
    pub samples: Vec<i16>,
    /// Sample rate in Hz (16 000 for this engine).
    pub sample_rate: u32,
    /// Channel count. Always 1 after the capture downmix.
    pub channels: u16,
}

impl AudioChunk {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    /// Duration of this chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A finished command utterance: the ring contents at finalize time,
/// flattened into one contiguous sample sequence.
#[derive(Debug, Clone)]
pub struct CommandAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl CommandAudio {
    /// Concatenate chunks in arrival order. The first chunk's rate wins;
    /// all chunks in one session share it.
    pub fn from_chunks(chunks: &[AudioChunk], fallback_rate: u32) -> Self {
        let sample_rate = chunks.first().map_or(fallback_rate, |c| c.sample_rate);
        let total: usize = chunks.iter().map(|c| c.samples.len()).sum();
        let mut samples = Vec::with_capacity(total);
        for chunk in chunks {
            samples.extend_from_slice(&chunk.samples);
        }
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_audio_concatenates_in_order() {
        let chunks = vec![
            AudioChunk::new(vec![1, 2], 16_000),
            AudioChunk::new(vec![3], 16_000),
            AudioChunk::new(vec![4, 5], 16_000),
        ];
        let audio = CommandAudio::from_chunks(&chunks, 16_000);
        assert_eq!(audio.samples, vec![1, 2, 3, 4, 5]);
        assert_eq!(audio.sample_rate, 16_000);
    }

    #[test]
    fn empty_snapshot_uses_fallback_rate() {
        let audio = CommandAudio::from_chunks(&[], 16_000);
        assert!(audio.is_empty());
        assert_eq!(audio.sample_rate, 16_000);
    }

    #[test]
    fn chunk_duration() {
        let chunk = AudioChunk::new(vec![0; 1_024], 16_000);
        assert!((chunk.duration_secs() - 0.064).abs() < 1e-9);
    }
}
