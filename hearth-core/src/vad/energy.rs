//! RMS energy gate.
//!
//! A chunk is voiced when the root-mean-square of its signed samples
//! exceeds a fixed threshold. No hangover: the session's phrase-end rule
//! wants raw consecutive-silence counts, so smoothing here would stretch
//! every command tail by the hangover length.

use super::{GateDecision, SpeechGate};
use crate::buffering::chunk::AudioChunk;

/// Energy-threshold gate over 16-bit PCM.
#[derive(Debug, Clone)]
pub struct EnergyGate {
    /// RMS threshold in raw i16 units. 1 000 suits a typical close mic;
    /// raise it in noisy rooms.
    threshold: f64,
    silence_run: u32,
}

impl EnergyGate {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            silence_run: 0,
        }
    }

    /// Root-mean-square of a signed sample slice. Empty input is 0.
    pub fn rms(samples: &[i16]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = samples.iter().map(|&s| {
            let s = s as f64;
            s * s
        }).sum();
        (sum_sq / samples.len() as f64).sqrt()
    }
}

impl SpeechGate for EnergyGate {
    fn classify(&mut self, chunk: &AudioChunk) -> GateDecision {
        if Self::rms(&chunk.samples) > self.threshold {
            self.silence_run = 0;
            GateDecision::Voiced
        } else {
            self.silence_run = self.silence_run.saturating_add(1);
            GateDecision::Silent
        }
    }

    fn silence_run(&self) -> u32 {
        self.silence_run
    }

    fn reset(&mut self) {
        self.silence_run = 0;
    }
}
