//! Sample-rate conversion with a rubato `FastFixedIn` session.
//!
//! Devices deliver whatever rate the OS picked (48 kHz is typical); the
//! engine's gate, ring, and recognizer all work at 16 kHz mono. Conversion
//! happens on the control-loop thread where allocation is allowed. Equal
//! rates skip rubato entirely.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::error;

use crate::error::{HearthError, Result};

/// Converts mono f32 audio from the capture rate to the engine rate.
pub struct RateConverter {
    /// `None` when capture rate == target rate (passthrough).
    resampler: Option<FastFixedIn<f32>>,
    /// Carries partial input between calls; rubato wants full blocks.
    pending: Vec<f32>,
    block: usize,
    /// Pre-allocated `[1][output_frames_max]` scratch for rubato.
    output: Vec<Vec<f32>>,
}

impl RateConverter {
    /// # Errors
    /// `HearthError::AudioStream` if rubato rejects the ratio/block setup.
    pub fn new(capture_rate: u32, target_rate: u32, block: usize) -> Result<Self> {
        if capture_rate == target_rate {
            return Ok(Self {
                resampler: None,
                pending: Vec::new(),
                block,
                output: Vec::new(),
            });
        }

        let ratio = target_rate as f64 / capture_rate as f64;
        let resampler = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, block, 1)
            .map_err(|e| HearthError::AudioStream(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        tracing::info!(capture_rate, target_rate, block, "resampling enabled");

        Ok(Self {
            resampler: Some(resampler),
            pending: Vec::new(),
            block,
            output: vec![vec![0f32; max_out]],
        })
    }

    /// Feed capture-rate samples, get target-rate samples back (possibly
    /// empty while a partial block accumulates).
    pub fn convert(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(ref mut resampler) = self.resampler else {
            return samples.to_vec();
        };

        self.pending.extend_from_slice(samples);
        let mut out = Vec::new();

        while self.pending.len() >= self.block {
            let input = &self.pending[..self.block];
            match resampler.process_into_buffer(&[input], &mut self.output, None) {
                Ok((_consumed, produced)) => out.extend_from_slice(&self.output[0][..produced]),
                Err(e) => error!("resampler process error: {e}"),
            }
            self.pending.drain(..self.block);
        }

        out
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_rates_pass_through_unchanged() {
        let mut rc = RateConverter::new(16_000, 16_000, 1_024).unwrap();
        assert!(rc.is_passthrough());
        let samples: Vec<f32> = (0..640).map(|i| i as f32 * 0.001).collect();
        assert_eq!(rc.convert(&samples), samples);
    }

    #[test]
    fn downsampling_48k_produces_about_a_third() {
        let mut rc = RateConverter::new(48_000, 16_000, 960).unwrap();
        assert!(!rc.is_passthrough());
        let out = rc.convert(&vec![0.0f32; 960]);
        assert!(!out.is_empty());
        assert!(
            (out.len() as isize - 320).unsigned_abs() <= 10,
            "got {} samples, expected ≈320",
            out.len()
        );
    }

    #[test]
    fn partial_blocks_accumulate_across_calls() {
        let mut rc = RateConverter::new(48_000, 16_000, 960).unwrap();
        assert!(rc.convert(&vec![0.0f32; 500]).is_empty());
        assert!(!rc.convert(&vec![0.0f32; 500]).is_empty());
    }
}
