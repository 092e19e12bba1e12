//! Wake-phrase matching and probe bookkeeping.
//!
//! A probe is one speculative transcription of the trailing ring window,
//! scanned for the wake phrase. Matching itself is trivial; the machinery
//! here exists to keep probes honest under concurrency: at most one probe
//! in flight per session, and results stamped with a generation + ring
//! epoch so a slow probe resolving late can never flip state off a window
//! that no longer exists.

use tracing::debug;

use crate::transcribe::TranscribeOutcome;

/// A configured wake phrase and its spoken variants.
#[derive(Debug, Clone)]
pub struct WakePhrase {
    primary: String,
    variants: Vec<String>,
}

impl WakePhrase {
    /// Build from the primary phrase. Variants cover the common framings:
    /// the phrase itself, "hey <phrase>", "<phrase> please".
    pub fn new(phrase: &str) -> Self {
        let primary = phrase.trim().to_lowercase();
        let variants = vec![
            primary.clone(),
            format!("hey {primary}"),
            format!("{primary} please"),
        ];
        Self { primary, variants }
    }

    /// The bare phrase, lowercased.
    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Case-insensitive substring scan. Returns the matched variant.
    pub fn find_in(&self, transcript: &str) -> Option<&str> {
        let lowered = transcript.to_lowercase();
        self.variants
            .iter()
            .find(|v| lowered.contains(v.as_str()))
            .map(String::as_str)
    }

    /// The command the user actually spoke: the transcript from the last
    /// occurrence of the primary phrase onward, without pre-roll chatter
    /// the ring happened to retain. Falls back to the whole transcript when
    /// the phrase is absent (the finalize window can clip the wake word).
    /// Returned lowercased — matching and interpretation are both
    /// case-insensitive.
    pub fn command_text(&self, transcript: &str) -> String {
        let lowered = transcript.to_lowercase();
        match lowered.rfind(&self.primary) {
            Some(idx) => lowered[idx..].to_string(),
            None => lowered,
        }
    }
}

/// What a resolved probe reported back to the control loop.
#[derive(Debug)]
pub struct ProbeReport {
    /// Generation assigned when the probe was issued.
    pub generation: u64,
    /// Ring epoch of the snapshot the probe transcribed.
    pub epoch: u64,
    /// Transcription outcome; service errors arrive as `None` (fail-open,
    /// already logged at the call site).
    pub outcome: Option<TranscribeOutcome>,
}

/// Single-flight probe slot.
///
/// Owned by the control loop. `try_begin` hands out a generation only when
/// no probe is outstanding; `accept` decides whether a report may drive a
/// state transition.
#[derive(Debug, Default)]
pub struct ProbeSlot {
    next_generation: u64,
    in_flight: Option<u64>,
}

impl ProbeSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot. `None` while a probe is still outstanding.
    pub fn try_begin(&mut self) -> Option<u64> {
        if self.in_flight.is_some() {
            return None;
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        self.in_flight = Some(generation);
        Some(generation)
    }

    /// Resolve a report. Frees the slot if the report is the outstanding
    /// probe; returns whether the report is current against `ring_epoch`.
    pub fn accept(&mut self, report: &ProbeReport, ring_epoch: u64) -> bool {
        match self.in_flight {
            Some(generation) if generation == report.generation => {
                self.in_flight = None;
                if report.epoch != ring_epoch {
                    debug!(
                        generation = report.generation,
                        probe_epoch = report.epoch,
                        ring_epoch,
                        "probe window epoch out of date — discarding"
                    );
                    return false;
                }
                true
            }
            _ => {
                // A stale generation: a newer probe owns the slot (or the
                // slot was abandoned on stop). Never frees, never applies.
                debug!(generation = report.generation, "stale probe report discarded");
                false
            }
        }
    }

    /// Drop any outstanding claim (session stop).
    pub fn abandon(&mut self) {
        self.in_flight = None;
        self.next_generation += 1;
    }

    pub fn is_free(&self) -> bool {
        self.in_flight.is_none()
    }
}

/// Counts appended chunks between probes.
#[derive(Debug)]
pub struct ProbeCadence {
    interval_chunks: u32,
    since_last: u32,
}

impl ProbeCadence {
    pub fn new(interval_chunks: u32) -> Self {
        Self {
            interval_chunks: interval_chunks.max(1),
            since_last: 0,
        }
    }

    /// Record one appended chunk; true when a probe is due.
    pub fn tick(&mut self) -> bool {
        self.since_last += 1;
        if self.since_last >= self.interval_chunks {
            self.since_last = 0;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.since_last = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_cover_common_framings() {
        let wake = WakePhrase::new("Computer");
        assert_eq!(wake.primary(), "computer");
        assert!(wake.find_in("hey computer turn it off").is_some());
        assert!(wake.find_in("COMPUTER PLEASE").is_some());
        assert!(wake.find_in("complete the order").is_none());
    }

    #[test]
    fn command_text_anchors_on_last_occurrence() {
        let wake = WakePhrase::new("computer");
        let text = "something computer noise computer turn on the light";
        assert_eq!(wake.command_text(text), "computer turn on the light");
    }

    #[test]
    fn command_text_falls_back_to_full_transcript() {
        let wake = WakePhrase::new("computer");
        assert_eq!(wake.command_text("turn on the light"), "turn on the light");
    }

    #[test]
    fn slot_is_single_flight() {
        let mut slot = ProbeSlot::new();
        let first = slot.try_begin().expect("slot starts free");
        assert!(slot.try_begin().is_none(), "second claim must wait");

        let report = ProbeReport {
            generation: first,
            epoch: 0,
            outcome: None,
        };
        assert!(slot.accept(&report, 0));
        assert!(slot.try_begin().is_some(), "resolved slot is free again");
    }

    #[test]
    fn epoch_mismatch_frees_slot_but_rejects_report() {
        let mut slot = ProbeSlot::new();
        let generation = slot.try_begin().unwrap();
        let report = ProbeReport {
            generation,
            epoch: 0,
            outcome: None,
        };
        // Ring was cleared (epoch 1) while the probe ran.
        assert!(!slot.accept(&report, 1));
        assert!(slot.is_free());
    }

    #[test]
    fn abandoned_slot_rejects_late_reports() {
        let mut slot = ProbeSlot::new();
        let generation = slot.try_begin().unwrap();
        slot.abandon();
        let report = ProbeReport {
            generation,
            epoch: 0,
            outcome: None,
        };
        assert!(!slot.accept(&report, 0));
    }

    #[test]
    fn cadence_fires_every_interval() {
        let mut cadence = ProbeCadence::new(3);
        assert!(!cadence.tick());
        assert!(!cadence.tick());
        assert!(cadence.tick());
        assert!(!cadence.tick());
    }
}
