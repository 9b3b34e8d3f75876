//! Capture framing and batching
//!
//! Accumulates converted capture segments and emits one frame per threshold
//! of samples. While the duplex gate is engaged, captured audio is discarded
//! rather than queued: replaying a backlog of the user's speech after the
//! assistant finishes would both unbound memory and feed the assistant stale
//! audio from its own turn.

use crate::session::gate::DuplexGate;
use crate::wire::{OutboundFrame, SOURCE_MICROPHONE};

/// Accumulates capture segments into threshold-sized outbound frames
pub struct FrameBatcher {
    pending: Vec<i16>,
    threshold: usize,
    source_type: u16,
    gate: DuplexGate,
}

impl FrameBatcher {
    /// Create a batcher emitting frames of `threshold` samples
    #[must_use]
    pub fn new(threshold: usize, gate: DuplexGate) -> Self {
        Self {
            pending: Vec::with_capacity(threshold.max(1)),
            threshold: threshold.max(1),
            source_type: SOURCE_MICROPHONE,
            gate,
        }
    }

    /// Feed one capture segment; returns any frames now ready to send
    ///
    /// The frame timestamp is captured at assembly time, not per sample.
    pub fn on_segment(&mut self, segment: Vec<i16>) -> Vec<OutboundFrame> {
        if self.gate.is_speaking() {
            // Assistant is talking: drop the segment and anything pending
            if !self.pending.is_empty() {
                tracing::trace!(
                    discarded = self.pending.len() + segment.len(),
                    "gate engaged, discarding captured audio"
                );
                self.pending.clear();
            }
            return Vec::new();
        }

        self.pending.extend_from_slice(&segment);

        let mut frames = Vec::new();
        while self.pending.len() >= self.threshold {
            let payload: Vec<i16> = self.pending.drain(..self.threshold).collect();
            frames.push(OutboundFrame::now(self.source_type, payload));
        }
        frames
    }

    /// Emit whatever is pending as a short final frame
    ///
    /// Used on capture teardown. Returns nothing while gated or empty.
    pub fn flush(&mut self) -> Option<OutboundFrame> {
        if self.gate.is_speaking() {
            self.pending.clear();
            return None;
        }
        if self.pending.is_empty() {
            return None;
        }
        let payload = std::mem::take(&mut self.pending);
        Some(OutboundFrame::now(self.source_type, payload))
    }

    /// Samples accumulated but not yet framed
    #[must_use]
    pub fn pending_samples(&self) -> usize {
        self.pending.len()
    }

    /// Configured frame threshold
    #[must_use]
    pub const fn threshold(&self) -> usize {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: usize = 240;

    fn batcher() -> (FrameBatcher, DuplexGate) {
        let gate = DuplexGate::new();
        (FrameBatcher::new(T, gate.clone()), gate)
    }

    #[test]
    fn three_thresholds_yield_three_frames() {
        let (mut batcher, _gate) = batcher();

        let mut frames = Vec::new();
        for _ in 0..6 {
            frames.extend(batcher.on_segment(vec![7_i16; T / 2]));
        }

        assert_eq!(frames.len(), 3);
        for frame in &frames {
            assert_eq!(frame.source_type, SOURCE_MICROPHONE);
            assert_eq!(frame.payload.len(), T);
        }
        assert_eq!(batcher.pending_samples(), 0);
    }

    #[test]
    fn remainder_stays_pending() {
        let (mut batcher, _gate) = batcher();

        let frames = batcher.on_segment(vec![1_i16; T + 100]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.len(), T);
        assert_eq!(batcher.pending_samples(), 100);
    }

    #[test]
    fn oversized_segment_yields_multiple_frames() {
        let (mut batcher, _gate) = batcher();

        let frames = batcher.on_segment(vec![1_i16; 3 * T + 5]);
        assert_eq!(frames.len(), 3);
        assert_eq!(batcher.pending_samples(), 5);
    }

    #[test]
    fn gated_audio_never_reaches_a_frame() {
        let (mut batcher, gate) = batcher();

        // Some audio pending before the assistant starts talking
        assert!(batcher.on_segment(vec![1_i16; 50]).is_empty());

        gate.set_speaking(true);
        assert!(batcher.on_segment(vec![2_i16; T]).is_empty());
        assert!(batcher.on_segment(vec![2_i16; T]).is_empty());
        assert_eq!(batcher.pending_samples(), 0);

        gate.set_speaking(false);
        let frames = batcher.on_segment(vec![3_i16; T]);
        assert_eq!(frames.len(), 1);
        // Only post-gate samples appear
        assert!(frames[0].payload.iter().all(|&s| s == 3));
    }

    #[test]
    fn flush_emits_short_frame() {
        let (mut batcher, _gate) = batcher();

        batcher.on_segment(vec![9_i16; 30]);
        let frame = batcher.flush().unwrap();
        assert_eq!(frame.payload.len(), 30);
        assert!(batcher.flush().is_none());
    }

    #[test]
    fn flush_while_gated_discards() {
        let (mut batcher, gate) = batcher();

        batcher.on_segment(vec![9_i16; 30]);
        gate.set_speaking(true);
        assert!(batcher.flush().is_none());
        assert_eq!(batcher.pending_samples(), 0);
    }
}
