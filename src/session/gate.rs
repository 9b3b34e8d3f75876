//! Half-duplex turn-taking gate
//!
//! A single boolean: true while the assistant's voice is playing locally.
//! The playback event path is the sole writer; the batching layer is the
//! sole reader. Single-writer/single-reader, so an atomic is all the
//! synchronization this needs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable handle to the turn-taking flag
#[derive(Debug, Clone, Default)]
pub struct DuplexGate {
    speaking: Arc<AtomicBool>,
}

impl DuplexGate {
    /// Create a gate in the open (not speaking) state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark assistant speech as playing or stopped; playback path only
    pub fn set_speaking(&self, speaking: bool) {
        self.speaking.store(speaking, Ordering::Release);
    }

    /// True while assistant speech is playing
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_opens_and_closes() {
        let gate = DuplexGate::new();
        assert!(!gate.is_speaking());

        gate.set_speaking(true);
        assert!(gate.is_speaking());

        gate.set_speaking(false);
        assert!(!gate.is_speaking());
    }

    #[test]
    fn clones_share_state() {
        let gate = DuplexGate::new();
        let reader = gate.clone();

        gate.set_speaking(true);
        assert!(reader.is_speaking());
    }
}
