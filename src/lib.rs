//! Voicewire - realtime duplex voice streaming client for AI assistants
//!
//! This library implements both halves of a full-duplex voice session over a
//! single persistent WebSocket:
//! - Capture: microphone blocks are converted to 16-bit PCM, batched to a
//!   sample threshold, and sent as compact binary frames
//! - Playback: inbound speech deltas are decoded, resampled to the local
//!   output rate, and drained to the speaker on its own timing grid
//!
//! A half-duplex gate keeps the two directions from interfering: while the
//! assistant's voice is playing, captured audio is discarded rather than
//! queued, so the assistant never hears itself.
//!
//! # Architecture
//!
//! ```text
//! mic ──> convert ──> batcher ──┐ (gated)
//!                               ├──> WebSocket <──> voice service
//! speaker <── drain <── ring <──┤
//!    │                 router <─┘
//!    └── start/stop edges ──> gate + tts_start/tts_stop
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod session;
pub mod wire;

pub use config::{AudioConfig, Config};
pub use error::{Error, Result};
pub use session::{DuplexGate, FrameBatcher, Session, SessionState};
pub use wire::{ClientEvent, EventKind, OutboundFrame, ServerEvent, SOURCE_MICROPHONE};
