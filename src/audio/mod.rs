//! Audio capture, playback, and format conversion
//!
//! Capture and playback each run on their own device callback with a hard
//! per-callback budget; everything here that executes on those paths is
//! non-blocking and lock-free.

mod capture;
mod convert;
mod playback;
mod resample;

pub use capture::AudioCapture;
pub use convert::{float_to_pcm, pcm_bytes_to_samples, pcm_samples_to_bytes};
pub use playback::{AudioPlayback, PlaybackDrain, PlaybackEvent, PlaybackQueue, playback_pair};
pub use resample::resample;
