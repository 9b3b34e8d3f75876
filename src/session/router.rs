//! Inbound control event routing
//!
//! Dispatches the service's event taxonomy: transcript fragments update a
//! bounded buffer, speech deltas are decoded, resampled, and enqueued for
//! playback. No inbound message is ever fatal to the session; malformed or
//! unknown events are logged and dropped.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::audio::{PlaybackQueue, pcm_bytes_to_samples, resample};
use crate::wire::{EventKind, ServerEvent};
use crate::{Error, Result};

/// Stored transcript tail; enough to render and a little slack
const TRANSCRIPT_KEEP_CHARS: usize = 256;
/// Render the full transcript until it exceeds this many characters
const TRANSCRIPT_FULL_CHARS: usize = 100;
/// Characters shown once the transcript is elided
const TRANSCRIPT_TAIL_CHARS: usize = 80;

/// Bounded rolling transcript of the user's speech
#[derive(Debug, Default)]
pub struct TranscriptBuffer {
    text: String,
}

impl TranscriptBuffer {
    /// Drop everything; a new utterance is starting
    pub fn reset(&mut self) {
        self.text.clear();
    }

    /// Append a fragment, trimming the front to stay bounded
    pub fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        if self.text.chars().count() > TRANSCRIPT_KEEP_CHARS {
            self.text = tail_chars(&self.text, TRANSCRIPT_KEEP_CHARS).to_string();
        }
    }

    /// Replace with the full transcript
    pub fn replace(&mut self, text: &str) {
        self.text.clear();
        self.push(text);
    }

    /// Render for display: the full text, or the last ~80 characters once
    /// it grows past 100
    #[must_use]
    pub fn render(&self) -> String {
        if self.text.chars().count() <= TRANSCRIPT_FULL_CHARS {
            self.text.clone()
        } else {
            format!("\u{2026}{}", tail_chars(&self.text, TRANSCRIPT_TAIL_CHARS))
        }
    }
}

/// Last `count` characters of `text`, on a char boundary
fn tail_chars(text: &str, count: usize) -> &str {
    let chars = text.chars().count();
    if chars <= count {
        return text;
    }
    let skip = chars - count;
    let (index, _) = text.char_indices().nth(skip).unwrap_or((text.len(), ' '));
    &text[index..]
}

/// Dispatches inbound control events to the transcript and playback paths
pub struct ControlRouter {
    transcript: TranscriptBuffer,
    response_text: String,
    playback: PlaybackQueue,
    provider_rate: u32,
    playback_rate: u32,
    /// Visual-feedback suppression for the capture meter; a UI concern,
    /// distinct from the duplex gate
    input_feedback_suppressed: bool,
}

impl ControlRouter {
    /// Create a router feeding `playback`, resampling speech deltas from
    /// `provider_rate` to `playback_rate`
    #[must_use]
    pub fn new(playback: PlaybackQueue, provider_rate: u32, playback_rate: u32) -> Self {
        Self {
            transcript: TranscriptBuffer::default(),
            response_text: String::new(),
            playback,
            provider_rate,
            playback_rate,
            input_feedback_suppressed: false,
        }
    }

    /// Dispatch one event; never fails the session
    pub fn dispatch(&mut self, event: ServerEvent) {
        match event.kind {
            EventKind::TranscriptStart => {
                self.transcript.reset();
            }
            EventKind::TranscriptDelta => {
                if let Some(content) = &event.content {
                    self.transcript.push(content);
                    tracing::debug!(transcript = %self.transcript.render(), "transcribing");
                }
            }
            EventKind::TranscriptText => {
                if let Some(content) = &event.content {
                    self.transcript.replace(content);
                    tracing::info!(transcript = %content, "user said");
                }
            }
            EventKind::TranscriptEnd => {
                tracing::debug!("transcription finished");
            }
            EventKind::ResponseTextStart => {
                self.response_text.clear();
            }
            EventKind::ResponseTextDelta => {
                if let Some(content) = &event.content {
                    self.response_text.push_str(content);
                }
            }
            EventKind::ResponseTextEnd => {
                tracing::info!(response = %self.response_text, "assistant said");
            }
            EventKind::ResponseSpeechStart => {
                self.input_feedback_suppressed = true;
            }
            EventKind::ResponseSpeechDelta => {
                if let Err(e) = self.enqueue_speech_delta(event.content.as_deref()) {
                    // Drop this delta; later ones still play
                    tracing::warn!(error = %e, "dropping speech delta");
                }
            }
            EventKind::ResponseSpeechEnd => {
                self.input_feedback_suppressed = false;
            }
            EventKind::Unknown => {
                tracing::debug!("ignoring unknown event tag");
            }
        }
    }

    /// Decode, resample, and enqueue one speech delta
    fn enqueue_speech_delta(&mut self, content: Option<&str>) -> Result<usize> {
        let content =
            content.ok_or_else(|| Error::Codec("speech delta without content".to_string()))?;

        let bytes = BASE64
            .decode(content)
            .map_err(|e| Error::Codec(format!("base64 decode failed: {e}")))?;
        let samples = pcm_bytes_to_samples(&bytes)?;
        let resampled = resample(samples, self.provider_rate, self.playback_rate)?;

        Ok(self.playback.enqueue(&resampled))
    }

    /// Current transcript rendering
    #[must_use]
    pub fn transcript(&self) -> String {
        self.transcript.render()
    }

    /// True while the capture meter should be visually suppressed
    #[must_use]
    pub const fn input_feedback_suppressed(&self) -> bool {
        self.input_feedback_suppressed
    }
}
