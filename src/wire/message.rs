//! JSON control events exchanged with the voice service

use serde::{Deserialize, Serialize};

/// Event tags emitted by the voice service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EventKind {
    /// A user utterance was detected; transcription begins
    #[serde(rename = "user.transcript.start")]
    TranscriptStart,
    /// Incremental transcript fragment
    #[serde(rename = "user.transcript.text.delta")]
    TranscriptDelta,
    /// Full transcript of the utterance
    #[serde(rename = "user.transcript.text")]
    TranscriptText,
    /// Transcription finished
    #[serde(rename = "user.transcript.end")]
    TranscriptEnd,
    /// Assistant response text begins
    #[serde(rename = "ai.response.text.start")]
    ResponseTextStart,
    /// Incremental assistant response text
    #[serde(rename = "ai.response.text.delta")]
    ResponseTextDelta,
    /// Assistant response text finished
    #[serde(rename = "ai.response.text.end")]
    ResponseTextEnd,
    /// Synthesized speech begins
    #[serde(rename = "ai.response.speech.start")]
    ResponseSpeechStart,
    /// Base64 PCM fragment of synthesized speech
    #[serde(rename = "ai.response.speech.delta")]
    ResponseSpeechDelta,
    /// Synthesized speech finished
    #[serde(rename = "ai.response.speech.end")]
    ResponseSpeechEnd,
    /// Unrecognized tag; logged and ignored, never fatal
    #[serde(other)]
    Unknown,
}

/// Inbound control event from the voice service
#[derive(Debug, Clone, Deserialize)]
pub struct ServerEvent {
    /// Event tag
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Text fragment, or base64 PCM for speech deltas
    #[serde(default)]
    pub content: Option<String>,
    /// Server-side timestamp, seconds since epoch
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl ServerEvent {
    /// Parse an event from its JSON text
    ///
    /// # Errors
    ///
    /// Returns error on malformed JSON; callers drop the message and keep
    /// the session alive
    pub fn parse(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Outbound control message to the voice service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Local playback of assistant speech began
    TtsStart,
    /// Local playback of assistant speech finished
    TtsStop,
}

impl ClientEvent {
    /// Serialize to JSON text for the transport
    #[must_use]
    pub fn to_json(self) -> String {
        // A two-variant tagged enum cannot fail to serialize
        serde_json::to_string(&self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speech_delta_parses_with_content() {
        let event = ServerEvent::parse(
            r#"{"type":"ai.response.speech.delta","content":"AAAA","timestamp":1726000000.5}"#,
        )
        .unwrap();

        assert_eq!(event.kind, EventKind::ResponseSpeechDelta);
        assert_eq!(event.content.as_deref(), Some("AAAA"));
        assert!(event.timestamp.is_some());
    }

    #[test]
    fn content_and_timestamp_are_optional() {
        let event = ServerEvent::parse(r#"{"type":"user.transcript.start"}"#).unwrap();
        assert_eq!(event.kind, EventKind::TranscriptStart);
        assert!(event.content.is_none());
        assert!(event.timestamp.is_none());
    }

    #[test]
    fn unknown_tag_is_not_fatal() {
        let event = ServerEvent::parse(r#"{"type":"session.keepalive"}"#).unwrap();
        assert_eq!(event.kind, EventKind::Unknown);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(ServerEvent::parse("{not json").is_err());
    }

    #[test]
    fn client_events_serialize_to_type_tags() {
        assert_eq!(ClientEvent::TtsStart.to_json(), r#"{"type":"tts_start"}"#);
        assert_eq!(ClientEvent::TtsStop.to_json(), r#"{"type":"tts_stop"}"#);
    }
}
