//! Configuration for the voicewire client

use crate::{Error, Result};

/// Default WebSocket endpoint of the voice service
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8000/ws";

/// Client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket URL of the voice service
    pub server_url: String,

    /// Audio pipeline configuration
    pub audio: AudioConfig,
}

/// Audio pipeline configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Microphone capture sample rate (Hz)
    pub capture_rate: u32,

    /// Local output device sample rate (Hz)
    pub playback_rate: u32,

    /// Sample rate of inbound synthesized speech (Hz)
    pub provider_rate: u32,

    /// Minimum accumulated sample count that triggers an outbound frame
    pub batch_threshold: usize,

    /// Capacity of the capture segment hand-off queue
    pub segment_queue_len: usize,

    /// Playback ring capacity in seconds of audio at `playback_rate`
    pub playback_buffer_secs: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture_rate: 48_000,
            playback_rate: 48_000,
            provider_rate: 24_000,
            batch_threshold: 24_000,
            segment_queue_len: 64,
            playback_buffer_secs: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            audio: AudioConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, with defaults
    ///
    /// Recognised variables: `VOICEWIRE_URL`, `VOICEWIRE_CAPTURE_RATE`,
    /// `VOICEWIRE_PLAYBACK_RATE`, `VOICEWIRE_PROVIDER_RATE`,
    /// `VOICEWIRE_BATCH_THRESHOLD`.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but fails to parse
    pub fn load(url_override: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = url_override {
            config.server_url = url.to_string();
        } else if let Ok(url) = std::env::var("VOICEWIRE_URL") {
            config.server_url = url;
        }

        if let Some(rate) = env_parse("VOICEWIRE_CAPTURE_RATE")? {
            config.audio.capture_rate = rate;
        }
        if let Some(rate) = env_parse("VOICEWIRE_PLAYBACK_RATE")? {
            config.audio.playback_rate = rate;
        }
        if let Some(rate) = env_parse("VOICEWIRE_PROVIDER_RATE")? {
            config.audio.provider_rate = rate;
        }
        if let Some(threshold) = env_parse("VOICEWIRE_BATCH_THRESHOLD")? {
            config.audio.batch_threshold = threshold;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants
    ///
    /// # Errors
    ///
    /// Returns error if a rate or the batch threshold is zero, or the
    /// server URL has an unsupported scheme
    pub fn validate(&self) -> Result<()> {
        if self.audio.capture_rate == 0
            || self.audio.playback_rate == 0
            || self.audio.provider_rate == 0
        {
            return Err(Error::Config("sample rates must be non-zero".to_string()));
        }
        if self.audio.batch_threshold == 0 {
            return Err(Error::Config("batch threshold must be non-zero".to_string()));
        }
        if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            return Err(Error::Config(format!(
                "server URL must be ws:// or wss://: {}",
                self.server_url
            )));
        }
        Ok(())
    }
}

/// Parse an optional environment variable
fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("invalid value for {name}: {value}"))),
        Err(_) => Ok(None),
    }
}
