//! Speaker playback with edge-triggered start/stop events
//!
//! Decoded speech samples are enqueued into a lock-free SPSC ring on the
//! session side and drained sample-by-sample inside the output device
//! callback. The drain tracks a {silent, playing} state machine and emits
//! exactly one event per transition, on the playback timing grid.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tokio::sync::mpsc;

use crate::{Error, Result};

/// One-shot playback state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The queue went from empty to draining audio
    Started,
    /// The queue emptied with nothing further pending
    Stopped,
}

/// Session-side handle: enqueues resampled speech for playback
pub struct PlaybackQueue {
    producer: HeapProd<i16>,
}

impl PlaybackQueue {
    /// Append a segment to the playback queue
    ///
    /// Returns the number of samples accepted. When the ring is full the
    /// excess is dropped; bounded buffering is the contract here, not
    /// lossless delivery.
    pub fn enqueue(&mut self, segment: &[i16]) -> usize {
        let pushed = self.producer.push_slice(segment);
        if pushed < segment.len() {
            tracing::warn!(
                dropped = segment.len() - pushed,
                "playback ring full, dropping samples"
            );
        }
        pushed
    }
}

/// Callback-side half: drains the ring on the output timing grid
pub struct PlaybackDrain {
    consumer: HeapCons<i16>,
    playing: bool,
    events: mpsc::UnboundedSender<PlaybackEvent>,
}

impl PlaybackDrain {
    /// Fill one output callback buffer, duplicating each sample across
    /// `channels` and writing silence on underrun
    ///
    /// Called from the output device callback: no blocking, no allocation.
    pub fn fill(&mut self, out: &mut [f32], channels: usize) {
        for frame in out.chunks_mut(channels.max(1)) {
            match self.consumer.try_pop() {
                Some(sample) => {
                    if !self.playing {
                        self.playing = true;
                        let _ = self.events.send(PlaybackEvent::Started);
                    }
                    let value = f32::from(sample) / 32768.0;
                    for slot in frame.iter_mut() {
                        *slot = value;
                    }
                }
                None => {
                    if self.playing {
                        self.playing = false;
                        let _ = self.events.send(PlaybackEvent::Stopped);
                    }
                    for slot in frame.iter_mut() {
                        *slot = 0.0;
                    }
                }
            }
        }
    }
}

/// Create a connected queue/drain pair over a ring of `capacity` samples
///
/// Events emitted by the drain arrive on the returned receiver.
#[must_use]
pub fn playback_pair(
    capacity: usize,
) -> (
    PlaybackQueue,
    PlaybackDrain,
    mpsc::UnboundedReceiver<PlaybackEvent>,
) {
    let (producer, consumer) = HeapRb::<i16>::new(capacity.max(1)).split();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    (
        PlaybackQueue { producer },
        PlaybackDrain {
            consumer,
            playing: false,
            events: events_tx,
        },
        events_rx,
    )
}

/// Drives the default output device from a [`PlaybackDrain`]
pub struct AudioPlayback {
    #[allow(dead_code)]
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if no output device supports `sample_rate`
    pub fn new(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(sample_rate)
                        && c.max_sample_rate() >= SampleRate(sample_rate)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(sample_rate))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self {
            device,
            config,
            stream: None,
        })
    }

    /// Start the persistent output stream, draining `drain` continuously
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built or started
    pub fn start(&mut self, mut drain: PlaybackDrain) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let config = self.config.clone();
        let channels = config.channels as usize;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    drain.fill(data, channels);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio playback started");
        Ok(())
    }

    /// Stop playback and cancel any pending output
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio playback stopped");
        }
    }

    /// Check if the output stream is running
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.stream.is_some()
    }
}
