//! Session controller
//!
//! Owns the transport lifecycle and wires the two audio paths together:
//! capture segments flow through the batcher to the socket, inbound events
//! flow through the router to the playback ring, and playback edges drive
//! the duplex gate plus the `tts_start`/`tts_stop` notifications the service
//! uses to pause its own listening.
//!
//! The cpal streams are not `Send`, so the session itself stays on the task
//! that created it; only the socket pumps and event loops are spawned.

mod batcher;
mod gate;
mod router;

pub use batcher::FrameBatcher;
pub use gate::DuplexGate;
pub use router::{ControlRouter, TranscriptBuffer};

use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::audio::{AudioCapture, AudioPlayback, PlaybackEvent, playback_pair};
use crate::config::Config;
use crate::wire::ClientEvent;
use crate::{Error, Result};

/// Called with a human-readable message on non-user-initiated failures
pub type ErrorHook = Box<dyn Fn(&str) + Send + Sync>;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No devices held, no transport open
    #[default]
    Idle,
    /// Acquiring devices and opening the transport
    Connecting,
    /// Both audio paths wired and flowing
    Active,
    /// Teardown in progress
    Stopping,
}

/// A full-duplex voice session against the remote service
pub struct Session {
    config: Config,
    state: SessionState,
    gate: DuplexGate,
    capture: Option<AudioCapture>,
    playback: Option<AudioPlayback>,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    /// Aborted on teardown; parked on the socket with nothing left to drain
    reader_task: Option<JoinHandle<()>>,
    /// Left to run to completion on teardown: their input channels close and
    /// they still have the capture flush and the Close frame to deliver
    pumps: Vec<JoinHandle<()>>,
    closed_rx: Option<mpsc::Receiver<()>>,
    error_hook: Option<ErrorHook>,
    user_stopped: bool,
}

impl Session {
    /// Create an idle session
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            gate: DuplexGate::new(),
            capture: None,
            playback: None,
            outbound: None,
            reader_task: None,
            pumps: Vec::new(),
            closed_rx: None,
            error_hook: None,
            user_stopped: false,
        }
    }

    /// Install a hook for user-visible failures
    pub fn set_error_hook(&mut self, hook: ErrorHook) {
        self.error_hook = Some(hook);
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// True while the microphone is being captured
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Active
            && self.capture.as_ref().is_some_and(AudioCapture::is_capturing)
    }

    /// True while the output stream is open for assistant speech
    #[must_use]
    pub fn is_playback_open(&self) -> bool {
        self.state == SessionState::Active
            && self.playback.as_ref().is_some_and(AudioPlayback::is_active)
    }

    /// True while assistant speech is playing locally
    #[must_use]
    pub fn is_assistant_speaking(&self) -> bool {
        self.gate.is_speaking()
    }

    /// Start the session: acquire devices, open the transport, wire both
    /// audio paths
    ///
    /// # Errors
    ///
    /// Returns error if a device cannot be acquired or the transport fails
    /// to connect; the session remains idle in either case
    pub async fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            tracing::debug!(state = ?self.state, "start ignored, session not idle");
            return Ok(());
        }
        self.state = SessionState::Connecting;
        self.user_stopped = false;

        // Device acquisition first: a denied microphone never opens the
        // transport, and the session never leaves idle
        let capture = match AudioCapture::new(self.config.audio.capture_rate) {
            Ok(capture) => capture,
            Err(e) => {
                self.state = SessionState::Idle;
                self.report(&format!("microphone unavailable: {e}"));
                return Err(e);
            }
        };
        let playback = match AudioPlayback::new(self.config.audio.playback_rate) {
            Ok(playback) => playback,
            Err(e) => {
                self.state = SessionState::Idle;
                self.report(&format!("speaker unavailable: {e}"));
                return Err(e);
            }
        };

        let ws_stream = match connect_async(self.config.server_url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                self.state = SessionState::Idle;
                let error = Error::Transport(e.to_string());
                self.report(&format!("connection failed: {error}"));
                return Err(error);
            }
        };
        tracing::info!(url = %self.config.server_url, "connected to voice service");

        let (ws_tx, mut ws_rx) = ws_stream.split();
        let (out_tx, out_rx) = mpsc::unbounded_channel::<Message>();
        let (closed_tx, closed_rx) = mpsc::channel::<()>(1);

        // Outbound writer: the single point that touches the socket sink
        self.pumps
            .push(tokio::spawn(run_writer(out_rx, ws_tx, closed_tx.clone())));

        // Playback ring and its drain on the output callback
        let ring_capacity = self.config.audio.playback_rate as usize
            * self.config.audio.playback_buffer_secs as usize;
        let (queue, drain, playback_events) = playback_pair(ring_capacity);

        // Inbound reader: control events into the router
        let mut control_router = ControlRouter::new(
            queue,
            self.config.audio.provider_rate,
            self.config.audio.playback_rate,
        );
        let reader_closed = closed_tx.clone();
        self.reader_task = Some(tokio::spawn(async move {
            while let Some(message) = ws_rx.next().await {
                match message {
                    Ok(Message::Text(text)) => match crate::wire::ServerEvent::parse(&text) {
                        Ok(event) => control_router.dispatch(event),
                        Err(e) => {
                            tracing::warn!(error = %e, "dropping malformed control message");
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "transport receive failed");
                        break;
                    }
                }
            }
            let _ = reader_closed.try_send(());
        }));

        // Capture pump: segments through the batcher to the socket
        let (segment_tx, segment_rx) =
            mpsc::channel::<Vec<i16>>(self.config.audio.segment_queue_len);
        let frame_batcher = FrameBatcher::new(self.config.audio.batch_threshold, self.gate.clone());
        self.pumps.push(tokio::spawn(run_capture_pump(
            segment_rx,
            frame_batcher,
            out_tx.clone(),
        )));

        // Playback edges: write the gate, notify the service on real flips
        self.pumps.push(tokio::spawn(run_edge_loop(
            playback_events,
            self.gate.clone(),
            out_tx.clone(),
        )));

        self.capture = Some(capture);
        self.playback = Some(playback);
        self.outbound = Some(out_tx);
        self.closed_rx = Some(closed_rx);

        let started = self
            .capture
            .as_mut()
            .map_or(Ok(()), |c| c.start(segment_tx))
            .and_then(|()| self.playback.as_mut().map_or(Ok(()), |p| p.start(drain)));
        if let Err(e) = started {
            self.report(&format!("audio stream failed: {e}"));
            self.teardown();
            return Err(e);
        }

        self.state = SessionState::Active;
        tracing::info!("session active");
        Ok(())
    }

    /// Drive the session until Ctrl-C or the transport closes
    ///
    /// # Errors
    ///
    /// Returns error if waiting for the interrupt signal fails
    pub async fn run(&mut self) -> Result<()> {
        let Some(mut closed_rx) = self.closed_rx.take() else {
            return Ok(());
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(Error::Io)?;
                tracing::info!("interrupt received");
                self.stop();
            }
            _ = closed_rx.recv() => {
                tracing::info!("transport closed");
                self.teardown();
                if !self.user_stopped {
                    self.report("connection to the voice service was lost");
                }
            }
        }
        Ok(())
    }

    /// Stop the session; idempotent from any state
    pub fn stop(&mut self) {
        self.user_stopped = true;
        self.teardown();
    }

    /// Release devices, close the transport, and let the pumps drain
    fn teardown(&mut self) {
        if self.state == SessionState::Idle && self.reader_task.is_none() && self.pumps.is_empty()
        {
            return;
        }
        self.state = SessionState::Stopping;

        // Releasing the streams drops the segment and event senders, so the
        // capture pump flushes its remainder and the edge loop winds down.
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        if let Some(mut playback) = self.playback.take() {
            playback.stop();
        }

        if let Some(outbound) = self.outbound.take() {
            let _ = outbound.send(Message::Close(None));
        }

        // The reader is parked on the socket with nothing left to deliver.
        if let Some(reader) = self.reader_task.take() {
            reader.abort();
        }
        // The pumps still hold the flush frame and the Close frame; dropping
        // the handles detaches them so they run to completion and close the
        // sink once every outbound sender is gone.
        self.pumps.clear();
        self.closed_rx = None;

        self.gate.set_speaking(false);
        self.state = SessionState::Idle;
        tracing::info!("session stopped");
    }

    /// Deliver a user-visible failure message
    fn report(&self, message: &str) {
        tracing::error!("{message}");
        if let Some(hook) = &self.error_hook {
            hook(message);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Forward queued messages to the socket sink, then close it
///
/// Runs until every outbound sender is dropped, so a queued `Close` frame
/// is always delivered before the sink shuts down.
async fn run_writer<S>(
    mut outbound: mpsc::UnboundedReceiver<Message>,
    mut sink: S,
    closed: mpsc::Sender<()>,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(message) = outbound.recv().await {
        if let Err(e) = sink.send(message).await {
            tracing::warn!(error = %e, "transport send failed");
            let _ = closed.try_send(());
            break;
        }
    }
    let _ = sink.close().await;
}

/// Batch capture segments into frames; flush the remainder once the
/// segment channel closes
async fn run_capture_pump(
    mut segments: mpsc::Receiver<Vec<i16>>,
    mut batcher: FrameBatcher,
    out: mpsc::UnboundedSender<Message>,
) {
    while let Some(segment) = segments.recv().await {
        for frame in batcher.on_segment(segment) {
            if out.send(Message::Binary(frame.encode())).is_err() {
                return;
            }
        }
    }
    // Capture stopped: push out what's left
    if let Some(frame) = batcher.flush() {
        let _ = out.send(Message::Binary(frame.encode()));
    }
}

/// Mirror playback edges into the gate and notify the service on real flips
async fn run_edge_loop(
    mut events: mpsc::UnboundedReceiver<PlaybackEvent>,
    gate: DuplexGate,
    out: mpsc::UnboundedSender<Message>,
) {
    let mut playing = false;
    while let Some(event) = events.recv().await {
        let now_playing = matches!(event, PlaybackEvent::Started);
        if now_playing == playing {
            continue;
        }
        playing = now_playing;
        gate.set_speaking(playing);

        let notice = if playing {
            ClientEvent::TtsStart
        } else {
            ClientEvent::TtsStop
        };
        tracing::debug!(?notice, "playback edge");
        if out.send(Message::Text(notice.to_json())).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn stop_is_idempotent_from_idle() {
        let mut session = Session::new(Config::default());
        assert_eq!(session.state(), SessionState::Idle);

        session.stop();
        session.stop();

        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_recording());
        assert!(!session.is_playback_open());
        assert!(!session.is_assistant_speaking());
    }

    #[tokio::test]
    async fn run_without_start_returns() {
        let mut session = Session::new(Config::default());
        assert_ok!(session.run().await);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn capture_pump_flushes_remainder_when_segments_close() {
        let batcher = FrameBatcher::new(1_000, DuplexGate::new());
        let (segment_tx, segment_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(run_capture_pump(segment_rx, batcher, out_tx));

        segment_tx.send(vec![5_i16; 300]).await.unwrap();
        drop(segment_tx); // capture stream released during teardown
        pump.await.unwrap();

        let Some(Message::Binary(bytes)) = out_rx.recv().await else {
            panic!("expected a flushed frame");
        };
        let frame = crate::wire::OutboundFrame::decode(&bytes).unwrap();
        assert_eq!(frame.payload, vec![5_i16; 300]);
        assert!(out_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn writer_delivers_queued_close_before_shutting_the_sink() {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (sink, sink_rx) = futures::channel::mpsc::unbounded();
        let (closed_tx, _closed_rx) = mpsc::channel(1);
        let writer = tokio::spawn(run_writer(out_rx, sink, closed_tx));

        out_tx.send(Message::Binary(vec![1, 2, 3])).unwrap();
        out_tx.send(Message::Close(None)).unwrap();
        drop(out_tx); // last sender gone, as in teardown
        writer.await.unwrap();

        let sent: Vec<Message> = sink_rx.collect().await;
        assert_eq!(sent, vec![Message::Binary(vec![1, 2, 3]), Message::Close(None)]);
    }

    #[tokio::test]
    async fn playback_edges_drive_gate_and_notices() {
        let gate = DuplexGate::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let edges = tokio::spawn(run_edge_loop(events_rx, gate.clone(), out_tx));

        events_tx.send(PlaybackEvent::Started).unwrap();
        assert_eq!(
            out_rx.recv().await,
            Some(Message::Text(r#"{"type":"tts_start"}"#.to_string()))
        );
        assert!(gate.is_speaking());

        // A repeated start is absorbed; the next notice must be the stop
        events_tx.send(PlaybackEvent::Started).unwrap();
        events_tx.send(PlaybackEvent::Stopped).unwrap();
        assert_eq!(
            out_rx.recv().await,
            Some(Message::Text(r#"{"type":"tts_stop"}"#.to_string()))
        );
        assert!(!gate.is_speaking());

        drop(events_tx);
        edges.await.unwrap();
        assert!(out_rx.recv().await.is_none());
    }
}
