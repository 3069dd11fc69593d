//! Recording session state machine
//!
//! One session per process. The lifecycle runs
//! Idle → Arming → Recording → Transcribing → Committing → Idle, with
//! Error reachable from the post-capture stages. Start requests are
//! gated on Idle so a second chord press during any other stage is
//! rejected instead of corrupting the active capture.
//!
//! The session owns the voice-activity detector and consumes one level
//! frame per 40 ms of captured audio. It never talks to the platform
//! directly; capture hardware is reached through [`CaptureControl`].

use crate::audio::CaptureControl;
use crate::config::{SessionConfig, VadConfig};
use crate::error::SessionError;
use crate::vad::SilenceVad;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Floor on the configured recording cap, in milliseconds
pub const MIN_RECORDING_MS: u32 = 5_000;

/// Stages of the recording lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// No activity; the only state that accepts a start request
    Idle,
    /// Start accepted, capture hardware spinning up
    Arming,
    /// Audio is being accumulated
    Recording,
    /// Clip handed to the transcription collaborator
    Transcribing,
    /// Text handed to the output collaborator
    Committing,
    /// A post-capture stage failed; cleared by the next reset
    Error,
}

impl RecordingState {
    pub fn is_idle(&self) -> bool {
        matches!(self, RecordingState::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingState::Recording)
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordingState::Idle => "idle",
            RecordingState::Arming => "arming",
            RecordingState::Recording => "recording",
            RecordingState::Transcribing => "transcribing",
            RecordingState::Committing => "committing",
            RecordingState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Events broadcast to session observers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The lifecycle moved to a new stage
    StateChanged(RecordingState),
    /// Loudness of one captured frame (normalized RMS)
    Level(f32),
    /// The detector's speaking/silent verdict for the same frame.
    /// Always emitted after the frame's Level event.
    SpeechState(bool),
    /// Capture finished; payload is the encoded WAV clip, possibly empty
    Completed(Vec<u8>),
}

/// Push-to-talk recording session
pub struct RecordingSession {
    capture: Arc<dyn CaptureControl>,
    vad: SilenceVad,
    state: RecordingState,
    recording: bool,
    started_at: Instant,
    max_recording: Duration,
    events: broadcast::Sender<SessionEvent>,
}

impl RecordingSession {
    pub fn new(
        capture: Arc<dyn CaptureControl>,
        vad_config: &VadConfig,
        session_config: &SessionConfig,
    ) -> Self {
        let max_recording_ms = session_config.max_recording_ms.max(MIN_RECORDING_MS);
        if max_recording_ms != session_config.max_recording_ms {
            tracing::warn!(
                "max_recording_ms {} below floor, using {}",
                session_config.max_recording_ms,
                max_recording_ms
            );
        }

        let (events, _) = broadcast::channel(64);

        Self {
            capture,
            vad: SilenceVad::from_config(vad_config),
            state: RecordingState::Idle,
            recording: false,
            started_at: Instant::now(),
            max_recording: Duration::from_millis(u64::from(max_recording_ms)),
            events,
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Begin a new capture. Rejected unless the session is Idle, so a
    /// chord press that lands mid-pipeline leaves the active clip alone.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if !self.state.is_idle() {
            return Err(SessionError::Busy(self.state));
        }

        self.set_state(RecordingState::Arming);
        self.vad.reset();

        if let Err(e) = self.capture.start_capture() {
            self.set_state(RecordingState::Idle);
            return Err(SessionError::Capture(e));
        }

        self.recording = true;
        self.started_at = Instant::now();
        self.set_state(RecordingState::Recording);
        Ok(())
    }

    /// Feed one captured frame's loudness into the session. Frames that
    /// arrive outside Recording are dropped.
    pub fn on_frame(&mut self, rms: f32, frame_ms: u32) {
        if !self.recording {
            return;
        }

        self.emit(SessionEvent::Level(rms));
        self.vad.process_frame(rms, frame_ms);
        self.emit(SessionEvent::SpeechState(self.vad.is_speaking()));

        if self.started_at.elapsed() >= self.max_recording {
            tracing::info!("Recording reached the duration cap, stopping");
            self.stop();
        } else if self.vad.should_auto_stop() {
            tracing::info!(
                "Silence timeout after speech ({} ms), stopping",
                self.vad.cumulative_silence_ms()
            );
            self.stop();
        }
    }

    /// Finish the capture and broadcast the encoded clip. Idempotent;
    /// a stop while not recording is a no-op.
    pub fn stop(&mut self) {
        if !self.recording {
            return;
        }

        self.recording = false;
        let clip = self.capture.stop_capture();
        tracing::debug!("Capture finished: {} bytes", clip.len());

        self.set_state(RecordingState::Idle);
        self.emit(SessionEvent::Completed(clip));
    }

    /// Mark the clip as handed to the transcription collaborator
    pub fn set_transcribing(&mut self) {
        self.set_state(RecordingState::Transcribing);
    }

    /// Mark the text as handed to the output collaborator
    pub fn set_committing(&mut self) {
        self.set_state(RecordingState::Committing);
    }

    /// Record a post-capture failure
    pub fn set_error(&mut self) {
        self.set_state(RecordingState::Error);
    }

    /// Return to Idle after the pipeline (or an error) resolves
    pub fn reset_to_idle(&mut self) {
        self.set_state(RecordingState::Idle);
    }

    fn set_state(&mut self, next: RecordingState) {
        if self.state == next {
            return;
        }
        tracing::debug!("Session state: {} -> {}", self.state, next);
        self.state = next;
        self.emit(SessionEvent::StateChanged(next));
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; events are advisory
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::FRAME_MS;
    use crate::error::AudioError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeCapture {
        fail_start: bool,
        starts: AtomicUsize,
        stops: AtomicUsize,
        capturing: AtomicBool,
        clip: Vec<u8>,
    }

    impl FakeCapture {
        fn new() -> Self {
            Self {
                fail_start: false,
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
                capturing: AtomicBool::new(false),
                clip: vec![1, 2, 3, 4],
            }
        }

        fn failing() -> Self {
            Self {
                fail_start: true,
                ..Self::new()
            }
        }
    }

    impl CaptureControl for FakeCapture {
        fn start_capture(&self) -> Result<(), AudioError> {
            if self.fail_start {
                return Err(AudioError::Connection("no microphone".into()));
            }
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.capturing.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop_capture(&self) -> Vec<u8> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.capturing.store(false, Ordering::SeqCst);
            self.clip.clone()
        }
    }

    fn session_with(capture: Arc<FakeCapture>) -> RecordingSession {
        RecordingSession::new(
            capture,
            &VadConfig::default(),
            &SessionConfig::default(),
        )
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn test_start_stop_lifecycle() {
        let capture = Arc::new(FakeCapture::new());
        let mut session = session_with(capture.clone());

        assert!(session.state().is_idle());
        session.start().unwrap();
        assert!(session.state().is_recording());
        assert_eq!(capture.starts.load(Ordering::SeqCst), 1);

        session.stop();
        assert!(session.state().is_idle());
        assert_eq!(capture.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_rejected_while_busy() {
        let capture = Arc::new(FakeCapture::new());
        let mut session = session_with(capture.clone());

        session.start().unwrap();
        let err = session.start().unwrap_err();
        assert!(matches!(err, SessionError::Busy(RecordingState::Recording)));

        // The rejection must not have disturbed the running capture
        assert!(session.is_recording());
        assert_eq!(capture.starts.load(Ordering::SeqCst), 1);
        assert_eq!(capture.stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_start_rejected_during_transcribing() {
        let capture = Arc::new(FakeCapture::new());
        let mut session = session_with(capture);

        session.start().unwrap();
        session.stop();
        session.set_transcribing();

        let err = session.start().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Busy(RecordingState::Transcribing)
        ));

        session.reset_to_idle();
        session.start().unwrap();
    }

    #[test]
    fn test_capture_failure_returns_to_idle() {
        let capture = Arc::new(FakeCapture::failing());
        let mut session = session_with(capture);

        let err = session.start().unwrap_err();
        assert!(matches!(err, SessionError::Capture(_)));
        assert!(session.state().is_idle());

        // Idle again, so a retry is allowed (and fails the same way)
        assert!(session.start().is_err());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let capture = Arc::new(FakeCapture::new());
        let mut session = session_with(capture.clone());

        session.start().unwrap();
        session.stop();
        session.stop();
        assert_eq!(capture.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_completed_event_carries_clip() {
        let capture = Arc::new(FakeCapture::new());
        let mut session = session_with(capture);
        let mut rx = session.subscribe();

        session.start().unwrap();
        session.stop();

        let events = drain(&mut rx);
        let clip = events.iter().find_map(|ev| match ev {
            SessionEvent::Completed(clip) => Some(clip.clone()),
            _ => None,
        });
        assert_eq!(clip, Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_level_emitted_before_speech_state() {
        let capture = Arc::new(FakeCapture::new());
        let mut session = session_with(capture);
        session.start().unwrap();

        let mut rx = session.subscribe();
        session.on_frame(0.5, FRAME_MS);

        let events = drain(&mut rx);
        assert!(matches!(events[0], SessionEvent::Level(rms) if rms == 0.5));
        assert!(matches!(events[1], SessionEvent::SpeechState(true)));
    }

    #[test]
    fn test_frames_ignored_while_idle() {
        let capture = Arc::new(FakeCapture::new());
        let mut session = session_with(capture);
        let mut rx = session.subscribe();

        session.on_frame(0.5, FRAME_MS);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_silence_timeout_auto_stops() {
        let capture = Arc::new(FakeCapture::new());
        let mut session = session_with(capture.clone());
        session.start().unwrap();

        // Speech, then enough 40 ms silent frames to pass 900 ms
        for _ in 0..3 {
            session.on_frame(0.5, FRAME_MS);
        }
        for _ in 0..23 {
            session.on_frame(0.001, FRAME_MS);
        }

        assert!(session.state().is_idle());
        assert_eq!(capture.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_silence_without_speech_never_stops() {
        let capture = Arc::new(FakeCapture::new());
        let mut session = session_with(capture.clone());
        session.start().unwrap();

        for _ in 0..200 {
            session.on_frame(0.001, FRAME_MS);
        }

        assert!(session.is_recording());
        assert_eq!(capture.stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duration_cap_stops_recording() {
        let capture = Arc::new(FakeCapture::new());
        let mut session = session_with(capture.clone());
        session.start().unwrap();

        // Backdate the start past the 30 s cap
        session.started_at = Instant::now() - Duration::from_millis(31_000);
        session.on_frame(0.5, FRAME_MS);

        assert!(session.state().is_idle());
        assert_eq!(capture.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_max_recording_floor() {
        let capture = Arc::new(FakeCapture::new());
        let session = RecordingSession::new(
            capture,
            &VadConfig::default(),
            &SessionConfig {
                max_recording_ms: 1_000,
            },
        );
        assert_eq!(session.max_recording, Duration::from_millis(5_000));
    }

    #[test]
    fn test_empty_clip_is_a_legitimate_outcome() {
        let capture = Arc::new(FakeCapture {
            clip: Vec::new(),
            ..FakeCapture::new()
        });
        let mut session = session_with(capture);
        let mut rx = session.subscribe();

        session.start().unwrap();
        session.stop();

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|ev| matches!(ev, SessionEvent::Completed(clip) if clip.is_empty())));
        assert!(session.state().is_idle());
    }
}
