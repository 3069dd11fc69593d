//! Daemon orchestration
//!
//! Wires the hotkey feed, the capture pipeline, the recording session,
//! and the external collaborators into one select loop. The daemon is
//! the session's only driver: every chord signal, level frame, and
//! completed clip funnels through here.

use crate::audio::{CpalCapture, LevelFrame};
use crate::config::{ChordMode, Config};
use crate::error::Result;
use crate::hotkey::{self, HotkeyEvent, RawKeyEvent};
use crate::output::{self, TextOutput};
use crate::session::{RecordingSession, SessionEvent};
use crate::transcribe::{self, Transcriber};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct Daemon {
    config: Config,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the daemon until SIGINT or SIGTERM
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting voxcap daemon");

        let (capture, mut level_rx) = CpalCapture::new(&self.config.audio);
        let capture = Arc::new(capture);

        let mut session = RecordingSession::new(
            capture,
            &self.config.vad,
            &self.config.session,
        );
        let mut session_events = session.subscribe();

        // Hotkey failure is reported once and the daemon keeps running;
        // the session can still be driven by a future control surface.
        let mut detector = None;
        let mut key_source = None;
        let mut key_rx: Option<mpsc::Receiver<RawKeyEvent>> = None;
        if self.config.hotkey.enabled {
            match self.setup_hotkey().await {
                Ok((det, source, rx)) => {
                    tracing::info!(
                        "Hotkey armed: {}+{} ({:?})",
                        self.config.hotkey.modifier,
                        self.config.hotkey.key,
                        self.config.hotkey.mode
                    );
                    detector = Some(det);
                    key_source = Some(source);
                    key_rx = Some(rx);
                }
                Err(e) => {
                    tracing::error!("Global hotkey unavailable: {}", e);
                }
            }
        } else {
            tracing::info!("Hotkey detection disabled by config");
        }

        let transcriber = transcribe::create_transcriber(&self.config.transcribe);
        if transcriber.is_none() {
            tracing::info!("No transcribe command configured; clips will be discarded");
        }
        let text_output = output::create_output(&self.config.output);

        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        loop {
            tokio::select! {
                maybe_raw = recv_key(&mut key_rx), if key_rx.is_some() => {
                    let Some(raw) = maybe_raw else {
                        // Reader exited; disarm the branch instead of
                        // spinning on a closed channel
                        tracing::warn!("Key-event source closed, hotkey disarmed");
                        key_rx = None;
                        continue;
                    };
                    let Some(detector) = detector.as_mut() else {
                        continue;
                    };
                    let Some(event) = detector.feed(raw) else {
                        continue;
                    };
                    self.on_hotkey(&mut session, event);
                }

                Some(frame) = level_rx.recv() => {
                    let LevelFrame { rms, frame_ms } = frame;
                    session.on_frame(rms, frame_ms);
                }

                Ok(event) = session_events.recv() => {
                    if let SessionEvent::Completed(clip) = event {
                        handle_clip(
                            &mut session,
                            clip,
                            transcriber.as_deref(),
                            text_output.as_deref(),
                        )
                        .await;
                    }
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down");
                    break;
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        if let Some(mut source) = key_source {
            let _ = source.stop().await;
        }
        session.stop();

        tracing::info!("Daemon stopped");
        Ok(())
    }

    async fn setup_hotkey(
        &self,
    ) -> std::result::Result<
        (
            hotkey::detector::HotkeyDetector,
            Box<dyn hotkey::KeyEventSource>,
            mpsc::Receiver<RawKeyEvent>,
        ),
        crate::error::HotkeyError,
    > {
        let detector = hotkey::create_detector(&self.config.hotkey)?;
        let mut source = hotkey::create_source()?;
        let rx = source.start().await?;
        Ok((detector, source, rx))
    }

    fn on_hotkey(&self, session: &mut RecordingSession, event: HotkeyEvent) {
        match event {
            HotkeyEvent::Pressed => {
                if let Err(e) = session.start() {
                    tracing::warn!("Ignoring chord press: {}", e);
                }
            }
            HotkeyEvent::Released => {
                session.stop();
            }
            HotkeyEvent::Triggered => {
                debug_assert_eq!(self.config.hotkey.mode, ChordMode::Tap);
                if session.is_recording() {
                    session.stop();
                } else if let Err(e) = session.start() {
                    tracing::warn!("Ignoring chord tap: {}", e);
                }
            }
        }
    }
}

/// Receive from an optional channel; pending forever when absent so the
/// select arm simply never fires.
async fn recv_key(rx: &mut Option<mpsc::Receiver<RawKeyEvent>>) -> Option<RawKeyEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Run the post-capture pipeline for one finished clip
async fn handle_clip(
    session: &mut RecordingSession,
    clip: Vec<u8>,
    transcriber: Option<&dyn Transcriber>,
    text_output: Option<&dyn TextOutput>,
) {
    if clip.is_empty() {
        // Nothing was said; a legitimate outcome, not an error
        tracing::debug!("Empty clip, nothing to transcribe");
        session.reset_to_idle();
        return;
    }

    let Some(transcriber) = transcriber else {
        session.reset_to_idle();
        return;
    };

    session.set_transcribing();
    let text = match transcriber.transcribe(&clip).await {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Transcription failed: {}", e);
            session.set_error();
            session.reset_to_idle();
            return;
        }
    };

    if text.is_empty() {
        tracing::debug!("Transcriber returned no text");
        session.reset_to_idle();
        return;
    }

    tracing::info!("Transcribed {} chars", text.len());

    if let Some(out) = text_output {
        session.set_committing();
        if let Err(e) = out.commit(&text).await {
            tracing::error!("Output failed: {}", e);
            session.set_error();
        }
    } else {
        // No delivery configured; print so the text is not lost
        println!("{}", text);
    }

    session.reset_to_idle();
}
