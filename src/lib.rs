//! voxcap - Push-to-talk voice capture for Linux
//!
//! Hold a hotkey chord, speak, release: the microphone clip is encoded
//! as WAV, handed to an external transcription command, and the text is
//! piped to an output command. A silence-based voice-activity detector
//! stops tap-mode recordings automatically.
//!
//! # Architecture
//!
//! - `hotkey`: evdev key events and the pure chord detector
//! - `audio`: cpal capture, frame normalization, the capture buffer, WAV
//! - `vad`: cumulative-silence voice-activity detection
//! - `session`: the recording lifecycle state machine
//! - `transcribe` / `output`: external command collaborators
//! - `daemon`: the select loop wiring it all together

pub mod audio;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod hotkey;
pub mod output;
pub mod session;
pub mod transcribe;
pub mod vad;

pub use cli::Cli;
pub use config::Config;
pub use daemon::Daemon;
pub use error::{Result, VoxcapError};
