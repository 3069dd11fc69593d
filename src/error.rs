//! Error types for voxcap
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use thiserror::Error;

/// Top-level error type for the voxcap application
#[derive(Error, Debug)]
pub enum VoxcapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    #[error("Audio capture error: {0}")]
    Audio(#[from] AudioError),

    #[error("Recording session error: {0}")]
    Session(#[from] SessionError),

    #[error("Transcription error: {0}")]
    Transcribe(#[from] TranscribeError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to global hotkey detection
#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("Cannot open input device '{0}'. Is the user in the 'input' group?\n  Run: sudo usermod -aG input $USER\n  Then log out and back in.")]
    DeviceAccess(String),

    #[error("Unknown key name: '{0}'. Use evtest to find valid key names.")]
    UnknownKey(String),

    #[error("Unknown modifier name: '{0}'. Valid modifiers: CTRL, ALT, SHIFT, META")]
    UnknownModifier(String),

    #[error("No keyboard device found in /dev/input/")]
    NoKeyboard,

    #[error("Global hotkeys are not supported on this platform: {0}")]
    NotSupported(String),

    #[error("evdev error: {0}")]
    Evdev(String),
}

/// Errors related to audio capture
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio connection failed: {0}")]
    Connection(String),

    #[error("Audio device not found: '{0}'. List devices with: voxcap devices")]
    DeviceNotFound(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio stream error: {0}")]
    StreamError(String),
}

/// Errors related to the recording session state machine
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("a recording session is already active ({0})")]
    Busy(crate::session::RecordingState),

    #[error("failed to start capture: {0}")]
    Capture(#[from] AudioError),
}

/// Errors from the external transcription collaborator
#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("Failed to spawn transcribe command: {0}")]
    Spawn(String),

    #[error("Transcribe command failed: {0}")]
    CommandFailed(String),

    #[error("Transcribe command timed out after {0} seconds")]
    Timeout(u64),
}

/// Errors from the external text output collaborator
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to spawn output command: {0}")]
    Spawn(String),

    #[error("Output command failed: {0}")]
    CommandFailed(String),
}

/// Result type alias using VoxcapError
pub type Result<T> = std::result::Result<T, VoxcapError>;

#[cfg(target_os = "linux")]
impl From<evdev::Error> for HotkeyError {
    fn from(e: evdev::Error) -> Self {
        HotkeyError::Evdev(e.to_string())
    }
}
