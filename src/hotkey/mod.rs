//! Global hotkey detection
//!
//! On Linux, raw key events come from evdev at the kernel input layer,
//! so the chord works on every Wayland compositor and X11 alike. The
//! raw feed (every key-down/key-up, global, not limited to the focused
//! window) is consumed by a pure [`detector::HotkeyDetector`], which is
//! where all chord logic lives — the platform source stays a dumb pipe.
//!
//! Linux: requires the user to be in the 'input' group.

pub mod detector;

#[cfg(target_os = "linux")]
pub mod evdev_source;

use crate::config::HotkeyConfig;
use crate::error::HotkeyError;
use tokio::sync::mpsc;

/// Direction of a raw key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Down,
    Up,
    /// OS auto-repeat while held; never fires the chord
    Repeat,
}

/// One raw keyboard event from the platform source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    /// Platform key code (evdev KEY_* value on Linux)
    pub code: u16,
    pub kind: KeyEventKind,
}

/// Debounced chord signals emitted by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// Hold-mode: the chord went down
    Pressed,
    /// Hold-mode: the action key (or the modifier) went up
    Released,
    /// Tap-mode: the chord fired once
    Triggered,
}

/// Trait for platform key-event feeds
#[async_trait::async_trait]
pub trait KeyEventSource: Send {
    /// Start the feed. Returns a channel receiver of raw key events.
    async fn start(&mut self) -> Result<mpsc::Receiver<RawKeyEvent>, HotkeyError>;

    /// Stop the feed and release the platform hook. Failing to call
    /// this leaks a reader on every keyboard device.
    async fn stop(&mut self) -> Result<(), HotkeyError>;
}

/// Create the platform key-event source
#[cfg(target_os = "linux")]
pub fn create_source() -> Result<Box<dyn KeyEventSource>, HotkeyError> {
    Ok(Box::new(evdev_source::EvdevSource::new()?))
}

#[cfg(not(target_os = "linux"))]
pub fn create_source() -> Result<Box<dyn KeyEventSource>, HotkeyError> {
    Err(HotkeyError::NotSupported(
        "only Linux (evdev) key-event capture is implemented".to_string(),
    ))
}

/// Build a detector for the configured chord
#[cfg(target_os = "linux")]
pub fn create_detector(config: &HotkeyConfig) -> Result<detector::HotkeyDetector, HotkeyError> {
    let chord = evdev_source::parse_chord(config)?;
    Ok(detector::HotkeyDetector::new(chord, config.mode))
}

#[cfg(not(target_os = "linux"))]
pub fn create_detector(_config: &HotkeyConfig) -> Result<detector::HotkeyDetector, HotkeyError> {
    Err(HotkeyError::NotSupported(
        "only Linux (evdev) key-event capture is implemented".to_string(),
    ))
}
