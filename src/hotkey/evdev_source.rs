//! evdev-based key-event source
//!
//! Opens every keyboard under /dev/input in non-blocking mode and pumps
//! raw key transitions into a channel from a blocking task. All chord
//! logic lives in [`super::detector`]; this module only reads the
//! kernel input layer.
//!
//! The user must be in the 'input' group to access /dev/input/* devices.

use super::{KeyEventKind, KeyEventSource, RawKeyEvent};
use crate::config::HotkeyConfig;
use crate::error::HotkeyError;
use crate::hotkey::detector::Chord;
use evdev::{Device, InputEventKind, Key};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

/// evdev-backed raw key-event feed
pub struct EvdevSource {
    device_paths: Vec<PathBuf>,
    stop_signal: Option<oneshot::Sender<()>>,
}

impl EvdevSource {
    /// Discover keyboard devices. Fails fast when none are accessible —
    /// this is the "hotkey unavailable" condition reported once to the
    /// operator, never retried.
    pub fn new() -> Result<Self, HotkeyError> {
        let device_paths = find_keyboard_devices()?;

        if device_paths.is_empty() {
            return Err(HotkeyError::NoKeyboard);
        }

        tracing::debug!(
            "Found {} keyboard device(s): {:?}",
            device_paths.len(),
            device_paths
        );

        Ok(Self {
            device_paths,
            stop_signal: None,
        })
    }
}

#[async_trait::async_trait]
impl KeyEventSource for EvdevSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<RawKeyEvent>, HotkeyError> {
        let (tx, rx) = mpsc::channel(64);
        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_signal = Some(stop_tx);

        let device_paths = self.device_paths.clone();

        tokio::task::spawn_blocking(move || {
            reader_loop(device_paths, tx, stop_rx);
        });

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), HotkeyError> {
        if let Some(stop) = self.stop_signal.take() {
            let _ = stop.send(());
        }
        Ok(())
    }
}

/// Reader loop running in a blocking task. Must not panic: a dead
/// reader silently kills the hotkey for the rest of the process.
fn reader_loop(
    device_paths: Vec<PathBuf>,
    tx: mpsc::Sender<RawKeyEvent>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    // Open all keyboard devices in non-blocking mode so fetch_events
    // returns immediately when idle
    let mut devices: Vec<Device> = device_paths
        .iter()
        .filter_map(|path| match Device::open(path) {
            Ok(device) => {
                let fd = device.as_raw_fd();
                unsafe {
                    let flags = libc::fcntl(fd, libc::F_GETFL);
                    if flags != -1 {
                        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
                    }
                }
                tracing::debug!("Opened device (non-blocking): {:?}", path);
                Some(device)
            }
            Err(e) => {
                tracing::warn!("Failed to open {:?}: {}", path, e);
                None
            }
        })
        .collect();

    if devices.is_empty() {
        tracing::error!("No keyboard devices could be opened");
        return;
    }

    loop {
        match stop_rx.try_recv() {
            Ok(_) | Err(oneshot::error::TryRecvError::Closed) => {
                tracing::debug!("Key-event source stopping");
                return;
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
        }

        for device in &mut devices {
            let Ok(events) = device.fetch_events() else {
                continue;
            };

            for event in events {
                let InputEventKind::Key(key) = event.kind() else {
                    continue;
                };

                let kind = match event.value() {
                    1 => KeyEventKind::Down,
                    0 => KeyEventKind::Up,
                    2 => KeyEventKind::Repeat,
                    _ => continue,
                };

                let raw = RawKeyEvent {
                    code: key.code(),
                    kind,
                };
                if tx.blocking_send(raw).is_err() {
                    return; // Channel closed, consumer is gone
                }
            }
        }

        // Small sleep to avoid busy-waiting
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
}

/// Find all keyboard input devices
fn find_keyboard_devices() -> Result<Vec<PathBuf>, HotkeyError> {
    let mut keyboards = Vec::new();

    let input_dir = std::fs::read_dir("/dev/input")
        .map_err(|e| HotkeyError::DeviceAccess(format!("/dev/input: {}", e)))?;

    for entry in input_dir {
        let entry = entry.map_err(|e| HotkeyError::DeviceAccess(e.to_string()))?;
        let path = entry.path();

        let is_event_device = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false);

        if !is_event_device {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                // A keyboard should have at least some letter keys
                let has_keys = device
                    .supported_keys()
                    .map(|keys| {
                        keys.contains(Key::KEY_A)
                            && keys.contains(Key::KEY_Z)
                            && keys.contains(Key::KEY_ENTER)
                    })
                    .unwrap_or(false);

                if has_keys {
                    tracing::debug!(
                        "Found keyboard: {:?} ({:?})",
                        path,
                        device.name().unwrap_or("unknown")
                    );
                    keyboards.push(path);
                }
            }
            Err(e) => {
                // Permission denied is common for non-input-group users
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    return Err(HotkeyError::DeviceAccess(path.display().to_string()));
                }
                tracing::trace!("Skipping {:?}: {}", path, e);
            }
        }
    }

    Ok(keyboards)
}

/// Build the chord (action key + left/right modifier pair) from config
pub fn parse_chord(config: &HotkeyConfig) -> Result<Chord, HotkeyError> {
    let action = parse_key_name(&config.key)?.code();
    let (left, right) = parse_modifier_name(&config.modifier)?;

    Ok(Chord {
        action,
        left_modifier: left.code(),
        right_modifier: right.code(),
    })
}

/// Map a modifier name to its left/right key pair
fn parse_modifier_name(name: &str) -> Result<(Key, Key), HotkeyError> {
    match name.to_ascii_uppercase().as_str() {
        "CTRL" | "CONTROL" => Ok((Key::KEY_LEFTCTRL, Key::KEY_RIGHTCTRL)),
        "ALT" => Ok((Key::KEY_LEFTALT, Key::KEY_RIGHTALT)),
        "SHIFT" => Ok((Key::KEY_LEFTSHIFT, Key::KEY_RIGHTSHIFT)),
        "META" | "SUPER" | "WIN" => Ok((Key::KEY_LEFTMETA, Key::KEY_RIGHTMETA)),
        _ => Err(HotkeyError::UnknownModifier(name.to_string())),
    }
}

/// Parse a key name string to an evdev Key
fn parse_key_name(name: &str) -> Result<Key, HotkeyError> {
    // Normalize: uppercase and replace - or space with _
    let normalized: String = name
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();

    let key_name = if normalized.starts_with("KEY_") {
        normalized
    } else {
        format!("KEY_{}", normalized)
    };

    let key = match key_name.as_str() {
        // Letters
        "KEY_A" => Key::KEY_A,
        "KEY_B" => Key::KEY_B,
        "KEY_C" => Key::KEY_C,
        "KEY_D" => Key::KEY_D,
        "KEY_E" => Key::KEY_E,
        "KEY_F" => Key::KEY_F,
        "KEY_G" => Key::KEY_G,
        "KEY_H" => Key::KEY_H,
        "KEY_I" => Key::KEY_I,
        "KEY_J" => Key::KEY_J,
        "KEY_K" => Key::KEY_K,
        "KEY_L" => Key::KEY_L,
        "KEY_M" => Key::KEY_M,
        "KEY_N" => Key::KEY_N,
        "KEY_O" => Key::KEY_O,
        "KEY_P" => Key::KEY_P,
        "KEY_Q" => Key::KEY_Q,
        "KEY_R" => Key::KEY_R,
        "KEY_S" => Key::KEY_S,
        "KEY_T" => Key::KEY_T,
        "KEY_U" => Key::KEY_U,
        "KEY_V" => Key::KEY_V,
        "KEY_W" => Key::KEY_W,
        "KEY_X" => Key::KEY_X,
        "KEY_Y" => Key::KEY_Y,
        "KEY_Z" => Key::KEY_Z,

        // Lock keys (good chord candidates)
        "KEY_SCROLLLOCK" => Key::KEY_SCROLLLOCK,
        "KEY_PAUSE" => Key::KEY_PAUSE,
        "KEY_CAPSLOCK" => Key::KEY_CAPSLOCK,
        "KEY_NUMLOCK" => Key::KEY_NUMLOCK,
        "KEY_INSERT" => Key::KEY_INSERT,

        // Function keys (F13-F24 are often unused)
        "KEY_F1" => Key::KEY_F1,
        "KEY_F2" => Key::KEY_F2,
        "KEY_F3" => Key::KEY_F3,
        "KEY_F4" => Key::KEY_F4,
        "KEY_F5" => Key::KEY_F5,
        "KEY_F6" => Key::KEY_F6,
        "KEY_F7" => Key::KEY_F7,
        "KEY_F8" => Key::KEY_F8,
        "KEY_F9" => Key::KEY_F9,
        "KEY_F10" => Key::KEY_F10,
        "KEY_F11" => Key::KEY_F11,
        "KEY_F12" => Key::KEY_F12,
        "KEY_F13" => Key::KEY_F13,
        "KEY_F14" => Key::KEY_F14,
        "KEY_F15" => Key::KEY_F15,
        "KEY_F16" => Key::KEY_F16,
        "KEY_F17" => Key::KEY_F17,
        "KEY_F18" => Key::KEY_F18,
        "KEY_F19" => Key::KEY_F19,
        "KEY_F20" => Key::KEY_F20,
        "KEY_F21" => Key::KEY_F21,
        "KEY_F22" => Key::KEY_F22,
        "KEY_F23" => Key::KEY_F23,
        "KEY_F24" => Key::KEY_F24,

        // Common non-letter keys
        "KEY_SPACE" => Key::KEY_SPACE,
        "KEY_ENTER" => Key::KEY_ENTER,
        "KEY_TAB" => Key::KEY_TAB,
        "KEY_ESC" | "KEY_ESCAPE" => Key::KEY_ESC,
        "KEY_GRAVE" | "KEY_BACKTICK" => Key::KEY_GRAVE,
        "KEY_HOME" => Key::KEY_HOME,
        "KEY_END" => Key::KEY_END,
        "KEY_PAGEUP" => Key::KEY_PAGEUP,
        "KEY_PAGEDOWN" => Key::KEY_PAGEDOWN,

        _ => {
            return Err(HotkeyError::UnknownKey(format!(
                "{}. Try a letter, F13-F24, SCROLLLOCK, or run 'evtest' to find key names",
                name
            )));
        }
    };

    Ok(key)
}
