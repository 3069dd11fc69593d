//! Configuration loading and types for voxcap
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/voxcap/config.toml)
//! 3. CLI arguments (highest priority)

use crate::error::VoxcapError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Voxcap Configuration
#
# Location: ~/.config/voxcap/config.toml
# All settings can be overridden via CLI flags

[hotkey]
# Action key of the chord (evdev KEY_* constant name, without the KEY_ prefix)
# Use `evtest` to find key names for your keyboard
key = "Y"

# Trigger modifier; either the left or right variant satisfies the chord
# Valid values: CTRL, ALT, SHIFT, META
modifier = "META"

# Chord mode: "hold" or "tap"
# - hold: hold the chord to record, release to stop (default)
# - tap: tap the chord once to start recording, the VAD stops it
mode = "hold"

# Enable built-in hotkey detection (default: true)
# enabled = true

[audio]
# Audio input device ("default" uses system default)
# List devices with: voxcap devices
device = "default"

[vad]
# RMS loudness threshold for speech (normalized, 0.0 to 1.0)
threshold = 0.02

# Cumulative silence after speech before auto-stop, in milliseconds
# Values below 250 are clamped up to 250
silence_timeout_ms = 900

[session]
# Hard cap on recording duration in milliseconds (floor: 5000)
max_recording_ms = 30000

[transcribe]
# External command the finished WAV clip is piped to on stdin;
# transcribed text is read from stdout. "{model}" and "{model_dir}"
# are substituted before the command runs. Leave unset to disable.
# command = "whisper-cli -m {model_dir}/ggml-{model}.bin -f - --no-prints"

# Model selector forwarded to the transcribe command
model = "base.en"

# Model storage location ("auto" uses ~/.local/share/voxcap/models)
# model_dir = "auto"

[output]
# External command the finalized text is piped to on stdin
# command = "wl-copy"
"#;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub hotkey: HotkeyConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub vad: VadConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub transcribe: TranscribeConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Chord mode: hold-to-talk or tap-to-trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordMode {
    /// Hold the chord to record, release to stop
    #[default]
    Hold,
    /// Tap the chord once; the VAD (or the duration cap) stops the recording
    Tap,
}

/// Global hotkey configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotkeyConfig {
    /// Action key name (evdev KEY_* constant name, without the KEY_ prefix)
    #[serde(default = "default_hotkey_key")]
    pub key: String,

    /// Trigger modifier; either the left or right variant satisfies the chord.
    /// One of: CTRL, ALT, SHIFT, META
    #[serde(default = "default_hotkey_modifier")]
    pub modifier: String,

    /// Chord mode: hold (press/release) or tap (single trigger)
    #[serde(default)]
    pub mode: ChordMode,

    /// Enable built-in hotkey detection
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Audio capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// Input device name, or "default"
    #[serde(default = "default_device")]
    pub device: String,
}

/// Voice-activity detector configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VadConfig {
    /// RMS loudness threshold for speech (normalized)
    #[serde(default = "default_vad_threshold")]
    pub threshold: f32,

    /// Cumulative silence after speech before auto-stop, in milliseconds.
    /// Clamped to a 250 ms floor at construction.
    #[serde(default = "default_silence_timeout_ms")]
    pub silence_timeout_ms: u32,
}

/// Recording session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Hard cap on recording duration in milliseconds (floor: 5000)
    #[serde(default = "default_max_recording_ms")]
    pub max_recording_ms: u32,
}

/// External transcription collaborator configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TranscribeConfig {
    /// Command the WAV clip is piped to; None disables transcription.
    /// "{model}" and "{model_dir}" are substituted before the command runs.
    #[serde(default)]
    pub command: Option<String>,

    /// Model selector forwarded to the transcribe command
    #[serde(default = "default_model")]
    pub model: String,

    /// Model storage location; None or "auto" uses the data directory
    #[serde(default)]
    pub model_dir: Option<String>,
}

/// External text output collaborator configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Command the finalized text is piped to; None disables output
    #[serde(default)]
    pub command: Option<String>,
}

fn default_hotkey_key() -> String {
    "Y".to_string()
}

fn default_hotkey_modifier() -> String {
    "META".to_string()
}

fn default_true() -> bool {
    true
}

fn default_device() -> String {
    "default".to_string()
}

fn default_vad_threshold() -> f32 {
    0.02
}

fn default_silence_timeout_ms() -> u32 {
    900
}

fn default_max_recording_ms() -> u32 {
    30_000
}

fn default_model() -> String {
    "base.en".to_string()
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            key: default_hotkey_key(),
            modifier: default_hotkey_modifier(),
            mode: ChordMode::default(),
            enabled: true,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
        }
    }
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: default_vad_threshold(),
            silence_timeout_ms: default_silence_timeout_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_recording_ms: default_max_recording_ms(),
        }
    }
}

impl TranscribeConfig {
    /// Resolve the model directory, falling back to the data directory
    pub fn resolve_model_dir(&self) -> PathBuf {
        match self.model_dir.as_deref() {
            None | Some("auto") | Some("") => Config::models_dir(),
            Some(path) => PathBuf::from(path),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "voxcap")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "voxcap")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the data directory path (for models)
    pub fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "voxcap")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the models directory path
    pub fn models_dir() -> PathBuf {
        Self::data_dir().join("models")
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, VoxcapError> {
    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| VoxcapError::Config(format!("Failed to read config: {}", e)))?;
            let config: Config = toml::from_str(&contents)
                .map_err(|e| VoxcapError::Config(format!("Failed to parse config: {}", e)))?;
            return Ok(config);
        }
        tracing::debug!("No config file at {:?}, using defaults", path);
    }

    Ok(Config::default())
}
