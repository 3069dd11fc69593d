//! Audio capture module
//!
//! Provides microphone capture using cpal, which works with PipeWire,
//! PulseAudio, and ALSA backends. Captured audio is normalized to
//! mono 16 kHz i16 PCM in fixed 40 ms frames.

pub mod buffer;
pub mod capture;
pub mod wav;

pub use buffer::{compute_rms, CaptureBuffer, FRAME_BYTES, FRAME_MS, FRAME_SAMPLES};
pub use capture::{list_input_devices, CaptureControl, CpalCapture, LevelFrame};
pub use wav::{encode_clip, SAMPLE_RATE};
