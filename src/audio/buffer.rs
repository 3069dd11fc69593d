//! Capture buffer
//!
//! Accumulates raw PCM bytes from the audio callback and computes a
//! per-frame loudness level. Append and drain are mutually exclusive:
//! a frame that arrives after the drain has begun is wholly excluded,
//! never split. The audio thread is the only appender; the session's
//! stop path is the only drainer.

use super::wav;
use std::sync::Mutex;

/// Duration of one capture frame in milliseconds
pub const FRAME_MS: u32 = 40;

/// Samples per capture frame (40 ms at 16 kHz)
pub const FRAME_SAMPLES: usize = (wav::SAMPLE_RATE as usize * FRAME_MS as usize) / 1000;

/// Bytes per capture frame (i16 samples)
pub const FRAME_BYTES: usize = FRAME_SAMPLES * 2;

struct Inner {
    pcm: Vec<u8>,
    capturing: bool,
}

/// Mutex-guarded PCM accumulator shared between the capture thread and
/// the recording session
pub struct CaptureBuffer {
    inner: Mutex<Inner>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                pcm: Vec::new(),
                capturing: false,
            }),
        }
    }

    /// Clear the buffer and start accepting frames
    pub fn begin(&self) {
        let mut inner = self.lock();
        inner.pcm.clear();
        inner.capturing = true;
    }

    /// Append one frame (while capturing) and return its RMS loudness.
    /// The level is computed whether or not the bytes were kept; the
    /// listener decides what to do with it.
    pub fn push_frame(&self, frame: &[i16]) -> f32 {
        {
            let mut inner = self.lock();
            if inner.capturing {
                inner.pcm.reserve(frame.len() * 2);
                for &sample in frame {
                    inner.pcm.extend_from_slice(&sample.to_le_bytes());
                }
            }
        }

        compute_rms(frame)
    }

    /// Stop accepting frames, atomically snapshot and clear the bytes,
    /// and wrap them in the canonical WAV container. Returns an empty
    /// vector if nothing was captured.
    pub fn finish(&self) -> Vec<u8> {
        let pcm = {
            let mut inner = self.lock();
            inner.capturing = false;
            std::mem::take(&mut inner.pcm)
        };

        wav::encode_clip(&pcm)
    }

    pub fn is_capturing(&self) -> bool {
        self.lock().capturing
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means the audio thread panicked mid-append;
        // the bytes are still coherent, so keep going.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// RMS loudness over one frame of i16 samples, normalized to ~[0, 1]
pub fn compute_rms(frame: &[i16]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = frame
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / 32768.0;
            normalized * normalized
        })
        .sum();

    (sum_squares / frame.len() as f64).sqrt() as f32
}
