//! cpal-based audio capture
//!
//! Uses the cpal crate for cross-platform audio input; works with
//! PipeWire, PulseAudio, and ALSA backends. cpal::Stream is not Send,
//! so the stream lives on a dedicated thread for the duration of one
//! capture. The callback converts whatever the device delivers into
//! mono 16 kHz i16, chunks it into 40 ms frames, appends each frame to
//! the shared [`CaptureBuffer`], and publishes one level reading per
//! frame over a bounded channel (`try_send` — the callback never blocks
//! on a slow consumer).

use super::buffer::{CaptureBuffer, FRAME_MS, FRAME_SAMPLES};
use super::wav::SAMPLE_RATE;
use crate::config::AudioConfig;
use crate::error::AudioError;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;

/// Loudness reading for one delivered capture frame
#[derive(Debug, Clone, Copy)]
pub struct LevelFrame {
    /// Normalized RMS loudness, typically in [0, 1]
    pub rms: f32,
    /// Frame duration in milliseconds
    pub frame_ms: u32,
}

/// Start/stop surface the recording session drives. Implemented by the
/// real cpal capture and by test fakes.
pub trait CaptureControl: Send + Sync {
    /// Clear the buffer and begin frame delivery. Device failures
    /// surface here; the process must not crash.
    fn start_capture(&self) -> Result<(), AudioError>;

    /// Stop frame delivery and drain the clip as a WAV container.
    /// Returns an empty vector if nothing was captured.
    fn stop_capture(&self) -> Vec<u8>;
}

struct StreamHandle {
    stop_tx: std::sync::mpsc::Sender<()>,
    thread: thread::JoinHandle<()>,
}

/// cpal-backed capture: owns the shared buffer and the stream thread
pub struct CpalCapture {
    device_name: String,
    buffer: Arc<CaptureBuffer>,
    level_tx: mpsc::Sender<LevelFrame>,
    stream: Mutex<Option<StreamHandle>>,
}

impl CpalCapture {
    /// Create a capture instance and the level-frame receiver its
    /// frames are published on. The receiver is taken exactly once and
    /// handed to whoever drives the recording session.
    pub fn new(config: &AudioConfig) -> (Self, mpsc::Receiver<LevelFrame>) {
        let (level_tx, level_rx) = mpsc::channel(64);
        (
            Self {
                device_name: config.device.clone(),
                buffer: Arc::new(CaptureBuffer::new()),
                level_tx,
                stream: Mutex::new(None),
            },
            level_rx,
        )
    }

    fn stream_slot(&self) -> std::sync::MutexGuard<'_, Option<StreamHandle>> {
        self.stream.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CaptureControl for CpalCapture {
    fn start_capture(&self) -> Result<(), AudioError> {
        use cpal::traits::DeviceTrait;

        let mut slot = self.stream_slot();
        if slot.is_some() {
            tracing::warn!("start_capture called while already capturing");
            return Ok(());
        }

        let device = resolve_device(&self.device_name)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported_config = device
            .default_input_config()
            .map_err(|e| AudioError::Connection(e.to_string()))?;

        let sample_format = supported_config.sample_format();
        match sample_format {
            cpal::SampleFormat::F32 | cpal::SampleFormat::I16 | cpal::SampleFormat::U16 => {}
            format => return Err(AudioError::UnsupportedFormat(format!("{:?}", format))),
        }

        tracing::debug!(
            "Starting capture on {} ({} Hz, {} ch, {:?})",
            device_name,
            supported_config.sample_rate().0,
            supported_config.channels(),
            sample_format
        );

        self.buffer.begin();

        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), AudioError>>();
        let buffer = self.buffer.clone();
        let level_tx = self.level_tx.clone();

        let thread = thread::spawn(move || {
            capture_thread(device, supported_config, buffer, level_tx, stop_rx, ready_tx);
        });

        match ready_rx.recv_timeout(Duration::from_secs(3)) {
            Ok(Ok(())) => {
                *slot = Some(StreamHandle { stop_tx, thread });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(AudioError::StreamError(
                "timed out waiting for audio stream to start".to_string(),
            )),
        }
    }

    fn stop_capture(&self) -> Vec<u8> {
        let handle = self.stream_slot().take();
        if let Some(handle) = handle {
            let _ = handle.stop_tx.send(());
            if handle.thread.join().is_err() {
                tracing::error!("Audio capture thread panicked");
            }
        }

        self.buffer.finish()
    }
}

fn capture_thread(
    device: cpal::Device,
    supported_config: cpal::SupportedStreamConfig,
    buffer: Arc<CaptureBuffer>,
    level_tx: mpsc::Sender<LevelFrame>,
    stop_rx: std::sync::mpsc::Receiver<()>,
    ready_tx: std::sync::mpsc::Sender<Result<(), AudioError>>,
) {
    use cpal::traits::StreamTrait;

    let stream_config = cpal::StreamConfig {
        channels: supported_config.channels(),
        sample_rate: supported_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };

    let sink = FrameSink {
        buffer,
        level_tx,
        pending: Vec::with_capacity(FRAME_SAMPLES * 2),
        source_rate: supported_config.sample_rate().0,
        source_channels: supported_config.channels() as usize,
    };

    let err_fn = |err| tracing::error!("Audio stream error: {}", err);

    let stream_result = match supported_config.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, sink, err_fn),
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, sink, err_fn),
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, sink, err_fn),
        format => {
            let _ = ready_tx.send(Err(AudioError::UnsupportedFormat(format!("{:?}", format))));
            return;
        }
    };

    let stream = match stream_result {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
        return;
    }

    let _ = ready_tx.send(Ok(()));
    tracing::debug!("Audio capture thread started");

    // Block until stop is requested (or the handle is dropped)
    let _ = stop_rx.recv();
    drop(stream);

    tracing::debug!("Audio capture thread stopped");
}

/// Per-stream conversion state living inside the cpal callback
struct FrameSink {
    buffer: Arc<CaptureBuffer>,
    level_tx: mpsc::Sender<LevelFrame>,
    pending: Vec<i16>,
    source_rate: u32,
    source_channels: usize,
}

impl FrameSink {
    /// Convert one callback's worth of device samples and emit every
    /// complete 40 ms frame. Leftover samples wait for the next call.
    fn consume<T>(&mut self, data: &[T])
    where
        T: cpal::Sample,
        f32: cpal::FromSample<T>,
    {
        let mono: Vec<f32> = data
            .chunks(self.source_channels)
            .map(|frame| {
                let sum: f32 = frame
                    .iter()
                    .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                    .sum();
                sum / self.source_channels as f32
            })
            .collect();

        let resampled = if self.source_rate != SAMPLE_RATE {
            resample(&mono, self.source_rate, SAMPLE_RATE)
        } else {
            mono
        };

        self.pending
            .extend(resampled.iter().map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16));

        while self.pending.len() >= FRAME_SAMPLES {
            let frame: Vec<i16> = self.pending.drain(..FRAME_SAMPLES).collect();
            let rms = self.buffer.push_frame(&frame);
            let _ = self.level_tx.try_send(LevelFrame {
                rms,
                frame_ms: FRAME_MS,
            });
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut sink: FrameSink,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    use cpal::traits::DeviceTrait;

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| sink.consume(data),
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))
}

/// Resolve an input device: "default" uses the system default, anything
/// else matches exactly, then case-insensitively, then by substring.
fn resolve_device(name: &str) -> Result<cpal::Device, AudioError> {
    use cpal::traits::HostTrait;

    let host = cpal::default_host();

    if name == "default" {
        return host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceNotFound("default".to_string()));
    }

    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| AudioError::Connection(e.to_string()))?
        .collect();

    let names: Vec<Option<String>> = devices.iter().map(|d| cpal_device_name(d).ok()).collect();
    let search_lower = name.to_lowercase();

    let mut exact = None;
    let mut case_insensitive = None;
    let mut substring = None;

    for (index, device_name) in names.iter().enumerate() {
        let Some(device_name) = device_name else {
            continue;
        };
        if device_name == name {
            exact = Some(index);
            break;
        }
        let lower = device_name.to_lowercase();
        if lower == search_lower && case_insensitive.is_none() {
            case_insensitive = Some(index);
        }
        if lower.contains(&search_lower) && substring.is_none() {
            substring = Some(index);
        }
    }

    exact
        .or(case_insensitive)
        .or(substring)
        .and_then(|index| devices.into_iter().nth(index))
        .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
}

fn cpal_device_name(device: &cpal::Device) -> Result<String, AudioError> {
    use cpal::traits::DeviceTrait;
    device
        .name()
        .map_err(|e| AudioError::Connection(e.to_string()))
}

/// List available input device names (for `voxcap devices`)
pub fn list_input_devices() -> Result<Vec<String>, AudioError> {
    use cpal::traits::HostTrait;

    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::Connection(e.to_string()))?;

    Ok(devices.filter_map(|d| cpal_device_name(&d).ok()).collect())
}

/// Linear interpolation resampling to the capture rate
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };

        output.push(sample);
    }

    output
}
