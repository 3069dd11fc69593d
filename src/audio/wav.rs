//! Canonical clip container
//!
//! Finished recordings are handed downstream as WAV: fixed header,
//! 16 kHz / 16-bit / mono, data section equal to the captured bytes.
//! An empty capture yields a zero-length output, not a malformed header;
//! downstream treats that as "nothing recorded" and skips transcription.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

/// Sample rate of all captured audio (Hz)
pub const SAMPLE_RATE: u32 = 16_000;

/// Bit depth of all captured audio
pub const BITS_PER_SAMPLE: u16 = 16;

/// Channel count (mono)
pub const CHANNELS: u16 = 1;

/// Wrap raw interleaved i16 PCM bytes in a WAV container.
/// Empty input produces empty output.
pub fn encode_clip(pcm: &[u8]) -> Vec<u8> {
    if pcm.is_empty() {
        return Vec::new();
    }

    match try_encode(pcm) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("Failed to encode clip: {}", e);
            Vec::new()
        }
    }
}

fn try_encode(pcm: &[u8]) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for sample in pcm.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}
