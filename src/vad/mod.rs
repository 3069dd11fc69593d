//! Voice Activity Detection (VAD)
//!
//! A frame-wise energy detector that decides when speech has ended.
//! Each 40 ms capture frame is classified as speaking or silent by its
//! RMS loudness; once speech has been observed, cumulative silence is
//! tracked and `should_auto_stop` flips when it reaches the configured
//! timeout. Silence before any speech never triggers auto-stop, so a
//! recording can sit armed while the speaker collects their thoughts.

use crate::config::VadConfig;

/// Floor for the silence timeout. Anything shorter would auto-stop
/// between words.
pub const MIN_SILENCE_TIMEOUT_MS: u32 = 250;

/// Frame-wise silence detector with cumulative-silence auto-stop
#[derive(Debug)]
pub struct SilenceVad {
    threshold: f32,
    silence_timeout_ms: u32,
    speech_started: bool,
    speaking: bool,
    cumulative_silence_ms: u32,
    should_auto_stop: bool,
}

impl SilenceVad {
    /// Create a detector. `silence_timeout_ms` is clamped to
    /// [`MIN_SILENCE_TIMEOUT_MS`] rather than rejected.
    pub fn new(threshold: f32, silence_timeout_ms: u32) -> Self {
        Self {
            threshold,
            silence_timeout_ms: silence_timeout_ms.max(MIN_SILENCE_TIMEOUT_MS),
            speech_started: false,
            speaking: false,
            cumulative_silence_ms: 0,
            should_auto_stop: false,
        }
    }

    pub fn from_config(config: &VadConfig) -> Self {
        Self::new(config.threshold, config.silence_timeout_ms)
    }

    /// Clear all state for a new recording
    pub fn reset(&mut self) {
        self.speech_started = false;
        self.speaking = false;
        self.cumulative_silence_ms = 0;
        self.should_auto_stop = false;
    }

    /// Classify one frame by its RMS loudness and advance silence tracking.
    /// Equality with the threshold counts as speaking.
    pub fn process_frame(&mut self, rms: f32, frame_ms: u32) {
        self.speaking = rms >= self.threshold;

        if self.speaking {
            self.speech_started = true;
            self.cumulative_silence_ms = 0;
            self.should_auto_stop = false;
            return;
        }

        // Silence before any speech never triggers auto-stop
        if !self.speech_started {
            return;
        }

        self.cumulative_silence_ms += frame_ms.max(1);
        self.should_auto_stop = self.cumulative_silence_ms >= self.silence_timeout_ms;
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn speech_started(&self) -> bool {
        self.speech_started
    }

    pub fn cumulative_silence_ms(&self) -> u32 {
        self.cumulative_silence_ms
    }

    pub fn should_auto_stop(&self) -> bool {
        self.should_auto_stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_MS: u32 = 40;

    fn vad() -> SilenceVad {
        SilenceVad::new(0.02, 900)
    }

    #[test]
    fn test_silence_auto_stop_timing() {
        let mut vad = vad();

        // 5 frames of speech so silence tracking is armed
        for _ in 0..5 {
            vad.process_frame(0.05, FRAME_MS);
            assert!(vad.is_speaking());
            assert!(!vad.should_auto_stop());
        }

        // 22 silent frames = 880 ms cumulative, still under the 900 ms timeout
        for i in 1..=22 {
            vad.process_frame(0.0, FRAME_MS);
            assert!(
                !vad.should_auto_stop(),
                "auto-stop fired early at silent frame {} ({} ms)",
                i,
                vad.cumulative_silence_ms()
            );
        }

        // 23rd silent frame: 920 ms >= 900 ms
        vad.process_frame(0.0, FRAME_MS);
        assert!(vad.should_auto_stop());
        assert_eq!(vad.cumulative_silence_ms(), 920);
    }

    #[test]
    fn test_no_speech_never_auto_stops() {
        let mut vad = vad();
        for _ in 0..10_000 {
            vad.process_frame(0.0, FRAME_MS);
        }
        assert!(!vad.speech_started());
        assert!(!vad.should_auto_stop());
        assert_eq!(vad.cumulative_silence_ms(), 0);
    }

    #[test]
    fn test_threshold_equality_counts_as_speaking() {
        let mut vad = vad();
        vad.process_frame(0.02, FRAME_MS);
        assert!(vad.is_speaking());
        assert!(vad.speech_started());
    }

    #[test]
    fn test_speech_resets_silence() {
        let mut vad = vad();
        vad.process_frame(0.05, FRAME_MS);
        for _ in 0..10 {
            vad.process_frame(0.0, FRAME_MS);
        }
        assert_eq!(vad.cumulative_silence_ms(), 400);

        vad.process_frame(0.05, FRAME_MS);
        assert_eq!(vad.cumulative_silence_ms(), 0);
        assert!(!vad.should_auto_stop());
    }

    #[test]
    fn test_timeout_clamped_to_floor() {
        let mut vad = SilenceVad::new(0.02, 40);
        vad.process_frame(0.05, FRAME_MS);

        // One 40 ms silent frame must not auto-stop despite the tiny timeout
        vad.process_frame(0.0, FRAME_MS);
        assert!(!vad.should_auto_stop());

        // 250 ms of silence reaches the clamped floor
        for _ in 0..6 {
            vad.process_frame(0.0, FRAME_MS);
        }
        assert!(vad.should_auto_stop());
    }

    #[test]
    fn test_zero_frame_duration_still_accrues() {
        let mut vad = SilenceVad::new(0.02, 250);
        vad.process_frame(0.05, FRAME_MS);
        for _ in 0..250 {
            vad.process_frame(0.0, 0);
        }
        // max(1, frame_ms) keeps a pathological 0 ms cadence from stalling
        assert!(vad.should_auto_stop());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut vad = vad();
        vad.process_frame(0.05, FRAME_MS);
        for _ in 0..30 {
            vad.process_frame(0.0, FRAME_MS);
        }
        assert!(vad.should_auto_stop());

        vad.reset();
        assert!(!vad.speech_started());
        assert!(!vad.is_speaking());
        assert!(!vad.should_auto_stop());
        assert_eq!(vad.cumulative_silence_ms(), 0);
    }
}
