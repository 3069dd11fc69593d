//! Transcription collaborator
//!
//! Transcription is external to the capture pipeline: the finished WAV
//! clip is piped to a user-configured command and the transcript comes
//! back on stdout. No speech model runs in this process.

pub mod command;

use crate::config::TranscribeConfig;
use crate::error::TranscribeError;
use async_trait::async_trait;

/// Trait for transcription backends
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a WAV clip to text
    async fn transcribe(&self, clip: &[u8]) -> Result<String, TranscribeError>;
}

/// Create the configured transcriber, or None when transcription is
/// disabled (no command configured).
pub fn create_transcriber(config: &TranscribeConfig) -> Option<Box<dyn Transcriber>> {
    let template = config.command.as_deref()?;
    if template.trim().is_empty() {
        return None;
    }
    Some(Box::new(command::CommandTranscriber::new(
        template, config,
    )))
}
