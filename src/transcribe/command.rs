//! External-command transcription backend
//!
//! Runs the configured shell command, writes the WAV clip to its stdin,
//! and reads the transcript from its stdout. "{model}" and "{model_dir}"
//! in the template are substituted before the command runs.

use super::Transcriber;
use crate::config::TranscribeConfig;
use crate::error::TranscribeError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Hard cap on one transcription run
const TRANSCRIBE_TIMEOUT_SECS: u64 = 60;

pub struct CommandTranscriber {
    command: String,
}

impl CommandTranscriber {
    pub fn new(template: &str, config: &TranscribeConfig) -> Self {
        let model_dir = config.resolve_model_dir();
        let command = template
            .replace("{model}", &config.model)
            .replace("{model_dir}", &model_dir.to_string_lossy());
        Self { command }
    }
}

#[async_trait]
impl Transcriber for CommandTranscriber {
    async fn transcribe(&self, clip: &[u8]) -> Result<String, TranscribeError> {
        tracing::debug!("Running transcribe command: {}", self.command);

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TranscribeError::Spawn(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(clip)
                .await
                .map_err(|e| TranscribeError::CommandFailed(format!("stdin write: {}", e)))?;
            drop(stdin); // Close stdin so the command sees EOF
        }

        let output = tokio::time::timeout(
            Duration::from_secs(TRANSCRIBE_TIMEOUT_SECS),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| TranscribeError::Timeout(TRANSCRIBE_TIMEOUT_SECS))?
        .map_err(|e| TranscribeError::CommandFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscribeError::CommandFailed(format!(
                "exit {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(text)
    }
}
