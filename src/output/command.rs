//! External-command text delivery

use super::TextOutput;
use crate::error::OutputError;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub struct CommandOutput {
    command: String,
}

impl CommandOutput {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
        }
    }
}

#[async_trait]
impl TextOutput for CommandOutput {
    async fn commit(&self, text: &str) -> Result<(), OutputError> {
        tracing::debug!("Running output command: {}", self.command);

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OutputError::Spawn(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| OutputError::CommandFailed(format!("stdin write: {}", e)))?;
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OutputError::CommandFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OutputError::CommandFailed(format!(
                "exit {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}
