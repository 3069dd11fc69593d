//! Text output collaborator
//!
//! Delivery of the finalized transcript is external: the text is piped
//! to a user-configured command (a clipboard tool, a typing tool, a
//! script). What happens to it from there is not this crate's concern.

pub mod command;

use crate::config::OutputConfig;
use crate::error::OutputError;
use async_trait::async_trait;

/// Trait for text delivery backends
#[async_trait]
pub trait TextOutput: Send + Sync {
    /// Deliver the finalized transcript
    async fn commit(&self, text: &str) -> Result<(), OutputError>;
}

/// Create the configured output, or None when delivery is disabled
pub fn create_output(config: &OutputConfig) -> Option<Box<dyn TextOutput>> {
    let cmd = config.command.as_deref()?;
    if cmd.trim().is_empty() {
        return None;
    }
    Some(Box::new(command::CommandOutput::new(cmd)))
}
