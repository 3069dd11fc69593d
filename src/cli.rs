// Command-line interface definitions for voxcap
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages. It must stay self-contained
// (clap and std only, no use of crate::).

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "voxcap")]
#[command(author, version, about = "Push-to-talk voice capture for Linux")]
#[command(long_about = "
Voxcap is a push-to-talk voice capture daemon for Linux.
Hold a hotkey chord (default Meta+Y), speak, release. The captured clip
is piped to an external transcription command and the resulting text to
an output command.

SETUP:
  1. Add yourself to the input group: sudo usermod -aG input $USER
  2. Log out and back in
  3. Write a starter config: voxcap config --init
  4. Run: voxcap
")]
pub struct Cli {
    /// Path to config file (default: ~/.config/voxcap/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Override the chord's action key (e.g. "Y", "F13", "SCROLLLOCK")
    #[arg(long)]
    pub hotkey: Option<String>,

    /// Use tap mode: tap the chord to start, silence stops the recording
    #[arg(long)]
    pub tap: bool,

    /// Override the transcription model selector (e.g. "base.en")
    #[arg(long)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the capture daemon (default when no subcommand is given)
    Daemon,

    /// List available audio input devices
    Devices,

    /// Show the active configuration
    Config {
        /// Write a commented default config file and exit
        #[arg(long)]
        init: bool,
    },
}
