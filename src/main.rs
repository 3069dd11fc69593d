use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use voxcap::cli::{Cli, Commands};
use voxcap::config::{self, ChordMode, Config, DEFAULT_CONFIG};
use voxcap::Daemon;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli);

    let mut config = config::load_config(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);

    match cli.command {
        None | Some(Commands::Daemon) => {
            let mut daemon = Daemon::new(config);
            daemon.run().await?;
        }
        Some(Commands::Devices) => {
            list_devices()?;
        }
        Some(Commands::Config { init }) => {
            if init {
                init_config_file()?;
            } else {
                show_config(&config)?;
            }
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("voxcap={},warn", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(ref key) = cli.hotkey {
        config.hotkey.key = key.clone();
    }
    if cli.tap {
        config.hotkey.mode = ChordMode::Tap;
    }
    if let Some(ref model) = cli.model {
        config.transcribe.model = model.clone();
    }
}

fn list_devices() -> anyhow::Result<()> {
    let devices = voxcap::audio::list_input_devices()?;
    if devices.is_empty() {
        println!("No audio input devices found");
        return Ok(());
    }
    println!("Audio input devices:");
    for name in devices {
        println!("  {}", name);
    }
    Ok(())
}

fn show_config(config: &Config) -> anyhow::Result<()> {
    if let Some(path) = Config::default_path() {
        println!("# config file: {}", path.display());
    }
    let toml = toml::to_string_pretty(config).context("serializing config")?;
    print!("{}", toml);
    Ok(())
}

fn init_config_file() -> anyhow::Result<()> {
    let path = Config::default_path().context("could not determine config directory")?;

    if path.exists() {
        anyhow::bail!("config file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("writing {}", path.display()))?;

    println!("Wrote default config to {}", path.display());
    Ok(())
}
