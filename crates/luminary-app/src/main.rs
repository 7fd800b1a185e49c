use std::{
    fs,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use clap::Parser;
use luminary_app::{
    command::{DEFAULT_COMMAND_CAPACITY, command_bus},
    renderer::{Renderer, RendererContext},
    terminal::TerminalRenderer,
};
use luminary_core::{Engine, LuminaryConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "luminary-app",
    version,
    about = "Drive the luminary light display in a terminal"
)]
struct Cli {
    /// JSON engine configuration; omitted fields keep their defaults.
    #[arg(long, env = "LUMINARY_CONFIG")]
    config: Option<PathBuf>,

    /// Seed for the engine RNG (random when unset).
    #[arg(long, env = "LUMINARY_SEED")]
    seed: Option<u64>,

    /// Epochs simulated before the first frame is drawn.
    #[arg(long, env = "LUMINARY_INIT_EPOCHS")]
    init_epochs: Option<u64>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let engine = Engine::new(config).context("invalid engine configuration")?;
    info!(seed = engine.seed(), "Starting luminary display");

    let (command_drain, command_submit) = command_bus(DEFAULT_COMMAND_CAPACITY);
    let renderer = TerminalRenderer;
    info!(renderer = renderer.name(), "Launching renderer");
    renderer.run(RendererContext {
        engine: Arc::new(Mutex::new(engine)),
        command_drain,
        command_submit,
    })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<LuminaryConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => LuminaryConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.rng_seed = Some(seed);
    }
    if let Some(epochs) = cli.init_epochs {
        config.initialization_epochs = epochs;
    }
    Ok(config)
}
