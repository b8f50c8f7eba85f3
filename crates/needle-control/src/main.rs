//! `needle-sim-control`: serves the simulation control plane over HTTP.
//!
//! ```bash
//! # One simulated tier with default properties and two pre-created files
//! needle-sim-control --file 1.dat --file 2.dat
//!
//! # A tier from a tier file
//! needle-sim-control --tiers tiers.toml --tier flaky --listen 0.0.0.0:9333
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use needle_backend::{BackendError, BackendStorage, TierConfig, TierKind, TierLoader};
use needle_sim::SimulationControl;

/// Serve the control plane for one simulated storage tier.
#[derive(Parser)]
#[command(name = "needle-sim-control")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on.
    #[arg(short, long, default_value = "127.0.0.1:9333")]
    listen: SocketAddr,

    /// TOML tier file. Without one, a simulation tier with default properties is used.
    #[arg(long)]
    tiers: Option<PathBuf>,

    /// Id of the simulation tier to control.
    #[arg(long, default_value = "simulation")]
    tier: String,

    /// File to create on the tier at startup. May be repeated.
    #[arg(short, long = "file")]
    files: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let tier = select_tier(&cli)?;
    if tier.kind != TierKind::Simulation {
        bail!("tier {} is a {} tier, not a simulation tier", tier.id, tier.kind);
    }

    let control = Arc::new(SimulationControl::new());
    // Fails fast on a production environment with fake writes requested.
    let storage =
        BackendStorage::build_with_process_fake_writes(&tier, Some(Arc::clone(&control)))?;
    if let BackendStorage::Simulation(simulated) = &storage {
        control.set_global_config(simulated.config());
    }

    for name in &cli.files {
        let file = storage.open(Path::new(name))?;
        tracing::info!(file = %name, kind = file.kind(), "created storage file");
    }

    needle_control::serve(cli.listen, control).await
}

fn select_tier(cli: &Cli) -> Result<TierConfig, BackendError> {
    let Some(path) = &cli.tiers else {
        return Ok(TierConfig::new(&cli.tier, TierKind::Simulation));
    };

    TierLoader::new()
        .with_file(path)
        .load()?
        .into_iter()
        .find(|tier| tier.id == cli.tier)
        .ok_or_else(|| BackendError::TierNotFound {
            id: cli.tier.clone(),
        })
}
