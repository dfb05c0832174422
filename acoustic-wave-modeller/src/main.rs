use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use acoustic_wave_modeller::config::Config;
use acoustic_wave_modeller::{io, SpaceOrder};

#[derive(Parser)]
#[command(
    name = "acoustic-wave-modeller",
    about = "2-D acoustic finite-difference modelling of shot gathers"
)]
struct Cli {
    /// TOML run configuration
    config: PathBuf,

    /// Output directory for shot_XXX.npy gathers
    #[arg(short = 'o', long, default_value = "output")]
    output: PathBuf,

    /// Number of Rayon worker threads (overrides [execution] threads)
    #[arg(long)]
    threads: Option<usize>,

    /// Save a pressure snapshot every N steps
    #[arg(long)]
    snapshots: Option<usize>,

    /// Spatial order of accuracy, 2 or 4
    #[arg(long, value_parser = parse_order)]
    order: Option<SpaceOrder>,
}

fn parse_order(s: &str) -> std::result::Result<SpaceOrder, String> {
    let order: u8 = s.parse().map_err(|e| format!("invalid order '{s}': {e}"))?;
    SpaceOrder::try_from(order)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("acoustic_wave_modeller=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_file(&cli.config)?;
    if let Some(order) = cli.order {
        config.time.order = order;
    }
    if let Some(interval) = cli.snapshots {
        config.time.snapshot_interval = Some(interval);
    }
    if let Some(threads) = cli.threads.or(config.execution.threads) {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure the rayon thread pool")?;
    }

    let setup = config.build()?;
    config.log_summary(&setup);

    let start = Instant::now();
    let records = setup
        .survey
        .run(setup.grid, setup.model.clone(), setup.params)
        .context("simulation failed")?;
    info!(elapsed_s = start.elapsed().as_secs_f64(), "survey finished");

    fs::create_dir_all(&cli.output)
        .with_context(|| format!("failed to create '{}'", cli.output.display()))?;
    for (idx, record) in records.iter().enumerate() {
        let path = cli.output.join(format!("shot_{idx:03}.npy"));
        io::save_gather(&record.gather, &path)?;
        info!(path = %path.display(), "wrote gather");
        if !record.snapshots.is_empty() {
            let path = cli.output.join(format!("shot_{idx:03}_snapshots.npy"));
            io::save_snapshots(&record.snapshots, &path)?;
            info!(path = %path.display(), count = record.snapshots.len(), "wrote snapshots");
        }
    }

    Ok(())
}
