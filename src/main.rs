use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use twinwatch::duration::parse_duration;
use twinwatch::{ExportReport, Input, RunOptions, Settings};
use twinwatch_core::{GasSensorReducer, GridNodeReducer};

#[derive(Parser, Debug)]
#[command(name = "twinwatch")]
#[command(about = "Classify gas sensor and grid node telemetry into alerts and incident state")]
struct Args {
    /// TOML settings file ([gas] and [dispatch] sections)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Track gas sensor readings
    Gas(GasArgs),
    /// Track grid node conditions
    Grid(CommonArgs),
}

#[derive(ClapArgs, Debug)]
struct CommonArgs {
    /// Read newline-delimited JSON envelopes from a file (default: stdin)
    #[arg(short, long, conflicts_with = "connect")]
    input: Option<PathBuf>,

    /// Read envelopes from a TCP endpoint (host:port)
    #[arg(short, long)]
    connect: Option<String>,

    /// Append alerts to this file instead of printing them
    #[arg(short, long)]
    alerts: Option<PathBuf>,

    /// Load entity state from this file and save it back after the run
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Write a JSON summary of the run to this file
    #[arg(short, long)]
    export: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct GasArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// How long a reading may stay over the limit before alerting (e.g. "15m", "15ms")
    #[arg(long)]
    sustained_limit: Option<String>,

    /// Highest acceptable reading in ppm
    #[arg(long)]
    max_ppm: Option<u32>,

    /// Reading in ppm that alerts immediately
    #[arg(long)]
    spike_ppm: Option<u32>,
}

impl CommonArgs {
    fn input(&self) -> Input {
        Input::from_flags(self.input.clone(), self.connect.clone())
    }

    fn run_options(&self, settings: &Settings) -> RunOptions {
        RunOptions {
            alerts: self.alerts.clone(),
            state: self.state.clone(),
            max_batch: settings.dispatch.max_batch,
            channel_capacity: settings.dispatch.channel_capacity,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("twinwatch=info")),
        )
        .init();

    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref())?;

    match args.command {
        Command::Gas(gas) => {
            if let Some(limit) = gas.sustained_limit {
                parse_duration(&limit).context("invalid --sustained-limit")?;
                settings.gas.sustained_limit = limit;
            }
            if let Some(ppm) = gas.max_ppm {
                settings.gas.max_allowed_ppm = ppm;
            }
            if let Some(ppm) = gas.spike_ppm {
                settings.gas.spike_ppm = ppm;
            }
            let limits = settings.gas.limits()?;
            tracing::info!(?limits, "gas limits");

            let input = gas.common.input();
            let reader = input.open().await?;
            let result = twinwatch::run(
                GasSensorReducer::new(limits),
                reader,
                &input.describe(),
                &gas.common.run_options(&settings),
            )
            .await?;

            if let Some(path) = &gas.common.export {
                ExportReport::new("gas", &result).write(path)?;
                tracing::info!(path = %path.display(), "exported run summary");
            }
            anyhow::ensure!(!result.lines.read_error, "input ended on a read error");
        }
        Command::Grid(common) => {
            let input = common.input();
            let reader = input.open().await?;
            let result = twinwatch::run(
                GridNodeReducer,
                reader,
                &input.describe(),
                &common.run_options(&settings),
            )
            .await?;

            if let Some(path) = &common.export {
                ExportReport::grid(&result).write(path)?;
                tracing::info!(path = %path.display(), "exported run summary");
            }
            anyhow::ensure!(!result.lines.read_error, "input ended on a read error");
        }
    }

    Ok(())
}
