//! ordersim CLI: run a submission plan over a bar series.
//!
//! Commands:
//! - `run`: load bars (CSV) and a plan (TOML), run the trader, emit JSON
//! - `check`: validate a plan file without running it

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ordersim_core::config::{RunConfig, RunId};
use ordersim_core::data::load_bars;
use ordersim_core::engine::{run_plan, RunResult};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ordersim", about = "ordersim: order lifecycle simulator")]
struct Cli {
    /// Log filter when RUST_LOG is unset (e.g. info, debug, ordersim_core=trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a plan over a bar series.
    Run {
        /// CSV file with timestamp,open,high,low,close[,volume].
        #[arg(long)]
        bars: PathBuf,

        /// TOML plan file.
        #[arg(long)]
        plan: PathBuf,

        /// Write the result JSON here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a plan file and print its run id.
    Check {
        /// TOML plan file.
        #[arg(long)]
        plan: PathBuf,
    },
}

/// What `run` writes out.
#[derive(Serialize)]
struct RunOutput<'a> {
    run_id: RunId,
    result: &'a RunResult,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Run { bars, plan, output } => run_cmd(&bars, &plan, output.as_deref()),
        Commands::Check { plan } => check_cmd(&plan),
    }
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_cmd(bars_path: &Path, plan_path: &Path, output: Option<&Path>) -> Result<()> {
    let config = RunConfig::load(plan_path)
        .with_context(|| format!("loading plan {}", plan_path.display()))?;
    let run_id = config.run_id().context("computing run id")?;
    let plan = config.build_plan().context("building plan")?;
    let bars = load_bars(bars_path)
        .with_context(|| format!("loading bars {}", bars_path.display()))?;

    info!(run_id = %run_id, bars = bars.len(), orders = plan.len(), "starting run");
    let result = run_plan(&bars, plan, config.trader);

    let json = serde_json::to_string_pretty(&RunOutput {
        run_id: run_id.clone(),
        result: &result,
    })
    .context("serializing result")?;

    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "result written");
        }
        None => println!("{json}"),
    }

    eprintln!(
        "run {}: {} bars, {} fills, {} rejected, {} open | long {} @ {:.4} | short {} @ {:.4}",
        run_id.get(..12).unwrap_or(&run_id),
        result.bar_count(),
        result.fills.len(),
        result.rejection_count(),
        result.open_orders.len(),
        result.long.size(),
        result.long.price(),
        result.short.size(),
        result.short.price(),
    );
    Ok(())
}

fn check_cmd(plan_path: &Path) -> Result<()> {
    let config = RunConfig::load(plan_path)
        .with_context(|| format!("loading plan {}", plan_path.display()))?;
    let plan = config.build_plan().context("validating orders")?;
    let run_id = config.run_id().context("computing run id")?;

    println!("Plan: {}", plan_path.display());
    println!("Orders: {}", plan.len());
    println!("Bars referenced: {}", plan.timestamps().count());
    println!("Trigger mode: {:?}", config.trader.trigger_mode);
    println!("Execution mode: {:?}", config.trader.execution_mode);
    println!("Run id: {run_id}");
    Ok(())
}
