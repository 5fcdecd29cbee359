//! Reconciler Service - Builds the per-municipality, per-year base table
//!
//! Responsibilities:
//! - Load the protected-area registry, the alert series and the region lookup
//! - Run the reconciliation pipeline
//! - Write the final table, the yearly rollup and a run report
//!
//! Usage:
//!   cargo run --bin reconciler -- --config config/sources.json
//!   cargo run --bin reconciler -- --config config/sources.json --state "Santa Catarina" --parallel

use anyhow::{Context, Result};
use clap::Parser;
use reconciler::config::{load_sources_config, Config};
use reconciler::cumulative::JoinStrategy;
use reconciler::sink::{write_final_csv, write_report, write_yearly_csv, RunReport};
use reconciler::sources::load_all;
use reconciler::{run, PipelineOptions};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "reconciler", about = "Reconciles protected areas with environmental alerts")]
struct Args {
    /// Path to sources config file
    #[arg(long)]
    config: PathBuf,

    /// Final table path (default: $OUTPUT_DIR/base_final.csv)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Run report path (default: $OUTPUT_DIR/run_report.json)
    #[arg(long)]
    report: Option<PathBuf>,

    /// Also write alerts rolled up per year
    #[arg(long)]
    yearly_output: Option<PathBuf>,

    /// Keep only alerts from this state (overrides the config file)
    #[arg(long)]
    state: Option<String>,

    /// Resolve cumulative counts on all cores
    #[arg(long, default_value = "false")]
    parallel: bool,

    /// Dry run - don't write any output
    #[arg(long, default_value = "false")]
    dry_run: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reconciler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let env = Config::from_env();

    println!("=== Reconciler ===");
    println!("Config: {}", args.config.display());
    println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });

    let sources = load_sources_config(&args.config).context("Failed to load sources config")?;
    info!(version = %sources.version, "sources config loaded");

    let options = PipelineOptions {
        state_filter: args.state.clone().or_else(|| sources.state_filter.clone()),
        join_strategy: if args.parallel {
            JoinStrategy::Parallel
        } else {
            JoinStrategy::Sequential
        },
    };
    if let Some(state) = &options.state_filter {
        println!("State filter: {}", state);
    }

    // Every source must load before any stage runs
    let (inputs, provenance) = load_all(&sources).context("Failed to load sources")?;
    for p in &provenance {
        println!("  {} | {} rows | {}", p.source, p.rows, p.content_hash);
    }

    let output = run(inputs, &options);

    println!("\nReconciled {} rows", output.rows.len());
    for (i, row) in output.rows.iter().take(3).enumerate() {
        println!(
            "  [{}] {} | {} | {} | {} UCs | {:.4} ha",
            i + 1,
            row.year,
            row.municipality_key,
            row.region.as_deref().unwrap_or("-"),
            row.cumulative_reference_count,
            row.total_area
        );
    }
    if output.rows.len() > 3 {
        println!("  ... and {} more", output.rows.len() - 3);
    }

    let cleaning = &output.cleaning;
    println!(
        "Dropped: {} references, {} alerts ({} no signal), {} unparseable area tokens",
        cleaning.references_read - cleaning.references_kept,
        cleaning.alerts_read - cleaning.alerts_kept,
        cleaning.alerts_no_signal,
        cleaning.rejected_area_tokens
    );
    println!(
        "Municipalities without region: {} in alerts, {} in references",
        cleaning.unmatched_region_keys, cleaning.unmatched_reference_keys
    );

    if args.dry_run {
        println!("\nDry run - nothing written");
        return Ok(());
    }

    let output_path = args.output.unwrap_or_else(|| env.default_output());
    write_final_csv(&output_path, &output.rows).context("Failed to write final table")?;
    println!("\nFinal table: {}", output_path.display());

    if let Some(yearly_path) = &args.yearly_output {
        write_yearly_csv(yearly_path, &output.yearly).context("Failed to write yearly rollup")?;
        println!("Yearly rollup: {}", yearly_path.display());
    }

    let report_path = args.report.unwrap_or_else(|| env.default_report());
    let report = RunReport::new(&output, provenance, options.state_filter.clone());
    write_report(&report_path, &report).context("Failed to write run report")?;
    println!("Run report: {} (run {})", report_path.display(), report.run_id);

    println!("\n=== Reconciliation Complete ===");
    Ok(())
}
