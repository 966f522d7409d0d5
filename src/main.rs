//! SegmentForge: RFM customer segmentation CLI
//!
//! This is the main entrypoint that orchestrates data loading, scoring,
//! reporting, and campaign list output.

use anyhow::{Context, Result};
use clap::Parser;
use segmentforge::{build_rfm_table, load_customers, report, run_campaigns, Args, CampaignConfig};
use std::time::Instant;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.verbose {
        println!("SegmentForge - RFM Customer Segmentation");
        println!("========================================\n");
    }

    run_full_pipeline(&args)
}

/// Log to stderr; RUST_LOG overrides the verbosity flag
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "segmentforge=debug"
    } else {
        "segmentforge=warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run the full segmentation pipeline
fn run_full_pipeline(args: &Args) -> Result<()> {
    println!("=== RFM Segmentation Pipeline ===\n");

    let start_time = Instant::now();

    let config = match &args.config {
        Some(path) => CampaignConfig::load(path)
            .with_context(|| format!("Failed to load campaign config {}", path.display()))?,
        None => CampaignConfig::default(),
    };
    let reference_date = args.resolve_reference_date(&config)?;

    // Step 1: Load data
    if args.verbose {
        println!("Step 1: Loading customer export");
        println!("  Input file: {}", args.input.display());
    }

    let data_start = Instant::now();
    let records = load_customers(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;

    println!("✓ Data loaded: {} customers", records.len());
    if args.verbose {
        println!("  Processing time: {:.2}s", data_start.elapsed().as_secs_f64());
    }

    report::print_channel_summary(&report::channel_summary(&records));
    report::print_top_customers(
        "Top Customers by Value",
        &report::top_customers_by_value(&records, args.top),
    );
    report::print_top_customers(
        "Top Customers by Orders",
        &report::top_customers_by_orders(&records, args.top),
    );

    // Step 2: Score and segment
    if args.verbose {
        println!("\nStep 2: Scoring customers");
        println!("  Reference date: {}", reference_date);
    }

    let score_start = Instant::now();
    let table = build_rfm_table(&records, reference_date).context("RFM scoring failed")?;

    println!("\n✓ Customers scored and segmented");
    if args.verbose {
        println!("  Scoring time: {:.2}s", score_start.elapsed().as_secs_f64());
    }

    let summaries = report::segment_summary(&table);
    report::print_segment_summary(&table, &summaries);

    if let Some(path) = &args.scores {
        table
            .write_csv_file(path)
            .with_context(|| format!("Failed to write score table {}", path.display()))?;
        println!("\nScore table saved to: {}", path.display());
    }

    // Step 3: Campaign lists
    if args.verbose {
        println!("\nStep 3: Writing campaign lists");
        println!("  Output directory: {}", args.output_dir.display());
    }

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;
    let results = run_campaigns(&table, &config.campaigns, &args.output_dir)
        .context("Failed to write campaign lists")?;

    println!("\n=== Campaigns ===");
    for result in &results {
        println!(
            "{}: {} customers -> {}",
            result.name,
            result.customer_ids.len(),
            result.path.display()
        );
    }

    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(())
}
