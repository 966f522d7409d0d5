//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

use crate::campaign::CampaignConfig;

/// Default analysis cutoff for the bundled export
pub const DEFAULT_REFERENCE_DATE: &str = "2021-06-01";

/// RFM customer segmentation and campaign targeting CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV export
    #[arg(short, long, default_value = "flo_data_20k.csv")]
    pub input: PathBuf,

    /// Analysis cutoff date used for recency (YYYY-MM-DD).
    /// Overrides the campaign file; defaults to 2021-06-01
    #[arg(short, long)]
    pub reference_date: Option<String>,

    /// YAML file with campaign definitions
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory the campaign id lists are written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Also write the full score table to this CSV file
    #[arg(long)]
    pub scores: Option<PathBuf>,

    /// Number of customers in the top-customer reports
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Pick the reference date: command line, then campaign file, then default
    pub fn resolve_reference_date(&self, config: &CampaignConfig) -> anyhow::Result<NaiveDate> {
        if let Some(ref text) = self.reference_date {
            return NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                .map_err(|_| anyhow::anyhow!("Invalid reference date: {}", text));
        }
        if let Some(date) = config.reference_date {
            return Ok(date);
        }
        Ok(NaiveDate::parse_from_str(DEFAULT_REFERENCE_DATE, "%Y-%m-%d")?)
    }
}
