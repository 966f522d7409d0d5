//! SegmentForge: A Rust CLI application for RFM customer segmentation
//!
//! This library scores customers by Recency, Frequency and Monetary value
//! using population quintiles, maps recency/frequency score pairs to named
//! marketing segments, and selects customer cohorts for targeted campaigns.

pub mod campaign;
pub mod cli;
pub mod data;
pub mod error;
pub mod model;
pub mod report;
pub mod segment;

// Re-export public items for easier access
pub use campaign::{run_campaigns, Campaign, CampaignConfig, CampaignResult};
pub use cli::Args;
pub use data::{compute_metrics, load_customers, CustomerMetrics, CustomerOrderRecord};
pub use error::RfmError;
pub use model::{build_rfm_table, compute_scores, RfmRow, RfmScores, RfmTable};
pub use segment::{Score, Segment};

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, RfmError>;
