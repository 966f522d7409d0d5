//! Data loading and RFM metric computation
//!
//! Expected CSV columns:
//!   master_id, order_channel, last_order_channel, first_order_date,
//!   last_order_date, last_order_date_online, last_order_date_offline,
//!   order_num_total_ever_online, order_num_total_ever_offline,
//!   customer_value_total_ever_offline, customer_value_total_ever_online,
//!   interested_in_categories_12

use std::collections::{BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::RfmError;

/// Columns the loader refuses to run without.
pub const REQUIRED_COLUMNS: [&str; 12] = [
    "master_id",
    "order_channel",
    "last_order_channel",
    "first_order_date",
    "last_order_date",
    "last_order_date_online",
    "last_order_date_offline",
    "order_num_total_ever_online",
    "order_num_total_ever_offline",
    "customer_value_total_ever_offline",
    "customer_value_total_ever_online",
    "interested_in_categories_12",
];

/// One customer's order history as exported
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerOrderRecord {
    pub customer_id: String,
    pub order_channel: String,
    pub last_order_channel: String,
    pub first_order_date: NaiveDate,
    pub last_order_date: NaiveDate,
    pub last_order_date_online: Option<NaiveDate>,
    pub last_order_date_offline: Option<NaiveDate>,
    pub online_orders: u32,
    pub offline_orders: u32,
    pub online_value: f64,
    pub offline_value: f64,
    /// Upper-cased category labels bought in the trailing 12 months
    pub categories: BTreeSet<String>,
}

impl CustomerOrderRecord {
    /// Widened so two per-channel counts near `u32::MAX` cannot overflow
    pub fn total_orders(&self) -> u64 {
        u64::from(self.online_orders) + u64::from(self.offline_orders)
    }

    pub fn total_value(&self) -> f64 {
        self.online_value + self.offline_value
    }
}

/// Raw row as text, so every field can be validated with its column name
#[derive(Debug, Deserialize)]
struct RawRecord {
    master_id: String,
    order_channel: String,
    last_order_channel: String,
    first_order_date: Option<String>,
    last_order_date: Option<String>,
    last_order_date_online: Option<String>,
    last_order_date_offline: Option<String>,
    order_num_total_ever_online: String,
    order_num_total_ever_offline: String,
    customer_value_total_ever_offline: String,
    customer_value_total_ever_online: String,
    interested_in_categories_12: String,
}

impl RawRecord {
    fn into_record(self, line: u64) -> crate::Result<CustomerOrderRecord> {
        if self.master_id.is_empty() {
            return Err(RfmError::malformed(line, "master_id", "", "customer id is empty"));
        }

        let first_order_date = parse_required_date(line, "first_order_date", self.first_order_date)?;
        let last_order_date = parse_required_date(line, "last_order_date", self.last_order_date)?;
        let last_order_date_online =
            parse_optional_date(line, "last_order_date_online", self.last_order_date_online)?;
        let last_order_date_offline =
            parse_optional_date(line, "last_order_date_offline", self.last_order_date_offline)?;

        Ok(CustomerOrderRecord {
            customer_id: self.master_id,
            order_channel: self.order_channel,
            last_order_channel: self.last_order_channel,
            first_order_date,
            last_order_date,
            last_order_date_online,
            last_order_date_offline,
            online_orders: parse_count(
                line,
                "order_num_total_ever_online",
                &self.order_num_total_ever_online,
            )?,
            offline_orders: parse_count(
                line,
                "order_num_total_ever_offline",
                &self.order_num_total_ever_offline,
            )?,
            online_value: parse_amount(
                line,
                "customer_value_total_ever_online",
                &self.customer_value_total_ever_online,
            )?,
            offline_value: parse_amount(
                line,
                "customer_value_total_ever_offline",
                &self.customer_value_total_ever_offline,
            )?,
            categories: parse_categories(&self.interested_in_categories_12),
        })
    }
}

/// Load customer records from a CSV reader.
///
/// The whole batch is rejected on the first malformed row.
pub fn load_customers_from_reader<R: Read>(reader: R) -> crate::Result<Vec<CustomerOrderRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(RfmError::malformed(1, column, "", "missing required column"));
        }
    }

    let mut seen_ids = HashSet::new();
    let mut records = Vec::new();
    for result in csv_reader.records() {
        let row = result?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let raw: RawRecord = row.deserialize(Some(&headers))?;
        let record = raw.into_record(line)?;

        if !seen_ids.insert(record.customer_id.clone()) {
            return Err(RfmError::malformed(
                line,
                "master_id",
                record.customer_id,
                "duplicate customer id",
            ));
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(RfmError::EmptyPopulation);
    }

    debug!(rows = records.len(), "parsed customer rows");
    Ok(records)
}

/// Load customer records from a CSV file path.
pub fn load_customers<P: AsRef<Path>>(path: P) -> crate::Result<Vec<CustomerOrderRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let records = load_customers_from_reader(file)?;
    info!(path = %path.display(), customers = records.len(), "loaded customer export");
    Ok(records)
}

/// Per-customer recency/frequency/monetary values
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerMetrics {
    pub customer_id: String,
    /// Days between the last order and the reference date
    pub recency: i64,
    pub frequency: u64,
    pub monetary: f64,
    pub categories: BTreeSet<String>,
}

/// Compute RFM metrics for every customer against a fixed reference date.
///
/// A last order after the reference date means the cutoff is wrong for this
/// export, so the record is rejected instead of producing negative recency.
pub fn compute_metrics(
    records: &[CustomerOrderRecord],
    reference_date: NaiveDate,
) -> crate::Result<Vec<CustomerMetrics>> {
    if records.is_empty() {
        return Err(RfmError::EmptyPopulation);
    }

    records
        .iter()
        .map(|record| {
            let recency = (reference_date - record.last_order_date).num_days();
            if recency < 0 {
                return Err(RfmError::InvalidRecord {
                    customer_id: record.customer_id.clone(),
                    reason: format!(
                        "last_order_date {} is after reference date {}",
                        record.last_order_date, reference_date
                    ),
                });
            }

            Ok(CustomerMetrics {
                customer_id: record.customer_id.clone(),
                recency,
                frequency: record.total_orders(),
                monetary: record.total_value(),
                categories: record.categories.clone(),
            })
        })
        .collect()
}

/// Parse a date given as `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Split a list field such as `[WOMEN, AKTIFSPOR]` into upper-cased labels.
pub fn parse_categories(value: &str) -> BTreeSet<String> {
    value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|label| label.trim().trim_matches(|c: char| c == '\'' || c == '"').trim())
        .filter(|label| !label.is_empty())
        .map(str::to_uppercase)
        .collect()
}

fn parse_required_date(line: u64, column: &str, value: Option<String>) -> crate::Result<NaiveDate> {
    match value {
        Some(text) => parse_date(&text)
            .ok_or_else(|| RfmError::malformed(line, column, text, "unparseable date")),
        None => Err(RfmError::malformed(line, column, "", "required date is missing")),
    }
}

fn parse_optional_date(
    line: u64,
    column: &str,
    value: Option<String>,
) -> crate::Result<Option<NaiveDate>> {
    value
        .map(|text| {
            parse_date(&text).ok_or_else(|| RfmError::malformed(line, column, text, "unparseable date"))
        })
        .transpose()
}

// Exports store counts as floats ("4.0"), so accept those when integral.
fn parse_count(line: u64, column: &str, value: &str) -> crate::Result<u32> {
    let number: f64 = value
        .parse()
        .map_err(|_| RfmError::malformed(line, column, value, "not a number"))?;
    if !number.is_finite() || number < 0.0 {
        return Err(RfmError::malformed(line, column, value, "must be a non-negative count"));
    }
    if number.fract() != 0.0 || number > u32::MAX as f64 {
        return Err(RfmError::malformed(line, column, value, "must be a whole number"));
    }
    Ok(number as u32)
}

fn parse_amount(line: u64, column: &str, value: &str) -> crate::Result<f64> {
    let number: f64 = value
        .parse()
        .map_err(|_| RfmError::malformed(line, column, value, "not a number"))?;
    if !number.is_finite() || number < 0.0 {
        return Err(RfmError::malformed(line, column, value, "must be a non-negative amount"));
    }
    Ok(number)
}
