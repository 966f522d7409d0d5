//! Summary tables over the loaded export and the score table

use std::collections::{BTreeMap, HashSet};

use crate::data::CustomerOrderRecord;
use crate::model::RfmTable;
use crate::segment::Segment;

/// Totals for one order channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSummary {
    pub channel: String,
    pub customers: usize,
    pub total_orders: u64,
    pub total_value: f64,
}

/// Mean metrics for one segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub count: usize,
    pub mean_recency: f64,
    pub mean_frequency: f64,
    pub mean_monetary: f64,
}

/// Distinct customers, orders and value per `order_channel`, sorted by channel.
pub fn channel_summary(records: &[CustomerOrderRecord]) -> Vec<ChannelSummary> {
    let mut groups: BTreeMap<&str, (HashSet<&str>, u64, f64)> = BTreeMap::new();
    for record in records {
        let entry = groups.entry(record.order_channel.as_str()).or_default();
        entry.0.insert(record.customer_id.as_str());
        entry.1 += record.total_orders();
        entry.2 += record.total_value();
    }

    groups
        .into_iter()
        .map(|(channel, (customers, total_orders, total_value))| ChannelSummary {
            channel: channel.to_string(),
            customers: customers.len(),
            total_orders,
            total_value,
        })
        .collect()
}

fn top_by<K, F>(records: &[CustomerOrderRecord], n: usize, key: F) -> Vec<String>
where
    K: PartialOrd,
    F: Fn(&CustomerOrderRecord) -> K,
{
    let mut ranked: Vec<&CustomerOrderRecord> = records.iter().collect();
    // Stable sort keeps input order among ties.
    ranked.sort_by(|a, b| {
        key(b)
            .partial_cmp(&key(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
        .into_iter()
        .take(n)
        .map(|record| record.customer_id.clone())
        .collect()
}

/// Ids of the `n` customers with the highest total value.
pub fn top_customers_by_value(records: &[CustomerOrderRecord], n: usize) -> Vec<String> {
    top_by(records, n, CustomerOrderRecord::total_value)
}

/// Ids of the `n` customers with the most orders.
pub fn top_customers_by_orders(records: &[CustomerOrderRecord], n: usize) -> Vec<String> {
    top_by(records, n, CustomerOrderRecord::total_orders)
}

/// Count and mean recency/frequency/monetary per segment, in segment order.
pub fn segment_summary(table: &RfmTable) -> Vec<SegmentSummary> {
    let mut sums: BTreeMap<Segment, (usize, f64, f64, f64)> = BTreeMap::new();
    for row in &table.rows {
        let entry = sums.entry(row.segment).or_default();
        entry.0 += 1;
        entry.1 += row.recency as f64;
        entry.2 += row.frequency as f64;
        entry.3 += row.monetary;
    }

    sums.into_iter()
        .map(|(segment, (count, recency, frequency, monetary))| {
            let n = count as f64;
            SegmentSummary {
                segment,
                count,
                mean_recency: recency / n,
                mean_frequency: frequency / n,
                mean_monetary: monetary / n,
            }
        })
        .collect()
}

/// Print channel totals to console
pub fn print_channel_summary(summaries: &[ChannelSummary]) {
    println!("\n=== Order Channels ===");
    println!("  {:<12} | {:>9} | {:>9} | {:>14}", "Channel", "Customers", "Orders", "Value");
    println!("  {:-<12}-|-{:->9}-|-{:->9}-|-{:->14}", "", "", "", "");
    for s in summaries {
        println!(
            "  {:<12} | {:>9} | {:>9} | {:>14.3}",
            s.channel, s.customers, s.total_orders, s.total_value
        );
    }
}

/// Print a ranked id list to console
pub fn print_top_customers(title: &str, ids: &[String]) {
    println!("\n=== {} ===", title);
    for (rank, id) in ids.iter().enumerate() {
        println!("  {:>2}. {}", rank + 1, id);
    }
}

/// Print per-segment statistics to console
pub fn print_segment_summary(table: &RfmTable, summaries: &[SegmentSummary]) {
    println!("\n=== Segment Statistics ===");
    println!("Total customers: {}", table.len());
    println!(
        "  {:<20} | {:>6} | {:>6} | {:>8} | {:>9} | {:>10}",
        "Segment", "Count", "Share", "Recency", "Frequency", "Monetary"
    );
    println!(
        "  {:-<20}-|-{:->6}-|-{:->6}-|-{:->8}-|-{:->9}-|-{:->10}",
        "", "", "", "", "", ""
    );
    for s in summaries {
        let percentage = (s.count as f64 / table.len() as f64) * 100.0;
        println!(
            "  {:<20} | {:>6} | {:>5.1}% | {:>8.1} | {:>9.2} | {:>10.2}",
            s.segment, s.count, percentage, s.mean_recency, s.mean_frequency, s.mean_monetary
        );
    }
}
