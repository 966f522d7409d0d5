//! Quantile scoring and the RFM score table

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::data::{compute_metrics, CustomerMetrics, CustomerOrderRecord};
use crate::error::RfmError;
use crate::segment::{rf_code, Score, Segment};

/// Number of quantile buckets per metric
pub const SCORE_LEVELS: usize = Score::ALL.len();

/// Quantile scores for one customer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfmScores {
    pub recency: Score,
    pub frequency: Score,
    pub monetary: Score,
}

/// One row of the score table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfmRow {
    pub customer_id: String,
    pub recency: i64,
    pub frequency: u64,
    pub monetary: f64,
    pub recency_score: Score,
    pub frequency_score: Score,
    pub monetary_score: Score,
    pub rf_code: String,
    pub segment: Segment,
    #[serde(skip)]
    pub categories: BTreeSet<String>,
}

/// Scored and segmented customer population, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct RfmTable {
    pub rows: Vec<RfmRow>,
}

impl RfmTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Ids of customers in any of `segments` who bought any of `categories`
    /// in the last 12 months. Category labels compare case-insensitively.
    pub fn filter_segment(&self, segments: &[Segment], categories: &[String]) -> Vec<String> {
        let wanted: BTreeSet<String> = categories
            .iter()
            .map(|c| c.trim().to_uppercase())
            .collect();

        self.rows
            .iter()
            .filter(|row| segments.contains(&row.segment))
            .filter(|row| row.categories.iter().any(|c| wanted.contains(c)))
            .map(|row| row.customer_id.clone())
            .collect()
    }

    /// Customer count per segment
    pub fn segment_sizes(&self) -> BTreeMap<Segment, usize> {
        let mut sizes = BTreeMap::new();
        for row in &self.rows {
            *sizes.entry(row.segment).or_insert(0) += 1;
        }
        sizes
    }

    /// Write the full table as CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> crate::Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_csv_file<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        self.write_csv(file)?;
        info!(path = %path.as_ref().display(), rows = self.rows.len(), "wrote score table");
        Ok(())
    }
}

/// Linear-interpolated quantile edges at 0, 1/k, ..., 1 over sorted values.
fn quantile_edges(sorted: &[f64], buckets: usize) -> Vec<f64> {
    let last = (sorted.len() - 1) as f64;
    (0..=buckets)
        .map(|i| {
            let pos = last * i as f64 / buckets as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        })
        .collect()
}

/// Cut `values` into `buckets` quantile bins and return the 0-based bin of
/// each value, in input order.
///
/// Bins are right-closed: `(edge[i], edge[i + 1]]`, with the first bin also
/// holding the minimum. Equal values therefore always share a bin, and a tie
/// sitting on an edge lands in the lower bin. Fails if the column has fewer
/// distinct values than bins, or if any bin would be empty.
pub fn quantile_buckets(metric: &str, values: &[f64], buckets: usize) -> crate::Result<Vec<usize>> {
    if values.is_empty() {
        return Err(RfmError::EmptyPopulation);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut distinct = sorted.clone();
    distinct.dedup();
    let degenerate = || RfmError::DegenerateDistribution {
        metric: metric.to_string(),
        distinct: distinct.len(),
        buckets,
    };

    if distinct.len() < buckets {
        return Err(degenerate());
    }

    let edges = quantile_edges(&sorted, buckets);
    if edges.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(degenerate());
    }

    let upper = &edges[1..];
    let assigned: Vec<usize> = values
        .iter()
        .map(|v| upper.partition_point(|edge| edge < v).min(buckets - 1))
        .collect();

    let mut sizes = vec![0usize; buckets];
    for &bucket in &assigned {
        sizes[bucket] += 1;
    }
    if sizes.contains(&0) {
        return Err(degenerate());
    }

    debug!(metric, ?edges, ?sizes, "quantile cut");
    Ok(assigned)
}

/// Rank values 1..=n, breaking ties by first appearance.
pub fn first_seen_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    for (rank, index) in order.into_iter().enumerate() {
        ranks[index] = (rank + 1) as f64;
    }
    ranks
}

/// Assign recency, frequency and monetary quintile scores.
///
/// Recency is inverted: the smallest recency (freshest customer) scores 5.
/// Frequency is ranked first so heavily tied order counts still spread over
/// all five scores.
pub fn compute_scores(metrics: &[CustomerMetrics]) -> crate::Result<Vec<RfmScores>> {
    if metrics.is_empty() {
        return Err(RfmError::EmptyPopulation);
    }
    if let Some(bad) = metrics.iter().find(|m| !m.monetary.is_finite()) {
        return Err(RfmError::InvalidRecord {
            customer_id: bad.customer_id.clone(),
            reason: format!("monetary value {} is not finite", bad.monetary),
        });
    }

    let recency: Vec<f64> = metrics.iter().map(|m| m.recency as f64).collect();
    let frequency: Vec<f64> = metrics.iter().map(|m| m.frequency as f64).collect();
    let monetary: Vec<f64> = metrics.iter().map(|m| m.monetary).collect();

    let recency_buckets = quantile_buckets("recency", &recency, SCORE_LEVELS)?;
    let frequency_buckets =
        quantile_buckets("frequency", &first_seen_ranks(&frequency), SCORE_LEVELS)?;
    let monetary_buckets = quantile_buckets("monetary", &monetary, SCORE_LEVELS)?;

    Ok(recency_buckets
        .into_iter()
        .zip(frequency_buckets)
        .zip(monetary_buckets)
        .map(|((r, f), m)| RfmScores {
            recency: Score::descending(r),
            frequency: Score::ascending(f),
            monetary: Score::ascending(m),
        })
        .collect())
}

/// Attach rf_code and segment to scored metrics.
pub fn assign_segments(metrics: Vec<CustomerMetrics>, scores: &[RfmScores]) -> RfmTable {
    let rows = metrics
        .into_iter()
        .zip(scores)
        .map(|(m, s)| RfmRow {
            customer_id: m.customer_id,
            recency: m.recency,
            frequency: m.frequency,
            monetary: m.monetary,
            recency_score: s.recency,
            frequency_score: s.frequency,
            monetary_score: s.monetary,
            rf_code: rf_code(s.recency, s.frequency),
            segment: Segment::classify(s.recency, s.frequency),
            categories: m.categories,
        })
        .collect();

    RfmTable { rows }
}

/// Run the whole metrics, scoring and segmentation pass
///
/// # Arguments
/// * `records` - Loaded customer order records
/// * `reference_date` - Analysis cutoff used for recency
///
/// # Returns
/// * `RfmTable` with one row per customer, in input order
pub fn build_rfm_table(
    records: &[CustomerOrderRecord],
    reference_date: NaiveDate,
) -> crate::Result<RfmTable> {
    let metrics = compute_metrics(records, reference_date)?;
    let scores = compute_scores(&metrics)?;
    let table = assign_segments(metrics, &scores);
    info!(customers = table.len(), %reference_date, "scored customer population");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(id: &str, recency: i64, frequency: u64, monetary: f64, cats: &[&str]) -> CustomerMetrics {
        CustomerMetrics {
            customer_id: id.to_string(),
            recency,
            frequency,
            monetary,
            categories: cats.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn population(n: usize) -> Vec<CustomerMetrics> {
        (0..n)
            .map(|i| {
                metrics(
                    &format!("c{}", i),
                    (i as i64 * 7) % 97 + 1,
                    (i % 4) as u64 + 1,
                    (i as f64 * 13.7) % 500.0 + 10.0,
                    &["WOMEN"],
                )
            })
            .collect()
    }

    #[test]
    fn test_quantile_edges_interpolate() {
        let edges = quantile_edges(&[1.0, 2.0, 3.0, 4.0, 5.0], 5);
        let expected = [1.0, 1.8, 2.6, 3.4, 4.2, 5.0];
        for (e, x) in edges.iter().zip(expected) {
            assert!((e - x).abs() < 1e-9);
        }
    }

    #[test]
    fn test_buckets_are_balanced_and_monotone() {
        let values: Vec<f64> = (0..23).map(|i| ((i * 17) % 23) as f64).collect();
        let buckets = quantile_buckets("m", &values, 5).unwrap();

        let mut sizes = [0usize; 5];
        for &b in &buckets {
            sizes[b] += 1;
        }
        let max = *sizes.iter().max().unwrap();
        let min = *sizes.iter().min().unwrap();
        assert!(max - min <= 23_usize.div_ceil(5));

        for i in 0..values.len() {
            for j in 0..values.len() {
                if values[i] < values[j] {
                    assert!(buckets[i] <= buckets[j]);
                }
            }
        }
    }

    #[test]
    fn test_ties_share_a_bucket() {
        let values = [10.0, 20.0, 20.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0];
        let buckets = quantile_buckets("monetary", &values, 5).unwrap();
        assert_eq!(buckets[1], buckets[2]);
        assert_eq!(buckets[2], buckets[3]);
        assert_eq!(buckets[0], 0);
        assert_eq!(buckets[9], 4);
    }

    #[test]
    fn test_too_few_distinct_values_fails() {
        let values = [1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0];
        let err = quantile_buckets("frequency", &values, 5).unwrap_err();
        match err {
            RfmError::DegenerateDistribution { metric, distinct, buckets } => {
                assert_eq!(metric, "frequency");
                assert_eq!(distinct, 4);
                assert_eq!(buckets, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_skewed_column_fails_loudly() {
        let mut values = vec![1.0; 20];
        values.extend([2.0, 3.0, 4.0, 5.0]);
        assert!(matches!(
            quantile_buckets("recency", &values, 5),
            Err(RfmError::DegenerateDistribution { .. })
        ));
    }

    #[test]
    fn test_empty_column_fails() {
        assert!(matches!(
            quantile_buckets("recency", &[], 5),
            Err(RfmError::EmptyPopulation)
        ));
    }

    #[test]
    fn test_first_seen_ranks() {
        let ranks = first_seen_ranks(&[3.0, 1.0, 3.0, 1.0, 2.0]);
        assert_eq!(ranks, vec![4.0, 1.0, 5.0, 2.0, 3.0]);
    }

    #[test]
    fn test_frequency_survives_heavy_ties() {
        // Only two distinct order counts, but ranking spreads them over all scores.
        let pop: Vec<CustomerMetrics> = (0..10)
            .map(|i| metrics(&format!("c{}", i), i as i64 + 1, if i < 8 { 1 } else { 2 }, i as f64 + 1.0, &[]))
            .collect();
        let scores = compute_scores(&pop).unwrap();

        let levels: BTreeSet<Score> = scores.iter().map(|s| s.frequency).collect();
        assert_eq!(levels.len(), 5);
        assert_eq!(scores[0].frequency, Score::One);
        assert_eq!(scores[9].frequency, Score::Five);
    }

    #[test]
    fn test_recency_is_inverted() {
        let pop: Vec<CustomerMetrics> = (0..10)
            .map(|i| metrics(&format!("c{}", i), (i as i64 + 1) * 10, i as u64 + 1, i as f64 + 1.0, &[]))
            .collect();
        let scores = compute_scores(&pop).unwrap();

        assert_eq!(scores[0].recency, Score::Five);
        assert_eq!(scores[9].recency, Score::One);
        assert_eq!(scores[0].monetary, Score::One);
        assert_eq!(scores[9].monetary, Score::Five);
        for pair in scores.windows(2) {
            assert!(pair[0].recency >= pair[1].recency);
            assert!(pair[0].frequency <= pair[1].frequency);
        }
    }

    #[test]
    fn test_table_has_one_row_per_customer() {
        let pop = population(40);
        let scores = compute_scores(&pop).unwrap();
        let table = assign_segments(pop.clone(), &scores);

        assert_eq!(table.len(), 40);
        for (row, m) in table.rows.iter().zip(&pop) {
            assert_eq!(row.customer_id, m.customer_id);
            assert_eq!(row.rf_code, rf_code(row.recency_score, row.frequency_score));
            assert_eq!(row.segment, Segment::classify(row.recency_score, row.frequency_score));
        }
        assert_eq!(table.segment_sizes().values().sum::<usize>(), 40);
    }

    fn scored_row(id: &str, r: u8, f: u8, cats: &[&str]) -> RfmRow {
        let recency = Score::new(r).unwrap();
        let frequency = Score::new(f).unwrap();
        RfmRow {
            customer_id: id.to_string(),
            recency: 0,
            frequency: 1,
            monetary: 1.0,
            recency_score: recency,
            frequency_score: frequency,
            monetary_score: Score::Three,
            rf_code: rf_code(recency, frequency),
            segment: Segment::classify(recency, frequency),
            categories: cats.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn hand_table() -> RfmTable {
        RfmTable {
            rows: vec![
                scored_row("a", 5, 5, &["WOMEN", "MEN"]),
                scored_row("b", 5, 4, &["KIDS"]),
                scored_row("c", 3, 3, &["WOMEN"]),
                scored_row("d", 1, 5, &["MEN"]),
                scored_row("e", 4, 4, &["AKTIFSPOR"]),
                scored_row("f", 5, 1, &["KIDS", "MEN"]),
            ],
        }
    }

    #[test]
    fn test_filter_single_champion_in_women() {
        let table = hand_table();
        let ids = table.filter_segment(
            &[Segment::Champions, Segment::LoyalCustomers],
            &["WOMEN".to_string()],
        );
        assert_eq!(ids, vec!["a".to_string()]);
    }

    #[test]
    fn test_filter_is_idempotent_and_order_independent() {
        let table = hand_table();
        let segments = [Segment::CantLoose, Segment::NewCustomers, Segment::AboutToSleep];
        let categories = ["MEN".to_string(), "kids".to_string()];

        let first = table.filter_segment(&segments, &categories);
        let again = table.filter_segment(&segments, &categories);
        assert_eq!(first, again);

        let mut reversed_segments = segments;
        reversed_segments.reverse();
        let reversed_categories = [categories[1].clone(), categories[0].clone()];
        let reordered = table.filter_segment(&reversed_segments, &reversed_categories);
        assert_eq!(first, reordered);

        assert_eq!(first, vec!["d".to_string(), "f".to_string()]);
        let population: BTreeSet<&str> = table.rows.iter().map(|r| r.customer_id.as_str()).collect();
        assert!(first.iter().all(|id| population.contains(id.as_str())));
    }

    #[test]
    fn test_write_csv_header_and_values() {
        let table = hand_table();
        let mut buffer = Vec::new();
        table.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "customer_id,recency,frequency,monetary,recency_score,frequency_score,monetary_score,rf_code,segment"
        );
        assert_eq!(lines.next().unwrap(), "a,0,1,1.0,5,5,3,55,champions");
    }
}
