use log::warn;
use serde::Serialize;

use crate::corpora::{decode_utf8_dropping_invalid, RecordResult};
use crate::preprocessing::DecodePolicy;

/// Length distribution of non-empty trimmed records, in characters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LengthStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: usize,
    pub max: usize,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl LengthStats {
    /// Returns `None` for an empty set of lengths.
    pub fn from_lengths(mut lengths: Vec<usize>) -> Option<Self> {
        if lengths.is_empty() {
            return None;
        }
        lengths.sort_unstable();

        let count = lengths.len();
        let sum: f64 = lengths.iter().map(|&len| len as f64).sum();

        Some(Self {
            count,
            mean: sum / count as f64,
            median: percentile(&lengths, 50.0),
            min: lengths[0],
            max: lengths[count - 1],
            p90: percentile(&lengths, 90.0),
            p95: percentile(&lengths, 95.0),
            p99: percentile(&lengths, 99.0),
        })
    }
}

/// Linear interpolation between closest ranks over sorted values.
fn percentile(sorted: &[usize], q: f64) -> f64 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] as f64 + (sorted[upper] as f64 - sorted[lower] as f64) * weight
}

/// Collects trimmed character lengths of every readable, non-empty record.
pub fn record_lengths<I>(records: I, policy: DecodePolicy) -> Vec<usize>
where
    I: IntoIterator<Item = RecordResult>,
{
    let mut lengths = Vec::new();
    for record in records {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!("{err}");
                continue;
            }
        };
        let len = match (std::str::from_utf8(&record.content), policy) {
            (Ok(text), _) => text.trim().chars().count(),
            (Err(_), DecodePolicy::IgnoreInvalid) => {
                decode_utf8_dropping_invalid(&record.content, true)
                    .text
                    .trim()
                    .chars()
                    .count()
            }
            (Err(err), DecodePolicy::Skip) => {
                warn!("skipping {}: not valid UTF-8 ({err})", record.source.display());
                continue;
            }
        };
        if len > 0 {
            lengths.push(len);
        }
    }
    lengths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpora::Record;

    #[test]
    fn percentiles_interpolate_between_ranks() {
        let stats = LengthStats::from_lengths(vec![10, 40, 20, 30]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, 10);
        assert_eq!(stats.max, 40);
        assert!((stats.mean - 25.0).abs() < 1e-9);
        assert!((stats.median - 25.0).abs() < 1e-9);
        assert!((stats.p90 - 37.0).abs() < 1e-9);
        assert!((stats.p99 - 39.7).abs() < 1e-9);
    }

    #[test]
    fn single_value_has_flat_distribution() {
        let stats = LengthStats::from_lengths(vec![7]).unwrap();
        assert_eq!(stats.median, 7.0);
        assert_eq!(stats.p95, 7.0);
    }

    #[test]
    fn empty_input_has_no_stats() {
        assert!(LengthStats::from_lengths(Vec::new()).is_none());
    }

    #[test]
    fn lengths_skip_empty_records() {
        let records = vec![
            Ok(Record::new("a.abc", "  abc  ")),
            Ok(Record::new("b.abc", "\n\n")),
            Ok(Record::new("c.abc", "♪♪")),
        ];
        assert_eq!(record_lengths(records, DecodePolicy::Skip), vec![3, 2]);
    }
}
