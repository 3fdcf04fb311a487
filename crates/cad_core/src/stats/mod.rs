use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticLog, Diagnostics};
use crate::domain::{
    IncidentRecord, MetricKind, ResponseTimeMetrics, ResponseTimeStatistics, ValidationWarning,
};
use crate::metrics::MetricsCalculator;
use crate::validate::validate_record;

/// Descriptive statistics of one metric's non-null sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Descriptive {
    pub mean: f64,
    pub median: f64,
    pub ninetieth_percentile: f64,
    pub standard_deviation: f64,
    pub min: f64,
    pub max: f64,
}

/// Value at the nearest-rank percentile of an ascending sample:
/// index `ceil(pct / 100 * n) - 1`, clamped to `[0, n - 1]`.
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    // Guard against 0.9 * 70 = 63.00000000000001 style rounding pushing the rank up.
    let rank = (pct / 100.0 * n as f64 - 1e-9).ceil() as i64 - 1;
    let idx = rank.clamp(0, n as i64 - 1) as usize;
    sorted.get(idx).copied()
}

pub fn describe(values: &[f64]) -> Option<Descriptive> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

    Some(Descriptive {
        mean,
        median,
        ninetieth_percentile: percentile(&sorted, 90.0)?,
        standard_deviation: variance.sqrt(),
        min: sorted[0],
        max: sorted[n - 1],
    })
}

/// Per-metric samples of a batch (or shard), mergeable before statistics are computed.
///
/// Median and percentiles need the complete sample, so shards merge samples, never
/// partial statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSamples {
    values: BTreeMap<MetricKind, Vec<f64>>,
    count: usize,
}

impl MetricSamples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one incident's metrics. All-null metrics are ignored; returns whether the
    /// incident contributed.
    pub fn push(&mut self, metrics: &ResponseTimeMetrics) -> bool {
        if metrics.is_empty() {
            return false;
        }
        for kind in MetricKind::ALL {
            if let Some(v) = metrics.get(kind).filter(|v| v.is_finite() && *v >= 0.0) {
                self.values.entry(kind).or_default().push(v);
            }
        }
        self.count += 1;
        true
    }

    pub fn merge(&mut self, other: MetricSamples) {
        for (kind, mut vals) in other.values {
            self.values.entry(kind).or_default().append(&mut vals);
        }
        self.count += other.count;
    }

    pub fn values(&self, kind: MetricKind) -> &[f64] {
        self.values.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incidents that contributed at least one non-null metric.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn statistics(&self) -> ResponseTimeStatistics {
        let mut stats = ResponseTimeStatistics {
            count: self.count,
            ..ResponseTimeStatistics::default()
        };
        for kind in MetricKind::ALL {
            let Some(d) = describe(self.values(kind)) else {
                continue;
            };
            stats.mean.set(kind, Some(d.mean));
            stats.median.set(kind, Some(d.median));
            stats.ninetieth_percentile.set(kind, Some(d.ninetieth_percentile));
            stats.standard_deviation.set(kind, Some(d.standard_deviation));
            stats.min.set(kind, Some(d.min));
            stats.max.set(kind, Some(d.max));
        }
        stats
    }
}

impl FromIterator<ResponseTimeMetrics> for MetricSamples {
    fn from_iter<I: IntoIterator<Item = ResponseTimeMetrics>>(iter: I) -> Self {
        let mut samples = MetricSamples::new();
        for m in iter {
            samples.push(&m);
        }
        samples
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IncidentMetrics {
    pub row: usize,
    pub incident_id: String,
    pub metrics: ResponseTimeMetrics,
}

/// Per-incident metrics of the valid records plus the merged samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchMetrics {
    pub incidents: Vec<IncidentMetrics>,
    pub samples: MetricSamples,
    pub dropped: usize,
}

fn compute_batch_at(
    records: &[IncidentRecord],
    first_row: usize,
    calc: &MetricsCalculator,
    diag: &mut dyn Diagnostics,
) -> BatchMetrics {
    let mut batch = BatchMetrics::default();

    for (offset, record) in records.iter().enumerate() {
        let row = first_row + offset;
        let problems = validate_record(record, row);
        if !problems.is_empty() {
            let codes = problems
                .iter()
                .map(|w| w.code.as_str())
                .collect::<Vec<_>>()
                .join(",");
            diag.warn(
                ValidationWarning::new(
                    "STATS_RECORD_DROPPED",
                    "Dropped record missing identifying fields",
                )
                .with_details(format!("row={row}; problems={codes}")),
            );
            batch.dropped += 1;
            continue;
        }

        let metrics = calc.compute(record, diag);
        batch.samples.push(&metrics);
        batch.incidents.push(IncidentMetrics {
            row,
            incident_id: record.incident_id.clone().unwrap_or_default(),
            metrics,
        });
    }

    batch
}

/// Validate and compute metrics for every record of a batch.
pub fn compute_batch(
    records: &[IncidentRecord],
    config: &EngineConfig,
    diag: &mut dyn Diagnostics,
) -> BatchMetrics {
    compute_batch_at(records, 0, &MetricsCalculator::from_config(config), diag)
}

/// Aggregate a batch of incidents into response-time statistics.
///
/// Contract:
/// - Records missing `incidentId` or `incidentDate` are dropped with a warning.
/// - Incidents whose six metrics are all null do not count.
/// - Each metric is summarized independently over its non-null values; a metric with no
///   values is null in every statistic.
/// - Empty or fully invalid input yields `count == 0` and all-null statistics.
pub fn aggregate(
    records: &[IncidentRecord],
    config: &EngineConfig,
    diag: &mut dyn Diagnostics,
) -> ResponseTimeStatistics {
    compute_batch(records, config, diag).samples.statistics()
}

/// Summarize already-computed metrics.
pub fn aggregate_metrics(metrics: &[ResponseTimeMetrics]) -> ResponseTimeStatistics {
    metrics.iter().copied().collect::<MetricSamples>().statistics()
}

/// `compute_batch` over `shard_size`-record shards on the rayon pool.
///
/// Shards are merged in input order and their diagnostics replayed into `diag` in the
/// same order, so the result equals the sequential one.
pub fn compute_batch_sharded(
    records: &[IncidentRecord],
    shard_size: usize,
    config: &EngineConfig,
    diag: &mut dyn Diagnostics,
) -> BatchMetrics {
    let shard_size = shard_size.max(1);
    let calc = MetricsCalculator::from_config(config);

    let shards = records
        .par_chunks(shard_size)
        .enumerate()
        .map(|(i, chunk)| {
            let mut log = DiagnosticLog::new();
            let batch = compute_batch_at(chunk, i * shard_size, &calc, &mut log);
            (batch, log)
        })
        .collect::<Vec<_>>();

    let mut merged = BatchMetrics::default();
    for (batch, log) in shards {
        log.replay_into(diag);
        merged.incidents.extend(batch.incidents);
        merged.samples.merge(batch.samples);
        merged.dropped += batch.dropped;
    }
    merged
}

pub fn aggregate_sharded(
    records: &[IncidentRecord],
    shard_size: usize,
    config: &EngineConfig,
    diag: &mut dyn Diagnostics,
) -> ResponseTimeStatistics {
    compute_batch_sharded(records, shard_size, config, diag)
        .samples
        .statistics()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_uses_nearest_rank() {
        let sorted = (1..=10).map(f64::from).collect::<Vec<_>>();
        assert_eq!(percentile(&sorted, 90.0), Some(9.0));
        assert_eq!(percentile(&[5.0], 90.0), Some(5.0));
        assert_eq!(percentile(&[], 90.0), None);

        let seventy = (1..=70).map(f64::from).collect::<Vec<_>>();
        assert_eq!(percentile(&seventy, 90.0), Some(63.0));
    }

    #[test]
    fn describe_even_and_odd_samples() {
        let d = describe(&[4.0, 1.0, 3.0, 2.0]).expect("stats");
        assert_eq!(d.median, 2.5);
        assert_eq!(d.mean, 2.5);
        assert_eq!(d.min, 1.0);
        assert_eq!(d.max, 4.0);
        assert!((d.standard_deviation - 1.25f64.sqrt()).abs() < 1e-12);

        let d = describe(&[10.0, 30.0, 20.0]).expect("stats");
        assert_eq!(d.median, 20.0);
        assert_eq!(d.ninetieth_percentile, 30.0);
    }

    #[test]
    fn all_null_metrics_do_not_count() {
        let samples: MetricSamples = vec![
            ResponseTimeMetrics::default(),
            ResponseTimeMetrics {
                dispatch_time: Some(30.0),
                ..ResponseTimeMetrics::default()
            },
        ]
        .into_iter()
        .collect();
        assert_eq!(samples.count(), 1);
        let stats = samples.statistics();
        assert_eq!(stats.mean.dispatch_time, Some(30.0));
        assert_eq!(stats.mean.turnout_time, None);
    }

    #[test]
    fn merge_keeps_complete_sample() {
        let mut a: MetricSamples = (1..=5)
            .map(|v| ResponseTimeMetrics {
                travel_time: Some(f64::from(v)),
                ..ResponseTimeMetrics::default()
            })
            .collect();
        let b: MetricSamples = (6..=10)
            .map(|v| ResponseTimeMetrics {
                travel_time: Some(f64::from(v)),
                ..ResponseTimeMetrics::default()
            })
            .collect();
        a.merge(b);
        let stats = a.statistics();
        assert_eq!(stats.count, 10);
        assert_eq!(stats.median.travel_time, Some(5.5));
        assert_eq!(stats.ninetieth_percentile.travel_time, Some(9.0));
    }

    #[test]
    fn empty_batch_is_zero_and_null() {
        let stats = aggregate(&[], &EngineConfig::default(), &mut Vec::new());
        assert_eq!(stats, ResponseTimeStatistics::default());
        assert_eq!(stats.count, 0);
        assert!(stats.ninetieth_percentile.is_empty());
    }
}
