//! NFPA 1710 benchmark evaluation over a batch sample.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::domain::MetricKind;
use crate::stats::{percentile, MetricSamples};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    pub metric: MetricKind,
    pub threshold_seconds: f64,
    pub sample_count: usize,
    pub percentile: f64,
    pub percentile_value: Option<f64>,
    /// Share of samples at or under the threshold, 0.0..=1.0.
    pub within_threshold: Option<f64>,
    /// `None` when the metric has no samples.
    pub compliant: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub benchmarks: Vec<BenchmarkResult>,
}

impl ComplianceReport {
    pub fn get(&self, metric: MetricKind) -> Option<&BenchmarkResult> {
        self.benchmarks.iter().find(|b| b.metric == metric)
    }

    /// True only when every benchmark has samples and passes.
    pub fn all_compliant(&self) -> bool {
        !self.benchmarks.is_empty() && self.benchmarks.iter().all(|b| b.compliant == Some(true))
    }
}

fn benchmark(samples: &MetricSamples, metric: MetricKind, threshold: f64, pct: f64) -> BenchmarkResult {
    let mut values = samples.values(metric).to_vec();
    values.sort_by(f64::total_cmp);

    let percentile_value = percentile(&values, pct);
    let within_threshold = (!values.is_empty()).then(|| {
        let within = values.iter().filter(|v| **v <= threshold).count();
        within as f64 / values.len() as f64
    });

    BenchmarkResult {
        metric,
        threshold_seconds: threshold,
        sample_count: values.len(),
        percentile: pct,
        percentile_value,
        within_threshold,
        compliant: percentile_value.map(|p| p <= threshold),
    }
}

/// Dispatch, turnout and total response against the configured NFPA 1710 thresholds.
pub fn evaluate_compliance(samples: &MetricSamples, config: &EngineConfig) -> ComplianceReport {
    let nfpa = &config.nfpa;
    ComplianceReport {
        benchmarks: vec![
            benchmark(samples, MetricKind::DispatchTime, nfpa.dispatch_seconds, nfpa.percentile),
            benchmark(samples, MetricKind::TurnoutTime, nfpa.turnout_seconds, nfpa.percentile),
            benchmark(
                samples,
                MetricKind::TotalResponseTime,
                nfpa.total_response_seconds,
                nfpa.percentile,
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResponseTimeMetrics;

    fn samples(dispatch: &[f64]) -> MetricSamples {
        dispatch
            .iter()
            .map(|d| ResponseTimeMetrics {
                dispatch_time: Some(*d),
                ..ResponseTimeMetrics::default()
            })
            .collect()
    }

    #[test]
    fn dispatch_passes_when_p90_within_threshold() {
        let s = samples(&[30.0, 40.0, 45.0, 50.0, 55.0, 58.0, 59.0, 60.0, 60.0, 95.0]);
        let report = evaluate_compliance(&s, &EngineConfig::default());
        let dispatch = report.get(MetricKind::DispatchTime).expect("dispatch");
        assert_eq!(dispatch.sample_count, 10);
        assert_eq!(dispatch.percentile_value, Some(60.0));
        assert_eq!(dispatch.compliant, Some(true));
        assert_eq!(dispatch.within_threshold, Some(0.9));
    }

    #[test]
    fn no_samples_is_undetermined() {
        let report = evaluate_compliance(&samples(&[30.0]), &EngineConfig::default());
        let turnout = report.get(MetricKind::TurnoutTime).expect("turnout");
        assert_eq!(turnout.sample_count, 0);
        assert_eq!(turnout.compliant, None);
        assert_eq!(turnout.within_threshold, None);
        assert!(!report.all_compliant());
    }

    #[test]
    fn slow_dispatch_fails() {
        let report = evaluate_compliance(&samples(&[90.0, 120.0]), &EngineConfig::default());
        assert_eq!(
            report.get(MetricKind::DispatchTime).and_then(|b| b.compliant),
            Some(false)
        );
    }
}
