use crate::compliance::ComplianceReport;
use crate::domain::{MetricKind, ResponseTimeStatistics};

/// `h m`, `m s` or `s`; fractional seconds are rounded. Null is `UNKNOWN`.
pub fn format_duration_seconds(secs: Option<f64>) -> String {
    match secs {
        None => "UNKNOWN".to_string(),
        Some(s) => {
            let s = s.round() as i64;
            let minutes = s / 60;
            let rem = s % 60;
            if minutes >= 60 {
                let hours = minutes / 60;
                let m = minutes % 60;
                format!("{hours}h {m}m")
            } else if minutes > 0 {
                format!("{minutes}m {rem}s")
            } else {
                format!("{rem}s")
            }
        }
    }
}

fn format_share(share: Option<f64>) -> String {
    match share {
        None => "UNKNOWN".to_string(),
        Some(v) => format!("{:.1}%", v * 100.0),
    }
}

fn statistics_row(stats: &ResponseTimeStatistics, kind: MetricKind) -> String {
    format!(
        "| {} | {} | {} | {} | {} | {} | {} |\n",
        kind.label(),
        format_duration_seconds(stats.mean.get(kind)),
        format_duration_seconds(stats.median.get(kind)),
        format_duration_seconds(stats.ninetieth_percentile.get(kind)),
        format_duration_seconds(stats.standard_deviation.get(kind)),
        format_duration_seconds(stats.min.get(kind)),
        format_duration_seconds(stats.max.get(kind)),
    )
}

/// Deterministic Markdown summary of a batch's response times.
///
/// Metric rows follow `MetricKind::ALL`; the compliance table follows the report's order.
pub fn generate_response_time_markdown(
    stats: &ResponseTimeStatistics,
    compliance: &ComplianceReport,
) -> String {
    let mut out = String::new();
    out.push_str("# Response Time Summary\n\n");
    out.push_str(&format!("Incidents with metrics: **{}**\n\n", stats.count));

    out.push_str("## Intervals\n\n");
    out.push_str("| Metric | Mean | Median | P90 | Std dev | Min | Max |\n");
    out.push_str("|---|---:|---:|---:|---:|---:|---:|\n");
    for kind in MetricKind::ALL {
        out.push_str(&statistics_row(stats, kind));
    }
    out.push('\n');

    out.push_str("## NFPA 1710 benchmarks\n\n");
    if compliance.benchmarks.is_empty() {
        out.push_str("_No benchmarks evaluated._\n");
        return out;
    }
    out.push_str("| Metric | Threshold | Samples | Percentile | Value | Within threshold | Result |\n");
    out.push_str("|---|---:|---:|---:|---:|---:|---|\n");
    for b in &compliance.benchmarks {
        let result = match b.compliant {
            Some(true) => "PASS",
            Some(false) => "FAIL",
            None => "UNKNOWN",
        };
        out.push_str(&format!(
            "| {} | {} | {} | P{} | {} | {} | {} |\n",
            b.metric.label(),
            format_duration_seconds(Some(b.threshold_seconds)),
            b.sample_count,
            b.percentile,
            format_duration_seconds(b.percentile_value),
            format_share(b.within_threshold),
            result
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::evaluate_compliance;
    use crate::config::EngineConfig;
    use crate::stats::MetricSamples;

    #[test]
    fn durations_are_human_readable() {
        assert_eq!(format_duration_seconds(None), "UNKNOWN");
        assert_eq!(format_duration_seconds(Some(45.4)), "45s");
        assert_eq!(format_duration_seconds(Some(375.0)), "6m 15s");
        assert_eq!(format_duration_seconds(Some(3900.0)), "1h 5m");
    }

    #[test]
    fn empty_batch_renders_unknowns() {
        let samples = MetricSamples::new();
        let md = generate_response_time_markdown(
            &samples.statistics(),
            &evaluate_compliance(&samples, &EngineConfig::default()),
        );
        assert!(md.contains("Incidents with metrics: **0**"));
        assert!(md.contains("| Dispatch | UNKNOWN | UNKNOWN |"));
        assert!(md.contains("| Turnout | 1m 20s | 0 | P90 | UNKNOWN | UNKNOWN | UNKNOWN |"));
    }
}
