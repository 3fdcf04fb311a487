use crate::config::{EngineConfig, IntervalBounds};
use crate::diagnostics::Diagnostics;
use crate::domain::{IncidentRecord, MetricKind, ResponseTimeMetrics, ValidationWarning};
use crate::normalize::patterns::is_date_only;
use crate::normalize::timestamps::{LocalDateTime, TimestampParser};

/// Interval endpoints and bound for one metric.
struct IntervalSpec {
    kind: MetricKind,
    start_field: &'static str,
    end_field: &'static str,
    max_seconds: f64,
    /// Clear times that precede their start are moved to the next day once.
    rollover: bool,
}

fn interval_specs(bounds: &IntervalBounds) -> [IntervalSpec; 6] {
    let response = bounds.response_max_seconds;
    let scene = bounds.scene_max_seconds;
    [
        IntervalSpec {
            kind: MetricKind::DispatchTime,
            start_field: "incidentTime",
            end_field: "dispatchTime",
            max_seconds: response,
            rollover: false,
        },
        IntervalSpec {
            kind: MetricKind::TurnoutTime,
            start_field: "dispatchTime",
            end_field: "enRouteTime",
            max_seconds: response,
            rollover: false,
        },
        IntervalSpec {
            kind: MetricKind::TravelTime,
            start_field: "enRouteTime",
            end_field: "arrivalTime",
            max_seconds: response,
            rollover: false,
        },
        IntervalSpec {
            kind: MetricKind::TotalResponseTime,
            start_field: "incidentTime",
            end_field: "arrivalTime",
            max_seconds: response,
            rollover: false,
        },
        IntervalSpec {
            kind: MetricKind::SceneTime,
            start_field: "arrivalTime",
            end_field: "clearTime",
            max_seconds: scene,
            rollover: true,
        },
        IntervalSpec {
            kind: MetricKind::TotalIncidentTime,
            start_field: "incidentTime",
            end_field: "clearTime",
            max_seconds: scene,
            rollover: true,
        },
    ]
}

/// Resolved instants of one incident, keyed by canonical field name.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResolvedTimestamps {
    pub incident: Option<LocalDateTime>,
    pub dispatch: Option<LocalDateTime>,
    pub en_route: Option<LocalDateTime>,
    pub arrival: Option<LocalDateTime>,
    pub clear: Option<LocalDateTime>,
}

impl ResolvedTimestamps {
    fn get(&self, field: &str) -> Option<LocalDateTime> {
        match field {
            "incidentTime" => self.incident,
            "dispatchTime" => self.dispatch,
            "enRouteTime" => self.en_route,
            "arrivalTime" => self.arrival,
            "clearTime" => self.clear,
            _ => None,
        }
    }
}

/// Computes NFPA 1710 intervals for single incidents.
#[derive(Debug, Clone, Copy)]
pub struct MetricsCalculator {
    parser: TimestampParser,
    bounds: IntervalBounds,
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl MetricsCalculator {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            parser: TimestampParser::from_config(config),
            bounds: config.bounds,
        }
    }

    /// Parse the incident's timestamps against its incident date.
    ///
    /// Returns `None` when there is no incident date to anchor time-only values.
    pub fn resolve(
        &self,
        incident: &IncidentRecord,
        diag: &mut dyn Diagnostics,
    ) -> Option<ResolvedTimestamps> {
        let id = incident.incident_id.as_deref().unwrap_or("<unknown>");
        let Some(reference) = incident
            .incident_date
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
        else {
            diag.warn(
                ValidationWarning::new(
                    "METRICS_MISSING_INCIDENT_DATE",
                    "Cannot compute metrics without an incident date",
                )
                .with_details(format!("incident_id={id}")),
            );
            return None;
        };

        let present = |v: &Option<String>| -> Option<String> {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let incident_time = match present(&incident.incident_time) {
            Some(t) if is_date_only(&t) => {
                // Date-only alarm times are suspect; intervals anchored on them are skipped
                // rather than measured from midnight.
                diag.warn(
                    ValidationWarning::new(
                        "METRICS_INCIDENT_TIME_DATE_ONLY",
                        "incidentTime has no time component; dependent intervals skipped",
                    )
                    .with_details(format!("incident_id={id}; value={t}")),
                );
                None
            }
            Some(t) => self.parser.parse("incidentTime", &t, Some(reference), diag),
            None => self
                .parser
                .parse_date(reference)
                .map(|d| d.midnight())
                .or_else(|| {
                    diag.warn(
                        ValidationWarning::new(
                            "TS_UNPARSEABLE",
                            "Unparseable timestamp for incidentDate",
                        )
                        .with_details(format!("incident_id={id}; raw={reference}")),
                    );
                    None
                }),
        };

        let mut parse_field = |field: &str, v: &Option<String>| {
            present(v).and_then(|s| self.parser.parse(field, &s, Some(reference), diag))
        };

        Some(ResolvedTimestamps {
            incident: incident_time,
            dispatch: parse_field("dispatchTime", &incident.dispatch_time),
            en_route: parse_field("enRouteTime", &incident.en_route_time),
            arrival: parse_field("arrivalTime", &incident.arrival_time),
            clear: parse_field("clearTime", &incident.clear_time),
        })
    }

    pub fn compute(
        &self,
        incident: &IncidentRecord,
        diag: &mut dyn Diagnostics,
    ) -> ResponseTimeMetrics {
        let Some(resolved) = self.resolve(incident, diag) else {
            return ResponseTimeMetrics::default();
        };
        let id = incident.incident_id.as_deref().unwrap_or("<unknown>");

        let mut metrics = ResponseTimeMetrics::default();
        for spec in interval_specs(&self.bounds) {
            let value = self.interval(
                id,
                &spec,
                resolved.get(spec.start_field),
                resolved.get(spec.end_field),
                diag,
            );
            metrics.set(spec.kind, value);
        }
        metrics
    }

    fn interval(
        &self,
        incident_id: &str,
        spec: &IntervalSpec,
        start: Option<LocalDateTime>,
        end: Option<LocalDateTime>,
        diag: &mut dyn Diagnostics,
    ) -> Option<f64> {
        let (Some(start), Some(end)) = (start, end) else {
            return None;
        };

        let mut seconds = (end - start).as_seconds_f64();
        if spec.rollover && seconds < 0.0 {
            seconds += self.bounds.rollover_seconds;
            diag.info(
                ValidationWarning::new(
                    "METRICS_MIDNIGHT_ROLLOVER",
                    format!(
                        "{} precedes {}; treated as next day",
                        spec.end_field, spec.start_field
                    ),
                )
                .with_details(format!(
                    "incident_id={incident_id}; metric={}; {}={start}; {}={end}",
                    spec.kind.as_str(),
                    spec.start_field,
                    spec.end_field
                )),
            );
        }

        if seconds > 0.0 && seconds < spec.max_seconds {
            return Some(seconds);
        }

        let code = if seconds <= 0.0 {
            "METRICS_INTERVAL_NON_POSITIVE"
        } else {
            "METRICS_INTERVAL_OUT_OF_BOUNDS"
        };
        diag.warn(
            ValidationWarning::new(
                code,
                format!(
                    "Rejected {}: {} must be after {} and within {}s",
                    spec.kind.as_str(),
                    spec.end_field,
                    spec.start_field,
                    spec.max_seconds
                ),
            )
            .with_details(format!(
                "incident_id={incident_id}; seconds={seconds}; {}={start}; {}={end}",
                spec.start_field, spec.end_field
            )),
        );
        None
    }
}

/// Compute one incident's intervals with default bounds.
///
/// Contract:
/// - Never fails; uncomputable intervals are `None` and warn.
/// - Intervals must be strictly positive and under their bound (1 day for response
///   intervals, 3 days for scene/total incident time).
/// - Scene and total incident time roll a clear time past midnight once.
pub fn compute_response_metrics(
    incident: &IncidentRecord,
    diag: &mut dyn Diagnostics,
) -> ResponseTimeMetrics {
    MetricsCalculator::default().compute(incident, diag)
}
