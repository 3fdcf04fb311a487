use cad_core::config::EngineConfig;
use cad_core::diagnostics::DiagnosticLog;
use cad_core::domain::{IncidentRecord, MetricKind, PatternType, ResponseTimeMetrics};
use cad_core::ingest::cad_csv::read_cad_csv;
use cad_core::metrics::compute_response_metrics;
use cad_core::pipeline::{analyze_rows, AnalysisOptions};
use cad_core::report::generate_response_time_markdown;
use pretty_assertions::assert_eq;

fn split_fixture() -> &'static str {
    include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../fixtures/cad/split_export.csv"
    ))
}

fn combined_fixture() -> &'static str {
    include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../fixtures/cad/combined_export.csv"
    ))
}

#[test]
fn single_incident_produces_all_six_intervals() {
    let incident = IncidentRecord {
        incident_id: Some("F24-001".to_string()),
        incident_date: Some("01/15/2024".to_string()),
        incident_time: Some("14:00:00".to_string()),
        dispatch_time: Some("14:01:00".to_string()),
        en_route_time: Some("14:02:30".to_string()),
        arrival_time: Some("14:08:45".to_string()),
        clear_time: Some("14:45:00".to_string()),
        ..IncidentRecord::default()
    };
    let mut warnings = Vec::new();
    let m = compute_response_metrics(&incident, &mut warnings);
    assert!(warnings.is_empty(), "{warnings:?}");
    assert_eq!(
        m,
        ResponseTimeMetrics {
            dispatch_time: Some(60.0),
            turnout_time: Some(90.0),
            travel_time: Some(375.0),
            total_response_time: Some(525.0),
            scene_time: Some(2175.0),
            total_incident_time: Some(2700.0),
        }
    );
}

#[test]
fn split_export_end_to_end() {
    let mut log = DiagnosticLog::new();
    let table = read_cad_csv(split_fixture(), &mut log).expect("read fixture");
    assert_eq!(table.rows.len(), 3);
    assert!(log.has_code("INGEST_CAD_CSV_ROW_SKIPPED"));

    let options = AnalysisOptions {
        columns: Some(table.headers.clone()),
        ..AnalysisOptions::default()
    };
    let result = analyze_rows(&table.rows, &options, &EngineConfig::default(), &mut log);

    assert_eq!(result.pattern.pattern.pattern_type, PatternType::Split);
    assert!(result.mapping_validation.is_valid, "{:?}", result.mapping_validation);
    assert_eq!(result.dropped, 1);
    assert!(log.has_code("STATS_RECORD_DROPPED"));
    assert!(log.has_code("METRICS_MIDNIGHT_ROLLOVER"));

    let first = &result.incidents[0];
    assert_eq!(first.incident_id, "F24-001");
    assert_eq!(first.metrics.total_response_time, Some(525.0));

    let second = &result.incidents[1];
    assert_eq!(second.metrics.dispatch_time, Some(40.0));
    assert_eq!(second.metrics.scene_time, Some(1920.0));
    assert_eq!(second.metrics.total_incident_time, Some(2400.0));

    let stats = &result.statistics;
    assert_eq!(stats.count, 2);
    assert_eq!(stats.mean.dispatch_time, Some(50.0));
    assert_eq!(stats.median.turnout_time, Some(85.0));
    assert_eq!(stats.ninetieth_percentile.total_response_time, Some(525.0));
    assert_eq!(stats.min.travel_time, Some(360.0));
    assert_eq!(stats.max.travel_time, Some(375.0));

    let dispatch = result
        .compliance
        .get(MetricKind::DispatchTime)
        .expect("dispatch benchmark");
    assert_eq!(dispatch.compliant, Some(true));
    let turnout = result
        .compliance
        .get(MetricKind::TurnoutTime)
        .expect("turnout benchmark");
    assert_eq!(turnout.compliant, Some(false));
}

#[test]
fn combined_export_discards_offsets_and_keeps_wall_clock() {
    let mut log = DiagnosticLog::new();
    let table = read_cad_csv(combined_fixture(), &mut log).expect("read fixture");
    let options = AnalysisOptions {
        columns: Some(table.headers.clone()),
        ..AnalysisOptions::default()
    };
    let result = analyze_rows(&table.rows, &options, &EngineConfig::default(), &mut log);

    assert_eq!(result.pattern.pattern.pattern_type, PatternType::Combined);
    assert_eq!(
        result.pattern.pattern.combined_field.as_deref(),
        Some("CallDateTime")
    );
    assert_eq!(result.records[0].incident_date.as_deref(), Some("2024-03-02"));
    assert!(log.has_code("TS_OFFSET_DISCARDED"));

    let metrics = result
        .incidents
        .iter()
        .map(|i| i.metrics)
        .collect::<Vec<_>>();
    assert_eq!(metrics[0].dispatch_time, Some(45.0));
    assert_eq!(metrics[0].total_incident_time, Some(2700.0));
    assert_eq!(metrics[1].turnout_time, Some(70.0));
    assert_eq!(metrics[1].travel_time, Some(300.0));
    assert_eq!(result.statistics.count, 2);
}

#[test]
fn markdown_report_is_deterministic() {
    let table = read_cad_csv(split_fixture(), &mut Vec::new()).expect("read fixture");
    let options = AnalysisOptions {
        columns: Some(table.headers.clone()),
        ..AnalysisOptions::default()
    };
    let config = EngineConfig::default();
    let a = analyze_rows(&table.rows, &options, &config, &mut Vec::new());
    let b = analyze_rows(&table.rows, &options, &config, &mut Vec::new());

    let md_a = generate_response_time_markdown(&a.statistics, &a.compliance);
    let md_b = generate_response_time_markdown(&b.statistics, &b.compliance);
    assert_eq!(md_a, md_b);
    assert!(md_a.contains("| Dispatch | 50s | 50s | 1m 0s |"));
    assert!(md_a.contains("| Dispatch | 1m 0s | 2 | P90 | 1m 0s | 100.0% | PASS |"));
}
