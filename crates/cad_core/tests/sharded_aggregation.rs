use cad_core::config::EngineConfig;
use cad_core::diagnostics::DiagnosticLog;
use cad_core::domain::IncidentRecord;
use cad_core::stats::{aggregate, aggregate_sharded, compute_batch, compute_batch_sharded};
use pretty_assertions::assert_eq;

fn clock(total_seconds: u32) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        total_seconds / 3600,
        (total_seconds / 60) % 60,
        total_seconds % 60
    )
}

/// Synthetic day of incidents with varied intervals; every 17th record lacks a date.
fn synthetic_batch(n: u32) -> Vec<IncidentRecord> {
    (0..n)
        .map(|i| {
            let start = 6 * 3600 + i * 37;
            let dispatch = start + 20 + (i * 7) % 90;
            let en_route = dispatch + 30 + (i * 11) % 120;
            let arrival = en_route + 120 + (i * 13) % 600;
            let clear = arrival + 600 + (i * 17) % 3000;
            IncidentRecord {
                incident_id: Some(format!("S-{i:05}")),
                incident_date: (i % 17 != 0).then(|| "06/01/2024".to_string()),
                incident_time: Some(clock(start)),
                dispatch_time: Some(clock(dispatch)),
                en_route_time: Some(clock(en_route)),
                arrival_time: Some(clock(arrival)),
                clear_time: Some(clock(clear)),
                ..IncidentRecord::default()
            }
        })
        .collect()
}

#[test]
fn sharded_statistics_equal_sequential() {
    let records = synthetic_batch(1_000);
    let config = EngineConfig::default();

    let sequential = aggregate(&records, &config, &mut Vec::new());
    for shard_size in [1, 7, 64, 1_000, 5_000] {
        let sharded = aggregate_sharded(&records, shard_size, &config, &mut Vec::new());
        assert_eq!(sharded, sequential, "shard_size={shard_size}");
    }
    assert_eq!(sequential.count, 1_000 - 59);
}

#[test]
fn sharded_diagnostics_keep_input_order() {
    let records = synthetic_batch(200);
    let config = EngineConfig::default();

    let mut sequential_log = DiagnosticLog::new();
    let sequential = compute_batch(&records, &config, &mut sequential_log);
    let mut sharded_log = DiagnosticLog::new();
    let sharded = compute_batch_sharded(&records, 13, &config, &mut sharded_log);

    assert_eq!(sharded_log, sequential_log);
    assert_eq!(sharded.dropped, sequential.dropped);
    assert_eq!(sharded.incidents, sequential.incidents);
}

#[test]
fn zero_shard_size_is_treated_as_one() {
    let records = synthetic_batch(10);
    let config = EngineConfig::default();
    let stats = aggregate_sharded(&records, 0, &config, &mut Vec::new());
    assert_eq!(stats, aggregate(&records, &config, &mut Vec::new()));
}
