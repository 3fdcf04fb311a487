//! End-to-end analysis of one CAD export: layout detection, reconciliation, mapping,
//! per-incident metrics, statistics and NFPA 1710 compliance.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::compliance::{evaluate_compliance, ComplianceReport};
use crate::config::EngineConfig;
use crate::detect::{PatternDetection, PatternDetector};
use crate::diagnostics::Diagnostics;
use crate::domain::{
    FieldMapping, IncidentRecord, MappingSuggestion, RawRow, ResponseTimeStatistics, TargetField,
};
use crate::reconcile::{cad_target_fields, suggest_mappings, validate_mappings, MappingValidation};
use crate::stats::{compute_batch, compute_batch_sharded, IncidentMetrics};
use crate::transform::{
    apply_mappings, mappings_from_pattern, mappings_from_suggestions, TransformRegistry,
};
use crate::validate::{validate_batch, RecordValidationReportItem};

#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Column order; defaults to the sorted union of the rows' keys.
    pub columns: Option<Vec<String>>,
    /// Explicit mappings skip detection-based and suggested mappings.
    pub mappings: Option<Vec<FieldMapping>>,
    /// Target schema; defaults to `cad_target_fields()`.
    pub targets: Option<Vec<TargetField>>,
    /// Rows per rayon shard; `None` computes sequentially.
    pub shard_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub pattern: PatternDetection,
    pub suggestions: Vec<MappingSuggestion>,
    pub mappings: Vec<FieldMapping>,
    pub mapping_validation: MappingValidation,
    pub records: Vec<IncidentRecord>,
    pub validation: Vec<RecordValidationReportItem>,
    pub incidents: Vec<IncidentMetrics>,
    pub dropped: usize,
    pub statistics: ResponseTimeStatistics,
    pub compliance: ComplianceReport,
}

fn columns_of(rows: &[RawRow]) -> Vec<String> {
    rows.iter()
        .flat_map(|r| r.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Detector mappings first; suggestions fill the remaining targets from unused columns,
/// one source per target (highest confidence, earlier column on ties).
pub fn merge_mappings(
    detection: &PatternDetection,
    suggestions: &[MappingSuggestion],
) -> Vec<FieldMapping> {
    let mut mappings = mappings_from_pattern(detection);

    let mut used_sources = BTreeSet::new();
    let mut covered = BTreeSet::new();
    for m in &mappings {
        used_sources.insert(m.source_field.clone());
        covered.insert(m.target_field.clone());
        for t in &m.transformations {
            if let Some(with) = t.param("with") {
                used_sources.insert(with.to_string());
            }
        }
    }

    let mut best: BTreeMap<&str, &MappingSuggestion> = BTreeMap::new();
    for s in suggestions {
        let Some(target) = s.target_field.as_deref() else {
            continue;
        };
        if covered.contains(target) || used_sources.contains(&s.source_field) {
            continue;
        }
        match best.get(target) {
            Some(current) if current.confidence >= s.confidence => {}
            _ => {
                best.insert(target, s);
            }
        }
    }

    let chosen = suggestions
        .iter()
        .filter(|s| {
            s.target_field
                .as_deref()
                .and_then(|t| best.get(t))
                .is_some_and(|b| std::ptr::eq(*b, *s))
        })
        .cloned()
        .collect::<Vec<_>>();
    mappings.extend(mappings_from_suggestions(&chosen));
    mappings
}

/// Run the whole analysis over already-parsed rows.
///
/// Never fails: mapping problems, dropped records and rejected intervals are reported
/// through `diag` and in the result.
pub fn analyze_rows(
    rows: &[RawRow],
    options: &AnalysisOptions,
    config: &EngineConfig,
    diag: &mut dyn Diagnostics,
) -> AnalysisResult {
    let columns = options.columns.clone().unwrap_or_else(|| columns_of(rows));
    let targets = options.targets.clone().unwrap_or_else(cad_target_fields);

    let pattern = PatternDetector::default().detect_rows(&columns, rows);
    tracing::debug!(
        pattern = ?pattern.pattern.pattern_type,
        confidence = pattern.pattern.confidence,
        "detected date/time layout"
    );

    let suggestions = suggest_mappings(&columns, &targets, config.min_confidence);
    let mappings = match &options.mappings {
        Some(explicit) => explicit.clone(),
        None => merge_mappings(&pattern, &suggestions),
    };

    let mapping_validation = validate_mappings(&mappings, &targets, config.low_confidence_warning);
    for e in &mapping_validation.errors {
        diag.warn(e.clone());
    }
    for w in &mapping_validation.warnings {
        diag.info(w.clone());
    }

    let records = apply_mappings(rows, &mappings, &TransformRegistry::with_builtins(), diag);
    let validation = validate_batch(&records);

    let batch = match options.shard_size {
        Some(size) => compute_batch_sharded(&records, size, config, diag),
        None => compute_batch(&records, config, diag),
    };
    let statistics = batch.samples.statistics();
    let compliance = evaluate_compliance(&batch.samples, config);

    AnalysisResult {
        pattern,
        suggestions,
        mappings,
        mapping_validation,
        records,
        validation,
        incidents: batch.incidents,
        dropped: batch.dropped,
        statistics,
        compliance,
    }
}
