//! Fuzzy reconciliation of vendor column names against a target field schema.

pub mod similarity;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{FieldMapping, FieldType, MappingSuggestion, TargetField, ValidationWarning};
use similarity::{similarity_detail, Similarity};

pub const DEFAULT_MIN_CONFIDENCE: u8 = 30;
pub const LOW_CONFIDENCE_WARNING: u8 = 70;
pub const NO_MATCH_REASON: &str = "No suitable match found";

/// Canonical CAD incident schema used when the caller brings no schema of its own.
pub fn cad_target_fields() -> Vec<TargetField> {
    vec![
        TargetField::new("incident_id", "Incident ID", FieldType::String, true),
        TargetField::new("incident_date", "Incident Date", FieldType::Date, true),
        TargetField::new("incident_time", "Incident Time", FieldType::Datetime, false),
        TargetField::new("dispatch_time", "Dispatch Time", FieldType::Datetime, false),
        TargetField::new("en_route_time", "En Route Time", FieldType::Datetime, false),
        TargetField::new("arrival_time", "Arrival Time", FieldType::Datetime, false),
        TargetField::new("clear_time", "Clear Time", FieldType::Datetime, false),
        TargetField::new("incident_type", "Incident Type", FieldType::String, false),
        TargetField::new("latitude", "Latitude", FieldType::Number, false),
        TargetField::new("longitude", "Longitude", FieldType::Number, false),
        TargetField::new("address", "Address", FieldType::String, false),
    ]
}

/// Best of the similarities against the target's id and its display name.
fn score_target(source: &str, target: &TargetField) -> (Similarity, &'static str) {
    let by_id = similarity_detail(source, &target.id);
    let by_name = similarity_detail(source, &target.name);
    if by_name.score > by_id.score {
        (by_name, "name")
    } else {
        (by_id, "id")
    }
}

/// Highest similarity between a source column and a target (id or name).
pub fn mapping_score(source: &str, target: &TargetField) -> u8 {
    score_target(source, target).0.score
}

/// Suggest one target per source column.
///
/// Contract:
/// - Never fails; a column without a target scoring at least `min_confidence` gets
///   `target_field: None`, confidence 0 and the reason "No suitable match found".
/// - Ties keep the earlier target in schema order.
/// - Several columns may suggest the same target; `validate_mappings` reports that.
pub fn suggest_mappings(
    source_fields: &[String],
    targets: &[TargetField],
    min_confidence: u8,
) -> Vec<MappingSuggestion> {
    source_fields
        .iter()
        .map(|source| {
            let mut best: Option<(&TargetField, Similarity, &'static str)> = None;
            for target in targets {
                let (sim, matched_on) = score_target(source, target);
                if best.as_ref().map_or(true, |(_, b, _)| sim.score > b.score) {
                    best = Some((target, sim, matched_on));
                }
            }

            match best {
                Some((target, sim, matched_on)) if sim.score >= min_confidence => {
                    MappingSuggestion {
                        source_field: source.clone(),
                        target_field: Some(target.id.clone()),
                        confidence: sim.score,
                        reasons: vec![sim.reason(), format!("Matched target {matched_on}")],
                    }
                }
                _ => MappingSuggestion {
                    source_field: source.clone(),
                    target_field: None,
                    confidence: 0,
                    reasons: vec![NO_MATCH_REASON.to_string()],
                },
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MappingValidation {
    pub is_valid: bool,
    pub errors: Vec<ValidationWarning>,
    /// Non-fatal (low-confidence mappings).
    pub warnings: Vec<ValidationWarning>,
}

/// Check a finalized mapping list against its schema.
///
/// Errors: required target unmapped, target mapped by several sources, unknown target.
/// Warnings: source/target similarity below `low_confidence`.
pub fn validate_mappings(
    mappings: &[FieldMapping],
    targets: &[TargetField],
    low_confidence: u8,
) -> MappingValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let by_id = targets
        .iter()
        .map(|t| (t.id.as_str(), t))
        .collect::<BTreeMap<_, _>>();

    let mut sources_by_target: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for m in mappings {
        sources_by_target
            .entry(m.target_field.as_str())
            .or_default()
            .push(m.source_field.as_str());
    }

    for t in targets.iter().filter(|t| t.required) {
        if !sources_by_target.contains_key(t.id.as_str()) {
            errors.push(
                ValidationWarning::new(
                    "MAPPING_REQUIRED_TARGET_MISSING",
                    format!("Required field {} is not mapped", t.name),
                )
                .with_details(format!("target={}", t.id)),
            );
        }
    }

    for (target, sources) in &sources_by_target {
        if sources.len() > 1 {
            errors.push(
                ValidationWarning::new(
                    "MAPPING_TARGET_DUPLICATED",
                    format!("Target {target} is mapped by more than one source"),
                )
                .with_details(format!("sources={}", sources.join(","))),
            );
        }
    }

    let mut reported_unknown = BTreeSet::new();
    for m in mappings {
        let Some(target) = by_id.get(m.target_field.as_str()) else {
            if reported_unknown.insert(m.target_field.as_str()) {
                errors.push(
                    ValidationWarning::new(
                        "MAPPING_TARGET_UNKNOWN",
                        format!("Target {} is not part of the schema", m.target_field),
                    )
                    .with_details(format!("source={}", m.source_field)),
                );
            }
            continue;
        };

        let score = mapping_score(&m.source_field, target);
        if score < low_confidence {
            warnings.push(
                ValidationWarning::new(
                    "MAPPING_LOW_CONFIDENCE",
                    format!("Low-confidence mapping {} -> {}", m.source_field, target.id),
                )
                .with_details(format!("score={score}")),
            );
        }
    }

    MappingValidation {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn mapping(source: &str, target: &str) -> FieldMapping {
        FieldMapping {
            source_field: source.to_string(),
            target_field: target.to_string(),
            transformations: Vec::new(),
        }
    }

    #[test]
    fn suggests_best_target_per_column() {
        let s = suggest_mappings(
            &cols(&["Incident_ID", "Dispatch Time", "Arrival", "zzzz"]),
            &cad_target_fields(),
            DEFAULT_MIN_CONFIDENCE,
        );
        assert_eq!(s[0].target_field.as_deref(), Some("incident_id"));
        assert_eq!(s[0].confidence, 100);
        assert_eq!(s[1].target_field.as_deref(), Some("dispatch_time"));
        assert_eq!(s[2].target_field.as_deref(), Some("arrival_time"));
        assert_eq!(s[2].confidence, 50);
        assert_eq!(s[3].target_field, None);
        assert_eq!(s[3].reasons, vec![NO_MATCH_REASON.to_string()]);
    }

    #[test]
    fn min_confidence_filters_weak_matches() {
        let s = suggest_mappings(&cols(&["Arrival"]), &cad_target_fields(), 60);
        assert_eq!(s[0].target_field, None);
    }

    #[test]
    fn empty_schema_never_matches() {
        let s = suggest_mappings(&cols(&["anything"]), &[], 0);
        assert_eq!(s[0].target_field, None);
    }

    #[test]
    fn validation_reports_missing_duplicate_unknown_and_low_confidence() {
        let targets = cad_target_fields();
        let v = validate_mappings(
            &[
                mapping("IncNum", "incident_id"),
                mapping("Event Number", "incident_id"),
                mapping("Weather", "weather"),
            ],
            &targets,
            LOW_CONFIDENCE_WARNING,
        );
        assert!(!v.is_valid);
        let codes = v.errors.iter().map(|e| e.code.as_str()).collect::<Vec<_>>();
        assert_eq!(
            codes,
            vec![
                "MAPPING_REQUIRED_TARGET_MISSING",
                "MAPPING_TARGET_DUPLICATED",
                "MAPPING_TARGET_UNKNOWN"
            ]
        );
        assert!(v
            .warnings
            .iter()
            .all(|w| w.code == "MAPPING_LOW_CONFIDENCE"));
        assert_eq!(v.warnings.len(), 2);
    }

    #[test]
    fn clean_mapping_is_valid() {
        let v = validate_mappings(
            &[
                mapping("Incident ID", "incident_id"),
                mapping("incident_date", "incident_date"),
            ],
            &cad_target_fields(),
            LOW_CONFIDENCE_WARNING,
        );
        assert!(v.is_valid, "{v:?}");
        assert!(v.warnings.is_empty());
    }
}
