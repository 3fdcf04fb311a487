use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{IncidentRecord, ValidationWarning};

fn is_blank(v: &Option<String>) -> bool {
    v.as_deref().map(str::trim).map_or(true, str::is_empty)
}

/// Check the identifying fields an incident needs before it can be aggregated.
///
/// `row` is the record's position in its batch and only labels the warnings.
pub fn validate_record(record: &IncidentRecord, row: usize) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    if is_blank(&record.incident_id) {
        warnings.push(
            ValidationWarning::new("VALIDATION_MISSING_INCIDENT_ID", "Record missing incidentId")
                .with_details(format!("row={row}")),
        );
    }
    if is_blank(&record.incident_date) {
        warnings.push(
            ValidationWarning::new(
                "VALIDATION_MISSING_INCIDENT_DATE",
                "Record missing incidentDate",
            )
            .with_details(format!(
                "row={row}; incident_id={}",
                record.incident_id.as_deref().unwrap_or("")
            )),
        );
    }
    warnings
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordValidationReportItem {
    pub row: usize,
    pub incident_id: Option<String>,
    pub warnings: Vec<ValidationWarning>,
}

/// Validate a whole batch: per-record identity checks plus duplicate `incidentId`s.
///
/// Duplicates are flagged on every occurrence after the first. Only records with at least
/// one warning are reported.
pub fn validate_batch(records: &[IncidentRecord]) -> Vec<RecordValidationReportItem> {
    let mut first_seen: BTreeMap<&str, usize> = BTreeMap::new();
    let mut out = Vec::new();

    for (row, record) in records.iter().enumerate() {
        let mut warnings = validate_record(record, row);

        if let Some(id) = record.incident_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            match first_seen.get(id) {
                Some(first) => warnings.push(
                    ValidationWarning::new(
                        "VALIDATION_DUPLICATE_INCIDENT_ID",
                        "incidentId appears more than once in batch",
                    )
                    .with_details(format!("row={row}; first_row={first}; incident_id={id}")),
                ),
                None => {
                    first_seen.insert(id, row);
                }
            }
        }

        if !warnings.is_empty() {
            out.push(RecordValidationReportItem {
                row,
                incident_id: record.incident_id.clone(),
                warnings,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: Option<&str>, date: Option<&str>) -> IncidentRecord {
        IncidentRecord {
            incident_id: id.map(str::to_string),
            incident_date: date.map(str::to_string),
            ..IncidentRecord::default()
        }
    }

    #[test]
    fn flags_missing_identity_fields() {
        let w = validate_record(&rec(Some(" "), None), 3);
        let codes = w.iter().map(|w| w.code.as_str()).collect::<Vec<_>>();
        assert_eq!(
            codes,
            vec![
                "VALIDATION_MISSING_INCIDENT_ID",
                "VALIDATION_MISSING_INCIDENT_DATE"
            ]
        );
        assert_eq!(w[0].details.as_deref(), Some("row=3"));
    }

    #[test]
    fn batch_flags_later_duplicates_only() {
        let report = validate_batch(&[
            rec(Some("A"), Some("01/01/2024")),
            rec(Some("B"), Some("01/01/2024")),
            rec(Some("A"), Some("01/02/2024")),
        ]);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].row, 2);
        assert_eq!(report[0].warnings[0].code, "VALIDATION_DUPLICATE_INCIDENT_ID");
    }
}
