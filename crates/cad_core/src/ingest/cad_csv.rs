use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diagnostics::Diagnostics;
use crate::domain::{RawRow, ValidationWarning};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CadCsvPreview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Parsed export: header order is kept for pattern detection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CadCsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

fn reader(csv_text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_text.trim_start_matches('\u{feff}').as_bytes())
}

fn read_headers(rdr: &mut csv::Reader<&[u8]>) -> Result<Vec<String>, AppError> {
    let headers = rdr
        .headers()
        .map_err(|e| {
            AppError::new(
                "INGEST_CAD_CSV_HEADERS_FAILED",
                "Failed to read CAD CSV headers",
            )
            .with_details(e.to_string())
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::new(
            "INGEST_CAD_CSV_NO_HEADERS",
            "CAD CSV has no header row",
        ));
    }
    Ok(headers)
}

/// First `max_rows` rows as raw strings, for column-mapping screens.
pub fn preview_cad_csv(csv_text: &str, max_rows: usize) -> Result<CadCsvPreview, AppError> {
    let mut rdr = reader(csv_text);
    let headers = read_headers(&mut rdr)?;

    let mut rows = Vec::new();
    for result in rdr.records().take(max_rows) {
        let row = result.map_err(|e| {
            AppError::new("INGEST_CAD_CSV_PARSE_FAILED", "Failed to parse CAD CSV row")
                .with_details(e.to_string())
        })?;
        rows.push(row.iter().map(|v| v.to_string()).collect::<Vec<_>>());
    }

    Ok(CadCsvPreview { headers, rows })
}

/// Read a whole export into raw rows.
///
/// Cells are trimmed and blank cells become null. Rows the CSV reader rejects (wrong
/// field count, bad quoting) are skipped with a warning; later duplicate headers are
/// ignored with a warning.
pub fn read_cad_csv(csv_text: &str, diag: &mut dyn Diagnostics) -> Result<CadCsvTable, AppError> {
    let mut rdr = reader(csv_text);
    let headers = read_headers(&mut rdr)?;

    let mut seen = BTreeSet::new();
    let mut keep = Vec::with_capacity(headers.len());
    for h in &headers {
        let first = !h.is_empty() && seen.insert(h.clone());
        if !first && !h.is_empty() {
            diag.warn(
                ValidationWarning::new(
                    "INGEST_CAD_CSV_DUPLICATE_HEADER",
                    "Duplicate CAD CSV header; later column ignored",
                )
                .with_details(format!("header={h}")),
            );
        }
        keep.push(first);
    }

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        // 1-based data row; the header is line 1.
        let line = idx + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                diag.warn(
                    ValidationWarning::new(
                        "INGEST_CAD_CSV_ROW_SKIPPED",
                        "Skipped malformed CAD CSV row",
                    )
                    .with_details(format!("line={line}; err={e}")),
                );
                continue;
            }
        };

        let row = headers
            .iter()
            .zip(&keep)
            .zip(record.iter())
            .filter(|((_, k), _)| **k)
            .map(|((h, _), cell)| {
                let cell = cell.trim();
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                (h.clone(), value)
            })
            .collect::<RawRow>();
        rows.push(row);
    }

    Ok(CadCsvTable {
        headers: headers
            .into_iter()
            .zip(keep)
            .filter_map(|(h, k)| k.then_some(h))
            .collect(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn preview_limits_rows() {
        let p = preview_cad_csv("IncNum,Date\nA,01/01/2024\nB,01/02/2024\n", 1).expect("preview");
        assert_eq!(p.headers, vec!["IncNum", "Date"]);
        assert_eq!(p.rows, vec![vec!["A".to_string(), "01/01/2024".to_string()]]);
    }

    #[test]
    fn blank_cells_become_null() {
        let mut warnings = Vec::new();
        let t = read_cad_csv("\u{feff}IncNum, Disp \nA,  \n", &mut warnings).expect("read");
        assert_eq!(t.headers, vec!["IncNum", "Disp"]);
        assert_eq!(t.rows[0].get("Disp"), Some(&Value::Null));
        assert_eq!(t.rows[0].get("IncNum"), Some(&Value::String("A".to_string())));
        assert!(warnings.is_empty());
    }

    #[test]
    fn ragged_rows_are_skipped_with_warning() {
        let mut warnings = Vec::new();
        let t = read_cad_csv("a,b\n1,2\n1,2,3\n4,5\n", &mut warnings).expect("read");
        assert_eq!(t.rows.len(), 2);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, "INGEST_CAD_CSV_ROW_SKIPPED");
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = read_cad_csv("", &mut Vec::new()).expect_err("no headers");
        assert_eq!(err.code, "INGEST_CAD_CSV_NO_HEADERS");
    }
}
