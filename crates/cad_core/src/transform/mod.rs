//! Value transforms and the row -> `IncidentRecord` mapping step.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Number, Value};

use crate::detect::PatternDetection;
use crate::diagnostics::Diagnostics;
use crate::domain::{
    cell_text, FieldMapping, IncidentRecord, MappingSuggestion, PatternTransform, RawRow,
    Transformation, ValidationWarning,
};
use crate::normalize::patterns::{is_date_only, CLOCK};

pub type TransformParams = BTreeMap<String, String>;

/// Pure value transform. `None` means the result is empty (null).
pub type TransformFn = fn(&Value, &RawRow, &TransformParams) -> Option<Value>;

fn text(value: &Value) -> Option<String> {
    cell_text(value)
}

fn map_string(value: &Value, f: impl Fn(&str) -> String) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(Value::String(f(s))),
        other => Some(other.clone()),
    }
}

pub fn trim(value: &Value, _row: &RawRow, _params: &TransformParams) -> Option<Value> {
    map_string(value, |s| s.trim().to_string())
}

pub fn uppercase(value: &Value, _row: &RawRow, _params: &TransformParams) -> Option<Value> {
    map_string(value, str::to_uppercase)
}

pub fn lowercase(value: &Value, _row: &RawRow, _params: &TransformParams) -> Option<Value> {
    map_string(value, str::to_lowercase)
}

/// Numbers pass through; strings are parsed after dropping thousands separators.
pub fn parse_number(value: &Value, _row: &RawRow, _params: &TransformParams) -> Option<Value> {
    if let Value::Number(_) = value {
        return Some(value.clone());
    }
    let raw = text(value)?.replace(',', "");
    let n = raw.parse::<f64>().ok()?;
    Number::from_f64(n).map(Value::Number)
}

pub fn parse_boolean(value: &Value, _row: &RawRow, _params: &TransformParams) -> Option<Value> {
    if let Value::Bool(_) = value {
        return Some(value.clone());
    }
    match text(value)?.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "t" => Some(Value::Bool(true)),
        "false" | "no" | "n" | "0" | "f" => Some(Value::Bool(false)),
        _ => None,
    }
}

/// Param `value`: used when the cell is null or blank.
pub fn default_value(value: &Value, _row: &RawRow, params: &TransformParams) -> Option<Value> {
    match text(value) {
        Some(_) => Some(value.clone()),
        None => params.get("value").map(|v| Value::String(v.clone())),
    }
}

/// Params `from`, `to` (missing `to` deletes).
pub fn replace(value: &Value, _row: &RawRow, params: &TransformParams) -> Option<Value> {
    let Some(from) = params.get("from").filter(|f| !f.is_empty()) else {
        return Some(value.clone());
    };
    let to = params.get("to").map(String::as_str).unwrap_or("");
    map_string(value, |s| s.replace(from.as_str(), to))
}

/// Splits `date<space|T>time` into its two halves when the first half is a date.
fn split_datetime(raw: &str) -> Option<(&str, &str)> {
    let raw = raw.trim();
    let at = raw.find(|c: char| c == ' ' || c == 'T')?;
    let (date, rest) = raw.split_at(at);
    is_date_only(date).then(|| (date, rest[1..].trim()))
}

/// Date portion of a datetime string; date-only values pass through.
pub fn extract_date(value: &Value, _row: &RawRow, _params: &TransformParams) -> Option<Value> {
    let raw = text(value)?;
    if is_date_only(&raw) {
        return Some(Value::String(raw));
    }
    match split_datetime(&raw) {
        Some((date, _)) => Some(Value::String(date.to_string())),
        None => Some(Value::String(raw)),
    }
}

/// Time portion of a datetime string; clock values pass through, date-only becomes null.
pub fn extract_time(value: &Value, _row: &RawRow, _params: &TransformParams) -> Option<Value> {
    let raw = text(value)?;
    if CLOCK.is_match(&raw) {
        return Some(Value::String(raw));
    }
    if is_date_only(&raw) {
        return None;
    }
    match split_datetime(&raw) {
        Some((_, time)) if !time.is_empty() => Some(Value::String(time.to_string())),
        _ => Some(Value::String(raw)),
    }
}

/// Params `with` (other source column) and `separator` (default one space).
///
/// Either half alone is returned as-is; both missing is null.
pub fn combine(value: &Value, row: &RawRow, params: &TransformParams) -> Option<Value> {
    let other = params
        .get("with")
        .and_then(|col| row.get(col))
        .and_then(cell_text);
    let sep = params.get("separator").map(String::as_str).unwrap_or(" ");
    match (text(value), other) {
        (Some(a), Some(b)) => Some(Value::String(format!("{a}{sep}{b}"))),
        (Some(a), None) => Some(Value::String(a)),
        (None, Some(b)) => Some(Value::String(b)),
        (None, None) => None,
    }
}

pub fn direct(value: &Value, _row: &RawRow, _params: &TransformParams) -> Option<Value> {
    (!value.is_null()).then(|| value.clone())
}

/// Named transform functions.
#[derive(Clone)]
pub struct TransformRegistry {
    transforms: BTreeMap<String, TransformFn>,
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("transforms", &self.names())
            .finish()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TransformRegistry {
    pub fn empty() -> Self {
        Self {
            transforms: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut r = Self::empty();
        r.register("trim", trim);
        r.register("uppercase", uppercase);
        r.register("lowercase", lowercase);
        r.register("parse-number", parse_number);
        r.register("parse-boolean", parse_boolean);
        r.register("default", default_value);
        r.register("replace", replace);
        r.register("extract-date", extract_date);
        r.register("extract-time", extract_time);
        r.register("combine", combine);
        r.register("direct", direct);
        r
    }

    /// Add or replace a transform.
    pub fn register(&mut self, name: impl Into<String>, f: TransformFn) {
        self.transforms.insert(name.into(), f);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.transforms.keys().map(String::as_str).collect()
    }

    /// Apply one transform; unknown names warn and leave the value unchanged.
    pub fn apply(
        &self,
        transformation: &Transformation,
        value: Value,
        row: &RawRow,
        diag: &mut dyn Diagnostics,
    ) -> Value {
        match self.transforms.get(&transformation.kind) {
            Some(f) => f(&value, row, &transformation.params).unwrap_or(Value::Null),
            None => {
                diag.warn(
                    ValidationWarning::new(
                        "TRANSFORM_UNKNOWN",
                        format!("Unknown transform {}", transformation.kind),
                    )
                    .with_details(format!("transform={}", transformation.kind)),
                );
                value
            }
        }
    }

    /// Apply a chain left-to-right.
    pub fn apply_all(
        &self,
        transformations: &[Transformation],
        value: Value,
        row: &RawRow,
        diag: &mut dyn Diagnostics,
    ) -> Value {
        transformations
            .iter()
            .fold(value, |v, t| self.apply(t, v, row, diag))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    IncidentId,
    IncidentDate,
    IncidentTime,
    DispatchTime,
    EnRouteTime,
    ArrivalTime,
    ClearTime,
    IncidentType,
    Latitude,
    Longitude,
    Address,
}

impl Target {
    fn parse(name: &str) -> Option<Self> {
        Some(match name.trim() {
            "incident_id" | "incidentId" => Target::IncidentId,
            "incident_date" | "incidentDate" => Target::IncidentDate,
            "incident_time" | "incidentTime" => Target::IncidentTime,
            "dispatch_time" | "dispatchTime" => Target::DispatchTime,
            "en_route_time" | "enRouteTime" => Target::EnRouteTime,
            "arrival_time" | "arrivalTime" => Target::ArrivalTime,
            "clear_time" | "clearTime" => Target::ClearTime,
            "incident_type" | "incidentType" => Target::IncidentType,
            "latitude" => Target::Latitude,
            "longitude" => Target::Longitude,
            "address" => Target::Address,
            _ => return None,
        })
    }
}

fn as_coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        other => text(other)?.parse::<f64>().ok(),
    }
    .filter(|v| v.is_finite())
}

/// Stores `value` in the record; null values never overwrite an earlier mapping.
fn assign(
    record: &mut IncidentRecord,
    target: &str,
    value: Value,
    row: usize,
    diag: &mut dyn Diagnostics,
) {
    if value.is_null() {
        return;
    }
    let Some(field) = Target::parse(target) else {
        record.extra.insert(target.to_string(), value);
        return;
    };

    let slot = match field {
        Target::IncidentId => &mut record.incident_id,
        Target::IncidentDate => &mut record.incident_date,
        Target::IncidentTime => &mut record.incident_time,
        Target::DispatchTime => &mut record.dispatch_time,
        Target::EnRouteTime => &mut record.en_route_time,
        Target::ArrivalTime => &mut record.arrival_time,
        Target::ClearTime => &mut record.clear_time,
        Target::IncidentType => &mut record.incident_type,
        Target::Address => &mut record.address,
        Target::Latitude | Target::Longitude => {
            let coordinate = as_coordinate(&value);
            if coordinate.is_none() {
                diag.warn(
                    ValidationWarning::new(
                        "TRANSFORM_COORDINATE_INVALID",
                        format!("{target} is not a number"),
                    )
                    .with_details(format!("row={row}; value={value}")),
                );
                return;
            }
            if field == Target::Latitude {
                record.latitude = coordinate;
            } else {
                record.longitude = coordinate;
            }
            return;
        }
    };
    if let Some(t) = text(&value) {
        *slot = Some(t);
    }
}

/// Build canonical records from raw rows.
///
/// Each mapping reads its source column, runs its transforms, and stores the result in
/// the named target. Targets outside the canonical schema, and source columns no mapping
/// reads (directly or as a `combine` partner), are kept in `extra`.
pub fn apply_mappings(
    rows: &[RawRow],
    mappings: &[FieldMapping],
    registry: &TransformRegistry,
    diag: &mut dyn Diagnostics,
) -> Vec<IncidentRecord> {
    let mapped_sources = mappings
        .iter()
        .flat_map(|m| {
            let with = m.transformations.iter().filter_map(|t| t.param("with"));
            std::iter::once(m.source_field.as_str()).chain(with)
        })
        .collect::<BTreeSet<_>>();

    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            let mut record = IncidentRecord::default();
            for m in mappings {
                let value = row.get(&m.source_field).cloned().unwrap_or(Value::Null);
                let value = registry.apply_all(&m.transformations, value, row, diag);
                assign(&mut record, &m.target_field, value, idx, diag);
            }
            for (column, value) in row {
                if !mapped_sources.contains(column.as_str()) {
                    record
                        .extra
                        .entry(column.clone())
                        .or_insert_with(|| value.clone());
                }
            }
            record
        })
        .collect()
}

/// Turn the detector's field-combination rules into mappings.
pub fn mappings_from_pattern(detection: &PatternDetection) -> Vec<FieldMapping> {
    detection
        .suggested_mappings
        .iter()
        .filter_map(|s| {
            let (first, rest) = s.source_fields.split_first()?;
            let transformations = match s.transform {
                PatternTransform::Combine => match rest.first() {
                    Some(other) => vec![Transformation::new("combine").with_param("with", other)],
                    None => vec![Transformation::new("direct")],
                },
                PatternTransform::Direct => vec![Transformation::new("direct")],
                PatternTransform::Extract => vec![Transformation::new("extract-date")],
            };
            Some(FieldMapping {
                source_field: first.clone(),
                target_field: s.target_field.clone(),
                transformations,
            })
        })
        .collect()
}

/// Accepted suggestions become trimmed one-to-one mappings.
pub fn mappings_from_suggestions(suggestions: &[MappingSuggestion]) -> Vec<FieldMapping> {
    suggestions
        .iter()
        .filter_map(|s| {
            Some(FieldMapping {
                source_field: s.source_field.clone(),
                target_field: s.target_field.clone()?,
                transformations: vec![Transformation::new("trim")],
            })
        })
        .collect()
}
