use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One untyped source row as exported by a CAD vendor (column name -> scalar cell).
pub type RawRow = BTreeMap<String, Value>;

/// Canonical incident representation consumed by the metrics calculator.
///
/// Notes:
/// - Timestamps stay as the free-form strings the vendor exported; parsing happens per
///   field in `normalize::timestamps` and never mutates the record.
/// - `incident_id` and `incident_date` are required for aggregation but nullable here so
///   that invalid rows survive reconciliation and are reported by validation instead of
///   vanishing silently.
/// - Columns that were not mapped to a canonical field are preserved in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct IncidentRecord {
    pub incident_id: Option<String>,
    pub incident_date: Option<String>,

    pub incident_time: Option<String>,
    pub dispatch_time: Option<String>,
    pub en_route_time: Option<String>,
    pub arrival_time: Option<String>,
    pub clear_time: Option<String>,

    pub incident_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Per-incident NFPA 1710 intervals in seconds. `None` means "not computable".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTimeMetrics {
    pub dispatch_time: Option<f64>,
    pub turnout_time: Option<f64>,
    pub travel_time: Option<f64>,
    pub total_response_time: Option<f64>,
    pub scene_time: Option<f64>,
    pub total_incident_time: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MetricKind {
    DispatchTime,
    TurnoutTime,
    TravelTime,
    TotalResponseTime,
    SceneTime,
    TotalIncidentTime,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::DispatchTime,
        MetricKind::TurnoutTime,
        MetricKind::TravelTime,
        MetricKind::TotalResponseTime,
        MetricKind::SceneTime,
        MetricKind::TotalIncidentTime,
    ];

    /// Wire name, matching the serialized field of `ResponseTimeMetrics`.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::DispatchTime => "dispatchTime",
            MetricKind::TurnoutTime => "turnoutTime",
            MetricKind::TravelTime => "travelTime",
            MetricKind::TotalResponseTime => "totalResponseTime",
            MetricKind::SceneTime => "sceneTime",
            MetricKind::TotalIncidentTime => "totalIncidentTime",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MetricKind::DispatchTime => "Dispatch",
            MetricKind::TurnoutTime => "Turnout",
            MetricKind::TravelTime => "Travel",
            MetricKind::TotalResponseTime => "Total response",
            MetricKind::SceneTime => "Scene",
            MetricKind::TotalIncidentTime => "Total incident",
        }
    }
}

impl ResponseTimeMetrics {
    pub fn get(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::DispatchTime => self.dispatch_time,
            MetricKind::TurnoutTime => self.turnout_time,
            MetricKind::TravelTime => self.travel_time,
            MetricKind::TotalResponseTime => self.total_response_time,
            MetricKind::SceneTime => self.scene_time,
            MetricKind::TotalIncidentTime => self.total_incident_time,
        }
    }

    pub fn set(&mut self, kind: MetricKind, value: Option<f64>) {
        let slot = match kind {
            MetricKind::DispatchTime => &mut self.dispatch_time,
            MetricKind::TurnoutTime => &mut self.turnout_time,
            MetricKind::TravelTime => &mut self.travel_time,
            MetricKind::TotalResponseTime => &mut self.total_response_time,
            MetricKind::SceneTime => &mut self.scene_time,
            MetricKind::TotalIncidentTime => &mut self.total_incident_time,
        };
        *slot = value;
    }

    pub fn is_empty(&self) -> bool {
        MetricKind::ALL.iter().all(|k| self.get(*k).is_none())
    }
}

/// Batch statistics; each statistic is computed independently per metric.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTimeStatistics {
    pub mean: ResponseTimeMetrics,
    pub median: ResponseTimeMetrics,
    pub ninetieth_percentile: ResponseTimeMetrics,
    pub standard_deviation: ResponseTimeMetrics,
    pub min: ResponseTimeMetrics,
    pub max: ResponseTimeMetrics,
    /// Incidents that contributed at least one non-null metric.
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Datetime,
    Time,
}

/// Expected input column of an analysis tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetField {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
}

impl TargetField {
    pub fn new(id: &str, name: &str, field_type: FieldType, required: bool) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            field_type,
            required,
        }
    }
}

/// Named, parameterized value transform (e.g. `trim`, `parse-number`, `combine`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transformation {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl Transformation {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Resolved source column -> canonical target, with transforms applied left-to-right.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub source_field: String,
    pub target_field: String,
    #[serde(default)]
    pub transformations: Vec<Transformation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MappingSuggestion {
    pub source_field: String,
    pub target_field: Option<String>,
    /// 0..=100
    pub confidence: u8,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    Split,
    Combined,
    Simple,
    Unknown,
}

/// Date/time column layout of a whole dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DateTimePattern {
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    /// 0.0..=1.0
    pub confidence: f64,
    pub date_field: Option<String>,
    pub time_field: Option<String>,
    pub combined_field: Option<String>,
    pub description: String,
}

impl DateTimePattern {
    pub fn unknown() -> Self {
        Self {
            pattern_type: PatternType::Unknown,
            confidence: 0.0,
            date_field: None,
            time_field: None,
            combined_field: None,
            description: "No recognizable date/time layout".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatternTransform {
    Combine,
    Direct,
    Extract,
}

/// Field-combination rule proposed by the pattern detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedFieldMapping {
    pub source_fields: Vec<String>,
    pub target_field: String,
    pub transform: PatternTransform,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl ValidationWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Text of a scalar cell: trimmed strings, numbers and booleans rendered, empty/null -> None.
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn incident_record_keeps_unknown_columns_in_passthrough_bag() {
        let rec: IncidentRecord = serde_json::from_value(json!({
            "incidentId": "F24-001",
            "incidentDate": "01/15/2024",
            "enRouteTime": "14:02:30",
            "station": "Engine 7"
        }))
        .expect("decode");
        assert_eq!(rec.incident_id.as_deref(), Some("F24-001"));
        assert_eq!(rec.en_route_time.as_deref(), Some("14:02:30"));
        assert_eq!(rec.extra.get("station"), Some(&json!("Engine 7")));
    }

    #[test]
    fn metrics_accessors_follow_metric_kind() {
        let mut m = ResponseTimeMetrics::default();
        assert!(m.is_empty());
        m.set(MetricKind::SceneTime, Some(12.0));
        assert_eq!(m.get(MetricKind::SceneTime), Some(12.0));
        assert!(!m.is_empty());
    }

    #[test]
    fn cell_text_treats_blank_as_missing() {
        assert_eq!(cell_text(&json!("  ")), None);
        assert_eq!(cell_text(&json!(" 14:00 ")), Some("14:00".to_string()));
        assert_eq!(cell_text(&json!(42)), Some("42".to_string()));
        assert_eq!(cell_text(&Value::Null), None);
    }
}
