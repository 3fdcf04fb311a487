//! Dataset-level date/time layout detection.
//!
//! CAD exports put the alarm time in one of a few layouts: separate date and time
//! columns with vendor names (`inc_date` + `alarm_time`), one combined datetime column
//! (`CallDateTime`), or plain `Date` + `Time` columns. Classifiers run in a fixed
//! priority order and the first one exceeding its threshold wins.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{
    cell_text, DateTimePattern, PatternTransform, PatternType, RawRow, SuggestedFieldMapping,
};
use crate::normalize::patterns::{
    FULL_DATETIME_SHAPES, SAMPLE_SLASH_DATETIME, SAMPLE_TIME_ONLY,
};

pub const INCIDENT_TIME_TARGET: &str = "incident_time";
pub const INCIDENT_DATE_TARGET: &str = "incident_date";

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static column-name pattern compiles"))
        .collect()
}

static SPLIT_DATE_NAMES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)^(inc|incident|call|alarm|alm|event|evt|disp|dispatch|response|rpt|report)[_\s.-]*date$",
        r"(?i)^date[_\s.-]*(of[_\s.-]*)?(incident|call|alarm|event|response)$",
        r"(?i)^(inc|incident|call|alarm)[_\s.-]*dt$",
    ])
});

static SPLIT_TIME_NAMES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)^(inc|incident|call|alarm|alm|psap|received|rcvd|event|evt)[_\s.-]*time$",
        r"(?i)^time[_\s.-]*(of[_\s.-]*)?(call|alarm|incident|received|event)$",
        r"(?i)^(alarm|call|inc)[_\s.-]*tm$",
    ])
});

static COMBINED_NAMES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"(?i)date[_\s.-]*time",
        r"(?i)^(call|alarm|incident|inc|received|event|psap)[_\s.-]*(dt|dttm|ts|timestamp)$",
        r"(?i)timestamp",
    ])
});

/// Names that suggest the moment the call was received (preferred combined source).
static RECEIPT_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(call|alarm|incident|inc|received|rcvd|psap|create)")
        .expect("static receipt pattern compiles")
});

static SAMPLE_DATE_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").expect("static date pattern compiles")
});

/// Detected layout plus the field-combination rules it implies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatternDetection {
    pub pattern: DateTimePattern,
    pub suggested_mappings: Vec<SuggestedFieldMapping>,
}

impl PatternDetection {
    pub fn unknown() -> Self {
        Self {
            pattern: DateTimePattern::unknown(),
            suggested_mappings: Vec::new(),
        }
    }
}

/// One layout strategy in the detection cascade.
pub trait PatternClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Minimum confidence for this classifier's result to be accepted.
    fn threshold(&self) -> f64;

    /// Best guess for this layout; `None` when nothing in the columns hints at it.
    fn classify(&self, columns: &[String], sample: &RawRow) -> Option<PatternDetection>;
}

fn sample_value(sample: &RawRow, column: &str) -> Option<String> {
    sample.get(column).and_then(cell_text)
}

fn first_matching<'a>(columns: &'a [String], names: &[Regex], skip: Option<&str>) -> Option<&'a String> {
    columns
        .iter()
        .filter(|c| Some(c.as_str()) != skip)
        .find(|c| names.iter().any(|re| re.is_match(c.trim())))
}

fn suggestion(
    sources: &[&str],
    target: &str,
    transform: PatternTransform,
    description: String,
) -> SuggestedFieldMapping {
    SuggestedFieldMapping {
        source_fields: sources.iter().map(|s| s.to_string()).collect(),
        target_field: target.to_string(),
        transform,
        description,
    }
}

/// Vendor-named date and time columns (`inc_date` + `alarm_time`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitClassifier;

impl PatternClassifier for SplitClassifier {
    fn name(&self) -> &'static str {
        "split"
    }

    fn threshold(&self) -> f64 {
        0.7
    }

    fn classify(&self, columns: &[String], sample: &RawRow) -> Option<PatternDetection> {
        let combined = |c: &String| COMBINED_NAMES.iter().any(|re| re.is_match(c));
        let candidates = columns
            .iter()
            .filter(|c| !combined(*c))
            .cloned()
            .collect::<Vec<_>>();

        let date_col = first_matching(&candidates, &SPLIT_DATE_NAMES, None);
        let time_col = first_matching(&candidates, &SPLIT_TIME_NAMES, date_col.map(String::as_str));
        if date_col.is_none() && time_col.is_none() {
            return None;
        }

        let mut confidence = 0.0;
        if date_col.is_some() {
            confidence += 0.3;
        }
        if time_col.is_some() {
            confidence += 0.3;
        }

        let (Some(date_col), Some(time_col)) = (date_col, time_col) else {
            let mut pattern = DateTimePattern::unknown();
            pattern.pattern_type = PatternType::Split;
            pattern.confidence = confidence;
            pattern.date_field = date_col.cloned();
            pattern.time_field = time_col.cloned();
            pattern.description = "Only one half of a split date/time layout found".to_string();
            return Some(PatternDetection {
                pattern,
                suggested_mappings: Vec::new(),
            });
        };

        let date_ok = sample_value(sample, date_col).is_some_and(|v| SAMPLE_DATE_ONLY.is_match(&v));
        let time_ok = sample_value(sample, time_col).is_some_and(|v| SAMPLE_TIME_ONLY.is_match(&v));
        if date_ok && time_ok {
            confidence += 0.4;
        }

        Some(PatternDetection {
            pattern: DateTimePattern {
                pattern_type: PatternType::Split,
                confidence: f64::min(confidence, 1.0),
                date_field: Some(date_col.clone()),
                time_field: Some(time_col.clone()),
                combined_field: None,
                description: format!("Separate date ({date_col}) and time ({time_col}) columns"),
            },
            suggested_mappings: vec![
                suggestion(
                    &[date_col.as_str(), time_col.as_str()],
                    INCIDENT_TIME_TARGET,
                    PatternTransform::Combine,
                    format!("Combine {date_col} and {time_col} into the incident time"),
                ),
                suggestion(
                    &[date_col.as_str()],
                    INCIDENT_DATE_TARGET,
                    PatternTransform::Extract,
                    format!("Use the date in {date_col} as the incident date"),
                ),
            ],
        })
    }
}

/// One column carrying both date and time (`CallDateTime`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CombinedClassifier;

impl PatternClassifier for CombinedClassifier {
    fn name(&self) -> &'static str {
        "combined"
    }

    fn threshold(&self) -> f64 {
        0.7
    }

    fn classify(&self, columns: &[String], sample: &RawRow) -> Option<PatternDetection> {
        let named = columns
            .iter()
            .filter(|c| COMBINED_NAMES.iter().any(|re| re.is_match(c.trim())))
            .collect::<Vec<_>>();

        let (column, mut confidence) = match named
            .iter()
            .find(|c| RECEIPT_HINT.is_match(c))
            .or_else(|| named.first())
        {
            Some(c) => ((*c).clone(), 0.4),
            None => {
                let scanned = columns.iter().find(|c| {
                    sample_value(sample, c).is_some_and(|v| SAMPLE_SLASH_DATETIME.is_match(&v))
                })?;
                (scanned.clone(), 0.3)
            }
        };

        if sample_value(sample, &column)
            .is_some_and(|v| FULL_DATETIME_SHAPES.iter().any(|re| re.is_match(&v)))
        {
            confidence += 0.4;
        }

        Some(PatternDetection {
            pattern: DateTimePattern {
                pattern_type: PatternType::Combined,
                confidence: f64::min(confidence, 1.0),
                date_field: None,
                time_field: None,
                combined_field: Some(column.clone()),
                description: format!("Combined date/time column ({column})"),
            },
            suggested_mappings: vec![
                suggestion(
                    &[column.as_str()],
                    INCIDENT_TIME_TARGET,
                    PatternTransform::Direct,
                    format!("Use {column} directly as the incident time"),
                ),
                suggestion(
                    &[column.as_str()],
                    INCIDENT_DATE_TARGET,
                    PatternTransform::Extract,
                    format!("Extract the date portion of {column}"),
                ),
            ],
        })
    }
}

/// Plain `Date` + `Time` columns (typical of volunteer-department spreadsheets).
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleClassifier;

impl PatternClassifier for SimpleClassifier {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn threshold(&self) -> f64 {
        0.5
    }

    fn classify(&self, columns: &[String], sample: &RawRow) -> Option<PatternDetection> {
        let exact = |want: &str| columns.iter().find(|c| c.trim().eq_ignore_ascii_case(want));
        let date_col = exact("date");
        let time_col = exact("time");
        if date_col.is_none() && time_col.is_none() {
            return None;
        }

        let mut confidence = 0.0;
        if date_col.is_some() {
            confidence += 0.4;
        }
        if time_col.is_some() {
            confidence += 0.4;
        }
        let populated = |c: Option<&String>| c.and_then(|c| sample_value(sample, c)).is_some();
        if populated(date_col) && populated(time_col) {
            confidence += 0.3;
        }

        let mut suggested_mappings = Vec::new();
        if let (Some(d), Some(t)) = (date_col, time_col) {
            suggested_mappings.push(suggestion(
                &[d.as_str(), t.as_str()],
                INCIDENT_TIME_TARGET,
                PatternTransform::Combine,
                format!("Combine {d} and {t} into the incident time"),
            ));
        }
        if let Some(d) = date_col {
            suggested_mappings.push(suggestion(
                &[d.as_str()],
                INCIDENT_DATE_TARGET,
                PatternTransform::Direct,
                format!("Use {d} as the incident date"),
            ));
        }

        Some(PatternDetection {
            pattern: DateTimePattern {
                pattern_type: PatternType::Simple,
                confidence: f64::min(confidence, 1.0),
                date_field: date_col.cloned(),
                time_field: time_col.cloned(),
                combined_field: None,
                description: "Simple Date and Time columns".to_string(),
            },
            suggested_mappings,
        })
    }
}

/// Ordered classifier cascade.
pub struct PatternDetector {
    classifiers: Vec<Box<dyn PatternClassifier>>,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self {
            classifiers: vec![
                Box::new(SplitClassifier),
                Box::new(CombinedClassifier),
                Box::new(SimpleClassifier),
            ],
        }
    }
}

impl PatternDetector {
    /// Append a classifier after the built-in ones.
    pub fn with_classifier(mut self, classifier: Box<dyn PatternClassifier>) -> Self {
        self.classifiers.push(classifier);
        self
    }

    pub fn classifier_names(&self) -> Vec<&'static str> {
        self.classifiers.iter().map(|c| c.name()).collect()
    }

    /// First classifier whose confidence exceeds its threshold; otherwise `unknown`.
    pub fn detect(&self, columns: &[String], sample: &RawRow) -> PatternDetection {
        for classifier in &self.classifiers {
            if let Some(found) = classifier.classify(columns, sample) {
                // Strictly above; the tolerance keeps float sums equal to the threshold out.
                if found.pattern.confidence > classifier.threshold() + 1e-9 {
                    return found;
                }
            }
        }
        PatternDetection::unknown()
    }

    /// Detect from a dataset, sampling its first row with any non-empty value.
    pub fn detect_rows(&self, columns: &[String], rows: &[RawRow]) -> PatternDetection {
        let empty = RawRow::new();
        let sample = rows
            .iter()
            .find(|row| row.values().any(|v| cell_text(v).is_some()))
            .unwrap_or(&empty);
        self.detect(columns, sample)
    }
}

pub fn detect_datetime_pattern(columns: &[String], sample: &RawRow) -> PatternDetection {
    PatternDetector::default().detect(columns, sample)
}
