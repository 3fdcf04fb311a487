use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Tunables for reconciliation, parsing, interval bounds and NFPA 1710 evaluation.
///
/// Every field has a default, so a config file only needs the keys it overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum similarity (0..=100) for a mapping suggestion to name a target.
    pub min_confidence: u8,
    /// Mappings scoring below this are flagged as low-confidence during validation.
    pub low_confidence_warning: u8,
    /// Two-digit years below the pivot land in 20xx, the rest in 19xx.
    pub two_digit_year_pivot: u8,
    pub bounds: IntervalBounds,
    pub nfpa: NfpaThresholds,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntervalBounds {
    /// Exclusive upper bound for dispatch, turnout, travel and total response.
    pub response_max_seconds: f64,
    /// Exclusive upper bound for scene time and total incident time.
    pub scene_max_seconds: f64,
    /// Added once to a clear time that precedes its start (midnight crossing).
    pub rollover_seconds: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NfpaThresholds {
    pub dispatch_seconds: f64,
    pub turnout_seconds: f64,
    pub total_response_seconds: f64,
    /// Percentile the thresholds are evaluated at.
    pub percentile: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_confidence: 30,
            low_confidence_warning: 70,
            two_digit_year_pivot: 30,
            bounds: IntervalBounds::default(),
            nfpa: NfpaThresholds::default(),
        }
    }
}

impl Default for IntervalBounds {
    fn default() -> Self {
        Self {
            response_max_seconds: 86_400.0,
            scene_max_seconds: 259_200.0,
            rollover_seconds: 86_400.0,
        }
    }
}

impl Default for NfpaThresholds {
    fn default() -> Self {
        Self {
            dispatch_seconds: 60.0,
            turnout_seconds: 80.0,
            total_response_seconds: 300.0,
            percentile: 90.0,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, AppError> {
        let cfg: EngineConfig = serde_json::from_str(text).map_err(|e| {
            AppError::new("CONFIG_PARSE_FAILED", "Failed to parse engine config JSON")
                .with_details(e.to_string())
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path).map_err(|e| {
            AppError::new("CONFIG_READ_FAILED", "Failed to read engine config file")
                .with_details(format!("path={}; err={e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let invalid = |msg: &str, details: String| {
            Err(AppError::new("CONFIG_INVALID", msg.to_string()).with_details(details))
        };

        if self.min_confidence > 100 || self.low_confidence_warning > 100 {
            return invalid(
                "Confidence thresholds must be within 0..=100",
                format!(
                    "min_confidence={}; low_confidence_warning={}",
                    self.min_confidence, self.low_confidence_warning
                ),
            );
        }
        if self.two_digit_year_pivot > 99 {
            return invalid(
                "two_digit_year_pivot must be within 0..=99",
                format!("value={}", self.two_digit_year_pivot),
            );
        }
        let b = &self.bounds;
        for (name, v) in [
            ("response_max_seconds", b.response_max_seconds),
            ("scene_max_seconds", b.scene_max_seconds),
            ("rollover_seconds", b.rollover_seconds),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return invalid("Interval bounds must be positive", format!("{name}={v}"));
            }
        }
        let n = &self.nfpa;
        for (name, v) in [
            ("dispatch_seconds", n.dispatch_seconds),
            ("turnout_seconds", n.turnout_seconds),
            ("total_response_seconds", n.total_response_seconds),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return invalid("NFPA thresholds must be positive", format!("{name}={v}"));
            }
        }
        if !(n.percentile > 0.0 && n.percentile <= 100.0) {
            return invalid(
                "NFPA percentile must be within (0, 100]",
                format!("percentile={}", n.percentile),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_json_overrides_only_named_keys() {
        let cfg = EngineConfig::from_json_str(r#"{"min_confidence": 50, "bounds": {"scene_max_seconds": 3600}}"#)
            .expect("config");
        assert_eq!(cfg.min_confidence, 50);
        assert_eq!(cfg.low_confidence_warning, 70);
        assert_eq!(cfg.bounds.scene_max_seconds, 3600.0);
        assert_eq!(cfg.bounds.response_max_seconds, 86_400.0);
        assert_eq!(cfg.nfpa.turnout_seconds, 80.0);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = EngineConfig::from_json_str(r#"{"min_confidence": 150}"#).unwrap_err();
        assert_eq!(err.code, "CONFIG_INVALID");

        let err = EngineConfig::from_json_str(r#"{"nfpa": {"percentile": 0}}"#).unwrap_err();
        assert_eq!(err.code, "CONFIG_INVALID");

        let err = EngineConfig::from_json_str("{not json").unwrap_err();
        assert_eq!(err.code, "CONFIG_PARSE_FAILED");
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{"two_digit_year_pivot": 50}}"#).expect("write");
        let cfg = EngineConfig::load(file.path()).expect("load");
        assert_eq!(cfg.two_digit_year_pivot, 50);

        let missing = EngineConfig::load(Path::new("/nonexistent/cad.json")).unwrap_err();
        assert_eq!(missing.code, "CONFIG_READ_FAILED");
    }
}
