//! Injectable diagnostic sinks.
//!
//! Every engine entry point reports data-quality problems through `&mut dyn Diagnostics`
//! rather than failing. Callers pick the sink: collect into a `Vec` (tests, UI banners),
//! keep a full `DiagnosticLog`, or forward to `tracing`.

use serde::{Deserialize, Serialize};

use crate::domain::ValidationWarning;

pub trait Diagnostics {
    /// Data problem that changed a result (null timestamp, rejected interval, dropped row).
    fn warn(&mut self, warning: ValidationWarning);

    /// Notable but benign interpretation (midnight rollover, timezone assumption).
    fn info(&mut self, note: ValidationWarning);
}

/// Collects warnings only; notes are discarded.
impl Diagnostics for Vec<ValidationWarning> {
    fn warn(&mut self, warning: ValidationWarning) {
        self.push(warning);
    }

    fn info(&mut self, _note: ValidationWarning) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn warn(&mut self, _warning: ValidationWarning) {}
    fn info(&mut self, _note: ValidationWarning) {}
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Warn,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticEntry {
    pub level: DiagnosticLevel,
    #[serde(flatten)]
    pub warning: ValidationWarning,
}

/// Ordered record of everything emitted, replayable into another sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticLog {
    pub entries: Vec<DiagnosticEntry>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationWarning> {
        self.entries
            .iter()
            .filter(|e| e.level == DiagnosticLevel::Warn)
            .map(|e| &e.warning)
    }

    pub fn notes(&self) -> impl Iterator<Item = &ValidationWarning> {
        self.entries
            .iter()
            .filter(|e| e.level == DiagnosticLevel::Info)
            .map(|e| &e.warning)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.entries.iter().any(|e| e.warning.code == code)
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn replay_into(self, sink: &mut dyn Diagnostics) {
        for entry in self.entries {
            match entry.level {
                DiagnosticLevel::Warn => sink.warn(entry.warning),
                DiagnosticLevel::Info => sink.info(entry.warning),
            }
        }
    }
}

impl Diagnostics for DiagnosticLog {
    fn warn(&mut self, warning: ValidationWarning) {
        self.entries.push(DiagnosticEntry {
            level: DiagnosticLevel::Warn,
            warning,
        });
    }

    fn info(&mut self, note: ValidationWarning) {
        self.entries.push(DiagnosticEntry {
            level: DiagnosticLevel::Info,
            warning: note,
        });
    }
}

/// Forwards diagnostics to the `tracing` subscriber installed by the host application.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn warn(&mut self, warning: ValidationWarning) {
        tracing::warn!(
            code = %warning.code,
            details = warning.details.as_deref().unwrap_or(""),
            "{}",
            warning.message
        );
    }

    fn info(&mut self, note: ValidationWarning) {
        tracing::info!(
            code = %note.code,
            details = note.details.as_deref().unwrap_or(""),
            "{}",
            note.message
        );
    }
}
