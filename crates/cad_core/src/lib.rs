pub mod compliance;
pub mod config;
pub mod detect;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod stats;
pub mod transform;
pub mod validate;
