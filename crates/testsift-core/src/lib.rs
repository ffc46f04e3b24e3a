//! testsift - regression test selection and prioritization for CI.
//!
//! Given a suite manifest, a bounded window of recent build outcomes, and
//! optionally the set of modules reachable from the files changed since the
//! last build, testsift reorders the manifest so the tests most likely to
//! reveal a new defect run first. A persisted priority window guarantees
//! that every test is re-prioritized at a bounded interval, so nothing is
//! silently skipped forever.
//!
//! The library decides *which* tests run and *in what order*; executing
//! them is the build script's job.

pub mod changes;
pub mod engine;
pub mod error;
pub mod history;
pub mod manifest;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod state;
pub mod telemetry;

// Re-export key types
pub use changes::ChangeSet;
pub use engine::PriorityEngine;
pub use error::{Error, Result};
pub use history::{
    BuildHistory, BuildLog, BuildOutcome, BuildStatus, HistoryScan, HistoryScanner,
    HistoryWindows,
};
pub use manifest::{SectionMarkers, SuiteManifest};
pub use pipeline::{SelectionConfig, SelectionOutcome, SelectionPipeline};
pub use registry::{Priority, TestCase, TestRegistry};
pub use report::{
    write_selection_report_json, SelectionReportArtifact, SelectionSummaryArtifact,
    REPORT_SCHEMA_VERSION,
};
pub use resolver::{DependencyResolver, HandoffResolver, ReferenceGraph};
pub use state::{PriorityState, PriorityStateStore};
pub use telemetry::init_tracing;

/// testsift version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
