//! Persisted selection-report artifact.
//!
//! One JSON document per selection run, written for CI log retention and
//! after-the-fact debugging of why a suite came out in a given order.

use crate::pipeline::{SelectionConfig, SelectionOutcome};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;

/// Schema version written into every report.
pub const REPORT_SCHEMA_VERSION: &str = "1";

/// Summary section of the selection report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectionSummaryArtifact {
    pub registry_size: usize,
    pub selected: usize,
    pub high_priority: usize,
    pub low_priority: usize,
    pub fail_open: bool,
    pub duration_ms: u64,
}

/// Canonical selection report artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectionReportArtifact {
    pub schema_version: String,
    pub selection_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub build_number: u64,
    pub failure_window: u32,
    pub execution_window: u32,
    pub priority_window: u32,
    /// SHA-256 over the windows and the ordered selection (deterministic).
    pub inputs_digest: String,
    pub summary: SelectionSummaryArtifact,
    pub selected_tests: Vec<String>,
}

impl SelectionReportArtifact {
    /// Build a report from a finished selection run.
    pub fn from_outcome(
        build_number: u64,
        config: &SelectionConfig,
        outcome: &SelectionOutcome,
    ) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            selection_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            build_number,
            failure_window: config.failure_window,
            execution_window: config.execution_window,
            priority_window: config.priority_window,
            inputs_digest: compute_inputs_digest(config, &outcome.selected),
            summary: SelectionSummaryArtifact {
                registry_size: outcome.registry_size,
                selected: outcome.selected.len(),
                high_priority: outcome.high_count,
                low_priority: outcome.low_count,
                fail_open: outcome.fail_open,
                duration_ms: outcome.duration_ms,
            },
            selected_tests: outcome.selected.clone(),
        }
    }
}

/// Deterministic digest of the selection parameters and ordering.
fn compute_inputs_digest(config: &SelectionConfig, selected: &[String]) -> String {
    let mut hasher = Sha256::new();
    for window in [
        config.failure_window,
        config.execution_window,
        config.priority_window,
    ] {
        hasher.update(window.to_be_bytes());
    }
    for id in selected {
        hasher.update(id.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}

/// Write the selection report in pretty JSON format.
pub fn write_selection_report_json(path: &Path, artifact: &SelectionReportArtifact) -> Result<()> {
    let content =
        serde_json::to_string_pretty(artifact).context("serialize selection report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
