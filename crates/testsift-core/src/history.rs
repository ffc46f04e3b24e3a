//! Build-history boundary and the backward window scan.
//!
//! The scan walks prior build outcomes to answer two questions: which tests
//! ran recently, and which tests failed recently. It produces membership
//! sets only; ordering is the priority engine's job.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Final status of a recorded build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Success,
    Unstable,
    Failed,
    Aborted,
    NotBuilt,
}

impl BuildStatus {
    /// Whether a build with this status produced usable test results.
    ///
    /// Aborted and never-built runs model infrastructure failures; during a
    /// scan they consume a window index but contribute no signals.
    pub fn has_test_results(&self) -> bool {
        matches!(
            self,
            BuildStatus::Success | BuildStatus::Unstable | BuildStatus::Failed
        )
    }
}

/// Finalized outcome of one prior build. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    /// Build number assigned by the CI host.
    pub number: u64,

    /// Final status of the build.
    pub status: BuildStatus,

    /// Failure count per test id reported by this build.
    #[serde(default)]
    pub test_results: BTreeMap<String, u32>,
}

impl BuildOutcome {
    pub fn new(number: u64, status: BuildStatus) -> Self {
        Self {
            number,
            status,
            test_results: BTreeMap::new(),
        }
    }

    /// Record a result for one test.
    pub fn with_result(mut self, test_id: impl Into<String>, fail_count: u32) -> Self {
        self.test_results.insert(test_id.into(), fail_count);
        self
    }
}

/// Read-only view over finalized build outcomes.
///
/// Records are immutable once a build is finalized, so implementations need
/// no locking for readers.
pub trait BuildHistory {
    /// The most recent build strictly before `of`, if any.
    fn previous_build(&self, of: u64) -> Option<&BuildOutcome>;
}

/// In-memory build log, loadable from a JSON artifact.
///
/// Doubles as the test fake; the CLI loads one from the build-log artifact
/// exported by the CI host.
#[derive(Debug, Clone, Default)]
pub struct BuildLog {
    builds: BTreeMap<u64, BuildOutcome>,
}

impl BuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finalized build outcome.
    pub fn record(&mut self, outcome: BuildOutcome) {
        self.builds.insert(outcome.number, outcome);
    }

    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = BuildOutcome>,
    {
        let mut log = Self::new();
        for outcome in outcomes {
            log.record(outcome);
        }
        log
    }

    /// Parse a JSON array of build outcomes.
    pub fn from_json(text: &str) -> Result<Self> {
        let outcomes: Vec<BuildOutcome> = serde_json::from_str(text)?;
        Ok(Self::from_outcomes(outcomes))
    }

    /// Load a build-log artifact from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }
}

impl BuildHistory for BuildLog {
    fn previous_build(&self, of: u64) -> Option<&BuildOutcome> {
        self.builds.range(..of).next_back().map(|(_, build)| build)
    }
}

/// Window sizes for the backward scan, in builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryWindows {
    /// How many of the most recent builds to check for failures.
    pub failure_window: u32,

    /// How many of the most recent builds to check for executions.
    pub execution_window: u32,
}

/// Membership sets produced by the backward scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryScan {
    /// Tests that executed within the execution window.
    pub found: BTreeSet<String>,

    /// Tests with at least one failure within the failure window.
    pub failed: BTreeSet<String>,
}

/// Backward walk over prior build outcomes.
pub struct HistoryScanner;

impl HistoryScanner {
    /// Walk backward from `start_build`, honoring both windows in one pass.
    ///
    /// Each predecessor consumes one window index whether or not it carried
    /// usable results; the walk stops at the first missing predecessor. The
    /// loop bound is the larger of the two windows so both are honored
    /// independently.
    pub fn scan(
        history: &dyn BuildHistory,
        start_build: u64,
        windows: HistoryWindows,
    ) -> HistoryScan {
        let mut scan = HistoryScan::default();
        let bound = windows.failure_window.max(windows.execution_window);
        let mut cursor = start_build;

        for i in 0..bound {
            let build = match history.previous_build(cursor) {
                Some(build) => build,
                None => break,
            };
            cursor = build.number;

            if !build.status.has_test_results() {
                continue;
            }

            let within_execution = i < windows.execution_window;
            let within_failure = i < windows.failure_window;

            for (test_id, fail_count) in &build.test_results {
                if within_execution {
                    scan.found.insert(test_id.clone());
                }
                if within_failure && *fail_count > 0 {
                    scan.failed.insert(test_id.clone());
                }
            }
        }

        scan
    }
}
