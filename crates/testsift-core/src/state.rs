//! Cross-build priority state, persisted between invocations.
//!
//! The CI host gives the selector no durable test metadata of its own, so
//! the build number at which each test was last force-prioritized lives in
//! a line-oriented text file, rewritten in full on every run.

use crate::error::Result;
use crate::registry::TestRegistry;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Persisted mapping of test id to the build at which it was last
/// force-prioritized.
pub type PriorityState = BTreeMap<String, u64>;

/// Line-oriented store for [`PriorityState`]: one `testId:buildNumber`
/// record per line.
#[derive(Debug, Clone)]
pub struct PriorityStateStore {
    path: PathBuf,
}

impl PriorityStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state.
    ///
    /// A missing or unreadable file is an empty state, not an error: every
    /// test is then treated as never prioritized. Malformed records are
    /// skipped individually.
    pub fn load(&self) -> PriorityState {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(
                    path = %self.path.display(),
                    "no priority-state file; treating all tests as never prioritized"
                );
                return PriorityState::new();
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "priority-state file unreadable; treating all tests as never prioritized"
                );
                return PriorityState::new();
            }
        };

        let mut state = PriorityState::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_record(line) {
                Some((id, build)) => {
                    state.insert(id.to_string(), build);
                }
                None => warn!(line = index + 1, "skipping malformed priority-state record"),
            }
        }
        state
    }

    /// Rewrite the state file in full, one record per known test, in
    /// registry order.
    pub fn save(&self, registry: &TestRegistry) -> Result<()> {
        let mut out = String::new();
        for test in registry.iter() {
            let _ = writeln!(out, "{}:{}", test.id, test.last_prioritized_build);
        }
        std::fs::write(&self.path, out)?;
        Ok(())
    }
}

/// Parse one `testId:buildNumber` record.
///
/// The split is on the last colon so ids containing colons survive.
fn parse_record(line: &str) -> Option<(&str, u64)> {
    let (id, build) = line.rsplit_once(':')?;
    if id.is_empty() {
        return None;
    }
    Some((id, build.trim().parse().ok()?))
}
