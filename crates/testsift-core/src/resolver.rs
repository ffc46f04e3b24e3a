//! Dependency reachability: which modules depend on the changed ones.
//!
//! The resolver boundary is a single operation: changed module ids in,
//! transitive dependent module ids out. Two implementations are provided,
//! an in-process [`ReferenceGraph`] and an out-of-process
//! [`HandoffResolver`] speaking the handoff-file protocol of a stand-alone
//! static-analysis program.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Resolves changed module ids to the transitive set of dependent modules.
///
/// Implementations cover project-local modules only; library and platform
/// entities are outside the graph. Callers intersect the returned set with
/// the test registry to find which dependents are themselves tests, and
/// fail open to the full registry on any error.
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    async fn resolve(&self, changed: &BTreeSet<String>) -> Result<BTreeSet<String>>;
}

/// In-memory directed reference graph over project-local modules.
///
/// An edge `from -> to` records that `from` references `to`; dependents of
/// a changed module are found by walking edges in reverse.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    modules: BTreeSet<String>,
    /// Direct referrers, keyed by the module they reference.
    referrers: BTreeMap<String, BTreeSet<String>>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module with no references yet.
    pub fn add_module(&mut self, id: impl Into<String>) {
        self.modules.insert(id.into());
    }

    /// Record that `from` references `to`. Both become known modules.
    pub fn add_reference(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let from = from.into();
        let to = to.into();
        self.modules.insert(from.clone());
        self.modules.insert(to.clone());
        self.referrers.entry(to).or_default().insert(from);
    }

    /// Transitive dependents of `changed`, including the changed modules
    /// themselves.
    ///
    /// Worklist traversal; a module is marked visited when enqueued, before
    /// its referrers are expanded, so reference cycles terminate.
    pub fn dependents_of(&self, changed: &BTreeSet<String>) -> BTreeSet<String> {
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        for module in changed {
            if visited.insert(module.clone()) {
                queue.push_back(module.clone());
            }
        }

        while let Some(module) = queue.pop_front() {
            if let Some(referrers) = self.referrers.get(&module) {
                for referrer in referrers {
                    if visited.insert(referrer.clone()) {
                        queue.push_back(referrer.clone());
                    }
                }
            }
        }

        visited
    }
}

#[async_trait]
impl DependencyResolver for ReferenceGraph {
    async fn resolve(&self, changed: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        Ok(self.dependents_of(changed))
    }
}

/// Out-of-process resolver speaking the handoff-file protocol.
///
/// Changed module ids are written to the handoff file one per line, the
/// analyzer command is spawned with the handoff path appended as its final
/// argument, and the rewritten file is read back as the dependent set. The
/// call is bounded by a timeout; timeouts and process failures are errors
/// so the caller can fail open.
#[derive(Debug, Clone)]
pub struct HandoffResolver {
    command: Vec<String>,
    handoff_path: PathBuf,
    timeout: Duration,
}

impl HandoffResolver {
    pub fn new(command: Vec<String>, handoff_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command,
            handoff_path: handoff_path.into(),
            timeout,
        }
    }
}

#[async_trait]
impl DependencyResolver for HandoffResolver {
    async fn resolve(&self, changed: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        if self.command.is_empty() {
            return Err(Error::Resolver("analyzer command is empty".to_string()));
        }

        let mut handoff = String::new();
        for module in changed {
            handoff.push_str(module);
            handoff.push('\n');
        }
        std::fs::write(&self.handoff_path, handoff)
            .map_err(|e| Error::Resolver(format!("failed to write handoff file: {e}")))?;

        debug!(
            analyzer = %self.command[0],
            handoff = %self.handoff_path.display(),
            "invoking dependency analyzer"
        );

        let mut command = Command::new(&self.command[0]);
        command
            .args(&self.command[1..])
            .arg(&self.handoff_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                Error::Resolver(format!(
                    "analyzer timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| Error::Resolver(format!("failed to run analyzer: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Resolver(format!(
                "analyzer exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = std::fs::read_to_string(&self.handoff_path)
            .map_err(|e| Error::Resolver(format!("failed to read handoff file back: {e}")))?;

        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }
}
