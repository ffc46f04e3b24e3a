//! The selection pipeline: one configurable pass from manifest to ordering.
//!
//! Dependency analysis and the priority-window refresh are independent
//! options of a single pipeline, not forked code paths. All tunables
//! arrive in an explicit [`SelectionConfig`]; there is no process-wide
//! state.

use crate::changes::ChangeSet;
use crate::engine::PriorityEngine;
use crate::error::Result;
use crate::history::{BuildHistory, HistoryScanner, HistoryWindows};
use crate::manifest::{SectionMarkers, SuiteManifest};
use crate::registry::{Priority, TestRegistry};
use crate::resolver::DependencyResolver;
use crate::state::PriorityStateStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Tunable selection parameters, passed explicitly into each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// How many of the most recent builds to check for failures.
    pub failure_window: u32,

    /// How many of the most recent builds to check for executions.
    pub execution_window: u32,

    /// Maximum number of builds a test may go without being
    /// force-prioritized.
    pub priority_window: u32,

    /// Suffix appended to resolved module ids when matching registry ids,
    /// e.g. `.class` for JUnit suite entries.
    pub module_suffix: String,

    /// File extension (without the dot) identifying changed source files.
    pub source_extension: String,

    /// Markers bounding the manifest's test-list section.
    #[serde(default)]
    pub markers: SectionMarkers,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            failure_window: 1,
            execution_window: 3,
            priority_window: 10,
            module_suffix: ".class".to_string(),
            source_extension: "java".to_string(),
            markers: SectionMarkers::default(),
        }
    }
}

impl SelectionConfig {
    pub fn windows(&self) -> HistoryWindows {
        HistoryWindows {
            failure_window: self.failure_window,
            execution_window: self.execution_window,
        }
    }
}

/// Result of one selection run.
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    /// Ordered test ids written back to the manifest, high priority first.
    pub selected: Vec<String>,

    /// Tests selected at high priority.
    pub high_count: usize,

    /// Tests selected at low priority.
    pub low_count: usize,

    /// Size of the full registry.
    pub registry_size: usize,

    /// Whether dependency filtering fell back to the full registry.
    pub fail_open: bool,

    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
}

/// Orchestrates one selection run over explicit collaborators.
pub struct SelectionPipeline;

impl SelectionPipeline {
    /// Run selection for `current_build`, rewriting the manifest and the
    /// priority-state file in place.
    ///
    /// `resolver` enables dependency filtering; `changes` carries the
    /// current build's changed files. Resolver failure, an empty change
    /// set, or an empty intersection with the registry all fall back to the
    /// full registry: more tests, never zero.
    pub async fn run(
        history: &dyn BuildHistory,
        resolver: Option<&dyn DependencyResolver>,
        changes: Option<&ChangeSet>,
        config: &SelectionConfig,
        manifest_path: &Path,
        state_path: &Path,
        current_build: u64,
    ) -> Result<SelectionOutcome> {
        let start = Instant::now();
        info!(
            build = current_build,
            failure_window = config.failure_window,
            execution_window = config.execution_window,
            priority_window = config.priority_window,
            "starting test selection"
        );

        let manifest = SuiteManifest::load(manifest_path, &config.markers)?;
        let mut registry = TestRegistry::from_ids(manifest.tests().iter().cloned());

        if registry.is_empty() {
            warn!("manifest lists no tests; nothing to prioritize");
            return Ok(SelectionOutcome {
                selected: Vec::new(),
                high_count: 0,
                low_count: 0,
                registry_size: 0,
                fail_open: false,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let store = PriorityStateStore::new(state_path);
        let state = store.load();
        registry.apply_state(&state);

        let (relevant, fail_open) =
            Self::relevant_tests(resolver, changes, config, &registry).await;

        let scan = HistoryScanner::scan(history, current_build, config.windows());
        let ordered = PriorityEngine::prioritize(
            &mut registry,
            relevant.as_ref(),
            &scan,
            current_build,
            config.priority_window,
        );

        let selected: Vec<String> = ordered.iter().map(|test| test.id.clone()).collect();
        let high_count = ordered
            .iter()
            .filter(|test| test.priority == Priority::High)
            .count();

        manifest.store(manifest_path, &selected)?;
        store.save(&registry)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            build = current_build,
            selected = selected.len(),
            high = high_count,
            duration_ms,
            "test selection finished"
        );

        Ok(SelectionOutcome {
            high_count,
            low_count: selected.len() - high_count,
            registry_size: registry.len(),
            fail_open,
            duration_ms,
            selected,
        })
    }

    /// Narrow the registry to change-relevant tests.
    ///
    /// Returns `None` whenever rules 1 and 2 should apply to the whole
    /// registry, with a flag marking the fallbacks that happened with
    /// dependency analysis enabled.
    async fn relevant_tests(
        resolver: Option<&dyn DependencyResolver>,
        changes: Option<&ChangeSet>,
        config: &SelectionConfig,
        registry: &TestRegistry,
    ) -> (Option<BTreeSet<String>>, bool) {
        let resolver = match resolver {
            Some(resolver) => resolver,
            None => return (None, false),
        };

        let changes = match changes {
            Some(changes) if !changes.is_empty() => changes,
            _ => {
                info!("no recorded changes; prioritizing over the full registry");
                return (None, true);
            }
        };

        let changed_modules = changes.changed_modules(&config.source_extension);
        if changed_modules.is_empty() {
            info!("no changed source files; prioritizing over the full registry");
            return (None, true);
        }

        let dependents = match resolver.resolve(&changed_modules).await {
            Ok(dependents) => dependents,
            Err(e) => {
                warn!(error = %e, "dependency resolution failed; falling back to the full registry");
                return (None, true);
            }
        };

        let relevant: BTreeSet<String> = dependents
            .iter()
            .filter_map(|module| {
                if registry.contains(module) {
                    return Some(module.clone());
                }
                let with_suffix = format!("{}{}", module, config.module_suffix);
                registry.contains(&with_suffix).then_some(with_suffix)
            })
            .collect();

        if relevant.is_empty() {
            info!("no resolved dependents are tests; prioritizing over the full registry");
            return (None, true);
        }

        info!(
            changed = changed_modules.len(),
            relevant = relevant.len(),
            "dependency analysis narrowed the candidate set"
        );
        (Some(relevant), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ReferenceGraph;

    #[test]
    fn test_config_windows() {
        let config = SelectionConfig {
            failure_window: 2,
            execution_window: 5,
            ..SelectionConfig::default()
        };
        let windows = config.windows();
        assert_eq!(windows.failure_window, 2);
        assert_eq!(windows.execution_window, 5);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = SelectionConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let parsed: SelectionConfig = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed.priority_window, config.priority_window);
        assert_eq!(parsed.markers, config.markers);
    }

    #[tokio::test]
    async fn test_relevant_tests_disabled_without_resolver() {
        let registry = TestRegistry::from_ids(["FooTest.class"]);
        let (relevant, fail_open) =
            SelectionPipeline::relevant_tests(None, None, &SelectionConfig::default(), &registry)
                .await;
        assert!(relevant.is_none());
        assert!(!fail_open);
    }

    #[tokio::test]
    async fn test_relevant_tests_matches_with_module_suffix() {
        let mut graph = ReferenceGraph::new();
        graph.add_reference("FooTest", "Foo");
        let registry = TestRegistry::from_ids(["FooTest.class", "BarTest.class"]);
        let changes = ChangeSet::new(3).with_files(["Foo.java"]);

        let (relevant, fail_open) = SelectionPipeline::relevant_tests(
            Some(&graph),
            Some(&changes),
            &SelectionConfig::default(),
            &registry,
        )
        .await;

        let relevant = relevant.expect("narrowed set");
        assert!(relevant.contains("FooTest.class"));
        assert!(!relevant.contains("BarTest.class"));
        assert!(!fail_open);
    }
}
