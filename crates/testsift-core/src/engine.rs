//! Priority assignment and ordering.
//!
//! Three rules, evaluated independently and combined by OR:
//! a recent failure, a missing recent execution, or an elapsed priority
//! window each raise a test to high priority. The staleness rule runs last
//! and always covers the entire registry, so the bounded-staleness
//! guarantee holds project-wide no matter which tests are change-relevant
//! in a given build.

use crate::history::HistoryScan;
use crate::registry::{TestCase, TestRegistry};
use std::collections::BTreeSet;
use tracing::debug;

/// Applies the selection rules and produces the ordered suite.
pub struct PriorityEngine;

impl PriorityEngine {
    /// Compute priorities for the current build and return the tests to
    /// run, high priority first.
    ///
    /// `relevant` narrows the failure and execution rules to the
    /// change-relevant subset; `None` applies them to the whole registry.
    /// A test outside the relevant subset that exceeds the priority window
    /// is still forced high and included in the returned order; bumping its
    /// counter without running it would leave the staleness guarantee
    /// vacuous.
    ///
    /// The final sort is stable and keyed on priority alone. Two tests with
    /// equal priority keep their registry-order relative positions; this is
    /// a contract, not an accident of the sort routine.
    pub fn prioritize(
        registry: &mut TestRegistry,
        relevant: Option<&BTreeSet<String>>,
        scan: &HistoryScan,
        current_build: u64,
        priority_window: u32,
    ) -> Vec<TestCase> {
        let mut considered: BTreeSet<String> = match relevant {
            Some(subset) => subset
                .iter()
                .filter(|id| registry.contains(id))
                .cloned()
                .collect(),
            None => registry.ids().map(String::from).collect(),
        };

        for test in registry.iter_mut() {
            if !considered.contains(&test.id) {
                continue;
            }
            // Rule 1: failed within the failure window.
            if scan.failed.contains(&test.id) {
                debug!(test = %test.id, "prioritized: failed within failure window");
                test.mark_prioritized(current_build);
            }
            // Rule 2: not executed within the execution window.
            if !scan.found.contains(&test.id) {
                debug!(test = %test.id, "prioritized: not executed within execution window");
                test.set_high();
            }
        }

        // Rule 3: staleness refresh. Always the entire registry, never only
        // the relevant subset.
        for test in registry.iter_mut() {
            if current_build.saturating_sub(test.last_prioritized_build)
                > u64::from(priority_window)
            {
                debug!(test = %test.id, "prioritized: outside priority window");
                test.mark_prioritized(current_build);
                considered.insert(test.id.clone());
            }
        }

        // Collect in registry order, then stable-sort on the binary key so
        // ties keep registry order.
        let mut ordered: Vec<TestCase> = registry
            .iter()
            .filter(|test| considered.contains(&test.id))
            .cloned()
            .collect();
        ordered.sort_by_key(|test| test.priority);
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{BuildLog, BuildOutcome, BuildStatus, HistoryScanner, HistoryWindows};
    use crate::registry::Priority;

    fn scan_of(found: &[&str], failed: &[&str]) -> HistoryScan {
        HistoryScan {
            found: found.iter().map(|s| s.to_string()).collect(),
            failed: failed.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn priorities(ordered: &[TestCase]) -> Vec<(&str, Priority)> {
        ordered
            .iter()
            .map(|t| (t.id.as_str(), t.priority))
            .collect()
    }

    #[test]
    fn test_recent_failure_forces_high_and_updates_state() {
        let mut registry = TestRegistry::from_ids(["ATest.class", "BTest.class"]);
        let scan = scan_of(&["ATest.class", "BTest.class"], &["ATest.class"]);

        let ordered = PriorityEngine::prioritize(&mut registry, None, &scan, 10, 100);

        assert_eq!(
            priorities(&ordered),
            vec![
                ("ATest.class", Priority::High),
                ("BTest.class", Priority::Low)
            ]
        );
        assert_eq!(registry.get("ATest.class").unwrap().last_prioritized_build, 10);
        assert_eq!(registry.get("BTest.class").unwrap().last_prioritized_build, 0);
    }

    #[test]
    fn test_unexecuted_test_forces_high_without_state_update() {
        let mut registry = TestRegistry::from_ids(["ATest.class", "BTest.class"]);
        // B never ran within the execution window.
        let scan = scan_of(&["ATest.class"], &[]);

        let ordered = PriorityEngine::prioritize(&mut registry, None, &scan, 10, 100);

        assert_eq!(
            priorities(&ordered),
            vec![
                ("BTest.class", Priority::High),
                ("ATest.class", Priority::Low)
            ]
        );
        // Rule 2 raises priority but leaves the staleness counter alone.
        assert_eq!(registry.get("BTest.class").unwrap().last_prioritized_build, 0);
    }

    #[test]
    fn test_full_scan_scenario_with_history() {
        // Tests {A,B,C}; failure window 1, execution window 2.
        // One build back: {A (failed), B}. Two builds back: {B, C}.
        let log = BuildLog::from_outcomes([
            BuildOutcome::new(8, BuildStatus::Success)
                .with_result("BTest.class", 0)
                .with_result("CTest.class", 0),
            BuildOutcome::new(9, BuildStatus::Failed)
                .with_result("ATest.class", 1)
                .with_result("BTest.class", 0),
        ]);
        let scan = HistoryScanner::scan(
            &log,
            10,
            HistoryWindows {
                failure_window: 1,
                execution_window: 2,
            },
        );

        let mut registry =
            TestRegistry::from_ids(["ATest.class", "BTest.class", "CTest.class"]);
        let ordered = PriorityEngine::prioritize(&mut registry, None, &scan, 10, 100);

        assert_eq!(
            priorities(&ordered),
            vec![
                ("ATest.class", Priority::High),
                ("BTest.class", Priority::Low),
                ("CTest.class", Priority::Low),
            ]
        );
    }

    #[test]
    fn test_relevant_subset_narrows_failure_and_execution_rules() {
        // BazTest did not run recently, but it is outside the relevant
        // subset, so rule 2 must not fire for it.
        let mut registry = TestRegistry::from_ids(["BarTest.class", "BazTest.class"]);
        registry.get_mut("BazTest.class").unwrap().last_prioritized_build = 9;
        registry.get_mut("BarTest.class").unwrap().last_prioritized_build = 9;
        let relevant: BTreeSet<String> = ["BarTest.class".to_string()].into();
        let scan = scan_of(&["BarTest.class"], &[]);

        let ordered =
            PriorityEngine::prioritize(&mut registry, Some(&relevant), &scan, 10, 100);

        assert_eq!(priorities(&ordered), vec![("BarTest.class", Priority::Low)]);
    }

    #[test]
    fn test_stale_test_outside_relevant_subset_is_still_selected() {
        let mut registry = TestRegistry::from_ids(["BarTest.class", "BazTest.class"]);
        registry.get_mut("BarTest.class").unwrap().last_prioritized_build = 49;
        // BazTest has never been prioritized and the window has elapsed.
        let relevant: BTreeSet<String> = ["BarTest.class".to_string()].into();
        let scan = scan_of(&["BarTest.class", "BazTest.class"], &[]);

        let ordered =
            PriorityEngine::prioritize(&mut registry, Some(&relevant), &scan, 50, 40);

        assert_eq!(
            priorities(&ordered),
            vec![
                ("BazTest.class", Priority::High),
                ("BarTest.class", Priority::Low),
            ]
        );
        assert_eq!(registry.get("BazTest.class").unwrap().last_prioritized_build, 50);
    }

    #[test]
    fn test_staleness_forces_high_even_when_found_and_passing() {
        let mut registry = TestRegistry::from_ids(["ZTest.class"]);
        let scan = scan_of(&["ZTest.class"], &[]);

        let ordered = PriorityEngine::prioritize(&mut registry, None, &scan, 50, 40);

        assert_eq!(priorities(&ordered), vec![("ZTest.class", Priority::High)]);
        assert_eq!(registry.get("ZTest.class").unwrap().last_prioritized_build, 50);
    }

    #[test]
    fn test_window_boundary_is_strictly_greater_than() {
        let mut registry = TestRegistry::from_ids(["ATest.class"]);
        registry.get_mut("ATest.class").unwrap().last_prioritized_build = 10;
        let scan = scan_of(&["ATest.class"], &[]);

        // Exactly at the window: 50 - 10 == 40, not stale yet.
        let ordered = PriorityEngine::prioritize(&mut registry, None, &scan, 50, 40);
        assert_eq!(priorities(&ordered), vec![("ATest.class", Priority::Low)]);

        // One past the window: stale.
        let ordered = PriorityEngine::prioritize(&mut registry, None, &scan, 51, 40);
        assert_eq!(priorities(&ordered), vec![("ATest.class", Priority::High)]);
    }

    #[test]
    fn test_sort_is_stable_within_priority_classes() {
        let mut registry = TestRegistry::from_ids([
            "ATest.class",
            "BTest.class",
            "CTest.class",
            "DTest.class",
        ]);
        // B and D fail; A and C are found and passing.
        let scan = scan_of(
            &["ATest.class", "BTest.class", "CTest.class", "DTest.class"],
            &["BTest.class", "DTest.class"],
        );

        let ordered = PriorityEngine::prioritize(&mut registry, None, &scan, 10, 100);

        // High before low, registry order preserved inside each class.
        assert_eq!(
            priorities(&ordered),
            vec![
                ("BTest.class", Priority::High),
                ("DTest.class", Priority::High),
                ("ATest.class", Priority::Low),
                ("CTest.class", Priority::Low),
            ]
        );
    }

    #[test]
    fn test_staleness_bound_holds_after_every_run() {
        // Run a sequence of builds with no failures and verify that after
        // each run every test satisfies last_prioritized_build >= B - Wp.
        let mut state = crate::state::PriorityState::new();
        let window = 3;
        for build in 1..=10u64 {
            let mut registry = TestRegistry::from_ids(["ATest.class", "BTest.class"]);
            registry.apply_state(&state);
            let scan = scan_of(&["ATest.class", "BTest.class"], &[]);
            PriorityEngine::prioritize(&mut registry, None, &scan, build, window);
            for test in registry.iter() {
                assert!(
                    test.last_prioritized_build >= build.saturating_sub(u64::from(window)),
                    "staleness bound violated at build {build} for {}",
                    test.id
                );
            }
            state = registry
                .iter()
                .map(|t| (t.id.clone(), t.last_prioritized_build))
                .collect();
        }
    }

    #[test]
    fn test_priority_is_recomputed_from_scratch_each_run() {
        let mut registry = TestRegistry::from_ids(["ATest.class"]);
        let failing = scan_of(&["ATest.class"], &["ATest.class"]);
        let ordered = PriorityEngine::prioritize(&mut registry, None, &failing, 10, 100);
        assert_eq!(ordered[0].priority, Priority::High);

        // Next build: the failure is gone and the test ran recently, so a
        // fresh registry seeded from the saved state comes out low.
        let mut registry = TestRegistry::from_ids(["ATest.class"]);
        registry.get_mut("ATest.class").unwrap().last_prioritized_build = 10;
        let passing = scan_of(&["ATest.class"], &[]);
        let ordered = PriorityEngine::prioritize(&mut registry, None, &passing, 11, 100);
        assert_eq!(ordered[0].priority, Priority::Low);
    }
}
