//! Test registry: the canonical set of known tests and their selection
//! metadata.

use crate::state::PriorityState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Selection priority computed for a single test.
///
/// `High` orders before `Low`, so a stable sort keyed on priority puts
/// high-priority tests at the front of the suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Low,
}

/// A known test and its mutable selection metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique identifier, e.g. a fully-qualified class name.
    pub id: String,

    /// Priority for the current build. Recomputed in full on every
    /// invocation; never carried over between builds.
    pub priority: Priority,

    /// Build number at which this test was last force-prioritized.
    pub last_prioritized_build: u64,
}

impl TestCase {
    /// A test that has never been prioritized.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority: Priority::Low,
            last_prioritized_build: 0,
        }
    }

    /// Raise this test to high priority without touching its state.
    pub fn set_high(&mut self) {
        self.priority = Priority::High;
    }

    /// Raise this test to high priority and record `build` as the build it
    /// was last prioritized at.
    ///
    /// `last_prioritized_build` is monotonically non-decreasing across the
    /// lifetime of the state file; an older build number is ignored.
    pub fn mark_prioritized(&mut self, build: u64) {
        self.priority = Priority::High;
        self.last_prioritized_build = self.last_prioritized_build.max(build);
    }
}

/// Canonical set of known tests, iterated in id order.
///
/// The registry is rebuilt from the suite manifest on every invocation; a
/// test absent from a new manifest simply does not exist in the new
/// registry. Iteration order is the tie-break for the final stable sort.
#[derive(Debug, Clone, Default)]
pub struct TestRegistry {
    tests: BTreeMap<String, TestCase>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry of never-prioritized tests from manifest ids.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for id in ids {
            registry.insert(TestCase::new(id));
        }
        registry
    }

    /// Insert or replace a test.
    pub fn insert(&mut self, test: TestCase) {
        self.tests.insert(test.id.clone(), test);
    }

    pub fn get(&self, id: &str) -> Option<&TestCase> {
        self.tests.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut TestCase> {
        self.tests.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tests.contains_key(id)
    }

    /// Test ids in registry order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tests.keys().map(String::as_str)
    }

    /// Tests in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &TestCase> {
        self.tests.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TestCase> {
        self.tests.values_mut()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Seed `last_prioritized_build` from persisted state.
    ///
    /// Ids missing from the state keep the default of 0, i.e. they are due
    /// for a staleness refresh as soon as the priority window elapses.
    pub fn apply_state(&mut self, state: &PriorityState) {
        for test in self.tests.values_mut() {
            if let Some(build) = state.get(&test.id) {
                test.last_prioritized_build = *build;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_orders_high_first() {
        assert!(Priority::High < Priority::Low);
    }

    #[test]
    fn test_new_test_is_low_and_unprioritized() {
        let test = TestCase::new("FooTest.class");
        assert_eq!(test.priority, Priority::Low);
        assert_eq!(test.last_prioritized_build, 0);
    }

    #[test]
    fn test_mark_prioritized_is_monotonic() {
        let mut test = TestCase::new("FooTest.class");
        test.mark_prioritized(7);
        assert_eq!(test.last_prioritized_build, 7);

        // An older build number must not move the counter backwards.
        test.mark_prioritized(3);
        assert_eq!(test.last_prioritized_build, 7);
        assert_eq!(test.priority, Priority::High);
    }

    #[test]
    fn test_registry_iterates_in_id_order() {
        let registry = TestRegistry::from_ids(["ZTest.class", "ATest.class", "MTest.class"]);
        let ids: Vec<&str> = registry.ids().collect();
        assert_eq!(ids, vec!["ATest.class", "MTest.class", "ZTest.class"]);
    }

    #[test]
    fn test_apply_state_defaults_unseen_ids_to_zero() {
        let mut registry = TestRegistry::from_ids(["ATest.class", "BTest.class"]);
        let mut state = PriorityState::new();
        state.insert("ATest.class".to_string(), 12);

        registry.apply_state(&state);

        assert_eq!(registry.get("ATest.class").unwrap().last_prioritized_build, 12);
        assert_eq!(registry.get("BTest.class").unwrap().last_prioritized_build, 0);
    }
}
