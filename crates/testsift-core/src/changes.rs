//! Change sets reported by version control for the current build.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Files changed since the previous build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Build this change set belongs to.
    pub build_number: u64,

    /// Paths of every changed file, as reported by version control.
    pub changed_files: BTreeSet<String>,
}

impl ChangeSet {
    pub fn new(build_number: u64) -> Self {
        Self {
            build_number,
            changed_files: BTreeSet::new(),
        }
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changed_files.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changed_files.is_empty()
    }

    /// Module ids for the changed source files.
    ///
    /// A source file is one whose name carries the given extension; its
    /// module id is the bare file stem (`src/main/Foo.java` with extension
    /// `java` yields `Foo`). Other files are ignored.
    pub fn changed_modules(&self, source_extension: &str) -> BTreeSet<String> {
        let suffix = format!(".{source_extension}");
        self.changed_files
            .iter()
            .filter_map(|path| {
                let name = Path::new(path).file_name()?.to_str()?;
                name.strip_suffix(suffix.as_str()).map(String::from)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changed_modules_strips_path_and_extension() {
        let changes = ChangeSet::new(7).with_files([
            "src/main/java/com/example/Foo.java",
            "src/test/java/com/example/BarTest.java",
            "docs/README.md",
        ]);

        let modules: Vec<String> = changes.changed_modules("java").into_iter().collect();
        assert_eq!(modules, vec!["BarTest".to_string(), "Foo".to_string()]);
    }

    #[test]
    fn test_changed_modules_ignores_non_source_files() {
        let changes = ChangeSet::new(7).with_files(["build.gradle", "config/ci.yaml"]);
        assert!(changes.changed_modules("java").is_empty());
    }

    #[test]
    fn test_empty_change_set() {
        let changes = ChangeSet::new(7);
        assert!(changes.is_empty());
        assert!(changes.changed_modules("java").is_empty());
    }
}
