//! Suite-manifest adapter.
//!
//! A suite manifest is an arbitrary text document with one bracketed
//! section listing test identifiers, one per line. Only the identifiers
//! inside the section are rewritten; every surrounding line is echoed back
//! byte-identical.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Markers bounding the test-list section of a suite manifest.
///
/// Comparisons are against trimmed lines, so indentation around the
/// markers does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMarkers {
    /// Recognized section openers.
    pub starts: Vec<String>,

    /// Section terminator.
    pub end: String,
}

impl Default for SectionMarkers {
    /// Markers of a JUnit 4 suite definition.
    fn default() -> Self {
        Self {
            starts: vec![
                "@SuiteClasses({".to_string(),
                "@Suite.SuiteClasses({".to_string(),
            ],
            end: "})".to_string(),
        }
    }
}

impl SectionMarkers {
    fn opens(&self, line: &str) -> bool {
        let trimmed = line.trim();
        self.starts.iter().any(|start| start == trimmed)
    }

    fn closes(&self, line: &str) -> bool {
        line.trim() == self.end
    }
}

/// A parsed suite manifest, split around its test-list section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteManifest {
    /// Lines up to and including the section opener.
    leading: Vec<String>,

    /// Test identifiers listed in the section, in file order.
    tests: Vec<String>,

    /// Lines from the section terminator to the end of the file.
    trailing: Vec<String>,
}

impl SuiteManifest {
    /// Parse a manifest document.
    ///
    /// A document without a recognized section opener, or whose section is
    /// never terminated, cannot produce a valid ordering and is fatal.
    pub fn parse(text: &str, markers: &SectionMarkers) -> Result<Self> {
        let mut leading = Vec::new();
        let mut tests = Vec::new();
        let mut trailing = Vec::new();

        let mut lines = text.lines();

        let mut opened = false;
        for line in &mut lines {
            leading.push(line.to_string());
            if markers.opens(line) {
                opened = true;
                break;
            }
        }
        if !opened {
            return Err(Error::ManifestSection(format!(
                "no section start marker found (expected one of: {})",
                markers.starts.join(", ")
            )));
        }

        let mut closed = false;
        for line in &mut lines {
            if markers.closes(line) {
                closed = true;
                trailing.push(line.to_string());
                break;
            }
            let id = line.trim().trim_end_matches(',');
            if !id.is_empty() {
                tests.push(id.to_string());
            }
        }
        if !closed {
            return Err(Error::ManifestSection(format!(
                "section end marker not found (expected: {})",
                markers.end
            )));
        }

        trailing.extend(lines.map(String::from));

        Ok(Self {
            leading,
            tests,
            trailing,
        })
    }

    /// Identifiers listed in the section, in file order.
    pub fn tests(&self) -> &[String] {
        &self.tests
    }

    /// Render the manifest with `ordered` in place of the original listing.
    ///
    /// Identifiers are comma-terminated except the last; surrounding lines
    /// come out byte-identical.
    pub fn render(&self, ordered: &[String]) -> String {
        let mut out = String::new();
        for line in &self.leading {
            out.push_str(line);
            out.push('\n');
        }
        for (index, id) in ordered.iter().enumerate() {
            out.push_str(id);
            if index + 1 < ordered.len() {
                out.push(',');
            }
            out.push('\n');
        }
        for line in &self.trailing {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path, markers: &SectionMarkers) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, markers)
    }

    /// Rewrite a manifest file with the given ordering.
    pub fn store(&self, path: &Path, ordered: &[String]) -> Result<()> {
        std::fs::write(path, self.render(ordered))?;
        Ok(())
    }
}
