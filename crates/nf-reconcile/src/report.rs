//! The change report of a reconciliation run.
//!
//! Lines are kept sorted and deduplicated, so a project touched by both
//! passes is reported once.
//!
//! # Examples
//!
//! ```
//! use camino::Utf8Path;
//! use nf_reconcile::ChangeReport;
//!
//! let mut report = ChangeReport::new();
//! report.modified_project("Web");
//! report.modified_file(Utf8Path::new("Web/packages.config"));
//! report.modified_project("Web");
//!
//! assert_eq!(report.modified_items(), 2);
//! assert_eq!(
//!     report.lines().collect::<Vec<_>>(),
//!     ["Modified project: Web", "Modified: Web/packages.config", "Modified 2 items"]
//! );
//! ```

use std::collections::BTreeSet;
use std::fmt;

use camino::Utf8Path;

/// Sorted, deduplicated change descriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    lines: BTreeSet<String>,
    modified: BTreeSet<String>,
    summary: String,
}

impl ChangeReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        let mut report = Self::default();
        report.refresh_summary();
        report
    }

    /// Records a modified project by display name.
    pub fn modified_project(&mut self, name: &str) {
        self.record_modified(format!("Modified project: {name}"));
    }

    /// Records a modified file other than a project.
    pub fn modified_file(&mut self, path: &Utf8Path) {
        self.record_modified(format!("Modified: {path}"));
    }

    /// Records a project that was skipped.
    pub fn skipped_project(&mut self, path: &Utf8Path, reason: impl fmt::Display) {
        self.lines.insert(format!("Skipped project: {path} ({reason})"));
    }

    /// Records a non-fatal error.
    pub fn error(&mut self, message: impl fmt::Display) {
        self.lines.insert(format!("Error: {message}"));
    }

    /// Returns the number of distinct modified items.
    #[inline]
    #[must_use]
    pub fn modified_items(&self) -> usize {
        self.modified.len()
    }

    /// Returns `true` if the report carries any error or skipped project.
    #[must_use]
    pub fn has_problems(&self) -> bool {
        self.lines
            .iter()
            .any(|line| line.starts_with("Error: ") || line.starts_with("Skipped project: "))
    }

    /// Iterates over the report lines followed by the summary line.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.summary.as_str()))
    }

    fn record_modified(&mut self, line: String) {
        if self.modified.insert(line.clone()) {
            self.lines.insert(line);
            self.refresh_summary();
        }
    }

    fn refresh_summary(&mut self) {
        self.summary = format!("Modified {} items", self.modified.len());
    }
}

impl fmt::Display for ChangeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report() {
        let report = ChangeReport::new();
        assert_eq!(report.modified_items(), 0);
        assert!(!report.has_problems());
        assert_eq!(report.to_string(), "Modified 0 items\n");
    }

    #[test]
    fn test_lines_are_sorted_and_deduplicated() {
        let mut report = ChangeReport::new();
        report.modified_project("Zeta");
        report.skipped_project(Utf8Path::new("Broken/Broken.csproj"), "unexpected end of file");
        report.modified_project("Alpha");
        report.modified_project("Zeta");
        report.error("assembly not found");

        assert_eq!(report.modified_items(), 2);
        assert!(report.has_problems());
        insta::assert_snapshot!(report.to_string(), @r"
        Error: assembly not found
        Modified project: Alpha
        Modified project: Zeta
        Skipped project: Broken/Broken.csproj (unexpected end of file)
        Modified 2 items
        ");
    }
}
