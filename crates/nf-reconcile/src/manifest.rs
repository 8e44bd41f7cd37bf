//! `packages.config` synchronization.
//!
//! Each `<package id version [targetFramework] />` entry is brought in line
//! with the registry: the `targetFramework` attribute is dropped and the
//! version is raised when the registry knows a strictly newer one. Duplicate
//! entries for the same id are then removed, keeping the first.
//!
//! Deduplication alone does not mark the manifest modified: a manifest whose
//! only defect is a duplicate entry is reported but left on disk as is.

use camino::{Utf8Path, Utf8PathBuf};
use nf_core::ReconcileConfig;
use nf_xml::XmlDocument;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::debug;

use crate::error::ReconcileError;
use crate::registry::Registry;

/// One `<package />` entry of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    /// Package id.
    pub id: String,
    /// Declared version.
    pub version: String,
}

/// Result of synchronizing one manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestOutcome {
    /// The manifest file exists.
    pub present: bool,
    /// An entry was changed and the file was written.
    pub modified: bool,
    /// Number of duplicate entries dropped from the in-memory document.
    pub duplicates_removed: usize,
}

/// Rewrites package manifests against the registry.
#[derive(Debug)]
pub struct ManifestSynchronizer<'a> {
    registry: &'a Registry,
    config: &'a ReconcileConfig,
}

impl<'a> ManifestSynchronizer<'a> {
    /// Creates a synchronizer reading versions from `registry`.
    #[must_use]
    pub const fn new(registry: &'a Registry, config: &'a ReconcileConfig) -> Self {
        Self { registry, config }
    }

    /// Returns the manifest path of a project directory.
    #[must_use]
    pub fn manifest_path(&self, project_dir: &Utf8Path) -> Utf8PathBuf {
        project_dir.join(&self.config.manifest_file)
    }

    /// Synchronizes the manifest of a project directory, if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Document`] if the manifest cannot be parsed
    /// or written.
    pub fn synchronize(&self, project_dir: &Utf8Path) -> Result<ManifestOutcome, ReconcileError> {
        let path = self.manifest_path(project_dir);
        if !path.is_file() {
            return Ok(ManifestOutcome::default());
        }

        let mut document =
            XmlDocument::load(&path).map_err(|err| ReconcileError::document(&path, err))?;
        let outcome = self.synchronize_document(&mut document);
        if outcome.modified {
            document
                .save(&path)
                .map_err(|err| ReconcileError::document(&path, err))?;
            debug!(manifest = %path, "Saved manifest");
        } else if outcome.duplicates_removed > 0 {
            debug!(
                manifest = %path,
                duplicates = outcome.duplicates_removed,
                "Manifest has duplicate entries but nothing else to change; left as is"
            );
        }
        Ok(outcome)
    }

    /// Applies the per-entry rewrite and deduplication to a parsed manifest.
    pub fn synchronize_document(&self, document: &mut XmlDocument) -> ManifestOutcome {
        let mut outcome = ManifestOutcome {
            present: true,
            ..ManifestOutcome::default()
        };

        for entry in document.root_mut().elements_named_mut("package") {
            if self.config.strip_target_framework && entry.remove_attr("targetFramework") {
                outcome.modified = true;
            }

            let Some(id) = entry.attr("id").map(|id| id.into_owned()) else {
                continue;
            };
            let current = entry.attr("version").unwrap_or_default().into_owned();
            if let Some(newest) = self.registry.package_version(&id) {
                if self.registry.is_newer(newest, &current) {
                    debug!(package = %id, from = %current, to = newest, "Bumped manifest entry");
                    entry.set_attr("version", newest);
                    outcome.modified = true;
                }
            }
        }

        let mut seen = FxHashSet::default();
        outcome.duplicates_removed = document.root_mut().retain_elements(|entry| {
            if !entry.is("package") {
                return true;
            }
            entry
                .attr("id")
                .is_none_or(|id| seen.insert(id.to_ascii_lowercase()))
        });
        outcome
    }

    /// Reads the entries of a manifest in document order.
    ///
    /// A missing manifest has no entries.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Document`] if the manifest cannot be parsed.
    pub fn read_entries(&self, project_dir: &Utf8Path) -> Result<Vec<ManifestEntry>, ReconcileError> {
        let path = self.manifest_path(project_dir);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let document =
            XmlDocument::load(&path).map_err(|err| ReconcileError::document(&path, err))?;
        Ok(document
            .root()
            .elements_named("package")
            .filter_map(|entry| {
                Some(ManifestEntry {
                    id: entry.attr("id")?.into_owned(),
                    version: entry.attr("version").unwrap_or_default().into_owned(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use nf_core::{ComparisonMode, ReferenceMetadata};

    use super::*;
    use crate::extractor::ReferenceExtractor;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<packages>
  <package id="A" version="1.0" targetFramework="net45" />
  <package id="B" version="3.0" />
  <package id="a" version="2.0" />
</packages>
"#;

    fn registry_with(entries: &[(&str, &str)]) -> Registry {
        let extractor = ReferenceExtractor::new(&ReconcileConfig::default()).unwrap();
        let mut registry = Registry::with_mode(ComparisonMode::Ordinal);
        for (package, version) in entries {
            let mut metadata = ReferenceMetadata::new();
            metadata.set("HintPath", format!(r"..\packages\{package}.{version}\lib\{package}.dll"));
            let reference = extractor.extract(package, &metadata).unwrap();
            registry.observe(&reference, Utf8Path::new("/sln/A"));
        }
        registry
    }

    fn write_manifest(dir: &tempfile::TempDir, contents: &str) -> Utf8PathBuf {
        let root = Utf8Path::from_path(dir.path()).unwrap();
        std::fs::write(root.join("packages.config"), contents).unwrap();
        root.to_owned()
    }

    #[test]
    fn test_entries_are_stripped_bumped_and_deduplicated() {
        let dir = tempfile::TempDir::new().unwrap();
        let project_dir = write_manifest(&dir, MANIFEST);
        let registry = registry_with(&[("A", "1.5"), ("B", "2.0")]);
        let config = ReconcileConfig::default();

        let outcome = ManifestSynchronizer::new(&registry, &config)
            .synchronize(&project_dir)
            .unwrap();
        assert_eq!(
            outcome,
            ManifestOutcome {
                present: true,
                modified: true,
                duplicates_removed: 1,
            }
        );

        let written = std::fs::read_to_string(project_dir.join("packages.config")).unwrap();
        insta::assert_snapshot!(written, @r#"
        <?xml version="1.0" encoding="utf-8"?>
        <packages>
          <package id="A" version="1.5" />
          <package id="B" version="3.0" />
        </packages>
        "#);
    }

    #[test]
    fn test_duplicates_alone_leave_file_untouched() {
        let source = "<packages>\n  <package id=\"A\" version=\"1.0\" />\n  <package id=\"A\" version=\"2.0\" />\n</packages>\n";
        let dir = tempfile::TempDir::new().unwrap();
        let project_dir = write_manifest(&dir, source);
        let registry = registry_with(&[]);
        let config = ReconcileConfig::default();
        let synchronizer = ManifestSynchronizer::new(&registry, &config);

        let outcome = synchronizer.synchronize(&project_dir).unwrap();
        assert!(outcome.present);
        assert!(!outcome.modified);
        assert_eq!(outcome.duplicates_removed, 1);
        assert_eq!(
            std::fs::read_to_string(project_dir.join("packages.config")).unwrap(),
            source
        );

        // In memory the first occurrence is the one that survives.
        let mut document = XmlDocument::parse(source).unwrap();
        synchronizer.synchronize_document(&mut document);
        assert_eq!(
            document.to_string(),
            "<packages>\n  <package id=\"A\" version=\"1.0\" />\n</packages>\n"
        );
    }

    #[test]
    fn test_target_framework_kept_when_configured() {
        let registry = registry_with(&[]);
        let config = ReconcileConfig {
            strip_target_framework: false,
            ..ReconcileConfig::default()
        };
        let mut document =
            XmlDocument::parse(r#"<packages><package id="A" version="1.0" targetFramework="net45" /></packages>"#)
                .unwrap();
        let outcome = ManifestSynchronizer::new(&registry, &config).synchronize_document(&mut document);
        assert!(!outcome.modified);
        assert!(document.to_string().contains("targetFramework"));
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::TempDir::new().unwrap();
        let project_dir = Utf8Path::from_path(dir.path()).unwrap();
        let registry = registry_with(&[]);
        let config = ReconcileConfig::default();
        let synchronizer = ManifestSynchronizer::new(&registry, &config);

        assert_eq!(synchronizer.synchronize(project_dir).unwrap(), ManifestOutcome::default());
        assert!(synchronizer.read_entries(project_dir).unwrap().is_empty());
    }

    #[test]
    fn test_read_entries_keeps_order_and_duplicates() {
        let dir = tempfile::TempDir::new().unwrap();
        let project_dir = write_manifest(&dir, MANIFEST);
        let registry = registry_with(&[]);
        let config = ReconcileConfig::default();

        let entries = ManifestSynchronizer::new(&registry, &config)
            .read_entries(&project_dir)
            .unwrap();
        let ids: Vec<&str> = entries.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, ["A", "B", "a"]);
        assert_eq!(entries[2].version, "2.0");
    }
}
