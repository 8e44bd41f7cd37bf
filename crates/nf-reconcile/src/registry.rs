//! The canonical version registry.
//!
//! One [`PackageRecord`] per [`ReferenceKey`], holding the highest version seen
//! across the solution and the metadata of the reference that carried it.
//!
//! # Invariants
//!
//! - At most one record per key
//! - A record's version never decreases within a run
//! - A record's referencing projects only grow
//!
//! # Examples
//!
//! ```
//! use camino::Utf8Path;
//! use nf_core::{ComparisonMode, ReconcileConfig, ReferenceMetadata};
//! use nf_reconcile::{ReferenceExtractor, Registry};
//!
//! let extractor = ReferenceExtractor::new(&ReconcileConfig::default())?;
//! let mut registry = Registry::with_mode(ComparisonMode::Ordinal);
//!
//! for (dir, version) in [("/sln/A", "4.5.0.0"), ("/sln/B", "6.0.0.0"), ("/sln/C", "5.0.0.0")] {
//!     let mut metadata = ReferenceMetadata::new();
//!     metadata.set("HintPath", format!(r"..\packages\Newtonsoft.Json.{version}\lib\Newtonsoft.Json.dll"));
//!     let reference = extractor.extract("Newtonsoft.Json", &metadata).unwrap();
//!     registry.observe(&reference, Utf8Path::new(dir));
//! }
//!
//! let record = registry.lookup_name("Newtonsoft.Json").unwrap();
//! assert_eq!(record.version.as_deref(), Some("6.0.0.0"));
//! assert_eq!(record.referencing_projects.len(), 3);
//! # Ok::<(), nf_reconcile::ReconcileError>(())
//! ```

use std::cmp::Ordering;

use camino::Utf8Path;
use nf_core::{
    AssemblyAttributes, ComparisonMode, ExtractedReference, PackageRecord, ReferenceKey,
    ReferenceMetadata, VersionComparator,
};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::assembly::{AssemblyClassifier, HintPathResolver};
use crate::error::ClassifyError;
use crate::extractor::ReferenceExtractor;

/// What an observation did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The key was unseen and a record was created.
    Inserted,
    /// The observed version was strictly newer and replaced the record's.
    Raised,
    /// The record kept its version; only the referencing projects may have grown.
    Unchanged,
}

/// Key → canonical record map for one run.
#[derive(Debug)]
pub struct Registry {
    comparator: Box<dyn VersionComparator>,
    records: FxHashMap<ReferenceKey, PackageRecord>,
}

impl Registry {
    /// Creates an empty registry ordering versions with the given comparator.
    #[must_use]
    pub fn new(comparator: Box<dyn VersionComparator>) -> Self {
        Self {
            comparator,
            records: FxHashMap::default(),
        }
    }

    /// Creates an empty registry for a configured comparison mode.
    #[must_use]
    pub fn with_mode(mode: ComparisonMode) -> Self {
        Self::new(mode.comparator())
    }

    /// Returns `true` if `candidate` is strictly newer than `current`.
    #[inline]
    #[must_use]
    pub fn is_newer(&self, candidate: &str, current: &str) -> bool {
        self.comparator.is_newer(candidate, current)
    }

    /// Records one reference seen in the project at `project_dir`.
    pub fn observe(&mut self, reference: &ExtractedReference, project_dir: &Utf8Path) -> Observation {
        let Some(record) = self.records.get_mut(&reference.key) else {
            debug!(key = %reference.key, version = %reference.version, "New reference");
            self.records.insert(
                reference.key.clone(),
                PackageRecord::new(
                    &reference.package_name,
                    &reference.version,
                    reference.metadata.clone(),
                    project_dir,
                ),
            );
            return Observation::Inserted;
        };

        record.referencing_projects.insert(project_dir.to_owned());
        if !self.comparator.is_newer(&reference.version, record.version_str()) {
            return Observation::Unchanged;
        }

        debug!(
            key = %reference.key,
            from = record.version_str(),
            to = %reference.version,
            project = %project_dir,
            "Raised reference version"
        );
        record.package_name.clone_from(&reference.package_name);
        record.version = Some(reference.version.clone());
        record.source_metadata = reference.metadata.clone();
        record.source_project = project_dir.to_owned();
        record.modified = true;
        Observation::Raised
    }

    /// Records a version found in a project's package manifest.
    ///
    /// Every record of the package takes the version when it is strictly
    /// newer, with the hint path of its snapshot rewritten to the new package
    /// folder. The project joins the referencing projects of every record of
    /// the package either way. Returns the number of records raised.
    pub fn observe_package_version(
        &mut self,
        package_name: &str,
        version: &str,
        project_dir: &Utf8Path,
        extractor: &ReferenceExtractor,
    ) -> usize {
        let keys: Vec<ReferenceKey> = self
            .records
            .iter()
            .filter(|(_, record)| record.package_name.eq_ignore_ascii_case(package_name))
            .map(|(key, _)| key.clone())
            .collect();

        let mut raised = 0;
        for key in keys {
            let Some(record) = self.records.get(&key) else {
                continue;
            };
            let mut metadata = record.source_metadata.clone();
            if let Some(hint_path) = metadata
                .hint_path()
                .and_then(|hint| extractor.with_package_version(hint, version))
            {
                metadata.set(ReferenceMetadata::HINT_PATH, hint_path);
            }
            let reference = ExtractedReference {
                key,
                raw_include: String::new(),
                package_name: record.package_name.clone(),
                version: version.to_owned(),
                metadata,
            };
            if self.observe(&reference, project_dir) == Observation::Raised {
                raised += 1;
            }
        }
        raised
    }

    /// Returns the record for a key.
    #[inline]
    #[must_use]
    pub fn lookup(&self, key: &ReferenceKey) -> Option<&PackageRecord> {
        self.records.get(key)
    }

    /// Returns the record for a bare assembly name, ignoring case.
    #[inline]
    #[must_use]
    pub fn lookup_name(&self, name: &str) -> Option<&PackageRecord> {
        self.lookup(&ReferenceKey::from_include(name))
    }

    /// Returns `true` if any record belongs to the package.
    #[must_use]
    pub fn has_package(&self, package_name: &str) -> bool {
        self.records
            .values()
            .any(|record| record.package_name.eq_ignore_ascii_case(package_name))
    }

    /// Returns the highest version among the records of a package.
    #[must_use]
    pub fn package_version(&self, package_name: &str) -> Option<&str> {
        self.records
            .values()
            .filter(|record| record.package_name.eq_ignore_ascii_case(package_name))
            .filter_map(|record| record.version.as_deref())
            .max_by(|a, b| self.comparator.compare(a, b))
    }

    /// Returns the keys referenced by a project, sorted.
    #[must_use]
    pub fn keys_referenced_by(&self, project_dir: &Utf8Path) -> Vec<ReferenceKey> {
        let mut keys: Vec<ReferenceKey> = self
            .records
            .iter()
            .filter(|(_, record)| record.is_referenced_by(project_dir))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Returns the records referenced by a project, sorted by key.
    #[must_use]
    pub fn records_referenced_by(&self, project_dir: &Utf8Path) -> Vec<(&ReferenceKey, &PackageRecord)> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .filter(|(_, record)| record.is_referenced_by(project_dir))
            .collect();
        records.sort_by(|(a, _), (b, _)| a.cmp(b));
        records
    }

    /// Iterates over every record, sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&ReferenceKey, &PackageRecord)> {
        let mut records: Vec<_> = self.records.iter().collect();
        records.sort_by(|(a, _), (b, _)| a.cmp(b));
        records.into_iter()
    }

    /// Resolves and caches the assembly attributes of a record.
    ///
    /// The first call locates the DLL from the snapshot's hint path and
    /// classifies it. Later calls return the cached result and never retry,
    /// even when the first attempt failed.
    ///
    /// # Errors
    ///
    /// Returns the classification failure of the first attempt.
    pub fn resolve_assembly_attributes(
        &mut self,
        key: &ReferenceKey,
        classifier: &dyn AssemblyClassifier,
        resolver: &HintPathResolver,
    ) -> Result<Option<&AssemblyAttributes>, ClassifyError> {
        let Some(record) = self.records.get_mut(key) else {
            return Ok(None);
        };
        if !record.attributes_attempted {
            record.attributes_attempted = true;
            let hint_path = record
                .source_metadata
                .hint_path()
                .ok_or_else(|| ClassifyError::NoHintPath(key.to_string()))?;
            let path = resolver.resolve(hint_path, &record.source_project);
            match classifier.classify(&path) {
                Ok(attributes) => {
                    debug!(key = %key, token = ?attributes.public_token, "Classified assembly");
                    record.assembly_attributes = Some(attributes);
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "Could not classify assembly");
                    return Err(err);
                }
            }
        }
        Ok(record.assembly_attributes.as_ref())
    }

    /// Compares two versions with the registry's comparator.
    #[inline]
    #[must_use]
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.comparator.compare(a, b)
    }

    /// Returns the number of records.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the registry has no records.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
