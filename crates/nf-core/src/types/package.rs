//! Registry record types.

use std::collections::BTreeSet;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use super::reference::ReferenceMetadata;

/// Identity of a compiled assembly as read from its metadata.
///
/// # Examples
///
/// ```
/// use nf_core::AssemblyAttributes;
///
/// let attrs = AssemblyAttributes::new("Foo", "1.2.0.0", Some("0123456789abcdef".to_owned()));
/// assert_eq!(
///     attrs.full_name,
///     "Foo, Version=1.2.0.0, Culture=neutral, PublicKeyToken=0123456789abcdef"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssemblyAttributes {
    /// Simple assembly name.
    pub name: String,
    /// Display name including version, culture and token.
    pub full_name: String,
    /// Four-part assembly version.
    pub version: String,
    /// Lowercase hex public key token, `None` for unsigned assemblies.
    pub public_token: Option<String>,
}

impl AssemblyAttributes {
    /// Creates attributes for a culture-neutral assembly, deriving the full name.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        public_token: Option<String>,
    ) -> Self {
        let name = name.into();
        let version = version.into();
        let token = public_token.as_deref().unwrap_or("null");
        let full_name =
            format!("{name}, Version={version}, Culture=neutral, PublicKeyToken={token}");
        Self {
            name,
            full_name,
            version,
            public_token,
        }
    }
}

/// Canonical state of one reference across the solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Package identity derived from the hint path.
    pub package_name: String,

    /// Highest version observed so far.
    pub version: Option<String>,

    /// Metadata of the instance carrying the highest version, in
    /// solution-relative form.
    pub source_metadata: ReferenceMetadata,

    /// Directory of the project the snapshot came from.
    pub source_project: Utf8PathBuf,

    /// Directories of every project referencing this key.
    pub referencing_projects: BTreeSet<Utf8PathBuf>,

    /// Set once the version has been raised during the run.
    pub modified: bool,

    /// Resolved assembly identity, filled at most once.
    pub assembly_attributes: Option<AssemblyAttributes>,

    /// Set once resolution has been attempted, successful or not.
    #[serde(skip)]
    pub attributes_attempted: bool,
}

impl PackageRecord {
    /// Creates a record from its first observation.
    #[must_use]
    pub fn new(
        package_name: impl Into<String>,
        version: impl Into<String>,
        source_metadata: ReferenceMetadata,
        source_project: &Utf8Path,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            version: Some(version.into()),
            source_metadata,
            source_project: source_project.to_owned(),
            referencing_projects: BTreeSet::from([source_project.to_owned()]),
            modified: false,
            assembly_attributes: None,
            attributes_attempted: false,
        }
    }

    /// Returns the version, or an empty string when none is known.
    #[inline]
    #[must_use]
    pub fn version_str(&self) -> &str {
        self.version.as_deref().unwrap_or_default()
    }

    /// Returns `true` if the project directory references this record.
    #[inline]
    #[must_use]
    pub fn is_referenced_by(&self, project_dir: &Utf8Path) -> bool {
        self.referencing_projects.contains(project_dir)
    }

    /// Returns the resolved public key token.
    #[inline]
    #[must_use]
    pub fn public_token(&self) -> Option<&str> {
        self.assembly_attributes
            .as_ref()
            .and_then(|attrs| attrs.public_token.as_deref())
    }
}
