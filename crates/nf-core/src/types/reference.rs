//! Reference identity and metadata types.
//!
//! A `<Reference Include="...">` item in a project file is described by a
//! [`ReferenceKey`] (its bare assembly name) and an ordered [`ReferenceMetadata`]
//! snapshot of its child elements.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// The registry identity of a reference.
///
/// Built from the declared `Include` value with comma-separated qualifiers
/// (`Version=`, `Culture=`, `PublicKeyToken=`, ...) stripped, so a reference keeps
/// its identity after its declaration has been normalized. Keys compare
/// case-insensitively, as MSBuild resolves assembly names; the first spelling
/// seen is kept for display.
///
/// # Examples
///
/// ```
/// use nf_core::ReferenceKey;
///
/// let key = ReferenceKey::from_include("Foo, Version=1.0.0.0, Culture=neutral");
/// assert_eq!(key.as_str(), "Foo");
/// assert_eq!(key, ReferenceKey::from_include("Foo"));
/// assert_eq!(key, ReferenceKey::from_include("foo"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ReferenceKey {
    name: String,
    folded: String,
}

impl ReferenceKey {
    /// Creates a key from a declared `Include` identity.
    #[must_use]
    pub fn from_include(include: &str) -> Self {
        let name = Self::bare_name(include);
        Self {
            name: name.to_owned(),
            folded: name.to_lowercase(),
        }
    }

    /// Returns the identity with every comma-separated qualifier removed.
    ///
    /// # Examples
    ///
    /// ```
    /// use nf_core::ReferenceKey;
    ///
    /// assert_eq!(ReferenceKey::bare_name("Foo, Version=1.0.0.0"), "Foo");
    /// assert_eq!(ReferenceKey::bare_name("  Bar  "), "Bar");
    /// ```
    #[must_use]
    pub fn bare_name(include: &str) -> &str {
        include.split(',').next().unwrap_or(include).trim()
    }

    /// Returns `true` if the declared identity carries qualifiers.
    #[inline]
    #[must_use]
    pub fn is_qualified(include: &str) -> bool {
        include.contains(',')
    }

    /// Returns the key as spelled where it was first seen.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Returns the lowercased form the key compares by.
    #[inline]
    #[must_use]
    pub fn folded(&self) -> &str {
        &self.folded
    }
}

impl PartialEq for ReferenceKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for ReferenceKey {}

impl Hash for ReferenceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl PartialOrd for ReferenceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReferenceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded.cmp(&other.folded)
    }
}

impl From<String> for ReferenceKey {
    fn from(include: String) -> Self {
        Self::from_include(&include)
    }
}

impl From<ReferenceKey> for String {
    fn from(key: ReferenceKey) -> Self {
        key.name
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl AsRef<str> for ReferenceKey {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

/// A single metadata child of a reference, e.g. `<HintPath>...</HintPath>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Element name of the metadata item.
    pub name: String,
    /// Text content of the metadata item.
    pub value: String,
}

impl MetadataEntry {
    /// Creates a new metadata entry.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered metadata snapshot of a reference.
///
/// Names are matched case-insensitively, as MSBuild does.
///
/// # Examples
///
/// ```
/// use nf_core::ReferenceMetadata;
///
/// let mut metadata = ReferenceMetadata::new();
/// metadata.set("HintPath", r"..\packages\Foo.1.0\lib\net45\Foo.dll");
/// metadata.set("Private", "True");
/// assert_eq!(metadata.get("hintpath"), Some(r"..\packages\Foo.1.0\lib\net45\Foo.dll"));
/// assert_eq!(metadata.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceMetadata {
    entries: SmallVec<[MetadataEntry; 4]>,
}

impl ReferenceMetadata {
    /// Name of the metadata item that locates the referenced DLL.
    pub const HINT_PATH: &'static str = "HintPath";

    /// Name of the metadata item controlling exact version binding.
    pub const SPECIFIC_VERSION: &'static str = "SpecificVersion";

    /// Creates an empty snapshot.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of the named item.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
            .map(|entry| entry.value.as_str())
    }

    /// Sets the named item, keeping its position if it already exists.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.value = value,
            None => self.entries.push(MetadataEntry::new(name, value)),
        }
    }

    /// Returns the hint path, if present.
    #[inline]
    #[must_use]
    pub fn hint_path(&self) -> Option<&str> {
        self.get(Self::HINT_PATH)
    }

    /// Iterates over the entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = &MetadataEntry> {
        self.entries.iter()
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the snapshot has no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<MetadataEntry> for ReferenceMetadata {
    fn from_iter<I: IntoIterator<Item = MetadataEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// The participating part of one `<Reference>` item.
///
/// Produced by the reference extractor; only references whose hint path
/// points into a package folder yield one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedReference {
    /// Registry identity.
    pub key: ReferenceKey,
    /// The `Include` value exactly as declared.
    pub raw_include: String,
    /// Package identity derived from the hint path.
    pub package_name: String,
    /// Package version derived from the hint path.
    pub version: String,
    /// Metadata snapshot in document order.
    pub metadata: ReferenceMetadata,
}
