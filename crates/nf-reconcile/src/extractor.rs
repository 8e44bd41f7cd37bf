//! Reference extraction from project `<Reference>` items.
//!
//! A reference participates in reconciliation when its hint path points into
//! a package folder, i.e. matches `...\<folder>\lib\...`. The folder name is
//! split at its first all-digit dot segment into the package name and version:
//!
//! | hint path | package | version |
//! |-----------|---------|---------|
//! | `..\packages\Newtonsoft.Json.6.0.3\lib\net45\Newtonsoft.Json.dll` | `Newtonsoft.Json` | `6.0.3` |
//! | `$(SolutionDir)\packages\log4net.2.0.0\lib\net40-full\log4net.dll` | `log4net` | `2.0.0` |
//! | `..\lib\Foo.dll` | - | - |

use nf_core::{ExtractedReference, ReconcileConfig, ReferenceKey, ReferenceMetadata};
use regex::Regex;

use crate::error::ReconcileError;

/// Matches the package folder directly above a `lib` directory.
const PACKAGE_FOLDER_PATTERN: &str = r"(?i)(?:^|[\\/])(?P<folder>[^\\/]+)[\\/]lib(?:[\\/]|$)";

/// Turns `<Reference>` items into registry observations.
///
/// # Examples
///
/// ```
/// use nf_core::{ReconcileConfig, ReferenceMetadata};
/// use nf_reconcile::ReferenceExtractor;
///
/// let extractor = ReferenceExtractor::new(&ReconcileConfig::default())?;
///
/// let mut metadata = ReferenceMetadata::new();
/// metadata.set("HintPath", r"..\packages\Newtonsoft.Json.4.5.0.0\lib\net45\Newtonsoft.Json.dll");
///
/// let reference = extractor
///     .extract("Newtonsoft.Json, Version=4.5.0.0, Culture=neutral", &metadata)
///     .unwrap();
/// assert_eq!(reference.key.as_str(), "Newtonsoft.Json");
/// assert_eq!(reference.package_name, "Newtonsoft.Json");
/// assert_eq!(reference.version, "4.5.0.0");
/// # Ok::<(), nf_reconcile::ReconcileError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ReferenceExtractor {
    package_folder: Regex,
    config: ReconcileConfig,
}

impl ReferenceExtractor {
    /// Creates an extractor using the configured framework prefixes.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Pattern`] if the built-in pattern fails to compile.
    pub fn new(config: &ReconcileConfig) -> Result<Self, ReconcileError> {
        Ok(Self {
            package_folder: Regex::new(PACKAGE_FOLDER_PATTERN)?,
            config: config.clone(),
        })
    }

    /// Returns `true` if the reference never takes part in reconciliation.
    ///
    /// Framework references and references without metadata children pass
    /// through untouched.
    #[must_use]
    pub fn is_excluded(&self, include: &str, metadata: &ReferenceMetadata) -> bool {
        metadata.is_empty()
            || self
                .config
                .is_framework_reference(ReferenceKey::bare_name(include))
    }

    /// Extracts the participating part of a reference.
    ///
    /// Returns `None` for excluded references and for hint paths that do not
    /// point into a package folder.
    #[must_use]
    pub fn extract(&self, include: &str, metadata: &ReferenceMetadata) -> Option<ExtractedReference> {
        if self.is_excluded(include, metadata) {
            return None;
        }
        let folder = self.package_folder(metadata.hint_path()?)?;
        let (package_name, version) = split_package_folder(folder)?;

        Some(ExtractedReference {
            key: ReferenceKey::from_include(include),
            raw_include: include.to_owned(),
            package_name: package_name.to_owned(),
            version: version.to_owned(),
            metadata: metadata.clone(),
        })
    }

    /// Returns the package folder segment of a hint path.
    ///
    /// # Examples
    ///
    /// ```
    /// use nf_core::ReconcileConfig;
    /// use nf_reconcile::ReferenceExtractor;
    ///
    /// let extractor = ReferenceExtractor::new(&ReconcileConfig::default())?;
    /// assert_eq!(
    ///     extractor.package_folder(r"..\packages\Foo.1.2.0\lib\net45\Foo.dll"),
    ///     Some("Foo.1.2.0")
    /// );
    /// assert_eq!(extractor.package_folder(r"..\ThirdParty\Foo.dll"), None);
    /// # Ok::<(), nf_reconcile::ReconcileError>(())
    /// ```
    #[must_use]
    pub fn package_folder<'a>(&self, hint_path: &'a str) -> Option<&'a str> {
        self.package_folder
            .captures(hint_path)
            .and_then(|captures| captures.name("folder"))
            .map(|folder| folder.as_str())
    }

    /// Rewrites the package folder of a hint path to another version.
    ///
    /// Returns `None` when the hint path has no package folder.
    ///
    /// # Examples
    ///
    /// ```
    /// use nf_core::ReconcileConfig;
    /// use nf_reconcile::ReferenceExtractor;
    ///
    /// let extractor = ReferenceExtractor::new(&ReconcileConfig::default())?;
    /// assert_eq!(
    ///     extractor
    ///         .with_package_version(r"$(SolutionDir)\packages\Foo.1.0\lib\Foo.dll", "2.0")
    ///         .as_deref(),
    ///     Some(r"$(SolutionDir)\packages\Foo.2.0\lib\Foo.dll")
    /// );
    /// # Ok::<(), nf_reconcile::ReconcileError>(())
    /// ```
    #[must_use]
    pub fn with_package_version(&self, hint_path: &str, version: &str) -> Option<String> {
        let folder = self
            .package_folder
            .captures(hint_path)
            .and_then(|captures| captures.name("folder"))?;
        let (package_name, _) = split_package_folder(folder.as_str())?;

        let mut rewritten = String::with_capacity(hint_path.len() + version.len());
        rewritten.push_str(&hint_path[..folder.start()]);
        rewritten.push_str(package_name);
        rewritten.push('.');
        rewritten.push_str(version);
        rewritten.push_str(&hint_path[folder.end()..]);
        Some(rewritten)
    }
}

/// Splits a package folder name into package name and version.
///
/// The version starts at the first dot segment made only of digits.
///
/// # Examples
///
/// ```
/// use nf_reconcile::split_package_folder;
///
/// assert_eq!(split_package_folder("Newtonsoft.Json.6.0.3"), Some(("Newtonsoft.Json", "6.0.3")));
/// assert_eq!(split_package_folder("Foo.1.0.0-beta2"), Some(("Foo", "1.0.0-beta2")));
/// assert_eq!(split_package_folder("NoVersion"), None);
/// ```
#[must_use]
pub fn split_package_folder(folder: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for segment in folder.split('.') {
        if offset > 0 && !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            return Some((&folder[..offset - 1], &folder[offset..]));
        }
        offset += segment.len() + 1;
    }
    None
}
