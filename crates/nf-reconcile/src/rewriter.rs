//! Per-reference normalization and stale-reference replacement.

use nf_core::{ExtractedReference, ReconcileConfig, ReferenceKey, ReferenceMetadata};
use regex::Regex;

use crate::error::ReconcileError;
use crate::extractor::ReferenceExtractor;
use crate::project::ReferenceItem;
use crate::registry::Registry;

/// Rewrites `<Reference>` items into their canonical form.
///
/// Canonical means: a bare `Include`, a hint path rooted at the solution
/// directory property, and `<SpecificVersion>False</SpecificVersion>`.
///
/// # Examples
///
/// ```
/// use nf_core::ReconcileConfig;
/// use nf_reconcile::ProjectRewriter;
///
/// let rewriter = ProjectRewriter::new(&ReconcileConfig::default())?;
/// assert_eq!(
///     rewriter.normalize_hint_path(r"..\..\packages\Foo.1.0\lib\net45\Foo.dll").as_deref(),
///     Some(r"$(SolutionDir)\packages\Foo.1.0\lib\net45\Foo.dll")
/// );
/// assert_eq!(rewriter.normalize_hint_path(r"$(SolutionDir)\packages\Foo.1.0\lib\Foo.dll"), None);
/// # Ok::<(), nf_reconcile::ReconcileError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ProjectRewriter {
    relative_packages: Regex,
    solution_packages: String,
}

impl ProjectRewriter {
    /// Creates a rewriter for the configured packages directory and
    /// solution directory property.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Pattern`] if the packages pattern fails to compile.
    pub fn new(config: &ReconcileConfig) -> Result<Self, ReconcileError> {
        let pattern = format!(r"(?i)^(?:\.\.[\\/])+{}[\\/]", regex::escape(&config.packages_dir));
        Ok(Self {
            relative_packages: Regex::new(&pattern)?,
            solution_packages: format!(
                "$({})\\{}\\",
                config.solution_dir_variable, config.packages_dir
            ),
        })
    }

    /// Rewrites a `..\`-relative packages hint path to the solution-relative
    /// form. Returns `None` when the path is already canonical or points
    /// elsewhere.
    #[must_use]
    pub fn normalize_hint_path(&self, hint_path: &str) -> Option<String> {
        let found = self.relative_packages.find(hint_path)?;
        Some(format!("{}{}", self.solution_packages, &hint_path[found.end()..]))
    }

    /// Returns the canonical form of a metadata snapshot.
    #[must_use]
    pub fn normalize_metadata(&self, metadata: &ReferenceMetadata) -> ReferenceMetadata {
        let mut normalized = metadata.clone();
        if let Some(hint_path) = metadata.hint_path().and_then(|hint| self.normalize_hint_path(hint)) {
            normalized.set(ReferenceMetadata::HINT_PATH, hint_path);
        }
        normalized.set(ReferenceMetadata::SPECIFIC_VERSION, "False");
        normalized
    }

    /// Returns the reference with its metadata in canonical form.
    #[must_use]
    pub fn normalize(&self, mut reference: ExtractedReference) -> ExtractedReference {
        reference.metadata = self.normalize_metadata(&reference.metadata);
        reference
    }

    /// Normalizes one item and replaces its metadata when the registry holds
    /// a strictly newer version of it.
    ///
    /// Items that do not take part in reconciliation are left untouched.
    /// Returns `true` if the item changed.
    pub fn rewrite(
        &self,
        item: &mut ReferenceItem<'_>,
        extractor: &ReferenceExtractor,
        registry: &Registry,
    ) -> bool {
        let include = item.include();
        let metadata = item.metadata();
        let Some(reference) = extractor.extract(&include, &metadata) else {
            return false;
        };

        let mut changed = false;
        if ReferenceKey::is_qualified(&include) {
            changed |= item.set_include(reference.key.as_str());
        }
        if let Some(hint_path) = metadata.hint_path().and_then(|hint| self.normalize_hint_path(hint)) {
            changed |= item.set_metadata(ReferenceMetadata::HINT_PATH, &hint_path);
        }
        changed |= item.set_metadata(ReferenceMetadata::SPECIFIC_VERSION, "False");

        if let Some(record) = registry.lookup(&reference.key) {
            if registry.is_newer(record.version_str(), &reference.version) {
                changed |= item.replace_metadata(&record.source_metadata);
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8Path;
    use nf_core::ComparisonMode;
    use nf_xml::XmlDocument;

    use super::*;
    use crate::project::ProjectFile;

    fn rewriter() -> ProjectRewriter {
        ProjectRewriter::new(&ReconcileConfig::default()).unwrap()
    }

    #[test]
    fn test_normalize_hint_path_variants() {
        let rewriter = rewriter();
        assert_eq!(
            rewriter.normalize_hint_path("../packages/Foo.1.0/lib/Foo.dll").as_deref(),
            Some(r"$(SolutionDir)\packages\Foo.1.0/lib/Foo.dll")
        );
        assert_eq!(
            rewriter.normalize_hint_path(r"..\Packages\Foo.1.0\lib\Foo.dll").as_deref(),
            Some(r"$(SolutionDir)\packages\Foo.1.0\lib\Foo.dll")
        );
        assert_eq!(rewriter.normalize_hint_path(r"..\lib\Foo.dll"), None);
        assert_eq!(rewriter.normalize_hint_path(r"packages\Foo.1.0\lib\Foo.dll"), None);
    }

    #[test]
    fn test_normalize_metadata_forces_specific_version() {
        let mut metadata = ReferenceMetadata::new();
        metadata.set("HintPath", r"..\packages\Foo.1.0\lib\Foo.dll");
        metadata.set("SpecificVersion", "True");

        let normalized = rewriter().normalize_metadata(&metadata);
        assert_eq!(normalized.hint_path(), Some(r"$(SolutionDir)\packages\Foo.1.0\lib\Foo.dll"));
        assert_eq!(normalized.get("SpecificVersion"), Some("False"));
        assert_eq!(normalized.len(), 2);
    }

    #[test]
    fn test_rewrite_normalizes_and_replaces_stale_reference() {
        let source = r#"<Project>
  <ItemGroup>
    <Reference Include="Foo, Version=1.0.0.0, Culture=neutral">
      <HintPath>..\packages\Foo.1.0\lib\Foo.dll</HintPath>
      <Private>True</Private>
    </Reference>
  </ItemGroup>
</Project>"#;
        let mut project = ProjectFile::from_document(
            Utf8Path::new("/sln/A/A.csproj"),
            XmlDocument::parse(source).unwrap(),
        );
        let config = ReconcileConfig::default();
        let extractor = ReferenceExtractor::new(&config).unwrap();
        let rewriter = rewriter();

        let mut registry = Registry::with_mode(ComparisonMode::Ordinal);
        let mut newer = ReferenceMetadata::new();
        newer.set("HintPath", r"..\packages\Foo.2.0\lib\Foo.dll");
        let newer = extractor.extract("Foo", &newer).unwrap();
        registry.observe(&rewriter.normalize(newer), Utf8Path::new("/sln/B"));

        assert!(project.update_references(|item| rewriter.rewrite(item, &extractor, &registry)));
        insta::assert_snapshot!(project.document().to_string(), @r#"
        <Project>
          <ItemGroup>
            <Reference Include="Foo">
              <HintPath>$(SolutionDir)\packages\Foo.2.0\lib\Foo.dll</HintPath>
              <SpecificVersion>False</SpecificVersion>
            </Reference>
          </ItemGroup>
        </Project>
        "#);

        // A second pass finds nothing left to do.
        assert!(!project.update_references(|item| rewriter.rewrite(item, &extractor, &registry)));
    }

    #[test]
    fn test_rewrite_leaves_framework_references() {
        let source = r"<Project><ItemGroup><Reference Include='System.Xml'><Private>False</Private></Reference></ItemGroup></Project>";
        let mut project = ProjectFile::from_document(
            Utf8Path::new("/sln/A/A.csproj"),
            XmlDocument::parse(source).unwrap(),
        );
        let extractor = ReferenceExtractor::new(&ReconcileConfig::default()).unwrap();
        let registry = Registry::with_mode(ComparisonMode::Ordinal);
        let rewriter = rewriter();

        assert!(!project.update_references(|item| rewriter.rewrite(item, &extractor, &registry)));
        assert_eq!(project.document().to_string(), source);
    }
}
