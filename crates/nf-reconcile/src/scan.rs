//! Read-only scan report.
//!
//! Summarizes what the gather pass learned: for each package its highest
//! version, the assemblies it provides, the projects referencing it and the
//! resolved assembly identity, alongside the configured package sources.

use std::collections::{BTreeMap, BTreeSet};

use camino::{Utf8Path, Utf8PathBuf};
use nf_core::FeedConfig;
use nf_xml::XmlDocument;
use serde::Serialize;
use tracing::debug;

use crate::error::ReconcileError;
use crate::registry::Registry;

/// What the solution uses of one package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    /// Highest version referenced.
    pub version: String,
    /// Assembly names the package provides.
    pub assemblies: BTreeSet<String>,
    /// Referencing project directories, relative to the solution.
    pub projects: BTreeSet<Utf8PathBuf>,
    /// Assembly version read from the DLL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembly_version: Option<String>,
    /// Public key token read from the DLL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_token: Option<String>,
}

/// Scan output: package sources and package usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Package source name → URL.
    pub sources: BTreeMap<String, String>,
    /// Package name → usage.
    pub packages: BTreeMap<String, PackageSummary>,
}

impl ScanReport {
    /// Builds the report from a filled registry.
    #[must_use]
    pub fn from_registry(
        registry: &Registry,
        solution_dir: &Utf8Path,
        sources: BTreeMap<String, String>,
    ) -> Self {
        let mut packages: BTreeMap<String, PackageSummary> = BTreeMap::new();
        for (key, record) in registry.iter() {
            let summary = packages.entry(record.package_name.clone()).or_default();
            if summary.version.is_empty() {
                summary.version = registry
                    .package_version(&record.package_name)
                    .unwrap_or_default()
                    .to_owned();
            }
            summary.assemblies.insert(key.to_string());
            summary.projects.extend(
                record
                    .referencing_projects
                    .iter()
                    .map(|dir| relative_to(dir, solution_dir)),
            );
            if let Some(attributes) = &record.assembly_attributes {
                if summary.assembly_version.is_none() {
                    summary.assembly_version = Some(attributes.version.clone());
                }
                if summary.public_token.is_none() {
                    summary.public_token.clone_from(&attributes.public_token);
                }
            }
        }
        Self { sources, packages }
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Serialize`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ReconcileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn relative_to(dir: &Utf8Path, base: &Utf8Path) -> Utf8PathBuf {
    match dir.strip_prefix(base) {
        Ok(relative) if relative.as_str().is_empty() => Utf8PathBuf::from("."),
        Ok(relative) => relative.to_owned(),
        Err(_) => dir.to_owned(),
    }
}

/// Returns the package sources to report.
///
/// Reads `packageSources` from the configured `NuGet.Config`, or from the
/// per-user one when none is configured. Falls back to the configured
/// default sources when the file is missing, unreadable, or lists nothing.
#[must_use]
pub fn package_sources(config: &FeedConfig) -> BTreeMap<String, String> {
    let path = config.nuget_config.clone().or_else(|| {
        dirs::config_dir()
            .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
            .map(|dir| dir.join("NuGet").join("NuGet.Config"))
    });

    let sources = path
        .filter(|path| path.is_file())
        .and_then(|path| match read_package_sources(&path) {
            Ok(sources) => Some(sources),
            Err(err) => {
                debug!(error = %err, "Ignoring unreadable NuGet config");
                None
            }
        })
        .unwrap_or_default();

    if sources.is_empty() {
        config.default_sources.clone()
    } else {
        sources
    }
}

/// Reads the `<packageSources>` entries of a `NuGet.Config` file.
///
/// # Errors
///
/// Returns [`ReconcileError::Document`] if the file cannot be parsed.
pub fn read_package_sources(path: &Utf8Path) -> Result<BTreeMap<String, String>, ReconcileError> {
    let document = XmlDocument::load(path).map_err(|err| ReconcileError::document(path, err))?;
    Ok(document
        .root()
        .elements_named("packageSources")
        .flat_map(|sources| sources.elements_named("add"))
        .filter_map(|add| {
            Some((
                add.attr("key")?.into_owned(),
                add.attr("value").unwrap_or_default().into_owned(),
            ))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use nf_core::{AssemblyAttributes, ComparisonMode, ReconcileConfig, ReferenceMetadata};

    use super::*;
    use crate::assembly::{AssemblyClassifier, HintPathResolver};
    use crate::error::ClassifyError;
    use crate::extractor::ReferenceExtractor;

    #[derive(Debug)]
    struct FixedClassifier;

    impl AssemblyClassifier for FixedClassifier {
        fn classify(&self, path: &Utf8Path) -> Result<AssemblyAttributes, ClassifyError> {
            let name = path.file_stem().unwrap_or_default();
            Ok(AssemblyAttributes::new(name, "6.0.0.0", Some("30ad4fe6b2a6aeed".to_owned())))
        }
    }

    fn observe(registry: &mut Registry, include: &str, folder: &str, project: &str) {
        let extractor = ReferenceExtractor::new(&ReconcileConfig::default()).unwrap();
        let mut metadata = ReferenceMetadata::new();
        metadata.set("HintPath", format!(r"$(SolutionDir)\packages\{folder}\lib\net45\{include}.dll"));
        let reference = extractor.extract(include, &metadata).unwrap();
        registry.observe(&reference, Utf8Path::new(project));
    }

    #[test]
    fn test_report_groups_records_by_package() {
        let mut registry = Registry::with_mode(ComparisonMode::Ordinal);
        observe(&mut registry, "Newtonsoft.Json", "Newtonsoft.Json.4.5.0.0", "/sln/A");
        observe(&mut registry, "Newtonsoft.Json", "Newtonsoft.Json.6.0.0.0", "/sln/B");
        observe(&mut registry, "Castle.Core", "Castle.Windsor.3.2.0", "/sln/A");
        observe(&mut registry, "Castle.Windsor", "Castle.Windsor.3.2.0", "/sln/B");

        let resolver = HintPathResolver::new(Utf8Path::new("/sln"), "SolutionDir");
        let key = nf_core::ReferenceKey::from_include("Newtonsoft.Json");
        registry
            .resolve_assembly_attributes(&key, &FixedClassifier, &resolver)
            .unwrap();

        let sources = BTreeMap::from([("main".to_owned(), "https://nuget.org/api/v2/".to_owned())]);
        let report = ScanReport::from_registry(&registry, Utf8Path::new("/sln"), sources);
        insta::assert_json_snapshot!(report, @r#"
        {
          "sources": {
            "main": "https://nuget.org/api/v2/"
          },
          "packages": {
            "Castle.Windsor": {
              "version": "3.2.0",
              "assemblies": [
                "Castle.Core",
                "Castle.Windsor"
              ],
              "projects": [
                "A",
                "B"
              ]
            },
            "Newtonsoft.Json": {
              "version": "6.0.0.0",
              "assemblies": [
                "Newtonsoft.Json"
              ],
              "projects": [
                "A",
                "B"
              ],
              "assembly_version": "6.0.0.0",
              "public_token": "30ad4fe6b2a6aeed"
            }
          }
        }
        "#);
    }

    #[test]
    fn test_package_sources_from_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("NuGet.Config");
        std::fs::write(
            &path,
            r#"<?xml version="1.0" encoding="utf-8"?>
<configuration>
  <packageSources>
    <add key="nuget.org" value="https://api.nuget.org/v3/index.json" />
    <add key="local" value="C:\feeds\local" />
  </packageSources>
</configuration>
"#,
        )
        .unwrap();

        let config = FeedConfig {
            nuget_config: Some(path),
            ..FeedConfig::default()
        };
        let sources = package_sources(&config);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources.get("local").map(String::as_str), Some(r"C:\feeds\local"));
    }

    #[test]
    fn test_package_sources_fall_back_to_defaults() {
        let config = FeedConfig {
            nuget_config: Some(Utf8PathBuf::from("/definitely/missing/NuGet.Config")),
            ..FeedConfig::default()
        };
        assert_eq!(package_sources(&config), FeedConfig::default().default_sources);
    }
}
