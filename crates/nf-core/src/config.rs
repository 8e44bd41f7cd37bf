//! Configuration structures for the nugetfix tool.
//!
//! This module provides configuration types for all components of the application:
//!
//! - [`ReconcileConfig`] - Reconciliation settings (variables, prefixes, comparison)
//! - [`DiscoveryConfig`] - Project discovery settings (extensions, skip lists)
//! - [`FeedConfig`] - Package feed settings (treated as opaque values)
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] with values matching the
//! conventional `packages.config` solution layout.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::ComparisonMode;

/// Configuration for the reconciliation engine.
///
/// # Examples
///
/// ```
/// use nf_core::ReconcileConfig;
///
/// let config = ReconcileConfig::default();
/// assert_eq!(config.solution_dir_variable, "SolutionDir");
/// assert_eq!(config.manifest_file, "packages.config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Name of the solution-relative MSBuild property (typically `SolutionDir`).
    pub solution_dir_variable: String,

    /// Name of the packages directory beside the solution (typically `packages`).
    pub packages_dir: String,

    /// File name of the per-project package manifest.
    pub manifest_file: String,

    /// Reference identities starting with one of these prefixes are framework
    /// references and never take part in reconciliation.
    pub framework_prefixes: Vec<String>,

    /// How version strings are ordered.
    pub comparison: ComparisonMode,

    /// Remove the `targetFramework` attribute from manifest entries.
    pub strip_target_framework: bool,

    /// Add `/assemblyCompareMode:StrongNameIgnoringVersion` to projects that run
    /// code analysis.
    pub fix_code_analysis: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            solution_dir_variable: "SolutionDir".to_owned(),
            packages_dir: "packages".to_owned(),
            manifest_file: "packages.config".to_owned(),
            framework_prefixes: vec![
                "System".to_owned(),
                "mscorlib".to_owned(),
                "Microsoft.CSharp".to_owned(),
                "WindowsBase".to_owned(),
                "PresentationCore".to_owned(),
                "PresentationFramework".to_owned(),
            ],
            comparison: ComparisonMode::Ordinal,
            strip_target_framework: true,
            fix_code_analysis: true,
        }
    }
}

impl ReconcileConfig {
    /// Returns `true` if the identity names a framework assembly.
    ///
    /// A prefix matches the whole identity or a dotted/comma-qualified extension
    /// of it, so `System` matches `System.Xml` but not `SystemTools`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nf_core::ReconcileConfig;
    ///
    /// let config = ReconcileConfig::default();
    /// assert!(config.is_framework_reference("System.Xml"));
    /// assert!(config.is_framework_reference("System"));
    /// assert!(!config.is_framework_reference("SystemTools"));
    /// assert!(!config.is_framework_reference("Newtonsoft.Json"));
    /// ```
    #[must_use]
    pub fn is_framework_reference(&self, identity: &str) -> bool {
        self.framework_prefixes.iter().any(|prefix| {
            identity.strip_prefix(prefix.as_str()).is_some_and(|rest| {
                rest.is_empty() || rest.starts_with('.') || rest.starts_with(',')
            })
        })
    }
}

/// Configuration for discovering project files on disk.
///
/// # Examples
///
/// ```
/// use nf_core::DiscoveryConfig;
///
/// let config = DiscoveryConfig::default();
/// assert!(config.project_extensions.contains(&"csproj".to_owned()));
/// assert_eq!(config.ignore_marker, "nugetine.ignore");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Extensions (without the dot) of files treated as projects.
    pub project_extensions: Vec<String>,

    /// Directory names never descended into.
    pub skip_dirs: Vec<String>,

    /// A directory containing a file with this name is skipped with everything
    /// below it.
    pub ignore_marker: String,

    /// Whether to follow symbolic links.
    pub follow_links: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            project_extensions: vec!["csproj".to_owned(), "vbproj".to_owned(), "fsproj".to_owned()],
            skip_dirs: vec![
                "packages".to_owned(),
                "bin".to_owned(),
                "obj".to_owned(),
                ".git".to_owned(),
                ".vs".to_owned(),
            ],
            ignore_marker: "nugetine.ignore".to_owned(),
            follow_links: false,
        }
    }
}

impl DiscoveryConfig {
    /// Returns `true` if the path has one of the configured project extensions.
    #[must_use]
    pub fn is_project_file(&self, path: &Utf8Path) -> bool {
        path.extension().is_some_and(|ext| {
            self.project_extensions
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(ext))
        })
    }
}

/// Package feed configuration.
///
/// Feed URLs are opaque values: they are reported, never contacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Explicit `NuGet.Config` to read package sources from.
    ///
    /// `None` means the per-user configuration file.
    pub nuget_config: Option<Utf8PathBuf>,

    /// Sources reported when no `NuGet.Config` can be read.
    pub default_sources: BTreeMap<String, String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            nuget_config: None,
            default_sources: BTreeMap::from([(
                "main".to_owned(),
                "https://nuget.org/api/v2/".to_owned(),
            )]),
        }
    }
}

/// Root configuration for the nugetfix tool.
///
/// # Examples
///
/// ```
/// use nf_core::Config;
///
/// let config = Config::default();
/// let json = serde_json::to_string_pretty(&config).unwrap();
/// assert!(json.contains("SolutionDir"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reconciliation engine configuration.
    pub reconcile: ReconcileConfig,

    /// Project discovery configuration.
    pub discovery: DiscoveryConfig,

    /// Package feed configuration.
    pub feeds: FeedConfig,
}

impl Config {
    /// Loads and validates a configuration file.
    ///
    /// Missing sections and fields fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] if the file does not exist,
    /// [`ConfigError::Io`] if it cannot be read, [`ConfigError::Parse`] for
    /// malformed JSON, and [`ConfigError::InvalidOption`] when validation fails.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingFile(path.to_owned()));
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks option values that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for the first offending option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconcile.solution_dir_variable.trim().is_empty() {
            return Err(ConfigError::invalid_option(
                "reconcile.solution_dir_variable",
                "must not be empty",
            ));
        }
        if self.reconcile.packages_dir.trim().is_empty() {
            return Err(ConfigError::invalid_option(
                "reconcile.packages_dir",
                "must not be empty",
            ));
        }
        if self.reconcile.manifest_file.trim().is_empty() {
            return Err(ConfigError::invalid_option(
                "reconcile.manifest_file",
                "must not be empty",
            ));
        }
        if self.discovery.project_extensions.is_empty() {
            return Err(ConfigError::invalid_option(
                "discovery.project_extensions",
                "at least one extension is required",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_config_defaults() {
        let config = ReconcileConfig::default();
        assert_eq!(config.solution_dir_variable, "SolutionDir");
        assert_eq!(config.packages_dir, "packages");
        assert_eq!(config.comparison, ComparisonMode::Ordinal);
        assert!(config.strip_target_framework);
    }

    #[test]
    fn test_framework_prefix_matching() {
        let config = ReconcileConfig::default();
        assert!(config.is_framework_reference("System.Core"));
        assert!(config.is_framework_reference("System, Version=4.0.0.0"));
        assert!(config.is_framework_reference("Microsoft.CSharp"));
        assert!(!config.is_framework_reference("Microsoft.Owin"));
        assert!(!config.is_framework_reference("Systematic"));
    }

    #[test]
    fn test_discovery_is_project_file() {
        let config = DiscoveryConfig::default();
        assert!(config.is_project_file(Utf8Path::new("src/App/App.csproj")));
        assert!(config.is_project_file(Utf8Path::new("Lib.VBPROJ")));
        assert!(!config.is_project_file(Utf8Path::new("App.sln")));
        assert!(!config.is_project_file(Utf8Path::new("README")));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_deserialize_with_missing_fields() {
        let json = r#"{"reconcile": {"comparison": "numeric"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.reconcile.comparison, ComparisonMode::Numeric);
        assert_eq!(config.reconcile.packages_dir, "packages");
        assert_eq!(config.discovery.ignore_marker, "nugetine.ignore");
    }

    #[test]
    fn test_config_load_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("App.nugetfix.json")).unwrap();
        std::fs::write(&path, r#"{"discovery": {"skip_dirs": ["vendor"]}}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.discovery.skip_dirs, vec!["vendor"]);
    }

    #[test]
    fn test_config_load_missing_file() {
        let result = Config::load(Utf8Path::new("/nonexistent/App.nugetfix.json"));
        assert!(matches!(result, Err(ConfigError::MissingFile(_))));
    }

    #[test]
    fn test_config_validate_rejects_empty_packages_dir() {
        let mut config = Config::default();
        config.reconcile.packages_dir = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("packages_dir"));
    }
}
