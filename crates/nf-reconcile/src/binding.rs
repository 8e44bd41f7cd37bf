//! Assembly binding redirect synchronization.
//!
//! Each project directory gets one application config file: `Web.config` when
//! a web config exists, `App.config` otherwise. Its
//! `configuration/runtime/assemblyBinding` section ends up holding exactly one
//! `dependentAssembly` block per registry record the project references:
//!
//! ```xml
//! <dependentAssembly>
//!   <assemblyIdentity name="Newtonsoft.Json" publicKeyToken="30ad4fe6b2a6aeed" culture="neutral" />
//!   <bindingRedirect oldVersion="0.0.0.0-65535.65535.65535.65535" newVersion="6.0.0.0" />
//! </dependentAssembly>
//! ```
//!
//! Blocks for assemblies the registry does not know are kept, with their
//! `oldVersion` upper bound widened. Everything outside the blocks is left
//! as written.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use nf_core::ReferenceKey;
use nf_xml::{Element, Layout, XmlDocument};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::error::ReconcileError;
use crate::registry::Registry;

/// Upper bound of every normalized `oldVersion` range.
pub const MAX_ASSEMBLY_VERSION: &str = "65535.65535.65535.65535";

const ASSEMBLY_BINDING_NAMESPACE: &str = "urn:schemas-microsoft-com:asm.v1";

const EMPTY_CONFIG: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<configuration>\n  <runtime>\n  </runtime>\n</configuration>\n";

/// Which application config file a project uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    /// `App.config`, included as a `None` item.
    App,
    /// `Web.config`, included as a `Content` item.
    Web,
}

impl ConfigKind {
    /// Returns the canonically cased file name.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::App => "App.config",
            Self::Web => "Web.config",
        }
    }

    /// Returns the project item kind the file is included as.
    #[must_use]
    pub const fn item_kind(self) -> &'static str {
        match self {
            Self::App => "None",
            Self::Web => "Content",
        }
    }
}

/// Result of synchronizing one project's binding redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingOutcome {
    /// The config file was renamed, created, or rewritten.
    pub modified: bool,
    /// The config file kind in use.
    pub kind: ConfigKind,
    /// The config file, when one exists after synchronization.
    pub config_file: Option<Utf8PathBuf>,
    /// The file was renamed to its canonical casing.
    pub renamed: bool,
    /// The file did not exist and was written from the empty template.
    pub created: bool,
    /// Number of blocks synthesized from the registry.
    pub blocks_added: usize,
    /// Number of duplicate blocks dropped.
    pub duplicates_removed: usize,
}

impl BindingOutcome {
    /// Returns `true` if the project must include the config file.
    #[inline]
    #[must_use]
    pub const fn needs_project_item(&self) -> bool {
        self.renamed || self.created
    }
}

/// Changes applied to a config document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentChanges {
    /// Whether anything changed.
    pub modified: bool,
    /// Number of blocks synthesized from the registry.
    pub blocks_added: usize,
    /// Number of duplicate blocks dropped.
    pub duplicates_removed: usize,
}

/// Rewrites binding redirects against the registry.
#[derive(Debug)]
pub struct BindingRedirectSynchronizer<'a> {
    registry: &'a Registry,
}

impl<'a> BindingRedirectSynchronizer<'a> {
    /// Creates a synchronizer reading versions from `registry`.
    #[must_use]
    pub const fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Synchronizes the config file of a project directory.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Io`] if the directory cannot be listed or the
    /// file cannot be renamed, and [`ReconcileError::Document`] if the file
    /// cannot be parsed or written.
    pub fn synchronize(&self, project_dir: &Utf8Path) -> Result<BindingOutcome, ReconcileError> {
        let (kind, existing) = locate_config(project_dir)?;
        let path = project_dir.join(kind.file_name());

        let mut renamed = false;
        if let Some(existing) = &existing {
            if *existing != path {
                fs::rename(existing, &path).map_err(|err| ReconcileError::io(existing, err))?;
                debug!(from = %existing, to = %path, "Renamed config file");
                renamed = true;
            }
        }

        let mut document = if existing.is_some() {
            XmlDocument::load(&path).map_err(|err| ReconcileError::document(&path, err))?
        } else {
            XmlDocument::parse(EMPTY_CONFIG).map_err(|err| ReconcileError::document(&path, err))?
        };

        let changes = self.synchronize_document(&mut document, project_dir);
        if changes.modified {
            document
                .save(&path)
                .map_err(|err| ReconcileError::document(&path, err))?;
            debug!(
                config = %path,
                added = changes.blocks_added,
                duplicates = changes.duplicates_removed,
                "Saved binding redirects"
            );
        }

        let created = existing.is_none() && changes.modified;
        Ok(BindingOutcome {
            modified: renamed || changes.modified,
            kind,
            config_file: (existing.is_some() || created).then_some(path),
            renamed,
            created,
            blocks_added: changes.blocks_added,
            duplicates_removed: changes.duplicates_removed,
        })
    }

    /// Applies the block rewrite to a parsed config document.
    pub fn synchronize_document(&self, document: &mut XmlDocument, project_dir: &Utf8Path) -> DocumentChanges {
        let layout = document.layout().clone();
        let root = document.root_mut();
        let mut changes = DocumentChanges::default();
        let mut seen: FxHashSet<ReferenceKey> = FxHashSet::default();

        for runtime in root.elements_named_mut("runtime") {
            for binding in runtime.elements_named_mut("assemblyBinding") {
                changes.duplicates_removed += binding.retain_elements(|block| {
                    !block.is("dependentAssembly")
                        || block_name(block).is_none_or(|name| seen.insert(ReferenceKey::from_include(&name)))
                });
                for block in binding.elements_named_mut("dependentAssembly") {
                    changes.modified |= self.update_block(block);
                }
            }
        }
        changes.modified |= changes.duplicates_removed > 0;

        let missing: Vec<Element> = self
            .registry
            .records_referenced_by(project_dir)
            .into_iter()
            .filter(|(key, _)| !seen.contains(*key))
            .map(|(key, record)| {
                redirect_block(key.as_str(), record.public_token(), record.version_str(), &layout)
            })
            .collect();
        if missing.is_empty() {
            return changes;
        }

        let Some(binding) = root
            .ensure_child("runtime", 0, &layout)
            .and_then(|runtime| runtime.ensure_child("assemblyBinding", 1, &layout))
        else {
            return changes;
        };
        if binding.attr("xmlns").is_none() {
            binding.set_attr("xmlns", ASSEMBLY_BINDING_NAMESPACE);
        }
        changes.blocks_added = missing.len();
        for block in missing {
            binding.append_element(block, 2, &layout);
        }
        changes.modified = true;
        changes
    }

    /// Widens the `oldVersion` range and raises `newVersion` of one block.
    fn update_block(&self, block: &mut Element) -> bool {
        let name = block_name(block);
        let newest = name
            .as_deref()
            .and_then(|name| self.registry.lookup_name(name))
            .and_then(|record| record.version.clone());

        let mut changed = false;
        for redirect in block.elements_named_mut("bindingRedirect") {
            if let Some(old) = redirect.attr("oldVersion").map(|old| old.into_owned()) {
                changed |= redirect.set_attr("oldVersion", &widen_old_version(&old));
            }
            if let Some(newest) = &newest {
                let current = redirect.attr("newVersion").unwrap_or_default().into_owned();
                if self.registry.is_newer(newest, &current) {
                    changed |= redirect.set_attr("newVersion", newest);
                }
            }
        }
        changed
    }
}

/// Finds the config file of a project directory, ignoring case.
///
/// A web config wins over an app config.
fn locate_config(project_dir: &Utf8Path) -> Result<(ConfigKind, Option<Utf8PathBuf>), ReconcileError> {
    let entries = fs::read_dir(project_dir).map_err(|err| ReconcileError::io(project_dir, err))?;
    let mut app = None;
    let mut web = None;
    for entry in entries {
        let entry = entry.map_err(|err| ReconcileError::io(project_dir, err))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.eq_ignore_ascii_case(ConfigKind::Web.file_name()) {
            web = Some(project_dir.join(name));
        } else if name.eq_ignore_ascii_case(ConfigKind::App.file_name()) {
            app = Some(project_dir.join(name));
        }
    }
    Ok(match (web, app) {
        (Some(web), _) => (ConfigKind::Web, Some(web)),
        (None, app) => (ConfigKind::App, app),
    })
}

fn block_name(block: &Element) -> Option<String> {
    block
        .child("assemblyIdentity")
        .and_then(|identity| identity.attr("name"))
        .map(|name| name.into_owned())
}

fn redirect_block(name: &str, token: Option<&str>, version: &str, layout: &Layout) -> Element {
    let mut identity = Element::new("assemblyIdentity").with_attr("name", name);
    if let Some(token) = token {
        identity.set_attr("publicKeyToken", token);
    }
    identity.set_attr("culture", "neutral");

    let redirect = Element::new("bindingRedirect")
        .with_attr("oldVersion", &format!("0.0.0.0-{MAX_ASSEMBLY_VERSION}"))
        .with_attr("newVersion", version);

    let mut block = Element::new("dependentAssembly");
    block.append_element(identity, 3, layout);
    block.append_element(redirect, 3, layout);
    block
}

/// Widens an `oldVersion` value to end at [`MAX_ASSEMBLY_VERSION`].
///
/// The lower bound is kept; a single version becomes the lower bound.
///
/// # Examples
///
/// ```
/// use nf_reconcile::widen_old_version;
///
/// assert_eq!(widen_old_version("0.0.0.0-4.5.0.0"), "0.0.0.0-65535.65535.65535.65535");
/// assert_eq!(widen_old_version("1.0.0.0"), "1.0.0.0-65535.65535.65535.65535");
/// ```
#[must_use]
pub fn widen_old_version(old_version: &str) -> String {
    let lower = old_version
        .split_once('-')
        .map_or(old_version, |(lower, _)| lower)
        .trim();
    let lower = if lower.is_empty() { "0.0.0.0" } else { lower };
    format!("{lower}-{MAX_ASSEMBLY_VERSION}")
}

#[cfg(test)]
mod tests {
    use nf_core::{AssemblyAttributes, ComparisonMode, ReconcileConfig, ReferenceKey, ReferenceMetadata};
    use rstest::rstest;

    use super::*;
    use crate::assembly::{AssemblyClassifier, HintPathResolver};
    use crate::error::ClassifyError;
    use crate::extractor::ReferenceExtractor;

    #[derive(Debug)]
    struct FixedToken;

    impl AssemblyClassifier for FixedToken {
        fn classify(&self, _path: &Utf8Path) -> Result<AssemblyAttributes, ClassifyError> {
            Ok(AssemblyAttributes::new("Newtonsoft.Json", "6.0.0.0", Some("30ad4fe6b2a6aeed".to_owned())))
        }
    }

    fn registry(project_dir: &Utf8Path, entries: &[(&str, &str)]) -> Registry {
        let extractor = ReferenceExtractor::new(&ReconcileConfig::default()).unwrap();
        let mut registry = Registry::with_mode(ComparisonMode::Ordinal);
        for (package, version) in entries {
            let mut metadata = ReferenceMetadata::new();
            metadata.set("HintPath", format!(r"..\packages\{package}.{version}\lib\{package}.dll"));
            registry.observe(&extractor.extract(package, &metadata).unwrap(), project_dir);
        }
        registry
    }

    fn project_dir(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8Path::from_path(dir.path()).unwrap().to_owned()
    }

    #[rstest]
    #[case("0.0.0.0-6.0.0.0", "0.0.0.0-65535.65535.65535.65535")]
    #[case("1.0.0.0-1.5.0.0", "1.0.0.0-65535.65535.65535.65535")]
    #[case("2.0.0.0", "2.0.0.0-65535.65535.65535.65535")]
    #[case("0.0.0.0-65535.65535.65535.65535", "0.0.0.0-65535.65535.65535.65535")]
    #[case("", "0.0.0.0-65535.65535.65535.65535")]
    fn test_widen_old_version(#[case] old: &str, #[case] expected: &str) {
        assert_eq!(widen_old_version(old), expected);
    }

    #[test]
    fn test_creates_app_config_from_template() {
        let dir = tempfile::TempDir::new().unwrap();
        let project_dir = project_dir(&dir);
        let mut registry = registry(&project_dir, &[("Newtonsoft.Json", "6.0.0.0"), ("Local.Lib", "1.0")]);
        let resolver = HintPathResolver::new(&project_dir, "SolutionDir");
        registry
            .resolve_assembly_attributes(&ReferenceKey::from_include("Newtonsoft.Json"), &FixedToken, &resolver)
            .unwrap();

        let outcome = BindingRedirectSynchronizer::new(&registry)
            .synchronize(&project_dir)
            .unwrap();
        assert!(outcome.modified);
        assert!(outcome.created);
        assert!(outcome.needs_project_item());
        assert_eq!(outcome.kind, ConfigKind::App);
        assert_eq!(outcome.blocks_added, 2);

        let written = fs::read_to_string(project_dir.join("App.config")).unwrap();
        insta::assert_snapshot!(written, @r#"
        <?xml version="1.0" encoding="utf-8"?>
        <configuration>
          <runtime>
            <assemblyBinding xmlns="urn:schemas-microsoft-com:asm.v1">
              <dependentAssembly>
                <assemblyIdentity name="Local.Lib" culture="neutral" />
                <bindingRedirect oldVersion="0.0.0.0-65535.65535.65535.65535" newVersion="1.0" />
              </dependentAssembly>
              <dependentAssembly>
                <assemblyIdentity name="Newtonsoft.Json" publicKeyToken="30ad4fe6b2a6aeed" culture="neutral" />
                <bindingRedirect oldVersion="0.0.0.0-65535.65535.65535.65535" newVersion="6.0.0.0" />
              </dependentAssembly>
            </assemblyBinding>
          </runtime>
        </configuration>
        "#);

        // Idempotent.
        let again = BindingRedirectSynchronizer::new(&registry)
            .synchronize(&project_dir)
            .unwrap();
        assert!(!again.modified);
        assert!(!again.needs_project_item());
    }

    #[test]
    fn test_nothing_referenced_writes_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let project_dir = project_dir(&dir);
        let registry = registry(Utf8Path::new("/elsewhere"), &[("Foo", "1.0")]);

        let outcome = BindingRedirectSynchronizer::new(&registry)
            .synchronize(&project_dir)
            .unwrap();
        assert!(!outcome.modified);
        assert!(outcome.config_file.is_none());
        assert!(!project_dir.join("App.config").exists());
    }

    #[test]
    fn test_existing_blocks_are_updated_and_deduplicated() {
        let source = r#"<?xml version="1.0" encoding="utf-8"?>
<configuration>
  <appSettings>
    <add key="mode" value="test" />
  </appSettings>
  <runtime>
    <assemblyBinding xmlns="urn:schemas-microsoft-com:asm.v1">
      <dependentAssembly>
        <assemblyIdentity name="Newtonsoft.Json" publicKeyToken="30ad4fe6b2a6aeed" culture="neutral" />
        <bindingRedirect oldVersion="0.0.0.0-4.5.0.0" newVersion="4.5.0.0" />
      </dependentAssembly>
      <dependentAssembly>
        <assemblyIdentity name="newtonsoft.json" publicKeyToken="30ad4fe6b2a6aeed" culture="neutral" />
        <bindingRedirect oldVersion="0.0.0.0-5.0.0.0" newVersion="5.0.0.0" />
      </dependentAssembly>
      <dependentAssembly>
        <assemblyIdentity name="System.Web.Mvc" publicKeyToken="31bf3856ad364e35" />
        <bindingRedirect oldVersion="1.0.0.0" newVersion="3.0.0.0" />
      </dependentAssembly>
    </assemblyBinding>
  </runtime>
</configuration>
"#;
        let dir = tempfile::TempDir::new().unwrap();
        let project_dir = project_dir(&dir);
        fs::write(project_dir.join("web.config"), source).unwrap();
        fs::write(project_dir.join("App.config"), EMPTY_CONFIG).unwrap();
        let registry = registry(&project_dir, &[("Newtonsoft.Json", "6.0.0.0")]);

        let outcome = BindingRedirectSynchronizer::new(&registry)
            .synchronize(&project_dir)
            .unwrap();
        assert_eq!(outcome.kind, ConfigKind::Web);
        assert!(outcome.renamed);
        assert!(!outcome.created);
        assert_eq!(outcome.duplicates_removed, 1);
        assert_eq!(outcome.blocks_added, 0);
        assert_eq!(outcome.config_file, Some(project_dir.join("Web.config")));

        let written = fs::read_to_string(project_dir.join("Web.config")).unwrap();
        insta::assert_snapshot!(written, @r#"
        <?xml version="1.0" encoding="utf-8"?>
        <configuration>
          <appSettings>
            <add key="mode" value="test" />
          </appSettings>
          <runtime>
            <assemblyBinding xmlns="urn:schemas-microsoft-com:asm.v1">
              <dependentAssembly>
                <assemblyIdentity name="Newtonsoft.Json" publicKeyToken="30ad4fe6b2a6aeed" culture="neutral" />
                <bindingRedirect oldVersion="0.0.0.0-65535.65535.65535.65535" newVersion="6.0.0.0" />
              </dependentAssembly>
              <dependentAssembly>
                <assemblyIdentity name="System.Web.Mvc" publicKeyToken="31bf3856ad364e35" />
                <bindingRedirect oldVersion="1.0.0.0-65535.65535.65535.65535" newVersion="3.0.0.0" />
              </dependentAssembly>
            </assemblyBinding>
          </runtime>
        </configuration>
        "#);
        // The app config is not touched when a web config exists.
        assert_eq!(fs::read_to_string(project_dir.join("App.config")).unwrap(), EMPTY_CONFIG);
    }

    #[test]
    fn test_runtime_section_created_when_missing() {
        let mut document = XmlDocument::parse("<configuration>\n  <appSettings />\n</configuration>").unwrap();
        let project_dir = Utf8Path::new("/sln/A");
        let registry = registry(project_dir, &[("Foo", "2.0")]);

        let changes = BindingRedirectSynchronizer::new(&registry).synchronize_document(&mut document, project_dir);
        assert_eq!(changes.blocks_added, 1);
        assert_eq!(
            document.to_string(),
            "<configuration>\n  <appSettings />\n  <runtime>\n    <assemblyBinding xmlns=\"urn:schemas-microsoft-com:asm.v1\">\n      <dependentAssembly>\n        <assemblyIdentity name=\"Foo\" culture=\"neutral\" />\n        <bindingRedirect oldVersion=\"0.0.0.0-65535.65535.65535.65535\" newVersion=\"2.0\" />\n      </dependentAssembly>\n    </assemblyBinding>\n  </runtime>\n</configuration>"
        );
    }
}
