//! The MSBuild project model.
//!
//! [`ProjectFile`] wraps one parsed project document and exposes the handful
//! of operations reconciliation needs: reading and rewriting `<Reference>`
//! items, defining the solution-relative directory property, and adding
//! items. [`ProjectCollection`] owns the loaded projects of a run and
//! provides "save all".

use std::collections::BTreeMap;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use nf_core::{MetadataEntry, ReferenceMetadata};
use nf_xml::{Element, Layout, XmlDocument};
use tracing::debug;

use crate::error::ReconcileError;

/// Guard that makes a property apply only when the build host left it unset.
fn undefined_guard(variable: &str) -> String {
    format!("$({variable}) == '' Or $({variable}) == '*Undefined*'")
}

const CODE_ANALYSIS_OPTIONS: &str = "CodeAnalysisAdditionalOptions";
const STRONG_NAME_IGNORING_VERSION: &str = "/assemblyCompareMode:StrongNameIgnoringVersion";

/// One loaded project file.
#[derive(Debug)]
pub struct ProjectFile {
    path: Utf8PathBuf,
    document: XmlDocument,
    original: String,
    modified: bool,
}

impl ProjectFile {
    /// Loads and parses a project file.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Load`] if the file cannot be read or is not
    /// well-formed XML.
    pub fn load(path: &Utf8Path) -> Result<Self, ReconcileError> {
        let document = XmlDocument::load(path).map_err(|err| ReconcileError::load(path, err))?;
        Ok(Self::from_document(path, document))
    }

    /// Wraps an already parsed document.
    #[must_use]
    pub fn from_document(path: &Utf8Path, document: XmlDocument) -> Self {
        Self {
            path: path.to_owned(),
            original: document.to_string(),
            document,
            modified: false,
        }
    }

    /// Returns the project file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the directory containing the project file.
    #[must_use]
    pub fn directory(&self) -> &Utf8Path {
        self.path.parent().unwrap_or_else(|| Utf8Path::new(""))
    }

    /// Returns the project name (the file stem).
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.file_stem().unwrap_or_else(|| self.path.as_str())
    }

    /// Returns the underlying document.
    #[inline]
    #[must_use]
    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    /// Returns every `<Reference>` item as its `Include` and metadata.
    ///
    /// Metadata is taken from the child elements in document order.
    #[must_use]
    pub fn references(&self) -> Vec<(String, ReferenceMetadata)> {
        self.document
            .root()
            .elements_named("ItemGroup")
            .flat_map(|group| group.elements_named("Reference"))
            .map(|reference| {
                let include = reference.attr("Include").unwrap_or_default().into_owned();
                (include, read_metadata(reference))
            })
            .collect()
    }

    /// Visits every `<Reference>` item mutably.
    ///
    /// The visitor returns `true` when it changed the item; the project is
    /// then marked modified. Returns whether any item changed.
    pub fn update_references(&mut self, mut visit: impl FnMut(&mut ReferenceItem<'_>) -> bool) -> bool {
        let layout = self.document.layout().clone();
        let mut changed = false;
        for group in self.document.root_mut().elements_named_mut("ItemGroup") {
            for element in group.elements_named_mut("Reference") {
                let mut item = ReferenceItem {
                    element,
                    layout: &layout,
                };
                changed |= visit(&mut item);
            }
        }
        self.modified |= changed;
        changed
    }

    /// Makes sure the solution directory property is defined for builds
    /// outside the solution.
    ///
    /// A guarded definition (`Condition="$(SolutionDir) == '' Or ..."`) gets
    /// its value corrected; an unguarded one is left alone. Without either, a
    /// guarded definition is appended to the first unconditioned
    /// `PropertyGroup`. Returns `true` if the project changed.
    pub fn ensure_solution_dir(&mut self, solution_dir: &Utf8Path, variable: &str) -> bool {
        let relative = relative_solution_dir(self.directory(), solution_dir);
        let layout = self.document.layout().clone();
        let root = self.document.root_mut();

        let mut defined = false;
        let mut changed = false;
        for group in root.elements_named_mut("PropertyGroup") {
            for property in group.elements_named_mut(variable) {
                defined = true;
                let guarded = property
                    .attr("Condition")
                    .is_some_and(|condition| condition.contains(&format!("$({variable}) == ''")));
                if guarded {
                    changed |= property.set_text(&relative);
                }
            }
        }

        if !defined {
            let property = Element::new(variable)
                .with_attr("Condition", &undefined_guard(variable))
                .with_text(&relative);
            match root.position(|e| e.is("PropertyGroup") && e.attr("Condition").is_none()) {
                Some(index) => {
                    if let Some(group) = root.element_mut(index) {
                        group.append_element(property, 1, &layout);
                    }
                }
                None => {
                    let mut group = Element::new("PropertyGroup");
                    group.append_element(property, 1, &layout);
                    root.append_element(group, 0, &layout);
                }
            }
            changed = true;
        }

        if changed {
            debug!(project = %self.path, value = %relative, "Defined solution directory");
            self.modified = true;
        }
        changed
    }

    /// Makes sure an item with the given `Include` exists.
    ///
    /// An existing item of any kind whose `Include` matches ignoring case has
    /// its casing fixed. Otherwise a `<kind Include="..." />` item is appended
    /// to the first `ItemGroup` already holding items of that kind, or to a
    /// new `ItemGroup`. Returns `true` if the project changed.
    pub fn ensure_item(&mut self, kind: &str, include: &str) -> bool {
        let layout = self.document.layout().clone();
        let root = self.document.root_mut();

        for group in root.elements_named_mut("ItemGroup") {
            for item in group.elements_mut() {
                let Some(current) = item.attr("Include").map(|value| value.into_owned()) else {
                    continue;
                };
                if current.eq_ignore_ascii_case(include) {
                    let changed = current != include && item.set_attr("Include", include);
                    self.modified |= changed;
                    return changed;
                }
            }
        }

        let item = Element::new(kind).with_attr("Include", include);
        match root.position(|e| e.is("ItemGroup") && e.child(kind).is_some()) {
            Some(index) => {
                if let Some(group) = root.element_mut(index) {
                    group.append_element(item, 1, &layout);
                }
            }
            None => {
                let mut group = Element::new("ItemGroup");
                group.append_element(item, 1, &layout);
                root.append_element(group, 0, &layout);
            }
        }
        debug!(project = %self.path, kind, include, "Added project item");
        self.modified = true;
        true
    }

    /// Adds the strong-name-ignoring-version option to every property group
    /// that runs code analysis. Returns `true` if the project changed.
    pub fn fix_code_analysis(&mut self) -> bool {
        let mut changed = false;
        for group in self.document.root_mut().elements_named_mut("PropertyGroup") {
            if group.child(CODE_ANALYSIS_OPTIONS).is_some() {
                continue;
            }
            let runs = group.position(|e| {
                e.is("RunCodeAnalysis") && e.text().trim().eq_ignore_ascii_case("true")
            });
            if let Some(index) = runs {
                let option = Element::new(CODE_ANALYSIS_OPTIONS).with_text(STRONG_NAME_IGNORING_VERSION);
                group.insert_element_after(index, option);
                changed = true;
            }
        }
        self.modified |= changed;
        changed
    }

    /// Marks the project as needing a save.
    #[inline]
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// Returns `true` if a mutation was applied since loading.
    #[inline]
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    /// Writes the project back when it was modified and its text changed.
    ///
    /// Returns `true` if the file was written.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Document`] if the file cannot be written.
    pub fn save(&mut self) -> Result<bool, ReconcileError> {
        if !self.modified {
            return Ok(false);
        }
        let text = self.document.to_string();
        self.modified = false;
        if text == self.original {
            return Ok(false);
        }
        self.document
            .save(&self.path)
            .map_err(|err| ReconcileError::document(&self.path, err))?;
        debug!(project = %self.path, "Saved project");
        self.original = text;
        Ok(true)
    }
}

fn read_metadata(reference: &Element) -> ReferenceMetadata {
    reference
        .elements()
        .map(|child| MetadataEntry::new(child.local_name(), child.text()))
        .collect()
}

/// Computes the `SolutionDir` value for a project: a `..\` chain from the
/// project directory to the solution directory, with a trailing separator.
///
/// Falls back to the absolute solution directory when the two paths share
/// no root.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use nf_reconcile::relative_solution_dir;
///
/// let sln = Utf8Path::new("/src/App");
/// assert_eq!(relative_solution_dir(Utf8Path::new("/src/App/Web/Site"), sln), r"..\..\");
/// assert_eq!(relative_solution_dir(Utf8Path::new("/src/App"), sln), r".\");
/// assert_eq!(relative_solution_dir(Utf8Path::new("/src/Shared"), sln), r"..\App\");
/// ```
#[must_use]
pub fn relative_solution_dir(project_dir: &Utf8Path, solution_dir: &Utf8Path) -> String {
    let project_dir = normalize_path(project_dir);
    let solution_dir = normalize_path(solution_dir);
    let project: Vec<Utf8Component<'_>> = project_dir.components().collect();
    let solution: Vec<Utf8Component<'_>> = solution_dir.components().collect();
    let common = project.iter().zip(&solution).take_while(|(a, b)| a == b).count();

    let ups = &project[common..];
    let downs = &solution[common..];
    let portable = ups
        .iter()
        .chain(downs)
        .all(|component| matches!(component, Utf8Component::Normal(_)));
    if common == 0 || !portable {
        let mut absolute = solution_dir.as_str().trim_end_matches(['/', '\\']).to_owned();
        absolute.push('\\');
        return absolute;
    }
    if ups.is_empty() && downs.is_empty() {
        return ".\\".to_owned();
    }

    let mut relative = "..\\".repeat(ups.len());
    for component in downs {
        relative.push_str(component.as_str());
        relative.push('\\');
    }
    relative
}

/// Removes `.` components and folds `dir/..` pairs without touching the
/// filesystem.
///
/// Leading `..` components of a relative path are kept.
pub(crate) fn normalize_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut parts: Vec<Utf8Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => match parts.last() {
                Some(Utf8Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Utf8Component::RootDir | Utf8Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            _ => parts.push(component),
        }
    }
    parts.iter().collect()
}

/// A mutable view of one `<Reference>` item.
///
/// Metadata children sit at depth 3 (`Project > ItemGroup > Reference > *`).
#[derive(Debug)]
pub struct ReferenceItem<'a> {
    element: &'a mut Element,
    layout: &'a Layout,
}

impl ReferenceItem<'_> {
    const DEPTH: usize = 2;

    /// Returns the declared identity.
    #[must_use]
    pub fn include(&self) -> String {
        self.element.attr("Include").unwrap_or_default().into_owned()
    }

    /// Replaces the declared identity. Returns `true` if it changed.
    pub fn set_include(&mut self, include: &str) -> bool {
        self.element.set_attr("Include", include)
    }

    /// Returns a snapshot of the metadata children.
    #[must_use]
    pub fn metadata(&self) -> ReferenceMetadata {
        read_metadata(self.element)
    }

    /// Sets one metadata child, creating it when missing.
    ///
    /// Returns `true` if the document changed.
    pub fn set_metadata(&mut self, name: &str, value: &str) -> bool {
        if let Some(child) = self
            .element
            .elements_mut()
            .find(|child| child.local_name().eq_ignore_ascii_case(name))
        {
            return child.set_text(value);
        }
        let child = Element::new(name).with_text(value);
        self.element.append_element(child, Self::DEPTH, self.layout);
        true
    }

    /// Makes the metadata children equal to the snapshot.
    ///
    /// Snapshot entries are written in place or appended; children missing
    /// from the snapshot are removed. Returns `true` if the document changed.
    pub fn replace_metadata(&mut self, snapshot: &ReferenceMetadata) -> bool {
        let mut changed = false;
        for entry in snapshot.iter() {
            changed |= self.set_metadata(&entry.name, &entry.value);
        }
        changed
            | (self
                .element
                .retain_elements(|child| snapshot.get(child.local_name()).is_some())
                > 0)
    }
}

/// The projects loaded during a run.
///
/// In read-only mode nothing is ever written back.
#[derive(Debug, Default)]
pub struct ProjectCollection {
    loaded: BTreeMap<Utf8PathBuf, ProjectFile>,
    read_only: bool,
}

impl ProjectCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collection that never saves.
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            loaded: BTreeMap::new(),
            read_only: true,
        }
    }

    /// Loads a project, replacing any previously loaded copy.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Load`] if the project cannot be parsed.
    pub fn load(&mut self, path: &Utf8Path) -> Result<&mut ProjectFile, ReconcileError> {
        let project = ProjectFile::load(path)?;
        self.loaded.insert(path.to_owned(), project);
        self.loaded
            .get_mut(path)
            .ok_or_else(|| ReconcileError::solution(path, "project vanished after loading"))
    }

    /// Unloads a project, discarding unsaved changes.
    pub fn unload(&mut self, path: &Utf8Path) -> Option<ProjectFile> {
        self.loaded.remove(path)
    }

    /// Saves every loaded project that was modified.
    ///
    /// Returns the paths written.
    ///
    /// # Errors
    ///
    /// Returns the first write failure.
    pub fn save_all(&mut self) -> Result<Vec<Utf8PathBuf>, ReconcileError> {
        if self.read_only {
            return Ok(Vec::new());
        }
        let mut written = Vec::new();
        for (path, project) in &mut self.loaded {
            if project.save()? {
                written.push(path.clone());
            }
        }
        Ok(written)
    }

    /// Unloads every project.
    pub fn unload_all(&mut self) {
        self.loaded.clear();
    }

    /// Returns `true` if saving is disabled.
    #[inline]
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns the number of loaded projects.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    /// Returns `true` if nothing is loaded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}
