//! Directory traversal for project discovery.
//!
//! This module provides [`ProjectWalker`], which uses the `ignore` crate to
//! walk a solution directory while respecting `.gitignore` patterns.
//!
//! # Features
//!
//! - Respects `.gitignore` and `.ignore` patterns
//! - Filters for project files by extension (`.csproj`, `.vbproj`, `.fsproj`)
//! - Skips hidden directories, configured directory names, and every
//!   directory holding the ignore marker file (plus its descendants)
//! - Converts paths to UTF-8 [`Utf8PathBuf`]
//!
//! # Examples
//!
//! ```no_run
//! use camino::Utf8Path;
//! use nf_core::DiscoveryConfig;
//! use nf_reconcile::ProjectWalker;
//!
//! let walker = ProjectWalker::from_config(Utf8Path::new("./src"), &DiscoveryConfig::default())?;
//! for path in walker.collect_projects()? {
//!     println!("Found: {path}");
//! }
//! # Ok::<(), nf_reconcile::ReconcileError>(())
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use ignore::WalkBuilder;
use nf_core::DiscoveryConfig;

use crate::error::ReconcileError;

/// A walker that discovers files below a solution directory.
#[derive(Debug, Clone)]
pub struct ProjectWalker {
    /// The root directory to walk.
    root: Utf8PathBuf,
    /// Project file extensions, compared case-insensitively.
    extensions: Vec<String>,
    /// Directory names to skip (beyond standard filters).
    skip_dirs: Vec<String>,
    /// A file whose presence excludes its directory.
    ignore_marker: Option<String>,
    /// Whether to follow symbolic links.
    follow_links: bool,
}

impl ProjectWalker {
    /// Creates a new walker for the given root directory.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Solution`] if the root path doesn't exist or
    /// isn't a directory.
    pub fn new(root: &Utf8Path) -> Result<Self, ReconcileError> {
        if !root.is_dir() {
            return Err(ReconcileError::solution(root, "not a directory"));
        }

        Ok(Self {
            root: root.to_owned(),
            extensions: Vec::new(),
            skip_dirs: Vec::new(),
            ignore_marker: None,
            follow_links: false,
        })
    }

    /// Creates a walker configured from the discovery settings.
    ///
    /// # Errors
    ///
    /// See [`ProjectWalker::new`].
    pub fn from_config(root: &Utf8Path, config: &DiscoveryConfig) -> Result<Self, ReconcileError> {
        let extensions: Vec<&str> = config.project_extensions.iter().map(String::as_str).collect();
        let skip_dirs: Vec<&str> = config.skip_dirs.iter().map(String::as_str).collect();
        Ok(Self::new(root)?
            .with_extensions(&extensions)
            .with_skip_dirs(&skip_dirs)
            .with_ignore_marker(&config.ignore_marker)
            .with_follow_links(config.follow_links))
    }

    /// Adds project file extensions to collect.
    #[must_use]
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions.extend(
            extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_owned()),
        );
        self
    }

    /// Adds directory names to skip during traversal.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use camino::Utf8Path;
    /// # use nf_reconcile::ProjectWalker;
    /// let walker = ProjectWalker::new(Utf8Path::new("."))?
    ///     .with_skip_dirs(&["packages", "bin", "obj"]);
    /// # Ok::<(), nf_reconcile::ReconcileError>(())
    /// ```
    #[must_use]
    pub fn with_skip_dirs(mut self, dirs: &[&str]) -> Self {
        self.skip_dirs.extend(dirs.iter().map(ToString::to_string));
        self
    }

    /// Sets the marker file that excludes a directory and its descendants.
    ///
    /// An empty name disables the marker.
    #[must_use]
    pub fn with_ignore_marker(mut self, marker: &str) -> Self {
        self.ignore_marker = (!marker.is_empty()).then(|| marker.to_owned());
        self
    }

    /// Configures whether to follow symbolic links.
    ///
    /// By default, symbolic links are not followed.
    #[must_use]
    pub const fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Collects every project file in the directory tree, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Walk`] if directory traversal fails.
    /// Returns [`ReconcileError::NonUtf8Path`] if a non-UTF-8 path is encountered.
    pub fn collect_projects(&self) -> Result<Vec<Utf8PathBuf>, ReconcileError> {
        self.collect_matching(|path| self.is_project_file(path))
    }

    /// Collects every file accepted by the predicate, sorted.
    ///
    /// # Errors
    ///
    /// See [`ProjectWalker::collect_projects`].
    pub fn collect_matching(
        &self,
        mut accept: impl FnMut(&Utf8Path) -> bool,
    ) -> Result<Vec<Utf8PathBuf>, ReconcileError> {
        if self.is_marked(&self.root) {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for result in self.build_walker() {
            let entry = result?;

            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.path();
            let utf8_path = Utf8Path::from_path(path)
                .ok_or_else(|| ReconcileError::NonUtf8Path(path.to_owned()))?;

            if self.should_skip_path(utf8_path) || !accept(utf8_path) {
                continue;
            }

            paths.push(utf8_path.to_owned());
        }

        paths.sort();
        Ok(paths)
    }

    /// Builds the ignore walker with configured settings.
    fn build_walker(&self) -> ignore::Walk {
        let mut builder = WalkBuilder::new(&self.root);
        builder
            // Enable standard filters (.gitignore, .ignore, hidden files)
            .standard_filters(true)
            .follow_links(self.follow_links)
            .threads(1)
            // Don't require the root to be a git repo
            .require_git(false);

        if let Some(marker) = self.ignore_marker.clone() {
            builder.filter_entry(move |entry| {
                !(entry.file_type().is_some_and(|ft| ft.is_dir())
                    && entry.path().join(&marker).is_file())
            });
        }
        builder.build()
    }

    fn is_marked(&self, dir: &Utf8Path) -> bool {
        self.ignore_marker
            .as_ref()
            .is_some_and(|marker| dir.join(marker).is_file())
    }

    /// Checks if a path is a project file based on extension.
    fn is_project_file(&self, path: &Utf8Path) -> bool {
        path.extension().is_some_and(|ext| {
            self.extensions
                .iter()
                .any(|wanted| wanted.eq_ignore_ascii_case(ext))
        })
    }

    /// Checks if a path lies below a skipped directory name.
    fn should_skip_path(&self, path: &Utf8Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let Some(parent) = relative.parent() else {
            return false;
        };
        parent.components().any(|component| {
            self.skip_dirs
                .iter()
                .any(|dir| dir.eq_ignore_ascii_case(component.as_str()))
        })
    }

    /// Returns the root directory being walked.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn walker(skip_dirs: &[&str]) -> ProjectWalker {
        ProjectWalker {
            root: Utf8PathBuf::from("/sln"),
            extensions: vec!["csproj".to_owned(), "vbproj".to_owned()],
            skip_dirs: skip_dirs.iter().map(ToString::to_string).collect(),
            ignore_marker: None,
            follow_links: false,
        }
    }

    fn touch(root: &Utf8Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<Project />").unwrap();
    }

    #[test]
    fn test_is_project_file() {
        let walker = walker(&[]);
        assert!(walker.is_project_file(Utf8Path::new("A/A.csproj")));
        assert!(walker.is_project_file(Utf8Path::new("B/B.VBPROJ")));
        assert!(!walker.is_project_file(Utf8Path::new("A/App.config")));
        assert!(!walker.is_project_file(Utf8Path::new("A/csproj")));
    }

    #[test]
    fn test_should_skip_path() {
        let walker = walker(&["packages", "bin"]);
        assert!(walker.should_skip_path(Utf8Path::new("/sln/packages/Foo/Foo.csproj")));
        assert!(walker.should_skip_path(Utf8Path::new("/sln/A/Bin/A.csproj")));
        assert!(!walker.should_skip_path(Utf8Path::new("/sln/A/A.csproj")));
        assert!(!walker.should_skip_path(Utf8Path::new("/sln/packages.csproj")));
    }

    #[test]
    fn test_with_builders() {
        let walker = walker(&[])
            .with_extensions(&[".fsproj"])
            .with_skip_dirs(&["obj"])
            .with_ignore_marker("")
            .with_follow_links(true);

        assert!(walker.extensions.contains(&"fsproj".to_owned()));
        assert!(walker.skip_dirs.contains(&"obj".to_owned()));
        assert!(walker.ignore_marker.is_none());
        assert!(walker.follow_links);
    }

    #[test]
    fn test_collect_projects_honours_marker_and_skip_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        touch(root, "B/B.csproj");
        touch(root, "A/A.csproj");
        touch(root, "packages/Foo.1.0/Foo.csproj");
        touch(root, "Legacy/Old.csproj");
        touch(root, "Legacy/Deep/Older.csproj");
        fs::write(root.join("Legacy/nugetine.ignore"), "").unwrap();

        let paths = ProjectWalker::from_config(root, &DiscoveryConfig::default())
            .unwrap()
            .collect_projects()
            .unwrap();

        assert_eq!(paths, vec![root.join("A/A.csproj"), root.join("B/B.csproj")]);
    }

    #[test]
    fn test_marked_root_yields_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        touch(root, "A/A.csproj");
        fs::write(root.join("nugetine.ignore"), "").unwrap();

        let walker = ProjectWalker::from_config(root, &DiscoveryConfig::default()).unwrap();
        assert!(walker.collect_projects().unwrap().is_empty());
    }

    #[test]
    fn test_new_rejects_missing_root() {
        assert!(ProjectWalker::new(Utf8Path::new("/nonexistent/solution")).is_err());
    }
}
