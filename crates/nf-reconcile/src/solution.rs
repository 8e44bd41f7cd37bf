//! Solution input: `.sln` parsing and on-disk discovery.

use camino::{Utf8Path, Utf8PathBuf};
use nf_core::DiscoveryConfig;
use regex::Regex;
use tracing::debug;

use crate::error::ReconcileError;
use crate::project::normalize_path;
use crate::walker::ProjectWalker;

/// `Project("{type}") = "Name", "relative\path.csproj", "{guid}"`
const PROJECT_LINE_PATTERN: &str =
    r#"(?m)^\s*Project\("\{[^}]+\}"\)\s*=\s*"([^"]*)"\s*,\s*"([^"]*)"\s*,\s*"\{[^}]*\}""#;

/// One project of a solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectEntry {
    /// Display name.
    pub name: String,
    /// Project file path.
    pub path: Utf8PathBuf,
}

/// The ordered projects of a solution.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use nf_core::DiscoveryConfig;
/// use nf_reconcile::Solution;
///
/// let sln = r#"
/// Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Web", "src\Web\Web.csproj", "{11111111-1111-1111-1111-111111111111}"
/// EndProject
/// Project("{2150E333-8FDC-42A3-9474-1A3956D46DE8}") = "Docs", "Docs", "{22222222-2222-2222-2222-222222222222}"
/// EndProject
/// "#;
/// let solution = Solution::parse(Utf8Path::new("/repo/App.sln"), sln, &DiscoveryConfig::default())?;
/// assert_eq!(solution.name(), "App");
/// assert_eq!(solution.projects().len(), 1);
/// assert_eq!(solution.projects()[0].path, Utf8Path::new("/repo/src/Web/Web.csproj"));
/// # Ok::<(), nf_reconcile::ReconcileError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Solution {
    path: Option<Utf8PathBuf>,
    dir: Utf8PathBuf,
    projects: Vec<ProjectEntry>,
}

impl Solution {
    /// Loads the projects listed in a `.sln` file.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Io`] if the file cannot be read.
    pub fn load(path: &Utf8Path, config: &DiscoveryConfig) -> Result<Self, ReconcileError> {
        let contents = std::fs::read_to_string(path).map_err(|err| ReconcileError::io(path, err))?;
        Self::parse(path, &contents, config)
    }

    /// Parses the text of a `.sln` file located at `path`.
    ///
    /// Only entries whose file has a configured project extension are kept;
    /// solution folders and other item types are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Pattern`] if the entry pattern fails to compile.
    pub fn parse(path: &Utf8Path, contents: &str, config: &DiscoveryConfig) -> Result<Self, ReconcileError> {
        let dir = parent_dir(path);
        let pattern = Regex::new(PROJECT_LINE_PATTERN)?;
        let projects: Vec<ProjectEntry> = pattern
            .captures_iter(contents)
            .filter_map(|captures| {
                let name = captures.get(1)?.as_str();
                let relative = captures.get(2)?.as_str().replace('\\', "/");
                let path = normalize_path(&dir.join(relative));
                config.is_project_file(&path).then(|| ProjectEntry {
                    name: name.to_owned(),
                    path,
                })
            })
            .collect();

        debug!(solution = %path, projects = projects.len(), "Parsed solution");
        Ok(Self {
            path: Some(path.to_owned()),
            dir,
            projects,
        })
    }

    /// Builds a solution from every project file found below `dir`.
    ///
    /// # Errors
    ///
    /// Returns the walker's errors.
    pub fn discover(dir: &Utf8Path, config: &DiscoveryConfig) -> Result<Self, ReconcileError> {
        let projects = ProjectWalker::from_config(dir, config)?
            .collect_projects()?
            .into_iter()
            .map(|path| ProjectEntry {
                name: path.file_stem().unwrap_or_default().to_owned(),
                path,
            })
            .collect::<Vec<_>>();

        debug!(dir = %dir, projects = projects.len(), "Discovered projects");
        Ok(Self {
            path: None,
            dir: dir.to_owned(),
            projects,
        })
    }

    /// Returns the only `.sln` file in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Solution`] when there is no solution file or
    /// more than one.
    pub fn locate(dir: &Utf8Path) -> Result<Utf8PathBuf, ReconcileError> {
        let mut found = Vec::new();
        for entry in dir.read_dir_utf8().map_err(|err| ReconcileError::io(dir, err))? {
            let entry = entry.map_err(|err| ReconcileError::io(dir, err))?;
            let is_sln = entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("sln"));
            if is_sln && entry.path().is_file() {
                found.push(entry.into_path());
            }
        }
        found.sort();

        match found.len() {
            1 => Ok(found.remove(0)),
            0 => Err(ReconcileError::solution(dir, "no solution file found")),
            n => Err(ReconcileError::solution(
                dir,
                format!("{n} solution files found, pass one explicitly"),
            )),
        }
    }

    /// Returns the `.sln` file, when the solution was loaded from one.
    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    /// Returns the solution directory.
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Returns the projects in solution order.
    #[inline]
    #[must_use]
    pub fn projects(&self) -> &[ProjectEntry] {
        &self.projects
    }

    /// Returns the solution name: the `.sln` stem, or the directory name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path
            .as_deref()
            .and_then(Utf8Path::file_stem)
            .or_else(|| self.dir.file_name())
            .unwrap_or("solution")
    }
}

fn parent_dir(path: &Utf8Path) -> Utf8PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_owned(),
        _ => Utf8PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SLN: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
# Visual Studio 2012
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Core", "Core\Core.csproj", "{6D2C1E45-7E4A-4E3B-9D52-3B8C3E6F1A01}"
EndProject
Project("{F184B08F-C81C-45F6-A57F-5ABD9991F28F}") = "Legacy", "Legacy\Legacy.vbproj", "{6D2C1E45-7E4A-4E3B-9D52-3B8C3E6F1A02}"
EndProject
Project("{2150E333-8FDC-42A3-9474-1A3956D46DE8}") = ".nuget", ".nuget", "{6D2C1E45-7E4A-4E3B-9D52-3B8C3E6F1A03}"
	ProjectSection(SolutionItems) = preProject
		.nuget\NuGet.targets = .nuget\NuGet.targets
	EndProjectSection
EndProject
Project("{E24C65DC-7377-472B-9ABA-BC803B73C61A}") = "Site", "http://localhost/Site", "{6D2C1E45-7E4A-4E3B-9D52-3B8C3E6F1A04}"
EndProject
Global
EndGlobal
"#;

    #[test]
    fn test_parse_keeps_project_files_in_order() {
        let solution = Solution::parse(Utf8Path::new("/repo/App.sln"), SLN, &DiscoveryConfig::default()).unwrap();
        assert_eq!(solution.dir(), Utf8Path::new("/repo"));
        assert_eq!(
            solution.projects(),
            [
                ProjectEntry {
                    name: "Core".to_owned(),
                    path: Utf8PathBuf::from("/repo/Core/Core.csproj"),
                },
                ProjectEntry {
                    name: "Legacy".to_owned(),
                    path: Utf8PathBuf::from("/repo/Legacy/Legacy.vbproj"),
                },
            ]
        );
    }

    #[test]
    fn test_parse_resolves_parent_segments() {
        let sln = r#"
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Shared", "..\Shared\Shared.csproj", "{6D2C1E45-7E4A-4E3B-9D52-3B8C3E6F1A05}"
EndProject
"#;
        let solution = Solution::parse(Utf8Path::new("/repo/App/App.sln"), sln, &DiscoveryConfig::default()).unwrap();
        let shared = &solution.projects()[0];
        assert_eq!(shared.path, Utf8PathBuf::from("/repo/Shared/Shared.csproj"));
        assert_eq!(
            crate::project::relative_solution_dir(shared.path.parent().unwrap(), solution.dir()),
            r"..\App\"
        );
    }

    #[test]
    fn test_relative_solution_path_uses_current_dir() {
        let solution = Solution::parse(Utf8Path::new("App.sln"), SLN, &DiscoveryConfig::default()).unwrap();
        assert_eq!(solution.dir(), Utf8Path::new("."));
        assert_eq!(solution.name(), "App");
    }

    #[test]
    fn test_discover() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::create_dir_all(root.join("A")).unwrap();
        fs::write(root.join("A/A.csproj"), "<Project />").unwrap();

        let solution = Solution::discover(root, &DiscoveryConfig::default()).unwrap();
        assert!(solution.path().is_none());
        assert_eq!(solution.projects().len(), 1);
        assert_eq!(solution.projects()[0].name, "A");
    }

    #[test]
    fn test_locate() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        assert!(Solution::locate(root).is_err());

        fs::write(root.join("App.sln"), SLN).unwrap();
        assert_eq!(Solution::locate(root).unwrap(), root.join("App.sln"));

        fs::write(root.join("Other.sln"), SLN).unwrap();
        let err = Solution::locate(root).unwrap_err();
        assert!(err.to_string().contains("2 solution files"));
    }
}
