//! End-to-end reconciliation over a solution written to a temp directory.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use nf_core::{AssemblyAttributes, Config};
use nf_reconcile::{AssemblyClassifier, ClassifyError, Reconciler, Solution};

#[derive(Debug)]
struct SignedClassifier;

impl AssemblyClassifier for SignedClassifier {
    fn classify(&self, path: &Utf8Path) -> Result<AssemblyAttributes, ClassifyError> {
        let name = path.file_stem().unwrap_or_default();
        Ok(AssemblyAttributes::new(name, "6.0.0.0", Some("30ad4fe6b2a6aeed".to_owned())))
    }
}

const SOLUTION: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Alpha", "Alpha\Alpha.csproj", "{00000000-0000-0000-0000-00000000000A}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Bravo", "Bravo\Bravo.csproj", "{00000000-0000-0000-0000-00000000000B}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Charlie", "Charlie\Charlie.csproj", "{00000000-0000-0000-0000-00000000000C}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Broken", "Broken\Broken.csproj", "{00000000-0000-0000-0000-00000000000D}"
EndProject
"#;

fn project(include: &str, version: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="4.0" DefaultTargets="Build" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup>
    <OutputType>Library</OutputType>
  </PropertyGroup>
  <ItemGroup>
    <Reference Include="{include}, Version={version}, Culture=neutral, PublicKeyToken=30ad4fe6b2a6aeed, processorArchitecture=MSIL">
      <SpecificVersion>True</SpecificVersion>
      <HintPath>..\packages\Newtonsoft.Json.{version}\lib\net45\Newtonsoft.Json.dll</HintPath>
    </Reference>
    <Reference Include="System.Xml" />
  </ItemGroup>
</Project>
"#
    )
}

fn manifest(version: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<packages>
  <package id="Newtonsoft.Json" version="{version}" targetFramework="net45" />
</packages>
"#
    )
}

fn write_solution(root: &Utf8Path) -> Utf8PathBuf {
    for (name, version) in [("Alpha", "4.5.0.0"), ("Bravo", "6.0.0.0"), ("Charlie", "5.0.0.0")] {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{name}.csproj")), project("Newtonsoft.Json", version)).unwrap();
        fs::write(dir.join("packages.config"), manifest(version)).unwrap();
    }
    fs::create_dir_all(root.join("Broken")).unwrap();
    fs::write(root.join("Broken/Broken.csproj"), "<Project><ItemGroup></Project>").unwrap();

    let sln = root.join("App.sln");
    fs::write(&sln, SOLUTION).unwrap();
    sln
}

fn reconcile(sln: &Utf8Path) -> nf_reconcile::ReconcileSummary {
    let config = Config::default();
    let solution = Solution::load(sln, &config.discovery).unwrap();
    Reconciler::with_classifier(config, Box::new(SignedClassifier))
        .reconcile(&solution)
        .unwrap()
}

#[test]
fn test_highest_version_wins_everywhere() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let sln = write_solution(root);

    let summary = reconcile(&sln);
    assert!(!summary.aborted);
    assert_eq!(summary.projects, 4);
    assert_eq!(summary.records, 1);

    for name in ["Alpha", "Bravo", "Charlie"] {
        let project = fs::read_to_string(root.join(format!("{name}/{name}.csproj"))).unwrap();
        assert!(project.contains(r#"<Reference Include="Newtonsoft.Json">"#), "{name}");
        assert!(
            project.contains(r"<HintPath>$(SolutionDir)\packages\Newtonsoft.Json.6.0.0.0\lib\net45\Newtonsoft.Json.dll</HintPath>"),
            "{name}"
        );
        assert!(project.contains("<SpecificVersion>False</SpecificVersion>"), "{name}");
        assert!(project.contains(r#"<Reference Include="System.Xml" />"#), "{name}");
        assert!(project.contains(r"<SolutionDir Condition="), "{name}");
        assert!(project.contains(r#"<None Include="packages.config" />"#), "{name}");
        assert!(project.contains(r#"<None Include="App.config" />"#), "{name}");

        let packages = fs::read_to_string(root.join(format!("{name}/packages.config"))).unwrap();
        assert_eq!(
            packages,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<packages>\n  <package id=\"Newtonsoft.Json\" version=\"6.0.0.0\" />\n</packages>\n",
            "{name}"
        );

        let app_config = fs::read_to_string(root.join(format!("{name}/App.config"))).unwrap();
        assert!(
            app_config.contains(r#"<assemblyIdentity name="Newtonsoft.Json" publicKeyToken="30ad4fe6b2a6aeed" culture="neutral" />"#),
            "{name}"
        );
        assert!(
            app_config.contains(r#"<bindingRedirect oldVersion="0.0.0.0-65535.65535.65535.65535" newVersion="6.0.0.0" />"#),
            "{name}"
        );
        assert_eq!(app_config.matches("<dependentAssembly>").count(), 1, "{name}");
    }

    let lines: Vec<&str> = summary.report.lines().collect();
    assert!(lines.contains(&"Modified project: Alpha"));
    assert!(lines.contains(&"Modified project: Charlie"));
    assert!(
        lines
            .iter()
            .any(|line| line.starts_with("Skipped project: ") && line.contains("Broken.csproj"))
    );
}

#[test]
fn test_second_run_changes_nothing() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let sln = write_solution(root);

    let first = reconcile(&sln);
    assert!(first.report.modified_items() > 0);
    let snapshot = fs::read_to_string(root.join("Alpha/Alpha.csproj")).unwrap();

    let second = reconcile(&sln);
    assert!(!second.aborted);
    assert_eq!(second.report.modified_items(), 0);
    assert_eq!(fs::read_to_string(root.join("Alpha/Alpha.csproj")).unwrap(), snapshot);
}

#[test]
fn test_broken_project_is_left_alone() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let sln = write_solution(root);

    let summary = reconcile(&sln);
    assert!(!summary.aborted);
    assert!(summary.report.has_problems());
    assert_eq!(
        fs::read_to_string(root.join("Broken/Broken.csproj")).unwrap(),
        "<Project><ItemGroup></Project>"
    );
    assert!(!root.join("Broken/App.config").exists());
}

#[test]
fn test_discovered_solution_matches_sln() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    write_solution(root);

    let config = Config::default();
    let solution = Solution::discover(root, &config.discovery).unwrap();
    let names: Vec<&str> = solution.projects().iter().map(|entry| entry.name.as_str()).collect();
    assert_eq!(names, ["Alpha", "Bravo", "Broken", "Charlie"]);
}

#[test]
fn test_reference_casing_does_not_split_identity() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    for (name, include, version) in [
        ("A", "newtonsoft.json", "4.5.0.0"),
        ("B", "Newtonsoft.Json", "6.0.0.0"),
    ] {
        let project_dir = root.join(name);
        fs::create_dir_all(&project_dir).unwrap();
        fs::write(project_dir.join(format!("{name}.csproj")), project(include, version)).unwrap();
        fs::write(project_dir.join("packages.config"), manifest(version)).unwrap();
    }

    let config = Config::default();
    let solution = Solution::discover(root, &config.discovery).unwrap();
    let reconciler = Reconciler::with_classifier(config, Box::new(SignedClassifier));
    let summary = reconciler.reconcile(&solution).unwrap();
    assert!(!summary.aborted);
    assert_eq!(summary.records, 1);

    let a = fs::read_to_string(root.join("A/A.csproj")).unwrap();
    assert!(
        a.contains(r"<HintPath>$(SolutionDir)\packages\Newtonsoft.Json.6.0.0.0\lib\net45\Newtonsoft.Json.dll</HintPath>"),
        "{a}"
    );
    let packages = fs::read_to_string(root.join("A/packages.config")).unwrap();
    assert!(packages.contains(r#"version="6.0.0.0""#), "{packages}");
    let app_config = fs::read_to_string(root.join("A/App.config")).unwrap();
    assert_eq!(app_config.matches("<dependentAssembly>").count(), 1);
    assert!(app_config.contains(r#"newVersion="6.0.0.0""#));

    let again = reconciler.reconcile(&solution).unwrap();
    assert_eq!(again.report.modified_items(), 0);
}
