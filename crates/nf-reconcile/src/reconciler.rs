//! The two-pass reconciliation run.
//!
//! ```text
//! Reconciler::reconcile
//!     │
//!     ├── save all
//!     ├── gather pass (per project)
//!     │       ├── define SolutionDir
//!     │       ├── observe references ──────────► Registry
//!     │       └── observe manifest versions ───► Registry
//!     ├── save all
//!     ├── update pass (per project)
//!     │       ├── ProjectRewriter
//!     │       ├── ManifestSynchronizer
//!     │       ├── resolve assembly attributes
//!     │       └── BindingRedirectSynchronizer
//!     ├── save all
//!     └── cleanup: unload all, save all
//! ```
//!
//! Projects are processed one at a time, loaded on entry and unloaded on
//! exit. A project that cannot be parsed is skipped and reported; any other
//! error ends both passes, is logged with its cause chain, and still lets
//! the cleanup run.

use nf_core::{Config, ReconcileConfig, ReferenceKey};
use tracing::{debug, error, info, warn};

use crate::assembly::{AssemblyClassifier, HintPathResolver, MetadataClassifier};
use crate::binding::BindingRedirectSynchronizer;
use crate::error::ReconcileError;
use crate::extractor::ReferenceExtractor;
use crate::manifest::ManifestSynchronizer;
use crate::project::{ProjectCollection, ProjectFile};
use crate::registry::Registry;
use crate::report::ChangeReport;
use crate::rewriter::ProjectRewriter;
use crate::scan::{ScanReport, package_sources};
use crate::solution::{ProjectEntry, Solution};

/// Result of a reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileSummary {
    /// What changed, what was skipped, and what went wrong.
    pub report: ChangeReport,
    /// Number of projects in the solution.
    pub projects: usize,
    /// Number of registry records built by the gather pass.
    pub records: usize,
    /// A fatal error ended the passes early.
    pub aborted: bool,
}

/// Runs reconciliations over solutions.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use nf_core::Config;
/// use nf_reconcile::{Reconciler, Solution};
///
/// let config = Config::default();
/// let solution = Solution::load(Utf8Path::new("App.sln"), &config.discovery)?;
/// let summary = Reconciler::new(config).reconcile(&solution)?;
/// print!("{}", summary.report);
/// # Ok::<(), nf_reconcile::ReconcileError>(())
/// ```
#[derive(Debug)]
pub struct Reconciler {
    config: Config,
    classifier: Box<dyn AssemblyClassifier>,
}

impl Reconciler {
    /// Creates a reconciler that classifies assemblies from their metadata.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_classifier(config, Box::new(MetadataClassifier))
    }

    /// Creates a reconciler with a custom assembly classifier.
    #[must_use]
    pub fn with_classifier(config: Config, classifier: Box<dyn AssemblyClassifier>) -> Self {
        Self { config, classifier }
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reconciles every project of the solution and writes the changes.
    ///
    /// # Errors
    ///
    /// Only setup failures are returned. Errors raised during the passes are
    /// logged, recorded in the report, and flagged through
    /// [`ReconcileSummary::aborted`].
    pub fn reconcile(&self, solution: &Solution) -> Result<ReconcileSummary, ReconcileError> {
        info!(
            solution = solution.name(),
            projects = solution.projects().len(),
            "Reconciling solution"
        );
        let mut run = Run::new(&self.config, self.classifier.as_ref(), solution, ProjectCollection::new())?;

        let outcome = run.passes();
        let aborted = outcome.is_err();
        if let Err(err) = outcome {
            log_error_chain(&err);
            run.report.error(&err);
        }
        run.cleanup();

        let summary = ReconcileSummary {
            projects: solution.projects().len(),
            records: run.registry.len(),
            report: run.report,
            aborted,
        };
        run.registry.clear();
        info!(
            modified = summary.report.modified_items(),
            records = summary.records,
            aborted,
            "Reconciliation finished"
        );
        Ok(summary)
    }

    /// Runs the gather pass without writing anything and reports what the
    /// solution references.
    ///
    /// # Errors
    ///
    /// Returns the first error that is not a project load failure.
    pub fn scan(&self, solution: &Solution) -> Result<ScanReport, ReconcileError> {
        info!(solution = solution.name(), "Scanning solution");
        let mut run = Run::new(
            &self.config,
            self.classifier.as_ref(),
            solution,
            ProjectCollection::read_only(),
        )?;
        run.gather()?;

        let keys: Vec<ReferenceKey> = run.registry.iter().map(|(key, _)| key.clone()).collect();
        for key in &keys {
            if let Err(err) = run
                .registry
                .resolve_assembly_attributes(key, run.classifier, &run.resolver)
            {
                debug!(key = %key, error = %err, "Assembly attributes unavailable");
            }
        }

        Ok(ScanReport::from_registry(
            &run.registry,
            solution.dir(),
            package_sources(&self.config.feeds),
        ))
    }
}

/// State of one run.
struct Run<'a> {
    config: &'a ReconcileConfig,
    classifier: &'a dyn AssemblyClassifier,
    solution: &'a Solution,
    extractor: ReferenceExtractor,
    rewriter: ProjectRewriter,
    resolver: HintPathResolver,
    registry: Registry,
    projects: ProjectCollection,
    report: ChangeReport,
}

impl<'a> Run<'a> {
    fn new(
        config: &'a Config,
        classifier: &'a dyn AssemblyClassifier,
        solution: &'a Solution,
        projects: ProjectCollection,
    ) -> Result<Self, ReconcileError> {
        let config = &config.reconcile;
        Ok(Self {
            config,
            classifier,
            solution,
            extractor: ReferenceExtractor::new(config)?,
            rewriter: ProjectRewriter::new(config)?,
            resolver: HintPathResolver::new(solution.dir(), &config.solution_dir_variable),
            registry: Registry::with_mode(config.comparison),
            projects,
            report: ChangeReport::new(),
        })
    }

    fn passes(&mut self) -> Result<(), ReconcileError> {
        self.save_all()?;
        self.gather()?;
        self.save_all()?;
        self.update()?;
        self.save_all()
    }

    fn gather(&mut self) -> Result<(), ReconcileError> {
        let solution = self.solution;
        for entry in solution.projects() {
            self.gather_project(entry)?;
        }
        info!(records = self.registry.len(), "Gather pass complete");
        Ok(())
    }

    fn gather_project(&mut self, entry: &ProjectEntry) -> Result<(), ReconcileError> {
        let read_only = self.projects.is_read_only();
        let Some(project) = load_or_skip(&mut self.projects, &mut self.report, entry)? else {
            return Ok(());
        };
        let dir = project.directory().to_owned();

        let defined = project.ensure_solution_dir(self.solution.dir(), &self.config.solution_dir_variable);

        let mut observed = 0_usize;
        for (include, metadata) in project.references() {
            if let Some(reference) = self.extractor.extract(&include, &metadata) {
                self.registry.observe(&self.rewriter.normalize(reference), &dir);
                observed += 1;
            }
        }

        let entries = ManifestSynchronizer::new(&self.registry, self.config).read_entries(&dir)?;
        for package in entries {
            if self.registry.has_package(&package.id) {
                self.registry
                    .observe_package_version(&package.id, &package.version, &dir, &self.extractor);
            }
        }
        debug!(project = %project.path(), references = observed, "Gathered project");

        if defined {
            persist(project, read_only, &mut self.report)?;
        }
        self.projects.unload(&entry.path);
        Ok(())
    }

    fn update(&mut self) -> Result<(), ReconcileError> {
        let solution = self.solution;
        for entry in solution.projects() {
            self.update_project(entry)?;
        }
        info!(modified = self.report.modified_items(), "Update pass complete");
        Ok(())
    }

    fn update_project(&mut self, entry: &ProjectEntry) -> Result<(), ReconcileError> {
        let read_only = self.projects.is_read_only();
        let Some(project) = load_or_skip(&mut self.projects, &mut self.report, entry)? else {
            return Ok(());
        };
        let dir = project.directory().to_owned();

        let (rewriter, extractor, registry) = (&self.rewriter, &self.extractor, &self.registry);
        let mut modified = project.update_references(|item| rewriter.rewrite(item, extractor, registry));
        if self.config.fix_code_analysis {
            modified |= project.fix_code_analysis();
        }

        let manifests = ManifestSynchronizer::new(&self.registry, self.config);
        let manifest = manifests.synchronize(&dir)?;
        if manifest.modified {
            self.report.modified_file(&manifests.manifest_path(&dir));
        }
        if manifest.present {
            modified |= project.ensure_item("None", &self.config.manifest_file);
        }

        for key in self.registry.keys_referenced_by(&dir) {
            if let Err(err) =
                self.registry
                    .resolve_assembly_attributes(&key, self.classifier, &self.resolver)
            {
                self.report.error(format_args!("{key}: {err}"));
            }
        }

        let binding = BindingRedirectSynchronizer::new(&self.registry).synchronize(&dir)?;
        if binding.modified {
            if let Some(config_file) = &binding.config_file {
                self.report.modified_file(config_file);
            }
        }
        if binding.needs_project_item() {
            modified |= project.ensure_item(binding.kind.item_kind(), binding.kind.file_name());
        }

        if modified || manifest.modified || binding.modified {
            project.mark_modified();
        }
        persist(project, read_only, &mut self.report)?;
        self.projects.unload(&entry.path);
        Ok(())
    }

    fn save_all(&mut self) -> Result<(), ReconcileError> {
        for path in self.projects.save_all()? {
            self.report.modified_file(&path);
        }
        Ok(())
    }

    fn cleanup(&mut self) {
        self.projects.unload_all();
        if let Err(err) = self.save_all() {
            warn!(error = %err, "Save during cleanup failed");
            self.report.error(&err);
        }
    }
}

/// Loads a project, or records it as skipped when it cannot be parsed.
fn load_or_skip<'p>(
    projects: &'p mut ProjectCollection,
    report: &mut ChangeReport,
    entry: &ProjectEntry,
) -> Result<Option<&'p mut ProjectFile>, ReconcileError> {
    match projects.load(&entry.path) {
        Ok(project) => Ok(Some(project)),
        Err(ReconcileError::Load { path, source }) => {
            warn!(project = %path, error = %source, "Skipping project");
            report.skipped_project(&path, source);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn persist(project: &mut ProjectFile, read_only: bool, report: &mut ChangeReport) -> Result<(), ReconcileError> {
    if !read_only && project.save()? {
        report.modified_project(project.name());
    }
    Ok(())
}

fn log_error_chain(err: &ReconcileError) {
    let mut causes = Vec::new();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }
    error!(error = %err, causes = ?causes, "Reconciliation aborted");
}
