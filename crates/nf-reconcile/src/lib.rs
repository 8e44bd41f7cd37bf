//! Cross-project package reference reconciliation for `packages.config`
//! solutions.
//!
//! This crate is the engine behind the `nugetfix` tool. It reads every
//! project of a solution, settles on the highest referenced version of each
//! package assembly, and writes that version back into every project's
//! references, package manifest, and binding redirects.
//!
//! # Overview
//!
//! The main entry point is [`Reconciler`], which drives:
//!
//! - [`ReferenceExtractor`]: `<Reference>` item → key, package, version
//! - [`Registry`]: key → highest version and the metadata that carried it
//! - [`ProjectRewriter`]: canonical hint paths and stale-reference replacement
//! - [`ManifestSynchronizer`]: `packages.config` rewrite
//! - [`BindingRedirectSynchronizer`]: `assemblyBinding` rewrite
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8Path;
//! use nf_core::Config;
//! use nf_reconcile::{Reconciler, Solution};
//!
//! let config = Config::default();
//! let solution = Solution::load(Utf8Path::new("App.sln"), &config.discovery)?;
//! let summary = Reconciler::new(config).reconcile(&solution)?;
//! for line in summary.report.lines() {
//!     println!("{line}");
//! }
//! # Ok::<(), nf_reconcile::ReconcileError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! Reconciler
//!     │
//!     ├── Solution (.sln entries or ProjectWalker discovery)
//!     │
//!     ├── gather pass ── ReferenceExtractor ──► Registry
//!     │
//!     └── update pass
//!             ├── ProjectRewriter ◄──────────── Registry
//!             ├── ManifestSynchronizer ◄─────── Registry
//!             └── BindingRedirectSynchronizer ◄ Registry + AssemblyClassifier
//! ```
//!
//! Everything runs on one thread; documents are loaded one project at a time.

#![deny(clippy::all)]
#![warn(missing_docs)]

mod assembly;
mod binding;
mod error;
mod extractor;
mod manifest;
mod project;
mod reconciler;
mod registry;
mod report;
mod rewriter;
mod scan;
mod solution;
mod walker;

pub use assembly::{AssemblyClassifier, HintPathResolver, MetadataClassifier, public_key_token};
pub use binding::{
    BindingOutcome, BindingRedirectSynchronizer, ConfigKind, DocumentChanges, MAX_ASSEMBLY_VERSION,
    widen_old_version,
};
pub use error::{ClassifyError, ReconcileError};
pub use extractor::{ReferenceExtractor, split_package_folder};
pub use manifest::{ManifestEntry, ManifestOutcome, ManifestSynchronizer};
pub use project::{ProjectCollection, ProjectFile, ReferenceItem, relative_solution_dir};
pub use reconciler::{ReconcileSummary, Reconciler};
pub use registry::{Observation, Registry};
pub use report::ChangeReport;
pub use rewriter::ProjectRewriter;
pub use scan::{PackageSummary, ScanReport, package_sources, read_package_sources};
pub use solution::{ProjectEntry, Solution};
pub use walker::ProjectWalker;
