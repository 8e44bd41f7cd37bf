//! Error types for the nf-reconcile crate.
//!
//! This module provides [`ReconcileError`] for failures while reading and
//! rewriting solution files, and [`ClassifyError`] for failures while reading
//! assembly metadata.

use camino::{Utf8Path, Utf8PathBuf};
use nf_xml::XmlError;

/// Errors that can occur during a reconciliation run.
///
/// # Error Recovery Strategy
///
/// - **Project load errors** ([`ReconcileError::Load`]): report, skip the project, continue
/// - **Everything else**: abort the passes, log the cause chain, run cleanup
///
/// # Examples
///
/// ```
/// use nf_reconcile::ReconcileError;
///
/// let err = ReconcileError::solution("App.sln", "no projects");
/// assert!(!err.is_recoverable());
/// assert_eq!(err.path().map(|p| p.as_str()), Some("App.sln"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// A project file could not be loaded or parsed.
    ///
    /// The project is skipped and reported; the run continues.
    #[error("failed to load project {path}: {source}")]
    Load {
        /// The project file.
        path: Utf8PathBuf,
        /// The underlying document error.
        #[source]
        source: XmlError,
    },

    /// A manifest or config document could not be read or written.
    #[error("failed to process {path}: {source}")]
    Document {
        /// The document file.
        path: Utf8PathBuf,
        /// The underlying document error.
        #[source]
        source: XmlError,
    },

    /// A file system operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The path being accessed.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The solution could not be read.
    #[error("invalid solution {path}: {reason}")]
    Solution {
        /// The solution file or directory.
        path: Utf8PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// Failed to walk a directory.
    #[error("failed to walk directory: {0}")]
    Walk(#[from] ignore::Error),

    /// A path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// A built-in pattern failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A report could not be serialized.
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ReconcileError {
    /// Creates a new [`ReconcileError::Load`] error.
    #[inline]
    pub fn load(path: impl Into<Utf8PathBuf>, source: XmlError) -> Self {
        Self::Load {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`ReconcileError::Document`] error.
    #[inline]
    pub fn document(path: impl Into<Utf8PathBuf>, source: XmlError) -> Self {
        Self::Document {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`ReconcileError::Io`] error.
    #[inline]
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`ReconcileError::Solution`] error.
    #[inline]
    pub fn solution(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Self::Solution {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error only affects one project.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Load { .. })
    }

    /// Returns `true` if this error aborts the passes.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Load { path, .. }
            | Self::Document { path, .. }
            | Self::Io { path, .. }
            | Self::Solution { path, .. } => Some(path),
            Self::Walk(_) | Self::NonUtf8Path(_) | Self::Pattern(_) | Self::Serialize(_) => None,
        }
    }
}

/// Errors that can occur while classifying an assembly.
///
/// None of these abort a run: the record keeps no attributes and binding
/// redirects are written without a public key token.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// The assembly file does not exist.
    #[error("assembly not found: {0}")]
    NotFound(Utf8PathBuf),

    /// The record has no hint path to locate the assembly from.
    #[error("no hint path recorded for {0}")]
    NoHintPath(String),

    /// The file could not be loaded as a managed assembly.
    #[error("{path} is not a managed assembly: {source}")]
    Metadata {
        /// The file being read.
        path: Utf8PathBuf,
        /// The metadata reader's error.
        #[source]
        source: dotscope::Error,
    },

    /// The file is a module without an assembly manifest.
    #[error("{0} has no assembly manifest")]
    NoManifest(Utf8PathBuf),
}

impl ClassifyError {
    /// Creates a new [`ClassifyError::Metadata`] error.
    #[inline]
    pub fn metadata(path: impl Into<Utf8PathBuf>, source: dotscope::Error) -> Self {
        Self::Metadata {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the assembly file is missing.
    #[inline]
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
