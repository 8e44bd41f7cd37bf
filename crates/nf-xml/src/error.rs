//! Error types for the nf-xml crate.
//!
//! This module provides the [`XmlError`] type for errors that can occur while
//! reading, parsing, and writing XML documents.

use camino::{Utf8Path, Utf8PathBuf};

/// Errors that can occur while handling an XML document.
///
/// # Examples
///
/// ```
/// use nf_xml::XmlError;
///
/// let err = XmlError::malformed(12, "unexpected end tag");
/// assert!(err.to_string().contains("offset 12"));
/// assert!(err.path().is_none());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// The document is not well-formed.
    #[error("malformed XML at offset {position}: {message}")]
    Malformed {
        /// Byte offset where the tokenizer stopped.
        position: u64,
        /// Description of the problem.
        message: String,
    },

    /// The document has no root element.
    #[error("document has no root element")]
    MissingRoot,

    /// The document has content after its root element.
    #[error("document has more than one root element")]
    MultipleRoots,

    /// The file is not valid UTF-8.
    #[error("{path} is not valid UTF-8")]
    Encoding {
        /// The file being read.
        path: Utf8PathBuf,
    },

    /// An I/O error occurred while reading or writing a document.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file being accessed.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A document loaded from a file failed to parse.
    #[error("failed to parse {path}: {source}")]
    File {
        /// The file being parsed.
        path: Utf8PathBuf,
        /// The parse failure.
        #[source]
        source: Box<XmlError>,
    },
}

impl XmlError {
    /// Creates a new [`XmlError::Malformed`] error.
    #[inline]
    pub fn malformed(position: u64, message: impl Into<String>) -> Self {
        Self::Malformed {
            position,
            message: message.into(),
        }
    }

    /// Creates a new [`XmlError::Io`] error.
    #[inline]
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attaches the file a parse error came from.
    #[must_use]
    pub fn in_file(self, path: impl Into<Utf8PathBuf>) -> Self {
        match self {
            Self::Io { .. } | Self::Encoding { .. } | Self::File { .. } => self,
            other => Self::File {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Encoding { path } | Self::Io { path, .. } | Self::File { path, .. } => {
                Some(path)
            }
            Self::Malformed { .. } | Self::MissingRoot | Self::MultipleRoots => None,
        }
    }

    /// Returns `true` if the file itself could not be accessed.
    #[inline]
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
