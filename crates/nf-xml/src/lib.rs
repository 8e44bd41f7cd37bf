//! Lossless XML document tree for MSBuild projects, package manifests, and
//! application config files.
//!
//! This crate parses a document into a tree of [`Node`]s that remembers the
//! exact markup it came from, offers element and attribute mutation, and
//! serializes the tree back so untouched regions come out byte for byte.
//!
//! # Overview
//!
//! ```
//! use nf_xml::{Element, XmlDocument};
//!
//! let mut doc = XmlDocument::parse("<packages>\n  <package id=\"A\" version=\"1.0\" />\n</packages>")?;
//! let layout = doc.layout().clone();
//! doc.root_mut().append_element(
//!     Element::new("package").with_attr("id", "B").with_attr("version", "2.0"),
//!     0,
//!     &layout,
//! );
//!
//! assert_eq!(
//!     doc.to_string(),
//!     "<packages>\n  <package id=\"A\" version=\"1.0\" />\n  <package id=\"B\" version=\"2.0\" />\n</packages>"
//! );
//! # Ok::<(), nf_xml::XmlError>(())
//! ```
//!
//! # Formatting
//!
//! New elements are placed on their own line. The indentation is copied from
//! existing siblings where there are any, and otherwise derived from the
//! document's [`Layout`] (line ending and indentation unit detected at parse
//! time).

#![deny(clippy::all)]
#![warn(missing_docs)]

mod document;
mod error;
mod node;

pub use document::{Layout, XmlDocument};
pub use error::XmlError;
pub use node::{Attribute, Element, Node};
