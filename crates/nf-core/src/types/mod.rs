//! Domain types for the nugetfix tool.
//!
//! # Module Organization
//!
//! - [`reference`] - Reference identities and their metadata
//! - [`package`] - Registry records and resolved assembly attributes
//! - [`version`] - Version ordering behind the [`VersionComparator`] trait
//!
//! All public types are re-exported at this module level and at the crate root:
//!
//! ```
//! use nf_core::{PackageRecord, ReferenceKey, VersionComparator};
//! ```

mod package;
mod reference;
mod version;

pub use package::{AssemblyAttributes, PackageRecord};
pub use reference::{ExtractedReference, MetadataEntry, ReferenceKey, ReferenceMetadata};
pub use version::{ComparisonMode, NumericComparator, OrdinalComparator, VersionComparator};
