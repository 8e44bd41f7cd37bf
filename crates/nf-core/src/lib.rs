//! Core types, errors, and configuration for the nugetfix tool.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - [`ConfigError`] for configuration loading failures
//! - Configuration structures ([`Config`] and its sections)
//! - Domain types ([`ReferenceKey`], [`ReferenceMetadata`], [`PackageRecord`])
//! - The [`VersionComparator`] seam used wherever "newer" must be decided

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, DiscoveryConfig, FeedConfig, ReconcileConfig};
pub use error::ConfigError;
pub use types::{
    AssemblyAttributes, ComparisonMode, ExtractedReference, MetadataEntry, NumericComparator,
    OrdinalComparator, PackageRecord, ReferenceKey, ReferenceMetadata, VersionComparator,
};
