//! Version ordering.
//!
//! Version strings are dot-separated fragments such as `4.5.0.0`. Two orderings
//! are available:
//!
//! - [`OrdinalComparator`] compares the raw strings byte by byte. This is the
//!   default and mirrors how existing solutions were reconciled, including its
//!   known quirk that `"10.0"` sorts below `"9.0"`.
//! - [`NumericComparator`] compares segment by segment as integers.
//!
//! [`ComparisonMode`] selects one from configuration.

use std::cmp::Ordering;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

/// Decides whether one version string is newer than another.
pub trait VersionComparator: Send + Sync + Debug {
    /// Compares two version strings.
    fn compare(&self, a: &str, b: &str) -> Ordering;

    /// Returns `true` if `candidate` is strictly newer than `current`.
    fn is_newer(&self, candidate: &str, current: &str) -> bool {
        self.compare(candidate, current) == Ordering::Greater
    }
}

/// Byte-wise string comparison.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use nf_core::{OrdinalComparator, VersionComparator};
///
/// let cmp = OrdinalComparator;
/// assert!(cmp.is_newer("6.0.0.0", "4.5.0.0"));
/// // Multi-digit segments misorder.
/// assert_eq!(cmp.compare("10.0", "9.0"), Ordering::Less);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrdinalComparator;

impl VersionComparator for OrdinalComparator {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }
}

/// Segment-wise integer comparison.
///
/// Missing segments count as zero, so `1.0` equals `1.0.0.0`. A segment that is
/// not a number falls back to ordinal comparison of that segment.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use nf_core::{NumericComparator, VersionComparator};
///
/// let cmp = NumericComparator;
/// assert_eq!(cmp.compare("10.0", "9.0"), Ordering::Greater);
/// assert_eq!(cmp.compare("1.0", "1.0.0.0"), Ordering::Equal);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NumericComparator;

impl VersionComparator for NumericComparator {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        let mut left = a.split('.');
        let mut right = b.split('.');
        loop {
            let ordering = match (left.next(), right.next()) {
                (None, None) => return Ordering::Equal,
                (Some(l), None) => compare_segment(l, "0"),
                (None, Some(r)) => compare_segment("0", r),
                (Some(l), Some(r)) => compare_segment(l, r),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
    }
}

fn compare_segment(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<u64>(), b.trim().parse::<u64>()) {
        (Ok(l), Ok(r)) => l.cmp(&r),
        _ => a.cmp(b),
    }
}

/// Configured version ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ComparisonMode {
    /// Byte-wise string comparison.
    #[default]
    Ordinal,

    /// Segment-wise integer comparison.
    Numeric,
}

impl ComparisonMode {
    /// Creates the comparator for this mode.
    ///
    /// # Examples
    ///
    /// ```
    /// use nf_core::{ComparisonMode, VersionComparator};
    ///
    /// let cmp = ComparisonMode::Numeric.comparator();
    /// assert!(cmp.is_newer("10.0", "9.0"));
    /// ```
    #[must_use]
    pub fn comparator(self) -> Box<dyn VersionComparator> {
        match self {
            Self::Ordinal => Box::new(OrdinalComparator),
            Self::Numeric => Box::new(NumericComparator),
        }
    }

    /// Returns a human-readable label for this mode.
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ordinal => "ordinal",
            Self::Numeric => "numeric",
        }
    }
}
