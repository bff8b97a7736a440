//! Half-open periods `[from, to)` over a generic point type.
//!
//! A [`Period`] is an immutable value: both endpoints are optional, with
//! `None` meaning unbounded in that direction. The constructor enforces the
//! ordering invariant `coalesce_from < coalesce_to`, so every `Period` value
//! in existence is well-formed; downstream algorithms never re-validate.
//!
//! The point type only needs the [`TimePoint`] contract; the `MIN`/`MAX`
//! sentinels are substituted for unbounded ends at comparison time and never
//! stored.

pub mod history;
pub mod multi;

use crate::error::Error;
use crate::point::TimePoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

// ---------------------------------------------------------------------------
// Validation failure
// ---------------------------------------------------------------------------

/// Caller-facing validation failure: the requested bounds do not form a
/// half-open period.
///
/// Unlike the invariant errors in [`crate::error::Error`], these are
/// recoverable; callers constructing periods from external input can collect
/// several of them before reporting back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[error("period start {} is not before end {}", render_bound(.from), render_bound(.to))]
pub struct InvalidPeriod<T: TimePoint> {
    /// The rejected start bound.
    pub from: Option<T>,
    /// The rejected end bound.
    pub to: Option<T>,
}

fn render_bound<T: TimePoint>(bound: &Option<T>) -> String {
    bound.map_or_else(|| "..".to_string(), |t| format!("{t:?}"))
}

impl<T: TimePoint> From<InvalidPeriod<T>> for Error {
    fn from(err: InvalidPeriod<T>) -> Self {
        Self::InvalidPeriod {
            from: render_bound(&err.from),
            to: render_bound(&err.to),
        }
    }
}

// ---------------------------------------------------------------------------
// Period
// ---------------------------------------------------------------------------

/// An immutable half-open interval `[from, to)`.
///
/// `None` endpoints are unbounded. Equality and hashing are structural over
/// the two bounds; operations never mutate, they return new values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Period<T: TimePoint> {
    from: Option<T>,
    to: Option<T>,
}

impl<T: TimePoint> Period<T> {
    /// Create a period from optional bounds.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPeriod`] unless `coalesce_from < coalesce_to`.
    pub fn new(from: Option<T>, to: Option<T>) -> Result<Self, InvalidPeriod<T>> {
        if from.unwrap_or(T::MIN) < to.unwrap_or(T::MAX) {
            Ok(Self { from, to })
        } else {
            Err(InvalidPeriod { from, to })
        }
    }

    /// Create a bounded period `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPeriod`] unless `from < to`.
    pub fn between(from: T, to: T) -> Result<Self, InvalidPeriod<T>> {
        Self::new(Some(from), Some(to))
    }

    /// The universal period `(-∞, +∞)`.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            from: None,
            to: None,
        }
    }

    /// The period `[from, +∞)`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPeriod`] when `from == T::MAX` (the empty tail).
    pub fn starting_at(from: T) -> Result<Self, InvalidPeriod<T>> {
        Self::new(Some(from), None)
    }

    /// The period `(-∞, to)`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPeriod`] when `to == T::MIN` (the empty head).
    pub fn ending_at(to: T) -> Result<Self, InvalidPeriod<T>> {
        Self::new(None, Some(to))
    }

    /// Construct without validating. The caller must guarantee
    /// `coalesce_from < coalesce_to`; used by the timeline algebra whose
    /// outputs are well-formed by construction.
    pub(crate) fn new_unchecked(from: Option<T>, to: Option<T>) -> Self {
        debug_assert!(from.unwrap_or(T::MIN) < to.unwrap_or(T::MAX));
        Self { from, to }
    }

    /// The start bound, `None` when unbounded.
    #[must_use]
    pub const fn from(&self) -> Option<T> {
        self.from
    }

    /// The end bound, `None` when unbounded.
    #[must_use]
    pub const fn to(&self) -> Option<T> {
        self.to
    }

    /// The start bound with the `MIN` sentinel substituted for unbounded.
    #[must_use]
    pub fn coalesce_from(&self) -> T {
        self.from.unwrap_or(T::MIN)
    }

    /// The end bound with the `MAX` sentinel substituted for unbounded.
    #[must_use]
    pub fn coalesce_to(&self) -> T {
        self.to.unwrap_or(T::MAX)
    }

    /// Whether `point` falls inside the period: `from <= point < to`.
    #[must_use]
    pub fn contains_point(&self, point: T) -> bool {
        self.coalesce_from() <= point && point < self.coalesce_to()
    }

    /// Whether `other` lies entirely inside this period.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.coalesce_from() <= other.coalesce_from() && other.coalesce_to() <= self.coalesce_to()
    }

    /// Whether the two periods share at least one point.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.coalesce_from() < other.coalesce_to() && other.coalesce_from() < self.coalesce_to()
    }

    /// Whether this period lies entirely inside `other`. A `None` other is
    /// the universal period, which contains everything.
    #[must_use]
    pub fn is_completely_contained_within(&self, other: Option<&Self>) -> bool {
        other.is_none_or(|o| o.contains(self))
    }

    /// The intersection of two periods, or `None` when they are disjoint.
    ///
    /// The winning bound on each side keeps its representation, so an
    /// unbounded end survives when both operands were unbounded there.
    #[must_use]
    pub fn overlapping_period(&self, other: &Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        let from = if self.coalesce_from() >= other.coalesce_from() {
            self.from
        } else {
            other.from
        };
        let to = if self.coalesce_to() <= other.coalesce_to() {
            self.to
        } else {
            other.to
        };
        Some(Self::new_unchecked(from, to))
    }
}

impl<T: TimePoint> fmt::Display for Period<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |bound: Option<T>| bound.map_or_else(|| "..".to_string(), |t| format!("{t:?}"));
        write!(f, "[{}, {})", render(self.from), render(self.to))
    }
}

// Deserialization goes through the validating constructor so the ordering
// invariant cannot be bypassed by untrusted input.
impl<'de, T> Deserialize<'de> for Period<T>
where
    T: TimePoint + Deserialize<'de>,
{
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw<T> {
            from: Option<T>,
            to: Option<T>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.from, raw.to).map_err(serde::de::Error::custom)
    }
}
