//! Non-overlapping timelines of half-open periods.
//!
//! A [`PeriodHistory`] is an ordered set of disjoint [`Period`]s. It is
//! built once, validated once, and immutable afterwards, which makes it
//! safe to share read-only across threads. Lookups run on a sorted `Vec`
//! with binary search; the algebra operators ([`PeriodHistory::intersect`],
//! [`PeriodHistory::except`]) are linear sweeps over the two sorted
//! sequences and emit already-normalized output; each input is internally
//! disjoint, so no separate normalization pass is needed.

use super::Period;
use crate::error::Error;
use crate::point::TimePoint;
use std::fmt;

/// An immutable ordered set of non-overlapping periods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodHistory<T: TimePoint> {
    /// Sorted by `coalesce_from`, pairwise disjoint.
    periods: Vec<Period<T>>,
}

impl<T: TimePoint> PeriodHistory<T> {
    /// Build a timeline from any collection of periods.
    ///
    /// The input is sorted by `coalesce_from`; any pair of overlapping
    /// periods is an invariant violation.
    ///
    /// # Errors
    ///
    /// [`Error::OverlappingPeriods`] when two input periods share a point.
    pub fn new(periods: impl IntoIterator<Item = Period<T>>) -> Result<Self, Error> {
        let mut sorted: Vec<Period<T>> = periods.into_iter().collect();
        sorted.sort_by_key(Period::coalesce_from);
        for pair in sorted.windows(2) {
            if pair[1].coalesce_from() < pair[0].coalesce_to() {
                return Err(Error::OverlappingPeriods {
                    left: pair[0].to_string(),
                    right: pair[1].to_string(),
                });
            }
        }
        Ok(Self { periods: sorted })
    }

    /// Build a timeline from input the caller guarantees to be sorted by
    /// `coalesce_from` and pairwise disjoint, skipping validation.
    ///
    /// This is the fast path for bulk construction from already-trusted
    /// data (e.g. a previously validated timeline read back from storage).
    #[must_use]
    pub fn from_sorted_disjoint_unchecked(periods: Vec<Period<T>>) -> Self {
        debug_assert!(
            periods
                .windows(2)
                .all(|pair| pair[0].coalesce_to() <= pair[1].coalesce_from()),
            "periods must be sorted and disjoint"
        );
        Self { periods }
    }

    /// The empty timeline.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            periods: Vec::new(),
        }
    }

    /// The periods in order.
    #[must_use]
    pub fn periods(&self) -> &[Period<T>] {
        &self.periods
    }

    /// Number of periods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// Whether the timeline has no periods.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Index of the first period with `coalesce_from > date`; the candidate
    /// containing `date`, if any, sits immediately before it.
    fn upper_bound(&self, date: T) -> usize {
        self.periods
            .partition_point(|p| p.coalesce_from() <= date)
    }

    /// The period containing `date`, if any.
    #[must_use]
    pub fn period_at(&self, date: T) -> Option<&Period<T>> {
        let idx = self.upper_bound(date).checked_sub(1)?;
        let candidate = &self.periods[idx];
        candidate.contains_point(date).then_some(candidate)
    }

    /// All periods overlapping the half-open range `[start, end)`, in
    /// order. Empty when `end <= start`.
    #[must_use]
    pub fn periods_overlapping(&self, start: T, end: T) -> &[Period<T>] {
        if end <= start {
            return &[];
        }
        let lo = self.periods.partition_point(|p| p.coalesce_to() <= start);
        let hi = self.periods.partition_point(|p| p.coalesce_from() < end);
        &self.periods[lo..hi.max(lo)]
    }

    /// The period containing `date`, or else the nearest one starting after
    /// it.
    #[must_use]
    pub fn period_at_or_immediately_after(&self, date: T) -> Option<&Period<T>> {
        self.period_at(date).or_else(|| self.first_after(date))
    }

    /// The period containing `date`, or else the nearest one ending at or
    /// before it.
    #[must_use]
    pub fn period_at_or_immediately_before(&self, date: T) -> Option<&Period<T>> {
        self.period_at(date).or_else(|| self.last_before(date))
    }

    /// The period containing `date`, else the nearest after, else the
    /// nearest before.
    #[must_use]
    pub fn period_at_or_after_or_before(&self, date: T) -> Option<&Period<T>> {
        self.period_at(date)
            .or_else(|| self.first_after(date))
            .or_else(|| self.last_before(date))
    }

    /// The period containing `date`, else the nearest before, else the
    /// nearest after.
    #[must_use]
    pub fn period_at_or_before_or_after(&self, date: T) -> Option<&Period<T>> {
        self.period_at(date)
            .or_else(|| self.last_before(date))
            .or_else(|| self.first_after(date))
    }

    fn first_after(&self, date: T) -> Option<&Period<T>> {
        self.periods.get(self.upper_bound(date))
    }

    fn last_before(&self, date: T) -> Option<&Period<T>> {
        let idx = self
            .periods
            .partition_point(|p| p.coalesce_to() <= date)
            .checked_sub(1)?;
        self.periods.get(idx)
    }

    /// The intersection of two timelines: every region covered by both.
    ///
    /// Two-pointer merge over the sorted sequences; whichever current
    /// period ends first is exhausted and its cursor advances. Output is
    /// disjoint and sorted by construction.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.periods.len() && j < other.periods.len() {
            let (a, b) = (&self.periods[i], &other.periods[j]);
            if let Some(overlap) = a.overlapping_period(b) {
                out.push(overlap);
            }
            if a.coalesce_to() <= b.coalesce_to() {
                i += 1;
            } else {
                j += 1;
            }
        }
        Self::from_sorted_disjoint_unchecked(out)
    }

    /// The difference of two timelines: every region covered by `self` but
    /// not by `other`.
    ///
    /// Each of our periods is clipped against the overlapping periods of
    /// `other` in order: a left remainder is emitted before each subtracted
    /// region, and the sweep continues with the right remainder until the
    /// period is exhausted or no further subtrahend overlaps.
    #[must_use]
    pub fn except(&self, other: &Self) -> Self {
        let mut out = Vec::new();
        for period in &self.periods {
            let mut rest_from = period.from();
            let mut exhausted = false;
            for sub in &other.periods {
                if sub.coalesce_from() >= period.coalesce_to() {
                    break;
                }
                if sub.coalesce_to() <= rest_from.unwrap_or(T::MIN) {
                    continue;
                }
                if rest_from.unwrap_or(T::MIN) < sub.coalesce_from() {
                    out.push(Period::new_unchecked(rest_from, sub.from()));
                }
                if sub.coalesce_to() < period.coalesce_to() {
                    rest_from = sub.to();
                } else {
                    exhausted = true;
                    break;
                }
            }
            if !exhausted {
                out.push(Period::new_unchecked(rest_from, period.to()));
            }
        }
        Self::from_sorted_disjoint_unchecked(out)
    }
}

impl<T: TimePoint> IntoIterator for PeriodHistory<T> {
    type Item = Period<T>;
    type IntoIter = std::vec::IntoIter<Period<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.periods.into_iter()
    }
}

impl<'a, T: TimePoint> IntoIterator for &'a PeriodHistory<T> {
    type Item = &'a Period<T>;
    type IntoIter = std::slice::Iter<'a, Period<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.periods.iter()
    }
}

impl<T: TimePoint> fmt::Display for PeriodHistory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, p) in self.periods.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, "}}")
    }
}
