//! Overlapping period sets backed by a centered interval tree.
//!
//! A [`PeriodMultiHistory`] accepts arbitrary, possibly overlapping periods
//! and answers point and range overlap queries in `O(log n + k)` for
//! balanced inputs. Each tree node picks its `center` as the lower median
//! of all coalesced endpoints of the node's periods: periods straddling the
//! center live in the node's `inner` list, the rest are split into the left
//! (wholly before) and right (wholly after) subtrees.
//!
//! Both recursion guards of the query walk are evaluated independently of
//! one another; periods that exactly touch a center are captured by the
//! `inner` list of that node and never double-counted.

use super::Period;
use crate::point::TimePoint;

/// An immutable set of possibly overlapping periods with tree-backed range
/// queries.
#[derive(Debug, Clone)]
pub struct PeriodMultiHistory<T: TimePoint> {
    root: Option<Box<RangeTreeNode<T>>>,
    len: usize,
}

#[derive(Debug, Clone)]
struct RangeTreeNode<T: TimePoint> {
    center: T,
    /// Periods containing `center`, i.e. `from <= center < to`.
    inner: Vec<Period<T>>,
    /// Periods wholly before the center (`to <= center`).
    left: Option<Box<RangeTreeNode<T>>>,
    /// Periods wholly after the center (`from > center`).
    right: Option<Box<RangeTreeNode<T>>>,
}

impl<T: TimePoint> PeriodMultiHistory<T> {
    /// Build the tree from any collection of periods. Overlap is allowed.
    #[must_use]
    pub fn new(periods: impl IntoIterator<Item = Period<T>>) -> Self {
        let periods: Vec<Period<T>> = periods.into_iter().collect();
        let len = periods.len();
        Self {
            root: RangeTreeNode::build(periods),
            len,
        }
    }

    /// Number of periods in the set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the set is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All periods containing `date`. Order is unspecified.
    #[must_use]
    pub fn periods_at(&self, date: T) -> Vec<Period<T>> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            root.collect_at(date, &mut out);
        }
        out
    }

    /// All periods overlapping the half-open range `[start, end)`. Order is
    /// unspecified; empty when `end <= start`.
    #[must_use]
    pub fn periods_overlapping(&self, start: T, end: T) -> Vec<Period<T>> {
        let mut out = Vec::new();
        if end <= start {
            return out;
        }
        if let Some(root) = &self.root {
            root.collect_overlapping(start, end, &mut out);
        }
        out
    }

    /// The minimal sorted set of maximal merged periods whose union equals
    /// the union of all input periods.
    ///
    /// Computed bottom-up: each node merges its children's covering lists
    /// with a covering period seeded from its `inner` periods, greedily
    /// absorbing adjacent neighbors that overlap or touch the seed.
    /// Touching halves (`[a, b)` and `[b, c)`) merge into one.
    #[must_use]
    pub fn optimal_covering_periods(&self) -> Vec<Period<T>> {
        self.root
            .as_ref()
            .map(|root| root.covering_periods())
            .unwrap_or_default()
    }
}

impl<T: TimePoint> RangeTreeNode<T> {
    fn build(periods: Vec<Period<T>>) -> Option<Box<Self>> {
        if periods.is_empty() {
            return None;
        }
        let mut endpoints: Vec<T> = periods
            .iter()
            .flat_map(|p| [p.coalesce_from(), p.coalesce_to()])
            .collect();
        endpoints.sort_unstable();
        // Lower median: guarantees at least one period lands in `inner` or
        // both sides shrink, so recursion terminates.
        let center = endpoints[(endpoints.len() - 1) / 2];

        let mut inner = Vec::new();
        let mut left = Vec::new();
        let mut right = Vec::new();
        for p in periods {
            if p.coalesce_to() <= center {
                left.push(p);
            } else if center < p.coalesce_from() {
                right.push(p);
            } else {
                inner.push(p);
            }
        }
        Some(Box::new(Self {
            center,
            inner,
            left: Self::build(left),
            right: Self::build(right),
        }))
    }

    fn collect_at(&self, date: T, out: &mut Vec<Period<T>>) {
        out.extend(self.inner.iter().filter(|p| p.contains_point(date)));
        if self.center < date {
            if let Some(right) = &self.right {
                right.collect_at(date, out);
            }
        }
        if date < self.center {
            if let Some(left) = &self.left {
                left.collect_at(date, out);
            }
        }
    }

    fn collect_overlapping(&self, start: T, end: T, out: &mut Vec<Period<T>>) {
        out.extend(
            self.inner
                .iter()
                .filter(|p| p.coalesce_from() < end && start < p.coalesce_to()),
        );
        if self.center < end {
            if let Some(right) = &self.right {
                right.collect_overlapping(start, end, out);
            }
        }
        if start < self.center {
            if let Some(left) = &self.left {
                left.collect_overlapping(start, end, out);
            }
        }
    }

    fn covering_periods(&self) -> Vec<Period<T>> {
        let mut left = self
            .left
            .as_ref()
            .map(|n| n.covering_periods())
            .unwrap_or_default();
        let right = self
            .right
            .as_ref()
            .map(|n| n.covering_periods())
            .unwrap_or_default();

        // Left and right cover disjoint halves separated by the center, so
        // with no straddling periods the two lists concatenate as-is.
        let Some(mut seed) = self.inner_cover() else {
            left.extend(right);
            return left;
        };

        // Absorb the left tail while it overlaps or touches the seed.
        while let Some(last) = left.last() {
            if last.coalesce_to() < seed.coalesce_from() {
                break;
            }
            if last.coalesce_from() < seed.coalesce_from() {
                seed = Period::new_unchecked(last.from(), seed.to());
            }
            left.pop();
        }

        // Absorb the right head symmetrically.
        let mut rest = 0;
        while let Some(head) = right.get(rest) {
            if seed.coalesce_to() < head.coalesce_from() {
                break;
            }
            if seed.coalesce_to() < head.coalesce_to() {
                seed = Period::new_unchecked(seed.from(), head.to());
            }
            rest += 1;
        }

        left.push(seed);
        left.extend(right.into_iter().skip(rest));
        left
    }

    /// The combined `[min(from), max(to))` of the node's inner periods, all
    /// of which straddle the center and therefore merge into one.
    fn inner_cover(&self) -> Option<Period<T>> {
        let mut iter = self.inner.iter();
        let first = iter.next()?;
        let (mut from, mut to) = (first.from(), first.to());
        for p in iter {
            if p.coalesce_from() < from.unwrap_or(T::MIN) {
                from = p.from();
            }
            if to.unwrap_or(T::MAX) < p.coalesce_to() {
                to = p.to();
            }
        }
        Some(Period::new_unchecked(from, to))
    }
}
