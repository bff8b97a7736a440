//! Point type contract for period endpoints.
//!
//! A [`TimePoint`] is any totally ordered, copyable value that can serve as
//! an instant on a time axis. Unbounded period endpoints are modelled as
//! `Option::None` on [`Period`](crate::period::Period) and are substituted
//! with the `MIN`/`MAX` sentinels only at comparison time, so the sentinels
//! never need to be representable in stored data.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;
use std::hash::Hash;

/// An orderable instant usable as a period endpoint.
///
/// `MIN` and `MAX` are coalescing sentinels: `MIN` stands in for an
/// unbounded start (−∞) and `MAX` for an unbounded end (+∞) during
/// comparisons. They must satisfy `MIN < MAX` and bound every other value
/// of the type.
pub trait TimePoint: Copy + Ord + Eq + Hash + fmt::Debug {
    /// Sentinel for an unbounded start.
    const MIN: Self;
    /// Sentinel for an unbounded end.
    const MAX: Self;
}

macro_rules! impl_time_point_for_int {
    ($($t:ty),+ $(,)?) => {
        $(
            impl TimePoint for $t {
                const MIN: Self = <$t>::MIN;
                const MAX: Self = <$t>::MAX;
            }
        )+
    };
}

impl_time_point_for_int!(i32, i64, u32, u64);

impl TimePoint for NaiveDate {
    const MIN: Self = Self::MIN;
    const MAX: Self = Self::MAX;
}

impl TimePoint for NaiveDateTime {
    const MIN: Self = Self::MIN;
    const MAX: Self = Self::MAX;
}

impl TimePoint for DateTime<Utc> {
    const MIN: Self = Self::MIN_UTC;
    const MAX: Self = Self::MAX_UTC;
}
