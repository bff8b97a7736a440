//! Monthly-grid string codec shared by the integration tests.
//!
//! A timeline is written as one character per month starting at the origin
//! month (January 2020): `X` covered, `_` gap, a trailing `.` extends the
//! covered run to +infinity, and a leading `.` extends it from -infinity.

#![allow(dead_code)]

use chrono::NaiveDate;
use std::sync::Once;
use tidemark_core::{Period, PeriodHistory};

/// Route engine tracing into the test writer. Idempotent.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

pub const ORIGIN_YEAR: i32 = 2020;

/// The first day of grid month `index`.
pub fn month(index: usize) -> NaiveDate {
    let year = ORIGIN_YEAR + i32::try_from(index / 12).expect("small index");
    let month = u32::try_from(index % 12).expect("small index") + 1;
    NaiveDate::from_ymd_opt(year, month, 1).expect("valid grid month")
}

fn month_index(date: NaiveDate) -> usize {
    use chrono::Datelike;
    let years = usize::try_from(date.year() - ORIGIN_YEAR).expect("date at or after origin");
    years * 12 + usize::try_from(date.month() - 1).expect("valid month")
}

/// Parse a grid string into its covered periods, in order.
pub fn parse_periods(grid: &str) -> Vec<Period<NaiveDate>> {
    let chars: Vec<char> = grid.chars().collect();
    let mut periods = Vec::new();
    // The `from` bound of the run currently being scanned.
    let mut run: Option<Option<NaiveDate>> = None;
    for (i, c) in chars.iter().enumerate() {
        match c {
            'X' => {
                if run.is_none() {
                    run = Some(Some(month(i)));
                }
            }
            '_' => {
                if let Some(from) = run.take() {
                    periods.push(Period::new(from, Some(month(i))).expect("valid grid run"));
                }
            }
            '.' if i == 0 => run = Some(None),
            '.' => {
                assert_eq!(i, chars.len() - 1, "'.' must start or end the grid: {grid}");
                let from = run.take().unwrap_or(Some(month(i)));
                periods.push(Period::new(from, None).expect("valid grid run"));
            }
            other => panic!("unsupported grid character {other:?} in {grid}"),
        }
    }
    if let Some(from) = run {
        periods.push(Period::new(from, Some(month(chars.len()))).expect("valid grid run"));
    }
    periods
}

/// Parse a grid string into a disjoint timeline.
pub fn parse(grid: &str) -> PeriodHistory<NaiveDate> {
    PeriodHistory::new(parse_periods(grid)).expect("grid runs are disjoint")
}

/// Render sorted disjoint periods back onto the grid. Trailing gaps are
/// omitted; an unbounded end renders as `.` and terminates the string.
pub fn render(periods: &[Period<NaiveDate>]) -> String {
    let mut out = String::new();
    let mut cursor = 0;
    for period in periods {
        match period.from() {
            None => out.push('.'),
            Some(from) => {
                while cursor < month_index(from) {
                    out.push('_');
                    cursor += 1;
                }
            }
        }
        match period.to() {
            None => {
                out.push('.');
                return out;
            }
            Some(to) => {
                while cursor < month_index(to) {
                    out.push('X');
                    cursor += 1;
                }
            }
        }
    }
    out
}
