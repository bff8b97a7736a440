//! Timeline algebra over the monthly grid: intersection, subtraction, and
//! optimal covering, driven by grid-string fixtures.

mod support;

use support::{month, parse, parse_periods, render};
use tidemark_core::{Period, PeriodHistory, PeriodMultiHistory};

#[test]
fn overlapping_input_is_rejected() {
    let overlapping = vec![
        Period::between(month(0), month(3)).expect("valid"),
        Period::between(month(2), month(5)).expect("valid"),
    ];
    assert!(PeriodHistory::new(overlapping).is_err());
}

#[test]
fn touching_runs_are_accepted() {
    let touching = vec![
        Period::between(month(0), month(3)).expect("valid"),
        Period::between(month(3), month(5)).expect("valid"),
    ];
    let history = PeriodHistory::new(touching).expect("touching is not overlap");
    assert_eq!(history.len(), 2);
}

#[test]
fn intersect_fixtures() {
    assert_eq!(parse("XX").intersect(&parse("__")), parse("__"));
    assert_eq!(parse("_XX_").intersect(&parse("X_XX")), parse("__X_"));
}

#[test]
fn intersect_is_commutative_on_fixtures() {
    let a = parse("_XX_");
    let b = parse("X_XX");
    assert_eq!(a.intersect(&b), b.intersect(&a));
}

#[test]
fn except_fixtures() {
    assert_eq!(parse("XXXX_").except(&parse("_XXX_")), parse("X____"));
    assert_eq!(parse("XXX__").except(&parse("__XX_")), parse("XX___"));
}

#[test]
fn except_of_self_is_empty() {
    let history = parse("_XXX_X");
    assert!(history.except(&history).is_empty());
}

#[test]
fn intersect_with_unbounded_operand() {
    // (-inf, month 4) against [month 1, month 5).
    let open_start = parse(".XXX");
    let bounded = parse("_XXXX");
    assert_eq!(open_start.intersect(&bounded), parse("_XXX"));
}

#[test]
fn except_carving_a_hole_splits_the_period() {
    assert_eq!(parse("XXXXX").except(&parse("__X__")), parse("XX_XX"));
}

#[test]
fn covering_merges_into_single_maximal_period() {
    let multi = PeriodMultiHistory::new(parse_periods("__XXXXXX_"));
    assert_eq!(render(&multi.optimal_covering_periods()), "__XXXXXX");
}

#[test]
fn covering_with_open_end() {
    let multi = PeriodMultiHistory::new(parse_periods("__XXXXXX."));
    assert_eq!(render(&multi.optimal_covering_periods()), "__.");
}

#[test]
fn covering_of_overlapping_runs() {
    let periods = vec![
        Period::between(month(2), month(6)).expect("valid"),
        Period::between(month(4), month(8)).expect("valid"),
        Period::between(month(8), month(9)).expect("valid"),
        Period::between(month(11), month(12)).expect("valid"),
    ];
    let multi = PeriodMultiHistory::new(periods);
    assert_eq!(
        render(&multi.optimal_covering_periods()),
        "__XXXXXXX__X"
    );
}

#[test]
fn nearest_neighbor_lookups() {
    let history = parse("_XX__XX_");
    let may_2020 = month(4);
    assert!(history.period_at(may_2020).is_none());
    assert_eq!(
        history.period_at_or_immediately_after(may_2020),
        Some(&Period::between(month(5), month(7)).expect("valid"))
    );
    assert_eq!(
        history.period_at_or_immediately_before(may_2020),
        Some(&Period::between(month(1), month(3)).expect("valid"))
    );
}

#[test]
fn period_serde_round_trip() {
    let period = Period::between(month(0), month(3)).expect("valid");
    let json = serde_json::to_string(&period).expect("serialize");
    let back: Period<chrono::NaiveDate> = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, period);
}

#[test]
fn period_serde_rejects_inverted_bounds() {
    let json = r#"{"from":"2020-04-01","to":"2020-01-01"}"#;
    let err = serde_json::from_str::<Period<chrono::NaiveDate>>(json);
    assert!(err.is_err());
}
