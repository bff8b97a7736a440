//! End-to-end bitemporal scenarios over calendar dates: store generations,
//! processor reconciliation, and repository interplay.

mod support;

use chrono::NaiveDate;
use support::month;
use tidemark_core::{
    BitemporalEvent, Error, ExecutionEvent, HistoryEventStore, NullRepository, Period,
    PeriodHistory, Repository, TimelineProcessor,
};

/// A staffing assignment: who covers a role, over which months.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Assignment {
    role: String,
    person: String,
    id: Option<u64>,
    knowledge: Option<Period<NaiveDate>>,
    execution: Period<NaiveDate>,
}

impl Assignment {
    fn draft(role: &str, person: &str, from: usize, to: usize) -> Self {
        Self {
            role: role.to_string(),
            person: person.to_string(),
            id: None,
            knowledge: None,
            execution: Period::between(month(from), month(to)).expect("valid execution"),
        }
    }

    fn stored(role: &str, person: &str, id: u64, known_since: usize, from: usize, to: usize) -> Self {
        Self {
            id: Some(id),
            knowledge: Some(Period::starting_at(month(known_since)).expect("valid knowledge")),
            ..Self::draft(role, person, from, to)
        }
    }
}

impl BitemporalEvent<NaiveDate> for Assignment {
    type Owner = String;

    fn owner(&self) -> &String {
        &self.role
    }

    fn knowledge_period(&self) -> Option<Period<NaiveDate>> {
        self.knowledge
    }

    fn set_knowledge_period(&mut self, period: Period<NaiveDate>) {
        self.knowledge = Some(period);
    }

    fn is_transient(&self) -> bool {
        self.id.is_none()
    }

    fn has_identical_properties(&self, other: &Self) -> bool {
        self.role == other.role && self.person == other.person
    }

    fn transient_clone(&self) -> Self {
        Self {
            id: None,
            knowledge: None,
            ..self.clone()
        }
    }

    fn is_mergeable_with(&self, other: &Self) -> bool {
        self.has_identical_properties(other) && self.execution == other.execution
    }
}

impl ExecutionEvent<NaiveDate, NaiveDate> for Assignment {
    fn execution_period(&self) -> Period<NaiveDate> {
        self.execution
    }

    fn set_execution_period(&mut self, period: Period<NaiveDate>) {
        self.execution = period;
    }
}

/// Repository that records what it was asked to persist.
#[derive(Debug, Default)]
struct Ledger {
    inserts: Vec<Assignment>,
    deletes: Vec<Assignment>,
}

impl Repository<Assignment> for Ledger {
    type Error = std::convert::Infallible;

    async fn insert(&mut self, event: &Assignment) -> Result<(), Self::Error> {
        self.inserts.push(event.clone());
        Ok(())
    }

    async fn delete(&mut self, event: &Assignment) -> Result<(), Self::Error> {
        self.deletes.push(event.clone());
        Ok(())
    }
}

#[test]
fn knowledge_from_is_monotonic_across_generations() {
    support::init_tracing();
    let mut store: HistoryEventStore<Assignment, NaiveDate> = HistoryEventStore::new(month(24));

    store
        .open(Assignment::draft("oncall", "ada", 0, 3), month(10))
        .expect("first generation open");
    let first = store.process_local(month(10)).expect("first process");
    let first_from = first.inserted[0]
        .knowledge
        .and_then(|kp| kp.from())
        .expect("open knowledge");

    // The watermark survives the generation reset.
    let err = store
        .open(Assignment::draft("oncall", "bob", 3, 6), month(8))
        .expect_err("regressing transaction time");
    assert!(matches!(err, Error::NonMonotonicTransaction { .. }));

    store
        .open(Assignment::draft("oncall", "bob", 3, 6), month(12))
        .expect("second generation open");
    let second = store.process_local(month(12)).expect("second process");
    let second_from = second.inserted[0]
        .knowledge
        .and_then(|kp| kp.from())
        .expect("open knowledge");
    assert!(first_from <= second_from);
}

#[tokio::test]
async fn create_then_delete_round_trips_to_unchanged_timeline() {
    let snapshot = vec![Assignment::stored("oncall", "ada", 1, 5, 0, 6)];
    let mut proc = TimelineProcessor::new(snapshot, None, None, month(20)).expect("snapshot");

    proc.create(Assignment::draft("oncall", "bob", 8, 12))
        .expect("create");
    proc.delete(Period::between(month(8), month(12)).expect("valid"))
        .expect("delete");

    let periods: Vec<_> = proc.actual_events().map(Assignment::execution_period).collect();
    assert_eq!(
        periods,
        vec![Period::between(month(0), month(6)).expect("valid")]
    );

    let mut repo = Ledger::default();
    let outcome = proc.process(&mut repo).await.expect("process");
    assert!(outcome.is_noop());
    assert!(repo.inserts.is_empty());
    assert!(repo.deletes.is_empty());
}

#[test]
fn disjoint_update_is_rejected() {
    let existing = Assignment::stored("oncall", "ada", 1, 5, 0, 3);
    let mut proc =
        TimelineProcessor::new(vec![existing.clone()], None, None, month(20)).expect("snapshot");
    let err = proc
        .update(
            &existing,
            Period::between(month(6), month(9)).expect("valid"),
            false,
        )
        .expect_err("no overlap");
    assert!(matches!(err, Error::DisjointUpdate { .. }));
}

#[tokio::test]
async fn replacing_coverage_persists_the_net_difference() {
    let snapshot = vec![Assignment::stored("oncall", "ada", 1, 5, 0, 12)];
    let mut proc = TimelineProcessor::new(snapshot, None, None, month(20)).expect("snapshot");

    proc.create(Assignment::draft("oncall", "bob", 4, 8))
        .expect("create");

    let mut repo = Ledger::default();
    let outcome = proc.process(&mut repo).await.expect("process");

    // ada's original row is closed; three rows now cover the year.
    assert_eq!(outcome.revised.len(), 1);
    assert_eq!(outcome.revised[0].person, "ada");
    assert_eq!(
        outcome.revised[0].knowledge,
        Some(Period::between(month(5), month(20)).expect("valid"))
    );
    let mut inserted: Vec<_> = repo
        .inserts
        .iter()
        .map(|a| (a.person.clone(), a.execution))
        .collect();
    inserted.sort();
    assert_eq!(
        inserted,
        vec![
            (
                "ada".to_string(),
                Period::between(month(0), month(4)).expect("valid")
            ),
            (
                "ada".to_string(),
                Period::between(month(8), month(12)).expect("valid")
            ),
            (
                "bob".to_string(),
                Period::between(month(4), month(8)).expect("valid")
            ),
        ]
    );
    assert!(repo.deletes.is_empty());
}

#[tokio::test]
async fn reference_and_permission_shape_the_rebuild() -> anyhow::Result<()> {
    support::init_tracing();
    let reference = PeriodHistory::new([Period::between(month(0), month(12))?])?;
    let permission = PeriodHistory::new([Period::between(month(3), month(9))?])?;
    let snapshot = vec![Assignment::stored("oncall", "ada", 1, 5, 0, 12)];
    let mut proc =
        TimelineProcessor::new(snapshot, Some(reference), Some(permission), month(20))?;

    // The write only lands inside [month 3, month 9).
    proc.create(Assignment::draft("oncall", "bob", 0, 12))?;
    let got: Vec<_> = proc
        .actual_events()
        .map(|a| (a.person.clone(), a.execution))
        .collect();
    assert_eq!(
        got,
        vec![
            (
                "ada".to_string(),
                Period::between(month(0), month(3)).expect("valid")
            ),
            (
                "bob".to_string(),
                Period::between(month(3), month(9)).expect("valid")
            ),
            (
                "ada".to_string(),
                Period::between(month(9), month(12)).expect("valid")
            ),
        ]
    );

    let outcome = proc.process(&mut NullRepository).await?;
    assert_eq!(outcome.inserted.len(), 3);
    assert_eq!(outcome.revised.len(), 1);
    Ok(())
}
