//! Shared in-crate test event over integer time axes.

use super::{BitemporalEvent, ExecutionEvent};
use crate::period::Period;

/// Minimal execution-aware event: string payload, integer axes, optional
/// numeric identity standing in for a database key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestEvent {
    pub owner: &'static str,
    pub payload: String,
    pub id: Option<u32>,
    pub knowledge: Option<Period<i64>>,
    pub execution: Period<i64>,
}

impl TestEvent {
    /// A transient event with no identity and no knowledge period.
    pub fn transient(owner: &'static str, payload: &str, from: i64, to: i64) -> Self {
        Self {
            owner,
            payload: payload.to_string(),
            id: None,
            knowledge: None,
            execution: Period::between(from, to).expect("valid execution period"),
        }
    }

    /// A persisted actual event: identity assigned, knowledge open since
    /// `known_since`.
    pub fn persisted(
        owner: &'static str,
        payload: &str,
        id: u32,
        known_since: i64,
        from: i64,
        to: i64,
    ) -> Self {
        Self {
            owner,
            payload: payload.to_string(),
            id: Some(id),
            knowledge: Some(Period::starting_at(known_since).expect("valid knowledge period")),
            execution: Period::between(from, to).expect("valid execution period"),
        }
    }
}

impl BitemporalEvent<i64> for TestEvent {
    type Owner = &'static str;

    fn owner(&self) -> &Self::Owner {
        &self.owner
    }

    fn knowledge_period(&self) -> Option<Period<i64>> {
        self.knowledge
    }

    fn set_knowledge_period(&mut self, period: Period<i64>) {
        self.knowledge = Some(period);
    }

    fn is_transient(&self) -> bool {
        self.id.is_none()
    }

    fn has_identical_properties(&self, other: &Self) -> bool {
        self.owner == other.owner && self.payload == other.payload
    }

    fn transient_clone(&self) -> Self {
        Self {
            owner: self.owner,
            payload: self.payload.clone(),
            id: None,
            knowledge: None,
            execution: self.execution,
        }
    }

    fn is_mergeable_with(&self, other: &Self) -> bool {
        self.has_identical_properties(other) && self.execution == other.execution
    }
}

impl ExecutionEvent<i64, i64> for TestEvent {
    fn execution_period(&self) -> Period<i64> {
        self.execution
    }

    fn set_execution_period(&mut self, period: Period<i64>) {
        self.execution = period;
    }
}
