//! Error taxonomy for the interval and bitemporal engine.
//!
//! Two kinds of failure exist and deliberately stay apart:
//!
//! - [`InvalidPeriod`](crate::period::InvalidPeriod): a caller-facing
//!   validation failure (a period whose start is not before its end). These
//!   are recoverable and can be collected in batches before being surfaced.
//! - [`Error`]: an invariant violation inside a timeline, store, or
//!   processor. These indicate a bug in the caller or the engine, abort the
//!   current unit of work, and are never retried by the engine itself.
//!
//! Invariant errors render the offending periods as display strings rather
//! than carrying the generic point type, so a single error enum serves both
//! time axes.

use thiserror::Error;

/// Invariant violations raised by timelines, the event store, and the
/// processor.
///
/// Callers should treat every variant except [`Error::ConcurrentUpdate`] as
/// fatal to the current unit of work. `ConcurrentUpdate` is the
/// optimistic-concurrency signal: the targeted event was superseded by
/// another change, and the caller may re-fetch and reapply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A period failed the `from < to` check.
    #[error("invalid period: start {from} is not before end {to}")]
    InvalidPeriod {
        /// Rendered start bound (`..` when unbounded).
        from: String,
        /// Rendered end bound (`..` when unbounded).
        to: String,
    },

    /// Two periods supplied to a non-overlapping timeline overlap.
    #[error("overlapping periods in timeline: {left} and {right}")]
    OverlappingPeriods {
        /// Rendered earlier period.
        left: String,
        /// Rendered later period.
        right: String,
    },

    /// Two actual events of the same owner overlap on the execution axis.
    #[error("actual events overlap on the execution axis: {left} and {right}")]
    OverlappingActualEvents {
        /// Rendered execution period of the earlier event.
        left: String,
        /// Rendered execution period of the later event.
        right: String,
    },

    /// A transaction time went backwards within or across generations.
    #[error("transaction time {tx} precedes the previous transaction time {last}")]
    NonMonotonicTransaction {
        /// Rendered offending transaction time.
        tx: String,
        /// Rendered previous transaction time.
        last: String,
    },

    /// A transaction time lies after the request timestamp.
    #[error("transaction time {tx} is after the request timestamp {now}")]
    TransactionAfterNow {
        /// Rendered offending transaction time.
        tx: String,
        /// Rendered request timestamp.
        now: String,
    },

    /// An event key does not refer to a live entry of the current
    /// generation.
    #[error("event key {0} does not belong to the current generation")]
    UnknownEventKey(usize),

    /// A knowledge period is missing, already closed, or extends past the
    /// transaction time.
    #[error("knowledge period {period} is inconsistent with transaction time {tx}")]
    InconsistentKnowledge {
        /// Rendered knowledge period (`none` when absent).
        period: String,
        /// Rendered transaction time.
        tx: String,
    },

    /// A persisted event was supplied where a transient one is required.
    #[error("expected a transient event, found a persisted one")]
    PersistedEvent,

    /// A transient event was supplied where a persisted one is required.
    #[error("expected a persisted event, found a transient one")]
    TransientEvent,

    /// Events of more than one owner were supplied to a single-owner
    /// processor.
    #[error("snapshot contains events of more than one owner")]
    MixedOwners,

    /// The execution periods of an update pair do not overlap.
    #[error("update execution periods {old} and {new} do not overlap")]
    DisjointUpdate {
        /// Rendered execution period of the event being updated.
        old: String,
        /// Rendered requested execution period.
        new: String,
    },

    /// The event targeted by an update is no longer actual: another change
    /// superseded it first.
    #[error("event is no longer actual; it was superseded by a concurrent change")]
    ConcurrentUpdate,

    /// More than two knowledge-period merge candidates matched at process
    /// time, which indicates a corrupt timeline.
    #[error("more than two merge candidates anchored at {tx}; timeline is corrupt")]
    AmbiguousMerge {
        /// Rendered transaction time of the generation.
        tx: String,
    },
}

/// Failure of a [`process`](crate::event::store::HistoryEventStore::process) call:
/// either an engine invariant violation or a repository I/O failure.
#[derive(Debug, Error)]
pub enum ProcessError<R: std::error::Error> {
    /// The engine detected an invariant violation.
    #[error(transparent)]
    Engine(#[from] Error),

    /// The repository collaborator failed.
    #[error("repository failure: {0}")]
    Repository(R),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_rendered_periods() {
        let err = Error::OverlappingPeriods {
            left: "[1, 5)".to_string(),
            right: "[3, 9)".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("[1, 5)"));
        assert!(msg.contains("[3, 9)"));
    }

    #[test]
    fn concurrent_update_is_distinguishable() {
        let err = Error::ConcurrentUpdate;
        assert!(matches!(err, Error::ConcurrentUpdate));
        assert!(err.to_string().contains("concurrent"));
    }
}
