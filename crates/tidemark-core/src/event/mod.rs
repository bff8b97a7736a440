//! Bitemporal event contracts.
//!
//! Events carry two independent time axes: the **knowledge period** (audit
//! axis: from when a fact was recorded until it was superseded; an open
//! end means "currently believed") and, for execution-aware events, the
//! **execution period** (domain axis: when the fact is in force).
//!
//! The engine is storage-agnostic: events implement [`BitemporalEvent`] /
//! [`ExecutionEvent`], and persistence is delegated to a [`Repository`]
//! collaborator invoked only at process time. The engine never queries the
//! repository.

pub mod processor;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use crate::period::Period;
use crate::point::TimePoint;
use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;

/// A domain event versioned along the knowledge axis.
///
/// `K` is the knowledge-axis point type. Implementations supply the payload
/// semantics; the engine only reads and rewrites the periods.
pub trait BitemporalEvent<K: TimePoint>: Clone {
    /// The aggregate key grouping events at process time. Ownership is by
    /// value equality, not exclusive pointers.
    type Owner: Clone + Eq + Hash + fmt::Debug;

    /// The owner this event belongs to.
    fn owner(&self) -> &Self::Owner;

    /// The knowledge period, or `None` for a transient event that has not
    /// been opened yet.
    fn knowledge_period(&self) -> Option<Period<K>>;

    /// Replace the knowledge period. Only the engine calls this.
    fn set_knowledge_period(&mut self, period: Period<K>);

    /// Whether the event has no persisted identity yet.
    fn is_transient(&self) -> bool;

    /// Payload equality ignoring both periods. Drives knowledge-period
    /// merging and the minimal-diff apply walk.
    fn has_identical_properties(&self, other: &Self) -> bool;

    /// A copy without persisted identity or knowledge period, used when a
    /// sub-interval of an existing event must become a new row.
    fn transient_clone(&self) -> Self;

    /// Equality used by the store's knowledge-period merge step. The
    /// default is payload equality; execution-aware implementations must
    /// additionally require equal execution periods.
    fn is_mergeable_with(&self, other: &Self) -> bool {
        self.has_identical_properties(other)
    }
}

/// A bitemporal event that is additionally in force over an execution
/// period on the domain axis `X`.
pub trait ExecutionEvent<K: TimePoint, X: TimePoint>: BitemporalEvent<K> {
    /// When the fact applies in the domain.
    fn execution_period(&self) -> Period<X>;

    /// Replace the execution period. Only the engine calls this.
    fn set_execution_period(&mut self, period: Period<X>);
}

/// Persistence collaborator, used exclusively at process time.
///
/// Calls are async so process can overlap I/O; there is no internal
/// parallelism. Cancellation is cooperative: dropping the `process` future
/// abandons the in-memory generation, and the caller must discard the
/// store/processor instance.
pub trait Repository<E> {
    /// Repository failure type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist a newly created event row.
    fn insert(&mut self, event: &E) -> impl Future<Output = Result<(), Self::Error>>;

    /// Remove a persisted event row.
    fn delete(&mut self, event: &E) -> impl Future<Output = Result<(), Self::Error>>;
}

/// A repository that persists nothing. Useful when the caller consumes the
/// [`ProcessOutcome`](store::ProcessOutcome) directly instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRepository;

impl<E> Repository<E> for NullRepository {
    type Error = Infallible;

    async fn insert(&mut self, _event: &E) -> Result<(), Infallible> {
        Ok(())
    }

    async fn delete(&mut self, _event: &E) -> Result<(), Infallible> {
        Ok(())
    }
}
