#![forbid(unsafe_code)]
//! tidemark-core library.
//!
//! Half-open interval algebra over generic time points, and a bitemporal
//! event history engine built on top of it.
//!
//! - [`period::Period`]: one half-open `[from, to)` interval, possibly
//!   unbounded on either end.
//! - [`period::history::PeriodHistory`]: a sorted, non-overlapping
//!   timeline with intersection and subtraction.
//! - [`period::multi::PeriodMultiHistory`]: an overlapping period set with
//!   interval-tree queries and optimal covering computation.
//! - [`event`]: bitemporal event contracts, the knowledge-period ledger
//!   ([`event::store::HistoryEventStore`]), and the execution-period change
//!   processor ([`event::processor::TimelineProcessor`]).
//!
//! # Conventions
//!
//! - **Errors**: Fallible engine operations return [`error::Error`];
//!   repository-facing calls return [`error::ProcessError`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`,
//!   `debug!`, `trace!`).

pub mod error;
pub mod event;
pub mod period;
pub mod point;

pub use error::{Error, ProcessError};
pub use event::processor::TimelineProcessor;
pub use event::store::{EventKey, HistoryEventStore, ProcessOutcome};
pub use event::{BitemporalEvent, ExecutionEvent, NullRepository, Repository};
pub use period::history::PeriodHistory;
pub use period::multi::PeriodMultiHistory;
pub use period::{InvalidPeriod, Period};
pub use point::TimePoint;
