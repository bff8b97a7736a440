//! Execution-period-aware change processor over a bitemporal timeline.
//!
//! A [`TimelineProcessor`] holds one owner's actual events (the currently
//! believed timeline on the execution axis) and reconciles create, delete,
//! and update requests against it, constrained by two externally supplied
//! timelines:
//!
//! - the **reference history** defines where events may exist at all;
//!   regions without reference coverage are erased;
//! - the **permission history** defines where the current actor may write;
//!   unpermitted regions keep their existing content.
//!
//! Every change runs the same pipeline: decompose the execution axis at all
//! relevant breakpoints, decide each sub-interval's occupant, merge adjacent
//! identical sub-events back together, then diff the desired timeline
//! against the current one and emit the minimal set of knowledge-period
//! opens and closes to the owned [`HistoryEventStore`].

use super::store::{EventKey, HistoryEventStore, ProcessOutcome};
use super::{ExecutionEvent, Repository};
use crate::error::{Error, ProcessError};
use crate::period::history::PeriodHistory;
use crate::period::Period;
use crate::point::TimePoint;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, trace};

/// A breakpoint on the execution axis. `NegInf`/`PosInf` stand for the
/// unbounded ends so that sentinel values of `X` never appear in periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Cut<X> {
    NegInf,
    At(X),
    PosInf,
}

impl<X: TimePoint> Cut<X> {
    const fn start_bound(self) -> Option<X> {
        match self {
            Self::At(x) => Some(x),
            Self::NegInf | Self::PosInf => None,
        }
    }

    fn coalesce(self) -> X {
        match self {
            Self::NegInf => X::MIN,
            Self::At(x) => x,
            Self::PosInf => X::MAX,
        }
    }
}

/// One sub-interval of the rebuilt timeline and the event that should
/// occupy it.
struct Desired<E, X: TimePoint> {
    event: E,
    period: Period<X>,
}

enum Change<E, X: TimePoint> {
    Create(E),
    Erase(Period<X>),
}

struct Entry<E> {
    event: E,
    /// Key of the store entry when the event was opened this generation.
    key: Option<EventKey>,
}

/// Domain-facing API over one owner's bitemporal timeline.
pub struct TimelineProcessor<E, K, X>
where
    E: ExecutionEvent<K, X>,
    K: TimePoint,
    X: TimePoint,
{
    store: HistoryEventStore<E, K>,
    /// Actual events sorted by execution `coalesce_from`, pairwise
    /// disjoint on the execution axis.
    actual: Vec<Entry<E>>,
    reference: Option<PeriodHistory<X>>,
    permission: Option<PeriodHistory<X>>,
    tx: K,
}

impl<E, K, X> fmt::Debug for TimelineProcessor<E, K, X>
where
    E: ExecutionEvent<K, X>,
    K: TimePoint,
    X: TimePoint,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimelineProcessor")
            .field("reference", &self.reference)
            .field("permission", &self.permission)
            .field("tx", &self.tx)
            .finish_non_exhaustive()
    }
}

impl<E, K, X> TimelineProcessor<E, K, X>
where
    E: ExecutionEvent<K, X>,
    K: TimePoint,
    X: TimePoint,
{
    /// Build a processor from a snapshot of one owner's persisted events.
    ///
    /// Historical events (closed knowledge period) are validated and then
    /// ignored; the actual ones form the working timeline. `tx` doubles as
    /// the request timestamp of the owned store.
    ///
    /// # Errors
    ///
    /// Fails when the snapshot contains a transient event, events of more
    /// than one owner, a knowledge period inconsistent with `tx`, or
    /// actual events overlapping on the execution axis.
    pub fn new(
        snapshot: impl IntoIterator<Item = E>,
        reference: Option<PeriodHistory<X>>,
        permission: Option<PeriodHistory<X>>,
        tx: K,
    ) -> Result<Self, Error> {
        let mut actual: Vec<Entry<E>> = Vec::new();
        let mut owner: Option<E::Owner> = None;
        for event in snapshot {
            if event.is_transient() {
                return Err(Error::TransientEvent);
            }
            match &owner {
                None => owner = Some(event.owner().clone()),
                Some(o) if o == event.owner() => {}
                Some(_) => return Err(Error::MixedOwners),
            }
            let Some(knowledge) = event.knowledge_period() else {
                return Err(Error::InconsistentKnowledge {
                    period: "none".to_string(),
                    tx: format!("{tx:?}"),
                });
            };
            let from_ok = knowledge.from().is_some_and(|f| f <= tx);
            let to_ok = knowledge.to().is_none_or(|t| t <= tx);
            if !from_ok || !to_ok {
                return Err(Error::InconsistentKnowledge {
                    period: knowledge.to_string(),
                    tx: format!("{tx:?}"),
                });
            }
            if knowledge.to().is_none() {
                actual.push(Entry { event, key: None });
            }
        }
        actual.sort_by_key(|entry| entry.event.execution_period().coalesce_from());
        for pair in actual.windows(2) {
            let left = pair[0].event.execution_period();
            let right = pair[1].event.execution_period();
            if left.overlaps(&right) {
                return Err(Error::OverlappingActualEvents {
                    left: left.to_string(),
                    right: right.to_string(),
                });
            }
        }
        Ok(Self {
            store: HistoryEventStore::new(tx),
            actual,
            reference,
            permission,
            tx,
        })
    }

    /// The currently actual events, sorted by execution period.
    pub fn actual_events(&self) -> impl Iterator<Item = &E> {
        self.actual.iter().map(|entry| &entry.event)
    }

    /// The transaction time this processor stamps onto knowledge periods.
    #[must_use]
    pub const fn transaction_time(&self) -> K {
        self.tx
    }

    /// Write the requested event into the timeline over its execution
    /// period, replacing existing coverage and filling gaps wherever the
    /// permission history allows.
    ///
    /// # Errors
    ///
    /// The event must be transient; invariant violations in the underlying
    /// store propagate.
    pub fn create(&mut self, event: E) -> Result<(), Error> {
        self.create_impl(event, None)
    }

    /// [`Self::create`] under an explicit permission history, replacing the
    /// configured one for this call only.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create`].
    pub fn create_within(
        &mut self,
        event: E,
        permission: &PeriodHistory<X>,
    ) -> Result<(), Error> {
        self.create_impl(event, Some(permission))
    }

    /// Erase all permitted coverage inside `period`.
    ///
    /// # Errors
    ///
    /// Invariant violations in the underlying store propagate.
    pub fn delete(&mut self, period: Period<X>) -> Result<(), Error> {
        self.delete_impl(period, None)
    }

    /// [`Self::delete`] under an explicit permission history.
    ///
    /// # Errors
    ///
    /// Same as [`Self::delete`].
    pub fn delete_within(
        &mut self,
        period: Period<X>,
        permission: &PeriodHistory<X>,
    ) -> Result<(), Error> {
        self.delete_impl(period, Some(permission))
    }

    /// Move an actual event to a new execution period.
    ///
    /// Builds a payload-identical clone over `new_period` and delegates to
    /// [`Self::update_event`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::update_event`].
    pub fn update(&mut self, old: &E, new_period: Period<X>, sticky: bool) -> Result<(), Error> {
        let mut replacement = old.transient_clone();
        replacement.set_execution_period(new_period);
        self.update_event_impl(old, replacement, sticky, None)
    }

    /// [`Self::update`] under an explicit permission history.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update_event`].
    pub fn update_within(
        &mut self,
        old: &E,
        new_period: Period<X>,
        sticky: bool,
        permission: &PeriodHistory<X>,
    ) -> Result<(), Error> {
        let mut replacement = old.transient_clone();
        replacement.set_execution_period(new_period);
        self.update_event_impl(old, replacement, sticky, Some(permission))
    }

    /// Replace an actual event with a new one whose execution period must
    /// overlap the old one.
    ///
    /// The overlap becomes the new event. Vacated remainders of the old
    /// period are deleted, unless `sticky` is set and an
    /// execution-adjacent neighbor exists on that side, in which case the
    /// neighbor is cloned and stretched to absorb the remainder instead of
    /// leaving a hole.
    ///
    /// # Errors
    ///
    /// [`Error::ConcurrentUpdate`] when `old` is not (or no longer) among
    /// the persisted actual events; [`Error::DisjointUpdate`] when the two
    /// execution periods do not overlap; transience violations otherwise.
    pub fn update_event(&mut self, old: &E, new_event: E, sticky: bool) -> Result<(), Error> {
        self.update_event_impl(old, new_event, sticky, None)
    }

    /// [`Self::update_event`] under an explicit permission history.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update_event`].
    pub fn update_event_within(
        &mut self,
        old: &E,
        new_event: E,
        sticky: bool,
        permission: &PeriodHistory<X>,
    ) -> Result<(), Error> {
        self.update_event_impl(old, new_event, sticky, Some(permission))
    }

    /// Process the accumulated generation against the repository and
    /// consume the processor. One processor instance covers one unit of
    /// work; build a new one from a fresh snapshot afterwards.
    ///
    /// # Errors
    ///
    /// Engine invariant violations or repository failures.
    pub async fn process<R>(mut self, repo: &mut R) -> Result<ProcessOutcome<E>, ProcessError<R::Error>>
    where
        R: Repository<E>,
    {
        let tx = self.tx;
        self.store.process(tx, repo).await
    }

    /// Process the accumulated generation without a repository, returning
    /// the outcome for the caller to persist.
    ///
    /// # Errors
    ///
    /// Engine invariant violations.
    pub fn process_local(mut self) -> Result<ProcessOutcome<E>, Error> {
        let tx = self.tx;
        self.store.process_local(tx)
    }

    /// Release the owned store, e.g. to install hooks before processing.
    #[must_use]
    pub fn into_store(self) -> HistoryEventStore<E, K> {
        self.store
    }

    fn create_impl(&mut self, event: E, permission: Option<&PeriodHistory<X>>) -> Result<(), Error> {
        if !event.is_transient() {
            return Err(Error::PersistedEvent);
        }
        trace!(period = %event.execution_period(), "create");
        Self::rebuild(
            &mut self.actual,
            &mut self.store,
            self.reference.as_ref(),
            permission.or(self.permission.as_ref()),
            self.tx,
            &Change::Create(event),
        )
    }

    fn delete_impl(
        &mut self,
        period: Period<X>,
        permission: Option<&PeriodHistory<X>>,
    ) -> Result<(), Error> {
        trace!(period = %period, "delete");
        Self::rebuild(
            &mut self.actual,
            &mut self.store,
            self.reference.as_ref(),
            permission.or(self.permission.as_ref()),
            self.tx,
            &Change::Erase(period),
        )
    }

    fn update_event_impl(
        &mut self,
        old: &E,
        new_event: E,
        sticky: bool,
        permission: Option<&PeriodHistory<X>>,
    ) -> Result<(), Error> {
        if old.is_transient() {
            return Err(Error::TransientEvent);
        }
        if !new_event.is_transient() {
            return Err(Error::PersistedEvent);
        }
        let old_period = old.execution_period();
        let new_period = new_event.execution_period();

        // The target must still be among the persisted actual events;
        // anything else means a concurrent change superseded it.
        let still_actual = self.actual.iter().any(|entry| {
            !entry.event.is_transient()
                && entry.event.execution_period() == old_period
                && entry.event.has_identical_properties(old)
        });
        if !still_actual {
            return Err(Error::ConcurrentUpdate);
        }
        if !old_period.overlaps(&new_period) {
            return Err(Error::DisjointUpdate {
                old: old_period.to_string(),
                new: new_period.to_string(),
            });
        }

        // Execution-adjacent neighbors, captured before any mutation. With
        // ambiguous adjacency the first match in timeline order wins.
        let left_neighbor = self
            .actual
            .iter()
            .map(|entry| &entry.event)
            .find(|e| e.execution_period().coalesce_to() == old_period.coalesce_from())
            .cloned();
        let right_neighbor = self
            .actual
            .iter()
            .map(|entry| &entry.event)
            .find(|e| e.execution_period().coalesce_from() == old_period.coalesce_to())
            .cloned();

        let pre = (old_period.coalesce_from() < new_period.coalesce_from())
            .then(|| Period::new_unchecked(old_period.from(), new_period.from()));
        let post = (new_period.coalesce_to() < old_period.coalesce_to())
            .then(|| Period::new_unchecked(new_period.to(), old_period.to()));
        debug!(
            old = %old_period,
            new = %new_period,
            sticky,
            "update splits into pre/middle/post"
        );

        // The middle always becomes the new event.
        self.create_impl(new_event, permission)?;

        if let Some(pre_period) = pre {
            match (sticky, &left_neighbor) {
                (true, Some(neighbor)) => {
                    let mut stretched = neighbor.transient_clone();
                    stretched.set_execution_period(Period::new_unchecked(
                        neighbor.execution_period().from(),
                        pre_period.to(),
                    ));
                    self.create_impl(stretched, permission)?;
                }
                _ => self.delete_impl(pre_period, permission)?,
            }
        }
        if let Some(post_period) = post {
            match (sticky, &right_neighbor) {
                (true, Some(neighbor)) => {
                    let mut stretched = neighbor.transient_clone();
                    stretched.set_execution_period(Period::new_unchecked(
                        post_period.from(),
                        neighbor.execution_period().to(),
                    ));
                    self.create_impl(stretched, permission)?;
                }
                _ => self.delete_impl(post_period, permission)?,
            }
        }
        Ok(())
    }

    /// Rebuild the timeline for one change request: slice, decide, merge,
    /// then diff against the current actual events.
    fn rebuild(
        actual: &mut Vec<Entry<E>>,
        store: &mut HistoryEventStore<E, K>,
        reference: Option<&PeriodHistory<X>>,
        permission: Option<&PeriodHistory<X>>,
        tx: K,
        change: &Change<E, X>,
    ) -> Result<(), Error> {
        let target = match change {
            Change::Create(event) => event.execution_period(),
            Change::Erase(period) => *period,
        };

        // Breakpoints: the target's endpoints, every actual endpoint, and
        // every reference/permission endpoint. With a reference history the
        // infinities join in so uncovered outer regions get erased too.
        let mut cuts: BTreeSet<Cut<X>> = BTreeSet::new();
        let add = |cuts: &mut BTreeSet<Cut<X>>, period: &Period<X>| {
            cuts.insert(period.from().map_or(Cut::NegInf, Cut::At));
            cuts.insert(period.to().map_or(Cut::PosInf, Cut::At));
        };
        add(&mut cuts, &target);
        for entry in actual.iter() {
            add(&mut cuts, &entry.event.execution_period());
        }
        if let Some(reference) = reference {
            for period in reference {
                add(&mut cuts, period);
            }
            cuts.insert(Cut::NegInf);
            cuts.insert(Cut::PosInf);
        }
        if let Some(permission) = permission {
            for period in permission {
                add(&mut cuts, period);
            }
        }
        let cuts: Vec<Cut<X>> = cuts.into_iter().collect();

        // Decide each sub-interval's occupant.
        let mut desired: Vec<Desired<E, X>> = Vec::new();
        for pair in cuts.windows(2) {
            if pair[0].coalesce() >= pair[1].coalesce() {
                // Degenerate slice at a sentinel endpoint.
                continue;
            }
            let interval =
                Period::new_unchecked(pair[0].start_bound(), pair[1].start_bound());

            if !reference.is_none_or(|r| Self::covers(r, &interval)) {
                continue;
            }
            let existing = actual
                .iter()
                .find(|entry| entry.event.execution_period().contains(&interval));
            let permitted = permission.is_none_or(|p| Self::covers(p, &interval));
            let inside = target.contains(&interval);

            let occupant = match change {
                Change::Create(new_event) if inside && permitted => Some(new_event.clone()),
                Change::Erase(_) if inside && permitted => None,
                _ => existing.map(|entry| entry.event.clone()),
            };
            if let Some(event) = occupant {
                desired.push(Desired {
                    event,
                    period: interval,
                });
            }
        }

        // Renormalize: adjacent sub-events with identical payloads fuse.
        let mut merged: Vec<Desired<E, X>> = Vec::new();
        for item in desired {
            if let Some(last) = merged.last_mut() {
                if last.period.coalesce_to() == item.period.coalesce_from()
                    && last.event.has_identical_properties(&item.event)
                {
                    last.period = Period::new_unchecked(last.period.from(), item.period.to());
                    continue;
                }
            }
            merged.push(item);
        }

        Self::apply(actual, store, tx, merged)
    }

    /// Whether some period of `history` fully covers `period`.
    fn covers(history: &PeriodHistory<X>, period: &Period<X>) -> bool {
        history
            .period_at(period.coalesce_from())
            .is_some_and(|p| p.contains(period))
    }

    /// Diff the desired timeline against the current actual events,
    /// emitting the minimal set of opens and closes.
    fn apply(
        actual: &mut Vec<Entry<E>>,
        store: &mut HistoryEventStore<E, K>,
        tx: K,
        desired: Vec<Desired<E, X>>,
    ) -> Result<(), Error> {
        let mut originals: VecDeque<Entry<E>> = std::mem::take(actual).into();
        let mut desired: VecDeque<Desired<E, X>> = desired.into();
        let mut next: Vec<Entry<E>> = Vec::with_capacity(desired.len());

        while !(originals.is_empty() && desired.is_empty()) {
            let step = match (originals.front(), desired.front()) {
                (Some(original), Some(want)) => {
                    let period = original.event.execution_period();
                    if period == want.period
                        && original.event.has_identical_properties(&want.event)
                    {
                        Step::Carry
                    } else if period.coalesce_from() < want.period.coalesce_from() {
                        Step::Close
                    } else if want.period.coalesce_from() < period.coalesce_from() {
                        Step::Open
                    } else {
                        Step::Replace
                    }
                }
                (Some(_), None) => Step::Close,
                (None, Some(_)) => Step::Open,
                (None, None) => break,
            };
            match step {
                Step::Carry => {
                    if let Some(entry) = originals.pop_front() {
                        next.push(entry);
                    }
                    desired.pop_front();
                }
                Step::Close => {
                    if let Some(entry) = originals.pop_front() {
                        Self::close_entry(store, tx, entry)?;
                    }
                }
                Step::Open => {
                    if let Some(want) = desired.pop_front() {
                        next.push(Self::open_desired(store, tx, want)?);
                    }
                }
                Step::Replace => {
                    if let Some(entry) = originals.pop_front() {
                        Self::close_entry(store, tx, entry)?;
                    }
                    if let Some(want) = desired.pop_front() {
                        next.push(Self::open_desired(store, tx, want)?);
                    }
                }
            }
        }
        *actual = next;
        Ok(())
    }

    fn close_entry(
        store: &mut HistoryEventStore<E, K>,
        tx: K,
        entry: Entry<E>,
    ) -> Result<(), Error> {
        match entry.key {
            Some(key) => store.close(key, tx),
            None => store.close_event(entry.event, tx).map(|_| ()),
        }
    }

    fn open_desired(
        store: &mut HistoryEventStore<E, K>,
        tx: K,
        want: Desired<E, X>,
    ) -> Result<Entry<E>, Error> {
        let mut event = want.event.transient_clone();
        event.set_execution_period(want.period);
        event.set_knowledge_period(Period::starting_at(tx)?);
        let key = store.open(event.clone(), tx)?;
        Ok(Entry {
            event,
            key: Some(key),
        })
    }
}

enum Step {
    Carry,
    Close,
    Open,
    Replace,
}
