//! Per-generation ledger of knowledge-period transitions.
//!
//! A [`HistoryEventStore`] batches `open`/`close` calls per owner and
//! normalizes them at process time into the minimal set of persisted rows:
//! events opened and closed within the same generation vanish, and a close
//! immediately followed by an identical re-open collapses back into the
//! original row.
//!
//! One store instance is scoped to one logical unit of work. It is not
//! designed for concurrent mutation; correctness relies on a single writer
//! per owner per generation.

use super::{BitemporalEvent, Repository};
use crate::error::{Error, ProcessError};
use crate::period::Period;
use crate::point::TimePoint;
use std::collections::HashMap;
use tracing::debug;

/// Opaque handle to an event tracked by the current generation. Keys are
/// invalidated when the generation is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey(usize);

/// Net persistence result of one processed generation.
///
/// `inserted` and `deleted` were already handed to the repository;
/// `revised` carries persisted events whose knowledge period was rewritten
/// (closed, or re-opened by the merge step); the engine is
/// storage-agnostic, so saving those rows is the caller's job.
#[derive(Debug, Clone)]
pub struct ProcessOutcome<E> {
    /// Newly persisted rows (previously transient survivors).
    pub inserted: Vec<E>,
    /// Previously persisted rows removed from storage.
    pub deleted: Vec<E>,
    /// Previously persisted rows whose knowledge period changed.
    pub revised: Vec<E>,
}

impl<E> Default for ProcessOutcome<E> {
    fn default() -> Self {
        Self {
            inserted: Vec::new(),
            deleted: Vec::new(),
            revised: Vec::new(),
        }
    }
}

impl<E> ProcessOutcome<E> {
    /// Whether the generation produced no persistence work at all.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.inserted.is_empty() && self.deleted.is_empty() && self.revised.is_empty()
    }
}

enum Slot<E> {
    Live(E),
    /// Persisted event whose knowledge period collapsed to empty this
    /// generation; queued for repository deletion.
    PendingDelete(E),
    Dropped,
}

type OwnerHook<E, O> = Box<dyn FnMut(&O, &[E])>;

/// The per-owner ledger of knowledge-period open/close operations.
pub struct HistoryEventStore<E, K>
where
    E: BitemporalEvent<K>,
    K: TimePoint,
{
    /// Request timestamp: the upper bound for every transaction time.
    now: K,
    /// Highest transaction time seen. Survives generation resets so
    /// knowledge periods stay monotonic across generations.
    watermark: Option<K>,
    slots: Vec<Slot<E>>,
    /// Owners in first-touch order; process iterates in this order.
    owner_order: Vec<E::Owner>,
    owner_hook: Option<OwnerHook<E, E::Owner>>,
    process_hook: Option<Box<dyn FnMut()>>,
}

impl<E, K> HistoryEventStore<E, K>
where
    E: BitemporalEvent<K>,
    K: TimePoint,
{
    /// Create a store bound to the request timestamp `now`.
    #[must_use]
    pub fn new(now: K) -> Self {
        Self {
            now,
            watermark: None,
            slots: Vec::new(),
            owner_order: Vec::new(),
            owner_hook: None,
            process_hook: None,
        }
    }

    /// The request timestamp this store was constructed with.
    #[must_use]
    pub const fn now(&self) -> K {
        self.now
    }

    /// Number of events tracked in the current generation.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| !matches!(s, Slot::Dropped))
            .count()
    }

    /// Hook invoked once per touched owner after merging, with the owner's
    /// surviving events.
    pub fn set_owner_hook(&mut self, hook: impl FnMut(&E::Owner, &[E]) + 'static) {
        self.owner_hook = Some(Box::new(hook));
    }

    /// Hook invoked once per processed generation, after all owners.
    pub fn set_process_hook(&mut self, hook: impl FnMut() + 'static) {
        self.process_hook = Some(Box::new(hook));
    }

    fn check_tx(&mut self, tx: K) -> Result<(), Error> {
        if self.now < tx {
            return Err(Error::TransactionAfterNow {
                tx: format!("{tx:?}"),
                now: format!("{:?}", self.now),
            });
        }
        if let Some(last) = self.watermark {
            if tx < last {
                return Err(Error::NonMonotonicTransaction {
                    tx: format!("{tx:?}"),
                    last: format!("{last:?}"),
                });
            }
        }
        self.watermark = Some(tx);
        Ok(())
    }

    fn track_owner(&mut self, owner: &E::Owner) {
        if !self.owner_order.contains(owner) {
            self.owner_order.push(owner.clone());
        }
    }

    /// Open an event's knowledge period as `[tx, ..)` and track it.
    ///
    /// # Errors
    ///
    /// Transaction times must be non-decreasing and must not exceed the
    /// request timestamp.
    pub fn open(&mut self, mut event: E, tx: K) -> Result<EventKey, Error> {
        self.check_tx(tx)?;
        let knowledge = Period::starting_at(tx)?;
        event.set_knowledge_period(knowledge);
        let owner = event.owner().clone();
        self.track_owner(&owner);
        self.slots.push(Slot::Live(event));
        Ok(EventKey(self.slots.len() - 1))
    }

    /// Close the knowledge period of a tracked event at `tx`.
    ///
    /// Closing an event at the very transaction time that opened it leaves
    /// an empty knowledge period: the event is dropped on the spot, and a
    /// persisted one is queued for repository deletion.
    ///
    /// # Errors
    ///
    /// Fails on unknown or already-closed keys, non-monotonic transaction
    /// times, or a knowledge period starting after `tx`.
    pub fn close(&mut self, key: EventKey, tx: K) -> Result<(), Error> {
        self.check_tx(tx)?;
        let slot = self
            .slots
            .get_mut(key.0)
            .ok_or(Error::UnknownEventKey(key.0))?;
        let Slot::Live(event) = slot else {
            return Err(Error::UnknownEventKey(key.0));
        };

        let knowledge = event.knowledge_period();
        let Some(from) = knowledge.filter(|kp| kp.to().is_none()).and_then(|kp| kp.from()) else {
            return Err(Error::InconsistentKnowledge {
                period: knowledge.map_or_else(|| "none".to_string(), |kp| kp.to_string()),
                tx: format!("{tx:?}"),
            });
        };

        if from == tx {
            // Opened and closed within the same generation: net no-op.
            let taken = std::mem::replace(&mut self.slots[key.0], Slot::Dropped);
            if let Slot::Live(event) = taken {
                if event.is_transient() {
                    debug!("dropping event opened and closed in the same generation");
                } else {
                    debug!("queueing empty-knowledge persisted event for deletion");
                    self.slots[key.0] = Slot::PendingDelete(event);
                }
            }
            return Ok(());
        }
        if tx < from {
            return Err(Error::InconsistentKnowledge {
                period: format!("[{from:?}, ..)"),
                tx: format!("{tx:?}"),
            });
        }
        event.set_knowledge_period(Period::new(Some(from), Some(tx))?);
        Ok(())
    }

    /// Adopt a persisted event that was not opened this generation and
    /// close its knowledge period at `tx`.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`HistoryEventStore::close`].
    pub fn close_event(&mut self, event: E, tx: K) -> Result<EventKey, Error> {
        self.check_tx(tx)?;
        let owner = event.owner().clone();
        self.track_owner(&owner);
        self.slots.push(Slot::Live(event));
        let key = EventKey(self.slots.len() - 1);
        self.close(key, tx)?;
        Ok(key)
    }

    /// Normalize and settle the current generation without touching any
    /// repository. The returned outcome tells the caller what to persist.
    ///
    /// Per owner, in first-touch order: discard events not anchored at
    /// `tx`; merge a close at `tx` with an identical re-open at `tx` back
    /// into one row; run the owner hook; classify survivors as inserted
    /// (transient) or revised (persisted). The generation state is reset
    /// afterwards; all [`EventKey`]s become invalid.
    ///
    /// # Errors
    ///
    /// [`Error::AmbiguousMerge`] when more than two events match the merge
    /// predicate, which indicates a corrupt timeline.
    pub fn process_local(&mut self, tx: K) -> Result<ProcessOutcome<E>, Error> {
        self.check_tx(tx)?;
        let slots = std::mem::take(&mut self.slots);
        let owners = std::mem::take(&mut self.owner_order);

        let mut outcome = ProcessOutcome::default();
        let mut live: HashMap<E::Owner, Vec<E>> = HashMap::new();
        for slot in slots {
            match slot {
                Slot::Live(e) => live.entry(e.owner().clone()).or_default().push(e),
                Slot::PendingDelete(e) => outcome.deleted.push(e),
                Slot::Dropped => {}
            }
        }

        for owner in owners {
            let events = live.remove(&owner).unwrap_or_default();

            // (a) stale leftovers from a previous generation are dropped.
            let mut kept: Vec<E> = Vec::with_capacity(events.len());
            for event in events {
                let anchored = event
                    .knowledge_period()
                    .is_some_and(|kp| kp.from() == Some(tx) || kp.to() == Some(tx));
                if anchored {
                    kept.push(event);
                } else {
                    debug!(owner = ?owner, "discarding event not anchored at transaction time");
                }
            }

            // (c) merge a close at tx with an identical re-open at tx.
            let merged = Self::merge_generation(&mut kept, tx)?;
            if merged.count > 0 {
                debug!(owner = ?owner, merged = merged.count, "collapsed knowledge-period transitions");
            }
            outcome.deleted.extend(merged.deletions);

            if let Some(hook) = &mut self.owner_hook {
                hook(&owner, &kept);
            }

            for event in kept {
                if event.is_transient() {
                    outcome.inserted.push(event);
                } else {
                    outcome.revised.push(event);
                }
            }
        }

        if let Some(hook) = &mut self.process_hook {
            hook();
        }
        debug!(
            inserted = outcome.inserted.len(),
            deleted = outcome.deleted.len(),
            revised = outcome.revised.len(),
            "generation processed"
        );
        Ok(outcome)
    }

    /// Process the generation and drive the repository: deletions first,
    /// then insertions.
    ///
    /// If the repository fails or the future is dropped, the in-memory
    /// generation is already consumed; discard the store and start over
    /// from a fresh snapshot.
    ///
    /// # Errors
    ///
    /// Engine invariant violations or repository failures.
    pub async fn process<R>(
        &mut self,
        tx: K,
        repo: &mut R,
    ) -> Result<ProcessOutcome<E>, ProcessError<R::Error>>
    where
        R: Repository<E>,
    {
        let outcome = self.process_local(tx)?;
        for event in &outcome.deleted {
            repo.delete(event).await.map_err(ProcessError::Repository)?;
        }
        for event in &outcome.inserted {
            repo.insert(event).await.map_err(ProcessError::Repository)?;
        }
        Ok(outcome)
    }

    /// Merge close/re-open pairs in place. The later half of each pair is
    /// removed; the rare persisted one goes into `deletions`.
    fn merge_generation(kept: &mut Vec<E>, tx: K) -> Result<MergeResult<E>, Error> {
        let mut merged = MergeResult {
            count: 0,
            deletions: Vec::new(),
        };
        let mut idx = 0;
        while idx < kept.len() {
            let closes_here = kept[idx]
                .knowledge_period()
                .is_some_and(|kp| kp.to() == Some(tx));
            if !closes_here {
                idx += 1;
                continue;
            }
            let candidates: Vec<usize> = kept
                .iter()
                .enumerate()
                .filter(|(j, other)| {
                    *j != idx
                        && other
                            .knowledge_period()
                            .is_some_and(|kp| kp.from() == Some(tx) && kp.to().is_none())
                        && kept[idx].is_mergeable_with(other)
                })
                .map(|(j, _)| j)
                .collect();
            match candidates.as_slice() {
                [] => idx += 1,
                [other] => {
                    let other = *other;
                    // Re-open the earlier row; the later one never existed.
                    let from = kept[idx].knowledge_period().and_then(|kp| kp.from());
                    kept[idx].set_knowledge_period(Period::new(from, None)?);
                    let removed = kept.remove(other);
                    if !removed.is_transient() {
                        merged.deletions.push(removed);
                    }
                    merged.count += 1;
                    if other > idx {
                        idx += 1;
                    }
                }
                _ => {
                    return Err(Error::AmbiguousMerge {
                        tx: format!("{tx:?}"),
                    });
                }
            }
        }
        Ok(merged)
    }
}

struct MergeResult<E> {
    count: usize,
    deletions: Vec<E>,
}
