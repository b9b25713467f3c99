//! Prep queue and preparation workers
//!
//! Items move through three phases:
//!
//! ```text
//! pending (FIFO, waiting for a worker slot)
//!    -> in flight (one PreparationWorker on the blocking pool)
//!    -> prepared (waiting to be claimed by the engine)
//! ```
//!
//! At most `max_concurrent` workers run at once; excess requests wait in
//! submission order and are never dropped. Each worker reports through its
//! own oneshot done-channel, which the control loop polls without blocking
//! once per tick. Nothing here is shared with the workers except the
//! preparer itself.
//!
//! `clear` is the only cancellation primitive. An in-flight preparation
//! cannot be interrupted, so it is marked cancelled and its result is
//! cleaned up when the worker finishes.

use crate::backend::SourcePreparer;
use crate::error::{Error, Result};
use crate::playback::types::PrepItem;
use spindle_common::commands::{ItemKind, SourceKind};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// One blocking preparation
pub struct PreparationWorker {
    done_rx: oneshot::Receiver<Result<String>>,
}

impl PreparationWorker {
    /// Start preparing `item` on the runtime's blocking pool
    ///
    /// Network sources need no local materialization and complete at once.
    pub fn spawn(runtime: &Handle, preparer: Arc<dyn SourcePreparer>, item: &PrepItem) -> Self {
        let (done_tx, done_rx) = oneshot::channel();

        if item.source_kind == SourceKind::Network {
            let _ = done_tx.send(Ok(item.source_ref.clone()));
            return Self { done_rx };
        }

        let source_ref = item.source_ref.clone();
        runtime.spawn_blocking(move || {
            let result = preparer.prepare(&source_ref);
            // Receiver gone means the queue was dropped; nothing to report to
            let _ = done_tx.send(result);
        });

        Self { done_rx }
    }

    /// Non-blocking completion check
    ///
    /// Returns `None` while the preparation is still running.
    pub fn try_complete(&mut self) -> Option<Result<String>> {
        match self.done_rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(Error::Preparation {
                source_ref: String::new(),
                reason: "preparation worker exited without a result".to_string(),
            })),
        }
    }
}

struct InFlight {
    item: PrepItem,
    worker: PreparationWorker,
    cancelled: bool,
}

/// A preparation that failed; the item has been dropped
#[derive(Debug, Clone, PartialEq)]
pub struct PrepFailure {
    pub unique_id: i64,
    pub source_ref: String,
    pub kind: ItemKind,
    pub reason: String,
}

impl PrepFailure {
    /// Same matching rule as a prepared item
    pub fn matches(&self, unique_id: i64, source_ref: &str) -> bool {
        self.unique_id == unique_id
            && (self.kind == ItemKind::Track || self.source_ref == source_ref)
    }
}

/// Result of one poll pass
#[derive(Debug, Default)]
pub struct PollOutcome {
    /// Ids that moved into the prepared set
    pub completed: Vec<i64>,
    pub failed: Vec<PrepFailure>,
}

/// Bounded set of outstanding preparations plus the prepared results
pub struct PrepQueue {
    pending: VecDeque<PrepItem>,
    in_flight: Vec<InFlight>,
    prepared: Vec<PrepItem>,
    max_concurrent: usize,
    preparer: Arc<dyn SourcePreparer>,
    runtime: Handle,
}

impl PrepQueue {
    /// Create a queue whose workers run on `runtime`'s blocking pool
    pub fn new(preparer: Arc<dyn SourcePreparer>, max_concurrent: usize, runtime: Handle) -> Self {
        Self {
            pending: VecDeque::new(),
            in_flight: Vec::new(),
            prepared: Vec::new(),
            max_concurrent: max_concurrent.max(1),
            preparer,
            runtime,
        }
    }

    /// Enqueue an item for preparation
    ///
    /// Any outstanding item in the same slot (pending, in flight or
    /// prepared) is discarded first: one per track id, one per
    /// announcement source.
    pub fn prepare(&mut self, item: PrepItem) {
        let unique_id = item.unique_id;
        if self.discard_slot(&item) {
            debug!("Re-prepare replaces outstanding item {}", unique_id);
        }
        info!(
            "Prepare request: {} {} (pending {}, prepared {})",
            unique_id,
            item.source_ref,
            self.pending.len() + 1,
            self.prepared.len()
        );
        self.pending.push_back(item);
        self.dispatch();
    }

    /// Collect finished workers and start pending ones
    pub fn poll(&mut self) -> PollOutcome {
        let mut outcome = PollOutcome::default();
        let mut still_running = Vec::with_capacity(self.in_flight.len());

        for mut flight in self.in_flight.drain(..) {
            let Some(result) = flight.worker.try_complete() else {
                still_running.push(flight);
                continue;
            };

            match result {
                Ok(local_ref) if flight.cancelled => {
                    debug!("Discarding cancelled preparation {}", flight.item.unique_id);
                    cleanup_detached(&self.runtime, &self.preparer, &flight.item, &local_ref);
                }
                Ok(local_ref) => {
                    debug!("Prepared {} -> {}", flight.item.unique_id, local_ref);
                    flight.item.local_ref = local_ref;
                    outcome.completed.push(flight.item.unique_id);
                    self.prepared.push(flight.item);
                }
                Err(_) if flight.cancelled => {}
                Err(e) => {
                    warn!(
                        "Preparation failed for {} {}: {}",
                        flight.item.unique_id, flight.item.source_ref, e
                    );
                    outcome.failed.push(PrepFailure {
                        unique_id: flight.item.unique_id,
                        source_ref: flight.item.source_ref,
                        kind: flight.item.kind,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.in_flight = still_running;
        self.dispatch();
        outcome
    }

    /// Hand out the prepared item matching the request
    ///
    /// Tracks are removed (exclusive hand-off). Announcements stay in the
    /// prepared set and a copy is returned.
    pub fn claim_match(&mut self, unique_id: i64, source_ref: &str) -> Option<PrepItem> {
        let idx = self
            .prepared
            .iter()
            .position(|p| p.matches(unique_id, source_ref))?;

        if self.prepared[idx].is_announcement() {
            Some(self.prepared[idx].clone())
        } else {
            Some(self.prepared.remove(idx))
        }
    }

    /// True while a matching item is pending or in flight
    pub fn is_preparing(&self, unique_id: i64, source_ref: &str) -> bool {
        self.pending.iter().any(|p| p.matches(unique_id, source_ref))
            || self
                .in_flight
                .iter()
                .any(|f| !f.cancelled && f.item.matches(unique_id, source_ref))
    }

    /// Discard a matching item in any phase; returns whether one was found
    pub fn clear(&mut self, unique_id: i64, source_ref: &str) -> bool {
        let mut found = false;

        let before = self.pending.len();
        self.pending.retain(|p| !p.matches(unique_id, source_ref));
        found |= self.pending.len() != before;

        for flight in self
            .in_flight
            .iter_mut()
            .filter(|f| !f.cancelled && f.item.matches(unique_id, source_ref))
        {
            flight.cancelled = true;
            found = true;
        }

        let mut idx = 0;
        while idx < self.prepared.len() {
            if self.prepared[idx].matches(unique_id, source_ref) {
                let item = self.prepared.remove(idx);
                cleanup_detached(&self.runtime, &self.preparer, &item, &item.local_ref);
                found = true;
            } else {
                idx += 1;
            }
        }

        if found {
            info!(
                "Prep clear: {} {} (pending {}, prepared {})",
                unique_id,
                source_ref,
                self.pending.len(),
                self.prepared.len()
            );
        }
        found
    }

    /// Discard everything: pending, in flight and prepared
    pub fn clear_all(&mut self) {
        self.pending.clear();
        for flight in &mut self.in_flight {
            flight.cancelled = true;
        }
        for item in std::mem::take(&mut self.prepared) {
            cleanup_detached(&self.runtime, &self.preparer, &item, &item.local_ref);
        }
        info!("Prep queue cleared");
    }

    /// Give back a claimed item once it is no longer needed
    ///
    /// Only tracks own their local resource; announcements are shared with
    /// the prepared set and are cleaned up when cleared.
    pub fn release(&self, item: PrepItem) {
        if item.is_announcement() {
            return;
        }
        cleanup_detached(&self.runtime, &self.preparer, &item, &item.local_ref);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Running workers, including cancelled ones still finishing
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn prepared_count(&self) -> usize {
        self.prepared.len()
    }

    fn dispatch(&mut self) {
        while self.in_flight.len() < self.max_concurrent {
            let Some(item) = self.pending.pop_front() else {
                break;
            };
            debug!("Starting preparation of {} {}", item.unique_id, item.source_ref);
            let worker = PreparationWorker::spawn(&self.runtime, Arc::clone(&self.preparer), &item);
            self.in_flight.push(InFlight {
                item,
                worker,
                cancelled: false,
            });
        }
    }

    fn discard_slot(&mut self, item: &PrepItem) -> bool {
        let mut found = false;

        let before = self.pending.len();
        self.pending.retain(|p| !p.same_slot(item));
        found |= self.pending.len() != before;

        for flight in self
            .in_flight
            .iter_mut()
            .filter(|f| !f.cancelled && f.item.same_slot(item))
        {
            flight.cancelled = true;
            found = true;
        }

        let mut idx = 0;
        while idx < self.prepared.len() {
            if self.prepared[idx].same_slot(item) {
                let old = self.prepared.remove(idx);
                cleanup_detached(&self.runtime, &self.preparer, &old, &old.local_ref);
                found = true;
            } else {
                idx += 1;
            }
        }
        found
    }
}

/// Run the preparer's cleanup off the control loop
fn cleanup_detached(
    runtime: &Handle,
    preparer: &Arc<dyn SourcePreparer>,
    item: &PrepItem,
    local_ref: &str,
) {
    if item.source_kind == SourceKind::Network || local_ref.is_empty() {
        return;
    }
    let preparer = Arc::clone(preparer);
    let source_ref = item.source_ref.clone();
    let local_ref = local_ref.to_string();
    runtime.spawn_blocking(move || preparer.cleanup(&source_ref, &local_ref));
}
