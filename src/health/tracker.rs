//! Concurrency-safe warning state store and change notifier.
//!
//! The tracker is the single serialization point for warnable state in the
//! process: every producer subsystem calls [`HealthTracker::set_unhealthy`]
//! and [`HealthTracker::set_healthy`] without coordinating with the others.
//! The critical section covers only the map mutation and a clone of the
//! small active set; rendering, suppression, and subscriber callbacks all
//! run after the lock is released.
//!
//! Notification uses a drain-queue publisher: each mutation enqueues a
//! snapshot of the raw active set in mutation order, then whoever can take
//! the publish lock drains the queue, evaluates visibility, and invokes
//! subscribers only when the visible picture actually changed. A mutation
//! arriving while another thread is draining simply enqueues and returns —
//! the current drainer picks it up — so a slow or reentrant subscriber can
//! never deadlock a producer.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::args::Args;
use super::catalog::{Catalog, Severity, Warnable, WarnableHandle};
use super::visible::{self, HealthSnapshot, OverallHealth, VisibleWarning};

/// Runtime record for an unhealthy warnable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveWarning {
    /// Arguments captured at the most recent `set_unhealthy` call.
    pub args: Args,
    /// When the producer last reported the condition.
    pub since: DateTime<Utc>,
}

/// Subscriber callback, invoked with each changed snapshot.
pub type WarningCallback = Box<dyn Fn(&HealthSnapshot) + Send + Sync + 'static>;

/// Token returned by [`HealthTracker::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

/// Mutable state guarded by the tracker's single lock.
#[derive(Debug, Default)]
struct TrackerState {
    /// Slot index of the warnable to its active record.
    active: HashMap<usize, ActiveWarning>,
    /// Raw-set snapshots awaiting publication, in mutation order.
    pending: VecDeque<HashMap<usize, ActiveWarning>>,
}

/// State owned by whichever thread is currently publishing.
struct PublishState {
    /// The last snapshot delivered to subscribers.
    last: HealthSnapshot,
}

/// Concurrency-safe store of currently-active warnings.
///
/// Built from a frozen [`Catalog`] and shared across producers and
/// consumers, typically behind an `Arc`.
pub struct HealthTracker {
    catalog: Arc<Catalog>,
    state: Mutex<TrackerState>,
    publish: Mutex<PublishState>,
    subscribers: Mutex<HashMap<u64, Arc<dyn Fn(&HealthSnapshot) + Send + Sync>>>,
    next_token: AtomicU64,
}

impl std::fmt::Debug for HealthTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active = match self.state.lock() {
            Ok(state) => state.active.len(),
            Err(_) => 0,
        };
        f.debug_struct("HealthTracker")
            .field("warnables", &self.catalog.len())
            .field("active", &active)
            .finish()
    }
}

/// Recover a guard from a poisoned lock: a panic mid-operation cannot leave
/// either map half-written, so continuing with the inner value is safe.
fn recover<'a, T>(
    result: Result<MutexGuard<'a, T>, std::sync::PoisonError<MutexGuard<'a, T>>>,
    which: &str,
) -> MutexGuard<'a, T> {
    match result {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(lock = which, "health tracker lock poisoned, continuing");
            poisoned.into_inner()
        }
    }
}

impl HealthTracker {
    /// Create a tracker over a frozen catalog. Every warnable starts healthy.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            state: Mutex::new(TrackerState::default()),
            publish: Mutex::new(PublishState {
                last: HealthSnapshot::default(),
            }),
            subscribers: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// The catalog this tracker was built from.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // ── Mutation ──

    /// Mark a warnable unhealthy with the given arguments.
    ///
    /// Inserts or overwrites the active record with `args` and the current
    /// time; repeated calls refresh rather than duplicate. Arguments the
    /// warnable's message never reads are accepted and ignored.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was issued by a different catalog.
    pub fn set_unhealthy(&self, handle: WarnableHandle, args: Args) {
        let slot = self.catalog.slot_for(handle);
        let since = Utc::now();
        {
            let mut state = recover(self.state.lock(), "state");
            state.active.insert(slot, ActiveWarning { args, since });
            let raw = state.active.clone();
            state.pending.push_back(raw);
        }
        debug!(code = self.catalog.code_at(slot), "warnable marked unhealthy");
        self.publish_pending();
    }

    /// Mark a warnable healthy, removing its active record.
    ///
    /// No-op when the warnable is already healthy.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was issued by a different catalog.
    pub fn set_healthy(&self, handle: WarnableHandle) {
        let slot = self.catalog.slot_for(handle);
        let removed = {
            let mut state = recover(self.state.lock(), "state");
            if state.active.remove(&slot).is_none() {
                false
            } else {
                let raw = state.active.clone();
                state.pending.push_back(raw);
                true
            }
        };
        if removed {
            debug!(code = self.catalog.code_at(slot), "warnable marked healthy");
            self.publish_pending();
        }
    }

    // ── Queries ──

    /// Whether the warnable currently has an active record (pre-suppression).
    pub fn is_unhealthy(&self, handle: WarnableHandle) -> bool {
        let slot = self.catalog.slot_for(handle);
        recover(self.state.lock(), "state").active.contains_key(&slot)
    }

    /// Consistent point-in-time copy of the raw active set, keyed by code.
    ///
    /// This is the pre-suppression view; most consumers want
    /// [`warnings`](Self::warnings) instead.
    pub fn snapshot(&self) -> HashMap<&'static str, ActiveWarning> {
        let state = recover(self.state.lock(), "state");
        state
            .active
            .iter()
            .map(|(slot, record)| (self.catalog.code_at(*slot), record.clone()))
            .collect()
    }

    /// The current visible set with its aggregate, evaluated outside the lock.
    pub fn current(&self) -> HealthSnapshot {
        let active = recover(self.state.lock(), "state").active.clone();
        visible::evaluate(&self.catalog, &active)
    }

    /// Visible warnings, severity descending then code ascending.
    pub fn warnings(&self) -> Vec<VisibleWarning> {
        self.current().warnings
    }

    /// Aggregate severity and connectivity impact over the visible set.
    pub fn overall(&self) -> OverallHealth {
        self.current().overall
    }

    /// Highest severity among visible warnings; `None` when healthy.
    pub fn overall_severity(&self) -> Option<Severity> {
        self.overall().severity
    }

    /// Whether any visible warning signals a reachability disruption.
    pub fn connectivity_impacted(&self) -> bool {
        self.overall().connectivity_impacted
    }

    /// The definition behind a handle, for producers composing log lines.
    pub fn definition(&self, handle: WarnableHandle) -> &Warnable {
        self.catalog.definition(handle)
    }

    // ── Subscription ──

    /// Register a callback invoked after every change to the visible set or
    /// its aggregate. Mutations that change nothing visible (a suppressed
    /// warnable toggling, a refresh with identical arguments) deliver
    /// nothing.
    ///
    /// Callbacks run outside the store lock, in mutation order, exactly
    /// once per visible change. A callback may itself mutate the tracker.
    pub fn subscribe(&self, callback: WarningCallback) -> SubscriptionToken {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        recover(self.subscribers.lock(), "subscribers").insert(token, Arc::from(callback));
        debug!(token, "health subscriber registered");
        SubscriptionToken(token)
    }

    /// Remove a subscriber. No-op for an already-removed token.
    pub fn unsubscribe(&self, token: SubscriptionToken) {
        let removed = recover(self.subscribers.lock(), "subscribers")
            .remove(&token.0)
            .is_some();
        debug!(token = token.0, removed, "health subscriber removed");
    }

    /// A `watch` channel carrying the latest snapshot, for async consumers
    /// that prefer awaiting changes over callbacks. The feeding subscription
    /// lives as long as the tracker.
    pub fn watch_handle(&self) -> watch::Receiver<HealthSnapshot> {
        let (tx, rx) = watch::channel(self.current());
        self.subscribe(Box::new(move |snapshot| {
            tx.send_replace(snapshot.clone());
        }));
        rx
    }

    // ── Publication ──

    /// Drain pending raw-set snapshots and notify subscribers of visible
    /// changes. Whoever holds the publish lock drains for everyone; callers
    /// that lose the `try_lock` race have already enqueued and can return.
    fn publish_pending(&self) {
        loop {
            let mut publish = match self.publish.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::WouldBlock) => return,
                Err(TryLockError::Poisoned(poisoned)) => {
                    warn!(lock = "publish", "health tracker lock poisoned, continuing");
                    poisoned.into_inner()
                }
            };

            while let Some(raw) = {
                let mut state = recover(self.state.lock(), "state");
                state.pending.pop_front()
            } {
                let snapshot = visible::evaluate(&self.catalog, &raw);
                if snapshot.same_picture(&publish.last) {
                    continue;
                }
                publish.last = snapshot.clone();
                self.notify(&snapshot);
            }

            drop(publish);

            // A mutation may have enqueued between our last pop and the
            // unlock above; it bailed on try_lock, so the queue is ours.
            let drained = recover(self.state.lock(), "state").pending.is_empty();
            if drained {
                return;
            }
        }
    }

    /// Invoke every live subscriber with the snapshot, outside all locks
    /// except the publish lock (which orders deliveries).
    fn notify(&self, snapshot: &HealthSnapshot) {
        let callbacks: Vec<Arc<dyn Fn(&HealthSnapshot) + Send + Sync>> = {
            let subscribers = recover(self.subscribers.lock(), "subscribers");
            subscribers.values().cloned().collect()
        };
        debug!(
            visible = snapshot.warnings.len(),
            subscribers = callbacks.len(),
            "publishing health change"
        );
        for callback in callbacks {
            callback(snapshot);
        }
    }
}
