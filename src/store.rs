//! Single source of truth for the latest known snapshot per poll.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::warn;

use crate::models::{PollId, ResultSnapshot};

type Listener = Arc<dyn Fn(&ResultSnapshot) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct StoreInner {
    snapshots: HashMap<PollId, ResultSnapshot>,
    listeners: HashMap<PollId, Vec<(SubscriptionId, Listener)>>,
    /// Polls whose listeners are currently being notified. A `set` for one
    /// of these is a re-entrant cycle and is dropped.
    notifying: HashSet<PollId>,
}

/// Holds the current snapshot per poll and fans updates out to listeners.
///
/// Replacement is last-write-wins by call order, not by timestamp; producers
/// that need monotonic ordering compare timestamps before calling [`set`]
/// (the live channel does). Handles are cheap clones of one shared store.
///
/// [`set`]: ResultStore::set
#[derive(Clone)]
pub struct ResultStore {
    inner: Arc<Mutex<StoreInner>>,
    next_id: Arc<AtomicU64>,
}

impl ResultStore {
    pub fn new() -> Self {
        ResultStore {
            inner: Arc::new(Mutex::new(StoreInner {
                snapshots: HashMap::new(),
                listeners: HashMap::new(),
                notifying: HashSet::new(),
            })),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn get(&self, poll_id: &str) -> Option<ResultSnapshot> {
        self.inner.lock().snapshots.get(poll_id).cloned()
    }

    /// Replace the snapshot for `poll_id` and notify its listeners
    /// synchronously.
    ///
    /// A snapshot whose own `poll_id` does not match the key is a stray
    /// message from some other subscription; the call is a no-op. Listeners
    /// run outside the store lock, so a listener may call back into the
    /// store freely; only a synchronous `set` for the poll currently being
    /// notified is dropped, to break direct re-entrant cycles.
    pub fn set(&self, poll_id: &str, snapshot: ResultSnapshot) {
        let to_notify: Vec<Listener> = {
            let mut inner = self.inner.lock();
            if snapshot.poll_id != poll_id {
                warn!(
                    "Discarding snapshot for poll {} keyed under {poll_id}",
                    snapshot.poll_id
                );
                return;
            }
            if inner.notifying.contains(poll_id) {
                warn!("Dropping re-entrant results update for poll {poll_id}");
                return;
            }
            inner.snapshots.insert(poll_id.to_string(), snapshot.clone());
            let listeners: Vec<Listener> = inner
                .listeners
                .get(poll_id)
                .map(|subs| subs.iter().map(|(_, l)| l.clone()).collect())
                .unwrap_or_default();
            if !listeners.is_empty() {
                inner.notifying.insert(poll_id.to_string());
            }
            listeners
        };

        if to_notify.is_empty() {
            return;
        }
        for listener in &to_notify {
            listener(&snapshot);
        }
        self.inner.lock().notifying.remove(poll_id);
    }

    /// Register a listener for one poll. The listener fires on every
    /// accepted `set` until the returned [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, poll_id: &str, listener: F) -> Subscription
    where
        F: Fn(&ResultSnapshot) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.inner
            .lock()
            .listeners
            .entry(poll_id.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        Subscription {
            store: self.clone(),
            poll_id: poll_id.to_string(),
            id,
        }
    }

    fn remove_listener(&self, poll_id: &str, id: SubscriptionId) {
        let mut inner = self.inner.lock();
        if let Some(subs) = inner.listeners.get_mut(poll_id) {
            subs.retain(|(sub_id, _)| *sub_id != id);
            if subs.is_empty() {
                inner.listeners.remove(poll_id);
            }
        }
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener registration. Unsubscribes on drop.
pub struct Subscription {
    store: ResultStore,
    poll_id: PollId,
    id: SubscriptionId,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.store.remove_listener(&self.poll_id, self.id);
    }
}
