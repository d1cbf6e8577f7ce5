//! Observer edges.
//!
//! Every node keeps the set of nodes that depend on it. The set only holds
//! weak references: being observed never keeps a dependent alive. Both node
//! kinds notify through the same [`Observer`] contract.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::error::{ReactiveError, Result};

/// Unique identifier for a node in the graph.
///
/// Observer sets are keyed by this ID, so an observer is registered at most
/// once per dependency and can be removed by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something that must react when one of its dependencies changes.
pub trait Observer: Send + Sync {
    /// Identity used to deduplicate and remove observer entries.
    fn id(&self) -> NodeId;

    /// Called synchronously after a dependency's value changed.
    fn on_source_changed(&self) -> Result<()>;
}

/// The dependents of a single node.
///
/// Entries are kept in insertion order. Nothing depends on that order for
/// correctness, it only makes fan-out deterministic.
#[derive(Default)]
pub struct ObserverSet {
    entries: Mutex<IndexMap<NodeId, Weak<dyn Observer>>>,
}

impl ObserverSet {
    /// Create an empty observer set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Returns `false` if `id` was already present.
    pub fn insert(&self, id: NodeId, observer: Weak<dyn Observer>) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(&id) {
            return false;
        }
        entries.insert(id, observer);
        true
    }

    /// Remove the entry registered under `id`, leaving every other entry
    /// untouched.
    pub fn remove(&self, id: NodeId) -> bool {
        self.entries.lock().shift_remove(&id).is_some()
    }

    /// Check whether `id` is registered.
    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    /// Number of registered entries, including expired ones not yet pruned.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Notify every live observer.
    ///
    /// Expired entries are pruned. The lock is released before any observer
    /// runs, so observers may freely read or register on this set. If an
    /// observer fails, the remaining ones are still notified and the first
    /// error is returned.
    pub fn notify(&self) -> Result<()> {
        let live: Vec<Arc<dyn Observer>> = {
            let mut entries = self.entries.lock();
            let before = entries.len();
            let mut live = Vec::with_capacity(before);
            entries.retain(|_, weak| match weak.upgrade() {
                Some(observer) => {
                    live.push(observer);
                    true
                }
                None => false,
            });
            if entries.len() != before {
                tracing::trace!(pruned = before - entries.len(), "pruned expired observers");
            }
            live
        };

        tracing::trace!(observers = live.len(), "notifying observers");

        let mut first_error: Option<ReactiveError> = None;
        for observer in live {
            if let Err(err) = observer.on_source_changed() {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        f.debug_set().entries(entries.keys()).finish()
    }
}
