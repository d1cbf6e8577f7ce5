//! Reactive Implementation
//!
//! A Reactive is a derived node: a cached value computed by a pure function
//! from an ordered list of inputs (bindings, other reactives, constants).
//!
//! # How Reactives Work
//!
//! 1. At construction the node registers a weak observer entry on every
//!    observable input. An eager node computes immediately; a lazy node
//!    starts dirty with no cached value.
//!
//! 2. When an input changes:
//!    - an eager node recomputes on the spot and notifies its own observers
//!      only if the result differs from the cached value;
//!    - a lazy node marks itself dirty and forwards the notification, but
//!      only on the clean-to-dirty transition. A node that is already dirty
//!      absorbs further notifications.
//!
//! 3. `read` returns the cached value, recomputing first if the node is
//!    dirty. Reading a dirty lazy input during recomputation recomputes that
//!    input, so laziness composes through chains.
//!
//! # Failure
//!
//! If the compute function fails, the node stays dirty and its observers
//! are not notified. The error reaches whoever triggered the computation:
//! the `set` that cascaded into an eager node, or the `read` of a dirty one.
//!
//! # Ownership
//!
//! A node owns handles to its inputs, never to its observers. Dropping the
//! last handle removes the node's entry from each input's observer set.

use std::fmt::{self, Debug};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::context::ReactiveContext;
use super::dependency::{Apply, Dependencies, ObserverSets};
use super::observer::{NodeId, Observer, ObserverSet};
use crate::error::{BoxError, ReactiveError, Result};

/// When a derived node recomputes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluation {
    /// Recompute synchronously whenever an input changes.
    Eager,

    /// Recompute on the first read after an input changed.
    #[default]
    Lazy,
}

/// Dirty state for a derived node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// The cached value is up-to-date.
    Clean,

    /// The cached value is stale or missing and must be recomputed before
    /// it is read.
    Dirty,
}

/// A cached derived value.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. The `PartialEq` bound is used to
///   suppress notifications when a recomputation yields the same value.
///
/// # Example
///
/// ```rust,ignore
/// let b = Binding::new(5);
/// let plus_one = Reactive::lazy(|x: i32| x + 1, (b.clone(),));
///
/// assert_eq!(plus_one.read()?, 6);
/// b.set(10)?;
/// assert_eq!(plus_one.read()?, 11);
/// ```
pub struct Reactive<T> {
    node: Arc<ReactiveNode<T>>,
}

type Eval<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

struct ReactiveNode<T> {
    id: NodeId,
    evaluation: Evaluation,

    /// Reads the inputs and applies the compute function.
    eval: Eval<T>,

    slot: Mutex<Slot<T>>,

    /// Nodes that depend on this one.
    observers: Arc<ObserverSet>,

    /// Observer sets of our inputs, kept so we can deregister on drop.
    upstream: ObserverSets,
}

struct Slot<T> {
    state: NodeState,
    value: Option<T>,

    /// Set when the last recompute failed. Such a node is dirty without
    /// having told its observers about the input change that follows.
    failed: bool,
}

impl<T> Reactive<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a derived node from an infallible compute function.
    ///
    /// Fails only if the node is eager and its initial computation fails,
    /// which can happen when an input is itself a failing node.
    pub fn new<D, F>(compute: F, dependencies: D, evaluation: Evaluation) -> Result<Self>
    where
        D: Dependencies,
        F: Apply<D::Values, T> + Send + Sync + 'static,
    {
        Self::build(
            move |values| Ok(compute.apply(values)),
            dependencies,
            evaluation,
        )
    }

    /// Create a derived node from a compute function that may fail.
    pub fn try_new<D, F, E>(compute: F, dependencies: D, evaluation: Evaluation) -> Result<Self>
    where
        D: Dependencies,
        F: Apply<D::Values, std::result::Result<T, E>> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::build(
            move |values| compute.apply(values).map_err(Into::into),
            dependencies,
            evaluation,
        )
    }

    /// Create a lazy derived node. Nothing is computed until the first read.
    pub fn lazy<D, F>(compute: F, dependencies: D) -> Self
    where
        D: Dependencies,
        F: Apply<D::Values, T> + Send + Sync + 'static,
    {
        let node = Self::register(
            move |values| Ok(compute.apply(values)),
            dependencies,
            Evaluation::Lazy,
        );
        Self::from_node(node)
    }

    /// Create an eager derived node, computing its initial value right away.
    pub fn eager<D, F>(compute: F, dependencies: D) -> Result<Self>
    where
        D: Dependencies,
        F: Apply<D::Values, T> + Send + Sync + 'static,
    {
        Self::new(compute, dependencies, Evaluation::Eager)
    }

    fn build<D, G>(compute: G, dependencies: D, evaluation: Evaluation) -> Result<Self>
    where
        D: Dependencies,
        G: Fn(D::Values) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        let node = Self::register(compute, dependencies, evaluation);
        if evaluation == Evaluation::Eager {
            node.recompute()?;
        }
        Ok(Self::from_node(node))
    }

    /// Allocate the node and register it on its inputs. The node starts dirty.
    fn register<D, G>(compute: G, dependencies: D, evaluation: Evaluation) -> Arc<ReactiveNode<T>>
    where
        D: Dependencies,
        G: Fn(D::Values) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        let id = NodeId::new();
        let upstream = dependencies.observer_sets();
        let eval: Eval<T> = Box::new(move || {
            let values = dependencies.values()?;
            compute(values).map_err(|source| ReactiveError::Compute { node: id, source })
        });

        let node = Arc::new(ReactiveNode {
            id,
            evaluation,
            eval,
            slot: Mutex::new(Slot {
                state: NodeState::Dirty,
                value: None,
                failed: false,
            }),
            observers: Arc::new(ObserverSet::new()),
            upstream,
        });

        let weak = Arc::downgrade(&node);
        let weak: Weak<dyn Observer> = weak;
        for set in &node.upstream {
            set.insert(id, weak.clone());
        }

        tracing::trace!(
            node = %id,
            ?evaluation,
            inputs = node.upstream.len(),
            "created reactive"
        );
        node
    }

    fn from_node(node: Arc<ReactiveNode<T>>) -> Self {
        Self { node }
    }

    /// Get the current value, recomputing first if the node is dirty.
    ///
    /// This is the only way to force evaluation of a lazy node.
    pub fn read(&self) -> Result<T> {
        {
            let slot = self.node.slot.lock();
            if slot.state == NodeState::Clean {
                if let Some(value) = &slot.value {
                    return Ok(value.clone());
                }
            }
        }
        self.node.recompute().map(|(value, _)| value)
    }

    /// Get the cached value without evaluating, even if it is stale.
    pub fn peek(&self) -> Option<T> {
        self.node.slot.lock().value.clone()
    }
}

impl<T> Reactive<T> {
    /// Get the node's unique ID.
    pub fn id(&self) -> NodeId {
        self.node.id
    }

    /// Get the current dirty state.
    pub fn state(&self) -> NodeState {
        self.node.slot.lock().state
    }

    pub fn is_dirty(&self) -> bool {
        self.state() == NodeState::Dirty
    }

    pub fn evaluation(&self) -> Evaluation {
        self.node.evaluation
    }

    pub fn is_lazy(&self) -> bool {
        self.node.evaluation == Evaluation::Lazy
    }

    /// Register a dependent of this node.
    ///
    /// Returns `false` if the reference has already expired or the observer
    /// is already registered.
    pub fn add_observer(&self, observer: Weak<dyn Observer>) -> bool {
        match observer.upgrade() {
            Some(live) => self.node.observers.insert(live.id(), observer),
            None => false,
        }
    }

    /// Remove the dependent registered under `id`.
    pub fn remove_observer(&self, id: NodeId) -> bool {
        self.node.observers.remove(id)
    }

    /// Get the number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.node.observers.len()
    }

    pub(crate) fn observer_set(&self) -> &Arc<ObserverSet> {
        &self.node.observers
    }
}

impl<T> ReactiveNode<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Recompute and cache the value.
    ///
    /// Returns the new value and whether it differs from the previous one.
    /// On failure the node is left dirty and marked failed.
    fn recompute(&self) -> Result<(T, bool)> {
        let _ctx = ReactiveContext::enter(self.id)?;
        tracing::trace!(node = %self.id, depth = ReactiveContext::depth(), "recomputing");

        let value = match (self.eval)() {
            Ok(value) => value,
            Err(err) => {
                let mut slot = self.slot.lock();
                slot.state = NodeState::Dirty;
                slot.failed = true;
                drop(slot);
                tracing::debug!(node = %self.id, error = %err, "recompute failed");
                return Err(err);
            }
        };

        let mut slot = self.slot.lock();
        let changed = slot.value.as_ref() != Some(&value);
        slot.value = Some(value.clone());
        slot.state = NodeState::Clean;
        slot.failed = false;
        Ok((value, changed))
    }
}

impl<T> Observer for ReactiveNode<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn id(&self) -> NodeId {
        self.id
    }

    fn on_source_changed(&self) -> Result<()> {
        match self.evaluation {
            Evaluation::Lazy => {
                // A failed node counts as clean here: the failure stopped the
                // last notification, so this one must go through.
                let became_dirty = {
                    let mut slot = self.slot.lock();
                    let forward = slot.state == NodeState::Clean || slot.failed;
                    slot.state = NodeState::Dirty;
                    slot.failed = false;
                    forward
                };
                if !became_dirty {
                    return Ok(());
                }
                tracing::trace!(node = %self.id, "marked dirty");
                self.observers.notify()
            }
            Evaluation::Eager => {
                let (_, changed) = self.recompute()?;
                if !changed {
                    tracing::trace!(node = %self.id, "value unchanged, not notifying");
                    return Ok(());
                }
                self.observers.notify()
            }
        }
    }
}

impl<T> Drop for ReactiveNode<T> {
    fn drop(&mut self) {
        for set in &self.upstream {
            set.remove(self.id);
        }
        tracing::trace!(node = %self.id, "dropped reactive");
    }
}

impl<T> Clone for Reactive<T> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<T: Debug> Debug for Reactive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.node.slot.lock();
        f.debug_struct("Reactive")
            .field("id", &self.node.id)
            .field("evaluation", &self.node.evaluation)
            .field("state", &slot.state)
            .field("value", &slot.value)
            .field("observer_count", &self.node.observers.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Binding, Const};
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counter() -> (Arc<AtomicI32>, Arc<AtomicI32>) {
        let count = Arc::new(AtomicI32::new(0));
        (count.clone(), count)
    }

    #[test]
    fn lazy_computes_on_first_read() {
        let (calls, calls_clone) = counter();
        let b = Binding::new(5);

        let r = Reactive::lazy(
            move |x: i32| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                x + 1
            },
            (b.clone(),),
        );

        // Not computed yet
        assert!(r.peek().is_none());
        assert!(r.is_dirty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(r.read().unwrap(), 6);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(r.state(), NodeState::Clean);

        // Second read uses cache
        assert_eq!(r.read().unwrap(), 6);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lazy_marks_dirty_without_recomputing() {
        let (calls, calls_clone) = counter();
        let b = Binding::new(1);
        let r = Reactive::lazy(
            move |x: i32| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                x * 10
            },
            (b.clone(),),
        );

        assert_eq!(r.read().unwrap(), 10);
        b.set(2).unwrap();
        b.set(3).unwrap();

        assert!(r.is_dirty());
        assert_eq!(r.peek(), Some(10));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(r.read().unwrap(), 30);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_lazy_node_forwards_next_change() {
        let (calls, calls_clone) = counter();
        let b = Binding::new(2);
        let half = Reactive::try_new(
            |x: i32| if x == 0 { Err("zero") } else { Ok(10 / x) },
            (b.clone(),),
            Evaluation::Lazy,
        )
        .unwrap();
        let e = Reactive::eager(
            move |v: i32| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                v
            },
            (half.clone(),),
        )
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(b.set(0).is_err());
        assert!(half.is_dirty());
        assert!(e.is_dirty());

        // The failure swallowed the earlier notification; this one must
        // reach `e` even though `half` is already dirty.
        b.set(5).unwrap();
        assert_eq!(e.state(), NodeState::Clean);
        assert_eq!(e.peek(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn eager_computes_at_construction_and_on_change() {
        let (calls, calls_clone) = counter();
        let b = Binding::new(5);

        let a = Reactive::eager(
            move |x: i32| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                x + 1
            },
            (b.clone(),),
        )
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.state(), NodeState::Clean);
        assert_eq!(a.peek(), Some(6));

        b.set(10).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(a.read().unwrap(), 11);
        assert_eq!(a.read().unwrap(), 11);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn construction_registers_on_observable_inputs_only() {
        let b = Binding::new(1);
        let r = Reactive::lazy(|x: i32, y: i32| x + y, (b.clone(), Const(2)));

        assert_eq!(b.observer_count(), 1);
        assert!(r.is_lazy());
        assert_eq!(r.evaluation(), Evaluation::Lazy);
    }

    #[test]
    fn drop_deregisters_from_inputs() {
        let b = Binding::new(1);
        let keep = Reactive::lazy(|x: i32| x, (b.clone(),));
        let gone = Reactive::lazy(|x: i32| x * 2, (b.clone(),));
        assert_eq!(b.observer_count(), 2);

        drop(gone);
        assert_eq!(b.observer_count(), 1);
        assert!(b.observer_set().contains(keep.id()));
    }

    #[test]
    fn clones_share_the_node() {
        let b = Binding::new(1);
        let r1 = Reactive::lazy(|x: i32| x + 1, (b.clone(),));
        let r2 = r1.clone();

        assert_eq!(r1.read().unwrap(), 2);
        assert_eq!(r2.state(), NodeState::Clean);

        drop(r1);
        assert_eq!(b.observer_count(), 1);
        b.set(5).unwrap();
        assert_eq!(r2.read().unwrap(), 6);
    }

    #[test]
    fn evaluation_defaults_to_lazy() {
        assert_eq!(Evaluation::default(), Evaluation::Lazy);
    }
}
