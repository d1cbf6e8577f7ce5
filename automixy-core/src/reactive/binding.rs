//! Binding Implementation
//!
//! A Binding is the source node of the graph: a mutable holder of a value
//! that derived nodes read from.
//!
//! # How Bindings Work
//!
//! 1. A derived node that lists the binding as a dependency registers a weak
//!    observer entry on it at construction.
//!
//! 2. `set` compares the new value with the current one. Equal values are
//!    ignored and nobody is notified.
//!
//! 3. A different value is stored, then every live observer is notified
//!    synchronously before `set` returns.
//!
//! # Memory Layout
//!
//! Each binding consists of:
//! - A unique ID (8 bytes)
//! - The value, behind a lock
//! - The observer set, shared with the derived nodes that must deregister
//!   themselves when they are dropped

use std::fmt::{self, Debug, Display};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::observer::{NodeId, Observer, ObserverSet};
use crate::error::Result;

/// A source node holding a value of type `T`.
///
/// # Type Parameters
///
/// - `T`: The stored value. `PartialEq` drives change suppression; a type
///   whose equality never holds makes every `set` propagate.
///
/// # Example
///
/// ```rust,ignore
/// let count = Binding::new(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (notifies observers)
/// count.set(5)?;
/// ```
pub struct Binding<T> {
    inner: Arc<BindingInner<T>>,
}

struct BindingInner<T> {
    id: NodeId,
    value: RwLock<T>,
    observers: Arc<ObserverSet>,
}

impl<T> Binding<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new binding with the given initial value.
    pub fn new(value: T) -> Self {
        let id = NodeId::new();
        tracing::trace!(node = %id, "created binding");
        Self {
            inner: Arc::new(BindingInner {
                id,
                value: RwLock::new(value),
                observers: Arc::new(ObserverSet::new()),
            }),
        }
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Run `f` against the current value without cloning it.
    ///
    /// The value stays read-locked while `f` runs, so `f` must not call
    /// `set` or `update` on this binding; that would deadlock. Use
    /// [`Binding::update`] for read-modify-write.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Set a new value and notify observers.
    ///
    /// Nothing happens if `value` equals the current value. Errors from eager
    /// dependents that fail to recompute are returned here; the new value is
    /// stored regardless.
    pub fn set(&self, value: T) -> Result<()> {
        {
            let mut guard = self.inner.value.write();
            if *guard == value {
                tracing::trace!(node = %self.inner.id, "value unchanged, not notifying");
                return Ok(());
            }
            *guard = value;
        }

        tracing::trace!(
            node = %self.inner.id,
            observers = self.inner.observers.len(),
            "value changed"
        );
        self.inner.observers.notify()
    }

    /// Update the value using a function of the current value.
    ///
    /// `f` runs on a copy of the value with no lock held.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let current = self.get();
        self.set(f(&current))
    }
}

impl<T> Binding<T> {
    /// Get the binding's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Register a dependent.
    ///
    /// Returns `false` if the reference has already expired or the observer
    /// is already registered.
    pub fn add_observer(&self, observer: Weak<dyn Observer>) -> bool {
        match observer.upgrade() {
            Some(live) => self.inner.observers.insert(live.id(), observer),
            None => false,
        }
    }

    /// Remove the dependent registered under `id`.
    pub fn remove_observer(&self, id: NodeId) -> bool {
        self.inner.observers.remove(id)
    }

    /// Get the number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }

    pub(crate) fn observer_set(&self) -> &Arc<ObserverSet> {
        &self.inner.observers
    }
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Binding<T>
where
    T: Clone + PartialEq + Send + Sync + Default + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Debug> Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.read())
            .field("observer_count", &self.inner.observers.len())
            .finish()
    }
}

impl<T: Display> Display for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&*self.inner.value.read(), f)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
