//! Reactive Primitives
//!
//! This module implements the two node kinds of the dependency graph:
//! bindings and reactives.
//!
//! # Concepts
//!
//! ## Bindings
//!
//! A Binding is a source node: a container for mutable state, and the only
//! node that external code mutates directly. Setting a binding to a value
//! equal to its current one does nothing.
//!
//! ## Reactives
//!
//! A Reactive is a derived node. It applies a pure function to an ordered
//! list of inputs and caches the result. Eager reactives recompute as soon
//! as an input changes (push). Lazy reactives only mark themselves dirty
//! and recompute when read (pull).
//!
//! ## Observer edges
//!
//! Each node keeps weak references to its dependents and notifies them
//! through the single [`Observer::on_source_changed`] operation. Observer
//! edges never own anything; a derived node is kept alive by whoever holds a
//! handle to it, including a downstream node that lists it as an input.
//!
//! # Implementation Notes
//!
//! Propagation is a synchronous depth-first walk over observer edges. There
//! is no topological batching: a node reachable through two paths from the
//! same binding may recompute more than once per `set`.

mod binding;
mod context;
mod dependency;
mod derived;
mod observer;

pub use binding::Binding;
pub use dependency::{Apply, Const, Dependencies, Dependency, ObserverSets};
pub use derived::{Evaluation, NodeState, Reactive};
pub use observer::{NodeId, Observer, ObserverSet};
