//! Automixy Core
//!
//! This crate provides a minimal reactive dependency graph built from two
//! node kinds:
//!
//! - Bindings: mutable source values
//! - Reactives: cached values derived from bindings, other reactives and
//!   constants, recomputed eagerly (push) or lazily (pull)
//!
//! Change propagation runs synchronously on the calling thread. Observer
//! edges are weak, so dependents are never kept alive by what they observe,
//! and a dropped reactive removes itself from the observer sets of its
//! inputs.
//!
//! # Architecture
//!
//! - `reactive`: node types, observer edges and the propagation protocol
//! - `profile`: call-counting wrapper for compute functions
//! - `error`: error types surfaced by `set`, `read` and construction
//!
//! # Example
//!
//! ```rust,ignore
//! use automixy_core::reactive::{Binding, Const, Reactive};
//!
//! // Create a binding
//! let b = Binding::new(5);
//!
//! // Derived values, one pushed and one pulled
//! let eager = Reactive::eager(|x: i32| x + 1, (b.clone(),))?;
//! let lazy = Reactive::lazy(|x: i32, y: i32| x * y, (b.clone(), Const(2)));
//!
//! // Update the binding
//! b.set(10)?;
//! assert_eq!(eager.read()?, 11); // already recomputed by `set`
//! assert_eq!(lazy.read()?, 20);  // recomputed by this read
//! ```

pub mod error;
pub mod profile;
pub mod reactive;

pub use error::{BoxError, ReactiveError, Result};
pub use profile::{profile, profile_named, CallStats, ProfileStats, Profiled};
pub use reactive::{Binding, Const, Evaluation, NodeState, Reactive};
