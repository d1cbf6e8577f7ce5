//! Dependency lists.
//!
//! A derived node is built from an ordered list of inputs. Each input is a
//! [`Binding`], another [`Reactive`], or a literal wrapped in [`Const`]. The
//! list is written as a tuple, and the tuple position is the positional
//! argument the compute function receives:
//!
//! ```rust,ignore
//! let total = Reactive::lazy(
//!     |x: i32, y: i32, z: i32| x + y + z,
//!     (b.clone(), c.clone(), Const(3)),
//! );
//! ```
//!
//! A `Vec` of one input type is also accepted; its values are passed to the
//! compute function as a single `Vec` argument.

use std::sync::Arc;

use smallvec::SmallVec;

use super::binding::Binding;
use super::derived::Reactive;
use super::observer::ObserverSet;
use crate::error::Result;

/// Observer sets of the inputs a derived node registers itself on.
pub type ObserverSets = SmallVec<[Arc<ObserverSet>; 4]>;

/// A single input of a derived node.
pub trait Dependency: Send + Sync + 'static {
    type Output;

    /// Current value of the input. Reading a dirty lazy node recomputes it.
    fn current(&self) -> Result<Self::Output>;

    /// The observer set to register on, or `None` for inputs that never
    /// change.
    fn observers(&self) -> Option<Arc<ObserverSet>>;
}

/// A literal input. It contributes itself and is never observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Const<T>(pub T);

impl<T> Dependency for Const<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = T;

    fn current(&self) -> Result<T> {
        Ok(self.0.clone())
    }

    fn observers(&self) -> Option<Arc<ObserverSet>> {
        None
    }
}

impl<T> Dependency for Binding<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Output = T;

    fn current(&self) -> Result<T> {
        Ok(self.get())
    }

    fn observers(&self) -> Option<Arc<ObserverSet>> {
        Some(Arc::clone(self.observer_set()))
    }
}

impl<T> Dependency for Reactive<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Output = T;

    fn current(&self) -> Result<T> {
        self.read()
    }

    fn observers(&self) -> Option<Arc<ObserverSet>> {
        Some(Arc::clone(self.observer_set()))
    }
}

/// The full, ordered input list of a derived node.
pub trait Dependencies: Send + Sync + 'static {
    /// The argument tuple handed to the compute function.
    type Values;

    /// Read every input, in order.
    fn values(&self) -> Result<Self::Values>;

    /// Observer sets of every observable input, in order.
    fn observer_sets(&self) -> ObserverSets;
}

macro_rules! impl_dependencies {
    ($($dep:ident),*) => {
        impl<$($dep: Dependency),*> Dependencies for ($($dep,)*) {
            type Values = ($($dep::Output,)*);

            #[allow(non_snake_case, clippy::unused_unit)]
            fn values(&self) -> Result<Self::Values> {
                let ($($dep,)*) = self;
                Ok(($($dep.current()?,)*))
            }

            #[allow(non_snake_case, unused_mut)]
            fn observer_sets(&self) -> ObserverSets {
                let ($($dep,)*) = self;
                let mut sets = ObserverSets::new();
                $(sets.extend($dep.observers());)*
                sets
            }
        }
    };
}

impl_dependencies!();
impl_dependencies!(A);
impl_dependencies!(A, B);
impl_dependencies!(A, B, C);
impl_dependencies!(A, B, C, D);
impl_dependencies!(A, B, C, D, E);
impl_dependencies!(A, B, C, D, E, F);
impl_dependencies!(A, B, C, D, E, F, G);
impl_dependencies!(A, B, C, D, E, F, G, H);

impl<D: Dependency> Dependencies for Vec<D> {
    type Values = (Vec<D::Output>,);

    fn values(&self) -> Result<Self::Values> {
        let values = self.iter().map(Dependency::current).collect::<Result<_>>()?;
        Ok((values,))
    }

    fn observer_sets(&self) -> ObserverSets {
        self.iter().filter_map(Dependency::observers).collect()
    }
}

/// Positional application of a compute function to an argument tuple.
///
/// Implemented for every `Fn` of arity 0 to 8. Closures passed to a derived
/// node need their parameter types written out, e.g. `|x: i32| x + 1`.
pub trait Apply<Args, R> {
    fn apply(&self, args: Args) -> R;
}

macro_rules! impl_apply {
    ($($arg:ident),*) => {
        impl<Func, R, $($arg),*> Apply<($($arg,)*), R> for Func
        where
            Func: Fn($($arg),*) -> R,
        {
            #[allow(non_snake_case)]
            fn apply(&self, ($($arg,)*): ($($arg,)*)) -> R {
                self($($arg),*)
            }
        }
    };
}

impl_apply!();
impl_apply!(A);
impl_apply!(A, B);
impl_apply!(A, B, C);
impl_apply!(A, B, C, D);
impl_apply!(A, B, C, D, E);
impl_apply!(A, B, C, D, E, F);
impl_apply!(A, B, C, D, E, F, G);
impl_apply!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_values_keep_positional_order() {
        let first = Binding::new(1);
        let second = Binding::new("two");
        let deps = (first.clone(), second.clone(), Const(3.0));

        assert_eq!(deps.values().unwrap(), (1, "two", 3.0));

        first.set(10).unwrap();
        assert_eq!(deps.values().unwrap().0, 10);
    }

    #[test]
    fn constants_are_not_observed() {
        let b = Binding::new(0);
        let deps = (Const(1), b.clone(), Const("x"));

        let sets = deps.observer_sets();
        assert_eq!(sets.len(), 1);
        assert!(Arc::ptr_eq(&sets[0], b.observer_set()));
    }

    #[test]
    fn empty_list_has_no_inputs() {
        let deps = ();
        deps.values().unwrap();
        assert!(deps.observer_sets().is_empty());
    }

    #[test]
    fn vec_dependencies_collect_values() {
        let bindings = vec![Binding::new(1), Binding::new(2), Binding::new(3)];
        let (values,) = bindings.values().unwrap();

        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(bindings.observer_sets().len(), 3);
    }

    #[test]
    fn apply_spreads_arguments() {
        let add = |x: i32, y: i32, z: i32| x * 100 + y * 10 + z;
        assert_eq!(add.apply((1, 2, 3)), 123);

        let zero_arity = || "no inputs";
        assert_eq!(zero_arity.apply(()), "no inputs");
    }
}
