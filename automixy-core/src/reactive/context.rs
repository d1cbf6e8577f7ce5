//! Evaluation Context
//!
//! The evaluation context tracks which derived nodes are currently
//! recomputing on this thread. Recomputation nests naturally: a lazy node
//! reading a dirty lazy dependency recomputes that dependency first. A node
//! that shows up twice on the stack is being re-entered, which is reported as
//! [`ReactiveError::Reentrant`] instead of recursing without bound.
//!
//! # Implementation
//!
//! We use a thread-local stack. Entering pushes the node, and the returned
//! guard pops it when dropped, so the stack stays balanced even if the
//! compute function panics.

use std::cell::RefCell;

use super::NodeId;
use crate::error::{ReactiveError, Result};

thread_local! {
    static EVAL_STACK: RefCell<Vec<NodeId>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
pub(crate) struct ReactiveContext {
    node: NodeId,
}

impl ReactiveContext {
    /// Enter the evaluation context of `node`.
    ///
    /// Fails if `node` is already being evaluated on this thread.
    pub(crate) fn enter(node: NodeId) -> Result<Self> {
        EVAL_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&node) {
                return Err(ReactiveError::Reentrant { node });
            }
            stack.push(node);
            Ok(Self { node })
        })
    }

    /// Number of nested evaluations in progress.
    pub(crate) fn depth() -> usize {
        EVAL_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        EVAL_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(
                popped,
                Some(self.node),
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.node,
                popped
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> Vec<NodeId> {
        EVAL_STACK.with(|stack| stack.borrow().clone())
    }

    #[test]
    fn context_tracks_node() {
        let id = NodeId::new();
        assert_eq!(ReactiveContext::depth(), 0);

        {
            let _ctx = ReactiveContext::enter(id).unwrap();
            assert_eq!(stack(), vec![id]);
        }

        assert!(stack().is_empty());
    }

    /// A node reading a dirty lazy input recomputes that input inside its
    /// own evaluation. The inner node may not pull the outer one back in.
    #[test]
    fn nested_recompute_rejects_cycle_back_to_outer() {
        let outer = NodeId::new();
        let input = NodeId::new();

        let outer_ctx = ReactiveContext::enter(outer).unwrap();
        {
            let _input_ctx = ReactiveContext::enter(input).unwrap();
            assert_eq!(stack(), vec![outer, input]);

            let err = ReactiveContext::enter(outer).err().unwrap();
            assert!(matches!(err, ReactiveError::Reentrant { node } if node == outer));
            assert_eq!(ReactiveContext::depth(), 2);
        }

        // Popping the input leaves the outer evaluation in place.
        assert_eq!(stack(), vec![outer]);
        drop(outer_ctx);
        assert!(stack().is_empty());

        // Both nodes can be evaluated again, in either order.
        let _input_ctx = ReactiveContext::enter(input).unwrap();
        let _outer_ctx = ReactiveContext::enter(outer).unwrap();
        assert_eq!(stack(), vec![input, outer]);
    }

    #[test]
    fn reentering_a_node_fails() {
        let id = NodeId::new();
        let _ctx = ReactiveContext::enter(id).unwrap();

        let err = ReactiveContext::enter(id).err().unwrap();
        assert!(matches!(err, ReactiveError::Reentrant { node } if node == id));

        // The failed attempt must not have pushed anything.
        assert_eq!(ReactiveContext::depth(), 1);
    }
}
