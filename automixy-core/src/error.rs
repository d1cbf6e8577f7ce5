//! Error types for the reactive graph.
//!
//! There are only two ways an operation on the graph can fail: a compute
//! function reports an error, or a node is asked to recompute while it is
//! already being recomputed further up the call stack. Expired observers are
//! not errors; they are skipped during notification.

use crate::reactive::NodeId;

/// Boxed error returned by fallible compute functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

/// Errors surfaced by `set`, `read` and eager construction.
#[derive(Debug, thiserror::Error)]
pub enum ReactiveError {
    /// The compute function of a derived node failed.
    ///
    /// The node is left dirty, so the next read retries the computation.
    #[error("computation of node {node} failed: {source}")]
    Compute {
        node: NodeId,
        #[source]
        source: BoxError,
    },

    /// A node was asked to recompute while it was already recomputing.
    ///
    /// This happens when a compute function mutates one of its own upstream
    /// bindings.
    #[error("node {node} was re-entered while recomputing")]
    Reentrant { node: NodeId },
}

impl ReactiveError {
    /// The node at which the failure was detected.
    pub fn node(&self) -> NodeId {
        match self {
            Self::Compute { node, .. } | Self::Reentrant { node } => *node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_error_keeps_source() {
        let node = NodeId::new();
        let err = ReactiveError::Compute {
            node,
            source: "division by zero".into(),
        };

        assert_eq!(err.node(), node);
        assert!(err.to_string().contains("division by zero"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn reentrant_error_names_node() {
        let node = NodeId::new();
        let err = ReactiveError::Reentrant { node };
        assert_eq!(err.node(), node);
        assert!(err.to_string().contains(&node.to_string()));
    }
}
