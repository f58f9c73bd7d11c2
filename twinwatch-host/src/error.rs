//! Error type for the host.

use thiserror::Error;
use twinwatch_core::ReduceError;

/// Errors raised while dispatching a batch or persisting state.
#[derive(Debug, Error)]
pub enum HostError {
    /// The reducer rejected the batch.
    #[error("batch rejected: {0}")]
    Reduce(#[from] ReduceError),

    /// An alert output or the state file could not be written.
    #[error("delivery failed: {0}")]
    Delivery(#[from] std::io::Error),

    /// A value could not be encoded or decoded as JSON.
    #[error("json: {0}")]
    Encode(#[from] serde_json::Error),

    /// A channel output's receiver was dropped.
    #[error("output channel closed")]
    Closed,
}

impl HostError {
    /// Check if the reducer rejected the batch, as opposed to a delivery failure.
    pub fn is_rejected(&self) -> bool {
        matches!(self, HostError::Reduce(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_errors_are_rejections() {
        let err: HostError = ReduceError::InvalidNodeType("relay".into()).into();
        assert!(err.is_rejected());
        assert_eq!(err.to_string(), "batch rejected: invalid node type: \"relay\"");
    }

    #[test]
    fn io_errors_are_delivery_failures() {
        let err: HostError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone").into();
        assert!(!err.is_rejected());
        assert!(err.to_string().starts_with("delivery failed"));
    }
}
