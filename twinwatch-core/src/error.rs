//! Error types for reducers.

use thiserror::Error;

/// Errors raised while classifying or reducing a message batch.
///
/// Validation errors fail the whole batch and leave the caller's state
/// untouched. Classification errors only ever describe a single message: the
/// reducers log them, skip the message and carry on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    /// A field the message kind requires is absent.
    #[error("{kind} message is missing required field `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    /// The node type is not one the alert tables know.
    #[error("invalid node type: {0:?}")]
    InvalidNodeType(String),

    /// The reported condition is not a known value.
    #[error("unknown node condition: {0:?}")]
    UnknownCondition(String),

    /// The message type is neither init nor status.
    #[error("unknown message type: {0:?}")]
    UnknownMessageType(String),
}

impl ReduceError {
    /// Classification errors skip one message instead of failing the batch.
    pub fn is_classification(&self) -> bool {
        matches!(
            self,
            ReduceError::UnknownCondition(_) | ReduceError::UnknownMessageType(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_errors() {
        assert!(ReduceError::UnknownCondition("hot".into()).is_classification());
        assert!(ReduceError::UnknownMessageType("ping".into()).is_classification());
        assert!(!ReduceError::InvalidNodeType("relay".into()).is_classification());
        assert!(!ReduceError::MissingField {
            kind: "status",
            field: "condition"
        }
        .is_classification());
    }

    #[test]
    fn missing_field_message() {
        let err = ReduceError::MissingField {
            kind: "init",
            field: "node_type",
        };
        assert_eq!(
            err.to_string(),
            "init message is missing required field `node_type`"
        );
    }
}
