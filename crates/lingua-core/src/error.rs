//! Core error types.
//!
//! Every public operation in the learning core reports failures through
//! [`CoreError`]. Per-answer problems never surface here; they are absorbed
//! into exercise feedback by the evaluator.

use thiserror::Error;

/// Errors raised by the learning core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Lesson content failed structural validation.
    #[error("invalid lesson content: {0}")]
    ContentSchemaInvalid(String),

    /// A single answer could not be interpreted for its exercise kind.
    #[error("answer {index} could not be interpreted: {reason}")]
    AnswerCoercionFailed { index: usize, reason: String },

    /// A concurrent write touched the same progress record or card direction.
    #[error("persistence conflict: {0}")]
    PersistenceConflict(String),

    /// The access gatekeeper refused entry.
    #[error("access denied: {reason}")]
    AccessDenied { reason: String },

    /// A lesson, module, user or word lookup failed.
    #[error("{entity} not found: {id}")]
    EntityNotFound { entity: &'static str, id: String },

    /// A computed value broke a data-model invariant.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The caller supplied an input outside the accepted range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The lesson kind is not scored by the submission grader.
    #[error("lessons of kind '{kind}' are not graded by submission")]
    NotGradable { kind: String },
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::EntityNotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn access_denied(reason: impl Into<String>) -> Self {
        CoreError::AccessDenied {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the operation may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::PersistenceConflict(_))
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(CoreError::PersistenceConflict("progress 4".into()).is_retryable());
        assert!(!CoreError::access_denied("locked").is_retryable());
        assert!(!CoreError::not_found("lesson", 7).is_retryable());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            CoreError::not_found("lesson", 42).to_string(),
            "lesson not found: 42"
        );
        assert_eq!(
            CoreError::ContentSchemaInvalid("missing 'questions'".into()).to_string(),
            "invalid lesson content: missing 'questions'"
        );
    }
}
