//! Error types for graph extraction.
//!
//! Every failure aborts the current compilation unit. The engine is
//! deterministic and idempotent on success, so re-running a unit is the only
//! recovery; there is no rollback, and facts already emitted before a failure
//! must be discarded by the caller.

use thiserror::Error;

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Fatal extraction failures.
///
/// None of these are retried or skipped: silently dropping a recognized
/// construct would yield a silently incomplete graph.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A recognized language feature the extractor does not implement
    /// (type alias, callable reference, delegated property, annotation
    /// class, star projection in argument position, error/dynamic type).
    #[error("unsupported construct: {construct}")]
    UnsupportedConstruct { construct: String },

    /// A required structural invariant is absent from the input tree.
    /// Signals a front-end defect, not a user error.
    #[error("malformed input: {message}")]
    MalformedInput { message: String },

    /// A reference could not be mapped to a VName.
    #[error("resolution failure: {message}")]
    ResolutionFailure { message: String },
}

impl IndexError {
    /// An unsupported-construct failure for the named feature.
    pub fn unsupported(construct: impl Into<String>) -> Self {
        IndexError::UnsupportedConstruct {
            construct: construct.into(),
        }
    }

    /// A malformed-input failure with the given description.
    pub fn malformed(message: impl Into<String>) -> Self {
        IndexError::MalformedInput {
            message: message.into(),
        }
    }

    /// A resolution failure with the given description.
    pub fn unresolved(message: impl Into<String>) -> Self {
        IndexError::ResolutionFailure {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_failure() {
        let err = IndexError::unsupported("type aliases");
        assert_eq!(err.to_string(), "unsupported construct: type aliases");

        let err = IndexError::malformed("no identifier token for `foo`");
        assert_eq!(
            err.to_string(),
            "malformed input: no identifier token for `foo`"
        );

        let err = IndexError::unresolved("unknown classifier");
        assert_eq!(err.to_string(), "resolution failure: unknown classifier");
    }
}
