//! Error types for topicgraph.
//!
//! Ingestion and pattern matching never fail, so the only errors here come
//! from query handling and from waiting on the schema cache. Errors are
//! strongly typed using thiserror.

use serde::Serialize;
use thiserror::Error;

/// Errors that reject a whole query before any field is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax {
        offset: usize,
        message: String,
    },

    #[error("Unsupported operation type '{operation}'")]
    UnsupportedOperation {
        operation: String,
    },

    #[error("Cannot query field '{field}' on type '{type_name}'")]
    UnknownField {
        field: String,
        type_name: String,
    },

    #[error("Field '{field}' of type '{type_name}' must have a selection of subfields")]
    MissingSelection {
        field: String,
        type_name: String,
    },

    #[error("Field '{field}' must not have a selection since type '{type_name}' has no subfields")]
    UnexpectedSelection {
        field: String,
        type_name: String,
    },

    #[error("Field '{field}' argument '{argument}' of type '{expected}' is required")]
    MissingArgument {
        field: String,
        argument: String,
        expected: String,
    },

    #[error("Unknown argument '{argument}' on field '{field}'")]
    UnknownArgument {
        field: String,
        argument: String,
    },

    #[error("Argument '{argument}' on field '{field}' has an invalid value: {reason}")]
    InvalidArgument {
        field: String,
        argument: String,
        reason: String,
    },
}

impl QueryError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }
}

/// Errors raised while waiting on background work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Worker disconnected: {component}")]
    Disconnected {
        component: String,
    },
}

/// One segment of a response path: an object key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A resolver-time error attached to one field of a response.
///
/// The field itself resolves to `null`; sibling fields are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathSegment>,
}

impl FieldError {
    #[must_use]
    pub fn new(message: impl Into<String>, path: Vec<PathSegment>) -> Self {
        Self {
            message: message.into(),
            path,
        }
    }
}

impl From<&QueryError> for FieldError {
    fn from(err: &QueryError) -> Self {
        Self::new(err.to_string(), Vec::new())
    }
}

/// Top-level error type for topicgraph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl GraphError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_query(&self) -> bool {
        matches!(self, Self::Query(_))
    }

    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::Timeout { .. }))
    }
}

/// Result type alias for topicgraph operations.
pub type GraphResult<T> = Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_messages() {
        let err = QueryError::syntax(4, "expected '}'");
        assert_eq!(err.to_string(), "Syntax error at offset 4: expected '}'");

        let err = QueryError::UnknownField {
            field: "nope".to_string(),
            type_name: "Query".to_string(),
        };
        assert!(err.to_string().contains("Cannot query field 'nope'"));
    }

    #[test]
    fn test_execution_error_timeout() {
        let err = ExecutionError::Timeout { duration_ms: 5000 };
        assert!(err.to_string().contains("5000ms"));
    }

    #[test]
    fn test_graph_error_from_query() {
        let err: GraphError = QueryError::syntax(0, "x").into();
        assert!(err.is_query());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_graph_error_retryable() {
        let err: GraphError = ExecutionError::Timeout { duration_ms: 10 }.into();
        assert!(err.is_execution());
        assert!(err.is_retryable());

        let err: GraphError = ExecutionError::Disconnected {
            component: "schema-cache".to_string(),
        }
        .into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_graph_error_internal() {
        let err = GraphError::internal("unexpected state");
        assert!(err.is_internal());
        assert!(err.to_string().contains("unexpected state"));
    }

    #[test]
    fn test_field_error_serialization() {
        let err = FieldError::new(
            "boom",
            vec![PathSegment::Key("match".into()), PathSegment::Index(0)],
        );
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json, serde_json::json!({"message": "boom", "path": ["match", 0]}));

        let bare = serde_json::to_value(FieldError::new("x", Vec::new())).unwrap();
        assert_eq!(bare, serde_json::json!({"message": "x"}));
    }
}
