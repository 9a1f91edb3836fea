//! Query execution against projected schemas.
//!
//! The executor understands the subset of the graph query language that a
//! projected schema can answer: nested selections, aliases, literal
//! arguments and `__typename`. Requests that fail to parse or validate
//! produce `data: null` and one error; resolver-time problems null the
//! affected field and are listed in `errors`.
//!
//! Every field of one response reads from the same store snapshot, taken
//! once validation passes, so a concurrent update never shows up halfway
//! through a response.

mod executor;
mod parser;

use serde::Serialize;

use crate::error::FieldError;
use crate::schema::ProjectedSchema;
use crate::storage::PathSource;

pub use parser::{parse, Document, Selection, MAX_SELECTION_DEPTH};

/// The result of executing one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl QueryResponse {
    /// True when data is present and no field failed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.data.is_some() && self.errors.is_empty()
    }

    /// Serializes as `{"data": ..., "errors": [...]}`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "data": self.data,
            "errors": self.errors,
        })
    }
}

/// Parses and executes `query` against `schema`, reading values from `source`.
///
/// # Examples
///
/// ```
/// use topicgraph::{execute, PathStore, ProjectedSchema};
///
/// let store = PathStore::new();
/// store.update("house/room/temp", "20");
/// let schema = ProjectedSchema::build(&store);
///
/// let response = execute(&schema, &store, "{ house { room { temp } } }");
/// assert_eq!(
///     response.data,
///     Some(serde_json::json!({"house": {"room": {"temp": 20}}}))
/// );
/// ```
pub fn execute(schema: &ProjectedSchema, source: &dyn PathSource, query: &str) -> QueryResponse {
    match parse(query) {
        Ok(document) => execute_document(schema, source, &document),
        Err(err) => {
            tracing::debug!(error = %err, "query rejected by parser");
            QueryResponse {
                data: None,
                errors: vec![FieldError::from(&err)],
            }
        }
    }
}

/// Executes an already-parsed document.
pub fn execute_document(
    schema: &ProjectedSchema,
    source: &dyn PathSource,
    document: &Document,
) -> QueryResponse {
    if let Err(err) = executor::validate(schema, document) {
        tracing::debug!(error = %err, "query failed validation");
        return QueryResponse {
            data: None,
            errors: vec![FieldError::from(&err)],
        };
    }

    let snapshot = source.snapshot();
    let (data, errors) = executor::Executor::new(schema, &snapshot).run(document);
    tracing::trace!(
        operation = document.operation_name.as_deref(),
        generation = schema.generation(),
        store_generation = snapshot.generation,
        field_errors = errors.len(),
        "executed query"
    );
    QueryResponse {
        data: Some(data),
        errors,
    }
}
