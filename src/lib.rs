//! # topicgraph - typed queries over a live topic store
//!
//! topicgraph keeps the latest value published at every slash-delimited path
//! (`home/livingroom/temperature`) and projects the path hierarchy into a
//! typed query schema. The schema's shape is fixed when it is built; field
//! values are read from the store when a query runs.
//!
//! ## Core Concepts
//!
//! - **Path Store**: the latest value per path, with type inference on ingest
//!   and recursive flattening of structured payloads into sub-paths
//! - **Wildcard pattern**: `+` matches one segment, `#` any remainder
//! - **Topic Tree**: the hierarchy of one store snapshot
//! - **Projected Schema**: one object type per branch, one scalar field per leaf,
//!   plus `match(pattern)` on the root type
//!
//! ## Usage
//!
//! ```rust
//! use topicgraph::{execute, PathStore, ProjectedSchema};
//!
//! let store = PathStore::new();
//! store.update("home/livingroom/temperature", "22.5");
//! store.update("device/lock", r#"{"state":{"isLocked":true}}"#);
//!
//! let schema = ProjectedSchema::build(&store);
//! let response = execute(
//!     &schema,
//!     &store,
//!     "{ home { livingroom { temperature } } device { lock { state { isLocked } } } }",
//! );
//! assert!(response.is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod error;
pub mod ingest;
pub mod pattern;
pub mod query;
pub mod schema;
pub mod storage;
pub mod tree;
pub mod value;

// Re-export primary types at crate root for convenience
pub use cache::{SchemaCache, SchemaCacheConfig};
pub use error::{ExecutionError, FieldError, GraphError, GraphResult, PathSegment, QueryError};
pub use ingest::{Ingestor, ReplayStats};
pub use pattern::WildcardPattern;
pub use query::{execute, QueryResponse};
pub use schema::{Diagnostic, ProjectedSchema};
pub use storage::{
    EntryOrigin, PathMatch, PathSource, PathStore, Snapshot, StalePolicy, StoreConfig, StoreEntry,
};
pub use tree::{NodeKind, TopicNode, TopicTree, MAX_TOPIC_DEPTH};
pub use value::{Value, ValueKind};
