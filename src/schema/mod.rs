//! Schema projection.
//!
//! A [`ProjectedSchema`] mirrors the path hierarchy of one store snapshot:
//! every branch of the topic tree becomes an object type, every leaf a scalar
//! field, and the `Query` type additionally carries a fixed
//! `match(pattern: String!): [TopicResult!]` field.
//!
//! Only the shape is frozen at build time. Resolvers are declarative and the
//! executor reads the store when a query runs, so a schema built once keeps
//! returning current values.

mod builder;
mod naming;
mod types;

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::storage::{PathSource, Snapshot};

pub use naming::{sanitize, EMPTY_NAME, VALUE_FIELD};
pub use types::{
    ArgumentDef, Diagnostic, FieldDef, FieldType, ObjectType, Resolver, ScalarKind,
};

/// A complete query-type graph built from one store snapshot.
#[derive(Debug, Clone)]
pub struct ProjectedSchema {
    generation: u64,
    types: BTreeMap<String, ObjectType>,
    diagnostics: Vec<Diagnostic>,
    sdl: String,
    fingerprint: String,
}

impl ProjectedSchema {
    /// Builds a schema from one snapshot of `source`.
    #[must_use]
    pub fn build(source: &dyn PathSource) -> Self {
        builder::project(&source.snapshot())
    }

    /// Builds a schema from an already-taken snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        builder::project(snapshot)
    }

    pub(crate) fn assemble(
        generation: u64,
        types: BTreeMap<String, ObjectType>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let sdl = render_sdl(&types);
        let fingerprint = blake3::hash(sdl.as_bytes()).to_hex().to_string();
        Self {
            generation,
            types,
            diagnostics,
            sdl,
            fingerprint,
        }
    }

    /// Store generation this schema reflects.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// The root `Query` type.
    #[must_use]
    pub fn query_type(&self) -> &ObjectType {
        // `assemble` is only called by the builder, which always registers Query.
        &self.types[builder::QUERY_TYPE]
    }

    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<&ObjectType> {
        self.types.get(name)
    }

    /// All object types, ordered by name.
    pub fn types(&self) -> impl Iterator<Item = &ObjectType> {
        self.types.values()
    }

    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Naming conflicts resolved during the build.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// SDL rendering of the schema.
    #[must_use]
    pub fn to_sdl(&self) -> &str {
        &self.sdl
    }

    /// blake3 hex digest of the SDL. Equal content gives equal fingerprints.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn render_sdl(types: &BTreeMap<String, ObjectType>) -> String {
    let mut out = String::from("scalar JSON\n");
    let query = types.get(builder::QUERY_TYPE);
    let rest = types.values().filter(|t| t.name != builder::QUERY_TYPE);
    for ty in query.into_iter().chain(rest) {
        out.push('\n');
        if let Some(desc) = &ty.description {
            let _ = writeln!(out, "{}", quote(desc));
        }
        let _ = writeln!(out, "type {} {{", ty.name);
        for field in ty.fields.values() {
            if let Some(desc) = &field.description {
                let _ = writeln!(out, "  {}", quote(desc));
            }
            let _ = write!(out, "  {}", field.name);
            if !field.arguments.is_empty() {
                let args: Vec<String> = field
                    .arguments
                    .iter()
                    .map(|a| {
                        let bang = if a.non_null { "!" } else { "" };
                        format!("{}: {}{bang}", a.name, a.scalar.name())
                    })
                    .collect();
                let _ = write!(out, "({})", args.join(", "));
            }
            let _ = writeln!(out, ": {}", field.ty.to_sdl());
        }
        out.push_str("}\n");
    }
    out
}

fn quote(text: &str) -> String {
    // serde_json string escaping is a valid SDL string literal.
    serde_json::Value::String(text.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PathStore;

    #[test]
    fn test_build_from_store() {
        let store = PathStore::new();
        store.update("house/room/temp", "20");
        let schema = ProjectedSchema::build(&store);
        assert_eq!(schema.generation(), 1);
        assert!(schema.get_type("Root_house").is_some());
        assert!(schema.get_type("Root_house_room").is_some());
        assert_eq!(schema.type_count(), 4);
    }

    #[test]
    fn test_sdl_rendering() {
        let store = PathStore::new();
        store.update("temp", "21.5");
        let schema = ProjectedSchema::build(&store);
        let expected = "scalar JSON

type Query {
  \"Stored entries whose path matches a wildcard pattern\"
  match(pattern: String!): [TopicResult!]
  \"temp\"
  temp: Float
}

type TopicResult {
  path: String!
  updatedAt: String
  value: JSON
}
";
        assert_eq!(schema.to_sdl(), expected);
    }

    #[test]
    fn test_fingerprint_tracks_shape_not_values() {
        let store = PathStore::new();
        store.update("a/b", "1");
        let first = ProjectedSchema::build(&store);
        store.update("a/b", "2");
        let same_shape = ProjectedSchema::build(&store);
        store.update("a/c", "3");
        let new_shape = ProjectedSchema::build(&store);

        assert_eq!(first.fingerprint(), same_shape.fingerprint());
        assert_ne!(first.fingerprint(), new_shape.fingerprint());
        assert_eq!(first.fingerprint().len(), 64);
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
    }
}
