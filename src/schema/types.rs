//! Declarative schema types.
//!
//! Resolvers are data, not closures: each field records where its value
//! comes from and the executor reads the store when the query runs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::value::{Value, ValueKind};

/// Scalar types a field can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScalarKind {
    Float,
    Boolean,
    String,
    /// Opaque JSON passthrough.
    Json,
}

impl ScalarKind {
    /// Scalar chosen for a value observed at build time.
    ///
    /// Numbers map to `Float`, booleans to `Boolean`, structured values and
    /// null to `JSON`; everything else (including no value) to `String`.
    #[must_use]
    pub fn for_value(value: Option<&Value>) -> Self {
        match value.map(Value::kind) {
            Some(ValueKind::Number) => Self::Float,
            Some(ValueKind::Bool) => Self::Boolean,
            Some(ValueKind::Structured | ValueKind::Null) => Self::Json,
            Some(ValueKind::String) | None => Self::String,
        }
    }

    /// Type name as it appears in SDL.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::String => "String",
            Self::Json => "JSON",
        }
    }
}

/// The output type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldType {
    Scalar {
        scalar: ScalarKind,
        non_null: bool,
    },
    /// A named object type.
    Object {
        type_name: String,
    },
    /// A nullable list of non-null objects.
    ObjectList {
        type_name: String,
    },
}

impl FieldType {
    #[must_use]
    pub const fn scalar(scalar: ScalarKind) -> Self {
        Self::Scalar {
            scalar,
            non_null: false,
        }
    }

    /// Object type name, for object and list fields.
    #[must_use]
    pub fn object_type(&self) -> Option<&str> {
        match self {
            Self::Object { type_name } | Self::ObjectList { type_name } => Some(type_name),
            Self::Scalar { .. } => None,
        }
    }

    /// Renders the type reference as SDL.
    #[must_use]
    pub fn to_sdl(&self) -> String {
        match self {
            Self::Scalar { scalar, non_null } => {
                let bang = if *non_null { "!" } else { "" };
                format!("{}{bang}", scalar.name())
            }
            Self::Object { type_name } => type_name.clone(),
            Self::ObjectList { type_name } => format!("[{type_name}!]"),
        }
    }
}

/// Where a field's value comes from at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolver {
    /// Read the store at `path`.
    StoreValue { path: String },
    /// Descend into the nested object type of a tree branch.
    Node { path: String },
    /// Run a wildcard match against the store.
    Match,
    /// `TopicResult.path` of the enclosing match result.
    ResultPath,
    /// `TopicResult.value` of the enclosing match result.
    ResultValue,
    /// `TopicResult.updatedAt` of the enclosing match result.
    ResultUpdatedAt,
    /// Always null.
    Placeholder,
}

/// A declared field argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgumentDef {
    pub name: String,
    pub scalar: ScalarKind,
    pub non_null: bool,
}

/// A field on an object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<ArgumentDef>,
    pub resolver: Resolver,
    /// Store path behind the field, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDef {
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&ArgumentDef> {
        self.arguments.iter().find(|a| a.name == name)
    }
}

/// A named object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectType {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Fields keyed and ordered by name.
    pub fields: BTreeMap<String, FieldDef>,
}

impl ObjectType {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }
}

/// A non-fatal naming decision made during a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Two segments sanitized to the same field name; the later one in sort
    /// order won.
    FieldCollision {
        type_name: String,
        field: String,
        kept: String,
        dropped: String,
    },
    /// A synthesized type name was taken and a suffix was appended.
    TypeRenamed {
        requested: String,
        assigned: String,
        path: String,
    },
    /// A segment's field name is reserved on its type and was renamed.
    ReservedField {
        type_name: String,
        segment: String,
        renamed_to: String,
    },
    /// A stored path has more segments than the schema covers and has no
    /// field. It is still reachable through `match`.
    PathTooDeep { path: String, depth: usize },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldCollision {
                type_name,
                field,
                kept,
                dropped,
            } => write!(
                f,
                "{type_name}.{field}: segment {kept:?} shadows {dropped:?}"
            ),
            Self::TypeRenamed {
                requested,
                assigned,
                path,
            } => write!(f, "type {requested} for {path:?} renamed to {assigned}"),
            Self::ReservedField {
                type_name,
                segment,
                renamed_to,
            } => write!(f, "{type_name}: segment {segment:?} exposed as {renamed_to}"),
            Self::PathTooDeep { path, depth } => {
                let head: String = path.chars().take(48).collect();
                let ellipsis = if head.len() < path.len() { "..." } else { "" };
                write!(f, "path {head:?}{ellipsis} has {depth} segments, no field generated")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_for_value() {
        assert_eq!(ScalarKind::for_value(Some(&Value::Int(1))), ScalarKind::Float);
        assert_eq!(ScalarKind::for_value(Some(&Value::Float(1.5))), ScalarKind::Float);
        assert_eq!(ScalarKind::for_value(Some(&Value::Bool(true))), ScalarKind::Boolean);
        assert_eq!(ScalarKind::for_value(Some(&Value::Null)), ScalarKind::Json);
        assert_eq!(
            ScalarKind::for_value(Some(&Value::Structured(serde_json::json!([])))),
            ScalarKind::Json
        );
        assert_eq!(ScalarKind::for_value(Some(&Value::from("x"))), ScalarKind::String);
        assert_eq!(ScalarKind::for_value(None), ScalarKind::String);
    }

    #[test]
    fn test_field_type_sdl() {
        assert_eq!(FieldType::scalar(ScalarKind::Json).to_sdl(), "JSON");
        let nn = FieldType::Scalar {
            scalar: ScalarKind::String,
            non_null: true,
        };
        assert_eq!(nn.to_sdl(), "String!");
        let list = FieldType::ObjectList {
            type_name: "TopicResult".into(),
        };
        assert_eq!(list.to_sdl(), "[TopicResult!]");
        assert_eq!(list.object_type(), Some("TopicResult"));
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::FieldCollision {
            type_name: "Root_a".into(),
            field: "b_c".into(),
            kept: "b.c".into(),
            dropped: "b-c".into(),
        };
        assert_eq!(d.to_string(), "Root_a.b_c: segment \"b.c\" shadows \"b-c\"");

        let deep = Diagnostic::PathTooDeep {
            path: "a/".repeat(100) + "a",
            depth: 101,
        };
        let shown = deep.to_string();
        assert!(shown.starts_with("path \"a/a/"));
        assert!(shown.ends_with("\"... has 101 segments, no field generated"));
        assert!(shown.len() < 100);
    }
}
