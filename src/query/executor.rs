//! Validation and execution of parsed documents against a projected schema.

use crate::error::{FieldError, PathSegment, QueryError};
use crate::schema::{FieldDef, FieldType, ObjectType, ProjectedSchema, Resolver, ScalarKind};
use crate::pattern::WildcardPattern;
use crate::storage::{PathMatch, Snapshot};
use crate::value::Value;

use super::parser::{Document, Selection};

const TYPENAME: &str = "__typename";

/// Checks every selection against the schema before anything resolves.
pub(crate) fn validate(schema: &ProjectedSchema, document: &Document) -> Result<(), QueryError> {
    validate_selection(schema, schema.query_type(), &document.selection)
}

fn validate_selection(
    schema: &ProjectedSchema,
    ty: &ObjectType,
    selection: &[Selection],
) -> Result<(), QueryError> {
    for sel in selection {
        if sel.name == TYPENAME {
            if sel.selection.is_some() {
                return Err(QueryError::UnexpectedSelection {
                    field: sel.name.clone(),
                    type_name: "String!".to_string(),
                });
            }
            if let Some(arg) = sel.arguments.keys().next() {
                return Err(QueryError::UnknownArgument {
                    field: sel.name.clone(),
                    argument: arg.clone(),
                });
            }
            continue;
        }

        let field = ty.field(&sel.name).ok_or_else(|| QueryError::UnknownField {
            field: sel.name.clone(),
            type_name: ty.name.clone(),
        })?;
        validate_arguments(field, sel)?;

        match (field.ty.object_type(), &sel.selection) {
            (Some(type_name), Some(sub)) => {
                let nested = schema.get_type(type_name).ok_or_else(|| QueryError::UnknownField {
                    field: sel.name.clone(),
                    type_name: ty.name.clone(),
                })?;
                validate_selection(schema, nested, sub)?;
            }
            (Some(type_name), None) => {
                return Err(QueryError::MissingSelection {
                    field: sel.name.clone(),
                    type_name: field_type_label(&field.ty, type_name),
                });
            }
            (None, Some(_)) => {
                return Err(QueryError::UnexpectedSelection {
                    field: sel.name.clone(),
                    type_name: field.ty.to_sdl(),
                });
            }
            (None, None) => {}
        }
    }
    Ok(())
}

fn field_type_label(ty: &FieldType, type_name: &str) -> String {
    match ty {
        FieldType::ObjectList { .. } => ty.to_sdl(),
        _ => type_name.to_string(),
    }
}

fn validate_arguments(field: &FieldDef, sel: &Selection) -> Result<(), QueryError> {
    if let Some(unknown) = sel.arguments.keys().find(|k| field.argument(k).is_none()) {
        return Err(QueryError::UnknownArgument {
            field: sel.name.clone(),
            argument: unknown.clone(),
        });
    }

    for arg in &field.arguments {
        let expected = format!("{}{}", arg.scalar.name(), if arg.non_null { "!" } else { "" });
        match sel.arguments.get(&arg.name) {
            None | Some(serde_json::Value::Null) if arg.non_null => {
                return Err(QueryError::MissingArgument {
                    field: sel.name.clone(),
                    argument: arg.name.clone(),
                    expected,
                });
            }
            Some(value) if arg.scalar == ScalarKind::String && !value.is_string() && !value.is_null() => {
                return Err(QueryError::InvalidArgument {
                    field: sel.name.clone(),
                    argument: arg.name.clone(),
                    reason: format!("expected {expected}, found {value}"),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum Parent<'a> {
    Node,
    Match(&'a PathMatch),
}

/// Resolves a validated document against one snapshot. Field errors are
/// collected, not raised.
pub(crate) struct Executor<'a> {
    schema: &'a ProjectedSchema,
    snapshot: &'a Snapshot,
    errors: Vec<FieldError>,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(schema: &'a ProjectedSchema, snapshot: &'a Snapshot) -> Self {
        Self {
            schema,
            snapshot,
            errors: Vec::new(),
        }
    }

    pub(crate) fn run(mut self, document: &Document) -> (serde_json::Value, Vec<FieldError>) {
        let mut path = Vec::new();
        let query = self.schema.query_type();
        let data = self.resolve_object(query, &document.selection, Parent::Node, &mut path);
        (data, self.errors)
    }

    fn resolve_object(
        &mut self,
        ty: &ObjectType,
        selection: &[Selection],
        parent: Parent<'_>,
        path: &mut Vec<PathSegment>,
    ) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        for sel in selection {
            let key = sel.response_key().to_string();
            path.push(PathSegment::Key(key.clone()));
            let value = if sel.name == TYPENAME {
                serde_json::Value::String(ty.name.clone())
            } else if let Some(field) = ty.field(&sel.name) {
                self.resolve_field(field, sel, parent, path)
            } else {
                self.fail(format!("Cannot query field '{}' on type '{}'", sel.name, ty.name), path)
            };
            path.pop();
            out.insert(key, value);
        }
        serde_json::Value::Object(out)
    }

    fn resolve_field(
        &mut self,
        field: &FieldDef,
        sel: &Selection,
        parent: Parent<'_>,
        path: &mut Vec<PathSegment>,
    ) -> serde_json::Value {
        match (&field.resolver, parent) {
            (Resolver::StoreValue { path: store_path }, _) => {
                let snapshot = self.snapshot;
                match snapshot.get(store_path) {
                    None => serde_json::Value::Null,
                    Some(value) => self.scalar(&field.ty, value, path),
                }
            }
            (Resolver::Node { .. }, _) => {
                let Some(ty) = self.nested_type(&field.ty) else {
                    return self.fail(format!("type of field '{}' is missing", field.name), path);
                };
                let sub = sel.selection.as_deref().unwrap_or_default();
                self.resolve_object(ty, sub, Parent::Node, path)
            }
            (Resolver::Match, _) => self.resolve_match(field, sel, path),
            (Resolver::ResultPath, Parent::Match(m)) => serde_json::Value::String(m.path.clone()),
            (Resolver::ResultValue, Parent::Match(m)) => self.scalar(&field.ty, &m.value, path),
            (Resolver::ResultUpdatedAt, Parent::Match(m)) => {
                serde_json::Value::String(m.updated_at.to_rfc3339())
            }
            _ => serde_json::Value::Null,
        }
    }

    fn resolve_match(
        &mut self,
        field: &FieldDef,
        sel: &Selection,
        path: &mut Vec<PathSegment>,
    ) -> serde_json::Value {
        let Some(pattern) = sel.arguments.get("pattern").and_then(serde_json::Value::as_str) else {
            return self.fail("argument 'pattern' must be a string", path);
        };
        let Some(ty) = self.nested_type(&field.ty) else {
            return self.fail(format!("type of field '{}' is missing", field.name), path);
        };
        let sub = sel.selection.as_deref().unwrap_or_default();

        let matches = self.snapshot.matching(&WildcardPattern::compile(pattern));
        let mut items = Vec::with_capacity(matches.len());
        for (idx, m) in matches.iter().enumerate() {
            path.push(PathSegment::Index(idx));
            items.push(self.resolve_object(ty, sub, Parent::Match(m), path));
            path.pop();
        }
        serde_json::Value::Array(items)
    }

    fn nested_type(&self, ty: &FieldType) -> Option<&'a ObjectType> {
        ty.object_type().and_then(|name| self.schema.get_type(name))
    }

    fn scalar(&mut self, ty: &FieldType, value: &Value, path: &[PathSegment]) -> serde_json::Value {
        let FieldType::Scalar { scalar, .. } = ty else {
            return self.fail("object field resolved to a scalar value", path);
        };
        match coerce(*scalar, value) {
            Ok(json) => json,
            Err(message) => self.fail(message, path),
        }
    }

    fn fail(&mut self, message: impl Into<String>, path: &[PathSegment]) -> serde_json::Value {
        self.errors.push(FieldError::new(message, path.to_vec()));
        serde_json::Value::Null
    }
}

/// Serializes a stored value as `scalar`.
///
/// The scalar was chosen from the value seen at build time. If the value has
/// since changed kind the coercion may fail; the caller turns that into a
/// field error.
pub(crate) fn coerce(scalar: ScalarKind, value: &Value) -> Result<serde_json::Value, String> {
    if value.is_null() {
        return Ok(serde_json::Value::Null);
    }
    let mismatch = || {
        format!(
            "{} cannot represent {} value: {value}",
            scalar.name(),
            value.type_name()
        )
    };
    match (scalar, value) {
        (ScalarKind::Json, _) => Ok(value.to_json()),
        (ScalarKind::Float, Value::Int(_)) => Ok(value.to_json()),
        (ScalarKind::Float, Value::Float(f)) if f.is_finite() => Ok(value.to_json()),
        (ScalarKind::Float, Value::String(s)) => match Value::infer(s.trim()) {
            number @ (Value::Int(_) | Value::Float(_)) => Ok(number.to_json()),
            _ => Err(mismatch()),
        },
        (ScalarKind::Boolean, Value::Bool(b)) => Ok(serde_json::Value::Bool(*b)),
        (ScalarKind::String, Value::String(s)) => Ok(serde_json::Value::String(s.clone())),
        (ScalarKind::String, Value::Int(_) | Value::Float(_) | Value::Bool(_)) => {
            Ok(serde_json::Value::String(value.to_string()))
        }
        _ => Err(mismatch()),
    }
}
