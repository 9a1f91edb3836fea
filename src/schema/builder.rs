//! Recursive schema builder over the topic tree.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use crate::storage::Snapshot;
use crate::tree::{NodeKind, TopicNode, TopicTree};

use super::naming::{free_name, sanitize, EMPTY_NAME, RESERVED_TYPE_NAMES, VALUE_FIELD};
use super::types::{
    ArgumentDef, Diagnostic, FieldDef, FieldType, ObjectType, Resolver, ScalarKind,
};
use super::ProjectedSchema;

pub(crate) const QUERY_TYPE: &str = "Query";
pub(crate) const RESULT_TYPE: &str = "TopicResult";
const ROOT_PREFIX: &str = "Root";
const MATCH_FIELD: &str = "match";

#[derive(Debug, Default)]
struct Builder {
    types: BTreeMap<String, ObjectType>,
    claimed: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

/// Projects one snapshot into a schema.
pub(crate) fn project(snapshot: &Snapshot) -> ProjectedSchema {
    let started = Instant::now();
    let tree = TopicTree::from_snapshot(snapshot);

    let mut builder = Builder::default();
    builder.claimed.extend(RESERVED_TYPE_NAMES.iter().map(|s| (*s).to_string()));
    builder.diagnostics.extend(tree.skipped().iter().map(|path| Diagnostic::PathTooDeep {
        path: path.clone(),
        depth: path.split('/').count(),
    }));

    let mut query_fields = builder.child_fields(QUERY_TYPE, ROOT_PREFIX, tree.root(), &[MATCH_FIELD]);
    query_fields.insert(MATCH_FIELD.to_string(), match_field());

    builder.types.insert(
        QUERY_TYPE.to_string(),
        ObjectType {
            name: QUERY_TYPE.to_string(),
            description: None,
            fields: query_fields,
        },
    );
    builder.types.insert(RESULT_TYPE.to_string(), result_type());

    for diagnostic in &builder.diagnostics {
        tracing::warn!(%diagnostic, "schema build diagnostic");
    }

    let schema = ProjectedSchema::assemble(snapshot.generation, builder.types, builder.diagnostics);
    tracing::debug!(
        generation = schema.generation(),
        entries = snapshot.len(),
        nodes = tree.node_count(),
        types = schema.type_count(),
        elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
        "projected schema"
    );
    schema
}

impl Builder {
    /// Builds the fields for `node`'s children on the type `owner`.
    ///
    /// Children are visited sorted by sanitized name, then raw segment. When
    /// two segments sanitize to the same name the later one wins.
    fn child_fields(
        &mut self,
        owner: &str,
        type_prefix: &str,
        node: &TopicNode,
        reserved: &[&str],
    ) -> BTreeMap<String, FieldDef> {
        let mut named: Vec<(String, &TopicNode)> = node
            .children()
            .map(|child| (sanitize(child.segment()), child))
            .collect();
        named.sort_by(|(a, na), (b, nb)| a.cmp(b).then_with(|| na.segment().cmp(nb.segment())));

        let siblings: HashSet<String> = named.iter().map(|(name, _)| name.clone()).collect();
        let mut winners: BTreeMap<String, &TopicNode> = BTreeMap::new();
        for (mut name, child) in named {
            if reserved.contains(&name.as_str()) {
                let renamed = free_name(&name, |n| reserved.contains(&n) || siblings.contains(n));
                self.diagnostics.push(Diagnostic::ReservedField {
                    type_name: owner.to_string(),
                    segment: child.segment().to_string(),
                    renamed_to: renamed.clone(),
                });
                name = renamed;
            }
            if let Some(previous) = winners.insert(name.clone(), child) {
                self.diagnostics.push(Diagnostic::FieldCollision {
                    type_name: owner.to_string(),
                    field: name,
                    kept: child.segment().to_string(),
                    dropped: previous.segment().to_string(),
                });
            }
        }

        winners
            .into_iter()
            .map(|(name, child)| {
                let field = self.child_field(type_prefix, &name, child);
                (name, field)
            })
            .collect()
    }

    fn child_field(&mut self, type_prefix: &str, name: &str, child: &TopicNode) -> FieldDef {
        let path = child.path().to_string();
        if child.kind().is_branch() {
            let type_name = self.claim_type_name(format!("{type_prefix}_{name}"), child.path());
            self.object_type(&type_name, child);
            FieldDef {
                name: name.to_string(),
                ty: FieldType::Object { type_name },
                arguments: Vec::new(),
                resolver: Resolver::Node { path: path.clone() },
                description: Some(path),
            }
        } else {
            FieldDef {
                name: name.to_string(),
                ty: FieldType::scalar(ScalarKind::for_value(child.value())),
                arguments: Vec::new(),
                resolver: Resolver::StoreValue { path: path.clone() },
                description: Some(path),
            }
        }
    }

    /// Registers the object type for a branch node under `type_name`.
    fn object_type(&mut self, type_name: &str, node: &TopicNode) {
        let mut fields = self.child_fields(type_name, type_name, node, &[]);

        if node.kind() == NodeKind::BranchWithValue {
            let name = free_name(VALUE_FIELD, |n| fields.contains_key(n));
            fields.insert(
                name.clone(),
                FieldDef {
                    name,
                    ty: FieldType::scalar(ScalarKind::for_value(node.value())),
                    arguments: Vec::new(),
                    resolver: Resolver::StoreValue {
                        path: node.path().to_string(),
                    },
                    description: Some(node.path().to_string()),
                },
            );
        }

        if fields.is_empty() {
            fields.insert(
                EMPTY_NAME.to_string(),
                FieldDef {
                    name: EMPTY_NAME.to_string(),
                    ty: FieldType::scalar(ScalarKind::String),
                    arguments: Vec::new(),
                    resolver: Resolver::Placeholder,
                    description: None,
                },
            );
        }

        self.types.insert(
            type_name.to_string(),
            ObjectType {
                name: type_name.to_string(),
                description: Some(node.path().to_string()),
                fields,
            },
        );
    }

    fn claim_type_name(&mut self, requested: String, path: &str) -> String {
        if self.claimed.insert(requested.clone()) {
            return requested;
        }
        let mut n = 2usize;
        let assigned = loop {
            let candidate = format!("{requested}_{n}");
            if self.claimed.insert(candidate.clone()) {
                break candidate;
            }
            n += 1;
        };
        self.diagnostics.push(Diagnostic::TypeRenamed {
            requested,
            assigned: assigned.clone(),
            path: path.to_string(),
        });
        assigned
    }
}

fn match_field() -> FieldDef {
    FieldDef {
        name: MATCH_FIELD.to_string(),
        ty: FieldType::ObjectList {
            type_name: RESULT_TYPE.to_string(),
        },
        arguments: vec![ArgumentDef {
            name: "pattern".to_string(),
            scalar: ScalarKind::String,
            non_null: true,
        }],
        resolver: Resolver::Match,
        description: Some("Stored entries whose path matches a wildcard pattern".to_string()),
    }
}

fn result_type() -> ObjectType {
    let fields = [
        (
            "path",
            FieldType::Scalar {
                scalar: ScalarKind::String,
                non_null: true,
            },
            Resolver::ResultPath,
        ),
        ("value", FieldType::scalar(ScalarKind::Json), Resolver::ResultValue),
        ("updatedAt", FieldType::scalar(ScalarKind::String), Resolver::ResultUpdatedAt),
    ]
    .into_iter()
    .map(|(name, ty, resolver)| {
        (
            name.to_string(),
            FieldDef {
                name: name.to_string(),
                ty,
                arguments: Vec::new(),
                resolver,
                description: None,
            },
        )
    })
    .collect();

    ObjectType {
        name: RESULT_TYPE.to_string(),
        description: None,
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{PathSource, PathStore};

    fn project_of(updates: &[(&str, &str)]) -> ProjectedSchema {
        let store = PathStore::new();
        for (path, payload) in updates {
            store.update(path, payload);
        }
        project(&store.snapshot())
    }

    #[test]
    fn test_empty_store_has_only_match() {
        let schema = project_of(&[]);
        let query = schema.query_type();
        assert_eq!(query.fields.keys().collect::<Vec<_>>(), vec!["match"]);
        assert!(schema.get_type(RESULT_TYPE).is_some());
        assert!(schema.diagnostics().is_empty());
    }

    #[test]
    fn test_nested_types_and_scalars() {
        let schema = project_of(&[
            ("house/room/temp", "20"),
            ("house/room/lit", "true"),
            ("house/room/name", "den"),
            ("house/room/meta", "[1,2]"),
            ("house/room/none", "null"),
        ]);

        let house = schema.query_type().field("house").unwrap();
        assert_eq!(house.ty.object_type(), Some("Root_house"));

        let room_ty = schema.get_type("Root_house_room").unwrap();
        let scalar_of = |name: &str| match &room_ty.field(name).unwrap().ty {
            FieldType::Scalar { scalar, .. } => *scalar,
            other => panic!("expected scalar, got {other:?}"),
        };
        assert_eq!(scalar_of("temp"), ScalarKind::Float);
        assert_eq!(scalar_of("lit"), ScalarKind::Boolean);
        assert_eq!(scalar_of("name"), ScalarKind::String);
        assert_eq!(scalar_of("none"), ScalarKind::Json);
        // `[1,2]` flattens into meta/0 and meta/1, so meta is a branch.
        assert_eq!(
            room_ty.field("meta").unwrap().ty.object_type(),
            Some("Root_house_room_meta")
        );
        assert!(schema.get_type("Root_house_room_meta").unwrap().field("_0").is_some());
    }

    #[test]
    fn test_top_level_leaf_is_scalar() {
        let schema = project_of(&[("temp", "22")]);
        let field = schema.query_type().field("temp").unwrap();
        assert_eq!(field.ty, FieldType::scalar(ScalarKind::Float));
        assert_eq!(field.resolver, Resolver::StoreValue { path: "temp".into() });
    }

    #[test]
    fn test_branch_with_value_gets_sentinel() {
        let schema = project_of(&[("device/lock", r#"{"state":"locked"}"#)]);
        let lock = schema.get_type("Root_device_lock").unwrap();
        let sentinel = lock.field(VALUE_FIELD).unwrap();
        assert_eq!(sentinel.ty, FieldType::scalar(ScalarKind::Json));
        assert_eq!(
            sentinel.resolver,
            Resolver::StoreValue {
                path: "device/lock".into()
            }
        );
        assert!(lock.field("state").is_some());
    }

    #[test]
    fn test_sentinel_avoids_child_named_value() {
        let schema = project_of(&[("a", r#"{"_value": 1}"#)]);
        let a = schema.get_type("Root_a").unwrap();
        assert_eq!(
            a.field("_value").unwrap().resolver,
            Resolver::StoreValue { path: "a/_value".into() }
        );
        assert_eq!(
            a.field("__value").unwrap().resolver,
            Resolver::StoreValue { path: "a".into() }
        );
    }

    #[test]
    fn test_collision_last_write_wins_with_diagnostic() {
        let schema = project_of(&[("r/b-c", "1"), ("r/b.c", "\"x\"")]);
        let r = schema.get_type("Root_r").unwrap();
        let field = r.field("b_c").unwrap();
        // "b-c" < "b.c" in byte order, so "b.c" is visited last and wins.
        assert_eq!(field.resolver, Resolver::StoreValue { path: "r/b.c".into() });
        assert_eq!(
            schema.diagnostics(),
            &[Diagnostic::FieldCollision {
                type_name: "Root_r".into(),
                field: "b_c".into(),
                kept: "b.c".into(),
                dropped: "b-c".into(),
            }]
        );
    }

    #[test]
    fn test_type_names_are_unique() {
        // `a_b` at the top and `a/b` both ask for `Root_a_b`.
        let schema = project_of(&[("a_b/x", "1"), ("a/b/y", "2")]);
        let a = schema.get_type("Root_a").unwrap();
        let nested = a.field("b").unwrap().ty.object_type().unwrap().to_string();
        let top = schema.query_type().field("a_b").unwrap().ty.object_type().unwrap().to_string();
        assert_ne!(nested, top);
        assert!(schema.get_type(&nested).is_some());
        assert!(schema.get_type(&top).is_some());
        assert!(schema
            .diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::TypeRenamed { .. })));
    }

    #[test]
    fn test_reserved_match_segment_is_renamed() {
        let schema = project_of(&[("match", "1")]);
        let query = schema.query_type();
        assert_eq!(query.field("match").unwrap().resolver, Resolver::Match);
        assert_eq!(
            query.field("_match").unwrap().resolver,
            Resolver::StoreValue { path: "match".into() }
        );
    }

    #[test]
    fn test_reserved_rename_skips_real_siblings() {
        let schema = project_of(&[("match", "1"), ("_match", "2")]);
        let query = schema.query_type();
        assert_eq!(query.field("match").unwrap().resolver, Resolver::Match);
        assert_eq!(
            query.field("_match").unwrap().resolver,
            Resolver::StoreValue { path: "_match".into() }
        );
        assert_eq!(
            query.field("__match").unwrap().resolver,
            Resolver::StoreValue { path: "match".into() }
        );
        assert_eq!(
            schema.diagnostics(),
            &[Diagnostic::ReservedField {
                type_name: QUERY_TYPE.into(),
                segment: "match".into(),
                renamed_to: "__match".into(),
            }]
        );
    }

    #[test]
    fn test_too_deep_path_is_reported_not_projected() {
        let deep = vec!["n"; 32_000].join("/");
        assert!(deep.split('/').count() > crate::tree::MAX_TOPIC_DEPTH);
        let schema = project_of(&[(deep.as_str(), "1"), ("ok", "2")]);

        assert!(schema.query_type().field("n").is_none());
        assert!(schema.query_type().field("ok").is_some());
        assert_eq!(
            schema.diagnostics(),
            &[Diagnostic::PathTooDeep {
                path: deep,
                depth: 32_000,
            }]
        );
    }

    #[test]
    fn test_reserved_type_names_not_generated() {
        // A top-level segment `Query` would otherwise never clash, but a
        // nested name like `Root_x` must not be able to claim `JSON`.
        let schema = project_of(&[("x/y", "1")]);
        assert_eq!(schema.get_type(QUERY_TYPE).unwrap().name, QUERY_TYPE);
        assert!(schema.get_type("Root_x").is_some());
    }

    #[test]
    fn test_deterministic_across_builds() {
        let updates = [("b/x", "1"), ("a/y", "true"), ("a/z/w", "\"s\"")];
        let one = project_of(&updates);
        let two = project_of(&updates);
        assert_eq!(one.to_sdl(), two.to_sdl());
        assert_eq!(one.fingerprint(), two.fingerprint());
    }
}
