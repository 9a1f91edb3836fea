//! In-memory path store.
//!
//! A single `RwLock` guards the path map. `update` holds the write lock for
//! the whole infer/flatten/prune step, so readers always see a path and its
//! derived descendants either fully before or fully after an update.

use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::pattern::WildcardPattern;
use crate::storage::traits::{EntryOrigin, PathMatch, PathSource, Snapshot, StoreEntry};
use crate::value::Value;

/// What happens to derived entries a new value no longer produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StalePolicy {
    /// Remove derived descendants left over from the previous value.
    #[default]
    Prune,
    /// Leave them in place.
    Retain,
}

/// Store configuration.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub stale_descendants: StalePolicy,
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    origin: EntryOrigin,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    by_path: BTreeMap<String, Slot>,
    generation: u64,
}

/// Thread-safe in-memory path store.
///
/// # Examples
///
/// ```
/// use topicgraph::{PathSource, PathStore, Value};
///
/// let store = PathStore::new();
/// store.update("flatten/me", r#"{"a":1,"b":{"c":"x"}}"#);
/// assert_eq!(store.get("flatten/me/a"), Some(Value::Int(1)));
/// assert_eq!(store.get("flatten/me/b/c"), Some(Value::String("x".into())));
/// ```
#[derive(Debug, Default)]
pub struct PathStore {
    cfg: StoreConfig,
    state: RwLock<State>,
}

impl PathStore {
    /// Create a new empty store with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store.
    #[must_use]
    pub fn with_config(cfg: StoreConfig) -> Self {
        Self {
            cfg,
            state: RwLock::default(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.cfg
    }

    // A panic while holding the lock cannot leave the map half-written in a
    // way readers could misinterpret, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ingests a raw payload at `path`.
    ///
    /// The payload is decoded as UTF-8 (lossily), classified with
    /// [`Value::infer`], stored at `path` and flattened into sub-paths.
    /// This never fails.
    pub fn update(&self, path: &str, raw: impl AsRef<[u8]>) {
        let text = String::from_utf8_lossy(raw.as_ref());
        let value = Value::infer(&text);
        self.put(path, value);
    }

    /// Stores an already-classified value at `path`, flattening it.
    pub fn put(&self, path: &str, value: Value) {
        let mut produced = Vec::new();
        if let Value::Structured(json) = &value {
            flatten_into(path, json, &mut produced);
        }

        let now = Utc::now();
        let kind = value.type_name();
        let derived = produced.len();

        let mut state = self.write();
        let pruned = if self.cfg.stale_descendants == StalePolicy::Prune {
            prune_stale(&mut state, path, &produced)
        } else {
            0
        };

        state.by_path.insert(
            path.to_string(),
            Slot {
                value,
                origin: EntryOrigin::Published,
                updated_at: now,
            },
        );
        for (sub_path, sub_value) in produced {
            state.by_path.insert(
                sub_path,
                Slot {
                    value: sub_value,
                    origin: EntryOrigin::Derived {
                        root: path.to_string(),
                    },
                    updated_at: now,
                },
            );
        }
        state.generation += 1;
        let generation = state.generation;
        drop(state);

        tracing::debug!(path, kind, derived, pruned, generation, "stored update");
    }

    /// Number of entries, including derived ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().by_path.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().by_path.is_empty()
    }

    /// Every `(path, value)` pair, ordered by path.
    #[must_use]
    pub fn get_all(&self) -> Vec<(String, Value)> {
        self.read()
            .by_path
            .iter()
            .map(|(path, slot)| (path.clone(), slot.value.clone()))
            .collect()
    }
}

impl PathSource for PathStore {
    fn get(&self, path: &str) -> Option<Value> {
        self.read().by_path.get(path).map(|slot| slot.value.clone())
    }

    fn entry(&self, path: &str) -> Option<StoreEntry> {
        self.read()
            .by_path
            .get(path)
            .map(|slot| to_entry(path, slot))
    }

    fn snapshot(&self) -> Snapshot {
        let state = self.read();
        Snapshot {
            generation: state.generation,
            entries: state
                .by_path
                .iter()
                .map(|(path, slot)| to_entry(path, slot))
                .collect(),
        }
    }

    fn match_pattern(&self, pattern: &str) -> Vec<PathMatch> {
        let matcher = WildcardPattern::compile(pattern);
        let to_match = |(path, slot): (&String, &Slot)| PathMatch {
            path: path.clone(),
            value: slot.value.clone(),
            updated_at: slot.updated_at,
        };
        let state = self.read();
        if !matcher.has_wildcards() {
            return state
                .by_path
                .get_key_value(pattern)
                .map(to_match)
                .into_iter()
                .collect();
        }
        state
            .by_path
            .iter()
            .filter(|(path, _)| matcher.is_match(path))
            .map(to_match)
            .collect()
    }

    fn generation(&self) -> u64 {
        self.read().generation
    }
}

fn to_entry(path: &str, slot: &Slot) -> StoreEntry {
    StoreEntry {
        path: path.to_string(),
        value: slot.value.clone(),
        origin: slot.origin.clone(),
        updated_at: slot.updated_at,
    }
}

/// Appends `(sub_path, value)` for every field (objects) or element (arrays)
/// below `path`, depth first. Empty object keys are skipped so flattening
/// never introduces an empty segment.
fn flatten_into(path: &str, json: &serde_json::Value, out: &mut Vec<(String, Value)>) {
    match json {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                if key.is_empty() {
                    tracing::trace!(path, "skipping empty object key");
                    continue;
                }
                push_child(format!("{path}/{key}"), child, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                push_child(format!("{path}/{idx}"), child, out);
            }
        }
        _ => {}
    }
}

fn push_child(sub_path: String, child: &serde_json::Value, out: &mut Vec<(String, Value)>) {
    out.push((sub_path.clone(), Value::from(child.clone())));
    flatten_into(&sub_path, child, out);
}

/// Removes entries previously derived from `root` that `produced` does not
/// rewrite. Entries published on their own are kept.
fn prune_stale(state: &mut State, root: &str, produced: &[(String, Value)]) -> usize {
    // Anything below `root` that was flattened from `root` or an ancestor is
    // replaced by the new value.
    let prefix = format!("{root}/");
    let keep: HashSet<&str> = produced.iter().map(|(p, _)| p.as_str()).collect();

    let stale: Vec<String> = state
        .by_path
        .range(prefix.clone()..)
        .take_while(|(path, _)| path.starts_with(&prefix))
        .filter(|(path, slot)| {
            slot.origin.is_derived_at_or_above(root) && !keep.contains(path.as_str())
        })
        .map(|(path, _)| path.clone())
        .collect();

    for path in &stale {
        tracing::trace!(root, path = %path, "pruning stale derived entry");
        state.by_path.remove(path);
    }
    stale.len()
}
