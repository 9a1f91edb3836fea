//! Read contract over a path store.
//!
//! The schema projector and the query executor only read. They depend on
//! this trait so they can run against any backend that hands out consistent
//! snapshots and live lookups.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pattern::WildcardPattern;
use crate::value::Value;

/// How an entry came to exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryOrigin {
    /// Written directly by an update.
    Published,
    /// Synthesized by flattening the structured value published at `root`.
    Derived {
        /// Path whose publish produced this entry.
        root: String,
    },
}

impl EntryOrigin {
    /// True if the entry was produced by flattening `path` or one of its
    /// ancestors.
    #[must_use]
    pub fn is_derived_at_or_above(&self, path: &str) -> bool {
        match self {
            Self::Derived { root } => path
                .strip_prefix(root.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
            Self::Published => false,
        }
    }
}

/// One stored entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreEntry {
    pub path: String,
    pub value: Value,
    pub origin: EntryOrigin,
    pub updated_at: DateTime<Utc>,
}

/// All entries of a store, copied under one lock.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Store generation the snapshot reflects.
    pub generation: u64,
    /// Entries ordered by path.
    pub entries: Vec<StoreEntry>,
}

impl Snapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a path inside the snapshot.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries
            .binary_search_by(|e| e.path.as_str().cmp(path))
            .ok()
            .map(|idx| &self.entries[idx].value)
    }

    /// Entries whose path matches `matcher`, in path order.
    #[must_use]
    pub fn matching(&self, matcher: &WildcardPattern) -> Vec<PathMatch> {
        if !matcher.has_wildcards() {
            return self
                .entries
                .binary_search_by(|e| e.path.as_str().cmp(matcher.as_str()))
                .map(|idx| vec![PathMatch::from(&self.entries[idx])])
                .unwrap_or_default();
        }
        self.entries
            .iter()
            .filter(|e| matcher.is_match(&e.path))
            .map(PathMatch::from)
            .collect()
    }
}

/// One result of a wildcard match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathMatch {
    pub path: String,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

impl From<&StoreEntry> for PathMatch {
    fn from(entry: &StoreEntry) -> Self {
        Self {
            path: entry.path.clone(),
            value: entry.value.clone(),
            updated_at: entry.updated_at,
        }
    }
}

/// Read access to a path store.
///
/// All methods are synchronous, side-effect free and infallible.
pub trait PathSource: Send + Sync {
    /// Current value at `path`; `None` if never written.
    fn get(&self, path: &str) -> Option<Value>;

    /// Current entry at `path`, with origin and timestamp.
    fn entry(&self, path: &str) -> Option<StoreEntry>;

    /// Every entry, taken as one consistent copy.
    fn snapshot(&self) -> Snapshot;

    /// Entries whose path matches a wildcard pattern.
    fn match_pattern(&self, pattern: &str) -> Vec<PathMatch>;

    /// Number of updates applied so far.
    fn generation(&self) -> u64;
}
