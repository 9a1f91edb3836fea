//! Applying inbound messages.
//!
//! An [`Ingestor`] writes each message to the store and tells the schema
//! cache, if one is attached, that the shape may have changed. Capture files
//! hold one message per line: the topic, whitespace, then the raw payload.

use std::io::BufRead;
use std::sync::Arc;

use crate::cache::SchemaCache;
use crate::storage::{PathSource, PathStore};

/// Counters from one [`Ingestor::replay`] run.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: usize,
    pub skipped: usize,
}

/// Store writer that keeps an attached schema cache informed.
#[derive(Debug, Clone)]
pub struct Ingestor {
    store: Arc<PathStore>,
    cache: Option<Arc<SchemaCache>>,
}

impl Ingestor {
    #[must_use]
    pub fn new(store: Arc<PathStore>) -> Self {
        Self { store, cache: None }
    }

    /// Invalidates `cache` after every applied message.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<PathStore> {
        &self.store
    }

    /// Stores `raw` at `path` and marks the schema stale.
    pub fn ingest(&self, path: &str, raw: impl AsRef<[u8]>) {
        self.store.update(path, raw);
        if let Some(cache) = &self.cache {
            cache.invalidate();
        }
    }

    /// Applies one capture line. Returns false for blank and `#` comment lines.
    pub fn ingest_line(&self, line: &str) -> bool {
        let Some((topic, payload)) = parse_line(line) else {
            return false;
        };
        self.ingest(topic, payload);
        true
    }

    /// Applies every line of a capture.
    pub fn replay(&self, reader: impl BufRead) -> std::io::Result<ReplayStats> {
        let mut stats = ReplayStats::default();
        for line in reader.lines() {
            if self.ingest_line(&line?) {
                stats.applied += 1;
            } else {
                stats.skipped += 1;
            }
        }
        tracing::info!(
            applied = stats.applied,
            skipped = stats.skipped,
            generation = self.store.generation(),
            "replay finished"
        );
        Ok(stats)
    }
}

/// Splits a capture line into topic and payload.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\r', '\n']).trim_start();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    match line.split_once(char::is_whitespace) {
        Some((topic, payload)) => Some((topic, payload.trim_start())),
        None => Some((line, "")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SchemaCacheConfig;
    use crate::value::Value;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("a/b 1"), Some(("a/b", "1")));
        assert_eq!(parse_line("a/b\t{\"x\": 1}\r"), Some(("a/b", "{\"x\": 1}")));
        assert_eq!(parse_line("a/b   hello world"), Some(("a/b", "hello world")));
        assert_eq!(parse_line("a/b"), Some(("a/b", "")));
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("# comment"), None);
    }

    #[test]
    fn test_ingest_writes_store() {
        let ingestor = Ingestor::new(Arc::new(PathStore::new()));
        ingestor.ingest("home/lamp", "on");
        assert_eq!(ingestor.store().get("home/lamp"), Some(Value::String("on".into())));
    }

    #[test]
    fn test_replay_counts() {
        let ingestor = Ingestor::new(Arc::new(PathStore::new()));
        let capture = "# header\n\nsensor/1 20\nsensor/2 {\"t\":1}\n";
        let stats = ingestor.replay(capture.as_bytes()).unwrap();
        assert_eq!(stats, ReplayStats { applied: 2, skipped: 2 });
        assert_eq!(ingestor.store().get("sensor/2/t"), Some(Value::Int(1)));
    }

    #[test]
    fn test_ingest_invalidates_cache() {
        let store = Arc::new(PathStore::new());
        let cache = Arc::new(
            SchemaCache::new(Arc::clone(&store) as Arc<dyn PathSource>, SchemaCacheConfig::default())
                .unwrap(),
        );
        let ingestor = Ingestor::new(Arc::clone(&store)).with_cache(Arc::clone(&cache));

        assert!(ingestor.ingest_line("room/temp 21"));
        let schema = cache.fresh().unwrap();
        assert!(schema.get_type("Root_room").is_some());
    }
}
