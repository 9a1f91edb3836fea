//! Background schema rebuilds.
//!
//! Updates mark the cache dirty through a bounded channel that never blocks the
//! writer. A dedicated worker thread coalesces queued signals, rebuilds from a
//! single store snapshot and publishes the result as an `Arc<ProjectedSchema>`.
//! Readers that need a schema reflecting their own writes wait on a reply
//! channel with a timeout.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};

use crate::error::{ExecutionError, GraphError, GraphResult};
use crate::schema::ProjectedSchema;
use crate::storage::PathSource;

const COMPONENT: &str = "schema-cache";

/// Tuning for [`SchemaCache`].
#[derive(Debug, Clone)]
pub struct SchemaCacheConfig {
    /// Max queued rebuild and wait requests.
    pub queue_capacity: usize,
    /// Upper bound on how long `fresh` waits for the worker.
    pub fresh_timeout: Duration,
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            fresh_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
enum CacheMsg {
    Rebuild,
    Await {
        min_generation: u64,
        reply: Sender<Arc<ProjectedSchema>>,
    },
    Shutdown,
}

#[derive(Debug, Default)]
struct Shared {
    current: RwLock<Option<Arc<ProjectedSchema>>>,
    dirty: AtomicBool,
    rebuilds: AtomicU64,
}

impl Shared {
    fn current(&self) -> Option<Arc<ProjectedSchema>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Installs `schema` unless a newer one is already published.
    fn publish(&self, schema: ProjectedSchema) -> Arc<ProjectedSchema> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_ref() {
            Some(existing) if existing.generation() > schema.generation() => Arc::clone(existing),
            _ => {
                let schema = Arc::new(schema);
                *guard = Some(Arc::clone(&schema));
                schema
            }
        }
    }

    fn rebuild(&self, source: &dyn PathSource) -> Arc<ProjectedSchema> {
        let started = Instant::now();
        let schema = ProjectedSchema::build(source);
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            generation = schema.generation(),
            types = schema.type_count(),
            elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
            "schema rebuilt"
        );
        self.publish(schema)
    }
}

/// Keeps the most recent projected schema for one store.
pub struct SchemaCache {
    cfg: SchemaCacheConfig,
    source: Arc<dyn PathSource>,
    shared: Arc<Shared>,
    tx: Sender<CacheMsg>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("cfg", &self.cfg)
            .field("store_generation", &self.source.generation())
            .field("published_generation", &self.current().map(|s| s.generation()))
            .finish_non_exhaustive()
    }
}

impl SchemaCache {
    /// Spawns the rebuild worker for `source`.
    ///
    /// No schema exists until the first `invalidate`, `schema` or `fresh`.
    pub fn new(source: Arc<dyn PathSource>, cfg: SchemaCacheConfig) -> GraphResult<Self> {
        let (tx, rx) = bounded::<CacheMsg>(cfg.queue_capacity.max(1));
        let shared = Arc::new(Shared::default());

        let thread_source = Arc::clone(&source);
        let thread_shared = Arc::clone(&shared);
        let join = thread::Builder::new()
            .name("topicgraph-schema-cache".to_string())
            .spawn(move || worker_loop(thread_source.as_ref(), &thread_shared, &rx))
            .map_err(|e| GraphError::internal(format!("failed to spawn schema cache worker: {e}")))?;

        Ok(Self {
            cfg,
            source,
            shared,
            tx,
            join: Mutex::new(Some(join)),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SchemaCacheConfig {
        &self.cfg
    }

    /// Marks the schema stale and schedules a rebuild. Never blocks.
    pub fn invalidate(&self) {
        if self.shared.dirty.swap(true, Ordering::AcqRel) {
            // A rebuild is already pending and will observe this change.
            return;
        }
        match self.tx.try_send(CacheMsg::Rebuild) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("schema cache worker is gone; invalidation dropped");
            }
        }
    }

    /// The last completed schema, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<ProjectedSchema>> {
        self.shared.current()
    }

    /// The last completed schema, built inline when none exists yet.
    ///
    /// May lag the store by the updates the worker has not processed.
    #[must_use]
    pub fn schema(&self) -> Arc<ProjectedSchema> {
        match self.shared.current() {
            Some(schema) => schema,
            None => self.shared.rebuild(self.source.as_ref()),
        }
    }

    /// Waits for a schema that reflects every update made before this call.
    pub fn fresh(&self) -> GraphResult<Arc<ProjectedSchema>> {
        let min_generation = self.source.generation();
        if let Some(schema) = self.shared.current() {
            if schema.generation() >= min_generation {
                return Ok(schema);
            }
        }

        let timeout = self.cfg.fresh_timeout;
        let (reply_tx, reply_rx) = bounded::<Arc<ProjectedSchema>>(1);
        self.tx
            .send_timeout(
                CacheMsg::Await {
                    min_generation,
                    reply: reply_tx,
                },
                timeout,
            )
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => timeout_error(timeout),
                SendTimeoutError::Disconnected(_) => disconnected(),
            })?;

        reply_rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => timeout_error(timeout),
            RecvTimeoutError::Disconnected => disconnected(),
        })
    }

    /// Number of schemas built so far, inline builds included.
    #[must_use]
    pub fn rebuild_count(&self) -> u64 {
        self.shared.rebuilds.load(Ordering::Relaxed)
    }
}

impl Drop for SchemaCache {
    fn drop(&mut self) {
        // The worker drains the queue, so a blocking send only waits briefly.
        let _ = self.tx.send(CacheMsg::Shutdown);
        if let Ok(mut guard) = self.join.lock() {
            if let Some(handle) = guard.take() {
                if handle.join().is_err() {
                    tracing::warn!("schema cache worker panicked");
                }
            }
        }
    }
}

fn timeout_error(timeout: Duration) -> GraphError {
    ExecutionError::Timeout {
        duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
    .into()
}

fn disconnected() -> GraphError {
    ExecutionError::Disconnected {
        component: COMPONENT.to_string(),
    }
    .into()
}

fn worker_loop(source: &dyn PathSource, shared: &Shared, rx: &Receiver<CacheMsg>) {
    let mut waiters: Vec<(u64, Sender<Arc<ProjectedSchema>>)> = Vec::new();

    while let Ok(first) = rx.recv() {
        let mut shutdown = false;
        for msg in std::iter::once(first).chain(rx.try_iter()) {
            match msg {
                CacheMsg::Rebuild => {}
                CacheMsg::Await {
                    min_generation,
                    reply,
                } => waiters.push((min_generation, reply)),
                CacheMsg::Shutdown => shutdown = true,
            }
        }
        if shutdown {
            break;
        }

        let published = shared.current().map(|s| s.generation());
        let behind = waiters
            .iter()
            .any(|(min, _)| published.map_or(true, |g| g < *min));
        // Clear before snapshotting so writes during the build schedule another pass.
        let dirty = shared.dirty.swap(false, Ordering::AcqRel);

        let schema = if dirty || behind {
            shared.rebuild(source)
        } else {
            match shared.current() {
                Some(schema) => schema,
                None => shared.rebuild(source),
            }
        };

        for (_, reply) in waiters.drain(..) {
            let _ = reply.send(Arc::clone(&schema));
        }
    }

    tracing::debug!("schema cache worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PathStore;

    fn cache_for(store: &Arc<PathStore>) -> SchemaCache {
        SchemaCache::new(Arc::clone(store) as Arc<dyn PathSource>, SchemaCacheConfig::default())
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let cfg = SchemaCacheConfig::default();
        assert_eq!(cfg.queue_capacity, 64);
        assert_eq!(cfg.fresh_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_current_is_empty_until_built() {
        let store = Arc::new(PathStore::new());
        let cache = cache_for(&store);
        assert!(cache.current().is_none());

        let schema = cache.schema();
        assert_eq!(schema.generation(), 0);
        assert!(cache.current().is_some());
        assert_eq!(cache.rebuild_count(), 1);
    }

    #[test]
    fn test_fresh_sees_prior_update() {
        let store = Arc::new(PathStore::new());
        let cache = cache_for(&store);

        store.update("a/b", "1");
        cache.invalidate();
        let schema = cache.fresh().unwrap();
        assert!(schema.generation() >= 1);
        assert!(schema.get_type("Root_a").is_some());
    }

    #[test]
    fn test_fresh_without_invalidate_still_catches_up() {
        let store = Arc::new(PathStore::new());
        let cache = cache_for(&store);
        let _ = cache.schema();

        store.update("x", "true");
        let schema = cache.fresh().unwrap();
        assert_eq!(schema.generation(), 1);
        assert!(schema.query_type().field("x").is_some());
    }

    #[test]
    fn test_fresh_returns_current_when_up_to_date() {
        let store = Arc::new(PathStore::new());
        store.update("a", "1");
        let cache = cache_for(&store);
        let first = cache.fresh().unwrap();
        let second = cache.fresh().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_invalidate_never_blocks() {
        let store = Arc::new(PathStore::new());
        let cache = SchemaCache::new(
            Arc::clone(&store) as Arc<dyn PathSource>,
            SchemaCacheConfig {
                queue_capacity: 1,
                ..SchemaCacheConfig::default()
            },
        )
        .unwrap();

        for i in 0..500 {
            store.update(&format!("t/{i}"), "1");
            cache.invalidate();
        }
        let schema = cache.fresh().unwrap();
        assert_eq!(schema.generation(), 500);
        assert!(cache.rebuild_count() >= 1);
    }

    #[test]
    fn test_publish_keeps_newer_schema() {
        let shared = Shared::default();
        let store = PathStore::new();
        store.update("a", "1");
        let old = ProjectedSchema::build(&store);
        store.update("b", "2");
        let new = ProjectedSchema::build(&store);

        shared.publish(new);
        let kept = shared.publish(old);
        assert_eq!(kept.generation(), 2);
        assert_eq!(shared.current().map(|s| s.generation()), Some(2));
    }

    #[test]
    fn test_drop_joins_worker() {
        let store = Arc::new(PathStore::new());
        let cache = cache_for(&store);
        cache.invalidate();
        drop(cache);
        // The worker held the only other reference to the store.
        assert_eq!(Arc::strong_count(&store), 1);
    }
}
