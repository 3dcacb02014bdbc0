//! Background-refreshed index over the active-target inventory.
//!
//! [`IndexedTargetCache`] snapshots `/api/v1/targets` on a fixed interval
//! and keeps the snapshot indexed by job, instance, health, scrape pool and
//! every label name/value pair. Lookups clone the matching targets out of
//! the snapshot, so callers never observe a refresh mid-read and cannot
//! mutate the shared state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use patrol_core::backend::{ActiveTarget, BackendError, MetricsBackend};

/// Refresh interval applied when the caller passes a zero or negative TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Well-known label keys the index is always built on.
const LABEL_JOB: &str = "job";
const LABEL_INSTANCE: &str = "instance";

/// One fully built index over a single inventory snapshot.
///
/// Rebuilt wholesale on every refresh and swapped in under the write lock,
/// so readers always see a consistent snapshot.
#[derive(Debug, Default)]
struct Index {
    by_job: HashMap<String, Vec<ActiveTarget>>,
    by_instance: HashMap<String, Vec<ActiveTarget>>,
    by_health: HashMap<String, Vec<ActiveTarget>>,
    by_pool: HashMap<String, Vec<ActiveTarget>>,
    /// label name -> label value -> targets, over every label pair.
    by_label: HashMap<String, HashMap<String, Vec<ActiveTarget>>>,
    all: Vec<ActiveTarget>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl Index {
    fn build(targets: Vec<ActiveTarget>) -> Self {
        let mut index = Index {
            refreshed_at: Some(Utc::now()),
            ..Default::default()
        };
        for target in &targets {
            if let Some(job) = target.labels.get(LABEL_JOB) {
                index.by_job.entry(job.clone()).or_default().push(target.clone());
            }
            if let Some(instance) = target.labels.get(LABEL_INSTANCE) {
                index
                    .by_instance
                    .entry(instance.clone())
                    .or_default()
                    .push(target.clone());
            }
            index
                .by_health
                .entry(target.health.clone())
                .or_default()
                .push(target.clone());
            index
                .by_pool
                .entry(target.scrape_pool.clone())
                .or_default()
                .push(target.clone());
            for (name, value) in &target.labels {
                index
                    .by_label
                    .entry(name.clone())
                    .or_default()
                    .entry(value.clone())
                    .or_default()
                    .push(target.clone());
            }
        }
        index.all = targets;
        index
    }
}

/// A concurrently readable, periodically refreshed target index.
///
/// Created once via [`IndexedTargetCache::start`]; the returned `Arc` can be
/// cheaply cloned wherever target lookups are needed. Call
/// [`IndexedTargetCache::close`] during shutdown to stop the refresh task.
pub struct IndexedTargetCache {
    backend: Arc<dyn MetricsBackend>,
    index: RwLock<Index>,
    ttl: Duration,
    /// Cancelled by `close`; cancelling twice is harmless.
    cancel: CancellationToken,
}

impl IndexedTargetCache {
    /// Build the cache, perform the first refresh inline, and spawn the
    /// background refresh task.
    ///
    /// The inline refresh means a successfully constructed cache is never
    /// empty for reasons other than an empty inventory. A zero TTL falls
    /// back to [`DEFAULT_TTL`].
    pub async fn start(
        backend: Arc<dyn MetricsBackend>,
        ttl: Duration,
    ) -> Result<Arc<Self>, BackendError> {
        let ttl = if ttl.is_zero() { DEFAULT_TTL } else { ttl };
        let cache = Arc::new(Self {
            backend,
            index: RwLock::new(Index::default()),
            ttl,
            cancel: CancellationToken::new(),
        });

        cache.refresh().await?;

        let task_cache = Arc::clone(&cache);
        tokio::spawn(async move { task_cache.refresh_loop().await });

        Ok(cache)
    }

    /// Fetch the inventory and swap in a freshly built index.
    ///
    /// On failure the previous snapshot is kept; callers keep reading
    /// slightly stale data instead of an empty cache.
    pub async fn refresh(&self) -> Result<(), BackendError> {
        let targets = self.backend.active_targets().await?;
        let fresh = Index::build(targets);
        let total = fresh.all.len();
        *self.index.write().await = fresh;
        tracing::debug!(total, "Target cache refreshed");
        Ok(())
    }

    /// Stop the background refresh task. Safe to call more than once.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    async fn refresh_loop(&self) {
        let mut interval = tokio::time::interval(self.ttl);
        // The first tick fires immediately; the inline refresh in `start`
        // already covered it.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Target cache refresh task stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.refresh().await {
                        tracing::warn!(error = %e, "Target cache refresh failed; keeping previous snapshot");
                    }
                }
            }
        }
    }

    /* ----------------------------------------------------------------------
       Lookups
       ---------------------------------------------------------------------- */

    /// Targets carrying `job=<job>`. Unknown jobs yield an empty vec.
    pub async fn targets_by_job(&self, job: &str) -> Vec<ActiveTarget> {
        self.index.read().await.by_job.get(job).cloned().unwrap_or_default()
    }

    /// Targets carrying `instance=<instance>`.
    pub async fn targets_by_instance(&self, instance: &str) -> Vec<ActiveTarget> {
        self.index
            .read()
            .await
            .by_instance
            .get(instance)
            .cloned()
            .unwrap_or_default()
    }

    /// Targets in the given health state (`up`, `down`, `unknown`).
    pub async fn targets_by_health(&self, health: &str) -> Vec<ActiveTarget> {
        self.index
            .read()
            .await
            .by_health
            .get(health)
            .cloned()
            .unwrap_or_default()
    }

    /// Targets belonging to one scrape pool.
    pub async fn targets_by_pool(&self, pool: &str) -> Vec<ActiveTarget> {
        self.index.read().await.by_pool.get(pool).cloned().unwrap_or_default()
    }

    /// Targets carrying `<name>=<value>` for any label pair in the
    /// snapshot. Unknown names or values yield an empty vec.
    pub async fn targets_by_label(&self, name: &str, value: &str) -> Vec<ActiveTarget> {
        self.index
            .read()
            .await
            .by_label
            .get(name)
            .and_then(|values| values.get(value))
            .cloned()
            .unwrap_or_default()
    }

    /// Targets matching both a job and a health state.
    ///
    /// Narrows the (usually small) job bucket by health rather than
    /// maintaining a composite index.
    pub async fn targets_by_job_and_health(&self, job: &str, health: &str) -> Vec<ActiveTarget> {
        let index = self.index.read().await;
        index
            .by_job
            .get(job)
            .map(|targets| {
                targets
                    .iter()
                    .filter(|t| t.health == health)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The whole current snapshot.
    pub async fn all_targets(&self) -> Vec<ActiveTarget> {
        self.index.read().await.all.clone()
    }

    /// When the current snapshot was taken, if a refresh has succeeded.
    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.index.read().await.refreshed_at
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use patrol_core::backend::{Sample, Series};

    use super::*;
    use crate::targets::tests::target;
    use crate::targets::{HEALTH_DOWN, HEALTH_UP};

    struct FakeBackend {
        targets: std::sync::Mutex<Vec<ActiveTarget>>,
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn with_targets(targets: Vec<ActiveTarget>) -> Arc<Self> {
            Arc::new(Self {
                targets: std::sync::Mutex::new(targets),
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            })
        }

        fn set_targets(&self, targets: Vec<ActiveTarget>) {
            *self.targets.lock().unwrap() = targets;
        }
    }

    #[async_trait]
    impl MetricsBackend for FakeBackend {
        async fn instant_query(
            &self,
            _query: &str,
            _ts: DateTime<Utc>,
        ) -> Result<Vec<Sample>, BackendError> {
            Ok(Vec::new())
        }

        async fn range_query(
            &self,
            _query: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            _step: Duration,
        ) -> Result<Vec<Series>, BackendError> {
            Ok(Vec::new())
        }

        async fn active_targets(&self) -> Result<Vec<ActiveTarget>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err("inventory endpoint unavailable".into());
            }
            Ok(self.targets.lock().unwrap().clone())
        }
    }

    fn inventory() -> Vec<ActiveTarget> {
        vec![
            target("node", "node-1:9100", HEALTH_UP),
            target("node", "node-2:9100", HEALTH_DOWN),
            target("api", "api-1:8080", HEALTH_UP),
        ]
    }

    async fn started(backend: Arc<FakeBackend>) -> Arc<IndexedTargetCache> {
        IndexedTargetCache::start(backend, Duration::from_secs(3600))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn initial_refresh_populates_every_index() {
        let backend = FakeBackend::with_targets(inventory());
        let cache = started(backend).await;

        assert_eq!(cache.all_targets().await.len(), 3);
        assert_eq!(cache.targets_by_job("node").await.len(), 2);
        assert_eq!(cache.targets_by_instance("api-1:8080").await.len(), 1);
        assert_eq!(cache.targets_by_health(HEALTH_UP).await.len(), 2);
        assert_eq!(cache.targets_by_pool("api").await.len(), 1);
        assert!(cache.refreshed_at().await.is_some());
        cache.close();
    }

    #[tokio::test]
    async fn failed_initial_refresh_surfaces_the_error() {
        let backend = FakeBackend::with_targets(inventory());
        backend.fail.store(true, Ordering::SeqCst);
        let result = IndexedTargetCache::start(backend, Duration::from_secs(3600)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn any_label_pair_is_queryable() {
        let mut extra = target("node", "node-3:9100", HEALTH_UP);
        extra
            .labels
            .insert("team".to_string(), "infra".to_string());
        let mut targets = inventory();
        targets.push(extra);
        let backend = FakeBackend::with_targets(targets);
        let cache = started(backend).await;

        // No label is privileged: job, instance and ad-hoc labels all
        // resolve through the same index.
        assert_eq!(cache.targets_by_label("job", "node").await.len(), 3);
        let infra = cache.targets_by_label("team", "infra").await;
        assert_eq!(infra.len(), 1);
        assert_eq!(infra[0].labels["instance"], "node-3:9100");

        assert!(cache.targets_by_label("team", "web").await.is_empty());
        assert!(cache.targets_by_label("rack", "r1").await.is_empty());
        cache.close();
    }

    #[tokio::test]
    async fn lookups_return_copies() {
        let backend = FakeBackend::with_targets(inventory());
        let cache = started(backend).await;

        let mut mine = cache.targets_by_job("node").await;
        mine[0].health = "mangled".to_string();
        mine.clear();

        assert_eq!(cache.targets_by_job("node").await.len(), 2);
        assert_eq!(cache.targets_by_health(HEALTH_UP).await.len(), 2);
        cache.close();
    }

    #[tokio::test]
    async fn job_and_health_combine() {
        let backend = FakeBackend::with_targets(inventory());
        let cache = started(backend).await;

        let up_nodes = cache.targets_by_job_and_health("node", HEALTH_UP).await;
        assert_eq!(up_nodes.len(), 1);
        assert_eq!(up_nodes[0].labels["instance"], "node-1:9100");
        assert!(cache
            .targets_by_job_and_health("absent", HEALTH_UP)
            .await
            .is_empty());
        cache.close();
    }

    #[tokio::test]
    async fn refresh_swaps_the_whole_snapshot() {
        let backend = FakeBackend::with_targets(inventory());
        let cache = started(backend.clone()).await;

        backend.set_targets(vec![target("batch", "batch-1:9090", HEALTH_UP)]);
        cache.refresh().await.unwrap();

        assert!(cache.targets_by_job("node").await.is_empty());
        assert_eq!(cache.targets_by_job("batch").await.len(), 1);
        assert_eq!(cache.all_targets().await.len(), 1);
        cache.close();
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let backend = FakeBackend::with_targets(inventory());
        let cache = started(backend.clone()).await;
        let before = cache.refreshed_at().await;

        backend.fail.store(true, Ordering::SeqCst);
        assert!(cache.refresh().await.is_err());

        assert_eq!(cache.all_targets().await.len(), 3);
        assert_eq!(cache.refreshed_at().await, before);
        cache.close();
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let backend = FakeBackend::with_targets(inventory());
        let cache = started(backend).await;
        cache.close();
        cache.close();

        let a = Arc::clone(&cache);
        let b = Arc::clone(&cache);
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.close() }),
            tokio::spawn(async move { b.close() })
        );
        ra.unwrap();
        rb.unwrap();
    }
}
