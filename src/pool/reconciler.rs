//! Pool reconciler.
//!
//! The pool tracks every load balancer it has been asked to sync, keyed by
//! canonical name. A load balancer is registered in the store before it is
//! converged, so resources created by a failed convergence stay reachable
//! through [`LoadBalancerPool::delete`] and [`LoadBalancerPool::gc`].
//!
//! The store lives in memory. [`LoadBalancerPool::adopt_existing`] rebuilds
//! it from the URL maps found in the cloud, so a new process can still
//! collect load balancers an earlier one left behind.
//!
//! The pool does not serialize operations per name. Callers that sync and
//! collect the same name from several tasks must serialize those calls
//! themselves.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cloud::{ApiVersion, ResourceKind};
use crate::error::{PoolError, Result};
use crate::events::EventKind;
use crate::loadbalancer::{Collaborators, LoadBalancer, RuntimeInfo, UrlMap};

use super::snapshot::SnapshotStore;

/// What a garbage collection pass does after a failed delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GcStrategy {
    /// Stop at the first failure, leaving the remaining orphans for the next pass.
    #[default]
    FailFast,
    /// Attempt every orphan and report all failures together.
    Continue,
}

/// Tracks load balancers and drives them towards their desired state.
pub struct LoadBalancerPool {
    store: SnapshotStore<Arc<LoadBalancer>>,
    collaborators: Collaborators,
    gc_strategy: GcStrategy,
}

impl LoadBalancerPool {
    /// Creates an empty pool. Every load balancer it creates shares
    /// `collaborators`.
    #[must_use]
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            store: SnapshotStore::new(),
            collaborators,
            gc_strategy: GcStrategy::default(),
        }
    }

    /// Sets the garbage collection strategy.
    #[must_use]
    pub const fn with_gc_strategy(mut self, strategy: GcStrategy) -> Self {
        self.gc_strategy = strategy;
        self
    }

    /// The garbage collection strategy in use.
    #[must_use]
    pub const fn gc_strategy(&self) -> GcStrategy {
        self.gc_strategy
    }

    /// Returns the canonical store key for `name`.
    #[must_use]
    pub fn canonical_name(&self, name: &str) -> String {
        self.collaborators.namer.load_balancer(name)
    }

    /// Returns the tracked load balancer for `name`.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::NotFound` if the name is not tracked.
    pub async fn get(&self, name: &str) -> Result<Arc<LoadBalancer>> {
        let name = self.canonical_name(name);
        self.store
            .get(&name)
            .await
            .ok_or_else(|| PoolError::not_found(name).into())
    }

    /// Registers `desired` and converges it.
    ///
    /// An unchanged descriptor is converged again, which repairs drift in the
    /// cloud. The load balancer stays tracked when convergence fails.
    ///
    /// # Errors
    ///
    /// Returns the convergence error unchanged.
    pub async fn sync(&self, desired: RuntimeInfo) -> Result<()> {
        let name = self.canonical_name(&desired.name);
        let namespace = desired.namespace().to_string();

        let lb = match self.store.get(&name).await {
            Some(lb) => {
                let replacement = desired.clone();
                if let Some(previous) = lb.replace_runtime_info(replacement).await {
                    debug!(
                        load_balancer = %name,
                        old = ?previous,
                        new = ?desired,
                        "Desired state changed"
                    );
                    lb.record(&namespace, EventKind::Changed, "Desired state changed");
                }
                lb
            }
            None => {
                info!("Tracking new load balancer {name}");
                let lb = Arc::new(LoadBalancer::new(
                    &name,
                    desired,
                    self.collaborators.clone(),
                ));
                lb.record(&namespace, EventKind::Created, "Load balancer tracked");
                lb
            }
        };

        // Step 1: register. From here on a failed convergence can still be
        // cleaned up by delete or gc.
        self.store.add(name.clone(), Arc::clone(&lb)).await;

        // Step 2: converge.
        match lb.converge().await {
            Ok(()) => {
                lb.record(&namespace, EventKind::Converged, "Cloud resources are up to date");
                Ok(())
            }
            Err(e) => {
                warn!("Sync of {name} failed: {e}");
                lb.record(&namespace, EventKind::ConvergeFailed, e.to_string());
                Err(e)
            }
        }
    }

    /// Starts tracking every load balancer of this cluster found in the cloud.
    ///
    /// Load balancers are found through their URL maps. Names whose canonical
    /// form differs belong to another cluster and are skipped, as are names
    /// already tracked. An adopted load balancer carries the routing read back
    /// from its URL map, which is all [`Self::delete`] needs. Returns the
    /// adopted names, sorted.
    ///
    /// # Errors
    ///
    /// Returns the cloud error if URL maps cannot be listed.
    pub async fn adopt_existing(&self, version: ApiVersion) -> Result<Vec<String>> {
        let prefix = self.collaborators.namer.resource(ResourceKind::UrlMap, "");
        let url_maps = self
            .collaborators
            .cloud
            .list(version, ResourceKind::UrlMap)
            .await?;

        let mut adopted = Vec::new();
        for url_map in url_maps {
            let Some(name) = url_map.name.strip_prefix(&prefix) else {
                continue;
            };
            if name.is_empty() || self.canonical_name(name) != name {
                continue;
            }

            let mut found = RuntimeInfo::new(name, "");
            found.url_map = serde_json::from_value::<UrlMap>(url_map.spec.clone()).unwrap_or_default();
            found.api_version = url_map.version;
            let namespace = found.namespace().to_string();

            let lb = Arc::new(LoadBalancer::new(name, found, self.collaborators.clone()));
            if self.store.add_if_absent(name, Arc::clone(&lb)).await {
                info!("Adopted load balancer {name} from the cloud");
                lb.record(&namespace, EventKind::Created, "Load balancer adopted from the cloud");
                adopted.push(name.to_string());
            }
        }

        adopted.sort();
        Ok(adopted)
    }

    /// Cleans up the load balancer and stops tracking it.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::NotFound` if the name is not tracked, or the
    /// cleanup error. A load balancer whose cleanup failed stays tracked.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let lb = self.get(name).await?;
        let namespace = lb.runtime_info().await.namespace().to_string();

        if let Err(e) = lb.cleanup().await {
            warn!("Delete of {} failed: {e}", lb.name());
            lb.record(&namespace, EventKind::CleanupFailed, e.to_string());
            return Err(e);
        }

        self.store.delete(lb.name()).await;
        lb.record(&namespace, EventKind::Deleted, "Cloud resources deleted");
        Ok(())
    }

    /// Deletes every tracked load balancer whose name is not in `desired`.
    ///
    /// `desired` is the complete set of names that should exist. Orphans are
    /// deleted in name order.
    ///
    /// # Errors
    ///
    /// With [`GcStrategy::FailFast`], returns the first delete error. With
    /// [`GcStrategy::Continue`], returns `PoolError::GcIncomplete` listing
    /// every failed delete.
    ///
    /// An orphan that another caller deleted after the snapshot was taken
    /// counts as collected: its `PoolError::NotFound` is logged at debug
    /// level and never returned.
    pub async fn gc<S: AsRef<str>>(&self, desired: &[S]) -> Result<()> {
        let keep: HashSet<String> = desired
            .iter()
            .map(|n| self.canonical_name(n.as_ref()))
            .collect();

        let mut orphans: Vec<String> = self
            .store
            .snapshot()
            .await
            .into_keys()
            .filter(|name| !keep.contains(name))
            .collect();
        orphans.sort();

        if orphans.is_empty() {
            debug!("No orphaned load balancers");
            return Ok(());
        }

        let mut failures = Vec::new();
        for name in orphans {
            info!("Garbage-collecting load balancer {name}");
            match self.delete(&name).await {
                Ok(()) => {}
                // Deleted by another caller since the snapshot.
                Err(e) if e.is_not_found() => debug!("{name} already gone"),
                Err(e) => match self.gc_strategy {
                    GcStrategy::FailFast => return Err(e),
                    GcStrategy::Continue => failures.push(format!("{name}: {e}")),
                },
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PoolError::GcIncomplete { failures }.into())
        }
    }

    /// Deletes every tracked load balancer.
    ///
    /// # Errors
    ///
    /// Same as [`Self::gc`].
    pub async fn shutdown(&self) -> Result<()> {
        self.gc::<&str>(&[]).await?;
        info!("Load balancer pool shut down");
        Ok(())
    }

    /// Canonical names of every tracked load balancer, sorted.
    pub async fn tracked_names(&self) -> Vec<String> {
        self.store.names().await
    }

    /// Number of tracked load balancers.
    pub async fn len(&self) -> usize {
        self.store.len().await
    }

    /// Returns true if nothing is tracked.
    pub async fn is_empty(&self) -> bool {
        self.store.is_empty().await
    }
}

impl std::fmt::Debug for LoadBalancerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancerPool")
            .field("cloud", &self.collaborators.cloud.backend_type())
            .field("gc_strategy", &self.gc_strategy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::StaticCertificates;
    use crate::cloud::{Cloud, CloudOp, CloudResource, InMemoryCloud};
    use crate::error::{CloudError, L7PoolError};
    use crate::events::{EventRecorder, LifecycleEvent, MockEventRecorder, TracingRecorder};
    use crate::naming::ClusterNamer;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{OnceLock, Weak};
    use tokio::runtime::Handle;

    fn collaborators(cloud: Arc<InMemoryCloud>, recorder: Arc<dyn EventRecorder>) -> Collaborators {
        Collaborators {
            cloud,
            namer: Arc::new(ClusterNamer::new("uid1")),
            certs: Arc::new(StaticCertificates::default()),
            recorder,
        }
    }

    fn create_test_pool() -> (LoadBalancerPool, Arc<InMemoryCloud>) {
        let cloud = Arc::new(InMemoryCloud::new());
        let pool = LoadBalancerPool::new(collaborators(
            Arc::clone(&cloud),
            Arc::new(TracingRecorder),
        ));
        (pool, cloud)
    }

    fn lb(name: &str) -> RuntimeInfo {
        RuntimeInfo::new(name, "be-1")
    }

    async fn fail_cleanups(cloud: &InMemoryCloud) {
        cloud
            .inject_fault(
                CloudOp::Delete,
                ResourceKind::HttpsForwardingRule,
                CloudError::Unavailable {
                    message: String::from("backend down"),
                },
            )
            .await;
    }

    #[tokio::test]
    async fn test_sync_then_get_returns_descriptor() {
        let (pool, _cloud) = create_test_pool();
        let desired = lb("shop/web");

        pool.sync(desired.clone()).await.expect("sync failed");

        let entity = pool.get("shop/web").await.expect("not tracked");
        assert_eq!(entity.name(), "shop-web--uid1");
        assert_eq!(entity.runtime_info().await, desired);

        // Canonical names resolve to the same entity.
        assert!(pool.get("shop-web--uid1").await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_converge_keeps_entity_tracked() {
        let (pool, cloud) = create_test_pool();
        cloud
            .inject_fault(
                CloudOp::Create,
                ResourceKind::TargetHttpProxy,
                CloudError::QuotaExceeded {
                    kind: ResourceKind::TargetHttpProxy,
                    message: String::from("limit 10"),
                },
            )
            .await;

        let err = pool.sync(lb("a")).await.unwrap_err();
        assert!(matches!(
            err,
            L7PoolError::Pool(PoolError::ConvergenceFailed { .. })
        ));
        assert!(pool.get("a").await.is_ok());

        // The URL map created before the failure is removed by gc.
        assert!(cloud.contains(ResourceKind::UrlMap, "k8s-um-a--uid1").await);
        pool.gc::<&str>(&[]).await.expect("gc failed");
        assert!(cloud.resources().await.is_empty());
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn test_gc_deletes_only_orphans() {
        let (pool, _cloud) = create_test_pool();
        pool.sync(lb("a")).await.expect("sync a failed");
        pool.sync(lb("b")).await.expect("sync b failed");

        pool.gc(&["a"]).await.expect("gc failed");

        assert!(pool.get("a").await.is_ok());
        let err = pool.get("b").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(pool.tracked_names().await, vec!["a--uid1"]);
    }

    #[tokio::test]
    async fn test_gc_is_idempotent() {
        let (pool, cloud) = create_test_pool();
        pool.sync(lb("a")).await.expect("sync a failed");
        pool.sync(lb("b")).await.expect("sync b failed");

        pool.gc(&["b"]).await.expect("first gc failed");
        let deletes = cloud.calls(CloudOp::Delete).await;
        pool.gc(&["b"]).await.expect("second gc failed");

        assert_eq!(cloud.calls(CloudOp::Delete).await, deletes);
        assert_eq!(pool.tracked_names().await, vec!["b--uid1"]);
    }

    #[tokio::test]
    async fn test_shutdown_empties_pool() {
        let (pool, cloud) = create_test_pool();
        pool.sync(lb("a")).await.expect("sync a failed");
        pool.sync(lb("b")).await.expect("sync b failed");

        pool.shutdown().await.expect("shutdown failed");

        assert!(pool.is_empty().await);
        assert!(cloud.resources().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_untracked_is_not_found() {
        let (pool, cloud) = create_test_pool();
        pool.sync(lb("a")).await.expect("sync failed");
        let deletes = cloud.calls(CloudOp::Delete).await;

        let err = pool.delete("never-synced").await.unwrap_err();
        assert!(matches!(err, L7PoolError::Pool(PoolError::NotFound { ref name }) if name == "never-synced--uid1"));
        assert_eq!(pool.len().await, 1);
        assert_eq!(cloud.calls(CloudOp::Delete).await, deletes);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_entity() {
        let (pool, cloud) = create_test_pool();
        pool.sync(lb("a")).await.expect("sync failed");
        fail_cleanups(&cloud).await;

        let err = pool.delete("a").await.unwrap_err();
        assert!(matches!(err, L7PoolError::Pool(PoolError::CleanupFailed { .. })));
        assert!(err.is_retryable());
        assert!(pool.get("a").await.is_ok());

        cloud.clear_faults().await;
        pool.delete("a").await.expect("retry failed");
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn test_gc_fail_fast_stops_at_first_error() {
        let (pool, cloud) = create_test_pool();
        for name in ["a", "b", "c"] {
            pool.sync(lb(name)).await.expect("sync failed");
        }
        fail_cleanups(&cloud).await;
        let deletes = cloud.calls(CloudOp::Delete).await;

        let err = pool.gc::<&str>(&[]).await.unwrap_err();
        assert!(matches!(err, L7PoolError::Pool(PoolError::CleanupFailed { ref name, .. }) if name == "a--uid1"));
        assert_eq!(cloud.calls(CloudOp::Delete).await, deletes + 1);
        assert_eq!(pool.len().await, 3);
    }

    #[tokio::test]
    async fn test_gc_continue_attempts_every_orphan() {
        let (pool, cloud) = create_test_pool();
        let pool = pool.with_gc_strategy(GcStrategy::Continue);
        for name in ["a", "b", "c"] {
            pool.sync(lb(name)).await.expect("sync failed");
        }
        fail_cleanups(&cloud).await;

        let err = pool.gc(&["b"]).await.unwrap_err();
        match err {
            L7PoolError::Pool(PoolError::GcIncomplete { failures }) => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("a--uid1: "));
                assert!(failures[1].starts_with("c--uid1: "));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(pool.len().await, 3);

        cloud.clear_faults().await;
        pool.gc(&["b"]).await.expect("gc failed");
        assert_eq!(pool.tracked_names().await, vec!["b--uid1"]);
    }

    #[tokio::test]
    async fn test_resync_replaces_descriptor_and_converges_each_time() {
        let cloud = Arc::new(InMemoryCloud::new());
        let mut recorder = MockEventRecorder::new();
        recorder
            .expect_record()
            .withf(|e| e.kind == EventKind::Created)
            .times(1)
            .returning(|_| Ok(()));
        recorder
            .expect_record()
            .withf(|e| e.kind == EventKind::Changed)
            .times(1)
            .returning(|_| Ok(()));
        recorder
            .expect_record()
            .withf(|e| e.kind == EventKind::Converged && e.name == "a--uid1")
            .times(2)
            .returning(|_| Ok(()));
        let pool = LoadBalancerPool::new(collaborators(Arc::clone(&cloud), Arc::new(recorder)));

        pool.sync(RuntimeInfo::new("a", "be-1")).await.expect("first sync failed");
        pool.sync(RuntimeInfo::new("a", "be-2")).await.expect("second sync failed");

        let entity = pool.get("a").await.expect("not tracked");
        assert_eq!(entity.runtime_info().await, RuntimeInfo::new("a", "be-2"));
        assert_eq!(cloud.calls(CloudOp::Update).await, 1);
    }

    #[tokio::test]
    async fn test_unchanged_resync_still_converges() {
        let cloud = Arc::new(InMemoryCloud::new());
        let mut recorder = MockEventRecorder::new();
        recorder
            .expect_record()
            .withf(|e| e.kind == EventKind::Created)
            .times(1)
            .returning(|_| Ok(()));
        recorder
            .expect_record()
            .withf(|e| e.kind == EventKind::Converged)
            .times(2)
            .returning(|_| Ok(()));
        let pool = LoadBalancerPool::new(collaborators(Arc::clone(&cloud), Arc::new(recorder)));

        pool.sync(lb("a")).await.expect("first sync failed");
        let gets = cloud.calls(CloudOp::Get).await;
        pool.sync(lb("a")).await.expect("second sync failed");

        // Converging again reads the cloud again.
        assert!(cloud.calls(CloudOp::Get).await > gets);
        assert_eq!(cloud.calls(CloudOp::Create).await, 3);
    }

    #[tokio::test]
    async fn test_recorder_failure_does_not_abort() {
        let cloud = Arc::new(InMemoryCloud::new());
        let mut recorder = MockEventRecorder::new();
        recorder
            .expect_record()
            .returning(|_| Err(L7PoolError::internal("event sink down")));
        let pool = LoadBalancerPool::new(collaborators(Arc::clone(&cloud), Arc::new(recorder)));

        pool.sync(lb("a")).await.expect("sync failed");
        pool.delete("a").await.expect("delete failed");
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn test_name_reappears_after_delete() {
        let (pool, cloud) = create_test_pool();
        pool.sync(lb("a")).await.expect("sync failed");
        pool.delete("a").await.expect("delete failed");
        pool.sync(lb("a")).await.expect("resync failed");

        assert!(pool.get("a").await.is_ok());
        assert_eq!(cloud.resources().await.len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_syncs_for_different_names() {
        let (pool, _cloud) = create_test_pool();
        let pool = Arc::new(pool);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move { pool.sync(lb(&format!("lb-{i}"))).await })
            })
            .collect();
        for handle in handles {
            handle.await.expect("task panicked").expect("sync failed");
        }

        assert_eq!(pool.len().await, 8);
        pool.shutdown().await.expect("shutdown failed");
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn test_new_pool_collects_what_previous_pool_left() {
        let cloud = Arc::new(InMemoryCloud::new());
        let first = LoadBalancerPool::new(collaborators(Arc::clone(&cloud), Arc::new(TracingRecorder)));
        first.sync(lb("a")).await.expect("sync a failed");
        first.sync(lb("b")).await.expect("sync b failed");
        drop(first);

        let second = LoadBalancerPool::new(collaborators(Arc::clone(&cloud), Arc::new(TracingRecorder)));
        let adopted = second.adopt_existing(ApiVersion::Ga).await.expect("adopt failed");
        assert_eq!(adopted, vec!["a--uid1", "b--uid1"]);

        second.sync(lb("a")).await.expect("sync a failed");
        second.gc(&["a"]).await.expect("gc failed");

        assert_eq!(second.tracked_names().await, vec!["a--uid1"]);
        assert_eq!(cloud.resources().await.len(), 3);
        assert!(!cloud.contains(ResourceKind::UrlMap, "k8s-um-b--uid1").await);
    }

    #[tokio::test]
    async fn test_adopt_skips_other_clusters_and_tracked_names() {
        let (pool, cloud) = create_test_pool();
        pool.sync(lb("a")).await.expect("sync failed");
        let tracked = pool.get("a").await.expect("not tracked");

        let foreign = CloudResource::new(
            ResourceKind::UrlMap,
            "k8s-um-a--uid2",
            ApiVersion::Ga,
            json!({ "default_backend": "be-9" }),
        );
        cloud.create(ApiVersion::Ga, &foreign).await.expect("create failed");

        let adopted = pool.adopt_existing(ApiVersion::Ga).await.expect("adopt failed");
        assert!(adopted.is_empty());
        assert!(Arc::ptr_eq(&tracked, &pool.get("a").await.expect("not tracked")));

        pool.shutdown().await.expect("shutdown failed");
        assert_eq!(cloud.resources().await, vec![foreign]);
    }

    #[tokio::test]
    async fn test_adopted_entity_keeps_stored_routing() {
        let (pool, cloud) = create_test_pool();
        let url_map = CloudResource::new(
            ResourceKind::UrlMap,
            "k8s-um-shop-web--uid1",
            ApiVersion::Beta,
            json!({ "default_backend": "be-7", "host_rules": [] }),
        );
        cloud.create(ApiVersion::Beta, &url_map).await.expect("create failed");

        pool.adopt_existing(ApiVersion::Ga).await.expect("adopt failed");

        let entity = pool.get("shop/web").await.expect("not adopted");
        let found = entity.runtime_info().await;
        assert_eq!(found.url_map.default_backend.as_deref(), Some("be-7"));
        assert_eq!(found.api_version, ApiVersion::Beta);
    }

    /// Syncs `c` and deletes `b` from inside the `Deleted` event of `a`, that
    /// is after gc took its snapshot and before it reaches `b`.
    struct InterleaveOnDelete {
        pool: OnceLock<Weak<LoadBalancerPool>>,
        fired: AtomicBool,
    }

    impl EventRecorder for InterleaveOnDelete {
        fn record(&self, event: &LifecycleEvent) -> crate::error::Result<()> {
            let trigger = event.kind == EventKind::Deleted && event.name == "a--uid1";
            if !trigger || self.fired.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            let Some(pool) = self.pool.get().and_then(Weak::upgrade) else {
                return Ok(());
            };
            tokio::task::block_in_place(|| {
                Handle::current().block_on(async {
                    pool.sync(lb("c")).await?;
                    pool.delete("b").await
                })
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_gc_spares_names_synced_after_snapshot() {
        let cloud = Arc::new(InMemoryCloud::new());
        let recorder = Arc::new(InterleaveOnDelete {
            pool: OnceLock::new(),
            fired: AtomicBool::new(false),
        });
        let pool = Arc::new(LoadBalancerPool::new(collaborators(
            Arc::clone(&cloud),
            Arc::clone(&recorder) as Arc<dyn EventRecorder>,
        )));
        assert!(recorder.pool.set(Arc::downgrade(&pool)).is_ok());
        pool.sync(lb("a")).await.expect("sync a failed");
        pool.sync(lb("b")).await.expect("sync b failed");

        // The snapshot holds a and b. c arrives mid-pass and b is deleted by
        // someone else before gc gets to it.
        let collector = Arc::clone(&pool);
        tokio::spawn(async move { collector.gc::<&str>(&[]).await })
            .await
            .expect("gc task panicked")
            .expect("gc failed");

        assert!(recorder.fired.load(Ordering::SeqCst));
        assert_eq!(pool.tracked_names().await, vec!["c--uid1"]);
        assert_eq!(cloud.resources().await.len(), 3);
        assert!(cloud.contains(ResourceKind::UrlMap, "k8s-um-c--uid1").await);
    }
}
