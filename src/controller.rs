//! Controller driving the pool from the configuration file.
//!
//! One reconcile pass syncs every desired load balancer, one at a time, and
//! then garbage-collects against the full desired set. Until it succeeds
//! once, a pass first adopts the load balancers already in the cloud, so a
//! name dropped from the configuration while no controller ran is still
//! collected. Processing one
//! descriptor at a time is what serializes operations on a name. Errors never
//! stop a pass: they are collected into the [`ReconciliationResult`] and the
//! next pass retries.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::cloud::ApiVersion;
use crate::config::{ConfigHasher, PoolConfig};
use crate::error::Result;
use crate::pool::LoadBalancerPool;

/// Runs reconcile passes against a [`LoadBalancerPool`].
#[derive(Debug)]
pub struct Controller {
    /// The pool being driven.
    pool: Arc<LoadBalancerPool>,
    /// Configuration hasher.
    hasher: ConfigHasher,
    /// Set once the load balancers found in the cloud were adopted.
    adopted: AtomicBool,
}

/// Result of a reconcile pass.
#[derive(Debug, serde::Serialize)]
pub struct ReconciliationResult {
    /// Whether every sync and the garbage collection succeeded.
    pub success: bool,
    /// Number of load balancers synced without error.
    pub synced: usize,
    /// Number of load balancers whose sync failed.
    pub failed: usize,
    /// Number of load balancers garbage-collected.
    pub collected: usize,
    /// Number of load balancers tracked after the pass.
    pub tracked: usize,
    /// Errors encountered.
    pub errors: Vec<String>,
    /// Fingerprint of the configuration the pass ran against.
    pub config_hash: String,
}

impl Controller {
    /// Creates a controller for the given pool.
    #[must_use]
    pub const fn new(pool: Arc<LoadBalancerPool>) -> Self {
        Self {
            pool,
            hasher: ConfigHasher::new(),
            adopted: AtomicBool::new(false),
        }
    }

    /// The pool being driven.
    #[must_use]
    pub const fn pool(&self) -> &Arc<LoadBalancerPool> {
        &self.pool
    }

    /// Performs one reconcile pass.
    pub async fn reconcile(&self, config: &PoolConfig) -> ReconciliationResult {
        let config_hash = self.hasher.hash_config(config);
        info!(
            "Starting reconciliation of {} load balancer(s) (config {})",
            config.load_balancers.len(),
            self.hasher.short_hash(&config_hash)
        );

        let mut synced = 0;
        let mut failed = 0;
        let mut errors = Vec::new();

        if let Err(e) = self.adopt_existing().await {
            error!("Failed to list load balancers in the cloud: {e}");
            errors.push(e.to_string());
        }

        for desired in &config.load_balancers {
            match self.pool.sync(desired.clone()).await {
                Ok(()) => synced += 1,
                Err(e) => {
                    error!("Failed to sync {}: {e}", desired.name);
                    failed += 1;
                    errors.push(e.to_string());
                }
            }
        }

        let before = self.pool.len().await;
        debug!(
            "Collecting orphans among {before} load balancer(s) ({:?})",
            self.pool.gc_strategy()
        );
        if let Err(e) = self.pool.gc(&config.desired_names()).await {
            error!("Garbage collection failed: {e}");
            errors.push(e.to_string());
        }
        let tracked = self.pool.len().await;

        let result = ReconciliationResult {
            success: errors.is_empty(),
            synced,
            failed,
            collected: before.saturating_sub(tracked),
            tracked,
            errors,
            config_hash,
        };

        if result.success {
            info!(
                "Reconciliation complete: {} synced, {} collected",
                result.synced, result.collected
            );
        } else {
            warn!(
                "Reconciliation finished with {} error(s)",
                result.errors.len()
            );
        }

        result
    }

    /// Adopts the load balancers already in the cloud, once.
    async fn adopt_existing(&self) -> Result<()> {
        if self.adopted.load(Ordering::Acquire) {
            return Ok(());
        }
        let adopted = self.pool.adopt_existing(ApiVersion::default()).await?;
        if !adopted.is_empty() {
            info!(
                "Adopted {} load balancer(s) from the cloud: {}",
                adopted.len(),
                adopted.join(", ")
            );
        }
        self.adopted.store(true, Ordering::Release);
        Ok(())
    }

    /// Runs reconcile passes every `interval` until `shutdown` resolves.
    ///
    /// The configuration is reloaded before each pass. A pass whose
    /// configuration fails to load is skipped and the pool is left as is.
    /// Returns the number of passes run.
    pub async fn run<L, F>(&self, mut load: L, interval: Duration, shutdown: F) -> u64
    where
        L: FnMut() -> Result<PoolConfig>,
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut passes = 0;
        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!("Stopping controller after {passes} pass(es)");
                    return passes;
                }
                _ = ticker.tick() => {
                    match load() {
                        Ok(config) => {
                            let result = self.reconcile(&config).await;
                            debug!("Pass {passes}: {result:?}");
                        }
                        Err(e) => error!("Skipping pass, configuration failed to load: {e}"),
                    }
                    passes += 1;
                }
            }
        }
    }
}

impl std::fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.success { "successful" } else { "failed" };
        writeln!(f, "Reconciliation {status}:")?;
        writeln!(f, "  Synced: {}", self.synced)?;
        writeln!(f, "  Failed: {}", self.failed)?;
        writeln!(f, "  Collected: {}", self.collected)?;
        writeln!(f, "  Tracked: {}", self.tracked)?;

        if !self.errors.is_empty() {
            writeln!(f, "  Errors:")?;
            for error in &self.errors {
                writeln!(f, "    - {error}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::StaticCertificates;
    use crate::cloud::{Cloud, CloudOp, InMemoryCloud, ResourceKind};
    use crate::error::{CloudError, L7PoolError};
    use crate::events::TracingRecorder;
    use crate::loadbalancer::{Collaborators, RuntimeInfo};
    use crate::naming::ClusterNamer;

    fn controller_on(cloud: &Arc<InMemoryCloud>) -> Controller {
        let dyn_cloud: Arc<dyn Cloud> = cloud.clone();
        let pool = LoadBalancerPool::new(Collaborators {
            cloud: dyn_cloud,
            namer: Arc::new(ClusterNamer::new("uid1")),
            certs: Arc::new(StaticCertificates::default()),
            recorder: Arc::new(TracingRecorder),
        });
        Controller::new(Arc::new(pool))
    }

    fn create_test_controller() -> (Controller, Arc<InMemoryCloud>) {
        let cloud = Arc::new(InMemoryCloud::new());
        (controller_on(&cloud), cloud)
    }

    fn config(names: &[&str]) -> PoolConfig {
        let mut config = PoolConfig::default();
        config.cluster.uid = String::from("uid1");
        config.load_balancers = names.iter().map(|n| RuntimeInfo::new(*n, "be-1")).collect();
        config
    }

    #[tokio::test]
    async fn test_reconcile_syncs_and_collects() {
        let (controller, cloud) = create_test_controller();

        let first = controller.reconcile(&config(&["shop/web", "shop/admin"])).await;
        assert!(first.success);
        assert_eq!(first.synced, 2);
        assert_eq!(first.tracked, 2);
        assert_eq!(cloud.resources().await.len(), 6);

        let second = controller.reconcile(&config(&["shop/web"])).await;
        assert!(second.success);
        assert_eq!(second.collected, 1);
        assert_eq!(second.tracked, 1);
        assert_eq!(cloud.resources().await.len(), 3);
        assert_ne!(first.config_hash, second.config_hash);
    }

    #[tokio::test]
    async fn test_restarted_controller_collects_dropped_names() {
        let cloud = Arc::new(InMemoryCloud::new());

        let first = controller_on(&cloud)
            .reconcile(&config(&["shop/web", "shop/admin"]))
            .await;
        assert!(first.success);
        assert_eq!(cloud.resources().await.len(), 6);

        // A new process, with shop/admin dropped from the configuration.
        let restarted = controller_on(&cloud);
        let second = restarted.reconcile(&config(&["shop/web"])).await;
        assert!(second.success);
        assert_eq!(second.collected, 1);
        assert_eq!(second.tracked, 1);
        assert_eq!(cloud.resources().await.len(), 3);

        // Adoption happens once per controller: URL maps are not listed again.
        cloud
            .inject_fault(
                CloudOp::List,
                ResourceKind::UrlMap,
                CloudError::Unavailable {
                    message: String::from("backend down"),
                },
            )
            .await;
        assert!(restarted.reconcile(&config(&["shop/web"])).await.success);
    }

    #[tokio::test]
    async fn test_failed_adoption_is_retried() {
        let (controller, cloud) = create_test_controller();
        cloud
            .inject_fault(
                CloudOp::List,
                ResourceKind::UrlMap,
                CloudError::Unavailable {
                    message: String::from("backend down"),
                },
            )
            .await;

        let result = controller.reconcile(&config(&["shop/web"])).await;
        assert!(!result.success);
        assert_eq!(result.synced, 1);
        assert_eq!(result.failed, 0);
        assert!(!controller.adopted.load(Ordering::Acquire));

        cloud.clear_faults().await;
        let result = controller.reconcile(&config(&["shop/web"])).await;
        assert!(result.success);
        assert!(controller.adopted.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_failed_sync_is_reported_and_kept() {
        let (controller, cloud) = create_test_controller();
        cloud
            .inject_fault(
                CloudOp::Create,
                ResourceKind::HttpForwardingRule,
                CloudError::Unavailable {
                    message: String::from("backend down"),
                },
            )
            .await;

        let result = controller.reconcile(&config(&["shop/web"])).await;
        assert!(!result.success);
        assert_eq!(result.failed, 1);
        assert_eq!(result.tracked, 1);
        assert!(result.to_string().contains("Errors:"));

        cloud.clear_faults().await;
        let result = controller.reconcile(&config(&["shop/web"])).await;
        assert!(result.success);
        assert_eq!(cloud.resources().await.len(), 3);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (controller, _cloud) = create_test_controller();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let mut tx = Some(tx);
        let mut loads = 0;

        let passes = controller
            .run(
                || {
                    loads += 1;
                    if loads == 2 {
                        if let Some(tx) = tx.take() {
                            let _ = tx.send(());
                        }
                        return Err(L7PoolError::internal("config unreadable"));
                    }
                    Ok(config(&["shop/web"]))
                },
                Duration::from_millis(10),
                async {
                    let _ = rx.await;
                },
            )
            .await;

        assert_eq!(passes, 2);
        assert_eq!(controller.pool().tracked_names().await, vec!["shop-web--uid1"]);
    }
}
