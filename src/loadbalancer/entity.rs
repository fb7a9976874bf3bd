//! The load balancer entity.
//!
//! A load balancer does not exist in the cloud as a single object. It is a
//! chain of resources (forwarding rule -> target proxy -> URL map, plus SSL
//! certificates for HTTPS) that [`LoadBalancer::converge`] creates or updates
//! one hop at a time, and [`LoadBalancer::cleanup`] removes from the edge
//! inwards.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::certs::CertificateLookup;
use crate::cloud::{ApiVersion, Cloud, CloudResource, ResourceKind};
use crate::config::{ConfigHasher, SHORT_HASH_LEN};
use crate::error::{CloudError, CloudResult, PoolError, Result};
use crate::events::{EventKind, EventRecorder, LifecycleEvent};
use crate::naming::Namer;

use super::runtime::RuntimeInfo;

/// Port served by the HTTP forwarding rule.
const HTTP_PORT: u16 = 80;

/// Port served by the HTTPS forwarding rule.
const HTTPS_PORT: u16 = 443;

/// Collaborators injected into every load balancer the pool creates.
#[derive(Clone)]
pub struct Collaborators {
    /// Cloud backend.
    pub cloud: Arc<dyn Cloud>,
    /// Naming of cloud resources.
    pub namer: Arc<dyn Namer>,
    /// Managed certificate lookup.
    pub certs: Arc<dyn CertificateLookup>,
    /// Lifecycle event sink.
    pub recorder: Arc<dyn EventRecorder>,
}

/// One logical load balancer tracked by the pool.
pub struct LoadBalancer {
    /// Canonical name.
    name: String,
    /// Last applied desired state.
    runtime_info: RwLock<RuntimeInfo>,
    /// Injected at creation, never replaced.
    collaborators: Collaborators,
    hasher: ConfigHasher,
}

/// A frontend: a target proxy and the forwarding rule pointing at it.
#[derive(Debug, Clone, Copy)]
struct Frontend {
    proxy: ResourceKind,
    rule: ResourceKind,
    port: u16,
}

const HTTP_FRONTEND: Frontend = Frontend {
    proxy: ResourceKind::TargetHttpProxy,
    rule: ResourceKind::HttpForwardingRule,
    port: HTTP_PORT,
};

const HTTPS_FRONTEND: Frontend = Frontend {
    proxy: ResourceKind::TargetHttpsProxy,
    rule: ResourceKind::HttpsForwardingRule,
    port: HTTPS_PORT,
};

impl LoadBalancer {
    /// Creates an entity. Only the pool creates load balancers.
    pub(crate) fn new(
        name: impl Into<String>,
        runtime_info: RuntimeInfo,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            name: name.into(),
            runtime_info: RwLock::new(runtime_info),
            collaborators,
            hasher: ConfigHasher::new(),
        }
    }

    /// Canonical name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a copy of the last applied desired state.
    pub async fn runtime_info(&self) -> RuntimeInfo {
        self.runtime_info.read().await.clone()
    }

    /// Replaces the desired state if it differs. Returns the previous value
    /// when a replacement happened.
    pub(crate) async fn replace_runtime_info(&self, desired: RuntimeInfo) -> Option<RuntimeInfo> {
        let mut current = self.runtime_info.write().await;
        if *current == desired {
            return None;
        }
        Some(std::mem::replace(&mut *current, desired))
    }

    /// Sends a lifecycle event. Recorder failures are logged, never returned.
    pub(crate) fn record(&self, namespace: &str, kind: EventKind, message: impl Into<String>) {
        let event = LifecycleEvent::new(namespace, &self.name, kind, message);
        if let Err(e) = self.collaborators.recorder.record(&event) {
            warn!("Failed to record {kind} event for {}: {e}", self.name);
        }
    }

    /// Drives the current desired state into the cloud.
    ///
    /// Resources created before a failure are left in place; the next call
    /// picks up where this one stopped and [`Self::cleanup`] removes them.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::ConvergenceFailed` wrapping the first cloud error.
    pub async fn converge(&self) -> Result<()> {
        let runtime_info = self.runtime_info().await;
        debug!(
            "Converging {} (desired state {})",
            self.name,
            self.hasher.short_hash(&self.hasher.hash_runtime_info(&runtime_info))
        );

        self.edge_hop(&runtime_info).await.map_err(|source| {
            PoolError::ConvergenceFailed {
                name: self.name.clone(),
                source,
            }
            .into()
        })
    }

    /// Deletes every cloud resource owned by this load balancer.
    ///
    /// Resources that are already gone are skipped, so this is safe on a
    /// partially converged load balancer.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::CleanupFailed` wrapping the first cloud error.
    pub async fn cleanup(&self) -> Result<()> {
        let version = self.runtime_info.read().await.api_version;
        info!("Cleaning up load balancer {}", self.name);

        self.teardown(version).await.map_err(|source| {
            PoolError::CleanupFailed {
                name: self.name.clone(),
                source,
            }
            .into()
        })
    }

    async fn edge_hop(&self, ri: &RuntimeInfo) -> CloudResult<()> {
        if !ri.allow_http && !ri.wants_https() {
            return Err(CloudError::invalid(format!(
                "load balancer {} serves neither HTTP nor HTTPS",
                self.name
            )));
        }
        if ri.url_map.is_empty() {
            return Err(CloudError::invalid(format!(
                "URL map of {} has no default backend and no host rules",
                self.name
            )));
        }

        let version = ri.api_version;
        let url_map = self.resource_name(ResourceKind::UrlMap);
        self.ensure(
            version,
            CloudResource::new(ResourceKind::UrlMap, &url_map, version, json!(ri.url_map)),
        )
        .await?;

        if ri.allow_http {
            let proxy_spec = json!({ "url_map": url_map });
            self.ensure_frontend(version, HTTP_FRONTEND, proxy_spec, ri.static_ip.as_deref())
                .await?;
        } else {
            self.remove_frontend(version, HTTP_FRONTEND).await?;
        }

        let (certificates, owned) = self.resolve_certificates(ri).await?;
        if certificates.is_empty() {
            if ri.wants_https() {
                warn!(
                    "No certificate of {} is available yet, HTTPS stays disabled",
                    self.name
                );
            }
            self.remove_frontend(version, HTTPS_FRONTEND).await?;
        } else {
            let proxy_spec = json!({ "url_map": url_map, "ssl_certificates": certificates });
            self.ensure_frontend(version, HTTPS_FRONTEND, proxy_spec, ri.static_ip.as_deref())
                .await?;
        }

        // Only after the HTTPS proxy stopped referencing them.
        self.prune_certificates(version, &owned).await
    }

    async fn teardown(&self, version: ApiVersion) -> CloudResult<()> {
        for kind in ResourceKind::TEARDOWN_ORDER {
            if kind == ResourceKind::SslCertificate {
                self.prune_certificates(version, &HashSet::new()).await?;
            } else {
                self.ensure_absent(version, kind, &self.resource_name(kind))
                    .await?;
            }
        }
        Ok(())
    }

    /// Creates or updates the proxy, then the forwarding rule in front of it.
    async fn ensure_frontend(
        &self,
        version: ApiVersion,
        frontend: Frontend,
        proxy_spec: serde_json::Value,
        static_ip: Option<&str>,
    ) -> CloudResult<()> {
        let proxy = self.resource_name(frontend.proxy);
        self.ensure(
            version,
            CloudResource::new(frontend.proxy, &proxy, version, proxy_spec),
        )
        .await?;

        let rule_spec = json!({
            "target": proxy,
            "port_range": format!("{0}-{0}", frontend.port),
            "ip_address": static_ip,
            "protocol": "TCP",
        });
        self.ensure(
            version,
            CloudResource::new(frontend.rule, self.resource_name(frontend.rule), version, rule_spec),
        )
        .await
    }

    /// Removes the forwarding rule, then the proxy it points at.
    async fn remove_frontend(&self, version: ApiVersion, frontend: Frontend) -> CloudResult<()> {
        self.ensure_absent(version, frontend.rule, &self.resource_name(frontend.rule))
            .await?;
        self.ensure_absent(version, frontend.proxy, &self.resource_name(frontend.proxy))
            .await
    }

    /// Returns the certificate names for the HTTPS proxy and the subset owned
    /// by this load balancer.
    async fn resolve_certificates(
        &self,
        ri: &RuntimeInfo,
    ) -> CloudResult<(Vec<String>, HashSet<String>)> {
        let version = ri.api_version;
        let mut names: Vec<String> = Vec::new();
        let mut owned = HashSet::new();

        for tls in &ri.tls {
            let fingerprint = self.hasher.hash_certificate(tls);
            let name = self
                .collaborators
                .namer
                .ssl_certificate(&self.name, &self.hasher.short_hash(&fingerprint));
            let spec = json!({
                "certificate": tls.cert,
                "private_key": tls.key,
                "fingerprint": fingerprint,
            });
            self.ensure(
                version,
                CloudResource::new(ResourceKind::SslCertificate, &name, version, spec),
            )
            .await?;
            owned.insert(name.clone());
            names.push(name);
        }

        for name in &ri.pre_shared_certs {
            self.collaborators
                .cloud
                .get(version, ResourceKind::SslCertificate, name)
                .await?;
            names.push(name.clone());
        }

        for managed in &ri.managed_certs {
            match self.collaborators.certs.lookup(ri.namespace(), managed) {
                Some(name) => names.push(name),
                None => warn!(
                    "Managed certificate {}/{managed} of {} is not provisioned",
                    ri.namespace(),
                    self.name
                ),
            }
        }

        let mut seen = HashSet::new();
        names.retain(|n| seen.insert(n.clone()));
        Ok((names, owned))
    }

    /// Deletes owned SSL certificates not in `keep`.
    async fn prune_certificates(
        &self,
        version: ApiVersion,
        keep: &HashSet<String>,
    ) -> CloudResult<()> {
        let stale: Vec<String> = self
            .collaborators
            .cloud
            .list(version, ResourceKind::SslCertificate)
            .await?
            .into_iter()
            .map(|c| c.name)
            .filter(|n| self.owns_certificate(n) && !keep.contains(n))
            .collect();

        for name in stale {
            self.ensure_absent(version, ResourceKind::SslCertificate, &name)
                .await?;
        }
        Ok(())
    }

    /// Owned certificates are the namer prefix followed by a short hash.
    fn owns_certificate(&self, name: &str) -> bool {
        let prefix = self.collaborators.namer.ssl_certificate_prefix(&self.name);
        name.strip_prefix(&prefix).is_some_and(|rest| {
            rest.len() == SHORT_HASH_LEN && rest.chars().all(|c| c.is_ascii_hexdigit())
        })
    }

    fn resource_name(&self, kind: ResourceKind) -> String {
        self.collaborators.namer.resource(kind, &self.name)
    }

    /// Creates the resource if missing, updates it if its body differs.
    async fn ensure(&self, version: ApiVersion, desired: CloudResource) -> CloudResult<()> {
        let cloud = &self.collaborators.cloud;
        match cloud.get(version, desired.kind, &desired.name).await {
            Ok(existing) if existing.spec == desired.spec => {
                debug!("{} {} is up to date", desired.kind, desired.name);
                Ok(())
            }
            Ok(_) => {
                info!("Updating {} {}", desired.kind, desired.name);
                cloud.update(version, &desired).await
            }
            Err(e) if e.is_not_found() => {
                info!("Creating {} {}", desired.kind, desired.name);
                cloud.create(version, &desired).await
            }
            Err(e) => Err(e),
        }
    }

    /// Deletes the resource; an absent resource is not an error.
    async fn ensure_absent(
        &self,
        version: ApiVersion,
        kind: ResourceKind,
        name: &str,
    ) -> CloudResult<()> {
        match self.collaborators.cloud.delete(version, kind, name).await {
            Ok(()) => {
                info!("Deleted {kind} {name}");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("{kind} {name} already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for LoadBalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancer")
            .field("name", &self.name)
            .field("cloud", &self.collaborators.cloud.backend_type())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::StaticCertificates;
    use crate::cloud::{CloudOp, InMemoryCloud};
    use crate::events::TracingRecorder;
    use crate::loadbalancer::runtime::TlsCert;
    use crate::naming::ClusterNamer;
    use std::collections::HashMap;

    const LB: &str = "default-web--uid1";

    fn collaborators(cloud: Arc<InMemoryCloud>, certs: StaticCertificates) -> Collaborators {
        Collaborators {
            cloud,
            namer: Arc::new(ClusterNamer::new("uid1")),
            certs: Arc::new(certs),
            recorder: Arc::new(TracingRecorder),
        }
    }

    fn create_test_lb(ri: RuntimeInfo) -> (LoadBalancer, Arc<InMemoryCloud>) {
        let cloud = Arc::new(InMemoryCloud::new());
        let lb = LoadBalancer::new(
            LB,
            ri,
            collaborators(Arc::clone(&cloud), StaticCertificates::default()),
        );
        (lb, cloud)
    }

    fn tls(cert: &str) -> TlsCert {
        TlsCert {
            cert: cert.to_string(),
            key: String::from("KEY"),
        }
    }

    async fn ssl_names(cloud: &InMemoryCloud) -> Vec<String> {
        cloud
            .resources()
            .await
            .into_iter()
            .filter(|r| r.kind == ResourceKind::SslCertificate)
            .map(|r| r.name)
            .collect()
    }

    #[tokio::test]
    async fn test_http_only_converge() {
        let (lb, cloud) = create_test_lb(RuntimeInfo::new("default/web", "be-1"));

        lb.converge().await.expect("converge failed");

        assert!(cloud.contains(ResourceKind::UrlMap, "k8s-um-default-web--uid1").await);
        assert!(cloud.contains(ResourceKind::TargetHttpProxy, "k8s-tp-default-web--uid1").await);
        assert!(cloud.contains(ResourceKind::HttpForwardingRule, "k8s-fw-default-web--uid1").await);
        assert!(!cloud.contains(ResourceKind::TargetHttpsProxy, "k8s-tps-default-web--uid1").await);
        assert_eq!(cloud.resources().await.len(), 3);
    }

    #[tokio::test]
    async fn test_converge_is_stable() {
        let (lb, cloud) = create_test_lb(RuntimeInfo::new("default/web", "be-1"));

        lb.converge().await.expect("first converge failed");
        lb.converge().await.expect("second converge failed");

        assert_eq!(cloud.calls(CloudOp::Create).await, 3);
        assert_eq!(cloud.calls(CloudOp::Update).await, 0);
    }

    #[tokio::test]
    async fn test_changed_backend_updates_url_map() {
        let (lb, cloud) = create_test_lb(RuntimeInfo::new("default/web", "be-1"));
        lb.converge().await.expect("converge failed");

        let previous = lb
            .replace_runtime_info(RuntimeInfo::new("default/web", "be-2"))
            .await;
        assert!(previous.is_some());
        lb.converge().await.expect("converge failed");

        let url_map = cloud
            .get(ApiVersion::Ga, ResourceKind::UrlMap, "k8s-um-default-web--uid1")
            .await
            .expect("url map missing");
        assert_eq!(url_map.spec["default_backend"], "be-2");
        assert_eq!(cloud.calls(CloudOp::Update).await, 1);
    }

    #[tokio::test]
    async fn test_replace_with_equal_value_is_noop() {
        let ri = RuntimeInfo::new("default/web", "be-1");
        let (lb, _cloud) = create_test_lb(ri.clone());
        assert!(lb.replace_runtime_info(ri).await.is_none());
    }

    #[tokio::test]
    async fn test_disabling_http_removes_frontend() {
        let mut ri = RuntimeInfo::new("default/web", "be-1");
        ri.tls.push(tls("CERT-A"));
        let (lb, cloud) = create_test_lb(ri.clone());
        lb.converge().await.expect("converge failed");
        assert!(cloud.contains(ResourceKind::HttpForwardingRule, "k8s-fw-default-web--uid1").await);

        ri.allow_http = false;
        lb.replace_runtime_info(ri).await;
        lb.converge().await.expect("converge failed");

        assert!(!cloud.contains(ResourceKind::HttpForwardingRule, "k8s-fw-default-web--uid1").await);
        assert!(!cloud.contains(ResourceKind::TargetHttpProxy, "k8s-tp-default-web--uid1").await);
        assert!(cloud.contains(ResourceKind::HttpsForwardingRule, "k8s-fws-default-web--uid1").await);
    }

    #[tokio::test]
    async fn test_rotated_certificate_is_pruned() {
        let mut ri = RuntimeInfo::new("default/web", "be-1");
        ri.tls.push(tls("CERT-A"));
        let (lb, cloud) = create_test_lb(ri.clone());
        lb.converge().await.expect("converge failed");
        let before = ssl_names(&cloud).await;
        assert_eq!(before.len(), 1);

        ri.tls = vec![tls("CERT-B")];
        lb.replace_runtime_info(ri).await;
        lb.converge().await.expect("converge failed");

        let after = ssl_names(&cloud).await;
        assert_eq!(after.len(), 1);
        assert_ne!(before, after);

        let proxy = cloud
            .get(ApiVersion::Ga, ResourceKind::TargetHttpsProxy, "k8s-tps-default-web--uid1")
            .await
            .expect("https proxy missing");
        assert_eq!(proxy.spec["ssl_certificates"][0], after[0].as_str());
    }

    #[tokio::test]
    async fn test_owned_certificate_carries_key_pair() {
        let mut ri = RuntimeInfo::new("default/web", "be-1");
        ri.tls.push(tls("CERT-A"));
        let (lb, cloud) = create_test_lb(ri);
        lb.converge().await.expect("converge failed");

        let names = ssl_names(&cloud).await;
        let cert = cloud
            .get(ApiVersion::Ga, ResourceKind::SslCertificate, &names[0])
            .await
            .expect("certificate missing");
        assert_eq!(cert.spec["certificate"], "CERT-A");
        assert_eq!(cert.spec["private_key"], "KEY");
    }

    #[tokio::test]
    async fn test_missing_pre_shared_cert_fails() {
        let mut ri = RuntimeInfo::new("default/web", "be-1");
        ri.pre_shared_certs.push(String::from("shared-cert"));
        let (lb, _cloud) = create_test_lb(ri);

        let err = lb.converge().await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::L7PoolError::Pool(PoolError::ConvergenceFailed {
                source: CloudError::NotFound { .. },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_managed_certificate_resolution() {
        let cloud = Arc::new(InMemoryCloud::new());
        let certs = StaticCertificates::new(HashMap::from([(
            String::from("default/web-cert"),
            String::from("mcrt-1234"),
        )]));
        let mut ri = RuntimeInfo::new("default/web", "be-1");
        ri.managed_certs = vec![String::from("web-cert"), String::from("pending")];
        let lb = LoadBalancer::new(LB, ri, collaborators(Arc::clone(&cloud), certs));

        lb.converge().await.expect("converge failed");

        let proxy = cloud
            .get(ApiVersion::Ga, ResourceKind::TargetHttpsProxy, "k8s-tps-default-web--uid1")
            .await
            .expect("https proxy missing");
        assert_eq!(proxy.spec["ssl_certificates"], json!(["mcrt-1234"]));
    }

    #[tokio::test]
    async fn test_neither_http_nor_https_is_rejected() {
        let mut ri = RuntimeInfo::new("default/web", "be-1");
        ri.allow_http = false;
        let (lb, cloud) = create_test_lb(ri);

        assert!(lb.converge().await.is_err());
        assert!(cloud.resources().await.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_after_partial_converge() {
        let mut ri = RuntimeInfo::new("default/web", "be-1");
        ri.tls.push(tls("CERT-A"));
        let (lb, cloud) = create_test_lb(ri);
        cloud
            .inject_fault(
                CloudOp::Create,
                ResourceKind::HttpForwardingRule,
                CloudError::QuotaExceeded {
                    kind: ResourceKind::HttpForwardingRule,
                    message: String::from("FORWARDING_RULES"),
                },
            )
            .await;

        assert!(lb.converge().await.is_err());
        assert!(cloud.contains(ResourceKind::UrlMap, "k8s-um-default-web--uid1").await);

        lb.cleanup().await.expect("cleanup failed");
        assert!(cloud.resources().await.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_leaves_foreign_certificates() {
        let (lb, cloud) = create_test_lb(RuntimeInfo::new("default/web", "be-1"));
        let foreign = CloudResource::new(
            ResourceKind::SslCertificate,
            "k8s-ssl-default-web--uid1-other--uid1-0123abcd",
            ApiVersion::Ga,
            json!({}),
        );
        cloud.create(ApiVersion::Ga, &foreign).await.expect("create failed");

        lb.converge().await.expect("converge failed");
        lb.cleanup().await.expect("cleanup failed");

        assert_eq!(ssl_names(&cloud).await, vec![foreign.name]);
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_reported() {
        let (lb, cloud) = create_test_lb(RuntimeInfo::new("default/web", "be-1"));
        lb.converge().await.expect("converge failed");
        cloud
            .inject_fault(
                CloudOp::Delete,
                ResourceKind::UrlMap,
                CloudError::Unavailable {
                    message: String::from("maintenance"),
                },
            )
            .await;

        let err = lb.cleanup().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(cloud.contains(ResourceKind::UrlMap, "k8s-um-default-web--uid1").await);
    }
}
