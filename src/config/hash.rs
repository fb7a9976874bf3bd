//! Fingerprints of desired states and certificates.
//!
//! Descriptor fingerprints show up in logs and command output. Certificate
//! fingerprints name the SSL certificates a load balancer owns, so a rotated
//! certificate always gets a new resource.

use sha2::{Digest, Sha256};

use crate::loadbalancer::{RuntimeInfo, TlsCert};

use super::spec::PoolConfig;

/// Length of a short hash.
pub const SHORT_HASH_LEN: usize = 8;

/// Hasher for computing configuration fingerprints.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new configuration hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the whole configuration.
    #[must_use]
    pub fn hash_config(&self, config: &PoolConfig) -> String {
        let mut hasher = Sha256::new();

        update_field(&mut hasher, config.cluster.uid.as_bytes());

        // Load balancers sorted by name for determinism
        let mut load_balancers: Vec<_> = config.load_balancers.iter().collect();
        load_balancers.sort_by(|a, b| a.name.cmp(&b.name));
        for lb in load_balancers {
            update_field(&mut hasher, self.hash_runtime_info(lb).as_bytes());
        }

        // Certificates sorted for determinism
        let mut certificates: Vec<_> = config.certificates.iter().collect();
        certificates.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in certificates {
            update_field(&mut hasher, key.as_bytes());
            update_field(&mut hasher, value.as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a hash of one desired state.
    ///
    /// Two descriptors that compare equal always hash equal.
    #[must_use]
    pub fn hash_runtime_info(&self, ri: &RuntimeInfo) -> String {
        let mut hasher = Sha256::new();

        update_field(&mut hasher, ri.name.as_bytes());
        for upstream in &ri.upstreams {
            update_field(&mut hasher, upstream.kind.as_bytes());
            update_field(&mut hasher, upstream.namespace.as_bytes());
            update_field(&mut hasher, upstream.name.as_bytes());
        }
        hasher.update([u8::from(ri.allow_http)]);
        update_field(&mut hasher, ri.static_ip.as_deref().unwrap_or_default().as_bytes());

        // Certificates keep their order: it is the order on the proxy
        for tls in &ri.tls {
            update_field(&mut hasher, self.hash_certificate(tls).as_bytes());
        }
        for cert in &ri.pre_shared_certs {
            update_field(&mut hasher, cert.as_bytes());
        }
        for cert in &ri.managed_certs {
            update_field(&mut hasher, cert.as_bytes());
        }

        update_field(
            &mut hasher,
            ri.url_map.default_backend.as_deref().unwrap_or_default().as_bytes(),
        );
        for rule in &ri.url_map.host_rules {
            update_field(&mut hasher, rule.host.as_bytes());
            for path in &rule.paths {
                update_field(&mut hasher, path.path.as_bytes());
                update_field(&mut hasher, path.backend.as_bytes());
            }
        }

        update_field(&mut hasher, ri.api_version.to_string().as_bytes());

        hex::encode(hasher.finalize())
    }

    /// Computes a hash of a certificate and key pair.
    #[must_use]
    pub fn hash_certificate(&self, tls: &TlsCert) -> String {
        let mut hasher = Sha256::new();
        update_field(&mut hasher, tls.cert.as_bytes());
        update_field(&mut hasher, tls.key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Computes a short hash for names and display.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(SHORT_HASH_LEN).collect()
    }
}

/// Feeds one field, length first, so adjacent fields cannot run together.
fn update_field(hasher: &mut Sha256, field: &[u8]) {
    let len = u64::try_from(field.len()).unwrap_or(u64::MAX);
    hasher.update(len.to_be_bytes());
    hasher.update(field);
}
