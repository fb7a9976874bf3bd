//! Naming of load balancers and their cloud resources.
//!
//! The pool keys its store by the canonical name returned from
//! [`Namer::load_balancer`]. Cloud resource names are derived from that
//! canonical name.

use crate::cloud::ResourceKind;

/// Maps user-facing identifiers to canonical names.
pub trait Namer: Send + Sync {
    /// Returns the canonical load balancer name for `key`.
    ///
    /// Must be deterministic and idempotent: canonicalizing a canonical name
    /// returns it unchanged.
    fn load_balancer(&self, key: &str) -> String;

    /// Returns the name of the `kind` resource owned by load balancer `lb`.
    fn resource(&self, kind: ResourceKind, lb: &str) -> String {
        format!("k8s-{}-{lb}", kind.prefix())
    }

    /// Prefix shared by every SSL certificate owned by `lb`.
    fn ssl_certificate_prefix(&self, lb: &str) -> String {
        format!("{}-", self.resource(ResourceKind::SslCertificate, lb))
    }

    /// Returns the name of the owned SSL certificate with content hash `hash`.
    fn ssl_certificate(&self, lb: &str, hash: &str) -> String {
        format!("{}{hash}", self.ssl_certificate_prefix(lb))
    }
}

/// Separator between the scrubbed key and the cluster uid.
const CLUSTER_DELIMITER: &str = "--";

/// Namer that scopes load balancer names to one cluster.
#[derive(Debug, Clone, Default)]
pub struct ClusterNamer {
    uid: String,
}

impl ClusterNamer {
    /// Creates a namer for the cluster with the given uid.
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }

    /// The cluster uid.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }
}

impl Namer for ClusterNamer {
    fn load_balancer(&self, key: &str) -> String {
        let scrubbed = key.replace('/', "-");
        if self.uid.is_empty() {
            return scrubbed;
        }
        let suffix = format!("{CLUSTER_DELIMITER}{}", self.uid);
        if scrubbed.ends_with(&suffix) {
            scrubbed
        } else {
            format!("{scrubbed}{suffix}")
        }
    }
}
