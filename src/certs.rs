//! Managed certificate lookup.
//!
//! Managed certificates are provisioned outside the pool. Once provisioned
//! they are available as an SSL certificate resource; until then the lookup
//! returns `None` and the HTTPS frontend is built without them.

use std::collections::HashMap;

/// Resolves managed certificates to SSL certificate resource names.
pub trait CertificateLookup: Send + Sync {
    /// Returns the provisioned SSL certificate name for managed certificate
    /// `name` in `namespace`, or `None` while it is not provisioned.
    fn lookup(&self, namespace: &str, name: &str) -> Option<String>;
}

/// Lookup backed by a fixed `namespace/name -> certificate` map.
#[derive(Debug, Clone, Default)]
pub struct StaticCertificates {
    certificates: HashMap<String, String>,
}

impl StaticCertificates {
    /// Creates a lookup from `namespace/name` keys.
    #[must_use]
    pub const fn new(certificates: HashMap<String, String>) -> Self {
        Self { certificates }
    }
}

impl CertificateLookup for StaticCertificates {
    fn lookup(&self, namespace: &str, name: &str) -> Option<String> {
        self.certificates.get(&format!("{namespace}/{name}")).cloned()
    }
}
