//! Desired state of one load balancer.
//!
//! A [`RuntimeInfo`] is handed to the pool on every sync. It is compared with
//! the previously applied value through `PartialEq`, so every field takes part
//! in change detection.

use serde::{Deserialize, Serialize};

use crate::cloud::ApiVersion;

/// Namespace used for events when a descriptor has no upstream objects.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Desired state of a load balancer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeInfo {
    /// Logical name, canonicalized by the pool's namer.
    pub name: String,
    /// Objects this load balancer is built for.
    #[serde(default)]
    pub upstreams: Vec<ObjectRef>,
    /// Serve plain HTTP on port 80.
    #[serde(default = "default_allow_http")]
    pub allow_http: bool,
    /// Reserved address for the forwarding rules.
    #[serde(default)]
    pub static_ip: Option<String>,
    /// Inline certificate and key pairs.
    #[serde(default)]
    pub tls: Vec<TlsCert>,
    /// Names of SSL certificates that already exist in the cloud.
    #[serde(default)]
    pub pre_shared_certs: Vec<String>,
    /// Names of managed certificates, resolved through the certificate lookup.
    #[serde(default)]
    pub managed_certs: Vec<String>,
    /// Routing table.
    pub url_map: UrlMap,
    /// API track used for every call on this load balancer.
    #[serde(default)]
    pub api_version: ApiVersion,
}

/// Reference to an upstream object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectRef {
    /// Object kind, e.g. `Ingress`.
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Object namespace.
    pub namespace: String,
    /// Object name.
    pub name: String,
}

/// Certificate and private key in PEM form.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TlsCert {
    /// Certificate chain.
    pub cert: String,
    /// Private key.
    pub key: String,
}

/// Host and path routing table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UrlMap {
    /// Backend for requests no rule matches.
    #[serde(default)]
    pub default_backend: Option<String>,
    /// Per-host rules.
    #[serde(default)]
    pub host_rules: Vec<HostRule>,
}

/// Rules for one host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostRule {
    /// Host name, possibly wildcarded.
    pub host: String,
    /// Path rules, matched in order.
    #[serde(default)]
    pub paths: Vec<PathRule>,
}

/// Path to backend mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathRule {
    /// Path pattern, starting with `/`.
    pub path: String,
    /// Backend service name.
    pub backend: String,
}

const fn default_allow_http() -> bool {
    true
}

fn default_kind() -> String {
    String::from("Ingress")
}

impl RuntimeInfo {
    /// Creates a descriptor with HTTP enabled and the given default backend.
    #[must_use]
    pub fn new(name: impl Into<String>, default_backend: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            upstreams: Vec::new(),
            allow_http: true,
            static_ip: None,
            tls: Vec::new(),
            pre_shared_certs: Vec::new(),
            managed_certs: Vec::new(),
            url_map: UrlMap {
                default_backend: Some(default_backend.into()),
                host_rules: Vec::new(),
            },
            api_version: ApiVersion::Ga,
        }
    }

    /// Namespace events for this load balancer are reported under.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.upstreams
            .first()
            .map_or(DEFAULT_NAMESPACE, |o| o.namespace.as_str())
    }

    /// Returns true if any certificate source is configured.
    #[must_use]
    pub fn wants_https(&self) -> bool {
        !self.tls.is_empty() || !self.pre_shared_certs.is_empty() || !self.managed_certs.is_empty()
    }
}

impl UrlMap {
    /// Returns true if the map routes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.default_backend.is_none() && self.host_rules.is_empty()
    }

    /// Every backend referenced by the map, sorted and deduplicated.
    #[must_use]
    pub fn backends(&self) -> Vec<&str> {
        let mut backends: Vec<&str> = self
            .default_backend
            .iter()
            .map(String::as_str)
            .chain(
                self.host_rules
                    .iter()
                    .flat_map(|h| h.paths.iter().map(|p| p.backend.as_str())),
            )
            .collect();
        backends.sort_unstable();
        backends.dedup();
        backends
    }
}

impl std::fmt::Debug for TlsCert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsCert")
            .field("cert", &format_args!("<{} bytes>", self.cert.len()))
            .field("key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_defaults() {
        let mut ri = RuntimeInfo::new("web", "be-1");
        assert_eq!(ri.namespace(), DEFAULT_NAMESPACE);

        ri.upstreams.push(ObjectRef {
            kind: String::from("Ingress"),
            namespace: String::from("shop"),
            name: String::from("web"),
        });
        assert_eq!(ri.namespace(), "shop");
    }

    #[test]
    fn test_structural_equality_covers_nested_fields() {
        let a = RuntimeInfo::new("web", "be-1");
        let mut b = a.clone();
        assert_eq!(a, b);

        b.url_map.host_rules.push(HostRule {
            host: String::from("shop.example.com"),
            paths: vec![PathRule {
                path: String::from("/api/*"),
                backend: String::from("be-2"),
            }],
        });
        assert_ne!(a, b);
    }

    #[test]
    fn test_backends_are_deduplicated() {
        let mut ri = RuntimeInfo::new("web", "be-1");
        ri.url_map.host_rules.push(HostRule {
            host: String::from("a.example.com"),
            paths: vec![
                PathRule {
                    path: String::from("/"),
                    backend: String::from("be-1"),
                },
                PathRule {
                    path: String::from("/b"),
                    backend: String::from("be-0"),
                },
            ],
        });
        assert_eq!(ri.url_map.backends(), vec!["be-0", "be-1"]);
    }

    #[test]
    fn test_tls_debug_redacts_key() {
        let cert = TlsCert {
            cert: String::from("CERT"),
            key: String::from("SECRET"),
        };
        let rendered = format!("{cert:?}");
        assert!(!rendered.contains("SECRET"));
    }
}
