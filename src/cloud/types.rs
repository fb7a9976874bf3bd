//! Cloud resource types.
//!
//! A logical load balancer is a graph of these resources; every one of them is
//! addressed by kind and name.

use serde::{Deserialize, Serialize};

/// API track a call is issued against.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    /// Stable API.
    #[default]
    Ga,
    /// Beta API.
    Beta,
    /// Experimental API.
    Alpha,
}

/// Kinds of cloud resources that make up one load balancer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Host and path routing table.
    UrlMap,
    /// Plain HTTP proxy in front of a URL map.
    TargetHttpProxy,
    /// TLS terminating proxy in front of a URL map.
    TargetHttpsProxy,
    /// Certificate attached to an HTTPS proxy.
    SslCertificate,
    /// Port 80 entry point.
    HttpForwardingRule,
    /// Port 443 entry point.
    HttpsForwardingRule,
}

/// A single cloud resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudResource {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Resource name, unique per kind.
    pub name: String,
    /// API track the resource was last written with.
    pub version: ApiVersion,
    /// Kind-specific body.
    pub spec: serde_json::Value,
}

impl ResourceKind {
    /// All kinds, in teardown order (entry points first, URL map last).
    pub const TEARDOWN_ORDER: [Self; 6] = [
        Self::HttpsForwardingRule,
        Self::HttpForwardingRule,
        Self::TargetHttpsProxy,
        Self::TargetHttpProxy,
        Self::SslCertificate,
        Self::UrlMap,
    ];

    /// Short prefix used when deriving resource names.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::UrlMap => "um",
            Self::TargetHttpProxy => "tp",
            Self::TargetHttpsProxy => "tps",
            Self::SslCertificate => "ssl",
            Self::HttpForwardingRule => "fw",
            Self::HttpsForwardingRule => "fws",
        }
    }
}

impl CloudResource {
    /// Creates a new resource.
    #[must_use]
    pub fn new(
        kind: ResourceKind,
        name: impl Into<String>,
        version: ApiVersion,
        spec: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            version,
            spec,
        }
    }

    /// Key used by backends to index the resource.
    #[must_use]
    pub fn key(&self) -> (ResourceKind, String) {
        (self.kind, self.name.clone())
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let version = match self {
            Self::Ga => "ga",
            Self::Beta => "beta",
            Self::Alpha => "alpha",
        };
        write!(f, "{version}")
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::UrlMap => "UrlMap",
            Self::TargetHttpProxy => "TargetHttpProxy",
            Self::TargetHttpsProxy => "TargetHttpsProxy",
            Self::SslCertificate => "SslCertificate",
            Self::HttpForwardingRule => "ForwardingRule(http)",
            Self::HttpsForwardingRule => "ForwardingRule(https)",
        };
        write!(f, "{kind}")
    }
}
