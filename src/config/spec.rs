//! Configuration specification types for the load balancer pool.
//!
//! This module defines the structs that map to the `l7pool.yaml` file. The
//! `load_balancers` list is the full, authoritative desired state: anything
//! tracked but absent from it is garbage-collected.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::loadbalancer::RuntimeInfo;
use crate::pool::GcStrategy;

/// Default interval between reconcile passes, in seconds.
const DEFAULT_INTERVAL_SECS: u64 = 30;

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    /// Cluster identity.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Cloud backend configuration.
    #[serde(default)]
    pub cloud: CloudConfig,
    /// Garbage collection behavior.
    #[serde(default)]
    pub gc: GcConfig,
    /// Provisioned managed certificates, keyed by `namespace/name`.
    #[serde(default)]
    pub certificates: HashMap<String, String>,
    /// Desired load balancers.
    #[serde(default)]
    pub load_balancers: Vec<RuntimeInfo>,
}

/// Cluster identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Uid appended to every load balancer name.
    #[serde(default)]
    pub uid: String,
}

/// Cloud backend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudConfig {
    /// Path of the cloud file (defaults to `.l7pool/cloud.json` next to the config).
    #[serde(default)]
    pub path: Option<String>,
}

/// Garbage collection configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GcConfig {
    /// What a pass does after a failed delete.
    #[serde(default)]
    pub strategy: GcStrategy,
    /// Seconds between reconcile passes in `run` mode.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

const fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            strategy: GcStrategy::default(),
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl PoolConfig {
    /// Names of every desired load balancer, as written in the file.
    #[must_use]
    pub fn desired_names(&self) -> Vec<String> {
        self.load_balancers.iter().map(|lb| lb.name.clone()).collect()
    }

    /// Gets a desired load balancer by its name as written in the file.
    #[must_use]
    pub fn get_load_balancer(&self, name: &str) -> Option<&RuntimeInfo> {
        self.load_balancers.iter().find(|lb| lb.name == name)
    }
}
