//! Configuration module for the load balancer pool.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `l7pool.yaml`
//! - Validation of configuration values
//! - Computing fingerprints of desired states and certificates

mod spec;
mod parser;
mod validator;
mod hash;

pub use spec::{ClusterConfig, CloudConfig, GcConfig, PoolConfig};
pub use parser::{find_config_file, ConfigParser, DEFAULT_CONFIG_FILES};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
pub use hash::{ConfigHasher, SHORT_HASH_LEN};
