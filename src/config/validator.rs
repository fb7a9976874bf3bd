//! Configuration validation for the desired-state file.
//!
//! Catches descriptors the pool could never converge before any cloud call is
//! made, and name collisions that would make two load balancers share one
//! store entry.

use crate::error::{ConfigError, L7PoolError, Result};
use crate::loadbalancer::RuntimeInfo;
use crate::naming::{ClusterNamer, Namer};
use std::collections::HashMap;
use tracing::debug;

use super::spec::PoolConfig;

/// Validator for pool configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a pool configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any was found.
    pub fn validate(&self, config: &PoolConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        match result.errors.first() {
            None => {
                debug!("Configuration validation passed");
                Ok(result)
            }
            Some(first_error) => Err(L7PoolError::Config(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            ))),
        }
    }

    /// Collects every error and warning without failing.
    #[must_use]
    pub fn check(&self, config: &PoolConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_cluster(config, &mut result);
        Self::validate_gc(config, &mut result);
        Self::validate_load_balancers(config, &mut result);

        result
    }

    fn validate_cluster(config: &PoolConfig, result: &mut ValidationResult) {
        let uid = &config.cluster.uid;
        if uid.is_empty() {
            result.warnings.push(String::from(
                "cluster.uid is empty; load balancer names are not scoped to a cluster",
            ));
        } else if !uid.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
            result.errors.push(ValidationError {
                field: String::from("cluster.uid"),
                message: format!("Cluster uid '{uid}' must be lowercase alphanumeric"),
            });
        }
    }

    fn validate_gc(config: &PoolConfig, result: &mut ValidationResult) {
        if config.gc.interval_secs == 0 {
            result.errors.push(ValidationError {
                field: String::from("gc.interval_secs"),
                message: String::from("Reconcile interval must be at least 1 second"),
            });
        }
    }

    fn validate_load_balancers(config: &PoolConfig, result: &mut ValidationResult) {
        if config.load_balancers.is_empty() {
            result.warnings.push(String::from(
                "No load balancers defined; every tracked load balancer will be garbage-collected",
            ));
            return;
        }

        let namer = ClusterNamer::new(config.cluster.uid.clone());
        let mut canonical: HashMap<String, &str> = HashMap::new();

        for (i, lb) in config.load_balancers.iter().enumerate() {
            let prefix = format!("load_balancers[{i}]");

            if is_valid_name(&lb.name) {
                if let Some(other) = canonical.insert(namer.load_balancer(&lb.name), &lb.name) {
                    result.errors.push(ValidationError {
                        field: format!("{prefix}.name"),
                        message: format!(
                            "Load balancer '{}' collides with '{other}' after canonicalization",
                            lb.name
                        ),
                    });
                }
            } else {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!(
                        "Load balancer name '{}' is invalid. Must be lowercase alphanumeric with hyphens, optionally namespaced with '/'.",
                        lb.name
                    ),
                });
            }

            Self::validate_frontends(lb, &prefix, result);
            Self::validate_url_map(lb, &prefix, result);
        }
    }

    fn validate_frontends(lb: &RuntimeInfo, prefix: &str, result: &mut ValidationResult) {
        if !lb.allow_http && !lb.wants_https() {
            result.errors.push(ValidationError {
                field: format!("{prefix}.allow_http"),
                message: format!(
                    "Load balancer '{}' disables HTTP and configures no certificate",
                    lb.name
                ),
            });
        }

        if !lb.managed_certs.is_empty() && lb.tls.is_empty() && lb.pre_shared_certs.is_empty() {
            result.warnings.push(format!(
                "{prefix}: HTTPS for '{}' depends only on managed certificates and stays off until one is provisioned",
                lb.name
            ));
        }

        for (j, tls) in lb.tls.iter().enumerate() {
            if tls.cert.trim().is_empty() || tls.key.trim().is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.tls[{j}]"),
                    message: String::from("Certificate and key must both be set"),
                });
            }
        }
    }

    fn validate_url_map(lb: &RuntimeInfo, prefix: &str, result: &mut ValidationResult) {
        if lb.url_map.is_empty() {
            result.errors.push(ValidationError {
                field: format!("{prefix}.url_map"),
                message: format!("URL map of '{}' routes no traffic", lb.name),
            });
            return;
        }

        if lb.url_map.backends().iter().any(|b| b.trim().is_empty()) {
            result.errors.push(ValidationError {
                field: format!("{prefix}.url_map"),
                message: String::from("Backend names cannot be empty"),
            });
        }

        if lb.url_map.default_backend.is_none() {
            result.warnings.push(format!(
                "{prefix}: '{}' has no default backend; unmatched requests get the cloud default",
                lb.name
            ));
        }

        for (h, rule) in lb.url_map.host_rules.iter().enumerate() {
            if rule.host.is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.url_map.host_rules[{h}].host"),
                    message: String::from("Host cannot be empty"),
                });
            }
            for (p, path) in rule.paths.iter().enumerate() {
                if !path.path.starts_with('/') {
                    result.errors.push(ValidationError {
                        field: format!("{prefix}.url_map.host_rules[{h}].paths[{p}].path"),
                        message: format!("Path '{}' must start with '/'", path.path),
                    });
                }
            }
        }
    }
}

/// Names are lowercase alphanumeric with single hyphens, optionally
/// prefixed with a namespace of the same form and a `/`.
fn is_valid_name(name: &str) -> bool {
    match name.split_once('/') {
        Some((namespace, rest)) => is_valid_segment(namespace) && is_valid_segment(rest),
        None => is_valid_segment(name),
    }
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !segment.ends_with('-') && !segment.contains("--")
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
