//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::cloud::{CloudResource, LockInfo};
use crate::config::{PoolConfig, ValidationResult};
use crate::controller::ReconciliationResult;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Cloud resource row for table display.
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "API")]
    version: String,
    #[tabled(rename = "Target")]
    target: String,
}

/// Load balancer row for validation summaries.
#[derive(Tabled)]
struct LoadBalancerRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "HTTP")]
    http: String,
    #[tabled(rename = "Certificates")]
    certificates: usize,
    #[tabled(rename = "Backends")]
    backends: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a reconciliation result.
    #[must_use]
    pub fn format_reconciliation(&self, result: &ReconciliationResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text => {
                let status = if result.success {
                    format!("{} Reconciliation successful", "✓".green())
                } else {
                    format!("{} Reconciliation failed", "✗".red())
                };

                let mut output = format!("{status}\n\n");
                let _ = writeln!(
                    output,
                    "   Config hash: {}",
                    Self::truncate(&result.config_hash, 8)
                );
                let _ = writeln!(output, "   Synced: {}", result.synced.to_string().green());
                let _ = writeln!(output, "   Failed: {}", result.failed.to_string().red());
                let _ = writeln!(output, "   Collected: {}", result.collected);
                let _ = writeln!(output, "   Tracked: {}", result.tracked);

                if !result.errors.is_empty() {
                    let _ = write!(output, "\n{} Errors:\n", "⚠".yellow());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                }

                output
            }
        }
    }

    /// Formats the resources of the cloud backend.
    #[must_use]
    pub fn format_status(&self, resources: &[CloudResource], lock: Option<&LockInfo>) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&StatusJson::new(resources, lock))
                .unwrap_or_default(),
            OutputFormat::Text => Self::format_status_text(resources, lock),
        }
    }

    /// Formats status as text.
    fn format_status_text(resources: &[CloudResource], lock: Option<&LockInfo>) -> String {
        let mut output = String::from("\n☁ Cloud resources\n\n");

        if resources.is_empty() {
            output.push_str("   No resources.\n");
        } else {
            let rows: Vec<ResourceRow> = resources
                .iter()
                .map(|r| ResourceRow {
                    kind: r.kind.to_string(),
                    name: r.name.clone(),
                    version: r.version.to_string(),
                    target: Self::target_of(r),
                })
                .collect();

            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        match lock {
            Some(lock) if !lock.is_expired() => {
                let _ = write!(
                    output,
                    "\n{} Locked by {} until {}\n",
                    "🔒".yellow(),
                    lock.holder,
                    lock.expires_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            _ => output.push_str("\nNot locked.\n"),
        }

        output
    }

    /// Formats a validation summary.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &PoolConfig,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "load_balancers": config.desired_names(),
                    "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid!\n", "✓".green())
                } else {
                    let mut output = format!("{} Configuration is invalid:\n", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                    output
                };

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output.push_str("\nConfiguration summary:\n");
                let _ = writeln!(output, "   Cluster uid: {}", config.cluster.uid);
                let _ = writeln!(output, "   GC strategy: {:?}", config.gc.strategy);
                let _ = writeln!(output, "   Load balancers: {}", config.load_balancers.len());

                if !config.load_balancers.is_empty() {
                    let rows: Vec<LoadBalancerRow> = config
                        .load_balancers
                        .iter()
                        .map(|lb| LoadBalancerRow {
                            name: lb.name.clone(),
                            http: if lb.allow_http { "yes" } else { "no" }.to_string(),
                            certificates: lb.tls.len()
                                + lb.pre_shared_certs.len()
                                + lb.managed_certs.len(),
                            backends: Self::truncate(&lb.url_map.backends().join(", "), 40),
                        })
                        .collect();
                    output.push('\n');
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                output
            }
        }
    }

    /// Formats the summary printed when the controller stops.
    #[must_use]
    pub fn format_stopped(&self, passes: u64, tracked: usize) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "status": "stopped",
                    "passes": passes,
                    "tracked": tracked,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!(
                "{} Controller stopped after {passes} pass(es), {tracked} load balancer(s) left in place",
                "✓".green()
            ),
        }
    }

    /// What a resource points at, for display.
    fn target_of(resource: &CloudResource) -> String {
        ["target", "url_map", "default_backend"]
            .iter()
            .find_map(|key| resource.spec.get(*key).and_then(|v| v.as_str()))
            .map_or_else(|| String::from("-"), |t| Self::truncate(t, 40))
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}

// JSON serialization helpers

/// Spec fields never printed.
const SECRET_FIELDS: [&str; 1] = ["private_key"];

#[derive(serde::Serialize)]
struct StatusJson<'a> {
    total_resources: usize,
    resources: Vec<CloudResource>,
    lock: Option<&'a LockInfo>,
}

impl<'a> StatusJson<'a> {
    fn new(resources: &[CloudResource], lock: Option<&'a LockInfo>) -> Self {
        Self {
            total_resources: resources.len(),
            resources: resources.iter().map(redacted).collect(),
            lock,
        }
    }
}

fn redacted(resource: &CloudResource) -> CloudResource {
    let mut resource = resource.clone();
    if let Some(spec) = resource.spec.as_object_mut() {
        for field in SECRET_FIELDS {
            if let Some(value) = spec.get_mut(field) {
                *value = serde_json::Value::from("<redacted>");
            }
        }
    }
    resource
}
