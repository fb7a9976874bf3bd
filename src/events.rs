//! Lifecycle events for load balancers.
//!
//! The pool reports every lifecycle transition to an [`EventRecorder`].
//! Recording is best effort: a recorder failure is logged and reconciliation
//! carries on.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;

/// Kind of lifecycle transition.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The pool started tracking a name.
    Created,
    /// The desired state of a tracked name was replaced.
    Changed,
    /// Convergence succeeded.
    Converged,
    /// Convergence failed; the name stays tracked.
    ConvergeFailed,
    /// Cleanup succeeded and the name is no longer tracked.
    Deleted,
    /// Cleanup failed; the name stays tracked.
    CleanupFailed,
}

/// A single lifecycle notification.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    /// Namespace of the upstream object that owns the load balancer.
    pub namespace: String,
    /// Canonical load balancer name.
    pub name: String,
    /// What happened.
    pub kind: EventKind,
    /// Human-readable detail.
    pub message: String,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

/// Receives lifecycle notifications.
#[cfg_attr(test, mockall::automock)]
pub trait EventRecorder: Send + Sync {
    /// Records one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be delivered. Callers log the
    /// failure and continue.
    fn record(&self, event: &LifecycleEvent) -> Result<()>;
}

/// Recorder that writes events to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl EventKind {
    /// Returns true for transitions that need attention.
    #[must_use]
    pub const fn is_warning(self) -> bool {
        matches!(self, Self::ConvergeFailed | Self::CleanupFailed)
    }
}

impl LifecycleEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        kind: EventKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

impl EventRecorder for TracingRecorder {
    fn record(&self, event: &LifecycleEvent) -> Result<()> {
        if event.kind.is_warning() {
            warn!(
                namespace = %event.namespace,
                load_balancer = %event.name,
                reason = %event.kind,
                "{}",
                event.message
            );
        } else {
            info!(
                namespace = %event.namespace,
                load_balancer = %event.name,
                reason = %event.kind,
                "{}",
                event.message
            );
        }
        Ok(())
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Created => "Created",
            Self::Changed => "Changed",
            Self::Converged => "Converged",
            Self::ConvergeFailed => "ConvergeFailed",
            Self::Deleted => "Deleted",
            Self::CleanupFailed => "CleanupFailed",
        };
        write!(f, "{kind}")
    }
}
