//! Error types for the L7 load balancer pool.
//!
//! This module provides the error hierarchy for every stage of the
//! load balancer lifecycle: configuration, cloud calls, and pool
//! reconciliation (sync, delete, garbage collection).

use std::path::PathBuf;
use thiserror::Error;

use crate::cloud::ResourceKind;

/// The main error type for the load balancer pool.
#[derive(Debug, Error)]
pub enum L7PoolError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cloud API errors raised outside of a pool operation.
    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),

    /// Pool reconciliation errors.
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Two load balancers resolve to the same canonical name.
    #[error("Duplicate load balancer name: {name}")]
    DuplicateName {
        /// The duplicated name.
        name: String,
    },
}

/// Errors returned by a cloud backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloudError {
    /// The resource does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Kind of the missing resource.
        kind: ResourceKind,
        /// Name of the missing resource.
        name: String,
    },

    /// A create was issued for a resource that already exists.
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// Kind of the conflicting resource.
        kind: ResourceKind,
        /// Name of the conflicting resource.
        name: String,
    },

    /// The project ran out of quota for a resource kind.
    #[error("Quota exceeded for {kind}: {message}")]
    QuotaExceeded {
        /// Kind of resource that hit the quota.
        kind: ResourceKind,
        /// Description from the backend.
        message: String,
    },

    /// The backend is temporarily unavailable.
    #[error("Cloud backend unavailable: {message}")]
    Unavailable {
        /// Description of the outage.
        message: String,
    },

    /// The requested resource cannot be built from the descriptor.
    #[error("Invalid resource: {message}")]
    InvalidResource {
        /// Description of the problem.
        message: String,
    },

    /// The persistent backend failed to read or write its storage.
    #[error("Cloud storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// The cloud file is locked by another controller.
    #[error("Cloud file is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// This process held the lock on the cloud file and no longer does.
    #[error("Lock {lock_id} on the cloud file lapsed or was taken over")]
    LockLost {
        /// Identifier of the lost lock.
        lock_id: String,
    },
}

/// Pool reconciliation errors.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The name is not tracked by the pool.
    #[error("Load balancer {name} not in pool")]
    NotFound {
        /// Canonical name that was looked up.
        name: String,
    },

    /// Applying the desired state failed, possibly after creating some resources.
    #[error("Failed to converge load balancer '{name}': {source}")]
    ConvergenceFailed {
        /// Canonical name of the load balancer.
        name: String,
        /// Cloud error that stopped convergence.
        #[source]
        source: CloudError,
    },

    /// Tearing down the remote resources failed.
    #[error("Failed to clean up load balancer '{name}': {source}")]
    CleanupFailed {
        /// Canonical name of the load balancer.
        name: String,
        /// Cloud error that stopped cleanup.
        #[source]
        source: CloudError,
    },

    /// A garbage collection pass could not delete every orphan.
    #[error("Garbage collection left {} orphaned load balancer(s): {}", failures.len(), failures.join("; "))]
    GcIncomplete {
        /// One entry per failed delete, formatted as `name: reason`.
        failures: Vec<String>,
    },
}

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, L7PoolError>;

/// Result type alias for cloud backend calls.
pub type CloudResult<T> = std::result::Result<T, CloudError>;

impl L7PoolError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error means the name is not tracked.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Pool(PoolError::NotFound { .. }))
    }

    /// Returns true if the next reconcile pass is likely to succeed without intervention.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Cloud(err)
            | Self::Pool(
                PoolError::ConvergenceFailed { source: err, .. }
                | PoolError::CleanupFailed { source: err, .. },
            ) => err.is_retryable(),
            Self::Pool(PoolError::GcIncomplete { .. }) => true,
            _ => false,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl CloudError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates a storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates an invalid-resource error with the given message.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    /// Returns true if the resource was already absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this error is transient.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::QuotaExceeded { .. } | Self::Unavailable { .. } | Self::LockedByOther { .. }
        )
    }
}

impl PoolError {
    /// Creates a not-found error for a canonical name.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }
}
