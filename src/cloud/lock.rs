//! Cloud file locking.
//!
//! A controller holds a lease on the cloud file for as long as it drives it,
//! so two controllers never converge and garbage-collect the same resources
//! at once. The lease lives in a lock file next to the cloud file and names
//! the cloud file it guards. [`check_write`] is consulted before every write.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CloudError, CloudResult};

/// How long a lease stays valid without being extended, in seconds.
pub const LOCK_TTL_SECS: i64 = 300;

/// How often a holder extends its lease.
pub const LOCK_REFRESH_INTERVAL: Duration = Duration::from_secs(LOCK_TTL_SECS.unsigned_abs() / 3);

/// A lease on one cloud file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Identifier of this lease.
    pub lock_id: String,
    /// Controller process holding the lease.
    pub holder: String,
    /// File name of the cloud file the lease guards.
    pub cloud_file: String,
    /// When the lease was taken.
    pub acquired_at: DateTime<Utc>,
    /// When the lease lapses unless extended.
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Takes a fresh lease on `cloud_file` for `holder`.
    #[must_use]
    pub fn acquire(holder: impl Into<String>, cloud_file: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.into(),
            cloud_file: cloud_file.into(),
            acquired_at: now,
            expires_at: now + chrono::Duration::seconds(LOCK_TTL_SECS),
        }
    }

    /// Returns true once the lease has lapsed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Returns true if the lease is live and guards `cloud_file`.
    #[must_use]
    pub fn guards(&self, cloud_file: &str) -> bool {
        !self.is_expired() && self.cloud_file == cloud_file
    }

    /// Extends the lease by a full TTL from now.
    pub fn extend(&mut self) {
        self.expires_at = Utc::now() + chrono::Duration::seconds(LOCK_TTL_SECS);
    }

    /// The error reported to anyone else who wants the cloud file.
    #[must_use]
    pub fn conflict(&self) -> CloudError {
        CloudError::LockedByOther {
            holder: self.holder.clone(),
            since: self.acquired_at.to_rfc3339(),
        }
    }
}

/// Decides whether this process may write `cloud_file`.
///
/// `current` is the lease found in the lock file and `held` the id of the
/// lease this process acquired, if any. A write is refused while someone
/// else holds a live lease on the file, and once a lease this process held
/// has lapsed or been taken over. Without any lease the write goes through.
///
/// # Errors
///
/// Returns `CloudError::LockedByOther` or `CloudError::LockLost`.
pub fn check_write(
    current: Option<&LockInfo>,
    held: Option<&str>,
    cloud_file: &str,
) -> CloudResult<()> {
    match (current.filter(|lock| lock.guards(cloud_file)), held) {
        (Some(lock), Some(id)) if lock.lock_id == id => Ok(()),
        (Some(lock), _) => Err(lock.conflict()),
        (None, Some(id)) => Err(CloudError::LockLost {
            lock_id: id.to_string(),
        }),
        (None, None) => Ok(()),
    }
}

/// Identifies this controller process in lock files.
#[must_use]
pub fn generate_holder_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| String::from("unknown"));
    let nonce = Uuid::new_v4().simple().to_string();

    format!("l7pool@{host}:{}/{}", std::process::id(), &nonce[..8])
}
