//! File-based cloud backend.
//!
//! Persists the resource table as JSON so resources created by one `l7pool`
//! run are visible to the next. Every mutating call rewrites the file through
//! a temporary file and an atomic rename, after checking the lock file: a
//! process that took the lock writes alone, and a process that lost it stops
//! writing.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::{CloudError, CloudResult};

use super::lock::{check_write, generate_holder_id, LockInfo, LOCK_TTL_SECS};
use super::provider::Cloud;
use super::table::ResourceTable;
use super::types::{ApiVersion, CloudResource, ResourceKind};

/// Current version of the cloud file format.
pub const CLOUD_FILE_VERSION: &str = "1.0";

/// Default cloud file name.
const CLOUD_FILE: &str = "cloud.json";

/// Lock file name.
const LOCK_FILE: &str = "cloud.lock";

/// On-disk layout of the cloud file.
#[derive(Debug, Serialize, Deserialize)]
struct CloudFile {
    version: String,
    last_updated: DateTime<Utc>,
    resources: Vec<CloudResource>,
}

/// File-based cloud backend.
#[derive(Debug)]
pub struct FileCloud {
    /// Directory holding the cloud and lock files.
    base_dir: PathBuf,
    /// Path to the cloud file.
    cloud_path: PathBuf,
    /// File name of the cloud file, as recorded in locks.
    file_name: String,
    /// Path to the lock file.
    lock_path: PathBuf,
    /// Id of the lock this process acquired.
    held: RwLock<Option<String>>,
    /// Serializes read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl FileCloud {
    /// Creates a backend storing `cloud.json` inside `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let cloud_path = base_dir.join(CLOUD_FILE);
        Self::build(base_dir, cloud_path)
    }

    /// Creates a backend from an explicit cloud file path.
    #[must_use]
    pub fn with_path(cloud_path: impl Into<PathBuf>) -> Self {
        let cloud_path = cloud_path.into();
        let base_dir = cloud_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self::build(base_dir, cloud_path)
    }

    fn build(base_dir: PathBuf, cloud_path: PathBuf) -> Self {
        let lock_path = base_dir.join(LOCK_FILE);
        let file_name = cloud_path
            .file_name()
            .map_or_else(|| CLOUD_FILE.to_string(), |n| n.to_string_lossy().into_owned());
        Self {
            base_dir,
            cloud_path,
            file_name,
            lock_path,
            held: RwLock::new(None),
            guard: Mutex::new(()),
        }
    }

    /// Path to the cloud file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.cloud_path
    }

    /// Ensures the cloud directory exists.
    async fn ensure_dir(&self) -> CloudResult<()> {
        if !self.base_dir.exists() {
            debug!("Creating cloud directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir).await.map_err(|e| {
                CloudError::storage(format!("Failed to create cloud directory: {e}"))
            })?;
        }
        Ok(())
    }

    /// Loads the resource table. A missing file is an empty cloud.
    async fn load_table(&self) -> CloudResult<ResourceTable> {
        if !self.cloud_path.exists() {
            return Ok(ResourceTable::new());
        }

        let content = fs::read_to_string(&self.cloud_path)
            .await
            .map_err(|e| CloudError::storage(format!("Failed to read cloud file: {e}")))?;

        let file: CloudFile = serde_json::from_str(&content)
            .map_err(|e| CloudError::storage(format!("Failed to parse cloud file: {e}")))?;

        if file.version != CLOUD_FILE_VERSION {
            return Err(CloudError::storage(format!(
                "Cloud file version mismatch: expected {CLOUD_FILE_VERSION}, found {}",
                file.version
            )));
        }

        Ok(ResourceTable::from_resources(file.resources))
    }

    /// Writes the resource table atomically.
    async fn save_table(&self, table: &ResourceTable) -> CloudResult<()> {
        self.ensure_dir().await?;

        let file = CloudFile {
            version: CLOUD_FILE_VERSION.to_string(),
            last_updated: Utc::now(),
            resources: table.resources(),
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| CloudError::storage(format!("Failed to serialize cloud file: {e}")))?;

        Self::write_atomic(&self.cloud_path, content.as_bytes()).await?;
        debug!("Cloud file saved ({} resources)", table.len());
        Ok(())
    }

    async fn write_atomic(path: &Path, content: &[u8]) -> CloudResult<()> {
        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| CloudError::storage(format!("Failed to create temp file: {e}")))?;

        file.write_all(content)
            .await
            .map_err(|e| CloudError::storage(format!("Failed to write temp file: {e}")))?;

        file.sync_all()
            .await
            .map_err(|e| CloudError::storage(format!("Failed to sync temp file: {e}")))?;

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| CloudError::storage(format!("Failed to rename temp file: {e}")))
    }

    /// Runs a mutation against the stored table and persists the result.
    async fn mutate<F>(&self, op: F) -> CloudResult<()>
    where
        F: FnOnce(&mut ResourceTable) -> CloudResult<()> + Send,
    {
        let _guard = self.guard.lock().await;
        self.check_lock().await?;
        let mut table = self.load_table().await?;
        op(&mut table)?;
        self.save_table(&table).await
    }

    /// Reads the lock file if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file exists but cannot be read.
    pub async fn get_lock_info(&self) -> CloudResult<Option<LockInfo>> {
        if !self.lock_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.lock_path)
            .await
            .map_err(|e| CloudError::storage(format!("Failed to read lock file: {e}")))?;

        let lock_info = serde_json::from_str(&content)
            .map_err(|e| CloudError::storage(format!("Failed to parse lock file: {e}")))?;

        Ok(Some(lock_info))
    }

    /// Fails if the lock file forbids this process to write.
    async fn check_lock(&self) -> CloudResult<()> {
        let current = self.get_lock_info().await?;
        let held = self.held.read().await;
        check_write(current.as_ref(), held.as_deref(), &self.file_name)
    }

    async fn write_lock_file(&self, lock_info: &LockInfo) -> CloudResult<()> {
        self.ensure_dir().await?;
        let content = serde_json::to_string_pretty(lock_info)
            .map_err(|e| CloudError::storage(format!("Failed to serialize lock: {e}")))?;
        Self::write_atomic(&self.lock_path, content.as_bytes()).await
    }

    /// Acquires the lock on the cloud file.
    ///
    /// An empty `holder` is replaced by a generated process identifier.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::LockedByOther` if an unexpired lock is held.
    pub async fn acquire_lock(&self, holder: &str) -> CloudResult<LockInfo> {
        let _guard = self.guard.lock().await;
        if let Some(existing) = self.get_lock_info().await? {
            if !existing.is_expired() {
                return Err(existing.conflict());
            }
            debug!("Lock of {} lapsed, taking over", existing.holder);
        }

        let holder_id = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };

        let lock_info = LockInfo::acquire(holder_id, self.file_name.as_str());
        self.write_lock_file(&lock_info).await?;
        *self.held.write().await = Some(lock_info.lock_id.clone());

        info!(
            "Locked {} as {} (lapses after {}s without refresh)",
            self.file_name, lock_info.lock_id, LOCK_TTL_SECS
        );

        Ok(lock_info)
    }

    /// Extends a lock this process holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is gone or held under another id.
    pub async fn refresh_lock(&self, lock_id: &str) -> CloudResult<()> {
        let _guard = self.guard.lock().await;
        match self.get_lock_info().await? {
            Some(mut existing) if existing.lock_id == lock_id => {
                existing.extend();
                self.write_lock_file(&existing).await
            }
            Some(existing) => Err(existing.conflict()),
            None => Err(CloudError::LockLost {
                lock_id: lock_id.to_string(),
            }),
        }
    }

    /// Releases a lock. A lock held under another id is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be read or removed.
    pub async fn release_lock(&self, lock_id: &str) -> CloudResult<()> {
        let _guard = self.guard.lock().await;
        {
            let mut held = self.held.write().await;
            if held.as_deref() == Some(lock_id) {
                *held = None;
            }
        }
        if let Some(existing) = self.get_lock_info().await? {
            if existing.lock_id == lock_id {
                fs::remove_file(&self.lock_path)
                    .await
                    .map_err(|e| CloudError::storage(format!("Failed to delete lock file: {e}")))?;
                info!("Released cloud lock: {lock_id}");
            } else {
                debug!(
                    "Lock ID mismatch: expected {lock_id}, found {}",
                    existing.lock_id
                );
            }
        }
        Ok(())
    }

    /// Returns every stored resource, ordered by kind then name.
    ///
    /// # Errors
    ///
    /// Returns an error if the cloud file cannot be read.
    pub async fn resources(&self) -> CloudResult<Vec<CloudResource>> {
        let _guard = self.guard.lock().await;
        Ok(self.load_table().await?.resources())
    }
}

#[async_trait]
impl Cloud for FileCloud {
    async fn get(
        &self,
        _version: ApiVersion,
        kind: ResourceKind,
        name: &str,
    ) -> CloudResult<CloudResource> {
        let _guard = self.guard.lock().await;
        self.load_table().await?.get(kind, name)
    }

    async fn create(&self, version: ApiVersion, resource: &CloudResource) -> CloudResult<()> {
        self.mutate(|table| table.create(version, resource)).await
    }

    async fn update(&self, version: ApiVersion, resource: &CloudResource) -> CloudResult<()> {
        self.mutate(|table| table.update(version, resource)).await
    }

    async fn delete(&self, _version: ApiVersion, kind: ResourceKind, name: &str) -> CloudResult<()> {
        self.mutate(|table| table.delete(kind, name)).await
    }

    async fn list(&self, _version: ApiVersion, kind: ResourceKind) -> CloudResult<Vec<CloudResource>> {
        let _guard = self.guard.lock().await;
        Ok(self.load_table().await?.list(kind))
    }

    fn backend_type(&self) -> &'static str {
        "file"
    }
}
