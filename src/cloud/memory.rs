//! In-memory cloud backend.
//!
//! Keeps resources in a process-local table. Faults can be injected per
//! operation and resource kind to exercise partial convergence and cleanup
//! failures.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{CloudError, CloudResult};

use super::provider::Cloud;
use super::table::ResourceTable;
use super::types::{ApiVersion, CloudResource, ResourceKind};

/// Operations of the cloud contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudOp {
    /// `get`
    Get,
    /// `create`
    Create,
    /// `update`
    Update,
    /// `delete`
    Delete,
    /// `list`
    List,
}

/// An injected failure.
#[derive(Debug, Clone)]
struct Fault {
    op: CloudOp,
    kind: ResourceKind,
    error: CloudError,
}

#[derive(Debug, Default)]
struct Inner {
    table: ResourceTable,
    faults: Vec<Fault>,
    calls: HashMap<CloudOp, usize>,
}

/// In-memory cloud backend.
#[derive(Debug, Default)]
pub struct InMemoryCloud {
    inner: Mutex<Inner>,
}

impl InMemoryCloud {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `op` on `kind` fail with `error` until faults are cleared.
    pub async fn inject_fault(&self, op: CloudOp, kind: ResourceKind, error: CloudError) {
        self.inner.lock().await.faults.push(Fault { op, kind, error });
    }

    /// Removes every injected fault.
    pub async fn clear_faults(&self) {
        self.inner.lock().await.faults.clear();
    }

    /// Returns how many times `op` was called, including failed calls.
    pub async fn calls(&self, op: CloudOp) -> usize {
        self.inner.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    /// Returns every stored resource.
    pub async fn resources(&self) -> Vec<CloudResource> {
        self.inner.lock().await.table.resources()
    }

    /// Returns true if the resource exists.
    pub async fn contains(&self, kind: ResourceKind, name: &str) -> bool {
        self.inner.lock().await.table.get(kind, name).is_ok()
    }

    /// Records the call and returns the matching injected fault, if any.
    fn check(inner: &mut Inner, op: CloudOp, kind: ResourceKind) -> CloudResult<()> {
        *inner.calls.entry(op).or_insert(0) += 1;
        match inner.faults.iter().find(|f| f.op == op && f.kind == kind) {
            Some(fault) => {
                debug!("Injected fault on {op:?} {kind}: {}", fault.error);
                Err(fault.error.clone())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Cloud for InMemoryCloud {
    async fn get(
        &self,
        _version: ApiVersion,
        kind: ResourceKind,
        name: &str,
    ) -> CloudResult<CloudResource> {
        let mut inner = self.inner.lock().await;
        Self::check(&mut inner, CloudOp::Get, kind)?;
        inner.table.get(kind, name)
    }

    async fn create(&self, version: ApiVersion, resource: &CloudResource) -> CloudResult<()> {
        let mut inner = self.inner.lock().await;
        Self::check(&mut inner, CloudOp::Create, resource.kind)?;
        inner.table.create(version, resource)
    }

    async fn update(&self, version: ApiVersion, resource: &CloudResource) -> CloudResult<()> {
        let mut inner = self.inner.lock().await;
        Self::check(&mut inner, CloudOp::Update, resource.kind)?;
        inner.table.update(version, resource)
    }

    async fn delete(&self, _version: ApiVersion, kind: ResourceKind, name: &str) -> CloudResult<()> {
        let mut inner = self.inner.lock().await;
        Self::check(&mut inner, CloudOp::Delete, kind)?;
        inner.table.delete(kind, name)
    }

    async fn list(&self, _version: ApiVersion, kind: ResourceKind) -> CloudResult<Vec<CloudResource>> {
        let mut inner = self.inner.lock().await;
        Self::check(&mut inner, CloudOp::List, kind)?;
        Ok(inner.table.list(kind))
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
