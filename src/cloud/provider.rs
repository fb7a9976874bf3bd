//! Cloud trait definition.
//!
//! This module defines the common interface for cloud backends. Every call is
//! issued against one API track; the track is recorded on written resources.

use async_trait::async_trait;

use crate::error::CloudResult;

use super::types::{ApiVersion, CloudResource, ResourceKind};

/// Trait for cloud backends.
///
/// Implementations are expected to bound each call with their own deadline.
#[async_trait]
pub trait Cloud: Send + Sync {
    /// Gets a resource by kind and name.
    async fn get(
        &self,
        version: ApiVersion,
        kind: ResourceKind,
        name: &str,
    ) -> CloudResult<CloudResource>;

    /// Creates a resource.
    async fn create(&self, version: ApiVersion, resource: &CloudResource) -> CloudResult<()>;

    /// Replaces the body of an existing resource.
    async fn update(&self, version: ApiVersion, resource: &CloudResource) -> CloudResult<()>;

    /// Deletes a resource.
    async fn delete(&self, version: ApiVersion, kind: ResourceKind, name: &str) -> CloudResult<()>;

    /// Lists all resources of a kind.
    async fn list(&self, version: ApiVersion, kind: ResourceKind) -> CloudResult<Vec<CloudResource>>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
