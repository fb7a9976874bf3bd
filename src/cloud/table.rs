//! Resource table shared by the cloud backends.
//!
//! The table implements the create/update/get/delete/list semantics of the
//! cloud contract without any IO, so the in-memory and file backends only
//! differ in where the table lives.

use std::collections::BTreeMap;

use crate::error::{CloudError, CloudResult};

use super::types::{ApiVersion, CloudResource, ResourceKind};

/// Table of cloud resources keyed by kind and name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceTable {
    /// Resources, ordered by kind then name.
    resources: BTreeMap<(ResourceKind, String), CloudResource>,
}

impl ResourceTable {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            resources: BTreeMap::new(),
        }
    }

    /// Builds a table from a flat list of resources. Later duplicates win.
    #[must_use]
    pub fn from_resources(resources: Vec<CloudResource>) -> Self {
        Self {
            resources: resources.into_iter().map(|r| (r.key(), r)).collect(),
        }
    }

    /// Returns every resource, ordered by kind then name.
    #[must_use]
    pub fn resources(&self) -> Vec<CloudResource> {
        self.resources.values().cloned().collect()
    }

    /// Returns the number of resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if the table holds no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Looks up a resource.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::NotFound` if the resource does not exist.
    pub fn get(&self, kind: ResourceKind, name: &str) -> CloudResult<CloudResource> {
        self.resources
            .get(&(kind, name.to_string()))
            .cloned()
            .ok_or_else(|| CloudError::not_found(kind, name))
    }

    /// Inserts a new resource, stamped with the API track of the call.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::AlreadyExists` if a resource with the same kind and
    /// name exists.
    pub fn create(&mut self, version: ApiVersion, resource: &CloudResource) -> CloudResult<()> {
        let key = resource.key();
        if self.resources.contains_key(&key) {
            return Err(CloudError::AlreadyExists {
                kind: resource.kind,
                name: resource.name.clone(),
            });
        }
        let mut stored = resource.clone();
        stored.version = version;
        self.resources.insert(key, stored);
        Ok(())
    }

    /// Replaces an existing resource.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::NotFound` if the resource does not exist.
    pub fn update(&mut self, version: ApiVersion, resource: &CloudResource) -> CloudResult<()> {
        let Some(stored) = self.resources.get_mut(&resource.key()) else {
            return Err(CloudError::not_found(resource.kind, &resource.name));
        };
        stored.spec = resource.spec.clone();
        stored.version = version;
        Ok(())
    }

    /// Removes a resource.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::NotFound` if the resource does not exist.
    pub fn delete(&mut self, kind: ResourceKind, name: &str) -> CloudResult<()> {
        self.resources
            .remove(&(kind, name.to_string()))
            .map(|_| ())
            .ok_or_else(|| CloudError::not_found(kind, name))
    }

    /// Lists every resource of a kind, ordered by name.
    #[must_use]
    pub fn list(&self, kind: ResourceKind) -> Vec<CloudResource> {
        self.resources
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn url_map(name: &str, backend: &str) -> CloudResource {
        CloudResource::new(
            ResourceKind::UrlMap,
            name,
            ApiVersion::Ga,
            json!({ "default_backend": backend }),
        )
    }

    #[test]
    fn test_create_then_get() {
        let mut table = ResourceTable::new();
        table
            .create(ApiVersion::Beta, &url_map("k8s-um-web", "be-1"))
            .expect("create failed");

        let stored = table.get(ResourceKind::UrlMap, "k8s-um-web").expect("get failed");
        assert_eq!(stored.version, ApiVersion::Beta);
        assert_eq!(stored.spec["default_backend"], "be-1");
    }

    #[test]
    fn test_create_twice_conflicts() {
        let mut table = ResourceTable::new();
        let resource = url_map("k8s-um-web", "be-1");
        table.create(ApiVersion::Ga, &resource).expect("create failed");

        let err = table.create(ApiVersion::Ga, &resource).unwrap_err();
        assert!(matches!(err, CloudError::AlreadyExists { .. }));
    }

    #[test]
    fn test_update_and_delete_missing() {
        let mut table = ResourceTable::new();
        let resource = url_map("k8s-um-web", "be-1");

        assert!(table.update(ApiVersion::Ga, &resource).unwrap_err().is_not_found());
        assert!(table.delete(ResourceKind::UrlMap, "k8s-um-web").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_filters_by_kind() {
        let mut table = ResourceTable::new();
        table.create(ApiVersion::Ga, &url_map("b", "be-1")).expect("create failed");
        table.create(ApiVersion::Ga, &url_map("a", "be-2")).expect("create failed");
        table
            .create(
                ApiVersion::Ga,
                &CloudResource::new(ResourceKind::TargetHttpProxy, "a", ApiVersion::Ga, json!({})),
            )
            .expect("create failed");

        let names: Vec<String> = table
            .list(ResourceKind::UrlMap)
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(table.len(), 3);
    }
}
