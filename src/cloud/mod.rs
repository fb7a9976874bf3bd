//! Cloud collaborator module.
//!
//! This module defines the contract the load balancer entities use to talk to
//! the cloud (create, update, get, delete, list per resource kind and API
//! track) together with two backends:
//! - an in-memory backend with fault injection, used by tests and dry runs
//! - a JSON-file backend with locking, used by the `l7pool` binary

mod types;
mod table;
mod provider;
mod memory;
mod file;
mod lock;

pub use types::{ApiVersion, CloudResource, ResourceKind};
pub use table::ResourceTable;
pub use provider::Cloud;
pub use memory::{CloudOp, InMemoryCloud};
pub use file::FileCloud;
pub use lock::{check_write, generate_holder_id, LockInfo, LOCK_REFRESH_INTERVAL, LOCK_TTL_SECS};
