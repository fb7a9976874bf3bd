//! Load balancers as the pool sees them.
//!
//! - [`RuntimeInfo`] is the desired state handed to every sync
//! - [`LoadBalancer`] is the tracked entity that converges it into the cloud

mod entity;
mod runtime;

pub use entity::{Collaborators, LoadBalancer};
pub use runtime::{HostRule, ObjectRef, PathRule, RuntimeInfo, TlsCert, UrlMap, DEFAULT_NAMESPACE};
