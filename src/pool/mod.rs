//! The load balancer pool.
//!
//! Tracks one [`LoadBalancer`](crate::loadbalancer::LoadBalancer) per
//! canonical name, converges them on sync and garbage-collects the ones that
//! drop out of the desired set.

mod reconciler;
mod snapshot;

pub use reconciler::{GcStrategy, LoadBalancerPool};
pub use snapshot::SnapshotStore;
