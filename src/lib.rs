// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # l7_pool
//!
//! A pool reconciler for L7 load balancers.
//!
//! ## Overview
//!
//! A load balancer is not one cloud object but a chain of them: forwarding
//! rules point at target proxies, proxies point at a URL map and carry SSL
//! certificates. The pool keeps one entity per load balancer and drives that
//! chain towards a declared desired state:
//!
//! - Sync a desired state: register the load balancer, then converge it
//! - Delete a load balancer and every cloud resource it owns
//! - Garbage-collect load balancers that left the desired set
//! - Shut down by collecting everything
//!
//! ## Architecture
//!
//! 1. **Desired State**: one [`RuntimeInfo`] per load balancer, declared in `l7pool.yaml`
//! 2. **Pool**: [`LoadBalancerPool`] tracks entities in a [`SnapshotStore`]
//! 3. **Cloud**: resources live behind the [`Cloud`] trait (file-backed or in-memory)
//! 4. **Controller**: runs reconcile passes, once or on an interval
//!
//! ## Modules
//!
//! - [`pool`]: Snapshot store and pool reconciler
//! - [`loadbalancer`]: Desired state and the load balancer entity
//! - [`cloud`]: Cloud contract and backends
//! - [`naming`]: Canonical load balancer and resource names
//! - [`certs`]: Managed certificate lookup
//! - [`events`]: Lifecycle events
//! - [`config`]: Configuration parsing, validation and fingerprints
//! - [`controller`]: Reconcile passes and the run loop
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! cluster:
//!   uid: c0ffee
//!
//! load_balancers:
//!   - name: shop/web
//!     managed_certs: [web-cert]
//!     url_map:
//!       default_backend: k8s-be-30000
//!       host_rules:
//!         - host: shop.example.com
//!           paths:
//!             - path: /api/*
//!               backend: k8s-be-30001
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod certs;
pub mod cli;
pub mod cloud;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod loadbalancer;
pub mod naming;
pub mod pool;

// ============================================================================
// Re-exports
// ============================================================================

pub use certs::{CertificateLookup, StaticCertificates};
pub use cli::{Cli, Commands, OutputFormatter};
pub use cloud::{Cloud, CloudResource, FileCloud, InMemoryCloud, ResourceKind};
pub use config::{ConfigHasher, ConfigParser, ConfigValidator, PoolConfig};
pub use controller::{Controller, ReconciliationResult};
pub use error::{L7PoolError, Result};
pub use events::{EventKind, EventRecorder, LifecycleEvent, TracingRecorder};
pub use loadbalancer::{Collaborators, LoadBalancer, RuntimeInfo};
pub use naming::{ClusterNamer, Namer};
pub use pool::{GcStrategy, LoadBalancerPool, SnapshotStore};
