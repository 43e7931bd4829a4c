// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # meshroute - Service Mesh VirtualService Operator for Kubernetes
//!
//! meshroute converges a remote service mesh control plane towards the
//! `VirtualService` custom resources declared in a cluster. For each service it
//! maintains a virtual router, the routes on that router, and the remote
//! virtual service bound to it, and mirrors their lifecycle states back as
//! status conditions.
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types (`VirtualService`, `Mesh`, ...)
//! - [`reconcilers`] - The reconciliation pass and its building blocks
//! - [`cloud`] - Remote control plane abstraction and its HTTP client
//! - [`store`] - Object store abstraction over the Kubernetes API
//! - [`context`] - Shared context and reflector-backed lookups
//! - [`references`] - Cross-object reference extraction for watch mapping
//! - [`controller`] - `kube::runtime::Controller` wiring
//! - [`config`] - Command-line and environment configuration
//! - [`metrics`] / [`health`] - Prometheus metrics and probe endpoints
//!
//! ## Example
//!
//! ```rust,no_run
//! use meshroute::crd::{Route, RouteAction, RouteMatch, VirtualServiceSpec, WeightedTarget};
//!
//! let spec = VirtualServiceSpec {
//!     mesh_name: "global".to_string(),
//!     virtual_router: None,
//!     routes: vec![Route {
//!         name: "root".to_string(),
//!         route_match: RouteMatch { prefix: "/".to_string() },
//!         action: RouteAction {
//!             weighted_targets: vec![WeightedTarget {
//!                 target: "web-v1".to_string(),
//!                 weight: 100,
//!             }],
//!         },
//!     }],
//!     provider: None,
//! };
//! ```

pub mod cloud;
pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod reconcilers;
pub mod references;
pub mod store;

#[cfg(test)]
mod crd_tests;
