// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for `VirtualService` resources.
//!
//! meshroute follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Monitor `VirtualService` changes and the objects it references
//! 2. **Reconcile** - Compare the declared routing with the control plane
//! 3. **Update** - Create, update or delete remote routers, routes and services
//! 4. **Status** - Mirror remote lifecycle states back as conditions
//!
//! # Building Blocks
//!
//! - [`virtualservice`] - The reconciliation pass itself
//! - [`finalizers`] - Finalizer bookkeeping and remote cleanup on deletion
//! - [`mesh_gate`] - Parent mesh existence, activity and deletion checks
//! - [`routes`] - Route diffing and convergence
//! - [`status`] - Condition upserts and conditional status writes
//!
//! # Example: Using the Reconciler
//!
//! ```rust,no_run
//! use meshroute::context::Context;
//! use meshroute::reconcilers::reconcile_virtual_service;
//!
//! async fn reconcile(ctx: &Context) -> anyhow::Result<()> {
//!     reconcile_virtual_service(ctx, "default", "web").await?;
//!     Ok(())
//! }
//! ```

pub mod finalizers;
pub mod mesh_gate;
pub mod routes;
pub mod status;
pub mod virtualservice;

#[cfg(test)]
pub(crate) mod fakes;

pub use mesh_gate::MeshGate;
pub use virtualservice::reconcile_virtual_service;
