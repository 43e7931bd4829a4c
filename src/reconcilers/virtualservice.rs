// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `VirtualService` reconciliation logic.
//!
//! One pass converges the remote control plane towards a `VirtualService`:
//!
//! 1. A deleted service goes through finalizer-guarded cleanup.
//! 2. The finalizer is added if missing.
//! 3. The parent mesh must exist and be active (see [`check_mesh`]).
//! 4. The virtual router is created if missing.
//! 5. Routes on the router are converged to `spec.routes`.
//! 6. The remote virtual service is created, or rebound if it points at a
//!    different router.
//! 7. Status conditions mirror the remote lifecycle states.
//!
//! Every step reads before it writes, so a pass that finds everything in
//! place makes no remote mutation and no status write.

use crate::cloud::{DesiredVirtualService, RemoteVirtualService};
use crate::context::Context;
use crate::crd::{ConditionStatus, VirtualServiceConditionType};
use crate::errors::ReconcileError;
use crate::reconcilers::finalizers::{ensure_finalizer, handle_deletion};
use crate::reconcilers::mesh_gate::{check_mesh, MeshGate};
use crate::reconcilers::routes::sync_routes;
use crate::reconcilers::status::{condition_for_status, ensure_condition};
use kube::ResourceExt;
use tracing::{debug, info, warn};

/// Reconciles the `VirtualService` `namespace/name`.
///
/// A service that no longer exists is not an error.
///
/// # Errors
///
/// Returns an error if:
/// - `spec.meshName` is empty
/// - the parent mesh is not active
/// - a store read or write fails, including resource version conflicts
/// - a control plane call fails with anything but not-found
/// - one or more route operations failed (after the rest of the pass ran)
pub async fn reconcile_virtual_service(
    ctx: &Context,
    namespace: &str,
    name: &str,
) -> Result<(), ReconcileError> {
    let vs = match ctx.virtual_services.get(namespace, name).await {
        Ok(vs) => vs,
        Err(e) if e.is_not_found() => {
            debug!("VirtualService {}/{} no longer exists", namespace, name);
            return Ok(());
        }
        Err(e) => return Err(ReconcileError::store("failed to get virtual service", e)),
    };

    info!("Reconciling VirtualService: {}/{}", namespace, name);

    if vs.metadata.deletion_timestamp.is_some() {
        return handle_deletion(ctx, vs).await;
    }

    let vs = ensure_finalizer(ctx, vs).await?;

    match check_mesh(ctx, &vs).await? {
        MeshGate::Continue => {}
        MeshGate::Skip | MeshGate::Cascade => return Ok(()),
    }

    if vs.spec.mesh_name.is_empty() {
        return Err(ReconcileError::Validation(format!(
            "meshName must be set on VirtualService {namespace}/{name}"
        )));
    }

    let control_plane = ctx.control_plane.as_ref();
    let store = ctx.virtual_services.as_ref();
    let (mesh_name, _) = vs.mesh_ref();
    let router_name = vs.virtual_router_name();

    // Virtual router
    let (vs, router) = match control_plane
        .get_virtual_router(&router_name, &mesh_name)
        .await
    {
        Ok(router) => (vs, router),
        Err(e) if e.is_not_found() => {
            info!(
                "Creating virtual router {} in mesh {}",
                router_name, mesh_name
            );
            let router = control_plane
                .create_virtual_router(&router_name, &mesh_name)
                .await
                .map_err(|e| ReconcileError::control_plane("failed to create virtual router", e))?;
            let vs = ensure_condition(
                store,
                vs,
                VirtualServiceConditionType::VirtualRouterActive,
                condition_for_status(router.status),
            )
            .await
            .map_err(|e| ReconcileError::store("failed to update status", e))?;
            (vs, router)
        }
        Err(e) => {
            return Err(ReconcileError::control_plane(
                "failed to get virtual router",
                e,
            ))
        }
    };

    // Routes
    let existing = control_plane
        .get_routes_for_virtual_router(&router_name, &mesh_name)
        .await
        .map_err(|e| ReconcileError::control_plane("failed to get routes", e))?;
    let route_sync = sync_routes(
        control_plane,
        &mesh_name,
        &router_name,
        &vs.spec.routes,
        &existing,
    )
    .await;

    let routes_active = match control_plane
        .get_routes_for_virtual_router(&router_name, &mesh_name)
        .await
    {
        Ok(routes) => routes.iter().all(|route| route.status.is_active()),
        Err(e) => {
            warn!(
                "Failed to list routes of virtual router {} for status: {}",
                router_name, e
            );
            false
        }
    };
    let vs = ensure_condition(
        store,
        vs,
        VirtualServiceConditionType::RoutesActive,
        ConditionStatus::from_bool(routes_active),
    )
    .await
    .map_err(|e| ReconcileError::store("failed to update status", e))?;

    // Virtual service
    let desired = DesiredVirtualService {
        name: vs.name_any(),
        virtual_router_name: router_name.clone(),
    };
    let remote = match control_plane
        .get_virtual_service(&desired.name, &mesh_name)
        .await
    {
        Ok(observed) if virtual_service_needs_update(&desired, &observed) => {
            info!(
                "Updating virtual service {} in mesh {} to use virtual router {}",
                desired.name, mesh_name, router_name
            );
            control_plane
                .update_virtual_service(&desired, &mesh_name)
                .await
                .map_err(|e| ReconcileError::control_plane("failed to update virtual service", e))?
        }
        Ok(observed) => observed,
        Err(e) if e.is_not_found() => {
            info!(
                "Creating virtual service {} in mesh {}",
                desired.name, mesh_name
            );
            control_plane
                .create_virtual_service(&desired, &mesh_name)
                .await
                .map_err(|e| ReconcileError::control_plane("failed to create virtual service", e))?
        }
        Err(e) => {
            return Err(ReconcileError::control_plane(
                "failed to get virtual service",
                e,
            ))
        }
    };

    // Conditions
    let vs = ensure_condition(
        store,
        vs,
        VirtualServiceConditionType::VirtualServiceActive,
        condition_for_status(remote.status),
    )
    .await
    .map_err(|e| ReconcileError::store("failed to update status", e))?;
    ensure_condition(
        store,
        vs,
        VirtualServiceConditionType::VirtualRouterActive,
        condition_for_status(router.status),
    )
    .await
    .map_err(|e| ReconcileError::store("failed to update status", e))?;

    let report = route_sync?;
    if report.has_changes() {
        info!(
            "VirtualService {}/{} reconciled: {} routes created, {} updated, {} deleted",
            namespace,
            name,
            report.created.len(),
            report.updated.len(),
            report.deleted.len()
        );
    } else {
        debug!("VirtualService {}/{} reconciled, routes unchanged", namespace, name);
    }
    Ok(())
}

/// Whether the remote virtual service is bound to a different router than desired.
///
/// Only the router binding is compared. A service without a router provider
/// counts as bound to the empty name.
#[must_use]
pub fn virtual_service_needs_update(
    desired: &DesiredVirtualService,
    observed: &RemoteVirtualService,
) -> bool {
    observed.virtual_router_name.as_deref().unwrap_or_default() != desired.virtual_router_name
}

#[cfg(test)]
#[path = "virtualservice_tests.rs"]
mod virtualservice_tests;
