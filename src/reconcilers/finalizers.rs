// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management and remote cleanup for `VirtualService` resources.
//!
//! The finalizer keeps a `VirtualService` from disappearing before its remote
//! routes, virtual service and virtual router are gone. The helpers here work
//! on an owned copy of the object and report whether they changed it, so the
//! caller commits only when something changed.
//!
//! # Example
//!
//! ```rust
//! use meshroute::crd::{VirtualService, VirtualServiceSpec};
//! use meshroute::reconcilers::finalizers::{add_finalizer, has_finalizer, remove_finalizer};
//!
//! const FINALIZER: &str = "appmesh.firestoned.io/virtualservice-finalizer";
//!
//! let mut vs = VirtualService::new(
//!     "web",
//!     VirtualServiceSpec {
//!         mesh_name: "global".to_string(),
//!         virtual_router: None,
//!         routes: vec![],
//!         provider: None,
//!     },
//! );
//!
//! assert!(add_finalizer(&mut vs, FINALIZER));
//! assert!(!add_finalizer(&mut vs, FINALIZER));
//! assert!(has_finalizer(&vs, FINALIZER));
//! assert!(remove_finalizer(&mut vs, FINALIZER));
//! assert!(!has_finalizer(&vs, FINALIZER));
//! ```

use crate::cloud::ControlPlane;
use crate::constants::{KIND_VIRTUAL_SERVICE, VIRTUAL_SERVICE_FINALIZER};
use crate::context::Context;
use crate::crd::VirtualService;
use crate::errors::{ControlPlaneError, ReconcileError};
use kube::{Resource, ResourceExt};
use tracing::{debug, info, warn};

/// Whether `resource` carries `finalizer`.
#[must_use]
pub fn has_finalizer<K: Resource>(resource: &K, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|token| token == finalizer))
}

/// Add `finalizer` to `resource` in memory. Returns `true` if it was absent.
pub fn add_finalizer<K: Resource>(resource: &mut K, finalizer: &str) -> bool {
    if has_finalizer(resource, finalizer) {
        return false;
    }
    resource
        .meta_mut()
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(finalizer.to_string());
    true
}

/// Remove every occurrence of `finalizer` from `resource` in memory.
/// Returns `true` if it was present.
pub fn remove_finalizer<K: Resource>(resource: &mut K, finalizer: &str) -> bool {
    if !has_finalizer(resource, finalizer) {
        return false;
    }
    if let Some(finalizers) = resource.meta_mut().finalizers.as_mut() {
        finalizers.retain(|token| token != finalizer);
    }
    true
}

/// Add the `VirtualService` finalizer and persist it if it was missing.
///
/// # Errors
///
/// Returns [`ReconcileError::Store`] if the update fails.
pub async fn ensure_finalizer(
    ctx: &Context,
    mut vs: VirtualService,
) -> Result<VirtualService, ReconcileError> {
    if !add_finalizer(&mut vs, VIRTUAL_SERVICE_FINALIZER) {
        return Ok(vs);
    }

    info!(
        "Adding finalizer {} to {}/{} {}",
        VIRTUAL_SERVICE_FINALIZER,
        vs.namespace().unwrap_or_default(),
        vs.name_any(),
        KIND_VIRTUAL_SERVICE
    );

    ctx.virtual_services
        .update(&vs)
        .await
        .map_err(|e| ReconcileError::store("failed to add finalizer", e))
}

/// Deletion path: clean up remote objects, then release the finalizer.
///
/// Nothing happens when the finalizer is already gone. If cleanup fails the
/// finalizer stays so the next pass retries it.
///
/// # Errors
///
/// Returns the cleanup error, or [`ReconcileError::Store`] if the finalizer
/// update fails.
pub async fn handle_deletion(ctx: &Context, mut vs: VirtualService) -> Result<(), ReconcileError> {
    let namespace = vs.namespace().unwrap_or_default();
    let name = vs.name_any();

    if !has_finalizer(&vs, VIRTUAL_SERVICE_FINALIZER) {
        debug!(
            "VirtualService {}/{} is being deleted and has no finalizer",
            namespace, name
        );
        return Ok(());
    }

    info!(
        "VirtualService {}/{} is being deleted, cleaning up remote resources",
        namespace, name
    );
    delete_remote_resources(ctx.control_plane.as_ref(), &vs).await?;

    remove_finalizer(&mut vs, VIRTUAL_SERVICE_FINALIZER);
    info!(
        "Removing finalizer {} from {}/{} {}",
        VIRTUAL_SERVICE_FINALIZER, namespace, name, KIND_VIRTUAL_SERVICE
    );
    ctx.virtual_services
        .update(&vs)
        .await
        .map_err(|e| ReconcileError::store("failed to remove finalizer", e))?;

    Ok(())
}

/// Delete the remote objects owned by `vs`: its declared routes, then the
/// virtual service, then the virtual router. Objects already gone are skipped.
///
/// # Errors
///
/// Returns [`ReconcileError::ControlPlane`] for the first failure other than
/// not-found; later deletions are not attempted.
pub async fn delete_remote_resources(
    control_plane: &dyn ControlPlane,
    vs: &VirtualService,
) -> Result<(), ReconcileError> {
    let name = vs.name_any();
    let (mesh_name, _) = vs.mesh_ref();

    if mesh_name.is_empty() {
        warn!(
            "VirtualService {}/{} has no mesh name, nothing to clean up remotely",
            vs.namespace().unwrap_or_default(),
            name
        );
        return Ok(());
    }

    let router_name = vs.virtual_router_name();

    for route in &vs.spec.routes {
        info!(
            "Deleting route {} on virtual router {} in mesh {}",
            route.name, router_name, mesh_name
        );
        tolerate_not_found(
            control_plane
                .delete_route(&route.name, &router_name, &mesh_name)
                .await,
        )
        .map_err(|e| {
            ReconcileError::control_plane(format!("failed to delete route {}", route.name), e)
        })?;
    }

    info!("Deleting virtual service {} in mesh {}", name, mesh_name);
    tolerate_not_found(control_plane.delete_virtual_service(&name, &mesh_name).await)
        .map_err(|e| ReconcileError::control_plane("failed to delete virtual service", e))?;

    info!("Deleting virtual router {} in mesh {}", router_name, mesh_name);
    tolerate_not_found(
        control_plane
            .delete_virtual_router(&router_name, &mesh_name)
            .await,
    )
    .map_err(|e| ReconcileError::control_plane("failed to delete virtual router", e))?;

    Ok(())
}

fn tolerate_not_found(result: Result<(), ControlPlaneError>) -> Result<(), ControlPlaneError> {
    match result {
        Err(e) if e.is_not_found() => {
            debug!("{}, already deleted", e);
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
