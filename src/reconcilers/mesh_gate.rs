// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Parent `Mesh` checks run before a `VirtualService` is converged.

use crate::context::Context;
use crate::crd::VirtualService;
use crate::errors::ReconcileError;
use crate::reconcilers::finalizers::delete_remote_resources;
use kube::ResourceExt;
use tracing::{debug, error, info};

/// Outcome of the mesh check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshGate {
    /// The mesh is active; converge the service.
    Continue,
    /// The mesh does not exist; leave the service alone.
    Skip,
    /// The mesh is being deleted; the service's remote objects were cleaned up.
    Cascade,
}

/// Decide whether `vs` can be converged given the state of its parent mesh.
///
/// An empty mesh name yields [`MeshGate::Continue`] so the caller's
/// validation reports it.
///
/// # Errors
///
/// Returns [`ReconcileError::MeshNotActive`] when the mesh exists but is not
/// active, or [`ReconcileError::Store`] when the mesh lookup fails for a
/// reason other than not-found.
pub async fn check_mesh(ctx: &Context, vs: &VirtualService) -> Result<MeshGate, ReconcileError> {
    if vs.spec.mesh_name.is_empty() {
        return Ok(MeshGate::Continue);
    }

    let vs_namespace = vs.namespace().unwrap_or_default();
    let vs_name = vs.name_any();
    let (mesh_name, mesh_namespace) = vs.mesh_ref();

    let mesh = match ctx.meshes.get(&mesh_namespace, &mesh_name).await {
        Ok(mesh) => mesh,
        Err(e) if e.is_not_found() => {
            info!(
                "Mesh {}/{} for VirtualService {}/{} not found, skipping",
                mesh_namespace, mesh_name, vs_namespace, vs_name
            );
            return Ok(MeshGate::Skip);
        }
        Err(e) => return Err(ReconcileError::store("failed to get mesh", e)),
    };

    if mesh.metadata.deletion_timestamp.is_some() {
        info!(
            "Mesh {}/{} is being deleted, deleting remote resources of VirtualService {}/{}",
            mesh_namespace, mesh_name, vs_namespace, vs_name
        );
        match delete_remote_resources(ctx.control_plane.as_ref(), vs).await {
            Ok(()) => info!(
                "Deleted remote resources of VirtualService {}/{}",
                vs_namespace, vs_name
            ),
            Err(e) => error!(
                "Failed to delete remote resources of VirtualService {}/{}: {}",
                vs_namespace, vs_name, e
            ),
        }
        return Ok(MeshGate::Cascade);
    }

    if !mesh.is_active() {
        return Err(ReconcileError::MeshNotActive {
            namespace: mesh_namespace,
            name: mesh_name,
            virtual_service: format!("{vs_namespace}/{vs_name}"),
        });
    }

    debug!(
        "Mesh {}/{} is active for VirtualService {}/{}",
        mesh_namespace, mesh_name, vs_namespace, vs_name
    );
    Ok(MeshGate::Continue)
}

#[cfg(test)]
#[path = "mesh_gate_tests.rs"]
mod mesh_gate_tests;
