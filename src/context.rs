// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the `VirtualService` controller.
//!
//! Every reconciliation receives an `Arc<Context>` holding:
//! - the `VirtualService` object store (reads, finalizer and status writes)
//! - the `Mesh` object store (read only)
//! - the remote control plane client
//!
//! [`Stores`] wraps the reflector cache used by watch mappers to find the
//! services affected by a change to a `Mesh`, `VirtualNode` or `VirtualRouter`
//! without querying the API server.

use crate::cloud::ControlPlane;
use crate::crd::{Mesh, VirtualService};
use crate::references::{self, ObjectKey};
use crate::store::ObjectStore;
use kube::runtime::reflector::{ObjectRef, Store};
use std::sync::Arc;

/// Shared, immutable dependencies of a reconciliation pass.
#[derive(Clone)]
pub struct Context {
    /// `VirtualService` reads and writes
    pub virtual_services: Arc<dyn ObjectStore<VirtualService>>,

    /// Parent `Mesh` lookups
    pub meshes: Arc<dyn ObjectStore<Mesh>>,

    /// Remote service mesh control plane
    pub control_plane: Arc<dyn ControlPlane>,
}

/// Reflector stores for cross-object lookups.
#[derive(Clone)]
pub struct Stores {
    pub virtual_services: Store<VirtualService>,
}

impl Stores {
    #[must_use]
    pub fn new(virtual_services: Store<VirtualService>) -> Self {
        Self { virtual_services }
    }

    /// Services whose provider references the `VirtualNode` `namespace/name`.
    #[must_use]
    pub fn virtual_services_referencing_node(
        &self,
        namespace: &str,
        name: &str,
    ) -> Vec<ObjectRef<VirtualService>> {
        let cached = self.virtual_services.state();
        to_object_refs(references::virtual_services_referencing_node(
            cached.iter().map(|vs| &**vs),
            &ObjectKey::new(namespace, name),
        ))
    }

    /// Services whose provider references the `VirtualRouter` `namespace/name`.
    #[must_use]
    pub fn virtual_services_referencing_router(
        &self,
        namespace: &str,
        name: &str,
    ) -> Vec<ObjectRef<VirtualService>> {
        let cached = self.virtual_services.state();
        to_object_refs(references::virtual_services_referencing_router(
            cached.iter().map(|vs| &**vs),
            &ObjectKey::new(namespace, name),
        ))
    }

    /// Services that belong to the `Mesh` `namespace/name`.
    #[must_use]
    pub fn virtual_services_in_mesh(
        &self,
        namespace: &str,
        name: &str,
    ) -> Vec<ObjectRef<VirtualService>> {
        let cached = self.virtual_services.state();
        to_object_refs(references::virtual_services_in_mesh(
            cached.iter().map(|vs| &**vs),
            &ObjectKey::new(namespace, name),
        ))
    }
}

fn to_object_refs(keys: Vec<ObjectKey>) -> Vec<ObjectRef<VirtualService>> {
    keys.into_iter()
        .map(|key| ObjectRef::new(&key.name).within(&key.namespace))
        .collect()
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
