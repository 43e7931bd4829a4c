// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Objects a `VirtualService` refers to.
//!
//! A `VirtualService` may delegate to a `VirtualNode` or a `VirtualRouter`
//! through its provider, and always belongs to a `Mesh`. The controller uses
//! these relations to requeue the services that depend on an object when
//! that object changes.

use crate::crd::{VirtualNodeReference, VirtualRouterReference, VirtualService};
use kube::ResourceExt;
use std::collections::BTreeSet;
use std::fmt;

/// Namespaced name of a referenced object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a namespaced Kubernetes object.
    #[must_use]
    pub fn of<K: ResourceExt>(obj: &K) -> Self {
        Self::new(obj.namespace().unwrap_or_default(), obj.name_any())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// `VirtualNode` references in the service's provider.
#[must_use]
pub fn extract_virtual_node_references(vs: &VirtualService) -> Vec<VirtualNodeReference> {
    vs.spec
        .provider
        .as_ref()
        .and_then(|provider| provider.virtual_node.as_ref())
        .map(|node| node.virtual_node_ref.clone())
        .into_iter()
        .collect()
}

/// `VirtualRouter` references in the service's provider.
#[must_use]
pub fn extract_virtual_router_references(vs: &VirtualService) -> Vec<VirtualRouterReference> {
    vs.spec
        .provider
        .as_ref()
        .and_then(|provider| provider.virtual_router.as_ref())
        .map(|router| router.virtual_router_ref.clone())
        .into_iter()
        .collect()
}

/// Keys of the referenced `VirtualNode`s; unqualified references resolve to
/// the service's namespace.
#[must_use]
pub fn virtual_node_reference_keys(vs: &VirtualService) -> BTreeSet<ObjectKey> {
    let default_namespace = vs.namespace().unwrap_or_default();
    extract_virtual_node_references(vs)
        .into_iter()
        .map(|r| {
            ObjectKey::new(
                r.namespace.unwrap_or_else(|| default_namespace.clone()),
                r.name,
            )
        })
        .collect()
}

/// Keys of the referenced `VirtualRouter`s; unqualified references resolve to
/// the service's namespace.
#[must_use]
pub fn virtual_router_reference_keys(vs: &VirtualService) -> BTreeSet<ObjectKey> {
    let default_namespace = vs.namespace().unwrap_or_default();
    extract_virtual_router_references(vs)
        .into_iter()
        .map(|r| {
            ObjectKey::new(
                r.namespace.unwrap_or_else(|| default_namespace.clone()),
                r.name,
            )
        })
        .collect()
}

/// Key of the mesh a service belongs to.
#[must_use]
pub fn mesh_key(vs: &VirtualService) -> ObjectKey {
    let (name, namespace) = vs.mesh_ref();
    ObjectKey::new(namespace, name)
}

/// Services among `services` whose provider references the `VirtualNode` `node`.
pub fn virtual_services_referencing_node<'a>(
    services: impl IntoIterator<Item = &'a VirtualService>,
    node: &ObjectKey,
) -> Vec<ObjectKey> {
    services
        .into_iter()
        .filter(|vs| virtual_node_reference_keys(vs).contains(node))
        .map(ObjectKey::of)
        .collect()
}

/// Services among `services` whose provider references the `VirtualRouter` `router`.
pub fn virtual_services_referencing_router<'a>(
    services: impl IntoIterator<Item = &'a VirtualService>,
    router: &ObjectKey,
) -> Vec<ObjectKey> {
    services
        .into_iter()
        .filter(|vs| virtual_router_reference_keys(vs).contains(router))
        .map(ObjectKey::of)
        .collect()
}

/// Services among `services` that belong to `mesh`.
pub fn virtual_services_in_mesh<'a>(
    services: impl IntoIterator<Item = &'a VirtualService>,
    mesh: &ObjectKey,
) -> Vec<ObjectKey> {
    services
        .into_iter()
        .filter(|vs| !vs.spec.mesh_name.is_empty() && mesh_key(vs) == *mesh)
        .map(ObjectKey::of)
        .collect()
}

#[cfg(test)]
#[path = "references_tests.rs"]
mod references_tests;
