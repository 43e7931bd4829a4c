// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for service mesh routing.
//!
//! This module defines the Kubernetes Custom Resource Definitions used by meshroute
//! to describe service mesh routing declaratively.
//!
//! # Resource Types
//!
//! - [`VirtualService`] - Routing entry point, reconciled against the remote control plane
//! - [`Mesh`] - Parent container; read by the `VirtualService` reconciler to gate work
//! - [`VirtualNode`] - Backend workload; watched so dependent services are requeued
//! - [`VirtualRouter`] - Shared router; watched so dependent services are requeued
//!
//! # Example: Declaring a VirtualService
//!
//! ```rust,no_run
//! use meshroute::crd::{Route, RouteAction, RouteMatch, VirtualServiceSpec, WeightedTarget};
//!
//! let spec = VirtualServiceSpec {
//!     mesh_name: "global".to_string(),
//!     virtual_router: None,
//!     routes: vec![Route {
//!         name: "default".to_string(),
//!         route_match: RouteMatch { prefix: "/".to_string() },
//!         action: RouteAction {
//!             weighted_targets: vec![WeightedTarget {
//!                 target: "colorteller-blue".to_string(),
//!                 weight: 100,
//!             }],
//!         },
//!     }],
//!     provider: None,
//! };
//! ```

use crate::constants::{CONDITION_MESH_ACTIVE, CONDITION_STATUS_TRUE};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Condition represents an observation of a resource's current state.
///
/// Used by resources this operator only reads (such as [`Mesh`]), where the
/// condition types are owned by another controller.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, e.g. `MeshActive`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Condition types reported on a [`VirtualService`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum VirtualServiceConditionType {
    /// The remote virtual service exists and is active.
    VirtualServiceActive,
    /// The remote virtual router backing the service is active.
    VirtualRouterActive,
    /// Every remote route on the virtual router is active.
    RoutesActive,
}

impl fmt::Display for VirtualServiceConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::VirtualServiceActive => "VirtualServiceActive",
            Self::VirtualRouterActive => "VirtualRouterActive",
            Self::RoutesActive => "RoutesActive",
        };
        f.write_str(name)
    }
}

/// Tri-state value of a condition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl ConditionStatus {
    /// `True` when `value` holds, `False` otherwise.
    #[must_use]
    pub fn from_bool(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// A status condition on a [`VirtualService`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceCondition {
    /// Which aspect of the service this condition reports on.
    pub r#type: VirtualServiceConditionType,

    /// Current value of the condition.
    pub status: ConditionStatus,

    /// Last time the status changed (RFC3339 format).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// `VirtualService` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceStatus {
    /// At most one entry per condition type.
    #[serde(default)]
    pub conditions: Vec<VirtualServiceCondition>,
}

/// A backend reference with an integer share of traffic.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct WeightedTarget {
    /// Name of the virtual node receiving traffic.
    pub target: String,

    /// Relative weight of this target.
    #[schemars(range(min = 0, max = 100))]
    pub weight: i64,
}

/// Path match of a route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteMatch {
    /// Path prefix, e.g. `/` or `/api`.
    pub prefix: String,
}

/// Action taken for requests matching a route.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteAction {
    /// Backends and their weights. Order is not significant.
    #[serde(default)]
    pub weighted_targets: Vec<WeightedTarget>,
}

/// A single HTTP route of a virtual router.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Route name, unique within the `VirtualService`.
    pub name: String,

    /// Which requests this route matches.
    #[serde(rename = "match")]
    pub route_match: RouteMatch,

    /// Where matching requests are sent.
    pub action: RouteAction,
}

impl Route {
    /// Path prefix this route matches.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.route_match.prefix
    }

    /// Weighted targets as an unordered set.
    #[must_use]
    pub fn weighted_target_set(&self) -> BTreeSet<WeightedTarget> {
        self.action.weighted_targets.iter().cloned().collect()
    }
}

/// Name override for the virtual router backing a `VirtualService`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceRouter {
    /// Remote virtual router name.
    pub name: String,
}

/// Reference to a `VirtualNode` object.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNodeReference {
    /// Namespace of the `VirtualNode`; defaults to the referencing object's namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Name of the `VirtualNode`.
    pub name: String,
}

/// Reference to a `VirtualRouter` object.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualRouterReference {
    /// Namespace of the `VirtualRouter`; defaults to the referencing object's namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Name of the `VirtualRouter`.
    pub name: String,
}

/// Provider delegating to a `VirtualNode`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNodeServiceProvider {
    #[serde(alias = "ref")]
    pub virtual_node_ref: VirtualNodeReference,
}

/// Provider delegating to a `VirtualRouter`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualRouterServiceProvider {
    #[serde(alias = "ref")]
    pub virtual_router_ref: VirtualRouterReference,
}

/// What a `VirtualService` delegates traffic to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceProvider {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_node: Option<VirtualNodeServiceProvider>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_router: Option<VirtualRouterServiceProvider>,
}

/// `VirtualService` is the routing entry point exposed to traffic producers.
///
/// Each `VirtualService` is reconciled into a remote virtual router, one remote
/// route per entry in `routes`, and a remote virtual service bound to the router.
///
/// # Example
///
/// ```yaml
/// apiVersion: appmesh.firestoned.io/v1beta1
/// kind: VirtualService
/// metadata:
///   name: colorteller.demo.svc.cluster.local
///   namespace: demo
/// spec:
///   meshName: global
///   virtualRouter:
///     name: colorteller-router
///   routes:
///     - name: color-route
///       match:
///         prefix: /
///       action:
///         weightedTargets:
///           - target: colorteller-blue
///             weight: 90
///           - target: colorteller-red
///             weight: 10
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "appmesh.firestoned.io",
    version = "v1beta1",
    kind = "VirtualService",
    namespaced,
    shortname = "vs",
    doc = "VirtualService declares routes for a service in a mesh. The operator keeps a remote virtual router, its routes, and a remote virtual service consistent with this spec."
)]
#[kube(status = "VirtualServiceStatus")]
#[kube(printcolumn = r#"{"name":"Mesh","type":"string","jsonPath":".spec.meshName"}"#)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceSpec {
    /// Mesh this service belongs to. `name.namespace` selects a mesh in another namespace.
    pub mesh_name: String,

    /// Router override. Defaults to a router named after the `VirtualService`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_router: Option<VirtualServiceRouter>,

    /// Routes installed on the virtual router. Names must be unique.
    #[serde(default)]
    pub routes: Vec<Route>,

    /// Optional `VirtualNode` or `VirtualRouter` this service delegates to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<VirtualServiceProvider>,
}

impl VirtualService {
    /// Name of the remote virtual router: the override if set, else the service's own name.
    #[must_use]
    pub fn virtual_router_name(&self) -> String {
        self.spec
            .virtual_router
            .as_ref()
            .map_or_else(|| self.name_any(), |router| router.name.clone())
    }

    /// Mesh name and namespace, resolving a `name.namespace` qualifier.
    #[must_use]
    pub fn mesh_ref(&self) -> (String, String) {
        parse_mesh_name(&self.spec.mesh_name, &self.namespace().unwrap_or_default())
    }

    /// Existing conditions, empty when no status has been written yet.
    #[must_use]
    pub fn conditions(&self) -> &[VirtualServiceCondition] {
        self.status
            .as_ref()
            .map_or(&[][..], |status| status.conditions.as_slice())
    }
}

/// Split a mesh name of the form `name.namespace`.
///
/// The last `.` separates the namespace. Without a qualifier the mesh lives in
/// `default_namespace`.
///
/// # Example
///
/// ```rust
/// use meshroute::crd::parse_mesh_name;
///
/// assert_eq!(
///     parse_mesh_name("global.mesh-system", "demo"),
///     ("global".to_string(), "mesh-system".to_string())
/// );
/// assert_eq!(
///     parse_mesh_name("global", "demo"),
///     ("global".to_string(), "demo".to_string())
/// );
/// ```
#[must_use]
pub fn parse_mesh_name(mesh_name: &str, default_namespace: &str) -> (String, String) {
    match mesh_name.rsplit_once('.') {
        Some((name, namespace)) if !name.is_empty() && !namespace.is_empty() => {
            (name.to_string(), namespace.to_string())
        }
        _ => (mesh_name.to_string(), default_namespace.to_string()),
    }
}

/// `Mesh` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeshStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// `Mesh` is the top-level container for routing objects in the remote control plane.
///
/// Meshes are reconciled by a separate controller. The `VirtualService` reconciler
/// only reads them to decide whether to proceed, wait, or cascade a deletion.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "appmesh.firestoned.io",
    version = "v1beta1",
    kind = "Mesh",
    plural = "meshes",
    namespaced,
    doc = "Mesh is the parent container of virtual services, routers and nodes in the remote control plane."
)]
#[kube(status = "MeshStatus")]
#[serde(rename_all = "camelCase")]
pub struct MeshSpec {
    /// Service discovery mechanism used by nodes in this mesh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_discovery_type: Option<String>,

    /// Egress filter type (`DROP_ALL` or `ALLOW_ALL`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress_filter: Option<String>,
}

impl Mesh {
    /// A mesh is active when its `MeshActive` condition is `True`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|status| {
                status
                    .conditions
                    .iter()
                    .find(|c| c.r#type == CONDITION_MESH_ACTIVE)
            })
            .is_some_and(|c| c.status == CONDITION_STATUS_TRUE)
    }
}

/// `VirtualNode` represents a backend workload in the mesh.
///
/// Only watched by this operator: a change requeues every `VirtualService`
/// whose provider references it.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "appmesh.firestoned.io",
    version = "v1beta1",
    kind = "VirtualNode",
    namespaced,
    doc = "VirtualNode is a logical pointer to a backend workload in the mesh."
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNodeSpec {
    /// Mesh this node belongs to.
    pub mesh_name: String,
}

/// `VirtualRouter` represents a router object declared independently of any service.
///
/// Only watched by this operator: a change requeues every `VirtualService`
/// whose provider references it.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "appmesh.firestoned.io",
    version = "v1beta1",
    kind = "VirtualRouter",
    namespaced,
    doc = "VirtualRouter is a router in the mesh that virtual services can delegate to."
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualRouterSpec {
    /// Mesh this router belongs to.
    pub mesh_name: String,
}
