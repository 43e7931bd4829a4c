// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Remote service mesh control plane.
//!
//! [`ControlPlane`] is the contract the reconciler needs from the remote API:
//! virtual routers, their routes, and virtual services, all scoped to a mesh.
//! Every read and delete distinguishes "not found"
//! ([`ControlPlaneError::NotFound`]) from other failures, and every returned
//! object carries its remote lifecycle [`ResourceStatus`].
//!
//! [`http::HttpControlPlane`] implements the contract over the REST API.

pub mod http;

use crate::crd::{Route, WeightedTarget};
use crate::errors::ControlPlaneError;
use std::collections::BTreeSet;
use std::fmt;

/// Lifecycle state the control plane reports for any object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceStatus {
    Active,
    Inactive,
    Deleted,
}

impl ResourceStatus {
    /// Parse the wire value (`ACTIVE`, `INACTIVE`, `DELETED`).
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "ACTIVE" => Some(Self::Active),
            "INACTIVE" => Some(Self::Inactive),
            "DELETED" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Wire value of this status.
    #[must_use]
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Deleted => "DELETED",
        }
    }

    #[must_use]
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// A virtual router as reported by the control plane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteVirtualRouter {
    pub name: String,
    pub mesh_name: String,
    pub status: ResourceStatus,
}

/// A route as reported by the control plane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteRoute {
    pub name: String,
    pub virtual_router_name: String,
    pub prefix: String,
    pub weighted_targets: BTreeSet<WeightedTarget>,
    pub status: ResourceStatus,
}

impl RemoteRoute {
    /// Build the remote view of a desired route, as the control plane would echo it.
    #[must_use]
    pub fn from_route(route: &Route, virtual_router_name: &str, status: ResourceStatus) -> Self {
        Self {
            name: route.name.clone(),
            virtual_router_name: virtual_router_name.to_string(),
            prefix: route.prefix().to_string(),
            weighted_targets: route.weighted_target_set(),
            status,
        }
    }
}

/// A virtual service as reported by the control plane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteVirtualService {
    pub name: String,
    pub mesh_name: String,
    /// Router the service is bound to, if its provider is a virtual router.
    pub virtual_router_name: Option<String>,
    pub status: ResourceStatus,
}

/// Desired remote virtual service, derived from a `VirtualService` resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredVirtualService {
    pub name: String,
    pub virtual_router_name: String,
}

/// Operations the reconciler performs against the remote control plane.
///
/// Implementations perform one request-response exchange per call, without
/// retries. Backoff belongs to the caller's scheduling layer.
#[async_trait::async_trait]
pub trait ControlPlane: Send + Sync {
    async fn get_virtual_router(
        &self,
        name: &str,
        mesh_name: &str,
    ) -> Result<RemoteVirtualRouter, ControlPlaneError>;

    async fn create_virtual_router(
        &self,
        name: &str,
        mesh_name: &str,
    ) -> Result<RemoteVirtualRouter, ControlPlaneError>;

    async fn delete_virtual_router(&self, name: &str, mesh_name: &str)
        -> Result<(), ControlPlaneError>;

    async fn get_routes_for_virtual_router(
        &self,
        virtual_router_name: &str,
        mesh_name: &str,
    ) -> Result<Vec<RemoteRoute>, ControlPlaneError>;

    async fn create_route(
        &self,
        route: &Route,
        virtual_router_name: &str,
        mesh_name: &str,
    ) -> Result<RemoteRoute, ControlPlaneError>;

    async fn update_route(
        &self,
        route: &Route,
        virtual_router_name: &str,
        mesh_name: &str,
    ) -> Result<RemoteRoute, ControlPlaneError>;

    async fn delete_route(
        &self,
        name: &str,
        virtual_router_name: &str,
        mesh_name: &str,
    ) -> Result<(), ControlPlaneError>;

    async fn get_virtual_service(
        &self,
        name: &str,
        mesh_name: &str,
    ) -> Result<RemoteVirtualService, ControlPlaneError>;

    async fn create_virtual_service(
        &self,
        desired: &DesiredVirtualService,
        mesh_name: &str,
    ) -> Result<RemoteVirtualService, ControlPlaneError>;

    async fn update_virtual_service(
        &self,
        desired: &DesiredVirtualService,
        mesh_name: &str,
    ) -> Result<RemoteVirtualService, ControlPlaneError>;

    async fn delete_virtual_service(
        &self,
        name: &str,
        mesh_name: &str,
    ) -> Result<(), ControlPlaneError>;
}
