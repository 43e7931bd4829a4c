// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory object store and control plane for reconciler tests.
//!
//! Both fakes record every call they receive and can be told to fail a
//! specific operation. [`FakeStore`] enforces `resourceVersion` checks the way
//! the API server does, so a write from a stale copy returns a conflict.

use crate::cloud::{
    ControlPlane, DesiredVirtualService, RemoteRoute, RemoteVirtualRouter, RemoteVirtualService,
    ResourceStatus,
};
use crate::constants::CONDITION_MESH_ACTIVE;
use crate::context::Context;
use crate::crd::{
    Condition, Mesh, MeshSpec, MeshStatus, Route, RouteAction, RouteMatch, VirtualService,
    VirtualServiceSpec, WeightedTarget,
};
use crate::errors::{ControlPlaneError, StoreError};
use crate::store::ObjectStore;
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::jiff::Timestamp;
use kube::core::Status;
use kube::{Resource, ResourceExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

pub const NAMESPACE: &str = "demo";
pub const MESH: &str = "global";

/// Objects with a status subresource.
pub trait StatusObject: Resource<DynamicType = ()> + Clone + Send + Sync + 'static {
    fn copy_status_from(&mut self, other: &Self);
}

impl StatusObject for VirtualService {
    fn copy_status_from(&mut self, other: &Self) {
        self.status.clone_from(&other.status);
    }
}

impl StatusObject for Mesh {
    fn copy_status_from(&mut self, other: &Self) {
        self.status.clone_from(&other.status);
    }
}

/// Store failure to inject.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreFailure {
    Conflict,
    Internal,
}

impl StoreFailure {
    fn to_error(self, kind: &str, namespace: &str, name: &str) -> StoreError {
        match self {
            Self::Conflict => StoreError::Conflict {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: "the object has been modified".to_string(),
            },
            Self::Internal => StoreError::Kube(kube::Error::Api(
                Status::failure("etcdserver: request timed out", "InternalError")
                    .with_code(500)
                    .boxed(),
            )),
        }
    }
}

struct StoreState<K> {
    objects: BTreeMap<(String, String), K>,
    calls: Vec<String>,
    failures: HashMap<&'static str, StoreFailure>,
    next_version: u64,
}

/// [`ObjectStore`] over a map, with API server style versioning.
pub struct FakeStore<K> {
    state: Mutex<StoreState<K>>,
}

impl<K> Default for FakeStore<K> {
    fn default() -> Self {
        Self {
            state: Mutex::new(StoreState {
                objects: BTreeMap::new(),
                calls: Vec::new(),
                failures: HashMap::new(),
                next_version: 1,
            }),
        }
    }
}

impl<K: StatusObject> FakeStore<K> {
    /// Seed an object, assigning it a fresh `resourceVersion`. Returns the stored copy.
    pub fn insert(&self, mut object: K) -> K {
        let mut state = self.state.lock().unwrap();
        object.meta_mut().resource_version = Some(state.next_version.to_string());
        state.next_version += 1;
        let key = (object.namespace().unwrap_or_default(), object.name_any());
        state.objects.insert(key, object.clone());
        object
    }

    /// Current stored copy.
    pub fn object(&self, namespace: &str, name: &str) -> Option<K> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn remove(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .objects
            .remove(&(namespace.to_string(), name.to_string()));
    }

    /// Make every call of `operation` (`get`, `update`, `update_status`) fail.
    pub fn fail(&self, operation: &'static str, failure: StoreFailure) {
        self.state.lock().unwrap().failures.insert(operation, failure);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        let prefix = format!("{operation} ");
        self.calls().iter().filter(|c| c.starts_with(&prefix)).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn write(
        &self,
        operation: &'static str,
        object: &K,
        merge: impl FnOnce(&K, &K) -> K,
    ) -> Result<K, StoreError> {
        let kind = K::kind(&()).to_string();
        let namespace = object.namespace().unwrap_or_default();
        let name = object.name_any();
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{operation} {namespace}/{name}"));

        if let Some(failure) = state.failures.get(operation) {
            return Err(failure.to_error(&kind, &namespace, &name));
        }

        let key = (namespace.clone(), name.clone());
        let Some(current) = state.objects.get(&key) else {
            return Err(StoreError::NotFound {
                kind,
                namespace,
                name,
            });
        };

        if current.resource_version() != object.resource_version() {
            return Err(StoreFailure::Conflict.to_error(&kind, &namespace, &name));
        }

        let mut next = merge(current, object);
        next.meta_mut().resource_version = Some(state.next_version.to_string());
        state.next_version += 1;
        state.objects.insert(key, next.clone());
        Ok(next)
    }
}

#[async_trait::async_trait]
impl<K: StatusObject> ObjectStore<K> for FakeStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        let kind = K::kind(&()).to_string();
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("get {namespace}/{name}"));
        if let Some(failure) = state.failures.get("get") {
            return Err(failure.to_error(&kind, namespace, name));
        }
        state
            .objects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn update(&self, object: &K) -> Result<K, StoreError> {
        // The status subresource is not writable through a plain update
        self.write("update", object, |current, incoming| {
            let mut next = incoming.clone();
            next.copy_status_from(current);
            next
        })
    }

    async fn update_status(&self, object: &K) -> Result<K, StoreError> {
        self.write("update_status", object, |current, incoming| {
            let mut next = current.clone();
            next.copy_status_from(incoming);
            next
        })
    }
}

#[derive(Default)]
struct ControlPlaneState {
    routers: BTreeMap<(String, String), RemoteVirtualRouter>,
    routes: BTreeMap<(String, String, String), RemoteRoute>,
    services: BTreeMap<(String, String), RemoteVirtualService>,
    calls: Vec<String>,
    failures: HashMap<String, ControlPlaneError>,
    nth_failures: HashMap<String, (usize, ControlPlaneError)>,
    created_status: Option<ResourceStatus>,
}

/// [`ControlPlane`] over in-memory maps.
#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<ControlPlaneState>,
}

fn not_found(kind: &str, name: &str, mesh: &str) -> ControlPlaneError {
    ControlPlaneError::NotFound {
        kind: kind.to_string(),
        name: name.to_string(),
        mesh: mesh.to_string(),
    }
}

/// An unexpected remote failure.
pub fn api_error(status: u16) -> ControlPlaneError {
    ControlPlaneError::Api {
        method: "PUT".to_string(),
        path: "/v20190125/meshes".to_string(),
        status,
        message: "injected failure".to_string(),
    }
}

impl FakeControlPlane {
    /// Status given to objects created from now on (default `ACTIVE`).
    pub fn set_created_status(&self, status: ResourceStatus) {
        self.state.lock().unwrap().created_status = Some(status);
    }

    /// Make `operation` on the object called `name` fail with `error`.
    pub fn fail(&self, operation: &str, name: &str, error: ControlPlaneError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(format!("{operation} {name}"), error);
    }

    /// Make only the `n`th call (1-based, counted from now) of `operation` on
    /// `name` fail with `error`.
    pub fn fail_nth(&self, operation: &str, name: &str, n: usize, error: ControlPlaneError) {
        self.state
            .lock()
            .unwrap()
            .nth_failures
            .insert(format!("{operation} {name}"), (n, error));
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.failures.clear();
        state.nth_failures.clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls to `operation`, in order.
    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        let prefix = format!("{operation} ");
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(&prefix))
            .collect()
    }

    /// Calls that changed remote state.
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("get"))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn insert_router(&self, mesh: &str, name: &str, status: ResourceStatus) {
        self.state.lock().unwrap().routers.insert(
            (mesh.to_string(), name.to_string()),
            RemoteVirtualRouter {
                name: name.to_string(),
                mesh_name: mesh.to_string(),
                status,
            },
        );
    }

    pub fn insert_route(&self, mesh: &str, route: RemoteRoute) {
        self.state.lock().unwrap().routes.insert(
            (
                mesh.to_string(),
                route.virtual_router_name.clone(),
                route.name.clone(),
            ),
            route,
        );
    }

    pub fn insert_virtual_service(
        &self,
        mesh: &str,
        name: &str,
        virtual_router_name: Option<&str>,
        status: ResourceStatus,
    ) {
        self.state.lock().unwrap().services.insert(
            (mesh.to_string(), name.to_string()),
            RemoteVirtualService {
                name: name.to_string(),
                mesh_name: mesh.to_string(),
                virtual_router_name: virtual_router_name.map(str::to_string),
                status,
            },
        );
    }

    pub fn router(&self, mesh: &str, name: &str) -> Option<RemoteVirtualRouter> {
        let state = self.state.lock().unwrap();
        state
            .routers
            .get(&(mesh.to_string(), name.to_string()))
            .cloned()
    }

    pub fn routes(&self, mesh: &str, router: &str) -> Vec<RemoteRoute> {
        let state = self.state.lock().unwrap();
        state
            .routes
            .iter()
            .filter(|((m, r, _), _)| m == mesh && r == router)
            .map(|(_, route)| route.clone())
            .collect()
    }

    pub fn virtual_service(&self, mesh: &str, name: &str) -> Option<RemoteVirtualService> {
        let state = self.state.lock().unwrap();
        state
            .services
            .get(&(mesh.to_string(), name.to_string()))
            .cloned()
    }

    /// Record the call and return the injected failure, if any.
    fn enter(&self, operation: &str, name: &str) -> Result<ResourceStatus, ControlPlaneError> {
        let mut state = self.state.lock().unwrap();
        let call = format!("{operation} {name}");
        state.calls.push(call.clone());
        if let Some(error) = state.failures.get(&call) {
            return Err(error.clone());
        }
        if let Some((remaining, error)) = state.nth_failures.get_mut(&call) {
            *remaining -= 1;
            if *remaining == 0 {
                let error = error.clone();
                state.nth_failures.remove(&call);
                return Err(error);
            }
        }
        Ok(state.created_status.unwrap_or(ResourceStatus::Active))
    }
}

#[async_trait::async_trait]
impl ControlPlane for FakeControlPlane {
    async fn get_virtual_router(
        &self,
        name: &str,
        mesh_name: &str,
    ) -> Result<RemoteVirtualRouter, ControlPlaneError> {
        self.enter("get_virtual_router", name)?;
        self.router(mesh_name, name)
            .ok_or_else(|| not_found("VirtualRouter", name, mesh_name))
    }

    async fn create_virtual_router(
        &self,
        name: &str,
        mesh_name: &str,
    ) -> Result<RemoteVirtualRouter, ControlPlaneError> {
        let status = self.enter("create_virtual_router", name)?;
        self.insert_router(mesh_name, name, status);
        self.router(mesh_name, name)
            .ok_or_else(|| not_found("VirtualRouter", name, mesh_name))
    }

    async fn delete_virtual_router(
        &self,
        name: &str,
        mesh_name: &str,
    ) -> Result<(), ControlPlaneError> {
        self.enter("delete_virtual_router", name)?;
        let mut state = self.state.lock().unwrap();
        state
            .routers
            .remove(&(mesh_name.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found("VirtualRouter", name, mesh_name))
    }

    async fn get_routes_for_virtual_router(
        &self,
        virtual_router_name: &str,
        mesh_name: &str,
    ) -> Result<Vec<RemoteRoute>, ControlPlaneError> {
        self.enter("get_routes_for_virtual_router", virtual_router_name)?;
        if self.router(mesh_name, virtual_router_name).is_none() {
            return Err(not_found("VirtualRouter", virtual_router_name, mesh_name));
        }
        Ok(self.routes(mesh_name, virtual_router_name))
    }

    async fn create_route(
        &self,
        route: &Route,
        virtual_router_name: &str,
        mesh_name: &str,
    ) -> Result<RemoteRoute, ControlPlaneError> {
        let status = self.enter("create_route", &route.name)?;
        let remote = RemoteRoute::from_route(route, virtual_router_name, status);
        self.insert_route(mesh_name, remote.clone());
        Ok(remote)
    }

    async fn update_route(
        &self,
        route: &Route,
        virtual_router_name: &str,
        mesh_name: &str,
    ) -> Result<RemoteRoute, ControlPlaneError> {
        self.enter("update_route", &route.name)?;
        let key = (
            mesh_name.to_string(),
            virtual_router_name.to_string(),
            route.name.clone(),
        );
        let mut state = self.state.lock().unwrap();
        let Some(existing) = state.routes.get(&key) else {
            return Err(not_found("Route", &route.name, mesh_name));
        };
        let remote = RemoteRoute::from_route(route, virtual_router_name, existing.status);
        state.routes.insert(key, remote.clone());
        Ok(remote)
    }

    async fn delete_route(
        &self,
        name: &str,
        virtual_router_name: &str,
        mesh_name: &str,
    ) -> Result<(), ControlPlaneError> {
        self.enter("delete_route", name)?;
        let mut state = self.state.lock().unwrap();
        state
            .routes
            .remove(&(
                mesh_name.to_string(),
                virtual_router_name.to_string(),
                name.to_string(),
            ))
            .map(|_| ())
            .ok_or_else(|| not_found("Route", name, mesh_name))
    }

    async fn get_virtual_service(
        &self,
        name: &str,
        mesh_name: &str,
    ) -> Result<RemoteVirtualService, ControlPlaneError> {
        self.enter("get_virtual_service", name)?;
        self.virtual_service(mesh_name, name)
            .ok_or_else(|| not_found("VirtualService", name, mesh_name))
    }

    async fn create_virtual_service(
        &self,
        desired: &DesiredVirtualService,
        mesh_name: &str,
    ) -> Result<RemoteVirtualService, ControlPlaneError> {
        let status = self.enter("create_virtual_service", &desired.name)?;
        self.insert_virtual_service(
            mesh_name,
            &desired.name,
            Some(&desired.virtual_router_name),
            status,
        );
        self.virtual_service(mesh_name, &desired.name)
            .ok_or_else(|| not_found("VirtualService", &desired.name, mesh_name))
    }

    async fn update_virtual_service(
        &self,
        desired: &DesiredVirtualService,
        mesh_name: &str,
    ) -> Result<RemoteVirtualService, ControlPlaneError> {
        self.enter("update_virtual_service", &desired.name)?;
        let mut state = self.state.lock().unwrap();
        let key = (mesh_name.to_string(), desired.name.clone());
        let Some(existing) = state.services.get_mut(&key) else {
            return Err(not_found("VirtualService", &desired.name, mesh_name));
        };
        existing.virtual_router_name = Some(desired.virtual_router_name.clone());
        Ok(existing.clone())
    }

    async fn delete_virtual_service(
        &self,
        name: &str,
        mesh_name: &str,
    ) -> Result<(), ControlPlaneError> {
        self.enter("delete_virtual_service", name)?;
        let mut state = self.state.lock().unwrap();
        state
            .services
            .remove(&(mesh_name.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found("VirtualService", name, mesh_name))
    }
}

/// Fakes wired into a [`Context`].
pub struct Harness {
    pub virtual_services: Arc<FakeStore<VirtualService>>,
    pub meshes: Arc<FakeStore<Mesh>>,
    pub control_plane: Arc<FakeControlPlane>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            virtual_services: Arc::new(FakeStore::default()),
            meshes: Arc::new(FakeStore::default()),
            control_plane: Arc::new(FakeControlPlane::default()),
        }
    }

    pub fn context(&self) -> Arc<Context> {
        Arc::new(Context {
            virtual_services: self.virtual_services.clone(),
            meshes: self.meshes.clone(),
            control_plane: self.control_plane.clone(),
        })
    }

    /// Current stored copy of a `VirtualService` in [`NAMESPACE`].
    pub fn vs(&self, name: &str) -> VirtualService {
        self.virtual_services.object(NAMESPACE, name).unwrap()
    }
}

pub fn route(name: &str, prefix: &str, targets: &[(&str, i64)]) -> Route {
    Route {
        name: name.to_string(),
        route_match: RouteMatch {
            prefix: prefix.to_string(),
        },
        action: RouteAction {
            weighted_targets: targets
                .iter()
                .map(|(target, weight)| WeightedTarget {
                    target: (*target).to_string(),
                    weight: *weight,
                })
                .collect(),
        },
    }
}

pub fn remote_route(
    router: &str,
    name: &str,
    prefix: &str,
    targets: &[(&str, i64)],
    status: ResourceStatus,
) -> RemoteRoute {
    RemoteRoute::from_route(&route(name, prefix, targets), router, status)
}

pub fn virtual_service(name: &str, mesh_name: &str, routes: Vec<Route>) -> VirtualService {
    let mut vs = VirtualService::new(
        name,
        VirtualServiceSpec {
            mesh_name: mesh_name.to_string(),
            virtual_router: None,
            routes,
            provider: None,
        },
    );
    vs.metadata.namespace = Some(NAMESPACE.to_string());
    vs
}

pub fn mesh(name: &str, active: bool) -> Mesh {
    let mut mesh = Mesh::new(
        name,
        MeshSpec {
            service_discovery_type: None,
            egress_filter: None,
        },
    );
    mesh.metadata.namespace = Some(NAMESPACE.to_string());
    mesh.status = Some(MeshStatus {
        conditions: vec![Condition {
            r#type: CONDITION_MESH_ACTIVE.to_string(),
            status: if active { "True" } else { "False" }.to_string(),
            reason: None,
            message: None,
            last_transition_time: Some(Utc::now().to_rfc3339()),
        }],
    });
    mesh
}

/// Mark an object as being deleted.
pub fn deleting<K: Resource>(mut object: K) -> K {
    let at = Timestamp::from_second(1_767_225_600).unwrap();
    object.meta_mut().deletion_timestamp = Some(Time(at));
    object
}
