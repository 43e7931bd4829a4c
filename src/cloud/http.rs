// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! REST client for the remote control plane.
//!
//! All calls use the `v20190125` path layout:
//!
//! | Object          | Collection                                               |
//! |-----------------|----------------------------------------------------------|
//! | Virtual router  | `/v20190125/meshes/{mesh}/virtualRouters`                |
//! | Route           | `/v20190125/meshes/{mesh}/virtualRouter/{router}/routes` |
//! | Virtual service | `/v20190125/meshes/{mesh}/virtualServices`               |
//!
//! Creates are `PUT` on the collection, updates are `PUT` on the item,
//! reads are `GET` and deletes are `DELETE` on the item. A 404 response maps
//! to [`ControlPlaneError::NotFound`].

use super::{
    ControlPlane, DesiredVirtualService, RemoteRoute, RemoteVirtualRouter, RemoteVirtualService,
    ResourceStatus,
};
use crate::constants::{
    CONTROL_PLANE_API_VERSION, CONTROL_PLANE_REQUEST_TIMEOUT_SECS, DEFAULT_ROUTER_LISTENER_PORT,
    DEFAULT_ROUTER_LISTENER_PROTOCOL, KIND_ROUTE, KIND_VIRTUAL_ROUTER, KIND_VIRTUAL_SERVICE,
};
use crate::crd::{Route, WeightedTarget};
use crate::errors::ControlPlaneError;
use crate::metrics::record_remote_operation;
use anyhow::{Context as _, Result};
use reqwest::{Client as HttpClient, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

/// Connection settings for [`HttpControlPlane`].
#[derive(Clone, Debug)]
pub struct HttpControlPlaneConfig {
    /// Base URL of the control plane API, e.g. `https://appmesh.us-east-1.amazonaws.com`.
    pub endpoint: String,
    /// Optional bearer token sent as `Authorization: Bearer <token>`.
    pub token: Option<String>,
    /// Listener port configured on routers this client creates.
    pub router_listener_port: u16,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpControlPlaneConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            router_listener_port: DEFAULT_ROUTER_LISTENER_PORT,
            timeout: Duration::from_secs(CONTROL_PLANE_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// [`ControlPlane`] implementation over HTTP.
#[derive(Clone, Debug)]
pub struct HttpControlPlane {
    client: HttpClient,
    base_url: Url,
    token: Option<String>,
    router_listener_port: u16,
}

/// Identity of the object a request targets, used for `NotFound` errors and metrics.
struct Target<'a> {
    kind: &'a str,
    operation: &'a str,
    name: &'a str,
    mesh: &'a str,
}

impl HttpControlPlane {
    /// Build a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not an absolute http(s) URL or the
    /// HTTP client cannot be constructed.
    pub fn new(config: HttpControlPlaneConfig) -> Result<Self> {
        let base_url = Url::parse(&config.endpoint)
            .with_context(|| format!("invalid control plane endpoint '{}'", config.endpoint))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            anyhow::bail!(
                "control plane endpoint '{}' must be an http(s) URL",
                config.endpoint
            );
        }

        let client = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build control plane HTTP client")?;

        Ok(Self {
            client,
            base_url,
            token: config.token.filter(|t| !t.is_empty()),
            router_listener_port: config.router_listener_port,
        })
    }

    /// Build `{base}/v20190125/meshes/{mesh}/{segments...}`.
    fn mesh_url(&self, mesh_name: &str, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .push(CONTROL_PLANE_API_VERSION)
                .push("meshes")
                .push(mesh_name)
                .extend(segments);
        }
        url
    }

    async fn send<B, T>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        target: &Target<'_>,
    ) -> Result<T, ControlPlaneError>
    where
        B: Serialize + std::fmt::Debug + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.send_raw(method, url, body, target).await?;
        serde_json::from_str(&text).map_err(|e| ControlPlaneError::Decode {
            kind: target.kind.to_string(),
            name: target.name.to_string(),
            reason: e.to_string(),
        })
    }

    async fn send_raw<B>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        target: &Target<'_>,
    ) -> Result<String, ControlPlaneError>
    where
        B: Serialize + std::fmt::Debug + ?Sized,
    {
        info!(
            method = %method,
            url = %url,
            body = ?body,
            auth_enabled = self.token.is_some(),
            "HTTP request to control plane"
        );

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            error!(method = %method, url = %url, error = %e, "Control plane request failed");
            record_remote_operation(target.kind, target.operation, "error");
            ControlPlaneError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            record_remote_operation(target.kind, target.operation, "error");
            ControlPlaneError::Transport {
                url: url.to_string(),
                reason: format!("failed to read response body: {e}"),
            }
        })?;

        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(
                kind = target.kind,
                name = target.name,
                mesh = target.mesh,
                "Control plane object not found"
            );
            record_remote_operation(target.kind, target.operation, "not_found");
            return Err(ControlPlaneError::NotFound {
                kind: target.kind.to_string(),
                name: target.name.to_string(),
                mesh: target.mesh.to_string(),
            });
        }

        if !status.is_success() {
            error!(
                method = %method,
                url = %url,
                status = %status,
                body = %text,
                "Control plane returned an error"
            );
            record_remote_operation(target.kind, target.operation, "error");
            return Err(ControlPlaneError::Api {
                method: method.to_string(),
                path: url.path().to_string(),
                status: status.as_u16(),
                message: text,
            });
        }

        debug!(method = %method, url = %url, status = %status, "Control plane request succeeded");
        record_remote_operation(target.kind, target.operation, "success");
        Ok(text)
    }

    async fn describe_route(
        &self,
        name: &str,
        virtual_router_name: &str,
        mesh_name: &str,
    ) -> Result<RemoteRoute, ControlPlaneError> {
        let url = self.mesh_url(
            mesh_name,
            &["virtualRouter", virtual_router_name, "routes", name],
        );
        let target = Target {
            kind: KIND_ROUTE,
            operation: "get",
            name,
            mesh: mesh_name,
        };
        let envelope: RouteEnvelope = self.send::<(), _>(Method::GET, url, None, &target).await?;
        envelope.route.into_remote()
    }
}

#[async_trait::async_trait]
impl ControlPlane for HttpControlPlane {
    async fn get_virtual_router(
        &self,
        name: &str,
        mesh_name: &str,
    ) -> Result<RemoteVirtualRouter, ControlPlaneError> {
        let url = self.mesh_url(mesh_name, &["virtualRouters", name]);
        let target = Target {
            kind: KIND_VIRTUAL_ROUTER,
            operation: "get",
            name,
            mesh: mesh_name,
        };
        let envelope: VirtualRouterEnvelope =
            self.send::<(), _>(Method::GET, url, None, &target).await?;
        envelope.virtual_router.into_remote()
    }

    async fn create_virtual_router(
        &self,
        name: &str,
        mesh_name: &str,
    ) -> Result<RemoteVirtualRouter, ControlPlaneError> {
        let url = self.mesh_url(mesh_name, &["virtualRouters"]);
        let target = Target {
            kind: KIND_VIRTUAL_ROUTER,
            operation: "create",
            name,
            mesh: mesh_name,
        };
        let body = CreateVirtualRouterInput {
            virtual_router_name: name.to_string(),
            spec: VirtualRouterSpecWire {
                listeners: vec![ListenerWire {
                    port_mapping: PortMappingWire {
                        port: self.router_listener_port,
                        protocol: DEFAULT_ROUTER_LISTENER_PROTOCOL.to_string(),
                    },
                }],
            },
        };
        let envelope: VirtualRouterEnvelope =
            self.send(Method::PUT, url, Some(&body), &target).await?;
        envelope.virtual_router.into_remote()
    }

    async fn delete_virtual_router(
        &self,
        name: &str,
        mesh_name: &str,
    ) -> Result<(), ControlPlaneError> {
        let url = self.mesh_url(mesh_name, &["virtualRouters", name]);
        let target = Target {
            kind: KIND_VIRTUAL_ROUTER,
            operation: "delete",
            name,
            mesh: mesh_name,
        };
        self.send_raw::<()>(Method::DELETE, url, None, &target)
            .await
            .map(|_| ())
    }

    async fn get_routes_for_virtual_router(
        &self,
        virtual_router_name: &str,
        mesh_name: &str,
    ) -> Result<Vec<RemoteRoute>, ControlPlaneError> {
        let target = Target {
            kind: KIND_VIRTUAL_ROUTER,
            operation: "list",
            name: virtual_router_name,
            mesh: mesh_name,
        };

        let mut names = Vec::new();
        let mut next_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        loop {
            let mut url =
                self.mesh_url(mesh_name, &["virtualRouter", virtual_router_name, "routes"]);
            if let Some(token) = &next_token {
                url.query_pairs_mut().append_pair("nextToken", token);
            }
            let page: ListRoutesOutput = self.send::<(), _>(Method::GET, url, None, &target).await?;
            names.extend(page.routes.into_iter().map(|r| r.route_name));
            match page.next_token.filter(|t| !t.is_empty()) {
                Some(token) if !seen_tokens.insert(token.clone()) => {
                    return Err(ControlPlaneError::Decode {
                        kind: KIND_VIRTUAL_ROUTER.to_string(),
                        name: virtual_router_name.to_string(),
                        reason: format!("route listing repeated nextToken '{token}'"),
                    });
                }
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        debug!(
            virtual_router = virtual_router_name,
            mesh = mesh_name,
            count = names.len(),
            "Listed routes for virtual router"
        );

        let mut routes = Vec::with_capacity(names.len());
        for name in names {
            match self
                .describe_route(&name, virtual_router_name, mesh_name)
                .await
            {
                Ok(route) => routes.push(route),
                // Deleted between list and describe
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(routes)
    }

    async fn create_route(
        &self,
        route: &Route,
        virtual_router_name: &str,
        mesh_name: &str,
    ) -> Result<RemoteRoute, ControlPlaneError> {
        let url = self.mesh_url(mesh_name, &["virtualRouter", virtual_router_name, "routes"]);
        let target = Target {
            kind: KIND_ROUTE,
            operation: "create",
            name: &route.name,
            mesh: mesh_name,
        };
        let body = CreateRouteInput {
            route_name: route.name.clone(),
            spec: RouteSpecWire::from_route(route),
        };
        let envelope: RouteEnvelope = self.send(Method::PUT, url, Some(&body), &target).await?;
        envelope.route.into_remote()
    }

    async fn update_route(
        &self,
        route: &Route,
        virtual_router_name: &str,
        mesh_name: &str,
    ) -> Result<RemoteRoute, ControlPlaneError> {
        let url = self.mesh_url(
            mesh_name,
            &["virtualRouter", virtual_router_name, "routes", &route.name],
        );
        let target = Target {
            kind: KIND_ROUTE,
            operation: "update",
            name: &route.name,
            mesh: mesh_name,
        };
        let body = UpdateInput {
            spec: RouteSpecWire::from_route(route),
        };
        let envelope: RouteEnvelope = self.send(Method::PUT, url, Some(&body), &target).await?;
        envelope.route.into_remote()
    }

    async fn delete_route(
        &self,
        name: &str,
        virtual_router_name: &str,
        mesh_name: &str,
    ) -> Result<(), ControlPlaneError> {
        let url = self.mesh_url(
            mesh_name,
            &["virtualRouter", virtual_router_name, "routes", name],
        );
        let target = Target {
            kind: KIND_ROUTE,
            operation: "delete",
            name,
            mesh: mesh_name,
        };
        self.send_raw::<()>(Method::DELETE, url, None, &target)
            .await
            .map(|_| ())
    }

    async fn get_virtual_service(
        &self,
        name: &str,
        mesh_name: &str,
    ) -> Result<RemoteVirtualService, ControlPlaneError> {
        let url = self.mesh_url(mesh_name, &["virtualServices", name]);
        let target = Target {
            kind: KIND_VIRTUAL_SERVICE,
            operation: "get",
            name,
            mesh: mesh_name,
        };
        let envelope: VirtualServiceEnvelope =
            self.send::<(), _>(Method::GET, url, None, &target).await?;
        envelope.virtual_service.into_remote()
    }

    async fn create_virtual_service(
        &self,
        desired: &DesiredVirtualService,
        mesh_name: &str,
    ) -> Result<RemoteVirtualService, ControlPlaneError> {
        let url = self.mesh_url(mesh_name, &["virtualServices"]);
        let target = Target {
            kind: KIND_VIRTUAL_SERVICE,
            operation: "create",
            name: &desired.name,
            mesh: mesh_name,
        };
        let body = CreateVirtualServiceInput {
            virtual_service_name: desired.name.clone(),
            spec: VirtualServiceSpecWire::from_desired(desired),
        };
        let envelope: VirtualServiceEnvelope =
            self.send(Method::PUT, url, Some(&body), &target).await?;
        envelope.virtual_service.into_remote()
    }

    async fn update_virtual_service(
        &self,
        desired: &DesiredVirtualService,
        mesh_name: &str,
    ) -> Result<RemoteVirtualService, ControlPlaneError> {
        let url = self.mesh_url(mesh_name, &["virtualServices", &desired.name]);
        let target = Target {
            kind: KIND_VIRTUAL_SERVICE,
            operation: "update",
            name: &desired.name,
            mesh: mesh_name,
        };
        let body = UpdateInput {
            spec: VirtualServiceSpecWire::from_desired(desired),
        };
        let envelope: VirtualServiceEnvelope =
            self.send(Method::PUT, url, Some(&body), &target).await?;
        envelope.virtual_service.into_remote()
    }

    async fn delete_virtual_service(
        &self,
        name: &str,
        mesh_name: &str,
    ) -> Result<(), ControlPlaneError> {
        let url = self.mesh_url(mesh_name, &["virtualServices", name]);
        let target = Target {
            kind: KIND_VIRTUAL_SERVICE,
            operation: "delete",
            name,
            mesh: mesh_name,
        };
        self.send_raw::<()>(Method::DELETE, url, None, &target)
            .await
            .map(|_| ())
    }
}

// Wire format

fn parse_status(
    kind: &str,
    name: &str,
    status: &StatusWire,
) -> Result<ResourceStatus, ControlPlaneError> {
    ResourceStatus::from_wire(&status.status).ok_or_else(|| ControlPlaneError::Decode {
        kind: kind.to_string(),
        name: name.to_string(),
        reason: format!("unknown status '{}'", status.status),
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusWire {
    status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateInput<S: Serialize> {
    spec: S,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateVirtualRouterInput {
    virtual_router_name: String,
    spec: VirtualRouterSpecWire,
}

#[derive(Debug, Serialize, Deserialize)]
struct VirtualRouterSpecWire {
    #[serde(default)]
    listeners: Vec<ListenerWire>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListenerWire {
    port_mapping: PortMappingWire,
}

#[derive(Debug, Serialize, Deserialize)]
struct PortMappingWire {
    port: u16,
    protocol: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VirtualRouterEnvelope {
    virtual_router: VirtualRouterData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VirtualRouterData {
    virtual_router_name: String,
    mesh_name: String,
    status: StatusWire,
}

impl VirtualRouterData {
    fn into_remote(self) -> Result<RemoteVirtualRouter, ControlPlaneError> {
        let status = parse_status(KIND_VIRTUAL_ROUTER, &self.virtual_router_name, &self.status)?;
        Ok(RemoteVirtualRouter {
            name: self.virtual_router_name,
            mesh_name: self.mesh_name,
            status,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRouteInput {
    route_name: String,
    spec: RouteSpecWire,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteSpecWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    http_route: Option<HttpRouteWire>,
}

impl RouteSpecWire {
    fn from_route(route: &Route) -> Self {
        Self {
            http_route: Some(HttpRouteWire {
                route_match: HttpRouteMatchWire {
                    prefix: route.prefix().to_string(),
                },
                action: HttpRouteActionWire {
                    weighted_targets: route
                        .action
                        .weighted_targets
                        .iter()
                        .map(|t| WeightedTargetWire {
                            virtual_node: t.target.clone(),
                            weight: t.weight,
                        })
                        .collect(),
                },
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct HttpRouteWire {
    #[serde(rename = "match")]
    route_match: HttpRouteMatchWire,
    action: HttpRouteActionWire,
}

#[derive(Debug, Serialize, Deserialize)]
struct HttpRouteMatchWire {
    prefix: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HttpRouteActionWire {
    #[serde(default)]
    weighted_targets: Vec<WeightedTargetWire>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeightedTargetWire {
    virtual_node: String,
    weight: i64,
}

#[derive(Debug, Deserialize)]
struct RouteEnvelope {
    route: RouteData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteData {
    route_name: String,
    virtual_router_name: String,
    spec: RouteSpecWire,
    status: StatusWire,
}

impl RouteData {
    fn into_remote(self) -> Result<RemoteRoute, ControlPlaneError> {
        let status = parse_status(KIND_ROUTE, &self.route_name, &self.status)?;
        let (prefix, weighted_targets) = match self.spec.http_route {
            Some(http) => (
                http.route_match.prefix,
                http.action
                    .weighted_targets
                    .into_iter()
                    .map(|t| WeightedTarget {
                        target: t.virtual_node,
                        weight: t.weight,
                    })
                    .collect(),
            ),
            None => (String::new(), Default::default()),
        };
        Ok(RemoteRoute {
            name: self.route_name,
            virtual_router_name: self.virtual_router_name,
            prefix,
            weighted_targets,
            status,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRoutesOutput {
    #[serde(default)]
    routes: Vec<RouteRefWire>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteRefWire {
    route_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateVirtualServiceInput {
    virtual_service_name: String,
    spec: VirtualServiceSpecWire,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct VirtualServiceSpecWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider: Option<ProviderWire>,
}

impl VirtualServiceSpecWire {
    fn from_desired(desired: &DesiredVirtualService) -> Self {
        Self {
            provider: Some(ProviderWire {
                virtual_router: Some(VirtualRouterProviderWire {
                    virtual_router_name: desired.virtual_router_name.clone(),
                }),
                virtual_node: None,
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    virtual_router: Option<VirtualRouterProviderWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    virtual_node: Option<VirtualNodeProviderWire>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VirtualRouterProviderWire {
    virtual_router_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VirtualNodeProviderWire {
    virtual_node_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VirtualServiceEnvelope {
    virtual_service: VirtualServiceData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VirtualServiceData {
    virtual_service_name: String,
    mesh_name: String,
    #[serde(default)]
    spec: VirtualServiceSpecWire,
    status: StatusWire,
}

impl VirtualServiceData {
    fn into_remote(self) -> Result<RemoteVirtualService, ControlPlaneError> {
        let status = parse_status(KIND_VIRTUAL_SERVICE, &self.virtual_service_name, &self.status)?;
        let virtual_router_name = self
            .spec
            .provider
            .and_then(|p| p.virtual_router)
            .map(|r| r.virtual_router_name);
        Ok(RemoteVirtualService {
            name: self.virtual_service_name,
            mesh_name: self.mesh_name,
            virtual_router_name,
            status,
        })
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod http_tests;
