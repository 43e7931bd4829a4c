// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration from command-line flags and environment variables.

use crate::cloud::http::HttpControlPlaneConfig;
use crate::constants::{
    CONTROL_PLANE_REQUEST_TIMEOUT_SECS, DEFAULT_ROUTER_LISTENER_PORT, METRICS_SERVER_PORT,
};
use clap::Parser;
use std::time::Duration;

/// Runtime settings of the meshroute operator.
///
/// Every flag can also be set through the environment variable shown in `--help`.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "meshroute", version, about = "Service mesh VirtualService operator")]
pub struct OperatorConfig {
    /// Base URL of the service mesh control plane API.
    #[arg(long, env = "MESH_API_ENDPOINT")]
    pub mesh_api_endpoint: String,

    /// Bearer token sent to the control plane.
    #[arg(long, env = "MESH_API_TOKEN", hide_env_values = true)]
    pub mesh_api_token: Option<String>,

    /// Per-request timeout for control plane calls, in seconds.
    #[arg(long, env = "MESH_API_TIMEOUT_SECS", default_value_t = CONTROL_PLANE_REQUEST_TIMEOUT_SECS)]
    pub mesh_api_timeout_secs: u64,

    /// Port of the `/metrics` and `/healthz` server.
    #[arg(long, env = "METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    pub metrics_port: u16,

    /// Only watch services, nodes and routers in this namespace. All namespaces
    /// are watched when unset. Meshes are always watched cluster-wide.
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Listener port configured on virtual routers created by the operator.
    #[arg(long, env = "ROUTER_LISTENER_PORT", default_value_t = DEFAULT_ROUTER_LISTENER_PORT)]
    pub router_listener_port: u16,
}

impl OperatorConfig {
    /// Control plane client settings derived from this configuration.
    #[must_use]
    pub fn control_plane(&self) -> HttpControlPlaneConfig {
        HttpControlPlaneConfig {
            endpoint: self.mesh_api_endpoint.clone(),
            token: self.mesh_api_token.clone(),
            router_listener_port: self.router_listener_port,
            timeout: Duration::from_secs(self.mesh_api_timeout_secs),
        }
    }

    /// Namespace to watch, `None` for the whole cluster.
    #[must_use]
    pub fn watch_namespace(&self) -> Option<String> {
        self.watch_namespace
            .as_deref()
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
