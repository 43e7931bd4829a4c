// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the meshroute operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Kind Constants
// ============================================================================

/// Kind name for `VirtualService` resource
pub const KIND_VIRTUAL_SERVICE: &str = "VirtualService";

/// Kind name used for remote virtual routers in errors and metrics
pub const KIND_VIRTUAL_ROUTER: &str = "VirtualRouter";

/// Kind name used for remote routes in logs and metrics
pub const KIND_ROUTE: &str = "Route";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer guarding remote cleanup of a `VirtualService`
pub const VIRTUAL_SERVICE_FINALIZER: &str = "appmesh.firestoned.io/virtualservice-finalizer";

// ============================================================================
// Status Conditions
// ============================================================================

/// Condition type on a `Mesh` reporting that the remote mesh is usable
pub const CONDITION_MESH_ACTIVE: &str = "MeshActive";

/// Condition status value `True`
pub const CONDITION_STATUS_TRUE: &str = "True";

// ============================================================================
// Control Plane API Constants
// ============================================================================

/// Version path segment of the control plane REST API
pub const CONTROL_PLANE_API_VERSION: &str = "v20190125";

/// Default listener port for virtual routers created by the operator
pub const DEFAULT_ROUTER_LISTENER_PORT: u16 = 80;

/// Default listener protocol for virtual routers created by the operator
pub const DEFAULT_ROUTER_LISTENER_PROTOCOL: &str = "http";

/// Timeout for a single control plane request
pub const CONTROL_PLANE_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Controller Error Handling Constants
// ============================================================================

/// Requeue duration after a retryable reconciliation error
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue duration after a validation error (needs a spec or parent change)
pub const VALIDATION_REQUEUE_DURATION_SECS: u64 = 300;

/// Requeue duration once every condition reports `True`
pub const READY_REQUEUE_DURATION_SECS: u64 = 300;

/// Requeue duration while any condition is not yet `True`
pub const NOT_READY_REQUEUE_DURATION_SECS: u64 = 30;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default port for the Prometheus metrics server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path of the Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path of the liveness endpoint
pub const HEALTH_SERVER_PATH: &str = "/healthz";

/// Bind address of the metrics server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
