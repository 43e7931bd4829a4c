// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for object store, control plane and reconciliation failures.
//!
//! The reconciler branches on these kinds:
//! - **Not found** - expected; leads to a create or is treated as already deleted
//! - **Conflict** - optimistic concurrency collision; the caller retries the pass
//! - **Validation** - needs a spec or parent change before another pass can succeed
//! - **Partial route failure** - some route operations failed; the rest were applied
//! - **Unexpected remote error** - anything else from the control plane

use std::time::Duration;
use thiserror::Error;

use crate::constants::{ERROR_REQUEUE_DURATION_SECS, VALIDATION_REQUEUE_DURATION_SECS};

/// Errors returned by an [`ObjectStore`](crate::store::ObjectStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The object does not exist.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    /// The object changed since it was read (HTTP 409).
    #[error("conflict writing {kind} {namespace}/{name}: {message}")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
        message: String,
    },

    /// The object could not be encoded for the write.
    #[error("failed to serialize {kind} {namespace}/{name}: {source}")]
    Serialization {
        kind: String,
        namespace: String,
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Any other Kubernetes API failure.
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl StoreError {
    /// Whether this error means the object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this error is an optimistic concurrency conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors returned by a [`ControlPlane`](crate::cloud::ControlPlane).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlPlaneError {
    /// The remote object does not exist (HTTP 404).
    #[error("{kind} '{name}' not found in mesh '{mesh}'")]
    NotFound {
        kind: String,
        name: String,
        mesh: String,
    },

    /// The control plane rejected the request.
    #[error("control plane returned HTTP {status} for {method} {path}: {message}")]
    Api {
        method: String,
        path: String,
        status: u16,
        message: String,
    },

    /// The request never produced a response.
    #[error("failed to reach control plane at {url}: {reason}")]
    Transport { url: String, reason: String },

    /// The response body did not have the expected shape.
    #[error("unexpected response for {kind} '{name}': {reason}")]
    Decode {
        kind: String,
        name: String,
        reason: String,
    },
}

impl ControlPlaneError {
    /// Whether this error means the remote object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Aggregated failure of a route sync pass.
///
/// Every route operation is attempted; this names each route whose
/// create, update or delete failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("error updating routes: {}", failed.join(" "))]
pub struct RouteSyncError {
    /// Names of the routes whose operation failed, in attempt order.
    pub failed: Vec<String>,
}

/// Errors surfaced by a `VirtualService` reconciliation pass.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A required spec field is missing or invalid.
    #[error("validation error: {0}")]
    Validation(String),

    /// The parent mesh exists but is not active yet.
    #[error("mesh {namespace}/{name} must be active for virtual service {virtual_service}")]
    MeshNotActive {
        namespace: String,
        name: String,
        virtual_service: String,
    },

    /// Reading or writing a Kubernetes object failed.
    #[error("{action}: {source}")]
    Store {
        action: String,
        #[source]
        source: StoreError,
    },

    /// A control plane call failed with something other than not-found.
    #[error("{action}: {source}")]
    ControlPlane {
        action: String,
        #[source]
        source: ControlPlaneError,
    },

    /// One or more route operations failed.
    #[error(transparent)]
    Routes(#[from] RouteSyncError),
}

impl ReconcileError {
    pub(crate) fn store(action: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            action: action.into(),
            source,
        }
    }

    pub(crate) fn control_plane(action: impl Into<String>, source: ControlPlaneError) -> Self {
        Self::ControlPlane {
            action: action.into(),
            source,
        }
    }

    /// Whether another pass could succeed without a spec or parent change.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::MeshNotActive { .. }
            | Self::Store { .. }
            | Self::ControlPlane { .. }
            | Self::Routes(_) => true,
        }
    }

    /// Short label used for the `error_type` metric.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::MeshNotActive { .. } => "mesh_not_active",
            Self::Store { source, .. } if source.is_conflict() => "conflict",
            Self::Store { .. } => "store",
            Self::ControlPlane { .. } => "control_plane",
            Self::Routes(_) => "routes",
        }
    }

    /// Recommended requeue delay for this error.
    #[must_use]
    pub fn requeue_after(&self) -> Duration {
        if self.is_retryable() {
            Duration::from_secs(ERROR_REQUEUE_DURATION_SECS)
        } else {
            Duration::from_secs(VALIDATION_REQUEUE_DURATION_SECS)
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
