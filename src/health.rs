// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP server for Kubernetes probes and Prometheus scraping.
//!
//! - `/healthz` - Liveness probe, 200 while the process is serving
//! - `/metrics` - Prometheus text exposition of [`crate::metrics::METRICS_REGISTRY`]

use crate::constants::{HEALTH_SERVER_PATH, METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH};
use crate::metrics::gather_metrics;
use anyhow::{Context as _, Result};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{error, info};

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler() -> Response {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

/// Router serving the probe and metrics endpoints.
pub fn create_router() -> Router {
    Router::new()
        .route(HEALTH_SERVER_PATH, get(healthz))
        .route(METRICS_SERVER_PATH, get(metrics_handler))
}

/// Serve [`create_router`] on `port` until the listener fails.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server stops with an I/O error.
pub async fn run_health_server(port: u16) -> Result<()> {
    let addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{port}");
    info!(address = %addr, "Starting metrics server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind metrics server to {addr}"))?;
    axum::serve(listener, create_router())
        .await
        .context("metrics server failed")?;

    Ok(())
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod health_tests;
