// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use kube::Client;
use meshroute::{
    cloud::http::HttpControlPlane,
    config::OperatorConfig,
    context::Context,
    controller::run_virtual_service_controller,
    crd::{Mesh, VirtualService},
    health::run_health_server,
    store::KubeStore,
};
use std::sync::Arc;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let config = OperatorConfig::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("meshroute-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

fn init_tracing() {
    // Format: timestamp file:line LEVEL message
    //
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Example: RUST_LOG=meshroute=debug
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(config: OperatorConfig) -> Result<()> {
    init_tracing();

    info!("Starting meshroute VirtualService controller");
    debug!(
        endpoint = %config.mesh_api_endpoint,
        auth_enabled = config.mesh_api_token.is_some(),
        metrics_port = config.metrics_port,
        "Loaded operator configuration"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let control_plane = HttpControlPlane::new(config.control_plane())?;
    let context = Arc::new(Context {
        virtual_services: Arc::new(KubeStore::<VirtualService>::new(client.clone())),
        meshes: Arc::new(KubeStore::<Mesh>::new(client.clone())),
        control_plane: Arc::new(control_plane),
    });

    // The controller and the metrics server should never exit
    tokio::select! {
        result = run_virtual_service_controller(client, config.watch_namespace(), context) => {
            error!("CRITICAL: VirtualService controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("VirtualService controller exited unexpectedly without error")
        }
        result = run_health_server(config.metrics_port) => {
            error!("CRITICAL: Metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, stopping");
            Ok(())
        }
    }
}
