// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `VirtualService` controller wiring.
//!
//! Watches `VirtualService` objects and maps changes on `Mesh`, `VirtualNode`
//! and `VirtualRouter` objects back to the services that reference them.
//! Each triggered key runs one [`reconcile_virtual_service`] pass.

use crate::constants::{
    KIND_VIRTUAL_SERVICE, NOT_READY_REQUEUE_DURATION_SECS, READY_REQUEUE_DURATION_SECS,
};
use crate::context::{Context, Stores};
use crate::crd::{ConditionStatus, Mesh, VirtualNode, VirtualRouter, VirtualService};
use crate::errors::ReconcileError;
use crate::metrics;
use crate::reconcilers::reconcile_virtual_service;
use anyhow::{Context as _, Result};
use futures::StreamExt;
use kube::api::{Api, ListParams};
use kube::runtime::controller::Action;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Run the `VirtualService` controller until its watch streams end.
///
/// When `namespace` is `None` every namespace is watched.
///
/// # Errors
///
/// Returns an error if `VirtualService` objects cannot be listed at startup,
/// typically because the CRD is not installed or RBAC denies access.
pub async fn run_virtual_service_controller(
    client: Client,
    namespace: Option<String>,
    context: Arc<Context>,
) -> Result<()> {
    info!(
        namespace = namespace.as_deref().unwrap_or("<all>"),
        "Starting VirtualService controller"
    );

    let WatchApis {
        virtual_services,
        meshes,
        virtual_nodes,
        virtual_routers,
    } = WatchApis::new(&client, namespace.as_deref());

    virtual_services
        .list(&ListParams::default().limit(1))
        .await
        .context("failed to list VirtualService objects; is the CRD installed?")?;

    let watcher_config = WatcherConfig::default();
    let controller = Controller::new(virtual_services, watcher_config.clone());
    let stores = Stores::new(controller.store());

    let mesh_stores = stores.clone();
    let node_stores = stores.clone();
    let router_stores = stores;

    controller
        .watches(meshes, watcher_config.clone(), move |mesh| {
            let Some(namespace) = mesh.namespace() else {
                return vec![];
            };
            mesh_stores.virtual_services_in_mesh(&namespace, &mesh.name_any())
        })
        .watches(virtual_nodes, watcher_config.clone(), move |node| {
            let Some(namespace) = node.namespace() else {
                return vec![];
            };
            node_stores.virtual_services_referencing_node(&namespace, &node.name_any())
        })
        .watches(virtual_routers, watcher_config, move |router| {
            let Some(namespace) = router.namespace() else {
                return vec![];
            };
            router_stores.virtual_services_referencing_router(&namespace, &router.name_any())
        })
        .run(reconcile_wrapper, error_policy, context)
        .for_each(|result| {
            if let Err(e) = result {
                debug!("Controller event: {}", e);
            }
            futures::future::ready(())
        })
        .await;

    warn!("VirtualService controller stopped");
    Ok(())
}

/// APIs watched by the controller.
///
/// Meshes are always watched cluster-wide because `meshName: name.namespace`
/// may point outside the watched namespace.
pub(crate) struct WatchApis {
    pub virtual_services: Api<VirtualService>,
    pub meshes: Api<Mesh>,
    pub virtual_nodes: Api<VirtualNode>,
    pub virtual_routers: Api<VirtualRouter>,
}

impl WatchApis {
    pub(crate) fn new(client: &Client, namespace: Option<&str>) -> Self {
        Self {
            virtual_services: api_for(client, namespace),
            meshes: Api::all(client.clone()),
            virtual_nodes: api_for(client, namespace),
            virtual_routers: api_for(client, namespace),
        }
    }
}

fn api_for<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Run one pass for `vs` and pick the next requeue interval.
async fn reconcile_wrapper(
    vs: Arc<VirtualService>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let namespace = vs.namespace().unwrap_or_default();
    let name = vs.name_any();

    match reconcile_virtual_service(&ctx, &namespace, &name).await {
        Ok(()) => {
            metrics::record_reconciliation_success(KIND_VIRTUAL_SERVICE, start.elapsed());

            let ready = ctx
                .virtual_services
                .get(&namespace, &name)
                .await
                .is_ok_and(|current| is_ready(&current));
            if ready {
                debug!("VirtualService {}/{} ready, requeueing in 5 minutes", namespace, name);
                Ok(Action::requeue(Duration::from_secs(
                    READY_REQUEUE_DURATION_SECS,
                )))
            } else {
                debug!("VirtualService {}/{} not ready, requeueing in 30 seconds", namespace, name);
                Ok(Action::requeue(Duration::from_secs(
                    NOT_READY_REQUEUE_DURATION_SECS,
                )))
            }
        }
        Err(e) => {
            metrics::record_reconciliation_error(KIND_VIRTUAL_SERVICE, start.elapsed());
            error!("Failed to reconcile VirtualService {}/{}: {}", namespace, name, e);
            Err(e)
        }
    }
}

/// Error policy: requeue after the delay the error kind recommends.
#[allow(clippy::needless_pass_by_value)] // Signature required by kube::runtime::Controller
fn error_policy(vs: Arc<VirtualService>, err: &ReconcileError, _ctx: Arc<Context>) -> Action {
    let requeue_after = err.requeue_after();
    metrics::record_error(KIND_VIRTUAL_SERVICE, err.error_type());
    metrics::record_reconciliation_requeue(KIND_VIRTUAL_SERVICE, err.error_type());
    error!(
        error = %err,
        virtual_service = %format!("{}/{}", vs.namespace().unwrap_or_default(), vs.name_any()),
        retryable = err.is_retryable(),
        "Reconciliation error - will retry in {}s",
        requeue_after.as_secs()
    );
    Action::requeue(requeue_after)
}

/// A service is ready when every reported condition is `True`.
#[must_use]
pub fn is_ready(vs: &VirtualService) -> bool {
    let conditions = vs.conditions();
    !conditions.is_empty()
        && conditions
            .iter()
            .all(|c| c.status == ConditionStatus::True)
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
