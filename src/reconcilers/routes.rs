// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Route reconciliation for a remote virtual router.
//!
//! Desired routes come from `spec.routes`; existing routes come from the
//! control plane. Both sides are keyed by route name and every name in the
//! union gets exactly one action:
//!
//! | Desired | Existing | Action                                        |
//! |---------|----------|-----------------------------------------------|
//! | yes     | no       | create                                        |
//! | yes     | yes      | update if prefix or targets differ, else none |
//! | no      | yes      | delete                                        |
//!
//! Names are processed in sorted order. A failed action does not stop the
//! others; the failures are reported together once every action was tried.

use crate::cloud::{ControlPlane, RemoteRoute};
use crate::crd::Route;
use crate::errors::RouteSyncError;
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// What to do with one route name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteAction<'a> {
    Create(&'a Route),
    Update(&'a Route),
    Unchanged(&'a str),
    Delete(&'a str),
}

impl RouteAction<'_> {
    /// Route name the action applies to.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Create(route) | Self::Update(route) => &route.name,
            Self::Unchanged(name) | Self::Delete(name) => name,
        }
    }
}

/// Names of the routes touched by a successful sync, by action.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteSyncReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub deleted: Vec<String>,
}

impl RouteSyncReport {
    /// Whether the sync changed anything remotely.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !(self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty())
    }
}

/// Whether `observed` must be updated to match `desired`.
///
/// Targets are compared as sets, so their order in the spec does not matter.
#[must_use]
pub fn route_needs_update(desired: &Route, observed: &RemoteRoute) -> bool {
    desired.prefix() != observed.prefix
        || desired.weighted_target_set() != observed.weighted_targets
}

/// Plan the action for every route name in `desired ∪ existing`, sorted by name.
#[must_use]
pub fn plan_routes<'a>(desired: &'a [Route], existing: &'a [RemoteRoute]) -> Vec<RouteAction<'a>> {
    let desired: BTreeMap<&str, &Route> = desired.iter().map(|r| (r.name.as_str(), r)).collect();
    let existing: BTreeMap<&str, &RemoteRoute> =
        existing.iter().map(|r| (r.name.as_str(), r)).collect();

    let mut names: Vec<&str> = desired.keys().chain(existing.keys()).copied().collect();
    names.sort_unstable();
    names.dedup();

    names
        .into_iter()
        .map(|name| match (desired.get(name), existing.get(name)) {
            (Some(&route), None) => RouteAction::Create(route),
            (Some(&route), Some(&observed)) if route_needs_update(route, observed) => {
                RouteAction::Update(route)
            }
            (Some(_), Some(_)) => RouteAction::Unchanged(name),
            (None, _) => RouteAction::Delete(name),
        })
        .collect()
}

/// Converge the routes on `router_name` to `desired`.
///
/// # Errors
///
/// Returns [`RouteSyncError`] naming every route whose create, update or
/// delete failed. The other actions have still been applied.
pub async fn sync_routes(
    control_plane: &dyn ControlPlane,
    mesh_name: &str,
    router_name: &str,
    desired: &[Route],
    existing: &[RemoteRoute],
) -> Result<RouteSyncReport, RouteSyncError> {
    let mut report = RouteSyncReport::default();
    let mut failed = Vec::new();

    for action in plan_routes(desired, existing) {
        let name = action.name().to_string();
        let (outcome, bucket) = match &action {
            RouteAction::Create(route) => {
                info!(
                    "Creating route {} on virtual router {} in mesh {}",
                    name, router_name, mesh_name
                );
                let outcome = control_plane
                    .create_route(route, router_name, mesh_name)
                    .await
                    .map(|_| ());
                (outcome, &mut report.created)
            }
            RouteAction::Update(route) => {
                info!(
                    "Updating route {} on virtual router {} in mesh {}",
                    name, router_name, mesh_name
                );
                let outcome = control_plane
                    .update_route(route, router_name, mesh_name)
                    .await
                    .map(|_| ());
                (outcome, &mut report.updated)
            }
            RouteAction::Unchanged(_) => {
                debug!("Route {} on virtual router {} is up to date", name, router_name);
                (Ok(()), &mut report.unchanged)
            }
            RouteAction::Delete(_) => {
                info!(
                    "Deleting route {} from virtual router {} in mesh {}",
                    name, router_name, mesh_name
                );
                let outcome = control_plane
                    .delete_route(&name, router_name, mesh_name)
                    .await;
                (outcome, &mut report.deleted)
            }
        };

        match outcome {
            Ok(()) => bucket.push(name),
            Err(e) => {
                error!(
                    "Failed to sync route {} on virtual router {}: {}",
                    name, router_name, e
                );
                failed.push(name);
            }
        }
    }

    if failed.is_empty() {
        Ok(report)
    } else {
        Err(RouteSyncError { failed })
    }
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod routes_tests;
