// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for `VirtualService` resources.
//!
//! Three conditions are tracked, one per remote object family:
//! - `VirtualServiceActive`: the remote virtual service is `ACTIVE`
//! - `VirtualRouterActive`: the remote virtual router is `ACTIVE`
//! - `RoutesActive`: every remote route on the router is `ACTIVE`
//!
//! A condition's `lastTransitionTime` only moves when its status changes, and
//! a pass that observes nothing new makes no status write at all.
//!
//! # Example
//!
//! ```rust
//! use meshroute::crd::{ConditionStatus, VirtualServiceConditionType};
//! use meshroute::reconcilers::status::upsert_condition;
//!
//! let mut conditions = Vec::new();
//! assert!(upsert_condition(
//!     &mut conditions,
//!     VirtualServiceConditionType::RoutesActive,
//!     ConditionStatus::True,
//! ));
//! assert!(!upsert_condition(
//!     &mut conditions,
//!     VirtualServiceConditionType::RoutesActive,
//!     ConditionStatus::True,
//! ));
//! ```

use crate::cloud::ResourceStatus;
use crate::crd::{
    ConditionStatus, VirtualService, VirtualServiceCondition, VirtualServiceConditionType,
};
use crate::errors::StoreError;
use crate::store::ObjectStore;
use chrono::Utc;
use kube::ResourceExt;
use tracing::{debug, info};

/// Condition status reported for a remote lifecycle state.
#[must_use]
pub fn condition_for_status(status: ResourceStatus) -> ConditionStatus {
    match status {
        ResourceStatus::Active => ConditionStatus::True,
        ResourceStatus::Inactive | ResourceStatus::Deleted => ConditionStatus::False,
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition(
    conditions: &[VirtualServiceCondition],
    condition_type: VirtualServiceConditionType,
) -> Option<&VirtualServiceCondition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Set `condition_type` to `status` in memory.
///
/// Appends the condition when absent and rewrites it in place when its
/// status differs. Returns `true` when anything changed.
pub fn upsert_condition(
    conditions: &mut Vec<VirtualServiceCondition>,
    condition_type: VirtualServiceConditionType,
    status: ConditionStatus,
) -> bool {
    let now = Utc::now().to_rfc3339();

    match conditions.iter_mut().find(|c| c.r#type == condition_type) {
        Some(existing) if existing.status == status => false,
        Some(existing) => {
            existing.status = status;
            existing.last_transition_time = Some(now);
            true
        }
        None => {
            conditions.push(VirtualServiceCondition {
                r#type: condition_type,
                status,
                last_transition_time: Some(now),
            });
            true
        }
    }
}

/// Make sure `vs` carries `condition_type` = `status`, committing at most one
/// status write.
///
/// Returns the object to keep working with: the committed object when a
/// write happened, otherwise `vs` unchanged.
///
/// # Errors
///
/// Returns the store error if the status write fails, including conflicts
/// when `vs` is stale.
pub async fn ensure_condition(
    store: &dyn ObjectStore<VirtualService>,
    mut vs: VirtualService,
    condition_type: VirtualServiceConditionType,
    status: ConditionStatus,
) -> Result<VirtualService, StoreError> {
    let changed = upsert_condition(
        &mut vs.status.get_or_insert_with(Default::default).conditions,
        condition_type,
        status,
    );

    if !changed {
        debug!(
            "Condition {} already {} on VirtualService {}/{}",
            condition_type,
            status,
            vs.namespace().unwrap_or_default(),
            vs.name_any()
        );
        return Ok(vs);
    }

    info!(
        "Setting condition {}={} on VirtualService {}/{}",
        condition_type,
        status,
        vs.namespace().unwrap_or_default(),
        vs.name_any()
    );
    store.update_status(&vs).await
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
