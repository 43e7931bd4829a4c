// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Object store abstraction over the Kubernetes API.
//!
//! Reconcilers read and write custom resources through [`ObjectStore`] so the
//! convergence logic does not depend on a live API server. [`KubeStore`] is the
//! production implementation.
//!
//! Every value returned by a store is an owned copy. Reconcilers mutate that copy
//! and commit it with a single explicit [`ObjectStore::update`] or
//! [`ObjectStore::update_status`] call. Both writes carry the object's
//! `resourceVersion`, so a concurrent edit fails with [`StoreError::Conflict`].

use crate::errors::StoreError;
use kube::api::{Patch, PatchParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::debug;

/// Read and write access to one kind of namespaced object.
#[async_trait::async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Send + Sync,
{
    /// Fetch the current object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the object does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError>;

    /// Persist metadata and spec changes (finalizers included).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the object changed since it was read.
    async fn update(&self, object: &K) -> Result<K, StoreError>;

    /// Persist the status subresource.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the object changed since it was read.
    async fn update_status(&self, object: &K) -> Result<K, StoreError>;
}

/// [`ObjectStore`] backed by `kube::Api`.
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    /// Create a store using the given Kubernetes client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> KubeStore<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
{
    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Map a Kubernetes API error onto the store taxonomy.
pub(crate) fn classify_kube_error(
    error: kube::Error,
    kind: &str,
    namespace: &str,
    name: &str,
) -> StoreError {
    match error {
        kube::Error::Api(response) if response.code == 404 => StoreError::NotFound {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(response) if response.code == 409 => StoreError::Conflict {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            message: response.message.clone(),
        },
        other => StoreError::Kube(other),
    }
}

#[async_trait::async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        let kind = K::kind(&());
        match self.api(namespace).get_opt(name).await {
            Ok(Some(object)) => Ok(object),
            Ok(None) => Err(StoreError::NotFound {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            Err(e) => Err(classify_kube_error(e, &kind, namespace, name)),
        }
    }

    async fn update(&self, object: &K) -> Result<K, StoreError> {
        let kind = K::kind(&());
        let namespace = object.namespace().unwrap_or_default();
        let name = object.name_any();

        debug!(
            kind = %kind,
            namespace = %namespace,
            name = %name,
            resource_version = ?object.resource_version(),
            "Replacing object"
        );

        self.api(&namespace)
            .replace(&name, &PostParams::default(), object)
            .await
            .map_err(|e| classify_kube_error(e, &kind, &namespace, &name))
    }

    async fn update_status(&self, object: &K) -> Result<K, StoreError> {
        let kind = K::kind(&());
        let namespace = object.namespace().unwrap_or_default();
        let name = object.name_any();

        let encoded = serde_json::to_value(object).map_err(|source| StoreError::Serialization {
            kind: kind.to_string(),
            namespace: namespace.clone(),
            name: name.clone(),
            source,
        })?;

        // resourceVersion in a merge patch makes the API server reject stale writes
        let patch = json!({
            "metadata": { "resourceVersion": object.resource_version() },
            "status": encoded.get("status").cloned().unwrap_or_default(),
        });

        debug!(
            kind = %kind,
            namespace = %namespace,
            name = %name,
            "Patching status"
        );

        self.api(&namespace)
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| classify_kube_error(e, &kind, &namespace, &name))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
