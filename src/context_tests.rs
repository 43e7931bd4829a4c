// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `context.rs`

#[cfg(test)]
mod tests {
    use crate::context::Stores;
    use crate::crd::{
        VirtualNodeReference, VirtualNodeServiceProvider, VirtualRouterReference,
        VirtualRouterServiceProvider, VirtualService, VirtualServiceProvider, VirtualServiceSpec,
    };
    use kube::runtime::reflector::ObjectRef;
    use kube::runtime::watcher::Event;

    fn vs(namespace: &str, name: &str, mesh: &str, provider: Option<VirtualServiceProvider>) -> VirtualService {
        let mut vs = VirtualService::new(
            name,
            VirtualServiceSpec {
                mesh_name: mesh.to_string(),
                virtual_router: None,
                routes: vec![],
                provider,
            },
        );
        vs.metadata.namespace = Some(namespace.to_string());
        vs
    }

    fn stores(services: &[VirtualService]) -> Stores {
        let (reader, mut writer) = kube::runtime::reflector::store::<VirtualService>();
        for service in services {
            writer.apply_watcher_event(&Event::Apply(service.clone()));
        }
        Stores::new(reader)
    }

    fn sorted(mut refs: Vec<ObjectRef<VirtualService>>) -> Vec<String> {
        refs.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        refs.into_iter()
            .map(|r| format!("{}/{}", r.namespace.unwrap_or_default(), r.name))
            .collect()
    }

    #[test]
    fn test_virtual_services_in_mesh() {
        let stores = stores(&[
            vs("demo", "a", "global", None),
            vs("demo", "b", "other", None),
            vs("team", "c", "global.demo", None),
        ]);

        assert_eq!(
            sorted(stores.virtual_services_in_mesh("demo", "global")),
            vec!["demo/a".to_string(), "team/c".to_string()]
        );
        assert!(stores.virtual_services_in_mesh("demo", "missing").is_empty());
    }

    #[test]
    fn test_virtual_services_referencing_node() {
        let node = Some(VirtualServiceProvider {
            virtual_node: Some(VirtualNodeServiceProvider {
                virtual_node_ref: VirtualNodeReference {
                    namespace: None,
                    name: "web-v1".to_string(),
                },
            }),
            virtual_router: None,
        });
        let stores = stores(&[
            vs("demo", "a", "global", node.clone()),
            vs("team", "b", "global", node),
        ]);

        assert_eq!(
            sorted(stores.virtual_services_referencing_node("demo", "web-v1")),
            vec!["demo/a".to_string()]
        );
    }

    #[test]
    fn test_virtual_services_referencing_router() {
        let router = Some(VirtualServiceProvider {
            virtual_node: None,
            virtual_router: Some(VirtualRouterServiceProvider {
                virtual_router_ref: VirtualRouterReference {
                    namespace: Some("shared".to_string()),
                    name: "edge".to_string(),
                },
            }),
        });
        let stores = stores(&[vs("demo", "a", "global", router), vs("demo", "b", "global", None)]);

        assert_eq!(
            sorted(stores.virtual_services_referencing_router("shared", "edge")),
            vec!["demo/a".to_string()]
        );
        assert!(stores
            .virtual_services_referencing_router("demo", "edge")
            .is_empty());
    }

    #[test]
    fn test_empty_store() {
        let stores = stores(&[]);
        assert!(stores.virtual_services_in_mesh("demo", "global").is_empty());
        assert!(stores
            .virtual_services_referencing_node("demo", "web-v1")
            .is_empty());
    }
}
