// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::crd::*;
    use kube::CustomResourceExt;

    const VIRTUAL_SERVICE_YAML: &str = r"
apiVersion: appmesh.firestoned.io/v1beta1
kind: VirtualService
metadata:
  name: colorteller.demo.svc.cluster.local
  namespace: demo
spec:
  meshName: global
  virtualRouter:
    name: colorteller-router
  routes:
    - name: color-route
      match:
        prefix: /
      action:
        weightedTargets:
          - target: colorteller-blue
            weight: 90
          - target: colorteller-red
            weight: 10
";

    fn spec(mesh_name: &str) -> VirtualServiceSpec {
        VirtualServiceSpec {
            mesh_name: mesh_name.to_string(),
            virtual_router: None,
            routes: vec![],
            provider: None,
        }
    }

    fn mesh_with(conditions: Vec<Condition>) -> Mesh {
        let mut mesh = Mesh::new(
            "global",
            MeshSpec {
                service_discovery_type: None,
                egress_filter: None,
            },
        );
        mesh.status = Some(MeshStatus { conditions });
        mesh
    }

    fn condition(r#type: &str, status: &str) -> Condition {
        Condition {
            r#type: r#type.to_string(),
            status: status.to_string(),
            reason: None,
            message: None,
            last_transition_time: None,
        }
    }

    #[test]
    fn test_virtual_service_from_yaml() {
        let vs: VirtualService = serde_yaml::from_str(VIRTUAL_SERVICE_YAML).unwrap();

        assert_eq!(vs.spec.mesh_name, "global");
        assert_eq!(vs.virtual_router_name(), "colorteller-router");
        assert_eq!(vs.spec.routes.len(), 1);

        let route = &vs.spec.routes[0];
        assert_eq!(route.name, "color-route");
        assert_eq!(route.prefix(), "/");
        assert_eq!(route.action.weighted_targets[0].target, "colorteller-blue");
        assert_eq!(route.action.weighted_targets[1].weight, 10);
        assert!(vs.conditions().is_empty());
    }

    #[test]
    fn test_route_match_serializes_as_match() {
        let route = Route {
            name: "api".to_string(),
            route_match: RouteMatch {
                prefix: "/api".to_string(),
            },
            action: RouteAction::default(),
        };

        let value = serde_json::to_value(&route).unwrap();

        assert_eq!(value["match"]["prefix"], "/api");
        assert!(value.get("routeMatch").is_none());
    }

    #[test]
    fn test_virtual_router_name_defaults_to_service_name() {
        let vs = VirtualService::new("web", spec("global"));
        assert_eq!(vs.virtual_router_name(), "web");
    }

    #[test]
    fn test_mesh_ref_uses_service_namespace() {
        let mut vs = VirtualService::new("web", spec("global"));
        vs.metadata.namespace = Some("demo".to_string());

        assert_eq!(vs.mesh_ref(), ("global".to_string(), "demo".to_string()));
    }

    #[test]
    fn test_mesh_ref_with_namespace_qualifier() {
        let mut vs = VirtualService::new("web", spec("global.mesh-system"));
        vs.metadata.namespace = Some("demo".to_string());

        assert_eq!(
            vs.mesh_ref(),
            ("global".to_string(), "mesh-system".to_string())
        );
    }

    #[test]
    fn test_parse_mesh_name_splits_on_last_dot() {
        assert_eq!(
            parse_mesh_name("mesh.a.b", "demo"),
            ("mesh.a".to_string(), "b".to_string())
        );
        assert_eq!(
            parse_mesh_name("trailing.", "demo"),
            ("trailing.".to_string(), "demo".to_string())
        );
    }

    #[test]
    fn test_weighted_target_set_ignores_order() {
        let targets = |pairs: &[(&str, i64)]| Route {
            name: "r".to_string(),
            route_match: RouteMatch {
                prefix: "/".to_string(),
            },
            action: RouteAction {
                weighted_targets: pairs
                    .iter()
                    .map(|(target, weight)| WeightedTarget {
                        target: (*target).to_string(),
                        weight: *weight,
                    })
                    .collect(),
            },
        };

        assert_eq!(
            targets(&[("a", 50), ("b", 50)]).weighted_target_set(),
            targets(&[("b", 50), ("a", 50)]).weighted_target_set()
        );
        assert_ne!(
            targets(&[("a", 60), ("b", 40)]).weighted_target_set(),
            targets(&[("a", 50), ("b", 50)]).weighted_target_set()
        );
    }

    #[test]
    fn test_provider_accepts_ref_alias() {
        let provider: VirtualServiceProvider = serde_json::from_value(serde_json::json!({
            "virtualNode": { "ref": { "name": "web-v1" } }
        }))
        .unwrap();

        let node = provider.virtual_node.unwrap();
        assert_eq!(node.virtual_node_ref.name, "web-v1");
        assert_eq!(node.virtual_node_ref.namespace, None);
        assert!(provider.virtual_router.is_none());
    }

    #[test]
    fn test_mesh_is_active() {
        assert!(mesh_with(vec![condition("MeshActive", "True")]).is_active());
        assert!(!mesh_with(vec![condition("MeshActive", "False")]).is_active());
        assert!(!mesh_with(vec![condition("Ready", "True")]).is_active());
        assert!(!mesh_with(vec![]).is_active());
    }

    #[test]
    fn test_mesh_without_status_is_not_active() {
        let mesh = Mesh::new(
            "global",
            MeshSpec {
                service_discovery_type: None,
                egress_filter: None,
            },
        );
        assert!(!mesh.is_active());
    }

    #[test]
    fn test_condition_type_and_status_display() {
        assert_eq!(
            VirtualServiceConditionType::VirtualServiceActive.to_string(),
            "VirtualServiceActive"
        );
        assert_eq!(
            VirtualServiceConditionType::VirtualRouterActive.to_string(),
            "VirtualRouterActive"
        );
        assert_eq!(
            VirtualServiceConditionType::RoutesActive.to_string(),
            "RoutesActive"
        );
        assert_eq!(ConditionStatus::from_bool(true).to_string(), "True");
        assert_eq!(ConditionStatus::from_bool(false).to_string(), "False");
        assert_eq!(ConditionStatus::default(), ConditionStatus::Unknown);
    }

    #[test]
    fn test_condition_status_wire_format() {
        let condition = VirtualServiceCondition {
            r#type: VirtualServiceConditionType::RoutesActive,
            status: ConditionStatus::True,
            last_transition_time: None,
        };

        let value = serde_json::to_value(&condition).unwrap();

        assert_eq!(value["type"], "RoutesActive");
        assert_eq!(value["status"], "True");
        assert!(value.get("lastTransitionTime").is_none());
    }

    #[test]
    fn test_crd_names() {
        let crd = VirtualService::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("virtualservices.appmesh.firestoned.io")
        );
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.names.short_names, Some(vec!["vs".to_string()]));

        assert_eq!(
            Mesh::crd().metadata.name.as_deref(),
            Some("meshes.appmesh.firestoned.io")
        );
        assert_eq!(
            VirtualNode::crd().metadata.name.as_deref(),
            Some("virtualnodes.appmesh.firestoned.io")
        );
        assert_eq!(
            VirtualRouter::crd().metadata.name.as_deref(),
            Some("virtualrouters.appmesh.firestoned.io")
        );
    }
}
