mod common;

use common::*;
use oakplane_control_sync::Verb;
use oakplane_core::{
    NodeSpec, Page, Protocol, ReleaseStatus, ResourceKind, Route, Service, ServiceDomain,
    ServiceNode,
};
use oakplane_errors::{Code, ConsistencyError, ControlError};
use oakplane_memory::{Memory, Store, StoreRead};
use oakplane_release::ServiceSwitch;

fn domains(h: &Harness, service_id: &str) -> Vec<String> {
    h.store.domains_of(service_id).unwrap().into_iter().map(|d| d.domain).collect()
}

#[tokio::test]
async fn create_persists_children_and_default_route() {
    let h = harness();
    let service = h
        .plane
        .service_create(service_input("orders", Protocol::HTTP, &["b.example.com", "a.example.com"]))
        .await
        .unwrap();

    assert_eq!(service.release_status, ReleaseStatus::Unpublished);
    assert_eq!(domains(&h, &service.id), vec!["a.example.com", "b.example.com"]);
    assert_eq!(h.store.nodes_of(&service.id).unwrap().len(), 1);

    let routes = h.store.routes_of(&service.id).unwrap();
    assert_eq!(routes.len(), 1);
    assert!(routes[0].is_default());
    assert!(h.registry.calls().is_empty());
}

#[tokio::test]
async fn update_leaves_exactly_the_requested_domains() {
    let h = harness();
    let service = h
        .plane
        .service_create(service_input("orders", Protocol::HTTP, &["a.example.com", "b.example.com"]))
        .await
        .unwrap();
    let kept_id = h
        .store
        .domains_of(&service.id)
        .unwrap()
        .into_iter()
        .find(|d| d.domain == "b.example.com")
        .unwrap()
        .id;

    let mut input = service_input("orders", Protocol::HTTP, &["b.example.com", "c.example.com", "c.example.com"]);
    input.nodes = vec![
        NodeSpec { node_ip: "10.0.0.1".into(), node_port: 8080, node_weight: 40 },
        NodeSpec { node_ip: "10.0.0.2".into(), node_port: 8080, node_weight: 10 },
    ];
    h.plane.service_update(&service.id, input.clone()).await.unwrap();
    let snapshot = (
        h.store.domains_of(&service.id).unwrap(),
        h.store.nodes_of(&service.id).unwrap(),
    );

    assert_eq!(domains(&h, &service.id), vec!["b.example.com", "c.example.com"]);
    assert!(snapshot.0.iter().any(|d| d.id == kept_id));
    assert_eq!(
        snapshot.1.iter().map(|n| (n.node_ip.as_str(), n.node_weight)).collect::<Vec<_>>(),
        vec![("10.0.0.1", 40), ("10.0.0.2", 10)]
    );
    // No stray rows anywhere in the tables.
    assert_eq!(h.store.list::<ServiceDomain>().unwrap().len(), 2);
    assert_eq!(h.store.list::<ServiceNode>().unwrap().len(), 2);

    h.plane.service_update(&service.id, input).await.unwrap();
    assert_eq!(h.store.domains_of(&service.id).unwrap(), snapshot.0);
    assert_eq!(h.store.nodes_of(&service.id).unwrap(), snapshot.1);
}

#[tokio::test]
async fn domains_belong_to_one_service() {
    let h = harness();
    let first = h
        .plane
        .service_create(service_input("first", Protocol::HTTP, &["a.example.com"]))
        .await
        .unwrap();

    let err = unwrap_err(
        h.plane
            .service_create(service_input("second", Protocol::HTTP, &["x.example.com", "a.example.com"]))
            .await,
    );
    assert_eq!(
        err.consistency(),
        Some(&ConsistencyError::ResourceExists {
            kind: ResourceKind::ServiceDomain,
            values: vec!["a.example.com".into()],
        })
    );
    assert_eq!(h.store.list::<Service>().unwrap().len(), 1);

    // The owner may keep its own domain.
    h.plane
        .service_update(&first.id, service_input("first", Protocol::HTTP, &["a.example.com"]))
        .await
        .unwrap();
}

#[tokio::test]
async fn https_release_needs_certificate_coverage() {
    let h = harness();
    let service = h
        .plane
        .service_create(service_input("secure", Protocol::HTTPS, &["a.example.com"]))
        .await
        .unwrap();

    let err = unwrap_err(h.plane.service_release(&service.id).await);
    assert_eq!(
        err.consistency(),
        Some(&ConsistencyError::DomainCertificateMissing { domains: vec!["a.example.com".into()] })
    );
    assert!(h.registry.calls().is_empty());

    h.plane.certificate_create(certificate_input("*.example.com")).await.unwrap();
    h.plane.service_release(&service.id).await.unwrap();

    let stored = h.store.service(&service.id).unwrap().unwrap();
    assert_eq!(stored.release_status, ReleaseStatus::Published);
    let document = h.registry.document(ResourceKind::Service, &service.id).unwrap();
    assert_eq!(document["hosts"], serde_json::json!(["a.example.com"]));
    assert_eq!(document["nodes"][0]["address"], "10.0.0.1:8080");
}

#[tokio::test]
async fn failed_push_on_create_keeps_row_unpublished() {
    let h = harness();
    h.registry.fail_next(1);

    let mut input = service_input("orders", Protocol::HTTP, &["a.example.com"]);
    input.is_release = true;
    let err = unwrap_err(h.plane.service_create(input).await);
    assert_eq!(err.code(), Code::PublishFailure);
    assert!(err.is_retryable());

    let ControlError::Publish { id, .. } = err else { unreachable!() };
    let stored = h.store.service(&id).unwrap().expect("row kept after failed push");
    assert_eq!(stored.release_status, ReleaseStatus::Unpublished);
    assert_eq!(domains(&h, &id), vec!["a.example.com"]);
    assert!(h.registry.is_empty());

    h.plane.service_release(&id).await.unwrap();
    assert_eq!(h.store.service(&id).unwrap().unwrap().release_status, ReleaseStatus::Published);
}

#[tokio::test]
async fn failed_push_on_update_keeps_pending_status() {
    let h = harness();
    let mut input = service_input("orders", Protocol::HTTP, &["a.example.com"]);
    input.is_release = true;
    let service = h.plane.service_create(input.clone()).await.unwrap();
    assert_eq!(service.release_status, ReleaseStatus::Published);

    h.registry.fail_next(1);
    input.domains = vec!["b.example.com".into()];
    assert_eq!(code(h.plane.service_update(&service.id, input).await), Code::PublishFailure);

    let stored = h.store.service(&service.id).unwrap().unwrap();
    assert_eq!(stored.release_status, ReleaseStatus::PendingPublish);
    assert_eq!(domains(&h, &service.id), vec!["b.example.com"]);
    // The registry still serves the previous configuration.
    let document = h.registry.document(ResourceKind::Service, &service.id).unwrap();
    assert_eq!(document["hosts"], serde_json::json!(["a.example.com"]));
}

#[tokio::test]
async fn update_without_release_tracks_pending_changes() {
    let h = harness();
    let service = h
        .plane
        .service_create(service_input("orders", Protocol::HTTP, &["a.example.com"]))
        .await
        .unwrap();

    let updated = h
        .plane
        .service_update(&service.id, service_input("orders-v2", Protocol::HTTP, &["a.example.com"]))
        .await
        .unwrap();
    assert_eq!(updated.release_status, ReleaseStatus::Unpublished);

    h.plane.service_release(&service.id).await.unwrap();
    let updated = h
        .plane
        .service_update(&service.id, service_input("orders-v3", Protocol::HTTP, &["a.example.com"]))
        .await
        .unwrap();
    assert_eq!(updated.release_status, ReleaseStatus::PendingPublish);

    h.plane.service_release(&service.id).await.unwrap();
    assert_eq!(code(h.plane.service_release(&service.id).await), Code::SwitchAlreadyPublished);
}

#[tokio::test]
async fn published_service_must_be_disabled_and_released_before_delete() {
    let h = harness();
    let mut input = service_input("orders", Protocol::HTTP, &["a.example.com"]);
    input.is_release = true;
    let service = h.plane.service_create(input).await.unwrap();

    assert_eq!(code(h.plane.service_delete(&service.id).await), Code::SwitchOnProhibitsOperation);

    let switched = h.plane.service_switch(&service.id, ServiceSwitch::Enable, false).await.unwrap();
    assert_eq!(switched.release_status, ReleaseStatus::PendingPublish);
    assert_eq!(code(h.plane.service_delete(&service.id).await), Code::ToReleaseProhibitsOperation);

    h.plane.service_release(&service.id).await.unwrap();
    h.plane.service_delete(&service.id).await.unwrap();

    assert!(h.store.service(&service.id).unwrap().is_none());
    assert!(h.store.list::<ServiceDomain>().unwrap().is_empty());
    assert!(h.store.list::<ServiceNode>().unwrap().is_empty());
    assert!(h.store.list::<Route>().unwrap().is_empty());
    assert!(!h.registry.contains(ResourceKind::Service, &service.id));
}

#[tokio::test]
async fn registry_failure_aborts_delete() {
    let h = harness();
    let mut input = service_input("orders", Protocol::HTTP, &["a.example.com"]);
    input.is_release = true;
    let service = h.plane.service_create(input).await.unwrap();
    h.plane.service_switch(&service.id, ServiceSwitch::Enable, false).await.unwrap();
    h.plane.service_release(&service.id).await.unwrap();

    h.registry.fail_next(1);
    assert_eq!(code(h.plane.service_delete(&service.id).await), Code::PublishFailure);
    assert!(h.store.service(&service.id).unwrap().is_some());
    assert!(h.registry.contains(ResourceKind::Service, &service.id));
}

#[tokio::test]
async fn store_failure_after_registry_delete_repushes_configuration() {
    let h = harness();
    let mut input = service_input("orders", Protocol::HTTP, &["a.example.com"]);
    input.is_release = true;
    input.is_enable = false;
    let service = h.plane.service_create(input).await.unwrap();
    let before = h.registry.document(ResourceKind::Service, &service.id).unwrap();

    h.store.memory().fail_next_commits(1);
    let err = unwrap_err(h.plane.service_delete(&service.id).await);
    assert_eq!(err.code(), Code::StoreFailure);

    assert!(h.store.service(&service.id).unwrap().is_some());
    assert_eq!(h.registry.document(ResourceKind::Service, &service.id), Some(before));
    let verbs: Vec<Verb> = h
        .registry
        .calls()
        .into_iter()
        .filter(|c| c.kind == ResourceKind::Service)
        .map(|c| c.verb)
        .collect();
    assert_eq!(verbs, vec![Verb::Put, Verb::Delete, Verb::Put]);
}

#[tokio::test]
async fn released_routes_block_service_delete() {
    let h = harness();
    let service = h
        .plane
        .service_create(service_input("orders", Protocol::HTTP, &["a.example.com"]))
        .await
        .unwrap();
    let mut route = route_input("/v1/orders");
    route.is_release = true;
    let route = h.plane.route_create(&service.id, route).await.unwrap();

    let err = unwrap_err(h.plane.service_delete(&service.id).await);
    assert_eq!(
        err.consistency(),
        Some(&ConsistencyError::DependencyExists {
            kind: ResourceKind::Service,
            dependent: ResourceKind::Route,
            ids: vec![route.id.clone()],
        })
    );

    h.plane.route_switch_enable(&route.id, false).await.unwrap();
    h.plane.route_release(&route.id).await.unwrap();
    h.plane.route_delete(&route.id).await.unwrap();
    h.plane.service_delete(&service.id).await.unwrap();
}

#[tokio::test]
async fn switches_reject_no_op_changes() {
    let h = harness();
    let service = h
        .plane
        .service_create(service_input("orders", Protocol::HTTP, &["a.example.com"]))
        .await
        .unwrap();

    assert_eq!(
        code(h.plane.service_switch(&service.id, ServiceSwitch::WebSocket, false).await),
        Code::SwitchNoChange
    );
    let switched = h.plane.service_switch(&service.id, ServiceSwitch::HealthCheck, true).await.unwrap();
    assert!(switched.health_check);
    assert_eq!(code(h.plane.service_switch("svc_missing", ServiceSwitch::Enable, true).await), Code::ResourceNull);
}

#[tokio::test]
async fn list_searches_names_and_domains() {
    let h = harness();
    for (name, domain) in [("orders", "orders.example.com"), ("billing", "pay.example.com"), ("users", "users.example.org")] {
        h.plane.service_create(service_input(name, Protocol::HTTP, &[domain])).await.unwrap();
    }

    let all = h.plane.service_list(None, Page::default()).unwrap();
    assert_eq!(all.total, 3);

    let hits = h.plane.service_list(Some("PAY."), Page::default()).unwrap();
    assert_eq!(hits.total, 1);
    assert_eq!(hits.items[0].service.name, "billing");
    assert_eq!(hits.items[0].domains, vec!["pay.example.com"]);

    let paged = h.plane.service_list(Some("example"), Page::new(2, 1)).unwrap();
    assert_eq!((paged.total, paged.items.len()), (3, 1));
}

#[tokio::test]
async fn lmdb_backed_plane_round_trips_a_release() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness_with(Store::new(Memory::open_lmdb(dir.path().join("store")).unwrap()));

    let mut input = service_input("orders", Protocol::HTTP, &["a.example.com"]);
    input.is_release = true;
    let service = h.plane.service_create(input).await.unwrap();

    let info = h.plane.service_info(&service.id).unwrap();
    assert_eq!(info.service.release_status, ReleaseStatus::Published);
    assert_eq!(info.domains, vec!["a.example.com"]);
    assert!(h.registry.contains(ResourceKind::Service, &service.id));
}
