#![allow(dead_code)]

use oakplane_control_sync::MemoryRegistry;
use oakplane_core::{LoadBalance, Method, NodeSpec, PluginType, Protocol, Timeouts};
use oakplane_errors::{Code, ControlError, ControlResult};
use oakplane_memory::Store;
use oakplane_release::{
    CertificateInput, ControlPlane, PluginInput, RouteInput, RoutePluginInput, ServiceInput,
};
use pem::Pem;
use std::sync::Arc;

pub struct Harness {
    pub plane: ControlPlane,
    pub registry: Arc<MemoryRegistry>,
    pub store: Arc<Store>,
}

pub fn harness() -> Harness {
    harness_with(Store::in_memory())
}

pub fn harness_with(store: Store) -> Harness {
    let store = Arc::new(store);
    let registry = Arc::new(MemoryRegistry::new());
    let plane = ControlPlane::new(store.clone(), registry.clone());
    Harness { plane, registry, store }
}

pub fn service_input(name: &str, protocol: Protocol, domains: &[&str]) -> ServiceInput {
    ServiceInput {
        name: name.to_string(),
        protocol,
        health_check: false,
        web_socket: false,
        is_enable: true,
        load_balance: LoadBalance::RoundRobin,
        timeouts: Timeouts::default(),
        domains: domains.iter().map(|d| d.to_string()).collect(),
        nodes: vec![NodeSpec { node_ip: "10.0.0.1".into(), node_port: 8080, node_weight: 10 }],
        is_release: false,
    }
}

pub fn route_input(path: &str) -> RouteInput {
    RouteInput {
        name: format!("route {path}"),
        path: path.to_string(),
        methods: vec![Method::GET],
        is_enable: true,
        is_release: false,
    }
}

pub fn plugin_input(key: &str) -> PluginInput {
    PluginInput {
        name: key.to_string(),
        key: key.to_string(),
        r#type: PluginType::Limit,
        description: None,
        config: serde_json::json!({"count": 100, "time_window": 60}),
        is_enable: true,
        is_release: false,
    }
}

pub fn binding_input(plugin_id: &str, order: u8) -> RoutePluginInput {
    RoutePluginInput {
        plugin_id: plugin_id.to_string(),
        order,
        config: serde_json::json!({}),
        is_enable: true,
    }
}

pub fn pem_block(tag: &str) -> String {
    pem::encode(&Pem::new(tag, vec![0x30, 0x82, 0x02, 0x0a, 0x02, 0x82]))
}

/// PEM text of a file under `oakplane-core/testdata`.
pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("{}/../oakplane-core/testdata/{name}", env!("CARGO_MANIFEST_DIR")))
        .unwrap_or_else(|e| panic!("fixture {name}: {e}"))
}

/// Upload of the self-signed test certificate issued for `sni`.
pub fn certificate_input(sni: &str) -> CertificateInput {
    let name = sni.replace("*.", "wildcard.");
    CertificateInput {
        certificate: fixture(&format!("{name}.crt")),
        private_key: fixture(&format!("{name}.key")),
        is_enable: true,
        is_release: false,
    }
}

/// Status code of a failed operation.
pub fn code<T: std::fmt::Debug>(result: ControlResult<T>) -> Code {
    match result {
        Ok(v) => panic!("expected an error, got {v:?}"),
        Err(e) => e.code(),
    }
}

pub fn unwrap_err<T: std::fmt::Debug>(result: ControlResult<T>) -> ControlError {
    match result {
        Ok(v) => panic!("expected an error, got {v:?}"),
        Err(e) => e,
    }
}
