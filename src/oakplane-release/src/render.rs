//! Registry documents: the shape gateway nodes consume for each released kind.

use oakplane_core::{Certificate, Plugin, Route, Service};
use oakplane_errors::ControlResult;
use oakplane_memory::StoreRead;
use serde_json::{Value, json};

pub fn service_document(store: &impl StoreRead, service: &Service) -> ControlResult<Value> {
    let hosts: Vec<String> = store.domains_of(&service.id)?.into_iter().map(|d| d.domain).collect();
    let nodes: Vec<Value> = store
        .nodes_of(&service.id)?
        .into_iter()
        .map(|n| {
            json!({
                "address": n.get_address(),
                "ip": n.node_ip,
                "ip_type": n.ip_type,
                "port": n.node_port,
                "weight": n.node_weight,
            })
        })
        .collect();

    Ok(json!({
        "id": service.id,
        "name": service.name,
        "protocol": service.protocol,
        "enable": service.is_enable,
        "web_socket": service.web_socket,
        "health_check": service.health_check,
        "load_balance": service.load_balance,
        "timeouts": service.timeouts,
        "hosts": hosts,
        "nodes": nodes,
    }))
}

/// Route plus its enabled plugin bindings in execution order.
pub fn route_document(store: &impl StoreRead, route: &Route) -> ControlResult<Value> {
    let mut plugins = Vec::new();
    for binding in store.route_plugins_of_route(&route.id)? {
        if !binding.is_enable {
            continue;
        }
        let Some(plugin) = store.plugin(&binding.plugin_id)? else {
            continue;
        };
        plugins.push(json!({
            "id": binding.id,
            "plugin_id": plugin.id,
            "key": plugin.key,
            "type": plugin.r#type,
            "order": binding.order,
            "config": binding.config,
        }));
    }

    Ok(json!({
        "id": route.id,
        "service_id": route.service_id,
        "name": route.name,
        "path": route.path,
        "methods": route.methods,
        "enable": route.is_enable,
        "plugins": plugins,
    }))
}

pub fn plugin_document(plugin: &Plugin) -> Value {
    json!({
        "id": plugin.id,
        "name": plugin.name,
        "key": plugin.key,
        "type": plugin.r#type,
        "config": plugin.config,
        "enable": plugin.is_enable,
    })
}

pub fn certificate_document(certificate: &Certificate) -> Value {
    json!({
        "id": certificate.id,
        "sni": certificate.sni,
        "certificate": certificate.certificate,
        "private_key": certificate.private_key,
        "expired_at": certificate.expired_at,
        "enable": certificate.is_enable,
    })
}
