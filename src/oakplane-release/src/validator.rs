//! Cross-resource consistency checks.
//!
//! Each check is a pure function of a store view and its arguments. Mutating
//! operations run them against the open [`oakplane_memory::StoreWriter`], so
//! the state they approve is the state that gets committed.

use oakplane_core::{
    Certificate, Protocol, Record, Releasable, ReleaseStatus, ResourceKind, Service, sni,
};
use oakplane_errors::{ConsistencyError, ControlResult};
use oakplane_memory::StoreRead;
use std::collections::BTreeSet;

/// Load a record or fail with ResourceNull.
pub fn require<R: Record>(store: &impl StoreRead, id: &str) -> ControlResult<R> {
    match store.get::<R>(id)? {
        Some(record) => Ok(record),
        None => Err(ConsistencyError::null(R::KIND, id).into()),
    }
}

/// No other certificate may carry the same SNI.
pub fn certificate_uniqueness(
    store: &impl StoreRead,
    sni_name: &str,
    exclude_id: Option<&str>,
) -> ControlResult<()> {
    let wanted = sni::normalize(sni_name);
    let taken = store
        .certificates()?
        .into_iter()
        .any(|c| Some(c.id.as_str()) != exclude_id && sni::normalize(&c.sni) == wanted);
    if taken {
        return Err(ConsistencyError::ResourceExists {
            kind: ResourceKind::Certificate,
            values: vec![wanted],
        }
        .into());
    }
    Ok(())
}

/// An exact SNI must not claim a service domain some other enabled certificate
/// already serves. Wildcard SNIs always pass.
pub fn domain_not_covered_by_certificate(
    store: &impl StoreRead,
    sni_name: &str,
    exclude_id: Option<&str>,
) -> ControlResult<()> {
    if sni::is_wildcard(sni_name) {
        return Ok(());
    }
    let wanted = sni::normalize(sni_name);
    let domains: BTreeSet<String> = store
        .all_domains()?
        .into_iter()
        .map(|d| d.domain)
        .filter(|d| *d == wanted)
        .collect();
    if domains.is_empty() {
        return Ok(());
    }

    let others: Vec<Certificate> = store
        .certificates()?
        .into_iter()
        .filter(|c| c.is_enable && Some(c.id.as_str()) != exclude_id)
        .collect();
    let clashing: Vec<String> = domains
        .into_iter()
        .filter(|d| others.iter().any(|c| c.covers(d)))
        .collect();
    if !clashing.is_empty() {
        return Err(ConsistencyError::CertificateDomainExist { domains: clashing }.into());
    }
    Ok(())
}

/// Domains may belong to one service only. Services listed in
/// `exclude_service_ids` are ignored so an update can keep its own domains.
pub fn domains_already_used(
    store: &impl StoreRead,
    domains: &[String],
    exclude_service_ids: &[&str],
) -> ControlResult<()> {
    let wanted: BTreeSet<String> = domains.iter().map(|d| sni::normalize(d)).collect();
    let used: BTreeSet<String> = store
        .all_domains()?
        .into_iter()
        .filter(|d| !exclude_service_ids.contains(&d.service_id.as_str()))
        .map(|d| d.domain)
        .filter(|d| wanted.contains(d))
        .collect();
    if used.is_empty() {
        return Ok(());
    }
    // Report in the caller's order.
    let mut values = Vec::with_capacity(used.len());
    for domain in domains.iter().map(|d| sni::normalize(d)) {
        if used.contains(&domain) && !values.contains(&domain) {
            values.push(domain);
        }
    }
    Err(ConsistencyError::ResourceExists { kind: ResourceKind::ServiceDomain, values }.into())
}

/// TLS-serving services need an enabled certificate for every domain.
pub fn https_domains_have_certificate(
    store: &impl StoreRead,
    protocol: Protocol,
    domains: &[String],
) -> ControlResult<()> {
    if !protocol.serves_https() {
        return Ok(());
    }
    let certificates: Vec<Certificate> =
        store.certificates()?.into_iter().filter(|c| c.is_enable).collect();

    let mut missing: Vec<String> = Vec::new();
    for domain in domains {
        if !certificates.iter().any(|c| c.covers(domain)) && !missing.contains(domain) {
            missing.push(domain.clone());
        }
    }
    if !missing.is_empty() {
        return Err(ConsistencyError::DomainCertificateMissing { domains: missing }.into());
    }
    Ok(())
}

/// Published-and-enabled or pending resources must not be deleted.
pub fn resource_deletable(
    kind: ResourceKind,
    id: &str,
    status: ReleaseStatus,
    is_enable: bool,
) -> Result<(), ConsistencyError> {
    match status {
        ReleaseStatus::Published if is_enable => {
            Err(ConsistencyError::SwitchOnProhibitsOperation { kind, id: id.to_string() })
        }
        ReleaseStatus::PendingPublish => {
            Err(ConsistencyError::ToReleaseProhibitsOperation { kind, id: id.to_string() })
        }
        _ => Ok(()),
    }
}

pub fn releasable_deletable<R: Releasable>(record: &R) -> Result<(), ConsistencyError> {
    resource_deletable(R::KIND, record.id(), record.release_status(), record.is_enable())
}

/// Explicit releases are refused once the resource is Published.
pub fn not_yet_published<R: Releasable>(record: &R) -> Result<(), ConsistencyError> {
    if record.release_status().is_published() {
        return Err(ConsistencyError::SwitchAlreadyPublished {
            kind: R::KIND,
            id: record.id().to_string(),
        });
    }
    Ok(())
}

pub fn route_path_unique(
    store: &impl StoreRead,
    service_id: &str,
    path: &str,
    exclude_route_id: Option<&str>,
) -> ControlResult<()> {
    let path = path.trim();
    let taken = store
        .routes_of(service_id)?
        .into_iter()
        .any(|r| Some(r.id.as_str()) != exclude_route_id && r.path == path);
    if taken {
        return Err(ConsistencyError::ResourceExists {
            kind: ResourceKind::Route,
            values: vec![path.to_string()],
        }
        .into());
    }
    Ok(())
}

/// A plugin referenced by any route binding cannot go away.
pub fn plugin_unbound(store: &impl StoreRead, plugin_id: &str) -> ControlResult<()> {
    let routes: BTreeSet<String> = store
        .route_plugins_of_plugin(plugin_id)?
        .into_iter()
        .map(|b| b.route_id)
        .collect();
    if !routes.is_empty() {
        return Err(ConsistencyError::DependencyExists {
            kind: ResourceKind::Plugin,
            dependent: ResourceKind::Route,
            ids: routes.into_iter().collect(),
        }
        .into());
    }
    Ok(())
}

/// HTTPS service domains for which `certificate` is the only enabled cover.
pub fn certificate_domains_in_use(
    store: &impl StoreRead,
    certificate: &Certificate,
) -> ControlResult<()> {
    if !certificate.is_enable {
        return Ok(());
    }
    let https_services: BTreeSet<String> = store
        .list::<Service>()?
        .into_iter()
        .filter(|s| s.protocol.serves_https())
        .map(|s| s.id)
        .collect();
    if https_services.is_empty() {
        return Ok(());
    }

    let others: Vec<Certificate> = store
        .certificates()?
        .into_iter()
        .filter(|c| c.is_enable && c.id != certificate.id)
        .collect();
    let orphaned: BTreeSet<String> = store
        .all_domains()?
        .into_iter()
        .filter(|d| https_services.contains(&d.service_id))
        .map(|d| d.domain)
        .filter(|d| certificate.covers(d) && !others.iter().any(|c| c.covers(d)))
        .collect();
    if !orphaned.is_empty() {
        return Err(ConsistencyError::DependencyExists {
            kind: ResourceKind::Certificate,
            dependent: ResourceKind::ServiceDomain,
            ids: orphaned.into_iter().collect(),
        }
        .into());
    }
    Ok(())
}

pub fn switch_changes(current: bool, requested: bool) -> Result<(), ConsistencyError> {
    if current == requested {
        return Err(ConsistencyError::SwitchNoChange);
    }
    Ok(())
}
