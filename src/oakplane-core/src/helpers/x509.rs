//! Facts read from an uploaded certificate.
//!
//! The SNI a certificate is stored under and its expiry come from the leaf
//! certificate itself, never from the caller.

use super::pem::certificate_blocks;
use super::sni;
use chrono::{DateTime, Utc};
use x509_parser::extensions::GeneralName;
use x509_parser::parse_x509_certificate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFacts {
    /// Subject CN, or the first DNS SAN when the subject has no CN.
    pub sni: String,
    pub dns_names: Vec<String>,
    pub not_after: DateTime<Utc>,
}

/// Parse the leaf (first block) of a PEM chain. The error is a human readable reason.
pub fn discern(cert_pem: &str) -> Result<CertificateFacts, String> {
    let blocks = certificate_blocks(cert_pem).ok_or_else(|| "no CERTIFICATE block".to_string())?;
    let leaf = blocks.first().ok_or_else(|| "no CERTIFICATE block".to_string())?;

    let (rest, cert) = parse_x509_certificate(leaf.contents()).map_err(|e| e.to_string())?;
    if !rest.is_empty() {
        return Err("trailing data after certificate".into());
    }

    let dns_names: Vec<String> = match cert.subject_alternative_name().map_err(|e| e.to_string())? {
        Some(ext) => ext
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some(sni::normalize(dns)),
                _ => None,
            })
            .collect(),
        None => Vec::new(),
    };
    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(sni::normalize)
        .filter(|cn| !cn.is_empty());

    let sni = common_name
        .or_else(|| dns_names.first().cloned())
        .ok_or_else(|| "certificate names no host".to_string())?;
    let not_after = DateTime::<Utc>::from_timestamp(cert.validity().not_after.timestamp(), 0)
        .ok_or_else(|| "not_after out of range".to_string())?;

    Ok(CertificateFacts { sni, dns_names, not_after })
}
