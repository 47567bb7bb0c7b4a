//! Hostname helpers shared by certificate and service-domain handling.
//!
//! A wildcard SNI `*.example.com` covers exactly one extra DNS label:
//! `api.example.com` is covered, `example.com` and `a.b.example.com` are not.

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

pub fn normalize(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

pub fn is_wildcard(sni: &str) -> bool {
    sni.trim_start().starts_with("*.")
}

/// Whether a certificate bound to `sni` can serve `domain`.
pub fn covers(sni: &str, domain: &str) -> bool {
    let sni = normalize(sni);
    let domain = normalize(domain);
    if sni == domain {
        return true;
    }
    if !is_wildcard(&sni) || is_wildcard(&domain) {
        return false;
    }
    // "*.example.com" -> ".example.com"
    let suffix = &sni[1..];
    match domain.strip_suffix(suffix) {
        Some(head) => !head.is_empty() && !head.contains('.'),
        None => false,
    }
}

/// Syntactic check of a hostname, optionally carrying a leading `*.` label.
pub fn is_valid_host(host: &str) -> bool {
    let host = normalize(host);
    let bare = host.strip_prefix("*.").unwrap_or(&host);
    if bare.is_empty() || bare.len() > MAX_DOMAIN_LEN {
        return false;
    }
    bare.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
