//! PEM sanity checks for uploaded certificate material.
//!
//! Only framing and block tags are checked here; chain and key-pair validity
//! is left to the gateway nodes that load the material into their TLS stack.

use pem::Pem;

/// All blocks of a certificate upload, or `None` when the text is not PEM.
pub fn certificate_blocks(cert_pem: &str) -> Option<Vec<Pem>> {
    let blocks = pem::parse_many(cert_pem.as_bytes()).ok()?;
    if blocks.is_empty() || blocks.iter().any(|b| b.tag() != "CERTIFICATE") {
        return None;
    }
    Some(blocks)
}

pub fn is_certificate_pem(cert_pem: &str) -> bool {
    certificate_blocks(cert_pem).is_some()
}

/// Accepts PKCS#8 (`PRIVATE KEY`), PKCS#1 (`RSA PRIVATE KEY`) and SEC1 (`EC PRIVATE KEY`) blocks.
pub fn is_private_key_pem(key_pem: &str) -> bool {
    match pem::parse(key_pem.as_bytes()) {
        Ok(block) => block.tag().ends_with("PRIVATE KEY") && !block.contents().is_empty(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(tag: &str) -> String {
        pem::encode(&Pem::new(tag, vec![0x30, 0x82, 0x01, 0x0a]))
    }

    #[test]
    fn accepts_certificate_chain() {
        let chain = format!("{}{}", encode("CERTIFICATE"), encode("CERTIFICATE"));
        assert_eq!(certificate_blocks(&chain).map(|b| b.len()), Some(2));
    }

    #[test]
    fn rejects_key_in_certificate_slot() {
        assert!(!is_certificate_pem(&encode("PRIVATE KEY")));
        assert!(!is_certificate_pem("not pem at all"));
    }

    #[test]
    fn accepts_known_key_tags() {
        assert!(is_private_key_pem(&encode("PRIVATE KEY")));
        assert!(is_private_key_pem(&encode("RSA PRIVATE KEY")));
        assert!(is_private_key_pem(&encode("EC PRIVATE KEY")));
        assert!(!is_private_key_pem(&encode("CERTIFICATE")));
    }
}
