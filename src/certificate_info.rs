//! Human-readable certificate summaries for logs and the `inspect` command.

use crate::error::{PkiError, Result};
use crate::generate_leaf_cert::is_currently_valid;
use openssl::hash::MessageDigest;
use openssl::x509::{X509NameRef, X509Ref, X509};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Uppercase hex, no separators
    pub serial: String,
    pub subject: String,
    pub issuer: String,
    pub not_before: String,
    pub not_after: String,
    /// SHA-256 over the DER encoding, colon separated
    pub sha256_fingerprint: String,
    pub key_bits: u32,
    pub self_signed: bool,
    /// Whether the current time falls inside `[not_before, not_after]`
    pub currently_valid: bool,
}

impl CertificateInfo {
    pub fn from_x509(certificate: &X509Ref) -> Result<Self> {
        let serial = certificate
            .serial_number()
            .to_bn()
            .and_then(|bn| bn.to_hex_str().map(|s| s.to_string()))
            .map_err(|e| PkiError::InvalidMaterial(format!("Failed to read serial number: {}", e)))?;
        let digest = certificate
            .digest(MessageDigest::sha256())
            .map_err(|e| PkiError::InvalidMaterial(format!("Failed to hash certificate: {}", e)))?;
        let key_bits = certificate
            .public_key()
            .map_err(|e| PkiError::InvalidMaterial(format!("Failed to read public key: {}", e)))?
            .bits();
        let self_signed = certificate
            .issuer_name()
            .try_cmp(certificate.subject_name())
            .map_err(|e| PkiError::InvalidMaterial(format!("Failed to compare names: {}", e)))?
            .is_eq();

        Ok(Self {
            serial,
            subject: format_name(certificate.subject_name()),
            issuer: format_name(certificate.issuer_name()),
            not_before: certificate.not_before().to_string(),
            not_after: certificate.not_after().to_string(),
            sha256_fingerprint: fingerprint(&digest),
            key_bits,
            self_signed,
            currently_valid: is_currently_valid(certificate)?,
        })
    }

    /// Parse the first certificate in `pem` and summarize it.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let certificate = X509::from_pem(pem).map_err(|e| {
            PkiError::InvalidMaterial(format!("Failed to parse certificate PEM: {}", e))
        })?;
        Self::from_x509(&certificate)
    }
}

/// `C=US, ST=California, ..., CN=name` in the order the entries are stored.
pub fn format_name(name: &X509NameRef) -> String {
    name.entries()
        .map(|entry| {
            let key = entry
                .object()
                .nid()
                .short_name()
                .unwrap_or("?")
                .to_string();
            let value = entry.data().to_string().unwrap_or_else(|_| "?".to_string());
            format!("{}={}", key, value)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn fingerprint(digest: &[u8]) -> String {
    digest
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate_authority::CertificateAuthority;
    use crate::configs::CaConfig;
    use crate::storage::FileStore;
    use tempfile::TempDir;

    #[test]
    fn test_root_summary() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let config = CaConfig {
            key_bits: 2048,
            ..CaConfig::default()
        };
        let ca = CertificateAuthority::bootstrap(&store, &config).unwrap();
        let info = CertificateInfo::from_x509(ca.certificate()).unwrap();

        assert_eq!(
            info.subject,
            "C=US, ST=California, L=San Francisco, O=VPN PKI, OU=VPN Services, CN=VPN Root CA"
        );
        assert_eq!(info.subject, info.issuer);
        assert!(info.self_signed);
        assert!(info.currently_valid);
        assert_eq!(info.key_bits, 2048);
        assert_eq!(info.sha256_fingerprint.len(), 32 * 3 - 1);
        assert!(info.not_after.ends_with("GMT"));
        assert!(info.serial.chars().all(|c| c.is_ascii_hexdigit()));

        let from_pem = CertificateInfo::from_pem(ca.certificate_pem().unwrap().as_bytes()).unwrap();
        assert_eq!(from_pem, info);
    }

    #[test]
    fn test_fingerprint_format() {
        assert_eq!(fingerprint(&[0x00, 0xab, 0x7f]), "00:AB:7F");
    }

    #[test]
    fn test_from_pem_rejects_garbage() {
        assert!(matches!(
            CertificateInfo::from_pem(b"not a certificate"),
            Err(PkiError::InvalidMaterial(_))
        ));
    }
}
