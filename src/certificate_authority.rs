//! The root certificate authority.
//!
//! A store holds exactly one root. [`CertificateAuthority::bootstrap`] creates it the
//! first time and loads it on every later call. If only one half of the root (key or
//! certificate) is present the store is treated as damaged: loading fails and no
//! replacement root is generated, because a new root would silently invalidate every
//! certificate already handed out.

use crate::configs::CaConfig;
use crate::error::{PkiError, Result};
use crate::generate_keypair::{pem_to_string, KeyPair};
use crate::generate_root_ca::RsaRootCABuilder;
use crate::pki_generator::common_name_of;
use crate::serial::SerialRegistry;
use crate::storage::{Artifact, PkiStore};
use openssl::bn::BigNum;
use openssl::pkey::{PKeyRef, Private};
use openssl::x509::{X509NameRef, X509Ref, X509};
use secrecy::ExposeSecret;
use std::fmt;

pub struct CertificateAuthority {
    key_pair: KeyPair,
    certificate: X509,
    serials: SerialRegistry,
}

impl CertificateAuthority {
    /// Load the root from `store`, creating and persisting it if the store has none.
    pub fn bootstrap(store: &dyn PkiStore, config: &CaConfig) -> Result<Self> {
        if store.exists(Artifact::CaCert) || store.exists(Artifact::CaKey) {
            tracing::debug!("root CA material present, loading");
            return Self::load(store);
        }

        tracing::info!(
            common_name = %config.common_name,
            key_bits = config.key_bits,
            validity_days = config.validity_days,
            "generating root CA"
        );
        let serials = SerialRegistry::new();
        let (key_pair, certificate) = RsaRootCABuilder::new(config.subject())
            .key_bits(config.key_bits)
            .validity_days(config.validity_days)
            .serials(&serials)
            .build()?;

        let key_pem = key_pair.private_key_pem()?;
        let cert_pem = certificate
            .to_pem()
            .map_err(|e| PkiError::Signing(format!("Failed to encode CA certificate: {}", e)))?;

        // Key first: a crash in between leaves a store that refuses to load rather than
        // a certificate nobody can sign with.
        store.write(Artifact::CaKey, key_pem.expose_secret().as_bytes())?;
        store.write(Artifact::CaCert, &cert_pem)?;
        tracing::info!("root CA created");

        Ok(Self {
            key_pair,
            certificate,
            serials,
        })
    }

    /// Load an existing root. Never generates.
    ///
    /// # Errors
    /// - [`PkiError::NotFound`] if `ca.crt` or `ca.key` is missing
    /// - [`PkiError::InvalidMaterial`] if either fails to parse or they do not match
    pub fn load(store: &dyn PkiStore) -> Result<Self> {
        for artifact in [Artifact::CaCert, Artifact::CaKey] {
            if !store.exists(artifact) {
                return Err(PkiError::NotFound(format!(
                    "root CA is not bootstrapped ({} missing)",
                    artifact
                )));
            }
        }

        let certificate = X509::from_pem(&store.read(Artifact::CaCert)?).map_err(|e| {
            PkiError::InvalidMaterial(format!("Failed to parse CA certificate: {}", e))
        })?;
        let key_pair = KeyPair::from_pem(&store.read(Artifact::CaKey)?)?;

        let cert_public_key = certificate.public_key().map_err(|e| {
            PkiError::InvalidMaterial(format!("CA certificate has no usable public key: {}", e))
        })?;
        if !key_pair.public_eq(&cert_public_key) {
            return Err(PkiError::InvalidMaterial(
                "ca.key does not match ca.crt".to_string(),
            ));
        }

        let serial = serial_of(&certificate)?;
        let serials = SerialRegistry::new();
        serials.register(&serial);

        Ok(Self {
            key_pair,
            certificate,
            serials,
        })
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    pub fn subject_name(&self) -> &X509NameRef {
        self.certificate.subject_name()
    }

    pub fn certificate_pem(&self) -> Result<String> {
        let pem = self
            .certificate
            .to_pem()
            .map_err(|e| PkiError::Signing(format!("Failed to encode CA certificate: {}", e)))?;
        pem_to_string(pem)
    }

    /// SubjectPublicKeyInfo DER of the root key.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        self.key_pair.public_key_der()
    }

    pub fn key_bits(&self) -> u32 {
        self.key_pair.size_bits()
    }

    #[cfg(test)]
    pub(crate) fn serial_count(&self) -> usize {
        self.serials.len()
    }

    pub(crate) fn signing_key(&self) -> &PKeyRef<Private> {
        self.key_pair.private_key()
    }

    pub(crate) fn next_serial(&self) -> Result<BigNum> {
        self.serials.next()
    }

    /// Record the serial of a certificate this CA issued in an earlier run.
    pub(crate) fn register_issued(&self, certificate: &X509Ref) -> Result<()> {
        let serial = serial_of(certificate)?;
        if !self.serials.register(&serial) {
            tracing::warn!("stored certificate reuses a serial already known to this CA");
        }
        Ok(())
    }

    /// True when `certificate` carries this CA's subject as issuer and its signature verifies.
    pub fn has_issued(&self, certificate: &X509Ref) -> Result<bool> {
        let same_issuer = certificate
            .issuer_name()
            .try_cmp(self.subject_name())
            .map_err(|e| PkiError::InvalidMaterial(format!("Failed to compare names: {}", e)))?
            .is_eq();
        if !same_issuer {
            return Ok(false);
        }
        certificate
            .verify(self.key_pair.private_key())
            .map_err(|e| PkiError::InvalidMaterial(format!("Failed to verify signature: {}", e)))
    }
}

impl fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("subject", &common_name_of(self.certificate.subject_name()))
            .field("key_pair", &self.key_pair)
            .field("serials_tracked", &self.serials.len())
            .finish()
    }
}

fn serial_of(certificate: &X509Ref) -> Result<BigNum> {
    certificate
        .serial_number()
        .to_bn()
        .map_err(|e| PkiError::InvalidMaterial(format!("Failed to read serial number: {}", e)))
}
