//! Leaf Certificate Generation Module
//!
//! Builds end-entity certificates signed directly by the root CA:
//!
//! **Certificate Chain**: Root CA → Server / Client Certificate
//!
//! # X.509 Extensions
//! - **Basic Constraints**: CA=false (critical)
//! - **Key Usage**: `digitalSignature`, `keyEncipherment` (critical)
//! - **Extended Key Usage**: `serverAuth` for the VPN server, `clientAuth` for clients
//! - **Subject / Authority Key Identifier**
//!
//! # Example
//! ```rust,no_run
//! # use vpn_pki::generate_leaf_cert::RsaLeafCertBuilder;
//! # use vpn_pki::{CertificateAuthority, CertificateProfile, SubjectName};
//! # fn example(ca: &CertificateAuthority) -> vpn_pki::Result<()> {
//! let (client_key, client_cert) = RsaLeafCertBuilder::new(
//!     CertificateProfile::Client,
//!     SubjectName::new("alice_laptop".to_string()).organization("Example".to_string()),
//!     ca,
//! )
//! .validity_days(365)
//! .build()?;
//! # Ok(())
//! # }
//! ```

use crate::certificate_authority::CertificateAuthority;
use crate::error::{PkiError, Result};
use crate::generate_keypair::KeyPair;
use crate::pki_generator::{sign_certificate, CertificateProfile, CertificateTemplate, SubjectName};
use openssl::asn1::Asn1Time;
use openssl::x509::{X509Ref, X509};
use std::cmp::Ordering;

const RSA_KEY_SIZE_DEFAULT: u32 = 2048;
const VALIDITY_DAYS_DEFAULT: u32 = 365;

/// Builder for an RSA key pair and a leaf certificate signed by the root CA
pub struct RsaLeafCertBuilder<'a> {
    profile: CertificateProfile,
    subject: SubjectName,
    validity_days: u32,
    key_bits: u32,
    key_pair: Option<KeyPair>,
    authority: &'a CertificateAuthority,
}

impl<'a> RsaLeafCertBuilder<'a> {
    /// Create a new leaf builder signing with `authority`
    pub fn new(
        profile: CertificateProfile,
        subject: SubjectName,
        authority: &'a CertificateAuthority,
    ) -> Self {
        Self {
            profile,
            subject,
            validity_days: VALIDITY_DAYS_DEFAULT,
            key_bits: RSA_KEY_SIZE_DEFAULT,
            key_pair: None,
            authority,
        }
    }

    /// Set validity period in days
    pub fn validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }

    /// Set the RSA modulus size of the generated key (default 2048)
    pub fn key_bits(mut self, bits: u32) -> Self {
        self.key_bits = bits;
        self
    }

    /// Certify an existing key pair instead of generating one.
    pub fn key_pair(mut self, key_pair: KeyPair) -> Self {
        self.key_pair = Some(key_pair);
        self
    }

    /// Build the key pair and CA-signed leaf certificate
    ///
    /// The leaf's validity is not clamped to the CA's remaining lifetime; a leaf that
    /// outlives its issuer is logged as a warning.
    ///
    /// # Errors
    /// - [`PkiError::Signing`] if called with [`CertificateProfile::RootCa`], a subject
    ///   field is invalid, or signing fails
    /// - [`PkiError::Generation`] if key or serial generation fails
    pub fn build(self) -> Result<(KeyPair, X509)> {
        if self.profile.is_ca() {
            return Err(PkiError::Signing(
                "leaf builder cannot produce CA certificates".to_string(),
            ));
        }

        let name = self.subject.to_x509_name()?;
        let key_pair = match self.key_pair {
            Some(key_pair) => key_pair,
            None => KeyPair::generate(self.key_bits)?,
        };
        let serial = self.authority.next_serial()?;
        let issuer = self.authority.certificate();

        let certificate = sign_certificate(CertificateTemplate {
            profile: self.profile,
            subject: &name,
            serial: &serial,
            validity_days: self.validity_days,
            subject_key: key_pair.private_key(),
            issuer: Some(issuer),
            signing_key: self.authority.signing_key(),
        })?;

        warn_if_outlives_issuer(&certificate, issuer);
        Ok((key_pair, certificate))
    }
}

fn warn_if_outlives_issuer(leaf: &X509, issuer: &X509) {
    if let Ok(Ordering::Greater) = leaf.not_after().compare(issuer.not_after()) {
        tracing::warn!(
            leaf_not_after = %leaf.not_after(),
            ca_not_after = %issuer.not_after(),
            "leaf certificate outlives its issuing CA"
        );
    }
}

/// True when `now` lies inside the certificate's validity window.
pub fn is_currently_valid(cert: &X509Ref) -> Result<bool> {
    let now = Asn1Time::days_from_now(0)
        .map_err(|e| PkiError::Signing(format!("Failed to read current time: {}", e)))?;
    let started = cert
        .not_before()
        .compare(&now)
        .map_err(|e| PkiError::InvalidMaterial(format!("Invalid not_before: {}", e)))?;
    let ends = cert
        .not_after()
        .compare(&now)
        .map_err(|e| PkiError::InvalidMaterial(format!("Invalid not_after: {}", e)))?;
    Ok(started != Ordering::Greater && ends != Ordering::Less)
}
