//! Root CA Certificate Generation Module
//!
//! Produces the self-signed certificate at the top of the VPN trust hierarchy.
//! Every server and client certificate is signed directly by this root.
//!
//! # Certificate Properties
//! - **Self-signed**: Issuer and subject are the same
//! - **Basic Constraints**: CA=true, critical, no path length limit
//! - **Key Usage**: digitalSignature, keyCertSign, cRLSign (critical)
//! - **Subject Key Identifier**: hash of the public key
//! - **Default Key Size**: RSA 4096-bit
//! - **Default Validity**: 3650 days
//! - **Signature**: SHA-256 with RSA
//!
//! # Example
//! ```rust,no_run
//! # use vpn_pki::generate_root_ca::RsaRootCABuilder;
//! # use vpn_pki::SubjectName;
//! # fn example() -> vpn_pki::Result<()> {
//! let (root_key, root_cert) = RsaRootCABuilder::new(
//!     SubjectName::new("Example Root CA".to_string())
//!         .organization("Example Corporation".to_string())
//!         .country("US".to_string()),
//! )
//! .validity_days(3650)
//! .build()?;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::generate_keypair::KeyPair;
use crate::pki_generator::{sign_certificate, CertificateProfile, CertificateTemplate, SubjectName};
use crate::serial::SerialRegistry;
use openssl::x509::X509;

const RSA_KEY_SIZE_DEFAULT: u32 = 4096;
const VALIDITY_DAYS_DEFAULT: u32 = 3650;

/// Builder for generating an RSA key pair and its self-signed root CA certificate
pub struct RsaRootCABuilder<'a> {
    subject: SubjectName,
    validity_days: u32,
    key_bits: u32,
    serials: Option<&'a SerialRegistry>,
}

impl<'a> RsaRootCABuilder<'a> {
    pub fn new(subject: SubjectName) -> Self {
        Self {
            subject,
            validity_days: VALIDITY_DAYS_DEFAULT,
            key_bits: RSA_KEY_SIZE_DEFAULT,
            serials: None,
        }
    }

    /// Set validity period in days
    pub fn validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }

    /// Set the RSA modulus size (default 4096)
    pub fn key_bits(mut self, bits: u32) -> Self {
        self.key_bits = bits;
        self
    }

    /// Draw the serial from an existing registry so it counts toward that CA's serials.
    pub(crate) fn serials(mut self, registry: &'a SerialRegistry) -> Self {
        self.serials = Some(registry);
        self
    }

    /// Build the RSA key pair and self-signed root CA certificate
    ///
    /// # Errors
    /// - [`PkiError::Generation`](crate::PkiError::Generation) if the key size is
    ///   unsupported or key generation fails
    /// - [`PkiError::Signing`](crate::PkiError::Signing) if a subject field is invalid
    ///   or signing fails
    pub fn build(self) -> Result<(KeyPair, X509)> {
        let name = self.subject.to_x509_name()?;
        let key_pair = KeyPair::generate(self.key_bits)?;

        let local_serials;
        let serials = match self.serials {
            Some(registry) => registry,
            None => {
                local_serials = SerialRegistry::new();
                &local_serials
            }
        };
        let serial = serials.next()?;

        let certificate = sign_certificate(CertificateTemplate {
            profile: CertificateProfile::RootCa,
            subject: &name,
            serial: &serial,
            validity_days: self.validity_days,
            subject_key: key_pair.private_key(),
            issuer: None,
            signing_key: key_pair.private_key(),
        })?;

        Ok((key_pair, certificate))
    }
}
