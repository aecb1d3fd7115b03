//! Shared X.509v3 construction and signing
//!
//! Root, server and client certificates differ only in their issuer, validity and
//! extension profile. This module holds the pieces they share: the [`SubjectName`]
//! distinguished name, the [`CertificateProfile`] extension sets and
//! [`sign_certificate`], which builds the to-be-signed structure and signs it with
//! SHA-256.

use crate::error::{PkiError, Result};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNumRef;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKeyRef, Private};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectKeyIdentifier,
};
use openssl::x509::{X509Name, X509NameRef, X509Ref, X509};
use serde::{Deserialize, Serialize};

const X509_VERSION_3: i32 = 2; // X509 version 3 is represented by 2

/// Distinguished name of a certificate subject.
///
/// Only the common name is mandatory. Optional fields left unset (or empty) are
/// omitted from the encoded name. Entries are appended in C, ST, L, O, OU, CN order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectName {
    country: Option<String>,
    state: Option<String>,
    locality: Option<String>,
    organization: Option<String>,
    organizational_unit: Option<String>,
    common_name: String,
}

impl SubjectName {
    pub fn new(common_name: String) -> Self {
        Self {
            country: None,
            state: None,
            locality: None,
            organization: None,
            organizational_unit: None,
            common_name,
        }
    }

    /// Set the country (C) for the certificate (2-letter ISO code)
    pub fn country(mut self, country: String) -> Self {
        self.country = Some(country);
        self
    }

    /// Set the state/province (ST) for the certificate
    pub fn state(mut self, state: String) -> Self {
        self.state = Some(state);
        self
    }

    /// Set the locality (L) for the certificate
    pub fn locality(mut self, locality: String) -> Self {
        self.locality = Some(locality);
        self
    }

    /// Set the organization (O) for the certificate
    pub fn organization(mut self, org: String) -> Self {
        self.organization = Some(org);
        self
    }

    /// Set the organizational unit (OU) for the certificate
    pub fn organizational_unit(mut self, ou: String) -> Self {
        self.organizational_unit = Some(ou);
        self
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    /// Encode as an OpenSSL name.
    ///
    /// # Errors
    /// [`PkiError::Signing`] when the common name is empty or OpenSSL rejects a field
    /// (wrong country code length, CN over 64 characters, ...).
    pub fn to_x509_name(&self) -> Result<X509Name> {
        if self.common_name.is_empty() {
            return Err(PkiError::Signing(
                "subject common name must not be empty".to_string(),
            ));
        }

        let mut name_builder = X509Name::builder()
            .map_err(|e| PkiError::Signing(format!("Failed to create name builder: {}", e)))?;

        let fields = [
            (Nid::COUNTRYNAME, &self.country, "country"),
            (Nid::STATEORPROVINCENAME, &self.state, "state/province"),
            (Nid::LOCALITYNAME, &self.locality, "locality"),
            (Nid::ORGANIZATIONNAME, &self.organization, "organization"),
            (
                Nid::ORGANIZATIONALUNITNAME,
                &self.organizational_unit,
                "organizational unit",
            ),
        ];
        for (nid, value, label) in fields {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                name_builder
                    .append_entry_by_nid(nid, value)
                    .map_err(|e| PkiError::Signing(format!("Failed to set {}: {}", label, e)))?;
            }
        }

        name_builder
            .append_entry_by_nid(Nid::COMMONNAME, &self.common_name)
            .map_err(|e| PkiError::Signing(format!("Failed to set CN: {}", e)))?;

        Ok(name_builder.build())
    }
}

/// Extension set applied to a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateProfile {
    /// Self-signed trust anchor: CA:TRUE with no path length limit,
    /// keyUsage digitalSignature + keyCertSign + cRLSign.
    RootCa,
    /// Leaf for the VPN server: keyUsage digitalSignature + keyEncipherment, EKU serverAuth.
    Server,
    /// Leaf for one VPN client: keyUsage digitalSignature + keyEncipherment, EKU clientAuth.
    Client,
}

impl CertificateProfile {
    pub fn is_ca(&self) -> bool {
        matches!(self, CertificateProfile::RootCa)
    }
}

/// Everything needed to produce one signed certificate.
pub(crate) struct CertificateTemplate<'a> {
    pub profile: CertificateProfile,
    pub subject: &'a X509NameRef,
    pub serial: &'a BigNumRef,
    pub validity_days: u32,
    /// Key whose public half is certified
    pub subject_key: &'a PKeyRef<Private>,
    /// Issuer certificate; `None` for a self-signed root
    pub issuer: Option<&'a X509Ref>,
    /// Key producing the signature (the subject key when self-signed)
    pub signing_key: &'a PKeyRef<Private>,
}

/// Build the TBS structure described by `template` and sign it with SHA-256.
pub(crate) fn sign_certificate(template: CertificateTemplate<'_>) -> Result<X509> {
    let mut builder = X509::builder()
        .map_err(|e| PkiError::Signing(format!("Failed to create X509 builder: {}", e)))?;

    builder
        .set_version(X509_VERSION_3)
        .map_err(|e| PkiError::Signing(format!("Failed to set version: {}", e)))?;

    let asn1_serial = template
        .serial
        .to_asn1_integer()
        .map_err(|e| PkiError::Signing(format!("Failed to encode serial: {}", e)))?;
    builder
        .set_serial_number(&asn1_serial)
        .map_err(|e| PkiError::Signing(format!("Failed to set serial: {}", e)))?;

    builder
        .set_subject_name(template.subject)
        .map_err(|e| PkiError::Signing(format!("Failed to set subject: {}", e)))?;

    let issuer_name = match template.issuer {
        Some(issuer) => issuer.subject_name(),
        None => template.subject,
    };
    builder
        .set_issuer_name(issuer_name)
        .map_err(|e| PkiError::Signing(format!("Failed to set issuer: {}", e)))?;

    let not_before = Asn1Time::days_from_now(0)
        .map_err(|e| PkiError::Signing(format!("Failed to create not_before: {}", e)))?;
    builder
        .set_not_before(&not_before)
        .map_err(|e| PkiError::Signing(format!("Failed to set not_before: {}", e)))?;

    let not_after = Asn1Time::days_from_now(template.validity_days)
        .map_err(|e| PkiError::Signing(format!("Failed to create not_after: {}", e)))?;
    builder
        .set_not_after(&not_after)
        .map_err(|e| PkiError::Signing(format!("Failed to set not_after: {}", e)))?;

    builder
        .set_pubkey(template.subject_key)
        .map_err(|e| PkiError::Signing(format!("Failed to set public key: {}", e)))?;

    // Basic Constraints
    let mut bc = BasicConstraints::new();
    bc.critical();
    if template.profile.is_ca() {
        bc.ca();
    }
    let bc = bc
        .build()
        .map_err(|e| PkiError::Signing(format!("Failed to build BasicConstraints: {}", e)))?;
    builder
        .append_extension(bc)
        .map_err(|e| PkiError::Signing(format!("Failed to add BasicConstraints: {}", e)))?;

    // Key Usage
    let mut ku = KeyUsage::new();
    ku.critical().digital_signature();
    match template.profile {
        CertificateProfile::RootCa => {
            ku.key_cert_sign().crl_sign();
        }
        CertificateProfile::Server | CertificateProfile::Client => {
            ku.key_encipherment();
        }
    }
    let ku = ku
        .build()
        .map_err(|e| PkiError::Signing(format!("Failed to build KeyUsage: {}", e)))?;
    builder
        .append_extension(ku)
        .map_err(|e| PkiError::Signing(format!("Failed to add KeyUsage: {}", e)))?;

    // Extended Key Usage (leaves only)
    let eku = match template.profile {
        CertificateProfile::RootCa => None,
        CertificateProfile::Server => Some(ExtendedKeyUsage::new().server_auth().build()),
        CertificateProfile::Client => Some(ExtendedKeyUsage::new().client_auth().build()),
    };
    if let Some(eku) = eku {
        let eku = eku
            .map_err(|e| PkiError::Signing(format!("Failed to build ExtendedKeyUsage: {}", e)))?;
        builder
            .append_extension(eku)
            .map_err(|e| PkiError::Signing(format!("Failed to add ExtendedKeyUsage: {}", e)))?;
    }

    // Subject Key Identifier, hashed from the public key set above
    let ski = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(template.issuer, None))
        .map_err(|e| PkiError::Signing(format!("Failed to build SubjectKeyIdentifier: {}", e)))?;
    builder
        .append_extension(ski)
        .map_err(|e| PkiError::Signing(format!("Failed to add SubjectKeyIdentifier: {}", e)))?;

    // Authority Key Identifier, taken from the issuer's SKI
    if let Some(issuer) = template.issuer {
        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&builder.x509v3_context(Some(issuer), None))
            .map_err(|e| {
                PkiError::Signing(format!("Failed to build AuthorityKeyIdentifier: {}", e))
            })?;
        builder.append_extension(aki).map_err(|e| {
            PkiError::Signing(format!("Failed to add AuthorityKeyIdentifier: {}", e))
        })?;
    }

    builder
        .sign(template.signing_key, MessageDigest::sha256())
        .map_err(|e| PkiError::Signing(format!("Failed to sign certificate: {}", e)))?;

    Ok(builder.build())
}

/// Common name of an X.509 name, if present.
pub fn common_name_of(name: &X509NameRef) -> Option<String> {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().to_string().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate_keypair::KeyPair;
    use openssl::bn::BigNum;

    fn self_signed(pair: &KeyPair, subject: &SubjectName) -> X509 {
        let name = subject.to_x509_name().unwrap();
        let serial = BigNum::from_u32(42).unwrap();
        sign_certificate(CertificateTemplate {
            profile: CertificateProfile::RootCa,
            subject: &name,
            serial: &serial,
            validity_days: 30,
            subject_key: pair.private_key(),
            issuer: None,
            signing_key: pair.private_key(),
        })
        .unwrap()
    }

    #[test]
    fn test_subject_name_requires_common_name() {
        let err = SubjectName::new(String::new()).to_x509_name().err().unwrap();
        assert!(matches!(err, PkiError::Signing(_)));
    }

    #[test]
    fn test_subject_name_rejects_bad_country() {
        let err = SubjectName::new("x".to_string())
            .country("USA".to_string())
            .to_x509_name()
            .err()
            .unwrap();
        assert!(matches!(err, PkiError::Signing(_)));
    }

    #[test]
    fn test_subject_name_skips_empty_fields() {
        let name = SubjectName::new("node-1".to_string())
            .organization(String::new())
            .country("DE".to_string())
            .to_x509_name()
            .unwrap();
        assert_eq!(name.entries().count(), 2);
        assert_eq!(common_name_of(&name).as_deref(), Some("node-1"));
    }

    #[test]
    fn test_self_signed_root_profile() {
        let pair = KeyPair::generate(2048).unwrap();
        let subject = SubjectName::new("Test Root".to_string()).organization("Test".to_string());
        let cert = self_signed(&pair, &subject);

        let public_key = cert.public_key().unwrap();
        assert!(cert.verify(&public_key).unwrap());
        assert!(pair.public_eq(&public_key));
        assert_eq!(cert.version(), X509_VERSION_3);
        assert!(cert.subject_key_id().is_some());
        assert!(cert.authority_key_id().is_none());
        assert_eq!(
            cert.subject_name().try_cmp(cert.issuer_name()).unwrap(),
            std::cmp::Ordering::Equal
        );

        let text = String::from_utf8(cert.to_text().unwrap()).unwrap();
        assert!(text.contains("CA:TRUE"));
        assert!(!text.contains("pathlen"));
        assert!(text.contains("Certificate Sign"));
        assert!(text.contains("CRL Sign"));
        assert!(text.contains("sha256WithRSAEncryption"));
    }

    #[test]
    fn test_leaf_profiles_carry_eku() {
        let ca_pair = KeyPair::generate(2048).unwrap();
        let ca_cert = self_signed(&ca_pair, &SubjectName::new("Test Root".to_string()));
        let leaf_pair = KeyPair::generate(2048).unwrap();

        for (profile, usage) in [
            (CertificateProfile::Server, "TLS Web Server Authentication"),
            (CertificateProfile::Client, "TLS Web Client Authentication"),
        ] {
            let name = SubjectName::new("leaf".to_string()).to_x509_name().unwrap();
            let serial = BigNum::from_u32(7).unwrap();
            let cert = sign_certificate(CertificateTemplate {
                profile,
                subject: &name,
                serial: &serial,
                validity_days: 10,
                subject_key: leaf_pair.private_key(),
                issuer: Some(&ca_cert),
                signing_key: ca_pair.private_key(),
            })
            .unwrap();

            assert!(cert.verify(&ca_cert.public_key().unwrap()).unwrap());
            assert_eq!(
                cert.authority_key_id().unwrap().as_slice(),
                ca_cert.subject_key_id().unwrap().as_slice()
            );
            let text = String::from_utf8(cert.to_text().unwrap()).unwrap();
            assert!(text.contains("CA:FALSE"));
            assert!(text.contains("Key Encipherment"));
            assert!(text.contains(usage));
            assert!(!text.contains("Certificate Sign"));
        }
    }
}
