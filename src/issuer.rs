//! Server and client certificate issuance against the root CA.

use crate::certificate_authority::CertificateAuthority;
use crate::certificate_info::CertificateInfo;
use crate::configs::PkiConfig;
use crate::error::{PkiError, Result};
use crate::generate_keypair::{pem_to_string, KeyPair};
use crate::generate_leaf_cert::RsaLeafCertBuilder;
use crate::pki_generator::{CertificateProfile, SubjectName};
use crate::storage::{Artifact, PkiStore};
use openssl::x509::X509;
use secrecy::{ExposeSecret, SecretString};

/// The persisted VPN server certificate and its key.
#[derive(Debug)]
pub struct ServerCertificate {
    pub certificate: X509,
    pub key_pair: KeyPair,
}

/// A freshly issued client certificate. Never persisted by this crate.
#[derive(Debug)]
pub struct ClientCertificate {
    pub certificate: X509,
    pub key_pair: KeyPair,
}

impl ClientCertificate {
    /// Certificate PEM and private key PEM, ready to inline into a client profile.
    pub fn into_pem_pair(self) -> Result<(String, SecretString)> {
        let cert_pem = certificate_to_pem(&self.certificate)?;
        let key_pem = self.key_pair.private_key_pem()?;
        Ok((cert_pem, key_pem))
    }
}

pub struct CertificateIssuer<'a> {
    authority: &'a CertificateAuthority,
    store: &'a dyn PkiStore,
    config: &'a PkiConfig,
}

impl<'a> CertificateIssuer<'a> {
    pub fn new(
        authority: &'a CertificateAuthority,
        store: &'a dyn PkiStore,
        config: &'a PkiConfig,
    ) -> Self {
        Self {
            authority,
            store,
            config,
        }
    }

    /// Issue the VPN server certificate for `subject` and persist `server.key` + `server.crt`.
    ///
    /// Overwrites any existing server certificate; callers decide when reissuing is due.
    pub fn issue_server_certificate(&self, subject: &SubjectName) -> Result<ServerCertificate> {
        let (key_pair, certificate) =
            RsaLeafCertBuilder::new(CertificateProfile::Server, subject.clone(), self.authority)
                .key_bits(self.config.server.key_bits)
                .validity_days(self.config.server.validity_days)
                .build()?;
        log_issued("server", &certificate);

        let key_pem = key_pair.private_key_pem()?;
        let cert_pem = certificate_to_pem(&certificate)?;
        self.store
            .write(Artifact::ServerKey, key_pem.expose_secret().as_bytes())?;
        self.store.write(Artifact::ServerCert, cert_pem.as_bytes())?;

        Ok(ServerCertificate {
            certificate,
            key_pair,
        })
    }

    /// Issue a client certificate whose CN is `client_identifier`, verbatim.
    ///
    /// The same identifier may be issued any number of times; each call yields a new
    /// key pair and serial, and nothing is recorded in the store.
    pub fn issue_client_certificate(&self, client_identifier: &str) -> Result<ClientCertificate> {
        let subject = self.config.client.subject_for(client_identifier);
        let (key_pair, certificate) =
            RsaLeafCertBuilder::new(CertificateProfile::Client, subject, self.authority)
                .key_bits(self.config.client.key_bits)
                .validity_days(self.config.client.validity_days)
                .build()?;
        log_issued("client", &certificate);

        Ok(ClientCertificate {
            certificate,
            key_pair,
        })
    }

    /// Load the stored server certificate, checking it belongs to this CA and its key.
    pub fn load_server_certificate(&self) -> Result<ServerCertificate> {
        let certificate = X509::from_pem(&self.store.read(Artifact::ServerCert)?).map_err(|e| {
            PkiError::InvalidMaterial(format!("Failed to parse server certificate: {}", e))
        })?;
        let key_pair = KeyPair::from_pem(&self.store.read(Artifact::ServerKey)?)?;

        let public_key = certificate.public_key().map_err(|e| {
            PkiError::InvalidMaterial(format!("Server certificate has no public key: {}", e))
        })?;
        if !key_pair.public_eq(&public_key) {
            return Err(PkiError::InvalidMaterial(
                "server.key does not match server.crt".to_string(),
            ));
        }
        if !self.authority.has_issued(&certificate)? {
            return Err(PkiError::InvalidMaterial(
                "server.crt was not issued by the stored root CA".to_string(),
            ));
        }
        self.authority.register_issued(&certificate)?;

        Ok(ServerCertificate {
            certificate,
            key_pair,
        })
    }
}

pub(crate) fn certificate_to_pem(certificate: &X509) -> Result<String> {
    let pem = certificate
        .to_pem()
        .map_err(|e| PkiError::Signing(format!("Failed to encode certificate: {}", e)))?;
    pem_to_string(pem)
}

fn log_issued(kind: &str, certificate: &X509) {
    match CertificateInfo::from_x509(certificate) {
        Ok(info) => tracing::info!(
            kind,
            serial = %info.serial,
            subject = %info.subject,
            not_after = %info.not_after,
            "certificate issued"
        ),
        Err(e) => tracing::warn!(kind, error = %e, "certificate issued but could not be summarized"),
    }
}
