//! VPN PKI - Private Certificate Authority for OpenVPN Provisioning
//!
//! Bootstraps a private trust root and produces everything an OpenVPN deployment needs
//! from it: a server certificate, per-client certificates, the `tls-auth` static key and
//! Diffie-Hellman parameters. Material lives in a [`PkiStore`] (a plain directory by
//! default) and is created once, then reused for the lifetime of the store.
//!
//! # Overview
//!
//! ```text
//! Root CA (self-signed, CA:TRUE, 10 years, RSA 4096)
//!   ├── Server Certificate (CA:FALSE, serverAuth, 5 years, persisted)
//!   └── Client Certificates (CA:FALSE, clientAuth, 1 year, returned to the caller)
//!
//! ta.key  (2048-bit OpenVPN static key)
//! dh.pem  (DH parameters, generated during setup only)
//! ```
//!
//! # Quick Start
//!
//! ## As an Application
//!
//! ```bash
//! # Create the CA, server certificate, static key and DH parameters
//! vpn-pki --config config.toml setup
//!
//! # Issue a client certificate into ./clients
//! vpn-pki client alice_laptop --out clients
//! ```
//!
//! ## As a Library
//!
//! ```no_run
//! use std::sync::Arc;
//! use vpn_pki::{PkiConfig, PkiManager};
//! use secrecy::ExposeSecret;
//!
//! fn main() -> vpn_pki::Result<()> {
//!     let manager = Arc::new(PkiManager::from_config(PkiConfig::load()?)?);
//!
//!     // DH generation takes seconds; keep it off request paths
//!     manager.spawn_setup();
//!
//!     let ca_pem = manager.get_ca_certificate()?;
//!     let (cert_pem, key_pem) = manager.generate_client_certificate("alice_laptop")?;
//!     println!("{ca_pem}{cert_pem}{}", key_pem.expose_secret());
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`manager`]: [`PkiManager`], the public contract consumed by the VPN layer
//! - [`certificate_authority`]: root CA bootstrap and loading
//! - [`issuer`]: server and client certificate issuance
//! - [`auxiliary`]: static key and DH parameter generate-once logic
//! - [`storage`]: the [`PkiStore`] trait and the directory-backed [`FileStore`]
//! - [`generate_root_ca`] / [`generate_leaf_cert`]: certificate builders
//! - [`generate_keypair`]: RSA key pairs
//!
//! # Security Considerations
//!
//! - `ca.key`, `server.key` and `ta.key` are written with mode `0600`, but
//!   [`FileStore`] does **not** encrypt them. Supply an encrypted [`PkiStore`] for
//!   production use.
//! - An existing root is never regenerated. A store holding only half of the root fails
//!   to load with [`PkiError::NotFound`].
//! - Serial numbers are 159-bit CSPRNG draws, checked for uniqueness per CA instance.
//! - No revocation (CRL/OCSP) is provided.

pub mod auxiliary;
pub mod certificate_authority;
pub mod certificate_info;
pub mod configs;
pub mod dh_params;
pub mod error;
pub mod generate_keypair;
pub mod generate_leaf_cert;
pub mod generate_root_ca;
pub mod issuer;
pub mod manager;
pub mod pki_generator;
mod serial;
pub mod static_key;
pub mod storage;

pub use auxiliary::AuxiliaryMaterialGenerator;
pub use certificate_authority::CertificateAuthority;
pub use certificate_info::CertificateInfo;
pub use configs::PkiConfig;
pub use dh_params::DhParameters;
pub use error::{PkiError, Result};
pub use generate_keypair::{KeyAlgorithm, KeyPair};
pub use issuer::{CertificateIssuer, ClientCertificate, ServerCertificate};
pub use manager::{PkiManager, ServerFiles};
pub use pki_generator::{CertificateProfile, SubjectName};
pub use static_key::StaticKey;
pub use storage::{Artifact, FileStore, PkiStore};
