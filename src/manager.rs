//! PKI lifecycle orchestration.
//!
//! [`PkiManager`] is built once at startup and shared by reference (or `Arc`) with every
//! consumer. The first accessor call bootstraps the root CA, the server certificate and
//! the static key; later calls reuse what is on disk. DH parameters are too slow to
//! generate on a request path, so only [`PkiManager::setup`] produces them.

use crate::auxiliary::AuxiliaryMaterialGenerator;
use crate::certificate_authority::CertificateAuthority;
use crate::configs::PkiConfig;
use crate::error::{PkiError, Result};
use crate::issuer::CertificateIssuer;
use crate::storage::{Artifact, FileStore, PkiStore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

/// Everything a VPN server needs, as PEM or armored text.
#[derive(Serialize)]
pub struct ServerFiles {
    pub ca_cert: String,
    pub server_cert: String,
    #[serde(serialize_with = "serialize_secret")]
    pub server_key: SecretString,
    #[serde(serialize_with = "serialize_secret")]
    pub ta_key: SecretString,
    pub dh_params: String,
}

impl ServerFiles {
    /// File name and contents for each member of the bundle.
    pub fn entries(&self) -> [(Artifact, &str); 5] {
        [
            (Artifact::CaCert, self.ca_cert.as_str()),
            (Artifact::ServerCert, self.server_cert.as_str()),
            (Artifact::ServerKey, self.server_key.expose_secret()),
            (Artifact::TaKey, self.ta_key.expose_secret()),
            (Artifact::DhParams, self.dh_params.as_str()),
        ]
    }
}

impl fmt::Debug for ServerFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerFiles")
            .field("ca_cert", &self.ca_cert.len())
            .field("server_cert", &self.server_cert.len())
            .field("server_key", &"<redacted>")
            .field("ta_key", &"<redacted>")
            .field("dh_params", &self.dh_params.len())
            .finish()
    }
}

fn serialize_secret<S>(secret: &SecretString, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}

pub struct PkiManager {
    config: PkiConfig,
    store: Arc<dyn PkiStore>,
    authority: RwLock<Option<Arc<CertificateAuthority>>>,
    bootstrap_lock: Mutex<()>,
}

impl PkiManager {
    pub fn new(config: PkiConfig, store: Arc<dyn PkiStore>) -> Self {
        Self {
            config,
            store,
            authority: RwLock::new(None),
            bootstrap_lock: Mutex::new(()),
        }
    }

    /// Manager over a [`FileStore`] at `config.store.directory`.
    pub fn from_config(config: PkiConfig) -> Result<Self> {
        let store = FileStore::open(&config.store.directory)?;
        Ok(Self::new(config, Arc::new(store)))
    }

    pub fn config(&self) -> &PkiConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn PkiStore {
        self.store.as_ref()
    }

    /// Bring the store up to a usable state and return the loaded CA.
    ///
    /// Runs the check-then-create sequence under a mutex so concurrent first callers
    /// see exactly one root. Creates, in order: root CA, server certificate, static
    /// key. Existing material is loaded and checked, never replaced.
    pub fn bootstrap(&self) -> Result<Arc<CertificateAuthority>> {
        if let Some(authority) = self.cached_authority() {
            return Ok(authority);
        }

        let _guard = self
            .bootstrap_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(authority) = self.cached_authority() {
            return Ok(authority);
        }

        let store = self.store.as_ref();
        let authority = CertificateAuthority::bootstrap(store, &self.config.ca)?;

        let issuer = CertificateIssuer::new(&authority, store, &self.config);
        if store.exists(Artifact::ServerCert) && store.exists(Artifact::ServerKey) {
            tracing::debug!("loading existing server certificate");
            issuer.load_server_certificate()?;
        } else {
            tracing::info!("issuing server certificate");
            issuer.issue_server_certificate(&self.config.server.subject())?;
        }

        AuxiliaryMaterialGenerator::new(store).generate_static_key()?;

        let authority = Arc::new(authority);
        *self
            .authority
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&authority));
        tracing::info!("PKI bootstrap complete");
        Ok(authority)
    }

    /// Full setup phase: bootstrap plus DH parameters. Blocks for seconds on first run.
    pub fn setup(&self) -> Result<()> {
        self.bootstrap()?;
        AuxiliaryMaterialGenerator::new(self.store.as_ref())
            .generate_dh_parameters(self.config.dh.generator, self.config.dh.bits)?;
        Ok(())
    }

    /// Run [`PkiManager::setup`] on a dedicated thread.
    pub fn spawn_setup(self: &Arc<Self>) -> JoinHandle<Result<()>> {
        let manager = Arc::clone(self);
        thread::spawn(move || {
            let result = manager.setup();
            if let Err(e) = &result {
                tracing::error!(error = %e, "PKI setup failed");
            }
            result
        })
    }

    pub fn get_ca_certificate(&self) -> Result<String> {
        self.bootstrap()?.certificate_pem()
    }

    pub fn get_ta_key(&self) -> Result<String> {
        self.bootstrap()?;
        self.store.read_text(Artifact::TaKey)
    }

    /// The server bundle. Requires a completed [`PkiManager::setup`] for `dh.pem`.
    pub fn get_server_files(&self) -> Result<ServerFiles> {
        self.bootstrap()?;
        if !self.store.exists(Artifact::DhParams) {
            return Err(PkiError::NotFound(
                "dh.pem has not been generated; run setup first".to_string(),
            ));
        }
        Ok(ServerFiles {
            ca_cert: self.store.read_text(Artifact::CaCert)?,
            server_cert: self.store.read_text(Artifact::ServerCert)?,
            server_key: SecretString::from(self.store.read_text(Artifact::ServerKey)?),
            ta_key: SecretString::from(self.store.read_text(Artifact::TaKey)?),
            dh_params: self.store.read_text(Artifact::DhParams)?,
        })
    }

    /// Issue a client certificate for `client_identifier`; returns `(cert_pem, key_pem)`.
    pub fn generate_client_certificate(
        &self,
        client_identifier: &str,
    ) -> Result<(String, SecretString)> {
        let authority = self.bootstrap()?;
        CertificateIssuer::new(&authority, self.store.as_ref(), &self.config)
            .issue_client_certificate(client_identifier)?
            .into_pem_pair()
    }

    fn cached_authority(&self) -> Option<Arc<CertificateAuthority>> {
        self.authority
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for PkiManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkiManager")
            .field("store_directory", &self.config.store.directory)
            .field("bootstrapped", &self.cached_authority().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_manager(dir: &TempDir) -> PkiManager {
        let mut config = PkiConfig::default().with_store_directory(dir.path());
        config.ca.key_bits = 2048;
        config.dh.bits = 512;
        PkiManager::from_config(config).unwrap()
    }

    #[test]
    fn test_accessor_bootstraps_without_dh() {
        let dir = TempDir::new().unwrap();
        let manager = test_manager(&dir);
        let pem = manager.get_ca_certificate().unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));

        let store = manager.store();
        for artifact in [
            Artifact::CaCert,
            Artifact::CaKey,
            Artifact::ServerCert,
            Artifact::ServerKey,
            Artifact::TaKey,
        ] {
            assert!(store.exists(artifact), "{artifact} missing");
        }
        assert!(!store.exists(Artifact::DhParams));
        assert!(matches!(
            manager.get_server_files(),
            Err(PkiError::NotFound(_))
        ));
    }

    #[test]
    fn test_setup_then_server_files() {
        let dir = TempDir::new().unwrap();
        let manager = test_manager(&dir);
        manager.setup().unwrap();

        let files = manager.get_server_files().unwrap();
        assert_eq!(files.ca_cert, manager.get_ca_certificate().unwrap());
        assert_eq!(files.ta_key.expose_secret(), manager.get_ta_key().unwrap());
        assert!(files.dh_params.starts_with("-----BEGIN DH PARAMETERS-----"));

        let debug_str = format!("{:?}", files);
        assert!(!debug_str.contains("PRIVATE KEY"));
        let json = serde_json::to_value(&files).unwrap();
        assert!(json["server_key"]
            .as_str()
            .unwrap()
            .contains("PRIVATE KEY"));
    }

    #[test]
    fn test_reopened_manager_reuses_material() {
        let dir = TempDir::new().unwrap();
        let first = test_manager(&dir);
        first.setup().unwrap();
        let server_before = first.store().read(Artifact::ServerCert).unwrap();
        let ta_before = first.get_ta_key().unwrap();
        drop(first);

        let second = test_manager(&dir);
        second.setup().unwrap();
        assert_eq!(second.store().read(Artifact::ServerCert).unwrap(), server_before);
        assert_eq!(second.get_ta_key().unwrap(), ta_before);
    }

    #[test]
    fn test_spawn_setup_runs_in_background() {
        let dir = TempDir::new().unwrap();
        let manager = Arc::new(test_manager(&dir));
        manager.spawn_setup().join().unwrap().unwrap();
        assert!(manager.store().exists(Artifact::DhParams));
    }
}
