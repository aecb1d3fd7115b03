use crate::error::{PkiError, Result};
use crate::pki_generator::SubjectName;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PkiConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ca: CaConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub dh: DhConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_directory")]
    pub directory: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: default_store_directory(),
        }
    }
}

fn default_store_directory() -> PathBuf {
    PathBuf::from("data/pki")
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaConfig {
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default = "default_locality")]
    pub locality: String,
    #[serde(default = "default_organization")]
    pub organization: String,
    #[serde(default = "default_organizational_unit")]
    pub organizational_unit: String,
    #[serde(default = "default_ca_common_name")]
    pub common_name: String,
    #[serde(default = "default_ca_validity")]
    pub validity_days: u32,
    #[serde(default = "default_ca_key_bits")]
    pub key_bits: u32,
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            country: default_country(),
            state: default_state(),
            locality: default_locality(),
            organization: default_organization(),
            organizational_unit: default_organizational_unit(),
            common_name: default_ca_common_name(),
            validity_days: default_ca_validity(),
            key_bits: default_ca_key_bits(),
        }
    }
}

impl CaConfig {
    /// Root distinguished name: C, ST, L, O, OU, CN.
    pub fn subject(&self) -> SubjectName {
        SubjectName::new(self.common_name.clone())
            .country(self.country.clone())
            .state(self.state.clone())
            .locality(self.locality.clone())
            .organization(self.organization.clone())
            .organizational_unit(self.organizational_unit.clone())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default = "default_organization")]
    pub organization: String,
    #[serde(default)]
    pub organizational_unit: Option<String>,
    #[serde(default = "default_server_common_name")]
    pub common_name: String,
    #[serde(default = "default_server_validity")]
    pub validity_days: u32,
    #[serde(default = "default_leaf_key_bits")]
    pub key_bits: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            country: default_country(),
            state: default_state(),
            locality: None,
            organization: default_organization(),
            organizational_unit: None,
            common_name: default_server_common_name(),
            validity_days: default_server_validity(),
            key_bits: default_leaf_key_bits(),
        }
    }
}

impl ServerConfig {
    pub fn subject(&self) -> SubjectName {
        let mut subject = SubjectName::new(self.common_name.clone())
            .country(self.country.clone())
            .state(self.state.clone())
            .organization(self.organization.clone());
        if let Some(locality) = &self.locality {
            subject = subject.locality(locality.clone());
        }
        if let Some(ou) = &self.organizational_unit {
            subject = subject.organizational_unit(ou.clone());
        }
        subject
    }
}

/// Client DN template. The common name is supplied per issuance.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default = "default_organization")]
    pub organization: String,
    #[serde(default)]
    pub organizational_unit: Option<String>,
    #[serde(default = "default_client_validity")]
    pub validity_days: u32,
    #[serde(default = "default_leaf_key_bits")]
    pub key_bits: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            country: default_country(),
            state: default_state(),
            locality: None,
            organization: default_organization(),
            organizational_unit: None,
            validity_days: default_client_validity(),
            key_bits: default_leaf_key_bits(),
        }
    }
}

impl ClientConfig {
    /// Build the subject for one client; `client_identifier` becomes the CN verbatim.
    pub fn subject_for(&self, client_identifier: &str) -> SubjectName {
        let mut subject = SubjectName::new(client_identifier.to_string())
            .country(self.country.clone())
            .state(self.state.clone())
            .organization(self.organization.clone());
        if let Some(locality) = &self.locality {
            subject = subject.locality(locality.clone());
        }
        if let Some(ou) = &self.organizational_unit {
            subject = subject.organizational_unit(ou.clone());
        }
        subject
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DhConfig {
    #[serde(default = "default_dh_generator")]
    pub generator: u32,
    #[serde(default = "default_dh_bits")]
    pub bits: u32,
}

impl Default for DhConfig {
    fn default() -> Self {
        Self {
            generator: default_dh_generator(),
            bits: default_dh_bits(),
        }
    }
}

fn default_country() -> String {
    "US".to_string()
}

fn default_state() -> String {
    "California".to_string()
}

fn default_locality() -> String {
    "San Francisco".to_string()
}

fn default_organization() -> String {
    "VPN PKI".to_string()
}

fn default_organizational_unit() -> String {
    "VPN Services".to_string()
}

fn default_ca_common_name() -> String {
    "VPN Root CA".to_string()
}

fn default_server_common_name() -> String {
    "VPN Server".to_string()
}

fn default_ca_validity() -> u32 {
    3650 // 10 years
}

fn default_server_validity() -> u32 {
    1825 // 5 years
}

fn default_client_validity() -> u32 {
    365
}

fn default_ca_key_bits() -> u32 {
    4096
}

fn default_leaf_key_bits() -> u32 {
    2048
}

fn default_dh_generator() -> u32 {
    2
}

fn default_dh_bits() -> u32 {
    2048
}

impl PkiConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path).map_err(|e| {
            PkiError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&config_str)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        toml::from_str(config_str)
            .map_err(|e| PkiError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Load configuration with default path (config.toml)
    pub fn load() -> Result<Self> {
        Self::from_file(DEFAULT_CONFIG_PATH)
    }

    pub fn with_store_directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.store.directory = directory.into();
        self
    }
}
