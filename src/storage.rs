//! Persistence of PKI artifacts.
//!
//! Issuance logic talks to [`PkiStore`], never to the filesystem directly. The default
//! [`FileStore`] keeps every artifact as a plain file in one directory:
//!
//! ```text
//! <root>/
//!   ca.crt      PEM certificate
//!   ca.key      PEM private key (unencrypted, mode 0600)
//!   server.crt
//!   server.key  (mode 0600)
//!   ta.key      OpenVPN static key armor (mode 0600)
//!   dh.pem      PEM DH parameters
//! ```
//!
//! # Security
//!
//! `FileStore` does not encrypt at rest. Anyone able to read the directory owns the
//! trust root. Production deployments must supply an encrypted `PkiStore`
//! implementation (secret manager, sealed volume, ...) in its place.

use crate::error::{PkiError, Result};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Logical names of everything the PKI persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    CaCert,
    CaKey,
    ServerCert,
    ServerKey,
    TaKey,
    DhParams,
}

impl Artifact {
    pub const ALL: [Artifact; 6] = [
        Artifact::CaCert,
        Artifact::CaKey,
        Artifact::ServerCert,
        Artifact::ServerKey,
        Artifact::TaKey,
        Artifact::DhParams,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            Artifact::CaCert => "ca.crt",
            Artifact::CaKey => "ca.key",
            Artifact::ServerCert => "server.crt",
            Artifact::ServerKey => "server.key",
            Artifact::TaKey => "ta.key",
            Artifact::DhParams => "dh.pem",
        }
    }

    /// Artifacts holding secret key material.
    pub fn is_secret(&self) -> bool {
        matches!(
            self,
            Artifact::CaKey | Artifact::ServerKey | Artifact::TaKey
        )
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Backing store for PKI artifacts.
pub trait PkiStore: Send + Sync {
    fn exists(&self, artifact: Artifact) -> bool;

    /// Read an artifact; [`PkiError::NotFound`] when it is absent.
    fn read(&self, artifact: Artifact) -> Result<Vec<u8>>;

    /// Replace an artifact. Implementations must never leave a partial write visible.
    fn write(&self, artifact: Artifact, contents: &[u8]) -> Result<()>;

    fn read_text(&self, artifact: Artifact) -> Result<String> {
        let bytes = self.read(artifact)?;
        String::from_utf8(bytes).map_err(|e| {
            PkiError::InvalidMaterial(format!("{} is not valid UTF-8: {}", artifact, e))
        })
    }
}

/// Directory-backed store with atomic (temp file + rename) writes.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory and its parents.
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, artifact: Artifact) -> PathBuf {
        self.root.join(artifact.file_name())
    }
}

impl PkiStore for FileStore {
    fn exists(&self, artifact: Artifact) -> bool {
        self.path_of(artifact).is_file()
    }

    fn read(&self, artifact: Artifact) -> Result<Vec<u8>> {
        let path = self.path_of(artifact);
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                PkiError::NotFound(format!("{} ({})", artifact, path.display()))
            }
            _ => PkiError::Io(e),
        })
    }

    fn write(&self, artifact: Artifact, contents: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.root)?;

        // The temp file lives next to the target so the rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = if artifact.is_secret() { 0o600 } else { 0o644 };
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(mode))?;
        }

        let path = self.path_of(artifact);
        tmp.persist(&path).map_err(|e| PkiError::Io(e.error))?;
        tracing::debug!(artifact = %artifact, path = %path.display(), "artifact written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_nested_directory() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("a").join("b").join("pki");
        let store = FileStore::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        assert!(!store.exists(Artifact::CaKey));
        let err = store.read(Artifact::CaKey).unwrap_err();
        assert!(matches!(err, PkiError::NotFound(msg) if msg.contains("ca.key")));
    }

    #[test]
    fn test_write_then_read() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store.write(Artifact::DhParams, b"params").unwrap();
        assert!(store.exists(Artifact::DhParams));
        assert_eq!(store.read(Artifact::DhParams).unwrap(), b"params");
        assert_eq!(store.read_text(Artifact::DhParams).unwrap(), "params");
        assert!(tmp.path().join("dh.pem").is_file());
    }

    #[test]
    fn test_overwrite_replaces_contents_without_leftovers() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store.write(Artifact::ServerCert, b"first").unwrap();
        store.write(Artifact::ServerCert, b"second").unwrap();
        assert_eq!(store.read(Artifact::ServerCert).unwrap(), b"second");

        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "temporary files must not remain");
    }

    #[test]
    fn test_read_text_rejects_binary() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store.write(Artifact::TaKey, &[0xff, 0xfe, 0x00]).unwrap();
        let err = store.read_text(Artifact::TaKey).unwrap_err();
        assert!(matches!(err, PkiError::InvalidMaterial(_)));
    }

    #[test]
    fn test_file_names() {
        let names: Vec<_> = Artifact::ALL.iter().map(|a| a.file_name()).collect();
        assert_eq!(
            names,
            ["ca.crt", "ca.key", "server.crt", "server.key", "ta.key", "dh.pem"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_artifacts_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        store.write(Artifact::CaKey, b"key").unwrap();
        store.write(Artifact::CaCert, b"cert").unwrap();

        let key_mode = fs::metadata(store.path_of(Artifact::CaKey))
            .unwrap()
            .permissions()
            .mode();
        let cert_mode = fs::metadata(store.path_of(Artifact::CaCert))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(key_mode & 0o777, 0o600);
        assert_eq!(cert_mode & 0o777, 0o644);
    }
}
