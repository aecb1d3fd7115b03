//! Generate-once auxiliary material: the OpenVPN static key and DH parameters.
//!
//! Both are created the first time they are requested and read back from the store on
//! every later call, so a running VPN server never sees them change underneath it.
//! The exists/generate/write sequence runs under a process-wide lock, so concurrent
//! callers all end up with the one persisted value.

use crate::dh_params::DhParameters;
use crate::error::Result;
use crate::static_key::StaticKey;
use crate::storage::{Artifact, PkiStore};
use std::sync::{Mutex, MutexGuard, PoisonError};

static GENERATION_LOCK: Mutex<()> = Mutex::new(());

fn generation_guard() -> MutexGuard<'static, ()> {
    GENERATION_LOCK
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

pub struct AuxiliaryMaterialGenerator<'a> {
    store: &'a dyn PkiStore,
}

impl<'a> AuxiliaryMaterialGenerator<'a> {
    pub fn new(store: &'a dyn PkiStore) -> Self {
        Self { store }
    }

    /// Return the persisted static key, creating `ta.key` on first use.
    pub fn generate_static_key(&self) -> Result<StaticKey> {
        let _guard = generation_guard();
        if self.store.exists(Artifact::TaKey) {
            tracing::debug!("loading existing static key");
            return StaticKey::parse(&self.store.read_text(Artifact::TaKey)?);
        }

        let key = StaticKey::generate()?;
        self.store
            .write(Artifact::TaKey, key.to_armored().as_bytes())?;
        tracing::info!("static key created");
        Ok(key)
    }

    /// Return the persisted DH parameters, creating `dh.pem` on first use.
    ///
    /// `generator` and `size_bits` only apply when nothing is stored yet; existing
    /// parameters are returned unchanged even if they were made with other values.
    pub fn generate_dh_parameters(&self, generator: u32, size_bits: u32) -> Result<DhParameters> {
        let _guard = generation_guard();
        if self.store.exists(Artifact::DhParams) {
            tracing::debug!("loading existing DH parameters");
            let stored = DhParameters::from_pem(&self.store.read(Artifact::DhParams)?)?;
            if stored.size_bits() != size_bits {
                tracing::warn!(
                    stored_bits = stored.size_bits(),
                    requested_bits = size_bits,
                    "keeping stored DH parameters of a different size"
                );
            }
            return Ok(stored);
        }

        let params = DhParameters::generate(generator, size_bits)?;
        self.store
            .write(Artifact::DhParams, params.to_pem()?.as_bytes())?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PkiError;
    use crate::storage::FileStore;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_static_key_generated_once() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let aux = AuxiliaryMaterialGenerator::new(&store);

        let first = aux.generate_static_key().unwrap();
        let on_disk = store.read(Artifact::TaKey).unwrap();
        let second = aux.generate_static_key().unwrap();

        assert_eq!(first.expose_bytes(), second.expose_bytes());
        assert_eq!(store.read(Artifact::TaKey).unwrap(), on_disk);
        assert_eq!(
            StaticKey::parse(&String::from_utf8(on_disk).unwrap())
                .unwrap()
                .expose_bytes(),
            first.expose_bytes()
        );
    }

    #[test]
    fn test_corrupt_static_key_is_not_replaced() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.write(Artifact::TaKey, b"garbage").unwrap();

        let err = AuxiliaryMaterialGenerator::new(&store)
            .generate_static_key()
            .unwrap_err();
        assert!(matches!(err, PkiError::InvalidMaterial(_)));
        assert_eq!(store.read(Artifact::TaKey).unwrap(), b"garbage");
    }

    #[test]
    fn test_dh_parameters_generated_once() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let aux = AuxiliaryMaterialGenerator::new(&store);

        let first = aux.generate_dh_parameters(2, 512).unwrap();
        let pem = store.read_text(Artifact::DhParams).unwrap();
        let second = aux.generate_dh_parameters(2, 512).unwrap();

        assert_eq!(first.prime().to_vec(), second.prime().to_vec());
        assert_eq!(store.read_text(Artifact::DhParams).unwrap(), pem);
        assert_eq!(second.generator().to_vec(), vec![2]);
    }

    #[test]
    fn test_concurrent_static_key_requests_share_one_key() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let key = AuxiliaryMaterialGenerator::new(store.as_ref())
                        .generate_static_key()
                        .unwrap();
                    key.expose_bytes().to_vec()
                })
            })
            .collect();

        let returned: Vec<Vec<u8>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let persisted = StaticKey::parse(&store.read_text(Artifact::TaKey).unwrap()).unwrap();
        for bytes in returned {
            assert_eq!(bytes, persisted.expose_bytes().to_vec());
        }
    }
}
