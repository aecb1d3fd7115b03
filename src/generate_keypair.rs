//! RSA key pair generation
//!
//! Every certificate in the PKI is backed by an RSA key pair generated here. The root CA
//! uses 4096-bit keys by default and leaf certificates 2048-bit keys; 3072 is accepted
//! as well. Any other size is rejected before OpenSSL is asked to do any work.
//!
//! The private key stays inside [`KeyPair`]. Exporting it is an explicit call that
//! returns a [`SecretString`], and the `Debug` output never contains key material.

use crate::error::{PkiError, Result};
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::rsa::Rsa;
use secrecy::SecretString;
use std::fmt;

/// RSA modulus sizes accepted by [`KeyPair::generate`].
pub const SUPPORTED_RSA_KEY_SIZES: [u32; 3] = [2048, 3072, 4096];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa,
}

/// An RSA private key together with its public half.
pub struct KeyPair {
    private_key: PKey<Private>,
    size_bits: u32,
}

impl KeyPair {
    /// Generate a fresh RSA key pair of `size_bits`.
    ///
    /// # Errors
    /// Returns [`PkiError::Generation`] if the size is not one of
    /// [`SUPPORTED_RSA_KEY_SIZES`] or OpenSSL cannot produce the key (for example when
    /// its random generator is not seeded).
    pub fn generate(size_bits: u32) -> Result<Self> {
        if !SUPPORTED_RSA_KEY_SIZES.contains(&size_bits) {
            return Err(PkiError::Generation(format!(
                "unsupported RSA key size {} (expected one of {:?})",
                size_bits, SUPPORTED_RSA_KEY_SIZES
            )));
        }

        let rsa = Rsa::generate(size_bits)
            .map_err(|e| PkiError::Generation(format!("Failed to generate RSA keypair: {}", e)))?;
        let private_key = PKey::from_rsa(rsa)
            .map_err(|e| PkiError::Generation(format!("Failed to create private key: {}", e)))?;

        Ok(Self {
            private_key,
            size_bits,
        })
    }

    /// Load a persisted RSA private key (PKCS#1 or PKCS#8 PEM).
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let private_key = PKey::private_key_from_pem(pem).map_err(|e| {
            PkiError::InvalidMaterial(format!("Failed to parse private key PEM: {}", e))
        })?;
        if private_key.rsa().is_err() {
            return Err(PkiError::InvalidMaterial(
                "stored private key is not an RSA key".to_string(),
            ));
        }
        let size_bits = private_key.bits();
        Ok(Self {
            private_key,
            size_bits,
        })
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::Rsa
    }

    pub fn size_bits(&self) -> u32 {
        self.size_bits
    }

    pub(crate) fn private_key(&self) -> &PKeyRef<Private> {
        &self.private_key
    }

    /// SubjectPublicKeyInfo DER of the public half.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        self.private_key
            .public_key_to_der()
            .map_err(|e| PkiError::Generation(format!("Failed to encode public key: {}", e)))
    }

    pub fn public_key_pem(&self) -> Result<String> {
        let pem = self
            .private_key
            .public_key_to_pem()
            .map_err(|e| PkiError::Generation(format!("Failed to encode public key: {}", e)))?;
        pem_to_string(pem)
    }

    /// Export the private key as traditional (PKCS#1) PEM.
    pub fn private_key_pem(&self) -> Result<SecretString> {
        let rsa = self
            .private_key
            .rsa()
            .map_err(|e| PkiError::Generation(format!("Failed to access RSA key: {}", e)))?;
        let pem = rsa
            .private_key_to_pem()
            .map_err(|e| PkiError::Generation(format!("Failed to encode private key: {}", e)))?;
        Ok(SecretString::from(pem_to_string(pem)?))
    }

    /// True when `other` carries the same public key as this pair.
    pub fn public_eq<T>(&self, other: &PKeyRef<T>) -> bool
    where
        T: openssl::pkey::HasPublic,
    {
        self.private_key.public_eq(other)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm())
            .field("size_bits", &self.size_bits)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

pub(crate) fn pem_to_string(pem: Vec<u8>) -> Result<String> {
    String::from_utf8(pem)
        .map_err(|e| PkiError::InvalidMaterial(format!("PEM output is not UTF-8: {}", e)))
}
