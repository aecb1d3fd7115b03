//! Diffie-Hellman domain parameters (`dh.pem`).
//!
//! Generating a safe prime is the slowest operation in the crate (seconds for 2048
//! bits, sometimes much longer), so it only runs during the explicit setup phase.

use crate::error::{PkiError, Result};
use crate::generate_keypair::pem_to_string;
use openssl::bn::BigNumRef;
use openssl::dh::Dh;
use openssl::pkey::Params;
use std::fmt;
use std::time::Instant;

/// Generators OpenSSL accepts for parameter generation.
pub const SUPPORTED_GENERATORS: [u32; 2] = [2, 5];
/// Smallest modulus OpenSSL will generate.
pub const MIN_DH_BITS: u32 = 512;

pub struct DhParameters {
    dh: Dh<Params>,
}

impl DhParameters {
    /// Generate fresh parameters. Blocks the calling thread until a safe prime is found.
    pub fn generate(generator: u32, size_bits: u32) -> Result<Self> {
        if !SUPPORTED_GENERATORS.contains(&generator) {
            return Err(PkiError::Generation(format!(
                "unsupported DH generator {} (expected one of {:?})",
                generator, SUPPORTED_GENERATORS
            )));
        }
        if size_bits < MIN_DH_BITS {
            return Err(PkiError::Generation(format!(
                "DH modulus of {} bits is below the {} bit minimum",
                size_bits, MIN_DH_BITS
            )));
        }

        tracing::info!(generator, size_bits, "generating DH parameters");
        let started = Instant::now();
        let dh = Dh::generate_params(size_bits, generator)
            .map_err(|e| PkiError::Generation(format!("Failed to generate DH parameters: {}", e)))?;
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "DH parameters generated"
        );
        Ok(Self { dh })
    }

    /// Parse PKCS#3 PEM (`-----BEGIN DH PARAMETERS-----`).
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let dh = Dh::params_from_pem(pem).map_err(|e| {
            PkiError::InvalidMaterial(format!("Failed to parse DH parameters: {}", e))
        })?;
        Ok(Self { dh })
    }

    pub fn to_pem(&self) -> Result<String> {
        let pem = self
            .dh
            .params_to_pem()
            .map_err(|e| PkiError::Generation(format!("Failed to encode DH parameters: {}", e)))?;
        pem_to_string(pem)
    }

    pub fn prime(&self) -> &BigNumRef {
        self.dh.prime_p()
    }

    pub fn generator(&self) -> &BigNumRef {
        self.dh.generator()
    }

    pub fn size_bits(&self) -> u32 {
        self.prime().num_bits() as u32
    }
}

impl fmt::Debug for DhParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhParameters")
            .field("generator", &self.generator().to_dec_str().ok())
            .field("size_bits", &self.size_bits())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_roundtrip() {
        let params = DhParameters::generate(2, 512).unwrap();
        assert_eq!(params.size_bits(), 512);
        assert_eq!(params.generator().to_vec(), vec![2]);

        let pem = params.to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN DH PARAMETERS-----"));

        let parsed = DhParameters::from_pem(pem.as_bytes()).unwrap();
        assert_eq!(parsed.prime().to_vec(), params.prime().to_vec());
        assert_eq!(parsed.generator().to_vec(), params.generator().to_vec());
        assert_eq!(parsed.to_pem().unwrap(), pem);
    }

    #[test]
    fn test_rejects_bad_generator() {
        let err = DhParameters::generate(3, 512).unwrap_err();
        assert!(matches!(err, PkiError::Generation(_)));
    }

    #[test]
    fn test_rejects_small_modulus() {
        let err = DhParameters::generate(2, 256).unwrap_err();
        assert!(matches!(err, PkiError::Generation(_)));
    }

    #[test]
    fn test_from_pem_rejects_garbage() {
        let err = DhParameters::from_pem(b"-----BEGIN DH PARAMETERS-----\n!!\n").unwrap_err();
        assert!(matches!(err, PkiError::InvalidMaterial(_)));
    }
}
