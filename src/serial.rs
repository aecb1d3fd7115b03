//! Random certificate serial numbers with per-CA uniqueness tracking.
//!
//! Serials fill the full 20-octet field allowed by RFC 5280 with the top bit cleared,
//! which leaves 159 random bits and keeps the DER INTEGER positive.

use crate::error::{PkiError, Result};
use openssl::bn::{BigNum, BigNumRef};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Serial field width: 20 octets, the RFC 5280 maximum.
pub const SERIAL_BYTES: usize = 20;
const MAX_SERIAL_ATTEMPTS: usize = 16;

/// Serials issued or observed by one CA instance.
#[derive(Debug, Default)]
pub(crate) struct SerialRegistry {
    issued: Mutex<HashSet<Vec<u8>>>,
}

impl SerialRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Draw a fresh serial from the OpenSSL CSPRNG, distinct from every serial seen so far.
    ///
    /// The top bit is cleared so the DER INTEGER stays positive within 20 octets.
    pub(crate) fn next(&self) -> Result<BigNum> {
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        for _ in 0..MAX_SERIAL_ATTEMPTS {
            let mut bytes = [0u8; SERIAL_BYTES];
            openssl::rand::rand_bytes(&mut bytes).map_err(|e| {
                PkiError::Generation(format!("Failed to draw random serial: {}", e))
            })?;
            bytes[0] &= 0x7f;

            let serial = BigNum::from_slice(&bytes)
                .map_err(|e| PkiError::Generation(format!("Failed to build serial: {}", e)))?;
            if serial.num_bits() == 0 {
                continue;
            }
            if issued.insert(serial.to_vec()) {
                return Ok(serial);
            }
            tracing::warn!("random serial collided with an issued serial, redrawing");
        }
        Err(PkiError::Generation(
            "could not draw a unique certificate serial".to_string(),
        ))
    }

    /// Record a serial issued elsewhere (e.g. loaded from the store).
    /// Returns false if it was already known.
    pub(crate) fn register(&self, serial: &BigNumRef) -> bool {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(serial.to_vec())
    }

    pub(crate) fn len(&self) -> usize {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serials_are_positive_and_bounded() {
        let registry = SerialRegistry::new();
        for _ in 0..64 {
            let serial = registry.next().unwrap();
            assert!(!serial.is_negative());
            assert!(serial.num_bits() > 0);
            assert!(serial.num_bits() <= (SERIAL_BYTES * 8 - 1) as i32);
        }
    }

    #[test]
    fn test_thousands_of_serials_are_distinct() {
        let registry = SerialRegistry::new();
        let mut seen = HashSet::new();
        for _ in 0..5000 {
            assert!(seen.insert(registry.next().unwrap().to_vec()));
        }
        assert_eq!(registry.len(), 5000);
    }

    #[test]
    fn test_register_detects_known_serial() {
        let registry = SerialRegistry::new();
        let serial = registry.next().unwrap();
        assert!(!registry.register(&serial));

        let foreign = BigNum::from_u32(1234).unwrap();
        assert!(registry.register(&foreign));
        assert!(!registry.register(&foreign));
        assert_eq!(registry.len(), 2);
    }
}
