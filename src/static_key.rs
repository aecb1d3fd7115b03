//! OpenVPN static key (`ta.key`) generation and parsing.
//!
//! The key is 256 random bytes armored the way `openvpn --genkey` writes it: a comment
//! header, then BEGIN/END marker lines around 16 lines of 32 lowercase hex characters.

use crate::error::{PkiError, Result};
use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

/// Size of the static key in bytes (2048 bits)
pub const STATIC_KEY_SIZE: usize = 256;
/// Bytes encoded per armor line (32 hex characters)
pub const BYTES_PER_LINE: usize = 16;

const HEADER_COMMENT: &str = "#\n# 2048 bit OpenVPN static key\n#\n";
const BEGIN_MARKER: &str = "-----BEGIN OpenVPN Static key V1-----";
const END_MARKER: &str = "-----END OpenVPN Static key V1-----";

pub struct StaticKey {
    bytes: SecretBox<[u8; STATIC_KEY_SIZE]>,
}

impl StaticKey {
    /// Draw a new key from the OpenSSL CSPRNG.
    pub fn generate() -> Result<Self> {
        let mut bytes = Box::new([0u8; STATIC_KEY_SIZE]);
        openssl::rand::rand_bytes(&mut bytes[..]).map_err(|e| {
            PkiError::Generation(format!("Failed to generate static key bytes: {}", e))
        })?;
        Ok(Self {
            bytes: SecretBox::new(bytes),
        })
    }

    pub fn from_bytes(bytes: [u8; STATIC_KEY_SIZE]) -> Self {
        Self {
            bytes: SecretBox::new(Box::new(bytes)),
        }
    }

    pub fn expose_bytes(&self) -> &[u8; STATIC_KEY_SIZE] {
        self.bytes.expose_secret()
    }

    /// Render the OpenVPN armor.
    pub fn to_armored(&self) -> String {
        let hex_key = hex::encode(self.bytes.expose_secret());
        let mut armored = String::with_capacity(
            HEADER_COMMENT.len() + BEGIN_MARKER.len() + END_MARKER.len() + hex_key.len() * 2,
        );
        armored.push_str(HEADER_COMMENT);
        armored.push_str(BEGIN_MARKER);
        armored.push('\n');
        // hex output is ASCII, so byte offsets are char boundaries
        for start in (0..hex_key.len()).step_by(BYTES_PER_LINE * 2) {
            armored.push_str(&hex_key[start..start + BYTES_PER_LINE * 2]);
            armored.push('\n');
        }
        armored.push_str(END_MARKER);
        armored.push('\n');
        armored
    }

    /// Parse an armored static key. Lines outside the markers are ignored.
    ///
    /// # Errors
    /// [`PkiError::InvalidMaterial`] if the markers are missing, the body is not hex, or
    /// it does not decode to exactly 256 bytes.
    pub fn parse(armored: &str) -> Result<Self> {
        let mut lines = armored.lines().map(str::trim);
        if !lines.by_ref().any(|line| line == BEGIN_MARKER) {
            return Err(PkiError::InvalidMaterial(
                "static key BEGIN marker not found".to_string(),
            ));
        }

        let mut hex_body = String::with_capacity(STATIC_KEY_SIZE * 2);
        let mut terminated = false;
        for line in lines {
            if line == END_MARKER {
                terminated = true;
                break;
            }
            hex_body.push_str(line);
        }
        if !terminated {
            return Err(PkiError::InvalidMaterial(
                "static key END marker not found".to_string(),
            ));
        }

        let decoded = hex::decode(&hex_body)
            .map_err(|e| PkiError::InvalidMaterial(format!("static key is not hex: {}", e)))?;
        let bytes: [u8; STATIC_KEY_SIZE] = decoded.try_into().map_err(|v: Vec<u8>| {
            PkiError::InvalidMaterial(format!(
                "static key must be {} bytes, found {}",
                STATIC_KEY_SIZE,
                v.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }
}

impl fmt::Debug for StaticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKey")
            .field("bytes", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_armor_layout() {
        let key = StaticKey::generate().unwrap();
        let armored = key.to_armored();
        let lines: Vec<&str> = armored.lines().collect();

        assert_eq!(lines[0], "#");
        assert_eq!(lines[1], "# 2048 bit OpenVPN static key");
        assert_eq!(lines[2], "#");
        assert_eq!(lines[3], BEGIN_MARKER);
        assert_eq!(lines.len(), 4 + STATIC_KEY_SIZE / BYTES_PER_LINE + 1);
        for line in &lines[4..4 + STATIC_KEY_SIZE / BYTES_PER_LINE] {
            assert_eq!(line.len(), 32);
            assert!(line
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }
        assert_eq!(*lines.last().unwrap(), END_MARKER);
        assert!(armored.ends_with('\n'));
    }

    #[test]
    fn test_parse_recovers_generated_bytes() {
        let key = StaticKey::generate().unwrap();
        let parsed = StaticKey::parse(&key.to_armored()).unwrap();
        assert_eq!(parsed.expose_bytes(), key.expose_bytes());
    }

    #[test]
    fn test_parse_known_bytes() {
        let mut bytes = [0u8; STATIC_KEY_SIZE];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let armored = StaticKey::from_bytes(bytes).to_armored();
        assert!(armored.contains("\n000102030405060708090a0b0c0d0e0f\n"));
        assert!(armored.contains("\nf0f1f2f3f4f5f6f7f8f9fafbfcfdfeff\n"));
        assert_eq!(StaticKey::parse(&armored).unwrap().expose_bytes(), &bytes);
    }

    #[test]
    fn test_parse_tolerates_crlf() {
        let key = StaticKey::generate().unwrap();
        let crlf = key.to_armored().replace('\n', "\r\n");
        assert_eq!(
            StaticKey::parse(&crlf).unwrap().expose_bytes(),
            key.expose_bytes()
        );
    }

    #[test]
    fn test_parse_rejects_truncated_key() {
        let armored = format!("{}\n{}\n{}\n", BEGIN_MARKER, "ab".repeat(16), END_MARKER);
        let err = StaticKey::parse(&armored).unwrap_err();
        assert!(matches!(err, PkiError::InvalidMaterial(msg) if msg.contains("256")));
    }

    #[test]
    fn test_parse_rejects_missing_markers() {
        assert!(StaticKey::parse("deadbeef").is_err());
        let unterminated = format!("{}\n{}\n", BEGIN_MARKER, "00".repeat(16));
        assert!(StaticKey::parse(&unterminated).is_err());
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        let armored = format!("{}\n{}\n{}\n", BEGIN_MARKER, "zz".repeat(256), END_MARKER);
        assert!(matches!(
            StaticKey::parse(&armored),
            Err(PkiError::InvalidMaterial(_))
        ));
    }

    #[test]
    fn test_debug_no_leak() {
        let key = StaticKey::from_bytes([0xab; STATIC_KEY_SIZE]);
        let debug_str = format!("{:?}", key);
        assert!(debug_str.contains("<redacted>"));
        assert!(!debug_str.contains("171"));
        assert!(!debug_str.contains("ab"));
    }
}
