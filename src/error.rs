//! Error types for PKI operations.
//!
//! Every fallible operation in the library returns [`Result<T>`], which wraps
//! [`PkiError`]. Nothing is retried internally: generation and signing are
//! deterministic given their inputs, so callers decide how to surface a failure.

use thiserror::Error;

/// Error type for all PKI operations.
///
/// # Example
///
/// ```no_run
/// use vpn_pki::{PkiError, PkiManager, PkiConfig};
///
/// let manager = PkiManager::from_config(PkiConfig::default())?;
/// match manager.get_ca_certificate() {
///     Ok(pem) => println!("{pem}"),
///     Err(PkiError::NotFound(what)) => eprintln!("missing: {what}"),
///     Err(e) => eprintln!("PKI failure: {e}"),
/// }
/// # Ok::<(), vpn_pki::PkiError>(())
/// ```
#[derive(Debug, Error)]
pub enum PkiError {
    /// Key or parameter generation failed (invalid size, RNG failure)
    #[error("generation failed: {0}")]
    Generation(String),

    /// A store artifact is missing, or no CA has been bootstrapped
    #[error("not found: {0}")]
    NotFound(String),

    /// File system I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Certificate construction or signing failed (e.g. invalid DN field)
    #[error("signing failed: {0}")]
    Signing(String),

    /// A stored artifact could not be parsed or is inconsistent with its peers
    #[error("invalid stored material: {0}")]
    InvalidMaterial(String),

    /// Configuration could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for PKI operations.
pub type Result<T> = std::result::Result<T, PkiError>;
