//! Error types for credential and trust store operations
//!
//! This module defines a tiered error hierarchy:
//! - [`CredentialError`]: Top-level error returned by every manager operation
//! - [`StoreError`]: Reading, decoding and writing the encrypted store files
//! - [`CryptoError`]: Key derivation, encryption, decryption
//!
//! Lower tiers convert into [`CredentialError`] via `From` implementations,
//! so `?` works across layer boundaries.

use std::path::PathBuf;

use thiserror::Error;

use super::StoreKind;

/// Top-level error for credential and trust store operations.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// A store file exists but could not be opened with the master password.
    ///
    /// Deliberately not distinguishable into "wrong password" vs "corrupt
    /// file": an authenticated-encryption failure looks identical either way.
    #[error("{kind} store at '{path}' could not be opened: {source}")]
    StoreUnreadable {
        /// Which store failed to open
        kind: StoreKind,
        /// Path of the store file
        path: PathBuf,
        /// Underlying store error
        #[source]
        source: StoreError,
    },

    /// No provider in the chain supplied a master password at startup.
    #[error("no provider in the chain supplied a master password")]
    NoMasterPassword,

    /// A store entry exists but its payload does not decode.
    #[error("entry '{alias}' is corrupt: {reason}")]
    CorruptEntry {
        /// Alias of the corrupt entry
        alias: String,
        /// What failed to decode
        reason: String,
    },

    /// An operation addressed an alias that is not present.
    #[error("alias '{alias}' not found in the {kind} store")]
    AliasNotFound {
        /// Store that was searched
        kind: StoreKind,
        /// The missing alias
        alias: String,
    },

    /// A key-pair operation addressed an entry of a different kind.
    #[error("entry '{alias}' is not a key-pair entry")]
    NotAKeyEntry {
        /// Alias of the offending entry
        alias: String,
    },

    /// Writing the store snapshot to disk failed.
    ///
    /// The in-memory store is left at its pre-operation state.
    #[error("failed to persist the {kind} store: {source}")]
    Persist {
        /// Store that failed to persist
        kind: StoreKind,
        /// Underlying store error
        #[source]
        source: StoreError,
    },

    /// Cryptographic failure outside the store-open path.
    #[error("cryptographic failure: {source}")]
    Crypto {
        /// Underlying crypto error
        #[source]
        source: CryptoError,
    },

    /// A certificate could not be parsed or is missing required fields.
    #[error("invalid certificate: {reason}")]
    InvalidCertificate {
        /// Parse or content problem
        reason: String,
    },

    /// A username/password record violates the codec rules.
    #[error("invalid secret record: {reason}")]
    InvalidSecretFormat {
        /// Which rule was violated
        reason: String,
    },

    /// A stored alias or caller-supplied string is not a usable service URI.
    #[error("invalid service URI '{uri}': {reason}")]
    InvalidServiceUri {
        /// The offending URI text
        uri: String,
        /// Why it was rejected
        reason: String,
    },

    /// Building TLS material from the stores failed.
    #[error("TLS configuration failed: {source}")]
    Tls {
        /// Underlying rustls error
        #[source]
        source: rustls::Error,
    },

    /// A PKCS#12 file (export, import, or default trust bundle) was rejected.
    #[error("PKCS#12 error: {source}")]
    Pkcs12 {
        /// Underlying keystore error
        #[source]
        source: p12_keystore::error::Error,
    },

    /// Filesystem error outside the store read/write paths.
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors from reading, decoding, and writing the encrypted store files.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading the store file failed
    #[error("read failed: {source}")]
    Read {
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Writing the store file failed
    #[error("write failed: {source}")]
    Write {
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The JSON envelope did not parse
    #[error("envelope malformed: {source}")]
    Envelope {
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The sealed payload failed to open (wrong password or tampering)
    #[error("sealed payload rejected: {source}")]
    Sealed {
        /// Underlying crypto error
        #[source]
        source: CryptoError,
    },
}

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Decryption failed - wrong key or corrupted ciphertext
    #[error("decryption failed - wrong key or corrupted data")]
    DecryptionFailed,

    /// Encryption failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Key derivation failed
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// A field in the sealed envelope has the wrong length or encoding
    #[error("invalid envelope field '{field}'")]
    InvalidField {
        /// Name of the offending envelope field
        field: &'static str,
    },

    /// Unsupported envelope version
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u32),
}

/// Result type alias for credential operations.
pub type Result<T> = std::result::Result<T, CredentialError>;

impl From<CryptoError> for CredentialError {
    fn from(source: CryptoError) -> Self {
        Self::Crypto { source }
    }
}

impl From<rustls::Error> for CredentialError {
    fn from(source: rustls::Error) -> Self {
        Self::Tls { source }
    }
}

impl From<p12_keystore::error::Error> for CredentialError {
    fn from(source: p12_keystore::error::Error) -> Self {
        Self::Pkcs12 { source }
    }
}
