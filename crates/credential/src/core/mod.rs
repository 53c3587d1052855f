//! Core types shared across the credential crate

pub mod alias;
pub mod error;
pub mod secret;

pub use error::{CredentialError, CryptoError, Result, StoreError};
pub use secret::UsernamePassword;

/// Which of the two encrypted stores an operation or event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// The credential store: passwords and key-pair entries.
    Credentials,
    /// The trust store: trusted certificate entries.
    Trust,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credentials => f.write_str("credential"),
            Self::Trust => f.write_str("trust"),
        }
    }
}
