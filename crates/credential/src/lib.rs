//! Weft Credential
//!
//! Encrypted credential and trust storage for network clients.
//!
//! # Features
//!
//! - **Two encrypted stores** - Passwords and key pairs in the credential
//!   store, accepted certificates in the trust store, both sealed with a
//!   master password (Argon2id + AES-256-GCM)
//! - **Service-URI lookup** - Hierarchical resolution from the exact URI
//!   down to the host root, with realm fragments and a lookup cache
//! - **Pluggable providers** - Master passwords, login prompts, and trust
//!   decisions supplied by a priority-ordered provider chain
//! - **TLS integration** - A rustls client configuration built from the
//!   stores, rebuilt automatically after identity or trust mutations
//! - **PKCS#12 import/export** - Key-pair exchange with external keystores
//!   and first-run trust seeding from a bundled truststore
//! - **Change events** - Synchronous notifications after every persisted
//!   mutation

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types: aliases, errors, secret payloads
pub mod core;
/// Store change notifications
pub mod events;
/// The credential manager and its configuration
pub mod manager;
/// Provider chain for interactive decisions
pub mod providers;
/// Encrypted store containers and persistence
pub mod store;
/// TLS material derived from the stores
pub mod tls;
/// Service-URI candidate resolution
pub mod uri;

/// Commonly used types and traits
pub mod prelude {
    pub use crate::core::{
        CredentialError, Result, StoreKind, UsernamePassword,
        alias::CertificateLabels,
    };
    pub use crate::events::{ChangeListener, StoreChanged, SubscriptionId};
    pub use crate::manager::{CredentialConfig, CredentialManager};
    pub use crate::providers::{
        CredentialProvider, ProvidedCredential, ProviderChain, StaticProvider, TrustConfirmation,
    };
    pub use crate::tls::TlsContext;
    pub use secrecy::{ExposeSecret, SecretString};
    pub use url::Url;
}

// Re-export commonly used external types
pub use secrecy::SecretString;
pub use url::Url;
