//! Credential provider SPI
//!
//! Providers are the only channel through which the manager reaches outside
//! its two stores: they supply the master password at startup, passwords for
//! the default trust bundle, username/password pairs the store does not
//! hold, and trust decisions for unverified certificate chains. A provider
//! implements whichever subset it supports and leaves the rest at the
//! defaults, which decline.
//!
//! The manager never renders UI itself. An interactive deployment registers
//! a prompting provider; a headless one registers a static or config-backed
//! provider. A provider declining simply yields "not found" / "not trusted".

mod chain;
mod static_provider;

pub use chain::ProviderChain;
pub use static_provider::StaticProvider;

use rustls::pki_types::CertificateDer;
use secrecy::SecretString;
use url::Url;

/// A username/password answer from a provider.
#[derive(Debug)]
pub struct ProvidedCredential {
    /// Username for the service
    pub username: String,
    /// Password for the service
    pub password: SecretString,
    /// Whether the answer should be persisted into the credential store
    pub save: bool,
}

/// A trust decision from a provider for an unverified chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustConfirmation {
    /// Whether to trust the chain for this connection
    pub trusted: bool,
    /// Whether to persist the end-entity certificate into the trust store
    pub save: bool,
}

/// External source of secrets and trust decisions.
///
/// Every method has a declining default; implement only what the provider
/// supports. Providers are consulted in descending [`priority`] order and
/// the first non-`None` answer wins.
///
/// [`priority`]: CredentialProvider::priority
pub trait CredentialProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Chain position; higher runs first. Ties keep registration order.
    fn priority(&self) -> i32 {
        0
    }

    /// Master password for the stores. `first_run` distinguishes "set a
    /// password" from "enter the existing password".
    fn master_password(&self, _first_run: bool) -> Option<SecretString> {
        None
    }

    /// Password for the platform default trust bundle, consulted when the
    /// well-known passwords fail during first-run trust seeding.
    fn default_trust_password(&self) -> Option<SecretString> {
        None
    }

    /// Username/password for a service URI. `prompt` is a display hint for
    /// interactive providers.
    fn username_password(
        &self,
        _service: &Url,
        _prompt: Option<&str>,
    ) -> Option<ProvidedCredential> {
        None
    }

    /// Trust decision for a certificate chain (end-entity first) that failed
    /// default verification.
    fn confirm_trust(&self, _chain: &[CertificateDer<'_>]) -> Option<TrustConfirmation> {
        None
    }
}
