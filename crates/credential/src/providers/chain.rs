//! Priority-ordered provider chain

use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use secrecy::SecretString;
use tracing::debug;
use url::Url;

use super::{CredentialProvider, ProvidedCredential, TrustConfirmation};

/// The registered providers, sorted by descending priority at construction.
///
/// Each accessor walks the chain in order and returns the first provider's
/// non-`None` answer.
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn CredentialProvider>>,
}

impl ProviderChain {
    /// Build a chain from an unordered provider list.
    ///
    /// The sort is stable, so providers with equal priority keep their
    /// registration order.
    #[must_use]
    pub fn new(mut providers: Vec<Arc<dyn CredentialProvider>>) -> Self {
        providers.sort_by_key(|p| std::cmp::Reverse(p.priority()));
        Self { providers }
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the chain has no providers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Providers in consultation order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn CredentialProvider>> {
        self.providers.iter()
    }

    /// First master password offered by the chain.
    #[must_use]
    pub fn master_password(&self, first_run: bool) -> Option<SecretString> {
        self.providers.iter().find_map(|provider| {
            let answer = provider.master_password(first_run);
            if answer.is_some() {
                debug!(provider = provider.name(), "provider supplied master password");
            }
            answer
        })
    }

    /// First default-trust-bundle password offered by the chain.
    #[must_use]
    pub fn default_trust_password(&self) -> Option<SecretString> {
        self.providers.iter().find_map(|provider| {
            let answer = provider.default_trust_password();
            if answer.is_some() {
                debug!(provider = provider.name(), "provider supplied trust bundle password");
            }
            answer
        })
    }

    /// First username/password offered by the chain for a service URI.
    #[must_use]
    pub fn username_password(
        &self,
        service: &Url,
        prompt: Option<&str>,
    ) -> Option<ProvidedCredential> {
        self.providers.iter().find_map(|provider| {
            let answer = provider.username_password(service, prompt);
            if answer.is_some() {
                debug!(provider = provider.name(), service = %service, "provider supplied credential");
            }
            answer
        })
    }

    /// First trust decision offered by the chain for a certificate chain.
    #[must_use]
    pub fn confirm_trust(&self, chain: &[CertificateDer<'_>]) -> Option<TrustConfirmation> {
        self.providers.iter().find_map(|provider| {
            let answer = provider.confirm_trust(chain);
            if let Some(decision) = answer {
                debug!(
                    provider = provider.name(),
                    trusted = decision.trusted,
                    save = decision.save,
                    "provider decided trust"
                );
            }
            answer
        })
    }
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| (p.name(), p.priority())))
            .finish()
    }
}
