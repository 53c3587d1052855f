//! The credential manager service object
//!
//! Owns the two encrypted stores, the master password, the lookup cache,
//! the change-event bus, and the published TLS context. Constructed
//! explicitly by the application's composition root via
//! [`CredentialManager::open`]; there is no global instance.
//!
//! Locking: the credential store and trust store each have their own lock
//! and no operation holds both at once. The lookup cache lock is only ever
//! taken while a store lock is held, never the other way round. Provider
//! callbacks (which may block on a human) run with no store lock held.
//! Mutations persist the whole container snapshot before the in-memory
//! state is swapped, so a failed persist leaves memory at the pre-operation
//! state.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use rustls::pki_types::CertificateDer;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use tracing::{debug, error, info};
use url::Url;

use super::cache::LookupCache;
use super::config::CredentialConfig;
use crate::core::error::{CredentialError, Result};
use crate::core::{StoreKind, UsernamePassword, alias, secret};
use crate::events::{ChangeListener, EventBus, StoreChanged, SubscriptionId};
use crate::providers::{CredentialProvider, ProviderChain};
use crate::store::{KeyedContainer, StoreEntry, StoreFile, bootstrap, pkcs12};
use crate::tls::{self, StoreIdentity, TlsContext};
use crate::uri;

struct StoreState {
    file: StoreFile,
    container: KeyedContainer,
}

pub(crate) struct ManagerInner {
    config: CredentialConfig,
    providers: ProviderChain,
    master: Mutex<SecretString>,
    credential_store: Mutex<StoreState>,
    trust_store: Mutex<StoreState>,
    cache: Mutex<LookupCache>,
    events: EventBus,
    tls: ArcSwapOption<TlsContext>,
}

/// Credential and trust store service.
///
/// Cheap to clone; clones share the same stores.
#[derive(Clone)]
pub struct CredentialManager {
    inner: Arc<ManagerInner>,
}

impl CredentialManager {
    /// Open (or create) both stores and build the initial TLS context.
    ///
    /// The master password is requested from the provider chain exactly
    /// once; `first_run` is signalled to providers when the credential
    /// store file does not exist yet. A freshly created trust store is
    /// seeded from the configured default trust bundle; failures there are
    /// non-fatal and leave an empty trust store.
    pub fn open(
        config: CredentialConfig,
        providers: Vec<Arc<dyn CredentialProvider>>,
    ) -> Result<Self> {
        let providers = ProviderChain::new(providers);

        let credential_file =
            StoreFile::new(StoreKind::Credentials, config.credential_store_path());
        let trust_file = StoreFile::new(StoreKind::Trust, config.trust_store_path());

        let first_run = !credential_file.exists();
        let master = providers
            .master_password(first_run)
            .ok_or(CredentialError::NoMasterPassword)?;

        let (credential_container, _) = credential_file.open_or_create(&master)?;
        let (mut trust_container, trust_created) = trust_file.open_or_create(&master)?;

        if trust_created {
            if let Some(bundle) = config.default_trust_bundle.clone() {
                let report = bootstrap::seed_from_default_bundle(
                    &mut trust_container,
                    &bundle,
                    &config.default_trust_passwords,
                    &providers,
                );
                if report.seeded > 0 {
                    trust_file.persist(&trust_container, &master)?;
                }
            }
        }

        info!(
            directory = %config.directory().display(),
            credentials = credential_container.len(),
            trusted = trust_container.len(),
            first_run,
            "credential manager opened"
        );

        let inner = Arc::new(ManagerInner {
            config,
            providers,
            master: Mutex::new(master),
            credential_store: Mutex::new(StoreState {
                file: credential_file,
                container: credential_container,
            }),
            trust_store: Mutex::new(StoreState {
                file: trust_file,
                container: trust_container,
            }),
            cache: Mutex::new(LookupCache::new()),
            events: EventBus::new(),
            tls: ArcSwapOption::empty(),
        });

        // Internal subscriber: any store change drops the lookup cache.
        let weak = Arc::downgrade(&inner);
        inner.events.subscribe(Arc::new(move |_event| {
            if let Some(inner) = weak.upgrade() {
                inner.cache.lock().invalidate();
            }
        }));

        let manager = Self { inner };
        manager.rebuild_tls()?;
        Ok(manager)
    }

    pub(crate) fn from_inner(inner: Arc<ManagerInner>) -> Self {
        Self { inner }
    }

    /// The configuration this manager was opened with.
    #[must_use]
    pub fn config(&self) -> &CredentialConfig {
        &self.inner.config
    }

    // ── username/password operations ──────────────────────────────────────

    /// Look up a username/password for a service URI.
    ///
    /// Walks the candidate URIs from most to least specific; on a store
    /// miss, asks the provider chain (passing `prompt` as a display hint)
    /// and optionally persists the answer. `Ok(None)` means nobody had an
    /// answer; that is not an error.
    pub fn get_username_password(
        &self,
        service: &Url,
        use_path_recursion: bool,
        prompt: Option<&str>,
    ) -> Result<Option<UsernamePassword>> {
        let candidates = uri::possible_lookups(service, use_path_recursion);

        {
            let store = self.inner.credential_store.lock();
            let mut cache = self.inner.cache.lock();
            let state = cache.get_or_build(&store.container);

            for candidate in &candidates {
                let Some(canonical) = state.fragment_map.get(candidate) else {
                    continue;
                };
                let entry_alias = alias::password_entry(canonical);
                match store.container.get(&entry_alias) {
                    Some(StoreEntry::Secret { payload }) => {
                        let pair = secret::decode_secret(payload).map_err(|err| {
                            CredentialError::CorruptEntry {
                                alias: entry_alias.clone(),
                                reason: err.to_string(),
                            }
                        })?;
                        debug!(service = %service, matched = %canonical, "credential found in store");
                        return Ok(Some(pair));
                    }
                    _ => continue,
                }
            }
        }

        // Store miss. Providers may block on a human, so no locks here.
        if let Some(provided) = self.inner.providers.username_password(service, prompt) {
            if provided.save {
                let save_uri = if use_path_recursion {
                    uri::normalize_service_uri(service)
                } else {
                    uri::strip_user_info(service)
                };
                self.save_username_password(&save_uri, &provided.username, &provided.password)?;
            }
            return Ok(Some(UsernamePassword::from_secret(
                provided.username,
                provided.password,
            )));
        }

        debug!(service = %service, "no credential in store or providers");
        Ok(None)
    }

    /// Save a username/password under a service URI (overwrites).
    pub fn save_username_password(
        &self,
        service: &Url,
        username: &str,
        password: &SecretString,
    ) -> Result<()> {
        let payload = secret::encode_secret(username, password)?;
        let service = uri::strip_user_info(service);
        let entry_alias = alias::password_entry(&service);

        self.mutate(StoreKind::Credentials, |container| {
            container.insert(entry_alias.clone(), StoreEntry::Secret { payload });
            Ok(true)
        })?;
        debug!(service = %service, "credential saved");
        Ok(())
    }

    /// Delete the password entry for a service URI. Deleting an absent
    /// entry is a no-op.
    pub fn delete_username_password(&self, service: &Url) -> Result<()> {
        let service = uri::strip_user_info(service);
        let entry_alias = alias::password_entry(&service);

        let removed = self.mutate(StoreKind::Credentials, |container| {
            Ok(container.remove(&entry_alias).is_some())
        })?;
        debug!(service = %service, removed, "credential delete");
        Ok(())
    }

    /// Whether any stored password entry answers for this URI (including
    /// via parent paths and realm mappings). Does not consult providers.
    #[must_use]
    pub fn has_username_password_for(&self, service: &Url) -> bool {
        let candidates = uri::possible_lookups(service, true);
        let store = self.inner.credential_store.lock();
        let mut cache = self.inner.cache.lock();
        let state = cache.get_or_build(&store.container);
        candidates
            .iter()
            .any(|candidate| state.fragment_map.contains_key(candidate))
    }

    /// Service URIs of all stored password entries, in sorted order.
    #[must_use]
    pub fn service_uris_for_username_password(&self) -> Vec<Url> {
        let store = self.inner.credential_store.lock();
        let mut cache = self.inner.cache.lock();
        cache.get_or_build(&store.container).service_uris.clone()
    }

    // ── key-pair operations ───────────────────────────────────────────────

    /// Save a private key with its certificate chain (end-entity first).
    ///
    /// Returns the derived alias. Rebuilds the TLS context.
    pub fn save_key_pair(&self, key_der: &[u8], chain_der: &[Vec<u8>]) -> Result<String> {
        let end_entity = chain_der
            .first()
            .ok_or_else(|| CredentialError::InvalidCertificate {
                reason: "key pair has an empty certificate chain".to_string(),
            })?;
        let entry_alias = alias::key_pair_entry(end_entity)?;

        self.mutate(StoreKind::Credentials, |container| {
            container.insert(
                entry_alias.clone(),
                StoreEntry::KeyPair {
                    key_der: key_der.to_vec(),
                    chain_der: chain_der.to_vec(),
                },
            );
            Ok(true)
        })?;
        self.rebuild_tls()?;
        info!(alias = %entry_alias, "key pair saved");
        Ok(entry_alias)
    }

    /// Whether the key pair for this chain (end-entity first) is stored.
    pub fn contains_key_pair(&self, chain_der: &[Vec<u8>]) -> Result<bool> {
        let end_entity = chain_der
            .first()
            .ok_or_else(|| CredentialError::InvalidCertificate {
                reason: "empty certificate chain".to_string(),
            })?;
        let entry_alias = alias::key_pair_entry(end_entity)?;
        let store = self.inner.credential_store.lock();
        Ok(matches!(
            store.container.get(&entry_alias),
            Some(StoreEntry::KeyPair { .. })
        ))
    }

    /// Delete a key-pair entry by alias. Rebuilds the TLS context.
    pub fn delete_key_pair(&self, entry_alias: &str) -> Result<()> {
        self.mutate(StoreKind::Credentials, |container| {
            match container.get(entry_alias) {
                Some(StoreEntry::KeyPair { .. }) => {
                    container.remove(entry_alias);
                    Ok(true)
                }
                Some(_) => Err(CredentialError::NotAKeyEntry {
                    alias: entry_alias.to_string(),
                }),
                None => Err(CredentialError::AliasNotFound {
                    kind: StoreKind::Credentials,
                    alias: entry_alias.to_string(),
                }),
            }
        })?;
        self.rebuild_tls()?;
        info!(alias = entry_alias, "key pair deleted");
        Ok(())
    }

    /// Export a key-pair entry to a PKCS#12 file under an export password.
    pub fn export_key_pair(
        &self,
        entry_alias: &str,
        path: &Path,
        export_password: &SecretString,
    ) -> Result<()> {
        let (key_der, chain_der) = {
            let store = self.inner.credential_store.lock();
            match store.container.get(entry_alias) {
                Some(StoreEntry::KeyPair { key_der, chain_der }) => {
                    (key_der.clone(), chain_der.clone())
                }
                Some(_) => {
                    return Err(CredentialError::NotAKeyEntry {
                        alias: entry_alias.to_string(),
                    });
                }
                None => {
                    return Err(CredentialError::AliasNotFound {
                        kind: StoreKind::Credentials,
                        alias: entry_alias.to_string(),
                    });
                }
            }
        };
        pkcs12::export_key_pair(path, export_password, &key_der, &chain_der)?;
        info!(alias = entry_alias, path = %path.display(), "key pair exported");
        Ok(())
    }

    /// Import the key pair from a PKCS#12 file into the credential store.
    ///
    /// Returns the derived alias.
    pub fn import_key_pair(&self, path: &Path, password: &SecretString) -> Result<String> {
        let imported = pkcs12::import_key_pair(path, password)?;
        self.save_key_pair(&imported.key_der, &imported.chain_der)
    }

    /// Certificate chain of a key-pair entry, end-entity first.
    pub fn get_certificate_chain(&self, entry_alias: &str) -> Result<Vec<Vec<u8>>> {
        let store = self.inner.credential_store.lock();
        match store.container.get(entry_alias) {
            Some(StoreEntry::KeyPair { chain_der, .. }) => Ok(chain_der.clone()),
            Some(_) => Err(CredentialError::NotAKeyEntry {
                alias: entry_alias.to_string(),
            }),
            None => Err(CredentialError::AliasNotFound {
                kind: StoreKind::Credentials,
                alias: entry_alias.to_string(),
            }),
        }
    }

    // ── trusted-certificate operations ────────────────────────────────────

    /// Save a certificate (DER) into the trust store.
    ///
    /// Returns the derived alias. Saving an identical, already-present
    /// certificate is a no-op (no event, no TLS rebuild). Otherwise the
    /// TLS context is rebuilt.
    pub fn save_trusted_certificate(&self, cert_der: &[u8]) -> Result<String> {
        let entry_alias = alias::trusted_certificate_entry(cert_der)?;
        let entry = StoreEntry::TrustedCert {
            cert_der: cert_der.to_vec(),
        };

        let changed = self.mutate(StoreKind::Trust, |container| {
            if container.get(&entry_alias) == Some(&entry) {
                return Ok(false);
            }
            container.insert(entry_alias.clone(), entry);
            Ok(true)
        })?;
        if changed {
            self.rebuild_tls()?;
            info!(alias = %entry_alias, "certificate trusted");
        }
        Ok(entry_alias)
    }

    /// Delete a trusted-certificate entry by alias. Rebuilds the TLS
    /// context.
    pub fn delete_trusted_certificate(&self, entry_alias: &str) -> Result<()> {
        self.mutate(StoreKind::Trust, |container| {
            if container.remove(entry_alias).is_none() {
                return Err(CredentialError::AliasNotFound {
                    kind: StoreKind::Trust,
                    alias: entry_alias.to_string(),
                });
            }
            Ok(true)
        })?;
        self.rebuild_tls()?;
        info!(alias = entry_alias, "certificate untrusted");
        Ok(())
    }

    /// Decide whether to trust a certificate chain (end-entity first).
    ///
    /// A chain whose end-entity certificate is already in the trust store
    /// is trusted without consulting providers. Otherwise the provider
    /// chain decides; an affirmative decision with `save` set persists the
    /// end-entity certificate, so the next call short-circuits.
    pub fn should_trust(&self, chain: &[CertificateDer<'_>]) -> Result<bool> {
        let end_entity = chain
            .first()
            .ok_or_else(|| CredentialError::InvalidCertificate {
                reason: "empty certificate chain".to_string(),
            })?;
        let entry_alias = alias::trusted_certificate_entry(end_entity.as_ref())?;

        {
            let trust = self.inner.trust_store.lock();
            if trust.container.contains(&entry_alias) {
                debug!(alias = %entry_alias, "chain already trusted");
                return Ok(true);
            }
        }

        match self.inner.providers.confirm_trust(chain) {
            Some(decision) => {
                if decision.trusted && decision.save {
                    self.save_trusted_certificate(end_entity.as_ref())?;
                }
                Ok(decision.trusted)
            }
            None => Ok(false),
        }
    }

    // ── store introspection ───────────────────────────────────────────────

    /// The first certificate associated with an alias, if any: the
    /// end-entity certificate for key pairs, the certificate itself for
    /// trusted entries.
    #[must_use]
    pub fn get_certificate(&self, kind: StoreKind, entry_alias: &str) -> Option<Vec<u8>> {
        let store = self.store(kind).lock();
        match store.container.get(entry_alias)? {
            StoreEntry::KeyPair { chain_der, .. } => chain_der.first().cloned(),
            StoreEntry::TrustedCert { cert_der } => Some(cert_der.clone()),
            StoreEntry::Secret { .. } => None,
        }
    }

    /// Whether an alias exists in the given store.
    #[must_use]
    pub fn contains_alias(&self, kind: StoreKind, entry_alias: &str) -> bool {
        self.store(kind).lock().container.contains(entry_alias)
    }

    /// All aliases of a store, in sorted order.
    #[must_use]
    pub fn aliases(&self, kind: StoreKind) -> Vec<String> {
        self.store(kind)
            .lock()
            .container
            .aliases()
            .map(String::from)
            .collect()
    }

    /// Whether the alias names a key-pair entry in the credential store.
    #[must_use]
    pub fn is_key_entry(&self, entry_alias: &str) -> bool {
        matches!(
            self.inner
                .credential_store
                .lock()
                .container
                .get(entry_alias),
            Some(StoreEntry::KeyPair { .. })
        )
    }

    // ── master password ───────────────────────────────────────────────────

    /// Constant-time comparison of a candidate against the master password.
    #[must_use]
    pub fn confirm_master_password(&self, candidate: &str) -> bool {
        let master = self.inner.master.lock();
        master
            .expose_secret()
            .as_bytes()
            .ct_eq(candidate.as_bytes())
            .into()
    }

    /// Change the master password and re-seal both store files.
    ///
    /// If the second file fails to re-seal, the first is restored with the
    /// old password (best effort) so both files stay openable with a single
    /// password.
    pub fn change_master_password(&self, new: SecretString) -> Result<()> {
        let mut master = self.inner.master.lock();

        {
            let credentials = self.inner.credential_store.lock();
            credentials.file.persist(&credentials.container, &new)?;
        }
        let trust_result = {
            let trust = self.inner.trust_store.lock();
            trust.file.persist(&trust.container, &new)
        };
        if let Err(err) = trust_result {
            // Trust lock is released; re-seal the credential store with the
            // old password so both files stay openable with one password.
            let credentials = self.inner.credential_store.lock();
            if let Err(rollback) = credentials.file.persist(&credentials.container, &master) {
                error!(
                    error = %rollback,
                    "failed to restore credential store after aborted password change"
                );
            }
            return Err(err);
        }

        *master = new;
        info!("master password changed");
        Ok(())
    }

    // ── events and TLS ────────────────────────────────────────────────────

    /// Register a store-change listener. Listeners run synchronously on the
    /// mutating thread, after persist and before the operation returns.
    pub fn subscribe(&self, listener: ChangeListener) -> SubscriptionId {
        self.inner.events.subscribe(listener)
    }

    /// Remove a listener; returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    /// The current TLS context, building it if none is published yet.
    pub fn tls_context(&self) -> Result<Arc<TlsContext>> {
        if let Some(context) = self.inner.tls.load_full() {
            return Ok(context);
        }
        self.rebuild_tls()
    }

    /// Rebuild the TLS context from the current store contents and publish
    /// it. Called internally after identity and trust mutations.
    pub fn rebuild_tls(&self) -> Result<Arc<TlsContext>> {
        let identities: Vec<StoreIdentity> = {
            let store = self.inner.credential_store.lock();
            store
                .container
                .iter()
                .filter_map(|(_, entry)| match entry {
                    StoreEntry::KeyPair { key_der, chain_der } => Some(StoreIdentity {
                        key_der: key_der.clone(),
                        chain_der: chain_der.clone(),
                    }),
                    _ => None,
                })
                .collect()
        };
        let roots: Vec<Vec<u8>> = {
            let store = self.inner.trust_store.lock();
            store
                .container
                .iter()
                .filter_map(|(_, entry)| match entry {
                    StoreEntry::TrustedCert { cert_der } => Some(cert_der.clone()),
                    _ => None,
                })
                .collect()
        };

        debug!(
            identities = identities.len(),
            roots = roots.len(),
            "rebuilding TLS context"
        );
        let context = Arc::new(tls::build_context(
            identities,
            roots,
            Arc::downgrade(&self.inner),
        )?);
        self.inner.tls.store(Some(Arc::clone(&context)));
        Ok(context)
    }

    // ── internals ─────────────────────────────────────────────────────────

    fn store(&self, kind: StoreKind) -> &Mutex<StoreState> {
        match kind {
            StoreKind::Credentials => &self.inner.credential_store,
            StoreKind::Trust => &self.inner.trust_store,
        }
    }

    /// Apply a mutation to a working copy of the container, persist it, and
    /// swap it in. The closure returns whether anything changed; unchanged
    /// containers are neither persisted nor announced. The change event is
    /// emitted after the store lock is released.
    fn mutate(
        &self,
        kind: StoreKind,
        op: impl FnOnce(&mut KeyedContainer) -> Result<bool>,
    ) -> Result<bool> {
        let master = self.inner.master.lock().clone();
        let changed = {
            let mut state = self.store(kind).lock();
            let mut working = state.container.clone();
            if op(&mut working)? {
                state.file.persist(&working, &master)?;
                state.container = working;
                true
            } else {
                false
            }
        };
        if changed {
            self.inner.events.emit(StoreChanged { store: kind });
        }
        Ok(changed)
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("directory", &self.inner.config.directory)
            .finish_non_exhaustive()
    }
}
