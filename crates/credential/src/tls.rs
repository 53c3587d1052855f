//! TLS material built from the stores
//!
//! The credential store's key-pair entries become client identities, the
//! trust store's certificates become verification roots. Server
//! certificates are first checked against those roots (WebPKI path
//! building); on failure the trust decision falls back to the manager's
//! [`should_trust`], which consults the store again by alias and then the
//! provider chain. A context is rebuilt and republished after every
//! identity or trust mutation.
//!
//! The verifier holds only a weak reference back to the manager, so a
//! context kept alive by a connection pool does not keep the stores alive.
//!
//! [`should_trust`]: crate::manager::CredentialManager::should_trust

use std::sync::{Arc, Weak};

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::ResolvesClientCert;
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime};
use rustls::sign::CertifiedKey;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tracing::{debug, warn};

use crate::core::error::{CredentialError, Result};
use crate::manager::{CredentialManager, ManagerInner};

/// A key-pair entry flattened for context building.
pub(crate) struct StoreIdentity {
    pub key_der: Vec<u8>,
    pub chain_der: Vec<Vec<u8>>,
}

/// Published TLS material derived from the current store contents.
pub struct TlsContext {
    client_config: Arc<ClientConfig>,
    identity_count: usize,
    root_count: usize,
}

impl TlsContext {
    /// rustls client configuration backed by the stores.
    #[must_use]
    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.client_config)
    }

    /// Number of client identities the context can offer.
    #[must_use]
    pub fn identity_count(&self) -> usize {
        self.identity_count
    }

    /// Number of trust roots the context verifies against.
    #[must_use]
    pub fn root_count(&self) -> usize {
        self.root_count
    }
}

impl std::fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsContext")
            .field("identities", &self.identity_count)
            .field("roots", &self.root_count)
            .finish()
    }
}

/// Build a TLS context from store snapshots.
pub(crate) fn build_context(
    identities: Vec<StoreIdentity>,
    roots: Vec<Vec<u8>>,
    manager: Weak<ManagerInner>,
) -> Result<TlsContext> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let mut root_store = RootCertStore::empty();
    for root_der in roots {
        if let Err(err) = root_store.add(CertificateDer::from(root_der)) {
            warn!(error = %err, "skipping trust store entry rejected as a root");
        }
    }
    let root_count = root_store.len();

    // WebPKI refuses an empty root set; with no roots every decision goes
    // straight to the store/provider fallback.
    let webpki = if root_store.is_empty() {
        None
    } else {
        Some(
            WebPkiServerVerifier::builder_with_provider(
                Arc::new(root_store),
                Arc::clone(&provider),
            )
            .build()
            .map_err(|err| CredentialError::Tls {
                source: rustls::Error::General(err.to_string()),
            })?,
        )
    };

    let mut certified = Vec::with_capacity(identities.len());
    for identity in identities {
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(identity.key_der));
        match rustls::crypto::ring::sign::any_supported_type(&key) {
            Ok(signing_key) => {
                let chain: Vec<CertificateDer<'static>> = identity
                    .chain_der
                    .into_iter()
                    .map(CertificateDer::from)
                    .collect();
                certified.push(Arc::new(CertifiedKey::new(chain, signing_key)));
            }
            Err(err) => {
                warn!(error = %err, "skipping key pair with unsupported key type");
            }
        }
    }
    let identity_count = certified.len();

    let verifier = Arc::new(TrustDecisionVerifier {
        webpki,
        provider: Arc::clone(&provider),
        manager,
    });
    let resolver = Arc::new(StoreClientCertResolver {
        identities: certified,
    });

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|source| CredentialError::Tls { source })?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_client_cert_resolver(resolver);

    Ok(TlsContext {
        client_config: Arc::new(config),
        identity_count,
        root_count,
    })
}

/// Offers the store's key-pair identities for client authentication.
struct StoreClientCertResolver {
    identities: Vec<Arc<CertifiedKey>>,
}

impl ResolvesClientCert for StoreClientCertResolver {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        _sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        // The store rarely holds more than one identity; offer the first.
        self.identities.first().cloned()
    }

    fn has_certs(&self) -> bool {
        !self.identities.is_empty()
    }
}

impl std::fmt::Debug for StoreClientCertResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClientCertResolver")
            .field("identities", &self.identities.len())
            .finish()
    }
}

/// Verifies server chains against the trust store, falling back to the
/// manager's trust decision (store alias, then provider chain) when the
/// WebPKI path fails.
#[derive(Debug)]
struct TrustDecisionVerifier {
    webpki: Option<Arc<WebPkiServerVerifier>>,
    provider: Arc<CryptoProvider>,
    manager: Weak<ManagerInner>,
}

impl TrustDecisionVerifier {
    fn chain_trusted(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
    ) -> bool {
        let Some(inner) = self.manager.upgrade() else {
            return false;
        };
        let mut chain = Vec::with_capacity(1 + intermediates.len());
        chain.push(end_entity.clone());
        chain.extend(intermediates.iter().cloned());

        CredentialManager::from_inner(inner)
            .should_trust(&chain)
            .unwrap_or_else(|err| {
                warn!(error = %err, "trust decision failed, treating chain as untrusted");
                false
            })
    }
}

impl ServerCertVerifier for TrustDecisionVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        if let Some(webpki) = &self.webpki {
            match webpki.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
            {
                Ok(verified) => return Ok(verified),
                Err(err) => {
                    if self.chain_trusted(end_entity, intermediates) {
                        debug!(server = ?server_name, "chain accepted by trust decision fallback");
                        return Ok(ServerCertVerified::assertion());
                    }
                    return Err(err);
                }
            }
        }

        if self.chain_trusted(end_entity, intermediates) {
            return Ok(ServerCertVerified::assertion());
        }
        Err(rustls::Error::InvalidCertificate(
            rustls::CertificateError::UnknownIssuer,
        ))
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
