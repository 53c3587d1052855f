//! Shared helpers for the manager integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SerialNumber};
use rustls::pki_types::CertificateDer;
use secrecy::SecretString;
use url::Url;
use weft_credential::manager::{CredentialConfig, CredentialManager};
use weft_credential::providers::{
    CredentialProvider, ProvidedCredential, StaticProvider, TrustConfirmation,
};

pub const MASTER: &str = "test-master-password";

pub fn open_manager(dir: &Path) -> CredentialManager {
    open_with(CredentialConfig::new(dir), Vec::new())
}

pub fn open_with(
    config: CredentialConfig,
    extra: Vec<Arc<dyn CredentialProvider>>,
) -> CredentialManager {
    init_logging();
    let mut providers: Vec<Arc<dyn CredentialProvider>> =
        vec![Arc::new(StaticProvider::new().with_master_password(MASTER))];
    providers.extend(extra);
    CredentialManager::open(config, providers).unwrap()
}

/// Route tracing output through the test harness; safe to call repeatedly.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn secret(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

/// Self-signed test identity: PKCS#8 key DER and certificate DER.
pub fn self_signed(common_name: &str, serial: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params.serial_number = Some(SerialNumber::from(serial.to_vec()));
    let cert = params.self_signed(&key).unwrap();
    (key.serialize_der(), cert.der().to_vec())
}

pub fn cert_der(common_name: &str, serial: &[u8]) -> Vec<u8> {
    self_signed(common_name, serial).1
}

pub fn chain(cert_der: &[u8]) -> Vec<CertificateDer<'static>> {
    vec![CertificateDer::from(cert_der.to_vec())]
}

/// Write a PKCS#12 trust bundle containing the given certificates.
pub fn write_trust_bundle(path: &Path, password: &str, certificates: &[Vec<u8>]) {
    let mut keystore = p12_keystore::KeyStore::new();
    for (index, der) in certificates.iter().enumerate() {
        let cert = p12_keystore::Certificate::from_der(der).unwrap();
        keystore.add_entry(
            &format!("seed-{index}"),
            p12_keystore::KeyStoreEntry::Certificate(cert),
        );
    }
    let bytes = keystore.writer(password).write().unwrap();
    std::fs::write(path, bytes).unwrap();
}

/// Provider returning fixed answers and counting how often it is asked.
pub struct RecordingProvider {
    login: Option<(String, String, bool)>,
    trust: Option<TrustConfirmation>,
    pub login_calls: Arc<AtomicUsize>,
    pub trust_calls: Arc<AtomicUsize>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            login: None,
            trust: None,
            login_calls: Arc::new(AtomicUsize::new(0)),
            trust_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_login(mut self, username: &str, password: &str, save: bool) -> Self {
        self.login = Some((username.to_string(), password.to_string(), save));
        self
    }

    pub fn with_trust(mut self, trusted: bool, save: bool) -> Self {
        self.trust = Some(TrustConfirmation { trusted, save });
        self
    }
}

impl CredentialProvider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    fn username_password(
        &self,
        _service: &Url,
        _prompt: Option<&str>,
    ) -> Option<ProvidedCredential> {
        self.login_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.login
            .as_ref()
            .map(|(username, password, save)| ProvidedCredential {
                username: username.clone(),
                password: SecretString::from(password.clone()),
                save: *save,
            })
    }

    fn confirm_trust(&self, _chain: &[CertificateDer<'_>]) -> Option<TrustConfirmation> {
        self.trust_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.trust
    }
}
