//! PKCS#12 interop
//!
//! Key pairs are exported to (and imported from) standard PKCS#12 files so
//! identities move between this store, browsers, and Java keystores. The
//! first-run trust seeding also reads the platform default trust bundle
//! through this module.

use std::fs;
use std::path::Path;

use p12_keystore::{
    Certificate, KeyStore, KeyStoreEntry, Pkcs12ImportPolicy, PrivateKey, PrivateKeyChain,
};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::core::alias;
use crate::core::error::{CredentialError, Result};

/// Key material read from a PKCS#12 file.
#[derive(Debug)]
pub struct ImportedKeyPair {
    /// PKCS#8 private key, DER
    pub key_der: Vec<u8>,
    /// Certificate chain, end-entity first, DER
    pub chain_der: Vec<Vec<u8>>,
}

/// Write a key pair to a PKCS#12 file under the given export password.
///
/// The entry is stored under a human-readable friendly name derived from
/// the end-entity certificate (`"<owner>'s <issuer> ID"`).
pub fn export_key_pair(
    path: &Path,
    export_password: &SecretString,
    key_der: &[u8],
    chain_der: &[Vec<u8>],
) -> Result<()> {
    let end_entity = chain_der
        .first()
        .ok_or_else(|| CredentialError::InvalidCertificate {
            reason: "key pair has an empty certificate chain".to_string(),
        })?;
    let friendly_name = alias::export_friendly_name(end_entity)?;

    let mut chain = Vec::with_capacity(chain_der.len());
    for der in chain_der {
        chain.push(Certificate::from_der(der)?);
    }

    let key = PrivateKey::from_der(key_der)?;
    let key_id = Sha256::digest(end_entity);
    let key_chain = PrivateKeyChain::new(key_id.to_vec(), key, chain);

    let mut keystore = KeyStore::new();
    keystore.add_entry(&friendly_name, KeyStoreEntry::PrivateKeyChain(key_chain));
    let bytes = keystore.writer(export_password.expose_secret()).write()?;

    fs::write(path, &bytes).map_err(|source| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read the first private-key entry from a PKCS#12 file.
pub fn import_key_pair(path: &Path, password: &SecretString) -> Result<ImportedKeyPair> {
    let bytes = fs::read(path).map_err(|source| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let keystore = KeyStore::from_pkcs12(
        &bytes,
        password.expose_secret(),
        Pkcs12ImportPolicy::default(),
    )?;

    for (_, entry) in keystore.entries() {
        if let KeyStoreEntry::PrivateKeyChain(key_chain) = entry {
            return Ok(ImportedKeyPair {
                key_der: key_chain.key().as_der().to_vec(),
                chain_der: key_chain
                    .certs()
                    .iter()
                    .map(|cert| cert.as_der().to_vec())
                    .collect(),
            });
        }
    }

    Err(CredentialError::InvalidCertificate {
        reason: "PKCS#12 file contains no private-key entry".to_string(),
    })
}

/// The X.509 certificates of a PKCS#12 trust bundle.
///
/// Only standalone certificate entries are returned; private-key entries in
/// the bundle are ignored. Errors (wrong password included) bubble to the
/// caller, which treats them as a guess failure.
pub fn certificates_from_bundle(
    bytes: &[u8],
    password: &str,
) -> std::result::Result<Vec<Vec<u8>>, p12_keystore::error::Error> {
    let keystore = KeyStore::from_pkcs12(bytes, password, Pkcs12ImportPolicy::default())?;
    let mut certificates = Vec::new();
    for (_, entry) in keystore.entries() {
        if let KeyStoreEntry::Certificate(cert) = entry {
            certificates.push(cert.as_der().to_vec());
        }
    }
    Ok(certificates)
}
