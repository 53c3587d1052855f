//! Encrypted keyed container format
//!
//! Both stores share one on-disk format: a JSON envelope carrying Argon2id
//! KDF parameters, a random salt and nonce, and an AES-256-GCM sealed
//! payload. The payload is the JSON entry table, keyed by alias. GCM
//! authentication means a wrong master password and a tampered file are
//! indistinguishable on open; both surface as a rejected seal.

use std::collections::BTreeMap;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, rand_core::RngCore},
};
use argon2::Argon2;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::core::error::{CryptoError, StoreError};

const ENVELOPE_VERSION: u32 = 1;
const KEY_LEN: usize = 32;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

/// One entry in a store, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreEntry {
    /// Opaque secret payload (an encoded username/password record).
    Secret {
        /// Encoded record bytes
        #[serde(with = "b64")]
        payload: Vec<u8>,
    },
    /// Private key with its certificate chain, all DER.
    KeyPair {
        /// PKCS#8 private key
        #[serde(with = "b64")]
        key_der: Vec<u8>,
        /// End-entity certificate first
        #[serde(with = "b64_list")]
        chain_der: Vec<Vec<u8>>,
    },
    /// A single trusted certificate, DER.
    TrustedCert {
        /// The certificate
        #[serde(with = "b64")]
        cert_der: Vec<u8>,
    },
}

/// In-memory entry table of one store. Aliases are unique; inserting an
/// existing alias overwrites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedContainer {
    entries: BTreeMap<String, StoreEntry>,
}

impl KeyedContainer {
    /// Empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry by alias.
    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&StoreEntry> {
        self.entries.get(alias)
    }

    /// Insert or overwrite; returns the previous entry if any.
    pub fn insert(&mut self, alias: impl Into<String>, entry: StoreEntry) -> Option<StoreEntry> {
        self.entries.insert(alias.into(), entry)
    }

    /// Remove an entry; returns it if it was present.
    pub fn remove(&mut self, alias: &str) -> Option<StoreEntry> {
        self.entries.remove(alias)
    }

    /// Whether the alias is present.
    #[must_use]
    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    /// All aliases, in sorted order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// All entries with their aliases, in sorted alias order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StoreEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the container holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Argon2id parameters recorded in the envelope so files survive a change
/// of defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KdfParams {
    m_cost: u32,
    t_cost: u32,
    p_cost: u32,
    salt: String,
}

impl KdfParams {
    fn fresh(salt: &[u8]) -> Self {
        let defaults = argon2::Params::DEFAULT;
        Self {
            m_cost: defaults.m_cost(),
            t_cost: defaults.t_cost(),
            p_cost: defaults.p_cost(),
            salt: BASE64.encode(salt),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SealedEnvelope {
    version: u32,
    kdf: KdfParams,
    nonce: String,
    ciphertext: String,
}

/// Serialize and encrypt a container under the master password.
pub fn seal(container: &KeyedContainer, master: &SecretString) -> Result<Vec<u8>, StoreError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let kdf = KdfParams::fresh(&salt);

    let cipher = cipher_for(master, &salt, &kdf).map_err(|source| StoreError::Sealed { source })?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut plaintext =
        serde_json::to_vec(container).map_err(|source| StoreError::Envelope { source })?;
    let ciphertext = cipher.encrypt(&nonce, plaintext.as_slice()).map_err(|_| {
        StoreError::Sealed {
            source: CryptoError::EncryptionFailed("AES-256-GCM".to_string()),
        }
    })?;
    plaintext.zeroize();

    let envelope = SealedEnvelope {
        version: ENVELOPE_VERSION,
        kdf,
        nonce: BASE64.encode(nonce),
        ciphertext: BASE64.encode(ciphertext),
    };
    serde_json::to_vec_pretty(&envelope).map_err(|source| StoreError::Envelope { source })
}

/// Decrypt and deserialize a container with the master password.
///
/// A wrong password and a corrupted file both fail the GCM tag check and
/// surface as [`StoreError::Sealed`].
pub fn unseal(bytes: &[u8], master: &SecretString) -> Result<KeyedContainer, StoreError> {
    let envelope: SealedEnvelope =
        serde_json::from_slice(bytes).map_err(|source| StoreError::Envelope { source })?;
    if envelope.version != ENVELOPE_VERSION {
        return Err(StoreError::Sealed {
            source: CryptoError::UnsupportedVersion(envelope.version),
        });
    }

    let salt = decode_field(&envelope.kdf.salt, "salt")
        .map_err(|source| StoreError::Sealed { source })?;
    let nonce_bytes = decode_field(&envelope.nonce, "nonce")
        .map_err(|source| StoreError::Sealed { source })?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(StoreError::Sealed {
            source: CryptoError::InvalidField { field: "nonce" },
        });
    }
    let ciphertext = decode_field(&envelope.ciphertext, "ciphertext")
        .map_err(|source| StoreError::Sealed { source })?;

    let cipher =
        cipher_for(master, &salt, &envelope.kdf).map_err(|source| StoreError::Sealed { source })?;
    let mut plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
        .map_err(|_| StoreError::Sealed {
            source: CryptoError::DecryptionFailed,
        })?;

    let container = serde_json::from_slice(&plaintext)
        .map_err(|source| StoreError::Envelope { source });
    plaintext.zeroize();
    container
}

fn cipher_for(
    master: &SecretString,
    salt: &[u8],
    kdf: &KdfParams,
) -> Result<Aes256Gcm, CryptoError> {
    let params = argon2::Params::new(kdf.m_cost, kdf.t_cost, kdf.p_cost, Some(KEY_LEN))
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(master.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()));
    key.zeroize();
    cipher
}

fn decode_field(value: &str, field: &'static str) -> Result<Vec<u8>, CryptoError> {
    BASE64
        .decode(value)
        .map_err(|_| CryptoError::InvalidField { field })
}

mod b64 {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(&encoded).map_err(serde::de::Error::custom)
    }
}

mod b64_list {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, ser::SerializeSeq};

    pub fn serialize<S: Serializer>(list: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(list.len()))?;
        for bytes in list {
            seq.serialize_element(&STANDARD.encode(bytes))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|item| STANDARD.decode(item).map_err(serde::de::Error::custom))
            .collect()
    }
}
