//! Manager configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration for [`CredentialManager::open`].
///
/// Only the store directory is required; everything else has defaults.
///
/// [`CredentialManager::open`]: crate::manager::CredentialManager::open
///
/// # Examples
///
/// ```rust,ignore
/// let config = CredentialConfig::new("/var/lib/weft/security")
///     .with_default_trust_bundle("/etc/ssl/certs/java/cacerts");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Directory holding both store files. Created 0700 if absent.
    pub directory: PathBuf,

    /// File name of the credential store inside `directory`.
    #[serde(default = "default_credential_store_file")]
    pub credential_store_file: String,

    /// File name of the trust store inside `directory`.
    #[serde(default = "default_trust_store_file")]
    pub trust_store_file: String,

    /// PKCS#12 bundle seeding the trust store on first run, if any.
    #[serde(default)]
    pub default_trust_bundle: Option<PathBuf>,

    /// Passwords tried against the default trust bundle, in order, before
    /// the provider chain is asked.
    #[serde(default = "default_trust_passwords")]
    pub default_trust_passwords: Vec<String>,
}

fn default_credential_store_file() -> String {
    "keystore.wks".to_string()
}

fn default_trust_store_file() -> String {
    "truststore.wks".to_string()
}

fn default_trust_passwords() -> Vec<String> {
    // The well-known defaults of common Java trust bundles.
    vec![String::new(), "changeit".to_string(), "changeme".to_string()]
}

impl CredentialConfig {
    /// Configuration with defaults for the given store directory.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            credential_store_file: default_credential_store_file(),
            trust_store_file: default_trust_store_file(),
            default_trust_bundle: None,
            default_trust_passwords: default_trust_passwords(),
        }
    }

    /// Set the credential store file name.
    pub fn with_credential_store_file(mut self, name: impl Into<String>) -> Self {
        self.credential_store_file = name.into();
        self
    }

    /// Set the trust store file name.
    pub fn with_trust_store_file(mut self, name: impl Into<String>) -> Self {
        self.trust_store_file = name.into();
        self
    }

    /// Set the default trust bundle path.
    pub fn with_default_trust_bundle(mut self, bundle: impl Into<PathBuf>) -> Self {
        self.default_trust_bundle = Some(bundle.into());
        self
    }

    /// Replace the list of passwords tried against the default trust bundle.
    pub fn with_default_trust_passwords(mut self, passwords: Vec<String>) -> Self {
        self.default_trust_passwords = passwords;
        self
    }

    /// Full path of the credential store file.
    #[must_use]
    pub fn credential_store_path(&self) -> PathBuf {
        self.directory.join(&self.credential_store_file)
    }

    /// Full path of the trust store file.
    #[must_use]
    pub fn trust_store_path(&self) -> PathBuf {
        self.directory.join(&self.trust_store_file)
    }

    /// The store directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}
