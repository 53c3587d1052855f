//! Non-interactive provider backed by fixed values
//!
//! Useful for headless deployments and tests: carries an optional master
//! password and an optional default-trust-bundle password, and declines
//! everything else.

use secrecy::SecretString;

use super::CredentialProvider;

/// Provider answering from values fixed at construction.
pub struct StaticProvider {
    priority: i32,
    master_password: Option<SecretString>,
    trust_password: Option<SecretString>,
}

impl StaticProvider {
    /// Empty provider; add values with the `with_*` methods.
    #[must_use]
    pub fn new() -> Self {
        Self {
            priority: 0,
            master_password: None,
            trust_password: None,
        }
    }

    /// Set the chain priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the master password this provider offers.
    #[must_use]
    pub fn with_master_password(mut self, password: impl Into<String>) -> Self {
        self.master_password = Some(SecretString::from(password.into()));
        self
    }

    /// Set the default-trust-bundle password this provider offers.
    #[must_use]
    pub fn with_trust_password(mut self, password: impl Into<String>) -> Self {
        self.trust_password = Some(SecretString::from(password.into()));
        self
    }
}

impl Default for StaticProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn master_password(&self, _first_run: bool) -> Option<SecretString> {
        self.master_password
            .as_ref()
            .map(|p| SecretString::from(secrecy::ExposeSecret::expose_secret(p).to_string()))
    }

    fn default_trust_password(&self) -> Option<SecretString> {
        self.trust_password
            .as_ref()
            .map(|p| SecretString::from(secrecy::ExposeSecret::expose_secret(p).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_offers_configured_master_password() {
        let provider = StaticProvider::new().with_master_password("pw");
        assert_eq!(
            provider.master_password(true).unwrap().expose_secret(),
            "pw"
        );
        assert!(provider.default_trust_password().is_none());
    }

    #[test]
    fn test_declines_username_password() {
        let provider = StaticProvider::new().with_master_password("pw");
        let uri = url::Url::parse("http://example.org/").unwrap();
        assert!(provider.username_password(&uri, None).is_none());
    }
}
