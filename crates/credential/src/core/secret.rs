//! Username/password pairs and their on-store byte encoding
//!
//! Password entries are stored as an opaque byte payload: the UTF-8 username,
//! a single NUL separator, then the UTF-8 password. The username therefore
//! must not contain NUL; the password may (decoding splits at the *first*
//! separator).

use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use super::error::{CredentialError, Result};

/// Separator between username and password in the stored payload.
const SEPARATOR: u8 = 0x00;

/// A username/password pair retrieved from (or destined for) the store.
///
/// The password is held behind [`SecretString`] so it is zeroized on drop
/// and excluded from `Debug` output.
pub struct UsernamePassword {
    username: String,
    password: SecretString,
}

impl UsernamePassword {
    /// Create a pair from owned parts.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Create a pair from a username and an already-wrapped password.
    pub fn from_secret(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// The username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password. Callers expose it at the last possible moment.
    #[must_use]
    pub fn password(&self) -> &SecretString {
        &self.password
    }
}

impl std::fmt::Debug for UsernamePassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsernamePassword")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Encode a username/password pair into the stored payload.
///
/// # Errors
///
/// Returns [`CredentialError::InvalidSecretFormat`] if the username contains
/// the NUL separator, which would make the record ambiguous to decode.
pub fn encode_secret(username: &str, password: &SecretString) -> Result<Vec<u8>> {
    if username.as_bytes().contains(&SEPARATOR) {
        return Err(CredentialError::InvalidSecretFormat {
            reason: "username must not contain the NUL separator".to_string(),
        });
    }

    let password = password.expose_secret();
    let mut out = Vec::with_capacity(username.len() + 1 + password.len());
    out.extend_from_slice(username.as_bytes());
    out.push(SEPARATOR);
    out.extend_from_slice(password.as_bytes());
    Ok(out)
}

/// Decode a stored payload back into a username/password pair.
///
/// Splits at the first NUL separator. Everything after it, including further
/// NUL bytes, belongs to the password.
///
/// # Errors
///
/// Returns [`CredentialError::InvalidSecretFormat`] if no separator is
/// present or either half is not valid UTF-8.
pub fn decode_secret(payload: &[u8]) -> Result<UsernamePassword> {
    let sep = payload.iter().position(|&b| b == SEPARATOR).ok_or_else(|| {
        CredentialError::InvalidSecretFormat {
            reason: "record has no username/password separator".to_string(),
        }
    })?;

    let username = std::str::from_utf8(&payload[..sep]).map_err(|_| {
        CredentialError::InvalidSecretFormat {
            reason: "username is not valid UTF-8".to_string(),
        }
    })?;
    let mut password_bytes = payload[sep + 1..].to_vec();
    let password = match std::str::from_utf8(&password_bytes) {
        Ok(p) => p.to_string(),
        Err(_) => {
            password_bytes.zeroize();
            return Err(CredentialError::InvalidSecretFormat {
                reason: "password is not valid UTF-8".to_string(),
            });
        }
    };
    password_bytes.zeroize();

    Ok(UsernamePassword::new(username, password))
}
