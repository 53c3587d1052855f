//! Deterministic alias scheme for store entries
//!
//! Every entry is addressed by a structured alias string:
//!
//! - password entries: `password#<service-uri>`
//! - key-pair entries: `keypair#<owner>#<issuer>#<SERIALHEX>`
//! - trusted certificates: `trustedcert#<owner>#<issuer>#<SERIALHEX>`
//!
//! Certificate-derived labels come from the subject/issuer DN with a
//! CN, then OU, then O fallback; a DN with none of these yields the
//! literal placeholder [`NOT_PART_OF_CERTIFICATE`]. The serial number is
//! rendered as uppercase hex without leading zeros. The same certificate
//! therefore always maps to the same alias, which is what makes trust
//! and key-pair operations idempotent.

use url::Url;
use x509_parser::prelude::*;

use super::error::{CredentialError, Result};

/// Alias prefix for password entries.
pub const PASSWORD_ENTRY_PREFIX: &str = "password#";

/// Alias prefix for key-pair entries.
pub const KEY_PAIR_ENTRY_PREFIX: &str = "keypair#";

/// Alias prefix for trusted-certificate entries.
pub const TRUSTED_CERT_ENTRY_PREFIX: &str = "trustedcert#";

/// Placeholder label for a DN carrying no CN, OU, or O attribute.
pub const NOT_PART_OF_CERTIFICATE: &str = "<Not Part of Certificate>";

/// Owner/issuer labels and serial of a certificate, as used in aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateLabels {
    /// Subject label (CN, OU, or O)
    pub owner: String,
    /// Issuer label (CN, OU, or O)
    pub issuer: String,
    /// Uppercase hex serial without leading zeros
    pub serial_hex: String,
}

/// Alias for the password entry of a service URI.
///
/// The caller passes the already-normalized URI; the alias embeds its exact
/// serialized form.
#[must_use]
pub fn password_entry(service: &Url) -> String {
    format!("{PASSWORD_ENTRY_PREFIX}{service}")
}

/// Recover the service URI from a password-entry alias.
///
/// Returns `None` for aliases of other kinds or aliases whose URI part does
/// not parse.
#[must_use]
pub fn password_entry_uri(alias: &str) -> Option<Url> {
    let uri = alias.strip_prefix(PASSWORD_ENTRY_PREFIX)?;
    Url::parse(uri).ok()
}

/// Alias for the key-pair entry of a certificate (DER).
pub fn key_pair_entry(cert_der: &[u8]) -> Result<String> {
    let labels = certificate_labels(cert_der)?;
    Ok(format!(
        "{KEY_PAIR_ENTRY_PREFIX}{}#{}#{}",
        labels.owner, labels.issuer, labels.serial_hex
    ))
}

/// Alias for the trusted-certificate entry of a certificate (DER).
pub fn trusted_certificate_entry(cert_der: &[u8]) -> Result<String> {
    let labels = certificate_labels(cert_der)?;
    Ok(format!(
        "{TRUSTED_CERT_ENTRY_PREFIX}{}#{}#{}",
        labels.owner, labels.issuer, labels.serial_hex
    ))
}

/// Human-readable name used for the entry inside an exported PKCS#12 file.
pub fn export_friendly_name(cert_der: &[u8]) -> Result<String> {
    let labels = certificate_labels(cert_der)?;
    Ok(format!("{}'s {} ID", labels.owner, labels.issuer))
}

/// Extract the alias labels from a DER certificate.
pub fn certificate_labels(cert_der: &[u8]) -> Result<CertificateLabels> {
    let (_, cert) = X509Certificate::from_der(cert_der).map_err(|e| {
        CredentialError::InvalidCertificate {
            reason: e.to_string(),
        }
    })?;

    Ok(CertificateLabels {
        owner: principal_label(cert.subject()),
        issuer: principal_label(cert.issuer()),
        serial_hex: serial_hex(cert.raw_serial()),
    })
}

/// Uppercase hex rendering of a DER serial, without leading zeros.
///
/// A zero serial renders as `"0"`.
#[must_use]
pub fn serial_hex(raw: &[u8]) -> String {
    let mut hex = String::with_capacity(raw.len() * 2);
    for byte in raw {
        use std::fmt::Write;
        let _ = write!(hex, "{byte:02X}");
    }
    let trimmed = hex.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// CN, then OU, then O. Attributes that are absent, empty, or carry the
/// legacy `none` sentinel are skipped.
fn principal_label(name: &X509Name<'_>) -> String {
    first_meaningful(name.iter_common_name())
        .or_else(|| first_meaningful(name.iter_organizational_unit()))
        .or_else(|| first_meaningful(name.iter_organization()))
        .unwrap_or_else(|| NOT_PART_OF_CERTIFICATE.to_string())
}

fn first_meaningful<'a>(
    mut attrs: impl Iterator<Item = &'a AttributeTypeAndValue<'a>>,
) -> Option<String> {
    attrs.find_map(|attr| {
        let value = attr.as_str().ok()?;
        if value.is_empty() || value == "none" {
            None
        } else {
            Some(value.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SerialNumber};

    fn cert_der(dn: DistinguishedName, serial: Vec<u8>) -> Vec<u8> {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params.distinguished_name = dn;
        params.serial_number = Some(SerialNumber::from(serial));
        params.self_signed(&key).unwrap().der().to_vec()
    }

    fn dn(pairs: &[(DnType, &str)]) -> DistinguishedName {
        let mut dn = DistinguishedName::new();
        for (ty, value) in pairs {
            dn.push(ty.clone(), *value);
        }
        dn
    }

    #[test]
    fn test_serial_hex_strips_leading_zeros() {
        assert_eq!(serial_hex(&[0x0F, 0xAB]), "FAB");
        assert_eq!(serial_hex(&[0x00, 0x01]), "1");
        assert_eq!(serial_hex(&[0x00]), "0");
        assert_eq!(serial_hex(&[0xDE, 0xAD, 0xBE, 0xEF]), "DEADBEEF");
    }

    #[test]
    fn test_alias_uses_common_name() {
        let der = cert_der(
            dn(&[
                (DnType::CommonName, "Test Owner"),
                (DnType::OrganizationName, "Test Org"),
            ]),
            vec![0x1F],
        );
        let alias = trusted_certificate_entry(&der).unwrap();
        assert_eq!(alias, "trustedcert#Test Owner#Test Owner#1F");
    }

    #[test]
    fn test_alias_falls_back_to_organizational_unit() {
        let der = cert_der(
            dn(&[
                (DnType::OrganizationalUnitName, "Engineering"),
                (DnType::OrganizationName, "Test Org"),
            ]),
            vec![0x02],
        );
        let alias = key_pair_entry(&der).unwrap();
        assert_eq!(alias, "keypair#Engineering#Engineering#2");
    }

    #[test]
    fn test_alias_falls_back_to_organization() {
        let der = cert_der(dn(&[(DnType::OrganizationName, "Only Org")]), vec![0x03]);
        let alias = key_pair_entry(&der).unwrap();
        assert_eq!(alias, "keypair#Only Org#Only Org#3");
    }

    #[test]
    fn test_alias_placeholder_for_empty_dn() {
        let der = cert_der(DistinguishedName::new(), vec![0x04]);
        let alias = trusted_certificate_entry(&der).unwrap();
        assert_eq!(
            alias,
            format!("trustedcert#{NOT_PART_OF_CERTIFICATE}#{NOT_PART_OF_CERTIFICATE}#4")
        );
    }

    #[test]
    fn test_alias_is_stable_across_calls() {
        let der = cert_der(dn(&[(DnType::CommonName, "Stable")]), vec![0xAA, 0xBB]);
        assert_eq!(
            trusted_certificate_entry(&der).unwrap(),
            trusted_certificate_entry(&der).unwrap()
        );
    }

    #[test]
    fn test_password_alias_round_trip() {
        let uri = Url::parse("http://example.org/service/#realm").unwrap();
        let alias = password_entry(&uri);
        assert_eq!(alias, "password#http://example.org/service/#realm");
        assert_eq!(password_entry_uri(&alias), Some(uri));
    }

    #[test]
    fn test_password_entry_uri_rejects_other_kinds() {
        assert_eq!(password_entry_uri("keypair#A#B#1"), None);
    }

    #[test]
    fn test_export_friendly_name() {
        let der = cert_der(dn(&[(DnType::CommonName, "Alice")]), vec![0x10]);
        assert_eq!(export_friendly_name(&der).unwrap(), "Alice's Alice ID");
    }

    #[test]
    fn test_invalid_der_rejected() {
        let err = certificate_labels(b"not a certificate").unwrap_err();
        assert!(matches!(err, CredentialError::InvalidCertificate { .. }));
    }
}
