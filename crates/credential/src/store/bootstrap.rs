//! First-run trust seeding
//!
//! When the trust store is created for the first time, it is seeded with the
//! X.509 certificates of a platform default trust bundle (a PKCS#12 file,
//! `cacerts`-style). The bundle password is guessed from a configured list
//! of well-known defaults; if none opens it, the provider chain is asked
//! once. Every failure here is non-fatal: an unreachable or locked bundle
//! leaves a valid, empty trust store and a diagnostic.

use std::fs;
use std::path::Path;

use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use super::container::{KeyedContainer, StoreEntry};
use super::pkcs12;
use crate::core::alias;
use crate::providers::ProviderChain;

/// How seeding ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Bundle opened; certificates were copied
    Seeded,
    /// No bundle file at the configured path
    BundleMissing,
    /// Bundle present but no password opened it
    BundleLocked,
}

/// Result of a seeding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    /// Certificates inserted into the container
    pub seeded: usize,
    /// Why seeding stopped
    pub outcome: SeedOutcome,
}

/// Seed a freshly created trust container from the default bundle.
///
/// Passwords are tried in the order given, then the provider chain is asked
/// for one. Certificates are inserted under their derived aliases, so
/// re-seeding the same bundle is idempotent.
pub fn seed_from_default_bundle(
    container: &mut KeyedContainer,
    bundle: &Path,
    passwords: &[String],
    providers: &ProviderChain,
) -> SeedReport {
    let bytes = match fs::read(bundle) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(
                bundle = %bundle.display(),
                error = %err,
                "default trust bundle unreachable, trust store starts empty"
            );
            return SeedReport {
                seeded: 0,
                outcome: SeedOutcome::BundleMissing,
            };
        }
    };

    for password in passwords {
        match pkcs12::certificates_from_bundle(&bytes, password) {
            Ok(certificates) => {
                debug!(bundle = %bundle.display(), "default trust bundle opened");
                return seed_certificates(container, &certificates);
            }
            Err(err) => {
                debug!(bundle = %bundle.display(), error = %err, "trust bundle password rejected");
            }
        }
    }

    if let Some(password) = providers.default_trust_password() {
        match pkcs12::certificates_from_bundle(&bytes, password.expose_secret()) {
            Ok(certificates) => {
                debug!(bundle = %bundle.display(), "trust bundle opened with provider password");
                return seed_certificates(container, &certificates);
            }
            Err(err) => {
                debug!(bundle = %bundle.display(), error = %err, "provider trust bundle password rejected");
            }
        }
    }

    warn!(
        bundle = %bundle.display(),
        "no password opened the default trust bundle, trust store starts empty"
    );
    SeedReport {
        seeded: 0,
        outcome: SeedOutcome::BundleLocked,
    }
}

fn seed_certificates(container: &mut KeyedContainer, certificates: &[Vec<u8>]) -> SeedReport {
    let mut seeded = 0;
    for cert_der in certificates {
        let entry_alias = match alias::trusted_certificate_entry(cert_der) {
            Ok(entry_alias) => entry_alias,
            Err(err) => {
                warn!(error = %err, "skipping unparseable certificate in trust bundle");
                continue;
            }
        };
        if container.contains(&entry_alias) {
            continue;
        }
        container.insert(
            entry_alias,
            StoreEntry::TrustedCert {
                cert_der: cert_der.clone(),
            },
        );
        seeded += 1;
    }
    info!(count = seeded, "seeded trust store from default bundle");
    SeedReport {
        seeded,
        outcome: SeedOutcome::Seeded,
    }
}
