//! Trust store operations, trust decisions, and first-run seeding

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{RecordingProvider, cert_der, chain, open_manager, open_with, write_trust_bundle};
use pretty_assertions::assert_eq;
use weft_credential::core::{CredentialError, StoreKind};
use weft_credential::manager::CredentialConfig;
use weft_credential::providers::StaticProvider;

#[test]
fn test_save_trusted_certificate_derives_alias() {
    let dir = tempfile::tempdir().unwrap();
    let manager = open_manager(dir.path());
    let der = cert_der("Trusted Root", &[0x1F]);

    let alias = manager.save_trusted_certificate(&der).unwrap();
    assert_eq!(alias, "trustedcert#Trusted Root#Trusted Root#1F");
    assert!(manager.contains_alias(StoreKind::Trust, &alias));
    assert_eq!(manager.get_certificate(StoreKind::Trust, &alias), Some(der));
}

#[test]
fn test_saving_identical_certificate_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let manager = open_manager(dir.path());
    let der = cert_der("Trusted Root", &[0x02]);

    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    manager.subscribe(Arc::new(move |event| {
        assert_eq!(event.store, StoreKind::Trust);
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let first = manager.save_trusted_certificate(&der).unwrap();
    let second = manager.save_trusted_certificate(&der).unwrap();
    assert_eq!(first, second);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(manager.aliases(StoreKind::Trust).len(), 1);
}

#[test]
fn test_should_trust_short_circuits_on_stored_certificate() {
    let dir = tempfile::tempdir().unwrap();
    let provider = RecordingProvider::new().with_trust(true, true);
    let trust_calls = Arc::clone(&provider.trust_calls);
    let manager = open_with(CredentialConfig::new(dir.path()), vec![Arc::new(provider)]);

    let der = cert_der("Some Server", &[0x03]);
    let server_chain = chain(&der);

    // First decision goes to the provider and is persisted.
    assert!(manager.should_trust(&server_chain).unwrap());
    assert_eq!(trust_calls.load(Ordering::SeqCst), 1);

    // Second decision is answered from the store.
    assert!(manager.should_trust(&server_chain).unwrap());
    assert_eq!(trust_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_trust_without_save_asks_every_time() {
    let dir = tempfile::tempdir().unwrap();
    let provider = RecordingProvider::new().with_trust(true, false);
    let trust_calls = Arc::clone(&provider.trust_calls);
    let manager = open_with(CredentialConfig::new(dir.path()), vec![Arc::new(provider)]);

    let server_chain = chain(&cert_der("Ephemeral Server", &[0x04]));
    assert!(manager.should_trust(&server_chain).unwrap());
    assert!(manager.should_trust(&server_chain).unwrap());
    assert_eq!(trust_calls.load(Ordering::SeqCst), 2);
    assert!(manager.aliases(StoreKind::Trust).is_empty());
}

#[test]
fn test_no_provider_answer_means_untrusted() {
    let dir = tempfile::tempdir().unwrap();
    let manager = open_manager(dir.path());

    let server_chain = chain(&cert_der("Unknown Server", &[0x05]));
    assert!(!manager.should_trust(&server_chain).unwrap());
    assert!(manager.aliases(StoreKind::Trust).is_empty());
}

#[test]
fn test_delete_trusted_certificate() {
    let dir = tempfile::tempdir().unwrap();
    let manager = open_manager(dir.path());
    let der = cert_der("Trusted Root", &[0x06]);

    let alias = manager.save_trusted_certificate(&der).unwrap();
    manager.delete_trusted_certificate(&alias).unwrap();
    assert!(!manager.contains_alias(StoreKind::Trust, &alias));

    let err = manager.delete_trusted_certificate(&alias).unwrap_err();
    assert!(matches!(
        err,
        CredentialError::AliasNotFound {
            kind: StoreKind::Trust,
            ..
        }
    ));
}

#[test]
fn test_trust_mutations_rebuild_tls_roots() {
    let dir = tempfile::tempdir().unwrap();
    let manager = open_manager(dir.path());
    assert_eq!(manager.tls_context().unwrap().root_count(), 0);

    let alias = manager
        .save_trusted_certificate(&cert_der("Trusted Root", &[0x07]))
        .unwrap();
    assert_eq!(manager.tls_context().unwrap().root_count(), 1);

    manager.delete_trusted_certificate(&alias).unwrap();
    assert_eq!(manager.tls_context().unwrap().root_count(), 0);
}

#[test]
fn test_first_run_seeds_from_default_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("cacerts.p12");
    write_trust_bundle(
        &bundle,
        "changeit",
        &[cert_der("Seed One", &[0x11]), cert_der("Seed Two", &[0x12])],
    );

    let config = CredentialConfig::new(dir.path().join("stores")).with_default_trust_bundle(&bundle);
    {
        let manager = open_with(config.clone(), Vec::new());
        assert_eq!(manager.aliases(StoreKind::Trust).len(), 2);
    }

    // Seeded entries were persisted, and an existing store is not re-seeded.
    std::fs::remove_file(&bundle).unwrap();
    let manager = open_with(config, Vec::new());
    assert_eq!(manager.aliases(StoreKind::Trust).len(), 2);
}

#[test]
fn test_seeding_uses_provider_password_after_known_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("cacerts.p12");
    write_trust_bundle(&bundle, "sekrit", &[cert_der("Seed", &[0x13])]);

    let config = CredentialConfig::new(dir.path().join("stores")).with_default_trust_bundle(&bundle);
    let manager = open_with(
        config,
        vec![Arc::new(StaticProvider::new().with_trust_password("sekrit"))],
    );
    assert_eq!(manager.aliases(StoreKind::Trust).len(), 1);
}

#[test]
fn test_missing_bundle_leaves_empty_trust_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = CredentialConfig::new(dir.path())
        .with_default_trust_bundle(dir.path().join("no-such-bundle.p12"));

    let manager = open_with(config, Vec::new());
    assert!(manager.aliases(StoreKind::Trust).is_empty());
}

#[test]
fn test_locked_bundle_leaves_empty_trust_store() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("cacerts.p12");
    write_trust_bundle(&bundle, "not-a-known-password", &[cert_der("Seed", &[0x14])]);

    let config = CredentialConfig::new(dir.path().join("stores")).with_default_trust_bundle(&bundle);
    let manager = open_with(config, Vec::new());
    assert!(manager.aliases(StoreKind::Trust).is_empty());
}
