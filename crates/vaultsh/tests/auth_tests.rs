//! Authentication strategy building against real key material.

mod support;

use russh::keys::PublicKey;
use support::read_fixture;
use vaultsh::{AuthConfigError, AuthStrategy, ConnectionTarget, build_auth_strategies};

const PASSPHRASE: &str = "correct horse battery";

fn public_key_of(strategy: &AuthStrategy) -> PublicKey {
    match strategy {
        AuthStrategy::PublicKey(key) => key.public_key().clone(),
        AuthStrategy::Password(_) => panic!("expected a key strategy"),
    }
}

fn fixture_public_key(name: &str) -> PublicKey {
    PublicKey::from_openssh(read_fixture(name).trim()).unwrap()
}

#[test]
fn plain_key() {
    let key = read_fixture("client_ed25519");
    let strategies = build_auth_strategies(Some(key.as_bytes()), None, None).unwrap();

    assert_eq!(strategies.len(), 1);
    assert_eq!(
        public_key_of(&strategies[0]).key_data(),
        fixture_public_key("client_ed25519.pub").key_data()
    );
}

#[test]
fn plain_key_ignores_passphrase() {
    let key = read_fixture("client_ed25519");
    let strategies = build_auth_strategies(Some(key.as_bytes()), Some("unused"), None).unwrap();
    assert!(strategies[0].is_public_key());
}

#[test]
fn encrypted_key_without_passphrase() {
    let key = read_fixture("client_encrypted_ed25519");
    let err = build_auth_strategies(Some(key.as_bytes()), None, Some("pw")).unwrap_err();
    assert!(matches!(err, AuthConfigError::ParseKey { .. }), "{err:?}");
}

#[test]
fn encrypted_key_with_wrong_passphrase() {
    let key = read_fixture("client_encrypted_ed25519");
    let err = build_auth_strategies(Some(key.as_bytes()), Some("wrong"), None).unwrap_err();
    assert!(matches!(err, AuthConfigError::ParseKeyWithPassphrase { .. }), "{err:?}");
    assert!(err.to_string().starts_with("failed to parse private key with passphrase"));
}

#[test]
fn encrypted_key_with_passphrase() {
    let key = read_fixture("client_encrypted_ed25519");
    let strategies = build_auth_strategies(Some(key.as_bytes()), Some(PASSPHRASE), None).unwrap();
    assert_eq!(
        public_key_of(&strategies[0]).key_data(),
        fixture_public_key("client_encrypted_ed25519.pub").key_data()
    );
}

#[test]
fn key_is_offered_before_password() {
    let key = read_fixture("client_ed25519");
    let strategies = build_auth_strategies(Some(key.as_bytes()), None, Some("pw")).unwrap();

    let methods: Vec<_> = strategies.iter().map(AuthStrategy::method).collect();
    assert_eq!(methods, ["publickey", "password"]);
}

#[test]
fn strategies_from_target() {
    let key = read_fixture("client_encrypted_ed25519");
    let target = ConnectionTarget::new(
        "10.0.0.5:22",
        "ops",
        Some("pw".into()),
        Some(key.into_bytes()),
        Some(PASSPHRASE.into()),
    )
    .unwrap();

    let strategies = target.auth_strategies().unwrap();
    assert_eq!(strategies.len(), 2);
    assert!(strategies[0].is_public_key());
    assert!(strategies[1].is_password());

    let debug = format!("{target:?}");
    assert!(!debug.contains("OPENSSH PRIVATE KEY"));
    assert!(!debug.contains(PASSPHRASE));
}
