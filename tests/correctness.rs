use serde_json::Value;
use sha2::{Digest, Sha256};

use magic_link::claims::app_keys;
use magic_link::clock::FixedClock;
use magic_link::encoding::base64url_encode;
use magic_link::nonce::InMemoryNonceStore;
use magic_link::{CreateOptions, Key, KeySet, LinkBuilder, Reason, RequestContext, Verifier, VerifyOptions};

fn keys() -> KeySet {
    let mut keys = KeySet::new();
    keys.add(Key::new("k1", vec![5u8; 32], 1000, None).unwrap());
    keys
}

#[test]
fn issue_then_verify_round_trip_succeeds() {
    let keys = keys();
    let clock = FixedClock(1_700_000_000);
    let builder = LinkBuilder::new(&keys, &clock);
    let token = builder
        .issue(
            "user-1",
            &CreateOptions {
                aud: Some("signin".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    let nonce_store = InMemoryNonceStore::new();
    let verifier = Verifier::new(&keys, &clock, &nonce_store);
    let options = VerifyOptions {
        expected_aud: Some("signin".to_string()),
        ..Default::default()
    };
    let claims = verifier
        .verify(&token, &options, &RequestContext::default())
        .unwrap();
    assert_eq!(claims.sub, "user-1");
}

#[test]
fn create_url_and_verify_from_request_round_trip() {
    let keys = keys();
    let clock = FixedClock(1_700_000_000);
    let builder = LinkBuilder::new(&keys, &clock);
    let token = builder.issue("user-2", &CreateOptions::default()).unwrap();
    let url = LinkBuilder::<FixedClock>::create_url("https://app.test/auth/callback?foo=bar", &token, "ml").unwrap();

    let nonce_store = InMemoryNonceStore::new();
    let verifier = Verifier::new(&keys, &clock, &nonce_store);
    let claims = verifier
        .verify_from_request(&url, "ml", &VerifyOptions::default(), RequestContext::default())
        .unwrap();
    assert_eq!(claims.sub, "user-2");
}

#[test]
fn key_rotation_keeps_old_tokens_verifiable() {
    let mut keys = KeySet::new();
    keys.add(Key::new("old", vec![1u8; 32], 1000, None).unwrap());
    let clock_at_issue = FixedClock(1000);
    let builder = LinkBuilder::new(&keys, &clock_at_issue);
    let token = builder
        .issue(
            "user-3",
            &CreateOptions {
                ttl_seconds: Some(10_000),
                ..Default::default()
            },
        )
        .unwrap();

    // Rotate in a newer key; the old key stays present for lookup.
    keys.add(Key::new("new", vec![2u8; 32], 5000, None).unwrap());

    let nonce_store = InMemoryNonceStore::new();
    let verify_clock = FixedClock(2000);
    let verifier = Verifier::new(&keys, &verify_clock, &nonce_store);
    let claims = verifier
        .verify(&token, &VerifyOptions::default(), &RequestContext::default())
        .unwrap();
    assert_eq!(claims.sub, "user-3");

    // New issuance now prefers the newer key.
    let builder_after_rotation = LinkBuilder::new(&keys, &verify_clock);
    let newer_token = builder_after_rotation
        .issue("user-4", &CreateOptions::default())
        .unwrap();
    let header_b64 = newer_token.split('.').next().unwrap();
    let header_json = magic_link::encoding::base64url_decode(header_b64).unwrap();
    let header: Value = serde_json::from_slice(&header_json).unwrap();
    assert_eq!(header["kid"], "new");
}

#[cfg(feature = "aead")]
#[test]
fn encrypted_payload_round_trips() {
    let mut keys = KeySet::new();
    keys.add(Key::new("enc", vec![3u8; 32], 1000, None).unwrap());
    let clock = FixedClock(1000);
    let builder = LinkBuilder::new(&keys, &clock);
    let token = builder
        .issue(
            "user-5",
            &CreateOptions {
                encrypt_payload: true,
                ..Default::default()
            },
        )
        .unwrap();

    // The payload segment must not be plain JSON: it decodes to an AEAD
    // envelope, not directly to claims.
    let payload_b64 = token.split('.').nth(1).unwrap();
    let payload = magic_link::encoding::base64url_decode(payload_b64).unwrap();
    let value: Value = serde_json::from_slice(&payload).unwrap();
    assert!(value.get("ct").is_some());
    assert!(value.get("sub").is_none());

    let nonce_store = InMemoryNonceStore::new();
    let verifier = Verifier::new(&keys, &clock, &nonce_store);
    let claims = verifier
        .verify(&token, &VerifyOptions::default(), &RequestContext::default())
        .unwrap();
    assert_eq!(claims.sub, "user-5");
}

#[test]
fn full_context_binding_scenario_from_design_table() {
    let mut keys = KeySet::new();
    keys.add(Key::new("int", vec![b'I'; 32], 1000, None).unwrap());
    let clock = FixedClock(1000);
    let builder = LinkBuilder::new(&keys, &clock);

    let mut app = serde_json::Map::new();
    app.insert(
        app_keys::UA_HASH.to_string(),
        Value::String(base64url_encode(Sha256::digest(b"Integration-UA/1.0"))),
    );
    let options = CreateOptions {
        aud: Some("signin".to_string()),
        ttl_seconds: Some(600),
        path_bind: Some("/login".to_string()),
        return_to: Some("https://app.test/dashboard".to_string()),
        app,
        ..Default::default()
    };
    let token = builder.issue("user-42", &options).unwrap();

    let nonce_store = InMemoryNonceStore::new();
    let verifier = Verifier::new(&keys, &clock, &nonce_store);
    let verify_options = VerifyOptions {
        expected_aud: Some("signin".to_string()),
        expected_path: Some("/login".to_string()),
        expected_host: Some("example.test".to_string()),
        enforce_ua_hash: true,
        return_to_allowlist: Some(&|url: &str| url.starts_with("https://app.test")),
        ..Default::default()
    };
    let context = RequestContext {
        path: Some("/login".to_string()),
        host: Some("example.test".to_string()),
        user_agent: Some("Integration-UA/1.0".to_string()),
    };
    let claims = verifier.verify(&token, &verify_options, &context).unwrap();
    assert_eq!(claims.sub, "user-42");
}

#[test]
fn replayed_token_is_reported_exactly_once() {
    let keys = keys();
    let clock = FixedClock(1000);
    let builder = LinkBuilder::new(&keys, &clock);
    let token = builder.issue("user-6", &CreateOptions::default()).unwrap();

    let nonce_store = InMemoryNonceStore::new();
    let verifier = Verifier::new(&keys, &clock, &nonce_store);
    assert!(verifier
        .verify(&token, &VerifyOptions::default(), &RequestContext::default())
        .is_ok());
    let second = verifier.verify(&token, &VerifyOptions::default(), &RequestContext::default());
    assert_eq!(second.unwrap_err(), Reason::Replayed);
    let third = verifier.verify(&token, &VerifyOptions::default(), &RequestContext::default());
    assert_eq!(third.unwrap_err(), Reason::Replayed);
}

#[test]
fn multi_use_token_never_consumes_the_nonce_store() {
    let keys = keys();
    let clock = FixedClock(1000);
    let builder = LinkBuilder::new(&keys, &clock);
    let token = builder
        .issue(
            "user-7",
            &CreateOptions {
                one_time: false,
                ..Default::default()
            },
        )
        .unwrap();

    let nonce_store = InMemoryNonceStore::new();
    let verifier = Verifier::new(&keys, &clock, &nonce_store);
    for _ in 0..3 {
        assert!(verifier
            .verify(&token, &VerifyOptions::default(), &RequestContext::default())
            .is_ok());
    }
}
