use super::*;
use crate::tests::test_util::setup;

#[test]
fn token_is_64_hex_chars() {
    setup();
    let token = generate_token();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn tokens_are_unique() {
    assert_ne!(generate_token(), generate_token());
}

#[test]
fn password_hash_verifies() {
    setup();
    let hash = hash_password("hunter2").expect("hash");
    assert!(verify_password("hunter2", &hash));
    assert!(!verify_password("hunter3", &hash));
}

#[test]
fn verify_rejects_garbage_hash() {
    assert!(!verify_password("hunter2", "not-a-phc-string"));
}
