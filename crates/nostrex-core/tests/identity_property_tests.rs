//! Property-based tests for the identity codec
//!
//! These tests verify that normalization is idempotent across the two
//! encodings and that no input, however malformed, makes the codec panic.

use nostr_sdk::{Keys, SecretKey, ToBech32};
use nostrex_core::{encode, normalize, try_normalize, Identity, PublicKeyHex};
use proptest::prelude::*;

/// Generate arbitrary valid key pairs
fn arb_keys() -> impl Strategy<Value = Keys> {
    any::<[u8; 32]>()
        .prop_filter_map("valid secret key", |bytes| SecretKey::from_slice(&bytes).ok())
        .prop_map(Keys::new)
}

proptest! {
    /// Property: hex -> npub -> hex is the identity on valid keys
    #[test]
    fn encode_then_normalize_is_stable(keys in arb_keys()) {
        let hex = keys.public_key().to_hex();
        let raw = normalize(&hex);
        prop_assert_eq!(raw.as_str(), hex.as_str());

        let npub = encode(&raw).unwrap();
        prop_assert_eq!(normalize(&npub), raw);
    }

    /// Property: both encodings of a key produce equal identities
    #[test]
    fn npub_and_hex_parse_to_same_identity(keys in arb_keys()) {
        let npub = keys.public_key().to_bech32().unwrap();
        let hex = keys.public_key().to_hex();

        let a = Identity::parse(&npub).unwrap();
        let b = Identity::parse(&hex.to_uppercase()).unwrap();
        prop_assert_eq!(a.raw(), b.raw());
        prop_assert_eq!(a.encoded(), b.encoded());
    }

    /// Property: arbitrary strings never panic and never yield a half-valid key
    #[test]
    fn arbitrary_input_is_canonical_or_empty(input in ".{0,120}") {
        let result = normalize(&input);
        if !result.is_empty() {
            prop_assert_eq!(result.as_str().len(), 64);
            prop_assert!(result.as_str().bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')));
        }
    }

    /// Property: npub-shaped garbage is rejected, not decoded
    #[test]
    fn npub_prefixed_garbage_is_rejected(tail in "[a-z0-9]{0,70}") {
        let input = format!("npub1{}", tail);
        if let Ok(key) = try_normalize(&input) {
            // Astronomically unlikely, but a valid checksum is a valid key
            prop_assert_eq!(normalize(&encode(&key).unwrap()), key);
        } else {
            prop_assert_eq!(normalize(&input), PublicKeyHex::empty());
        }
    }
}
