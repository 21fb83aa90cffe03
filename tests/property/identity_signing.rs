//! Property-based tests for identity derivation and message signing.
//!
//! Uses proptest to verify:
//! 1. Service id derivation is deterministic and always parses back.
//! 2. Signing the same canonical bytes twice verifies against the public key.
//! 3. Altering any byte of the canonical encoding invalidates the signature.
//! 4. Random bytes never panic the message decoder.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use ed25519_dalek::SigningKey;
use proptest::prelude::*;
use tchat_proto::identity::{SERVICE_ID_LEN, ServiceId, derive_service_id};
use tchat_proto::message::Message;
use tchat_proto::signing::{SignedMessage, sign, verify};

/// Strategy for generating arbitrary signing keys from 32-byte seeds.
fn arb_signing_key() -> impl Strategy<Value = SigningKey> {
    any::<[u8; 32]>().prop_map(|seed| SigningKey::from_bytes(&seed))
}

/// Strategy for message bodies, including multi-byte characters and newlines.
fn arb_content() -> impl Strategy<Value = String> {
    "[^\x00]{0,512}"
}

proptest! {
    #[test]
    fn service_id_is_deterministic(key in arb_signing_key()) {
        let public = key.verifying_key().to_bytes();
        let first = derive_service_id(&public).unwrap();
        let second = derive_service_id(&public).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.as_str().len(), SERVICE_ID_LEN);
    }

    #[test]
    fn service_id_parses_back_to_same_key(key in arb_signing_key()) {
        let id = ServiceId::from_verifying_key(&key.verifying_key());
        let parsed = ServiceId::parse(&id.onion_address()).unwrap();
        prop_assert_eq!(parsed.public_key().unwrap(), key.verifying_key());
    }

    #[test]
    fn repeated_signatures_verify(key in arb_signing_key(), content in arb_content()) {
        let id = ServiceId::from_verifying_key(&key.verifying_key());
        let bytes = Message::new(&id, content).to_canonical_json().unwrap();
        let a = sign(&key, &bytes);
        let b = sign(&key, &bytes);
        prop_assert!(verify(&key.verifying_key(), &bytes, &a).is_ok());
        prop_assert!(verify(&key.verifying_key(), &bytes, &b).is_ok());
    }

    #[test]
    fn any_altered_byte_breaks_signature(
        key in arb_signing_key(),
        content in arb_content(),
        index in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let id = ServiceId::from_verifying_key(&key.verifying_key());
        let mut bytes = Message::new(&id, content).to_canonical_json().unwrap();
        let sig = sign(&key, &bytes);
        let i = index.index(bytes.len());
        bytes[i] ^= flip;
        prop_assert!(verify(&key.verifying_key(), &bytes, &sig).is_err());
    }

    #[test]
    fn signed_form_fields_round_trip(key in arb_signing_key(), content in arb_content()) {
        let id = ServiceId::from_verifying_key(&key.verifying_key());
        let signed = SignedMessage::new(&key, Message::new(&id, content)).unwrap();
        let decoded = SignedMessage::decode(&signed.signature_b64(), &signed.message_b64()).unwrap();
        prop_assert_eq!(&decoded.message, &signed.message);
        prop_assert!(decoded.verify_author().is_ok());
    }

    #[test]
    fn random_bytes_never_panic_decoder(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = Message::from_json(&bytes);
    }
}
