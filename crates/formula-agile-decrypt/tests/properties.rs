mod common;

use std::io::Read;

use proptest::prelude::*;

use common::*;
use formula_agile_decrypt::block_keys;
use formula_agile_decrypt::crypto::{derive_key, generate_iv, segment_block_key};
use formula_agile_decrypt::{AgileDecryptError, DecryptionSession, HashAlgorithm};

fn any_hash() -> impl Strategy<Value = HashAlgorithm> {
    prop_oneof![
        Just(HashAlgorithm::Sha1),
        Just(HashAlgorithm::Sha256),
        Just(HashAlgorithm::Sha384),
        Just(HashAlgorithm::Sha512),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 0,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_derive_key_is_deterministic_and_input_sensitive(
        hash in any_hash(),
        seed in proptest::collection::vec(any::<u8>(), 1..64),
        flip in any::<prop::sample::Index>(),
        key_len in 16usize..=64,
    ) {
        let a = derive_key(&seed, &block_keys::KEY_VALUE, key_len, hash).unwrap();
        let b = derive_key(&seed, &block_keys::KEY_VALUE, key_len, hash).unwrap();
        prop_assert_eq!(a.as_slice(), b.as_slice());
        prop_assert_eq!(a.len(), key_len);

        let mut changed = seed.clone();
        changed[flip.index(seed.len())] ^= 0x01;
        let c = derive_key(&changed, &block_keys::KEY_VALUE, key_len, hash).unwrap();
        prop_assert_ne!(a.as_slice(), c.as_slice());

        let d = derive_key(&seed, &block_keys::VERIFIER_HASH_INPUT, key_len, hash).unwrap();
        prop_assert_ne!(a.as_slice(), d.as_slice());
    }

    #[test]
    fn prop_iv_is_exactly_block_size(
        hash in any_hash(),
        salt in proptest::collection::vec(any::<u8>(), 1..64),
        block_key in proptest::option::of(proptest::collection::vec(any::<u8>(), 1..16)),
        block_size in 1usize..=128,
    ) {
        let iv = generate_iv(hash, &salt, block_key.as_deref(), block_size).unwrap();
        prop_assert_eq!(iv.len(), block_size);
        let meaningful = match block_key {
            Some(_) => hash.digest_len(),
            None => salt.len(),
        };
        if block_size > meaningful {
            prop_assert!(iv[meaningful..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn prop_segment_ivs_are_distinct(
        hash in any_hash(),
        salt in proptest::collection::vec(any::<u8>(), 1..32),
        a in 0u32..100_000,
        b in 0u32..100_000,
    ) {
        prop_assume!(a != b);
        let iv_a = generate_iv(hash, &salt, Some(&segment_block_key(a)), 16).unwrap();
        let iv_b = generate_iv(hash, &salt, Some(&segment_block_key(b)), 16).unwrap();
        prop_assert_ne!(iv_a, iv_b);
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        max_shrink_iters: 0,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_stream_round_trip(
        plaintext in proptest::collection::vec(any::<u8>(), 0..=20_000),
        read_size in 1usize..=6000,
        pad_byte in any::<u8>(),
    ) {
        let fixture = sha1_fixture();
        let package = encrypt_package(&fixture.header, &fixture.content_key, &plaintext, pad_byte);
        let mut session = DecryptionSession::new(fixture.header, fixture.verifier);
        prop_assert!(session.verify_password(PASSWORD).unwrap());

        let mut reader = session.open_decrypted_stream(package.as_slice()).unwrap();
        let mut out = Vec::new();
        let mut buf = vec![0u8; read_size];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            prop_assert!(n <= 4096);
            out.extend_from_slice(&buf[..n]);
        }
        prop_assert_eq!(out.len() as u64, session.plaintext_length().unwrap());
        prop_assert_eq!(out, plaintext);
    }

    #[test]
    fn prop_truncated_package_fails_cleanly(
        plaintext in proptest::collection::vec(any::<u8>(), 1..=12_000),
        cut in any::<prop::sample::Index>(),
    ) {
        let fixture = sha1_fixture();
        let package = encrypt_package(&fixture.header, &fixture.content_key, &plaintext, 0);
        // Keep the size prefix, drop at least one ciphertext byte.
        let ciphertext_len = package.len() - 8;
        let keep = 8 + cut.index(ciphertext_len);
        let mut session = DecryptionSession::new(fixture.header, fixture.verifier);
        prop_assert!(session.verify_password(PASSWORD).unwrap());

        let err = session.decrypt_to_vec(&package[..keep]).unwrap_err();
        let is_decryption_failure = matches!(err, AgileDecryptError::DecryptionFailed { .. });
        prop_assert!(is_decryption_failure, "unexpected error: {:?}", err);
    }
}
