#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};

use formula_agile_decrypt::block_keys;
use formula_agile_decrypt::crypto::{generate_iv, next_block_size, segment_block_key};
use formula_agile_decrypt::{
    ChainingMode, CipherAlgorithm, EncryptionHeader, EncryptionVerifier, HashAlgorithm,
    SEGMENT_SIZE,
};

pub const PASSWORD: &str = "Password1234_";

pub fn b64(s: &str) -> Vec<u8> {
    STANDARD.decode(s).expect("valid base64")
}

pub fn hex(s: &str) -> Vec<u8> {
    ::hex::decode(s).expect("valid hex")
}

pub fn verifier_salt() -> Vec<u8> {
    (0x00u8..0x10).collect()
}

pub fn key_salt() -> Vec<u8> {
    (0x10u8..0x20).collect()
}

/// Descriptor vectors generated independently (Python `hashlib` + `cryptography`) from known
/// salts, content key and integrity material. They are not taken from an Office-produced file.
pub struct Fixture {
    pub header: EncryptionHeader,
    pub verifier: EncryptionVerifier,
    pub content_key: Vec<u8>,
    pub hmac_key: Vec<u8>,
    pub hmac_value: Vec<u8>,
}

/// SHA-512 / AES-256 with Office's default spin count.
pub fn sha512_fixture() -> Fixture {
    Fixture {
        header: EncryptionHeader {
            hash_algorithm: HashAlgorithm::Sha512,
            cipher_algorithm: CipherAlgorithm::Aes,
            chaining_mode: ChainingMode::Cbc,
            block_size: 16,
            key_bits: 256,
            key_salt: key_salt(),
            encrypted_hmac_key: b64("Us4nzgEmy6yMiOcJTVdpSTrgB8EBj3c7xBaWrs7CV+Po7qPvQ5bIY69le9+BPiBGM5JJWryEBhXfsxHBMb7dwA=="),
            encrypted_hmac_value: b64("EVEXB/ccub+3tl9bwhF7aJiXUemTnSa/z0tcAzrgtjmJ1Dhl5ByJ9LdDgBz6ElBM0xNNfiCng+8SBn2QiaS5ew=="),
        },
        verifier: EncryptionVerifier {
            hash_algorithm: HashAlgorithm::Sha512,
            cipher_algorithm: CipherAlgorithm::Aes,
            chaining_mode: ChainingMode::Cbc,
            block_size: 16,
            key_bits: 256,
            salt: verifier_salt(),
            spin_count: 100_000,
            encrypted_verifier_hash_input: b64("SoybGkCFN6au+hFgplDdqg=="),
            encrypted_verifier_hash_value: b64("1PJd5z05ft5N+75YLIJ+dArX4rUX5VhqZpH6J2hw3GxBbY0c4OaVI1cf1Pbbu5n+PvNbcPydBUPpfAy2FeQ7tA=="),
            encrypted_key_value: b64("GZDcs25S4nN+fcCXrVqEAdT1zUJMGVun/FqSg1xRz44="),
            certificates: Vec::new(),
        },
        content_key: (0x40u8..0x60).collect(),
        hmac_key: hex("030a11181f262d343b424950575e656c737a81888f969da4abb2b9c0c7ced5dce3eaf1f8ff060d141b222930373e454c535a61686f767d848b9299a0a7aeb5bc"),
        hmac_value: hex("05121f2c394653606d7a8794a1aebbc8d5e2effc091623303d4a5764717e8b98a5b2bfccd9e6f3000d1a2734414e5b6875828f9ca9b6c3d0ddeaf704111e2b38"),
    }
}

/// SHA-1 / AES-128 with a short spin count.
pub fn sha1_fixture() -> Fixture {
    Fixture {
        header: EncryptionHeader {
            hash_algorithm: HashAlgorithm::Sha1,
            cipher_algorithm: CipherAlgorithm::Aes,
            chaining_mode: ChainingMode::Cbc,
            block_size: 16,
            key_bits: 128,
            key_salt: key_salt(),
            encrypted_hmac_key: b64("Af8HvwHqiOEFPkvtRv6fZWQkSRqEx5ynCFRN413vY3k="),
            encrypted_hmac_value: b64("g96UiEZYKbly8nFVsMjaE5CF0sTSfTYpXx44opERKGI="),
        },
        verifier: EncryptionVerifier {
            hash_algorithm: HashAlgorithm::Sha1,
            cipher_algorithm: CipherAlgorithm::Aes,
            chaining_mode: ChainingMode::Cbc,
            block_size: 16,
            key_bits: 128,
            salt: verifier_salt(),
            spin_count: 1000,
            encrypted_verifier_hash_input: b64("83JR2TQ2p3gvNcqQibdIRQ=="),
            encrypted_verifier_hash_value: b64("+RVXL3auD1JX+WvQlUNUDCmkDrC5ATgn8Cd4ztSukIM="),
            encrypted_key_value: b64("xy1Xr1axSv6kEzIM7Wh9Cg=="),
            certificates: Vec::new(),
        },
        content_key: (0x60u8..0x70).collect(),
        hmac_key: hex("0104070a0d101316191c1f2225282b2e3134373a"),
        hmac_value: hex("02070c11161b20252a2f34393e43484d52575c61"),
    }
}

/// SHA-1 / AES-256: every password-derived key is longer than the digest and carries `0x36` fill.
pub fn sha1_aes256_fixture() -> Fixture {
    Fixture {
        header: EncryptionHeader {
            hash_algorithm: HashAlgorithm::Sha1,
            cipher_algorithm: CipherAlgorithm::Aes,
            chaining_mode: ChainingMode::Cbc,
            block_size: 16,
            key_bits: 256,
            key_salt: key_salt(),
            encrypted_hmac_key: b64("02+mNhsdtopTjhK+Kk8dHPyLqpsydmwCA+v49c09RJY="),
            encrypted_hmac_value: b64("gAJeJNSAgH7mIqXXCVGWIEqzwPimZKKdo2wqeNCXbpA="),
        },
        verifier: EncryptionVerifier {
            hash_algorithm: HashAlgorithm::Sha1,
            cipher_algorithm: CipherAlgorithm::Aes,
            chaining_mode: ChainingMode::Cbc,
            block_size: 16,
            key_bits: 256,
            salt: verifier_salt(),
            spin_count: 1000,
            encrypted_verifier_hash_input: b64("UbJg9f1v5/NmgbrVR8iGPw=="),
            encrypted_verifier_hash_value: b64("/pnm1Sy4U4wgY1On0f5MBJi4EelyBQ/eSA1ylwOMUHM="),
            encrypted_key_value: b64("yOy39BrHp+BRm7Ws616SUiwamy/AtwV9g0iOhajuNeI="),
            certificates: Vec::new(),
        },
        content_key: (0x80u8..0xA0).collect(),
        hmac_key: hex("07121d28333e49545f6a75808b96a1acb7c2cdd8"),
        hmac_value: hex("091a2b3c4d5e6f8091a2b3c4d5e6f708192a3b4c"),
    }
}

pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i.wrapping_mul(31) ^ (i >> 3)) as u8)
        .collect()
}

/// AES-CBC encrypt a whole-block buffer in place.
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8], buf: &mut [u8]) {
    let len = buf.len();
    assert_eq!(len % 16, 0);
    match key.len() {
        16 => {
            cbc::Encryptor::<aes::Aes128>::new_from_slices(key, iv)
                .unwrap()
                .encrypt_padded_mut::<NoPadding>(buf, len)
                .unwrap();
        }
        24 => {
            cbc::Encryptor::<aes::Aes192>::new_from_slices(key, iv)
                .unwrap()
                .encrypt_padded_mut::<NoPadding>(buf, len)
                .unwrap();
        }
        32 => {
            cbc::Encryptor::<aes::Aes256>::new_from_slices(key, iv)
                .unwrap()
                .encrypt_padded_mut::<NoPadding>(buf, len)
                .unwrap();
        }
        other => panic!("unsupported AES key length {other}"),
    }
}

/// Build a full `EncryptedPackage` stream (size prefix + segments) for `plaintext`.
pub fn encrypt_package(
    header: &EncryptionHeader,
    content_key: &[u8],
    plaintext: &[u8],
    pad_byte: u8,
) -> Vec<u8> {
    let mut out = (plaintext.len() as u64).to_le_bytes().to_vec();
    for (index, chunk) in plaintext.chunks(SEGMENT_SIZE).enumerate() {
        let mut buf = chunk.to_vec();
        buf.resize(next_block_size(chunk.len(), header.block_size).unwrap(), pad_byte);
        let iv = generate_iv(
            header.hash_algorithm,
            &header.key_salt,
            Some(&segment_block_key(index as u32)),
            header.block_size,
        )
        .unwrap();
        aes_cbc_encrypt(content_key, &iv, &mut buf);
        out.extend_from_slice(&buf);
    }
    out
}

/// Encrypt `hmac_key`/`hmac_value` into `header`'s `dataIntegrity` fields.
pub fn set_integrity_fields(
    header: &mut EncryptionHeader,
    content_key: &[u8],
    hmac_key: &[u8],
    hmac_value: &[u8],
) {
    let encrypt = |block_key: &[u8], plain: &[u8]| {
        let iv = generate_iv(
            header.hash_algorithm,
            &header.key_salt,
            Some(block_key),
            header.block_size,
        )
        .unwrap();
        let mut buf = plain.to_vec();
        buf.resize(next_block_size(plain.len(), header.block_size).unwrap(), 0);
        aes_cbc_encrypt(content_key, &iv, &mut buf);
        buf
    };
    let encrypted_hmac_key = encrypt(&block_keys::INTEGRITY_HMAC_KEY, hmac_key);
    let encrypted_hmac_value = encrypt(&block_keys::INTEGRITY_HMAC_VALUE, hmac_value);
    header.encrypted_hmac_key = encrypted_hmac_key;
    header.encrypted_hmac_value = encrypted_hmac_value;
}
