//! Fixed 8-byte block keys from MS-OFFCRYPTO 2.3.4.11 - 2.3.4.14.
//!
//! Each Agile key or IV is scoped to a single purpose by hashing one of these constants after the
//! seed (password hash or key salt). Using the wrong constant for a field produces a key that
//! decrypts to garbage rather than an error, so every call site names its constant explicitly.

/// Key for decrypting `encryptedVerifierHashInput`.
pub const VERIFIER_HASH_INPUT: [u8; 8] = [0xFE, 0xA7, 0xD2, 0x76, 0x3B, 0x4B, 0x9E, 0x79];
/// Key for decrypting `encryptedVerifierHashValue`.
pub const VERIFIER_HASH_VALUE: [u8; 8] = [0xD7, 0xAA, 0x0F, 0x6D, 0x30, 0x61, 0x34, 0x4E];
/// Key for decrypting `encryptedKeyValue` (the package key).
pub const KEY_VALUE: [u8; 8] = [0x14, 0x6E, 0x0B, 0xE7, 0xAB, 0xAC, 0xD0, 0xD6];
/// IV suffix for decrypting `dataIntegrity/@encryptedHmacKey`.
pub const INTEGRITY_HMAC_KEY: [u8; 8] = [0x5F, 0xB2, 0xAD, 0x01, 0x0C, 0xB9, 0xE1, 0xF6];
/// IV suffix for decrypting `dataIntegrity/@encryptedHmacValue`.
pub const INTEGRITY_HMAC_VALUE: [u8; 8] = [0xA0, 0x67, 0x7F, 0x02, 0xB2, 0x2C, 0x84, 0x33];
