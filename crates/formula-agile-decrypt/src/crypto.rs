//! Hashing, key derivation and IV generation for MS-OFFCRYPTO Agile encryption.
//!
//! Every Agile key and IV is produced by one of two shapes:
//!
//! - key: `resize(Hash(seed || blockKey), keyLen)` where the seed is the iterated password hash
//! - IV: `resize(Hash(salt || blockKey), blockSize)`, or `resize(salt, blockSize)` when no block
//!   key is involved (the password verifier fields)
//!
//! When the digest is shorter than the target, keys are extended with `0x36` bytes and IVs with
//! `0x00` bytes; longer digests are truncated.
//!
//! References:
//! - MS-OFFCRYPTO 2.3.4.11 (encryption key generation)
//! - MS-OFFCRYPTO 2.3.4.12 (initialization vector generation)

use digest::Digest as _;
use hmac::{Hmac, Mac as _};
use zeroize::Zeroizing;

/// Hash algorithm identifiers accepted in Agile `hashAlgorithm` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Parse a hash algorithm name as written in the encryption descriptor.
    ///
    /// Office writes `SHA1`/`SHA512`; casing and `-`/`_` separators are tolerated.
    pub fn parse_offcrypto_name(name: &str) -> Result<Self, CryptoError> {
        let normalized = name.trim().to_ascii_lowercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(CryptoError::UnsupportedHashAlgorithm(name.trim().to_string())),
        }
    }

    pub fn as_offcrypto_name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha384 => "SHA384",
            HashAlgorithm::Sha512 => "SHA512",
        }
    }

    /// Output size of the hash in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        self.digest_parts(&[data])
    }

    fn digest_parts(self, parts: &[&[u8]]) -> Vec<u8> {
        fn run<D: digest::Digest>(parts: &[&[u8]]) -> Vec<u8> {
            let mut h = D::new();
            for part in parts {
                h.update(part);
            }
            h.finalize().to_vec()
        }

        match self {
            HashAlgorithm::Sha1 => run::<sha1::Sha1>(parts),
            HashAlgorithm::Sha256 => run::<sha2::Sha256>(parts),
            HashAlgorithm::Sha384 => run::<sha2::Sha384>(parts),
            HashAlgorithm::Sha512 => run::<sha2::Sha512>(parts),
        }
    }

    /// One-shot HMAC keyed with `key` over `data`.
    pub fn hmac(self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut mac = HmacState::new(self, key)?;
        mac.update(data);
        Ok(mac.finalize())
    }
}

/// Incremental HMAC over one of the supported hash algorithms.
///
/// Used when the authenticated data is a stream (the `EncryptedPackage` integrity check).
pub(crate) enum HmacState {
    Sha1(Hmac<sha1::Sha1>),
    Sha256(Hmac<sha2::Sha256>),
    Sha384(Hmac<sha2::Sha384>),
    Sha512(Hmac<sha2::Sha512>),
}

impl HmacState {
    pub(crate) fn new(hash_alg: HashAlgorithm, key: &[u8]) -> Result<Self, CryptoError> {
        // HMAC accepts keys of any length; the error arm is unreachable in practice.
        let invalid = |_| CryptoError::InvalidParameter("invalid HMAC key length");
        Ok(match hash_alg {
            HashAlgorithm::Sha1 => Self::Sha1(Hmac::new_from_slice(key).map_err(invalid)?),
            HashAlgorithm::Sha256 => Self::Sha256(Hmac::new_from_slice(key).map_err(invalid)?),
            HashAlgorithm::Sha384 => Self::Sha384(Hmac::new_from_slice(key).map_err(invalid)?),
            HashAlgorithm::Sha512 => Self::Sha512(Hmac::new_from_slice(key).map_err(invalid)?),
        })
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(mac) => mac.update(data),
            Self::Sha256(mac) => mac.update(data),
            Self::Sha384(mac) => mac.update(data),
            Self::Sha512(mac) => mac.update(data),
        }
    }

    pub(crate) fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha1(mac) => mac.finalize().into_bytes().to_vec(),
            Self::Sha256(mac) => mac.finalize().into_bytes().to_vec(),
            Self::Sha384(mac) => mac.finalize().into_bytes().to_vec(),
            Self::Sha512(mac) => mac.finalize().into_bytes().to_vec(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
}

fn password_utf16le_bytes(password: &str) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(Vec::with_capacity(password.len().saturating_mul(2)));
    for unit in password.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// Fill byte for keys longer than the digest (MS-OFFCRYPTO 2.3.4.11).
const KEY_PAD_BYTE: u8 = 0x36;

/// Truncate `bytes` to `len`, or extend it with `fill`.
fn resize_padded(mut bytes: Vec<u8>, len: usize, fill: u8) -> Vec<u8> {
    bytes.resize(len, fill);
    bytes
}

/// Iterated password hash (MS-OFFCRYPTO 2.3.4.11).
///
/// `H0 = Hash(salt || UTF16LE(password))`, then `Hn = Hash(LE32(n - 1) || Hn-1)` for
/// `spin_count` rounds: the hash function runs `spin_count + 1` times in total.
pub fn hash_password(
    password: &str,
    salt: &[u8],
    spin_count: u32,
    hash_alg: HashAlgorithm,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if salt.is_empty() {
        return Err(CryptoError::InvalidParameter("salt must be non-empty"));
    }

    let pw = password_utf16le_bytes(password);
    let mut h = Zeroizing::new(hash_alg.digest_parts(&[salt, pw.as_slice()]));
    for i in 0..spin_count {
        let next = Zeroizing::new(hash_alg.digest_parts(&[&i.to_le_bytes()[..], h.as_slice()]));
        // Overwrite in place so the previous round never lingers in a dropped buffer.
        h.copy_from_slice(&next);
    }
    Ok(h)
}

/// Derive a `key_len`-byte key from a password hash and a block key.
///
/// `resize(Hash(seed || block_key), key_len)`. Keys longer than the digest (SHA-1 with AES-192 or
/// AES-256) are padded with `0x36`.
pub fn derive_key(
    seed: &[u8],
    block_key: &[u8],
    key_len: usize,
    hash_alg: HashAlgorithm,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if seed.is_empty() {
        return Err(CryptoError::InvalidParameter("password hash must be non-empty"));
    }
    if block_key.is_empty() {
        return Err(CryptoError::InvalidParameter("block key must be non-empty"));
    }
    if key_len == 0 {
        return Err(CryptoError::InvalidParameter("key length must be non-zero"));
    }

    let digest = hash_alg.digest_parts(&[seed, block_key]);
    Ok(Zeroizing::new(resize_padded(digest, key_len, KEY_PAD_BYTE)))
}

/// Generate a `block_size`-byte IV.
///
/// With a block key the IV is `resize(Hash(salt || block_key), block_size)`; without one the salt
/// itself is resized.
pub fn generate_iv(
    hash_alg: HashAlgorithm,
    salt: &[u8],
    block_key: Option<&[u8]>,
    block_size: usize,
) -> Result<Vec<u8>, CryptoError> {
    if salt.is_empty() {
        return Err(CryptoError::InvalidParameter("salt must be non-empty"));
    }
    if block_size == 0 {
        return Err(CryptoError::InvalidParameter("block size must be non-zero"));
    }

    let iv = match block_key {
        Some(block_key) => hash_alg.digest_parts(&[salt, block_key]),
        None => salt.to_vec(),
    };
    Ok(resize_padded(iv, block_size, 0))
}

/// Block key for `EncryptedPackage` segment `segment_index`: `LE32(segment_index)`.
#[inline]
pub fn segment_block_key(segment_index: u32) -> [u8; 4] {
    segment_index.to_le_bytes()
}

/// Smallest multiple of `block_size` that can hold `len` bytes, never less than one block.
///
/// Lengths that are already a multiple are returned unchanged.
pub fn next_block_size(len: usize, block_size: usize) -> Result<usize, CryptoError> {
    if block_size == 0 {
        return Err(CryptoError::InvalidParameter("block size must be non-zero"));
    }
    let blocks = len.div_ceil(block_size).max(1);
    blocks
        .checked_mul(block_size)
        .ok_or(CryptoError::InvalidParameter("length overflows when rounded to a block"))
}
