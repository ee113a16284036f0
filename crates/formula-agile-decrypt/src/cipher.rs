//! Block cipher configuration and AES-CBC decryption.
//!
//! Agile encryption only ever pairs AES with `ChainingModeCBC` in files Office produces. Every
//! encrypted field and every `EncryptedPackage` segment is a whole number of AES blocks; the
//! meaningful length of the plaintext is always known from elsewhere in the format.

use crate::crypto::next_block_size;
use aes::{Aes128, Aes192, Aes256};
use cbc::Decryptor;
use cipher::block_padding::NoPadding;
use cipher::{BlockDecryptMut, KeyIvInit};
use thiserror::Error;
use zeroize::Zeroizing;

pub const AES_BLOCK_SIZE: usize = 16;

/// `cipherAlgorithm` values this crate can decrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherAlgorithm {
    Aes,
}

impl CipherAlgorithm {
    pub fn parse_offcrypto_name(name: &str) -> Result<Self, CipherError> {
        if name.trim().eq_ignore_ascii_case("AES") {
            Ok(Self::Aes)
        } else {
            Err(CipherError::UnsupportedCipherAlgorithm(name.trim().to_string()))
        }
    }

    pub fn block_size(self) -> usize {
        match self {
            CipherAlgorithm::Aes => AES_BLOCK_SIZE,
        }
    }

    /// Whether `key_bits` is a key size this algorithm accepts.
    pub fn supports_key_bits(self, key_bits: usize) -> bool {
        match self {
            CipherAlgorithm::Aes => matches!(key_bits, 128 | 192 | 256),
        }
    }
}

/// `cipherChaining` values this crate can decrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainingMode {
    Cbc,
}

impl ChainingMode {
    pub fn parse_offcrypto_name(name: &str) -> Result<Self, CipherError> {
        match name.trim() {
            "ChainingModeCBC" => Ok(Self::Cbc),
            other => Err(CipherError::UnsupportedChainingMode(other.to_string())),
        }
    }
}

/// How the tail of a decrypted buffer is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentPadding {
    /// Every decrypted byte is plaintext.
    None,
    /// Only the first `plaintext_len` decrypted bytes are plaintext; the rest is writer padding
    /// with arbitrary content and is discarded.
    Trailing { plaintext_len: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("unsupported cipher algorithm: {0}")]
    UnsupportedCipherAlgorithm(String),
    #[error("unsupported chaining mode: {0}")]
    UnsupportedChainingMode(String),
    #[error("unsupported AES key length: {0} bytes (expected 16, 24, or 32)")]
    UnsupportedKeyLength(usize),
    #[error("invalid AES-CBC IV length: {0} bytes (expected 16)")]
    InvalidIvLength(usize),
    #[error("ciphertext length is not a multiple of 16 bytes: {0}")]
    InvalidCiphertextLength(usize),
    #[error("declared plaintext length {plaintext_len} exceeds decrypted length {decrypted_len}")]
    PaddingOverrun {
        plaintext_len: usize,
        decrypted_len: usize,
    },
}

/// A CBC decryptor keyed and initialized for exactly one buffer.
///
/// Construction binds the key and IV; [`CbcDecryptor::decrypt`] consumes it, so a segment's cipher
/// state can never leak into the next segment.
pub(crate) enum CbcDecryptor {
    Aes128(Decryptor<Aes128>),
    Aes192(Decryptor<Aes192>),
    Aes256(Decryptor<Aes256>),
}

impl CbcDecryptor {
    pub(crate) fn new(
        algorithm: CipherAlgorithm,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Self, CipherError> {
        let CipherAlgorithm::Aes = algorithm;
        if iv.len() != AES_BLOCK_SIZE {
            return Err(CipherError::InvalidIvLength(iv.len()));
        }
        // IV length is checked above, so `InvalidLength` can only mean the key.
        let bad_key = |_| CipherError::UnsupportedKeyLength(key.len());
        Ok(match key.len() {
            16 => Self::Aes128(Decryptor::new_from_slices(key, iv).map_err(bad_key)?),
            24 => Self::Aes192(Decryptor::new_from_slices(key, iv).map_err(bad_key)?),
            32 => Self::Aes256(Decryptor::new_from_slices(key, iv).map_err(bad_key)?),
            other => return Err(CipherError::UnsupportedKeyLength(other)),
        })
    }

    /// Decrypt `buf` in place and return how many leading bytes are plaintext.
    pub(crate) fn decrypt(self, buf: &mut [u8], padding: SegmentPadding) -> Result<usize, CipherError> {
        let buf_len = buf.len();
        if buf_len % AES_BLOCK_SIZE != 0 {
            return Err(CipherError::InvalidCiphertextLength(buf_len));
        }
        if let SegmentPadding::Trailing { plaintext_len } = padding {
            if plaintext_len > buf_len {
                return Err(CipherError::PaddingOverrun {
                    plaintext_len,
                    decrypted_len: buf_len,
                });
            }
        }

        if buf_len > 0 {
            let not_aligned = |_| CipherError::InvalidCiphertextLength(buf_len);
            match self {
                Self::Aes128(dec) => dec.decrypt_padded_mut::<NoPadding>(buf).map_err(not_aligned)?,
                Self::Aes192(dec) => dec.decrypt_padded_mut::<NoPadding>(buf).map_err(not_aligned)?,
                Self::Aes256(dec) => dec.decrypt_padded_mut::<NoPadding>(buf).map_err(not_aligned)?,
            };
        }

        Ok(match padding {
            SegmentPadding::None => buf_len,
            SegmentPadding::Trailing { plaintext_len } => plaintext_len,
        })
    }
}

/// Decrypt a whole-block AES-CBC buffer in place, keeping every byte.
pub fn decrypt_cbc_in_place(
    algorithm: CipherAlgorithm,
    key: &[u8],
    iv: &[u8],
    buf: &mut [u8],
) -> Result<(), CipherError> {
    CbcDecryptor::new(algorithm, key, iv)?.decrypt(buf, SegmentPadding::None)?;
    Ok(())
}

/// Decrypt a descriptor field (verifier blobs, wrapped keys, integrity fields).
///
/// The ciphertext is zero-extended to whole blocks (at least one) before decryption, so short
/// fields written by lenient producers still decrypt.
pub(crate) fn decrypt_field(
    algorithm: CipherAlgorithm,
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CipherError> {
    let fill = next_block_size(ciphertext.len(), algorithm.block_size())
        .map_err(|_| CipherError::InvalidCiphertextLength(ciphertext.len()))?;
    let mut buf = Zeroizing::new(ciphertext.to_vec());
    buf.resize(fill, 0);
    decrypt_cbc_in_place(algorithm, key, iv, &mut buf)?;
    Ok(buf)
}
