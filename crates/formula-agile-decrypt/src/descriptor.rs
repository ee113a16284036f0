//! Structured encryption parameters consumed by the decryption core.
//!
//! These mirror the `<keyData>`/`<dataIntegrity>` element (the header) and the key encryptors
//! (the verifier) of an Agile `EncryptionInfo` descriptor. They are plain data: the XML adapter in
//! [`crate::encryption_info`] is one way to build them, callers holding already-parsed parameters
//! can construct them directly.

use crate::cipher::{ChainingMode, CipherAlgorithm};
use crate::crypto::HashAlgorithm;
use crate::error::{AgileDecryptError, Result};
use crate::options::DecryptOptions;

/// Package-level parameters: how `EncryptedPackage` segments and integrity fields are protected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionHeader {
    pub hash_algorithm: HashAlgorithm,
    pub cipher_algorithm: CipherAlgorithm,
    pub chaining_mode: ChainingMode,
    /// Cipher block size in bytes.
    pub block_size: usize,
    /// Package key size in bits.
    pub key_bits: usize,
    /// `keyData/@saltValue`; seeds every segment IV and both integrity IVs.
    pub key_salt: Vec<u8>,
    pub encrypted_hmac_key: Vec<u8>,
    pub encrypted_hmac_value: Vec<u8>,
}

impl EncryptionHeader {
    /// Package key length in bytes.
    pub fn key_len(&self) -> usize {
        self.key_bits / 8
    }

    pub fn validate(&self) -> Result<()> {
        validate_cipher(
            self.cipher_algorithm,
            self.block_size,
            self.key_bits,
        )?;
        if self.key_salt.is_empty() {
            return Err(AgileDecryptError::InvalidParameter {
                param: "keyData saltValue must be non-empty",
            });
        }
        if self.key_salt.len() < self.block_size {
            log::warn!(
                "keyData salt is {} bytes, shorter than the {}-byte block size",
                self.key_salt.len(),
                self.block_size
            );
        }
        check_block_aligned("encryptedHmacKey", &self.encrypted_hmac_key, self.block_size)?;
        check_block_aligned("encryptedHmacValue", &self.encrypted_hmac_value, self.block_size)?;
        Ok(())
    }
}

/// One certificate key encryptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateEntry {
    /// DER encoding of the recipient's X.509 certificate.
    pub certificate_der: Vec<u8>,
    /// Package key wrapped with the certificate's RSA public key (PKCS#1 v1.5).
    pub encrypted_key_value: Vec<u8>,
    /// `HMAC(packageKey, certificate_der)` using the header hash algorithm.
    pub cert_verifier: Vec<u8>,
}

/// Credential-level parameters: the password key encryptor plus any certificate key encryptors.
///
/// When a document only carries certificate encryptors the password fields are empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionVerifier {
    pub hash_algorithm: HashAlgorithm,
    pub cipher_algorithm: CipherAlgorithm,
    pub chaining_mode: ChainingMode,
    pub block_size: usize,
    /// Size in bits of the keys derived from the password hash.
    pub key_bits: usize,
    pub salt: Vec<u8>,
    pub spin_count: u32,
    pub encrypted_verifier_hash_input: Vec<u8>,
    pub encrypted_verifier_hash_value: Vec<u8>,
    pub encrypted_key_value: Vec<u8>,
    pub certificates: Vec<CertificateEntry>,
}

impl EncryptionVerifier {
    pub fn has_password_key_encryptor(&self) -> bool {
        !self.encrypted_key_value.is_empty()
    }

    /// Validate the password key encryptor before any password hashing.
    pub fn validate_password(&self, options: &DecryptOptions) -> Result<()> {
        if !self.has_password_key_encryptor() {
            return Err(AgileDecryptError::MissingKeyEncryptor { kind: "password" });
        }
        validate_cipher(self.cipher_algorithm, self.block_size, self.key_bits)?;
        if self.spin_count > options.max_spin_count {
            return Err(AgileDecryptError::SpinCountTooLarge {
                spin_count: self.spin_count,
                max: options.max_spin_count,
            });
        }
        if self.salt.is_empty() {
            return Err(AgileDecryptError::InvalidParameter {
                param: "encryptedKey saltValue must be non-empty",
            });
        }
        check_block_aligned(
            "encryptedVerifierHashInput",
            &self.encrypted_verifier_hash_input,
            self.block_size,
        )?;
        check_block_aligned(
            "encryptedVerifierHashValue",
            &self.encrypted_verifier_hash_value,
            self.block_size,
        )?;
        check_block_aligned("encryptedKeyValue", &self.encrypted_key_value, self.block_size)?;
        Ok(())
    }
}

fn validate_cipher(cipher: CipherAlgorithm, block_size: usize, key_bits: usize) -> Result<()> {
    if block_size != cipher.block_size() {
        return Err(AgileDecryptError::InvalidBlockSize { block_size });
    }
    if !cipher.supports_key_bits(key_bits) {
        return Err(AgileDecryptError::InvalidKeySize { key_bits });
    }
    Ok(())
}

fn check_block_aligned(field: &'static str, bytes: &[u8], block_size: usize) -> Result<()> {
    if bytes.is_empty() || bytes.len() % block_size != 0 {
        return Err(AgileDecryptError::CiphertextNotBlockAligned {
            field,
            len: bytes.len(),
        });
    }
    Ok(())
}
