//! Integrity material (`<dataIntegrity>`) and the optional `EncryptedPackage` HMAC check.
//!
//! Once a package key is known, `encryptedHmacKey` and `encryptedHmacValue` are decrypted with it.
//! Their IVs come from the header key salt plus a dedicated block key, and both plaintexts are
//! truncated to the hash digest size. The HMAC value authenticates the raw `EncryptedPackage`
//! stream, size prefix included (MS-OFFCRYPTO 2.3.4.14).

use std::fmt;
use std::io::Read;

use subtle::ConstantTimeEq as _;
use zeroize::Zeroizing;

use crate::block_keys;
use crate::cipher::decrypt_field;
use crate::crypto::{generate_iv, HashAlgorithm, HmacState};
use crate::descriptor::EncryptionHeader;
use crate::error::{AgileDecryptError, Result};

/// Secrets recovered by a successful verification.
pub(crate) struct KeyMaterial {
    pub(crate) content_key: Zeroizing<Vec<u8>>,
    pub(crate) hmac_key: Zeroizing<Vec<u8>>,
    pub(crate) hmac_value: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("content_key_len", &self.content_key.len())
            .field("hmac_key_len", &self.hmac_key.len())
            .field("hmac_value_len", &self.hmac_value.len())
            .finish()
    }
}

/// Derive the integrity HMAC key and value for `content_key`.
pub(crate) fn derive_key_material(
    header: &EncryptionHeader,
    content_key: Zeroizing<Vec<u8>>,
) -> Result<KeyMaterial> {
    if content_key.len() != header.key_len() {
        return Err(AgileDecryptError::InvalidKeySize {
            key_bits: content_key.len().saturating_mul(8),
        });
    }
    let hmac_key = decrypt_integrity_field(
        header,
        &content_key,
        &block_keys::INTEGRITY_HMAC_KEY,
        &header.encrypted_hmac_key,
    )?;
    let hmac_value = decrypt_integrity_field(
        header,
        &content_key,
        &block_keys::INTEGRITY_HMAC_VALUE,
        &header.encrypted_hmac_value,
    )?;
    Ok(KeyMaterial {
        content_key,
        hmac_key,
        hmac_value,
    })
}

fn decrypt_integrity_field(
    header: &EncryptionHeader,
    content_key: &[u8],
    block_key: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let iv = generate_iv(
        header.hash_algorithm,
        &header.key_salt,
        Some(block_key),
        header.block_size,
    )?;
    let mut plain = decrypt_field(header.cipher_algorithm, content_key, &iv, ciphertext)?;
    let digest_len = header.hash_algorithm.digest_len();
    if plain.len() < digest_len {
        return Err(AgileDecryptError::InvalidParameter {
            param: "dataIntegrity field is shorter than the hash digest",
        });
    }
    plain.truncate(digest_len);
    Ok(plain)
}

/// Exact-length, exact-byte comparison that does not short-circuit on the first difference.
pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    bool::from(a.ct_eq(b))
}

/// HMAC the whole `EncryptedPackage` stream and compare it with `expected`.
pub(crate) fn verify_package_hmac<R: Read>(
    hash_alg: HashAlgorithm,
    hmac_key: &[u8],
    expected: &[u8],
    mut encrypted_package: R,
) -> Result<()> {
    let mut mac = HmacState::new(hash_alg, hmac_key)?;
    let mut buf = vec![0u8; 8192];
    let mut total: u64 = 0;
    loop {
        let n = match encrypted_package.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(AgileDecryptError::Io {
                    context: "reading EncryptedPackage for the integrity check",
                    source,
                })
            }
        };
        mac.update(&buf[..n]);
        total = total.saturating_add(n as u64);
    }
    if total < 8 {
        return Err(AgileDecryptError::EncryptedPackageTooShort {
            len: total as usize,
        });
    }

    let actual = mac.finalize();
    if ct_eq(&actual, expected) {
        log::debug!("EncryptedPackage integrity HMAC verified over {total} bytes");
        Ok(())
    } else {
        log::debug!("EncryptedPackage integrity HMAC mismatch over {total} bytes");
        Err(AgileDecryptError::IntegrityMismatch)
    }
}
