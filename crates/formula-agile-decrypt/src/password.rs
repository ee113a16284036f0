//! Password key encryptor verification (MS-OFFCRYPTO 2.3.4.13).

use zeroize::Zeroizing;

use crate::block_keys;
use crate::cipher::decrypt_field;
use crate::crypto::{derive_key, generate_iv, hash_password};
use crate::descriptor::{EncryptionHeader, EncryptionVerifier};
use crate::error::Result;
use crate::integrity::{ct_eq, derive_key_material, KeyMaterial};
use crate::options::DecryptOptions;

/// Check `password` against the password key encryptor.
///
/// Returns `Ok(None)` for a wrong password. Errors are reserved for descriptors that cannot be
/// processed at all.
pub(crate) fn verify_password(
    header: &EncryptionHeader,
    verifier: &EncryptionVerifier,
    password: &str,
    options: &DecryptOptions,
) -> Result<Option<KeyMaterial>> {
    header.validate()?;
    verifier.validate_password(options)?;

    let hash_alg = verifier.hash_algorithm;
    let pw_hash = hash_password(password, &verifier.salt, verifier.spin_count, hash_alg)?;
    let verifier_key_len = verifier.key_bits / 8;
    let iv = generate_iv(hash_alg, &verifier.salt, None, verifier.block_size)?;

    let decrypt_with = |block_key: &[u8], ciphertext: &[u8]| -> Result<Zeroizing<Vec<u8>>> {
        let key = derive_key(&pw_hash, block_key, verifier_key_len, hash_alg)?;
        Ok(decrypt_field(verifier.cipher_algorithm, &key, &iv, ciphertext)?)
    };

    // The verifier input is `saltSize` random bytes; anything after that is block padding.
    let mut verifier_input = decrypt_with(
        &block_keys::VERIFIER_HASH_INPUT,
        &verifier.encrypted_verifier_hash_input,
    )?;
    verifier_input.truncate(verifier.salt.len());
    let computed_hash = Zeroizing::new(hash_alg.digest(&verifier_input));

    let mut stored_hash = decrypt_with(
        &block_keys::VERIFIER_HASH_VALUE,
        &verifier.encrypted_verifier_hash_value,
    )?;
    stored_hash.resize(hash_alg.digest_len(), 0);

    let mut content_key = decrypt_with(&block_keys::KEY_VALUE, &verifier.encrypted_key_value)?;
    content_key.resize(header.key_len(), 0);

    let material = derive_key_material(header, content_key)?;

    if ct_eq(&computed_hash, &stored_hash) {
        log::debug!("password key encryptor verified");
        Ok(Some(material))
    } else {
        log::debug!("password key encryptor rejected the supplied password");
        Ok(None)
    }
}
