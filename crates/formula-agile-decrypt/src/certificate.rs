//! Certificate key encryptor verification.
//!
//! A certificate key encryptor stores the recipient's certificate, the package key wrapped with
//! that certificate's RSA public key, and `certVerifier = HMAC(packageKey, certificateDer)`.

use openssl::pkey::{PKey, Private};
use openssl::rsa::Padding;
use openssl::x509::X509;
use zeroize::Zeroizing;

use crate::descriptor::{EncryptionHeader, EncryptionVerifier};
use crate::error::{AgileDecryptError, Result};
use crate::integrity::{ct_eq, derive_key_material, KeyMaterial};

/// Check a key pair and certificate against the certificate key encryptors.
///
/// `Ok(None)` covers every authentication failure: an unknown certificate (including a descriptor
/// with no certificate key encryptors at all), a private key that does not unwrap the stored key,
/// and a `certVerifier` mismatch.
pub(crate) fn verify_certificate(
    header: &EncryptionHeader,
    verifier: &EncryptionVerifier,
    private_key: &PKey<Private>,
    certificate: &X509,
) -> Result<Option<KeyMaterial>> {
    header.validate()?;

    let der = certificate
        .to_der()
        .map_err(|source| AgileDecryptError::Certificate {
            context: "encoding the certificate as DER",
            source,
        })?;
    let Some(entry) = verifier
        .certificates
        .iter()
        .find(|entry| entry.certificate_der == der)
    else {
        log::debug!(
            "certificate not among the {} certificate key encryptors",
            verifier.certificates.len()
        );
        return Ok(None);
    };

    let rsa = private_key
        .rsa()
        .map_err(|source| AgileDecryptError::Certificate {
            context: "reading the RSA private key",
            source,
        })?;
    let mut unwrapped = Zeroizing::new(vec![0u8; rsa.size() as usize]);
    let decrypted = rsa.private_decrypt(&entry.encrypted_key_value, &mut unwrapped, Padding::PKCS1);
    let content_key = match decrypted {
        Ok(len) => {
            unwrapped.truncate(len);
            unwrapped
        }
        Err(_) => {
            log::debug!("private key does not unwrap the certificate key encryptor");
            return Ok(None);
        }
    };
    if content_key.len() != header.key_len() {
        log::debug!(
            "unwrapped key is {} bytes, header expects {}",
            content_key.len(),
            header.key_len()
        );
        return Ok(None);
    }

    let computed = Zeroizing::new(header.hash_algorithm.hmac(&content_key, &der)?);
    let material = derive_key_material(header, content_key)?;

    if ct_eq(&computed, &entry.cert_verifier) {
        log::debug!("certificate key encryptor verified");
        Ok(Some(material))
    } else {
        log::debug!("certVerifier mismatch for the supplied certificate");
        Ok(None)
    }
}
