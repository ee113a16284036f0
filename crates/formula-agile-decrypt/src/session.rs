//! Single-use decryption session: verify one credential, then stream the package once.

use std::io::Read;

use openssl::pkey::{PKey, Private};
use openssl::x509::X509;

use crate::certificate;
use crate::descriptor::{EncryptionHeader, EncryptionVerifier};
use crate::encryption_info::parse_encryption_info;
use crate::error::{AgileDecryptError, Result};
use crate::integrity::{verify_package_hmac, KeyMaterial};
use crate::options::DecryptOptions;
use crate::password;
use crate::reader::{read_up_to, ChunkedCipherReader, SegmentKey};

/// Length of the little-endian plaintext size that prefixes `EncryptedPackage`.
pub const ENCRYPTED_PACKAGE_SIZE_PREFIX_LEN: usize = 8;

#[derive(Debug)]
enum Verification {
    Pending,
    /// Attempted, and either rejected or aborted by an error.
    Failed,
    Verified(KeyMaterial),
}

/// Decryption state for one encrypted package.
///
/// A session accepts exactly one verification attempt ([`verify_password`] or
/// [`verify_certificate`]). After a successful one the decrypted stream can be opened once.
///
/// [`verify_password`]: DecryptionSession::verify_password
/// [`verify_certificate`]: DecryptionSession::verify_certificate
#[derive(Debug)]
pub struct DecryptionSession {
    header: EncryptionHeader,
    verifier: EncryptionVerifier,
    options: DecryptOptions,
    verification: Verification,
    plaintext_len: Option<u64>,
}

impl DecryptionSession {
    pub fn new(header: EncryptionHeader, verifier: EncryptionVerifier) -> Self {
        Self::with_options(header, verifier, DecryptOptions::default())
    }

    pub fn with_options(
        header: EncryptionHeader,
        verifier: EncryptionVerifier,
        options: DecryptOptions,
    ) -> Self {
        Self {
            header,
            verifier,
            options,
            verification: Verification::Pending,
            plaintext_len: None,
        }
    }

    /// Build a session from the raw `EncryptionInfo` stream.
    pub fn from_encryption_info(encryption_info: &[u8], options: DecryptOptions) -> Result<Self> {
        let info = parse_encryption_info(encryption_info, &options)?;
        Ok(Self::with_options(info.header, info.verifier, options))
    }

    pub fn header(&self) -> &EncryptionHeader {
        &self.header
    }

    pub fn verifier(&self) -> &EncryptionVerifier {
        &self.verifier
    }

    pub fn options(&self) -> &DecryptOptions {
        &self.options
    }

    /// Verify `password` with the password key encryptor.
    ///
    /// `Ok(false)` means the password is wrong. The session is then unusable for decryption.
    pub fn verify_password(&mut self, password: &str) -> Result<bool> {
        self.begin_verification()?;
        let outcome =
            password::verify_password(&self.header, &self.verifier, password, &self.options)?;
        Ok(self.finish_verification(outcome))
    }

    /// Verify a key pair and certificate with the certificate key encryptors.
    ///
    /// `Ok(false)` means the certificate is not a recipient of this package or the key pair does
    /// not match it.
    pub fn verify_certificate(
        &mut self,
        private_key: &PKey<Private>,
        certificate: &X509,
    ) -> Result<bool> {
        self.begin_verification()?;
        let outcome = certificate::verify_certificate(
            &self.header,
            &self.verifier,
            private_key,
            certificate,
        )?;
        Ok(self.finish_verification(outcome))
    }

    fn begin_verification(&mut self) -> Result<()> {
        match self.verification {
            Verification::Pending => {
                self.verification = Verification::Failed;
                Ok(())
            }
            Verification::Failed | Verification::Verified(_) => {
                Err(AgileDecryptError::AlreadyVerified)
            }
        }
    }

    fn finish_verification(&mut self, outcome: Option<KeyMaterial>) -> bool {
        match outcome {
            Some(material) => {
                self.verification = Verification::Verified(material);
                true
            }
            None => false,
        }
    }

    fn key_material(&self) -> Option<&KeyMaterial> {
        match &self.verification {
            Verification::Verified(material) => Some(material),
            Verification::Pending | Verification::Failed => None,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.key_material().is_some()
    }

    /// The package key, once verified.
    pub fn content_key(&self) -> Option<&[u8]> {
        self.key_material().map(|m| m.content_key.as_slice())
    }

    /// Decrypted `dataIntegrity/@encryptedHmacKey`, once verified.
    pub fn integrity_hmac_key(&self) -> Option<&[u8]> {
        self.key_material().map(|m| m.hmac_key.as_slice())
    }

    /// Decrypted `dataIntegrity/@encryptedHmacValue`, once verified.
    pub fn integrity_hmac_value(&self) -> Option<&[u8]> {
        self.key_material().map(|m| m.hmac_value.as_slice())
    }

    /// Read the size prefix from `encrypted_package` and return a reader over the plaintext.
    ///
    /// `encrypted_package` must be positioned at the start of the `EncryptedPackage` stream.
    pub fn open_decrypted_stream<R: Read>(
        &mut self,
        mut encrypted_package: R,
    ) -> Result<ChunkedCipherReader<R>> {
        let material = self.key_material().ok_or(AgileDecryptError::NotVerified)?;
        if self.plaintext_len.is_some() {
            return Err(AgileDecryptError::StreamAlreadyOpened);
        }

        let mut prefix = [0u8; ENCRYPTED_PACKAGE_SIZE_PREFIX_LEN];
        let read = read_up_to(&mut encrypted_package, &mut prefix)?;
        if read < prefix.len() {
            return Err(AgileDecryptError::EncryptedPackageTooShort { len: read });
        }
        let plaintext_len = u64::from_le_bytes(prefix);

        let key = SegmentKey {
            content_key: material.content_key.clone(),
            key_salt: self.header.key_salt.clone(),
            hash_algorithm: self.header.hash_algorithm,
            cipher_algorithm: self.header.cipher_algorithm,
            block_size: self.header.block_size,
        };
        self.plaintext_len = Some(plaintext_len);
        Ok(ChunkedCipherReader::new(encrypted_package, key, plaintext_len))
    }

    /// Declared plaintext length, available after [`open_decrypted_stream`].
    ///
    /// [`open_decrypted_stream`]: DecryptionSession::open_decrypted_stream
    pub fn plaintext_length(&self) -> Result<u64> {
        self.plaintext_len.ok_or(AgileDecryptError::StreamNotOpened)
    }

    /// Decrypt the whole package into memory.
    pub fn decrypt_to_vec<R: Read>(&mut self, encrypted_package: R) -> Result<Vec<u8>> {
        let mut reader = self.open_decrypted_stream(encrypted_package)?;
        let declared_len = reader.plaintext_len();
        // The prefix is untrusted; grow on demand past a modest initial reservation.
        let mut out = Vec::with_capacity(declared_len.min(16 * 1024 * 1024) as usize);
        reader
            .read_to_end(&mut out)
            .map_err(|err| AgileDecryptError::from_io(err, "reading the decrypted package"))?;
        if out.len() as u64 != declared_len {
            return Err(AgileDecryptError::PackageTruncated {
                declared_len,
                available_len: out.len() as u64,
            });
        }
        Ok(out)
    }

    /// Check the `dataIntegrity` HMAC over the raw `EncryptedPackage` stream.
    ///
    /// `encrypted_package` must yield the whole stream, size prefix included. This is independent
    /// of [`open_decrypted_stream`] and can run before or after it.
    ///
    /// [`open_decrypted_stream`]: DecryptionSession::open_decrypted_stream
    pub fn verify_data_integrity<R: Read>(&self, encrypted_package: R) -> Result<()> {
        let material = self.key_material().ok_or(AgileDecryptError::NotVerified)?;
        verify_package_hmac(
            self.header.hash_algorithm,
            &material.hmac_key,
            &material.hmac_value,
            encrypted_package,
        )
    }
}
