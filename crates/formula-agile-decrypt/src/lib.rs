//! MS-OFFCRYPTO Agile Encryption (4.4) decryption.
//!
//! Password- or certificate-protected OOXML documents are OLE containers holding two streams:
//! `EncryptionInfo` (the descriptor) and `EncryptedPackage` (an 8-byte plaintext length followed by
//! the encrypted ZIP package). This crate takes those two byte sources from the caller; it never
//! reads the container itself.
//!
//! ```no_run
//! use std::io::Read;
//! use formula_agile_decrypt::{DecryptOptions, DecryptionSession};
//!
//! # fn demo(encryption_info: &[u8], encrypted_package: &[u8]) -> formula_agile_decrypt::Result<()> {
//! let mut session = DecryptionSession::from_encryption_info(encryption_info, DecryptOptions::default())?;
//! if !session.verify_password("secret")? {
//!     // Wrong password.
//!     return Ok(());
//! }
//! session.verify_data_integrity(encrypted_package)?;
//! let mut reader = session.open_decrypted_stream(encrypted_package)?;
//! let mut zip = Vec::new();
//! reader.read_to_end(&mut zip).map_err(|e| formula_agile_decrypt::AgileDecryptError::from_io(e, "reading"))?;
//! # Ok(())
//! # }
//! ```

pub mod block_keys;
mod certificate;
pub mod cipher;
pub mod crypto;
pub mod descriptor;
pub mod encryption_info;
mod error;
mod integrity;
mod options;
mod password;
mod reader;
mod session;

pub use crate::cipher::{ChainingMode, CipherAlgorithm, CipherError};
pub use crate::crypto::{CryptoError, HashAlgorithm};
pub use crate::descriptor::{CertificateEntry, EncryptionHeader, EncryptionVerifier};
pub use crate::encryption_info::{
    parse_encryption_info, AgileEncryptionInfo, EncryptionScheme, EncryptionVersion,
};
pub use crate::error::{AgileDecryptError, Result};
pub use crate::options::DecryptOptions;
pub use crate::reader::{ChunkedCipherReader, SEGMENT_SIZE};
pub use crate::session::{DecryptionSession, ENCRYPTED_PACKAGE_SIZE_PREFIX_LEN};
