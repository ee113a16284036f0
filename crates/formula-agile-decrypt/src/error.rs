use crate::cipher::CipherError;
use crate::crypto::CryptoError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgileDecryptError>;

/// Errors returned while validating descriptors, verifying credentials, or decrypting packages.
///
/// A wrong password or non-matching certificate is not an error: the verifiers report it as
/// `Ok(false)`. Messages never include passwords, keys, or decrypted bytes.
#[derive(Debug, Error)]
pub enum AgileDecryptError {
    // --- Descriptor / configuration ------------------------------------------------------------
    #[error(
        "unsupported OOXML encryption version {major}.{minor}; only Agile Encryption (4.4) is supported"
    )]
    UnsupportedEncryptionVersion { major: u16, minor: u16 },

    #[error("unsupported encryption hash algorithm `{hash}`")]
    UnsupportedHashAlgorithm { hash: String },

    #[error("unsupported encryption cipher algorithm `{cipher}`")]
    UnsupportedCipherAlgorithm { cipher: String },

    #[error("unsupported cipher chaining mode `{chaining}`; only `ChainingModeCBC` is supported")]
    UnsupportedChainingMode { chaining: String },

    #[error("invalid Agile encryption parameter: {param}")]
    InvalidParameter { param: &'static str },

    #[error("invalid key size {key_bits} bits (expected 128, 192, or 256)")]
    InvalidKeySize { key_bits: usize },

    #[error("invalid AES block size {block_size} bytes (expected 16)")]
    InvalidBlockSize { block_size: usize },

    #[error("{field} ciphertext length {len} is not a multiple of the block size")]
    CiphertextNotBlockAligned { field: &'static str, len: usize },

    #[error(
        "spinCount {spin_count} exceeds maximum allowed {max} (refusing to run expensive password KDF)"
    )]
    SpinCountTooLarge { spin_count: u32, max: u32 },

    #[error("encryption descriptor has no {kind} key encryptor")]
    MissingKeyEncryptor { kind: &'static str },

    // --- EncryptionInfo parsing ----------------------------------------------------------------
    #[error("EncryptionInfo stream is too short ({len} bytes)")]
    EncryptionInfoTooShort { len: usize },

    #[error("EncryptionInfo is too large ({len} bytes; max {max} bytes)")]
    EncryptionInfoTooLarge { len: usize, max: usize },

    #[error("EncryptionInfo field `{field}` is too large ({len} bytes; max {max} bytes)")]
    FieldTooLarge {
        field: String,
        len: usize,
        max: usize,
    },

    #[error("EncryptionInfo XML is not valid UTF-8: {source}")]
    EncryptionInfoXmlNotUtf8 {
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("failed to parse EncryptionInfo XML: {source}")]
    EncryptionInfoXmlMalformed {
        #[source]
        source: roxmltree::Error,
    },

    #[error("EncryptionInfo XML missing required element `{element}`")]
    MissingRequiredElement { element: String },

    #[error("EncryptionInfo XML missing required attribute `{attr}` on element `{element}`")]
    MissingRequiredAttribute { element: String, attr: String },

    #[error("EncryptionInfo XML invalid attribute `{attr}` on element `{element}`: {reason}")]
    InvalidAttribute {
        element: String,
        attr: String,
        reason: String,
    },

    #[error(
        "EncryptionInfo XML invalid base64 value for attribute `{attr}` on element `{element}`: {source}"
    )]
    Base64Decode {
        element: String,
        attr: String,
        #[source]
        source: base64::DecodeError,
    },

    // --- Session state -------------------------------------------------------------------------
    #[error("no successful password or certificate verification on this session")]
    NotVerified,

    #[error("this session has already attempted verification")]
    AlreadyVerified,

    #[error("the decrypted stream has not been opened yet")]
    StreamNotOpened,

    #[error("the decrypted stream has already been opened for this session")]
    StreamAlreadyOpened,

    // --- Decryption ----------------------------------------------------------------------------
    #[error("failed to decrypt EncryptedPackage segment {segment}: {reason}")]
    DecryptionFailed { segment: u32, reason: String },

    #[error("EncryptedPackage stream is too short ({len} bytes)")]
    EncryptedPackageTooShort { len: usize },

    #[error(
        "EncryptedPackage is truncated: header declares {declared_len} bytes but only {available_len} bytes are available"
    )]
    PackageTruncated { declared_len: u64, available_len: u64 },

    #[error("EncryptedPackage integrity check failed (HMAC mismatch)")]
    IntegrityMismatch,

    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    // --- Certificates --------------------------------------------------------------------------
    #[error("certificate operation failed while {context}: {source}")]
    Certificate {
        context: &'static str,
        #[source]
        source: openssl::error::ErrorStack,
    },
}

impl From<CryptoError> for AgileDecryptError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::UnsupportedHashAlgorithm(hash) => Self::UnsupportedHashAlgorithm { hash },
            CryptoError::InvalidParameter(param) => Self::InvalidParameter { param },
        }
    }
}

impl From<CipherError> for AgileDecryptError {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::UnsupportedCipherAlgorithm(cipher) => {
                Self::UnsupportedCipherAlgorithm { cipher }
            }
            CipherError::UnsupportedChainingMode(chaining) => {
                Self::UnsupportedChainingMode { chaining }
            }
            CipherError::UnsupportedKeyLength(len) => Self::InvalidKeySize {
                key_bits: len.saturating_mul(8),
            },
            CipherError::InvalidIvLength(_) => Self::InvalidParameter {
                param: "IV length does not match the cipher block size",
            },
            CipherError::InvalidCiphertextLength(len) => Self::CiphertextNotBlockAligned {
                field: "ciphertext",
                len,
            },
            CipherError::PaddingOverrun { .. } => Self::InvalidParameter {
                param: "declared plaintext length exceeds decrypted length",
            },
        }
    }
}

impl AgileDecryptError {
    /// Wrap this error for the `std::io::Read` boundary.
    ///
    /// Callers can recover the original with [`AgileDecryptError::from_io`].
    pub(crate) fn into_io(self) -> std::io::Error {
        match self {
            AgileDecryptError::Io { source, .. } if source.get_ref().is_none() => source,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }

    /// Unwrap an `io::Error` produced by [`crate::ChunkedCipherReader`].
    ///
    /// Plain I/O failures from the underlying source are reported as [`AgileDecryptError::Io`].
    pub fn from_io(err: std::io::Error, context: &'static str) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<AgileDecryptError>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(decrypt_err) = inner.downcast::<AgileDecryptError>() {
                    return *decrypt_err;
                }
            }
            return AgileDecryptError::InvalidParameter {
                param: "unrecoverable wrapped reader error",
            };
        }
        AgileDecryptError::Io {
            context,
            source: err,
        }
    }
}
