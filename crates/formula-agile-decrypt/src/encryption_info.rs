//! `EncryptionInfo` stream parsing.
//!
//! Agile `EncryptionInfo` is an 8-byte version header (`u16 major`, `u16 minor`, `u32 flags`)
//! followed by a UTF-8 XML descriptor. This module turns it into an [`EncryptionHeader`] and
//! [`EncryptionVerifier`]; nothing else in the crate looks at XML.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;

use crate::cipher::{ChainingMode, CipherAlgorithm};
use crate::crypto::HashAlgorithm;
use crate::descriptor::{CertificateEntry, EncryptionHeader, EncryptionVerifier};
use crate::error::{AgileDecryptError, Result};
use crate::options::DecryptOptions;

pub const KEY_ENCRYPTOR_URI_PASSWORD: &str =
    "http://schemas.microsoft.com/office/2006/keyEncryptor/password";
pub const KEY_ENCRYPTOR_URI_CERTIFICATE: &str =
    "http://schemas.microsoft.com/office/2006/keyEncryptor/certificate";

/// `EncryptionInfo` version header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionVersion {
    pub major: u16,
    pub minor: u16,
}

/// Encryption scheme family selected by the `EncryptionInfo` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionScheme {
    /// 4.4, XML descriptor.
    Agile,
    /// 2.2, 3.2, 4.2 (binary CryptoAPI header).
    Standard,
    /// 3.3, 4.3.
    Extensible,
}

impl EncryptionVersion {
    pub fn parse(encryption_info: &[u8]) -> Result<Self> {
        let [a, b, c, d, ..] = *encryption_info else {
            return Err(AgileDecryptError::EncryptionInfoTooShort {
                len: encryption_info.len(),
            });
        };
        Ok(Self {
            major: u16::from_le_bytes([a, b]),
            minor: u16::from_le_bytes([c, d]),
        })
    }

    pub fn scheme(self) -> Option<EncryptionScheme> {
        match (self.major, self.minor) {
            (4, 4) => Some(EncryptionScheme::Agile),
            (2..=4, 2) => Some(EncryptionScheme::Standard),
            (3 | 4, 3) => Some(EncryptionScheme::Extensible),
            _ => None,
        }
    }
}

/// A parsed Agile `EncryptionInfo` stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgileEncryptionInfo {
    pub version: EncryptionVersion,
    pub flags: u32,
    pub header: EncryptionHeader,
    pub verifier: EncryptionVerifier,
}

/// Parse and validate an Agile `EncryptionInfo` stream.
///
/// Standard and Extensible encryption are recognized but rejected with
/// [`AgileDecryptError::UnsupportedEncryptionVersion`].
pub fn parse_encryption_info(
    encryption_info: &[u8],
    options: &DecryptOptions,
) -> Result<AgileEncryptionInfo> {
    if encryption_info.len() > options.max_encryption_info_len {
        return Err(AgileDecryptError::EncryptionInfoTooLarge {
            len: encryption_info.len(),
            max: options.max_encryption_info_len,
        });
    }
    let version = EncryptionVersion::parse(encryption_info)?;
    if version.scheme() != Some(EncryptionScheme::Agile) {
        log::debug!(
            "EncryptionInfo version {}.{} ({:?}) is not Agile",
            version.major,
            version.minor,
            version.scheme()
        );
        return Err(AgileDecryptError::UnsupportedEncryptionVersion {
            major: version.major,
            minor: version.minor,
        });
    }
    let Some((flags_bytes, xml_bytes)) = encryption_info
        .get(4..)
        .and_then(|rest| rest.split_first_chunk::<4>())
    else {
        return Err(AgileDecryptError::EncryptionInfoTooShort {
            len: encryption_info.len(),
        });
    };
    let flags = u32::from_le_bytes(*flags_bytes);

    let xml = descriptor_text(xml_bytes)?;
    let doc = roxmltree::Document::parse(xml)
        .map_err(|source| AgileDecryptError::EncryptionInfoXmlMalformed { source })?;

    let key_data = find_element(&doc, "keyData")?;
    let data_integrity = find_element(&doc, "dataIntegrity")?;
    let key_encryptors = find_element(&doc, "keyEncryptors")?;

    let key_data_params = parse_cipher_params(key_data, None)?;
    let header = parse_header(key_data, &key_data_params, data_integrity, options)?;
    let verifier = parse_verifier(&key_data_params, key_encryptors, options)?;
    header.validate()?;

    Ok(AgileEncryptionInfo {
        version,
        flags,
        header,
        verifier,
    })
}

/// XML text after the version header, without a UTF-8 BOM or trailing NUL padding.
fn descriptor_text(xml_bytes: &[u8]) -> Result<&str> {
    let xml_bytes = xml_bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(xml_bytes);
    let end = xml_bytes
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |idx| idx + 1);
    std::str::from_utf8(&xml_bytes[..end])
        .map_err(|source| AgileDecryptError::EncryptionInfoXmlNotUtf8 { source })
}

fn find_element<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
    name: &str,
) -> Result<roxmltree::Node<'a, 'input>> {
    doc.descendants()
        .find(|n| n.is_element() && n.tag_name().name() == name)
        .ok_or_else(|| AgileDecryptError::MissingRequiredElement {
            element: name.to_string(),
        })
}

/// Cipher settings shared by `<keyData>` and `<p:encryptedKey>`.
struct CipherParams {
    hash_algorithm: HashAlgorithm,
    cipher_algorithm: CipherAlgorithm,
    chaining_mode: ChainingMode,
    block_size: usize,
    key_bits: usize,
}

fn parse_cipher_params(
    node: roxmltree::Node<'_, '_>,
    defaults: Option<&CipherParams>,
) -> Result<CipherParams> {
    let hash_algorithm = match (node.attribute("hashAlgorithm"), defaults) {
        (None, Some(d)) => d.hash_algorithm,
        _ => parse_hash_algorithm(node, "hashAlgorithm")?,
    };
    let cipher_algorithm = match (node.attribute("cipherAlgorithm"), defaults) {
        (None, Some(d)) => d.cipher_algorithm,
        _ => CipherAlgorithm::parse_offcrypto_name(required_attr(node, "cipherAlgorithm")?)?,
    };
    let chaining_mode = match (node.attribute("cipherChaining"), defaults) {
        (None, Some(d)) => d.chaining_mode,
        _ => ChainingMode::parse_offcrypto_name(required_attr(node, "cipherChaining")?)?,
    };
    let block_size = match (node.attribute("blockSize"), defaults) {
        (None, Some(d)) => d.block_size,
        _ => parse_usize_attr(node, "blockSize")?,
    };
    let key_bits = match (node.attribute("keyBits"), defaults) {
        (None, Some(d)) => d.key_bits,
        _ => parse_usize_attr(node, "keyBits")?,
    };
    if key_bits % 8 != 0 {
        return Err(AgileDecryptError::InvalidAttribute {
            element: node.tag_name().name().to_string(),
            attr: "keyBits".to_string(),
            reason: "keyBits must be divisible by 8".to_string(),
        });
    }
    if let Some(hash_size) = node.attribute("hashSize") {
        if hash_size.trim().parse::<usize>().ok() != Some(hash_algorithm.digest_len()) {
            log::warn!(
                "{} hashSize {hash_size:?} does not match {} ({} bytes)",
                node.tag_name().name(),
                hash_algorithm.as_offcrypto_name(),
                hash_algorithm.digest_len()
            );
        }
    }
    Ok(CipherParams {
        hash_algorithm,
        cipher_algorithm,
        chaining_mode,
        block_size,
        key_bits,
    })
}

fn parse_header(
    key_data: roxmltree::Node<'_, '_>,
    params: &CipherParams,
    data_integrity: roxmltree::Node<'_, '_>,
    options: &DecryptOptions,
) -> Result<EncryptionHeader> {
    Ok(EncryptionHeader {
        hash_algorithm: params.hash_algorithm,
        cipher_algorithm: params.cipher_algorithm,
        chaining_mode: params.chaining_mode,
        block_size: params.block_size,
        key_bits: params.key_bits,
        key_salt: parse_base64_attr(key_data, "saltValue", options)?,
        encrypted_hmac_key: parse_base64_attr(data_integrity, "encryptedHmacKey", options)?,
        encrypted_hmac_value: parse_base64_attr(data_integrity, "encryptedHmacValue", options)?,
    })
}

fn parse_verifier(
    key_data_params: &CipherParams,
    key_encryptors: roxmltree::Node<'_, '_>,
    options: &DecryptOptions,
) -> Result<EncryptionVerifier> {
    let mut password_key: Option<roxmltree::Node<'_, '_>> = None;
    let mut password_encryptor_count = 0usize;
    let mut certificates = Vec::new();

    for key_encryptor in key_encryptors
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "keyEncryptor")
    {
        let uri = required_attr(key_encryptor, "uri")?;
        let encrypted_key = key_encryptor
            .children()
            .find(|n| n.is_element() && n.tag_name().name() == "encryptedKey")
            .ok_or_else(|| AgileDecryptError::MissingRequiredElement {
                element: "encryptedKey".to_string(),
            })?;

        match uri.trim() {
            KEY_ENCRYPTOR_URI_PASSWORD => {
                password_encryptor_count += 1;
                if password_key.is_none() {
                    password_key = Some(encrypted_key);
                }
            }
            KEY_ENCRYPTOR_URI_CERTIFICATE => {
                certificates.push(CertificateEntry {
                    certificate_der: parse_base64_attr(encrypted_key, "X509Certificate", options)?,
                    encrypted_key_value: parse_base64_attr(
                        encrypted_key,
                        "encryptedKeyValue",
                        options,
                    )?,
                    cert_verifier: parse_base64_attr(encrypted_key, "certVerifier", options)?,
                });
            }
            other => log::warn!("ignoring unknown keyEncryptor uri {other:?}"),
        }
    }

    if password_encryptor_count > 1 {
        log::warn!(
            "EncryptionInfo has {password_encryptor_count} password key encryptors; using the first"
        );
    }

    let Some(node) = password_key else {
        if certificates.is_empty() {
            return Err(AgileDecryptError::MissingKeyEncryptor {
                kind: "password or certificate",
            });
        }
        return Ok(EncryptionVerifier {
            hash_algorithm: key_data_params.hash_algorithm,
            cipher_algorithm: key_data_params.cipher_algorithm,
            chaining_mode: key_data_params.chaining_mode,
            block_size: key_data_params.block_size,
            key_bits: key_data_params.key_bits,
            salt: Vec::new(),
            spin_count: 0,
            encrypted_verifier_hash_input: Vec::new(),
            encrypted_verifier_hash_value: Vec::new(),
            encrypted_key_value: Vec::new(),
            certificates,
        });
    };

    let params = parse_cipher_params(node, Some(key_data_params))?;
    Ok(EncryptionVerifier {
        hash_algorithm: params.hash_algorithm,
        cipher_algorithm: params.cipher_algorithm,
        chaining_mode: params.chaining_mode,
        block_size: params.block_size,
        key_bits: params.key_bits,
        salt: parse_base64_attr(node, "saltValue", options)?,
        spin_count: parse_u32_attr(node, "spinCount")?,
        encrypted_verifier_hash_input: parse_base64_attr(
            node,
            "encryptedVerifierHashInput",
            options,
        )?,
        encrypted_verifier_hash_value: parse_base64_attr(
            node,
            "encryptedVerifierHashValue",
            options,
        )?,
        encrypted_key_value: parse_base64_attr(node, "encryptedKeyValue", options)?,
        certificates,
    })
}

fn required_attr<'a>(node: roxmltree::Node<'a, '_>, attr: &str) -> Result<&'a str> {
    node.attribute(attr)
        .ok_or_else(|| AgileDecryptError::MissingRequiredAttribute {
            element: node.tag_name().name().to_string(),
            attr: attr.to_string(),
        })
}

fn parse_usize_attr(node: roxmltree::Node<'_, '_>, attr: &str) -> Result<usize> {
    let val = required_attr(node, attr)?;
    val.trim()
        .parse::<usize>()
        .map_err(|e| AgileDecryptError::InvalidAttribute {
            element: node.tag_name().name().to_string(),
            attr: attr.to_string(),
            reason: format!("expected an unsigned integer, got {val:?}: {e}"),
        })
}

fn parse_u32_attr(node: roxmltree::Node<'_, '_>, attr: &str) -> Result<u32> {
    let val = required_attr(node, attr)?;
    val.trim()
        .parse::<u32>()
        .map_err(|e| AgileDecryptError::InvalidAttribute {
            element: node.tag_name().name().to_string(),
            attr: attr.to_string(),
            reason: format!("expected u32, got {val:?}: {e}"),
        })
}

fn parse_hash_algorithm(node: roxmltree::Node<'_, '_>, attr: &str) -> Result<HashAlgorithm> {
    let val = required_attr(node, attr)?;
    HashAlgorithm::parse_offcrypto_name(val).map_err(|_| {
        AgileDecryptError::UnsupportedHashAlgorithm {
            hash: val.trim().to_string(),
        }
    })
}

fn parse_base64_attr(
    node: roxmltree::Node<'_, '_>,
    attr: &str,
    options: &DecryptOptions,
) -> Result<Vec<u8>> {
    let raw = required_attr(node, attr)?;
    if raw.len() > options.max_field_len {
        return Err(AgileDecryptError::FieldTooLarge {
            field: attr.to_string(),
            len: raw.len(),
            max: options.max_field_len,
        });
    }
    decode_base64_lenient(raw).map_err(|source| AgileDecryptError::Base64Decode {
        element: node.tag_name().name().to_string(),
        attr: attr.to_string(),
        source,
    })
}

/// Base64 decode accepting embedded whitespace and missing `=` padding.
fn decode_base64_lenient(raw: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let cleaned: Vec<u8> = raw
        .bytes()
        .filter(|b| !matches!(b, b'\r' | b'\n' | b'\t' | b' '))
        .collect();
    STANDARD
        .decode(&cleaned)
        .or_else(|_| STANDARD_NO_PAD.decode(&cleaned))
}
