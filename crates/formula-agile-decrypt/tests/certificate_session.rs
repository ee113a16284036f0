mod common;

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::{Padding, Rsa};
use openssl::x509::{X509Builder, X509NameBuilder, X509};

use common::*;
use formula_agile_decrypt::{
    AgileDecryptError, CertificateEntry, DecryptionSession, EncryptionHeader, EncryptionVerifier,
};

fn make_identity(common_name: &str, serial: u32) -> (PKey<Private>, X509) {
    let rsa = Rsa::generate(2048).expect("generate RSA key");
    let pkey = PKey::from_rsa(rsa).expect("pkey");

    let mut name_builder = X509NameBuilder::new().expect("x509 name builder");
    name_builder
        .append_entry_by_text("CN", common_name)
        .expect("CN");
    let name = name_builder.build();

    let mut builder = X509Builder::new().expect("x509 builder");
    builder.set_version(2).expect("set version");
    let serial = BigNum::from_u32(serial)
        .expect("serial bn")
        .to_asn1_integer()
        .expect("serial integer");
    builder.set_serial_number(&serial).expect("serial");
    builder.set_subject_name(&name).expect("subject name");
    builder.set_issuer_name(&name).expect("issuer name");
    builder.set_pubkey(&pkey).expect("pubkey");
    builder
        .set_not_before(&Asn1Time::days_from_now(0).expect("not before"))
        .expect("set not before");
    builder
        .set_not_after(&Asn1Time::days_from_now(365).expect("not after"))
        .expect("set not after");
    builder
        .sign(&pkey, MessageDigest::sha256())
        .expect("sign");
    (pkey, builder.build())
}

fn certificate_entry(pkey: &PKey<Private>, cert: &X509, content_key: &[u8]) -> CertificateEntry {
    let der = cert.to_der().expect("DER");
    let rsa = pkey.rsa().expect("rsa");
    let mut wrapped = vec![0u8; rsa.size() as usize];
    let len = rsa
        .public_encrypt(content_key, &mut wrapped, Padding::PKCS1)
        .expect("wrap content key");
    wrapped.truncate(len);
    let fixture = sha512_fixture();
    let cert_verifier = fixture
        .header
        .hash_algorithm
        .hmac(content_key, &der)
        .expect("hmac");
    CertificateEntry {
        certificate_der: der,
        encrypted_key_value: wrapped,
        cert_verifier,
    }
}

/// Certificate-protected descriptor reusing the SHA-512 fixture's integrity material.
fn certificate_descriptor(entries: Vec<CertificateEntry>) -> (EncryptionHeader, EncryptionVerifier) {
    let fixture = sha512_fixture();
    let mut verifier = fixture.verifier;
    verifier.salt.clear();
    verifier.encrypted_verifier_hash_input.clear();
    verifier.encrypted_verifier_hash_value.clear();
    verifier.encrypted_key_value.clear();
    verifier.certificates = entries;
    (fixture.header, verifier)
}

#[test]
fn matching_certificate_unwraps_content_key_and_streams() {
    let fixture = sha512_fixture();
    let (pkey, cert) = make_identity("Agile Recipient", 1);
    let (header, verifier) =
        certificate_descriptor(vec![certificate_entry(&pkey, &cert, &fixture.content_key)]);
    let plaintext = patterned_bytes(4096 * 2 + 1);
    let package = encrypt_package(&header, &fixture.content_key, &plaintext, 0x00);

    let mut session = DecryptionSession::new(header, verifier);
    assert!(session.verify_certificate(&pkey, &cert).expect("verify"));
    assert_eq!(session.content_key(), Some(fixture.content_key.as_slice()));
    assert_eq!(session.integrity_hmac_key(), Some(fixture.hmac_key.as_slice()));
    assert_eq!(session.integrity_hmac_value(), Some(fixture.hmac_value.as_slice()));
    assert_eq!(session.decrypt_to_vec(package.as_slice()).unwrap(), plaintext);
}

#[test]
fn picks_the_entry_for_the_supplied_certificate() {
    let fixture = sha512_fixture();
    let (pkey_a, cert_a) = make_identity("Recipient A", 10);
    let (pkey_b, cert_b) = make_identity("Recipient B", 11);
    let (header, verifier) = certificate_descriptor(vec![
        certificate_entry(&pkey_a, &cert_a, &fixture.content_key),
        certificate_entry(&pkey_b, &cert_b, &fixture.content_key),
    ]);

    let mut session = DecryptionSession::new(header, verifier);
    assert!(session.verify_certificate(&pkey_b, &cert_b).expect("verify"));
    assert_eq!(session.content_key(), Some(fixture.content_key.as_slice()));
}

#[test]
fn unknown_certificate_returns_false() {
    let fixture = sha512_fixture();
    let (pkey, cert) = make_identity("Recipient", 20);
    let (other_pkey, other_cert) = make_identity("Stranger", 21);
    let (header, verifier) =
        certificate_descriptor(vec![certificate_entry(&pkey, &cert, &fixture.content_key)]);

    let mut session = DecryptionSession::new(header, verifier);
    assert!(!session
        .verify_certificate(&other_pkey, &other_cert)
        .expect("verify"));
    assert!(!session.is_verified());
    assert!(matches!(
        session.open_decrypted_stream(&[0u8; 8][..]),
        Err(AgileDecryptError::NotVerified)
    ));
}

#[test]
fn mismatched_private_key_returns_false() {
    let fixture = sha512_fixture();
    let (pkey, cert) = make_identity("Recipient", 30);
    let (other_pkey, _) = make_identity("Stranger", 31);
    let (header, verifier) =
        certificate_descriptor(vec![certificate_entry(&pkey, &cert, &fixture.content_key)]);

    let mut session = DecryptionSession::new(header, verifier);
    assert!(!session.verify_certificate(&other_pkey, &cert).expect("verify"));
    assert_eq!(session.content_key(), None);
}

#[test]
fn tampered_cert_verifier_returns_false() {
    let fixture = sha512_fixture();
    let (pkey, cert) = make_identity("Recipient", 40);
    let mut entry = certificate_entry(&pkey, &cert, &fixture.content_key);
    entry.cert_verifier[0] ^= 0xFF;
    let (header, verifier) = certificate_descriptor(vec![entry]);

    let mut session = DecryptionSession::new(header, verifier);
    assert!(!session.verify_certificate(&pkey, &cert).expect("verify"));
}

#[test]
fn password_on_certificate_only_descriptor_is_an_error() {
    let fixture = sha512_fixture();
    let (pkey, cert) = make_identity("Recipient", 50);
    let (header, verifier) =
        certificate_descriptor(vec![certificate_entry(&pkey, &cert, &fixture.content_key)]);

    let mut session = DecryptionSession::new(header, verifier);
    assert!(matches!(
        session.verify_password(PASSWORD),
        Err(AgileDecryptError::MissingKeyEncryptor { kind: "password" })
    ));
}

#[test]
fn certificate_on_password_only_descriptor_returns_false() {
    let fixture = sha1_fixture();
    let (pkey, cert) = make_identity("Recipient", 60);
    let mut session = DecryptionSession::new(fixture.header, fixture.verifier);

    assert!(!session.verify_certificate(&pkey, &cert).expect("verify"));
    assert!(!session.is_verified());
    assert_eq!(session.content_key(), None);
    assert!(matches!(
        session.verify_password(PASSWORD),
        Err(AgileDecryptError::AlreadyVerified)
    ));
}
