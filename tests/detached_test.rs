mod common;

use pgp_core::composed::{
    armored_detach_sign, check_armored_detached_signature, check_detached_signature, detach_sign,
    Entity, KeyRing,
};
use pgp_core::config::{Config, ConfigBuilder};
use pgp_core::crypto::hash::HashAlgorithm;
use pgp_core::errors::Error;
use pgp_core::types::KeyId;
use testresult::TestResult;

use common::*;

fn check_signer(ring: &KeyRing, signature: &[u8], config: &Config, expected: u64) -> TestResult {
    let signer = check_detached_signature(ring, SIGNED_INPUT.as_bytes(), signature, config)?;
    assert_eq!(signer.entity.key_id(), KeyId::from(expected));
    Ok(())
}

#[test]
fn test_detached_signature() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let config = Config::default();
    let ring = KeyRing::from_bytes(&fixture_hex("testKeys1And2Hex.hex"))?;
    for name in [
        "detachedSignatureHex.hex",
        "detachedSignatureTextHex.hex",
        "detachedSignatureV3TextHex.hex",
    ] {
        check_signer(&ring, &fixture_hex(name), &config, TEST_KEY_1)?;
    }
    Ok(())
}

#[test]
fn test_detached_signature_bad_input() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let ring = KeyRing::from_bytes(&fixture_hex("testKeys1And2Hex.hex"))?;
    let signed = format!("{SIGNED_INPUT}X");
    let err = check_detached_signature(
        &ring,
        signed.as_bytes(),
        &fixture_hex("detachedSignatureHex.hex")[..],
        &Config::default(),
    )
    .unwrap_err();
    // the signer is known, the signature is wrong
    assert!(
        matches!(err, Error::SignatureMismatch { key_id: Some(id) } if id == KeyId::from(TEST_KEY_1)),
        "{err:?}"
    );
    Ok(())
}

#[test]
fn test_detached_signature_dsa() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let ring = KeyRing::from_bytes(&fixture_hex("dsaTestKeyHex.hex"))?;
    check_signer(
        &ring,
        &fixture_hex("detachedSignatureDSAHex.hex"),
        &Config::default(),
        TEST_KEY_3,
    )
}

#[test]
fn test_skips_disabled_hash() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let config = ConfigBuilder::default()
        .hash_algorithms(vec![
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha224,
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ])
        .build()?;

    let ring = KeyRing::from_bytes(&fixture_hex("dsaTestKeyHex.hex"))?;
    let mut signatures = fixture_hex("missingHashFunctionHex.hex");
    signatures.extend(fixture_hex("detachedSignatureDSAHex.hex"));
    check_signer(&ring, &signatures, &config, TEST_KEY_3)?;

    // nothing else to go on
    let ring = KeyRing::from_bytes(&fixture_hex("testKeys1And2Hex.hex"))?;
    let err = check_detached_signature(
        &ring,
        &b""[..],
        &fixture_hex("missingHashFunctionHex.hex")[..],
        &config,
    )
    .unwrap_err();
    assert!(matches!(err, Error::UnknownIssuer { .. }), "{err:?}");
    Ok(())
}

#[test]
fn test_unknown_hash() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let ring = KeyRing::from_bytes(&fixture_hex("testKeys1And2Hex.hex"))?;
    let err = check_detached_signature(
        &ring,
        &b""[..],
        &fixture_hex("unknownHashFunctionHex.hex")[..],
        &Config::default(),
    )
    .unwrap_err();
    assert!(err.is_unsupported(), "{err:?}");
    assert!(err.to_string().contains("hash "), "{err}");
    Ok(())
}

#[test]
fn test_not_a_signature() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let ring = KeyRing::from_bytes(&fixture_hex("testKeys1And2Hex.hex"))?;
    let err = check_detached_signature(
        &ring,
        SIGNED_INPUT.as_bytes(),
        &fixture_hex("dsaTestKeyHex.hex")[..],
        &Config::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }), "{err:?}");
    Ok(())
}

fn dsa_private_key() -> Entity {
    let ring = KeyRing::from_bytes(&fixture_hex("dsaTestKeyPrivateHex.hex")).unwrap();
    ring.into_entities().remove(0)
}

#[test]
fn test_sign_detached_dsa() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let config = Config::default();
    let entity = dsa_private_key();
    assert!(entity.secret_key.is_some());

    let mut signature = Vec::new();
    detach_sign(&mut signature, &entity, SIGNED_INPUT.as_bytes(), &config)?;

    let ring = KeyRing::from(vec![entity]);
    check_signer(&ring, &signature, &config, TEST_KEY_3)?;

    let err = check_detached_signature(&ring, &b"other"[..], &signature[..], &config).unwrap_err();
    assert!(matches!(err, Error::SignatureMismatch { .. }), "{err:?}");
    Ok(())
}

#[test]
fn test_sign_armored_detached_dsa() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let config = Config::default();
    let entity = dsa_private_key();

    let mut signature = Vec::new();
    armored_detach_sign(&mut signature, &entity, SIGNED_INPUT.as_bytes(), &config)?;
    assert!(signature.starts_with(b"-----BEGIN PGP SIGNATURE-----"));

    let ring = KeyRing::from(vec![entity]);
    let signer =
        check_armored_detached_signature(&ring, SIGNED_INPUT.as_bytes(), &signature[..], &config)?;
    assert_eq!(signer.key_id(), KeyId::from(TEST_KEY_3));
    Ok(())
}

#[test]
fn test_sign_without_secret() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let ring = KeyRing::from_bytes(&fixture_hex("dsaTestKeyHex.hex"))?;
    let mut out = Vec::new();
    let err = detach_sign(
        &mut out,
        &ring.entities()[0],
        SIGNED_INPUT.as_bytes(),
        &Config::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }), "{err:?}");
    assert!(out.is_empty());
    Ok(())
}
