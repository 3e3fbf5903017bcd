mod common;

use std::cell::Cell;

use pgp_core::armor;
use pgp_core::composed::{read_message, KeyRef, KeyRing};
use pgp_core::config::Config;
use pgp_core::errors::{Error, Result};
use pgp_core::packet::SignatureVersion;
use pgp_core::types::KeyId;
use testresult::TestResult;

use common::*;

fn check_signed_message(fixture_name: &str, expected: &str) -> TestResult {
    let ring = KeyRing::from_bytes(&fixture_hex("testKeys1And2Hex.hex"))?;
    let data = fixture_hex(fixture_name);
    let config = Config::default();

    let mut md = read_message(&data[..], &ring, None, &config)?;
    assert!(md.is_signed);
    assert!(!md.is_encrypted);
    assert_eq!(md.signed_by_key_id, Some(KeyId::from(TEST_KEY_1)));
    assert!(md.signed_by.is_some());
    assert!(md.signature.is_none());

    let body = md.read_body()?;
    assert_eq!(String::from_utf8(body)?, expected);
    assert!(md.signature_error.is_none(), "{:?}", md.signature_error);
    assert!(md.signature.is_some());
    assert!(md.is_verified());
    Ok(())
}

#[test]
fn test_signed_message() -> TestResult {
    let _ = pretty_env_logger::try_init();

    check_signed_message("signedMessageHex.hex", SIGNED_INPUT)
}

#[test]
fn test_signed_text_message() -> TestResult {
    let _ = pretty_env_logger::try_init();

    check_signed_message("signedTextMessageHex.hex", SIGNED_TEXT_INPUT)
}

#[test]
fn test_campbell_quine() {
    let _ = pretty_env_logger::try_init();

    let ring = KeyRing::default();
    let data = fixture_hex("campbellQuine.hex");
    let err = read_message(&data[..], &ring, None, &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Structural { .. }), "{err:?}");
    assert!(
        err.to_string().contains("too many layers of packets"),
        "{err}"
    );
}

fn check_signed_encrypted(keys: &str, message: &str, signer: u64, recipient: u64) -> TestResult {
    let ring = KeyRing::from_bytes(&fixture_hex(keys))?;
    let data = fixture_hex(message);
    let config = Config::default();
    let locked = lock_states(&ring);

    let mut prompt = |keys: &[KeyRef<'_>], symmetric: bool| -> Result<Vec<u8>> {
        assert!(!symmetric, "message was marked as symmetrically encrypted");
        assert!(!keys.is_empty(), "no keys requested");
        Ok(b"passphrase".to_vec())
    };
    let mut md = read_message(&data[..], &ring, Some(&mut prompt), &config)?;

    assert!(md.is_encrypted);
    assert!(!md.is_symmetrically_encrypted);
    assert_eq!(md.encrypted_to_key_ids, vec![KeyId::from(recipient)]);
    assert_eq!(md.decrypted_with, Some(KeyId::from(recipient)));
    assert!(md.is_signed);
    assert_eq!(md.signed_by_key_id, Some(KeyId::from(signer)));
    assert!(md.signed_by.is_some());

    let body = md.read_body()?;
    assert_eq!(body, b"Signed and encrypted message\n");
    assert!(md.signature_error.is_none(), "{:?}", md.signature_error);
    assert!(md.signature.is_some());

    // unlocking happened on copies
    assert_eq!(lock_states(&ring), locked);
    Ok(())
}

fn lock_states(ring: &KeyRing) -> Vec<(KeyId, bool)> {
    ring.entities()
        .iter()
        .flat_map(|entity| entity.keys())
        .filter_map(|key| Some((key.key_id(), key.secret_key?.is_locked())))
        .collect()
}

#[test]
fn test_signed_encrypted_message() -> TestResult {
    let _ = pretty_env_logger::try_init();

    check_signed_encrypted(
        "testKeys1And2PrivateHex.hex",
        "signedEncryptedMessageHex.hex",
        0xa34d_7e18_c20c_31bb,
        0x2a67_d686_60df_41c7,
    )?;
    check_signed_encrypted(
        "dsaElGamalTestKeysHex.hex",
        "signedEncryptedMessage2Hex.hex",
        0x33af_447c_cd75_9b09,
        0xcf6a_7abc_d43e_3673,
    )
}

#[test]
fn test_locked_keys_stay_locked() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let ring = KeyRing::from_bytes(&fixture_hex("dsaElGamalTestKeysHex.hex"))?;
    let data = fixture_hex("signedEncryptedMessage2Hex.hex");

    let mut prompt = |_: &[KeyRef<'_>], _: bool| -> Result<Vec<u8>> { Ok(b"passphrase".to_vec()) };
    let mut md = read_message(&data[..], &ring, Some(&mut prompt), &Config::default())?;
    md.read_body()?;

    let subkey = &ring.entities()[0].subkeys[0];
    assert!(subkey.secret_key.as_ref().is_some_and(|key| key.is_locked()));
    Ok(())
}

#[test]
fn test_wrong_passphrase_repeated() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let ring = KeyRing::from_bytes(&fixture_hex("dsaElGamalTestKeysHex.hex"))?;
    let data = fixture_hex("signedEncryptedMessage2Hex.hex");

    let calls = Cell::new(0);
    let mut prompt = |_: &[KeyRef<'_>], _: bool| -> Result<Vec<u8>> {
        calls.set(calls.get() + 1);
        Ok(b"wrong".to_vec())
    };
    let err = read_message(&data[..], &ring, Some(&mut prompt), &Config::default()).unwrap_err();
    assert!(matches!(err, Error::KeyIncorrect), "{err:?}");
    assert_eq!(calls.get(), 2);

    // no prompt at all
    let err = read_message(&data[..], &ring, None, &Config::default()).unwrap_err();
    assert!(matches!(err, Error::KeyIncorrect), "{err:?}");
    Ok(())
}

#[test]
fn test_unspecified_recipient() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let ring = KeyRing::from_bytes(&fixture_hex("testKeys1And2PrivateHex.hex"))?;
    let data = fixture_hex("recipientUnspecifiedHex.hex");

    let mut md = read_message(&data[..], &ring, None, &Config::default())?;
    assert!(md.is_encrypted);
    assert_eq!(md.encrypted_to_key_ids, vec![KeyId::WILDCARD]);
    assert_eq!(md.read_body()?, b"Recipient unspecified\n");
    Ok(())
}

#[test]
fn test_symmetrically_encrypted() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let ring = KeyRing::default();
    let data = fixture_hex("symmetricallyEncryptedCompressedHex.hex");

    let first = Cell::new(true);
    let mut prompt = |keys: &[KeyRef<'_>], symmetric: bool| -> Result<Vec<u8>> {
        assert!(keys.is_empty());
        assert!(symmetric);
        if first.replace(false) {
            return Ok(b"wrongpassword".to_vec());
        }
        Ok(b"password".to_vec())
    };
    let mut md = read_message(&data[..], &ring, Some(&mut prompt), &Config::default())?;
    assert!(md.is_encrypted);
    assert!(md.is_symmetrically_encrypted);
    assert_eq!(md.decrypted_with, None);
    assert!(!md.is_signed);
    assert_eq!(md.literal_data.created.timestamp(), 1_295_992_998);

    assert_eq!(md.read_body()?, b"Symmetrically encrypted.\n");
    assert!(!first.get());
    Ok(())
}

#[test]
fn test_modification_detected() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let ring = KeyRing::default();
    let mut data = fixture_hex("symmetricallyEncryptedCompressedHex.hex");
    // the last octets are the encrypted modification detection code
    let last = data.len() - 1;
    data[last] ^= 0x01;

    let mut prompt = |_: &[KeyRef<'_>], _: bool| -> Result<Vec<u8>> { Ok(b"password".to_vec()) };
    let mut md = read_message(&data[..], &ring, Some(&mut prompt), &Config::default())?;
    let err = md.read_body().unwrap_err();
    assert!(matches!(err, Error::MdcError), "{err:?}");
    Ok(())
}

#[test]
fn test_truncated_messages() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let ring = KeyRing::default();
    for msg in [
        "8c040402000aa430aa8228b9248b01fc899a91197130303030",
        "9303000130303030303030303030983002303030303030030000000130",
    ] {
        let data = hex::decode(msg)?;
        let mut prompt =
            |_: &[KeyRef<'_>], _: bool| -> Result<Vec<u8>> { Ok(b"insecure".to_vec()) };
        let res = read_message(&data[..], &ring, Some(&mut prompt), &Config::default());
        assert!(res.is_err(), "{msg}");
    }
    Ok(())
}

#[test]
fn test_v3_signature_message() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let config = Config::default();
    let ring = KeyRing::from_armor(
        &fixture("keyV4forVerifyingSignedMessageV3.asc")[..],
        &config,
    )?;
    let (_, _, data) = armor::decode(&fixture("signedMessageV3.asc")[..])?;

    let mut md = read_message(&data[..], &ring, None, &config)?;
    md.read_body()?;
    assert!(md.signature_error.is_none(), "{:?}", md.signature_error);
    let signature = md.signature.as_ref().expect("signature");
    assert_eq!(signature.version(), SignatureVersion::V3);
    Ok(())
}

#[test]
fn test_eddsa_message() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let config = Config::default();
    let ring = KeyRing::from_armor(&fixture("eddsaPublicKey.asc")[..], &config)?;
    let (_, _, data) = armor::decode(&fixture("eddsaSignature.asc")[..])?;

    let mut md = read_message(&data[..], &ring, None, &config)?;
    let body = md.read_body()?;
    assert!(md.signature_error.is_none(), "{:?}", md.signature_error);
    assert!(md.signature.is_some());
    assert_eq!(
        body,
        b"Hello early adopters. Here is some EdDSA support. The third.\n"
    );
    Ok(())
}

fn multi_sig_key(sigs: &[&str]) -> Vec<u8> {
    let mut out = fixture_hex("keyAndIds.hex");
    out.extend(fixture_hex("subkey.hex"));
    for sig in sigs {
        out.extend(fixture_hex(sig));
    }
    out
}

#[test]
fn test_encryption_binding_wins() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let config = config_at(2018, 9, 10);
    let ring = KeyRing::from_reader_with_config(
        &multi_sig_key(&["flagSignSig.hex", "flagEncryptSig.hex"])[..],
        &config,
    )?;
    let subkey_id = ring.entities()[0].subkeys[0].key_id();
    assert!(!ring.entities()[0].subkeys[0].flags.sign());

    let (_, _, data) = armor::decode(&fixture("multiSigMessage.asc")[..])?;
    let mut md = read_message(&data[..], &ring, None, &config)?;
    assert!(md.is_signed);
    assert_eq!(md.signed_by_key_id, Some(subkey_id));
    assert!(md.signed_by.is_none());

    md.read_body()?;
    assert!(
        matches!(md.signature_error, Some(Error::UnknownIssuer { .. })),
        "{:?}",
        md.signature_error
    );
    Ok(())
}

#[test]
fn test_sign_binding_wins() -> TestResult {
    let _ = pretty_env_logger::try_init();

    let config = config_at(2018, 9, 10);
    let ring =
        KeyRing::from_reader_with_config(&multi_sig_key(&["flagSignSig.hex"])[..], &config)?;
    let subkey_id = ring.entities()[0].subkeys[0].key_id();
    assert!(ring.entities()[0].subkeys[0].flags.sign());

    let (_, _, data) = armor::decode(&fixture("multiSigMessage.asc")[..])?;
    let md = read_message(&data[..], &ring, None, &config)?;
    assert!(md.is_signed);
    assert_eq!(md.signed_by_key_id, Some(subkey_id));
    let signer = md.signed_by.expect("signing key");
    assert_eq!(signer.key_id(), subkey_id);
    Ok(())
}
