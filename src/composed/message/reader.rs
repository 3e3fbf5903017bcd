use std::io::{BufRead, Read};

use log::{debug, warn};

use super::decrypt::{self, EncryptedKeys, PromptFn};
use super::source::MessageSource;
use super::types::{MessageDetails, PendingSignature};
use crate::composed::{KeyRef, KeyRing};
use crate::config::Config;
use crate::crypto::hash::Hasher;
use crate::crypto::sym::StreamDecryptor;
use crate::errors::{bail, ensure, unsupported_err, Result};
use crate::packet::{
    Decompressor, KeyFlags, LiteralDataHeader, OnePassSignature, Packet, PacketBodyReader,
    PacketHeader, PacketTrait, SignatureType, SEIPD_VERSION,
};
use crate::parsing_reader::BufReadParsing;
use crate::types::{CompressionAlgorithm, KeyId, Tag};
use crate::util::CanonicalLines;

/// Largest cipher block plus the two quick check octets.
const QUICK_CHECK_LEN: u64 = 18;

fn hasher_for(config: &Config, ops: &OnePassSignature) -> Result<Hasher> {
    if !config.is_public_key_enabled(ops.pub_algorithm) {
        unsupported_err!("public key algorithm {:?} is not enabled", ops.pub_algorithm);
    }
    if !config.is_hash_enabled(ops.hash_algorithm) {
        unsupported_err!("hash function {} is not enabled", ops.hash_algorithm);
    }
    ops.hash_algorithm.new_hasher()
}

fn signing_key(keyring: &KeyRing, id: KeyId) -> Option<KeyRef<'_>> {
    let mut usage = KeyFlags::default();
    usage.set_sign(true);
    keyring.keys_by_id_usage(id, usage).into_iter().next()
}

/// Parses a message, decrypting and decompressing as needed, up to its literal data.
///
/// The returned details stream the literal data. Keys for decryption and signature checks are
/// looked up in `keyring`. If no unlocked key can decrypt the message, `prompt` is asked for
/// passphrases, see [`PromptFn`]. Without a prompt such messages fail with
/// `Error::KeyIncorrect`.
pub fn read_message<'a, R: BufRead + 'a>(
    source: R,
    keyring: &'a KeyRing,
    mut prompt: Option<&mut PromptFn<'_>>,
    config: &Config,
) -> Result<MessageDetails<'a>> {
    let mut source = MessageSource::new(source);
    let mut keys = EncryptedKeys::default();

    let mut is_encrypted = false;
    let mut is_symmetrically_encrypted = false;
    let mut encrypted_to_key_ids = Vec::new();
    let mut decrypted_with = None;
    let mut pending = PendingSignature::None;

    loop {
        ensure!(source.has_remaining()?, "no literal data found");
        let header = PacketHeader::try_from_reader(&mut source)?;
        let tag = header.tag();
        debug!("message packet {:?}", tag);

        match tag {
            Tag::SymEncryptedData | Tag::SymEncryptedProtectedData => {
                let protected = tag == Tag::SymEncryptedProtectedData;
                is_encrypted = true;

                let mut body = PacketBodyReader::new(header, Box::new(source))?;
                if protected {
                    let version = body.read_u8()?;
                    if version != SEIPD_VERSION {
                        unsupported_err!("encrypted data version {}", version);
                    }
                }
                let mut head = Vec::new();
                body.by_ref().take(QUICK_CHECK_LEN).read_to_end(&mut head)?;

                let session =
                    decrypt::session_key(keyring, &keys, &head, prompt.as_deref_mut(), config)?;
                decrypted_with = session.decrypted_with;
                keys.clear();

                let decryptor = StreamDecryptor::new(
                    session.alg,
                    protected,
                    &session.key,
                    &head,
                    body,
                )?;
                source = MessageSource::Decrypted(decryptor);
                ensure!(
                    source.depth() <= config.max_nesting_depth,
                    "too many layers of packets"
                );
            }
            Tag::CompressedData => {
                let mut body = PacketBodyReader::new(header, Box::new(source))?;
                let alg = CompressionAlgorithm::from(body.read_u8()?);
                source = MessageSource::Decompressed(Decompressor::from_reader(alg, body)?);
                ensure!(
                    source.depth() <= config.max_nesting_depth,
                    "too many layers of packets"
                );
            }
            Tag::LiteralData => {
                let mut body = PacketBodyReader::new(header, source)?;
                let literal_data = LiteralDataHeader::try_from_reader(&mut body)?;
                debug!("literal data {:?}", literal_data);

                let (hasher, text, signed_by_key_id) = match &pending {
                    PendingSignature::None => (None, false, None),
                    PendingSignature::OnePass(ops) => (
                        Some(hasher_for(config, ops)?),
                        ops.typ == SignatureType::Text,
                        Some(ops.key_id),
                    ),
                    PendingSignature::Prefixed(sig) => (
                        Some(sig.new_hasher(config)?),
                        sig.typ() == SignatureType::Text,
                        sig.issuer(),
                    ),
                };
                let signed_by = signed_by_key_id.and_then(|id| signing_key(keyring, id));

                return Ok(MessageDetails {
                    is_encrypted,
                    is_symmetrically_encrypted,
                    encrypted_to_key_ids,
                    decrypted_with,
                    is_signed: hasher.is_some(),
                    signed_by_key_id,
                    signed_by,
                    literal_data,
                    signature: None,
                    signature_error: None,
                    body: Some(body),
                    hasher,
                    canonical: text.then(CanonicalLines::default),
                    pending,
                });
            }
            _ => {
                let mut body = PacketBodyReader::new(header, &mut source)?;
                let packet = match Packet::try_from_reader(header, &mut body) {
                    Ok(packet) => Some(packet),
                    Err(err)
                        if err.is_unsupported()
                            && matches!(
                                tag,
                                Tag::PublicKeyEncryptedSessionKey
                                    | Tag::SymKeyEncryptedSessionKey
                                    | Tag::Other(_)
                            ) =>
                    {
                        warn!("skipping packet: {}", err);
                        None
                    }
                    Err(err) => return Err(err),
                };
                body.drain()?;

                match packet {
                    Some(Packet::PublicKeyEncryptedSessionKey(pkesk)) => {
                        is_encrypted = true;
                        encrypted_to_key_ids.push(*pkesk.id());
                        keys.public.push(pkesk);
                    }
                    Some(Packet::SymKeyEncryptedSessionKey(skesk)) => {
                        is_encrypted = true;
                        is_symmetrically_encrypted = true;
                        keys.symmetric.push(skesk);
                    }
                    Some(Packet::OnePassSignature(ops)) => {
                        if ops.last == 0 || !matches!(pending, PendingSignature::None) {
                            unsupported_err!("nested signatures");
                        }
                        pending = PendingSignature::OnePass(ops);
                    }
                    Some(Packet::Signature(sig)) => {
                        if !matches!(pending, PendingSignature::None) {
                            unsupported_err!("nested signatures");
                        }
                        pending = PendingSignature::Prefixed(sig);
                    }
                    Some(Packet::Marker(_)) | None => {}
                    Some(packet) => {
                        bail!("unexpected {:?} packet in message", packet.tag())
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;
    use crate::crypto::public_key::PublicKeyAlgorithm;
    use crate::errors::Error;
    use crate::packet::LiteralData;
    use crate::util::timestamp_from_u32;

    fn literal(data: &'static [u8]) -> Vec<u8> {
        let packet =
            LiteralData::from_bytes(b"hello.txt", Bytes::from_static(data), timestamp_from_u32(1))
                .unwrap();
        let mut out = Vec::new();
        packet.to_writer_with_header(&mut out).unwrap();
        out
    }

    /// Wraps `inner` into a compressed data packet using no compression.
    fn stored(inner: &[u8]) -> Vec<u8> {
        let len = inner.len() + 1;
        let mut out = Vec::new();
        PacketHeader::new_fixed(Tag::CompressedData, len as u32)
            .write_for_len(len, &mut out)
            .unwrap();
        out.push(0);
        out.extend_from_slice(inner);
        out
    }

    #[test]
    fn plain_literal() {
        let _ = pretty_env_logger::try_init();

        let keyring = KeyRing::default();
        let data = literal(b"plain text\n");
        let mut md = read_message(&data[..], &keyring, None, &Config::default()).unwrap();
        assert!(!md.is_encrypted);
        assert!(!md.is_signed);
        assert_eq!(&md.literal_data.file_name[..], b"hello.txt");
        assert_eq!(md.read_body().unwrap(), b"plain text\n");
        assert!(md.is_done());
        assert!(md.signature.is_none());
        assert!(md.signature_error.is_none());
    }

    #[test]
    fn nested_compression_within_limit() {
        let _ = pretty_env_logger::try_init();

        let mut data = literal(b"deep");
        for _ in 0..4 {
            data = stored(&data);
        }
        let keyring = KeyRing::default();
        let mut md = read_message(&data[..], &keyring, None, &Config::default()).unwrap();
        assert_eq!(md.read_body().unwrap(), b"deep");
    }

    #[test]
    fn nesting_limit() {
        let _ = pretty_env_logger::try_init();

        let mut data = literal(b"deep");
        for _ in 0..5 {
            data = stored(&data);
        }
        let config = crate::config::ConfigBuilder::default()
            .max_nesting_depth(4)
            .build()
            .unwrap();
        let keyring = KeyRing::default();
        let err = read_message(&data[..], &keyring, None, &config).unwrap_err();
        assert!(
            err.to_string().contains("too many layers of packets"),
            "{err}"
        );
    }

    #[test]
    fn missing_literal_data() {
        let _ = pretty_env_logger::try_init();

        let keyring = KeyRing::default();
        let err = read_message(&[][..], &keyring, None, &Config::default()).unwrap_err();
        assert!(matches!(err, Error::Structural { .. }), "{err:?}");

        // a lone marker packet
        let marker = [0xa8, 0x03, b'P', b'G', b'P'];
        let err = read_message(&marker[..], &keyring, None, &Config::default()).unwrap_err();
        assert!(matches!(err, Error::Structural { .. }), "{err:?}");
    }

    #[test]
    fn unknown_signer() {
        let _ = pretty_env_logger::try_init();

        let ops = OnePassSignature::new(
            SignatureType::Binary,
            HashAlgorithm::Sha256,
            PublicKeyAlgorithm::RSA,
            KeyId::from(0x1122_3344_5566_7788),
        );
        let mut data = Vec::new();
        ops.to_writer_with_header(&mut data).unwrap();
        data.extend(literal(b"signed"));

        let keyring = KeyRing::default();
        let mut md = read_message(&data[..], &keyring, None, &Config::default()).unwrap();
        assert!(md.is_signed);
        assert_eq!(md.signed_by_key_id, Some(KeyId::from(0x1122_3344_5566_7788)));
        assert!(md.signed_by.is_none());

        // the closing signature packet is missing
        assert_eq!(md.read_body().unwrap(), b"signed");
        assert!(md.signature.is_none());
        assert!(md.signature_error.is_some());
        assert!(!md.is_verified());
    }

    #[test]
    fn nested_one_pass_signatures() {
        let _ = pretty_env_logger::try_init();

        let mut ops = OnePassSignature::new(
            SignatureType::Binary,
            HashAlgorithm::Sha256,
            PublicKeyAlgorithm::RSA,
            KeyId::from(1),
        );
        ops.last = 0;
        let mut data = Vec::new();
        ops.to_writer_with_header(&mut data).unwrap();
        data.extend(literal(b"signed"));

        let keyring = KeyRing::default();
        let err = read_message(&data[..], &keyring, None, &Config::default()).unwrap_err();
        assert!(err.is_unsupported(), "{err:?}");
    }

    #[test]
    fn encrypted_without_keys() {
        let _ = pretty_env_logger::try_init();

        // protected data packet with version and 18 bytes of garbage
        let mut data = vec![0xd2, 19, 1];
        data.extend_from_slice(&[0x55; 18]);

        let keyring = KeyRing::default();
        let mut prompt = |_: &[KeyRef<'_>], _: bool| -> Result<Vec<u8>> { Ok(b"pw".to_vec()) };
        let err =
            read_message(&data[..], &keyring, Some(&mut prompt), &Config::default()).unwrap_err();
        assert!(matches!(err, Error::KeyIncorrect), "{err:?}");
    }
}
