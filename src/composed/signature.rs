use std::io::{self, BufRead, Read};

use log::debug;

use crate::armor::{self, BlockType};
use crate::composed::{Entity, KeyRef, KeyRing};
use crate::config::Config;
use crate::errors::{Error, Result};
use crate::packet::{
    KeyFlags, Packet, PacketParser, PacketTrait, SignatureConfig, SignatureType, Subpacket,
    SubpacketData,
};

/// Checks a detached signature over `signed`.
///
/// The signature input may hold several signature packets. Signatures by keys not in the key
/// ring, or using a hash algorithm that is disabled, are passed over. The first remaining one
/// decides: its verification result is returned, along with the key that made it.
pub fn check_detached_signature<'a, R: Read, S: BufRead>(
    keyring: &'a KeyRing,
    signed: R,
    signature: S,
    config: &Config,
) -> Result<KeyRef<'a>> {
    let mut usage = KeyFlags::default();
    usage.set_sign(true);

    let mut last_issuer = None;
    for packet in PacketParser::new(signature) {
        let sig = match packet? {
            Packet::Signature(sig) => sig,
            Packet::Marker(_) => continue,
            packet => {
                return Err(Error::InvalidArgument {
                    message: format!("expected a signature packet, found {:?}", packet.tag()),
                })
            }
        };

        let Some(issuer) = sig.issuer() else {
            debug!("skipping signature without issuer");
            continue;
        };
        last_issuer = Some(issuer);

        let hash_alg = sig.hash_alg();
        if hash_alg.is_known() && !config.is_hash_enabled(hash_alg) {
            debug!("skipping signature by {:X}, {} is disabled", issuer, hash_alg);
            continue;
        }

        let Some(key) = keyring.keys_by_id_usage(issuer, usage).into_iter().next() else {
            debug!("skipping signature by unknown key {:X}", issuer);
            continue;
        };

        sig.verify(config, key.public_key, signed)?;
        return Ok(key);
    }

    Err(Error::UnknownIssuer {
        key_id: last_issuer,
    })
}

/// Checks an armored detached signature over `signed`.
pub fn check_armored_detached_signature<'a, R: Read, S: BufRead>(
    keyring: &'a KeyRing,
    signed: R,
    signature: S,
    config: &Config,
) -> Result<KeyRef<'a>> {
    let (typ, _, body) = armor::decode(signature)?;
    if typ != BlockType::Signature {
        return Err(Error::InvalidArgument {
            message: format!("expected a signature block, found {typ}"),
        });
    }
    check_detached_signature(keyring, signed, &body[..], config)
}

/// Signs `message` with the signing key of `entity` and writes the signature packet.
///
/// The signing key must be unlocked.
pub fn detach_sign<W: io::Write, R: Read>(
    writer: &mut W,
    entity: &Entity,
    message: R,
    config: &Config,
) -> Result<()> {
    let Some(key) = entity.signing_key(config) else {
        return Err(Error::InvalidArgument {
            message: format!("entity {:X} has no usable signing key", entity.key_id()),
        });
    };
    let Some(secret) = key.secret_key else {
        return Err(Error::InvalidArgument {
            message: format!("no secret material for {:X}", key.key_id()),
        });
    };

    let hashed = vec![Subpacket::regular(SubpacketData::SignatureCreationTime(
        config.now(),
    ))?];
    let unhashed = vec![Subpacket::regular(SubpacketData::Issuer(key.key_id()))?];
    let sig_config = SignatureConfig::new_v4(
        SignatureType::Binary,
        key.public_key.algorithm(),
        config.signing_hash,
        hashed,
        unhashed,
    );

    let sig = sig_config.sign(config, secret, message)?;
    sig.to_writer_with_header(writer)
}

/// Like [`detach_sign`], writing an armored signature block.
pub fn armored_detach_sign<W: io::Write, R: Read>(
    writer: &mut W,
    entity: &Entity,
    message: R,
    config: &Config,
) -> Result<()> {
    let mut body = Vec::new();
    detach_sign(&mut body, entity, message, config)?;
    armor::write(writer, BlockType::Signature, None, &body)
}
