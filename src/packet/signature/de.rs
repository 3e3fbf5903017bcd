use std::io::BufRead;

use bytes::{Buf, Bytes};
use log::{debug, warn};
use smallvec::SmallVec;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{ensure, ensure_eq, unsupported_err, Result};
use crate::packet::signature::SignatureConfig;
use crate::packet::{
    PacketHeader, RevocationCode, Signature, SignatureType, SignatureVersion, Subpacket,
    SubpacketData, SubpacketLength, SubpacketType,
};
use crate::parsing_reader::BufReadParsing;
use crate::types::{CompressionAlgorithm, KeyId, Mpi, Tag};
use crate::util::timestamp_from_u32;

impl Signature {
    /// Parses a `Signature` packet from the given reader.
    pub fn try_from_reader<B: BufRead>(packet_header: PacketHeader, mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        let sig = match version {
            2 => v3_parser(packet_header, SignatureVersion::V2, &mut i)?,
            3 => v3_parser(packet_header, SignatureVersion::V3, &mut i)?,
            4 => v4_parser(packet_header, &mut i)?,
            _ => unsupported_err!("signature version {}", version),
        };
        Ok(sig)
    }
}

/// Only the algorithms we can verify are accepted.
fn check_pub_alg(alg: PublicKeyAlgorithm) -> Result<()> {
    if !alg.is_signature_algorithm() {
        unsupported_err!("public key algorithm {} in signature", u8::from(alg));
    }
    Ok(())
}

fn check_hash_alg(alg: HashAlgorithm) -> Result<()> {
    if !alg.is_known() {
        unsupported_err!("{}", alg);
    }
    Ok(())
}

/// Reads the algorithm specific signature values.
fn signature_mpis<B: BufRead>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Vec<Mpi>> {
    let count = match alg {
        PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSASign => 1,
        PublicKeyAlgorithm::DSA | PublicKeyAlgorithm::ECDSA | PublicKeyAlgorithm::EdDSALegacy => 2,
        _ => unsupported_err!("public key algorithm {} in signature", u8::from(alg)),
    };
    let mut mpis = Vec::with_capacity(count);
    for _ in 0..count {
        mpis.push(Mpi::from_reader(&mut i)?);
    }
    Ok(mpis)
}

/// Parse a v2 or v3 signature packet
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.2>
fn v3_parser<B: BufRead>(
    packet_header: PacketHeader,
    version: SignatureVersion,
    mut i: B,
) -> Result<Signature> {
    let hashed_len = i.read_u8()?;
    ensure_eq!(hashed_len, 5, "invalid v3 signature hashed length");
    let typ = SignatureType::from(i.read_u8()?);
    let created = timestamp_from_u32(i.read_be_u32()?);
    let issuer = KeyId::from(i.read_array::<8>()?);
    let pub_alg = PublicKeyAlgorithm::from(i.read_u8()?);
    check_pub_alg(pub_alg)?;
    let hash_alg = HashAlgorithm::from(i.read_u8()?);
    check_hash_alg(hash_alg)?;
    let signed_hash_value = i.read_array::<2>()?;
    let signature = signature_mpis(pub_alg, &mut i)?;

    let config = SignatureConfig {
        version,
        typ,
        pub_alg,
        hash_alg,
        hashed_subpackets: Vec::new(),
        unhashed_subpackets: Vec::new(),
        created: Some(created),
        issuer: Some(issuer),
    };

    Ok(Signature {
        packet_header,
        config,
        signed_hash_value,
        signature,
    })
}

/// Parse a v4 signature packet
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3>
fn v4_parser<B: BufRead>(packet_header: PacketHeader, mut i: B) -> Result<Signature> {
    let typ = SignatureType::from(i.read_u8()?);
    let pub_alg = PublicKeyAlgorithm::from(i.read_u8()?);
    check_pub_alg(pub_alg)?;
    let hash_alg = HashAlgorithm::from(i.read_u8()?);
    check_hash_alg(hash_alg)?;

    let hashed_len = i.read_be_u16()?;
    let hashed_area = i.take_bytes(hashed_len.into())?;
    let hashed_subpackets = subpackets(hashed_area)?;

    let unhashed_len = i.read_be_u16()?;
    let unhashed_area = i.take_bytes(unhashed_len.into())?;
    let unhashed_subpackets = subpackets(unhashed_area)?;

    let signed_hash_value = i.read_array::<2>()?;
    let signature = signature_mpis(pub_alg, &mut i)?;

    let config = SignatureConfig {
        version: SignatureVersion::V4,
        typ,
        pub_alg,
        hash_alg,
        hashed_subpackets,
        unhashed_subpackets,
        created: None,
        issuer: None,
    };

    Ok(Signature {
        packet_header,
        config,
        signed_hash_value,
        signature,
    })
}

/// Parses a subpacket area.
fn subpackets(mut area: Bytes) -> Result<Vec<Subpacket>> {
    let mut packets = Vec::new();
    while area.has_remaining() {
        let mut header = area.as_ref();
        let len = SubpacketLength::try_from_reader(&mut header)?;
        let consumed = area.len() - header.len();
        area.advance(consumed);
        ensure!(!len.is_empty(), "empty subpacket");
        ensure!(
            area.remaining() >= len.len(),
            "subpacket length {} exceeds area",
            len.len()
        );

        let mut body = area.split_to(len.len());
        let (typ, is_critical) = SubpacketType::from_u8(body.get_u8());
        let data = subpacket(typ, is_critical, body)?;
        packets.push(Subpacket {
            is_critical,
            data,
            len,
        });
    }
    Ok(packets)
}

fn subpacket(typ: SubpacketType, is_critical: bool, body: Bytes) -> Result<SubpacketData> {
    let data = match typ {
        SubpacketType::SignatureCreationTime => {
            ensure_eq!(body.len(), 4, "invalid signature creation time");
            SubpacketData::SignatureCreationTime(timestamp_from_u32(read_u32(&body)))
        }
        SubpacketType::SignatureExpirationTime => {
            ensure_eq!(body.len(), 4, "invalid signature expiration time");
            SubpacketData::SignatureExpirationTime(read_u32(&body))
        }
        SubpacketType::KeyExpirationTime => {
            ensure_eq!(body.len(), 4, "invalid key expiration time");
            SubpacketData::KeyExpirationTime(read_u32(&body))
        }
        SubpacketType::Issuer => SubpacketData::Issuer(KeyId::from_slice(&body)?),
        SubpacketType::PreferredSymmetricAlgorithms => SubpacketData::PreferredSymmetricAlgorithms(
            body.iter().map(|v| SymmetricKeyAlgorithm::from(*v)).collect(),
        ),
        SubpacketType::PreferredHashAlgorithms => SubpacketData::PreferredHashAlgorithms(
            body.iter().map(|v| HashAlgorithm::from(*v)).collect(),
        ),
        SubpacketType::PreferredCompressionAlgorithms => {
            SubpacketData::PreferredCompressionAlgorithms(
                body.iter().map(|v| CompressionAlgorithm::from(*v)).collect(),
            )
        }
        SubpacketType::PrimaryUserId => {
            ensure_eq!(body.len(), 1, "invalid primary user id flag");
            SubpacketData::IsPrimary(body[0])
        }
        SubpacketType::KeyFlags => SubpacketData::KeyFlags(SmallVec::from_slice(&body)),
        SubpacketType::RevocationReason => {
            ensure!(!body.is_empty(), "empty revocation reason");
            SubpacketData::RevocationReason(RevocationCode::from(body[0]), body.slice(1..))
        }
        SubpacketType::EmbeddedSignature => {
            let header = PacketHeader::new_fixed(Tag::Signature, body.len().try_into()?);
            let sig = Signature::try_from_reader(header, body.as_ref())?;
            SubpacketData::EmbeddedSignature(Box::new(sig))
        }
        SubpacketType::IssuerFingerprint => {
            ensure!(!body.is_empty(), "empty issuer fingerprint");
            SubpacketData::IssuerFingerprint(body[0], body.slice(1..))
        }
        SubpacketType::Other(n) => {
            if is_critical && !SubpacketType::is_known_uninterpreted(n) {
                warn!("unknown critical subpacket {}", n);
                unsupported_err!("unknown critical signature subpacket type {}", n);
            }
            debug!("uninterpreted subpacket {} ({} bytes)", n, body.len());
            SubpacketData::Other(n, body)
        }
    };

    Ok(data)
}

fn read_u32(body: &[u8]) -> u32 {
    u32::from_be_bytes([body[0], body[1], body[2], body[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::Serialize;

    fn parse(hex_str: &str) -> Result<Signature> {
        let raw = hex::decode(hex_str).unwrap();
        let header = PacketHeader::new_fixed(Tag::Signature, raw.len() as u32);
        Signature::try_from_reader(header, &raw[..])
    }

    #[test]
    fn v4_subpackets_roundtrip() {
        let _ = pretty_env_logger::try_init();

        // binary, RSA, SHA256; hashed: creation time, key flags 0x03, critical
        // notation (20); unhashed: issuer
        let sig_hex = concat!(
            "04000108",
            "000d",
            "0502", "5c000000",
            "021b", "03",
            "0394", "abcd",
            "000a",
            "0910", "a34d7e18c20c31bb",
            "1234",
            "0009", "01ff"
        );
        let sig = parse(sig_hex).unwrap();

        assert_eq!(sig.typ(), SignatureType::Binary);
        assert_eq!(sig.created().unwrap().timestamp(), 0x5c00_0000);
        assert_eq!(sig.issuer(), Some(KeyId::from(0xa34d_7e18_c20c_31bb)));
        assert!(sig.key_flags().certify());
        assert!(sig.key_flags().sign());
        assert_eq!(sig.signature.len(), 1);
        assert_eq!(hex::encode(sig.to_bytes().unwrap()), sig_hex);
        assert_eq!(sig.write_len(), sig_hex.len() / 2);
    }

    #[test]
    fn primary_flag_keeps_its_octet() {
        // positive certification, primary user id flag 0x02
        let sig_hex = concat!(
            "04130108",
            "0009",
            "0502", "5c000000",
            "0219", "02",
            "0000",
            "1234",
            "0009", "01ff"
        );
        let sig = parse(sig_hex).unwrap();

        assert!(sig.is_primary());
        assert_eq!(hex::encode(sig.to_bytes().unwrap()), sig_hex);
    }

    #[test]
    fn unknown_critical_subpacket() {
        let err = parse("04000108000403e5abcd00001234000901ff").unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn unknown_hash() {
        let err = parse("04000199000000001234000901ff").unwrap_err();
        assert_eq!(err.to_string(), "unsupported: hash function 153");
    }

    #[test]
    fn elgamal_signatures_are_unsupported() {
        let err = parse("04001402000000001234000901ff").unwrap_err();
        assert!(err.is_unsupported());
        let err = parse("04001002000000001234000901ff").unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn v3_signature() {
        let sig_hex = concat!(
            "03", "05", "00", "5c000000", "a34d7e18c20c31bb", "11", "02", "1234",
            "0009", "01ff", "0009", "01fe"
        );
        let sig = parse(sig_hex).unwrap();
        assert_eq!(sig.version(), SignatureVersion::V3);
        assert_eq!(sig.issuer(), Some(KeyId::from(0xa34d_7e18_c20c_31bb)));
        assert_eq!(sig.created().unwrap().timestamp(), 0x5c00_0000);
        assert_eq!(sig.signature.len(), 2);
        assert_eq!(hex::encode(sig.to_bytes().unwrap()), sig_hex);
        assert_eq!(sig.write_len(), sig_hex.len() / 2);
    }
}
