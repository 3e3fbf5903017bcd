use std::io::{self, BufRead};

use chrono::{DateTime, Utc};
use log::debug;

use crate::crypto::checksum;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{unsupported_err, Result};
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyId, KeyVersion, Mpi, PublicParams, Tag};
use crate::util::{timestamp_from_u32, timestamp_to_u32};

/// Public Key Packet, primary or subkey.
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.1.1>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PublicKey {
    packet_header: PacketHeader,
    version: KeyVersion,
    algorithm: PublicKeyAlgorithm,
    created_at: DateTime<Utc>,
    public_params: PublicParams,
    fingerprint: Fingerprint,
}

impl PublicKey {
    /// Create a new v4 key from its parts. `tag` selects primary key or subkey.
    pub fn new(
        tag: Tag,
        algorithm: PublicKeyAlgorithm,
        created_at: DateTime<Utc>,
        public_params: PublicParams,
    ) -> Result<Self> {
        debug_assert!(matches!(tag, Tag::PublicKey | Tag::PublicSubkey));
        let mut key = PublicKey {
            packet_header: PacketHeader::new_fixed(tag, 0),
            version: KeyVersion::V4,
            algorithm,
            created_at,
            public_params,
            fingerprint: Fingerprint::new([0u8; 20]),
        };
        key.packet_header = PacketHeader::new_fixed(tag, key.write_len().try_into()?);
        key.fingerprint = key.compute_fingerprint()?;
        Ok(key)
    }

    /// Parses a `PublicKey` or `PublicSubkey` packet from the given reader.
    pub fn try_from_reader<B: BufRead>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let key = Self::read_public_part(packet_header, &mut input)?;
        if input.has_remaining()? {
            debug!("ignoring trailing data in {:?}", packet_header.tag());
        }
        Ok(key)
    }

    /// Reads the public part of a key packet, leaving anything after it in `input`.
    pub(crate) fn read_public_part<B: BufRead>(
        packet_header: PacketHeader,
        mut input: B,
    ) -> Result<Self> {
        let version = KeyVersion::from(input.read_u8()?);
        if version != KeyVersion::V4 {
            unsupported_err!("key version {:?}", version);
        }

        let created_at = timestamp_from_u32(input.read_be_u32()?);
        let algorithm = PublicKeyAlgorithm::from(input.read_u8()?);
        let public_params = PublicParams::try_from_reader(algorithm, &mut input)?;

        let mut key = PublicKey {
            packet_header,
            version,
            algorithm,
            created_at,
            public_params,
            fingerprint: Fingerprint::new([0u8; 20]),
        };
        key.fingerprint = key.compute_fingerprint()?;
        Ok(key)
    }

    fn compute_fingerprint(&self) -> Result<Fingerprint> {
        let mut buf = Vec::with_capacity(3 + self.write_len());
        self.to_writer_old(&mut buf)?;
        Ok(Fingerprint::new(checksum::calculate_sha1(&buf)?))
    }

    /// The same key, framed as a primary key or subkey packet.
    pub(crate) fn with_tag(mut self, tag: Tag) -> Result<Self> {
        self.packet_header = PacketHeader::new_fixed(tag, self.write_len().try_into()?);
        Ok(self)
    }

    pub fn version(&self) -> KeyVersion {
        self.version
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    pub fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub fn public_params(&self) -> &PublicParams {
        &self.public_params
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn key_id(&self) -> KeyId {
        self.fingerprint.key_id()
    }

    pub fn is_subkey(&self) -> bool {
        self.packet_header.tag() == Tag::PublicSubkey
    }

    /// Writes the key in the form used for fingerprints and signature hashing:
    /// `0x99`, a two byte length, then the packet body.
    pub fn to_writer_old<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let len: u16 = self.write_len().try_into()?;
        writer.write_all(&[0x99])?;
        writer.write_all(&len.to_be_bytes())?;
        self.to_writer(writer)
    }

    /// Checks `sig` over an already computed digest.
    pub fn verify_signature(&self, hash: HashAlgorithm, hashed: &[u8], sig: &[Mpi]) -> Result<()> {
        self.public_params.verify_signature(hash, hashed, sig)
    }
}

impl Serialize for PublicKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.version.into()])?;
        writer.write_all(&timestamp_to_u32(&self.created_at)?.to_be_bytes())?;
        writer.write_all(&[self.algorithm.into()])?;
        self.public_params.to_writer(writer)
    }

    fn write_len(&self) -> usize {
        1 + 4 + 1 + self.public_params.write_len()
    }
}

impl PacketTrait for PublicKey {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ecc_curve::EccCurve;

    fn ed25519_key() -> PublicKey {
        let mut q = vec![0x40];
        q.extend_from_slice(&[0x22; 32]);
        PublicKey::new(
            Tag::PublicKey,
            PublicKeyAlgorithm::EdDSALegacy,
            timestamp_from_u32(1_500_000_000),
            PublicParams::EdDSALegacy {
                curve: EccCurve::Ed25519,
                q: Mpi::from_slice(&q),
            },
        )
        .unwrap()
    }

    #[test]
    fn parse_roundtrip_keeps_fingerprint() {
        let _ = pretty_env_logger::try_init();

        let key = ed25519_key();
        let body = key.to_bytes().unwrap();
        let header = PacketHeader::new_fixed(Tag::PublicKey, body.len() as u32);
        let parsed = PublicKey::try_from_reader(header, &body[..]).unwrap();

        assert_eq!(parsed.fingerprint(), key.fingerprint());
        assert_eq!(parsed.key_id(), key.fingerprint().key_id());
        assert_eq!(parsed.created_at().timestamp(), 1_500_000_000);
        assert!(!parsed.is_subkey());

        let mut hashed = Vec::new();
        parsed.to_writer_old(&mut hashed).unwrap();
        assert_eq!(hashed[0], 0x99);
        assert_eq!(&hashed[3..], &body[..]);
    }

    #[test]
    fn v3_keys_are_unsupported() {
        let header = PacketHeader::new_fixed(Tag::PublicKey, 8);
        let err = PublicKey::try_from_reader(header, &[3u8, 0, 0, 0, 0, 0, 0, 1][..]).unwrap_err();
        assert!(err.is_unsupported());
    }
}
