use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use smallvec::SmallVec;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, KeyId};
use crate::util::timestamp_to_u32;

use super::{RevocationCode, Signature};

/// Available signature subpacket types
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum SubpacketType {
    SignatureCreationTime,
    SignatureExpirationTime,
    KeyExpirationTime,
    PreferredSymmetricAlgorithms,
    Issuer,
    PreferredHashAlgorithms,
    PreferredCompressionAlgorithms,
    PrimaryUserId,
    KeyFlags,
    RevocationReason,
    EmbeddedSignature,
    IssuerFingerprint,
    Other(u8),
}

impl SubpacketType {
    pub fn as_u8(&self, is_critical: bool) -> u8 {
        let raw: u8 = match self {
            SubpacketType::SignatureCreationTime => 2,
            SubpacketType::SignatureExpirationTime => 3,
            SubpacketType::KeyExpirationTime => 9,
            SubpacketType::PreferredSymmetricAlgorithms => 11,
            SubpacketType::Issuer => 16,
            SubpacketType::PreferredHashAlgorithms => 21,
            SubpacketType::PreferredCompressionAlgorithms => 22,
            SubpacketType::PrimaryUserId => 25,
            SubpacketType::KeyFlags => 27,
            SubpacketType::RevocationReason => 29,
            SubpacketType::EmbeddedSignature => 32,
            SubpacketType::IssuerFingerprint => 33,
            SubpacketType::Other(n) => *n,
        };

        if is_critical {
            raw | 0b1000_0000
        } else {
            raw
        }
    }

    #[inline]
    pub fn from_u8(n: u8) -> (Self, bool) {
        let is_critical = (n >> 7) == 1;
        let n = n & 0b0111_1111;

        let m = match n {
            2 => SubpacketType::SignatureCreationTime,
            3 => SubpacketType::SignatureExpirationTime,
            9 => SubpacketType::KeyExpirationTime,
            11 => SubpacketType::PreferredSymmetricAlgorithms,
            16 => SubpacketType::Issuer,
            21 => SubpacketType::PreferredHashAlgorithms,
            22 => SubpacketType::PreferredCompressionAlgorithms,
            25 => SubpacketType::PrimaryUserId,
            27 => SubpacketType::KeyFlags,
            29 => SubpacketType::RevocationReason,
            32 => SubpacketType::EmbeddedSignature,
            33 => SubpacketType::IssuerFingerprint,
            _ => SubpacketType::Other(n),
        };

        (m, is_critical)
    }

    /// Types that are understood well enough to be accepted when marked critical,
    /// even though their content is not interpreted.
    pub fn is_known_uninterpreted(n: u8) -> bool {
        // exportable, trust, regex, revocable, notation, key server prefs,
        // preferred key server, policy uri, signer's user id, features, target
        matches!(n, 4 | 5 | 6 | 7 | 20 | 23 | 24 | 26 | 28 | 30 | 31)
    }
}

/// The length of a subpacket, keeping the encoding it was read with.
///
/// Signatures are hashed over the subpacket area as found on the wire, so the exact
/// encoding has to survive a round trip.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum SubpacketLength {
    /// 1 byte encoding, must be less than `192`.
    One(#[cfg_attr(test, proptest(strategy = "0u8..=191"))] u8),
    /// 2 byte encoding
    Two(#[cfg_attr(test, proptest(strategy = "192u16..=16319"))] u16),
    /// 5 byte encoding
    Five(u32),
}

impl SubpacketLength {
    pub(crate) fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let olen = i.read_u8()?;
        let len = match olen {
            0..=191 => Self::One(olen),
            192..=254 => {
                let a = i.read_u8()?;
                let l = ((u16::from(olen) - 192) << 8) + 192 + u16::from(a);
                Self::Two(l)
            }
            255 => Self::Five(i.read_be_u32()?),
        };
        Ok(len)
    }

    /// Encodes the given length into a minimal version
    pub(crate) fn encode(len: u32) -> Self {
        match len {
            0..=191 => Self::One(len as u8),
            192..=16319 => Self::Two(len as u16),
            _ => Self::Five(len),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Self::One(l) => *l as usize,
            Self::Two(l) => *l as usize,
            Self::Five(l) => *l as usize,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for SubpacketLength {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::One(l) => {
                writer.write_u8(*l)?;
            }
            Self::Two(l) => {
                writer.write_u8((((l - 192) / 256) + 192) as u8)?;
                writer.write_u8(((l - 192) % 256) as u8)?;
            }
            Self::Five(l) => {
                writer.write_u8(0xFF)?;
                writer.write_u32::<BigEndian>(*l)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Two(_) => 2,
            Self::Five(_) => 5,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Subpacket {
    pub is_critical: bool,
    pub data: SubpacketData,
    pub len: SubpacketLength,
}

impl Subpacket {
    /// Construct a new regular subpacket.
    pub fn regular(data: SubpacketData) -> Result<Self> {
        let raw_len = (data.write_len() + 1).try_into()?;
        Ok(Subpacket {
            is_critical: false,
            data,
            len: SubpacketLength::encode(raw_len),
        })
    }

    /// Construct a new critical subpacket.
    pub fn critical(data: SubpacketData) -> Result<Self> {
        let mut packet = Self::regular(data)?;
        packet.is_critical = true;
        Ok(packet)
    }

    pub fn typ(&self) -> SubpacketType {
        self.data.typ()
    }
}

#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub enum SubpacketData {
    /// The time the signature was made.
    SignatureCreationTime(DateTime<Utc>),
    /// Seconds after the creation time at which the signature expires, 0 for never.
    SignatureExpirationTime(u32),
    /// Seconds after the key creation time at which the key expires, 0 for never.
    KeyExpirationTime(u32),
    /// The OpenPGP Key ID of the key issuing the signature.
    Issuer(KeyId),
    PreferredSymmetricAlgorithms(SmallVec<[SymmetricKeyAlgorithm; 8]>),
    PreferredHashAlgorithms(SmallVec<[HashAlgorithm; 8]>),
    PreferredCompressionAlgorithms(SmallVec<[CompressionAlgorithm; 8]>),
    KeyFlags(#[debug("{}", hex::encode(_0))] SmallVec<[u8; 1]>),
    RevocationReason(RevocationCode, #[debug("{:?}", String::from_utf8_lossy(_1))] Bytes),
    /// Primary user id flag, as the raw octet.
    IsPrimary(u8),
    EmbeddedSignature(Box<Signature>),
    /// Key version and fingerprint of the issuer.
    IssuerFingerprint(u8, #[debug("{}", hex::encode(_1))] Bytes),
    Other(u8, #[debug("{}", hex::encode(_1))] Bytes),
}

impl SubpacketData {
    pub fn typ(&self) -> SubpacketType {
        match self {
            SubpacketData::SignatureCreationTime(_) => SubpacketType::SignatureCreationTime,
            SubpacketData::SignatureExpirationTime(_) => SubpacketType::SignatureExpirationTime,
            SubpacketData::KeyExpirationTime(_) => SubpacketType::KeyExpirationTime,
            SubpacketData::Issuer(_) => SubpacketType::Issuer,
            SubpacketData::PreferredSymmetricAlgorithms(_) => {
                SubpacketType::PreferredSymmetricAlgorithms
            }
            SubpacketData::PreferredHashAlgorithms(_) => SubpacketType::PreferredHashAlgorithms,
            SubpacketData::PreferredCompressionAlgorithms(_) => {
                SubpacketType::PreferredCompressionAlgorithms
            }
            SubpacketData::KeyFlags(_) => SubpacketType::KeyFlags,
            SubpacketData::RevocationReason(..) => SubpacketType::RevocationReason,
            SubpacketData::IsPrimary(_) => SubpacketType::PrimaryUserId,
            SubpacketData::EmbeddedSignature(_) => SubpacketType::EmbeddedSignature,
            SubpacketData::IssuerFingerprint(..) => SubpacketType::IssuerFingerprint,
            SubpacketData::Other(n, _) => SubpacketType::Other(*n),
        }
    }
}

impl Serialize for SubpacketData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SubpacketData::SignatureCreationTime(t) => {
                writer.write_u32::<BigEndian>(timestamp_to_u32(t)?)?;
            }
            SubpacketData::SignatureExpirationTime(secs)
            | SubpacketData::KeyExpirationTime(secs) => {
                writer.write_u32::<BigEndian>(*secs)?;
            }
            SubpacketData::Issuer(id) => {
                writer.write_all(id.as_ref())?;
            }
            SubpacketData::PreferredSymmetricAlgorithms(algs) => {
                for alg in algs {
                    writer.write_u8((*alg).into())?;
                }
            }
            SubpacketData::PreferredHashAlgorithms(algs) => {
                for alg in algs {
                    writer.write_u8((*alg).into())?;
                }
            }
            SubpacketData::PreferredCompressionAlgorithms(algs) => {
                for alg in algs {
                    writer.write_u8((*alg).into())?;
                }
            }
            SubpacketData::KeyFlags(flags) => {
                writer.write_all(flags)?;
            }
            SubpacketData::RevocationReason(code, reason) => {
                writer.write_u8((*code).into())?;
                writer.write_all(reason)?;
            }
            SubpacketData::IsPrimary(primary) => {
                writer.write_u8(*primary)?;
            }
            SubpacketData::EmbeddedSignature(sig) => {
                sig.to_writer(writer)?;
            }
            SubpacketData::IssuerFingerprint(version, fp) => {
                writer.write_u8(*version)?;
                writer.write_all(fp)?;
            }
            SubpacketData::Other(_, body) => {
                writer.write_all(body)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            SubpacketData::SignatureCreationTime(_)
            | SubpacketData::SignatureExpirationTime(_)
            | SubpacketData::KeyExpirationTime(_) => 4,
            SubpacketData::Issuer(_) => 8,
            SubpacketData::PreferredSymmetricAlgorithms(algs) => algs.len(),
            SubpacketData::PreferredHashAlgorithms(algs) => algs.len(),
            SubpacketData::PreferredCompressionAlgorithms(algs) => algs.len(),
            SubpacketData::KeyFlags(flags) => flags.len(),
            SubpacketData::RevocationReason(_, reason) => 1 + reason.len(),
            SubpacketData::IsPrimary(_) => 1,
            SubpacketData::EmbeddedSignature(sig) => sig.write_len(),
            SubpacketData::IssuerFingerprint(_, fp) => 1 + fp.len(),
            SubpacketData::Other(_, body) => body.len(),
        }
    }
}

impl Serialize for Subpacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.len.to_writer(writer)?;
        writer.write_u8(self.typ().as_u8(self.is_critical))?;
        self.data.to_writer(writer)
    }

    fn write_len(&self) -> usize {
        self.len.write_len() + self.len.len()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_critical() {
        use SubpacketType::*;

        let cases = [
            SignatureCreationTime,
            SignatureExpirationTime,
            KeyExpirationTime,
            PreferredSymmetricAlgorithms,
            Issuer,
            PreferredHashAlgorithms,
            PreferredCompressionAlgorithms,
            PrimaryUserId,
            KeyFlags,
            RevocationReason,
            EmbeddedSignature,
            IssuerFingerprint,
            Other(95),
        ];
        for case in cases {
            assert_eq!(SubpacketType::from_u8(case.as_u8(false)), (case, false));
            assert_eq!(SubpacketType::from_u8(case.as_u8(true)), (case, true));
        }
    }

    #[test]
    fn regular_subpacket_length() {
        let packet = Subpacket::regular(SubpacketData::Issuer(KeyId::from(1u64))).unwrap();
        assert_eq!(packet.len, SubpacketLength::One(9));
        assert_eq!(
            hex::encode(packet.to_bytes().unwrap()),
            "09100000000000000001"
        );
        assert_eq!(packet.write_len(), 10);
    }

    proptest! {
        #[test]
        fn subpacket_length_write_len(len: SubpacketLength) {
            let mut buf = Vec::new();
            len.to_writer(&mut buf).unwrap();
            prop_assert_eq!(buf.len(), len.write_len());
        }

        #[test]
        fn subpacket_length_keeps_encoding(len: SubpacketLength) {
            let mut buf = Vec::new();
            len.to_writer(&mut buf).unwrap();
            let new_len = SubpacketLength::try_from_reader(&buf[..]).unwrap();
            prop_assert_eq!(len, new_len);
        }
    }
}
