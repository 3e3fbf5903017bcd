use std::io::{self, BufRead};

use crate::errors::{unsupported_err, Result};
use crate::packet::{
    CompressedData, LiteralData, Marker, ModDetectionCode, OnePassSignature, PacketHeader,
    PublicKey, PublicKeyEncryptedSessionKey, SecretKey, Signature, SymEncryptedData,
    SymEncryptedProtectedData, SymKeyEncryptedSessionKey, Trust, UserAttribute, UserId,
};
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, Tag};

/// Represents a Packet. A packet is the record structure used to encode a chunk of data in OpenPGP.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-4>
#[derive(Debug, PartialEq, Eq, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum Packet {
    CompressedData(CompressedData),
    PublicKey(PublicKey),
    PublicSubkey(PublicKey),
    SecretKey(SecretKey),
    SecretSubkey(SecretKey),
    LiteralData(LiteralData),
    Marker(Marker),
    ModDetectionCode(ModDetectionCode),
    OnePassSignature(OnePassSignature),
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    Signature(Signature),
    SymEncryptedData(SymEncryptedData),
    SymEncryptedProtectedData(SymEncryptedProtectedData),
    SymKeyEncryptedSessionKey(SymKeyEncryptedSessionKey),
    Trust(Trust),
    UserAttribute(UserAttribute),
    UserId(UserId),
}

impl Packet {
    /// Decodes the body of a single packet.
    ///
    /// `body` must only yield the packet body, see [`crate::packet::PacketBodyReader`].
    pub fn try_from_reader<B: BufRead>(packet_header: PacketHeader, mut body: B) -> Result<Self> {
        let packet = match packet_header.tag() {
            Tag::PublicKeyEncryptedSessionKey => {
                PublicKeyEncryptedSessionKey::try_from_reader(packet_header, &mut body)?.into()
            }
            Tag::Signature => Signature::try_from_reader(packet_header, &mut body)?.into(),
            Tag::SymKeyEncryptedSessionKey => {
                SymKeyEncryptedSessionKey::try_from_reader(packet_header, &mut body)?.into()
            }
            Tag::OnePassSignature => {
                OnePassSignature::try_from_reader(packet_header, &mut body)?.into()
            }
            Tag::SecretKey => {
                Packet::SecretKey(SecretKey::try_from_reader(packet_header, &mut body)?)
            }
            Tag::PublicKey => {
                Packet::PublicKey(PublicKey::try_from_reader(packet_header, &mut body)?)
            }
            Tag::SecretSubkey => {
                Packet::SecretSubkey(SecretKey::try_from_reader(packet_header, &mut body)?)
            }
            Tag::CompressedData => CompressedData::try_from_reader(packet_header, &mut body)?.into(),
            Tag::SymEncryptedData => {
                SymEncryptedData::try_from_reader(packet_header, &mut body)?.into()
            }
            Tag::Marker => Marker::try_from_reader(packet_header, &mut body)?.into(),
            Tag::LiteralData => LiteralData::try_from_reader(packet_header, &mut body)?.into(),
            Tag::Trust => Trust::try_from_reader(packet_header, &mut body)?.into(),
            Tag::UserId => UserId::try_from_reader(packet_header, &mut body)?.into(),
            Tag::PublicSubkey => {
                Packet::PublicSubkey(PublicKey::try_from_reader(packet_header, &mut body)?)
            }
            Tag::UserAttribute => UserAttribute::try_from_reader(packet_header, &mut body)?.into(),
            Tag::SymEncryptedProtectedData => {
                SymEncryptedProtectedData::try_from_reader(packet_header, &mut body)?.into()
            }
            Tag::ModDetectionCode => {
                ModDetectionCode::try_from_reader(packet_header, &mut body)?.into()
            }
            Tag::Other(tag) => unsupported_err!("packet tag {}", tag),
        };

        Ok(packet)
    }
}

macro_rules! impl_from_packet {
    ($($name:ident),+ $(,)?) => {
        $(
            impl From<$name> for Packet {
                fn from(other: $name) -> Packet {
                    Packet::$name(other)
                }
            }
        )+
    };
}

impl_from_packet!(
    CompressedData,
    LiteralData,
    Marker,
    ModDetectionCode,
    OnePassSignature,
    PublicKeyEncryptedSessionKey,
    Signature,
    SymEncryptedData,
    SymEncryptedProtectedData,
    SymKeyEncryptedSessionKey,
    Trust,
    UserAttribute,
    UserId,
);

impl Serialize for Packet {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::CompressedData(p) => p.to_writer_with_header(writer),
            Self::PublicKey(p) => p.to_writer_with_header(writer),
            Self::PublicSubkey(p) => p.to_writer_with_header(writer),
            Self::SecretKey(p) => p.to_writer_with_header(writer),
            Self::SecretSubkey(p) => p.to_writer_with_header(writer),
            Self::LiteralData(p) => p.to_writer_with_header(writer),
            Self::Marker(p) => p.to_writer_with_header(writer),
            Self::ModDetectionCode(p) => p.to_writer_with_header(writer),
            Self::OnePassSignature(p) => p.to_writer_with_header(writer),
            Self::PublicKeyEncryptedSessionKey(p) => p.to_writer_with_header(writer),
            Self::Signature(p) => p.to_writer_with_header(writer),
            Self::SymEncryptedData(p) => p.to_writer_with_header(writer),
            Self::SymEncryptedProtectedData(p) => p.to_writer_with_header(writer),
            Self::SymKeyEncryptedSessionKey(p) => p.to_writer_with_header(writer),
            Self::Trust(p) => p.to_writer_with_header(writer),
            Self::UserAttribute(p) => p.to_writer_with_header(writer),
            Self::UserId(p) => p.to_writer_with_header(writer),
        }
    }

    fn write_len(&self) -> usize {
        match self {
            Self::CompressedData(p) => p.write_len_with_header(),
            Self::PublicKey(p) => p.write_len_with_header(),
            Self::PublicSubkey(p) => p.write_len_with_header(),
            Self::SecretKey(p) => p.write_len_with_header(),
            Self::SecretSubkey(p) => p.write_len_with_header(),
            Self::LiteralData(p) => p.write_len_with_header(),
            Self::Marker(p) => p.write_len_with_header(),
            Self::ModDetectionCode(p) => p.write_len_with_header(),
            Self::OnePassSignature(p) => p.write_len_with_header(),
            Self::PublicKeyEncryptedSessionKey(p) => p.write_len_with_header(),
            Self::Signature(p) => p.write_len_with_header(),
            Self::SymEncryptedData(p) => p.write_len_with_header(),
            Self::SymEncryptedProtectedData(p) => p.write_len_with_header(),
            Self::SymKeyEncryptedSessionKey(p) => p.write_len_with_header(),
            Self::Trust(p) => p.write_len_with_header(),
            Self::UserAttribute(p) => p.write_len_with_header(),
            Self::UserId(p) => p.write_len_with_header(),
        }
    }
}

pub trait PacketTrait: Serialize {
    fn packet_header(&self) -> &PacketHeader;

    fn tag(&self) -> Tag {
        self.packet_header().tag()
    }

    /// Write this packet including the packet header.
    ///
    /// The header keeps the framing style the packet was read with, the length is recomputed.
    fn to_writer_with_header<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.packet_header().write_for_len(self.write_len(), writer)?;
        self.to_writer(writer)
    }

    /// Length in bytes used when calling `to_writer_with_header`.
    fn write_len_with_header(&self) -> usize {
        let header = self.packet_header();
        let version = match header.version() {
            PacketHeaderVersion::Old if u8::from(header.tag()) >= 16 => PacketHeaderVersion::New,
            v => v,
        };
        let len = self.write_len();
        version.header_len(len) + len
    }
}

impl PacketTrait for Packet {
    fn packet_header(&self) -> &PacketHeader {
        match self {
            Self::CompressedData(p) => p.packet_header(),
            Self::PublicKey(p) => p.packet_header(),
            Self::PublicSubkey(p) => p.packet_header(),
            Self::SecretKey(p) => p.packet_header(),
            Self::SecretSubkey(p) => p.packet_header(),
            Self::LiteralData(p) => p.packet_header(),
            Self::Marker(p) => p.packet_header(),
            Self::ModDetectionCode(p) => p.packet_header(),
            Self::OnePassSignature(p) => p.packet_header(),
            Self::PublicKeyEncryptedSessionKey(p) => p.packet_header(),
            Self::Signature(p) => p.packet_header(),
            Self::SymEncryptedData(p) => p.packet_header(),
            Self::SymEncryptedProtectedData(p) => p.packet_header(),
            Self::SymKeyEncryptedSessionKey(p) => p.packet_header(),
            Self::Trust(p) => p.packet_header(),
            Self::UserAttribute(p) => p.packet_header(),
            Self::UserId(p) => p.packet_header(),
        }
    }
}

impl<'a, T: 'a + PacketTrait> PacketTrait for &'a T {
    fn packet_header(&self) -> &PacketHeader {
        (*self).packet_header()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_keeps_old_framing() {
        let _ = pretty_env_logger::try_init();

        // old style user id packet, one byte length
        let raw = [0xb4, 0x03, b'a', b'b', b'c'];
        let mut input = &raw[..];
        let header = PacketHeader::try_from_reader(&mut input).unwrap();
        let packet = Packet::try_from_reader(header, input).unwrap();

        assert_eq!(packet.tag(), Tag::UserId);
        assert_eq!(packet.write_len(), raw.len());
        assert_eq!(packet.to_bytes().unwrap(), raw);
    }

    #[test]
    fn unknown_tag_is_unsupported() {
        let header = PacketHeader::new_fixed(Tag::Other(60), 1);
        let err = Packet::try_from_reader(header, &[0u8][..]).unwrap_err();
        assert!(err.is_unsupported());
    }
}
