use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

use crate::errors::{ensure, Result};
use crate::parsing_reader::BufReadParsing;

/// Body length as announced by a packet header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PacketLength {
    Fixed(u32),
    /// Old format only: the body runs until the end of the input.
    Indeterminate,
    /// New format only: a chunk of this size follows, then another length.
    Partial(u32),
}

impl PacketLength {
    /// Decodes a new format length.
    pub fn try_from_reader<R: BufRead>(mut r: R) -> io::Result<Self> {
        let olen = r.read_u8()?;
        let len = match olen {
            0..=191 => PacketLength::Fixed(olen.into()),
            192..=223 => {
                let a = r.read_u8()?;
                PacketLength::Fixed(((u32::from(olen) - 192) << 8) + 192 + u32::from(a))
            }
            224..=254 => PacketLength::Partial(1 << (olen & 0x1F)),
            255 => PacketLength::Fixed(r.read_be_u32()?),
        };
        Ok(len)
    }

    /// Decodes an old format length, `length_type` are the low two bits of the tag byte.
    pub fn try_from_old<R: BufRead>(mut r: R, length_type: u8) -> io::Result<Self> {
        let len = match length_type {
            0 => PacketLength::Fixed(r.read_u8()?.into()),
            1 => PacketLength::Fixed(r.read_be_u16()?.into()),
            2 => PacketLength::Fixed(r.read_be_u32()?),
            _ => PacketLength::Indeterminate,
        };
        Ok(len)
    }

    pub fn maybe_len(&self) -> Option<u32> {
        match self {
            Self::Fixed(len) | Self::Partial(len) => Some(*len),
            Self::Indeterminate => None,
        }
    }

    /// Writes a new format length. Indeterminate lengths have no new format encoding.
    pub fn to_writer_new<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PacketLength::Fixed(len) => {
                if *len < 192 {
                    writer.write_u8(*len as u8)?;
                } else if *len < 8384 {
                    writer.write_u8((((len - 192) >> 8) + 192) as u8)?;
                    writer.write_u8(((len - 192) & 0xFF) as u8)?;
                } else {
                    writer.write_u8(255)?;
                    writer.write_u32::<BigEndian>(*len)?;
                }
            }
            PacketLength::Indeterminate => {
                crate::errors::bail!("indeterminate length in new format header");
            }
            PacketLength::Partial(len) => {
                ensure!(len.count_ones() == 1, "partial length must be a power of two");
                writer.write_u8(224 + len.trailing_zeros() as u8)?;
            }
        }
        Ok(())
    }
}

/// Packet tag.
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(u8)]
pub enum Tag {
    PublicKeyEncryptedSessionKey = 1,
    Signature = 2,
    SymKeyEncryptedSessionKey = 3,
    OnePassSignature = 4,
    SecretKey = 5,
    PublicKey = 6,
    SecretSubkey = 7,
    CompressedData = 8,
    SymEncryptedData = 9,
    Marker = 10,
    LiteralData = 11,
    Trust = 12,
    UserId = 13,
    PublicSubkey = 14,
    UserAttribute = 17,
    SymEncryptedProtectedData = 18,
    ModDetectionCode = 19,

    #[num_enum(catch_all)]
    #[cfg_attr(test, proptest(skip))]
    Other(u8),
}

impl Tag {
    /// Data packets are the only ones allowed to use partial body lengths.
    pub fn allows_partial_length(self) -> bool {
        matches!(
            self,
            Tag::LiteralData
                | Tag::CompressedData
                | Tag::SymEncryptedData
                | Tag::SymEncryptedProtectedData
        )
    }
}

/// Framing style of a packet header.
#[derive(Debug, PartialEq, Eq, Clone, Copy, TryFromPrimitive, Default)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(u8)]
pub enum PacketHeaderVersion {
    Old = 0,
    #[default]
    New = 1,
}

impl PacketHeaderVersion {
    pub fn write_header(self, writer: &mut impl io::Write, tag: Tag, len: usize) -> Result<()> {
        debug!("write_header {:?} {:?} {}", self, tag, len);
        let tag: u8 = tag.into();
        match self {
            PacketHeaderVersion::Old => {
                ensure!(tag < 16, "tag {} does not fit an old format header", tag);
                if len < 256 {
                    writer.write_u8(0b1000_0000 | (tag << 2))?;
                    writer.write_u8(len.try_into()?)?;
                } else if len < 65536 {
                    writer.write_u8(0b1000_0001 | (tag << 2))?;
                    writer.write_u16::<BigEndian>(len as u16)?;
                } else {
                    writer.write_u8(0b1000_0010 | (tag << 2))?;
                    writer.write_u32::<BigEndian>(len.try_into()?)?;
                }
            }
            PacketHeaderVersion::New => {
                writer.write_u8(0b1100_0000 | tag)?;
                PacketLength::Fixed(len.try_into()?).to_writer_new(writer)?;
            }
        }

        Ok(())
    }

    /// Length of the header, in bytes.
    pub fn header_len(self, len: usize) -> usize {
        match self {
            PacketHeaderVersion::Old => {
                if len < 256 {
                    2
                } else if len < 65536 {
                    3
                } else {
                    5
                }
            }
            PacketHeaderVersion::New => {
                if len < 192 {
                    2
                } else if len < 8384 {
                    3
                } else {
                    6
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum KeyVersion {
    V2 = 2,
    V3 = 3,
    V4 = 4,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for KeyVersion {
    fn default() -> Self {
        Self::V4
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn key_version_catch_all() {
        assert_eq!(KeyVersion::default(), KeyVersion::V4);
        assert_eq!(KeyVersion::from(4), KeyVersion::V4);
        assert_eq!(KeyVersion::from(5), KeyVersion::Other(5));
        assert_eq!(u8::from(KeyVersion::Other(5)), 5);
    }

    #[test]
    fn test_write_header() {
        let mut buf = Vec::new();
        PacketHeaderVersion::New
            .write_header(&mut buf, Tag::UserAttribute, 12875)
            .unwrap();
        assert_eq!(hex::encode(buf), "d1ff0000324b");

        let mut buf = Vec::new();
        PacketHeaderVersion::New
            .write_header(&mut buf, Tag::Signature, 302)
            .unwrap();
        assert_eq!(hex::encode(buf), "c2c06e");

        let mut buf = Vec::new();
        PacketHeaderVersion::Old
            .write_header(&mut buf, Tag::Signature, 302)
            .unwrap();
        assert_eq!(hex::encode(buf), "89012e");
    }

    #[test]
    fn decode_lengths() {
        assert_eq!(
            PacketLength::try_from_reader(&[0x64][..]).unwrap(),
            PacketLength::Fixed(100)
        );
        assert_eq!(
            PacketLength::try_from_reader(&[0xC5, 0xFB][..]).unwrap(),
            PacketLength::Fixed(1723)
        );
        assert_eq!(
            PacketLength::try_from_reader(&[0xFF, 0x00, 0x01, 0x86, 0xA0][..]).unwrap(),
            PacketLength::Fixed(100_000)
        );
        assert_eq!(
            PacketLength::try_from_reader(&[0xE1][..]).unwrap(),
            PacketLength::Partial(2)
        );
        assert_eq!(
            PacketLength::try_from_old(&[][..], 3).unwrap(),
            PacketLength::Indeterminate
        );
    }

    #[test]
    fn partial_lengths_only_for_data() {
        assert!(Tag::LiteralData.allows_partial_length());
        assert!(Tag::SymEncryptedProtectedData.allows_partial_length());
        assert!(!Tag::Signature.allows_partial_length());
        assert!(!Tag::PublicKey.allows_partial_length());
    }

    proptest! {
        #[test]
        fn header_len(version: PacketHeaderVersion, len in 0usize..u32::MAX as usize) {
            let mut buf = Vec::new();
            version.write_header(&mut buf, Tag::Signature, len).unwrap();
            prop_assert_eq!(buf.len(), version.header_len(len));
        }

        #[test]
        fn fixed_length_roundtrip(len: u32) {
            let mut buf = Vec::new();
            PacketLength::Fixed(len).to_writer_new(&mut buf).unwrap();
            prop_assert_eq!(PacketLength::try_from_reader(&buf[..]).unwrap(), PacketLength::Fixed(len));
        }
    }
}
