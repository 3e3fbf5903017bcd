use std::io::{self, BufRead};

use crate::errors::{bail, ensure, Result};
use crate::parsing_reader::BufReadParsing;
use crate::types::{PacketHeaderVersion, PacketLength, Tag};

/// Represents a packet header.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-4.2>
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    version: PacketHeaderVersion,
    tag: Tag,
    length: PacketLength,
}

impl PacketHeader {
    /// Parse a single packet header from the given reader.
    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        let header = r.read_u8()?;
        ensure!(
            header & 0b1000_0000 != 0,
            "invalid packet header {:#010b}",
            header
        );

        if header & 0b0100_0000 != 0 {
            // new format, 6 bit tag
            let tag = Tag::from(header & 0b0011_1111);
            let length = PacketLength::try_from_reader(&mut r)?;
            Ok(PacketHeader {
                version: PacketHeaderVersion::New,
                tag,
                length,
            })
        } else {
            // old format, 4 bit tag and 2 bit length type
            let tag = Tag::from((header >> 2) & 0b1111);
            let length = PacketLength::try_from_old(&mut r, header & 0b11)?;
            Ok(PacketHeader {
                version: PacketHeaderVersion::Old,
                tag,
                length,
            })
        }
    }

    /// Builds a header, checking that the length can be expressed in the given framing.
    pub fn from_parts(version: PacketHeaderVersion, tag: Tag, length: PacketLength) -> Result<Self> {
        match (version, length) {
            (PacketHeaderVersion::Old, PacketLength::Partial(_)) => {
                bail!("partial lengths are only supported in new style headers")
            }
            (PacketHeaderVersion::New, PacketLength::Indeterminate) => {
                bail!("indeterminate packet length is only supported in old style headers")
            }
            (PacketHeaderVersion::Old, _) => {
                ensure!(
                    u8::from(tag) < 16,
                    "tag is not compatible with old packet headers: {:?}",
                    tag
                );
            }
            (PacketHeaderVersion::New, PacketLength::Partial(l)) => {
                ensure!(l.count_ones() == 1, "partial length must be a power of two");
            }
            (PacketHeaderVersion::New, _) => {}
        }

        Ok(PacketHeader {
            version,
            tag,
            length,
        })
    }

    /// A fixed length, new style header, as used when serializing packets.
    pub fn new_fixed(tag: Tag, len: u32) -> Self {
        PacketHeader {
            version: PacketHeaderVersion::New,
            tag,
            length: PacketLength::Fixed(len),
        }
    }

    pub fn version(&self) -> PacketHeaderVersion {
        self.version
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn packet_length(&self) -> PacketLength {
        self.length
    }

    /// Writes a header for a body of `len` bytes, keeping this header's framing style.
    pub fn write_for_len<W: io::Write>(&self, len: usize, writer: &mut W) -> Result<()> {
        let version = match self.version {
            // tags above 15 never fit the old format
            PacketHeaderVersion::Old if u8::from(self.tag) >= 16 => PacketHeaderVersion::New,
            v => v,
        };
        version.write_header(writer, self.tag, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_old_and_new() {
        let _ = pretty_env_logger::try_init();

        // old format signature, 2 byte length
        let h = PacketHeader::try_from_reader(&[0x89, 0x01, 0x2e][..]).unwrap();
        assert_eq!(h.version(), PacketHeaderVersion::Old);
        assert_eq!(h.tag(), Tag::Signature);
        assert_eq!(h.packet_length(), PacketLength::Fixed(302));

        // old format, indeterminate
        let h = PacketHeader::try_from_reader(&[0xa3][..]).unwrap();
        assert_eq!(h.tag(), Tag::CompressedData);
        assert_eq!(h.packet_length(), PacketLength::Indeterminate);

        // new format literal with a partial length
        let h = PacketHeader::try_from_reader(&[0xcb, 0xe1][..]).unwrap();
        assert_eq!(h.tag(), Tag::LiteralData);
        assert_eq!(h.packet_length(), PacketLength::Partial(2));

        // new format user attribute
        let h = PacketHeader::try_from_reader(&[0xd1, 0xff, 0, 0, 0x32, 0x4b][..]).unwrap();
        assert_eq!(h.tag(), Tag::UserAttribute);
        assert_eq!(h.packet_length(), PacketLength::Fixed(12875));
    }

    #[test]
    fn reject_invalid() {
        assert!(PacketHeader::try_from_reader(&[0x30][..]).is_err());
        // truncated length
        assert!(PacketHeader::try_from_reader(&[0xc2, 0xff, 0x00][..]).is_err());
        assert!(PacketHeader::from_parts(
            PacketHeaderVersion::New,
            Tag::Signature,
            PacketLength::Indeterminate
        )
        .is_err());
        assert!(PacketHeader::from_parts(
            PacketHeaderVersion::Old,
            Tag::LiteralData,
            PacketLength::Partial(512)
        )
        .is_err());
    }

    #[test]
    fn write_keeps_style() {
        let h = PacketHeader::try_from_reader(&[0x89, 0x01, 0x2e][..]).unwrap();
        let mut out = Vec::new();
        h.write_for_len(10, &mut out).unwrap();
        assert_eq!(out, vec![0x88, 10]);

        let h = PacketHeader::new_fixed(Tag::UserAttribute, 0);
        let mut out = Vec::new();
        h.write_for_len(5, &mut out).unwrap();
        assert_eq!(out, vec![0xd1, 5]);
    }
}
