use std::io::{self, BufRead};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Tag;
use crate::util::{timestamp_from_u32, timestamp_to_u32};

/// Format of the literal data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DataMode {
    Binary = b'b',
    Text = b't',
    Utf8 = b'u',
    Mime = b'm',

    #[num_enum(catch_all)]
    Other(u8),
}

/// The metadata in front of the literal data.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct LiteralDataHeader {
    pub mode: DataMode,
    /// The file name, may contain arbitrary bytes.
    #[debug("{}", String::from_utf8_lossy(file_name))]
    pub file_name: Bytes,
    pub created: DateTime<Utc>,
}

impl LiteralDataHeader {
    pub fn try_from_reader<B: BufRead>(mut input: B) -> Result<Self> {
        let mode = input.read_u8()?.into();
        let name_len = input.read_u8()?;
        let file_name = input.take_bytes(name_len.into())?;
        let created = timestamp_from_u32(input.read_be_u32()?);

        Ok(LiteralDataHeader {
            mode,
            file_name,
            created,
        })
    }

    /// "_CONSOLE" marks data that should not be written to disk.
    pub fn is_for_your_eyes_only(&self) -> bool {
        &self.file_name[..] == b"_CONSOLE"
    }
}

impl Serialize for LiteralDataHeader {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.mode.into(), self.file_name.len().try_into()?])?;
        writer.write_all(&self.file_name)?;
        writer.write_all(&timestamp_to_u32(&self.created)?.to_be_bytes())?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.file_name.len() + 4
    }
}

/// Literal Data Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.9>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct LiteralData {
    packet_header: PacketHeader,
    header: LiteralDataHeader,
    #[debug("{} bytes", data.len())]
    data: Bytes,
}

impl LiteralData {
    /// Parses a `LiteralData` packet from the given reader.
    pub fn try_from_reader<B: BufRead>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let header = LiteralDataHeader::try_from_reader(&mut input)?;
        let data = input.rest()?;

        Ok(LiteralData {
            packet_header,
            header,
            data,
        })
    }

    /// Creates a binary literal data packet.
    pub fn from_bytes(file_name: &[u8], data: Bytes, created: DateTime<Utc>) -> Result<Self> {
        let header = LiteralDataHeader {
            mode: DataMode::Binary,
            file_name: Bytes::copy_from_slice(file_name),
            created,
        };
        let len = header.write_len() + data.len();
        Ok(LiteralData {
            packet_header: PacketHeader::new_fixed(Tag::LiteralData, len.try_into()?),
            header,
            data,
        })
    }

    pub fn header(&self) -> &LiteralDataHeader {
        &self.header
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for LiteralData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.header.to_writer(writer)?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.header.write_len() + self.data.len()
    }
}

impl PacketTrait for LiteralData {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}
