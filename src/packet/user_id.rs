use std::io::{self, BufRead};

use bytes::Bytes;

use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Tag;

/// User ID Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.11>
///
/// The content is kept as raw bytes, it is expected but not required to be UTF-8.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct UserId {
    packet_header: PacketHeader,
    #[debug("{}", String::from_utf8_lossy(id))]
    id: Bytes,
}

impl UserId {
    /// Parses a `UserId` packet from the given reader.
    pub fn try_from_reader<B: BufRead>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let id = input.rest()?;
        Ok(UserId { packet_header, id })
    }

    /// Creates a new user id packet.
    pub fn from_str(id: &str) -> Result<Self> {
        let packet_header = PacketHeader::new_fixed(Tag::UserId, id.len().try_into()?);
        Ok(UserId {
            packet_header,
            id: Bytes::copy_from_slice(id.as_bytes()),
        })
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// The id as a string, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.id).ok()
    }
}

impl Serialize for UserId {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.id)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.id.len()
    }
}

impl PacketTrait for UserId {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}
