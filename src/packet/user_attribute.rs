use std::io::{self, BufRead};

use bytes::Bytes;

use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;

/// User Attribute Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.12>
///
/// The attribute subpackets (usually a JPEG image) are not interpreted, only certified.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct UserAttribute {
    packet_header: PacketHeader,
    #[debug("{} bytes", data.len())]
    data: Bytes,
}

impl UserAttribute {
    /// Parses a `UserAttribute` packet from the given reader.
    pub fn try_from_reader<B: BufRead>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let data = input.rest()?;
        Ok(UserAttribute {
            packet_header,
            data,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for UserAttribute {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.data.len()
    }
}

impl PacketTrait for UserAttribute {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}
