use std::io::{self, BufRead};

use bytes::Bytes;
use log::debug;

use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;

/// Trust Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.10>
///
/// Trust packets are only meaningful inside a keyring of the implementation that wrote them
/// and are ignored.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Trust {
    packet_header: PacketHeader,
    #[debug("{}", hex::encode(data))]
    data: Bytes,
}

impl Trust {
    /// Parses a `Trust` packet from the given reader.
    pub fn try_from_reader<B: BufRead>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let data = input.rest()?;
        debug!("ignoring trust packet of {} bytes", data.len());
        Ok(Trust {
            packet_header,
            data,
        })
    }
}

impl Serialize for Trust {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.data.len()
    }
}

impl PacketTrait for Trust {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}
