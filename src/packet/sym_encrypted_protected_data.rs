use std::io::{self, BufRead};

use bytes::Bytes;

use crate::errors::{unsupported_err, Result};
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;

/// The only defined version of the protected data packet.
pub const SEIPD_VERSION: u8 = 1;

/// Sym. Encrypted Integrity Protected Data Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.13>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct SymEncryptedProtectedData {
    packet_header: PacketHeader,
    #[debug("{} bytes", data.len())]
    data: Bytes,
}

impl SymEncryptedProtectedData {
    /// Parses a `SymEncryptedProtectedData` packet from the given reader.
    pub fn try_from_reader<B: BufRead>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let version = input.read_u8()?;
        if version != SEIPD_VERSION {
            unsupported_err!("protected data version {}", version);
        }
        let data = input.rest()?;
        Ok(SymEncryptedProtectedData {
            packet_header,
            data,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for SymEncryptedProtectedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[SEIPD_VERSION])?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + self.data.len()
    }
}

impl PacketTrait for SymEncryptedProtectedData {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}
