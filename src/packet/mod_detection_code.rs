use std::io::{self, BufRead};

use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;

/// Modification Detection Code Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.14>
///
/// Only valid as the last packet inside decrypted protected data, where it is consumed by the
/// decryptor. Seeing one anywhere else is reported, not acted on.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct ModDetectionCode {
    packet_header: PacketHeader,
    /// 20 byte SHA1 hash of the preceding plaintext data.
    #[debug("{}", hex::encode(hash))]
    hash: [u8; 20],
}

impl ModDetectionCode {
    /// Parses a `ModDetectionCode` packet from the given reader.
    pub fn try_from_reader<B: BufRead>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let hash = input.read_array::<20>()?;
        Ok(ModDetectionCode {
            packet_header,
            hash,
        })
    }

    pub fn hash(&self) -> &[u8; 20] {
        &self.hash
    }
}

impl Serialize for ModDetectionCode {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.hash[..])?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.hash.len()
    }
}

impl PacketTrait for ModDetectionCode {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}
