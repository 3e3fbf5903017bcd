use std::io::{self, BufRead};

use crate::errors::{ensure_eq, Result};
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;

const PGP: [u8; 3] = [0x50, 0x47, 0x50];

/// Marker Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.8>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    packet_header: PacketHeader,
}

impl Marker {
    /// Parses a `Marker` packet from the given reader.
    pub fn try_from_reader<B: BufRead>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let marker = input.read_array::<3>()?;
        ensure_eq!(marker, PGP, "invalid input");

        Ok(Marker { packet_header })
    }
}

impl Serialize for Marker {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&PGP[..])?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        PGP.len()
    }
}

impl PacketTrait for Marker {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tag;

    #[test]
    fn marker() {
        let header = PacketHeader::new_fixed(Tag::Marker, 3);
        let packet = Marker::try_from_reader(header, &b"PGP"[..]).unwrap();
        assert_eq!(packet.to_bytes().unwrap(), b"PGP");
        assert!(Marker::try_from_reader(header, &b"PGX"[..]).is_err());
    }
}
