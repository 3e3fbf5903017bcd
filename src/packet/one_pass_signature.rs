use std::io::{self, BufRead};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{unsupported_err, Result};
use crate::packet::{PacketHeader, PacketTrait, SignatureType};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{KeyId, Tag};

/// One-Pass Signature Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.4>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnePassSignature {
    packet_header: PacketHeader,
    pub typ: SignatureType,
    pub hash_algorithm: HashAlgorithm,
    pub pub_algorithm: PublicKeyAlgorithm,
    pub key_id: KeyId,
    /// Zero if more one pass signatures follow that apply to the same data.
    pub last: u8,
}

impl OnePassSignature {
    /// Parses a `OnePassSignature` packet from the given reader.
    pub fn try_from_reader<B: BufRead>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let version = input.read_u8()?;
        if version != 3 {
            unsupported_err!("one pass signature version {}", version);
        }
        let typ = input.read_u8()?.into();
        let hash_algorithm = input.read_u8()?.into();
        let pub_algorithm = input.read_u8()?.into();
        let key_id = KeyId::from(input.read_array::<8>()?);
        let last = input.read_u8()?;

        Ok(OnePassSignature {
            packet_header,
            typ,
            hash_algorithm,
            pub_algorithm,
            key_id,
            last,
        })
    }

    pub fn new(
        typ: SignatureType,
        hash_algorithm: HashAlgorithm,
        pub_algorithm: PublicKeyAlgorithm,
        key_id: KeyId,
    ) -> Self {
        OnePassSignature {
            packet_header: PacketHeader::new_fixed(Tag::OnePassSignature, 13),
            typ,
            hash_algorithm,
            pub_algorithm,
            key_id,
            last: 1,
        }
    }
}

impl Serialize for OnePassSignature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[
            3,
            self.typ.into(),
            self.hash_algorithm.into(),
            self.pub_algorithm.into(),
        ])?;
        writer.write_all(self.key_id.as_ref())?;
        writer.write_all(&[self.last])?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        13
    }
}

impl PacketTrait for OnePassSignature {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}
