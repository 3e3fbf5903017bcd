use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use crate::errors::{bail, ensure, Result};
use crate::packet::signature::SignatureConfig;
use crate::packet::{Signature, SignatureVersion, Subpacket};
use crate::ser::Serialize;
use crate::util::timestamp_to_u32;

impl Serialize for Signature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.config.version.into())?;

        match self.config.version {
            SignatureVersion::V2 | SignatureVersion::V3 => self.to_writer_v3(writer)?,
            SignatureVersion::V4 => self.to_writer_v4(writer)?,
        }

        writer.write_all(&self.signed_hash_value)?;
        self.signature.to_writer(writer)
    }

    fn write_len(&self) -> usize {
        let body = match self.config.version {
            // len, type, creation time, issuer, algorithms
            SignatureVersion::V2 | SignatureVersion::V3 => 1 + 1 + 4 + 8 + 2,
            // type, algorithms, then both subpacket areas
            SignatureVersion::V4 => {
                3 + 2
                    + self.config.hashed_subpackets.write_len()
                    + 2
                    + self.config.unhashed_subpackets.write_len()
            }
        };

        1 + body + 2 + self.signature.write_len()
    }
}

impl Signature {
    fn to_writer_v3<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let config = &self.config;
        let (Some(created), Some(issuer)) = (config.created, config.issuer) else {
            bail!("v3 signature needs creation time and issuer");
        };

        writer.write_u8(5)?;
        writer.write_u8(config.typ.into())?;
        writer.write_u32::<BigEndian>(timestamp_to_u32(&created)?)?;
        writer.write_all(issuer.as_ref())?;
        writer.write_u8(config.pub_alg.into())?;
        writer.write_u8(config.hash_alg.into())?;

        Ok(())
    }

    fn to_writer_v4<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let config = &self.config;
        writer.write_u8(config.typ.into())?;
        writer.write_u8(config.pub_alg.into())?;
        writer.write_u8(config.hash_alg.into())?;

        write_area(config, &config.hashed_subpackets, writer)?;
        write_area(config, &config.unhashed_subpackets, writer)
    }
}

fn write_area<W: io::Write>(
    config: &SignatureConfig,
    subpackets: &[Subpacket],
    writer: &mut W,
) -> Result<()> {
    let len = subpackets.write_len();
    ensure!(
        len <= usize::from(u16::MAX),
        "subpacket area too large for {:?}",
        config.typ
    );
    writer.write_u16::<BigEndian>(len.try_into()?)?;
    subpackets.to_writer(writer)
}
