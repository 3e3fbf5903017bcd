use std::io::{self, BufRead};

use bytes::Bytes;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{unsupported_err, Result};
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{KeyId, Mpi};

/// The algorithm specific encrypted session key.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum PkeskValues {
    Rsa {
        mpi: Mpi,
    },
    Elgamal {
        first: Mpi,
        second: Mpi,
    },
    Ecdh {
        public_point: Mpi,
        #[debug("{}", hex::encode(encrypted_session_key))]
        encrypted_session_key: Bytes,
    },
}

impl PkeskValues {
    /// The values as a list of MPIs, as consumed by RSA and Elgamal decryption.
    pub fn mpis(&self) -> Vec<Mpi> {
        match self {
            PkeskValues::Rsa { mpi } => vec![mpi.clone()],
            PkeskValues::Elgamal { first, second } => vec![first.clone(), second.clone()],
            PkeskValues::Ecdh { public_point, .. } => vec![public_point.clone()],
        }
    }
}

/// Public-Key Encrypted Session Key Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.1>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyEncryptedSessionKey {
    packet_header: PacketHeader,
    id: KeyId,
    algorithm: PublicKeyAlgorithm,
    values: PkeskValues,
}

impl PublicKeyEncryptedSessionKey {
    /// Parses a `PublicKeyEncryptedSessionKey` packet from the given reader.
    pub fn try_from_reader<B: BufRead>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let version = input.read_u8()?;
        if version != 3 {
            unsupported_err!("public key encrypted session key version {}", version);
        }
        let id = KeyId::from(input.read_array::<8>()?);
        let algorithm = PublicKeyAlgorithm::from(input.read_u8()?);

        let values = match algorithm {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt => PkeskValues::Rsa {
                mpi: Mpi::from_reader(&mut input)?,
            },
            PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalEncrypt => {
                PkeskValues::Elgamal {
                    first: Mpi::from_reader(&mut input)?,
                    second: Mpi::from_reader(&mut input)?,
                }
            }
            PublicKeyAlgorithm::ECDH => {
                let public_point = Mpi::from_reader(&mut input)?;
                let len = input.read_u8()?;
                let encrypted_session_key = input.take_bytes(len.into())?;
                PkeskValues::Ecdh {
                    public_point,
                    encrypted_session_key,
                }
            }
            _ => unsupported_err!("encryption to {:?}", algorithm),
        };

        Ok(PublicKeyEncryptedSessionKey {
            packet_header,
            id,
            algorithm,
            values,
        })
    }

    /// The recipient, all zeros for an anonymous recipient.
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    pub fn values(&self) -> &PkeskValues {
        &self.values
    }
}

impl Serialize for PublicKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[3])?;
        writer.write_all(self.id.as_ref())?;
        writer.write_all(&[self.algorithm.into()])?;
        match &self.values {
            PkeskValues::Rsa { mpi } => mpi.to_writer(writer)?,
            PkeskValues::Elgamal { first, second } => {
                first.to_writer(writer)?;
                second.to_writer(writer)?;
            }
            PkeskValues::Ecdh {
                public_point,
                encrypted_session_key,
            } => {
                public_point.to_writer(writer)?;
                writer.write_all(&[encrypted_session_key.len().try_into()?])?;
                writer.write_all(encrypted_session_key)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        let values = match &self.values {
            PkeskValues::Rsa { mpi } => mpi.write_len(),
            PkeskValues::Elgamal { first, second } => first.write_len() + second.write_len(),
            PkeskValues::Ecdh {
                public_point,
                encrypted_session_key,
            } => public_point.write_len() + 1 + encrypted_session_key.len(),
        };
        1 + 8 + 1 + values
    }
}

impl PacketTrait for PublicKeyEncryptedSessionKey {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tag;

    #[test]
    fn wildcard_recipient() {
        let mut raw = hex::decode("0300000000000000000103ff").unwrap();
        raw.extend_from_slice(&[0x42; 128]);
        let header = PacketHeader::new_fixed(Tag::PublicKeyEncryptedSessionKey, raw.len() as u32);
        let pkesk = PublicKeyEncryptedSessionKey::try_from_reader(header, &raw[..]).unwrap();
        assert!(pkesk.id().is_wildcard());
        assert_eq!(pkesk.algorithm(), PublicKeyAlgorithm::RSA);
        assert_eq!(pkesk.values().mpis().len(), 1);
        assert_eq!(pkesk.to_bytes().unwrap(), raw);
    }
}
