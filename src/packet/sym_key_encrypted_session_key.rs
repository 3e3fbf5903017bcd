use std::io::{self, BufRead};

use bytes::Bytes;
use log::debug;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{unsupported_err, Error, Result};
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::StringToKey;

/// Symmetric-Key Encrypted Session Key Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.3>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct SymKeyEncryptedSessionKey {
    packet_header: PacketHeader,
    sym_algorithm: SymmetricKeyAlgorithm,
    s2k: StringToKey,
    #[debug("{:?}", encrypted_key.as_ref().map(hex::encode))]
    encrypted_key: Option<Bytes>,
}

impl SymKeyEncryptedSessionKey {
    /// Parses a `SymKeyEncryptedSessionKey` packet from the given reader.
    pub fn try_from_reader<B: BufRead>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let version = input.read_u8()?;
        if version != 4 {
            unsupported_err!("symmetric key encrypted session key version {}", version);
        }
        let sym_algorithm = SymmetricKeyAlgorithm::from(input.read_u8()?);
        let s2k = StringToKey::try_from_reader(&mut input)?;
        let rest = input.rest()?;
        let encrypted_key = if rest.is_empty() { None } else { Some(rest) };

        Ok(SymKeyEncryptedSessionKey {
            packet_header,
            sym_algorithm,
            s2k,
            encrypted_key,
        })
    }

    pub fn sym_algorithm(&self) -> SymmetricKeyAlgorithm {
        self.sym_algorithm
    }

    pub fn s2k(&self) -> &StringToKey {
        &self.s2k
    }

    /// Derives the session key from a passphrase.
    ///
    /// Without an encrypted key the derived key is the session key itself. Otherwise the derived
    /// key decrypts the algorithm octet and the session key, using CFB with a zero IV.
    pub fn decrypt(
        &self,
        config: &Config,
        passphrase: &[u8],
    ) -> Result<(SymmetricKeyAlgorithm, Zeroizing<Vec<u8>>)> {
        let key_size = self.sym_algorithm.key_size();
        if key_size == 0 {
            unsupported_err!("session key cipher {:?}", self.sym_algorithm);
        }
        let key = self.s2k.derive_key(config, passphrase, key_size)?;

        let Some(encrypted_key) = &self.encrypted_key else {
            return Ok((self.sym_algorithm, key));
        };

        let mut decrypted = Zeroizing::new(encrypted_key.to_vec());
        let iv = vec![0u8; self.sym_algorithm.block_size()];
        self.sym_algorithm
            .decrypt_with_iv_regular(&key, &iv, &mut decrypted)?;

        let alg = SymmetricKeyAlgorithm::from(decrypted[0]);
        let session_key = Zeroizing::new(decrypted[1..].to_vec());
        if alg.key_size() == 0 || alg.key_size() != session_key.len() {
            debug!("decrypted session key does not match {:?}", alg);
            return Err(Error::KeyIncorrect);
        }

        Ok((alg, session_key))
    }
}

impl Serialize for SymKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[4, self.sym_algorithm.into()])?;
        self.s2k.to_writer(writer)?;
        if let Some(key) = &self.encrypted_key {
            writer.write_all(key)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.s2k.write_len() + self.encrypted_key.as_ref().map(|k| k.len()).unwrap_or(0)
    }
}

impl PacketTrait for SymKeyEncryptedSessionKey {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::HashAlgorithm;
    use crate::types::Tag;

    #[test]
    fn derived_key_is_session_key() {
        // v4, CAST5, iterated and salted SHA1
        let raw = hex::decode("04030302eb4a03808145d0d260").unwrap();
        let header = PacketHeader::new_fixed(Tag::SymKeyEncryptedSessionKey, raw.len() as u32);
        let skesk = SymKeyEncryptedSessionKey::try_from_reader(header, &raw[..]).unwrap();
        assert_eq!(skesk.sym_algorithm(), SymmetricKeyAlgorithm::CAST5);
        assert_eq!(skesk.s2k().hash_alg(), HashAlgorithm::Sha1);
        assert_eq!(skesk.to_bytes().unwrap(), raw);

        let (alg, key) = skesk.decrypt(&Config::default(), b"password").unwrap();
        assert_eq!(alg, SymmetricKeyAlgorithm::CAST5);
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn encrypted_session_key() {
        let s2k = StringToKey::Salted {
            hash_alg: HashAlgorithm::Sha256,
            salt: [7; 8],
        };
        let kek = s2k.derive_key(&Config::default(), b"pw", 16).unwrap();
        let mut esk = vec![u8::from(SymmetricKeyAlgorithm::AES256)];
        esk.extend_from_slice(&[0x11; 32]);
        SymmetricKeyAlgorithm::AES128
            .encrypt_with_iv_regular(&kek, &[0u8; 16], &mut esk)
            .unwrap();

        let skesk = SymKeyEncryptedSessionKey {
            packet_header: PacketHeader::new_fixed(Tag::SymKeyEncryptedSessionKey, 0),
            sym_algorithm: SymmetricKeyAlgorithm::AES128,
            s2k,
            encrypted_key: Some(esk.into()),
        };
        let (alg, key) = skesk.decrypt(&Config::default(), b"pw").unwrap();
        assert_eq!(alg, SymmetricKeyAlgorithm::AES256);
        assert_eq!(&key[..], &[0x11; 32]);
    }
}
