use std::io::{self, BufRead};

use log::debug;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::crypto::checksum;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{unsupported_err, Error, Result};
use crate::packet::{
    PacketHeader, PacketTrait, PkeskValues, PublicKey, PublicKeyEncryptedSessionKey,
};
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyId, Mpi, PublicParams, SecretParams, Tag};

/// Secret Key Packet, primary or subkey.
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.1.3>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SecretKey {
    packet_header: PacketHeader,
    details: PublicKey,
    secret_params: SecretParams,
}

impl SecretKey {
    /// Parses a `SecretKey` or `SecretSubkey` packet from the given reader.
    pub fn try_from_reader<B: BufRead>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let public_tag = match packet_header.tag() {
            Tag::SecretSubkey => Tag::PublicSubkey,
            _ => Tag::PublicKey,
        };
        let details =
            PublicKey::read_public_part(PacketHeader::new_fixed(public_tag, 0), &mut input)?
                .with_tag(public_tag)?;
        if let PublicParams::Unknown { .. } = details.public_params() {
            // the public material swallowed the rest, the secret part can't be found
            unsupported_err!(
                "secret key with public key algorithm {}",
                u8::from(details.algorithm())
            );
        }
        let secret_params = SecretParams::try_from_reader(details.algorithm(), &mut input)?;

        Ok(SecretKey {
            packet_header,
            details,
            secret_params,
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.details
    }

    pub fn secret_params(&self) -> &SecretParams {
        &self.secret_params
    }

    pub fn key_id(&self) -> KeyId {
        self.details.key_id()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.details.fingerprint()
    }

    /// The secret material is still protected by a passphrase.
    pub fn is_locked(&self) -> bool {
        self.secret_params.is_encrypted()
    }

    /// GNU dummy keys carry no secret material.
    pub fn is_dummy(&self) -> bool {
        self.secret_params.is_dummy()
    }

    /// Decrypts the secret material in place.
    ///
    /// Unlocking plain or dummy keys succeeds without doing anything. A wrong passphrase
    /// returns `KeyIncorrect` and leaves the key untouched, as does a protection scheme using
    /// algorithms `config` does not enable.
    pub fn unlock(&mut self, config: &Config, passphrase: &[u8]) -> Result<()> {
        let plain = match &self.secret_params {
            SecretParams::Plain(_) | SecretParams::Dummy { .. } => return Ok(()),
            SecretParams::Encrypted(enc) => {
                enc.unlock(config, passphrase, self.details.algorithm())?
            }
        };
        debug!("unlocked key {:X}", self.key_id());
        self.secret_params = SecretParams::Plain(plain);
        Ok(())
    }

    /// Signs a digest that was computed with `hash`.
    pub fn sign(&self, hash: HashAlgorithm, digest: &[u8]) -> Result<Vec<Mpi>> {
        match &self.secret_params {
            SecretParams::Plain(plain) => plain.sign(self.details.public_params(), hash, digest),
            SecretParams::Dummy { .. } => Err(Error::DummyKey),
            SecretParams::Encrypted(_) => Err(Error::InvalidArgument {
                message: format!("key {:X} is locked", self.key_id()),
            }),
        }
    }

    /// Recovers the session key of a message encrypted to this key.
    ///
    /// The decrypted value is the cipher id, the key and a two byte checksum over the key.
    pub fn decrypt_session_key(
        &self,
        pkesk: &PublicKeyEncryptedSessionKey,
    ) -> Result<(SymmetricKeyAlgorithm, Zeroizing<Vec<u8>>)> {
        let plain = match &self.secret_params {
            SecretParams::Plain(plain) => plain,
            SecretParams::Dummy { .. } => return Err(Error::DummyKey),
            SecretParams::Encrypted(_) => {
                return Err(Error::InvalidArgument {
                    message: format!("key {:X} is locked", self.key_id()),
                })
            }
        };
        if let PkeskValues::Ecdh { .. } = pkesk.values() {
            unsupported_err!("ecdh session keys");
        }

        let decrypted = Zeroizing::new(
            plain
                .decrypt(self.details.public_params(), &pkesk.values().mpis())
                .map_err(|err| {
                    debug!("session key decryption failed: {:?}", err);
                    Error::KeyIncorrect
                })?,
        );
        if decrypted.len() < 3 {
            return Err(Error::KeyIncorrect);
        }

        let alg = SymmetricKeyAlgorithm::from(decrypted[0]);
        let key_end = decrypted.len() - 2;
        let key = &decrypted[1..key_end];
        if alg.key_size() == 0 || key.len() != alg.key_size() {
            debug!("session key length does not match {:?}", alg);
            return Err(Error::KeyIncorrect);
        }
        let actual = [decrypted[key_end], decrypted[key_end + 1]];
        if checksum::simple(actual, key).is_err() {
            return Err(Error::KeyIncorrect);
        }

        Ok((alg, Zeroizing::new(key.to_vec())))
    }
}

impl Serialize for SecretKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.details.to_writer(writer)?;
        self.secret_params.to_writer(writer)
    }

    fn write_len(&self) -> usize {
        self.details.write_len() + self.secret_params.write_len()
    }
}

impl PacketTrait for SecretKey {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::public_key::PublicKeyAlgorithm;
    use crate::types::{PlainSecretParams, PublicParams, StringToKey};
    use crate::util::timestamp_from_u32;

    fn dsa_parts() -> (PublicParams, PlainSecretParams) {
        // toy group, only used for framing
        let public = PublicParams::DSA {
            p: Mpi::from_slice(&[23]),
            q: Mpi::from_slice(&[11]),
            g: Mpi::from_slice(&[4]),
            y: Mpi::from_slice(&[8]),
        };
        (public, PlainSecretParams::DSA { x: vec![3] })
    }

    fn secret_key_bytes(secret: &SecretParams) -> (PublicKey, Vec<u8>) {
        let (public, _) = dsa_parts();
        let key = PublicKey::new(
            Tag::PublicKey,
            PublicKeyAlgorithm::DSA,
            timestamp_from_u32(1_000_000),
            public,
        )
        .unwrap();
        let mut body = key.to_bytes().unwrap();
        secret.to_writer(&mut body).unwrap();
        (key, body)
    }

    #[test]
    fn parse_plain_secret_key() {
        let _ = pretty_env_logger::try_init();

        let (_, plain) = dsa_parts();
        let (public, body) = secret_key_bytes(&SecretParams::Plain(plain));
        let header = PacketHeader::new_fixed(Tag::SecretKey, body.len() as u32);
        let mut key = SecretKey::try_from_reader(header, &body[..]).unwrap();

        assert_eq!(key.key_id(), public.key_id());
        assert_eq!(key.public_key(), &public);
        assert!(!key.is_locked());
        // unlocking a plain key is a no-op
        key.unlock(&Config::default(), b"anything").unwrap();
        assert_eq!(key.to_bytes().unwrap(), body);
    }

    #[test]
    fn dummy_key_cannot_sign() {
        let secret = SecretParams::Dummy {
            s2k_usage: 254,
            sym_alg: SymmetricKeyAlgorithm::CAST5,
            s2k: StringToKey::GnuDummy {
                hash_alg: HashAlgorithm::Sha1,
            },
        };
        let (_, body) = secret_key_bytes(&secret);
        let header = PacketHeader::new_fixed(Tag::SecretSubkey, body.len() as u32);
        let mut key = SecretKey::try_from_reader(header, &body[..]).unwrap();

        assert!(key.is_dummy());
        assert!(key.public_key().is_subkey());
        key.unlock(&Config::default(), b"lucy").unwrap();
        assert!(matches!(
            key.sign(HashAlgorithm::Sha256, &[0u8; 32]),
            Err(Error::DummyKey)
        ));
    }
}
