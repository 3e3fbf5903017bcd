use std::fmt;
use std::io::Read;

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use log::debug;

use crate::config::Config;
use crate::crypto::hash::{HashAlgorithm, Hasher};
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{bail, unsupported_err, Error, Result};
use crate::packet::{
    PublicKey, SecretKey, Signature, SignatureType, SignatureVersion, Subpacket, SubpacketData,
};
use crate::ser::Serialize;
use crate::types::KeyId;
use crate::util::{timestamp_to_u32, CanonicalLines};

#[derive(Clone, PartialEq, Eq, Builder)]
#[builder(build_fn(error = "Error"))]
pub struct SignatureConfig {
    #[builder(default)]
    pub version: SignatureVersion,
    pub typ: SignatureType,
    pub pub_alg: PublicKeyAlgorithm,

    #[builder(default)]
    pub hash_alg: HashAlgorithm,

    #[builder(default)]
    pub unhashed_subpackets: Vec<Subpacket>,
    #[builder(default)]
    pub hashed_subpackets: Vec<Subpacket>,

    // only set on v2 and v3 signatures
    #[builder(default)]
    pub created: Option<DateTime<Utc>>,
    #[builder(default)]
    pub issuer: Option<KeyId>,
}

impl SignatureConfig {
    pub fn new_v4(
        typ: SignatureType,
        pub_alg: PublicKeyAlgorithm,
        hash_alg: HashAlgorithm,
        hashed_subpackets: Vec<Subpacket>,
        unhashed_subpackets: Vec<Subpacket>,
    ) -> Self {
        SignatureConfig {
            version: SignatureVersion::V4,
            typ,
            pub_alg,
            hash_alg,
            hashed_subpackets,
            unhashed_subpackets,
            issuer: None,
            created: None,
        }
    }

    /// Starts a digest with the configured hash, if it and the public key algorithm are enabled.
    pub fn new_hasher(&self, config: &Config) -> Result<Hasher> {
        if !config.is_public_key_enabled(self.pub_alg) {
            unsupported_err!("public key algorithm {:?} is not enabled", self.pub_alg);
        }
        if !config.is_hash_enabled(self.hash_alg) {
            unsupported_err!("hash function {} is not enabled", self.hash_alg);
        }
        self.hash_alg.new_hasher()
    }

    /// Sign the given data with `key`, which must be unlocked.
    pub fn sign<R: Read>(self, config: &Config, key: &SecretKey, mut data: R) -> Result<Signature> {
        debug!("signing {:?} with {:X}", self.typ, key.key_id());
        let mut hasher = self.new_hasher(config)?;

        let mut buf = vec![0u8; 8 * 1024];
        let mut canonical = CanonicalLines::default();
        loop {
            let read = data.read(&mut buf)?;
            if read == 0 {
                break;
            }
            match self.typ {
                SignatureType::Text => canonical.feed(&buf[..read], |b| hasher.update(b)),
                SignatureType::Binary => hasher.update(&buf[..read]),
                _ => bail!("can not sign {:?} over data", self.typ),
            }
        }

        let len = self.hash_signature_data(&mut hasher)?;
        hasher.update(&self.trailer(len)?);

        let hash = hasher.finalize();
        let signed_hash_value = [hash[0], hash[1]];
        let signature = key.sign(self.hash_alg, &hash)?;

        Signature::from_config(self, signed_hash_value, signature)
    }

    /// Signs the binding between `primary` and `subkey` with `key`.
    ///
    /// The counterpart of [`Signature::verify_key_binding`].
    pub fn sign_key_binding(
        self,
        config: &Config,
        key: &SecretKey,
        primary: &PublicKey,
        subkey: &PublicKey,
    ) -> Result<Signature> {
        debug!(
            "signing key binding {:?} {:X} - {:X} with {:X}",
            self.typ,
            primary.key_id(),
            subkey.key_id(),
            key.key_id()
        );
        let mut hasher = self.new_hasher(config)?;
        primary.to_writer_old(&mut hasher)?;
        subkey.to_writer_old(&mut hasher)?;

        let len = self.hash_signature_data(&mut hasher)?;
        hasher.update(&self.trailer(len)?);

        let hash = hasher.finalize();
        let signed_hash_value = [hash[0], hash[1]];
        let signature = key.sign(self.hash_alg, &hash)?;

        Signature::from_config(self, signed_hash_value, signature)
    }

    /// Hashes the part of the signature packet that is covered by the signature.
    ///
    /// Returns the number of bytes hashed, which goes into the trailer.
    pub fn hash_signature_data(&self, hasher: &mut Hasher) -> Result<usize> {
        match self.version {
            SignatureVersion::V2 | SignatureVersion::V3 => {
                let Some(created) = self.created else {
                    bail!("v3 signature without creation time");
                };
                let mut buf = [0u8; 5];
                buf[0] = self.typ.into();
                BigEndian::write_u32(&mut buf[1..], timestamp_to_u32(&created)?);
                hasher.update(&buf);

                // no trailer
                Ok(0)
            }
            SignatureVersion::V4 => {
                let mut res = vec![
                    self.version.into(),
                    self.typ.into(),
                    self.pub_alg.into(),
                    self.hash_alg.into(),
                    // will be filled with the length
                    0u8,
                    0u8,
                ];

                let mut hashed_subpackets = Vec::new();
                for packet in &self.hashed_subpackets {
                    packet.to_writer(&mut hashed_subpackets)?;
                }
                BigEndian::write_u16(&mut res[4..6], hashed_subpackets.len().try_into()?);
                res.extend(hashed_subpackets);

                hasher.update(&res);

                Ok(res.len())
            }
        }
    }

    pub fn trailer(&self, len: usize) -> Result<Vec<u8>> {
        match self.version {
            SignatureVersion::V2 | SignatureVersion::V3 => Ok(Vec::new()),
            SignatureVersion::V4 => {
                let mut trailer = vec![0x04, 0xFF, 0, 0, 0, 0];
                BigEndian::write_u32(&mut trailer[2..], len.try_into()?);
                Ok(trailer)
            }
        }
    }

    pub fn hashed_subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.hashed_subpackets.iter()
    }

    pub fn unhashed_subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.unhashed_subpackets.iter()
    }

    /// Returns if the signature is a certification or not.
    pub fn is_certification(&self) -> bool {
        matches!(
            self.typ,
            SignatureType::CertGeneric
                | SignatureType::CertPersona
                | SignatureType::CertCasual
                | SignatureType::CertPositive
                | SignatureType::CertRevocation
        )
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        if self.created.is_some() {
            return self.created.as_ref();
        }

        self.hashed_subpackets().find_map(|p| match &p.data {
            SubpacketData::SignatureCreationTime(d) => Some(d),
            _ => None,
        })
    }

    /// The issuer key id, taken from the issuer subpacket or an issuer fingerprint.
    pub fn issuer(&self) -> Option<KeyId> {
        if self.issuer.is_some() {
            return self.issuer;
        }

        let subpackets = || self.hashed_subpackets().chain(self.unhashed_subpackets());
        subpackets()
            .find_map(|p| match &p.data {
                SubpacketData::Issuer(id) => Some(*id),
                _ => None,
            })
            .or_else(|| {
                subpackets().find_map(|p| match &p.data {
                    SubpacketData::IssuerFingerprint(4, fp) if fp.len() == 20 => {
                        KeyId::from_slice(&fp[12..]).ok()
                    }
                    _ => None,
                })
            })
    }
}

impl fmt::Debug for SignatureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureConfig")
            .field("version", &self.version)
            .field("typ", &self.typ)
            .field("pub_alg", &self.pub_alg)
            .field("hash_alg", &self.hash_alg)
            .field("created", &self.created)
            .field("issuer", &self.issuer)
            .field("unhashed_subpackets", &self.unhashed_subpackets)
            .field("hashed_subpackets", &self.hashed_subpackets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::util::timestamp_from_u32;

    fn v4_config() -> SignatureConfig {
        SignatureConfigBuilder::default()
            .typ(SignatureType::Binary)
            .pub_alg(PublicKeyAlgorithm::RSA)
            .hash_alg(HashAlgorithm::Sha256)
            .hashed_subpackets(vec![Subpacket::regular(
                SubpacketData::SignatureCreationTime(timestamp_from_u32(0x5000_0000)),
            )
            .unwrap()])
            .build()
            .unwrap()
    }

    #[test]
    fn v4_hashed_data_and_trailer() {
        let config = v4_config();
        let mut hasher = HashAlgorithm::Sha256.new_hasher().unwrap();
        let len = config.hash_signature_data(&mut hasher).unwrap();
        // 6 header bytes, 6 bytes creation time subpacket
        assert_eq!(len, 12);
        assert_eq!(hex::encode(config.trailer(len).unwrap()), "04ff0000000c");

        let mut expected = HashAlgorithm::Sha256.new_hasher().unwrap();
        expected.update(&hex::decode("040001080006050250000000").unwrap());
        assert_eq!(hasher.finalize(), expected.finalize());
    }

    #[test]
    fn v3_has_no_trailer() {
        let config = SignatureConfigBuilder::default()
            .version(SignatureVersion::V3)
            .typ(SignatureType::Text)
            .pub_alg(PublicKeyAlgorithm::DSA)
            .hash_alg(HashAlgorithm::Sha1)
            .created(Some(timestamp_from_u32(1)))
            .issuer(Some(KeyId::from(7u64)))
            .build()
            .unwrap();
        let mut hasher = HashAlgorithm::Sha1.new_hasher().unwrap();
        assert_eq!(config.hash_signature_data(&mut hasher).unwrap(), 0);
        assert!(config.trailer(0).unwrap().is_empty());
        assert_eq!(config.issuer(), Some(KeyId::from(7u64)));
    }

    #[test]
    fn disabled_hash_is_unsupported() {
        let config = ConfigBuilder::default()
            .hash_algorithms(vec![HashAlgorithm::Sha512])
            .build()
            .unwrap();
        let err = v4_config().new_hasher(&config).unwrap_err();
        assert!(err.is_unsupported());
        assert_eq!(err.to_string(), "unsupported: hash function SHA256 is not enabled");
    }

    #[test]
    fn disabled_public_key_algorithm_is_unsupported() {
        let config = ConfigBuilder::default()
            .public_key_algorithms(vec![PublicKeyAlgorithm::DSA])
            .build()
            .unwrap();
        let err = v4_config().new_hasher(&config).unwrap_err();
        assert!(err.is_unsupported(), "{err:?}");
        assert!(err.to_string().contains("public key algorithm"), "{err}");
    }
}
