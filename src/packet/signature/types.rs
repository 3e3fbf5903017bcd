use std::io::Read;

use bitfield::bitfield;
use chrono::{DateTime, Duration, Utc};
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::config::Config;
use crate::crypto::hash::{HashAlgorithm, Hasher};
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{bail, Error, Result};
use crate::packet::signature::SignatureConfig;
use crate::packet::{PacketHeader, PacketTrait, PublicKey, SubpacketData};
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, KeyId, Mpi, Tag};
use crate::util::CanonicalLines;

/// Signature Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Signature {
    pub(crate) packet_header: PacketHeader,

    pub config: SignatureConfig,
    #[debug("{}", hex::encode(signed_hash_value))]
    pub signed_hash_value: [u8; 2],
    pub signature: Vec<Mpi>,
}

impl Signature {
    pub fn from_config(
        config: SignatureConfig,
        signed_hash_value: [u8; 2],
        signature: Vec<Mpi>,
    ) -> Result<Self> {
        let mut sig = Signature {
            packet_header: PacketHeader::new_fixed(Tag::Signature, 0),
            config,
            signed_hash_value,
            signature,
        };
        sig.packet_header = PacketHeader::new_fixed(Tag::Signature, sig.write_len().try_into()?);
        Ok(sig)
    }

    /// Returns what kind of signature this is.
    pub fn typ(&self) -> SignatureType {
        self.config.typ
    }

    pub fn version(&self) -> SignatureVersion {
        self.config.version
    }

    /// The used `HashAlgorithm`.
    pub fn hash_alg(&self) -> HashAlgorithm {
        self.config.hash_alg
    }

    pub fn pub_alg(&self) -> PublicKeyAlgorithm {
        self.config.pub_alg
    }

    /// Starts a digest for this signature, rejecting hash algorithms that are disabled.
    pub fn new_hasher(&self, config: &Config) -> Result<Hasher> {
        self.config.new_hasher(config)
    }

    /// Verify this signature over a document.
    ///
    /// Text signatures are computed over the data with line endings converted to `\r\n`.
    pub fn verify<R: Read>(&self, config: &Config, key: &PublicKey, mut data: R) -> Result<()> {
        let mut hasher = self.new_hasher(config)?;
        let mut canonical = match self.typ() {
            SignatureType::Text => Some(CanonicalLines::default()),
            _ => None,
        };

        let mut buf = vec![0u8; 8 * 1024];
        loop {
            let read = data.read(&mut buf)?;
            if read == 0 {
                break;
            }
            match canonical {
                Some(ref mut lines) => lines.feed(&buf[..read], |b| hasher.update(b)),
                None => hasher.update(&buf[..read]),
            }
        }

        self.verify_hasher(key, hasher)
    }

    /// Finishes a digest that already holds the signed data and checks it against `key`.
    pub fn verify_hasher(&self, key: &PublicKey, mut hasher: Hasher) -> Result<()> {
        let len = self.config.hash_signature_data(&mut hasher)?;
        hasher.update(&self.config.trailer(len)?);
        let hash = hasher.finalize();

        if hash[0..2] != self.signed_hash_value {
            debug!(
                "signed hash value mismatch: {} != {}",
                hex::encode(&hash[0..2]),
                hex::encode(self.signed_hash_value)
            );
            return Err(Error::SignatureMismatch {
                key_id: Some(key.key_id()),
            });
        }

        match key.verify_signature(self.config.hash_alg, &hash, &self.signature) {
            Ok(()) => Ok(()),
            Err(err) if err.is_unsupported() => Err(err),
            Err(err) => {
                debug!("signature by {:X} rejected: {}", key.key_id(), err);
                Err(Error::SignatureMismatch {
                    key_id: Some(key.key_id()),
                })
            }
        }
    }

    /// Verifies a certification of `id`, a user id or user attribute of `key`, made by `signer`.
    pub fn verify_certification(
        &self,
        config: &Config,
        signer: &PublicKey,
        key: &PublicKey,
        tag: Tag,
        id: &impl Serialize,
    ) -> Result<()> {
        debug!("verifying certification {:X} by {:X}", key.key_id(), signer.key_id());
        let mut hasher = self.new_hasher(config)?;
        key.to_writer_old(&mut hasher)?;

        let packet_buf = id.to_bytes()?;
        if self.config.version == SignatureVersion::V4 {
            let prefix = match tag {
                Tag::UserId => 0xB4,
                Tag::UserAttribute => 0xD1,
                _ => bail!("invalid tag for certification validation: {:?}", tag),
            };
            let len: u32 = packet_buf.len().try_into()?;
            hasher.update(&[prefix]);
            hasher.update(&len.to_be_bytes());
        }
        hasher.update(&packet_buf);

        self.verify_hasher(signer, hasher)
    }

    /// Verifies a signature over a primary key and subkey.
    ///
    /// Used for subkey bindings and revocations, signed by the primary key, and for
    /// primary key bindings (back signatures), signed by the subkey.
    pub fn verify_key_binding(
        &self,
        config: &Config,
        signer: &PublicKey,
        primary: &PublicKey,
        subkey: &PublicKey,
    ) -> Result<()> {
        debug!(
            "verifying key binding {:?} {:X} - {:X} by {:X}",
            self.typ(),
            primary.key_id(),
            subkey.key_id(),
            signer.key_id()
        );
        let mut hasher = self.new_hasher(config)?;
        primary.to_writer_old(&mut hasher)?;
        subkey.to_writer_old(&mut hasher)?;

        self.verify_hasher(signer, hasher)
    }

    /// Verifies a direct key signature or a key revocation.
    pub fn verify_key(&self, config: &Config, key: &PublicKey) -> Result<()> {
        debug!("verifying key signature {:?} {:X}", self.typ(), key.key_id());
        let mut hasher = self.new_hasher(config)?;
        key.to_writer_old(&mut hasher)?;

        self.verify_hasher(key, hasher)
    }

    /// Returns if the signature is a certification or not.
    pub fn is_certification(&self) -> bool {
        self.config.is_certification()
    }

    /// Seconds after key creation at which the key expires.
    pub fn key_expiration_time(&self) -> Option<u32> {
        self.config.hashed_subpackets().find_map(|p| match &p.data {
            SubpacketData::KeyExpirationTime(d) => Some(*d),
            _ => None,
        })
    }

    /// Seconds after signature creation at which the signature expires.
    pub fn signature_expiration_time(&self) -> Option<u32> {
        self.config.hashed_subpackets().find_map(|p| match &p.data {
            SubpacketData::SignatureExpirationTime(d) => Some(*d),
            _ => None,
        })
    }

    /// Has the signature expired at `now`.
    pub fn is_expired_at(&self, now: &DateTime<Utc>) -> bool {
        match (self.created(), self.signature_expiration_time()) {
            (Some(created), Some(secs)) if secs != 0 => {
                *created + Duration::seconds(i64::from(secs)) < *now
            }
            _ => false,
        }
    }

    /// Has `key`, which this signature governs, expired at `now`.
    pub fn is_key_expired_at(&self, key: &PublicKey, now: &DateTime<Utc>) -> bool {
        match self.key_expiration_time() {
            Some(secs) if secs != 0 => {
                *key.created_at() + Duration::seconds(i64::from(secs)) < *now
            }
            _ => false,
        }
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        self.config.created()
    }

    pub fn issuer(&self) -> Option<KeyId> {
        self.config.issuer()
    }

    pub fn preferred_symmetric_algs(&self) -> &[SymmetricKeyAlgorithm] {
        self.config
            .hashed_subpackets()
            .find_map(|p| match &p.data {
                SubpacketData::PreferredSymmetricAlgorithms(d) => Some(&d[..]),
                _ => None,
            })
            .unwrap_or_else(|| &[][..])
    }

    pub fn preferred_hash_algs(&self) -> &[HashAlgorithm] {
        self.config
            .hashed_subpackets()
            .find_map(|p| match &p.data {
                SubpacketData::PreferredHashAlgorithms(d) => Some(&d[..]),
                _ => None,
            })
            .unwrap_or_else(|| &[][..])
    }

    pub fn preferred_compression_algs(&self) -> &[CompressionAlgorithm] {
        self.config
            .hashed_subpackets()
            .find_map(|p| match &p.data {
                SubpacketData::PreferredCompressionAlgorithms(d) => Some(&d[..]),
                _ => None,
            })
            .unwrap_or_else(|| &[][..])
    }

    /// Does the signature carry a key flags subpacket at all.
    pub fn has_key_flags(&self) -> bool {
        self.config
            .hashed_subpackets()
            .any(|p| matches!(p.data, SubpacketData::KeyFlags(_)))
    }

    pub fn key_flags(&self) -> KeyFlags {
        self.config
            .hashed_subpackets()
            .find_map(|p| match &p.data {
                SubpacketData::KeyFlags(d) => Some(d[..].into()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn revocation_reason_code(&self) -> Option<&RevocationCode> {
        self.config.hashed_subpackets().find_map(|p| match &p.data {
            SubpacketData::RevocationReason(code, _) => Some(code),
            _ => None,
        })
    }

    pub fn is_primary(&self) -> bool {
        self.config
            .hashed_subpackets()
            .find_map(|p| match &p.data {
                SubpacketData::IsPrimary(d) => Some(*d != 0),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn embedded_signature(&self) -> Option<&Signature> {
        // a forged embedded signature in the unhashed area fails verification anyway
        self.config
            .hashed_subpackets()
            .chain(self.config.unhashed_subpackets())
            .find_map(|p| match &p.data {
                SubpacketData::EmbeddedSignature(d) => Some(&**d),
                _ => None,
            })
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, IntoPrimitive)]
#[repr(u8)]
pub enum SignatureVersion {
    /// Deprecated, same layout as v3
    V2 = 2,
    V3 = 3,
    V4 = 4,
}

impl Default for SignatureVersion {
    fn default() -> Self {
        Self::V4
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SignatureType {
    /// Signature of a binary document.
    Binary = 0x00,
    /// Signature of a canonical text document, computed with `<CR><LF>` line endings.
    Text = 0x01,
    /// Standalone signature, over its own subpacket contents only.
    Standalone = 0x02,
    /// Generic certification of a User ID and Public-Key packet.
    CertGeneric = 0x10,
    /// Persona certification of a User ID and Public-Key packet.
    CertPersona = 0x11,
    /// Casual certification of a User ID and Public-Key packet.
    CertCasual = 0x12,
    /// Positive certification of a User ID and Public-Key packet.
    CertPositive = 0x13,
    /// Subkey Binding Signature, made by the primary key.
    ///
    /// A binding for a signing subkey must embed a 0x19 signature made by the subkey.
    SubkeyBinding = 0x18,
    /// Primary Key Binding Signature, made by a signing subkey.
    KeyBinding = 0x19,
    /// Signature directly on a key
    Key = 0x1F,
    /// Key revocation signature
    KeyRevocation = 0x20,
    /// Subkey revocation signature
    SubkeyRevocation = 0x28,
    /// Certification revocation signature
    CertRevocation = 0x30,
    /// Timestamp signature.
    Timestamp = 0x40,
    /// Third-Party Confirmation signature.
    ThirdParty = 0x50,

    #[num_enum(catch_all)]
    Other(u8),
}

bitfield! {
    #[derive(Default, PartialEq, Eq, Copy, Clone)]
    pub struct KeyFlags(u8);
    impl Debug;

    pub certify, set_certify: 0;
    pub sign, set_sign: 1;
    pub encrypt_comms, set_encrypt_comms: 2;
    pub encrypt_storage, set_encrypt_storage: 3;
    pub shared, set_shared: 4;
    pub authentication, set_authentication: 5;
    pub group, set_group: 7;
}

impl KeyFlags {
    /// Usable for either kind of encryption.
    pub fn encrypt(&self) -> bool {
        self.encrypt_comms() || self.encrypt_storage()
    }

    /// Grants at least one of the uses in `other`.
    pub fn intersects(&self, other: KeyFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl<'a> From<&'a [u8]> for KeyFlags {
    fn from(other: &'a [u8]) -> Self {
        if other.is_empty() {
            Default::default()
        } else {
            KeyFlags(other[0])
        }
    }
}

/// Codes for revocation reasons
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum RevocationCode {
    /// No reason specified (key revocations or cert revocations)
    NoReason = 0,
    /// Key is superseded (key revocations)
    KeySuperseded = 1,
    /// Key material has been compromised (key revocations)
    KeyCompromised = 2,
    /// Key is retired and no longer used (key revocations)
    KeyRetired = 3,
    /// User ID information is no longer valid (cert revocations)
    CertUserIdInvalid = 32,

    /// Undefined code
    #[num_enum(catch_all)]
    Other(u8),
}

impl PacketTrait for Signature {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}
