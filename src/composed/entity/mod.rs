//! Entities: a primary key together with its identities and subkeys, as resolved from the
//! self-signatures found in a key ring.

mod keyring;
mod parser;

use std::io;

use chrono::{DateTime, Utc};
use log::debug;

use crate::config::Config;
use crate::errors::{Error, Result};
use crate::packet::{
    KeyFlags, PacketTrait, PublicKey, SecretKey, Signature, SignatureType, UserAttribute, UserId,
};
use crate::ser::Serialize;
use crate::types::{KeyId, Tag};

pub use self::keyring::KeyRing;
pub use self::parser::EntityParser;

/// The packet an identity is made of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityPacket {
    UserId(UserId),
    UserAttribute(UserAttribute),
}

impl IdentityPacket {
    pub fn tag(&self) -> Tag {
        match self {
            IdentityPacket::UserId(_) => Tag::UserId,
            IdentityPacket::UserAttribute(_) => Tag::UserAttribute,
        }
    }

    fn verify_certification(
        &self,
        config: &Config,
        sig: &Signature,
        primary: &PublicKey,
    ) -> Result<()> {
        match self {
            IdentityPacket::UserId(id) => {
                sig.verify_certification(config, primary, primary, Tag::UserId, id)
            }
            IdentityPacket::UserAttribute(attr) => {
                sig.verify_certification(config, primary, primary, Tag::UserAttribute, attr)
            }
        }
    }

    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            IdentityPacket::UserId(id) => id.to_writer_with_header(writer),
            IdentityPacket::UserAttribute(attr) => attr.to_writer_with_header(writer),
        }
    }
}

/// A user id or user attribute with a valid self-signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub packet: IdentityPacket,
    /// The newest valid self-certification.
    pub self_signature: Signature,
    /// A valid certification revocation by the primary key.
    pub revocation: Option<Signature>,
    /// Every signature over this identity, including certifications by other keys.
    pub signatures: Vec<Signature>,
}

impl Identity {
    /// Picks the governing self-signature from `signatures`.
    ///
    /// Returns `None` if no self-certification verifies.
    pub(crate) fn resolve(
        config: &Config,
        primary: &PublicKey,
        packet: IdentityPacket,
        signatures: Vec<Signature>,
    ) -> Option<Self> {
        let primary_id = primary.key_id();
        let mut self_signature: Option<&Signature> = None;
        let mut revocation = None;

        for sig in &signatures {
            if sig.issuer().is_some_and(|issuer| issuer != primary_id) {
                // third party certification, kept as is
                continue;
            }
            match sig.typ() {
                SignatureType::CertRevocation => {
                    if packet.verify_certification(config, sig, primary).is_ok() {
                        revocation = Some(sig.clone());
                    }
                }
                _ if sig.is_certification() => {
                    if let Err(err) = packet.verify_certification(config, sig, primary) {
                        debug!("ignoring invalid self certification: {}", err);
                        continue;
                    }
                    if self_signature.map_or(true, |current| sig.created() >= current.created()) {
                        self_signature = Some(sig);
                    }
                }
                typ => debug!("ignoring {:?} signature on identity", typ),
            }
        }

        let self_signature = self_signature?.clone();
        Some(Identity {
            packet,
            self_signature,
            revocation,
            signatures,
        })
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match &self.packet {
            IdentityPacket::UserId(id) => Some(id),
            IdentityPacket::UserAttribute(_) => None,
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revocation.is_some()
    }

    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.packet.to_writer(writer)?;
        for sig in &self.signatures {
            sig.to_writer_with_header(writer)?;
        }
        Ok(())
    }
}

/// A subkey with a valid binding signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subkey {
    pub public_key: PublicKey,
    pub secret_key: Option<SecretKey>,
    /// The accepted binding, the newest valid one.
    pub binding: Signature,
    /// Key flags granted by `binding`.
    pub flags: KeyFlags,
    pub revocation: Option<Signature>,
    /// All signatures that followed the subkey.
    pub signatures: Vec<Signature>,
}

impl Subkey {
    pub fn key_id(&self) -> KeyId {
        self.public_key.key_id()
    }

    pub fn is_revoked(&self) -> bool {
        self.revocation.is_some()
    }

    /// Is the subkey expired, or its binding signature, at `now`.
    pub fn is_expired_at(&self, now: &DateTime<Utc>) -> bool {
        self.binding.is_key_expired_at(&self.public_key, now) || self.binding.is_expired_at(now)
    }

    fn to_writer<W: io::Write>(&self, writer: &mut W, private: bool) -> Result<()> {
        match (&self.secret_key, private) {
            (Some(secret), true) => secret.to_writer_with_header(writer)?,
            _ => self.public_key.to_writer_with_header(writer)?,
        }
        for sig in &self.signatures {
            sig.to_writer_with_header(writer)?;
        }
        Ok(())
    }
}

/// A subkey that failed validation, never used for key selection.
#[derive(Debug)]
pub struct BadSubkey {
    pub key: PublicKey,
    pub secret_key: Option<SecretKey>,
    pub signatures: Vec<Signature>,
    pub error: Error,
}

impl BadSubkey {
    fn to_writer<W: io::Write>(&self, writer: &mut W, private: bool) -> Result<()> {
        match (&self.secret_key, private) {
            (Some(secret), true) => secret.to_writer_with_header(writer)?,
            _ => self.key.to_writer_with_header(writer)?,
        }
        for sig in &self.signatures {
            sig.to_writer_with_header(writer)?;
        }
        Ok(())
    }
}

/// A primary key, its identities and its subkeys.
#[derive(Debug)]
pub struct Entity {
    pub primary_key: PublicKey,
    pub secret_key: Option<SecretKey>,
    /// Valid key revocations.
    pub revocations: Vec<Signature>,
    /// Direct key signatures, as found.
    pub direct_signatures: Vec<Signature>,
    pub identities: Vec<Identity>,
    pub subkeys: Vec<Subkey>,
    pub bad_subkeys: Vec<BadSubkey>,
}

/// A concrete key of an entity, the primary key or one of its subkeys.
#[derive(Debug, Clone, Copy)]
pub struct KeyRef<'a> {
    pub entity: &'a Entity,
    pub public_key: &'a PublicKey,
    pub secret_key: Option<&'a SecretKey>,
    /// The signature governing this key, the binding for subkeys and the primary identity's
    /// self-signature for primary keys.
    pub self_signature: Option<&'a Signature>,
}

impl KeyRef<'_> {
    pub fn key_id(&self) -> KeyId {
        self.public_key.key_id()
    }

    /// Does this key allow any of the uses in `usage`.
    ///
    /// Keys whose self-signature carries no key flags are not restricted.
    pub fn allows(&self, usage: KeyFlags) -> bool {
        match self.self_signature {
            Some(sig) if sig.has_key_flags() => sig.key_flags().intersects(usage),
            _ => true,
        }
    }

    pub fn is_revoked(&self) -> bool {
        if self.public_key.is_subkey() {
            self.entity
                .subkeys
                .iter()
                .any(|sub| sub.key_id() == self.key_id() && sub.is_revoked())
        } else {
            self.entity.is_revoked()
        }
    }
}

impl PartialEq for KeyRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.entity, other.entity) && self.public_key == other.public_key
    }
}

impl Entity {
    pub fn key_id(&self) -> KeyId {
        self.primary_key.key_id()
    }

    pub fn is_revoked(&self) -> bool {
        !self.revocations.is_empty()
    }

    /// The identity flagged as primary, or the first one.
    pub fn primary_identity(&self) -> Option<&Identity> {
        self.identities
            .iter()
            .find(|id| id.self_signature.is_primary())
            .or_else(|| self.identities.first())
    }

    pub fn primary_key_ref(&self) -> KeyRef<'_> {
        KeyRef {
            entity: self,
            public_key: &self.primary_key,
            secret_key: self.secret_key.as_ref(),
            self_signature: self.primary_identity().map(|id| &id.self_signature),
        }
    }

    fn subkey_ref<'a>(&'a self, subkey: &'a Subkey) -> KeyRef<'a> {
        KeyRef {
            entity: self,
            public_key: &subkey.public_key,
            secret_key: subkey.secret_key.as_ref(),
            self_signature: Some(&subkey.binding),
        }
    }

    /// All keys of this entity, primary key first.
    pub fn keys(&self) -> impl Iterator<Item = KeyRef<'_>> {
        std::iter::once(self.primary_key_ref())
            .chain(self.subkeys.iter().map(|sub| self.subkey_ref(sub)))
    }

    fn primary_is_expired_at(&self, now: &DateTime<Utc>) -> bool {
        self.primary_identity()
            .is_some_and(|id| id.self_signature.is_key_expired_at(&self.primary_key, now))
    }

    /// Newest usable subkey granting `usage`, falling back to the primary key.
    fn select_key(
        &self,
        config: &Config,
        usage: KeyFlags,
        needs_secret: bool,
    ) -> Option<KeyRef<'_>> {
        let now = config.now();
        if self.is_revoked() || self.primary_is_expired_at(&now) {
            return None;
        }

        let has_usable_secret = |secret: Option<&SecretKey>| {
            !needs_secret || secret.is_some_and(|key| !key.is_dummy())
        };

        let subkey = self
            .subkeys
            .iter()
            .filter(|sub| {
                !sub.is_revoked()
                    && sub.flags.intersects(usage)
                    && !sub.is_expired_at(&now)
                    && has_usable_secret(sub.secret_key.as_ref())
            })
            .max_by_key(|sub| sub.binding.created().copied());
        if let Some(subkey) = subkey {
            return Some(self.subkey_ref(subkey));
        }

        let primary = self.primary_key_ref();
        let algorithm = self.primary_key.algorithm();
        let capable = if usage.sign() {
            algorithm.can_sign()
        } else {
            algorithm.can_encrypt()
        };
        if capable && primary.allows(usage) && has_usable_secret(self.secret_key.as_ref()) {
            return Some(primary);
        }
        None
    }

    /// The key to create signatures with.
    ///
    /// The newest non revoked, non expired signing subkey with usable secret material,
    /// otherwise the primary key if it may sign.
    pub fn signing_key(&self, config: &Config) -> Option<KeyRef<'_>> {
        let mut usage = KeyFlags::default();
        usage.set_sign(true);
        self.select_key(config, usage, true)
    }

    /// The key to encrypt to, picked by the same rules as [`Entity::signing_key`].
    pub fn encryption_key(&self, config: &Config) -> Option<KeyRef<'_>> {
        let mut usage = KeyFlags::default();
        usage.set_encrypt_comms(true);
        usage.set_encrypt_storage(true);
        self.select_key(config, usage, false)
    }

    /// Adopts subkey revocations that `other`, another copy of this entity, carries.
    pub fn copy_subkey_revocations(&mut self, other: &Entity) {
        for subkey in &mut self.subkeys {
            if subkey.revocation.is_some() {
                continue;
            }
            let revocation = other
                .subkeys
                .iter()
                .find(|theirs| theirs.key_id() == subkey.key_id())
                .and_then(|theirs| theirs.revocation.as_ref());
            if let Some(revocation) = revocation {
                debug!("adopting revocation of subkey {:X}", subkey.key_id());
                subkey.revocation = Some(revocation.clone());
                subkey.signatures.push(revocation.clone());
            }
        }
    }

    /// Writes the public parts of the entity as a transferable public key.
    pub fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.primary_key.to_writer_with_header(writer)?;
        self.write_tail(writer, false)
    }

    /// Writes the entity including its secret keys.
    ///
    /// Unlocked keys are written without protection, dummy keys keep their dummy marker.
    pub fn to_writer_private<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let Some(secret) = &self.secret_key else {
            return Err(Error::InvalidArgument {
                message: format!("entity {:X} has no secret key", self.key_id()),
            });
        };
        secret.to_writer_with_header(writer)?;
        self.write_tail(writer, true)
    }

    fn write_tail<W: io::Write>(&self, writer: &mut W, private: bool) -> Result<()> {
        for sig in self.revocations.iter().chain(&self.direct_signatures) {
            sig.to_writer_with_header(writer)?;
        }
        for identity in &self.identities {
            identity.to_writer(writer)?;
        }
        for subkey in &self.subkeys {
            subkey.to_writer(writer, private)?;
        }
        // written back unchanged, in their original order after the good ones
        for subkey in &self.bad_subkeys {
            subkey.to_writer(writer, private)?;
        }
        Ok(())
    }
}
