use std::io::BufRead;

use log::{debug, warn};

use super::{Entity, EntityParser, KeyRef};
use crate::armor::{self, BlockType};
use crate::config::Config;
use crate::errors::{Error, Result};
use crate::packet::{KeyFlags, PacketParser};
use crate::types::KeyId;

/// An ordered list of entities.
///
/// Lookups preserve the order the entities were loaded in.
#[derive(Debug, Default)]
pub struct KeyRing {
    entities: Vec<Entity>,
}

impl From<Vec<Entity>> for KeyRing {
    fn from(entities: Vec<Entity>) -> Self {
        KeyRing { entities }
    }
}

impl KeyRing {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader_with_config(bytes, &Config::default())
    }

    /// Loads all entities from binary key material.
    ///
    /// Entities with an unsupported primary key are skipped. If nothing could be loaded the
    /// last such error is returned.
    pub fn from_reader_with_config<R: BufRead>(reader: R, config: &Config) -> Result<Self> {
        let mut entities = Vec::new();
        let mut last_unsupported = None;

        for entity in EntityParser::new(PacketParser::new(reader), config) {
            match entity {
                Ok(entity) => entities.push(entity),
                Err(err) if err.is_unsupported() => {
                    warn!("skipping entity: {}", err);
                    last_unsupported = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        if entities.is_empty() {
            if let Some(err) = last_unsupported {
                return Err(err);
            }
        }
        debug!("loaded {} entities", entities.len());

        Ok(KeyRing { entities })
    }

    /// Loads an armored public or private key block.
    pub fn from_armor<R: BufRead>(reader: R, config: &Config) -> Result<Self> {
        let (typ, _, body) = armor::decode(reader)?;
        match typ {
            BlockType::PublicKey | BlockType::PrivateKey => {}
            typ => {
                return Err(Error::InvalidArgument {
                    message: format!("expected a key block, found {typ}"),
                })
            }
        }
        Self::from_reader_with_config(&body[..], config)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub fn into_entities(self) -> Vec<Entity> {
        self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn push(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    /// All keys with the given id, primary keys and subkeys, revoked ones included.
    pub fn keys_by_id(&self, id: KeyId) -> Vec<KeyRef<'_>> {
        self.entities
            .iter()
            .flat_map(|entity| entity.keys())
            .filter(|key| key.key_id() == id)
            .collect()
    }

    /// Keys with the given id that are not revoked and allow any of `usage`.
    pub fn keys_by_id_usage(&self, id: KeyId, usage: KeyFlags) -> Vec<KeyRef<'_>> {
        self.keys_by_id(id)
            .into_iter()
            .filter(|key| !key.is_revoked() && key.allows(usage))
            .collect()
    }

    /// Subkeys that can decrypt messages: secret material present and encryption flags set.
    ///
    /// Ordered by entity, then by subkey position.
    pub fn decryption_keys(&self) -> Vec<KeyRef<'_>> {
        let mut usage = KeyFlags::default();
        usage.set_encrypt_comms(true);
        usage.set_encrypt_storage(true);

        self.entities
            .iter()
            .flat_map(|entity| entity.keys().skip(1))
            .filter(|key| key.secret_key.is_some() && !key.is_revoked() && key.allows(usage))
            .collect()
    }
}
