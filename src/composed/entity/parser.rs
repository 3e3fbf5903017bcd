use std::iter::Peekable;

use log::{debug, warn};

use super::{BadSubkey, Entity, Identity, IdentityPacket, Subkey};
use crate::config::Config;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{bail, ensure_eq, format_err, Error, Result};
use crate::packet::{Packet, PacketTrait, PublicKey, SecretKey, Signature, SignatureType};
use crate::types::PublicParams;

/// Groups a stream of packets into entities.
///
/// An entity starts at a primary key packet and runs until the next one. Entities whose
/// primary key is unsupported are reported as `Error::Unsupported` and skipped. Broken
/// packets inside an entity are dropped together with the signatures following them.
pub struct EntityParser<'c, I: Iterator<Item = Result<Packet>>> {
    packets: Peekable<I>,
    config: &'c Config,
}

fn is_primary(packet: &Result<Packet>) -> bool {
    matches!(packet, Ok(Packet::PublicKey(_)) | Ok(Packet::SecretKey(_)))
}

fn is_unknown_algorithm(key: &PublicKey) -> bool {
    matches!(key.public_params(), PublicParams::Unknown { .. })
}

impl<'c, I: Iterator<Item = Result<Packet>>> EntityParser<'c, I> {
    pub fn new(packets: I, config: &'c Config) -> Self {
        EntityParser {
            packets: packets.peekable(),
            config,
        }
    }

    /// Skips everything up to the next primary key, stopping early at fatal errors.
    fn skip_to_primary(&mut self) {
        while let Some(packet) = self.packets.next_if(|p| match p {
            Ok(_) => !is_primary(p),
            Err(err) => err.is_packet_scoped(),
        }) {
            if let Ok(packet) = packet {
                debug!("skipping {:?}", packet.tag());
            }
        }
    }

    /// Collects the signatures following the current packet.
    fn signatures(&mut self) -> Vec<Signature> {
        let mut sigs = Vec::new();
        while let Some(packet) = self.packets.next_if(|p| match p {
            Ok(Packet::Signature(_) | Packet::Trust(_) | Packet::Marker(_)) => true,
            Ok(_) => false,
            Err(err) => err.is_packet_scoped(),
        }) {
            match packet {
                Ok(Packet::Signature(sig)) => sigs.push(sig),
                Ok(_) => {}
                Err(err) => warn!("ignoring signature: {}", err),
            }
        }
        sigs
    }

    fn read_entity(&mut self, primary_key: PublicKey, secret_key: Option<SecretKey>) -> Result<Entity> {
        let config = self.config;
        debug!("reading entity {:X}", primary_key.key_id());

        let mut revocations = Vec::new();
        let mut direct_signatures = Vec::new();
        for sig in self.signatures() {
            match sig.typ() {
                SignatureType::KeyRevocation => match sig.verify_key(config, &primary_key) {
                    Ok(()) => revocations.push(sig),
                    Err(err) => warn!("ignoring invalid key revocation: {}", err),
                },
                SignatureType::Key => direct_signatures.push(sig),
                typ => warn!("ignoring unexpected {:?} signature on primary key", typ),
            }
        }

        let mut identities = Vec::new();
        let mut subkeys = Vec::new();
        let mut bad_subkeys = Vec::new();

        while let Some(packet) = self.packets.next_if(|p| !is_primary(p)) {
            match packet {
                Ok(Packet::UserId(id)) => {
                    let sigs = self.signatures();
                    let packet = IdentityPacket::UserId(id);
                    match Identity::resolve(config, &primary_key, packet, sigs) {
                        Some(identity) => identities.push(identity),
                        None => warn!("dropping identity without valid self signature"),
                    }
                }
                Ok(Packet::UserAttribute(attr)) => {
                    let sigs = self.signatures();
                    let packet = IdentityPacket::UserAttribute(attr);
                    match Identity::resolve(config, &primary_key, packet, sigs) {
                        Some(identity) => identities.push(identity),
                        None => warn!("dropping user attribute without valid self signature"),
                    }
                }
                Ok(Packet::PublicSubkey(key)) => {
                    let sigs = self.signatures();
                    match resolve_subkey(config, &primary_key, key, None, sigs) {
                        Ok(subkey) => subkeys.push(subkey),
                        Err(bad) => bad_subkeys.push(*bad),
                    }
                }
                Ok(Packet::SecretSubkey(secret)) => {
                    let sigs = self.signatures();
                    let key = secret.public_key().clone();
                    match resolve_subkey(config, &primary_key, key, Some(secret), sigs) {
                        Ok(subkey) => subkeys.push(subkey),
                        Err(bad) => bad_subkeys.push(*bad),
                    }
                }
                Ok(Packet::Trust(_)) | Ok(Packet::Marker(_)) => {}
                Ok(packet) => warn!("ignoring unexpected packet {:?}", packet.tag()),
                Err(err) if err.is_packet_scoped() => {
                    let dropped = self.signatures();
                    warn!(
                        "skipping packet and {} signatures: {}",
                        dropped.len(),
                        err
                    );
                }
                Err(err) => return Err(err),
            }
        }

        if identities.is_empty() {
            warn!("entity {:X} has no valid identities", primary_key.key_id());
        }

        Ok(Entity {
            primary_key,
            secret_key,
            revocations,
            direct_signatures,
            identities,
            subkeys,
            bad_subkeys,
        })
    }
}

impl<I: Iterator<Item = Result<Packet>>> Iterator for EntityParser<'_, I> {
    type Item = Result<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (primary_key, secret_key) = match self.packets.next()? {
                Ok(Packet::PublicKey(key)) if is_unknown_algorithm(&key) => {
                    self.skip_to_primary();
                    return Some(Err(Error::Unsupported {
                        message: format!(
                            "primary key algorithm {}",
                            u8::from(key.algorithm())
                        ),
                    }));
                }
                Ok(Packet::PublicKey(key)) => (key, None),
                Ok(Packet::SecretKey(key)) => (key.public_key().clone(), Some(key)),
                Ok(Packet::Trust(_)) | Ok(Packet::Marker(_)) => continue,
                Ok(packet) => {
                    self.skip_to_primary();
                    return Some(Err(format_err!(
                        "expected a primary key packet, found {:?}",
                        packet.tag()
                    )));
                }
                Err(err) => {
                    if err.is_packet_scoped() {
                        self.skip_to_primary();
                    }
                    return Some(Err(err));
                }
            };

            return Some(self.read_entity(primary_key, secret_key));
        }
    }
}

/// Picks the binding of a subkey from the signatures that followed it.
fn resolve_subkey(
    config: &Config,
    primary: &PublicKey,
    key: PublicKey,
    secret_key: Option<SecretKey>,
    signatures: Vec<Signature>,
) -> std::result::Result<Subkey, Box<BadSubkey>> {
    let bad = |key: PublicKey,
               secret_key: Option<SecretKey>,
               signatures: Vec<Signature>,
               error: Error| {
        warn!("bad subkey: {}", error);
        Box::new(BadSubkey {
            key,
            secret_key,
            signatures,
            error,
        })
    };

    if is_unknown_algorithm(&key) {
        let error = Error::Unsupported {
            message: format!("subkey algorithm {}", u8::from(key.algorithm())),
        };
        return Err(bad(key, secret_key, signatures, error));
    }

    if key.algorithm() == PublicKeyAlgorithm::Elgamal {
        let error = Error::DeprecatedKey {
            algorithm: "Elgamal sign and encrypt (20)".to_string(),
        };
        return Err(bad(key, secret_key, signatures, error));
    }

    let mut binding: Option<&Signature> = None;
    let mut revocation = None;
    let mut last_error = None;

    for sig in &signatures {
        match sig.typ() {
            SignatureType::SubkeyBinding => {
                if let Err(err) = verify_binding(config, sig, primary, &key) {
                    debug!("rejected binding of {:X}: {}", key.key_id(), err);
                    last_error = Some(err);
                    continue;
                }
                // the newest binding wins, later packets win ties
                if binding.map_or(true, |current| sig.created() >= current.created()) {
                    binding = Some(sig);
                }
            }
            SignatureType::SubkeyRevocation => {
                match sig.verify_key_binding(config, primary, primary, &key) {
                    Ok(()) => revocation = Some(sig.clone()),
                    Err(err) => warn!("ignoring invalid subkey revocation: {}", err),
                }
            }
            typ => debug!("ignoring {:?} signature on subkey", typ),
        }
    }

    let Some(binding) = binding.cloned() else {
        let error = last_error.unwrap_or_else(|| {
            format_err!("subkey {:X} has no valid binding signature", key.key_id())
        });
        return Err(bad(key, secret_key, signatures, error));
    };

    Ok(Subkey {
        flags: binding.key_flags(),
        public_key: key,
        secret_key,
        binding,
        revocation,
        signatures,
    })
}

/// Checks a subkey binding, including the back signature required for signing subkeys.
fn verify_binding(
    config: &Config,
    sig: &Signature,
    primary: &PublicKey,
    subkey: &PublicKey,
) -> Result<()> {
    sig.verify_key_binding(config, primary, primary, subkey)?;

    if sig.key_flags().sign() {
        let Some(backsig) = sig.embedded_signature() else {
            bail!(
                "signing subkey {:X} has no primary key binding signature",
                subkey.key_id()
            );
        };
        ensure_eq!(
            backsig.typ(),
            SignatureType::KeyBinding,
            "invalid embedded signature"
        );
        backsig.verify_key_binding(config, subkey, primary, subkey)?;
    }

    Ok(())
}
