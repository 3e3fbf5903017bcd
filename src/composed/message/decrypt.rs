use log::{debug, warn};
use zeroize::Zeroizing;

use crate::composed::{KeyRef, KeyRing};
use crate::config::Config;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{unsupported_err, Error, Result};
use crate::packet::{
    KeyFlags, PublicKeyEncryptedSessionKey, SecretKey, SymKeyEncryptedSessionKey,
};
use crate::types::KeyId;

/// Asks for a passphrase.
///
/// Receives the locked keys a passphrase could unlock and whether the message can also be
/// decrypted with a passphrase alone.
pub type PromptFn<'p> = dyn FnMut(&[KeyRef<'_>], bool) -> Result<Vec<u8>> + 'p;

/// A recovered session key.
#[derive(derive_more::Debug)]
pub(crate) struct SessionKey {
    pub(crate) alg: SymmetricKeyAlgorithm,
    #[debug(skip)]
    pub(crate) key: Zeroizing<Vec<u8>>,
    /// The key the session key was encrypted to, `None` for passphrase based decryption.
    pub(crate) decrypted_with: Option<KeyId>,
}

/// Session keys collected in front of an encrypted data packet.
#[derive(Debug, Default)]
pub(crate) struct EncryptedKeys {
    pub(crate) public: Vec<PublicKeyEncryptedSessionKey>,
    pub(crate) symmetric: Vec<SymKeyEncryptedSessionKey>,
}

impl EncryptedKeys {
    pub(crate) fn clear(&mut self) {
        self.public.clear();
        self.symmetric.clear();
    }

    /// Pairs each public key encrypted session key with the keys that could decrypt it.
    ///
    /// Wildcard recipients are matched against every decryption key, in key ring order.
    fn candidates<'k>(
        &self,
        keyring: &'k KeyRing,
    ) -> Vec<(KeyRef<'k>, &PublicKeyEncryptedSessionKey)> {
        let mut usage = KeyFlags::default();
        usage.set_encrypt_comms(true);
        usage.set_encrypt_storage(true);

        let mut candidates = Vec::new();
        for pkesk in &self.public {
            let keys = if pkesk.id().is_wildcard() {
                keyring.decryption_keys()
            } else {
                keyring.keys_by_id_usage(*pkesk.id(), usage)
            };
            candidates.extend(
                keys.into_iter()
                    .filter(|key| key.secret_key.is_some_and(|secret| !secret.is_dummy()))
                    .map(|key| (key, pkesk)),
            );
        }
        candidates
    }
}

/// Does the session key decrypt the quick check bytes at the start of the data.
fn check_session_key(
    config: &Config,
    alg: SymmetricKeyAlgorithm,
    key: &[u8],
    head: &[u8],
) -> Result<bool> {
    if !config.is_symmetric_enabled(alg) {
        unsupported_err!("cipher {:?} is not enabled", alg);
    }
    if alg.key_size() != key.len() {
        debug!("session key length {} does not fit {:?}", key.len(), alg);
        return Ok(false);
    }
    alg.quick_check(key, head)
}

fn try_key(
    config: &Config,
    key: KeyRef<'_>,
    secret: &SecretKey,
    pkesk: &PublicKeyEncryptedSessionKey,
    head: &[u8],
) -> Result<Option<SessionKey>> {
    match secret.decrypt_session_key(pkesk) {
        Ok((alg, session_key)) => {
            if check_session_key(config, alg, &session_key, head)? {
                debug!("session key recovered with {:X}", key.key_id());
                return Ok(Some(SessionKey {
                    alg,
                    key: session_key,
                    decrypted_with: Some(key.key_id()),
                }));
            }
            debug!("quick check failed for {:X}", key.key_id());
            Ok(None)
        }
        Err(err) if err.is_unsupported() => {
            warn!("skipping {:X}: {}", key.key_id(), err);
            Ok(None)
        }
        Err(err) => {
            debug!("{:X} can not decrypt the session key: {}", key.key_id(), err);
            Ok(None)
        }
    }
}

/// Recovers the session key for an encrypted data packet.
///
/// `head` is the start of the encrypted data, used for the quick check. Keys that are already
/// unlocked are tried first. After that `prompt` is asked for passphrases until one works, it
/// returns the same passphrase twice, or it fails; both end in `Error::KeyIncorrect`. Locked
/// keys in the key ring are never modified, they are unlocked on a copy.
pub(crate) fn session_key(
    keyring: &KeyRing,
    keys: &EncryptedKeys,
    head: &[u8],
    prompt: Option<&mut PromptFn<'_>>,
    config: &Config,
) -> Result<SessionKey> {
    let candidates = keys.candidates(keyring);
    debug!(
        "{} key candidates, {} passphrase candidates",
        candidates.len(),
        keys.symmetric.len()
    );

    let mut locked = Vec::new();
    for (key, pkesk) in candidates {
        let Some(secret) = key.secret_key else {
            continue;
        };
        if secret.is_locked() {
            locked.push((key, pkesk));
            continue;
        }
        if let Some(session) = try_key(config, key, secret, pkesk, head)? {
            return Ok(session);
        }
    }

    let symmetric = !keys.symmetric.is_empty();
    if locked.is_empty() && !symmetric {
        return Err(Error::KeyIncorrect);
    }
    let Some(prompt) = prompt else {
        debug!("no way to ask for a passphrase");
        return Err(Error::KeyIncorrect);
    };

    let mut prompt_keys: Vec<KeyRef<'_>> = Vec::new();
    for (key, _) in &locked {
        if !prompt_keys.contains(key) {
            prompt_keys.push(*key);
        }
    }

    let mut tried: Vec<Zeroizing<Vec<u8>>> = Vec::new();
    loop {
        let passphrase = match prompt(&prompt_keys, symmetric) {
            Ok(passphrase) => Zeroizing::new(passphrase),
            Err(err) => {
                debug!("prompt gave up: {}", err);
                return Err(Error::KeyIncorrect);
            }
        };
        if tried.iter().any(|p| p.as_slice() == passphrase.as_slice()) {
            debug!("passphrase repeated");
            return Err(Error::KeyIncorrect);
        }

        for skesk in &keys.symmetric {
            match skesk.decrypt(config, &passphrase) {
                Ok((alg, session_key)) => {
                    if check_session_key(config, alg, &session_key, head)? {
                        return Ok(SessionKey {
                            alg,
                            key: session_key,
                            decrypted_with: None,
                        });
                    }
                }
                Err(err) if err.is_unsupported() => warn!("skipping session key: {}", err),
                Err(err) => debug!("passphrase does not fit: {}", err),
            }
        }

        for (key, pkesk) in &locked {
            let Some(secret) = key.secret_key else {
                continue;
            };
            let mut secret = secret.clone();
            if let Err(err) = secret.unlock(config, &passphrase) {
                debug!("passphrase does not unlock {:X}: {}", key.key_id(), err);
                continue;
            }
            if let Some(session) = try_key(config, *key, &secret, pkesk, head)? {
                return Ok(session);
            }
        }

        tried.push(passphrase);
    }
}
