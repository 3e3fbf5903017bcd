use std::fmt;

use crate::types::KeyId;

/// SHA-1 fingerprint of a v4 key.
#[derive(Clone, Copy, Eq, PartialEq, Hash, derive_more::Debug)]
#[debug("Fingerprint({})", hex::encode(_0))]
pub struct Fingerprint([u8; 20]);

impl Fingerprint {
    pub fn new(raw: [u8; 20]) -> Self {
        Fingerprint(raw)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }

    /// The key id is the low 64 bits of the fingerprint.
    pub fn key_id(&self) -> KeyId {
        let mut id = [0u8; 8];
        id.copy_from_slice(&self.0[12..]);
        KeyId::from(id)
    }
}

impl fmt::UpperHex for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}
