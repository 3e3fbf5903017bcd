use std::fmt;

use crate::errors::{ensure_eq, Result};

/// The 64 bit identifier of a key, the low 8 bytes of a v4 fingerprint.
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct KeyId([u8; 8]);

impl AsRef<[u8]> for KeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl From<[u8; 8]> for KeyId {
    fn from(value: [u8; 8]) -> Self {
        KeyId(value)
    }
}

impl From<u64> for KeyId {
    fn from(value: u64) -> Self {
        KeyId(value.to_be_bytes())
    }
}

impl From<KeyId> for u64 {
    fn from(value: KeyId) -> Self {
        u64::from_be_bytes(value.0)
    }
}

impl KeyId {
    /// The all zero id, used by recipients that want to stay anonymous.
    pub const WILDCARD: KeyId = KeyId([0u8; 8]);

    pub fn from_slice(input: &[u8]) -> Result<KeyId> {
        ensure_eq!(input.len(), 8, "invalid key id length");
        let mut r = [0u8; 8];
        r.copy_from_slice(input);

        Ok(KeyId(r))
    }

    pub fn is_wildcard(&self) -> bool {
        self == &Self::WILDCARD
    }

    /// The lower 32 bits, as shown by tools in "short" form.
    pub fn short(&self) -> u32 {
        u32::from_be_bytes([self.0[4], self.0[5], self.0[6], self.0[7]])
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "KeyId({})", hex::encode(self.as_ref()))
    }
}

impl fmt::UpperHex for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.as_ref()))
    }
}

impl fmt::LowerHex for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_id_conversions() {
        let id = KeyId::from(0xA34D_7E18_C20C_31BBu64);
        assert_eq!(id.short(), 0xC20C_31BB);
        assert_eq!(format!("{id:X}"), "A34D7E18C20C31BB");
        assert_eq!(u64::from(id), 0xA34D_7E18_C20C_31BB);
        assert!(KeyId::from_slice(&[0u8; 8]).unwrap().is_wildcard());
        assert!(KeyId::from_slice(&[0u8; 7]).is_err());
    }
}
