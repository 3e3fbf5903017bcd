use aes::{Aes128, Aes192, Aes256};
use blowfish::Blowfish;
use camellia::{Camellia128, Camellia192, Camellia256};
use cast5::Cast5;
use cfb_mode::{cipher::KeyIvInit, BufDecryptor, BufEncryptor};
use cipher::{BlockCipher, BlockEncryptMut};
use des::TdesEde3;
use idea::Idea;
use num_enum::{FromPrimitive, IntoPrimitive};
use twofish::Twofish;

use crate::errors::{bail, unsupported_err, Result};

mod decryptor;

pub use self::decryptor::StreamDecryptor;

/// A running CFB keystream, either direction.
pub trait CfbStream {
    fn apply(&mut self, data: &mut [u8]);
}

struct CfbDecrypt<C: BlockEncryptMut + BlockCipher>(BufDecryptor<C>);

impl<C: BlockEncryptMut + BlockCipher> CfbStream for CfbDecrypt<C> {
    fn apply(&mut self, data: &mut [u8]) {
        self.0.decrypt(data);
    }
}

struct CfbEncrypt<C: BlockEncryptMut + BlockCipher>(BufEncryptor<C>);

impl<C: BlockEncryptMut + BlockCipher> CfbStream for CfbEncrypt<C> {
    fn apply(&mut self, data: &mut [u8]) {
        self.0.encrypt(data);
    }
}

fn decryptor<C>(key: &[u8], iv: &[u8]) -> Result<Box<dyn CfbStream>>
where
    C: BlockEncryptMut + BlockCipher + 'static,
    BufDecryptor<C>: KeyIvInit,
{
    Ok(Box::new(CfbDecrypt(BufDecryptor::<C>::new_from_slices(
        key, iv,
    )?)))
}

fn encryptor<C>(key: &[u8], iv: &[u8]) -> Result<Box<dyn CfbStream>>
where
    C: BlockEncryptMut + BlockCipher + 'static,
    BufEncryptor<C>: KeyIvInit,
{
    Ok(Box::new(CfbEncrypt(BufEncryptor::<C>::new_from_slices(
        key, iv,
    )?)))
}

/// Available symmetric key algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-9.2>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive, Hash)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(u8)]
pub enum SymmetricKeyAlgorithm {
    /// Plaintext or unencrypted data
    #[cfg_attr(test, proptest(skip))]
    Plaintext = 0,
    IDEA = 1,
    TripleDES = 2,
    CAST5 = 3,
    Blowfish = 4,
    // 5 & 6 are reserved for DES/SK
    AES128 = 7,
    AES192 = 8,
    AES256 = 9,
    /// Twofish with 256-bit key
    Twofish = 10,
    Camellia128 = 11,
    Camellia192 = 12,
    Camellia256 = 13,

    #[num_enum(catch_all)]
    #[cfg_attr(test, proptest(skip))]
    Other(u8),
}

impl Default for SymmetricKeyAlgorithm {
    fn default() -> Self {
        Self::AES128
    }
}

impl zeroize::DefaultIsZeroes for SymmetricKeyAlgorithm {}

impl SymmetricKeyAlgorithm {
    /// The size of a single block in bytes.
    pub fn block_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::IDEA
            | SymmetricKeyAlgorithm::TripleDES
            | SymmetricKeyAlgorithm::CAST5
            | SymmetricKeyAlgorithm::Blowfish => 8,
            SymmetricKeyAlgorithm::AES128
            | SymmetricKeyAlgorithm::AES192
            | SymmetricKeyAlgorithm::AES256
            | SymmetricKeyAlgorithm::Twofish
            | SymmetricKeyAlgorithm::Camellia128
            | SymmetricKeyAlgorithm::Camellia192
            | SymmetricKeyAlgorithm::Camellia256 => 16,
            SymmetricKeyAlgorithm::Plaintext | SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    /// The size of the key in bytes.
    pub const fn key_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Plaintext => 0,
            SymmetricKeyAlgorithm::IDEA => 16,
            SymmetricKeyAlgorithm::TripleDES => 24,
            SymmetricKeyAlgorithm::CAST5 => 16,
            SymmetricKeyAlgorithm::Blowfish => 16,
            SymmetricKeyAlgorithm::AES128 => 16,
            SymmetricKeyAlgorithm::AES192 => 24,
            SymmetricKeyAlgorithm::AES256 => 32,
            SymmetricKeyAlgorithm::Twofish => 32,
            SymmetricKeyAlgorithm::Camellia128 => 16,
            SymmetricKeyAlgorithm::Camellia192 => 24,
            SymmetricKeyAlgorithm::Camellia256 => 32,
            SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    /// Creates a regular CFB decryptor with the given IV.
    pub fn cfb_decryptor(self, key: &[u8], iv: &[u8]) -> Result<Box<dyn CfbStream>> {
        match self {
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a legal cipher for encrypted data")
            }
            SymmetricKeyAlgorithm::IDEA => decryptor::<Idea>(key, iv),
            SymmetricKeyAlgorithm::TripleDES => decryptor::<TdesEde3>(key, iv),
            SymmetricKeyAlgorithm::CAST5 => decryptor::<Cast5>(key, iv),
            SymmetricKeyAlgorithm::Blowfish => decryptor::<Blowfish>(key, iv),
            SymmetricKeyAlgorithm::AES128 => decryptor::<Aes128>(key, iv),
            SymmetricKeyAlgorithm::AES192 => decryptor::<Aes192>(key, iv),
            SymmetricKeyAlgorithm::AES256 => decryptor::<Aes256>(key, iv),
            SymmetricKeyAlgorithm::Twofish => decryptor::<Twofish>(key, iv),
            SymmetricKeyAlgorithm::Camellia128 => decryptor::<Camellia128>(key, iv),
            SymmetricKeyAlgorithm::Camellia192 => decryptor::<Camellia192>(key, iv),
            SymmetricKeyAlgorithm::Camellia256 => decryptor::<Camellia256>(key, iv),
            SymmetricKeyAlgorithm::Other(id) => {
                unsupported_err!("symmetric key algorithm {}", id)
            }
        }
    }

    /// Creates a regular CFB encryptor with the given IV.
    pub fn cfb_encryptor(self, key: &[u8], iv: &[u8]) -> Result<Box<dyn CfbStream>> {
        match self {
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a legal cipher for encrypted data")
            }
            SymmetricKeyAlgorithm::IDEA => encryptor::<Idea>(key, iv),
            SymmetricKeyAlgorithm::TripleDES => encryptor::<TdesEde3>(key, iv),
            SymmetricKeyAlgorithm::CAST5 => encryptor::<Cast5>(key, iv),
            SymmetricKeyAlgorithm::Blowfish => encryptor::<Blowfish>(key, iv),
            SymmetricKeyAlgorithm::AES128 => encryptor::<Aes128>(key, iv),
            SymmetricKeyAlgorithm::AES192 => encryptor::<Aes192>(key, iv),
            SymmetricKeyAlgorithm::AES256 => encryptor::<Aes256>(key, iv),
            SymmetricKeyAlgorithm::Twofish => encryptor::<Twofish>(key, iv),
            SymmetricKeyAlgorithm::Camellia128 => encryptor::<Camellia128>(key, iv),
            SymmetricKeyAlgorithm::Camellia192 => encryptor::<Camellia192>(key, iv),
            SymmetricKeyAlgorithm::Camellia256 => encryptor::<Camellia256>(key, iv),
            SymmetricKeyAlgorithm::Other(id) => {
                unsupported_err!("symmetric key algorithm {}", id)
            }
        }
    }

    /// Decrypt the data using CFB mode, without padding. Overwrites the input.
    /// This is regular CFB, not OpenPGP CFB.
    pub fn decrypt_with_iv_regular(self, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
        self.cfb_decryptor(key, iv)?.apply(data);
        Ok(())
    }

    /// Encrypt the data using CFB mode, without padding. Overwrites the input.
    pub fn encrypt_with_iv_regular(self, key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
        self.cfb_encryptor(key, iv)?.apply(data);
        Ok(())
    }

    /// Checks the OpenPGP CFB "quick check" bytes of an encrypted prefix.
    ///
    /// `prefix` holds at least `block_size + 2` bytes of ciphertext.
    pub fn quick_check(self, key: &[u8], prefix: &[u8]) -> Result<bool> {
        let bs = self.block_size();
        if bs == 0 || prefix.len() < bs + 2 {
            bail!("encrypted data is too short");
        }
        let mut plain = prefix[..bs + 2].to_vec();
        self.decrypt_with_iv_regular(key, &vec![0u8; bs], &mut plain)?;

        Ok(plain[bs - 2..bs] == plain[bs..bs + 2])
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn regular_cfb_roundtrip(alg: SymmetricKeyAlgorithm, data: Vec<u8>) {
            let key = vec![0x42u8; alg.key_size()];
            let iv = vec![0x17u8; alg.block_size()];

            let mut buf = data.clone();
            alg.encrypt_with_iv_regular(&key, &iv, &mut buf).unwrap();
            alg.decrypt_with_iv_regular(&key, &iv, &mut buf).unwrap();
            prop_assert_eq!(buf, data);
        }
    }

    #[test]
    fn quick_check_detects_wrong_key() {
        let alg = SymmetricKeyAlgorithm::AES128;
        let key = [1u8; 16];
        let mut prefix = [9u8, 8, 7, 6, 5, 4, 3, 2, 1, 0, 11, 12, 13, 14, 15, 16, 15, 16];
        alg.encrypt_with_iv_regular(&key, &[0u8; 16], &mut prefix)
            .unwrap();

        assert!(alg.quick_check(&key, &prefix).unwrap());
        assert!(!alg.quick_check(&[2u8; 16], &prefix).unwrap());
        assert!(alg.quick_check(&key, &prefix[..10]).is_err());
    }

    #[test]
    fn unknown_cipher_is_unsupported() {
        let err = SymmetricKeyAlgorithm::Other(42)
            .cfb_decryptor(&[0; 16], &[0; 16])
            .err()
            .unwrap();
        assert!(err.is_unsupported());
    }
}
