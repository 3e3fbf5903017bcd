use std::io::{self, BufRead};

use log::debug;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::crypto::hash::HashAlgorithm;
use crate::errors::{bail, unsupported_err, Result};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;

const EXPBIAS: u32 = 6;
/// Iterated S2K input is hashed in pieces of about this size.
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// String-to-key specifier.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-3.7>
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringToKey {
    Simple {
        hash_alg: HashAlgorithm,
    },
    Salted {
        hash_alg: HashAlgorithm,
        salt: [u8; 8],
    },
    IteratedAndSalted {
        hash_alg: HashAlgorithm,
        salt: [u8; 8],
        count: u8,
    },
    /// GnuPG extension: the secret material is not present ("gnu-dummy").
    GnuDummy {
        hash_alg: HashAlgorithm,
    },
}

impl StringToKey {
    pub fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let typ = i.read_u8()?;
        let hash_alg = HashAlgorithm::from(i.read_u8()?);

        let s2k = match typ {
            0 => StringToKey::Simple { hash_alg },
            1 => StringToKey::Salted {
                hash_alg,
                salt: i.read_array::<8>()?,
            },
            3 => StringToKey::IteratedAndSalted {
                hash_alg,
                salt: i.read_array::<8>()?,
                count: i.read_u8()?,
            },
            101 => {
                let marker = i.read_array::<3>()?;
                if &marker != b"GNU" {
                    unsupported_err!("unknown private s2k extension {:?}", marker);
                }
                match i.read_u8()? {
                    1 => StringToKey::GnuDummy { hash_alg },
                    mode => unsupported_err!("gnu s2k mode {}", 1000 + u32::from(mode)),
                }
            }
            _ => unsupported_err!("s2k type {}", typ),
        };

        Ok(s2k)
    }

    pub fn hash_alg(&self) -> HashAlgorithm {
        match self {
            StringToKey::Simple { hash_alg }
            | StringToKey::Salted { hash_alg, .. }
            | StringToKey::IteratedAndSalted { hash_alg, .. }
            | StringToKey::GnuDummy { hash_alg } => *hash_alg,
        }
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self, StringToKey::GnuDummy { .. })
    }

    /// Converts a coded count into the number of bytes to hash.
    pub fn count(&self) -> Option<usize> {
        match self {
            StringToKey::IteratedAndSalted { count, .. } => {
                let c = u32::from(*count);
                Some(((16 + (c & 15)) << ((c >> 4) + EXPBIAS)) as usize)
            }
            _ => None,
        }
    }

    /// Derives a key of `key_size` bytes from the passphrase.
    ///
    /// Keys longer than one digest use additional hash contexts, each preloaded with one more
    /// zero byte than the previous one. The hash must be enabled in `config`.
    pub fn derive_key(
        &self,
        config: &Config,
        passphrase: &[u8],
        key_size: usize,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let hash_alg = self.hash_alg();
        let digest_size = match hash_alg.digest_size() {
            Some(size) => size,
            None => unsupported_err!("{}", hash_alg),
        };
        if !config.is_hash_enabled(hash_alg) {
            unsupported_err!("s2k hash {} is not enabled", hash_alg);
        }

        let (salt, count) = match self {
            StringToKey::Simple { .. } => (&[][..], None),
            StringToKey::Salted { salt, .. } => (&salt[..], None),
            StringToKey::IteratedAndSalted { salt, .. } => (&salt[..], self.count()),
            StringToKey::GnuDummy { .. } => bail!("gnu dummy s2k has no key"),
        };
        debug!("derive key {:?} count {:?}", hash_alg, count);

        let data = Zeroizing::new([salt, passphrase].concat());
        // the count is the number of bytes to hash, but at least one full salt and passphrase
        let total = count.unwrap_or(data.len()).max(data.len());
        let repeated = if data.is_empty() {
            Zeroizing::new(Vec::new())
        } else {
            let copies = (HASH_CHUNK_SIZE / data.len()).max(1).min(total.div_ceil(data.len()));
            Zeroizing::new(data.repeat(copies))
        };

        let mut key = Zeroizing::new(Vec::with_capacity(key_size));
        let rounds = key_size.div_ceil(digest_size);
        for round in 0..rounds {
            let mut hasher = hash_alg.new_hasher()?;
            hasher.update(&vec![0u8; round]);

            // chunks hold whole copies, only the last one is cut short
            let mut remaining = total;
            while remaining > 0 {
                let part = remaining.min(repeated.len());
                hasher.update(&repeated[..part]);
                remaining -= part;
            }

            let digest = Zeroizing::new(hasher.finalize());
            let take = digest.len().min(key_size - key.len());
            key.extend_from_slice(&digest[..take]);
        }

        Ok(key)
    }
}

impl Serialize for StringToKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            StringToKey::Simple { hash_alg } => {
                writer.write_all(&[0, (*hash_alg).into()])?;
            }
            StringToKey::Salted { hash_alg, salt } => {
                writer.write_all(&[1, (*hash_alg).into()])?;
                writer.write_all(salt)?;
            }
            StringToKey::IteratedAndSalted {
                hash_alg,
                salt,
                count,
            } => {
                writer.write_all(&[3, (*hash_alg).into()])?;
                writer.write_all(salt)?;
                writer.write_all(&[*count])?;
            }
            StringToKey::GnuDummy { hash_alg } => {
                writer.write_all(&[101, (*hash_alg).into()])?;
                writer.write_all(b"GNU")?;
                writer.write_all(&[1])?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            StringToKey::Simple { .. } => 2,
            StringToKey::Salted { .. } => 10,
            StringToKey::IteratedAndSalted { .. } => 11,
            StringToKey::GnuDummy { .. } => 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    #[test]
    fn parse_and_count() {
        let raw = hex::decode("0302a1a2a3a4a5a6a7a860").unwrap();
        let s2k = StringToKey::try_from_reader(&raw[..]).unwrap();
        assert_eq!(s2k.count(), Some(65536));
        assert_eq!(s2k.to_bytes().unwrap(), raw);

        let dummy = hex::decode("6502474e5501").unwrap();
        let s2k = StringToKey::try_from_reader(&dummy[..]).unwrap();
        assert!(s2k.is_dummy());
        assert_eq!(s2k.to_bytes().unwrap(), dummy);

        assert!(StringToKey::try_from_reader(&[0x02, 0x02][..])
            .unwrap_err()
            .is_unsupported());
    }

    #[test]
    fn simple_sha1() {
        let s2k = StringToKey::Simple {
            hash_alg: HashAlgorithm::Sha1,
        };
        let key = s2k.derive_key(&Config::default(), b"hello world", 20).unwrap();
        assert_eq!(
            hex::encode(&*key),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
    }

    #[test]
    fn long_keys_use_preloaded_contexts() {
        let s2k = StringToKey::Simple {
            hash_alg: HashAlgorithm::Sha1,
        };
        let key = s2k.derive_key(&Config::default(), b"pw", 32).unwrap();
        let second = HashAlgorithm::Sha1.digest(b"\x00pw").unwrap();
        assert_eq!(&key[20..], &second[..12]);
    }

    #[test]
    fn iterated_counts_bytes() {
        let salt = [1, 2, 3, 4, 5, 6, 7, 8];
        // coded count 0 = 1024 bytes
        let s2k = StringToKey::IteratedAndSalted {
            hash_alg: HashAlgorithm::Sha256,
            salt,
            count: 0,
        };
        let key = s2k.derive_key(&Config::default(), b"password", 16).unwrap();

        let mut data = Vec::new();
        while data.len() < 1024 {
            data.extend_from_slice(&salt);
            data.extend_from_slice(b"password");
        }
        data.truncate(1024);
        let expected = HashAlgorithm::Sha256.digest(&data).unwrap();
        assert_eq!(&key[..], &expected[..16]);
    }

    #[test]
    fn iterated_counts_span_chunks() {
        let salt = [9, 8, 7, 6, 5, 4, 3, 2];
        let passphrase = b"correct horse battery";
        // coded count 0x60 = 65536 bytes, more than one chunk of whole copies
        let s2k = StringToKey::IteratedAndSalted {
            hash_alg: HashAlgorithm::Sha1,
            salt,
            count: 0x60,
        };
        let key = s2k.derive_key(&Config::default(), passphrase, 20).unwrap();

        let mut data = Vec::new();
        while data.len() < 65536 {
            data.extend_from_slice(&salt);
            data.extend_from_slice(passphrase);
        }
        data.truncate(65536);
        let expected = HashAlgorithm::Sha1.digest(&data).unwrap();
        assert_eq!(&key[..], &expected[..]);
    }

    #[test]
    fn disabled_hash_is_unsupported() {
        let config = ConfigBuilder::default()
            .hash_algorithms(vec![HashAlgorithm::Sha256])
            .build()
            .unwrap();
        let s2k = StringToKey::Salted {
            hash_alg: HashAlgorithm::Sha1,
            salt: [0; 8],
        };
        let err = s2k.derive_key(&config, b"pw", 16).unwrap_err();
        assert!(err.is_unsupported(), "{err:?}");
        assert!(s2k.derive_key(&Config::default(), b"pw", 16).is_ok());
    }
}
