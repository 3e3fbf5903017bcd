//! Runtime knobs shared by the parser, verifier and message processor.

use chrono::{DateTime, Utc};
use derive_builder::Builder;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Error;

/// Maximum number of nested compressed or encrypted layers in a message.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 16;

/// Algorithm capabilities and limits.
///
/// ```
/// use pgp_core::config::ConfigBuilder;
/// use pgp_core::crypto::hash::HashAlgorithm;
///
/// let config = ConfigBuilder::default()
///     .hash_algorithms(vec![HashAlgorithm::Sha256, HashAlgorithm::Sha512])
///     .max_nesting_depth(4)
///     .build()
///     .unwrap();
/// assert!(!config.is_hash_enabled(HashAlgorithm::Sha1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(build_fn(error = "Error"))]
pub struct Config {
    /// Hash algorithms accepted for signatures and used for S2K.
    #[builder(default = "default_hash_algorithms()")]
    pub hash_algorithms: Vec<HashAlgorithm>,
    /// Ciphers accepted for decryption.
    #[builder(default = "default_symmetric_algorithms()")]
    pub symmetric_algorithms: Vec<SymmetricKeyAlgorithm>,
    /// Public key algorithms accepted for keys and signatures.
    #[builder(default = "default_public_key_algorithms()")]
    pub public_key_algorithms: Vec<PublicKeyAlgorithm>,
    /// Hash used when creating signatures.
    #[builder(default = "HashAlgorithm::Sha256")]
    pub signing_hash: HashAlgorithm,
    #[builder(default = "DEFAULT_MAX_NESTING_DEPTH")]
    pub max_nesting_depth: usize,
    /// Fixed point in time used for expiry checks, defaults to the current time.
    #[builder(default, setter(strip_option))]
    pub now: Option<DateTime<Utc>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            hash_algorithms: default_hash_algorithms(),
            symmetric_algorithms: default_symmetric_algorithms(),
            public_key_algorithms: default_public_key_algorithms(),
            signing_hash: HashAlgorithm::Sha256,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            now: None,
        }
    }
}

impl Config {
    pub fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    pub fn is_hash_enabled(&self, alg: HashAlgorithm) -> bool {
        self.hash_algorithms.contains(&alg)
    }

    pub fn is_symmetric_enabled(&self, alg: SymmetricKeyAlgorithm) -> bool {
        self.symmetric_algorithms.contains(&alg)
    }

    pub fn is_public_key_enabled(&self, alg: PublicKeyAlgorithm) -> bool {
        self.public_key_algorithms.contains(&alg)
    }
}

fn default_hash_algorithms() -> Vec<HashAlgorithm> {
    vec![
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Ripemd160,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha3_256,
        HashAlgorithm::Sha3_512,
    ]
}

fn default_symmetric_algorithms() -> Vec<SymmetricKeyAlgorithm> {
    vec![
        SymmetricKeyAlgorithm::IDEA,
        SymmetricKeyAlgorithm::TripleDES,
        SymmetricKeyAlgorithm::CAST5,
        SymmetricKeyAlgorithm::Blowfish,
        SymmetricKeyAlgorithm::AES128,
        SymmetricKeyAlgorithm::AES192,
        SymmetricKeyAlgorithm::AES256,
        SymmetricKeyAlgorithm::Twofish,
        SymmetricKeyAlgorithm::Camellia128,
        SymmetricKeyAlgorithm::Camellia192,
        SymmetricKeyAlgorithm::Camellia256,
    ]
}

fn default_public_key_algorithms() -> Vec<PublicKeyAlgorithm> {
    vec![
        PublicKeyAlgorithm::RSA,
        PublicKeyAlgorithm::RSAEncrypt,
        PublicKeyAlgorithm::RSASign,
        PublicKeyAlgorithm::ElgamalEncrypt,
        PublicKeyAlgorithm::DSA,
        PublicKeyAlgorithm::ECDH,
        PublicKeyAlgorithm::ECDSA,
        PublicKeyAlgorithm::Elgamal,
        PublicKeyAlgorithm::EdDSALegacy,
    ]
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn builder_defaults_match_default() {
        let built = ConfigBuilder::default().build().unwrap();
        assert_eq!(built, Config::default());
        assert_eq!(built.max_nesting_depth, 16);
    }

    #[test]
    fn fixed_now() {
        let at = Utc.with_ymd_and_hms(2018, 9, 10, 0, 0, 0).unwrap();
        let config = ConfigBuilder::default().now(at).build().unwrap();
        assert_eq!(config.now(), at);
    }
}
