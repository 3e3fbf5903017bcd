mod compression;
mod fingerprint;
mod key_id;
mod mpi;
mod packet;
mod params;
mod s2k;

pub use self::compression::CompressionAlgorithm;
pub use self::fingerprint::Fingerprint;
pub use self::key_id::KeyId;
pub use self::mpi::Mpi;
pub use self::packet::{KeyVersion, PacketHeaderVersion, PacketLength, Tag};
pub use self::params::{EncryptedSecretParams, PlainSecretParams, PublicParams, SecretParams};
pub use self::s2k::StringToKey;
