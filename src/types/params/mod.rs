mod public;
mod secret;

pub use self::public::PublicParams;
pub use self::secret::{EncryptedSecretParams, PlainSecretParams, SecretParams};
