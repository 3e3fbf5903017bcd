mod config;
mod de;
mod ser;
mod subpacket;
mod types;

pub use self::config::{SignatureConfig, SignatureConfigBuilder};
pub use self::subpacket::{Subpacket, SubpacketData, SubpacketLength, SubpacketType};
pub use self::types::{KeyFlags, RevocationCode, Signature, SignatureType, SignatureVersion};
