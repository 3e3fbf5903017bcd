//! Objects made of several packets: entities, key rings and messages.

mod entity;
mod message;
mod signature;

pub use self::entity::{
    BadSubkey, Entity, EntityParser, Identity, IdentityPacket, KeyRef, KeyRing, Subkey,
};
pub use self::message::{read_message, MessageDetails, PromptFn};
pub use self::signature::{
    armored_detach_sign, check_armored_detached_signature, check_detached_signature,
    detach_sign,
};
