//! # Packet module
//!
//! Framing and decoding of the individual OpenPGP packets.
//!
//! ```rust
//! use pgp_core::packet::{Packet, PacketParser};
//!
//! // a marker packet followed by a user id
//! let data = [0xca, 0x03, b'P', b'G', b'P', 0xcd, 0x01, b'x'];
//! let packets = PacketParser::new(&data[..])
//!     .collect::<pgp_core::errors::Result<Vec<Packet>>>()
//!     .unwrap();
//! assert_eq!(packets.len(), 2);
//! ```

mod header;
mod packet_sum;
mod parser;
mod reader;

mod compressed_data;
mod key;
mod literal_data;
mod marker;
mod mod_detection_code;
mod one_pass_signature;
mod public_key_encrypted_session_key;
mod signature;
mod sym_encrypted_data;
mod sym_encrypted_protected_data;
mod sym_key_encrypted_session_key;
mod trust;
mod user_attribute;
mod user_id;

pub use self::compressed_data::*;
pub use self::header::*;
pub use self::key::*;
pub use self::literal_data::*;
pub use self::marker::*;
pub use self::mod_detection_code::*;
pub use self::one_pass_signature::*;
pub use self::packet_sum::*;
pub use self::parser::*;
pub use self::public_key_encrypted_session_key::*;
pub use self::reader::*;
pub use self::signature::*;
pub use self::sym_encrypted_data::*;
pub use self::sym_encrypted_protected_data::*;
pub use self::sym_key_encrypted_session_key::*;
pub use self::trust::*;
pub use self::user_attribute::*;
pub use self::user_id::*;
