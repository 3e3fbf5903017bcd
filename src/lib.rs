//! # pgp-core
//!
//! Decoding and interpretation of OpenPGP data: the packet stream, signatures and their
//! verification, entities with their identities and subkeys, and messages that may be
//! signed, compressed and encrypted.
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::{BufReader, Read};
//!
//! use pgp_core::composed::{read_message, KeyRing};
//! use pgp_core::config::Config;
//!
//! # fn main() -> pgp_core::errors::Result<()> {
//! let config = Config::default();
//! let keyring = KeyRing::from_armor(BufReader::new(File::open("key.asc")?), &config)?;
//!
//! let mut md = read_message(BufReader::new(File::open("msg.gpg")?), &keyring, None, &config)?;
//! let mut body = Vec::new();
//! md.read_to_end(&mut body)?;
//! if let Some(err) = &md.signature_error {
//!     println!("bad signature: {err}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod armor;
pub mod composed;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod packet;
pub mod types;

mod parsing_reader;
mod ser;
mod util;

pub use self::composed::{
    check_detached_signature, read_message, Entity, KeyRef, KeyRing, MessageDetails,
};
pub use self::config::Config;
pub use self::errors::{Error, Result};
