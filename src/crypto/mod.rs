//! # Cryptography module

pub mod checksum;
pub mod dsa;
pub mod ecc_curve;
pub mod ecdsa;
pub mod eddsa;
pub mod elgamal;
pub mod hash;
pub mod public_key;
pub mod rsa;
pub mod sym;
