use log::debug;
use num_bigint::BigUint;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{ensure_eq, unsupported_err, Result};
use crate::types::Mpi;
use crate::util::left_pad;

/// Largest modulus we are willing to work with.
const MAX_KEY_SIZE: usize = 16384;

fn public_key(n: &Mpi, e: &Mpi) -> Result<RsaPublicKey> {
    let key = RsaPublicKey::new_with_max_size(n.to_biguint(), e.to_biguint(), MAX_KEY_SIZE)?;
    Ok(key)
}

fn private_key(n: &Mpi, e: &Mpi, d: &[u8], p: &[u8], q: &[u8]) -> Result<RsaPrivateKey> {
    let key = RsaPrivateKey::from_components(
        n.to_biguint(),
        e.to_biguint(),
        BigUint::from_bytes_be(d),
        vec![BigUint::from_bytes_be(p), BigUint::from_bytes_be(q)],
    )?;
    Ok(key)
}

fn pkcs1_scheme(hash: HashAlgorithm) -> Result<Pkcs1v15Sign> {
    let scheme = match hash {
        HashAlgorithm::Md5 => Pkcs1v15Sign::new::<md5::Md5>(),
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        HashAlgorithm::Ripemd160 => Pkcs1v15Sign::new::<ripemd::Ripemd160>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
        HashAlgorithm::Sha224 => Pkcs1v15Sign::new::<sha2::Sha224>(),
        HashAlgorithm::Sha3_256 => Pkcs1v15Sign::new::<sha3::Sha3_256>(),
        HashAlgorithm::Sha3_512 => Pkcs1v15Sign::new::<sha3::Sha3_512>(),
        HashAlgorithm::None | HashAlgorithm::Other(_) => unsupported_err!("{}", hash),
    };
    Ok(scheme)
}

/// Verify a RSA, PKCS1v15 padded signature.
pub fn verify(n: &Mpi, e: &Mpi, hash: HashAlgorithm, hashed: &[u8], sig: &[Mpi]) -> Result<()> {
    ensure_eq!(sig.len(), 1, "invalid rsa signature");
    let key = public_key(n, e)?;
    debug!("rsa verify {} bits, {}", key.n().bits(), hash);

    // signature values lose their leading zeros in MPI encoding
    let sig = left_pad(sig[0].as_bytes(), key.size());
    key.verify(pkcs1_scheme(hash)?, hashed, &sig)?;

    Ok(())
}

/// Sign using RSA, with PKCS1v15 padding.
#[allow(clippy::too_many_arguments)]
pub fn sign(
    n: &Mpi,
    e: &Mpi,
    d: &[u8],
    p: &[u8],
    q: &[u8],
    hash: HashAlgorithm,
    digest: &[u8],
) -> Result<Vec<Mpi>> {
    let key = private_key(n, e, d, p, q)?;
    let sig = key.sign(pkcs1_scheme(hash)?, digest)?;

    Ok(vec![Mpi::from_slice(&sig)])
}

/// RSA decryption using PKCS1v15 padding.
pub fn decrypt(n: &Mpi, e: &Mpi, d: &[u8], p: &[u8], q: &[u8], mpis: &[Mpi]) -> Result<Vec<u8>> {
    ensure_eq!(mpis.len(), 1, "invalid rsa ciphertext");
    let key = private_key(n, e, d, p, q)?;
    let ciphertext = left_pad(mpis[0].as_bytes(), key.size());
    let m = key.decrypt(Pkcs1v15Encrypt, &ciphertext)?;

    Ok(m)
}
