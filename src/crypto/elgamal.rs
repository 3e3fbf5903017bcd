use num_bigint::BigUint;
use num_traits::{One, Zero};
use zeroize::Zeroizing;

use crate::errors::{ensure, ensure_eq, Error, Result};
use crate::types::Mpi;
use crate::util::left_pad;

/// Elgamal decryption followed by removal of the PKCS#1 v1.5 type 2 padding.
///
/// `mpis` holds the two ciphertext values `c1 = g^k` and `c2 = m * y^k`.
pub fn decrypt(p: &Mpi, x: &[u8], mpis: &[Mpi]) -> Result<Vec<u8>> {
    ensure_eq!(mpis.len(), 2, "invalid elgamal ciphertext");

    let p_int = p.to_biguint();
    ensure!(p_int > BigUint::one(), "invalid elgamal prime");
    let c1 = mpis[0].to_biguint();
    let c2 = mpis[1].to_biguint();
    ensure!(
        !c1.is_zero() && c1 < p_int && c2 < p_int,
        "elgamal ciphertext out of range"
    );

    // s^-1 = c1^(p - 1 - x)
    let x = BigUint::from_bytes_be(x);
    ensure!(x < p_int, "invalid elgamal secret");
    let exponent = &p_int - BigUint::one() - x;
    let m = (c2 * c1.modpow(&exponent, &p_int)) % &p_int;

    let em = Zeroizing::new(left_pad(&m.to_bytes_be(), p.len()));
    unpad_pkcs1_type2(&em)
}

fn unpad_pkcs1_type2(em: &[u8]) -> Result<Vec<u8>> {
    if em.len() < 11 || em[0] != 0x00 || em[1] != 0x02 {
        return Err(Error::KeyIncorrect);
    }
    match em[2..].iter().position(|b| *b == 0) {
        Some(sep) if sep >= 8 => Ok(em[2 + sep + 1..].to_vec()),
        _ => Err(Error::KeyIncorrect),
    }
}
