//! EdDSA over Ed25519 in the legacy OpenPGP framing.
//!
//! The public point is stored as `0x40 ‖ 32 bytes`, the signature as two MPIs `r` and `s`,
//! and the secret as the 32 byte seed. The message that is signed is the digest itself.

use signature::{Signer as _, Verifier};

use crate::crypto::ecc_curve::EccCurve;
use crate::errors::{ensure, ensure_eq, unsupported_err, Result};
use crate::types::Mpi;
use crate::util::left_pad;

fn public_bytes(q: &[u8]) -> Result<[u8; 32]> {
    ensure_eq!(q.len(), 33, "invalid Q (len)");
    ensure_eq!(q[0], 0x40, "invalid Q (prefix)");

    let mut out = [0u8; 32];
    out.copy_from_slice(&q[1..]);
    Ok(out)
}

/// Verify an EdDSA signature.
pub fn verify(curve: &EccCurve, q: &[u8], hashed: &[u8], sig: &[Mpi]) -> Result<()> {
    if curve != &EccCurve::Ed25519 {
        unsupported_err!("curve {} for EdDSA", curve);
    }
    ensure_eq!(sig.len(), 2, "invalid eddsa signature");

    let r = sig[0].as_bytes();
    let s = sig[1].as_bytes();
    ensure!(r.len() <= 32 && s.len() <= 32, "invalid signature length");

    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(&left_pad(r, 32));
    sig_bytes[32..].copy_from_slice(&left_pad(s, 32));

    let pk = ed25519_dalek::VerifyingKey::from_bytes(&public_bytes(q)?)?;
    let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
    pk.verify(hashed, &sig)?;

    Ok(())
}

/// Sign a digest with the secret seed.
pub fn sign(curve: &EccCurve, q: &[u8], seed: &[u8], digest: &[u8]) -> Result<Vec<Mpi>> {
    if curve != &EccCurve::Ed25519 {
        unsupported_err!("curve {} for EdDSA", curve);
    }
    ensure!(seed.len() <= 32, "invalid secret key size");

    let mut secret = zeroize::Zeroizing::new([0u8; 32]);
    secret[32 - seed.len()..].copy_from_slice(seed);

    let key = ed25519_dalek::SigningKey::from_bytes(&secret);
    ensure!(
        key.verifying_key().to_bytes() == public_bytes(q)?,
        "secret key does not match the public key"
    );
    let bytes = key.sign(digest).to_bytes();

    Ok(vec![Mpi::from_slice(&bytes[..32]), Mpi::from_slice(&bytes[32..])])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify() {
        let seed = [7u8; 32];
        let key = ed25519_dalek::SigningKey::from_bytes(&seed);
        let mut q = vec![0x40];
        q.extend_from_slice(&key.verifying_key().to_bytes());

        let digest = [0xAB; 32];
        let sig = sign(&EccCurve::Ed25519, &q, &seed, &digest).unwrap();
        verify(&EccCurve::Ed25519, &q, &digest, &sig).unwrap();
        assert!(verify(&EccCurve::Ed25519, &q, &[0xAC; 32], &sig).is_err());

        // wrong prefix
        q[0] = 0x04;
        assert!(verify(&EccCurve::Ed25519, &q, &digest, &sig).is_err());
    }
}
