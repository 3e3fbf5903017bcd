use signature::hazmat::PrehashVerifier;

use crate::crypto::ecc_curve::EccCurve;
use crate::errors::{ensure, ensure_eq, unsupported_err, Result};
use crate::types::Mpi;

/// Concatenates `r` and `s`, left padding each to the field size.
fn signature_bytes(curve: &EccCurve, sig: &[Mpi]) -> Result<Vec<u8>> {
    ensure_eq!(sig.len(), 2, "invalid ecdsa signature");
    let flen = curve.field_len();

    let r = sig[0].as_bytes();
    let s = sig[1].as_bytes();
    ensure!(r.len() <= flen, "invalid R (len)");
    ensure!(s.len() <= flen, "invalid S (len)");

    let mut out = vec![0u8; 2 * flen];
    out[flen - r.len()..flen].copy_from_slice(r);
    out[2 * flen - s.len()..].copy_from_slice(s);
    Ok(out)
}

/// Verify an ECDSA signature over a prehashed message.
pub fn verify(curve: &EccCurve, p: &[u8], hashed: &[u8], sig: &[Mpi]) -> Result<()> {
    match curve {
        EccCurve::P256 => {
            let pk = p256::ecdsa::VerifyingKey::from_sec1_bytes(p)?;
            let sig = p256::ecdsa::Signature::from_slice(&signature_bytes(curve, sig)?)?;
            pk.verify_prehash(hashed, &sig)?;
        }
        EccCurve::P384 => {
            let pk = p384::ecdsa::VerifyingKey::from_sec1_bytes(p)?;
            let sig = p384::ecdsa::Signature::from_slice(&signature_bytes(curve, sig)?)?;
            pk.verify_prehash(hashed, &sig)?;
        }
        EccCurve::P521 => {
            let pk = p521::ecdsa::VerifyingKey::from_sec1_bytes(p)?;
            let sig = p521::ecdsa::Signature::from_slice(&signature_bytes(curve, sig)?)?;
            pk.verify_prehash(hashed, &sig)?;
        }
        _ => unsupported_err!("curve {} for ECDSA", curve),
    }

    Ok(())
}
