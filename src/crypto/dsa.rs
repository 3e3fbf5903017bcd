use dsa::{Components, Signature, SigningKey, VerifyingKey};
use num_bigint::BigUint;
use signature::hazmat::PrehashVerifier;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{ensure_eq, unsupported_err, Result};
use crate::types::Mpi;

fn verifying_key(p: &Mpi, q: &Mpi, g: &Mpi, y: &Mpi) -> Result<VerifyingKey> {
    let components = Components::from_components(p.to_biguint(), q.to_biguint(), g.to_biguint())?;
    let key = VerifyingKey::from_components(components, y.to_biguint())?;
    Ok(key)
}

/// Verify a DSA signature.
///
/// The digest is truncated to the size of `q`, which allows hashes larger than the group.
pub fn verify(
    (p, q, g, y): (&Mpi, &Mpi, &Mpi, &Mpi),
    hashed: &[u8],
    sig: &[Mpi],
) -> Result<()> {
    ensure_eq!(sig.len(), 2, "invalid dsa signature");
    let key = verifying_key(p, q, g, y)?;

    let q_len = (q.bit_len() + 7) / 8;
    let hashed = &hashed[..hashed.len().min(q_len)];

    let signature = Signature::from_components(sig[0].to_biguint(), sig[1].to_biguint())?;
    key.verify_prehash(hashed, &signature)?;

    Ok(())
}

/// Sign a digest, with deterministic nonces.
pub fn sign(
    (p, q, g, y): (&Mpi, &Mpi, &Mpi, &Mpi),
    x: &[u8],
    hash: HashAlgorithm,
    digest: &[u8],
) -> Result<Vec<Mpi>> {
    let key = SigningKey::from_components(verifying_key(p, q, g, y)?, BigUint::from_bytes_be(x))?;

    let signature = match hash {
        HashAlgorithm::Md5 => key.sign_prehashed_rfc6979::<md5::Md5>(digest),
        HashAlgorithm::Sha1 => key.sign_prehashed_rfc6979::<sha1::Sha1>(digest),
        HashAlgorithm::Ripemd160 => key.sign_prehashed_rfc6979::<ripemd::Ripemd160>(digest),
        HashAlgorithm::Sha256 => key.sign_prehashed_rfc6979::<sha2::Sha256>(digest),
        HashAlgorithm::Sha384 => key.sign_prehashed_rfc6979::<sha2::Sha384>(digest),
        HashAlgorithm::Sha512 => key.sign_prehashed_rfc6979::<sha2::Sha512>(digest),
        HashAlgorithm::Sha224 => key.sign_prehashed_rfc6979::<sha2::Sha224>(digest),
        HashAlgorithm::Sha3_256 => key.sign_prehashed_rfc6979::<sha3::Sha3_256>(digest),
        HashAlgorithm::Sha3_512 => key.sign_prehashed_rfc6979::<sha3::Sha3_512>(digest),
        HashAlgorithm::None | HashAlgorithm::Other(_) => unsupported_err!("{}", hash),
    }?;

    Ok(vec![
        Mpi::from(signature.r()),
        Mpi::from(signature.s()),
    ])
}

#[cfg(test)]
mod tests {
    use num_traits::Num;

    use super::*;

    fn hex_mpi(s: &str) -> Mpi {
        Mpi::from(&BigUint::from_str_radix(s, 16).expect("invalid hex"))
    }

    /// Test vectors from https://tools.ietf.org/html/rfc6979#appendix-A.2.1
    #[test]
    fn test_dsa_1024_sign_verify() {
        let _ = pretty_env_logger::try_init();

        let p = hex_mpi(
            "86F5CA03DCFEB225063FF830A0C769B9DD9D6153AD91D7CE27F787C43278B447\
             E6533B86B18BED6E8A48B784A14C252C5BE0DBF60B86D6385BD2F12FB763ED88\
             73ABFD3F5BA2E0A8C0A59082EAC056935E529DAF7C610467899C77ADEDFC846C\
             881870B7B19B2B58F9BE0521A17002E3BDD6B86685EE90B3D9A1B02B782B1779",
        );
        let q = hex_mpi("996F967F6C8E388D9E28D01E205FBA957A5698B1");
        let g = hex_mpi(
            "07B0F92546150B62514BB771E2A0C0CE387F03BDA6C56B505209FF25FD3C133D\
             89BBCD97E904E09114D9A7DEFDEADFC9078EA544D2E401AEECC40BB9FBBF78FD\
             87995A10A1C27CB7789B594BA7EFB5C4326A9FE59A070E136DB77175464ADCA4\
             17BE5DCE2F40D10A46A3A3943F26AB7FD9C0398FF8C76EE0A56826A8A88F1DBD",
        );
        let x = hex_mpi("411602CB19A6CCC34494D79D98EF1E7ED5AF25F7");
        let y = hex_mpi(
            "5DF5E01DED31D0297E274E1691C192FE5868FEF9E19A84776454B100CF16F653\
             92195A38B90523E2542EE61871C0440CB87C322FC4B4D2EC5E1E7EC766E1BE8D\
             4CE935437DC11C3C8FD426338933EBFE739CB3465F4D3668C5E473508253B1E6\
             82F65CBDC4FAE93C2EA212390E54905A86E2223170B44EAA7DA5DD9FFCFB7F3B",
        );
        let params = (&p, &q, &g, &y);

        // SHA-256 digests are longer than q and get truncated
        let digest = HashAlgorithm::Sha256.digest(b"sample").unwrap();
        let sig = sign(params, x.as_bytes(), HashAlgorithm::Sha256, &digest).unwrap();
        assert_eq!(
            sig[0].as_bytes(),
            hex_mpi("81F2F5850BE5BC123C43F71A3033E9384611C545").as_bytes()
        );
        verify(params, &digest, &sig).unwrap();

        let other = HashAlgorithm::Sha256.digest(b"test").unwrap();
        assert!(verify(params, &other, &sig).is_err());
    }
}
