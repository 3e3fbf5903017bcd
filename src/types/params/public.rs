use std::io::{self, BufRead};

use bytes::Bytes;
use log::debug;

use crate::crypto::ecc_curve::EccCurve;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::{dsa, ecdsa, eddsa, rsa};
use crate::errors::{ensure, unsupported_err, Result};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::Mpi;

/// Algorithm specific public key material.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum PublicParams {
    RSA {
        n: Mpi,
        e: Mpi,
    },
    DSA {
        p: Mpi,
        q: Mpi,
        g: Mpi,
        y: Mpi,
    },
    ECDSA {
        curve: EccCurve,
        p: Mpi,
    },
    ECDH {
        curve: EccCurve,
        p: Mpi,
        hash: HashAlgorithm,
        alg_sym: SymmetricKeyAlgorithm,
    },
    Elgamal {
        p: Mpi,
        g: Mpi,
        y: Mpi,
    },
    EdDSALegacy {
        curve: EccCurve,
        q: Mpi,
    },
    /// Key material of an algorithm we can't interpret, kept as is.
    Unknown {
        data: Bytes,
    },
}

fn read_oid<B: BufRead>(mut i: B) -> Result<EccCurve> {
    let len = i.read_u8()?;
    ensure!(len != 0 && len != 0xFF, "invalid curve oid length {}", len);
    let oid = i.take_bytes(len.into())?;
    Ok(EccCurve::from_oid(&oid))
}

fn write_oid<W: io::Write>(curve: &EccCurve, writer: &mut W) -> Result<()> {
    let oid = curve.oid();
    writer.write_all(&[oid.len().try_into()?])?;
    writer.write_all(oid)?;
    Ok(())
}

impl PublicParams {
    /// Parses the algorithm specific part of a public key packet.
    pub fn try_from_reader<B: BufRead>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        let params = match alg {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
                PublicParams::RSA {
                    n: Mpi::from_reader(&mut i)?,
                    e: Mpi::from_reader(&mut i)?,
                }
            }
            PublicKeyAlgorithm::DSA => PublicParams::DSA {
                p: Mpi::from_reader(&mut i)?,
                q: Mpi::from_reader(&mut i)?,
                g: Mpi::from_reader(&mut i)?,
                y: Mpi::from_reader(&mut i)?,
            },
            PublicKeyAlgorithm::ECDSA => PublicParams::ECDSA {
                curve: read_oid(&mut i)?,
                p: Mpi::from_reader(&mut i)?,
            },
            PublicKeyAlgorithm::ECDH => {
                let curve = read_oid(&mut i)?;
                let p = Mpi::from_reader(&mut i)?;
                let kdf_len = i.read_u8()?;
                ensure!(kdf_len == 3, "invalid ecdh kdf parameters length {}", kdf_len);
                let _reserved = i.read_u8()?;
                let hash = i.read_u8()?.into();
                let alg_sym = i.read_u8()?.into();
                PublicParams::ECDH {
                    curve,
                    p,
                    hash,
                    alg_sym,
                }
            }
            PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalEncrypt => {
                PublicParams::Elgamal {
                    p: Mpi::from_reader(&mut i)?,
                    g: Mpi::from_reader(&mut i)?,
                    y: Mpi::from_reader(&mut i)?,
                }
            }
            PublicKeyAlgorithm::EdDSALegacy => PublicParams::EdDSALegacy {
                curve: read_oid(&mut i)?,
                q: Mpi::from_reader(&mut i)?,
            },
            PublicKeyAlgorithm::DiffieHellman | PublicKeyAlgorithm::Unknown(_) => {
                debug!("keeping raw params of public key algorithm {}", u8::from(alg));
                PublicParams::Unknown {
                    data: i.rest()?,
                }
            }
        };

        Ok(params)
    }

    /// Verifies `sig` over the already hashed data.
    pub fn verify_signature(
        &self,
        hash: HashAlgorithm,
        hashed: &[u8],
        sig: &[Mpi],
    ) -> Result<()> {
        debug!("verify signature {} with {}", hash, self.name());
        match self {
            PublicParams::RSA { n, e } => rsa::verify(n, e, hash, hashed, sig),
            PublicParams::DSA { p, q, g, y } => dsa::verify((p, q, g, y), hashed, sig),
            PublicParams::ECDSA { curve, p } => ecdsa::verify(curve, p.as_bytes(), hashed, sig),
            PublicParams::EdDSALegacy { curve, q } => {
                eddsa::verify(curve, q.as_bytes(), hashed, sig)
            }
            PublicParams::Elgamal { .. } => unsupported_err!("elgamal signatures"),
            PublicParams::ECDH { .. } => unsupported_err!("ecdh signatures"),
            PublicParams::Unknown { .. } => unsupported_err!("unknown public key algorithm"),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            PublicParams::RSA { .. } => "RSA",
            PublicParams::DSA { .. } => "DSA",
            PublicParams::ECDSA { .. } => "ECDSA",
            PublicParams::ECDH { .. } => "ECDH",
            PublicParams::Elgamal { .. } => "Elgamal",
            PublicParams::EdDSALegacy { .. } => "EdDSA",
            PublicParams::Unknown { .. } => "unknown",
        }
    }
}

impl Serialize for PublicParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PublicParams::RSA { n, e } => {
                n.to_writer(writer)?;
                e.to_writer(writer)?;
            }
            PublicParams::DSA { p, q, g, y } => {
                [p, q, g, y].to_writer(writer)?;
            }
            PublicParams::ECDSA { curve, p } => {
                write_oid(curve, writer)?;
                p.to_writer(writer)?;
            }
            PublicParams::ECDH {
                curve,
                p,
                hash,
                alg_sym,
            } => {
                write_oid(curve, writer)?;
                p.to_writer(writer)?;
                writer.write_all(&[0x03, 0x01, (*hash).into(), (*alg_sym).into()])?;
            }
            PublicParams::Elgamal { p, g, y } => {
                [p, g, y].to_writer(writer)?;
            }
            PublicParams::EdDSALegacy { curve, q } => {
                write_oid(curve, writer)?;
                q.to_writer(writer)?;
            }
            PublicParams::Unknown { data } => writer.write_all(data)?,
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            PublicParams::RSA { n, e } => n.write_len() + e.write_len(),
            PublicParams::DSA { p, q, g, y } => [p, q, g, y].write_len(),
            PublicParams::ECDSA { curve, p } => 1 + curve.oid().len() + p.write_len(),
            PublicParams::ECDH { curve, p, .. } => 1 + curve.oid().len() + p.write_len() + 4,
            PublicParams::Elgamal { p, g, y } => [p, g, y].write_len(),
            PublicParams::EdDSALegacy { curve, q } => 1 + curve.oid().len() + q.write_len(),
            PublicParams::Unknown { data } => data.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eddsa_params_roundtrip() {
        let mut raw = vec![0x09];
        raw.extend_from_slice(EccCurve::Ed25519.oid());
        raw.extend_from_slice(&[0x01, 0x07, 0x40]);
        raw.extend_from_slice(&[0x11; 32]);

        let params = PublicParams::try_from_reader(PublicKeyAlgorithm::EdDSALegacy, &raw[..]).unwrap();
        assert!(matches!(
            params,
            PublicParams::EdDSALegacy {
                curve: EccCurve::Ed25519,
                ..
            }
        ));
        assert_eq!(params.to_bytes().unwrap(), raw);
        assert_eq!(params.write_len(), raw.len());
    }

    #[test]
    fn unknown_algorithm_keeps_raw_params() {
        let raw = [0x00, 0x01, 0x02, 0x03];
        let params =
            PublicParams::try_from_reader(PublicKeyAlgorithm::Unknown(99), &raw[..]).unwrap();
        assert_eq!(params.to_bytes().unwrap(), raw);
        assert_eq!(params.write_len(), raw.len());

        let err = params
            .verify_signature(HashAlgorithm::Sha256, &[0; 32], &[])
            .unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn elgamal_cannot_verify() {
        let params = PublicParams::Elgamal {
            p: Mpi::from_slice(&[23]),
            g: Mpi::from_slice(&[5]),
            y: Mpi::from_slice(&[8]),
        };
        let err = params
            .verify_signature(HashAlgorithm::Sha1, &[0; 20], &[])
            .unwrap_err();
        assert!(err.is_unsupported());
    }
}
