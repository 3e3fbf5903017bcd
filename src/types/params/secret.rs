use std::io::{self, BufRead};

use bytes::Bytes;
use log::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::config::Config;
use crate::crypto::checksum;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::{dsa, eddsa, elgamal, rsa};
use crate::errors::{bail, ensure, unsupported_err, Error, Result};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{Mpi, PublicParams, StringToKey};

/// Reads one MPI into a zeroizable buffer.
fn secret_mpi<B: BufRead>(i: B) -> Result<Vec<u8>> {
    Ok(Mpi::from_reader(i)?.as_bytes().to_vec())
}

fn write_secret_mpi<W: io::Write>(value: &[u8], writer: &mut W) -> Result<()> {
    Mpi::from_slice(value).to_writer(writer)
}

/// Decrypted secret key material.
///
/// Values are stored as stripped big endian bytes so they can be wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, derive_more::Debug)]
pub enum PlainSecretParams {
    RSA {
        #[debug("..")]
        d: Vec<u8>,
        #[debug("..")]
        p: Vec<u8>,
        #[debug("..")]
        q: Vec<u8>,
        #[debug("..")]
        u: Vec<u8>,
    },
    DSA {
        #[debug("..")]
        x: Vec<u8>,
    },
    ECDSA {
        #[debug("..")]
        d: Vec<u8>,
    },
    ECDH {
        #[debug("..")]
        d: Vec<u8>,
    },
    Elgamal {
        #[debug("..")]
        x: Vec<u8>,
    },
    EdDSALegacy {
        #[debug("..")]
        seed: Vec<u8>,
    },
}

impl PlainSecretParams {
    /// Parses the algorithm specific secret MPIs, without any checksum.
    pub fn try_from_reader<B: BufRead>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        let params = match alg {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
                PlainSecretParams::RSA {
                    d: secret_mpi(&mut i)?,
                    p: secret_mpi(&mut i)?,
                    q: secret_mpi(&mut i)?,
                    u: secret_mpi(&mut i)?,
                }
            }
            PublicKeyAlgorithm::DSA => PlainSecretParams::DSA {
                x: secret_mpi(&mut i)?,
            },
            PublicKeyAlgorithm::ECDSA => PlainSecretParams::ECDSA {
                d: secret_mpi(&mut i)?,
            },
            PublicKeyAlgorithm::ECDH => PlainSecretParams::ECDH {
                d: secret_mpi(&mut i)?,
            },
            PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalEncrypt => {
                PlainSecretParams::Elgamal {
                    x: secret_mpi(&mut i)?,
                }
            }
            PublicKeyAlgorithm::EdDSALegacy => PlainSecretParams::EdDSALegacy {
                seed: secret_mpi(&mut i)?,
            },
            PublicKeyAlgorithm::DiffieHellman | PublicKeyAlgorithm::Unknown(_) => {
                unsupported_err!("secret key algorithm {}", u8::from(alg))
            }
        };
        Ok(params)
    }

    /// The MPIs without checksum.
    pub fn to_writer_raw<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PlainSecretParams::RSA { d, p, q, u } => {
                for v in [d, p, q, u] {
                    write_secret_mpi(v, writer)?;
                }
            }
            PlainSecretParams::DSA { x }
            | PlainSecretParams::Elgamal { x }
            | PlainSecretParams::ECDSA { d: x }
            | PlainSecretParams::ECDH { d: x }
            | PlainSecretParams::EdDSALegacy { seed: x } => write_secret_mpi(x, writer)?,
        }
        Ok(())
    }

    fn checksum_simple(&self) -> Result<u16> {
        let mut raw = Zeroizing::new(Vec::new());
        self.to_writer_raw(&mut *raw)?;
        Ok(checksum::calculate_simple(&raw))
    }

    /// Signs a digest.
    pub fn sign(
        &self,
        public: &PublicParams,
        hash: HashAlgorithm,
        digest: &[u8],
    ) -> Result<Vec<Mpi>> {
        match (self, public) {
            (PlainSecretParams::RSA { d, p, q, .. }, PublicParams::RSA { n, e }) => {
                rsa::sign(n, e, d, p, q, hash, digest)
            }
            (PlainSecretParams::DSA { x }, PublicParams::DSA { p, q, g, y }) => {
                dsa::sign((p, q, g, y), x, hash, digest)
            }
            (PlainSecretParams::EdDSALegacy { seed }, PublicParams::EdDSALegacy { curve, q }) => {
                eddsa::sign(curve, q.as_bytes(), seed, digest)
            }
            (PlainSecretParams::ECDSA { .. }, _) => unsupported_err!("ecdsa signing"),
            (PlainSecretParams::Elgamal { .. } | PlainSecretParams::ECDH { .. }, _) => {
                unsupported_err!("signing with an encryption only key")
            }
            _ => bail!("inconsistent key state"),
        }
    }

    /// Decrypts the values of a public key encrypted session key.
    pub fn decrypt(&self, public: &PublicParams, mpis: &[Mpi]) -> Result<Vec<u8>> {
        match (self, public) {
            (PlainSecretParams::RSA { d, p, q, .. }, PublicParams::RSA { n, e }) => {
                rsa::decrypt(n, e, d, p, q, mpis)
            }
            (PlainSecretParams::Elgamal { x }, PublicParams::Elgamal { p, .. }) => {
                elgamal::decrypt(p, x, mpis)
            }
            (PlainSecretParams::ECDH { .. }, _) => unsupported_err!("ecdh decryption"),
            (
                PlainSecretParams::DSA { .. }
                | PlainSecretParams::ECDSA { .. }
                | PlainSecretParams::EdDSALegacy { .. },
                _,
            ) => unsupported_err!("decryption with a signing only key"),
            _ => bail!("inconsistent key state"),
        }
    }
}

/// Secret key material protected by a passphrase.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct EncryptedSecretParams {
    /// The S2K usage octet: 254, 255 or a legacy cipher id.
    s2k_usage: u8,
    sym_alg: SymmetricKeyAlgorithm,
    s2k: StringToKey,
    #[debug("{}", hex::encode(iv))]
    iv: Bytes,
    #[debug("{} bytes", data.len())]
    data: Bytes,
}

impl EncryptedSecretParams {
    pub fn s2k_usage(&self) -> u8 {
        self.s2k_usage
    }

    pub fn sym_alg(&self) -> SymmetricKeyAlgorithm {
        self.sym_alg
    }

    pub fn string_to_key(&self) -> &StringToKey {
        &self.s2k
    }

    /// Decrypts and checks the material. A wrong passphrase is reported as `KeyIncorrect`.
    ///
    /// The cipher and the S2K hash must be enabled in `config`.
    pub fn unlock(
        &self,
        config: &Config,
        passphrase: &[u8],
        alg: PublicKeyAlgorithm,
    ) -> Result<PlainSecretParams> {
        if !config.is_symmetric_enabled(self.sym_alg) {
            unsupported_err!("secret key cipher {:?} is not enabled", self.sym_alg);
        }
        let key = self
            .s2k
            .derive_key(config, passphrase, self.sym_alg.key_size())?;

        let mut plaintext = Zeroizing::new(self.data.to_vec());
        self.sym_alg
            .decrypt_with_iv_regular(&key, &self.iv, &mut plaintext)?;

        let body_len = if self.s2k_usage == 254 {
            if plaintext.len() < 20 {
                return Err(Error::KeyIncorrect);
            }
            let split = plaintext.len() - 20;
            let expected = checksum::calculate_sha1(&plaintext[..split])?;
            if expected[..] != plaintext[split..] {
                debug!("sha1 checksum mismatch, wrong passphrase");
                return Err(Error::KeyIncorrect);
            }
            split
        } else {
            if plaintext.len() < 2 {
                return Err(Error::KeyIncorrect);
            }
            let split = plaintext.len() - 2;
            let actual = [plaintext[split], plaintext[split + 1]];
            if checksum::simple(actual, &plaintext[..split]).is_err() {
                debug!("checksum mismatch, wrong passphrase");
                return Err(Error::KeyIncorrect);
            }
            split
        };

        let mut body = &plaintext[..body_len];
        let params =
            PlainSecretParams::try_from_reader(alg, &mut body).map_err(|_| Error::KeyIncorrect)?;
        ensure!(body.is_empty(), "failed to process full secret key material");

        Ok(params)
    }
}

/// The secret half of a key, as found in a secret key packet.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SecretParams {
    Plain(PlainSecretParams),
    Encrypted(EncryptedSecretParams),
    /// GNU dummy: the packet carries no secret material at all.
    Dummy {
        s2k_usage: u8,
        sym_alg: SymmetricKeyAlgorithm,
        s2k: StringToKey,
    },
}

impl SecretParams {
    /// Parses everything after the public key part of a secret key packet.
    pub fn try_from_reader<B: BufRead>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        let s2k_usage = i.read_u8()?;
        let (sym_alg, s2k) = match s2k_usage {
            0 => {
                let params = PlainSecretParams::try_from_reader(alg, &mut i)?;
                let actual = i.read_array::<2>()?;
                ensure!(
                    u16::from_be_bytes(actual) == params.checksum_simple()?,
                    "invalid secret key checksum"
                );
                return Ok(SecretParams::Plain(params));
            }
            254 | 255 => {
                let sym_alg = SymmetricKeyAlgorithm::from(i.read_u8()?);
                let s2k = StringToKey::try_from_reader(&mut i)?;
                if s2k.is_dummy() {
                    // mode 1001 has nothing else in the packet
                    i.drain()?;
                    return Ok(SecretParams::Dummy {
                        s2k_usage,
                        sym_alg,
                        s2k,
                    });
                }
                (sym_alg, s2k)
            }
            legacy => (
                SymmetricKeyAlgorithm::from(legacy),
                StringToKey::Simple {
                    hash_alg: HashAlgorithm::Md5,
                },
            ),
        };

        let bs = sym_alg.block_size();
        if bs == 0 {
            unsupported_err!("secret key cipher {}", u8::from(sym_alg));
        }
        let iv = i.take_bytes(bs)?;
        let data = i.rest()?;

        Ok(SecretParams::Encrypted(EncryptedSecretParams {
            s2k_usage,
            sym_alg,
            s2k,
            iv,
            data,
        }))
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, SecretParams::Encrypted(_))
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self, SecretParams::Dummy { .. })
    }
}

impl Serialize for SecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SecretParams::Plain(params) => {
                writer.write_all(&[0])?;
                params.to_writer_raw(writer)?;
                writer.write_all(&params.checksum_simple()?.to_be_bytes())?;
            }
            SecretParams::Encrypted(params) => {
                writer.write_all(&[params.s2k_usage])?;
                if params.s2k_usage >= 254 {
                    writer.write_all(&[params.sym_alg.into()])?;
                    params.s2k.to_writer(writer)?;
                }
                writer.write_all(&params.iv)?;
                writer.write_all(&params.data)?;
            }
            SecretParams::Dummy {
                s2k_usage,
                sym_alg,
                s2k,
            } => {
                writer.write_all(&[*s2k_usage, (*sym_alg).into()])?;
                s2k.to_writer(writer)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            SecretParams::Plain(params) => {
                let mut counter = io::sink();
                let mut len = CountingWriter(&mut counter, 0);
                // writing into a sink does not fail
                let _ = params.to_writer_raw(&mut len);
                1 + len.1 + 2
            }
            SecretParams::Encrypted(params) => {
                let s2k_len = if params.s2k_usage >= 254 {
                    1 + params.s2k.write_len()
                } else {
                    0
                };
                1 + s2k_len + params.iv.len() + params.data.len()
            }
            SecretParams::Dummy { s2k, .. } => 2 + s2k.write_len(),
        }
    }
}

struct CountingWriter<'a, W>(&'a mut W, usize);

impl<W: io::Write> io::Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.0.write(buf)?;
        self.1 += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}
