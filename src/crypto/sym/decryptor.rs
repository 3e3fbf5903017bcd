use std::io::{self, BufRead, Read};

use bytes::{Buf, BytesMut};
use log::debug;
use sha1::{Digest, Sha1};

use super::{CfbStream, SymmetricKeyAlgorithm};
use crate::errors::{bail, Error, Result};
use crate::util::fill_buffer_bytes;

/// MDC is 1 byte packet tag, 1 byte length prefix and 20 bytes SHA1 hash.
const MDC_LEN: usize = 22;
const BUFFER_SIZE: usize = 1024 * 8;

/// Streaming OpenPGP CFB decryption of a data packet body.
///
/// For protected data the trailing modification detection code is held back, and checked
/// once the source is exhausted.
#[derive(derive_more::Debug)]
pub struct StreamDecryptor<R: BufRead> {
    #[debug(skip)]
    cfb: Box<dyn CfbStream>,
    /// Decrypted data, the first `data_available` bytes can be handed out.
    buffer: BytesMut,
    data_available: usize,
    #[debug(skip)]
    mdc: Option<Sha1>,
    /// The modification detection code did not match, reported on every read.
    mdc_failed: bool,
    done: bool,
    source: R,
}

impl<R: BufRead> StreamDecryptor<R> {
    /// Sets up decryption.
    ///
    /// `head` holds ciphertext that was already read from the start of the body, at least the
    /// random prefix and the two quick check bytes. Anything beyond that is treated as data.
    pub fn new(
        alg: SymmetricKeyAlgorithm,
        protected: bool,
        key: &[u8],
        head: &[u8],
        source: R,
    ) -> Result<Self> {
        debug!("decrypt stream {:?} protected: {}", alg, protected);

        let bs = alg.block_size();
        if head.len() < bs + 2 {
            bail!("missing quick check");
        }

        let mut cfb = alg.cfb_decryptor(key, &vec![0u8; bs])?;
        let mut prefix = head[..bs + 2].to_vec();
        cfb.apply(&mut prefix);

        let mdc = if protected {
            let mut hasher = Sha1::default();
            hasher.update(&prefix);
            Some(hasher)
        } else {
            // legacy resyncing, the IV is the ciphertext following the first two bytes
            cfb = alg.cfb_decryptor(key, &head[2..bs + 2])?;
            None
        };

        let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
        buffer.extend_from_slice(&head[bs + 2..]);
        cfb.apply(&mut buffer[..]);

        Ok(StreamDecryptor {
            cfb,
            buffer,
            data_available: 0,
            mdc,
            mdc_failed: false,
            done: false,
            source,
        })
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    fn held_back(&self) -> usize {
        if self.mdc.is_some() {
            MDC_LEN
        } else {
            0
        }
    }

    fn fill_inner(&mut self) -> io::Result<()> {
        if self.mdc_failed {
            return Err(Error::MdcError.into_io());
        }
        while self.data_available == 0 && !self.done {
            let held = self.held_back();
            if self.buffer.len() > held {
                let end = self.buffer.len() - held;
                if let Some(ref mut hasher) = self.mdc {
                    hasher.update(&self.buffer[..end]);
                }
                self.data_available = end;
                break;
            }

            let current_len = self.buffer.len();
            let read = fill_buffer_bytes(&mut self.source, &mut self.buffer, BUFFER_SIZE)?;
            self.cfb.apply(&mut self.buffer[current_len..]);

            if read == 0 {
                self.finish()?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.done = true;
        if let Some(mut hasher) = self.mdc.take() {
            if self.buffer.len() != MDC_LEN {
                debug!("missing mdc");
                self.mdc_failed = true;
                return Err(Error::MdcError.into_io());
            }
            let mdc = self.buffer.split_to(MDC_LEN);
            hasher.update(&mdc[..2]);
            let sha1 = hasher.finalize();

            if mdc[0] != 0xD3 || mdc[1] != 0x14 || mdc[2..] != sha1[..] {
                debug!("invalid mdc");
                self.mdc_failed = true;
                return Err(Error::MdcError.into_io());
            }
        }
        self.data_available = self.buffer.len();
        Ok(())
    }
}

impl<R: BufRead> BufRead for StreamDecryptor<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.fill_inner()?;
        Ok(&self.buffer[..self.data_available])
    }

    fn consume(&mut self, amt: usize) {
        let amt = amt.min(self.data_available);
        self.buffer.advance(amt);
        self.data_available -= amt;
    }
}

impl<R: BufRead> Read for StreamDecryptor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let to_write = available.len().min(buf.len());
        buf[..to_write].copy_from_slice(&available[..to_write]);
        self.consume(to_write);
        Ok(to_write)
    }
}

#[cfg(test)]
mod tests {
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn encrypt_protected(alg: SymmetricKeyAlgorithm, key: &[u8], plaintext: &[u8]) -> Vec<u8> {
        let bs = alg.block_size();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut data = vec![0u8; bs + 2];
        rng.fill_bytes(&mut data[..bs]);
        data[bs] = data[bs - 2];
        data[bs + 1] = data[bs - 1];
        data.extend_from_slice(plaintext);
        data.extend_from_slice(&[0xD3, 0x14]);
        let checksum = Sha1::digest(&data);
        data.extend_from_slice(&checksum);

        alg.encrypt_with_iv_regular(key, &vec![0u8; bs], &mut data)
            .unwrap();
        data
    }

    fn encrypt_resync(alg: SymmetricKeyAlgorithm, key: &[u8], plaintext: &[u8]) -> Vec<u8> {
        let bs = alg.block_size();
        let mut prefix = vec![7u8; bs + 2];
        alg.encrypt_with_iv_regular(key, &vec![0u8; bs], &mut prefix)
            .unwrap();
        let mut body = plaintext.to_vec();
        alg.encrypt_with_iv_regular(key, &prefix[2..], &mut body)
            .unwrap();
        prefix.extend_from_slice(&body);
        prefix
    }

    fn decrypt(alg: SymmetricKeyAlgorithm, protected: bool, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        let head_len = 18.min(data.len());
        let mut dec = StreamDecryptor::new(alg, protected, key, &data[..head_len], &data[head_len..])?;
        let mut out = Vec::new();
        dec.read_to_end(&mut out)?;
        Ok(out)
    }

    #[test]
    fn protected_roundtrip() {
        let _ = pretty_env_logger::try_init();

        for alg in [SymmetricKeyAlgorithm::AES256, SymmetricKeyAlgorithm::CAST5] {
            let key = vec![3u8; alg.key_size()];
            for size in [0usize, 1, 21, 22, 23, 5000, BUFFER_SIZE * 2 + 3] {
                let plaintext: Vec<u8> = (0..size).map(|i| i as u8).collect();
                let ciphertext = encrypt_protected(alg, &key, &plaintext);
                assert_eq!(decrypt(alg, true, &key, &ciphertext).unwrap(), plaintext);
            }
        }
    }

    #[test]
    fn resync_roundtrip() {
        let alg = SymmetricKeyAlgorithm::CAST5;
        let key = vec![5u8; alg.key_size()];
        let plaintext = b"Symmetrically encrypted.\n".repeat(500);
        let ciphertext = encrypt_resync(alg, &key, &plaintext);
        assert_eq!(decrypt(alg, false, &key, &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn tampered_mdc() {
        let alg = SymmetricKeyAlgorithm::AES128;
        let key = vec![3u8; alg.key_size()];
        let mut ciphertext = encrypt_protected(alg, &key, b"hello world");
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 1;

        let err = decrypt(alg, true, &key, &ciphertext).unwrap_err();
        assert!(matches!(err, Error::MdcError), "{err:?}");

        // reading on does not turn the failure into a clean end of data
        let mut dec = StreamDecryptor::new(alg, true, &key, &ciphertext[..18], &ciphertext[18..])
            .unwrap();
        let mut out = Vec::new();
        assert!(dec.read_to_end(&mut out).is_err());
        let err = dec.read(&mut [0u8; 16]).unwrap_err();
        assert!(matches!(Error::from_io(err), Error::MdcError));

        // truncated
        let ciphertext = encrypt_protected(alg, &key, b"hello world");
        let err = decrypt(alg, true, &key, &ciphertext[..ciphertext.len() - 5]).unwrap_err();
        assert!(matches!(err, Error::MdcError), "{err:?}");
    }
}
