use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use num_bigint::BigUint;

use crate::errors::{ensure, Result};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;

/// Number of bits we accept when reading or writing MPIs.
/// The value is the same as gnupgs.
const MAX_EXTERN_MPI_BITS: u16 = 16384;

/// Represents an owned MPI value, big endian without leading zeros.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-3.2>
#[derive(Default, Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Mpi(#[debug("{}", hex::encode(_0))] Bytes);

impl Mpi {
    /// Parses a length prefixed MPI.
    pub fn from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        let len_bits = r.read_be_u16()?;
        ensure!(
            len_bits <= MAX_EXTERN_MPI_BITS,
            "mpi of {} bits is too large",
            len_bits
        );

        let len_bytes = (usize::from(len_bits) + 7) >> 3;
        let n = r.take_bytes(len_bytes)?;
        ensure!(
            n.first() != Some(&0),
            "mpi of {} bits has a leading zero octet",
            len_bits
        );
        ensure!(
            bit_size(&n) == usize::from(len_bits),
            "mpi bit count {} does not match its value",
            len_bits
        );

        Ok(Mpi(n))
    }

    /// Represent the data in `raw` as an Mpi, stripping leading zeros.
    pub fn from_slice(raw: &[u8]) -> Self {
        Mpi(Bytes::copy_from_slice(strip_leading_zeros(raw)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// Number of significant bits.
    pub fn bit_len(&self) -> usize {
        bit_size(&self.0)
    }
}

#[inline]
fn bit_size(val: &[u8]) -> usize {
    match val.first() {
        None => 0,
        Some(first) => (val.len() * 8) - first.leading_zeros() as usize,
    }
}

#[inline]
fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    bytes
        .iter()
        .position(|b| b != &0)
        .map_or(&[], |offset| &bytes[offset..])
}

impl AsRef<[u8]> for Mpi {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Mpi {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_u16::<BigEndian>(bit_size(&self.0) as u16)?;
        w.write_all(&self.0)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.0.len()
    }
}

impl From<&BigUint> for Mpi {
    fn from(other: &BigUint) -> Self {
        Mpi::from_slice(&other.to_bytes_be())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::errors::Error;

    use super::*;

    #[test]
    fn decode_mpi() {
        // 511
        let mpi = Mpi::from_reader(&[0x00, 0x09, 0x01, 0xFF][..]).unwrap();
        assert_eq!(mpi.as_bytes(), &[0x01, 0xFF]);
        assert_eq!(mpi.bit_len(), 9);

        // ECC points carry a prefix byte which keeps the bit count
        let mut point = vec![0x01, 0x07, 0x40];
        point.extend_from_slice(&[0xAA; 32]);
        let mpi = Mpi::from_reader(&point[..]).unwrap();
        assert_eq!(mpi.len(), 33);
        assert_eq!(mpi.to_bytes().unwrap(), point);
    }

    #[test]
    fn non_minimal_mpis_are_rejected() {
        // leading zero octet
        let err = Mpi::from_reader(&[0x00, 0x10, 0x00, 0x05][..]).unwrap_err();
        assert!(matches!(err, Error::Structural { .. }), "{err:?}");
        // bit count larger than the value
        let err = Mpi::from_reader(&[0x00, 0x0a, 0x01, 0xff][..]).unwrap_err();
        assert!(matches!(err, Error::Structural { .. }), "{err:?}");
        // zero is encoded without octets
        let mpi = Mpi::from_reader(&[0x00, 0x00][..]).unwrap();
        assert!(mpi.is_empty());
    }

    #[test]
    fn mpi_errors() {
        // truncated
        assert!(Mpi::from_reader(&[0x00, 0x10, 0x01][..]).is_err());
        // too large
        assert!(Mpi::from_reader(&[0x40, 0x01, 0x01][..]).is_err());
    }

    proptest! {
        #[test]
        fn write_len_matches(v in proptest::collection::vec(any::<u8>(), 0..300)) {
            let mpi = Mpi::from_slice(&v);
            let bytes = mpi.to_bytes().unwrap();
            prop_assert_eq!(bytes.len(), mpi.write_len());
            prop_assert_eq!(Mpi::from_reader(&bytes[..]).unwrap(), mpi);
        }
    }
}
