//! Helpers for decoding fixed width fields from a [`BufRead`] source.

use std::io::{self, BufRead};

use bytes::{BufMut, Bytes, BytesMut};

fn short_read(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, format!("{what}: no more data available"))
}

pub trait BufReadParsing: BufRead + Sized {
    fn read_u8(&mut self) -> io::Result<u8> {
        let [b] = self.read_array::<1>()?;
        Ok(b)
    }

    fn read_be_u16(&mut self) -> io::Result<u16> {
        self.read_array::<2>().map(u16::from_be_bytes)
    }

    fn read_be_u32(&mut self) -> io::Result<u32> {
        self.read_array::<4>().map(u32::from_be_bytes)
    }

    /// Returns `false` once the source is exhausted.
    fn has_remaining(&mut self) -> io::Result<bool> {
        Ok(!self.fill_buf()?.is_empty())
    }

    fn read_array<const C: usize>(&mut self) -> io::Result<[u8; C]> {
        let mut arr = [0u8; C];
        let mut read = 0;

        while read < C {
            let buf = self.fill_buf()?;
            if buf.is_empty() {
                return Err(short_read("read_array"));
            }

            let available = (C - read).min(buf.len());
            arr[read..read + available].copy_from_slice(&buf[..available]);
            read += available;
            self.consume(available);
        }

        Ok(arr)
    }

    /// Reads exactly `size` bytes.
    ///
    /// Memory is only reserved as data arrives, so bogus lengths cannot trigger huge allocations.
    fn take_bytes(&mut self, size: usize) -> io::Result<Bytes> {
        let mut out = BytesMut::with_capacity(size.min(1024));

        while out.len() < size {
            let buf = self.fill_buf()?;
            if buf.is_empty() {
                return Err(short_read("take_bytes"));
            }

            let available = (size - out.len()).min(buf.len());
            out.extend_from_slice(&buf[..available]);
            self.consume(available);
        }

        Ok(out.freeze())
    }

    /// Reads everything that is left.
    fn rest(&mut self) -> io::Result<Bytes> {
        let mut writer = BytesMut::new().writer();
        io::copy(self, &mut writer)?;
        Ok(writer.into_inner().freeze())
    }

    /// Drains the source, returning how many bytes were skipped.
    fn drain(&mut self) -> io::Result<u64> {
        io::copy(self, &mut io::sink())
    }
}

impl<B: BufRead> BufReadParsing for B {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_numbers_across_buffer_boundaries() {
        let data = [0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut r = io::BufReader::with_capacity(3, &data[..]);

        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.read_be_u32().unwrap(), 0x0203_0405);
        assert_eq!(r.read_be_u16().unwrap(), 0x0607);
        assert!(!r.has_remaining().unwrap());

        let err = r.read_u8().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn take_bytes_short_input() {
        let mut r = &b"abc"[..];
        assert_eq!(r.take_bytes(2).unwrap().as_ref(), b"ab");
        assert!(r.take_bytes(2).is_err());
    }
}
