use std::io::{self, BufRead};

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};

/// Reads from `source` into `buffer` until it holds `len` bytes or the source is exhausted.
///
/// Returns the number of bytes added.
pub(crate) fn fill_buffer_bytes<R: BufRead>(
    mut source: R,
    buffer: &mut BytesMut,
    len: usize,
) -> io::Result<usize> {
    let mut read_total = 0;
    while buffer.len() < len {
        let source_buffer = source.fill_buf()?;
        if source_buffer.is_empty() {
            break;
        }
        let to_read = source_buffer.len().min(len - buffer.len());
        buffer.put_slice(&source_buffer[..to_read]);
        source.consume(to_read);
        read_total += to_read;
    }

    Ok(read_total)
}

/// Rewrites line endings to `\r\n` while streaming.
///
/// A `\n` that is not preceded by `\r` is replaced by `\r\n`, everything else is passed through.
/// The state survives across calls so that line breaks split between chunks are handled.
#[derive(Debug, Default, Clone)]
pub(crate) struct CanonicalLines {
    after_cr: bool,
}

impl CanonicalLines {
    pub(crate) fn feed(&mut self, data: &[u8], mut out: impl FnMut(&[u8])) {
        let mut start = 0;
        for (i, &c) in data.iter().enumerate() {
            if self.after_cr {
                self.after_cr = false;
                continue;
            }
            match c {
                b'\r' => self.after_cr = true,
                b'\n' => {
                    out(&data[start..i]);
                    out(b"\r\n");
                    start = i + 1;
                }
                _ => {}
            }
        }
        out(&data[start..]);
    }
}

/// Left pads `value` with zeros to `len` bytes, longer values are returned as is.
pub(crate) fn left_pad(value: &[u8], len: usize) -> Vec<u8> {
    if value.len() >= len {
        return value.to_vec();
    }
    let mut out = vec![0u8; len];
    out[len - value.len()..].copy_from_slice(value);
    out
}

/// Converts a 32 bit unix timestamp, as found on the wire.
pub(crate) fn timestamp_from_u32(ts: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::from(ts), 0).unwrap_or_default()
}

/// Converts a point in time to its 32 bit wire form.
pub(crate) fn timestamp_to_u32(at: &DateTime<Utc>) -> crate::errors::Result<u32> {
    Ok(u32::try_from(at.timestamp())?)
}
