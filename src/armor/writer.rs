use std::hash::Hasher;
use std::io::Write;

use base64::engine::{general_purpose::STANDARD, Engine as _};
use crc24::Crc24Hasher;

use crate::armor::{BlockType, Headers};
use crate::errors::Result;
use crate::ser::Serialize;

const LINE_LEN: usize = 64;

/// Writes `body` as an armored block, including the crc24 checksum.
pub fn write(
    writer: &mut impl Write,
    typ: BlockType,
    headers: Option<&Headers>,
    body: &[u8],
) -> Result<()> {
    // write armor header
    writer.write_all(&b"-----BEGIN "[..])?;
    typ.to_writer(writer)?;
    writer.write_all(&b"-----\n"[..])?;

    // write armor headers
    if let Some(headers) = headers {
        for (key, values) in headers.iter() {
            for value in values {
                writer.write_all(key.as_bytes())?;
                writer.write_all(&b": "[..])?;
                writer.write_all(value.as_bytes())?;
                writer.write_all(&b"\n"[..])?;
            }
        }
    }

    writer.write_all(&b"\n"[..])?;

    // write body
    let encoded = STANDARD.encode(body);
    for line in encoded.as_bytes().chunks(LINE_LEN) {
        writer.write_all(line)?;
        writer.write_all(&b"\n"[..])?;
    }

    // write crc
    let mut crc_hasher = Crc24Hasher::new();
    crc_hasher.write(body);
    let crc = crc_hasher.finish() as u32;
    let crc_buf = [(crc >> 16) as u8, (crc >> 8) as u8, crc as u8];
    writer.write_all(b"=")?;
    writer.write_all(STANDARD.encode(crc_buf).as_bytes())?;
    writer.write_all(&b"\n"[..])?;

    // write footer
    writer.write_all(&b"-----END "[..])?;
    typ.to_writer(writer)?;
    writer.write_all(&b"-----\n"[..])?;

    Ok(())
}
