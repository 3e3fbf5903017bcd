use std::collections::BTreeMap;
use std::hash::Hasher;
use std::io::{self, BufRead, Read};
use std::{fmt, str};

use base64::engine::{general_purpose::STANDARD, Engine as _};
use bytes::{Buf, BytesMut};
use log::debug;

use crate::errors::{bail, Error, Result};
use crate::ser::Serialize;

/// Armor block types.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BlockType {
    /// PGP public key
    PublicKey,
    /// PGP private key
    PrivateKey,
    Message,
    MultiPartMessage(usize, usize),
    Signature,
    // gnupgp extension
    File,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockType::PublicKey => f.write_str("PGP PUBLIC KEY BLOCK"),
            BlockType::PrivateKey => f.write_str("PGP PRIVATE KEY BLOCK"),
            BlockType::MultiPartMessage(x, y) => write!(f, "PGP MESSAGE, PART {x}/{y}"),
            BlockType::Message => f.write_str("PGP MESSAGE"),
            BlockType::Signature => f.write_str("PGP SIGNATURE"),
            BlockType::File => f.write_str("PGP ARMORED FILE"),
        }
    }
}

impl str::FromStr for BlockType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let typ = match s {
            "PGP PUBLIC KEY BLOCK" => BlockType::PublicKey,
            "PGP PRIVATE KEY BLOCK" => BlockType::PrivateKey,
            "PGP MESSAGE" => BlockType::Message,
            "PGP SIGNATURE" => BlockType::Signature,
            "PGP ARMORED FILE" => BlockType::File,
            _ => {
                let Some(part) = s.strip_prefix("PGP MESSAGE, PART ") else {
                    bail!("unknown armor block type {:?}", s);
                };
                let (x, y) = part.split_once('/').unwrap_or((part, "0"));
                match (x.parse(), y.parse()) {
                    (Ok(x), Ok(y)) => BlockType::MultiPartMessage(x, y),
                    _ => bail!("invalid multi part armor block {:?}", s),
                }
            }
        };
        Ok(typ)
    }
}

impl Serialize for BlockType {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        write!(w, "{self}")?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        // allocates, but this is tiny, should be fine
        let x = self.to_string();
        x.len()
    }
}

/// Armor Headers.
pub type Headers = BTreeMap<String, Vec<String>>;

/// Decodes a complete armored block.
pub fn decode<R: BufRead>(input: R) -> Result<(BlockType, Headers, Vec<u8>)> {
    let mut dearmor = Dearmor::new(input);
    dearmor.read_header()?;

    let mut bytes = Vec::new();
    dearmor.read_to_end(&mut bytes)?;

    let Some(typ) = dearmor.typ else {
        bail!("dearmor failed to retrieve armor type");
    };
    Ok((typ, dearmor.headers, bytes))
}

/// Splits a `-----BEGIN X-----` or `-----END X-----` line.
fn armor_line<'a>(line: &'a str, kind: &str) -> Option<&'a str> {
    line.strip_prefix("-----")?
        .strip_prefix(kind)?
        .strip_prefix(' ')?
        .strip_suffix("-----")
}

/// Streaming based ascii armor parsing.
#[derive(derive_more::Debug)]
pub struct Dearmor<R: BufRead> {
    /// The ascii armor parsed block type.
    pub typ: Option<BlockType>,
    /// The headers found in the armored file.
    pub headers: Headers,
    /// Optional crc checksum from the armor footer
    pub checksum: Option<u32>,
    #[debug("Crc24Hasher")]
    crc: crc24::Crc24Hasher,
    /// Base64 characters which do not yet form a full quantum.
    #[debug("{:?}", String::from_utf8_lossy(pending))]
    pending: Vec<u8>,
    /// Decoded, but not yet returned.
    #[debug("{} bytes", decoded.len())]
    decoded: BytesMut,
    #[debug(skip)]
    current_part: Part<R>,
}

/// Internal indicator, where in the parsing phase we are
#[derive(Debug)]
enum Part<R: BufRead> {
    Header(R),
    Body(R),
    Done(R),
    Temp,
}

impl<R: BufRead> Dearmor<R> {
    pub fn new(input: R) -> Self {
        Dearmor {
            typ: None,
            headers: BTreeMap::new(),
            checksum: None,
            crc: Default::default(),
            pending: Vec::new(),
            decoded: BytesMut::new(),
            current_part: Part::Header(input),
        }
    }

    /// Reads everything up to and including the armor headers.
    ///
    /// Input without any armor block is an `InvalidArgument` error.
    pub fn read_header(&mut self) -> Result<()> {
        let Part::Header(mut b) = std::mem::replace(&mut self.current_part, Part::Temp) else {
            bail!("invalid state, cannot read header");
        };

        let mut line = String::new();
        let typ = loop {
            line.clear();
            if read_line(&mut b, &mut line)? == 0 {
                return Err(Error::InvalidArgument {
                    message: "no armored data found".to_string(),
                });
            }
            if let Some(typ) = armor_line(line.trim_end(), "BEGIN") {
                break typ.parse::<BlockType>()?;
            }
        };
        debug!("armor block {}", typ);

        loop {
            line.clear();
            if read_line(&mut b, &mut line)? == 0 {
                bail!("unexpected end of armor headers");
            }
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                break;
            }
            match trimmed.split_once(": ") {
                Some((key, value)) => {
                    self.headers
                        .entry(key.to_string())
                        .or_default()
                        .push(value.to_string());
                }
                None => {
                    // no blank line after the header line, this is already body data
                    self.push_body_line(trimmed)?;
                    break;
                }
            }
        }

        self.typ = Some(typ);
        self.current_part = Part::Body(b);
        Ok(())
    }

    fn push_body_line(&mut self, line: &str) -> Result<()> {
        self.pending
            .extend(line.bytes().filter(|c| !c.is_ascii_whitespace()));
        let full = self.pending.len() / 4 * 4;
        if full > 0 {
            self.decode_pending(full)?;
        }
        Ok(())
    }

    fn decode_pending(&mut self, len: usize) -> Result<()> {
        let decoded = STANDARD.decode(&self.pending[..len])?;
        self.crc.write(&decoded);
        self.decoded.extend_from_slice(&decoded);
        self.pending.drain(..len);
        Ok(())
    }

    /// Reads the next body line. Returns `false` once the footer was processed.
    fn read_body_line(&mut self, b: &mut R) -> Result<bool> {
        let mut line = String::new();
        if read_line(b, &mut line)? == 0 {
            bail!("missing armor footer");
        }
        let trimmed = line.trim();

        if let Some(typ) = armor_line(trimmed, "END") {
            let footer_typ: BlockType = typ.parse()?;
            if self.typ != Some(footer_typ) {
                bail!(
                    "armor ascii footer does not match header: {:?} != {:?}",
                    self.typ,
                    footer_typ
                );
            }
            if !self.pending.is_empty() {
                self.decode_pending(self.pending.len())?;
            }
            self.check_crc()?;
            return Ok(false);
        }

        if let Some(crc) = trimmed.strip_prefix('=') {
            let raw = STANDARD.decode(crc)?;
            let [a, b, c] = raw[..] else {
                bail!("invalid crc24 checksum length");
            };
            self.checksum = Some(u32::from_be_bytes([0, a, b, c]));
            return Ok(true);
        }

        self.push_body_line(trimmed)?;
        Ok(true)
    }

    fn check_crc(&self) -> Result<()> {
        if let Some(expected) = self.checksum {
            let actual = self.crc.finish() as u32;
            if expected != actual {
                bail!("invalid crc24 checksum");
            }
        }
        Ok(())
    }

    pub fn into_inner(self) -> Option<R> {
        match self.current_part {
            Part::Header(r) | Part::Body(r) | Part::Done(r) => Some(r),
            Part::Temp => None,
        }
    }
}

/// Reads a single line, which must be ascii.
fn read_line<R: BufRead>(b: &mut R, line: &mut String) -> Result<usize> {
    let mut raw = Vec::new();
    let read = b.read_until(b'\n', &mut raw)?;
    match String::from_utf8(raw) {
        Ok(s) => line.push_str(&s),
        Err(_) => bail!("armor contains non text data"),
    }
    Ok(read)
}

impl<R: BufRead> Read for Dearmor<R> {
    fn read(&mut self, into: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.decoded.has_remaining() {
                let len = self.decoded.remaining().min(into.len());
                self.decoded.copy_to_slice(&mut into[..len]);
                return Ok(len);
            }

            match std::mem::replace(&mut self.current_part, Part::Temp) {
                Part::Header(b) => {
                    self.current_part = Part::Header(b);
                    self.read_header().map_err(Error::into_io)?;
                }
                Part::Body(mut b) => {
                    let more = self.read_body_line(&mut b).map_err(Error::into_io)?;
                    self.current_part = if more { Part::Body(b) } else { Part::Done(b) };
                }
                Part::Done(b) => {
                    self.current_part = Part::Done(b);
                    return Ok(0);
                }
                Part::Temp => {
                    return Err(Error::Structural {
                        message: "dearmor errored".to_string(),
                    }
                    .into_io());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "-----BEGIN PGP MESSAGE-----
Version: 1.0
Comment: one
Comment: two

aGVsbG8gd29ybGQ=
=sDy3
-----END PGP MESSAGE-----
";

    #[test]
    fn decode_simple() {
        let _ = pretty_env_logger::try_init();

        let (typ, headers, body) = decode(SIMPLE.as_bytes()).unwrap();
        assert_eq!(typ, BlockType::Message);
        assert_eq!(body, b"hello world");
        assert_eq!(headers["Version"], vec!["1.0".to_string()]);
        assert_eq!(headers["Comment"].len(), 2);
    }

    #[test]
    fn leading_text_and_crlf() {
        let input = format!("some text\r\n\r\n{}", SIMPLE.replace('\n', "\r\n"));
        let (_, _, body) = decode(input.as_bytes()).unwrap();
        assert_eq!(body, b"hello world");
    }

    #[test]
    fn bad_checksum() {
        let input = SIMPLE.replace("=sDy3", "=sDy4");
        assert!(matches!(
            decode(input.as_bytes()).unwrap_err(),
            Error::Structural { .. }
        ));
    }

    #[test]
    fn mismatched_footer() {
        let input = SIMPLE.replace("END PGP MESSAGE", "END PGP SIGNATURE");
        assert!(decode(input.as_bytes()).is_err());
    }

    #[test]
    fn no_armor() {
        assert!(matches!(
            decode(&b"foo"[..]).unwrap_err(),
            Error::InvalidArgument { .. }
        ));
    }

    #[test]
    fn block_types() {
        assert_eq!(
            "PGP MESSAGE, PART 3/14".parse::<BlockType>().unwrap(),
            BlockType::MultiPartMessage(3, 14)
        );
        assert_eq!(
            "PGP MESSAGE, PART 14".parse::<BlockType>().unwrap(),
            BlockType::MultiPartMessage(14, 0)
        );
        assert!("SSH KEY".parse::<BlockType>().is_err());
    }
}
