use std::io::{self, BufRead, Read};

use bytes::{Buf, BytesMut};
use log::debug;

use crate::errors::Error;
use crate::packet::PacketHeader;
use crate::types::PacketLength;
use crate::util::fill_buffer_bytes;

const BUFFER_SIZE: usize = 8 * 1024;

/// The framing of the body chunk that is currently being read.
#[derive(Debug)]
pub enum LimitedReader<R: BufRead> {
    Fixed(io::Take<R>),
    Indeterminate(R),
    Partial(io::Take<R>),
}

impl<R: BufRead> BufRead for LimitedReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            Self::Fixed(ref mut r) => r.fill_buf(),
            Self::Indeterminate(ref mut r) => r.fill_buf(),
            Self::Partial(ref mut r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            Self::Fixed(ref mut r) => r.consume(amt),
            Self::Indeterminate(ref mut r) => r.consume(amt),
            Self::Partial(ref mut r) => r.consume(amt),
        }
    }
}

impl<R: BufRead> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Fixed(ref mut r) => r.read(buf),
            Self::Indeterminate(ref mut r) => r.read(buf),
            Self::Partial(ref mut r) => r.read(buf),
        }
    }
}

impl<R: BufRead> LimitedReader<R> {
    pub fn fixed(limit: u32, reader: R) -> Self {
        Self::Fixed(reader.take(u64::from(limit)))
    }

    pub fn partial(limit: u32, reader: R) -> Self {
        Self::Partial(reader.take(u64::from(limit)))
    }

    pub fn into_inner(self) -> R {
        match self {
            Self::Fixed(source) | Self::Partial(source) => source.into_inner(),
            Self::Indeterminate(source) => source,
        }
    }

    pub fn get_mut(&mut self) -> &mut R {
        match self {
            Self::Fixed(source) | Self::Partial(source) => source.get_mut(),
            Self::Indeterminate(source) => source,
        }
    }
}

/// Streams the body of a single packet, hiding partial length chunk boundaries.
#[derive(Debug)]
pub struct PacketBodyReader<R: BufRead> {
    packet_header: PacketHeader,
    state: State<R>,
}

#[derive(derive_more::Debug)]
enum State<R: BufRead> {
    Body {
        #[debug("{}", hex::encode(buffer))]
        buffer: BytesMut,
        source: LimitedReader<R>,
    },
    Done {
        source: R,
    },
    Error,
}

fn errored() -> io::Error {
    io::Error::other("packet body reader errored")
}

impl<R: BufRead> BufRead for PacketBodyReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.fill_inner()?;
        match self.state {
            State::Body { ref mut buffer, .. } => Ok(&buffer[..]),
            State::Done { .. } => Ok(&[][..]),
            State::Error => Err(errored()),
        }
    }

    fn consume(&mut self, amt: usize) {
        if let State::Body { ref mut buffer, .. } = self.state {
            buffer.advance(amt);
        }
    }
}

impl<R: BufRead> Read for PacketBodyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.fill_inner()?;
        match self.state {
            State::Body { ref mut buffer, .. } => {
                let to_write = buffer.remaining().min(buf.len());
                buffer.copy_to_slice(&mut buf[..to_write]);
                Ok(to_write)
            }
            State::Done { .. } => Ok(0),
            State::Error => Err(errored()),
        }
    }
}

impl<R: BufRead> PacketBodyReader<R> {
    pub fn new(packet_header: PacketHeader, source: R) -> io::Result<Self> {
        let source = match packet_header.packet_length() {
            PacketLength::Fixed(len) => {
                debug!("fixed packet {len}");
                LimitedReader::fixed(len, source)
            }
            PacketLength::Indeterminate => {
                debug!("indeterminate packet");
                LimitedReader::Indeterminate(source)
            }
            PacketLength::Partial(len) => {
                debug!("partial packet start {len}");
                // Partial Body Lengths MUST NOT be used for any other packet types
                if !packet_header.tag().allows_partial_length() {
                    return Err(Error::Structural {
                        message: format!(
                            "partial body length is not allowed for packet type {:?}",
                            packet_header.tag()
                        ),
                    }
                    .into_io());
                }
                LimitedReader::partial(len, source)
            }
        };

        Ok(Self {
            packet_header,
            state: State::Body {
                source,
                buffer: BytesMut::with_capacity(BUFFER_SIZE),
            },
        })
    }

    pub fn packet_header(&self) -> PacketHeader {
        self.packet_header
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done { .. })
    }

    /// Returns the underlying source, positioned after this packet if the body was fully read.
    pub fn into_inner(self) -> io::Result<R> {
        match self.state {
            State::Body { source, .. } => Ok(source.into_inner()),
            State::Done { source } => Ok(source),
            State::Error => Err(errored()),
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut R> {
        match &mut self.state {
            State::Body { source, .. } => Some(source.get_mut()),
            State::Done { source } => Some(source),
            State::Error => None,
        }
    }

    fn fill_inner(&mut self) -> io::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, State::Error) {
                State::Body {
                    mut buffer,
                    mut source,
                } => {
                    if buffer.has_remaining() {
                        self.state = State::Body { source, buffer };
                        return Ok(());
                    }

                    let read = match fill_buffer_bytes(&mut source, &mut buffer, BUFFER_SIZE) {
                        Ok(read) => read,
                        Err(err) => {
                            // the error belongs to the source, the body stays readable
                            self.state = State::Body { source, buffer };
                            return Err(err);
                        }
                    };
                    if read > 0 {
                        self.state = State::Body { source, buffer };
                        return Ok(());
                    }

                    debug!("body source done: {:?}", self.packet_header);
                    match source {
                        LimitedReader::Fixed(reader) => {
                            if reader.limit() > 0 {
                                return Err(io::Error::new(
                                    io::ErrorKind::UnexpectedEof,
                                    format!(
                                        "packet body is {} bytes shorter than announced",
                                        reader.limit()
                                    ),
                                ));
                            }
                            self.state = State::Done {
                                source: reader.into_inner(),
                            };
                            return Ok(());
                        }
                        LimitedReader::Indeterminate(source) => {
                            self.state = State::Done { source };
                            return Ok(());
                        }
                        LimitedReader::Partial(r) => {
                            if r.limit() > 0 {
                                return Err(io::Error::new(
                                    io::ErrorKind::UnexpectedEof,
                                    "partial body chunk is truncated",
                                ));
                            }
                            // next chunk
                            let mut source = r.into_inner();
                            let source = match PacketLength::try_from_reader(&mut source)? {
                                PacketLength::Fixed(len) => {
                                    debug!("final partial chunk {len}");
                                    LimitedReader::fixed(len, source)
                                }
                                PacketLength::Partial(len) => {
                                    debug!("intermediary partial chunk {len}");
                                    LimitedReader::partial(len, source)
                                }
                                PacketLength::Indeterminate => {
                                    return Err(Error::Structural {
                                        message: "invalid indeterminate packet length".into(),
                                    }
                                    .into_io());
                                }
                            };
                            self.state = State::Body { source, buffer };
                        }
                    }
                }
                State::Done { source } => {
                    self.state = State::Done { source };
                    return Ok(());
                }
                State::Error => return Err(errored()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::parsing_reader::BufReadParsing;
    use crate::types::Tag;

    fn read_body(data: &[u8]) -> io::Result<(Vec<u8>, Vec<u8>)> {
        let mut source = data;
        let header = PacketHeader::try_from_reader(&mut source).map_err(Error::into_io)?;
        let mut body = PacketBodyReader::new(header, source)?;
        let mut out = Vec::new();
        body.read_to_end(&mut out)?;
        let mut rest = body.into_inner()?;
        Ok((out, rest.rest()?.to_vec()))
    }

    #[test]
    fn fixed_body_leaves_rest() {
        let _ = pretty_env_logger::try_init();

        let (body, rest) = read_body(&[0xcb, 0x03, 1, 2, 3, 0xff]).unwrap();
        assert_eq!(body, vec![1, 2, 3]);
        assert_eq!(rest, vec![0xff]);
    }

    #[test]
    fn partial_chunks_are_joined() {
        // 2 byte chunk, 1 byte chunk, final fixed chunk of 3
        let data = [0xcb, 0xe1, 1, 2, 0xe0, 3, 0x03, 4, 5, 6, 0xaa];
        let (body, rest) = read_body(&data).unwrap();
        assert_eq!(body, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(rest, vec![0xaa]);
    }

    #[test]
    fn partial_only_for_data_packets() {
        let mut source = &[0xc2, 0xe1, 1, 2, 0x00][..];
        let header = PacketHeader::try_from_reader(&mut source).unwrap();
        assert_eq!(header.tag(), Tag::Signature);
        let err = PacketBodyReader::new(header, source).unwrap_err();
        assert!(matches!(Error::from_io(err), Error::Structural { .. }));
    }

    /// Hands out `data`, then fails with a modification detection error on every call.
    struct FailingSource {
        data: &'static [u8],
    }

    impl Read for FailingSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let available = self.fill_buf()?;
            let n = available.len().min(buf.len());
            buf[..n].copy_from_slice(&available[..n]);
            self.consume(n);
            Ok(n)
        }
    }

    impl BufRead for FailingSource {
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            if self.data.is_empty() {
                return Err(Error::MdcError.into_io());
            }
            Ok(self.data)
        }

        fn consume(&mut self, amt: usize) {
            self.data = &self.data[amt..];
        }
    }

    #[test]
    fn source_errors_reach_the_caller() {
        let _ = pretty_env_logger::try_init();

        // old format literal data, indeterminate length
        let header = PacketHeader::try_from_reader(&mut &[0xaf][..]).unwrap();
        let mut body = PacketBodyReader::new(header, FailingSource { data: &[1, 2, 3] }).unwrap();

        let mut buf = [0u8; 8];
        let err = body.read(&mut buf).unwrap_err();
        assert!(matches!(Error::from_io(err), Error::MdcError));

        // what was buffered before the failure is still handed out
        assert_eq!(body.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);

        let err = body.read(&mut buf).unwrap_err();
        assert!(matches!(Error::from_io(err), Error::MdcError));
        assert!(!body.is_done());
    }

    #[test]
    fn truncated_body() {
        let err = read_body(&[0xcb, 0x05, 1, 2]).unwrap_err();
        assert!(matches!(Error::from_io(err), Error::Structural { .. }));
    }

    proptest! {
        #[test]
        fn partial_framing_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..3000), exp in 0u8..10) {
            let chunk = 1usize << exp;
            let mut framed = vec![0xcb];
            let mut rest = &data[..];
            while rest.len() > chunk {
                framed.push(224 + exp);
                framed.extend_from_slice(&rest[..chunk]);
                rest = &rest[chunk..];
            }
            PacketLength::Fixed(rest.len() as u32).to_writer_new(&mut framed).unwrap();
            framed.extend_from_slice(rest);

            let (body, tail) = read_body(&framed).unwrap();
            prop_assert_eq!(body, data);
            prop_assert!(tail.is_empty());
        }
    }
}
