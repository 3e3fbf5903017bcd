use std::fmt;
use std::io::{self, BufRead, Read};

use crate::crypto::sym::StreamDecryptor;
use crate::packet::{Decompressor, PacketBodyReader};
use crate::parsing_reader::BufReadParsing;

type Body<'a> = PacketBodyReader<Box<MessageSource<'a>>>;

/// The stack of layers a message is read through.
///
/// Every decryption or decompression wraps the packet body of its enclosing layer, the
/// innermost layer is the one packets are currently read from.
pub(crate) enum MessageSource<'a> {
    Root(Box<dyn BufRead + 'a>),
    Decrypted(StreamDecryptor<Body<'a>>),
    Decompressed(Decompressor<Body<'a>>),
}

impl fmt::Debug for MessageSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root(_) => f.write_str("Root"),
            Self::Decrypted(r) => f.debug_tuple("Decrypted").field(r).finish(),
            Self::Decompressed(r) => f.debug_tuple("Decompressed").field(r).finish(),
        }
    }
}

impl<'a> MessageSource<'a> {
    pub(crate) fn new<R: BufRead + 'a>(source: R) -> Self {
        Self::Root(Box::new(source))
    }

    fn body_mut(&mut self) -> Option<&mut Body<'a>> {
        match self {
            Self::Root(_) => None,
            Self::Decrypted(r) => Some(r.get_mut()),
            Self::Decompressed(r) => Some(r.get_mut()),
        }
    }

    /// Number of layers below the root.
    pub(crate) fn depth(&mut self) -> usize {
        let mut depth = 0;
        let mut current = self;
        while let Some(parent) = current
            .body_mut()
            .and_then(|body| body.get_mut())
            .map(|parent| &mut **parent)
        {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Reads every layer to its end, from the innermost outwards.
    ///
    /// Integrity checks of encrypted layers only run once their data is exhausted, so this is
    /// what surfaces a modification detection failure. The root input is left untouched.
    pub(crate) fn drain_layers(&mut self) -> io::Result<()> {
        if let Self::Root(_) = self {
            return Ok(());
        }
        self.drain()?;
        let Some(body) = self.body_mut() else {
            return Ok(());
        };
        body.drain()?;
        match body.get_mut() {
            Some(parent) => parent.drain_layers(),
            None => Ok(()),
        }
    }
}

impl BufRead for MessageSource<'_> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            Self::Root(r) => r.fill_buf(),
            Self::Decrypted(r) => r.fill_buf(),
            Self::Decompressed(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            Self::Root(r) => r.consume(amt),
            Self::Decrypted(r) => r.consume(amt),
            Self::Decompressed(r) => r.consume(amt),
        }
    }
}

impl Read for MessageSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Root(r) => r.read(buf),
            Self::Decrypted(r) => r.read(buf),
            Self::Decompressed(r) => r.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::packet::PacketHeader;
    use crate::types::{CompressionAlgorithm, Tag};

    #[test]
    fn uncompressed_layer_depth() {
        let _ = pretty_env_logger::try_init();

        // compressed packet, uncompressed algorithm, three bytes of content
        let data = hex!("c8 04 00 616263");
        let mut root = MessageSource::new(&data[..]);
        let header = PacketHeader::try_from_reader(&mut root).unwrap();
        assert_eq!(header.tag(), Tag::CompressedData);

        let mut body = PacketBodyReader::new(header, Box::new(root)).unwrap();
        let alg = CompressionAlgorithm::from(body.read_u8().unwrap());
        let mut layer =
            MessageSource::Decompressed(Decompressor::from_reader(alg, body).unwrap());
        assert_eq!(layer.depth(), 1);

        let mut out = Vec::new();
        layer.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
        layer.drain_layers().unwrap();
    }
}
