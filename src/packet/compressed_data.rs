use std::fmt;
use std::io::{self, BufRead, Read};

#[cfg(feature = "bzip2")]
use bzip2::bufread::BzDecoder;
use bytes::Bytes;
use flate2::bufread::{DeflateDecoder, ZlibDecoder};

use crate::errors::{unsupported_err, Result};
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::CompressionAlgorithm;

/// Compressed Data Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.6>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct CompressedData {
    packet_header: PacketHeader,
    compression_algorithm: CompressionAlgorithm,
    #[debug("{} bytes", compressed_data.len())]
    compressed_data: Bytes,
}

impl CompressedData {
    /// Parses a `CompressedData` packet from the given reader.
    pub fn try_from_reader<B: BufRead>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let compression_algorithm = input.read_u8()?.into();
        let compressed_data = input.rest()?;

        Ok(CompressedData {
            packet_header,
            compression_algorithm,
            compressed_data,
        })
    }

    pub fn compression_algorithm(&self) -> CompressionAlgorithm {
        self.compression_algorithm
    }

    pub fn decompress(&self) -> Result<Decompressor<&[u8]>> {
        Decompressor::from_reader(self.compression_algorithm, &self.compressed_data[..])
    }
}

impl Serialize for CompressedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.compression_algorithm.into()])?;
        writer.write_all(&self.compressed_data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + self.compressed_data.len()
    }
}

impl PacketTrait for CompressedData {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

/// Streaming decompression of a compressed body.
pub enum Decompressor<R: BufRead> {
    Uncompressed(R),
    Zip(io::BufReader<DeflateDecoder<R>>),
    Zlib(io::BufReader<ZlibDecoder<R>>),
    #[cfg(feature = "bzip2")]
    Bzip2(io::BufReader<BzDecoder<R>>),
}

impl<R: BufRead> fmt::Debug for Decompressor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Decompressor::Uncompressed(_) => "Uncompressed",
            Decompressor::Zip(_) => "Zip",
            Decompressor::Zlib(_) => "Zlib",
            #[cfg(feature = "bzip2")]
            Decompressor::Bzip2(_) => "Bzip2",
        };
        f.debug_tuple("Decompressor").field(&name).finish()
    }
}

impl<R: BufRead> Decompressor<R> {
    /// Wraps `source`, which is positioned right after the algorithm octet.
    pub fn from_reader(alg: CompressionAlgorithm, source: R) -> Result<Self> {
        let dec = match alg {
            CompressionAlgorithm::Uncompressed => Decompressor::Uncompressed(source),
            CompressionAlgorithm::ZIP => {
                Decompressor::Zip(io::BufReader::new(DeflateDecoder::new(source)))
            }
            CompressionAlgorithm::ZLIB => {
                Decompressor::Zlib(io::BufReader::new(ZlibDecoder::new(source)))
            }
            #[cfg(feature = "bzip2")]
            CompressionAlgorithm::BZip2 => {
                Decompressor::Bzip2(io::BufReader::new(BzDecoder::new(source)))
            }
            #[cfg(not(feature = "bzip2"))]
            CompressionAlgorithm::BZip2 => unsupported_err!("bzip2 compression"),
            CompressionAlgorithm::Other(id) => unsupported_err!("compression algorithm {}", id),
        };

        Ok(dec)
    }

    pub fn get_mut(&mut self) -> &mut R {
        match self {
            Decompressor::Uncompressed(r) => r,
            Decompressor::Zip(r) => r.get_mut().get_mut(),
            Decompressor::Zlib(r) => r.get_mut().get_mut(),
            #[cfg(feature = "bzip2")]
            Decompressor::Bzip2(r) => r.get_mut().get_mut(),
        }
    }

    pub fn into_inner(self) -> R {
        match self {
            Decompressor::Uncompressed(r) => r,
            Decompressor::Zip(r) => r.into_inner().into_inner(),
            Decompressor::Zlib(r) => r.into_inner().into_inner(),
            #[cfg(feature = "bzip2")]
            Decompressor::Bzip2(r) => r.into_inner().into_inner(),
        }
    }
}

impl<R: BufRead> Read for Decompressor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decompressor::Uncompressed(r) => r.read(buf),
            Decompressor::Zip(r) => r.read(buf),
            Decompressor::Zlib(r) => r.read(buf),
            #[cfg(feature = "bzip2")]
            Decompressor::Bzip2(r) => r.read(buf),
        }
    }
}

impl<R: BufRead> BufRead for Decompressor<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            Decompressor::Uncompressed(r) => r.fill_buf(),
            Decompressor::Zip(r) => r.fill_buf(),
            Decompressor::Zlib(r) => r.fill_buf(),
            #[cfg(feature = "bzip2")]
            Decompressor::Bzip2(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            Decompressor::Uncompressed(r) => r.consume(amt),
            Decompressor::Zip(r) => r.consume(amt),
            Decompressor::Zlib(r) => r.consume(amt),
            #[cfg(feature = "bzip2")]
            Decompressor::Bzip2(r) => r.consume(amt),
        }
    }
}
