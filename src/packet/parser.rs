use std::io::BufRead;

use log::{debug, warn};

use crate::errors::{Error, Result};
use crate::packet::{Packet, PacketBodyReader, PacketHeader};
use crate::parsing_reader::BufReadParsing;
use crate::types::Tag;

/// Lazily parses packets from a byte source.
///
/// Packets with unsupported contents are reported as `Error::Unsupported`, other
/// broken packet bodies as `Error::InvalidPacketContent`, and parsing continues with
/// the next packet. A framing error is reported once, after which the iteration ends.
#[derive(Debug)]
pub struct PacketParser<R: BufRead> {
    reader: R,
    done: bool,
}

impl<R: BufRead> PacketParser<R> {
    pub fn new(reader: R) -> Self {
        PacketParser {
            reader,
            done: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Reads the next packet.
    ///
    /// The outer error is a framing error, the inner one is scoped to the packet body.
    /// `Ok(None)` is returned for skipped packets.
    fn next_inner(&mut self) -> Result<Option<Result<Packet>>> {
        let header = PacketHeader::try_from_reader(&mut self.reader)?;
        debug!("found header: {:?}", header);

        let mut body = PacketBodyReader::new(header, &mut self.reader)?;
        let res = match header.tag() {
            Tag::Other(tag) => {
                debug!("skipping packet with unknown tag {}", tag);
                None
            }
            _ => Some(Packet::try_from_reader(header, &mut body)),
        };

        // the next header starts after the full body, independent of how much the decoder used
        let skipped = match body.drain() {
            Ok(skipped) => skipped,
            Err(err) => {
                return match res {
                    Some(Err(content_err)) => Err(content_err),
                    _ => Err(Error::from_io(err)),
                };
            }
        };
        if skipped > 0 {
            debug!("skipped {} trailing bytes of {:?}", skipped, header.tag());
        }

        Ok(res)
    }
}

impl<R: BufRead> Iterator for PacketParser<R> {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.reader.has_remaining() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(Error::from_io(err)));
                }
            }

            match self.next_inner() {
                Ok(Some(Ok(packet))) => return Some(Ok(packet)),
                Ok(Some(Err(err))) => {
                    if err.is_unsupported() {
                        warn!("skipping unsupported packet: {}", err);
                        return Some(Err(err));
                    }
                    warn!("skipping invalid packet: {}", err);
                    return Some(Err(Error::InvalidPacketContent {
                        source: Box::new(err),
                    }));
                }
                Ok(None) => continue,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }

        None
    }
}
