use std::io::{self, Read};

use log::debug;

use super::source::MessageSource;
use crate::composed::KeyRef;
use crate::crypto::hash::Hasher;
use crate::errors::{bail, format_err, Error, Result};
use crate::packet::{
    LiteralDataHeader, OnePassSignature, Packet, PacketBodyReader, PacketHeader, PacketTrait,
    Signature,
};
use crate::parsing_reader::BufReadParsing;
use crate::types::KeyId;
use crate::util::CanonicalLines;

/// The signature a message announced before its literal data.
#[derive(Debug, Default)]
pub(crate) enum PendingSignature {
    #[default]
    None,
    /// The signature packet follows the literal data.
    OnePass(OnePassSignature),
    /// The signature packet preceded the literal data.
    Prefixed(Signature),
}

/// What is known about a message, and a reader over its literal contents.
///
/// Everything but the signature result is known once [`read_message`] returns. The signature
/// can only be checked after all literal data was read, so `signature` and `signature_error`
/// are filled in when reading hits the end of the body. An integrity failure of an encrypted
/// layer is returned from that final read instead.
///
/// [`read_message`]: crate::composed::read_message
#[derive(derive_more::Debug)]
pub struct MessageDetails<'a> {
    pub is_encrypted: bool,
    pub is_symmetrically_encrypted: bool,
    /// Recipients named by the message, the wildcard id included.
    pub encrypted_to_key_ids: Vec<KeyId>,
    /// The key that decrypted the session key, `None` if a passphrase did.
    pub decrypted_with: Option<KeyId>,
    pub is_signed: bool,
    pub signed_by_key_id: Option<KeyId>,
    /// The signing key if it is in the key ring and allowed to sign.
    pub signed_by: Option<KeyRef<'a>>,
    pub literal_data: LiteralDataHeader,
    pub signature: Option<Signature>,
    pub signature_error: Option<Error>,
    #[debug(skip)]
    pub(crate) body: Option<PacketBodyReader<MessageSource<'a>>>,
    #[debug(skip)]
    pub(crate) hasher: Option<Hasher>,
    #[debug(skip)]
    pub(crate) canonical: Option<CanonicalLines>,
    pub(crate) pending: PendingSignature,
}

impl MessageDetails<'_> {
    /// Reads the remaining literal data.
    pub fn read_body(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.read_to_end(&mut out)?;
        Ok(out)
    }

    /// Has the literal data been read to its end.
    pub fn is_done(&self) -> bool {
        self.body.is_none()
    }

    /// Did the message carry a signature that verified.
    pub fn is_verified(&self) -> bool {
        self.is_done() && self.signature.is_some() && self.signature_error.is_none()
    }

    fn hash(&mut self, data: &[u8]) {
        let Some(hasher) = self.hasher.as_mut() else {
            return;
        };
        match self.canonical.as_mut() {
            Some(lines) => lines.feed(data, |b| hasher.update(b)),
            None => hasher.update(data),
        }
    }

    fn finish(&mut self, body: PacketBodyReader<MessageSource<'_>>) -> Result<()> {
        let mut layer = body.into_inner()?;
        let signature = match std::mem::take(&mut self.pending) {
            PendingSignature::None => None,
            PendingSignature::OnePass(_) => Some(read_trailing_signature(&mut layer)),
            PendingSignature::Prefixed(sig) => Some(Ok(sig)),
        };

        // integrity errors win over the signature result
        layer.drain_layers()?;

        if let Some(signature) = signature {
            self.check_signature(signature);
        }
        Ok(())
    }

    fn check_signature(&mut self, signature: Result<Signature>) {
        let sig = match signature {
            Ok(sig) => sig,
            Err(err) => {
                debug!("no usable signature: {}", err);
                self.signature_error = Some(err);
                return;
            }
        };

        let result = match (self.signed_by, self.hasher.take()) {
            (Some(key), Some(hasher)) => sig.verify_hasher(key.public_key, hasher),
            (None, _) => Err(Error::UnknownIssuer {
                key_id: self.signed_by_key_id,
            }),
            (Some(_), None) => Err(format_err!("signed data was not hashed")),
        };
        if let Err(err) = &result {
            debug!("message signature rejected: {}", err);
        }

        self.signature_error = result.err();
        self.signature = Some(sig);
    }
}

impl Read for MessageDetails<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let Some(body) = self.body.as_mut() else {
            return Ok(0);
        };

        let read = body.read(buf)?;
        if read > 0 {
            self.hash(&buf[..read]);
            return Ok(read);
        }

        if let Some(body) = self.body.take() {
            self.finish(body).map_err(Error::into_io)?;
        }
        Ok(0)
    }
}

/// Reads the signature packet that closes a one pass signed message.
fn read_trailing_signature(source: &mut MessageSource<'_>) -> Result<Signature> {
    loop {
        if !source.has_remaining()? {
            bail!("missing signature packet");
        }
        let header = PacketHeader::try_from_reader(&mut *source)?;
        let mut body = PacketBodyReader::new(header, &mut *source)?;
        let packet = Packet::try_from_reader(header, &mut body)?;
        body.drain()?;

        match packet {
            Packet::Signature(sig) => return Ok(sig),
            Packet::Marker(_) => {}
            packet => bail!("expected a signature packet, found {:?}", packet.tag()),
        }
    }
}
