use std::num::TryFromIntError;

use snafu::{Backtrace, Snafu};

use crate::types::KeyId;

pub type Result<T, E = Error> = ::std::result::Result<T, E>;

/// Error types
#[derive(Debug, Snafu)]
pub enum Error {
    /// Malformed framing or packet contents.
    #[snafu(display("structural error: {message}"))]
    Structural { message: String },
    /// Signals packet versions and algorithms we don't support, scoped to a single packet.
    #[snafu(display("unsupported: {message}"))]
    Unsupported { message: String },
    /// A packet body failed to parse while its framing was intact.
    #[snafu(display("invalid packet content: {source}"))]
    InvalidPacketContent { source: Box<Error> },
    /// The caller handed in data of the wrong kind.
    #[snafu(display("invalid argument: {message}"))]
    InvalidArgument { message: String },
    #[snafu(display("deprecated key algorithm: {algorithm}"))]
    DeprecatedKey { algorithm: String },
    #[snafu(display("key incorrect"))]
    KeyIncorrect,
    #[snafu(display("signature made by unknown entity {key_id:?}"))]
    UnknownIssuer { key_id: Option<KeyId> },
    #[snafu(display("signature by {key_id:?} does not verify"))]
    SignatureMismatch { key_id: Option<KeyId> },
    #[snafu(display("modification detection code error"))]
    MdcError,
    #[snafu(display("gnu dummy key has no secret material"))]
    DummyKey,
    #[snafu(display("invalid key length"))]
    InvalidKeyLength,
    #[snafu(display("io error: {source}"))]
    IO {
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(transparent)]
    Rsa { source: rsa::errors::Error },
    #[snafu(transparent)]
    Signature { source: signature::Error },
    #[snafu(transparent)]
    EllipticCurve { source: elliptic_curve::Error },
    #[snafu(transparent)]
    Base64Decode { source: base64::DecodeError },
    #[snafu(transparent)]
    TryFromInt { source: TryFromIntError },
}

impl Error {
    /// Converts an I/O error into a crate error.
    ///
    /// Crate errors which travelled through a `std::io::Read` implementation are unwrapped,
    /// running out of input is reported as a structural error.
    pub(crate) fn from_io(err: std::io::Error) -> Self {
        if err.get_ref().map(|e| e.is::<Error>()).unwrap_or(false) {
            let inner = err.into_inner().map(|e| e.downcast::<Error>());
            return match inner {
                Some(Ok(err)) => *err,
                Some(Err(other)) => Error::Structural {
                    message: other.to_string(),
                },
                None => Error::Structural {
                    message: "io error".to_string(),
                },
            };
        }
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return Error::Structural {
                message: format!("unexpected end of input: {err}"),
            };
        }
        Error::IO {
            source: err,
            backtrace: Backtrace::capture(),
        }
    }

    /// Wraps this error so it can be returned from `std::io::Read` implementations.
    pub(crate) fn into_io(self) -> std::io::Error {
        match self {
            Error::IO { source, .. } => source,
            err => std::io::Error::other(err),
        }
    }

    /// Is this an `Unsupported` error.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported { .. })
    }

    /// Is this error confined to a single packet, so parsing can go on after it.
    pub fn is_packet_scoped(&self) -> bool {
        matches!(
            self,
            Error::Unsupported { .. } | Error::InvalidPacketContent { .. }
        )
    }
}

impl From<cipher::InvalidLength> for Error {
    fn from(_: cipher::InvalidLength) -> Error {
        Error::InvalidKeyLength
    }
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(err: derive_builder::UninitializedFieldError) -> Error {
        Error::InvalidArgument {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::from_io(err)
    }
}

macro_rules! unsupported_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unsupported { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unsupported { message: format!($fmt, $($arg)+) })
    };
}

macro_rules! bail {
    ($e:expr) => {
        return Err($crate::errors::Error::Structural { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Structural { message: format!($fmt, $($arg)+) })
    };
}

macro_rules! format_err {
    ($e:expr) => {
        $crate::errors::Error::Structural { message: $e.to_string() }
    };
    ($fmt:expr, $($arg:tt)+) => {
        $crate::errors::Error::Structural { message: format!($fmt, $($arg)+) }
    };
}

macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            $crate::errors::bail!($e);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)+) => {
        if !($cond) {
            $crate::errors::bail!($fmt, $($arg)+);
        }
    };
}

macro_rules! ensure_eq {
    ($left:expr, $right:expr) => ({
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::errors::bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`"#, left_val, right_val)
                }
            }
        }
    });
    ($left:expr, $right:expr, $($arg:tt)+) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::errors::bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`: {}"#, left_val, right_val,
                           format_args!($($arg)+))
                }
            }
        }
    });
}

pub(crate) use {bail, ensure, ensure_eq, format_err, unsupported_err};
