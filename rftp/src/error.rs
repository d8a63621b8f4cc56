//! Error types shared by the codec and both session roles.
//!
//! Timeouts and protocol mismatches (a stale ack, a message for another
//! phase) are not errors: the ARQ engine and the server loops recover from
//! them locally and only log them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::message::MessageKind;

/// Errors raised while encoding or decoding a single message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("file name is {0} bytes, the limit is {limit}", limit = crate::message::FILE_NAME_MSS)]
    NameTooLong(usize),
    #[error("payload is {0} bytes, the limit is {limit}", limit = crate::message::DATA_MSS)]
    PayloadTooLarge(usize),
    #[error("datagram is {0} bytes, the limit is {limit}", limit = crate::message::MAX_DATAGRAM)]
    DatagramTooLarge(usize),
    #[error("{kind} message needs {needed} bytes, got {actual}")]
    Truncated {
        kind: MessageKind,
        needed: usize,
        actual: usize,
    },
    #[error("empty datagram")]
    Empty,
    #[error("unknown message type {0}")]
    UnknownKind(u8),
    #[error("invalid ack flag {0}")]
    InvalidAck(u8),
    #[error("invalid sequence number {0}")]
    InvalidSequence(u16),
    #[error("{kind} message declares {declared} bytes but datagram holds {actual}")]
    LengthMismatch {
        kind: MessageKind,
        declared: usize,
        actual: usize,
    },
}

/// Terminal failure of a client or server session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A message this side built itself could not be encoded.
    #[error("encoding error: {0}")]
    Codec(#[from] CodecError),
    /// The underlying socket refused to transmit.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),
    #[error("file error on {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is {size} bytes, the limit is {limit}", path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("{} has no usable file name", path.display())]
    InvalidFileName { path: PathBuf },
    /// Only reachable with a bounded [`crate::arq::RetryPolicy`].
    #[error("no acknowledgment after {0} transmissions")]
    RetriesExhausted(u32),
}

impl SessionError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }
}
