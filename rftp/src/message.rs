//! Wire-format definitions for RFTP messages.
//!
//! Every datagram exchanged between client and server is one [`Message`],
//! serialised into an [`Envelope`].  This module is responsible for:
//! - Defining the on-wire binary layout of Init, Term and Data messages.
//! - Encoding a [`Message`] into a fixed-capacity [`Envelope`].
//! - Decoding an [`Envelope`] back into a [`Message`], classifying it as
//!   control or data by its `type` byte.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//! Control (Init = 1, Term = 2)           Data (type = 3)
//! +------+-----+---------+               +------+-----+---------+
//! | type | ack |   seq   |               | type | ack |   seq   |
//! +------+-----+---------+               +------+-----+---------+
//! |      file size       |               |    payload length    |
//! +----------------------+               +----------------------+
//! |   file name length   |               |  payload (<= 1464)   |
//! +----------------------+               +----------------------+
//! |  file name (<= 1460) |
//! +----------------------+
//! ```
//!
//! Control header: [`CONTROL_HEADER_LEN`] = 12 bytes.
//! Data header: [`DATA_HEADER_LEN`] = 8 bytes.
//! Either way a datagram never exceeds [`MAX_DATAGRAM`] = 1472 bytes.

use std::fmt;

use crate::error::CodecError;

/// Largest file name a control message can carry.
pub const FILE_NAME_MSS: usize = 1460;
/// Largest payload a data message can carry.
pub const DATA_MSS: usize = 1464;
/// Largest datagram either side ever sends.
pub const MAX_DATAGRAM: usize = 1472;

pub const CONTROL_HEADER_LEN: usize = 12;
pub const DATA_HEADER_LEN: usize = 8;

const TYPE_INIT: u8 = 1;
const TYPE_TERM: u8 = 2;
const TYPE_DATA: u8 = 3;

const NAK: u8 = 0;
const ACK: u8 = 1;

// Byte offsets within the serialised header.
const OFF_TYPE: usize = 0;
const OFF_ACK: usize = 1;
const OFF_SEQ: usize = 2;
const OFF_SIZE: usize = 4;
const OFF_NAME_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Sequence bit
// ---------------------------------------------------------------------------

/// The one-bit alternating sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Seq {
    #[default]
    Zero,
    One,
}

impl Seq {
    /// The other sequence value.
    pub fn flip(self) -> Self {
        match self {
            Seq::Zero => Seq::One,
            Seq::One => Seq::Zero,
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Seq::Zero => 0,
            Seq::One => 1,
        }
    }
}

impl TryFrom<u16> for Seq {
    type Error = CodecError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Seq::Zero),
            1 => Ok(Seq::One),
            other => Err(CodecError::InvalidSequence(other)),
        }
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

// ---------------------------------------------------------------------------
// Message shapes
// ---------------------------------------------------------------------------

/// The three message kinds that appear in the `type` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Init,
    Term,
    Data,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageKind::Init => "INIT",
            MessageKind::Term => "TERM",
            MessageKind::Data => "DATA",
        })
    }
}

/// Which end of the session a control message marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Init,
    Term,
}

/// Session initiation or termination request (or its acknowledgment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    pub kind: ControlKind,
    pub acknowledged: bool,
    /// Always [`Seq::Zero`] for Init; for Term, the sequence number the next
    /// data message would have used.
    pub seq: Seq,
    pub file_size: u32,
    pub file_name: Vec<u8>,
}

impl ControlMessage {
    pub fn init(file_size: u32, file_name: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: ControlKind::Init,
            acknowledged: false,
            seq: Seq::Zero,
            file_size,
            file_name: file_name.into(),
        }
    }

    pub fn term(seq: Seq, file_size: u32, file_name: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: ControlKind::Term,
            acknowledged: false,
            seq,
            file_size,
            file_name: file_name.into(),
        }
    }

    /// The file name as UTF-8, if it is valid UTF-8.
    pub fn file_name_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.file_name).ok()
    }

    fn encode(&self) -> Result<Envelope, CodecError> {
        let name_len = self.file_name.len();
        if name_len > FILE_NAME_MSS {
            return Err(CodecError::NameTooLong(name_len));
        }

        let mut env = Envelope::new();
        let buf = &mut env.buf;
        buf[OFF_TYPE] = match self.kind {
            ControlKind::Init => TYPE_INIT,
            ControlKind::Term => TYPE_TERM,
        };
        buf[OFF_ACK] = if self.acknowledged { ACK } else { NAK };
        buf[OFF_SEQ..OFF_SEQ + 2].copy_from_slice(&self.seq.as_u16().to_be_bytes());
        buf[OFF_SIZE..OFF_SIZE + 4].copy_from_slice(&self.file_size.to_be_bytes());
        buf[OFF_NAME_LEN..OFF_NAME_LEN + 4].copy_from_slice(&(name_len as u32).to_be_bytes());
        buf[CONTROL_HEADER_LEN..CONTROL_HEADER_LEN + name_len].copy_from_slice(&self.file_name);
        env.len = CONTROL_HEADER_LEN + name_len;
        Ok(env)
    }

    fn decode(kind: ControlKind, buf: &[u8]) -> Result<Self, CodecError> {
        let message_kind = match kind {
            ControlKind::Init => MessageKind::Init,
            ControlKind::Term => MessageKind::Term,
        };
        if buf.len() < CONTROL_HEADER_LEN {
            return Err(CodecError::Truncated {
                kind: message_kind,
                needed: CONTROL_HEADER_LEN,
                actual: buf.len(),
            });
        }

        let (acknowledged, seq) = decode_ack_and_seq(buf)?;
        let file_size = read_u32(buf, OFF_SIZE);
        let name_len = read_u32(buf, OFF_NAME_LEN) as usize;
        if name_len > FILE_NAME_MSS {
            return Err(CodecError::NameTooLong(name_len));
        }
        let declared = CONTROL_HEADER_LEN + name_len;
        if buf.len() != declared {
            return Err(CodecError::LengthMismatch {
                kind: message_kind,
                declared,
                actual: buf.len(),
            });
        }

        Ok(Self {
            kind,
            acknowledged,
            seq,
            file_size,
            file_name: buf[CONTROL_HEADER_LEN..].to_vec(),
        })
    }
}

/// One chunk of file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataMessage {
    pub acknowledged: bool,
    pub seq: Seq,
    pub payload: Vec<u8>,
}

impl DataMessage {
    pub fn new(seq: Seq, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            acknowledged: false,
            seq,
            payload: payload.into(),
        }
    }

    fn encode(&self) -> Result<Envelope, CodecError> {
        let payload_len = self.payload.len();
        if payload_len > DATA_MSS {
            return Err(CodecError::PayloadTooLarge(payload_len));
        }

        let mut env = Envelope::new();
        let buf = &mut env.buf;
        buf[OFF_TYPE] = TYPE_DATA;
        buf[OFF_ACK] = if self.acknowledged { ACK } else { NAK };
        buf[OFF_SEQ..OFF_SEQ + 2].copy_from_slice(&self.seq.as_u16().to_be_bytes());
        buf[OFF_SIZE..OFF_SIZE + 4].copy_from_slice(&(payload_len as u32).to_be_bytes());
        buf[DATA_HEADER_LEN..DATA_HEADER_LEN + payload_len].copy_from_slice(&self.payload);
        env.len = DATA_HEADER_LEN + payload_len;
        Ok(env)
    }

    fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < DATA_HEADER_LEN {
            return Err(CodecError::Truncated {
                kind: MessageKind::Data,
                needed: DATA_HEADER_LEN,
                actual: buf.len(),
            });
        }

        let (acknowledged, seq) = decode_ack_and_seq(buf)?;
        let payload_len = read_u32(buf, OFF_SIZE) as usize;
        if payload_len > DATA_MSS {
            return Err(CodecError::PayloadTooLarge(payload_len));
        }
        let declared = DATA_HEADER_LEN + payload_len;
        if buf.len() != declared {
            return Err(CodecError::LengthMismatch {
                kind: MessageKind::Data,
                declared,
                actual: buf.len(),
            });
        }

        Ok(Self {
            acknowledged,
            seq,
            payload: buf[DATA_HEADER_LEN..].to_vec(),
        })
    }
}

/// A decoded RFTP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Control(ControlMessage),
    Data(DataMessage),
}

impl Message {
    /// Serialise into an [`Envelope`].
    ///
    /// Fails when the file name or payload is longer than its segment allows.
    pub fn encode(&self) -> Result<Envelope, CodecError> {
        match self {
            Message::Control(ctrl) => ctrl.encode(),
            Message::Data(data) => data.encode(),
        }
    }

    /// Parse an [`Envelope`] into a [`Message`].
    ///
    /// Returns [`Err`] if:
    /// - the `type`, `ack` or `seq` field holds a value the protocol never sends,
    /// - the datagram is shorter than the header for its declared kind, or
    /// - the declared variable length disagrees with the datagram length.
    pub fn decode(envelope: &Envelope) -> Result<Self, CodecError> {
        let buf = envelope.as_bytes();
        match buf.first() {
            None => Err(CodecError::Empty),
            Some(&TYPE_INIT) => {
                ControlMessage::decode(ControlKind::Init, buf).map(Message::Control)
            }
            Some(&TYPE_TERM) => {
                ControlMessage::decode(ControlKind::Term, buf).map(Message::Control)
            }
            Some(&TYPE_DATA) => DataMessage::decode(buf).map(Message::Data),
            Some(&other) => Err(CodecError::UnknownKind(other)),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Control(ctrl) => match ctrl.kind {
                ControlKind::Init => MessageKind::Init,
                ControlKind::Term => MessageKind::Term,
            },
            Message::Data(_) => MessageKind::Data,
        }
    }

    pub fn seq(&self) -> Seq {
        match self {
            Message::Control(ctrl) => ctrl.seq,
            Message::Data(data) => data.seq,
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        match self {
            Message::Control(ctrl) => ctrl.acknowledged,
            Message::Data(data) => data.acknowledged,
        }
    }

    /// This message with its ack flag set, i.e. the echo a receiver sends back.
    pub fn acknowledged(mut self) -> Self {
        match &mut self {
            Message::Control(ctrl) => ctrl.acknowledged = true,
            Message::Data(data) => data.acknowledged = true,
        }
        self
    }

    /// `true` when `self` is an acknowledgment of `original`: same kind, same
    /// sequence number, ack flag set.
    pub fn acknowledges(&self, original: &Message) -> bool {
        self.is_acknowledged() && self.kind() == original.kind() && self.seq() == original.seq()
    }
}

impl From<ControlMessage> for Message {
    fn from(ctrl: ControlMessage) -> Self {
        Message::Control(ctrl)
    }
}

impl From<DataMessage> for Message {
    fn from(data: DataMessage) -> Self {
        Message::Data(data)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ack = if self.is_acknowledged() { "ACK" } else { "NAK" };
        match self {
            Message::Control(_) => write!(f, "{}[{}] {ack}", self.kind(), self.seq()),
            Message::Data(data) => {
                write!(f, "DATA[{}] ({} B) {ack}", data.seq, data.payload.len())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The unit handed to and from the transport: a length plus a buffer sized to
/// the largest datagram.
#[derive(Clone)]
pub struct Envelope {
    len: usize,
    buf: [u8; MAX_DATAGRAM],
}

impl Envelope {
    /// An empty envelope, ready to receive into.
    pub fn new() -> Self {
        Self {
            len: 0,
            buf: [0u8; MAX_DATAGRAM],
        }
    }

    /// Copy raw datagram bytes into a new envelope.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() > MAX_DATAGRAM {
            return Err(CodecError::DatagramTooLarge(bytes.len()));
        }
        let mut env = Self::new();
        env.buf[..bytes.len()].copy_from_slice(bytes);
        env.len = bytes.len();
        Ok(env)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The whole buffer, for a transport to receive into.  Follow with
    /// [`Envelope::set_len`].
    pub fn recv_buffer(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Record how many bytes of the buffer are valid (clamped to capacity).
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(MAX_DATAGRAM);
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("len", &self.len)
            .field("bytes", &self.as_bytes())
            .finish()
    }
}

impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Envelope {}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn decode_ack_and_seq(buf: &[u8]) -> Result<(bool, Seq), CodecError> {
    let acknowledged = match buf[OFF_ACK] {
        NAK => false,
        ACK => true,
        other => return Err(CodecError::InvalidAck(other)),
    };
    let seq = Seq::try_from(u16::from_be_bytes([buf[OFF_SEQ], buf[OFF_SEQ + 1]]))?;
    Ok((acknowledged, seq))
}

/// Caller guarantees `buf` holds at least `off + 4` bytes.
fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: Message) {
        let env = msg.encode().unwrap();
        assert_eq!(Message::decode(&env).unwrap(), msg);
    }

    #[test]
    fn control_and_data_roundtrip() {
        roundtrip(ControlMessage::init(5000, "report.pdf").into());
        roundtrip(ControlMessage::term(Seq::One, 0, "").into());
        let longest_name = ControlMessage::init(u32::MAX, vec![b'x'; FILE_NAME_MSS]);
        roundtrip(Message::from(longest_name).acknowledged());
        roundtrip(DataMessage::new(Seq::One, vec![0xab; DATA_MSS]).into());
        roundtrip(Message::from(DataMessage::new(Seq::Zero, b"".to_vec())).acknowledged());
    }

    #[test]
    fn init_wire_layout_is_big_endian() {
        let env = Message::from(ControlMessage::init(0x0102_0304, "ab")).encode().unwrap();
        assert_eq!(
            env.as_bytes(),
            &[1, 0, 0, 0, 0x01, 0x02, 0x03, 0x04, 0, 0, 0, 2, b'a', b'b']
        );
    }

    #[test]
    fn data_wire_layout() {
        let msg = Message::from(DataMessage::new(Seq::One, b"xyz".to_vec())).acknowledged();
        let env = msg.encode().unwrap();
        assert_eq!(env.as_bytes(), &[3, 1, 0, 1, 0, 0, 0, 3, b'x', b'y', b'z']);
        assert_eq!(env.len(), DATA_HEADER_LEN + 3);
    }

    #[test]
    fn full_segments_fill_the_datagram() {
        let ctrl = Message::from(ControlMessage::init(1, vec![b'n'; FILE_NAME_MSS]));
        let data = Message::from(DataMessage::new(Seq::One, vec![0u8; DATA_MSS]));
        assert_eq!(ctrl.encode().unwrap().len(), MAX_DATAGRAM);
        assert_eq!(data.encode().unwrap().len(), MAX_DATAGRAM);
    }

    #[test]
    fn oversized_name_or_payload_fails_to_encode() {
        let ctrl = Message::from(ControlMessage::init(1, vec![b'n'; FILE_NAME_MSS + 1]));
        assert_eq!(ctrl.encode(), Err(CodecError::NameTooLong(FILE_NAME_MSS + 1)));

        let data = Message::from(DataMessage::new(Seq::One, vec![0u8; DATA_MSS + 1]));
        assert_eq!(data.encode(), Err(CodecError::PayloadTooLarge(DATA_MSS + 1)));
    }

    #[test]
    fn decode_empty_envelope_returns_error() {
        assert_eq!(Message::decode(&Envelope::new()), Err(CodecError::Empty));
    }

    #[test]
    fn decode_short_headers_return_error() {
        let env = Envelope::from_bytes(&[1, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(
            Message::decode(&env),
            Err(CodecError::Truncated {
                kind: MessageKind::Init,
                needed: CONTROL_HEADER_LEN,
                actual: 6
            })
        );

        let env = Envelope::from_bytes(&[3, 0, 0, 1]).unwrap();
        assert!(matches!(
            Message::decode(&env),
            Err(CodecError::Truncated { kind: MessageKind::Data, .. })
        ));
    }

    #[test]
    fn decode_truncated_payload_returns_error() {
        let env = Message::from(DataMessage::new(Seq::Zero, b"data".to_vec())).encode().unwrap();
        let short = Envelope::from_bytes(&env.as_bytes()[..env.len() - 1]).unwrap();
        assert_eq!(
            Message::decode(&short),
            Err(CodecError::LengthMismatch {
                kind: MessageKind::Data,
                declared: DATA_HEADER_LEN + 4,
                actual: DATA_HEADER_LEN + 3
            })
        );
    }

    #[test]
    fn decode_rejects_values_the_protocol_never_sends() {
        let env = Envelope::from_bytes(&[9, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(Message::decode(&env), Err(CodecError::UnknownKind(9)));

        let env = Envelope::from_bytes(&[3, 2, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(Message::decode(&env), Err(CodecError::InvalidAck(2)));

        let env = Envelope::from_bytes(&[3, 0, 0, 2, 0, 0, 0, 0]).unwrap();
        assert_eq!(Message::decode(&env), Err(CodecError::InvalidSequence(2)));
    }

    #[test]
    fn envelope_rejects_oversized_datagram() {
        assert_eq!(
            Envelope::from_bytes(&[0u8; MAX_DATAGRAM + 1]),
            Err(CodecError::DatagramTooLarge(MAX_DATAGRAM + 1))
        );
    }

    #[test]
    fn ack_predicate_requires_kind_seq_and_flag() {
        let sent = Message::from(DataMessage::new(Seq::One, b"abc".to_vec()));
        assert!(sent.clone().acknowledged().acknowledges(&sent));
        assert!(!sent.acknowledges(&sent), "unacked echo must not match");

        let wrong_seq = Message::from(DataMessage::new(Seq::Zero, b"abc".to_vec())).acknowledged();
        assert!(!wrong_seq.acknowledges(&sent));

        let wrong_kind = Message::from(ControlMessage::term(Seq::One, 3, "f")).acknowledged();
        assert!(!wrong_kind.acknowledges(&sent));
    }

    #[test]
    fn seq_flips() {
        assert_eq!(Seq::Zero.flip(), Seq::One);
        assert_eq!(Seq::One.flip().flip(), Seq::One);
    }

    #[test]
    fn display_matches_verbose_form() {
        let init = Message::from(ControlMessage::init(10, "f")).acknowledged();
        assert_eq!(init.to_string(), "INIT[0] ACK");
        let data = Message::from(DataMessage::new(Seq::One, vec![0u8; 1464]));
        assert_eq!(data.to_string(), "DATA[1] (1464 B) NAK");
    }
}
