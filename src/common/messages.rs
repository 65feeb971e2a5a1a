//! Serialize and deserialize overlay wire messages.

use crate::common::{Address, Id, ADDRESS_SIZE};
use crate::{Error, Result};

/// Serialized size of a [Message] on the wire.
pub const MESSAGE_SIZE: usize = 27;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
/// Operation selector of a wire message.
pub enum Opcode {
    /// Request the front of one of the responder's buckets.
    Get = 0,
    /// Liveness check.
    Probe = 1,
    /// Response to any request; `n` carries a [Status].
    Pong = 2,
    /// New-peer announcement.
    Conn = 3,
    /// Departure notice; no reply is expected.
    Close = 4,
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Opcode> {
        match byte {
            0 => Ok(Opcode::Get),
            1 => Ok(Opcode::Probe),
            2 => Ok(Opcode::Pong),
            3 => Ok(Opcode::Conn),
            4 => Ok(Opcode::Close),
            other => Err(Error::UnknownOpcode(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
/// Status code carried in the `n` field of a [Opcode::Pong] reply.
pub enum Status {
    /// The request succeeded and the payload is meaningful.
    Ok = 0,
    /// Structurally absent: an empty bucket, or no closer peer known.
    NotFound = 1,
    /// The request was malformed from the responder's point of view.
    Broken = 2,
    /// The requested key is the responder's own id.
    Local = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A fixed-layout wire message.
///
/// | offset | size | field |
/// |--------|------|-------|
/// | 0      | 1    | op |
/// | 1      | 1    | n: bucket index on a request, [Status] on a response |
/// | 2      | 8    | key, big endian |
/// | 10     | 17   | value, tagged address |
pub struct Message {
    pub op: Opcode,
    pub n: u8,
    pub key: Id,
    pub value: Address,
}

impl Message {
    pub fn new(op: Opcode, n: u8, key: Id, value: Address) -> Message {
        Message { op, n, key, value }
    }

    /// Encode into the fixed 27-byte wire form.
    pub fn to_bytes(&self) -> [u8; MESSAGE_SIZE] {
        let mut bytes = [0u8; MESSAGE_SIZE];

        bytes[0] = self.op as u8;
        bytes[1] = self.n;
        bytes[2..10].copy_from_slice(&self.key.0.to_be_bytes());
        bytes[10..].copy_from_slice(&self.value.to_bytes());

        bytes
    }

    /// Decode a datagram. Trailing bytes beyond the fixed record are
    /// ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Message> {
        if bytes.len() < MESSAGE_SIZE {
            return Err(Error::TruncatedMessage(bytes.len()));
        }

        let op = Opcode::try_from(bytes[0])?;

        let mut key = [0u8; 8];
        key.copy_from_slice(&bytes[2..10]);

        let mut value = [0u8; ADDRESS_SIZE];
        value.copy_from_slice(&bytes[10..MESSAGE_SIZE]);

        Ok(Message {
            op,
            n: bytes[1],
            key: Id(u64::from_be_bytes(key)),
            value: Address::from_bytes(&value),
        })
    }
}
