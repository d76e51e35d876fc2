//! Packet layout, header parsing and the streaming decode contract.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{OdbError, Result, StorageError};
use bytes::{Buf, BufMut, Bytes};

/// Size of the fixed packet header in bytes
pub const HEADER_LEN: usize = 16;

/// Requested operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Operation {
    /// Does nothing; answered with an empty `nop`
    Nop = 0,
    /// Store a value under a key, replacing any previous value
    Store = 1,
    /// Query the value stored under a key
    Query = 2,
    /// Store a value under a key that must not exist yet
    Create = 3,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Nop,
        Operation::Store,
        Operation::Query,
        Operation::Create,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Operation::Nop),
            1 => Ok(Operation::Store),
            2 => Ok(Operation::Query),
            3 => Ok(Operation::Create),
            other => Err(OdbError::UnknownOperation(other)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::Nop => "NOP",
            Operation::Store => "STORE",
            Operation::Query => "QUERY",
            Operation::Create => "CREATE",
        }
    }
}

/// How the payload of a packet is to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Datatype {
    /// Payload carries no meaning
    None = 0,
    /// Opaque binary value
    Bytes = 1,
    /// UTF-8 text value
    Text = 2,
    /// Bincode-encoded reply status
    Status = 3,
}

impl Datatype {
    pub const ALL: [Datatype; 4] = [
        Datatype::None,
        Datatype::Bytes,
        Datatype::Text,
        Datatype::Status,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Datatype::None),
            1 => Ok(Datatype::Bytes),
            2 => Ok(Datatype::Text),
            3 => Ok(Datatype::Status),
            other => Err(OdbError::UnknownDatatype(other)),
        }
    }
}

/// Decoded fixed-size header.
///
/// ```text
/// [op u32 LE] [type u32 LE] [length u64 LE] [payload ...]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub op: Operation,
    pub datatype: Datatype,
    pub length: u64,
}

impl Header {
    /// Parse a header from the front of `buf`.
    ///
    /// Returns `Ok(None)` while fewer than [`HEADER_LEN`] bytes are present.
    /// The declared length is checked against `max_payload` here so that a
    /// hostile length is rejected before anything is buffered for it.
    pub fn parse(buf: &[u8], max_payload: usize) -> Result<Option<Header>> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut cursor = &buf[..HEADER_LEN];
        let op = Operation::from_code(cursor.get_u32_le())?;
        let datatype = Datatype::from_code(cursor.get_u32_le())?;
        let length = cursor.get_u64_le();

        if length > max_payload as u64 {
            return Err(OdbError::OversizedPacket(length));
        }

        Ok(Some(Header {
            op,
            datatype,
            length,
        }))
    }

    /// Total frame size (header plus payload)
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.length as usize
    }

    pub fn write_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.op.code());
        dst.put_u32_le(self.datatype.code());
        dst.put_u64_le(self.length);
    }
}

/// Outcome of decoding the front of a byte buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStatus {
    /// A whole packet was present and occupied `consumed` bytes
    Complete { packet: Packet, consumed: usize },
    /// At least `needed` more bytes must arrive before a packet is complete
    Incomplete { needed: usize },
}

/// One framed unit of the wire protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub op: Operation,
    pub datatype: Datatype,
    pub payload: Bytes,
}

impl Packet {
    /// Build a packet, rejecting payloads above the default ceiling
    pub fn new(op: Operation, datatype: Datatype, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(OdbError::OversizedPacket(payload.len() as u64));
        }
        Ok(Self {
            op,
            datatype,
            payload,
        })
    }

    /// Packet with no payload
    pub fn empty(op: Operation, datatype: Datatype) -> Self {
        Self {
            op,
            datatype,
            payload: Bytes::new(),
        }
    }

    pub fn header(&self) -> Header {
        Header {
            op: self.op,
            datatype: self.datatype,
            length: self.payload.len() as u64,
        }
    }

    /// Number of bytes this packet occupies on the wire
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Serialize header and payload into a fresh buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.header().write_to(&mut buf);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode the first packet in `buf` without reading past `buf.len()`.
    ///
    /// `Ok(Incomplete)` means the bytes present are a valid prefix; an `Err`
    /// means they can never become a valid packet.
    pub fn decode(buf: &[u8], max_payload: usize) -> Result<DecodeStatus> {
        let header = match Header::parse(buf, max_payload)? {
            Some(header) => header,
            None => {
                return Ok(DecodeStatus::Incomplete {
                    needed: HEADER_LEN - buf.len(),
                })
            }
        };

        let frame_len = header.frame_len();
        if buf.len() < frame_len {
            return Ok(DecodeStatus::Incomplete {
                needed: frame_len - buf.len(),
            });
        }

        Ok(DecodeStatus::Complete {
            packet: Packet {
                op: header.op,
                datatype: header.datatype,
                payload: Bytes::copy_from_slice(&buf[HEADER_LEN..frame_len]),
            },
            consumed: frame_len,
        })
    }

    /// Decode a buffer that must hold exactly one packet
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        match Self::decode(buf, MAX_PAYLOAD_SIZE)? {
            DecodeStatus::Complete { packet, consumed } if consumed == buf.len() => Ok(packet),
            _ => Err(OdbError::InvalidHeader),
        }
    }
}

/// Encode `(op, datatype, payload)` into wire bytes.
///
/// The destination is reserved fallibly so that an absurd payload surfaces as
/// [`StorageError::AllocationFailed`] instead of aborting the process.
pub fn encode(op: Operation, datatype: Datatype, payload: &[u8]) -> Result<Vec<u8>> {
    let total = HEADER_LEN
        .checked_add(payload.len())
        .ok_or(StorageError::AllocationFailed(usize::MAX))?;

    let mut buf = Vec::new();
    buf.try_reserve_exact(total)
        .map_err(|_| StorageError::AllocationFailed(total))?;

    Header {
        op,
        datatype,
        length: payload.len() as u64,
    }
    .write_to(&mut buf);
    buf.extend_from_slice(payload);
    Ok(buf)
}
