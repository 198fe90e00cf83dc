//! Frame envelope, the unit of the wire protocol.
//!
//! ```text
//! +------------------+
//! | start (4)        |  E0 EA 0A 08
//! +------------------+
//! | opcode (4)       |  u32 big-endian
//! +------------------+
//! | length (4)       |  u32 payload byte count
//! +------------------+
//! | payload          |  fields in opcode-defined order
//! | (length bytes)   |
//! +------------------+
//! | checksum (4)     |  u32, see `checksum`
//! +------------------+
//! | end (4)          |  FF FF FF FF
//! +------------------+
//! ```
//!
//! Decoding runs four gates in order (start marker, end marker, length,
//! checksum); a frame that fails any of them is rejected whole.

use std::fmt;

use bytes::{Bytes, BytesMut};

use crate::checksum::checksum;
use crate::error::{ElevsimError, Result};
use crate::wire::{self, INT_WIDTH};

/// Sentinel opening every frame.
pub const START_MARKER: [u8; 4] = [0xE0, 0xEA, 0x0A, 0x08];

/// Sentinel closing every frame.
pub const END_MARKER: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

/// Bytes before the payload: start marker, opcode, length.
pub const HEADER_SIZE: usize = START_MARKER.len() + 2 * INT_WIDTH;

/// Bytes after the payload: checksum, end marker.
const TRAILER_SIZE: usize = INT_WIDTH + END_MARKER.len();

/// Everything in a frame that is not payload.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + TRAILER_SIZE;

/// Largest payload accepted from a stream (1 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

// ── Field ────────────────────────────────────────────────────────

/// One payload field, in the order the opcode defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<'a> {
    Int(u32),
    Str(&'a str),
}

impl From<u32> for Field<'_> {
    fn from(v: u32) -> Self {
        Field::Int(v)
    }
}

impl<'a> From<&'a str> for Field<'a> {
    fn from(s: &'a str) -> Self {
        Field::Str(s)
    }
}

// ── Frame ────────────────────────────────────────────────────────

/// A validated frame: opcode plus raw payload.
///
/// The opcode is kept as a raw integer so frames with opcodes this build
/// does not know can still be decoded, reported and discarded.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    opcode: u32,
    payload: Bytes,
}

impl Frame {
    /// Build a frame from an opcode and its ordered fields.
    pub fn new(opcode: impl Into<u32>, fields: &[Field<'_>]) -> Result<Self> {
        let mut payload = BytesMut::new();
        for field in fields {
            match field {
                Field::Int(v) => wire::put_int(&mut payload, *v),
                Field::Str(s) => wire::put_str(&mut payload, s)?,
            }
        }
        Self::from_payload(opcode, payload.freeze())
    }

    /// Wrap an already-encoded payload.
    pub fn from_payload(opcode: impl Into<u32>, payload: Bytes) -> Result<Self> {
        if u32::try_from(payload.len()).is_err() {
            return Err(ElevsimError::PayloadTooLarge {
                size: payload.len(),
                max: u32::MAX as usize,
            });
        }
        Ok(Self {
            opcode: opcode.into(),
            payload,
        })
    }

    pub fn opcode(&self) -> u32 {
        self.opcode
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_len(&self) -> u32 {
        // Bounded by `from_payload`.
        self.payload.len() as u32
    }

    /// The checksum this frame carries on the wire.
    pub fn checksum(&self) -> u32 {
        checksum(self.payload_len(), &self.payload)
    }

    /// Total encoded size.
    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Append the encoded frame to `dst`.
    pub fn encode_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.extend_from_slice(&START_MARKER);
        wire::put_int(dst, self.opcode);
        wire::put_int(dst, self.payload_len());
        dst.extend_from_slice(&self.payload);
        wire::put_int(dst, self.checksum());
        dst.extend_from_slice(&END_MARKER);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_to(&mut buf);
        buf.freeze()
    }

    /// Decode and validate one complete frame.
    ///
    /// `bytes` must hold exactly one frame. No partial frame is ever
    /// returned: every failure is a distinct error.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < START_MARKER.len() || bytes[..START_MARKER.len()] != START_MARKER {
            return Err(ElevsimError::InvalidStartMarker);
        }
        if bytes.len() < START_MARKER.len() + END_MARKER.len()
            || bytes[bytes.len() - END_MARKER.len()..] != END_MARKER
        {
            return Err(ElevsimError::InvalidEndMarker);
        }

        let mut header = &bytes[START_MARKER.len()..];
        let (opcode, declared) = match (wire::get_int(&mut header), wire::get_int(&mut header)) {
            (Ok(opcode), Ok(declared)) => (opcode, declared),
            _ => {
                return Err(ElevsimError::InvalidLength {
                    declared: 0,
                    actual: bytes.len(),
                });
            }
        };
        if u64::from(declared) + FRAME_OVERHEAD as u64 != bytes.len() as u64 {
            return Err(ElevsimError::InvalidLength {
                declared: u64::from(declared),
                actual: bytes.len(),
            });
        }

        let payload_end = HEADER_SIZE + declared as usize;
        let payload = &bytes[HEADER_SIZE..payload_end];
        let mut trailer = &bytes[payload_end..];
        let transmitted = wire::get_int(&mut trailer)?;
        let expected = checksum(declared, payload);
        if transmitted != expected {
            return Err(ElevsimError::InvalidChecksum {
                expected,
                actual: transmitted,
            });
        }

        Ok(Self {
            opcode,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    /// A fresh cursor over the payload fields.
    pub fn reader(&self) -> PayloadReader<'_> {
        PayloadReader {
            rest: &self.payload,
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("opcode", &self.opcode)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

// ── PayloadReader ────────────────────────────────────────────────

/// Read cursor over a frame's payload. Only lives while fields are
/// extracted.
#[derive(Debug)]
pub struct PayloadReader<'a> {
    rest: &'a [u8],
}

impl PayloadReader<'_> {
    pub fn read_int(&mut self) -> Result<u32> {
        wire::get_int(&mut self.rest)
    }

    pub fn read_str(&mut self) -> Result<String> {
        wire::get_str(&mut self.rest)
    }

    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    /// Assert every payload byte was consumed.
    pub fn finish(self) -> Result<()> {
        if !self.rest.is_empty() {
            return Err(ElevsimError::TrailingPayload {
                remaining: self.rest.len(),
            });
        }
        Ok(())
    }
}
