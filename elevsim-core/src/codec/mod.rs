//! Stream framing for `tokio_util::codec::Framed`.
//!
//! The decoder only finds frame boundaries: it locates the start marker,
//! reads the declared length and yields the whole envelope once enough
//! bytes have arrived and the end marker sits where that length says.
//! Checksum and payload validation is left to [`Frame::decode`] so that a
//! corrupt frame costs only itself.
//!
//! ```text
//!   E0 EA 0A 08 | op | len | payload (len bytes) | sum | FF FF FF FF
//!                                                        ^ offset 16 + len
//! ```
//!
//! Anything that fails these checks is skipped byte by byte until the next
//! start marker, so a damaged length never swallows the frames behind it.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::error::ElevsimError;
use crate::frame::{END_MARKER, FRAME_OVERHEAD, Frame, HEADER_SIZE, MAX_PAYLOAD_SIZE, START_MARKER};

#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec {
    /// Bytes discarded while resynchronising, for diagnostics.
    skipped: u64,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skipped_bytes(&self) -> u64 {
        self.skipped
    }

    fn discard(&mut self, src: &mut BytesMut, n: usize) {
        src.advance(n);
        self.skipped += n as u64;
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = ElevsimError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match src.windows(START_MARKER.len()).position(|w| w == START_MARKER) {
                Some(0) => {}
                Some(offset) => {
                    warn!(skipped = offset, "discarding bytes before start marker");
                    self.discard(src, offset);
                }
                None => {
                    // A marker may be split across reads; keep its possible prefix.
                    let keep = START_MARKER.len() - 1;
                    if src.len() > keep {
                        let n = src.len() - keep;
                        warn!(skipped = n, "no start marker in buffered bytes");
                        self.discard(src, n);
                    }
                    return Ok(None);
                }
            }

            if src.len() < HEADER_SIZE {
                src.reserve(HEADER_SIZE - src.len());
                return Ok(None);
            }

            let mut length_field = &src[HEADER_SIZE - 4..HEADER_SIZE];
            let declared = length_field.get_u32() as usize;
            if declared > MAX_PAYLOAD_SIZE {
                warn!(
                    declared,
                    max = MAX_PAYLOAD_SIZE,
                    "declared payload too large, resynchronising"
                );
                self.discard(src, 1);
                continue;
            }

            let total = FRAME_OVERHEAD + declared;
            if src.len() < total {
                src.reserve(total - src.len());
                return Ok(None);
            }
            if src[total - END_MARKER.len()..total] != END_MARKER {
                warn!(declared, "declared length misses the end marker, resynchronising");
                self.discard(src, 1);
                continue;
            }
            return Ok(Some(src.split_to(total).freeze()));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut warned = false;
        loop {
            if let Some(envelope) = self.decode(src)? {
                return Ok(Some(envelope));
            }
            if src.is_empty() {
                return Ok(None);
            }
            // The pending frame can never complete; later frames may still be whole.
            if !warned {
                warn!(remaining = src.len(), "stream ended inside a frame");
                warned = true;
            }
            self.discard(src, 1);
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ElevsimError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_to(dst);
        Ok(())
    }
}
