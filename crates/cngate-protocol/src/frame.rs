use bytes::{Buf, BytesMut};

use crate::constants::{MAX_PAYLOAD_SIZE, SYNC_BYTE};
use crate::error::ProtocolError;

/// Streaming codec for the control node serial framing.
///
/// Every frame is `[SYNC][len][type + payload]` where `len` counts the type
/// byte and the payload. The serial line delivers arbitrary slices, so the
/// codec accumulates bytes and yields frames as they complete. Bytes in
/// front of a sync byte are line noise and are dropped.
pub struct FrameCodec {
    buffer: BytesMut,
}

impl FrameCodec {
    pub fn new() -> Self {
        FrameCodec {
            buffer: BytesMut::new(),
        }
    }

    /// Feed raw bytes from the serial port into the codec.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Pull the next complete frame, without sync or length byte.
    ///
    /// Returns `None` when the buffer holds no complete frame yet; the
    /// partial tail stays buffered for the next `push`.
    pub fn decode(&mut self) -> Option<Vec<u8>> {
        // Drop garbage until a sync byte leads the buffer.
        let mut dropped = 0;
        while !self.buffer.is_empty() && self.buffer[0] != SYNC_BYTE {
            self.buffer.advance(1);
            dropped += 1;
        }
        if dropped > 0 {
            log::debug!("dropped {} bytes before sync", dropped);
        }

        if self.buffer.len() < 2 {
            return None;
        }

        let len = self.buffer[1] as usize;
        if self.buffer.len() < 2 + len {
            return None;
        }

        self.buffer.advance(2);
        let frame = self.buffer.split_to(len).to_vec();
        Some(frame)
    }

    /// Wrap a type + payload slice into a wire frame.
    pub fn encode(payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLong {
                max: MAX_PAYLOAD_SIZE,
                actual: payload.len(),
            });
        }
        let mut frame = Vec::with_capacity(2 + payload.len());
        frame.push(SYNC_BYTE);
        frame.push(payload.len() as u8);
        frame.extend_from_slice(payload);
        Ok(frame)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}
