//! # Frame Codec
//!
//! ## Inbound
//!
//! ```text
//! ┌────────────┬──────────────────────────┐
//! │ u16 BE len │ encrypted payload (len)  │ ...next frame
//! └────────────┴──────────────────────────┘
//! ```
//!
//! TCP delivers bytes, not frames: a read may end in the middle of a
//! payload or even between the two length bytes. [`FrameDecoder`]
//! accumulates chunks and only releases whole frames; whatever is left
//! waits for the next chunk.
//!
//! Payloads of one byte or less can't hold a message tag and are dropped.
//!
//! ## Outbound
//!
//! Commands to the game use a 4-byte prefix instead.

use tracing::trace;

use crate::error::{FrameError, FrameResult};
use crate::{INBOUND_PREFIX_LEN, OUTBOUND_PREFIX_LEN};

/// Shortest payload that can hold a message.
const MIN_PAYLOAD_LEN: usize = 2;

/// Counters for a [`FrameDecoder`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Bytes pushed into the decoder.
    pub bytes: u64,
    /// Frames released.
    pub frames: u64,
    /// Frames dropped for being too short.
    pub discarded: u64,
}

/// Splits a byte stream into inbound frame payloads.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    stats: DecoderStats,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk read from the socket.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        self.stats.bytes += chunk.len() as u64;
    }

    /// Takes the next complete payload, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            let prefix = self.buffer.get(..INBOUND_PREFIX_LEN)?;
            let len = usize::from(u16::from_be_bytes([prefix[0], prefix[1]]));
            let end = INBOUND_PREFIX_LEN + len;
            if self.buffer.len() < end {
                return None;
            }

            let payload: Vec<u8> = self.buffer.drain(..end).skip(INBOUND_PREFIX_LEN).collect();
            if payload.len() < MIN_PAYLOAD_LEN {
                trace!("Discarding {} byte frame", payload.len());
                self.stats.discarded += 1;
                continue;
            }

            self.stats.frames += 1;
            return Some(payload);
        }
    }

    /// Drains every complete payload currently buffered.
    pub fn frames(&mut self) -> impl Iterator<Item = Vec<u8>> + '_ {
        std::iter::from_fn(move || self.next_frame())
    }

    /// Forgets a partial frame, keeping the counters.
    ///
    /// Returns how many buffered bytes were dropped.
    pub fn reset(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }

    /// Bytes waiting for the rest of their frame.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }
}

/// Frames a payload the way the game sends it (2-byte prefix).
///
/// # Errors
///
/// [`FrameError::PayloadTooLarge`] above 65535 bytes.
pub fn encode_inbound_frame(payload: &[u8]) -> FrameResult<Vec<u8>> {
    let len = u16::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        len: payload.len(),
        max: usize::from(u16::MAX),
    })?;

    let mut frame = Vec::with_capacity(INBOUND_PREFIX_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Frames a payload the way the game expects commands (4-byte prefix).
///
/// # Errors
///
/// [`FrameError::PayloadTooLarge`] above `u32::MAX` bytes.
pub fn encode_outbound_frame(payload: &[u8]) -> FrameResult<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(OUTBOUND_PREFIX_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&[0, 3, 1, 2, 3]);

        assert_eq!(decoder.next_frame(), Some(vec![1, 2, 3]));
        assert_eq!(decoder.next_frame(), None);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_several_frames_in_one_chunk() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&[0, 2, 9, 9, 0, 3, 7, 7, 7]);

        let frames: Vec<_> = decoder.frames().collect();

        assert_eq!(frames, vec![vec![9, 9], vec![7, 7, 7]]);
    }

    #[test]
    fn test_partial_payload_is_carried_over() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&[0, 4, 1, 2]);
        assert_eq!(decoder.next_frame(), None);
        assert_eq!(decoder.pending_len(), 4);

        decoder.push(&[3, 4]);
        assert_eq!(decoder.next_frame(), Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_split_length_prefix_is_carried_over() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&[0]);
        assert_eq!(decoder.next_frame(), None);

        decoder.push(&[2, 5, 6]);
        assert_eq!(decoder.next_frame(), Some(vec![5, 6]));
    }

    #[test]
    fn test_reset_drops_partial_frame_only() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&[0, 2, 1, 2, 0, 10, 1, 2, 3]);
        assert_eq!(decoder.next_frame(), Some(vec![1, 2]));

        assert_eq!(decoder.reset(), 5);
        assert_eq!(decoder.pending_len(), 0);
        assert_eq!(decoder.stats().frames, 1);

        decoder.push(&[0, 2, 7, 8]);
        assert_eq!(decoder.next_frame(), Some(vec![7, 8]));
    }

    #[test]
    fn test_short_payloads_are_discarded() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&[0, 0, 0, 1, 42, 0, 2, 1, 2]);

        let frames: Vec<_> = decoder.frames().collect();

        assert_eq!(frames, vec![vec![1, 2]]);
        assert_eq!(decoder.stats().discarded, 2);
        assert_eq!(decoder.stats().frames, 1);
        assert_eq!(decoder.stats().bytes, 9);
    }

    #[test]
    fn test_length_is_big_endian() {
        let payload = vec![0xAB; 300];
        let frame = encode_inbound_frame(&payload).unwrap();

        assert_eq!(&frame[..2], &[0x01, 0x2C]);

        let mut decoder = FrameDecoder::new();
        decoder.push(&frame);
        assert_eq!(decoder.next_frame(), Some(payload));
    }

    #[test]
    fn test_inbound_payload_too_large() {
        let payload = vec![0; 70_000];

        assert_eq!(
            encode_inbound_frame(&payload),
            Err(FrameError::PayloadTooLarge {
                len: 70_000,
                max: 65_535
            })
        );
    }

    #[test]
    fn test_outbound_prefix_is_four_bytes() {
        let frame = encode_outbound_frame(&[1, 2, 3]).unwrap();

        assert_eq!(frame, vec![0, 0, 0, 3, 1, 2, 3]);
    }
}
