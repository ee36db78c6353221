//! Incremental reassembly of frames from a byte stream.
//!
//! A TCP read hands over whatever bytes happened to arrive: half a frame,
//! three frames and a bit, one byte. The [`Framer`] owns the receive
//! buffer for one connection. Bytes go in with [`Framer::push`], and
//! complete frames come out of [`Framer::next_frame`] or, decoded,
//! [`Framer::next_inbound`].
//!
//! ```text
//!   push(bytes) ──► buffer ──► AwaitingLength ──(4 bytes)──► AwaitingBody
//!                                   ▲                            │
//!                                   └──────(frame extracted)─────┘
//! ```

use crate::serial::{LENGTH_PREFIX_SIZE, SIZE_FIELD_SIZE, TAG_SIZE, read_total_length};
use crate::{FrameError, Message, ProtocolError};

/// Smallest possible frame: the outer prefix plus one empty value.
pub const MIN_FRAME_LEN: usize = LENGTH_PREFIX_SIZE + TAG_SIZE + SIZE_FIELD_SIZE;

/// Default ceiling on a declared frame length (4 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// Where the framer is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    /// Fewer than four bytes buffered; the frame length is not known yet.
    AwaitingLength,
    /// The length prefix is known; waiting for the rest of the frame.
    AwaitingBody {
        /// Total frame length including the prefix.
        frame_len: usize,
    },
}

/// What one complete frame turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// An application message for the service layer.
    Message(Message),
    /// A keep-alive. It only refreshes the activity clock.
    KeepAlive,
    /// The frame was well-delimited but did not decode to a message.
    /// It should be dropped; the stream itself is still in sync.
    Malformed(ProtocolError),
}

/// Receive buffer and frame extractor for one connection.
#[derive(Debug)]
pub struct Framer {
    buffer: Vec<u8>,
    max_frame_len: usize,
}

impl Framer {
    /// Creates a framer with [`DEFAULT_MAX_FRAME_LEN`].
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Creates a framer that rejects frames longer than `max_frame_len`.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_len: max_frame_len.max(MIN_FRAME_LEN),
        }
    }

    /// Appends newly received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes buffered but not yet extracted.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Current state of the state machine.
    pub fn state(&self) -> FramerState {
        match read_total_length(&self.buffer) {
            Ok(frame_len) => FramerState::AwaitingBody { frame_len },
            Err(_) => FramerState::AwaitingLength,
        }
    }

    /// Extracts the next complete frame, if one is buffered.
    ///
    /// Returns `Ok(None)` when more bytes are needed. An absurd length
    /// prefix returns a [`FrameError`]; after that the stream is out of
    /// sync and the connection should be closed.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let FramerState::AwaitingBody { frame_len } = self.state() else {
            return Ok(None);
        };
        if frame_len < MIN_FRAME_LEN {
            return Err(FrameError::TooShort {
                len: frame_len,
                min: MIN_FRAME_LEN,
            });
        }
        if frame_len > self.max_frame_len {
            return Err(FrameError::TooLong {
                len: frame_len,
                max: self.max_frame_len,
            });
        }
        if self.buffer.len() < frame_len {
            return Ok(None);
        }

        let rest = self.buffer.split_off(frame_len);
        Ok(Some(std::mem::replace(&mut self.buffer, rest)))
    }

    /// Extracts and decodes the next complete frame.
    ///
    /// Call in a loop until it returns `Ok(None)`: a single read can
    /// carry several frames.
    pub fn next_inbound(&mut self) -> Result<Option<Inbound>, FrameError> {
        let Some(frame) = self.next_frame()? else {
            return Ok(None);
        };
        Ok(Some(match Message::from_bytes(&frame) {
            Ok(msg) if msg.is_keep_alive() => Inbound::KeepAlive,
            Ok(msg) => Inbound::Message(msg),
            Err(e) => Inbound::Malformed(e),
        }))
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    fn msg(n: i64) -> Message {
        Message::new("alice", "/chat/room1", "APPEND", Value::from(n))
    }

    /// Drains every complete message, skipping keep-alives.
    fn drain(framer: &mut Framer) -> Vec<Message> {
        let mut out = Vec::new();
        while let Some(inbound) = framer.next_inbound().expect("sane frame") {
            if let Inbound::Message(m) = inbound {
                out.push(m);
            }
        }
        out
    }

    #[test]
    fn test_every_split_point_yields_one_message() {
        let original = Message::new("alice", "/chat/room1", "APPEND", "hello");
        let bytes = original.to_bytes().unwrap();
        for split in 0..=bytes.len() {
            let mut framer = Framer::new();
            framer.push(&bytes[..split]);
            let mut got = drain(&mut framer);
            framer.push(&bytes[split..]);
            got.extend(drain(&mut framer));
            assert_eq!(got, vec![original.clone()], "split at {split}");
            assert_eq!(framer.buffered(), 0);
        }
    }

    #[test]
    fn test_one_byte_at_a_time() {
        let stream: Vec<u8> = (0..5)
            .flat_map(|n| msg(n).to_bytes().unwrap())
            .collect();
        let mut framer = Framer::new();
        let mut got = Vec::new();
        for byte in stream {
            framer.push(&[byte]);
            got.extend(drain(&mut framer));
        }
        assert_eq!(got, (0..5).map(msg).collect::<Vec<_>>());
    }

    #[test]
    fn test_all_frames_in_one_read_are_drained() {
        let stream: Vec<u8> = (0..20)
            .flat_map(|n| msg(n).to_bytes().unwrap())
            .collect();
        let mut framer = Framer::new();
        framer.push(&stream);
        assert_eq!(drain(&mut framer), (0..20).map(msg).collect::<Vec<_>>());
    }

    #[test]
    fn test_uneven_chunks_keep_order() {
        let stream: Vec<u8> = (0..12)
            .flat_map(|n| msg(n * 1_000_003).to_bytes().unwrap())
            .collect();
        for chunk in [2, 3, 7, 11, 29, 64] {
            let mut framer = Framer::new();
            let mut got = Vec::new();
            for piece in stream.chunks(chunk) {
                framer.push(piece);
                got.extend(drain(&mut framer));
            }
            let expected: Vec<_> = (0..12).map(|n| msg(n * 1_000_003)).collect();
            assert_eq!(got, expected, "chunk size {chunk}");
        }
    }

    #[test]
    fn test_keep_alives_are_filtered_without_gaps() {
        let mut stream = Vec::new();
        for n in 0..4 {
            stream.extend(Message::keep_alive("alice").to_bytes().unwrap());
            stream.extend(msg(n).to_bytes().unwrap());
            stream.extend(Message::keep_alive("alice").to_bytes().unwrap());
        }
        let mut framer = Framer::new();
        framer.push(&stream);

        let mut kinds = Vec::new();
        while let Some(inbound) = framer.next_inbound().unwrap() {
            kinds.push(inbound);
        }
        assert_eq!(
            kinds.iter().filter(|i| matches!(i, Inbound::KeepAlive)).count(),
            8
        );
        let apps: Vec<_> = kinds
            .into_iter()
            .filter_map(|i| match i {
                Inbound::Message(m) => Some(m),
                _ => None,
            })
            .collect();
        assert_eq!(apps, (0..4).map(msg).collect::<Vec<_>>());
    }

    #[test]
    fn test_malformed_frame_is_skipped_and_stream_stays_in_sync() {
        let bad = crate::serial::encode(&Value::from("not a message")).unwrap();
        let mut framer = Framer::new();
        framer.push(&bad);
        framer.push(&msg(1).to_bytes().unwrap());

        assert!(matches!(
            framer.next_inbound().unwrap(),
            Some(Inbound::Malformed(_))
        ));
        assert_eq!(
            framer.next_inbound().unwrap(),
            Some(Inbound::Message(msg(1)))
        );
        assert_eq!(framer.next_inbound().unwrap(), None);
    }

    #[test]
    fn test_state_transitions() {
        let bytes = msg(1).to_bytes().unwrap();
        let mut framer = Framer::new();
        assert_eq!(framer.state(), FramerState::AwaitingLength);
        framer.push(&bytes[..3]);
        assert_eq!(framer.state(), FramerState::AwaitingLength);
        framer.push(&bytes[3..6]);
        assert_eq!(
            framer.state(),
            FramerState::AwaitingBody { frame_len: bytes.len() }
        );
        framer.push(&bytes[6..]);
        assert!(framer.next_frame().unwrap().is_some());
        assert_eq!(framer.state(), FramerState::AwaitingLength);
    }

    #[test]
    fn test_absurdly_long_prefix_is_an_error() {
        let mut framer = Framer::with_max_frame_len(1024);
        framer.push(&[0x7F, 0xFF, 0xFF, 0xFF]);
        assert_eq!(
            framer.next_frame(),
            Err(FrameError::TooLong { len: 0x7FFF_FFFF, max: 1024 })
        );
    }

    #[test]
    fn test_too_short_prefix_is_an_error() {
        let mut framer = Framer::new();
        framer.push(&[0, 0, 0, 3]);
        assert_eq!(
            framer.next_frame(),
            Err(FrameError::TooShort { len: 3, min: MIN_FRAME_LEN })
        );
    }

    #[test]
    fn test_length_error_is_reported_before_body_arrives() {
        // The prefix alone is enough to know the peer is misbehaving.
        let mut framer = Framer::new();
        framer.push(&(u32::MAX).to_be_bytes());
        assert!(matches!(
            framer.next_inbound(),
            Err(FrameError::TooLong { .. })
        ));
    }
}
