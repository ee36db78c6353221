//! Wire protocol for meshpath.
//!
//! This crate defines the "language" that clients and servers speak:
//!
//! - **Values** ([`Value`]): the self-describing data tree carried as
//!   message content.
//! - **Serializer** ([`serial::encode`], [`serial::decode`]): the
//!   tag-length-payload byte encoding, hardened against hostile input.
//! - **Messages** ([`Message`]): version, sender, address, command and
//!   content, encoded as one frame.
//! - **Framer** ([`Framer`]): turns an arbitrary chunked byte stream
//!   back into frames.
//! - **Errors** ([`ProtocolError`], [`DecodeError`], [`FrameError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the service
//! layer. It doesn't know about sockets or services; it only knows how
//! bytes become messages and back.
//!
//! ```text
//! Transport (bytes) → Framer (frames) → Message → Service
//! ```

mod error;
mod framer;
mod message;
pub mod serial;
mod value;

pub use error::{DecodeError, EncodeError, FrameError, ProtocolError};
pub use framer::{DEFAULT_MAX_FRAME_LEN, Framer, FramerState, Inbound, MIN_FRAME_LEN};
pub use message::{KEEP_ALIVE, Message, PROTOCOL_VERSION};
pub use value::Value;
