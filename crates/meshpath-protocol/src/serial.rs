//! Security-checked encoding between [`Value`] and bytes.
//!
//! Every value is written as a type tag, a length, and a payload:
//!
//! ```text
//! ┌──────────┬──────────────────┬─────────────────────────────┐
//! │ tag (1B) │ length (4B, BE)  │ payload (length bytes)      │
//! └──────────┴──────────────────┴─────────────────────────────┘
//! ```
//!
//! For containers the payload is the concatenated encoding of the
//! elements (or of key, value, key, value... for a mapping), and the
//! length is the byte length of that payload. The whole encoding is
//! wrapped in a 4-byte big-endian total length that counts itself.
//!
//! Decoding treats every length as hostile. A length is compared with the
//! bytes actually available before anything is sliced, a container's
//! children must fill exactly the bytes it declared, and the top-level
//! value must consume the buffer exactly.

use std::collections::BTreeMap;

use num_bigint::{BigInt, Sign};

use crate::{DecodeError, EncodeError, Value};

/// Size of the outer total-length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of a value's type tag.
pub const TAG_SIZE: usize = 1;

/// Size of a value's own length field.
pub const SIZE_FIELD_SIZE: usize = 4;

/// Deepest container nesting the decoder accepts.
///
/// Each level of nesting costs only 5 bytes on the wire, so without a
/// ceiling a single frame could drive the recursive decoder off the end
/// of the stack.
pub const MAX_DEPTH: usize = 1000;

/// The one-byte type tags used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    Str = 0,
    Int = 1,
    Bool = 2,
    List = 3,
    Tuple = 4,
    Map = 5,
}

impl TryFrom<u8> for Tag {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0 => Tag::Str,
            1 => Tag::Int,
            2 => Tag::Bool,
            3 => Tag::List,
            4 => Tag::Tuple,
            5 => Tag::Map,
            other => return Err(DecodeError::UnknownTag(other)),
        })
    }
}

const TRUE_MARKER: u8 = b'1';
const FALSE_MARKER: u8 = b'0';

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes a value, including the outer total-length prefix.
pub fn encode(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut buf = vec![0u8; LENGTH_PREFIX_SIZE];
    write_value(&mut buf, value)?;
    let total = buf.len();
    patch_length(&mut buf, 0, total)?;
    Ok(buf)
}

/// Encodes borrowed items as if they were one `List`, including the outer
/// total-length prefix.
///
/// Produces exactly the bytes `encode(&Value::List(items))` would, without
/// having to move the items into a list first.
pub fn encode_list<'a>(
    items: impl IntoIterator<Item = &'a Value>,
) -> Result<Vec<u8>, EncodeError> {
    let mut buf = vec![0u8; LENGTH_PREFIX_SIZE];
    let start = begin_container(&mut buf, Tag::List);
    for item in items {
        write_value(&mut buf, item)?;
    }
    end_container(&mut buf, start)?;
    let total = buf.len();
    patch_length(&mut buf, 0, total)?;
    Ok(buf)
}

fn write_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), EncodeError> {
    match value {
        Value::Str(s) => write_scalar(buf, Tag::Str, s.as_bytes()),
        Value::Int(i) => write_scalar(buf, Tag::Int, &int_to_bytes(i)),
        Value::Bool(b) => {
            let marker = if *b { TRUE_MARKER } else { FALSE_MARKER };
            write_scalar(buf, Tag::Bool, &[marker])
        }
        Value::List(items) | Value::Tuple(items) => {
            let tag = if matches!(value, Value::List(_)) {
                Tag::List
            } else {
                Tag::Tuple
            };
            let start = begin_container(buf, tag);
            for item in items {
                write_value(buf, item)?;
            }
            end_container(buf, start)
        }
        Value::Map(map) => {
            let start = begin_container(buf, Tag::Map);
            for (k, v) in map {
                write_value(buf, k)?;
                write_value(buf, v)?;
            }
            end_container(buf, start)
        }
    }
}

fn write_scalar(
    buf: &mut Vec<u8>,
    tag: Tag,
    payload: &[u8],
) -> Result<(), EncodeError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| EncodeError::TooLarge(payload.len()))?;
    buf.push(tag as u8);
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(())
}

/// Writes the tag and a placeholder length. Returns the offset of the
/// placeholder so [`end_container`] can fill it in.
fn begin_container(buf: &mut Vec<u8>, tag: Tag) -> usize {
    buf.push(tag as u8);
    let start = buf.len();
    buf.extend_from_slice(&[0u8; SIZE_FIELD_SIZE]);
    start
}

fn end_container(buf: &mut [u8], start: usize) -> Result<(), EncodeError> {
    let payload_len = buf.len() - start - SIZE_FIELD_SIZE;
    patch_length(buf, start, payload_len)
}

fn patch_length(
    buf: &mut [u8],
    at: usize,
    len: usize,
) -> Result<(), EncodeError> {
    let len = u32::try_from(len).map_err(|_| EncodeError::TooLarge(len))?;
    buf[at..at + 4].copy_from_slice(&len.to_be_bytes());
    Ok(())
}

/// Big-endian two's complement, one byte wider than the magnitude needs.
///
/// The extra byte keeps the sign bit unambiguous: `255` is `00 FF`, not
/// `FF` (which would read back as `-1`).
fn int_to_bytes(i: &BigInt) -> Vec<u8> {
    let width = 1 + (i.bits() as usize).div_ceil(8);
    let minimal = i.to_signed_bytes_be();
    let fill = if i.sign() == Sign::Minus { 0xFF } else { 0x00 };
    let mut out = vec![fill; width.saturating_sub(minimal.len())];
    out.extend_from_slice(&minimal);
    out
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes one complete encoding produced by [`encode`].
///
/// The buffer must hold exactly one value: its outer length must match
/// the buffer length, and the value must consume every byte.
pub fn decode(bytes: &[u8]) -> Result<Value, DecodeError> {
    let declared = read_total_length(bytes)?;
    if declared > bytes.len() {
        return Err(DecodeError::Truncated {
            needed: declared,
            available: bytes.len(),
        });
    }
    if declared < bytes.len() {
        return Err(DecodeError::TrailingBytes(bytes.len() - declared));
    }

    let mut reader = Reader::new(&bytes[LENGTH_PREFIX_SIZE..]);
    let value = read_value(&mut reader, 0)?;
    if !reader.is_empty() {
        return Err(DecodeError::TrailingBytes(reader.remaining()));
    }
    Ok(value)
}

/// Reads the outer total-length prefix without validating the rest.
pub fn read_total_length(bytes: &[u8]) -> Result<usize, DecodeError> {
    let prefix: [u8; LENGTH_PREFIX_SIZE] = bytes
        .get(..LENGTH_PREFIX_SIZE)
        .and_then(|p| p.try_into().ok())
        .ok_or(DecodeError::Truncated {
            needed: LENGTH_PREFIX_SIZE,
            available: bytes.len(),
        })?;
    Ok(u32::from_be_bytes(prefix) as usize)
}

/// A cursor over a byte slice that never reads past its end.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(TAG_SIZE)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(SIZE_FIELD_SIZE)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

fn read_value(reader: &mut Reader<'_>, depth: usize) -> Result<Value, DecodeError> {
    let tag = Tag::try_from(reader.read_u8()?)?;
    let len = reader.read_u32()? as usize;
    let payload = reader.take(len)?;

    match tag {
        Tag::Str => std::str::from_utf8(payload)
            .map(|s| Value::Str(s.to_string()))
            .map_err(|_| DecodeError::InvalidUtf8),
        Tag::Int => Ok(Value::Int(BigInt::from_signed_bytes_be(payload))),
        Tag::Bool => match payload {
            [TRUE_MARKER] => Ok(Value::Bool(true)),
            [FALSE_MARKER] => Ok(Value::Bool(false)),
            _ => Err(DecodeError::InvalidBool),
        },
        Tag::List | Tag::Tuple | Tag::Map => {
            if depth >= MAX_DEPTH {
                return Err(DecodeError::TooDeep(MAX_DEPTH));
            }
            let mut inner = Reader::new(payload);
            if tag == Tag::Map {
                let mut map = BTreeMap::new();
                while !inner.is_empty() {
                    let key = read_value(&mut inner, depth + 1)?;
                    let value = read_value(&mut inner, depth + 1)?;
                    if map.insert(key, value).is_some() {
                        return Err(DecodeError::DuplicateKey);
                    }
                }
                return Ok(Value::Map(map));
            }
            let mut items = Vec::new();
            while !inner.is_empty() {
                items.push(read_value(&mut inner, depth + 1)?);
            }
            Ok(if tag == Tag::List {
                Value::List(items)
            } else {
                Value::Tuple(items)
            })
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
