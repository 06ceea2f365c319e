//! msgpack-rpc codec for TCP streams
//!
//! Messages are bare msgpack arrays with no length prefix:
//! ```text
//! request      [ 0, msgid, method, params ]
//! response     [ 1, msgid, error, result ]
//! notification [ 2, method, params ]
//! ```
//!
//! Frame boundaries are found by parsing, so a partial value in the buffer
//! means more data is needed.

use bytes::{Buf, Bytes, BytesMut};
use rmpv::Value;
use serde::Serialize;
use thiserror::Error;

/// Maximum message size (64 MB); uncompressed camera frames are large
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Empty parameter list; encodes as `[]`, which servers expect instead of nil
pub const NO_PARAMS: [u8; 0] = [];

const REQUEST: u64 = 0;
const RESPONSE: u64 = 1;
const NOTIFICATION: u64 = 2;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("Malformed rpc message: {0}")]
    Malformed(String),

    #[error("msgpack decode error: {0}")]
    DecodeError(#[from] rmpv::decode::Error),

    #[error("msgpack encode error: {0}")]
    EncodeError(#[from] rmp_serde::encode::Error),
}

/// A decoded rpc message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request {
        msgid: u32,
        method: String,
        params: Vec<Value>,
    },
    Response {
        msgid: u32,
        /// `None` when the server reported nil as the error slot
        error: Option<Value>,
        result: Value,
    },
    Notification {
        method: String,
        params: Vec<Value>,
    },
}

/// Encode a request; `params` must serialize as a sequence (use a tuple)
pub fn encode_request<P: Serialize>(msgid: u32, method: &str, params: &P) -> Result<Bytes, CodecError> {
    encode_checked(&(REQUEST, msgid, method, params))
}

/// Encode a response carrying either an error or a result
pub fn encode_response<R: Serialize>(
    msgid: u32,
    error: Option<&str>,
    result: &R,
) -> Result<Bytes, CodecError> {
    encode_checked(&(RESPONSE, msgid, error, result))
}

fn encode_checked<T: Serialize>(message: &T) -> Result<Bytes, CodecError> {
    // Structs go out as maps keyed by field name
    let buf = rmp_serde::to_vec_named(message)?;

    if buf.len() > MAX_MESSAGE_SIZE {
        return Err(CodecError::MessageTooLarge(buf.len()));
    }

    Ok(Bytes::from(buf))
}

/// Try to decode one message from the front of a buffer
///
/// Returns:
/// - `Ok(Some(message))` if a complete message was decoded (and consumed)
/// - `Ok(None)` if more data is needed (buffer untouched)
/// - `Err(...)` if the data is invalid
pub fn decode(buf: &mut BytesMut) -> Result<Option<Message>, CodecError> {
    Ok(match decode_frame(buf)? {
        Decoded::Message(message) => Some(message),
        Decoded::NeedAtLeast(_) => None,
    })
}

enum Decoded {
    Message(Message),
    /// Buffer length below which another attempt cannot succeed
    NeedAtLeast(usize),
}

fn decode_frame(buf: &mut BytesMut) -> Result<Decoded, CodecError> {
    let end = match measure(buf) {
        Extent::Complete(end) => end,
        Extent::NeedAtLeast(needed) if needed > MAX_MESSAGE_SIZE => {
            return Err(CodecError::MessageTooLarge(needed));
        }
        Extent::NeedAtLeast(needed) => return Ok(Decoded::NeedAtLeast(needed)),
    };

    let mut frame: &[u8] = &buf[..end];
    let value = rmpv::decode::read_value(&mut frame)?;
    buf.advance(end);

    parse_message(value).map(Decoded::Message)
}

/// Extent of the first msgpack value in a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extent {
    /// The value ends at this offset
    Complete(usize),
    /// The value is cut short; at least this many bytes are required
    NeedAtLeast(usize),
}

/// Walk value headers without decoding payloads
///
/// Every value still owed takes at least one byte, which keeps the
/// reported need a lower bound.
fn measure(buf: &[u8]) -> Extent {
    let mut pos = 0usize;
    let mut owed = 1usize;

    while owed > 0 {
        let Some(&marker) = buf.get(pos) else {
            return Extent::NeedAtLeast(pos.saturating_add(owed));
        };
        pos += 1;
        owed -= 1;

        let (width, kind) = match marker {
            0x00..=0x7f | 0xc0..=0xc3 | 0xe0..=0xff => (0, Body::Fixed(0)),
            0x80..=0x8f => (0, Body::Values(2 * (marker & 0x0f) as usize)),
            0x90..=0x9f => (0, Body::Values((marker & 0x0f) as usize)),
            0xa0..=0xbf => (0, Body::Fixed((marker & 0x1f) as usize)),
            0xc4 | 0xd9 => (1, Body::Sized(0)),
            0xc5 | 0xda => (2, Body::Sized(0)),
            0xc6 | 0xdb => (4, Body::Sized(0)),
            // ext payloads carry a type byte after the length
            0xc7 => (1, Body::Sized(1)),
            0xc8 => (2, Body::Sized(1)),
            0xc9 => (4, Body::Sized(1)),
            0xcc | 0xd0 => (0, Body::Fixed(1)),
            0xcd | 0xd1 => (0, Body::Fixed(2)),
            0xca | 0xce | 0xd2 => (0, Body::Fixed(4)),
            0xcb | 0xcf | 0xd3 => (0, Body::Fixed(8)),
            0xd4 => (0, Body::Fixed(2)),
            0xd5 => (0, Body::Fixed(3)),
            0xd6 => (0, Body::Fixed(5)),
            0xd7 => (0, Body::Fixed(9)),
            0xd8 => (0, Body::Fixed(17)),
            0xdc => (2, Body::Counted(1)),
            0xdd => (4, Body::Counted(1)),
            0xde => (2, Body::Counted(2)),
            0xdf => (4, Body::Counted(2)),
        };

        let len = if width > 0 {
            let Some(header) = buf.get(pos..pos + width) else {
                return Extent::NeedAtLeast((pos + width).saturating_add(owed));
            };
            pos += width;
            header.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize)
        } else {
            0
        };

        let skip = match kind {
            Body::Fixed(n) => n,
            Body::Sized(extra) => len.saturating_add(extra),
            Body::Values(n) => {
                owed = owed.saturating_add(n);
                0
            }
            Body::Counted(per_entry) => {
                owed = owed.saturating_add(len.saturating_mul(per_entry));
                0
            }
        };

        let end = pos.saturating_add(skip);
        if end > buf.len() {
            return Extent::NeedAtLeast(end.saturating_add(owed));
        }
        pos = end;
    }

    Extent::Complete(pos)
}

/// What follows a marker and its length header
#[derive(Clone, Copy)]
enum Body {
    /// Fixed number of payload bytes
    Fixed(usize),
    /// Length header bytes plus this many more
    Sized(usize),
    /// Fixed number of nested values
    Values(usize),
    /// Length header entries of this many values each
    Counted(usize),
}

fn parse_message(value: Value) -> Result<Message, CodecError> {
    let mut fields = match value {
        Value::Array(fields) => fields.into_iter(),
        other => return Err(CodecError::Malformed(format!("expected array, got {}", other))),
    };

    let kind = fields
        .next()
        .and_then(|v| v.as_u64())
        .ok_or_else(|| CodecError::Malformed("missing message type".into()))?;

    match kind {
        REQUEST => {
            let msgid = next_msgid(&mut fields)?;
            let method = next_method(&mut fields)?;
            let params = next_params(&mut fields)?;
            Ok(Message::Request { msgid, method, params })
        }
        RESPONSE => {
            let msgid = next_msgid(&mut fields)?;
            let error = match fields.next() {
                Some(Value::Nil) => None,
                Some(err) => Some(err),
                None => return Err(CodecError::Malformed("missing error slot".into())),
            };
            let result = fields
                .next()
                .ok_or_else(|| CodecError::Malformed("missing result slot".into()))?;
            Ok(Message::Response { msgid, error, result })
        }
        NOTIFICATION => {
            let method = next_method(&mut fields)?;
            let params = next_params(&mut fields)?;
            Ok(Message::Notification { method, params })
        }
        other => Err(CodecError::Malformed(format!("unknown message type {}", other))),
    }
}

fn next_msgid(fields: &mut impl Iterator<Item = Value>) -> Result<u32, CodecError> {
    fields
        .next()
        .and_then(|v| v.as_u64())
        .and_then(|id| u32::try_from(id).ok())
        .ok_or_else(|| CodecError::Malformed("invalid msgid".into()))
}

fn next_method(fields: &mut impl Iterator<Item = Value>) -> Result<String, CodecError> {
    match fields.next() {
        Some(Value::String(s)) => s
            .into_str()
            .ok_or_else(|| CodecError::Malformed("method is not utf-8".into())),
        _ => Err(CodecError::Malformed("missing method name".into())),
    }
}

fn next_params(fields: &mut impl Iterator<Item = Value>) -> Result<Vec<Value>, CodecError> {
    match fields.next() {
        Some(Value::Array(params)) => Ok(params),
        Some(Value::Nil) | None => Ok(Vec::new()),
        Some(other) => Err(CodecError::Malformed(format!("params must be an array, got {}", other))),
    }
}

/// Decoder state machine for streaming decoding
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Partial frame data being accumulated
    buffer: BytesMut,
    /// No frame can complete below this buffer length
    need: usize,
}

impl FrameDecoder {
    /// Create a new frame decoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            need: 0,
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next frame from the buffer
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete frames
    pub fn decode_next(&mut self) -> Result<Option<Message>, CodecError> {
        if self.buffer.is_empty() || self.buffer.len() < self.need {
            return Ok(None);
        }

        match decode_frame(&mut self.buffer)? {
            Decoded::Message(message) => {
                self.need = 0;
                Ok(Some(message))
            }
            Decoded::NeedAtLeast(needed) => {
                self.need = needed;
                Ok(None)
            }
        }
    }

    /// Get the current buffer length (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}
