//! Response definitions
//!
//! Represents responses to clients.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{KvError, Result};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
    Unavailable = 0x03,
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Optional payload (value for GET, value list for GETPREFIX,
    /// message for NOT_FOUND / ERROR)
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Create an OK response with optional payload
    pub fn ok(payload: Option<Vec<u8>>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    /// Create an OK response carrying a list of values
    ///
    /// Payload: count (4) then len (4) + bytes per value, big-endian.
    pub fn values(values: &[String]) -> Self {
        let size = 4 + values.iter().map(|v| 4 + v.len()).sum::<usize>();
        let mut buf = BytesMut::with_capacity(size);
        buf.put_u32(values.len() as u32);
        for value in values {
            buf.put_u32(value.len() as u32);
            buf.put_slice(value.as_bytes());
        }
        Self::ok(Some(buf.to_vec()))
    }

    /// Create a NOT_FOUND response
    pub fn not_found(message: &str) -> Self {
        Self {
            status: Status::NotFound,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Create an ERROR response
    pub fn error(message: &str) -> Self {
        Self {
            status: Status::Error,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Create an UNAVAILABLE response
    pub fn unavailable() -> Self {
        Self {
            status: Status::Unavailable,
            payload: None,
        }
    }

    /// Map an engine error onto the status a remote caller sees
    pub fn from_error(err: &KvError) -> Self {
        match err {
            KvError::NotFound(msg) => Self::not_found(msg),
            KvError::Unavailable => Self::unavailable(),
            other => Self::error(&other.to_string()),
        }
    }

    /// Payload as UTF-8 text (empty if there is none)
    pub fn text(&self) -> Result<String> {
        let bytes = self.payload.clone().unwrap_or_default();
        String::from_utf8(bytes).map_err(|e| KvError::Protocol(format!("payload is not UTF-8: {}", e)))
    }

    /// Decode a payload built by [`Response::values`]
    pub fn decode_values(&self) -> Result<Vec<String>> {
        let payload = self.payload.as_deref().unwrap_or(&[]);
        let mut buf = payload;

        if buf.remaining() < 4 {
            return Err(KvError::Protocol("value list: missing count".to_string()));
        }
        let count = buf.get_u32() as usize;

        // Every value needs at least its 4-byte length prefix.
        if count > buf.remaining() / 4 {
            return Err(KvError::Protocol(format!(
                "value list: count {} exceeds payload of {} bytes",
                count,
                payload.len()
            )));
        }

        let mut values = Vec::with_capacity(count);
        for i in 0..count {
            if buf.remaining() < 4 {
                return Err(KvError::Protocol(format!("value list: missing length of value {}", i)));
            }
            let len = buf.get_u32() as usize;
            if buf.remaining() < len {
                return Err(KvError::Protocol(format!(
                    "value list: value {} truncated (expected {}, got {})",
                    i,
                    len,
                    buf.remaining()
                )));
            }
            let value = String::from_utf8(buf[..len].to_vec())
                .map_err(|e| KvError::Protocol(format!("value list: value {} is not UTF-8: {}", i, e)))?;
            buf.advance(len);
            values.push(value);
        }

        if buf.has_remaining() {
            return Err(KvError::Protocol(format!(
                "value list: {} trailing bytes",
                buf.remaining()
            )));
        }

        Ok(values)
    }
}
