//! Response Types for the Line Protocol
//!
//! Every reply is a single line. The first byte tells the client what kind
//! of reply follows:
//!
//! - `+` Status (`+OK`, `+PONG`)
//! - `-` Error (`-ERR unknown command`)
//! - `:` Integer (`:1`)
//! - `$` Bulk value (`$hello`), or `$-1` for "no value"
//!
//! Every reply is terminated by a single `\n`.

use bytes::Bytes;
use std::fmt;

/// The line delimiter used on the wire.
pub const DELIMITER: u8 = b'\n';

/// Reply type prefixes
pub mod prefix {
    pub const STATUS: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK: u8 = b'$';
}

/// A reply sent back to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `+<status>`
    Status(&'static str),

    /// `-<message>`, where the message already carries its `ERR` tag
    Error(String),

    /// `:<n>`
    Integer(i64),

    /// `$<value>`
    ///
    /// The value is written as stored, without escaping or a length prefix.
    /// A stored value of `-1` therefore reads back as `$-1`, the same bytes
    /// as [`Response::Null`], and a value ending in `\r` loses that byte to
    /// a client that splits lines on `\r\n`.
    Bulk(Bytes),

    /// `$-1`
    Null,
}

impl Response {
    /// `+OK`
    pub fn ok() -> Self {
        Response::Status("OK")
    }

    /// `+PONG`
    pub fn pong() -> Self {
        Response::Status("PONG")
    }

    /// Creates an error reply.
    ///
    /// # Example
    /// ```
    /// use linekv::protocol::Response;
    /// let err = Response::error("ERR unknown command");
    /// assert_eq!(err.serialize(), b"-ERR unknown command\n");
    /// ```
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(message.into())
    }

    pub fn integer(n: i64) -> Self {
        Response::Integer(n)
    }

    /// `:1` for true, `:0` for false.
    pub fn boolean(b: bool) -> Self {
        Response::Integer(b as i64)
    }

    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Response::Bulk(data.into())
    }

    pub fn null() -> Self {
        Response::Null
    }

    /// Serializes the reply to its wire form, delimiter included.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Response::Status(s) => {
                buf.push(prefix::STATUS);
                buf.extend_from_slice(s.as_bytes());
            }
            Response::Error(msg) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(msg.as_bytes());
            }
            Response::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
            }
            Response::Bulk(data) => {
                buf.push(prefix::BULK);
                buf.extend_from_slice(data);
            }
            Response::Null => {
                buf.push(prefix::BULK);
                buf.extend_from_slice(b"-1");
            }
        }
        buf.push(DELIMITER);
    }

    fn encoded_len(&self) -> usize {
        let body = match self {
            Response::Status(s) => s.len(),
            Response::Error(msg) => msg.len(),
            Response::Integer(_) => 20,
            Response::Bulk(data) => data.len(),
            Response::Null => 2,
        };
        body + 2
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Status(s) => write!(f, "+{}", s),
            Response::Error(msg) => write!(f, "-{}", msg),
            Response::Integer(n) => write!(f, ":{}", n),
            Response::Bulk(data) => write!(f, "${}", String::from_utf8_lossy(data)),
            Response::Null => write!(f, "$-1"),
        }
    }
}
