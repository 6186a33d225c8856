//! Line Framing and Tokenization
//!
//! Requests arrive as a byte stream. This module does the two steps that
//! turn that stream into argument lists:
//!
//! 1. **Framing**: [`find_frame`] looks for the first `\n` in the buffer and
//!    reports where the line ends. A `\r` right before the `\n` is not part
//!    of the frame, so `\r\n` clients work too.
//! 2. **Tokenizing**: [`tokenize`] splits one frame into arguments.
//!
//! ## Quoting
//!
//! Arguments are separated by spaces or tabs. An argument that starts with
//! `"` runs until the next unescaped `"` and may contain whitespace. Inside
//! quotes `\"` stands for a quote and `\\` for a backslash; any other
//! backslash is kept as is. A closing quote must be followed by whitespace
//! or the end of the line.
//!
//! ```text
//! SET greeting "hello world"    ->  [SET] [greeting] [hello world]
//! SET empty ""                  ->  [SET] [empty] []
//! SET q "say \"hi\""            ->  [SET] [q] [say "hi"]
//! ```
//!
//! Unquoted arguments are zero-copy slices of the frame.

use crate::protocol::types::DELIMITER;
use bytes::Bytes;
use thiserror::Error;

/// Why a request line was rejected.
///
/// The `Display` text is what the client sees after `-ERR `.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command")]
    UnknownCommand(String),

    #[error("wrong number of arguments for '{command}' command")]
    WrongArity { command: &'static str },

    #[error("value is not an integer or out of range")]
    InvalidInteger,

    #[error("invalid expire time in '{command}' command")]
    InvalidExpireTime { command: &'static str },

    #[error("unbalanced quotes in request")]
    UnbalancedQuotes,

    #[error("line too long")]
    LineTooLong { size: usize, max: usize },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Default upper bound for one request line, delimiter excluded.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Locates the first complete frame at the front of `buf`.
///
/// # Returns
///
/// - `Ok(Some((frame_len, consumed)))` - the frame is `buf[..frame_len]` and
///   `consumed` bytes (delimiter included) should be dropped from the buffer
/// - `Ok(None)` - no delimiter yet, read more
/// - `Err(ParseError::LineTooLong)` - the line is, or will be, over `max_len`
pub fn find_frame(buf: &[u8], max_len: usize) -> ParseResult<Option<(usize, usize)>> {
    let Some(pos) = buf.iter().position(|&b| b == DELIMITER) else {
        // A trailing `\r` may be the first half of a split `\r\n`
        let pending = match buf.last() {
            Some(b'\r') => buf.len() - 1,
            _ => buf.len(),
        };
        if pending > max_len {
            return Err(ParseError::LineTooLong {
                size: pending,
                max: max_len,
            });
        }
        return Ok(None);
    };

    let frame_len = if pos > 0 && buf[pos - 1] == b'\r' {
        pos - 1
    } else {
        pos
    };

    if frame_len > max_len {
        return Err(ParseError::LineTooLong {
            size: frame_len,
            max: max_len,
        });
    }

    Ok(Some((frame_len, pos + 1)))
}

#[inline]
fn is_space(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Splits a frame into arguments.
///
/// A blank frame yields an empty list.
pub fn tokenize(frame: &Bytes) -> ParseResult<Vec<Bytes>> {
    let buf = &frame[..];
    let mut tokens = Vec::new();
    let mut pos = 0;

    loop {
        while pos < buf.len() && is_space(buf[pos]) {
            pos += 1;
        }
        if pos == buf.len() {
            return Ok(tokens);
        }

        if buf[pos] == b'"' {
            let (token, next) = quoted_token(buf, pos + 1)?;
            tokens.push(token);
            pos = next;
        } else {
            let start = pos;
            while pos < buf.len() && !is_space(buf[pos]) {
                pos += 1;
            }
            tokens.push(frame.slice(start..pos));
        }
    }
}

/// Reads a quoted token whose body starts at `pos`.
///
/// Returns the unescaped token and the position just after the closing quote.
fn quoted_token(buf: &[u8], mut pos: usize) -> ParseResult<(Bytes, usize)> {
    let mut out = Vec::new();

    while pos < buf.len() {
        match buf[pos] {
            b'\\' if pos + 1 < buf.len() && matches!(buf[pos + 1], b'"' | b'\\') => {
                out.push(buf[pos + 1]);
                pos += 2;
            }
            b'"' => {
                let next = pos + 1;
                if next < buf.len() && !is_space(buf[next]) {
                    return Err(ParseError::UnbalancedQuotes);
                }
                return Ok((Bytes::from(out), next));
            }
            b => {
                out.push(b);
                pos += 1;
            }
        }
    }

    Err(ParseError::UnbalancedQuotes)
}
