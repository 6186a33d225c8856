//! Line Protocol Implementation
//!
//! linekv speaks a plain-text protocol: one request per line, one reply
//! line per request.
//!
//! ```text
//! client: SET foo bar\n      server: +OK\n
//! client: GET foo\n          server: $bar\n
//! client: DEL foo\n          server: :1\n
//! client: GET foo\n          server: $-1\n
//! client: NOSUCHVERB\n       server: -ERR unknown command\n   (connection closed)
//! ```
//!
//! ## Modules
//!
//! - `types`: the [`Response`] enum and its serialization
//! - `parser`: line framing, tokenizing and [`ParseError`]

pub mod parser;
pub mod types;

pub use parser::{find_frame, tokenize, ParseError, ParseResult, DEFAULT_MAX_LINE_LENGTH};
pub use types::Response;

impl From<&ParseError> for Response {
    fn from(err: &ParseError) -> Self {
        Response::error(format!("ERR {}", err))
    }
}
