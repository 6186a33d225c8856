//! Typed Commands
//!
//! A request line becomes a [`Command`] here, or is rejected with a
//! [`ParseError`]. Verbs are matched case-insensitively and every verb has
//! a fixed argument count; there is no best-effort interpretation.
//!
//! | Verb     | Arguments              |
//! |----------|------------------------|
//! | `PING`   | none                   |
//! | `GET`    | `key`                  |
//! | `SET`    | `key value [seconds]`  |
//! | `DEL`    | `key`                  |
//! | `EXPIRE` | `key seconds`          |

use crate::protocol::{tokenize, ParseError, ParseResult};
use bytes::Bytes;
use std::time::Duration;

/// Largest accepted TTL, in seconds.
pub const MAX_EXPIRE_SECS: i64 = i64::MAX / 1000;

/// A validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Get {
        key: Bytes,
    },
    Set {
        key: Bytes,
        value: Bytes,
        ttl: Option<Duration>,
    },
    Del {
        key: Bytes,
    },
    /// A zero TTL means "expire now".
    Expire {
        key: Bytes,
        ttl: Duration,
    },
}

impl Command {
    /// Parses one frame.
    ///
    /// Returns `Ok(None)` for a blank line.
    ///
    /// # Example
    ///
    /// ```
    /// use linekv::commands::Command;
    /// use bytes::Bytes;
    ///
    /// let cmd = Command::parse(&Bytes::from("get foo")).unwrap();
    /// assert_eq!(cmd, Some(Command::Get { key: Bytes::from("foo") }));
    /// ```
    pub fn parse(frame: &Bytes) -> ParseResult<Option<Command>> {
        let tokens = tokenize(frame)?;
        if tokens.is_empty() {
            return Ok(None);
        }
        Self::from_tokens(tokens).map(Some)
    }

    /// Builds a command from an already tokenized request.
    pub fn from_tokens(tokens: Vec<Bytes>) -> ParseResult<Command> {
        let mut args = tokens.into_iter();
        let Some(verb) = args.next() else {
            return Err(ParseError::UnknownCommand(String::new()));
        };
        let mut args: Vec<Bytes> = args.collect();

        let command = if verb.eq_ignore_ascii_case(b"PING") {
            expect_arity(&args, "ping", 0..=0)?;
            Command::Ping
        } else if verb.eq_ignore_ascii_case(b"GET") {
            expect_arity(&args, "get", 1..=1)?;
            Command::Get {
                key: args.swap_remove(0),
            }
        } else if verb.eq_ignore_ascii_case(b"SET") {
            expect_arity(&args, "set", 2..=3)?;
            let ttl = match args.get(2) {
                Some(secs) => {
                    let secs = parse_integer(secs)?;
                    if secs <= 0 || secs > MAX_EXPIRE_SECS {
                        return Err(ParseError::InvalidExpireTime { command: "set" });
                    }
                    Some(Duration::from_secs(secs as u64))
                }
                None => None,
            };
            args.truncate(2);
            let value = args.pop().unwrap_or_default();
            let key = args.pop().unwrap_or_default();
            Command::Set { key, value, ttl }
        } else if verb.eq_ignore_ascii_case(b"DEL") {
            expect_arity(&args, "del", 1..=1)?;
            Command::Del {
                key: args.swap_remove(0),
            }
        } else if verb.eq_ignore_ascii_case(b"EXPIRE") {
            expect_arity(&args, "expire", 2..=2)?;
            let secs = parse_integer(&args[1])?;
            if secs > MAX_EXPIRE_SECS {
                return Err(ParseError::InvalidExpireTime { command: "expire" });
            }
            Command::Expire {
                key: args.swap_remove(0),
                ttl: Duration::from_secs(secs.max(0) as u64),
            }
        } else {
            return Err(ParseError::UnknownCommand(
                String::from_utf8_lossy(&verb).into_owned(),
            ));
        };

        Ok(command)
    }

    /// The verb, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::Del { .. } => "DEL",
            Command::Expire { .. } => "EXPIRE",
        }
    }
}

fn expect_arity(
    args: &[Bytes],
    command: &'static str,
    allowed: std::ops::RangeInclusive<usize>,
) -> ParseResult<()> {
    if allowed.contains(&args.len()) {
        Ok(())
    } else {
        Err(ParseError::WrongArity { command })
    }
}

fn parse_integer(arg: &[u8]) -> ParseResult<i64> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(ParseError::InvalidInteger)
}
