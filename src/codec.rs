//! # RESP wire format
//!
//! Requests travel as a length-prefixed array of bulk strings:
//!
//! ```text
//! *<n>\r\n$<len>\r\n<bytes>\r\n...
//! ```
//!
//! Replies are discriminated by their first byte:
//!
//! * `+` simple string, terminated by CRLF
//! * `-` error, terminated by CRLF
//! * `:` integer, signed decimal ASCII
//! * `$` bulk string; `$-1` is the nil sentinel
//! * `*` multi-bulk, a counted sequence of replies; `*-1` is the nil sentinel
//!
//! All lengths are signed 64-bit decimal ASCII and `\r\n` is the framing
//! terminator everywhere. Bulk-string payloads are binary-clean.
//!
//! The decoder here is pure and stateless: it either recognizes one complete
//! reply at the head of the buffer (reporting how many bytes it spans), asks
//! for more input, or rejects the buffer with a protocol error. It never
//! partially consumes a reply.

use crate::cmd::Command;
use crate::error::Error;

/// One decoded server reply.
///
/// Nil bulk strings and nil multi-bulks are distinct from their empty
/// counterparts, which is load-bearing for callers distinguishing a missing
/// key from an empty value and a normal transaction from an aborted one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+...` status line.
    Simple(Vec<u8>),
    /// `-...` error line, surfaced verbatim.
    Error(String),
    /// `:...` signed 64-bit integer.
    Integer(i64),
    /// `$...` bulk string; `None` is the nil sentinel.
    Bulk(Option<Vec<u8>>),
    /// `*...` reply sequence; `None` is the nil sentinel.
    Multi(Option<Vec<Reply>>),
}

impl Reply {
    /// Short human-readable kind, used in protocol error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Reply::Simple(_) => "simple-string",
            Reply::Error(_) => "error",
            Reply::Integer(_) => "integer",
            Reply::Bulk(Some(_)) => "bulk-string",
            Reply::Bulk(None) => "nil-bulk",
            Reply::Multi(Some(_)) => "multi-bulk",
            Reply::Multi(None) => "nil-multi-bulk",
        }
    }

    /// Whether this is the `+OK` status.
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Simple(s) if s == b"OK")
    }
}

/// Encode a command in the array-of-bulk-strings request form. Total on any
/// command.
pub fn encode_command(cmd: &Command) -> Vec<u8> {
    let parts = cmd.parts();
    let mut out = Vec::with_capacity(16 + parts.iter().map(|p| p.len() + 16).sum::<usize>());
    out.extend_from_slice(format!("*{}\r\n", parts.len()).as_bytes());
    for part in parts {
        out.extend_from_slice(format!("${}\r\n", part.len()).as_bytes());
        out.extend_from_slice(part);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Encode a reply in its wire form. The inverse of [`decode`]; also used by
/// the mock server in `test_utils`.
pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    let mut out = Vec::new();
    write_reply(&mut out, reply);
    out
}

fn write_reply(out: &mut Vec<u8>, reply: &Reply) {
    match reply {
        Reply::Simple(s) => {
            out.push(b'+');
            out.extend_from_slice(s);
            out.extend_from_slice(b"\r\n");
        }
        Reply::Error(msg) => {
            out.push(b'-');
            out.extend_from_slice(msg.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        Reply::Integer(n) => {
            out.extend_from_slice(format!(":{n}\r\n").as_bytes());
        }
        Reply::Bulk(None) => out.extend_from_slice(b"$-1\r\n"),
        Reply::Bulk(Some(payload)) => {
            out.extend_from_slice(format!("${}\r\n", payload.len()).as_bytes());
            out.extend_from_slice(payload);
            out.extend_from_slice(b"\r\n");
        }
        Reply::Multi(None) => out.extend_from_slice(b"*-1\r\n"),
        Reply::Multi(Some(items)) => {
            out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
            for item in items {
                write_reply(out, item);
            }
        }
    }
}

/// Try to decode one reply from the head of `buf`.
///
/// Returns `Ok(None)` when the buffer does not yet hold a complete reply,
/// `Ok(Some((reply, consumed)))` on success. Any declared bulk length or
/// multi-bulk count above `max_len` is rejected as a protocol error rather
/// than buffered.
pub fn decode(buf: &[u8], max_len: usize) -> Result<Option<(Reply, usize)>, Error> {
    let mut scan = Scan { buf, pos: 0 };
    match read_reply(&mut scan, max_len)? {
        Some(reply) => Ok(Some((reply, scan.pos))),
        None => Ok(None),
    }
}

struct Scan<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Scan<'a> {
    /// The next CRLF-terminated line, without its terminator. `None` when
    /// the terminator has not arrived yet.
    fn line(&mut self) -> Result<Option<&'a [u8]>, Error> {
        let rest = &self.buf[self.pos..];
        for (i, pair) in rest.windows(2).enumerate() {
            if pair == b"\r\n" {
                self.pos += i + 2;
                return Ok(Some(&rest[..i]));
            }
            if pair[0] == b'\n' {
                return Err(Error::Protocol("bare LF inside reply framing".into()));
            }
        }
        Ok(None)
    }

    /// `n` payload bytes followed by CRLF. `None` while incomplete.
    fn payload(&mut self, n: usize) -> Result<Option<&'a [u8]>, Error> {
        let rest = &self.buf[self.pos..];
        if rest.len() < n + 2 {
            return Ok(None);
        }
        if &rest[n..n + 2] != b"\r\n" {
            return Err(Error::Protocol("bulk payload not terminated by CRLF".into()));
        }
        self.pos += n + 2;
        Ok(Some(&rest[..n]))
    }
}

fn read_reply(scan: &mut Scan<'_>, max_len: usize) -> Result<Option<Reply>, Error> {
    let Some(line) = scan.line()? else {
        return Ok(None);
    };
    let Some((&prefix, body)) = line.split_first() else {
        return Err(Error::Protocol("empty reply line".into()));
    };
    match prefix {
        b'+' => Ok(Some(Reply::Simple(body.to_vec()))),
        b'-' => Ok(Some(Reply::Error(String::from_utf8_lossy(body).into_owned()))),
        b':' => Ok(Some(Reply::Integer(parse_int(body)?))),
        b'$' => {
            let len = parse_int(body)?;
            if len == -1 {
                return Ok(Some(Reply::Bulk(None)));
            }
            let len = check_len(len, max_len, "bulk-string length")?;
            match scan.payload(len)? {
                Some(payload) => Ok(Some(Reply::Bulk(Some(payload.to_vec())))),
                None => Ok(None),
            }
        }
        b'*' => {
            let count = parse_int(body)?;
            if count == -1 {
                return Ok(Some(Reply::Multi(None)));
            }
            let count = check_len(count, max_len, "multi-bulk count")?;
            let mut items = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                match read_reply(scan, max_len)? {
                    Some(item) => items.push(item),
                    None => return Ok(None),
                }
            }
            Ok(Some(Reply::Multi(Some(items))))
        }
        other => Err(Error::Protocol(format!(
            "unknown reply prefix byte 0x{other:02x}"
        ))),
    }
}

fn parse_int(digits: &[u8]) -> Result<i64, Error> {
    let text = std::str::from_utf8(digits)
        .map_err(|_| Error::Protocol("non-ASCII bytes in integer field".into()))?;
    text.parse::<i64>()
        .map_err(|_| Error::Protocol(format!("malformed integer field {text:?}")))
}

fn check_len(declared: i64, max_len: usize, what: &str) -> Result<usize, Error> {
    if declared < 0 {
        return Err(Error::Protocol(format!("negative {what} {declared}")));
    }
    let declared = declared as usize;
    if declared > max_len {
        return Err(Error::Protocol(format!(
            "{what} {declared} exceeds the configured cap of {max_len}"
        )));
    }
    Ok(declared)
}
