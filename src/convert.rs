//! Typed conversion from wire replies to operation return types.
//!
//! Every operation on the surface declares its expected reply shape by
//! choosing a return type; a reply of the wrong shape is a protocol error.
//! The `queued()` constructor produces the typed sentinel handed back while
//! a command is buffered in a pipeline or transaction — callers must not
//! inspect those, the real value arrives with the pipeline flush or EXEC.

use std::collections::HashMap;

use crate::codec::Reply;
use crate::error::Error;

/// Conversion from a (non-error) reply into a typed value.
pub trait FromReply: Sized {
    /// Convert, failing with [`Error::Protocol`] on a shape mismatch.
    fn from_reply(reply: Reply) -> Result<Self, Error>;

    /// The sentinel returned while the real reply is still owed by a
    /// pipeline or transaction.
    fn queued() -> Self;
}

pub(crate) fn unexpected(reply: &Reply, wanted: &str) -> Error {
    Error::Protocol(format!(
        "expected a {wanted} reply, got {}",
        reply.kind_name()
    ))
}

impl FromReply for Reply {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        Ok(reply)
    }

    fn queued() -> Self {
        Reply::Bulk(None)
    }
}

/// Status replies (`+OK`, `+PONG`, ...). The text itself is discarded.
impl FromReply for () {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        match reply {
            Reply::Simple(_) => Ok(()),
            other => Err(unexpected(&other, "status")),
        }
    }

    fn queued() -> Self {}
}

/// `1`/`0` integers, with `+OK` counting as true for the commands that
/// answer either way.
impl FromReply for bool {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        match reply {
            Reply::Integer(n) => Ok(n != 0),
            Reply::Simple(_) => Ok(true),
            Reply::Bulk(None) => Ok(false),
            other => Err(unexpected(&other, "integer")),
        }
    }

    fn queued() -> Self {
        false
    }
}

impl FromReply for i64 {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        match reply {
            Reply::Integer(n) => Ok(n),
            other => Err(unexpected(&other, "integer")),
        }
    }

    fn queued() -> Self {
        0
    }
}

/// Rank-style replies: an integer, or nil when the member is absent.
impl FromReply for Option<i64> {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        match reply {
            Reply::Integer(n) => Ok(Some(n)),
            Reply::Bulk(None) | Reply::Multi(None) => Ok(None),
            other => Err(unexpected(&other, "integer or nil")),
        }
    }

    fn queued() -> Self {
        None
    }
}

/// Floating-point values arrive as bulk decimal text and are parsed
/// locally.
impl FromReply for f64 {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        match reply {
            Reply::Bulk(Some(text)) => parse_f64(&text),
            Reply::Integer(n) => Ok(n as f64),
            other => Err(unexpected(&other, "bulk-string float")),
        }
    }

    fn queued() -> Self {
        0.0
    }
}

impl FromReply for Option<f64> {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        match reply {
            Reply::Bulk(None) => Ok(None),
            other => f64::from_reply(other).map(Some),
        }
    }

    fn queued() -> Self {
        None
    }
}

impl FromReply for Vec<u8> {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        match reply {
            Reply::Bulk(Some(payload)) => Ok(payload),
            Reply::Simple(text) => Ok(text),
            other => Err(unexpected(&other, "bulk-string")),
        }
    }

    fn queued() -> Self {
        Vec::new()
    }
}

impl FromReply for Option<Vec<u8>> {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        match reply {
            // blocking pops time out with a nil multi-bulk
            Reply::Bulk(None) | Reply::Multi(None) => Ok(None),
            other => Vec::<u8>::from_reply(other).map(Some),
        }
    }

    fn queued() -> Self {
        None
    }
}

impl FromReply for String {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        let bytes = Vec::<u8>::from_reply(reply)?;
        String::from_utf8(bytes)
            .map_err(|_| Error::Protocol("reply is not valid UTF-8".into()))
    }

    fn queued() -> Self {
        String::new()
    }
}

impl FromReply for Vec<Vec<u8>> {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        match reply {
            Reply::Multi(Some(items)) => {
                items.into_iter().map(Vec::<u8>::from_reply).collect()
            }
            Reply::Multi(None) => Ok(Vec::new()),
            other => Err(unexpected(&other, "multi-bulk")),
        }
    }

    fn queued() -> Self {
        Vec::new()
    }
}

/// Per-slot optional values, as produced by MGET and HMGET.
impl FromReply for Vec<Option<Vec<u8>>> {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        match reply {
            Reply::Multi(Some(items)) => items
                .into_iter()
                .map(Option::<Vec<u8>>::from_reply)
                .collect(),
            Reply::Multi(None) => Ok(Vec::new()),
            other => Err(unexpected(&other, "multi-bulk")),
        }
    }

    fn queued() -> Self {
        Vec::new()
    }
}

impl FromReply for Vec<Reply> {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        match reply {
            Reply::Multi(Some(items)) => Ok(items),
            Reply::Multi(None) => Ok(Vec::new()),
            other => Err(unexpected(&other, "multi-bulk")),
        }
    }

    fn queued() -> Self {
        Vec::new()
    }
}

impl FromReply for Vec<bool> {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        match reply {
            Reply::Multi(Some(items)) => items.into_iter().map(bool::from_reply).collect(),
            other => Err(unexpected(&other, "multi-bulk")),
        }
    }

    fn queued() -> Self {
        Vec::new()
    }
}

/// Field/value maps (HGETALL, CONFIG GET) arrive as a flat alternating
/// multi-bulk.
impl FromReply for HashMap<Vec<u8>, Vec<u8>> {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        let flat = Vec::<Vec<u8>>::from_reply(reply)?;
        if flat.len() % 2 != 0 {
            return Err(Error::Protocol(
                "field/value reply holds an odd number of entries".into(),
            ));
        }
        let mut map = HashMap::with_capacity(flat.len() / 2);
        let mut it = flat.into_iter();
        while let (Some(field), Some(value)) = (it.next(), it.next()) {
            map.insert(field, value);
        }
        Ok(map)
    }

    fn queued() -> Self {
        HashMap::new()
    }
}

/// Member/score pairs from the WITHSCORES range variants, in range order.
impl FromReply for Vec<(Vec<u8>, f64)> {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        let flat = Vec::<Vec<u8>>::from_reply(reply)?;
        if flat.len() % 2 != 0 {
            return Err(Error::Protocol(
                "member/score reply holds an odd number of entries".into(),
            ));
        }
        let mut pairs = Vec::with_capacity(flat.len() / 2);
        let mut it = flat.into_iter();
        while let (Some(member), Some(score)) = (it.next(), it.next()) {
            pairs.push((member, parse_f64(&score)?));
        }
        Ok(pairs)
    }

    fn queued() -> Self {
        Vec::new()
    }
}

/// Key/element pairs from the blocking pops; nil on timeout.
impl FromReply for Option<(Vec<u8>, Vec<u8>)> {
    fn from_reply(reply: Reply) -> Result<Self, Error> {
        match reply {
            Reply::Multi(None) | Reply::Bulk(None) => Ok(None),
            Reply::Multi(Some(items)) => {
                let mut fields = items.into_iter();
                match (fields.next(), fields.next(), fields.next()) {
                    (Some(key), Some(value), None) => Ok(Some((
                        Vec::<u8>::from_reply(key)?,
                        Vec::<u8>::from_reply(value)?,
                    ))),
                    _ => Err(Error::Protocol(
                        "blocking pop answered a multi-bulk that is not a key/element pair"
                            .into(),
                    )),
                }
            }
            other => Err(unexpected(&other, "two-element multi-bulk or nil")),
        }
    }

    fn queued() -> Self {
        None
    }
}

fn parse_f64(text: &[u8]) -> Result<f64, Error> {
    let text = std::str::from_utf8(text)
        .map_err(|_| Error::Protocol("non-ASCII bytes in float field".into()))?;
    match text {
        "+inf" | "inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        _ => text
            .parse::<f64>()
            .map_err(|_| Error::Protocol(format!("malformed float field {text:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_and_empty_bulk_convert_apart() {
        let nil = Option::<Vec<u8>>::from_reply(Reply::Bulk(None)).unwrap();
        let empty = Option::<Vec<u8>>::from_reply(Reply::Bulk(Some(Vec::new()))).unwrap();
        assert_eq!(nil, None);
        assert_eq!(empty, Some(Vec::new()));
    }

    #[test]
    fn shape_mismatches_are_protocol_errors() {
        assert!(i64::from_reply(Reply::Bulk(Some(b"5".to_vec()))).is_err());
        assert!(<()>::from_reply(Reply::Integer(1)).is_err());
        assert!(Vec::<Vec<u8>>::from_reply(Reply::Integer(1)).is_err());
    }

    #[test]
    fn floats_parse_from_bulk_text() {
        assert_eq!(f64::from_reply(Reply::Bulk(Some(b"3.5".to_vec()))).unwrap(), 3.5);
        assert_eq!(
            f64::from_reply(Reply::Bulk(Some(b"inf".to_vec()))).unwrap(),
            f64::INFINITY
        );
        assert_eq!(Option::<f64>::from_reply(Reply::Bulk(None)).unwrap(), None);
    }

    #[test]
    fn score_pairs_come_back_in_order() {
        let reply = Reply::Multi(Some(vec![
            Reply::Bulk(Some(b"a".to_vec())),
            Reply::Bulk(Some(b"1".to_vec())),
            Reply::Bulk(Some(b"b".to_vec())),
            Reply::Bulk(Some(b"2.5".to_vec())),
        ]));
        let pairs = Vec::<(Vec<u8>, f64)>::from_reply(reply).unwrap();
        assert_eq!(pairs, vec![(b"a".to_vec(), 1.0), (b"b".to_vec(), 2.5)]);
    }

    #[test]
    fn blocking_pop_pairs_and_timeouts() {
        let hit = Reply::Multi(Some(vec![
            Reply::Bulk(Some(b"q".to_vec())),
            Reply::Bulk(Some(b"job".to_vec())),
        ]));
        assert_eq!(
            Option::<(Vec<u8>, Vec<u8>)>::from_reply(hit).unwrap(),
            Some((b"q".to_vec(), b"job".to_vec()))
        );
        assert_eq!(
            Option::<(Vec<u8>, Vec<u8>)>::from_reply(Reply::Multi(None)).unwrap(),
            None
        );
    }
}
