//! Endpoint and connection configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Replies larger than this are rejected as protocol violations unless the
/// caller raises the cap.
pub const DEFAULT_MAX_REPLY_LEN: usize = 64 * 1024 * 1024;

/// A `host:port` pair identifying one server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or address literal.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Build an endpoint from parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The input was not a valid `host:port` address.
#[derive(Debug, Error)]
#[error("invalid endpoint address {0:?}, expected host:port")]
pub struct InvalidEndpoint(pub String);

impl FromStr for Endpoint {
    type Err = InvalidEndpoint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| InvalidEndpoint(s.to_owned()))?;
        if host.is_empty() {
            return Err(InvalidEndpoint(s.to_owned()));
        }
        let port = port.parse().map_err(|_| InvalidEndpoint(s.to_owned()))?;
        Ok(Endpoint::new(host, port))
    }
}

/// Everything needed to open and authenticate one connection. Doubles as
/// the pool's map key, so two configs selecting different databases on the
/// same endpoint pool separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionInfo {
    /// Where to connect.
    pub endpoint: Endpoint,
    /// Database index, selected on connect when non-zero.
    pub database: i64,
    /// Optional user name; only sent together with a password.
    pub username: Option<String>,
    /// Optional password; when present, authentication runs on connect.
    pub password: Option<String>,
    /// Cap on how long a single reply read may block. Blocking list
    /// operations wait on the server side, so configure this above their
    /// timeouts or leave it off.
    pub read_timeout: Option<Duration>,
    /// Upper bound on any single reply's declared size.
    pub max_reply_len: usize,
}

impl ConnectionInfo {
    /// Config for `endpoint` with database 0, no credentials, no read
    /// timeout and the default reply-size cap.
    pub fn new(endpoint: Endpoint) -> Self {
        ConnectionInfo {
            endpoint,
            database: 0,
            username: None,
            password: None,
            read_timeout: None,
            max_reply_len: DEFAULT_MAX_REPLY_LEN,
        }
    }

    /// Select a database index on connect.
    pub fn database(mut self, index: i64) -> Self {
        self.database = index;
        self
    }

    /// Authenticate as `username` (requires a password as well).
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Authenticate with `password` on connect.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Bound single-reply reads.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Override the reply-size cap.
    pub fn max_reply_len(mut self, cap: usize) -> Self {
        self.max_reply_len = cap;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port() {
        let ep: Endpoint = "cache.internal:6379".parse().unwrap();
        assert_eq!(ep, Endpoint::new("cache.internal", 6379));
        assert_eq!(ep.to_string(), "cache.internal:6379");
    }

    #[test]
    fn rejects_garbage_addresses() {
        assert!("no-port".parse::<Endpoint>().is_err());
        assert!(":6379".parse::<Endpoint>().is_err());
        assert!("host:notaport".parse::<Endpoint>().is_err());
    }

    #[test]
    fn differing_databases_key_differently() {
        let a = ConnectionInfo::new(Endpoint::new("h", 1)).database(0);
        let b = ConnectionInfo::new(Endpoint::new("h", 1)).database(3);
        assert_ne!(a, b);
    }
}
