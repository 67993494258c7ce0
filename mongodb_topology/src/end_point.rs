use std::{fmt, str::FromStr};

use url::Host;

use crate::error_chain_fmt;

/// The port a mongod or mongos listens on when none is given.
pub const DEFAULT_PORT: u16 = 27017;

/// The network address of a single server, `host:port`.
///
/// Hosts are normalized by [`url::Host`], so domain names are lower-cased and IPv6
/// addresses are kept in their bracketed form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndPoint {
    host: String,
    port: u16,
}

impl EndPoint {
    pub fn new(host: &str, port: u16) -> Result<Self, EndPointError> {
        if port == 0 {
            return Err(EndPointError::InvalidPort(port.to_string()));
        }
        let host = Host::parse(host.trim())
            .map_err(|e| EndPointError::InvalidHost(host.to_string(), e))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for EndPoint {
    type Err = EndPointError;

    /// Accepts `host`, `host:port` and `[ipv6]:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (host, port) = if s.starts_with('[') {
            // IPv6 literal: everything up to the closing bracket is the host
            match s.find(']') {
                Some(close) => {
                    let rest = &s[close + 1..];
                    if !rest.is_empty() && !rest.starts_with(':') {
                        return Err(EndPointError::InvalidPort(rest.to_string()));
                    }
                    (&s[..=close], rest.strip_prefix(':'))
                }
                None => {
                    return Err(EndPointError::InvalidHost(
                        s.to_string(),
                        url::ParseError::InvalidIpv6Address,
                    ))
                }
            }
        } else {
            match s.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (s, None),
            }
        };

        let port = match port {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| EndPointError::InvalidPort(port.to_string()))?,
            None => DEFAULT_PORT,
        };

        EndPoint::new(host, port)
    }
}

impl fmt::Display for EndPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(thiserror::Error)]
pub enum EndPointError {
    #[error("`{0}` is not a valid host")]
    InvalidHost(String, #[source] url::ParseError),
    #[error("`{0}` is not a valid port")]
    InvalidPort(String),
}
impl std::fmt::Debug for EndPointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
