//! Server identity
//!
//! A server is identified by host, port and the start code it registered
//! with. The start code disambiguates a restarted process that comes back on
//! the same `host:port`.

use crate::error::{BalancerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a storage server
///
/// Format: `host,port,start_code`
/// Example: `rs1.example.com,16020,1712000000000`
///
/// Serializes as that string so it can key JSON maps.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerName {
    host: String,
    port: u16,
    start_code: u64,
}

impl ServerName {
    /// Create a new server name
    pub fn new(host: impl Into<String>, port: u16, start_code: u64) -> Self {
        Self {
            host: host.into(),
            port,
            start_code,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn start_code(&self) -> u64 {
        self.start_code
    }
}

impl fmt::Debug for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerName({})", self)
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.host, self.port, self.start_code)
    }
}

impl FromStr for ServerName {
    type Err = BalancerError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(',');
        let (host, port, start_code) = match (parts.next(), parts.next(), parts.next(), parts.next())
        {
            (Some(h), Some(p), Some(c), None) => (h, p, c),
            _ => {
                return Err(BalancerError::InvalidServerName(format!(
                    "expected host,port,start_code, got {:?}",
                    s
                )))
            }
        };

        if host.is_empty() {
            return Err(BalancerError::InvalidServerName(format!(
                "empty host in {:?}",
                s
            )));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| BalancerError::InvalidServerName(format!("bad port in {:?}: {}", s, e)))?;
        let start_code = start_code.parse::<u64>().map_err(|e| {
            BalancerError::InvalidServerName(format!("bad start code in {:?}: {}", s, e))
        })?;

        Ok(Self::new(host, port, start_code))
    }
}

impl TryFrom<String> for ServerName {
    type Error = BalancerError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ServerName> for String {
    fn from(server: ServerName) -> Self {
        server.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let server = ServerName::new("rs1.example.com", 16020, 1712000000000);
        assert_eq!(server.to_string(), "rs1.example.com,16020,1712000000000");

        let parsed: ServerName = "rs1.example.com,16020,1712000000000".parse().unwrap();
        assert_eq!(parsed, server);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("rs1,16020".parse::<ServerName>().is_err());
        assert!("rs1,notaport,1".parse::<ServerName>().is_err());
        assert!(",16020,1".parse::<ServerName>().is_err());
        assert!("rs1,16020,1,extra".parse::<ServerName>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let server = ServerName::new("rs1", 16020, 7);
        let json = serde_json::to_string(&server).unwrap();
        assert_eq!(json, "\"rs1,16020,7\"");
        assert_eq!(serde_json::from_str::<ServerName>(&json).unwrap(), server);
        assert!(serde_json::from_str::<ServerName>("\"rs1\"").is_err());
    }

    #[test]
    fn test_restart_is_distinct_server() {
        let before = ServerName::new("rs1", 16020, 1);
        let after = ServerName::new("rs1", 16020, 2);
        assert_ne!(before, after);
        assert_eq!(before.host(), after.host());
        assert_eq!(before.port(), after.port());
    }
}
