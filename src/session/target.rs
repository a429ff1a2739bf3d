//! Backend target parsing from the upgrade path.

use std::fmt;

use crate::config::ProxyConfig;

/// Backend address requested by a client, with defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub host: String,
    pub port: u16,
}

impl TargetSpec {
    /// Parse `host:port` or `[v6]:port` (leading `/` allowed). Either part may
    /// be missing; a missing, zero or non-numeric port falls back to `default_port`.
    pub fn parse(spec: &str, default_host: &str, default_port: u16) -> Self {
        let spec = spec.trim_start_matches('/');
        let spec = spec.split('?').next().unwrap_or_default();
        let (host, port) = split_host_port(spec);

        let host = host
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .unwrap_or(default_host);
        let port = port
            .and_then(|port| port.trim().parse::<u16>().ok())
            .filter(|port| *port != 0)
            .unwrap_or(default_port);

        Self {
            host: host.to_string(),
            port,
        }
    }

    /// Parse using the configured defaults.
    pub fn from_path(path: &str, config: &ProxyConfig) -> Self {
        Self::parse(path, &config.default_host, config.default_port)
    }
}

/// Split off the port. A bracketed host keeps its colons and loses the brackets.
fn split_host_port(spec: &str) -> (Option<&str>, Option<&str>) {
    if let Some(rest) = spec.strip_prefix('[') {
        if let Some((v6, tail)) = rest.split_once(']') {
            return (Some(v6), tail.strip_prefix(':'));
        }
    }
    let mut parts = spec.split(':');
    (parts.next(), parts.next())
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
