// Target type plus the host validation and resolution helpers the prober needs.

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Expand hosts x ports into targets, host-major, after validating every input.
    pub fn cross(hosts: &[String], ports: &[u16]) -> Result<Vec<Target>, ConfigError> {
        if let Some(index) = hosts.iter().position(|h| h.trim().is_empty()) {
            return Err(ConfigError::EmptyHost(index));
        }
        if let Some(index) = ports.iter().position(|p| *p == 0) {
            return Err(ConfigError::ZeroPort(index));
        }

        Ok(hosts
            .iter()
            .flat_map(|host| ports.iter().map(move |port| Target::new(host.clone(), *port)))
            .collect())
    }

    /// Resolve to every candidate socket address, in resolver order.
    pub async fn resolve(&self) -> io::Result<Vec<SocketAddr>> {
        // IP literals skip the resolver
        if let Some(ip) = parse_ip_literal(&self.host) {
            return Ok(vec![SocketAddr::new(ip, self.port)]);
        }

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("could not resolve hostname {}: {}", self.host, e),
                )
            })?
            .collect();

        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("could not resolve hostname: {}", self.host),
            ));
        }
        Ok(addrs)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match parse_ip_literal(&self.host) {
            Some(IpAddr::V6(ip)) => write!(f, "[{}]:{}", ip, self.port),
            _ => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

fn parse_ip_literal(host: &str) -> Option<IpAddr> {
    let trimmed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    trimmed.parse::<IpAddr>().ok()
}
