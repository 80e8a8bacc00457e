//! Declarative configuration values for bulk assignment.
//!
//! Each wrapper in the tree accepts one of these through `set`, fanning the
//! populated fields out into individual operations. Maps are ordered so
//! fan-out order is deterministic.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CloudConfig {
    pub domain: Option<DomainConfig>,
    pub p2p: Option<P2pConfig>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DomainConfig {
    pub root: Option<String>,
    pub generated: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct P2pConfig {
    pub bootstrap: Option<BootstrapConfig>,
}

/// Bootstrap nodes keyed by shape name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BootstrapConfig {
    pub shapes: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct HostsConfig {
    pub hosts: BTreeMap<String, HostConfig>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct HostConfig {
    pub addr: Option<Vec<String>>,
    pub ssh: Option<SshConfig>,
    pub location: Option<LocationConfig>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SshConfig {
    pub addr: Option<String>,
    pub port: Option<u16>,
    pub auth: Option<Vec<String>>,
}

impl SshConfig {
    /// The address as stored: `host` or `host:port`.
    pub(crate) fn full_addr(&self) -> Option<String> {
        let addr = self.addr.as_ref()?;
        match self.port {
            Some(port) if port > 0 => Some(format!("{addr}:{port}")),
            _ => Some(addr.clone()),
        }
    }
}

/// Geographic coordinates, stored as a `lat,long` string.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct LocationConfig {
    pub lat: f64,
    pub long: f64,
}

impl fmt::Display for LocationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.long)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct AuthConfig {
    pub signers: BTreeMap<String, SignerConfig>,
}

/// Credentials of one signer. `password` and `key` are mutually exclusive;
/// `key` is a path to a private key file on the managed host.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SignerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ShapesConfig {
    pub shapes: BTreeMap<String, ShapeConfig>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ShapeConfig {
    pub services: Option<Vec<String>>,
    pub ports: Option<PortsConfig>,
    pub plugins: Option<Vec<String>>,
}

/// Port numbers keyed by port name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PortsConfig {
    pub ports: BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_renders_as_lat_comma_long() {
        let loc = LocationConfig {
            lat: 40.7128,
            long: -74.006,
        };
        assert_eq!(loc.to_string(), "40.7128,-74.006");
    }

    #[test]
    fn ssh_addr_appends_a_nonzero_port() {
        let ssh = SshConfig {
            addr: Some("10.0.0.1".into()),
            port: Some(4242),
            auth: None,
        };
        assert_eq!(ssh.full_addr().unwrap(), "10.0.0.1:4242");

        let bare = SshConfig {
            addr: Some("10.0.0.1".into()),
            port: None,
            auth: None,
        };
        assert_eq!(bare.full_addr().unwrap(), "10.0.0.1");
        assert_eq!(SshConfig::default().full_addr(), None);
    }
}
