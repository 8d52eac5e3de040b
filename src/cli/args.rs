//! Command-line arguments shared by the binaries.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::version::Version;

/// Logging options.
#[derive(Debug, Clone, Parser)]
pub struct LogArgs {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// SNMP version as accepted on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SnmpVersion {
    #[value(name = "1")]
    V1,
    #[default]
    #[value(name = "2c")]
    V2c,
}

impl From<SnmpVersion> for Version {
    fn from(v: SnmpVersion) -> Self {
        match v {
            SnmpVersion::V1 => Version::V1,
            SnmpVersion::V2c => Version::V2c,
        }
    }
}

/// Options describing a remote device.
#[derive(Debug, Clone, Parser)]
pub struct DeviceArgs {
    /// Device address (host:port, port defaults to 161).
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// SNMP version.
    #[arg(short = 'V', long = "snmp-version", default_value = "2c")]
    pub snmp_version: SnmpVersion,

    /// Community string.
    #[arg(short = 'c', long = "community", default_value = "public")]
    pub community: String,
}

impl DeviceArgs {
    /// Resolve the target, adding port 161 when none is given.
    pub fn target_addr(&self) -> Result<SocketAddr, String> {
        use std::net::{IpAddr, ToSocketAddrs};

        if let Ok(addr) = self.target.parse::<SocketAddr>() {
            return Ok(addr);
        }
        if let Ok(ip) = self.target.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, crate::transport::AGENT_PORT));
        }
        let with_port = if self.target.contains(':') {
            self.target.clone()
        } else {
            format!("{}:{}", self.target, crate::transport::AGENT_PORT)
        };
        with_port
            .to_socket_addrs()
            .map_err(|e| format!("invalid target '{}': {}", self.target, e))?
            .next()
            .ok_or_else(|| format!("could not resolve '{}'", self.target))
    }
}

/// Parse a millisecond duration like `500`, `500ms`, `2s`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (digits, scale) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1000)
    } else {
        (s, 1)
    };
    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration '{}'", s))?;
    Ok(Duration::from_millis(value * scale))
}
