//! Support code for the `snmp-agentd` and `snmp-poll` binaries.
//!
//! This module is only available with the `cli` feature.

pub mod args;
pub mod config;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise `verbose` picks the level for this
/// crate: 0 is info, 1 is debug, 2 or more is trace.
pub fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "embedded_snmp=info,snmp_agentd=info,snmp_poll=info",
        1 => "embedded_snmp=debug,snmp_agentd=debug,snmp_poll=debug",
        _ => "embedded_snmp=trace,snmp_agentd=trace,snmp_poll=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // a second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
