//! snmp-agentd: serve configured objects over SNMP v1/v2c.
//!
//! Part of the embedded-snmp CLI utilities.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use embedded_snmp::agent::{Agent, HandleOutcome};
use embedded_snmp::cli::args::LogArgs;
use embedded_snmp::cli::config::AgentConfig;
use embedded_snmp::cli::init_tracing;
use embedded_snmp::clock::SystemClock;
use embedded_snmp::transport::{Transport, UdpTransport};

/// How often the inform retry queue is serviced when the socket is idle.
const SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Serve SNMP objects from a JSON configuration file.
#[derive(Debug, Parser)]
#[command(name = "snmp-agentd", version, about)]
struct Args {
    #[command(flatten)]
    log: LogArgs,

    /// Configuration file (JSON).
    #[arg(short = 'f', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration.
    #[arg(short = 'l', long = "listen", value_name = "ADDR")]
    listen: Option<std::net::SocketAddr>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log.verbose);

    let mut config = match &args.config {
        Some(path) => match AgentConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => match AgentConfig::from_json("{}") {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    let transport = UdpTransport::bind(config.listen)?;
    let local_addr = transport.local_addr();
    let mut agent = config.builder().build(transport, SystemClock::new())?;
    let objects = config.apply(&mut agent)?;
    tracing::info!(target: "snmp_agentd", { listen = %local_addr, objects }, "agent started");

    if config.cold_start_trap {
        send_cold_start(&mut agent, &config);
    }

    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            ready = agent.transport().readable() => {
                ready?;
                // drain everything that is waiting
                loop {
                    match agent.poll() {
                        HandleOutcome::NoPacket | HandleOutcome::TransportError => break,
                        _ => {}
                    }
                }
            }
            _ = sweep.tick() => {
                agent.poll();
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(target: "snmp_agentd", "shutting down");
                return Ok(());
            }
        }

        if agent.set_occurred() {
            tracing::info!(target: "snmp_agentd", "values changed by SET");
            agent.reset_set_occurred();
        }
    }
}

fn send_cold_start(agent: &mut Agent, config: &AgentConfig) {
    let enterprise = match config.enterprise() {
        Ok(oid) => oid,
        Err(e) => {
            tracing::warn!(
                target: "snmp_agentd",
                { error = %e },
                "no enterprise OID for coldStart"
            );
            return;
        }
    };
    let agent_addr = match config.listen.ip() {
        IpAddr::V4(ip) => ip,
        IpAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
    };
    for target in &config.traps {
        let trap = target.cold_start_trap(&enterprise, agent_addr);
        let (retries, delay_ms) = (target.retries, target.delay_ms);
        if let Err(e) = agent.send_trap_to(&trap, target.target, true, retries, delay_ms) {
            tracing::warn!(
                target: "snmp_agentd",
                { snmp.target = %target.target, error = %e },
                "coldStart not sent"
            );
        }
    }
}
