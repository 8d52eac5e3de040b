//! snmp-poll: watch values on a remote agent.
//!
//! Part of the embedded-snmp CLI utilities.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::Parser;
use embedded_snmp::agent::HandleOutcome;
use embedded_snmp::cli::args::{DeviceArgs, LogArgs, parse_duration};
use embedded_snmp::cli::init_tracing;
use embedded_snmp::clock::SystemClock;
use embedded_snmp::manager::{Device, Manager, PollerId};
use embedded_snmp::oid::Oid;
use embedded_snmp::registry::{SharedBytes, SharedI32, shared_bytes, shared_i32};
use embedded_snmp::transport::UdpTransport;

/// Poll integer and string values from an SNMP agent and print each update.
#[derive(Debug, Parser)]
#[command(name = "snmp-poll", version, about)]
struct Args {
    #[command(flatten)]
    log: LogArgs,

    #[command(flatten)]
    device: DeviceArgs,

    /// OID of an INTEGER to poll. Repeatable.
    #[arg(short = 'i', long = "int", value_name = "OID")]
    int_oids: Vec<String>,

    /// OID of an OCTET STRING to poll. Repeatable.
    #[arg(short = 's', long = "string", value_name = "OID")]
    string_oids: Vec<String>,

    /// Time between polls of each value.
    #[arg(short = 'n', long = "interval", default_value = "5s", value_parser = parse_duration)]
    interval: Duration,

    /// Exit after this many updates in total.
    #[arg(long = "count")]
    count: Option<usize>,
}

enum Cell {
    Integer(SharedI32),
    String(SharedBytes),
}

impl Cell {
    fn render(&self) -> String {
        match self {
            Self::Integer(cell) => cell.load(Ordering::Relaxed).to_string(),
            Self::String(cell) => String::from_utf8_lossy(&cell.lock()).into_owned(),
        }
    }
}

struct Watch {
    oid: Oid,
    cell: Cell,
    last_success: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log.verbose);

    if args.int_oids.is_empty() && args.string_oids.is_empty() {
        eprintln!("Error: give at least one --int or --string OID");
        return ExitCode::FAILURE;
    }
    let target = match args.device.target_addr() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&args, target).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args, target: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let bind: SocketAddr = (if target.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" }).parse()?;
    let transport = UdpTransport::bind(bind)?;
    let mut manager = Manager::builder().build(transport, SystemClock::new());
    let device = manager.add_device(Device::new(
        target,
        args.device.snmp_version.into(),
        args.device.community.clone(),
    ));

    let interval_ms = args.interval.as_millis() as u64;
    let mut watches: HashMap<PollerId, Watch> = HashMap::new();
    for oid in &args.int_oids {
        let oid = Oid::parse(oid)?;
        let cell = shared_i32(0);
        let id = manager.add_integer_poller(device, oid.clone(), cell.clone(), interval_ms)?;
        let watch = Watch {
            oid,
            cell: Cell::Integer(cell),
            last_success: None,
        };
        watches.insert(id, watch);
    }
    for oid in &args.string_oids {
        let oid = Oid::parse(oid)?;
        let cell = shared_bytes(Vec::new());
        let id = manager.add_string_poller(device, oid.clone(), cell.clone(), 255, interval_ms)?;
        let watch = Watch {
            oid,
            cell: Cell::String(cell),
            last_success: None,
        };
        watches.insert(id, watch);
    }

    let mut tick = tokio::time::interval(Duration::from_millis(100));
    let mut updates = 0;
    loop {
        tokio::select! {
            ready = manager.transport().readable() => ready?,
            _ = tick.tick() => {}
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
        loop {
            match manager.poll() {
                HandleOutcome::NoPacket | HandleOutcome::TransportError => break,
                _ => {}
            }
        }

        for poller in manager.pollers() {
            let Some(watch) = watches.get_mut(&poller.id()) else {
                continue;
            };
            let success = poller.info().last_successful_poll;
            if success.is_some() && success != watch.last_success {
                watch.last_success = success;
                println!("{} = {}", watch.oid, watch.cell.render());
                updates += 1;
            }
        }
        if args.count.is_some_and(|count| updates >= count) {
            return Ok(());
        }
    }
}
