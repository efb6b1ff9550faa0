//! Brings up one simulated Ethernet interface and prints every control
//! packet and event while its addresses settle.
//!
//!     cargo run --example ifstate -- --ipv4 192.0.2.10 --prefix 2001:db8:: --seconds 12

use std::env;
use std::io::Write;
use std::process;
use std::str::FromStr;

use getopts::Options;
use log::{info, Level, LevelFilter};

use smolnetif::iface::{AddressKind, Config, PrefixInformation, Stack, StackConfig};
use smolnetif::time::{Duration, Instant};
use smolnetif::wire::{EthernetAddress, HardwareAddress, Ipv4Address, Ipv6Address};

fn setup_logging(filter: &str) {
    env_logger::Builder::new()
        .format(|buf, record| {
            if record.target().starts_with("smolnetif::") {
                writeln!(
                    buf,
                    "\x1b[0m({}): {}\x1b[0m",
                    record.target().replace("smolnetif::", ""),
                    record.args()
                )
            } else if record.level() == Level::Trace {
                writeln!(buf, "\x1b[37m{}\x1b[0m", record.args())
            } else {
                writeln!(buf, "\x1b[32m({}): {}\x1b[0m", record.target(), record.args())
            }
        })
        .filter(None, LevelFilter::Info)
        .parse_filters(filter)
        .parse_filters(&env::var("RUST_LOG").unwrap_or_default())
        .init();
}

fn parse_opt<T: FromStr>(matches: &getopts::Matches, name: &str) -> Option<T> {
    let value = matches.opt_str(name)?;
    match value.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            eprintln!("invalid value for --{name}: {value}");
            process::exit(1)
        }
    }
}

fn main() {
    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optopt("", "mac", "link-layer address", "02-00-00-00-00-01");
    opts.optopt("", "ipv4", "IPv4 address to configure", "ADDRESS");
    opts.optopt("", "lease", "lifetime of the IPv4 address", "SECONDS");
    opts.optopt("", "prefix", "advertised IPv6 /64 prefix", "PREFIX");
    opts.optopt("", "seconds", "simulated run time (default 12)", "SECONDS");
    opts.optopt("", "conflict", "report an ARP conflict at this time", "SECONDS");
    opts.optflag("", "no-acd", "skip IPv4 address conflict detection");
    opts.optopt("", "log", "log filter (default debug)", "FILTER");

    let matches = match opts.parse(env::args().skip(1)) {
        Ok(matches) => matches,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1)
        }
    };
    if matches.opt_present("h") || !matches.free.is_empty() {
        let brief = format!("Usage: {} [OPTION]...", env::args().next().unwrap_or_default());
        print!("{}", opts.usage(&brief));
        process::exit(if matches.free.is_empty() { 0 } else { 1 })
    }

    setup_logging(&matches.opt_str("log").unwrap_or_else(|| "debug".to_owned()));

    let mac = parse_opt(&matches, "mac")
        .unwrap_or(EthernetAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]));
    let ipv4: Option<Ipv4Address> = parse_opt(&matches, "ipv4");
    let lease: Option<u64> = parse_opt(&matches, "lease");
    let prefix: Option<Ipv6Address> = parse_opt(&matches, "prefix");
    let seconds: i64 = parse_opt(&matches, "seconds").unwrap_or(12);
    let conflict: Option<i64> = parse_opt(&matches, "conflict");

    let mut config = Config::new(HardwareAddress::Ethernet(mac));
    config.name = Some("eth0");
    config.acd = !matches.opt_present("no-acd");

    let mut stack = Stack::new(StackConfig::new());
    let iface = stack.add_interface(config).unwrap();
    stack.init();

    if let Some(addr) = ipv4 {
        let kind = if lease.is_some() {
            AddressKind::Dhcp
        } else {
            AddressKind::Manual
        };
        if let Err(err) = stack.ipv4_addr_add(iface, addr, kind, lease.map(Duration::from_secs)) {
            eprintln!("cannot add {addr}: {err}");
            process::exit(1)
        }
    }
    if let Some(prefix) = prefix {
        let info = PrefixInformation {
            prefix,
            prefix_len: 64,
            on_link: true,
            autonomous: true,
            valid_lifetime: 7200,
            preferred_lifetime: 3600,
        };
        if let Err(err) = stack.ipv6_handle_prefix_info(iface, &info) {
            eprintln!("cannot use prefix {prefix}: {err}");
            process::exit(1)
        }
    }

    let end = Instant::from_secs(seconds);
    let mut now = Instant::ZERO;
    let mut conflict_at = conflict.map(Instant::from_secs);
    loop {
        stack.poll(now, |id, packet| {
            info!("[{now}] {id} -> {packet}");
            Ok::<_, ()>(())
        });
        while let Some(event) = stack.poll_event() {
            info!("[{now}] event {event}");
        }

        if let (Some(at), Some(addr)) = (conflict_at, ipv4) {
            if at <= now {
                conflict_at = None;
                info!("[{now}] ARP conflict on {addr}");
                if let Err(err) = stack.ipv4_acd_conflict(iface, &addr) {
                    info!("[{now}] conflict ignored: {err}");
                }
                continue;
            }
        }

        let next = [stack.poll_at(now), conflict_at]
            .into_iter()
            .flatten()
            .min();
        match next {
            Some(at) if at <= end => now = at.max(now),
            _ => break,
        }
    }

    let iface = match stack.iface(iface) {
        Some(iface) => iface,
        None => return,
    };
    println!("{} {} mtu {}", iface.name(), iface.oper_state(), iface.mtu());
    if let Some(ipv6) = iface.ipv6() {
        for entry in ipv6.addrs() {
            println!("    inet6 {} {}", entry.address(), entry.state());
        }
    }
    if let Some(ipv4) = iface.ipv4() {
        for entry in ipv4.addrs() {
            println!("    inet {} {}", entry.address(), entry.state());
        }
    }
}
