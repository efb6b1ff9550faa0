use smolnetif::iface::{
    AddressKind, AddressState, Config, EventKind, Flags, IfaceId, Packet, PrefixInformation,
    Stack, StackConfig,
};
use smolnetif::time::{Duration, Instant};
use smolnetif::wire::{EthernetAddress, HardwareAddress, IpAddress, Ipv4Address, Ipv6Address};

const MAC: HardwareAddress =
    HardwareAddress::Ethernet(EthernetAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]));
const LEASE: Ipv4Address = Ipv4Address::new(192, 0, 2, 10);
const GATEWAY: Ipv4Address = Ipv4Address::new(192, 0, 2, 1);
const TUNNEL: Ipv4Address = Ipv4Address::new(10, 8, 0, 2);
const LINK_LOCAL: Ipv6Address = Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0xff, 0xfe00, 1);
const GLOBAL: Ipv6Address = Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0xff, 0xfe00, 1);
const ROUTER: Ipv6Address = Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 0x99);

fn setup_logging() {
    let _ = env_logger::Builder::new()
        .is_test(true)
        .parse_filters("debug")
        .parse_env("RUST_LOG")
        .try_init();
}

/// Drives a stack through time, recording every packet and event.
struct Host {
    stack: Stack,
    packets: Vec<(IfaceId, Packet)>,
    events: Vec<(IfaceId, EventKind)>,
}

impl Host {
    fn new() -> Self {
        setup_logging();
        Host {
            stack: Stack::new(StackConfig::new()),
            packets: Vec::new(),
            events: Vec::new(),
        }
    }

    fn poll(&mut self, now: Instant) {
        let packets = &mut self.packets;
        self.stack.poll(now, |id, packet| {
            packets.push((id, packet.clone()));
            Ok::<_, ()>(())
        });
        self.drain_events();
    }

    fn drain_events(&mut self) {
        while let Some(event) = self.stack.poll_event() {
            self.events.push((event.iface, event.kind));
        }
    }

    fn run_until(&mut self, end: Instant) {
        let mut now = self.stack.now();
        for _ in 0..1000 {
            match self.stack.poll_at(now) {
                Some(at) if at <= end => now = at,
                _ => break,
            }
            self.poll(now);
        }
        self.poll(end);
    }

    fn saw(&self, id: IfaceId, kind: EventKind) -> bool {
        self.events.contains(&(id, kind))
    }
}

fn prefix_info(valid: u32, preferred: u32) -> PrefixInformation {
    PrefixInformation {
        prefix: Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0),
        prefix_len: 64,
        on_link: true,
        autonomous: true,
        valid_lifetime: valid,
        preferred_lifetime: preferred,
    }
}

#[test]
fn dual_stack_bring_up() {
    let mut host = Host::new();
    let eth = host.stack.add_interface(Config::new(MAC)).unwrap();
    host.stack.init();
    assert!(host.stack.iface(eth).unwrap().is_up());

    host.stack
        .ipv4_addr_add(eth, LEASE, AddressKind::Dhcp, Some(Duration::from_secs(3600)))
        .unwrap();
    host.stack
        .ipv4_set_netmask(eth, Ipv4Address::new(255, 255, 255, 0))
        .unwrap();
    host.stack.ipv4_set_gw(eth, GATEWAY).unwrap();
    host.stack.ipv4_router_add(eth, GATEWAY, true, 0).unwrap();
    host.stack
        .ipv6_handle_prefix_info(eth, &prefix_info(7200, 3600))
        .unwrap();
    host.stack.ipv6_router_add(eth, ROUTER, 1800).unwrap();

    host.run_until(Instant::from_secs(10));

    assert_eq!(
        host.stack.ipv6_get_ll(eth, Some(AddressState::Preferred)),
        Some(LINK_LOCAL)
    );
    assert_eq!(host.stack.ipv6_get_global_addr(None), Some((eth, GLOBAL)));
    assert!(host
        .stack
        .ipv4_addr_lookup_by_iface(eth, &LEASE)
        .unwrap()
        .is_preferred());
    assert!(host.saw(eth, EventKind::Ipv6DadSucceeded(LINK_LOCAL)));
    assert!(host.saw(eth, EventKind::Ipv6DadSucceeded(GLOBAL)));
    assert!(host.saw(eth, EventKind::Ipv4AcdSucceeded(LEASE)));

    let sent: Vec<_> = host.packets.iter().map(|(_, p)| p.clone()).collect();
    assert!(sent.contains(&Packet::NeighborSolicitation { target: LINK_LOCAL }));
    assert!(sent.contains(&Packet::NeighborSolicitation { target: GLOBAL }));
    assert!(sent.contains(&Packet::RouterSolicitation));
    assert_eq!(
        sent.iter()
            .filter(|p| matches!(p, Packet::ArpProbe { target } if *target == LEASE))
            .count(),
        3
    );

    let remote6 = Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x99);
    assert_eq!(host.stack.ipv6_select_src_addr(None, &remote6), GLOBAL);
    assert_eq!(host.stack.ipv6_addr_onlink(&remote6), Some(eth));
    assert_eq!(
        host.stack.ipv4_select_src_addr(None, &Ipv4Address::new(198, 51, 100, 1)),
        LEASE
    );
    assert_eq!(
        host.stack
            .ipv6_router_find_default(None)
            .map(|r| r.address),
        Some(IpAddress::Ipv6(ROUTER))
    );

    host.stack.shutdown();
    host.drain_events();
    assert!(host.saw(eth, EventKind::IfAdminDown));
    assert!(host
        .stack
        .ipv6_addr_lookup_by_iface(eth, &LINK_LOCAL)
        .unwrap()
        .is_tentative());
}

#[test]
fn leases_and_routers_expire() {
    let mut host = Host::new();
    let mut config = Config::new(MAC);
    config.acd = false;
    config.flags.remove(Flags::IPV6);
    let eth = host.stack.add_interface(config).unwrap();
    host.stack.up(eth).unwrap();

    host.stack
        .ipv4_addr_add(eth, LEASE, AddressKind::Dhcp, Some(Duration::from_secs(60)))
        .unwrap();
    host.stack.ipv4_router_add(eth, GATEWAY, true, 30).unwrap();

    host.run_until(Instant::from_secs(29));
    assert!(host.stack.ipv4_router_lookup(eth, &GATEWAY).is_some());

    host.run_until(Instant::from_secs(30));
    assert!(host.stack.ipv4_router_lookup(eth, &GATEWAY).is_none());
    assert!(host.saw(eth, EventKind::Ipv4RouterDel(GATEWAY)));

    host.run_until(Instant::from_secs(120));
    assert!(host.stack.ipv4_addr_lookup(&LEASE).is_none());
    assert!(host.saw(eth, EventKind::Ipv4AddrDel(LEASE)));
    assert_eq!(host.stack.poll_at(Instant::from_secs(120)), None);
}

#[test]
fn source_interface_across_links() {
    let mut host = Host::new();
    let mut config = Config::new(MAC);
    config.acd = false;
    let eth = host.stack.add_interface(config).unwrap();
    let mut config = Config::new(HardwareAddress::Ip);
    config.flags.remove(Flags::IPV6);
    let tun = host.stack.add_interface(config).unwrap();
    host.stack.init();

    host.stack
        .ipv4_addr_add(eth, LEASE, AddressKind::Manual, None)
        .unwrap();
    host.stack
        .ipv4_set_netmask(eth, Ipv4Address::new(255, 255, 255, 0))
        .unwrap();
    host.stack
        .ipv4_addr_add(tun, TUNNEL, AddressKind::Manual, None)
        .unwrap();
    host.stack
        .ipv4_set_netmask(tun, Ipv4Address::new(255, 0, 0, 0))
        .unwrap();
    // Without ARP on the tunnel the address is usable at once.
    assert!(host
        .stack
        .ipv4_addr_lookup_by_iface(tun, &TUNNEL)
        .unwrap()
        .is_preferred());

    assert_eq!(
        host.stack
            .select_src_iface(&IpAddress::Ipv4(Ipv4Address::new(10, 1, 2, 3))),
        Some(tun)
    );
    assert_eq!(
        host.stack
            .select_src_iface(&IpAddress::Ipv4(Ipv4Address::new(192, 0, 2, 77))),
        Some(eth)
    );
    assert_eq!(
        host.stack
            .select_src_iface(&IpAddress::Ipv4(Ipv4Address::new(203, 0, 113, 5))),
        host.stack.get_default()
    );
    assert_eq!(
        host.stack
            .ipv4_select_src_addr(Some(tun), &Ipv4Address::new(10, 1, 2, 3)),
        TUNNEL
    );

    host.stack.carrier_off(eth).unwrap();
    host.drain_events();
    assert!(host.saw(eth, EventKind::IfDown));
    assert_eq!(host.stack.get_first_up(), Some(tun));
}
