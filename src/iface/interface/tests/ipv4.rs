use rstest::*;

use super::*;

const ADDR: Ipv4Address = Ipv4Address::new(192, 0, 2, 10);
const OTHER: Ipv4Address = Ipv4Address::new(192, 0, 2, 20);
const LINK_LOCAL: Ipv4Address = Ipv4Address::new(169, 254, 3, 4);
const GROUP: Ipv4Address = Ipv4Address::new(239, 1, 2, 3);
const SOURCE: Ipv4Address = Ipv4Address::new(198, 51, 100, 7);

fn ipv4_config(acd: bool) -> Config {
    let mut config = ethernet_config(true, false);
    config.acd = acd;
    config
}

fn setup_up(config: Config) -> (Stack, IfaceId, TestingLink) {
    let (mut stack, id) = setup(config);
    stack.up(id).unwrap();
    (stack, id, TestingLink::new())
}

fn report(group: Ipv4Address, mode: FilterMode, sources: &[Ipv4Address], join: bool) -> Packet {
    Packet::IgmpReport {
        group,
        mode,
        sources: heapless::Vec::from_slice(sources).unwrap(),
        join,
    }
}

#[test]
fn test_all_systems_joined_on_up() {
    let (mut stack, id, mut link) = setup_up(ipv4_config(true));
    assert_eq!(
        events(&mut stack),
        vec![
            EventKind::IfAdminUp,
            EventKind::IfUp,
            EventKind::Ipv4MaddrAdd(IPV4_MULTICAST_ALL_SYSTEMS),
            EventKind::McastJoin(IPV4_MULTICAST_ALL_SYSTEMS.into()),
        ]
    );
    assert!(stack.ipv4_maddr_is_joined(id, &IPV4_MULTICAST_ALL_SYSTEMS));

    link.poll(&mut stack, Instant::ZERO);
    assert!(link.take().is_empty());
    assert_eq!(stack.poll_at(Instant::ZERO), None);
}

#[test]
fn test_acd_sequence() {
    let (mut stack, id, mut link) = setup_up(ipv4_config(true));
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
        .unwrap();
    let entry = stack.ipv4_addr_lookup_by_iface(id, &ADDR).unwrap();
    assert!(entry.is_tentative());
    assert_eq!(entry.acd_state(), Some(AcdState::Probing));
    assert_eq!(entry.acd_count(), Some(0));
    assert!(stack.poll_at(Instant::ZERO).unwrap() <= Instant::from_secs(1));
    assert_eq!(stack.ipv4_get_global_addr(id, Some(AddressState::Preferred)), None);

    link.run_until(&mut stack, Instant::from_secs(10));
    assert_eq!(
        link.take(),
        vec![
            Packet::ArpProbe { target: ADDR },
            Packet::ArpProbe { target: ADDR },
            Packet::ArpProbe { target: ADDR },
            Packet::ArpAnnounce { addr: ADDR },
            Packet::ArpAnnounce { addr: ADDR },
        ]
    );
    let entry = stack.ipv4_addr_lookup_by_iface(id, &ADDR).unwrap();
    assert!(entry.is_preferred());
    assert_eq!(entry.acd_state(), Some(AcdState::Announced));
    assert!(events(&mut stack).contains(&EventKind::Ipv4AcdSucceeded(ADDR)));
    assert_eq!(stack.poll_at(Instant::from_secs(10)), None);
    assert_eq!(
        stack.ipv4_get_global_addr(id, Some(AddressState::Preferred)),
        Some(ADDR)
    );
}

#[test]
fn test_acd_disabled() {
    let (mut stack, id, mut link) = setup_up(ipv4_config(false));
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
        .unwrap();
    let entry = stack.ipv4_addr_lookup_by_iface(id, &ADDR).unwrap();
    assert!(entry.is_preferred());
    assert_eq!(entry.acd_state(), None);

    link.run_until(&mut stack, Instant::from_secs(10));
    assert!(link.take().is_empty());
    assert_eq!(
        stack.ipv4_acd_conflict(id, &ADDR),
        Err(Error::InvalidState)
    );
}

#[rstest]
#[case::loopback(Flags::empty(), Ipv4Address::new(127, 0, 0, 2))]
#[case::point_to_point(Flags::POINTOPOINT, ADDR)]
fn test_acd_not_applicable(#[case] flags: Flags, #[case] addr: Ipv4Address) {
    let mut config = ipv4_config(true);
    config.flags.insert(flags);
    let (mut stack, id, _) = setup_up(config);
    stack
        .ipv4_addr_add(id, addr, AddressKind::Manual, None)
        .unwrap();
    assert!(stack
        .ipv4_addr_lookup_by_iface(id, &addr)
        .unwrap()
        .is_preferred());
}

#[test]
fn test_acd_deferred_until_up() {
    let (mut stack, id) = setup(ipv4_config(true));
    let mut link = TestingLink::new();
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
        .unwrap();
    let entry = stack.ipv4_addr_lookup_by_iface(id, &ADDR).unwrap();
    assert!(entry.is_tentative());
    assert_eq!(entry.acd_state(), None);

    stack.up(id).unwrap();
    assert_eq!(
        stack.ipv4_addr_lookup_by_iface(id, &ADDR).unwrap().acd_state(),
        Some(AcdState::Probing)
    );
    link.run_until(&mut stack, Instant::from_secs(10));
    assert!(stack
        .ipv4_addr_lookup_by_iface(id, &ADDR)
        .unwrap()
        .is_preferred());

    stack.down(id).unwrap();
    let entry = stack.ipv4_addr_lookup_by_iface(id, &ADDR).unwrap();
    assert!(entry.is_tentative());
    assert_eq!(entry.acd_state(), None);
}

#[test]
fn test_conflict_while_down() {
    let (mut stack, id) = setup(ipv4_config(true));
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
        .unwrap();
    events(&mut stack);

    stack.ipv4_acd_conflict(id, &ADDR).unwrap();
    assert!(stack.ipv4_addr_lookup_by_iface(id, &ADDR).is_none());
    assert_eq!(
        events(&mut stack),
        vec![EventKind::Ipv4AcdFailed(ADDR), EventKind::Ipv4AddrDel(ADDR)]
    );
}

#[test]
fn test_conflict_while_probing() {
    let (mut stack, id, mut link) = setup_up(ipv4_config(true));
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
        .unwrap();
    link.poll(&mut stack, Instant::from_secs(1));
    assert_eq!(link.take(), vec![Packet::ArpProbe { target: ADDR }]);
    events(&mut stack);

    stack.ipv4_acd_conflict(id, &ADDR).unwrap();
    assert!(stack.ipv4_addr_lookup_by_iface(id, &ADDR).is_none());
    assert_eq!(
        events(&mut stack),
        vec![EventKind::Ipv4AcdFailed(ADDR), EventKind::Ipv4AddrDel(ADDR)]
    );
    assert_eq!(stack.iface(id).unwrap().ipv4().unwrap().conflict_count(), 1);
    assert_eq!(stack.ipv4_acd_conflict(id, &ADDR), Err(Error::NotFound));
}

#[test]
fn test_defend_then_give_up() {
    let (mut stack, id, mut link) = setup_up(ipv4_config(true));
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
        .unwrap();
    link.run_until(&mut stack, Instant::from_secs(10));
    link.take();
    events(&mut stack);

    stack.ipv4_acd_conflict(id, &ADDR).unwrap();
    assert_eq!(stack.poll_at(Instant::from_secs(10)), Some(Instant::from_secs(10)));
    link.poll(&mut stack, Instant::from_secs(10));
    assert_eq!(link.take(), vec![Packet::ArpAnnounce { addr: ADDR }]);

    // Conflicts further apart than the defend interval are defended again.
    link.poll(&mut stack, Instant::from_secs(25));
    stack.ipv4_acd_conflict(id, &ADDR).unwrap();
    link.poll(&mut stack, Instant::from_secs(25));
    assert_eq!(link.take(), vec![Packet::ArpAnnounce { addr: ADDR }]);
    assert!(events(&mut stack).is_empty());

    link.poll(&mut stack, Instant::from_secs(30));
    stack.ipv4_acd_conflict(id, &ADDR).unwrap();
    assert!(stack.ipv4_addr_lookup_by_iface(id, &ADDR).is_none());
    assert_eq!(
        events(&mut stack),
        vec![EventKind::Ipv4AcdConflict(ADDR), EventKind::Ipv4AddrDel(ADDR)]
    );
}

#[test]
fn test_probing_rate_limited_after_conflicts() {
    let (mut stack, id, _) = setup_up(ipv4_config(true));
    for _ in 0..10 {
        stack
            .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
            .unwrap();
        stack.ipv4_acd_conflict(id, &ADDR).unwrap();
    }
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
        .unwrap();
    assert_eq!(stack.poll_at(Instant::ZERO), Some(Instant::from_secs(60)));
}

#[test]
fn test_dhcp_replaces_overridable() {
    let (mut stack, id) = setup(ipv4_config(false));
    stack
        .ipv4_addr_add(id, OTHER, AddressKind::Overridable, None)
        .unwrap();
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Dhcp, None)
        .unwrap();
    assert!(stack.ipv4_addr_lookup(&OTHER).is_none());
    assert_eq!(stack.ipv4_addr_lookup(&ADDR).map(|(i, _)| i), Some(id));
    assert_eq!(
        events(&mut stack),
        vec![
            EventKind::Ipv4AddrAdd(OTHER),
            EventKind::Ipv4AddrDel(OTHER),
            EventKind::Ipv4AddrAdd(ADDR),
        ]
    );
}

#[test]
fn test_dhcp_keeps_manual() {
    let (mut stack, id) = setup(ipv4_config(false));
    stack
        .ipv4_addr_add(id, OTHER, AddressKind::Manual, None)
        .unwrap();
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Dhcp, None)
        .unwrap();
    assert_eq!(stack.iface(id).unwrap().ipv4().unwrap().addrs().count(), 2);
}

#[test]
fn test_lease_expiry() {
    let (mut stack, id) = setup(ipv4_config(false));
    let mut link = TestingLink::new();
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Dhcp, Some(Duration::from_secs(3600)))
        .unwrap();
    let entry = stack.ipv4_addr_lookup_by_iface(id, &ADDR).unwrap();
    assert_eq!(entry.lifetime().expire_at, Some(Instant::from_secs(3600)));
    assert_eq!(entry.lifetime().deprecate_at, None);
    assert_eq!(stack.poll_at(Instant::ZERO), Some(Instant::from_secs(3600)));

    link.poll(&mut stack, Instant::from_secs(3599));
    assert!(stack.ipv4_addr_lookup_by_iface(id, &ADDR).is_some());
    link.poll(&mut stack, Instant::from_secs(3600));
    assert!(stack.ipv4_addr_lookup_by_iface(id, &ADDR).is_none());
}

#[test]
fn test_set_lifetimes() {
    let (mut stack, id) = setup(ipv4_config(false));
    let mut link = TestingLink::new();
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
        .unwrap();
    stack
        .ipv4_addr_set_lifetimes(
            id,
            &ADDR,
            Some(Duration::from_secs(10)),
            Some(Duration::from_secs(20)),
        )
        .unwrap();
    events(&mut stack);

    link.poll(&mut stack, Instant::from_secs(10));
    assert_eq!(
        stack.ipv4_addr_lookup_by_iface(id, &ADDR).unwrap().state(),
        AddressState::Deprecated
    );
    assert_eq!(events(&mut stack), vec![EventKind::Ipv4AddrDeprecated(ADDR)]);

    link.poll(&mut stack, Instant::from_secs(20));
    assert!(stack.ipv4_addr_lookup_by_iface(id, &ADDR).is_none());
}

#[rstest]
#[case::multicast(GROUP)]
#[case::broadcast(Ipv4Address::BROADCAST)]
#[case::unspecified(Ipv4Address::UNSPECIFIED)]
fn test_addr_add_unaddressable(#[case] addr: Ipv4Address) {
    let (mut stack, id) = setup(ipv4_config(false));
    assert_eq!(
        stack.ipv4_addr_add(id, addr, AddressKind::Manual, None),
        Err(Error::Unaddressable)
    );
}

#[test]
fn test_no_ipv4_on_interface() {
    let (mut stack, id) = setup(ethernet_config(false, true));
    assert_eq!(
        stack.ipv4_addr_add(id, ADDR, AddressKind::Manual, None),
        Err(Error::NoConfig)
    );
    assert_eq!(stack.ipv4_get_netmask(id), None);
}

#[test]
fn test_netmask() {
    let (mut stack, id) = setup(ipv4_config(false));
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
        .unwrap();
    assert!(stack.ipv4_addr_mask_cmp(id, &SOURCE));

    let mask = Ipv4Address::new(255, 255, 255, 0);
    stack.ipv4_set_netmask(id, mask).unwrap();
    assert_eq!(stack.ipv4_get_netmask(id), Some(mask));
    assert_eq!(stack.ipv4_get_netmask_by_addr(id, &ADDR), Some(mask));
    assert!(stack.ipv4_addr_mask_cmp(id, &OTHER));
    assert!(!stack.ipv4_addr_mask_cmp(id, &SOURCE));
    assert_eq!(stack.ipv4_select_src_iface(&OTHER), Some(id));

    let wide = Ipv4Address::new(255, 255, 0, 0);
    stack.ipv4_set_netmask_by_addr(id, &ADDR, wide).unwrap();
    assert_eq!(stack.ipv4_get_netmask_by_addr(id, &ADDR), Some(wide));
    assert_eq!(stack.ipv4_get_netmask(id), Some(mask));
    assert!(stack.ipv4_addr_mask_cmp(id, &Ipv4Address::new(192, 0, 77, 1)));
    assert_eq!(
        stack.ipv4_set_netmask_by_addr(id, &OTHER, wide),
        Err(Error::NotFound)
    );
}

#[rstest]
#[case::limited(24, Ipv4Address::BROADCAST, true)]
#[case::directed(24, Ipv4Address::new(192, 0, 2, 255), true)]
#[case::host(24, Ipv4Address::new(192, 0, 2, 77), false)]
#[case::other_subnet(24, Ipv4Address::new(198, 51, 100, 255), false)]
#[case::point_to_point_link(31, Ipv4Address::new(192, 0, 2, 11), false)]
fn test_is_addr_bcast(#[case] len: u8, #[case] addr: Ipv4Address, #[case] expected: bool) {
    let (mut stack, id) = setup(ipv4_config(false));
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
        .unwrap();
    stack.ipv4_set_netmask(id, ipv4_netmask(len)).unwrap();
    assert_eq!(stack.ipv4_is_addr_bcast(id, &addr), expected);
}

#[test]
fn test_gateway_and_ttl() {
    let (mut stack, id) = setup(ipv4_config(false));
    let gateway = Ipv4Address::new(192, 0, 2, 1);
    stack.ipv4_set_gw(id, gateway).unwrap();
    stack.ipv4_set_ttl(id, 32).unwrap();
    stack.ipv4_set_mcast_ttl(id, 4).unwrap();
    assert_eq!(stack.ipv4_get_gw(id), Some(gateway));
    let ipv4 = stack.iface(id).unwrap().ipv4().unwrap();
    assert_eq!(ipv4.ttl(), 32);
    assert_eq!(ipv4.mcast_ttl(), 4);
}

#[test]
fn test_select_src_addr() {
    let (mut stack, id, _) = setup_up(ipv4_config(false));
    let private = Ipv4Address::new(10, 0, 0, 5);
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
        .unwrap();
    stack
        .ipv4_addr_add(id, private, AddressKind::Manual, None)
        .unwrap();

    assert_eq!(
        stack.ipv4_select_src_addr(None, &Ipv4Address::new(192, 0, 2, 99)),
        ADDR
    );
    assert_eq!(
        stack.ipv4_select_src_addr(Some(id), &Ipv4Address::new(10, 1, 1, 1)),
        private
    );
    assert_eq!(
        stack.ipv4_select_src_addr(None, &Ipv4Address::new(169, 254, 9, 9)),
        Ipv4Address::UNSPECIFIED
    );
    let multicast_src = stack.ipv4_select_src_addr(None, &GROUP);
    assert!(multicast_src == ADDR || multicast_src == private);

    stack
        .ipv4_addr_add(id, LINK_LOCAL, AddressKind::Autoconf, None)
        .unwrap();
    assert_eq!(
        stack.ipv4_select_src_addr(None, &Ipv4Address::new(169, 254, 9, 9)),
        LINK_LOCAL
    );
    assert_eq!(stack.ipv4_select_src_addr(None, &GROUP), LINK_LOCAL);
    assert_eq!(
        stack.ipv4_get_ll(id, Some(AddressState::Preferred)),
        Some(LINK_LOCAL)
    );
    assert_eq!(stack.ipv4_get_global_addr(id, None), Some(ADDR));
}

#[test]
fn test_select_src_iface_falls_back_to_default() {
    let (stack, id) = setup(ipv4_config(false));
    assert_eq!(stack.select_src_iface(&IpAddress::v4(203, 0, 113, 1)), Some(id));
}

#[test]
fn test_select_src_iface_without_netmask() {
    let (mut stack, default) = setup(ipv4_config(false));
    let other = stack.add_interface(ipv4_config(false)).unwrap();
    stack
        .ipv4_addr_add(other, ADDR, AddressKind::Manual, None)
        .unwrap();
    assert_eq!(stack.get_default(), Some(default));
    assert_eq!(
        stack.ipv4_select_src_iface(&Ipv4Address::new(8, 8, 8, 8)),
        Some(other)
    );

    stack
        .ipv4_set_netmask_by_addr(other, &ADDR, Ipv4Address::new(255, 255, 255, 0))
        .unwrap();
    assert_eq!(
        stack.ipv4_select_src_iface(&Ipv4Address::new(8, 8, 8, 8)),
        Some(default)
    );
}

#[test]
fn test_igmp_join_leave() {
    let (mut stack, id, mut link) = setup_up(ipv4_config(false));
    events(&mut stack);

    stack
        .igmp_join(id, GROUP, &[SOURCE], FilterMode::Include)
        .unwrap();
    assert_eq!(
        stack.igmp_join(id, GROUP, &[], FilterMode::Exclude),
        Err(Error::Already)
    );
    link.poll(&mut stack, Instant::ZERO);
    assert_eq!(
        link.take(),
        vec![report(GROUP, FilterMode::Include, &[SOURCE], true)]
    );
    let (_, group) = stack.ipv4_maddr_lookup(&GROUP, None).unwrap();
    assert!(group.is_joined());
    assert_eq!(group.filter_mode(), FilterMode::Include);
    assert_eq!(group.sources(), &[SOURCE]);
    assert_eq!(
        events(&mut stack),
        vec![
            EventKind::Ipv4MaddrAdd(GROUP),
            EventKind::McastJoin(GROUP.into()),
        ]
    );

    stack.igmp_leave(id, GROUP).unwrap();
    link.poll(&mut stack, Instant::ZERO);
    assert_eq!(
        link.take(),
        vec![report(GROUP, FilterMode::Include, &[], false)]
    );
    assert_eq!(
        events(&mut stack),
        vec![
            EventKind::McastLeave(GROUP.into()),
            EventKind::Ipv4MaddrDel(GROUP),
        ]
    );
    assert_eq!(stack.igmp_leave(id, GROUP), Err(Error::NotFound));
}

#[test]
fn test_igmp_rejoin_after_down() {
    let (mut stack, id, mut link) = setup_up(ipv4_config(false));
    stack
        .igmp_join(id, GROUP, &[], FilterMode::Exclude)
        .unwrap();
    link.poll(&mut stack, Instant::ZERO);
    link.take();

    stack.down(id).unwrap();
    assert!(!stack.ipv4_maddr_is_joined(id, &GROUP));
    assert!(!stack.ipv4_maddr_is_joined(id, &IPV4_MULTICAST_ALL_SYSTEMS));
    assert_eq!(
        stack.igmp_join(id, GROUP, &[], FilterMode::Exclude),
        Err(Error::Already)
    );

    stack.up(id).unwrap();
    assert!(stack.ipv4_maddr_is_joined(id, &IPV4_MULTICAST_ALL_SYSTEMS));
    link.poll(&mut stack, Instant::ZERO);
    assert_eq!(
        link.take(),
        vec![report(GROUP, FilterMode::Exclude, &[], true)]
    );
}

#[test]
fn test_igmp_join_while_down() {
    let (mut stack, id) = setup(ipv4_config(false));
    let mut link = TestingLink::new();
    stack
        .igmp_join(id, GROUP, &[], FilterMode::Exclude)
        .unwrap();
    assert!(stack.ipv4_maddr_is_joined(id, &GROUP));

    stack.igmp_leave(id, GROUP).unwrap();
    assert!(stack.ipv4_maddr_lookup(&GROUP, Some(id)).is_none());
    link.poll(&mut stack, Instant::ZERO);
    assert!(link.take().is_empty());
}

#[test]
fn test_igmp_too_many_sources() {
    let (mut stack, id) = setup(ipv4_config(false));
    let sources = vec![SOURCE; crate::config::IFACE_MAX_MCAST_SOURCE_COUNT + 1];
    assert_eq!(
        stack.igmp_join(id, GROUP, &sources, FilterMode::Include),
        Err(Error::Exhausted)
    );
    assert!(stack.ipv4_maddr_lookup(&GROUP, None).is_none());
}

#[test]
fn test_igmp_unaddressable() {
    let (mut stack, id) = setup(ipv4_config(false));
    assert_eq!(
        stack.igmp_join(id, ADDR, &[], FilterMode::Exclude),
        Err(Error::Unaddressable)
    );
    assert_eq!(stack.igmp_leave(id, ADDR), Err(Error::Unaddressable));
}

#[test]
fn test_maddr_local_only() {
    let (mut stack, id, mut link) = setup_up(ipv4_config(false));
    stack.ipv4_maddr_add(id, GROUP).unwrap();
    stack.ipv4_maddr_join(id, &GROUP).unwrap();
    assert!(stack.ipv4_maddr_is_joined(id, &GROUP));
    stack.ipv4_maddr_leave(id, &GROUP).unwrap();
    assert!(!stack.ipv4_maddr_is_joined(id, &GROUP));
    stack.ipv4_maddr_rm(id, &GROUP).unwrap();
    assert_eq!(stack.ipv4_maddr_rm(id, &GROUP), Err(Error::NotFound));

    link.poll(&mut stack, Instant::ZERO);
    assert!(link.take().is_empty());
}

#[test]
fn test_routers() {
    let (mut stack, id) = setup(ipv4_config(false));
    let mut link = TestingLink::new();
    let gateway = Ipv4Address::new(192, 0, 2, 1);
    let transient = Ipv4Address::new(192, 0, 2, 2);

    stack.ipv4_router_add(id, gateway, true, 0).unwrap();
    stack.ipv4_router_add(id, transient, false, 10).unwrap();
    assert_eq!(
        stack.ipv4_router_find_default(Some(id)).map(|r| r.address),
        Some(gateway.into())
    );
    events(&mut stack);

    link.poll(&mut stack, Instant::from_secs(10));
    assert!(stack.ipv4_router_lookup(id, &transient).is_none());
    assert!(stack.ipv4_router_lookup(id, &gateway).is_some());
    assert_eq!(events(&mut stack), vec![EventKind::Ipv4RouterDel(transient)]);

    stack.ipv4_router_rm(id, &gateway).unwrap();
    assert_eq!(stack.ipv4_router_find_default(None), None);
}

#[test]
fn test_addr_ref() {
    let (mut stack, id) = setup(ipv4_config(false));
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
        .unwrap();
    let handle = stack.addr_ref(id, ADDR.into()).unwrap();
    stack.ipv4_addr_rm(id, &ADDR).unwrap();
    assert!(stack.ipv4_addr_lookup(&ADDR).is_none());
    assert_eq!(stack.addr_unref(handle), Ok(0));
    assert!(events(&mut stack).contains(&EventKind::Ipv4AddrDel(ADDR)));
}

#[test]
fn test_stale_handle_after_config_put() {
    let (mut stack, id) = setup(ipv4_config(false));
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
        .unwrap();
    let stale = stack.addr_ref(id, ADDR.into()).unwrap();
    stack.config_ipv4_put(id).unwrap();
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
        .unwrap();
    events(&mut stack);

    assert_eq!(stack.addr_unref(stale), Err(Error::NotFound));
    let entry = stack.ipv4_addr_lookup_by_iface(id, &ADDR).unwrap();
    assert!(entry.is_added());
    assert_eq!(entry.refcount(), 1);
    assert!(events(&mut stack).is_empty());
}

#[test]
fn test_config_put() {
    let (mut stack, id, _) = setup_up(ipv4_config(false));
    stack
        .ipv4_addr_add(id, ADDR, AddressKind::Manual, None)
        .unwrap();
    events(&mut stack);

    stack.config_ipv4_put(id).unwrap();
    assert_eq!(
        events(&mut stack),
        vec![
            EventKind::McastLeave(IPV4_MULTICAST_ALL_SYSTEMS.into()),
            EventKind::Ipv4AddrDel(ADDR),
        ]
    );
    assert_eq!(stack.config_ipv4_put(id), Err(Error::Already));
}
