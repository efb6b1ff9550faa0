#[cfg(feature = "proto-ipv4")]
mod ipv4;

use std::sync::Mutex;

use rstest::*;

use crate::iface::*;
use crate::tests::{ethernet_config, events, setup, TestingLink, MAC};
use crate::time::{Duration, Instant};
use crate::wire::*;
use crate::Error;

#[test]
fn test_default_name_and_lookup() {
    let (mut stack, id) = setup(ethernet_config(true, true));
    let iface = stack.iface(id).unwrap();
    assert_eq!(iface.name(), "net0");
    assert_eq!(iface.mtu(), 1500);
    assert_eq!(iface.oper_state(), OperState::Down);
    assert!(!iface.is_up());

    assert_eq!(stack.get_by_name("net0"), Some(id));
    assert_eq!(
        stack.get_by_link_addr(&HardwareAddress::Ethernet(MAC)),
        Some(id)
    );
    assert_eq!(stack.get_by_index(id.index()).map(|i| i.id()), Some(id));
    assert_eq!(stack.get_default(), Some(id));

    stack.set_name(id, "eth0").unwrap();
    assert_eq!(stack.get_by_name("eth0"), Some(id));
    assert_eq!(stack.get_by_name("net0"), None);
}

#[test]
fn test_name_too_long() {
    let (mut stack, id) = setup(ethernet_config(true, true));
    let name = "x".repeat(crate::config::IFACE_MAX_NAME_LEN + 1);
    assert_eq!(stack.set_name(id, &name), Err(Error::Exhausted));
}

#[test]
fn test_interface_table_full() {
    let mut stack = Stack::new(StackConfig::new());
    for _ in 0..crate::config::IFACE_MAX_COUNT {
        stack.add_interface(Config::new(HardwareAddress::Ip)).unwrap();
    }
    assert_eq!(
        stack.add_interface(Config::new(HardwareAddress::Ip)),
        Err(Error::Exhausted)
    );
}

#[test]
fn test_set_default() {
    let mut stack = Stack::new(StackConfig::new());
    let first = stack.add_interface(Config::new(HardwareAddress::Ip)).unwrap();
    let second = stack.add_interface(ethernet_config(true, true)).unwrap();
    assert_eq!(stack.get_default(), Some(first));
    stack.set_default(second).unwrap();
    assert_eq!(stack.get_default(), Some(second));
    assert_eq!(stack.get_first_up(), None);
}

#[test]
fn test_up_down() {
    let (mut stack, id) = setup(ethernet_config(false, false));
    stack.up(id).unwrap();
    assert_eq!(stack.up(id), Err(Error::Already));

    let iface = stack.iface(id).unwrap();
    assert!(iface.is_up());
    assert!(iface.flag_is_set(Flags::RUNNING));
    assert_eq!(iface.oper_state(), OperState::Up);
    assert_eq!(stack.get_first_up(), Some(id));
    assert_eq!(events(&mut stack), vec![EventKind::IfAdminUp, EventKind::IfUp]);

    stack.down(id).unwrap();
    assert_eq!(stack.down(id), Err(Error::Already));
    let iface = stack.iface(id).unwrap();
    assert!(!iface.is_up());
    assert!(!iface.flag_is_set(Flags::RUNNING));
    assert_eq!(iface.oper_state(), OperState::Down);
    assert_eq!(
        events(&mut stack),
        vec![EventKind::IfDown, EventKind::IfAdminDown]
    );
}

#[rstest]
#[case::carrier_lost(Flags::LOWER_UP, false, OperState::LowerLayerDown)]
#[case::dormant(Flags::DORMANT, true, OperState::Dormant)]
fn test_oper_state(#[case] flag: Flags, #[case] on: bool, #[case] expected: OperState) {
    let (mut stack, id) = setup(ethernet_config(false, false));
    stack.up(id).unwrap();
    events(&mut stack);

    let apply = |stack: &mut Stack, on: bool| match (flag == Flags::LOWER_UP, on) {
        (true, true) => stack.carrier_on(id),
        (true, false) => stack.carrier_off(id),
        (false, true) => stack.dormant_on(id),
        (false, false) => stack.dormant_off(id),
    };

    apply(&mut stack, on).unwrap();
    let iface = stack.iface(id).unwrap();
    assert_eq!(iface.oper_state(), expected);
    assert!(iface.is_admin_up());
    assert!(!iface.is_up());
    assert_eq!(events(&mut stack), vec![EventKind::IfDown]);

    apply(&mut stack, !on).unwrap();
    assert_eq!(stack.iface(id).unwrap().oper_state(), OperState::Up);
    assert_eq!(events(&mut stack), vec![EventKind::IfUp]);
}

#[test]
fn test_no_carrier_at_up() {
    let mut config = ethernet_config(false, false);
    config.flags.remove(Flags::LOWER_UP);
    let (mut stack, id) = setup(config);
    stack.up(id).unwrap();
    assert_eq!(
        stack.iface(id).unwrap().oper_state(),
        OperState::LowerLayerDown
    );
    assert_eq!(events(&mut stack), vec![EventKind::IfAdminUp]);
}

#[test]
fn test_oper_state_change_time() {
    let (mut stack, id) = setup(ethernet_config(false, false));
    let mut link = TestingLink::new();
    link.poll(&mut stack, Instant::from_secs(5));
    stack.up(id).unwrap();
    assert_eq!(
        stack.iface(id).unwrap().oper_state_change_time(),
        Instant::from_secs(5)
    );
}

#[test]
fn test_init_and_shutdown() {
    let mut stack = Stack::new(StackConfig::new());
    let auto = stack.add_interface(ethernet_config(false, false)).unwrap();
    let mut config = ethernet_config(false, false);
    config.flags.insert(Flags::NO_AUTO_START);
    let manual = stack.add_interface(config).unwrap();

    stack.init();
    assert!(stack.iface(auto).unwrap().is_up());
    assert!(!stack.iface(manual).unwrap().is_up());

    stack.shutdown();
    assert!(stack.interfaces().all(|i| !i.is_admin_up()));
}

#[test]
fn test_link_addr_only_while_down() {
    let (mut stack, id) = setup(ethernet_config(false, false));
    let other = HardwareAddress::Ethernet(EthernetAddress([0x02, 0, 0, 0, 0, 2]));
    stack.up(id).unwrap();
    assert_eq!(stack.set_link_addr(id, other), Err(Error::NotPermitted));
    stack.down(id).unwrap();
    stack.set_link_addr(id, other).unwrap();
    assert_eq!(stack.iface(id).unwrap().hardware_addr(), other);
}

#[test]
fn test_suspend_resume() {
    let (mut stack, id) = setup(ethernet_config(false, false));
    assert_eq!(stack.resume(id), Err(Error::NotPermitted));
    stack.suspend(id).unwrap();
    assert!(stack.iface(id).unwrap().is_suspended());
    assert_eq!(stack.suspend(id), Err(Error::Already));
    stack.resume(id).unwrap();
    assert!(!stack.iface(id).unwrap().is_suspended());
}

#[test]
fn test_promisc() {
    let mut stack = Stack::new(StackConfig::new());
    let eth = stack.add_interface(ethernet_config(false, false)).unwrap();
    let tun = stack.add_interface(Config::new(HardwareAddress::Ip)).unwrap();

    assert_eq!(stack.set_promisc(tun), Err(Error::NotSupported));
    stack.set_promisc(eth).unwrap();
    assert!(stack.iface(eth).unwrap().is_promisc());
    assert_eq!(stack.set_promisc(eth), Err(Error::Already));
    stack.unset_promisc(eth).unwrap();
    assert!(!stack.iface(eth).unwrap().is_promisc());
}

#[test]
fn test_flags_without_side_effects() {
    let (mut stack, id) = setup(ethernet_config(false, false));
    let iface = stack.iface_mut(id).unwrap();
    assert!(!iface.flag_test_and_set(Flags::FORWARD_MULTICASTS));
    assert!(iface.flag_test_and_set(Flags::FORWARD_MULTICASTS));
    assert!(iface.flag_test_and_clear(Flags::FORWARD_MULTICASTS));
    assert!(!iface.flag_is_set(Flags::FORWARD_MULTICASTS));
    assert!(iface.tx_lock_required());
    iface.flag_set(Flags::NO_TX_LOCK);
    assert!(!iface.tx_lock_required());
    assert!(events(&mut stack).is_empty());
}

#[test]
fn test_unknown_interface() {
    let (mut stack, id) = setup(ethernet_config(false, false));
    let missing = IfaceId::new(id.index() + 1);
    assert!(stack.iface(missing).is_none());
    assert_eq!(stack.up(missing), Err(Error::NotFound));
    assert_eq!(stack.set_default(missing), Err(Error::NotFound));
}

static JOINS: Mutex<Vec<(u8, IpAddress, bool)>> = Mutex::new(Vec::new());

fn record_join(iface: IfaceId, addr: &IpAddress, joined: bool) {
    JOINS.lock().unwrap().push((iface.index(), *addr, joined));
}

#[test]
#[cfg(feature = "proto-ipv6")]
fn test_monitor_registration() {
    let mut config = ethernet_config(false, true);
    config.flags.insert(Flags::IPV6_NO_MLD);
    let (mut stack, id) = setup(config);
    let group = Ipv6Address::new(0xff02, 0, 0, 0, 0, 0, 0, 0x1234);

    let handle = stack.mcast_monitor_register(Some(id), record_join).unwrap();
    stack.mld_join(id, group).unwrap();
    stack.mcast_monitor_unregister(handle).unwrap();
    assert_eq!(stack.mcast_monitor_unregister(handle), Err(Error::NotFound));
    stack.mld_leave(id, group).unwrap();

    let calls: Vec<_> = JOINS
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, addr, _)| *addr == IpAddress::Ipv6(group))
        .cloned()
        .collect();
    assert_eq!(calls, vec![(id.index(), IpAddress::Ipv6(group), true)]);
}

#[test]
fn test_nothing_pending() {
    let (stack, _) = setup(ethernet_config(false, false));
    assert_eq!(stack.poll_at(Instant::ZERO), None);
    assert_eq!(stack.poll_delay(Instant::ZERO), None);
}

#[test]
#[cfg(feature = "proto-ipv4")]
fn test_poll_delay_counts_from_now() {
    let (mut stack, id) = setup(ethernet_config(false, false));
    stack
        .ipv4_router_add(id, Ipv4Address::new(192, 0, 2, 1), true, 30)
        .unwrap();
    assert_eq!(
        stack.poll_delay(Instant::from_secs(10)),
        Some(Duration::from_secs(20))
    );
    assert_eq!(
        stack.poll_delay(Instant::from_secs(40)),
        Some(Duration::ZERO)
    );
}
