use heapless::Vec;

use super::address::{AddrHandle, AddressKind, AddressState};
#[cfg(feature = "proto-ipv4")]
use super::address::Ipv4AddrEntry;
#[cfg(feature = "proto-ipv6")]
use super::address::{Ipv6AddrEntry, Ipv6AddrParams};
use super::event::{Event, EventKind, Events};
use super::interface::{Config as InterfaceConfig, Flags, IfaceId, Interface, L2Flags};
#[cfg(feature = "proto-ipv4")]
use super::multicast::{FilterMode, Ipv4Group};
#[cfg(feature = "proto-ipv6")]
use super::multicast::Ipv6Group;
use super::multicast::{McastMonitor, MonitorHandle, Monitors};
use super::packet::Packet;
#[cfg(feature = "proto-ipv6")]
use super::prefix::{Prefix, PrefixInformation, INFINITE_LIFETIME};
use super::router::{Router, Routers};
use crate::config::IFACE_MAX_COUNT;
use crate::rand::Rand;
use crate::time::{Duration, Instant};
#[cfg(feature = "proto-ipv4")]
use crate::wire::Ipv4Address;
#[cfg(feature = "proto-ipv6")]
use crate::wire::{Ipv6Address, Ipv6AddressExt};
use crate::wire::{HardwareAddress, IpAddress, IpVersion};
use crate::{Error, Result};

/// Configuration of a [Stack].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct Config {
    /// Seed of the generator behind randomized timers (reachable time,
    /// ARP probe spacing).
    ///
    /// It is strongly recommended that the random seed is different on each
    /// boot, to avoid problems with probes of several hosts lining up.
    pub random_seed: u64,
}

impl Config {
    pub fn new() -> Self {
        Config { random_seed: 0 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by all interfaces, split off the interface list so that an
/// interface and the shared state can be borrowed at the same time.
#[derive(Debug)]
pub(crate) struct Context {
    pub(crate) now: Instant,
    pub(crate) rand: Rand,
    pub(crate) routers: Routers,
    pub(crate) monitors: Monitors,
    pub(crate) events: Events,
    pub(crate) default_iface: Option<IfaceId>,
    generation: u16,
    #[cfg(feature = "proto-ipv6")]
    pub(crate) ipv6_configs: usize,
    #[cfg(feature = "proto-ipv4")]
    pub(crate) ipv4_configs: usize,
}

impl Context {
    fn new(random_seed: u64) -> Self {
        Context {
            now: Instant::ZERO,
            rand: Rand::new(random_seed),
            routers: Routers::new(),
            monitors: Monitors::new(),
            events: Events::new(),
            default_iface: None,
            generation: 0,
            #[cfg(feature = "proto-ipv6")]
            ipv6_configs: 0,
            #[cfg(feature = "proto-ipv4")]
            ipv4_configs: 0,
        }
    }

    /// Tag for a newly allocated address slot.
    pub(crate) fn next_generation(&mut self) -> u16 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    pub(crate) fn push_event(&mut self, iface: IfaceId, kind: EventKind) {
        self.events.push(iface, kind)
    }

    /// Tell the monitors and the event queue about a join or a leave.
    pub(crate) fn notify_mcast(&mut self, iface: IfaceId, addr: IpAddress, joined: bool) {
        net_debug!(
            "iface {}: {} {}",
            iface,
            if joined { "joined" } else { "left" },
            addr
        );
        self.monitors.notify(iface, &addr, joined);
        let kind = if joined {
            EventKind::McastJoin(addr)
        } else {
            EventKind::McastLeave(addr)
        };
        self.events.push(iface, kind);
    }
}

fn router_del_event(address: &IpAddress) -> EventKind {
    match address {
        #[cfg(feature = "proto-ipv6")]
        IpAddress::Ipv6(addr) => EventKind::Ipv6RouterDel(*addr),
        #[cfg(feature = "proto-ipv4")]
        IpAddress::Ipv4(addr) => EventKind::Ipv4RouterDel(*addr),
    }
}

fn router_add_event(address: &IpAddress) -> EventKind {
    match address {
        #[cfg(feature = "proto-ipv6")]
        IpAddress::Ipv6(addr) => EventKind::Ipv6RouterAdd(*addr),
        #[cfg(feature = "proto-ipv4")]
        IpAddress::Ipv4(addr) => EventKind::Ipv4RouterAdd(*addr),
    }
}

/// The interface registry.
///
/// Owns every network interface, the router table, the multicast monitors
/// and the event queue. All operations take effect immediately; timers run
/// from [poll](Stack::poll).
#[derive(Debug)]
pub struct Stack {
    ifaces: Vec<Interface, IFACE_MAX_COUNT>,
    inner: Context,
}

impl Stack {
    pub fn new(config: Config) -> Self {
        Stack {
            ifaces: Vec::new(),
            inner: Context::new(config.random_seed),
        }
    }

    /// The time given to the last [poll](Stack::poll). Lifetimes given to
    /// operations count from here.
    pub fn now(&self) -> Instant {
        self.inner.now
    }

    fn split(&mut self, id: IfaceId) -> Result<(&mut Interface, &mut Context)> {
        let iface = self.ifaces.get_mut(id.slot()).ok_or(Error::NotFound)?;
        Ok((iface, &mut self.inner))
    }

    /// Register an interface. It starts administratively down.
    pub fn add_interface(&mut self, config: InterfaceConfig) -> Result<IfaceId> {
        if self.ifaces.is_full() {
            return Err(Error::Exhausted);
        }
        let id = IfaceId::new(self.ifaces.len() as u8 + 1);
        let iface = Interface::new(id, config, self.inner.now)?;
        net_debug!("iface {}: added as {}", id, iface.name());
        self.ifaces.push(iface).map_err(|_| Error::Exhausted)?;
        if self.inner.default_iface.is_none() {
            self.inner.default_iface = Some(id);
        }
        Ok(id)
    }

    /// Bring up every interface without [Flags::NO_AUTO_START].
    pub fn init(&mut self) {
        for index in 0..self.ifaces.len() {
            let id = self.ifaces[index].id();
            if self.ifaces[index].flag_is_set(Flags::NO_AUTO_START) {
                continue;
            }
            match self.up(id) {
                Ok(()) | Err(Error::Already) => (),
                Err(err) => net_debug!("iface {}: cannot bring up: {}", id, err),
            }
        }
    }

    /// Take every interface down.
    pub fn shutdown(&mut self) {
        for index in 0..self.ifaces.len() {
            let id = self.ifaces[index].id();
            let _ = self.down(id);
        }
    }

    pub fn iface(&self, id: IfaceId) -> Option<&Interface> {
        self.ifaces.get(id.slot())
    }

    /// Direct access to an interface. Flag changes made through it have no
    /// side effects; use [up](Stack::up) and friends for those.
    pub fn iface_mut(&mut self, id: IfaceId) -> Option<&mut Interface> {
        self.ifaces.get_mut(id.slot())
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &Interface> {
        self.ifaces.iter()
    }

    pub fn get_by_index(&self, index: u8) -> Option<&Interface> {
        self.iface(IfaceId::new(index))
    }

    pub fn get_by_name(&self, name: &str) -> Option<IfaceId> {
        self.ifaces
            .iter()
            .find(|i| i.name() == name)
            .map(|i| i.id())
    }

    pub fn get_by_link_addr(&self, addr: &HardwareAddress) -> Option<IfaceId> {
        self.ifaces
            .iter()
            .find(|i| i.hardware_addr() == *addr)
            .map(|i| i.id())
    }

    pub fn get_first_up(&self) -> Option<IfaceId> {
        self.ifaces.iter().find(|i| i.is_up()).map(|i| i.id())
    }

    /// The default interface: the one set with
    /// [set_default](Stack::set_default), else the first one added.
    pub fn get_default(&self) -> Option<IfaceId> {
        self.inner.default_iface
    }

    pub fn set_default(&mut self, id: IfaceId) -> Result<()> {
        self.iface(id).ok_or(Error::NotFound)?;
        self.inner.default_iface = Some(id);
        Ok(())
    }

    pub fn set_name(&mut self, id: IfaceId, name: &str) -> Result<()> {
        self.iface_mut(id).ok_or(Error::NotFound)?.set_name(name)
    }

    pub fn set_mtu(&mut self, id: IfaceId, mtu: u16) -> Result<()> {
        self.iface_mut(id).ok_or(Error::NotFound)?.set_mtu(mtu);
        Ok(())
    }

    /// Change the link-layer address. Only allowed while the interface is
    /// administratively down.
    pub fn set_link_addr(&mut self, id: IfaceId, addr: HardwareAddress) -> Result<()> {
        self.iface_mut(id)
            .ok_or(Error::NotFound)?
            .set_hardware_addr(addr)
    }

    pub fn up(&mut self, id: IfaceId) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        if iface.is_admin_up() {
            return Err(Error::Already);
        }
        net_debug!("iface {}: admin up", id);
        iface.flag_set(Flags::UP);
        cx.push_event(id, EventKind::IfAdminUp);
        iface.update_oper_state(cx);
        Ok(())
    }

    pub fn down(&mut self, id: IfaceId) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        if !iface.is_admin_up() {
            return Err(Error::Already);
        }
        net_debug!("iface {}: admin down", id);
        iface.flag_clear(Flags::UP);
        iface.update_oper_state(cx);
        cx.push_event(id, EventKind::IfAdminDown);
        Ok(())
    }

    fn set_state_flag(&mut self, id: IfaceId, flag: Flags, on: bool) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        if on {
            iface.flag_set(flag);
        } else {
            iface.flag_clear(flag);
        }
        iface.update_oper_state(cx);
        Ok(())
    }

    /// The driver detected a carrier.
    pub fn carrier_on(&mut self, id: IfaceId) -> Result<()> {
        self.set_state_flag(id, Flags::LOWER_UP, true)
    }

    pub fn carrier_off(&mut self, id: IfaceId) -> Result<()> {
        self.set_state_flag(id, Flags::LOWER_UP, false)
    }

    /// The link is up but waits for an external event, e.g. 802.1X
    /// authentication.
    pub fn dormant_on(&mut self, id: IfaceId) -> Result<()> {
        self.set_state_flag(id, Flags::DORMANT, true)
    }

    pub fn dormant_off(&mut self, id: IfaceId) -> Result<()> {
        self.set_state_flag(id, Flags::DORMANT, false)
    }

    pub fn suspend(&mut self, id: IfaceId) -> Result<()> {
        let iface = self.iface_mut(id).ok_or(Error::NotFound)?;
        if iface.flag_test_and_set(Flags::SUSPENDED) {
            return Err(Error::Already);
        }
        net_debug!("iface {}: suspended", id);
        Ok(())
    }

    pub fn resume(&mut self, id: IfaceId) -> Result<()> {
        let iface = self.iface_mut(id).ok_or(Error::NotFound)?;
        if !iface.flag_test_and_clear(Flags::SUSPENDED) {
            return Err(Error::NotPermitted);
        }
        net_debug!("iface {}: resumed", id);
        Ok(())
    }

    pub fn set_promisc(&mut self, id: IfaceId) -> Result<()> {
        let iface = self.iface_mut(id).ok_or(Error::NotFound)?;
        if !iface.l2_flags().contains(L2Flags::PROMISC_MODE) {
            return Err(Error::NotSupported);
        }
        if iface.flag_test_and_set(Flags::PROMISC) {
            return Err(Error::Already);
        }
        Ok(())
    }

    pub fn unset_promisc(&mut self, id: IfaceId) -> Result<()> {
        self.iface_mut(id)
            .ok_or(Error::NotFound)?
            .flag_clear(Flags::PROMISC);
        Ok(())
    }

    pub fn mcast_monitor_register(
        &mut self,
        iface: Option<IfaceId>,
        callback: McastMonitor,
    ) -> Result<MonitorHandle> {
        self.inner.monitors.register(iface, callback)
    }

    pub fn mcast_monitor_unregister(&mut self, handle: MonitorHandle) -> Result<()> {
        self.inner.monitors.unregister(handle)
    }

    /// Take a reference to an added address. `None` if the address is not
    /// on the interface.
    pub fn addr_ref(&self, id: IfaceId, addr: IpAddress) -> Option<AddrHandle> {
        let iface = self.iface(id)?;
        let (refcount, generation) = match addr {
            #[cfg(feature = "proto-ipv6")]
            IpAddress::Ipv6(addr) => {
                let entry = iface.ipv6()?.addr_lookup(&addr)?;
                (&entry.refcount, entry.generation)
            }
            #[cfg(feature = "proto-ipv4")]
            IpAddress::Ipv4(addr) => {
                let entry = iface.ipv4()?.addr_lookup(&addr)?;
                (&entry.refcount, entry.generation)
            }
        };
        refcount.acquire().map(|_| AddrHandle {
            iface: id,
            addr,
            generation,
        })
    }

    /// Give back a reference. Returns the number of references left; at
    /// zero the address slot is freed.
    ///
    /// A handle whose slot was freed in the meantime, e.g. by
    /// [config_ipv6_put](Stack::config_ipv6_put), is refused with
    /// `Error::NotFound`, even if the same address was added again.
    pub fn addr_unref(&mut self, handle: AddrHandle) -> Result<u16> {
        let (iface, cx) = self.split(handle.iface)?;
        match handle.addr {
            #[cfg(feature = "proto-ipv6")]
            IpAddress::Ipv6(addr) => {
                let index = iface
                    .ipv6()
                    .and_then(|c| {
                        c.slot(&addr)
                            .filter(|&i| c.addrs[i].generation == handle.generation)
                    })
                    .ok_or(Error::NotFound)?;
                iface.ipv6_release(cx, index)
            }
            #[cfg(feature = "proto-ipv4")]
            IpAddress::Ipv4(addr) => {
                let index = iface
                    .ipv4()
                    .and_then(|c| {
                        c.slot(&addr)
                            .filter(|&i| c.addrs[i].generation == handle.generation)
                    })
                    .ok_or(Error::NotFound)?;
                iface.ipv4_release(cx, index)
            }
        }
    }

    fn router_add(
        &mut self,
        id: IfaceId,
        address: IpAddress,
        is_default: bool,
        lifetime: u16,
    ) -> Result<Router> {
        let (_, cx) = self.split(id)?;
        let (router, created) = cx.routers.add(id, address, is_default, lifetime, cx.now)?;
        if created {
            net_debug!(
                "iface {}: router {} added, lifetime {}s{}",
                id,
                address,
                lifetime,
                if is_default { ", default" } else { "" }
            );
            cx.push_event(id, router_add_event(&address));
        }
        Ok(router)
    }

    fn router_rm(&mut self, id: IfaceId, address: &IpAddress) -> Result<()> {
        let router = self.inner.routers.remove(id, address)?;
        net_debug!("iface {}: router {} removed", id, address);
        self.inner.push_event(id, router_del_event(&router.address));
        Ok(())
    }

    pub fn routers(&self) -> impl Iterator<Item = &Router> {
        self.inner.routers.iter()
    }

    /// Pop the oldest pending event.
    pub fn poll_event(&mut self) -> Option<Event> {
        self.inner.events.pop()
    }

    /// Run every due timer of every interface, then expire routers.
    ///
    /// Control packets are handed to `emit` with the interface they must be
    /// sent on. Polling stops at the first packet `emit` refuses; it is
    /// offered again on the next call.
    ///
    /// Returns whether anything changed.
    pub fn poll<F, E>(&mut self, now: Instant, mut emit: F) -> bool
    where
        F: FnMut(IfaceId, &Packet) -> core::result::Result<(), E>,
    {
        self.inner.now = now;
        let mut changed = false;

        let Context {
            routers, events, ..
        } = &mut self.inner;
        changed |= routers.remove_expired(now, |router| {
            net_debug!("iface {}: router {} expired", router.iface, router.address);
            events.push(router.iface, router_del_event(&router.address));
        });

        for iface in self.ifaces.iter_mut() {
            let (c, err) = iface.poll(&mut self.inner, &mut emit);
            changed |= c;
            if err.is_some() {
                break;
            }
        }
        changed
    }

    /// When [poll](Stack::poll) should be called next. `None` if nothing is
    /// pending; a past deadline is reported as `now`.
    pub fn poll_at(&self, now: Instant) -> Option<Instant> {
        self.ifaces
            .iter()
            .filter_map(|i| i.poll_at())
            .chain(self.inner.routers.poll_at())
            .min()
            .map(|at| at.max(now))
    }

    /// Time until [poll](Stack::poll) should be called next.
    pub fn poll_delay(&self, now: Instant) -> Option<Duration> {
        self.poll_at(now).map(|at| at - now)
    }

    /// The interface that should send to `dst`.
    pub fn select_src_iface(&self, dst: &IpAddress) -> Option<IfaceId> {
        match dst {
            #[cfg(feature = "proto-ipv6")]
            IpAddress::Ipv6(dst) => self.ipv6_select_src_iface(dst),
            #[cfg(feature = "proto-ipv4")]
            IpAddress::Ipv4(dst) => self.ipv4_select_src_iface(dst),
        }
    }

    fn candidates(&self, id: Option<IfaceId>) -> impl Iterator<Item = &Interface> {
        self.ifaces
            .iter()
            .filter(move |i| id.map_or(true, |id| i.id() == id))
    }
}

#[cfg(feature = "proto-ipv6")]
impl Stack {
    /// Attach the IPv6 configuration, if not already attached.
    pub fn config_ipv6_get(&mut self, id: IfaceId) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.config_ipv6_get(cx).map(|_| ())
    }

    /// Detach the IPv6 configuration. Every address and group is dropped;
    /// outstanding handles are refused by [addr_unref](Stack::addr_unref).
    pub fn config_ipv6_put(&mut self, id: IfaceId) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.config_ipv6_put(cx)
    }

    /// Add an address. It is deprecated once `lifetime` runs out; `None`
    /// keeps it preferred forever.
    pub fn ipv6_addr_add(
        &mut self,
        id: IfaceId,
        addr: Ipv6Address,
        kind: AddressKind,
        lifetime: Option<Duration>,
    ) -> Result<()> {
        let mut params = Ipv6AddrParams::new(kind);
        params.preferred = lifetime;
        self.ipv6_addr_add_with(id, addr, &params)
    }

    pub fn ipv6_addr_add_with(
        &mut self,
        id: IfaceId,
        addr: Ipv6Address,
        params: &Ipv6AddrParams,
    ) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_addr_add(cx, addr, params).map(|_| ())
    }

    pub fn ipv6_addr_rm(&mut self, id: IfaceId, addr: &Ipv6Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_addr_rm(cx, addr)
    }

    /// Find the interface owning `addr`.
    pub fn ipv6_addr_lookup(&self, addr: &Ipv6Address) -> Option<(IfaceId, &Ipv6AddrEntry)> {
        self.ifaces.iter().find_map(|iface| {
            iface
                .ipv6()
                .and_then(|c| c.addr_lookup(addr))
                .map(|e| (iface.id(), e))
        })
    }

    pub fn ipv6_addr_lookup_by_iface(
        &self,
        id: IfaceId,
        addr: &Ipv6Address,
    ) -> Option<&Ipv6AddrEntry> {
        self.iface(id)?.ipv6()?.addr_lookup(addr)
    }

    pub fn ipv6_addr_update_lifetime(
        &mut self,
        id: IfaceId,
        addr: &Ipv6Address,
        lifetime: Option<Duration>,
    ) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_addr_update_lifetime(cx, addr, lifetime)
    }

    pub fn ipv6_addr_set_lifetimes(
        &mut self,
        id: IfaceId,
        addr: &Ipv6Address,
        preferred: Option<Duration>,
        valid: Option<Duration>,
    ) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_addr_set_lifetimes(cx, addr, preferred, valid)
    }

    /// Another host answered a duplicate address detection probe.
    pub fn ipv6_dad_failed(&mut self, id: IfaceId, addr: &Ipv6Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_dad_failed(cx, addr)
    }

    /// Restart duplicate address detection for `addr`.
    pub fn ipv6_start_dad(&mut self, id: IfaceId, addr: &Ipv6Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_start_dad(cx, addr)
    }

    pub fn ipv6_get_ll(&self, id: IfaceId, state: Option<AddressState>) -> Option<Ipv6Address> {
        self.iface(id)?.ipv6()?.get_ll(state)
    }

    /// A link-local address in `state` on any interface.
    pub fn ipv6_get_ll_addr(&self, state: Option<AddressState>) -> Option<(IfaceId, Ipv6Address)> {
        self.ifaces.iter().find_map(|iface| {
            iface
                .ipv6()
                .and_then(|c| c.get_ll(state))
                .map(|a| (iface.id(), a))
        })
    }

    /// The first preferred global address, on `id` or on any interface.
    pub fn ipv6_get_global_addr(&self, id: Option<IfaceId>) -> Option<(IfaceId, Ipv6Address)> {
        self.candidates(id).find_map(|iface| {
            iface
                .ipv6()
                .and_then(|c| c.get_global(Some(AddressState::Preferred)))
                .map(|a| (iface.id(), a))
        })
    }

    pub fn ipv6_set_hop_limit(&mut self, id: IfaceId, hop_limit: u8) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.config_ipv6_get(cx)?.hop_limit = hop_limit;
        Ok(())
    }

    pub fn ipv6_set_mcast_hop_limit(&mut self, id: IfaceId, hop_limit: u8) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.config_ipv6_get(cx)?.mcast_hop_limit = hop_limit;
        Ok(())
    }

    /// Set the base reachable time and draw a new reachable time from it.
    pub fn ipv6_set_base_reachable_time(&mut self, id: IfaceId, base: Duration) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_set_base_reachable_time(cx, base)
    }

    /// Draw a new reachable time in `[base / 2, 3 * base / 2]`.
    pub fn ipv6_set_reachable_time(&mut self, id: IfaceId) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_set_reachable_time(cx)
    }

    pub fn ipv6_set_retrans_timer(&mut self, id: IfaceId, timer: Duration) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.config_ipv6_get(cx)?.retrans_timer = timer;
        Ok(())
    }

    pub fn ipv6_maddr_add(&mut self, id: IfaceId, addr: Ipv6Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_maddr_add(cx, addr)
    }

    pub fn ipv6_maddr_rm(&mut self, id: IfaceId, addr: &Ipv6Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_maddr_rm(cx, addr)
    }

    /// Find a group on `id`, or on any interface for `None`.
    pub fn ipv6_maddr_lookup(
        &self,
        addr: &Ipv6Address,
        id: Option<IfaceId>,
    ) -> Option<(IfaceId, &Ipv6Group)> {
        self.candidates(id).find_map(|iface| {
            iface
                .ipv6()
                .and_then(|c| c.maddr_lookup(addr))
                .map(|g| (iface.id(), g))
        })
    }

    /// Mark a group joined. No report is sent.
    pub fn ipv6_maddr_join(&mut self, id: IfaceId, addr: &Ipv6Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_maddr_join(cx, addr)
    }

    pub fn ipv6_maddr_leave(&mut self, id: IfaceId, addr: &Ipv6Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_maddr_leave(cx, addr)
    }

    pub fn ipv6_maddr_is_joined(&self, id: IfaceId, addr: &Ipv6Address) -> bool {
        self.iface(id)
            .and_then(|i| i.ipv6())
            .map_or(false, |c| c.maddr_is_joined(addr))
    }

    pub fn mld_join(&mut self, id: IfaceId, group: Ipv6Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.mld_join(cx, group)
    }

    pub fn mld_leave(&mut self, id: IfaceId, group: Ipv6Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.mld_leave(cx, group)
    }

    /// Add an on-link prefix. `lifetime` is in seconds, [INFINITE_LIFETIME]
    /// for a prefix that never expires.
    pub fn ipv6_prefix_add(
        &mut self,
        id: IfaceId,
        prefix: Ipv6Address,
        len: u8,
        lifetime: u32,
    ) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_prefix_add(cx, prefix, len, lifetime).map(|_| ())
    }

    pub fn ipv6_prefix_rm(&mut self, id: IfaceId, prefix: Ipv6Address, len: u8) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_prefix_rm(cx, prefix, len)
    }

    pub fn ipv6_prefix_lookup(&self, id: IfaceId, addr: &Ipv6Address, len: u8) -> Option<&Prefix> {
        self.iface(id)?.ipv6()?.prefix_lookup(addr, len)
    }

    /// The shortest prefix containing `addr`, on `id` or on the default
    /// interface.
    pub fn ipv6_prefix_get(&self, id: Option<IfaceId>, addr: &Ipv6Address) -> Option<&Prefix> {
        let id = id.or(self.inner.default_iface)?;
        self.iface(id)?.ipv6()?.prefix_get(addr)
    }

    pub fn ipv6_prefix_set_timer(
        &mut self,
        id: IfaceId,
        prefix: Ipv6Address,
        len: u8,
        lifetime: u32,
    ) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_prefix_set_timer(cx, prefix, len, lifetime)
    }

    pub fn ipv6_prefix_unset_timer(
        &mut self,
        id: IfaceId,
        prefix: Ipv6Address,
        len: u8,
    ) -> Result<()> {
        self.ipv6_prefix_set_timer(id, prefix, len, INFINITE_LIFETIME)
    }

    /// The first interface with an on-link prefix containing `addr`.
    pub fn ipv6_addr_onlink(&self, addr: &Ipv6Address) -> Option<IfaceId> {
        self.ifaces
            .iter()
            .find(|iface| {
                iface.ipv6().map_or(false, |c| {
                    c.prefixes().any(|p| p.cidr().contains_addr(addr))
                })
            })
            .map(|iface| iface.id())
    }

    /// Apply a prefix information option received in a router
    /// advertisement.
    pub fn ipv6_handle_prefix_info(&mut self, id: IfaceId, info: &PrefixInformation) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_handle_prefix_info(cx, info)
    }

    /// Add a router. A non-zero `lifetime` (seconds) makes it a default
    /// router expiring after that time; zero adds a non-default router that
    /// never expires.
    pub fn ipv6_router_add(
        &mut self,
        id: IfaceId,
        addr: Ipv6Address,
        lifetime: u16,
    ) -> Result<Router> {
        self.router_add(id, addr.into(), lifetime > 0, lifetime)
    }

    pub fn ipv6_router_update_lifetime(
        &mut self,
        id: IfaceId,
        addr: &Ipv6Address,
        lifetime: u16,
    ) -> Result<()> {
        let now = self.inner.now;
        self.inner
            .routers
            .update_lifetime(id, &(*addr).into(), lifetime, now)
    }

    pub fn ipv6_router_lookup(&self, id: IfaceId, addr: &Ipv6Address) -> Option<&Router> {
        self.inner.routers.lookup(id, &(*addr).into())
    }

    pub fn ipv6_router_find_default(&self, id: Option<IfaceId>) -> Option<&Router> {
        self.inner.routers.find_default(id, IpVersion::Ipv6)
    }

    pub fn ipv6_router_rm(&mut self, id: IfaceId, addr: &Ipv6Address) -> Result<()> {
        self.router_rm(id, &(*addr).into())
    }

    /// Restart router solicitation.
    pub fn ipv6_start_rs(&mut self, id: IfaceId) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv6_start_rs(cx)
    }

    /// A router advertisement arrived; stop soliciting.
    pub fn ipv6_stop_rs(&mut self, id: IfaceId) -> Result<()> {
        self.iface_mut(id).ok_or(Error::NotFound)?.ipv6_stop_rs()
    }

    /// Source address for sending to `dst`, from `id` or from any interface.
    ///
    /// Link-local and multicast destinations get the first preferred
    /// link-local address. Other destinations get the preferred global
    /// address sharing the longest prefix with `dst`. The unspecified
    /// address if nothing fits.
    pub fn ipv6_select_src_addr(&self, id: Option<IfaceId>, dst: &Ipv6Address) -> Ipv6Address {
        if dst.is_link_local() || dst.is_multicast() {
            return self
                .candidates(id)
                .find_map(|iface| {
                    iface
                        .ipv6()
                        .and_then(|c| c.get_ll(Some(AddressState::Preferred)))
                })
                .unwrap_or(Ipv6Address::UNSPECIFIED);
        }

        let mut best = 0;
        let mut src = None;
        for iface in self.candidates(id) {
            if let Some(addr) = iface.ipv6().and_then(|c| c.best_match(dst, &mut best)) {
                src = Some(addr);
            }
        }
        src.unwrap_or(Ipv6Address::UNSPECIFIED)
    }

    /// The interface owning the source address selected for `dst`, else
    /// the default interface.
    pub fn ipv6_select_src_iface(&self, dst: &Ipv6Address) -> Option<IfaceId> {
        let src = self.ipv6_select_src_addr(None, dst);
        if src.is_unspecified() {
            return self.inner.default_iface;
        }
        self.ipv6_addr_lookup(&src)
            .map(|(id, _)| id)
            .or(self.inner.default_iface)
    }
}

#[cfg(feature = "proto-ipv4")]
impl Stack {
    pub fn config_ipv4_get(&mut self, id: IfaceId) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.config_ipv4_get(cx).map(|_| ())
    }

    pub fn config_ipv4_put(&mut self, id: IfaceId) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.config_ipv4_put(cx)
    }

    /// Add an address. It is removed once `lifetime` runs out, as a DHCP
    /// lease is; `None` keeps it forever. A DHCP address takes over from an
    /// overridable one.
    pub fn ipv4_addr_add(
        &mut self,
        id: IfaceId,
        addr: Ipv4Address,
        kind: AddressKind,
        lifetime: Option<Duration>,
    ) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv4_addr_add(cx, addr, kind, lifetime).map(|_| ())
    }

    pub fn ipv4_addr_rm(&mut self, id: IfaceId, addr: &Ipv4Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv4_addr_rm(cx, addr)
    }

    pub fn ipv4_addr_lookup(&self, addr: &Ipv4Address) -> Option<(IfaceId, &Ipv4AddrEntry)> {
        self.ifaces.iter().find_map(|iface| {
            iface
                .ipv4()
                .and_then(|c| c.addr_lookup(addr))
                .map(|e| (iface.id(), e))
        })
    }

    pub fn ipv4_addr_lookup_by_iface(
        &self,
        id: IfaceId,
        addr: &Ipv4Address,
    ) -> Option<&Ipv4AddrEntry> {
        self.iface(id)?.ipv4()?.addr_lookup(addr)
    }

    pub fn ipv4_addr_set_lifetimes(
        &mut self,
        id: IfaceId,
        addr: &Ipv4Address,
        preferred: Option<Duration>,
        valid: Option<Duration>,
    ) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv4_addr_set_lifetimes(cx, addr, preferred, valid)
    }

    /// Whether `addr` is on one of the subnets of `id`.
    pub fn ipv4_addr_mask_cmp(&self, id: IfaceId, addr: &Ipv4Address) -> bool {
        self.iface(id)
            .and_then(|i| i.ipv4())
            .map_or(false, |c| c.mask_cmp(addr))
    }

    pub fn ipv4_is_addr_bcast(&self, id: IfaceId, addr: &Ipv4Address) -> bool {
        if addr.is_broadcast() {
            return true;
        }
        self.iface(id)
            .and_then(|i| i.ipv4())
            .map_or(false, |c| c.is_addr_bcast(addr))
    }

    pub fn ipv4_get_ll(&self, id: IfaceId, state: Option<AddressState>) -> Option<Ipv4Address> {
        self.iface(id)?.ipv4()?.get_ll(state)
    }

    pub fn ipv4_get_global_addr(
        &self,
        id: IfaceId,
        state: Option<AddressState>,
    ) -> Option<Ipv4Address> {
        self.iface(id)?.ipv4()?.get_global(state)
    }

    /// Set the netmask of the interface and every address on it.
    pub fn ipv4_set_netmask(&mut self, id: IfaceId, netmask: Ipv4Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv4_set_netmask(cx, netmask)
    }

    pub fn ipv4_get_netmask(&self, id: IfaceId) -> Option<Ipv4Address> {
        self.iface(id)?.ipv4().map(|c| c.netmask())
    }

    pub fn ipv4_set_netmask_by_addr(
        &mut self,
        id: IfaceId,
        addr: &Ipv4Address,
        netmask: Ipv4Address,
    ) -> Result<()> {
        self.iface_mut(id)
            .ok_or(Error::NotFound)?
            .ipv4_set_netmask_by_addr(addr, netmask)
    }

    pub fn ipv4_get_netmask_by_addr(&self, id: IfaceId, addr: &Ipv4Address) -> Option<Ipv4Address> {
        self.ipv4_addr_lookup_by_iface(id, addr).map(|e| e.netmask())
    }

    pub fn ipv4_set_gw(&mut self, id: IfaceId, gateway: Ipv4Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv4_set_gw(cx, gateway)
    }

    pub fn ipv4_get_gw(&self, id: IfaceId) -> Option<Ipv4Address> {
        self.iface(id)?.ipv4().map(|c| c.gateway())
    }

    pub fn ipv4_set_ttl(&mut self, id: IfaceId, ttl: u8) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv4_set_ttl(cx, ttl)
    }

    pub fn ipv4_set_mcast_ttl(&mut self, id: IfaceId, ttl: u8) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv4_set_mcast_ttl(cx, ttl)
    }

    /// An ARP packet from another host claims `addr`.
    pub fn ipv4_acd_conflict(&mut self, id: IfaceId, addr: &Ipv4Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv4_acd_conflict(cx, addr)
    }

    pub fn ipv4_maddr_add(&mut self, id: IfaceId, addr: Ipv4Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv4_maddr_add(cx, addr)
    }

    pub fn ipv4_maddr_rm(&mut self, id: IfaceId, addr: &Ipv4Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv4_maddr_rm(cx, addr)
    }

    pub fn ipv4_maddr_lookup(
        &self,
        addr: &Ipv4Address,
        id: Option<IfaceId>,
    ) -> Option<(IfaceId, &Ipv4Group)> {
        self.candidates(id).find_map(|iface| {
            iface
                .ipv4()
                .and_then(|c| c.maddr_lookup(addr))
                .map(|g| (iface.id(), g))
        })
    }

    pub fn ipv4_maddr_join(&mut self, id: IfaceId, addr: &Ipv4Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv4_maddr_join(cx, addr)
    }

    pub fn ipv4_maddr_leave(&mut self, id: IfaceId, addr: &Ipv4Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.ipv4_maddr_leave(cx, addr)
    }

    pub fn ipv4_maddr_is_joined(&self, id: IfaceId, addr: &Ipv4Address) -> bool {
        self.iface(id)
            .and_then(|i| i.ipv4())
            .map_or(false, |c| c.maddr_is_joined(addr))
    }

    pub fn igmp_join(
        &mut self,
        id: IfaceId,
        group: Ipv4Address,
        sources: &[Ipv4Address],
        mode: FilterMode,
    ) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.igmp_join(cx, group, sources, mode)
    }

    pub fn igmp_leave(&mut self, id: IfaceId, group: Ipv4Address) -> Result<()> {
        let (iface, cx) = self.split(id)?;
        iface.igmp_leave(cx, group)
    }

    /// Add a router. `lifetime` is in seconds, zero for a router that never
    /// expires.
    pub fn ipv4_router_add(
        &mut self,
        id: IfaceId,
        addr: Ipv4Address,
        is_default: bool,
        lifetime: u16,
    ) -> Result<Router> {
        self.router_add(id, addr.into(), is_default, lifetime)
    }

    pub fn ipv4_router_lookup(&self, id: IfaceId, addr: &Ipv4Address) -> Option<&Router> {
        self.inner.routers.lookup(id, &(*addr).into())
    }

    pub fn ipv4_router_find_default(&self, id: Option<IfaceId>) -> Option<&Router> {
        self.inner.routers.find_default(id, IpVersion::Ipv4)
    }

    pub fn ipv4_router_rm(&mut self, id: IfaceId, addr: &Ipv4Address) -> Result<()> {
        self.router_rm(id, &(*addr).into())
    }

    /// Source address for sending to `dst`, from `id` or from any interface.
    ///
    /// Link-local (169.254/16) and multicast destinations get a preferred
    /// link-local address; multicast falls back to a global one. Other
    /// destinations get the preferred address sharing the longest prefix
    /// with `dst`.
    pub fn ipv4_select_src_addr(&self, id: Option<IfaceId>, dst: &Ipv4Address) -> Ipv4Address {
        if dst.is_link_local() || dst.is_multicast() {
            let ll = self.candidates(id).find_map(|iface| {
                iface
                    .ipv4()
                    .and_then(|c| c.get_ll(Some(AddressState::Preferred)))
            });
            if let Some(addr) = ll {
                return addr;
            }
            if dst.is_link_local() {
                return Ipv4Address::UNSPECIFIED;
            }
        }

        let mut best = 0;
        let mut src = None;
        for iface in self.candidates(id) {
            if let Some(addr) = iface.ipv4().and_then(|c| c.best_match(dst, &mut best)) {
                src = Some(addr);
            }
        }
        src.unwrap_or(Ipv4Address::UNSPECIFIED)
    }

    /// The first interface with a subnet covering `dst`, else the default
    /// interface.
    pub fn ipv4_select_src_iface(&self, dst: &Ipv4Address) -> Option<IfaceId> {
        self.ifaces
            .iter()
            .find(|iface| iface.ipv4().map_or(false, |c| c.mask_cmp(dst)))
            .map(|iface| iface.id())
            .or(self.inner.default_iface)
    }
}
