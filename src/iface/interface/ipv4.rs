use heapless::Vec;

use super::{Flags, IfaceId, Interface};
use crate::config::{
    IFACE_MAX_IPV4_ADDR_COUNT, IFACE_MAX_IPV4_CONFIG_COUNT, IFACE_MAX_IPV4_MADDR_COUNT,
    IFACE_MAX_MCAST_SOURCE_COUNT,
};
use crate::iface::acd::{Acd, AcdStep, Conflict};
use crate::iface::address::{AddressKind, AddressState, Ipv4AddrEntry, Lifetime};
use crate::iface::multicast::{FilterMode, GroupState, Ipv4Group};
use crate::iface::stack::Context;
use crate::iface::{EmitError, EventKind, Packet};
use crate::time::{Duration, Instant};
use crate::wire::{HardwareAddress, Ipv4Address, Ipv4AddressExt, IPV4_MULTICAST_ALL_SYSTEMS};
use crate::{Error, Result};

pub const DEFAULT_TTL: u8 = 64;
pub const DEFAULT_MCAST_TTL: u8 = 1;

/// IPv4 state of an interface.
#[derive(Debug)]
pub struct Ipv4Config {
    pub(crate) addrs: Vec<Ipv4AddrEntry, IFACE_MAX_IPV4_ADDR_COUNT>,
    pub(crate) maddrs: Vec<Ipv4Group, IFACE_MAX_IPV4_MADDR_COUNT>,
    /// Netmask given to new addresses.
    pub(crate) netmask: Ipv4Address,
    pub(crate) gateway: Ipv4Address,
    pub(crate) ttl: u8,
    pub(crate) mcast_ttl: u8,
    /// Conflicts seen while probing, for rate limiting.
    pub(crate) conflict_count: u8,
}

impl Ipv4Config {
    fn new() -> Self {
        Ipv4Config {
            addrs: Vec::new(),
            maddrs: Vec::new(),
            netmask: Ipv4Address::UNSPECIFIED,
            gateway: Ipv4Address::UNSPECIFIED,
            ttl: DEFAULT_TTL,
            mcast_ttl: DEFAULT_MCAST_TTL,
            conflict_count: 0,
        }
    }

    pub fn addrs(&self) -> impl Iterator<Item = &Ipv4AddrEntry> {
        self.addrs.iter().filter(|e| e.is_added)
    }

    pub fn maddrs(&self) -> impl Iterator<Item = &Ipv4Group> {
        self.maddrs.iter()
    }

    pub fn netmask(&self) -> Ipv4Address {
        self.netmask
    }

    pub fn gateway(&self) -> Ipv4Address {
        self.gateway
    }

    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    pub fn mcast_ttl(&self) -> u8 {
        self.mcast_ttl
    }

    pub fn conflict_count(&self) -> u8 {
        self.conflict_count
    }

    pub(crate) fn slot(&self, addr: &Ipv4Address) -> Option<usize> {
        self.addrs.iter().position(|e| e.address == *addr)
    }

    fn added_index(&self, addr: &Ipv4Address) -> Option<usize> {
        self.addrs
            .iter()
            .position(|e| e.is_added && e.address == *addr)
    }

    pub fn addr_lookup(&self, addr: &Ipv4Address) -> Option<&Ipv4AddrEntry> {
        self.added_index(addr).map(|i| &self.addrs[i])
    }

    fn maddr_index(&self, addr: &Ipv4Address) -> Option<usize> {
        self.maddrs.iter().position(|g| g.address == *addr)
    }

    pub fn maddr_lookup(&self, addr: &Ipv4Address) -> Option<&Ipv4Group> {
        self.maddr_index(addr).map(|i| &self.maddrs[i])
    }

    pub fn maddr_is_joined(&self, addr: &Ipv4Address) -> bool {
        self.maddr_lookup(addr).map_or(false, |g| g.is_joined())
    }

    /// Whether `addr` is on the subnet of one of the addresses. An address
    /// whose netmask was never set covers every destination.
    pub fn mask_cmp(&self, addr: &Ipv4Address) -> bool {
        self.addrs()
            .any(|e| addr.masked(&e.netmask) == e.address.masked(&e.netmask))
    }

    /// Whether `addr` is the limited broadcast address or the directed
    /// broadcast address of one of the subnets.
    pub fn is_addr_bcast(&self, addr: &Ipv4Address) -> bool {
        if addr.is_broadcast() {
            return true;
        }
        self.addrs().any(|e| {
            matches!(e.netmask.prefix_len(), Some(len) if len > 0 && len < 31)
                && e.address.subnet_broadcast(&e.netmask) == *addr
        })
    }

    /// First link-local (169.254/16) address in `state`, or in any state
    /// for `None`.
    pub fn get_ll(&self, state: Option<AddressState>) -> Option<Ipv4Address> {
        self.addrs()
            .find(|e| e.address.is_link_local() && state.map_or(true, |s| e.state == s))
            .map(|e| e.address)
    }

    pub fn get_global(&self, state: Option<AddressState>) -> Option<Ipv4Address> {
        self.addrs()
            .find(|e| !e.address.is_link_local() && state.map_or(true, |s| e.state == s))
            .map(|e| e.address)
    }

    pub(crate) fn best_match(&self, dst: &Ipv4Address, best: &mut u8) -> Option<Ipv4Address> {
        let mut src = None;
        for entry in self.addrs() {
            if !entry.is_preferred() || entry.address.is_link_local() {
                continue;
            }
            let len = dst.common_prefix_len(&entry.address);
            if len >= *best {
                *best = len;
                src = Some(entry.address);
            }
        }
        src
    }

    pub(crate) fn poll_at(&self, is_up: bool) -> Option<Instant> {
        let timers = self
            .addrs()
            .filter_map(|e| e.lifetime.poll_at(e.state))
            .min();
        if !is_up {
            return timers;
        }

        let acd = self.addrs().filter_map(|e| e.acd.and_then(|acd| acd.poll_at()));
        let reports = self
            .maddrs
            .iter()
            .filter(|g| matches!(g.state, GroupState::Joining | GroupState::Leaving))
            .map(|_| Instant::ZERO);
        let link = acd.chain(reports).min();
        match (timers, link) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

impl Interface {
    pub(crate) fn config_ipv4_get(&mut self, cx: &mut Context) -> Result<&mut Ipv4Config> {
        if !self.flags.contains(Flags::IPV4) {
            return Err(Error::NoConfig);
        }
        if self.ipv4.is_none() {
            if cx.ipv4_configs >= IFACE_MAX_IPV4_CONFIG_COUNT {
                net_debug!("iface {}: no IPv4 config left", self.id);
                return Err(Error::NoConfig);
            }
            cx.ipv4_configs += 1;
            self.ipv4 = Some(Ipv4Config::new());
        }
        self.ipv4.as_mut().ok_or(Error::NoConfig)
    }

    pub(crate) fn config_ipv4_put(&mut self, cx: &mut Context) -> Result<()> {
        let ipv4 = self.ipv4.take().ok_or(Error::Already)?;
        cx.ipv4_configs -= 1;
        for group in ipv4.maddrs.iter().filter(|g| g.is_joined()) {
            cx.notify_mcast(self.id, group.address.into(), false);
        }
        for entry in ipv4.addrs.iter().filter(|e| e.is_added) {
            cx.push_event(self.id, EventKind::Ipv4AddrDel(entry.address));
        }
        Ok(())
    }

    /// Whether conflict detection runs for `addr`: only on links that carry
    /// ARP, and never for loopback addresses.
    fn acd_applies(&self, addr: &Ipv4Address) -> bool {
        self.acd
            && !self.flags.contains(Flags::POINTOPOINT)
            && matches!(self.hardware_addr, HardwareAddress::Ethernet(_))
            && !addr.is_loopback()
    }

    fn ipv4_entry_mut(&mut self, index: usize) -> Option<&mut Ipv4AddrEntry> {
        self.ipv4.as_mut().and_then(|c| c.addrs.get_mut(index))
    }

    fn ipv4_added_index(&self, addr: &Ipv4Address) -> Result<usize> {
        self.ipv4
            .as_ref()
            .and_then(|c| c.added_index(addr))
            .ok_or(Error::NotFound)
    }

    /// Add `addr`. `lifetime` is the valid lifetime, e.g. a DHCP lease;
    /// the address is removed once it runs out.
    pub(crate) fn ipv4_addr_add(
        &mut self,
        cx: &mut Context,
        addr: Ipv4Address,
        kind: AddressKind,
        lifetime: Option<Duration>,
    ) -> Result<usize> {
        if !addr.x_is_unicast() {
            return Err(Error::Unaddressable);
        }
        let id = self.id;
        let now = cx.now;

        if let Ok(index) = self.ipv4_added_index(&addr) {
            return Ok(index);
        }
        if kind == AddressKind::Dhcp {
            let overridable = self.ipv4.as_ref().and_then(|c| {
                c.addrs()
                    .find(|e| e.kind == AddressKind::Overridable)
                    .map(|e| e.address)
            });
            if let Some(old) = overridable {
                net_debug!("iface {}: DHCP lease replaces {}", id, old);
                self.ipv4_addr_rm(cx, &old)?;
            }
        }

        let generation = cx.next_generation();
        let ipv4 = self.config_ipv4_get(cx)?;
        let netmask = ipv4.netmask;
        let lifetime = Lifetime::new(now, None, lifetime);
        let index = match ipv4.slot(&addr) {
            Some(i) => {
                ipv4.addrs[i].revive(netmask, kind, lifetime);
                i
            }
            None => {
                ipv4.addrs
                    .push(Ipv4AddrEntry::new(addr, netmask, kind, lifetime, generation))
                    .map_err(|_| Error::Exhausted)?;
                ipv4.addrs.len() - 1
            }
        };

        net_debug!("iface {}: IPv4 address {} ({}) added", id, addr, kind);
        cx.push_event(id, EventKind::Ipv4AddrAdd(addr));
        self.ipv4_begin_acd(cx, index);
        Ok(index)
    }

    fn ipv4_begin_acd(&mut self, cx: &mut Context, index: usize) {
        let is_up = self.is_up();
        let id = self.id;
        let Some(addr) = self.ipv4.as_ref().map(|c| c.addrs[index].address) else {
            return;
        };
        let applies = self.acd_applies(&addr);
        let Some(ipv4) = self.ipv4.as_mut() else {
            return;
        };
        let conflicts = ipv4.conflict_count;
        let entry = &mut ipv4.addrs[index];

        if !applies {
            entry.acd = None;
            if entry.state == AddressState::Tentative {
                entry.state = AddressState::Preferred;
            }
            return;
        }
        entry.state = AddressState::Tentative;
        entry.acd = is_up.then(|| Acd::start(cx.now, &mut cx.rand, conflicts));
        if is_up {
            net_debug!("iface {}: ACD started for {}", id, addr);
        }
    }

    pub(crate) fn ipv4_addr_rm(&mut self, cx: &mut Context, addr: &Ipv4Address) -> Result<()> {
        let index = self.ipv4_added_index(addr)?;
        if let Some(entry) = self.ipv4_entry_mut(index) {
            entry.is_added = false;
            entry.acd = None;
        }
        net_debug!("iface {}: IPv4 address {} removed", self.id, addr);
        self.ipv4_release(cx, index).map(|_| ())
    }

    pub(crate) fn ipv4_release(&mut self, cx: &mut Context, index: usize) -> Result<u16> {
        let id = self.id;
        let ipv4 = self.ipv4.as_mut().ok_or(Error::NotFound)?;
        let left = ipv4
            .addrs
            .get(index)
            .ok_or(Error::NotFound)?
            .refcount
            .release()?;
        if left == 0 {
            let entry = ipv4.addrs.remove(index);
            net_debug!("iface {}: IPv4 address {} freed", id, entry.address);
            cx.push_event(id, EventKind::Ipv4AddrDel(entry.address));
        }
        Ok(left)
    }

    pub(crate) fn ipv4_addr_set_lifetimes(
        &mut self,
        cx: &mut Context,
        addr: &Ipv4Address,
        preferred: Option<Duration>,
        valid: Option<Duration>,
    ) -> Result<()> {
        let index = self.ipv4_added_index(addr)?;
        let now = cx.now;
        let entry = self.ipv4_entry_mut(index).ok_or(Error::NotFound)?;
        entry.lifetime = Lifetime::new(now, preferred, valid);
        if entry.state == AddressState::Deprecated && preferred != Some(Duration::ZERO) {
            entry.state = AddressState::Preferred;
        }
        Ok(())
    }

    /// Report an ARP packet from another host claiming `addr`.
    pub(crate) fn ipv4_acd_conflict(&mut self, cx: &mut Context, addr: &Ipv4Address) -> Result<()> {
        let index = self.ipv4_added_index(addr)?;
        let id = self.id;
        let now = cx.now;
        let ipv4 = self.ipv4.as_mut().ok_or(Error::NotFound)?;
        let entry = &mut ipv4.addrs[index];
        let outcome = match entry.acd.as_mut() {
            Some(acd) => acd.conflict(now),
            // Detection did not start yet because the interface is down.
            None if entry.state == AddressState::Tentative => Conflict::Failed,
            None => return Err(Error::InvalidState),
        };

        match outcome {
            Conflict::Defend => {
                net_debug!("iface {}: defending {}", id, addr);
                Ok(())
            }
            Conflict::Failed => {
                ipv4.conflict_count = ipv4.conflict_count.saturating_add(1);
                net_debug!("iface {}: ACD failed for {}", id, addr);
                cx.push_event(id, EventKind::Ipv4AcdFailed(*addr));
                self.ipv4_addr_rm(cx, addr)
            }
            Conflict::GiveUp => {
                net_debug!("iface {}: lost {} to another host", id, addr);
                cx.push_event(id, EventKind::Ipv4AcdConflict(*addr));
                self.ipv4_addr_rm(cx, addr)
            }
        }
    }

    /// Join `group` with an IGMPv3 source filter.
    pub(crate) fn igmp_join(
        &mut self,
        cx: &mut Context,
        group: Ipv4Address,
        sources: &[Ipv4Address],
        mode: FilterMode,
    ) -> Result<()> {
        if !group.is_multicast() {
            return Err(Error::Unaddressable);
        }
        if sources.len() > IFACE_MAX_MCAST_SOURCE_COUNT {
            return Err(Error::Exhausted);
        }
        let id = self.id;
        let is_up = self.is_up();
        let ipv4 = self.config_ipv4_get(cx)?;

        let index = match ipv4.maddr_index(&group) {
            Some(i) => i,
            None => {
                ipv4.maddrs
                    .push(Ipv4Group::new(group))
                    .map_err(|_| Error::Exhausted)?;
                cx.push_event(id, EventKind::Ipv4MaddrAdd(group));
                ipv4.maddrs.len() - 1
            }
        };

        let entry = &mut ipv4.maddrs[index];
        match entry.state {
            GroupState::Joining | GroupState::Joined => return Err(Error::Already),
            GroupState::Leaving => {
                entry.set_filter(mode, sources)?;
                entry.state = GroupState::Joined;
                cx.notify_mcast(id, group.into(), true);
                return Ok(());
            }
            GroupState::Inactive if entry.rejoin => return Err(Error::Already),
            GroupState::Inactive => (),
        }

        entry.set_filter(mode, sources)?;
        if is_up {
            entry.state = GroupState::Joining;
        } else {
            entry.state = GroupState::Joined;
            cx.notify_mcast(id, group.into(), true);
        }
        net_debug!("iface {}: joining {}", id, group);
        Ok(())
    }

    pub(crate) fn igmp_leave(&mut self, cx: &mut Context, group: Ipv4Address) -> Result<()> {
        if !group.is_multicast() {
            return Err(Error::Unaddressable);
        }
        let id = self.id;
        let is_up = self.is_up();
        let ipv4 = self.ipv4.as_mut().ok_or(Error::NotFound)?;
        let index = ipv4.maddr_index(&group).ok_or(Error::NotFound)?;

        let entry = &mut ipv4.maddrs[index];
        match entry.state {
            GroupState::Joined => {
                cx.notify_mcast(id, group.into(), false);
                if is_up {
                    entry.state = GroupState::Leaving;
                    net_debug!("iface {}: leaving {}", id, group);
                    return Ok(());
                }
            }
            GroupState::Joining => (),
            GroupState::Inactive if entry.rejoin => (),
            GroupState::Inactive | GroupState::Leaving => return Err(Error::Already),
        }

        ipv4.maddrs.remove(index);
        net_debug!("iface {}: left {}", id, group);
        cx.push_event(id, EventKind::Ipv4MaddrDel(group));
        Ok(())
    }

    pub(crate) fn ipv4_maddr_add(&mut self, cx: &mut Context, addr: Ipv4Address) -> Result<()> {
        if !addr.is_multicast() {
            return Err(Error::Unaddressable);
        }
        let id = self.id;
        let ipv4 = self.config_ipv4_get(cx)?;
        if ipv4.maddr_index(&addr).is_some() {
            return Ok(());
        }
        ipv4.maddrs
            .push(Ipv4Group::new(addr))
            .map_err(|_| Error::Exhausted)?;
        net_debug!("iface {}: multicast address {} added", id, addr);
        cx.push_event(id, EventKind::Ipv4MaddrAdd(addr));
        Ok(())
    }

    pub(crate) fn ipv4_maddr_rm(&mut self, cx: &mut Context, addr: &Ipv4Address) -> Result<()> {
        let id = self.id;
        let ipv4 = self.ipv4.as_mut().ok_or(Error::NotFound)?;
        let index = ipv4.maddr_index(addr).ok_or(Error::NotFound)?;
        let group = ipv4.maddrs.remove(index);
        if group.is_joined() {
            cx.notify_mcast(id, group.address.into(), false);
        }
        net_debug!("iface {}: multicast address {} removed", id, addr);
        cx.push_event(id, EventKind::Ipv4MaddrDel(*addr));
        Ok(())
    }

    pub(crate) fn ipv4_maddr_join(&mut self, cx: &mut Context, addr: &Ipv4Address) -> Result<()> {
        let id = self.id;
        let ipv4 = self.ipv4.as_mut().ok_or(Error::NotFound)?;
        let index = ipv4.maddr_index(addr).ok_or(Error::NotFound)?;
        let group = &mut ipv4.maddrs[index];
        if group.state != GroupState::Joined {
            group.state = GroupState::Joined;
            cx.notify_mcast(id, (*addr).into(), true);
        }
        Ok(())
    }

    pub(crate) fn ipv4_maddr_leave(&mut self, cx: &mut Context, addr: &Ipv4Address) -> Result<()> {
        let id = self.id;
        let ipv4 = self.ipv4.as_mut().ok_or(Error::NotFound)?;
        let index = ipv4.maddr_index(addr).ok_or(Error::NotFound)?;
        let group = &mut ipv4.maddrs[index];
        if group.state == GroupState::Joined {
            cx.notify_mcast(id, (*addr).into(), false);
        }
        group.state = GroupState::Inactive;
        group.rejoin = false;
        Ok(())
    }

    /// Set the netmask of the interface and of every address on it.
    pub(crate) fn ipv4_set_netmask(&mut self, cx: &mut Context, netmask: Ipv4Address) -> Result<()> {
        let ipv4 = self.config_ipv4_get(cx)?;
        ipv4.netmask = netmask;
        for entry in ipv4.addrs.iter_mut() {
            entry.netmask = netmask;
        }
        Ok(())
    }

    pub(crate) fn ipv4_set_netmask_by_addr(
        &mut self,
        addr: &Ipv4Address,
        netmask: Ipv4Address,
    ) -> Result<()> {
        let index = self.ipv4_added_index(addr)?;
        let entry = self.ipv4_entry_mut(index).ok_or(Error::NotFound)?;
        entry.netmask = netmask;
        Ok(())
    }

    pub(crate) fn ipv4_set_gw(&mut self, cx: &mut Context, gateway: Ipv4Address) -> Result<()> {
        self.config_ipv4_get(cx)?.gateway = gateway;
        Ok(())
    }

    pub(crate) fn ipv4_set_ttl(&mut self, cx: &mut Context, ttl: u8) -> Result<()> {
        self.config_ipv4_get(cx)?.ttl = ttl;
        Ok(())
    }

    pub(crate) fn ipv4_set_mcast_ttl(&mut self, cx: &mut Context, ttl: u8) -> Result<()> {
        self.config_ipv4_get(cx)?.mcast_ttl = ttl;
        Ok(())
    }

    pub(super) fn ipv4_start(&mut self, cx: &mut Context) {
        if let Err(err) = self.config_ipv4_get(cx) {
            net_debug!("iface {}: IPv4 not started: {}", self.id, err);
            return;
        }

        let count = self.ipv4.as_ref().map_or(0, |c| c.addrs.len());
        for index in 0..count {
            let restart = self.ipv4.as_ref().map_or(false, |c| {
                let e = &c.addrs[index];
                e.is_added && e.state == AddressState::Tentative && e.acd.is_none()
            });
            if restart {
                self.ipv4_begin_acd(cx, index);
            }
        }

        if let Err(err) = self.ipv4_maddr_add(cx, IPV4_MULTICAST_ALL_SYSTEMS) {
            net_debug!("iface {}: cannot add all-systems group: {}", self.id, err);
        }

        let id = self.id;
        let Some(ipv4) = self.ipv4.as_mut() else {
            return;
        };
        for group in ipv4.maddrs.iter_mut() {
            if group.address == IPV4_MULTICAST_ALL_SYSTEMS && group.state == GroupState::Inactive {
                // Membership of all-systems is implicit and never reported.
                group.rejoin = false;
                group.state = GroupState::Joined;
                cx.notify_mcast(id, group.address.into(), true);
            } else if group.rejoin {
                group.rejoin = false;
                group.state = GroupState::Joining;
            }
        }
    }

    pub(super) fn ipv4_stop(&mut self, cx: &mut Context) {
        let id = self.id;
        let count = self.ipv4.as_ref().map_or(0, |c| c.addrs.len());
        for index in 0..count {
            let Some(addr) = self
                .ipv4
                .as_ref()
                .map(|c| &c.addrs[index])
                .filter(|e| e.is_added)
                .map(|e| e.address)
            else {
                continue;
            };
            let applies = self.acd_applies(&addr);
            if let Some(entry) = self.ipv4_entry_mut(index) {
                entry.acd = None;
                if applies && entry.state == AddressState::Preferred {
                    entry.state = AddressState::Tentative;
                }
            }
        }

        let Some(ipv4) = self.ipv4.as_mut() else {
            return;
        };
        let mut gone: Vec<Ipv4Address, IFACE_MAX_IPV4_MADDR_COUNT> = Vec::new();
        for group in ipv4.maddrs.iter_mut() {
            match group.state {
                GroupState::Joined => {
                    cx.notify_mcast(id, group.address.into(), false);
                    group.state = GroupState::Inactive;
                    group.rejoin = true;
                }
                GroupState::Joining => {
                    group.state = GroupState::Inactive;
                    group.rejoin = true;
                }
                GroupState::Leaving => {
                    let _ = gone.push(group.address);
                }
                GroupState::Inactive => (),
            }
        }
        ipv4.maddrs.retain(|g| g.state != GroupState::Leaving);
        for addr in gone {
            cx.push_event(id, EventKind::Ipv4MaddrDel(addr));
        }
    }

    pub(super) fn ipv4_poll_lifetimes(&mut self, cx: &mut Context) -> bool {
        let now = cx.now;
        let id = self.id;
        let Some(ipv4) = self.ipv4.as_mut() else {
            return false;
        };

        let mut changed = false;
        let mut expired: Vec<Ipv4Address, IFACE_MAX_IPV4_ADDR_COUNT> = Vec::new();
        for entry in ipv4.addrs.iter_mut().filter(|e| e.is_added) {
            if entry.lifetime.is_expired(now) {
                let _ = expired.push(entry.address);
            } else if entry.lifetime.should_deprecate(entry.state, now) {
                entry.state = AddressState::Deprecated;
                net_debug!("iface {}: IPv4 address {} deprecated", id, entry.address);
                cx.push_event(id, EventKind::Ipv4AddrDeprecated(entry.address));
                changed = true;
            }
        }
        for addr in expired.iter() {
            net_debug!("iface {}: IPv4 address {} expired", id, addr);
            changed |= self.ipv4_addr_rm(cx, addr).is_ok();
        }
        changed
    }

    /// Send ARP probes and announcements and the pending IGMP reports.
    pub(super) fn ipv4_poll_link<F, E>(
        &mut self,
        cx: &mut Context,
        emit: &mut F,
    ) -> core::result::Result<bool, EmitError>
    where
        F: FnMut(IfaceId, &Packet) -> core::result::Result<(), E>,
    {
        let now = cx.now;
        let id = self.id;
        let mut changed = false;

        let count = self.ipv4.as_ref().map_or(0, |c| c.addrs.len());
        for index in 0..count {
            let step = self
                .ipv4
                .as_ref()
                .map(|c| &c.addrs[index])
                .filter(|e| e.is_added)
                .and_then(|e| e.acd.map(|acd| (e.address, acd.next(now))));
            match step {
                Some((target, AcdStep::Probe)) => {
                    self.transmit(emit, &Packet::ArpProbe { target })?;
                    if let Some(acd) = self.ipv4_entry_mut(index).and_then(|e| e.acd.as_mut()) {
                        acd.probe_sent(now, &mut cx.rand);
                    }
                    changed = true;
                }
                Some((addr, AcdStep::Bound)) => {
                    if let Some(entry) = self.ipv4_entry_mut(index) {
                        if let Some(acd) = entry.acd.as_mut() {
                            acd.bind(now);
                        }
                        entry.state = AddressState::Preferred;
                    }
                    net_debug!("iface {}: ACD succeeded for {}", id, addr);
                    cx.push_event(id, EventKind::Ipv4AcdSucceeded(addr));
                    changed = true;
                }
                Some((addr, AcdStep::Announce)) => {
                    self.transmit(emit, &Packet::ArpAnnounce { addr })?;
                    if let Some(acd) = self.ipv4_entry_mut(index).and_then(|e| e.acd.as_mut()) {
                        acd.announce_sent(now);
                    }
                    changed = true;
                }
                Some((_, AcdStep::Wait(_))) | None => (),
            }
        }

        let mut index = 0;
        while let Some(group) = self.ipv4.as_ref().and_then(|c| c.maddrs.get(index)).cloned() {
            match group.state {
                GroupState::Joining => {
                    if group.address != IPV4_MULTICAST_ALL_SYSTEMS {
                        let report = Packet::IgmpReport {
                            group: group.address,
                            mode: group.mode,
                            sources: group.sources.clone(),
                            join: true,
                        };
                        self.transmit(emit, &report)?;
                    }
                    if let Some(entry) = self.ipv4.as_mut().map(|c| &mut c.maddrs[index]) {
                        entry.state = GroupState::Joined;
                    }
                    cx.notify_mcast(id, group.address.into(), true);
                    changed = true;
                }
                GroupState::Leaving => {
                    if group.address != IPV4_MULTICAST_ALL_SYSTEMS {
                        let report = Packet::IgmpReport {
                            group: group.address,
                            mode: FilterMode::Include,
                            sources: Vec::new(),
                            join: false,
                        };
                        self.transmit(emit, &report)?;
                    }
                    if let Some(ipv4) = self.ipv4.as_mut() {
                        ipv4.maddrs.remove(index);
                    }
                    cx.push_event(id, EventKind::Ipv4MaddrDel(group.address));
                    changed = true;
                    continue;
                }
                GroupState::Joined | GroupState::Inactive => (),
            }
            index += 1;
        }

        Ok(changed)
    }
}
