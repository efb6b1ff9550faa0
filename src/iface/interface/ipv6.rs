use heapless::Vec;

use super::{Flags, IfaceId, Interface, L2Flags};
use crate::config::{
    IFACE_MAX_IPV6_ADDR_COUNT, IFACE_MAX_IPV6_CONFIG_COUNT, IFACE_MAX_IPV6_MADDR_COUNT,
    IFACE_MAX_IPV6_PREFIX_COUNT,
};
use crate::iface::address::{AddressKind, AddressState, Ipv6AddrEntry, Ipv6AddrParams, Lifetime};
use crate::iface::dad::{Dad, DadStep};
use crate::iface::multicast::{GroupState, Ipv6Group};
use crate::iface::prefix::{lifetime_from_secs, Prefix, PrefixInformation};
use crate::iface::solicit::{Phase, Solicit};
use crate::iface::stack::Context;
use crate::iface::{EmitError, EventKind, Packet};
use crate::rand::Rand;
use crate::time::{Duration, Instant};
use crate::wire::{Ipv6Address, Ipv6AddressExt, Ipv6Cidr, IPV6_LINK_LOCAL_ALL_NODES};
use crate::{Error, Result};

pub const DEFAULT_HOP_LIMIT: u8 = 64;
pub const DEFAULT_MCAST_HOP_LIMIT: u8 = 1;
/// Base for the randomized neighbor reachable time (RFC 4861 section 10).
pub const REACHABLE_TIME: Duration = Duration::from_secs(30);
pub const RETRANS_TIMER: Duration = Duration::from_secs(1);

/// Draw a reachable time uniformly from `[base / 2, 3 * base / 2]`.
fn calc_reachable_time(base: Duration, rand: &mut Rand) -> Duration {
    rand.rand_duration(base / 2, base * 3 / 2)
}

/// IPv6 state of an interface.
#[derive(Debug)]
pub struct Ipv6Config {
    pub(crate) addrs: Vec<Ipv6AddrEntry, IFACE_MAX_IPV6_ADDR_COUNT>,
    pub(crate) maddrs: Vec<Ipv6Group, IFACE_MAX_IPV6_MADDR_COUNT>,
    pub(crate) prefixes: Vec<Prefix, IFACE_MAX_IPV6_PREFIX_COUNT>,
    pub(crate) hop_limit: u8,
    pub(crate) mcast_hop_limit: u8,
    pub(crate) base_reachable_time: Duration,
    pub(crate) reachable_time: Duration,
    pub(crate) retrans_timer: Duration,
    pub(crate) solicit: Solicit,
}

impl Ipv6Config {
    fn new(rand: &mut Rand) -> Self {
        Ipv6Config {
            addrs: Vec::new(),
            maddrs: Vec::new(),
            prefixes: Vec::new(),
            hop_limit: DEFAULT_HOP_LIMIT,
            mcast_hop_limit: DEFAULT_MCAST_HOP_LIMIT,
            base_reachable_time: REACHABLE_TIME,
            reachable_time: calc_reachable_time(REACHABLE_TIME, rand),
            retrans_timer: RETRANS_TIMER,
            solicit: Solicit::new(),
        }
    }

    /// Configured addresses. Removed addresses still referenced by a
    /// handle are skipped.
    pub fn addrs(&self) -> impl Iterator<Item = &Ipv6AddrEntry> {
        self.addrs.iter().filter(|e| e.is_added)
    }

    pub fn maddrs(&self) -> impl Iterator<Item = &Ipv6Group> {
        self.maddrs.iter()
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &Prefix> {
        self.prefixes.iter()
    }

    pub fn hop_limit(&self) -> u8 {
        self.hop_limit
    }

    pub fn mcast_hop_limit(&self) -> u8 {
        self.mcast_hop_limit
    }

    pub fn base_reachable_time(&self) -> Duration {
        self.base_reachable_time
    }

    pub fn reachable_time(&self) -> Duration {
        self.reachable_time
    }

    pub fn retrans_timer(&self) -> Duration {
        self.retrans_timer
    }

    pub fn rs_phase(&self) -> Phase {
        self.solicit.phase()
    }

    /// Slot of `addr`, whether still added or only kept alive by handles.
    pub(crate) fn slot(&self, addr: &Ipv6Address) -> Option<usize> {
        self.addrs.iter().position(|e| e.address == *addr)
    }

    fn added_index(&self, addr: &Ipv6Address) -> Option<usize> {
        self.addrs
            .iter()
            .position(|e| e.is_added && e.address == *addr)
    }

    pub fn addr_lookup(&self, addr: &Ipv6Address) -> Option<&Ipv6AddrEntry> {
        self.added_index(addr).map(|i| &self.addrs[i])
    }

    fn maddr_index(&self, addr: &Ipv6Address) -> Option<usize> {
        self.maddrs.iter().position(|g| g.address == *addr)
    }

    pub fn maddr_lookup(&self, addr: &Ipv6Address) -> Option<&Ipv6Group> {
        self.maddr_index(addr).map(|i| &self.maddrs[i])
    }

    pub fn maddr_is_joined(&self, addr: &Ipv6Address) -> bool {
        self.maddr_lookup(addr).map_or(false, |g| g.is_joined())
    }

    fn prefix_index(&self, cidr: &Ipv6Cidr) -> Option<usize> {
        self.prefixes.iter().position(|p| p.cidr == *cidr)
    }

    /// First prefix matching `addr` over its first `len` bits.
    pub fn prefix_lookup(&self, addr: &Ipv6Address, len: u8) -> Option<&Prefix> {
        self.prefixes.iter().find(|p| p.matches(addr, len))
    }

    /// Among the prefixes containing `addr`, the shortest.
    pub fn prefix_get(&self, addr: &Ipv6Address) -> Option<&Prefix> {
        self.prefixes
            .iter()
            .filter(|p| p.cidr.contains_addr(addr))
            .min_by_key(|p| p.cidr.prefix_len())
    }

    /// First link-local address in `state`, or in any state for `None`.
    pub fn get_ll(&self, state: Option<AddressState>) -> Option<Ipv6Address> {
        self.addrs()
            .find(|e| e.address.is_link_local() && state.map_or(true, |s| e.state == s))
            .map(|e| e.address)
    }

    /// First address that is not link-local, in `state` or any state for
    /// `None`.
    pub fn get_global(&self, state: Option<AddressState>) -> Option<Ipv6Address> {
        self.addrs()
            .find(|e| !e.address.is_link_local() && state.map_or(true, |s| e.state == s))
            .map(|e| e.address)
    }

    /// The preferred global address sharing the longest prefix with `dst`,
    /// if it shares at least `best` bits. Later addresses win ties.
    pub(crate) fn best_match(&self, dst: &Ipv6Address, best: &mut u8) -> Option<Ipv6Address> {
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
        let lifetimes = self
            .addrs()
            .filter_map(|e| e.lifetime.poll_at(e.state));
        let prefixes = self.prefixes.iter().filter_map(|p| p.expires_at);
        let timers = lifetimes.chain(prefixes).min();
        if !is_up {
            return timers;
        }

        let dad = self.addrs().filter_map(|e| e.dad.map(|dad| dad.poll_at()));
        let reports = self
            .maddrs
            .iter()
            .filter(|g| matches!(g.state, GroupState::Joining | GroupState::Leaving))
            .map(|_| Instant::ZERO);
        let link = dad.chain(reports).chain(self.solicit.poll_at()).min();
        match (timers, link) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

impl Interface {
    /// The IPv6 configuration, attached on first use.
    pub(crate) fn config_ipv6_get(&mut self, cx: &mut Context) -> Result<&mut Ipv6Config> {
        if !self.flags.contains(Flags::IPV6) {
            return Err(Error::NoConfig);
        }
        if self.ipv6.is_none() {
            if cx.ipv6_configs >= IFACE_MAX_IPV6_CONFIG_COUNT {
                net_debug!("iface {}: no IPv6 config left", self.id);
                return Err(Error::NoConfig);
            }
            cx.ipv6_configs += 1;
            self.ipv6 = Some(Ipv6Config::new(&mut cx.rand));
        }
        self.ipv6.as_mut().ok_or(Error::NoConfig)
    }

    /// Detach the IPv6 configuration, dropping every address and group.
    pub(crate) fn config_ipv6_put(&mut self, cx: &mut Context) -> Result<()> {
        let ipv6 = self.ipv6.take().ok_or(Error::Already)?;
        cx.ipv6_configs -= 1;
        for group in ipv6.maddrs.iter().filter(|g| g.is_joined()) {
            cx.notify_mcast(self.id, group.address.into(), false);
        }
        for entry in ipv6.addrs.iter().filter(|e| e.is_added) {
            cx.push_event(self.id, EventKind::Ipv6AddrDel(entry.address));
        }
        Ok(())
    }

    fn ipv6_dad_enabled(&self) -> bool {
        self.dad_transmits > 0 && !self.flags.contains(Flags::IPV6_NO_ND)
    }

    fn mld_enabled(&self) -> bool {
        !self.flags.contains(Flags::IPV6_NO_MLD)
    }

    fn ipv6_entry_mut(&mut self, index: usize) -> Option<&mut Ipv6AddrEntry> {
        self.ipv6.as_mut().and_then(|c| c.addrs.get_mut(index))
    }

    fn ipv6_added_index(&self, addr: &Ipv6Address) -> Result<usize> {
        self.ipv6
            .as_ref()
            .and_then(|c| c.added_index(addr))
            .ok_or(Error::NotFound)
    }

    pub(crate) fn ipv6_addr_add(
        &mut self,
        cx: &mut Context,
        addr: Ipv6Address,
        params: &Ipv6AddrParams,
    ) -> Result<usize> {
        if !addr.x_is_unicast() {
            return Err(Error::Unaddressable);
        }
        let id = self.id;
        let lifetime = Lifetime::new(cx.now, params.preferred, params.valid);
        let generation = cx.next_generation();
        let ipv6 = self.config_ipv6_get(cx)?;

        let index = match ipv6.slot(&addr) {
            Some(i) if ipv6.addrs[i].is_added => return Ok(i),
            Some(i) => {
                ipv6.addrs[i].revive(params, lifetime);
                i
            }
            None => {
                ipv6.addrs
                    .push(Ipv6AddrEntry::new(addr, params, lifetime, generation))
                    .map_err(|_| Error::Exhausted)?;
                ipv6.addrs.len() - 1
            }
        };

        net_debug!("iface {}: IPv6 address {} ({}) added", id, addr, params.kind);
        cx.push_event(id, EventKind::Ipv6AddrAdd(addr));

        self.ipv6_join_auto_groups(cx, &addr);
        self.ipv6_begin_dad(cx, index);
        Ok(index)
    }

    /// Start a detection cycle for the address in slot `index`, or mark it
    /// preferred when duplicate address detection does not apply.
    fn ipv6_begin_dad(&mut self, cx: &mut Context, index: usize) {
        let dad_enabled = self.ipv6_dad_enabled();
        let is_up = self.is_up();
        let id = self.id;
        let Some(entry) = self.ipv6_entry_mut(index) else {
            return;
        };

        if dad_enabled && !entry.skip_dad {
            entry.state = AddressState::Tentative;
            entry.dad = is_up.then(|| Dad::new(cx.now));
            if is_up {
                net_debug!("iface {}: DAD started for {}", id, entry.address);
            }
        } else {
            entry.dad = None;
            if entry.state == AddressState::Tentative {
                entry.state = AddressState::Preferred;
            }
        }
    }

    pub(crate) fn ipv6_start_dad(&mut self, cx: &mut Context, addr: &Ipv6Address) -> Result<()> {
        let index = self.ipv6_added_index(addr)?;
        self.ipv6_begin_dad(cx, index);
        Ok(())
    }

    pub(crate) fn ipv6_dad_failed(&mut self, cx: &mut Context, addr: &Ipv6Address) -> Result<()> {
        let index = self.ipv6_added_index(addr)?;
        let id = self.id;
        if let Some(entry) = self.ipv6_entry_mut(index) {
            if entry.state != AddressState::Tentative {
                return Err(Error::InvalidState);
            }
            entry.dad = None;
        }
        net_debug!("iface {}: DAD failed for {}", id, addr);
        cx.push_event(id, EventKind::Ipv6DadFailed(*addr));
        self.ipv6_addr_rm(cx, addr)
    }

    pub(crate) fn ipv6_addr_rm(&mut self, cx: &mut Context, addr: &Ipv6Address) -> Result<()> {
        let index = self.ipv6_added_index(addr)?;
        if let Some(entry) = self.ipv6_entry_mut(index) {
            entry.is_added = false;
            entry.dad = None;
        }
        net_debug!("iface {}: IPv6 address {} removed", self.id, addr);
        self.ipv6_leave_auto_groups(cx, addr);
        self.ipv6_release(cx, index).map(|_| ())
    }

    /// Drop one reference to the address in slot `index`, freeing the slot
    /// on the last one.
    pub(crate) fn ipv6_release(&mut self, cx: &mut Context, index: usize) -> Result<u16> {
        let id = self.id;
        let ipv6 = self.ipv6.as_mut().ok_or(Error::NotFound)?;
        let left = ipv6
            .addrs
            .get(index)
            .ok_or(Error::NotFound)?
            .refcount
            .release()?;
        if left == 0 {
            let entry = ipv6.addrs.remove(index);
            net_debug!("iface {}: IPv6 address {} freed", id, entry.address);
            cx.push_event(id, EventKind::Ipv6AddrDel(entry.address));
        }
        Ok(left)
    }

    /// Restart the preferred lifetime; `None` makes it infinite.
    pub(crate) fn ipv6_addr_update_lifetime(
        &mut self,
        cx: &mut Context,
        addr: &Ipv6Address,
        lifetime: Option<Duration>,
    ) -> Result<()> {
        let index = self.ipv6_added_index(addr)?;
        let now = cx.now;
        let entry = self.ipv6_entry_mut(index).ok_or(Error::NotFound)?;
        entry.lifetime.deprecate_at = lifetime.map(|d| now + d);
        if entry.state == AddressState::Deprecated {
            entry.state = AddressState::Preferred;
        }
        net_debug!("iface {}: IPv6 address {} lifetime updated", self.id, addr);
        Ok(())
    }

    pub(crate) fn ipv6_addr_set_lifetimes(
        &mut self,
        cx: &mut Context,
        addr: &Ipv6Address,
        preferred: Option<Duration>,
        valid: Option<Duration>,
    ) -> Result<()> {
        let index = self.ipv6_added_index(addr)?;
        let now = cx.now;
        let entry = self.ipv6_entry_mut(index).ok_or(Error::NotFound)?;
        entry.lifetime = Lifetime::new(now, preferred, valid);
        if entry.state == AddressState::Deprecated && preferred != Some(Duration::ZERO) {
            entry.state = AddressState::Preferred;
        }
        Ok(())
    }

    fn ipv6_join_auto_groups(&mut self, cx: &mut Context, addr: &Ipv6Address) {
        if !self.l2_flags.contains(L2Flags::MULTICAST) {
            return;
        }
        self.ipv6_auto_join(cx, IPV6_LINK_LOCAL_ALL_NODES);
        if !self
            .l2_flags
            .contains(L2Flags::MULTICAST_SKIP_JOIN_SOLICIT_NODE)
        {
            self.ipv6_auto_join(cx, addr.solicited_node());
        }
    }

    fn ipv6_auto_join(&mut self, cx: &mut Context, group: Ipv6Address) {
        match self.mld_join(cx, group) {
            Ok(()) | Err(Error::Already) => (),
            Err(err) => net_debug!("iface {}: cannot join {}: {}", self.id, group, err),
        }
    }

    /// Leave the solicited-node group of a removed address unless another
    /// address still maps to it.
    fn ipv6_leave_auto_groups(&mut self, cx: &mut Context, addr: &Ipv6Address) {
        if !self.l2_flags.contains(L2Flags::MULTICAST)
            || self
                .l2_flags
                .contains(L2Flags::MULTICAST_SKIP_JOIN_SOLICIT_NODE)
        {
            return;
        }
        let group = addr.solicited_node();
        let shared = self.ipv6.as_ref().map_or(false, |c| {
            c.addrs()
                .any(|e| e.address != *addr && e.address.solicited_node() == group)
        });
        if !shared {
            let _ = self.mld_leave(cx, group);
        }
    }

    /// Join `group`. On an up interface running MLD the join completes once
    /// the next poll sent the report, otherwise at once.
    pub(crate) fn mld_join(&mut self, cx: &mut Context, group: Ipv6Address) -> Result<()> {
        if !group.is_multicast() {
            return Err(Error::Unaddressable);
        }
        let id = self.id;
        let is_up = self.is_up();
        let mld = self.mld_enabled();
        let ipv6 = self.config_ipv6_get(cx)?;

        let index = match ipv6.maddr_index(&group) {
            Some(i) => i,
            None => {
                ipv6.maddrs
                    .push(Ipv6Group::new(group))
                    .map_err(|_| Error::Exhausted)?;
                cx.push_event(id, EventKind::Ipv6MaddrAdd(group));
                ipv6.maddrs.len() - 1
            }
        };

        let entry = &mut ipv6.maddrs[index];
        match entry.state {
            GroupState::Joining | GroupState::Joined => return Err(Error::Already),
            GroupState::Leaving => {
                // The leave report is not out yet, so we never stopped
                // being a member.
                entry.state = GroupState::Joined;
                cx.notify_mcast(id, group.into(), true);
                return Ok(());
            }
            GroupState::Inactive if entry.rejoin => return Err(Error::Already),
            GroupState::Inactive => (),
        }

        if is_up && mld {
            entry.state = GroupState::Joining;
        } else {
            entry.state = GroupState::Joined;
            cx.notify_mcast(id, group.into(), true);
        }
        net_debug!("iface {}: joining {}", id, group);
        Ok(())
    }

    pub(crate) fn mld_leave(&mut self, cx: &mut Context, group: Ipv6Address) -> Result<()> {
        if !group.is_multicast() {
            return Err(Error::Unaddressable);
        }
        let id = self.id;
        let report = self.is_up() && self.mld_enabled();
        let ipv6 = self.ipv6.as_mut().ok_or(Error::NotFound)?;
        let index = ipv6.maddr_index(&group).ok_or(Error::NotFound)?;

        let entry = &mut ipv6.maddrs[index];
        match entry.state {
            GroupState::Joined => {
                cx.notify_mcast(id, group.into(), false);
                if report {
                    entry.state = GroupState::Leaving;
                    net_debug!("iface {}: leaving {}", id, group);
                    return Ok(());
                }
            }
            GroupState::Joining => (),
            GroupState::Inactive if entry.rejoin => (),
            GroupState::Inactive | GroupState::Leaving => return Err(Error::Already),
        }

        ipv6.maddrs.remove(index);
        net_debug!("iface {}: left {}", id, group);
        cx.push_event(id, EventKind::Ipv6MaddrDel(group));
        Ok(())
    }

    pub(crate) fn ipv6_maddr_add(&mut self, cx: &mut Context, addr: Ipv6Address) -> Result<()> {
        if !addr.is_multicast() {
            return Err(Error::Unaddressable);
        }
        let id = self.id;
        let ipv6 = self.config_ipv6_get(cx)?;
        if ipv6.maddr_index(&addr).is_some() {
            return Ok(());
        }
        ipv6.maddrs
            .push(Ipv6Group::new(addr))
            .map_err(|_| Error::Exhausted)?;
        net_debug!("iface {}: multicast address {} added", id, addr);
        cx.push_event(id, EventKind::Ipv6MaddrAdd(addr));
        Ok(())
    }

    pub(crate) fn ipv6_maddr_rm(&mut self, cx: &mut Context, addr: &Ipv6Address) -> Result<()> {
        let id = self.id;
        let ipv6 = self.ipv6.as_mut().ok_or(Error::NotFound)?;
        let index = ipv6.maddr_index(addr).ok_or(Error::NotFound)?;
        let group = ipv6.maddrs.remove(index);
        if group.is_joined() {
            cx.notify_mcast(id, group.address.into(), false);
        }
        net_debug!("iface {}: multicast address {} removed", id, addr);
        cx.push_event(id, EventKind::Ipv6MaddrDel(*addr));
        Ok(())
    }

    /// Mark a group joined without sending anything.
    pub(crate) fn ipv6_maddr_join(&mut self, cx: &mut Context, addr: &Ipv6Address) -> Result<()> {
        let id = self.id;
        let ipv6 = self.ipv6.as_mut().ok_or(Error::NotFound)?;
        let index = ipv6.maddr_index(addr).ok_or(Error::NotFound)?;
        let group = &mut ipv6.maddrs[index];
        if group.state != GroupState::Joined {
            group.state = GroupState::Joined;
            cx.notify_mcast(id, (*addr).into(), true);
        }
        Ok(())
    }

    /// Mark a group left without sending anything.
    pub(crate) fn ipv6_maddr_leave(&mut self, cx: &mut Context, addr: &Ipv6Address) -> Result<()> {
        let id = self.id;
        let ipv6 = self.ipv6.as_mut().ok_or(Error::NotFound)?;
        let index = ipv6.maddr_index(addr).ok_or(Error::NotFound)?;
        let group = &mut ipv6.maddrs[index];
        if group.state == GroupState::Joined {
            cx.notify_mcast(id, (*addr).into(), false);
        }
        group.state = GroupState::Inactive;
        group.rejoin = false;
        Ok(())
    }

    pub(crate) fn ipv6_prefix_add(
        &mut self,
        cx: &mut Context,
        prefix: Ipv6Address,
        len: u8,
        lifetime: u32,
    ) -> Result<usize> {
        let cidr = Ipv6Cidr::new_masked(prefix, len).ok_or(Error::Unaddressable)?;
        let id = self.id;
        let now = cx.now;
        let ipv6 = self.config_ipv6_get(cx)?;
        if let Some(index) = ipv6.prefix_index(&cidr) {
            return Ok(index);
        }

        let mut entry = Prefix::new(cidr);
        entry.set_timer(now, lifetime);
        ipv6.prefixes.push(entry).map_err(|_| Error::Exhausted)?;
        net_debug!("iface {}: prefix {} added", id, cidr);
        cx.push_event(id, EventKind::Ipv6PrefixAdd(cidr));
        Ok(ipv6.prefixes.len() - 1)
    }

    /// Remove a prefix and every autoconfigured address inside it.
    pub(crate) fn ipv6_prefix_rm(
        &mut self,
        cx: &mut Context,
        prefix: Ipv6Address,
        len: u8,
    ) -> Result<()> {
        let cidr = Ipv6Cidr::new_masked(prefix, len).ok_or(Error::NotFound)?;
        let ipv6 = self.ipv6.as_mut().ok_or(Error::NotFound)?;
        let index = ipv6.prefix_index(&cidr).ok_or(Error::NotFound)?;
        ipv6.prefixes.remove(index);

        let autoconf: Vec<Ipv6Address, IFACE_MAX_IPV6_ADDR_COUNT> = ipv6
            .addrs()
            .filter(|e| e.kind == AddressKind::Autoconf && cidr.contains_addr(&e.address))
            .map(|e| e.address)
            .collect();
        for addr in autoconf.iter() {
            let _ = self.ipv6_addr_rm(cx, addr);
        }

        net_debug!("iface {}: prefix {} removed", self.id, cidr);
        cx.push_event(self.id, EventKind::Ipv6PrefixDel(cidr));
        Ok(())
    }

    /// Restart the prefix countdown; `lifetime` of `0xffff_ffff` disables it.
    pub(crate) fn ipv6_prefix_set_timer(
        &mut self,
        cx: &mut Context,
        prefix: Ipv6Address,
        len: u8,
        lifetime: u32,
    ) -> Result<()> {
        let cidr = Ipv6Cidr::new_masked(prefix, len).ok_or(Error::NotFound)?;
        let ipv6 = self.ipv6.as_mut().ok_or(Error::NotFound)?;
        let index = ipv6.prefix_index(&cidr).ok_or(Error::NotFound)?;
        ipv6.prefixes[index].set_timer(cx.now, lifetime);
        Ok(())
    }

    /// Apply the prefix information option of a router advertisement.
    pub(crate) fn ipv6_handle_prefix_info(
        &mut self,
        cx: &mut Context,
        info: &PrefixInformation,
    ) -> Result<()> {
        if !info.is_valid() {
            return Err(Error::Unaddressable);
        }
        let cidr = info.cidr().ok_or(Error::Unaddressable)?;
        let now = cx.now;

        if info.on_link {
            if info.valid_lifetime == 0 {
                match self.ipv6_prefix_rm(cx, cidr.address(), cidr.prefix_len()) {
                    Ok(()) | Err(Error::NotFound) => (),
                    Err(err) => return Err(err),
                }
            } else {
                let index =
                    self.ipv6_prefix_add(cx, cidr.address(), cidr.prefix_len(), info.valid_lifetime)?;
                if let Some(prefix) = self.ipv6.as_mut().and_then(|c| c.prefixes.get_mut(index)) {
                    prefix.set_timer(now, info.valid_lifetime);
                }
            }
        }

        if !info.autonomous || cidr.prefix_len() != 64 || info.valid_lifetime == 0 {
            return Ok(());
        }
        let Some(iid) = self.hardware_addr.interface_id() else {
            return Ok(());
        };
        let addr = Ipv6Address::from_prefix_and_iid(&cidr.address(), iid);
        let preferred = lifetime_from_secs(info.preferred_lifetime);

        match self.ipv6_added_index(&addr) {
            Ok(index) => {
                let entry = self.ipv6_entry_mut(index).ok_or(Error::NotFound)?;
                if entry.kind != AddressKind::Autoconf {
                    return Ok(());
                }
                let valid = info.refreshed_valid(entry.lifetime.remaining_valid(now));
                entry.lifetime = Lifetime::new(now, preferred, valid);
                if entry.state == AddressState::Deprecated && preferred != Some(Duration::ZERO) {
                    entry.state = AddressState::Preferred;
                }
                net_debug!("iface {}: autoconf address {} refreshed", self.id, addr);
                Ok(())
            }
            Err(_) => {
                let mut params = Ipv6AddrParams::new(AddressKind::Autoconf);
                params.preferred = preferred;
                params.valid = lifetime_from_secs(info.valid_lifetime);
                self.ipv6_addr_add(cx, addr, &params).map(|_| ())
            }
        }
    }

    pub(crate) fn ipv6_set_base_reachable_time(
        &mut self,
        cx: &mut Context,
        base: Duration,
    ) -> Result<()> {
        let ipv6 = self.config_ipv6_get(cx)?;
        ipv6.base_reachable_time = base;
        ipv6.reachable_time = calc_reachable_time(base, &mut cx.rand);
        Ok(())
    }

    pub(crate) fn ipv6_set_reachable_time(&mut self, cx: &mut Context) -> Result<()> {
        let ipv6 = self.config_ipv6_get(cx)?;
        ipv6.reachable_time = calc_reachable_time(ipv6.base_reachable_time, &mut cx.rand);
        Ok(())
    }

    pub(crate) fn ipv6_start_rs(&mut self, cx: &mut Context) -> Result<()> {
        if !self.is_up() || self.flags.contains(Flags::IPV6_NO_ND) {
            return Err(Error::NotPermitted);
        }
        let now = cx.now;
        self.config_ipv6_get(cx)?.solicit.start(now);
        Ok(())
    }

    pub(crate) fn ipv6_stop_rs(&mut self) -> Result<()> {
        self.ipv6
            .as_mut()
            .ok_or(Error::NoConfig)?
            .solicit
            .stop();
        Ok(())
    }

    /// Interface became operational: autoconfigure the link-local address,
    /// detect duplicates, rejoin groups and look for routers.
    pub(super) fn ipv6_start(&mut self, cx: &mut Context) {
        if let Err(err) = self.config_ipv6_get(cx) {
            net_debug!("iface {}: IPv6 not started: {}", self.id, err);
            return;
        }

        if let Some(iid) = self.hardware_addr.interface_id() {
            let ll = Ipv6Address::from_prefix_and_iid(&Ipv6Cidr::LINK_LOCAL.address(), iid);
            if self.ipv6_added_index(&ll).is_err() {
                let params = Ipv6AddrParams::new(AddressKind::Autoconf);
                if let Err(err) = self.ipv6_addr_add(cx, ll, &params) {
                    net_debug!("iface {}: cannot add {}: {}", self.id, ll, err);
                }
            }
        }

        let count = self.ipv6.as_ref().map_or(0, |c| c.addrs.len());
        for index in 0..count {
            let restart = self.ipv6.as_ref().map_or(false, |c| {
                let e = &c.addrs[index];
                e.is_added && e.state == AddressState::Tentative && e.dad.is_none()
            });
            if restart {
                self.ipv6_begin_dad(cx, index);
            }
        }

        let id = self.id;
        let mld = self.mld_enabled();
        let nd = !self.flags.contains(Flags::IPV6_NO_ND);
        let now = cx.now;
        let Some(ipv6) = self.ipv6.as_mut() else {
            return;
        };
        for group in ipv6.maddrs.iter_mut().filter(|g| g.rejoin) {
            group.rejoin = false;
            if mld {
                group.state = GroupState::Joining;
            } else {
                group.state = GroupState::Joined;
                cx.notify_mcast(id, group.address.into(), true);
            }
        }
        if nd {
            ipv6.solicit.start(now);
        }
    }

    /// Interface left the operational state: forget group membership and
    /// running detections.
    pub(super) fn ipv6_stop(&mut self, cx: &mut Context) {
        let dad_enabled = self.ipv6_dad_enabled();
        let id = self.id;
        let Some(ipv6) = self.ipv6.as_mut() else {
            return;
        };

        for entry in ipv6.addrs.iter_mut().filter(|e| e.is_added) {
            entry.dad = None;
            if dad_enabled && !entry.skip_dad {
                entry.state = AddressState::Tentative;
            }
        }

        let mut gone: Vec<Ipv6Address, IFACE_MAX_IPV6_MADDR_COUNT> = Vec::new();
        for group in ipv6.maddrs.iter_mut() {
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
        ipv6.maddrs.retain(|g| g.state != GroupState::Leaving);
        for addr in gone {
            cx.push_event(id, EventKind::Ipv6MaddrDel(addr));
        }

        ipv6.solicit.reset();
    }

    /// Deprecate and expire addresses, expire prefixes.
    pub(super) fn ipv6_poll_lifetimes(&mut self, cx: &mut Context) -> bool {
        let now = cx.now;
        let id = self.id;
        let Some(ipv6) = self.ipv6.as_mut() else {
            return false;
        };

        let mut changed = false;
        let mut expired: Vec<Ipv6Address, IFACE_MAX_IPV6_ADDR_COUNT> = Vec::new();
        for entry in ipv6.addrs.iter_mut().filter(|e| e.is_added) {
            if entry.lifetime.is_expired(now) {
                let _ = expired.push(entry.address);
            } else if entry.lifetime.should_deprecate(entry.state, now) {
                entry.state = AddressState::Deprecated;
                net_debug!("iface {}: IPv6 address {} deprecated", id, entry.address);
                cx.push_event(id, EventKind::Ipv6AddrDeprecated(entry.address));
                changed = true;
            }
        }
        let prefixes: Vec<Ipv6Cidr, IFACE_MAX_IPV6_PREFIX_COUNT> = ipv6
            .prefixes
            .iter()
            .filter(|p| p.is_expired(now))
            .map(|p| p.cidr)
            .collect();

        for addr in expired.iter() {
            net_debug!("iface {}: IPv6 address {} expired", id, addr);
            changed |= self.ipv6_addr_rm(cx, addr).is_ok();
        }
        for cidr in prefixes.iter() {
            net_debug!("iface {}: prefix {} expired", id, cidr);
            changed |= self
                .ipv6_prefix_rm(cx, cidr.address(), cidr.prefix_len())
                .is_ok();
        }
        changed
    }

    /// Send what duplicate address detection, router solicitation and MLD
    /// need, and complete detections that timed out.
    pub(super) fn ipv6_poll_link<F, E>(
        &mut self,
        cx: &mut Context,
        emit: &mut F,
    ) -> core::result::Result<bool, EmitError>
    where
        F: FnMut(IfaceId, &Packet) -> core::result::Result<(), E>,
    {
        let now = cx.now;
        let id = self.id;
        let transmits = self.dad_transmits;
        let mut changed = false;

        let count = self.ipv6.as_ref().map_or(0, |c| c.addrs.len());
        for index in 0..count {
            let step = self
                .ipv6
                .as_ref()
                .map(|c| &c.addrs[index])
                .filter(|e| e.is_added)
                .and_then(|e| e.dad.map(|dad| (e.address, dad.next(now, transmits))));
            match step {
                Some((target, DadStep::Probe)) => {
                    self.transmit(emit, &Packet::NeighborSolicitation { target })?;
                    if let Some(dad) = self.ipv6_entry_mut(index).and_then(|e| e.dad.as_mut()) {
                        dad.probe_sent(now);
                    }
                    changed = true;
                }
                Some((addr, DadStep::Done)) => {
                    if let Some(entry) = self.ipv6_entry_mut(index) {
                        entry.dad = None;
                        // Detection rerun after a link flap keeps a deprecated address deprecated.
                        entry.state = match entry.lifetime.deprecate_at {
                            Some(at) if at <= now => AddressState::Deprecated,
                            _ => AddressState::Preferred,
                        };
                    }
                    net_debug!("iface {}: DAD succeeded for {}", id, addr);
                    cx.push_event(id, EventKind::Ipv6DadSucceeded(addr));
                    changed = true;
                }
                Some((_, DadStep::Wait(_))) | None => (),
            }
        }

        let rs_required = self
            .ipv6
            .as_ref()
            .map_or(false, |c| c.solicit.rs_required(now));
        if rs_required {
            self.transmit(emit, &Packet::RouterSolicitation)?;
            if let Some(ipv6) = self.ipv6.as_mut() {
                ipv6.solicit.rs_sent(now);
            }
            changed = true;
        }
        if let Some(ipv6) = self.ipv6.as_mut() {
            if ipv6.solicit.update(now) {
                net_debug!("iface {}: no router answered", id);
            }
        }

        let mut index = 0;
        while let Some((group, state)) = self
            .ipv6
            .as_ref()
            .and_then(|c| c.maddrs.get(index))
            .map(|g| (g.address, g.state))
        {
            match state {
                GroupState::Joining => {
                    self.transmit(emit, &Packet::MldReport { group, join: true })?;
                    if let Some(entry) = self.ipv6.as_mut().map(|c| &mut c.maddrs[index]) {
                        entry.state = GroupState::Joined;
                    }
                    cx.notify_mcast(id, group.into(), true);
                    changed = true;
                }
                GroupState::Leaving => {
                    self.transmit(emit, &Packet::MldReport { group, join: false })?;
                    if let Some(ipv6) = self.ipv6.as_mut() {
                        ipv6.maddrs.remove(index);
                    }
                    cx.push_event(id, EventKind::Ipv6MaddrDel(group));
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
