// Heads up! Before working on this file you should read RFC 2863 for the
// operational states, RFC 4861 and 4862 for the IPv6 address lifecycle and
// RFC 5227 for IPv4 conflict detection.

#[cfg(test)]
mod tests;

#[cfg(feature = "proto-ipv4")]
mod ipv4;
#[cfg(feature = "proto-ipv6")]
mod ipv6;

#[cfg(feature = "proto-ipv4")]
pub use self::ipv4::Ipv4Config;
#[cfg(feature = "proto-ipv6")]
pub use self::ipv6::Ipv6Config;

use core::fmt;

use bitflags::bitflags;
use heapless::String;

use super::stack::Context;
use super::EmitError;
use super::Packet;
use crate::config::IFACE_MAX_NAME_LEN;
use crate::time::Instant;
use crate::wire::HardwareAddress;
use crate::{Error, Result};

/// Interface index. Indices start at 1, in the order interfaces were added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IfaceId(u8);

impl IfaceId {
    pub(crate) const fn new(index: u8) -> Self {
        IfaceId(index)
    }

    pub const fn index(&self) -> u8 {
        self.0
    }

    pub(crate) const fn slot(&self) -> usize {
        (self.0 as usize).wrapping_sub(1)
    }
}

impl fmt::Display for IfaceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// Administrative and operational interface flags.
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Flags: u16 {
        /// Administratively up.
        const UP = 0x0001;
        const POINTOPOINT = 0x0002;
        const PROMISC = 0x0004;
        /// Leave the interface down in [Stack::init](super::Stack::init).
        const NO_AUTO_START = 0x0008;
        const SUSPENDED = 0x0010;
        const FORWARD_MULTICASTS = 0x0020;
        /// IPv4 may be configured on the interface.
        const IPV4 = 0x0040;
        /// IPv6 may be configured on the interface.
        const IPV6 = 0x0080;
        /// Operationally up.
        const RUNNING = 0x0100;
        /// The driver reports a carrier.
        const LOWER_UP = 0x0200;
        const DORMANT = 0x0400;
        /// No neighbor discovery: no duplicate address detection and no
        /// router solicitation.
        const IPV6_NO_ND = 0x0800;
        /// No MLD reports; groups are joined locally only.
        const IPV6_NO_MLD = 0x1000;
        /// Transmissions need not be serialized.
        const NO_TX_LOCK = 0x2000;
    }
}

bitflags! {
    /// Capabilities of the link layer.
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct L2Flags: u8 {
        /// The link delivers multicast, so IPv6 joins the all-nodes and
        /// solicited-node groups.
        const MULTICAST = 0x01;
        /// Do not join solicited-node groups.
        const MULTICAST_SKIP_JOIN_SOLICIT_NODE = 0x02;
        const PROMISC_MODE = 0x04;
    }
}

/// Operational state, [RFC 2863] section 3.1.14.
///
/// [RFC 2863]: https://www.rfc-editor.org/rfc/rfc2863
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperState {
    Unknown,
    NotPresent,
    Down,
    LowerLayerDown,
    Testing,
    Dormant,
    Up,
}

impl fmt::Display for OperState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OperState::Unknown => write!(f, "UNKNOWN"),
            OperState::NotPresent => write!(f, "NOTPRESENT"),
            OperState::Down => write!(f, "DOWN"),
            OperState::LowerLayerDown => write!(f, "LOWERLAYERDOWN"),
            OperState::Testing => write!(f, "TESTING"),
            OperState::Dormant => write!(f, "DORMANT"),
            OperState::Up => write!(f, "UP"),
        }
    }
}

/// Configuration structure used for adding a network interface.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct Config {
    /// Link-layer address. The IPv6 link-local address is derived from it.
    pub hardware_addr: HardwareAddress,
    /// Interface name; `net<index>` when `None`.
    pub name: Option<&'static str>,
    pub mtu: u16,
    pub flags: Flags,
    pub l2_flags: L2Flags,
    /// Neighbor solicitations sent by duplicate address detection. Zero
    /// disables it.
    pub dad_transmits: u8,
    /// Run address conflict detection on IPv4 addresses.
    pub acd: bool,
}

impl Config {
    pub fn new(hardware_addr: HardwareAddress) -> Self {
        let mut flags = Flags::LOWER_UP;
        #[cfg(feature = "proto-ipv4")]
        flags.insert(Flags::IPV4);
        #[cfg(feature = "proto-ipv6")]
        flags.insert(Flags::IPV6);

        let l2_flags = match hardware_addr {
            HardwareAddress::Ip => L2Flags::empty(),
            HardwareAddress::Ethernet(_) => L2Flags::MULTICAST | L2Flags::PROMISC_MODE,
            HardwareAddress::Ieee802154(_) => L2Flags::MULTICAST,
        };

        Config {
            hardware_addr,
            name: None,
            mtu: 1500,
            flags,
            l2_flags,
            dad_transmits: 1,
            acd: true,
        }
    }
}

/// A network interface: link state plus the per-protocol address
/// configuration.
#[derive(Debug)]
pub struct Interface {
    pub(crate) id: IfaceId,
    name: String<IFACE_MAX_NAME_LEN>,
    hardware_addr: HardwareAddress,
    mtu: u16,
    flags: Flags,
    l2_flags: L2Flags,
    oper_state: OperState,
    oper_state_changed_at: Instant,
    pub(crate) dad_transmits: u8,
    pub(crate) acd: bool,
    #[cfg(feature = "proto-ipv6")]
    pub(crate) ipv6: Option<Ipv6Config>,
    #[cfg(feature = "proto-ipv4")]
    pub(crate) ipv4: Option<Ipv4Config>,
}

impl Interface {
    pub(crate) fn new(id: IfaceId, config: Config, now: Instant) -> Result<Self> {
        let mut iface = Interface {
            id,
            name: String::new(),
            hardware_addr: config.hardware_addr,
            mtu: config.mtu,
            flags: config.flags - (Flags::UP | Flags::RUNNING),
            l2_flags: config.l2_flags,
            oper_state: OperState::Down,
            oper_state_changed_at: now,
            dad_transmits: config.dad_transmits,
            acd: config.acd,
            #[cfg(feature = "proto-ipv6")]
            ipv6: None,
            #[cfg(feature = "proto-ipv4")]
            ipv4: None,
        };
        match config.name {
            Some(name) => iface.set_name(name)?,
            None => {
                use core::fmt::Write;
                write!(iface.name, "net{}", id.index() - 1).map_err(|_| Error::Exhausted)?;
            }
        }
        Ok(iface)
    }

    pub fn id(&self) -> IfaceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: &str) -> Result<()> {
        self.name = String::try_from(name).map_err(|_| Error::Exhausted)?;
        Ok(())
    }

    pub fn hardware_addr(&self) -> HardwareAddress {
        self.hardware_addr
    }

    pub(crate) fn set_hardware_addr(&mut self, addr: HardwareAddress) -> Result<()> {
        if self.is_admin_up() {
            return Err(Error::NotPermitted);
        }
        self.hardware_addr = addr;
        Ok(())
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub(crate) fn set_mtu(&mut self, mtu: u16) {
        self.mtu = mtu;
    }

    pub fn l2_flags(&self) -> L2Flags {
        self.l2_flags
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Set a flag without any of the side effects of
    /// [Stack::up](super::Stack::up) and friends.
    pub fn flag_set(&mut self, flag: Flags) {
        self.flags.insert(flag);
    }

    pub fn flag_clear(&mut self, flag: Flags) {
        self.flags.remove(flag);
    }

    pub fn flag_is_set(&self, flag: Flags) -> bool {
        self.flags.contains(flag)
    }

    /// Set `flag`, returning whether it was set before.
    pub fn flag_test_and_set(&mut self, flag: Flags) -> bool {
        let was = self.flags.contains(flag);
        self.flags.insert(flag);
        was
    }

    /// Clear `flag`, returning whether it was set before.
    pub fn flag_test_and_clear(&mut self, flag: Flags) -> bool {
        let was = self.flags.contains(flag);
        self.flags.remove(flag);
        was
    }

    /// Administratively and operationally up.
    pub fn is_up(&self) -> bool {
        self.flags.contains(Flags::UP | Flags::RUNNING)
    }

    pub fn is_admin_up(&self) -> bool {
        self.flags.contains(Flags::UP)
    }

    pub fn is_carrier_ok(&self) -> bool {
        self.flags.contains(Flags::LOWER_UP)
    }

    pub fn is_dormant(&self) -> bool {
        self.flags.contains(Flags::DORMANT)
    }

    pub fn is_promisc(&self) -> bool {
        self.flags.contains(Flags::PROMISC)
    }

    pub fn is_suspended(&self) -> bool {
        self.flags.contains(Flags::SUSPENDED)
    }

    pub fn is_pointopoint(&self) -> bool {
        self.flags.contains(Flags::POINTOPOINT)
    }

    /// Whether transmissions on this interface must be serialized.
    pub fn tx_lock_required(&self) -> bool {
        !self.flags.contains(Flags::NO_TX_LOCK)
    }

    pub fn oper_state(&self) -> OperState {
        self.oper_state
    }

    pub fn oper_state_change_time(&self) -> Instant {
        self.oper_state_changed_at
    }

    #[cfg(feature = "proto-ipv6")]
    pub fn ipv6(&self) -> Option<&Ipv6Config> {
        self.ipv6.as_ref()
    }

    #[cfg(feature = "proto-ipv4")]
    pub fn ipv4(&self) -> Option<&Ipv4Config> {
        self.ipv4.as_ref()
    }

    /// Recompute the operational state from the flags and run the up or
    /// down path on a transition. Returns whether the state changed.
    pub(crate) fn update_oper_state(&mut self, cx: &mut Context) -> bool {
        let state = if !self.flags.contains(Flags::UP) {
            OperState::Down
        } else if !self.flags.contains(Flags::LOWER_UP) {
            OperState::LowerLayerDown
        } else if self.flags.contains(Flags::DORMANT) {
            OperState::Dormant
        } else {
            OperState::Up
        };
        if state == self.oper_state {
            return false;
        }

        let was_up = self.oper_state == OperState::Up;
        net_debug!(
            "iface {}: oper state {} -> {}",
            self.id,
            self.oper_state,
            state
        );
        self.oper_state = state;
        self.oper_state_changed_at = cx.now;

        if state == OperState::Up {
            self.flags.insert(Flags::RUNNING);
            cx.push_event(self.id, super::EventKind::IfUp);
            self.start_ip(cx);
        } else if was_up {
            self.flags.remove(Flags::RUNNING);
            self.stop_ip(cx);
            cx.push_event(self.id, super::EventKind::IfDown);
        }
        true
    }

    fn start_ip(&mut self, cx: &mut Context) {
        #[cfg(feature = "proto-ipv6")]
        if self.flags.contains(Flags::IPV6) {
            self.ipv6_start(cx);
        }
        #[cfg(feature = "proto-ipv4")]
        if self.flags.contains(Flags::IPV4) {
            self.ipv4_start(cx);
        }
    }

    fn stop_ip(&mut self, cx: &mut Context) {
        #[cfg(feature = "proto-ipv6")]
        self.ipv6_stop(cx);
        #[cfg(feature = "proto-ipv4")]
        self.ipv4_stop(cx);
    }

    /// Run every timer of the interface that is due.
    ///
    /// Stops at the first packet `emit` refuses; whatever was being sent
    /// stays due for the next call.
    pub(crate) fn poll<F, E>(&mut self, cx: &mut Context, emit: &mut F) -> (bool, Option<EmitError>)
    where
        F: FnMut(IfaceId, &Packet) -> core::result::Result<(), E>,
    {
        let mut changed = false;

        #[cfg(feature = "proto-ipv6")]
        {
            changed |= self.ipv6_poll_lifetimes(cx);
            if self.is_up() {
                match self.ipv6_poll_link(cx, emit) {
                    Ok(c) => changed |= c,
                    Err(err) => return (changed, Some(err)),
                }
            }
        }

        #[cfg(feature = "proto-ipv4")]
        {
            changed |= self.ipv4_poll_lifetimes(cx);
            if self.is_up() {
                match self.ipv4_poll_link(cx, emit) {
                    Ok(c) => changed |= c,
                    Err(err) => return (changed, Some(err)),
                }
            }
        }

        (changed, None)
    }

    pub(crate) fn poll_at(&self) -> Option<Instant> {
        let mut at: Option<Instant> = None;
        let mut merge = |next: Option<Instant>| {
            at = match (at, next) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            }
        };
        #[cfg(feature = "proto-ipv6")]
        if let Some(ipv6) = &self.ipv6 {
            merge(ipv6.poll_at(self.is_up()));
        }
        #[cfg(feature = "proto-ipv4")]
        if let Some(ipv4) = &self.ipv4 {
            merge(ipv4.poll_at(self.is_up()));
        }
        at
    }

    /// Hand `packet` to the link.
    fn transmit<F, E>(&self, emit: &mut F, packet: &Packet) -> core::result::Result<(), EmitError>
    where
        F: FnMut(IfaceId, &Packet) -> core::result::Result<(), E>,
    {
        net_trace!("iface {}: emit {}", self.id, packet);
        emit(self.id, packet).map_err(|_| {
            net_debug!("iface {}: failed to emit {}", self.id, packet);
            EmitError
        })
    }
}
