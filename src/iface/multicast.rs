use core::fmt;

use heapless::Vec;

use super::IfaceId;
#[cfg(feature = "proto-ipv4")]
use crate::config::IFACE_MAX_MCAST_SOURCE_COUNT;
use crate::config::IFACE_MAX_MONITOR_COUNT;
#[cfg(feature = "proto-ipv4")]
use crate::wire::Ipv4Address;
#[cfg(feature = "proto-ipv6")]
use crate::wire::Ipv6Address;
use crate::wire::IpAddress;
use crate::{Error, Result};

/// IGMPv3 source filter mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterMode {
    /// Receive only from the listed sources.
    Include,
    /// Receive from every source except the listed ones.
    #[default]
    Exclude,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FilterMode::Include => write!(f, "include"),
            FilterMode::Exclude => write!(f, "exclude"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GroupState {
    /// In the table, but not a member: added without joining, or left
    /// behind by an interface that went down.
    Inactive,
    /// Joining group, we have to send the join report.
    Joining,
    /// We've already sent the join report, we have nothing to do.
    Joined,
    /// We want to leave the group, we have to send a leave report.
    Leaving,
}

/// A multicast group on an IPv6 interface.
#[derive(Debug, Clone)]
#[cfg(feature = "proto-ipv6")]
pub struct Ipv6Group {
    pub(crate) address: Ipv6Address,
    pub(crate) state: GroupState,
    /// Rejoin when the interface comes back up.
    pub(crate) rejoin: bool,
}

#[cfg(feature = "proto-ipv6")]
impl Ipv6Group {
    pub(crate) fn new(address: Ipv6Address) -> Self {
        Ipv6Group {
            address,
            state: GroupState::Inactive,
            rejoin: false,
        }
    }

    pub fn address(&self) -> Ipv6Address {
        self.address
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    pub fn is_joined(&self) -> bool {
        self.state == GroupState::Joined
    }
}

/// A multicast group on an IPv4 interface, with its IGMPv3 source filter.
#[derive(Debug, Clone)]
#[cfg(feature = "proto-ipv4")]
pub struct Ipv4Group {
    pub(crate) address: Ipv4Address,
    pub(crate) state: GroupState,
    pub(crate) rejoin: bool,
    pub(crate) mode: FilterMode,
    pub(crate) sources: Vec<Ipv4Address, IFACE_MAX_MCAST_SOURCE_COUNT>,
}

#[cfg(feature = "proto-ipv4")]
impl Ipv4Group {
    pub(crate) fn new(address: Ipv4Address) -> Self {
        Ipv4Group {
            address,
            state: GroupState::Inactive,
            rejoin: false,
            mode: FilterMode::Exclude,
            sources: Vec::new(),
        }
    }

    pub(crate) fn set_filter(&mut self, mode: FilterMode, sources: &[Ipv4Address]) -> Result<()> {
        self.sources = Vec::from_slice(sources).map_err(|_| Error::Exhausted)?;
        self.mode = mode;
        Ok(())
    }

    pub fn address(&self) -> Ipv4Address {
        self.address
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    pub fn is_joined(&self) -> bool {
        self.state == GroupState::Joined
    }

    pub fn filter_mode(&self) -> FilterMode {
        self.mode
    }

    pub fn sources(&self) -> &[Ipv4Address] {
        &self.sources
    }
}

/// Callback invoked on every join (`true`) and leave (`false`).
pub type McastMonitor = fn(IfaceId, &IpAddress, bool);

/// Registration token returned by
/// [Stack::mcast_monitor_register](super::Stack::mcast_monitor_register).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MonitorHandle(u16);

#[derive(Debug, Clone, Copy)]
struct Monitor {
    handle: MonitorHandle,
    iface: Option<IfaceId>,
    callback: McastMonitor,
}

/// Registered multicast monitors, oldest first.
#[derive(Debug)]
pub(crate) struct Monitors {
    monitors: Vec<Monitor, IFACE_MAX_MONITOR_COUNT>,
    next_handle: u16,
}

impl Monitors {
    pub(crate) fn new() -> Self {
        Monitors {
            monitors: Vec::new(),
            next_handle: 0,
        }
    }

    pub(crate) fn register(
        &mut self,
        iface: Option<IfaceId>,
        callback: McastMonitor,
    ) -> Result<MonitorHandle> {
        if self.monitors.is_full() {
            return Err(Error::Exhausted);
        }
        // Skip handles still in use after a wrap.
        let mut handle = MonitorHandle(self.next_handle);
        while self.monitors.iter().any(|m| m.handle == handle) {
            handle = MonitorHandle(handle.0.wrapping_add(1));
        }
        self.next_handle = handle.0.wrapping_add(1);
        self.monitors
            .push(Monitor {
                handle,
                iface,
                callback,
            })
            .map_err(|_| Error::Exhausted)?;
        Ok(handle)
    }

    pub(crate) fn unregister(&mut self, handle: MonitorHandle) -> Result<()> {
        let index = self
            .monitors
            .iter()
            .position(|m| m.handle == handle)
            .ok_or(Error::NotFound)?;
        self.monitors.remove(index);
        Ok(())
    }

    /// Run every monitor interested in `iface`, most recently registered first.
    pub(crate) fn notify(&self, iface: IfaceId, addr: &IpAddress, is_joined: bool) {
        for monitor in self.monitors.iter().rev() {
            if monitor.iface.map_or(true, |filter| filter == iface) {
                (monitor.callback)(iface, addr, is_joined);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.monitors.len()
    }
}
