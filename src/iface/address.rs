use core::fmt;
use core::sync::atomic::{AtomicU16, Ordering};

#[cfg(feature = "proto-ipv4")]
use super::acd::{Acd, AcdState};
#[cfg(feature = "proto-ipv6")]
use super::dad::Dad;
use super::IfaceId;
use crate::time::{Duration, Instant};
#[cfg(feature = "proto-ipv4")]
use crate::wire::Ipv4Address;
#[cfg(feature = "proto-ipv6")]
use crate::wire::Ipv6Address;
use crate::wire::IpAddress;
use crate::{Error, Result};

/// How an address was configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressKind {
    /// Stateless autoconfiguration: link-local or derived from a router prefix.
    Autoconf,
    /// Leased from a DHCP server.
    Dhcp,
    /// Configured by the application.
    Manual,
    /// Configured by the application, but a DHCP lease may replace it.
    Overridable,
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AddressKind::Autoconf => write!(f, "autoconf"),
            AddressKind::Dhcp => write!(f, "dhcp"),
            AddressKind::Manual => write!(f, "manual"),
            AddressKind::Overridable => write!(f, "overridable"),
        }
    }
}

/// Lifecycle state of an address.
///
/// An address is `Tentative` while duplicate address detection or address
/// conflict detection runs, `Preferred` once it may be used freely, and
/// `Deprecated` once its preferred lifetime ran out: existing users keep it,
/// new connections avoid it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressState {
    Tentative,
    Preferred,
    Deprecated,
}

impl fmt::Display for AddressState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AddressState::Tentative => write!(f, "tentative"),
            AddressState::Preferred => write!(f, "preferred"),
            AddressState::Deprecated => write!(f, "deprecated"),
        }
    }
}

/// Deadlines of an address. `None` means "forever".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Lifetime {
    /// When the address becomes deprecated.
    pub deprecate_at: Option<Instant>,
    /// When the address is removed.
    pub expire_at: Option<Instant>,
}

impl Lifetime {
    pub const INFINITE: Lifetime = Lifetime {
        deprecate_at: None,
        expire_at: None,
    };

    /// Lifetime starting at `now` from a preferred and a valid lifetime.
    pub fn new(now: Instant, preferred: Option<Duration>, valid: Option<Duration>) -> Lifetime {
        Lifetime {
            deprecate_at: preferred.map(|d| now + d),
            expire_at: valid.map(|d| now + d),
        }
    }

    pub fn is_infinite(&self) -> bool {
        self.deprecate_at.is_none() && self.expire_at.is_none()
    }

    /// Time left until the address is removed, `None` if it never is.
    pub fn remaining_valid(&self, now: Instant) -> Option<Duration> {
        self.expire_at.map(|at| at.saturating_duration_since(now))
    }

    pub(crate) fn poll_at(&self, state: AddressState) -> Option<Instant> {
        let deprecate_at = match state {
            AddressState::Preferred => self.deprecate_at,
            _ => None,
        };
        match (deprecate_at, self.expire_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub(crate) fn should_deprecate(&self, state: AddressState, now: Instant) -> bool {
        state == AddressState::Preferred && matches!(self.deprecate_at, Some(at) if at <= now)
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expire_at, Some(at) if at <= now)
    }
}

/// Atomic reference count of an address slot.
///
/// The interface holds one reference for as long as the address is added;
/// every [AddrHandle] holds another.
#[derive(Debug)]
pub(crate) struct RefCount(AtomicU16);

impl RefCount {
    pub(crate) const fn new() -> Self {
        RefCount(AtomicU16::new(1))
    }

    pub(crate) fn get(&self) -> u16 {
        self.0.load(Ordering::Acquire)
    }

    /// Take a reference to a live slot. Fails once the count reached zero
    /// or would overflow.
    pub(crate) fn acquire(&self) -> Option<u16> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n == 0 {
                    None
                } else {
                    n.checked_add(1)
                }
            })
            .ok()
            .map(|old| old + 1)
    }

    /// Take a reference regardless of the current count.
    pub(crate) fn revive(&self) -> u16 {
        self.0.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    /// Drop a reference, returning the remaining count.
    pub(crate) fn release(&self) -> Result<u16> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|old| old - 1)
            .map_err(|_| Error::RefUnderflow)
    }
}

/// A counted reference to an interface address.
///
/// Obtained from [Stack::addr_ref](super::Stack::addr_ref). The address slot
/// stays allocated while the handle exists, even if the address is removed
/// from the interface in the meantime. Give the handle back with
/// [Stack::addr_unref](super::Stack::addr_unref); the handle cannot be
/// cloned, so a reference cannot be released twice.
///
/// A handle is tied to the slot it was taken from. Once that slot is gone,
/// adding the same address again does not make the old handle valid.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping a handle leaks the address reference, pass it to `Stack::addr_unref`"]
pub struct AddrHandle {
    pub(crate) iface: IfaceId,
    pub(crate) addr: IpAddress,
    pub(crate) generation: u16,
}

impl AddrHandle {
    pub fn iface(&self) -> IfaceId {
        self.iface
    }

    pub fn address(&self) -> IpAddress {
        self.addr
    }
}

impl fmt::Display for AddrHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}%{}", self.addr, self.iface)
    }
}

/// Parameters for adding an IPv6 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg(feature = "proto-ipv6")]
pub struct Ipv6AddrParams {
    pub kind: AddressKind,
    /// Preferred lifetime; `None` is infinite.
    pub preferred: Option<Duration>,
    /// Valid lifetime; `None` is infinite.
    pub valid: Option<Duration>,
    /// Consider the address unique without running duplicate address detection.
    pub skip_dad: bool,
    pub mesh_local: bool,
    /// Privacy extension address (RFC 8981).
    pub temporary: bool,
}

#[cfg(feature = "proto-ipv6")]
impl Ipv6AddrParams {
    pub const fn new(kind: AddressKind) -> Self {
        Ipv6AddrParams {
            kind,
            preferred: None,
            valid: None,
            skip_dad: false,
            mesh_local: false,
            temporary: false,
        }
    }
}

/// An IPv6 unicast address bound to an interface.
#[derive(Debug)]
#[cfg(feature = "proto-ipv6")]
pub struct Ipv6AddrEntry {
    pub(crate) address: Ipv6Address,
    pub(crate) kind: AddressKind,
    pub(crate) state: AddressState,
    pub(crate) lifetime: Lifetime,
    pub(crate) refcount: RefCount,
    pub(crate) generation: u16,
    pub(crate) dad: Option<Dad>,
    pub(crate) skip_dad: bool,
    pub(crate) is_mesh_local: bool,
    pub(crate) is_temporary: bool,
    pub(crate) is_added: bool,
}

#[cfg(feature = "proto-ipv6")]
impl Ipv6AddrEntry {
    pub(crate) fn new(
        address: Ipv6Address,
        params: &Ipv6AddrParams,
        lifetime: Lifetime,
        generation: u16,
    ) -> Self {
        Ipv6AddrEntry {
            address,
            kind: params.kind,
            state: AddressState::Tentative,
            lifetime,
            refcount: RefCount::new(),
            generation,
            dad: None,
            skip_dad: params.skip_dad,
            is_mesh_local: params.mesh_local,
            is_temporary: params.temporary,
            is_added: true,
        }
    }

    /// Reuse a slot still held by outstanding handles for a fresh add.
    pub(crate) fn revive(&mut self, params: &Ipv6AddrParams, lifetime: Lifetime) {
        self.refcount.revive();
        self.kind = params.kind;
        self.state = AddressState::Tentative;
        self.lifetime = lifetime;
        self.dad = None;
        self.skip_dad = params.skip_dad;
        self.is_mesh_local = params.mesh_local;
        self.is_temporary = params.temporary;
        self.is_added = true;
    }

    pub fn address(&self) -> Ipv6Address {
        self.address
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    pub fn state(&self) -> AddressState {
        self.state
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Number of references held, including the interface's own.
    pub fn refcount(&self) -> u16 {
        self.refcount.get()
    }

    pub fn is_tentative(&self) -> bool {
        self.state == AddressState::Tentative
    }

    pub fn is_preferred(&self) -> bool {
        self.state == AddressState::Preferred
    }

    pub fn is_deprecated(&self) -> bool {
        self.state == AddressState::Deprecated
    }

    pub fn is_mesh_local(&self) -> bool {
        self.is_mesh_local
    }

    pub fn is_temporary(&self) -> bool {
        self.is_temporary
    }

    /// Whether the address is still configured, as opposed to removed but
    /// kept alive by outstanding handles.
    pub fn is_added(&self) -> bool {
        self.is_added
    }

    /// Number of neighbor solicitations sent by the running detection, if any.
    pub fn dad_count(&self) -> Option<u8> {
        self.dad.as_ref().map(|dad| dad.count())
    }

    /// When the running duplicate address detection started.
    pub fn dad_started_at(&self) -> Option<Instant> {
        self.dad.as_ref().map(|dad| dad.started_at())
    }
}

/// An IPv4 unicast address bound to an interface.
#[derive(Debug)]
#[cfg(feature = "proto-ipv4")]
pub struct Ipv4AddrEntry {
    pub(crate) address: Ipv4Address,
    pub(crate) netmask: Ipv4Address,
    pub(crate) kind: AddressKind,
    pub(crate) state: AddressState,
    pub(crate) lifetime: Lifetime,
    pub(crate) refcount: RefCount,
    pub(crate) generation: u16,
    pub(crate) acd: Option<Acd>,
    pub(crate) is_added: bool,
}

#[cfg(feature = "proto-ipv4")]
impl Ipv4AddrEntry {
    pub(crate) fn new(
        address: Ipv4Address,
        netmask: Ipv4Address,
        kind: AddressKind,
        lifetime: Lifetime,
        generation: u16,
    ) -> Self {
        Ipv4AddrEntry {
            address,
            netmask,
            kind,
            state: AddressState::Tentative,
            lifetime,
            refcount: RefCount::new(),
            generation,
            acd: None,
            is_added: true,
        }
    }

    pub(crate) fn revive(&mut self, netmask: Ipv4Address, kind: AddressKind, lifetime: Lifetime) {
        self.refcount.revive();
        self.netmask = netmask;
        self.kind = kind;
        self.state = AddressState::Tentative;
        self.lifetime = lifetime;
        self.acd = None;
        self.is_added = true;
    }

    pub fn address(&self) -> Ipv4Address {
        self.address
    }

    pub fn netmask(&self) -> Ipv4Address {
        self.netmask
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    pub fn state(&self) -> AddressState {
        self.state
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn refcount(&self) -> u16 {
        self.refcount.get()
    }

    pub fn is_tentative(&self) -> bool {
        self.state == AddressState::Tentative
    }

    pub fn is_preferred(&self) -> bool {
        self.state == AddressState::Preferred
    }

    pub fn is_added(&self) -> bool {
        self.is_added
    }

    /// State of the running conflict detection, if any.
    pub fn acd_state(&self) -> Option<AcdState> {
        self.acd.as_ref().map(|acd| acd.state())
    }

    /// Probes or announcements sent in the current conflict detection state.
    pub fn acd_count(&self) -> Option<u8> {
        self.acd.as_ref().map(|acd| acd.count())
    }
}
