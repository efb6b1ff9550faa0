/*! Network interface logic.

The `iface` module deals with the *network interfaces*. It keeps the addresses,
multicast groups, prefixes and routers of every interface, runs duplicate
address detection and address conflict detection, and tracks the operational
state of each link.
*/

#[cfg(feature = "proto-ipv4")]
mod acd;
mod address;
#[cfg(feature = "proto-ipv6")]
mod dad;
mod event;
mod interface;
mod multicast;
mod packet;
#[cfg(feature = "proto-ipv6")]
mod prefix;
mod router;
#[cfg(feature = "proto-ipv6")]
mod solicit;
mod stack;

#[cfg(feature = "proto-ipv4")]
pub use self::acd::AcdState;
#[cfg(feature = "proto-ipv4")]
pub use self::address::Ipv4AddrEntry;
pub use self::address::{AddrHandle, AddressKind, AddressState, Lifetime};
#[cfg(feature = "proto-ipv6")]
pub use self::address::{Ipv6AddrEntry, Ipv6AddrParams};
#[cfg(feature = "proto-ipv6")]
pub use self::dad::DAD_TIMEOUT;
pub use self::event::{Event, EventKind};
#[cfg(feature = "proto-ipv4")]
pub use self::interface::Ipv4Config;
#[cfg(feature = "proto-ipv6")]
pub use self::interface::Ipv6Config;
pub use self::interface::{Config, Flags, IfaceId, Interface, L2Flags, OperState};
#[cfg(feature = "proto-ipv4")]
pub use self::multicast::Ipv4Group;
#[cfg(feature = "proto-ipv6")]
pub use self::multicast::Ipv6Group;
pub use self::multicast::{FilterMode, GroupState, McastMonitor, MonitorHandle};
pub use self::packet::Packet;
#[cfg(feature = "proto-ipv6")]
pub use self::prefix::{Prefix, PrefixInformation, INFINITE_LIFETIME};
pub use self::router::Router;
#[cfg(feature = "proto-ipv6")]
pub use self::solicit::Phase as RsPhase;
pub use self::stack::{Config as StackConfig, Stack};

/// The `emit` closure refused a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EmitError;
