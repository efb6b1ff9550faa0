#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

//! The _smolnetif_ library tracks the IP addresses, multicast memberships, prefixes
//! and routers of a set of network interfaces, and runs the detection protocols that
//! decide when an address may be used.
//!
//! It is the bookkeeping half of an embedded IP stack: it never touches a packet
//! buffer. Instead, the [Stack](iface/struct.Stack.html) hands the control packets
//! it needs on the wire (DAD neighbor solicitations, ARP probes, MLD and IGMP
//! reports, router solicitations) to a closure supplied to `poll`, and reports
//! everything that happened through an event queue.
//!
//! # Address lifecycle
//!
//! An address added to an interface starts out *tentative* while Duplicate Address
//! Detection (IPv6, RFC 4862) or Address Conflict Detection (IPv4, RFC 5227) runs,
//! becomes *preferred* once no other host claimed it, and is *deprecated* when its
//! preferred lifetime runs out. A conflict while tentative removes the address.
//!
//! Addresses are reference counted: a socket bound to an address holds an
//! [AddrHandle](iface/struct.AddrHandle.html), and removing the address from the
//! interface only frees its slot once the last handle is given back.
//!
//! # Timers
//!
//! There are no threads and no timer wheel. Every timer is a deadline kept next to
//! the state it belongs to; call `Stack::poll` with the current time whenever
//! `Stack::poll_at` says something is due.
//!
//! # Configuration
//!
//! All tables are fixed-size, so the crate works without a heap. Their capacities
//! are set at compile time through environment variables read by the build script,
//! for example `SMOLNETIF_IFACE_MAX_IPV6_ADDR_COUNT=8`. See the [config] module for
//! the current values.
//!
//! # Feature flags
//!
//! - `std`: enable `std::error::Error` and conversions from `std::time`.
//! - `log`, `defmt`: emit diagnostics through the respective logging framework.
//! - `proto-ipv4`, `proto-ipv6`: enable the respective address family. At least one
//!   of them must be enabled.

#[cfg(not(any(feature = "proto-ipv4", feature = "proto-ipv6")))]
compile_error!("You must enable at least one of the following features: proto-ipv4, proto-ipv6");

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("You must enable at most one of the following features: defmt, log");

use core::fmt;

#[macro_use]
mod macros;
mod rand;


pub mod iface;
pub mod time;
pub mod wire;

/// Table capacities, generated by the build script.
#[allow(unused)]
pub mod config {
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

/// The error type for interface operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The interface has no configuration for the address family, or no
    /// configuration slot is left for it.
    NoConfig,
    /// A fixed-size table (addresses, groups, prefixes, routers, monitors,
    /// interfaces, multicast sources) is full.
    Exhausted,
    /// The interface, address, group, prefix or router does not exist.
    NotFound,
    /// The address cannot be used for this operation, e.g. a unicast
    /// address given where a multicast group is expected.
    Unaddressable,
    /// The operation was already performed.
    Already,
    /// The link layer does not support the operation.
    NotSupported,
    /// The operation is not permitted in the current interface state.
    NotPermitted,
    /// The address is not in a state where the operation applies.
    InvalidState,
    /// An address reference was released more often than it was taken.
    RefUnderflow,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NoConfig => write!(f, "no address configuration"),
            Error::Exhausted => write!(f, "table exhausted"),
            Error::NotFound => write!(f, "not found"),
            Error::Unaddressable => write!(f, "unaddressable"),
            Error::Already => write!(f, "already done"),
            Error::NotSupported => write!(f, "not supported"),
            Error::NotPermitted => write!(f, "not permitted"),
            Error::InvalidState => write!(f, "invalid address state"),
            Error::RefUnderflow => write!(f, "reference count underflow"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// The result type for interface operations.
pub type Result<T> = core::result::Result<T, Error>;
