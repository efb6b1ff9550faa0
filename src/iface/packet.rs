use core::fmt;

use heapless::Vec;

#[cfg(feature = "proto-ipv4")]
use super::multicast::FilterMode;
#[cfg(feature = "proto-ipv4")]
use crate::config::IFACE_MAX_MCAST_SOURCE_COUNT;
#[cfg(feature = "proto-ipv4")]
use crate::wire::{Ipv4Address, IPV4_MULTICAST_ALL_IGMPV3_ROUTERS};
#[cfg(feature = "proto-ipv6")]
use crate::wire::{
    Ipv6Address, Ipv6AddressExt, IPV6_LINK_LOCAL_ALL_MLDV2_ROUTERS, IPV6_LINK_LOCAL_ALL_ROUTERS,
};
use crate::wire::IpAddress;

/// A control packet the interface layer needs on the wire.
///
/// Handed to the `emit` closure of [Stack::poll](super::Stack::poll) together
/// with the interface to send it on. Framing and transmission are up to the
/// caller; the helpers below give the IP source and destination the packet
/// must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Packet {
    /// Duplicate address detection probe, sent from the unspecified address
    /// to the solicited-node group of `target`.
    #[cfg(feature = "proto-ipv6")]
    NeighborSolicitation { target: Ipv6Address },
    /// Router solicitation to all routers.
    #[cfg(feature = "proto-ipv6")]
    RouterSolicitation,
    /// MLDv2 state change report for one group.
    #[cfg(feature = "proto-ipv6")]
    MldReport { group: Ipv6Address, join: bool },
    /// ARP probe: sender IP 0.0.0.0, target IP `target`.
    #[cfg(feature = "proto-ipv4")]
    ArpProbe { target: Ipv4Address },
    /// Gratuitous ARP: sender and target IP both `addr`.
    #[cfg(feature = "proto-ipv4")]
    ArpAnnounce { addr: Ipv4Address },
    /// IGMPv3 state change report for one group.
    #[cfg(feature = "proto-ipv4")]
    IgmpReport {
        group: Ipv4Address,
        mode: FilterMode,
        sources: Vec<Ipv4Address, IFACE_MAX_MCAST_SOURCE_COUNT>,
        join: bool,
    },
}

impl Packet {
    /// IP destination of the packet, `None` for ARP.
    pub fn dst_addr(&self) -> Option<IpAddress> {
        match self {
            #[cfg(feature = "proto-ipv6")]
            Packet::NeighborSolicitation { target } => Some(target.solicited_node().into()),
            #[cfg(feature = "proto-ipv6")]
            Packet::RouterSolicitation => Some(IPV6_LINK_LOCAL_ALL_ROUTERS.into()),
            #[cfg(feature = "proto-ipv6")]
            Packet::MldReport { .. } => Some(IPV6_LINK_LOCAL_ALL_MLDV2_ROUTERS.into()),
            #[cfg(feature = "proto-ipv4")]
            Packet::ArpProbe { .. } | Packet::ArpAnnounce { .. } => None,
            #[cfg(feature = "proto-ipv4")]
            Packet::IgmpReport { .. } => Some(IPV4_MULTICAST_ALL_IGMPV3_ROUTERS.into()),
        }
    }

    /// Whether the packet has to leave from the unspecified address
    /// regardless of what the interface owns.
    pub fn needs_unspecified_src(&self) -> bool {
        match self {
            #[cfg(feature = "proto-ipv6")]
            Packet::NeighborSolicitation { .. } => true,
            #[cfg(feature = "proto-ipv4")]
            Packet::ArpProbe { .. } => true,
            #[allow(unreachable_patterns)]
            _ => false,
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            #[cfg(feature = "proto-ipv6")]
            Packet::NeighborSolicitation { target } => write!(f, "NS target={target}"),
            #[cfg(feature = "proto-ipv6")]
            Packet::RouterSolicitation => write!(f, "RS"),
            #[cfg(feature = "proto-ipv6")]
            Packet::MldReport { group, join } => {
                write!(f, "MLD {} {group}", if *join { "join" } else { "leave" })
            }
            #[cfg(feature = "proto-ipv4")]
            Packet::ArpProbe { target } => write!(f, "ARP probe {target}"),
            #[cfg(feature = "proto-ipv4")]
            Packet::ArpAnnounce { addr } => write!(f, "ARP announce {addr}"),
            #[cfg(feature = "proto-ipv4")]
            Packet::IgmpReport {
                group,
                mode,
                sources,
                join,
            } => write!(
                f,
                "IGMP {} {group} {mode} sources={}",
                if *join { "join" } else { "leave" },
                sources.len()
            ),
        }
    }
}
