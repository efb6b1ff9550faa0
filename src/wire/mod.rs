/*! Address vocabulary.

The `wire` module holds the address types the interface layer reasons about:
IPv4 and IPv6 addresses and CIDR blocks, and the link-layer addresses that
interface identifiers are derived from. Packet parsing and emission live
outside this crate; the interface layer only describes which control
packets have to be sent, see [Packet](../iface/enum.Packet.html).
*/

mod ethernet;
mod ieee802154;
pub(crate) mod ip;
#[cfg(feature = "proto-ipv4")]
pub(crate) mod ipv4;
#[cfg(feature = "proto-ipv6")]
pub(crate) mod ipv6;

use core::fmt;

pub use self::ethernet::Address as EthernetAddress;
pub use self::ieee802154::Address as Ieee802154Address;

pub use self::ip::{Address as IpAddress, Cidr as IpCidr, Version as IpVersion};

#[cfg(feature = "proto-ipv4")]
pub use self::ipv4::{
    netmask as ipv4_netmask, Address as Ipv4Address, AddressExt as Ipv4AddressExt,
    Cidr as Ipv4Cidr, MULTICAST_ALL_IGMPV3_ROUTERS as IPV4_MULTICAST_ALL_IGMPV3_ROUTERS,
    MULTICAST_ALL_SYSTEMS as IPV4_MULTICAST_ALL_SYSTEMS,
};

#[cfg(feature = "proto-ipv6")]
pub use self::ipv6::{
    Address as Ipv6Address, AddressExt as Ipv6AddressExt, Cidr as Ipv6Cidr,
    MulticastScope as Ipv6MulticastScope, LINK_LOCAL_ALL_MLDV2_ROUTERS as IPV6_LINK_LOCAL_ALL_MLDV2_ROUTERS,
    LINK_LOCAL_ALL_NODES as IPV6_LINK_LOCAL_ALL_NODES,
    LINK_LOCAL_ALL_ROUTERS as IPV6_LINK_LOCAL_ALL_ROUTERS,
};

/// Representation of an hardware address, such as an Ethernet address or an IEEE802.15.4 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardwareAddress {
    /// No link-layer address, e.g. a tunnel or a point-to-point IP link.
    Ip,
    Ethernet(EthernetAddress),
    Ieee802154(Ieee802154Address),
}

impl HardwareAddress {
    pub const fn as_bytes(&self) -> &[u8] {
        match self {
            HardwareAddress::Ip => &[],
            HardwareAddress::Ethernet(addr) => addr.as_bytes(),
            HardwareAddress::Ieee802154(addr) => addr.as_bytes(),
        }
    }

    /// Query wether the address is an unicast address.
    pub fn is_unicast(&self) -> bool {
        match self {
            HardwareAddress::Ip => false,
            HardwareAddress::Ethernet(addr) => addr.is_unicast(),
            HardwareAddress::Ieee802154(addr) => addr.is_unicast(),
        }
    }

    /// The modified EUI-64 interface identifier used for stateless address
    /// autoconfiguration, if the link has addresses to derive one from.
    pub fn interface_id(&self) -> Option<[u8; 8]> {
        match self {
            HardwareAddress::Ip => None,
            HardwareAddress::Ethernet(addr) => Some(addr.interface_id()),
            HardwareAddress::Ieee802154(addr) => Some(addr.interface_id()),
        }
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HardwareAddress::Ip => write!(f, "none"),
            HardwareAddress::Ethernet(addr) => write!(f, "{addr}"),
            HardwareAddress::Ieee802154(addr) => write!(f, "{addr}"),
        }
    }
}

impl From<EthernetAddress> for HardwareAddress {
    fn from(addr: EthernetAddress) -> Self {
        HardwareAddress::Ethernet(addr)
    }
}

impl From<Ieee802154Address> for HardwareAddress {
    fn from(addr: Ieee802154Address) -> Self {
        HardwareAddress::Ieee802154(addr)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_interface_id() {
        assert_eq!(HardwareAddress::Ip.interface_id(), None);
        let hw = HardwareAddress::from(Ieee802154Address([
            0x00, 0x12, 0x4b, 0x00, 0x14, 0xb5, 0xd9, 0xc7,
        ]));
        assert_eq!(
            hw.interface_id(),
            Some([0x02, 0x12, 0x4b, 0x00, 0x14, 0xb5, 0xd9, 0xc7])
        );
        assert!(hw.is_unicast());
    }
}
