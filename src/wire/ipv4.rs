use byteorder::{ByteOrder, NetworkEndian};
use core::fmt;

/// Size of IPv4 adderess in octets.
pub const ADDR_SIZE: usize = 4;

/// The [all systems multicast group], joined by every IGMP host.
///
/// [all systems multicast group]: https://www.rfc-editor.org/rfc/rfc1112#section-4
pub const MULTICAST_ALL_SYSTEMS: Address = Address::new(224, 0, 0, 1);

/// Destination of IGMPv3 membership reports.
pub const MULTICAST_ALL_IGMPV3_ROUTERS: Address = Address::new(224, 0, 0, 22);

pub use core::net::Ipv4Addr as Address;

/// Address helpers missing from [`core::net::Ipv4Addr`].
pub trait AddressExt {
    /// Construct an IPv4 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not four octets long.
    fn from_bytes(data: &[u8]) -> Self;

    /// Query whether the address is an unicast address.
    ///
    /// `x_` prefix is to avoid a collision with the still-unstable method in `core::ip`.
    fn x_is_unicast(&self) -> bool;

    /// The address as a host-order integer.
    fn to_u32(&self) -> u32;

    /// If `self` is a CIDR-compatible subnet mask, return `Some(prefix_len)`,
    /// where `prefix_len` is the number of leading ones. Return `None` otherwise.
    fn prefix_len(&self) -> Option<u8>;

    /// Number of leading bits `self` and `other` have in common.
    fn common_prefix_len(&self, other: &Self) -> u8;

    /// The address with every host bit of `netmask` cleared.
    fn masked(&self, netmask: &Self) -> Self;

    /// The directed broadcast address of the subnet described by `netmask`.
    fn subnet_broadcast(&self, netmask: &Self) -> Self;
}

impl AddressExt for Address {
    fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; ADDR_SIZE];
        bytes.copy_from_slice(data);
        Address::from(bytes)
    }

    fn x_is_unicast(&self) -> bool {
        !(self.is_broadcast() || self.is_multicast() || self.is_unspecified())
    }

    fn to_u32(&self) -> u32 {
        NetworkEndian::read_u32(&self.octets())
    }

    fn prefix_len(&self) -> Option<u8> {
        let bits = self.to_u32();
        let ones = bits.leading_ones();
        if bits.checked_shl(ones).unwrap_or(0) != 0 {
            return None;
        }
        Some(ones as u8)
    }

    fn common_prefix_len(&self, other: &Address) -> u8 {
        (self.to_u32() ^ other.to_u32()).leading_zeros() as u8
    }

    fn masked(&self, netmask: &Address) -> Address {
        from_u32(self.to_u32() & netmask.to_u32())
    }

    fn subnet_broadcast(&self, netmask: &Address) -> Address {
        from_u32(self.to_u32() | !netmask.to_u32())
    }
}

fn from_u32(bits: u32) -> Address {
    let mut bytes = [0; ADDR_SIZE];
    NetworkEndian::write_u32(&mut bytes, bits);
    Address::from(bytes)
}

/// The subnet mask with `prefix_len` leading ones. Lengths above 32 give
/// the all-ones mask.
pub fn netmask(prefix_len: u8) -> Address {
    let bits = match prefix_len {
        0 => 0,
        len if len >= 32 => u32::MAX,
        len => u32::MAX << (32 - len),
    };
    from_u32(bits)
}

/// A specification of an IPv4 CIDR block, containing an address and a variable-length
/// subnet masking prefix length.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct Cidr {
    address: Address,
    prefix_len: u8,
}

impl Cidr {
    /// The IPv4 link-local prefix, `169.254.0.0/16`.
    pub const LINK_LOCAL: Cidr = Cidr {
        address: Address::new(169, 254, 0, 0),
        prefix_len: 16,
    };

    /// Create an IPv4 CIDR block from the given address and prefix length.
    ///
    /// # Panics
    /// This function panics if the prefix length is larger than 32.
    pub const fn new(address: Address, prefix_len: u8) -> Cidr {
        assert!(prefix_len <= 32);
        Cidr {
            address,
            prefix_len,
        }
    }

    /// Create an IPv4 CIDR block from the given address and network mask.
    pub fn from_netmask(addr: Address, netmask: Address) -> Option<Cidr> {
        netmask.prefix_len().map(|prefix_len| Cidr::new(addr, prefix_len))
    }

    /// Return the address of this IPv4 CIDR block.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Return the prefix length of this IPv4 CIDR block.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Return the network mask of this IPv4 CIDR.
    pub fn netmask(&self) -> Address {
        netmask(self.prefix_len)
    }

    /// Return the broadcast address of this IPv4 CIDR, if the prefix
    /// leaves room for one.
    pub fn broadcast(&self) -> Option<Address> {
        if self.prefix_len >= 31 {
            return None;
        }
        Some(self.address.subnet_broadcast(&self.netmask()))
    }

    /// Query whether the subnetwork described by this IPv4 CIDR block contains
    /// the given address.
    pub fn contains_addr(&self, addr: &Address) -> bool {
        let mask = self.netmask();
        self.address.masked(&mask) == addr.masked(&mask)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Cidr {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}/{=u8}", self.address, self.prefix_len);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case::zero(0, Address::new(0, 0, 0, 0))]
    #[case::class_c(24, Address::new(255, 255, 255, 0))]
    #[case::odd(13, Address::new(255, 248, 0, 0))]
    #[case::host(32, Address::new(255, 255, 255, 255))]
    #[case::clamped(40, Address::new(255, 255, 255, 255))]
    fn test_netmask(#[case] len: u8, #[case] mask: Address) {
        assert_eq!(netmask(len), mask);
        assert_eq!(mask.prefix_len(), Some(len.min(32)));
    }

    #[test]
    fn test_prefix_len_rejects_holes() {
        assert_eq!(Address::new(255, 0, 255, 0).prefix_len(), None);
        assert_eq!(Address::new(0, 0, 0, 1).prefix_len(), None);
    }

    #[test]
    fn test_cidr() {
        let cidr = Cidr::new(Address::new(192, 168, 1, 10), 24);
        assert!(cidr.contains_addr(&Address::new(192, 168, 1, 200)));
        assert!(!cidr.contains_addr(&Address::new(192, 168, 2, 1)));
        assert_eq!(cidr.broadcast(), Some(Address::new(192, 168, 1, 255)));
        assert_eq!(Cidr::new(Address::new(10, 0, 0, 1), 31).broadcast(), None);
        assert!(Cidr::LINK_LOCAL.contains_addr(&Address::new(169, 254, 3, 7)));
    }

    #[test]
    fn test_from_netmask() {
        assert_eq!(
            Cidr::from_netmask(Address::new(10, 1, 2, 3), Address::new(255, 255, 0, 0)),
            Some(Cidr::new(Address::new(10, 1, 2, 3), 16))
        );
        assert_eq!(
            Cidr::from_netmask(Address::new(10, 1, 2, 3), Address::new(255, 0, 255, 0)),
            None
        );
    }

    #[test]
    fn test_common_prefix_len() {
        let a = Address::new(192, 168, 1, 1);
        assert_eq!(a.common_prefix_len(&a), 32);
        assert_eq!(a.common_prefix_len(&Address::new(192, 168, 1, 0)), 31);
        assert_eq!(a.common_prefix_len(&Address::new(64, 168, 1, 1)), 0);
    }
}
