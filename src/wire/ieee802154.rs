use core::fmt;

/// An eight-octet IEEE 802.15.4 extended address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address(pub [u8; 8]);

impl Address {
    /// The broadcast address.
    pub const BROADCAST: Address = Address([0xff; 8]);

    /// Return the address as a sequence of octets, in big-endian.
    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the address is an unicast address.
    pub fn is_unicast(&self) -> bool {
        *self != Self::BROADCAST
    }

    /// The modified EUI-64 interface identifier: the extended address with
    /// the universal/local bit inverted.
    pub fn interface_id(&self) -> [u8; 8] {
        let mut id = self.0;
        id[0] ^= 0x02;
        id
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}
