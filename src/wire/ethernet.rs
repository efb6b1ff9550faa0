use core::fmt;
use core::str::FromStr;

/// A six-octet Ethernet II address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address(pub [u8; 6]);

impl Address {
    /// The broadcast address.
    pub const BROADCAST: Address = Address([0xff; 6]);

    /// Return an Ethernet address as a sequence of octets, in big-endian.
    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the address is an unicast address.
    pub fn is_unicast(&self) -> bool {
        !(self.is_broadcast() || self.is_multicast())
    }

    /// Query whether this address is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Query whether the "multicast" bit in the OUI is set.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Query whether the "locally administered" bit in the OUI is set.
    pub fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }

    /// The modified EUI-64 interface identifier of this address
    /// ([RFC 4291 appendix A]): `ff:fe` goes in the middle and the
    /// universal/local bit is inverted.
    ///
    /// [RFC 4291 appendix A]: https://www.rfc-editor.org/rfc/rfc4291#appendix-A
    pub fn interface_id(&self) -> [u8; 8] {
        let b = self.0;
        [b[0] ^ 0x02, b[1], b[2], 0xff, 0xfe, b[3], b[4], b[5]]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(
            f,
            "{:02x}-{:02x}-{:02x}-{:02x}-{:02x}-{:02x}",
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]
        )
    }
}

/// Error returned when a string is not an Ethernet address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError;

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid Ethernet address")
    }
}

impl FromStr for Address {
    type Err = ParseError;

    /// Parse six hexadecimal octets joined with `-` or `:`.
    fn from_str(s: &str) -> Result<Address, ParseError> {
        let separator = if s.contains(':') { ':' } else { '-' };
        let mut octets = [0u8; 6];
        let mut parts = s.split(separator);
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or(ParseError)?;
            if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ParseError);
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| ParseError)?;
        }
        if parts.next().is_some() {
            return Err(ParseError);
        }
        Ok(Address(octets))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_interface_id() {
        let addr = Address([0x00, 0x00, 0x5e, 0x00, 0x53, 0x01]);
        assert_eq!(
            addr.interface_id(),
            [0x02, 0x00, 0x5e, 0xff, 0xfe, 0x00, 0x53, 0x01]
        );
    }

    #[test]
    fn test_kinds() {
        assert!(Address::BROADCAST.is_broadcast());
        assert!(!Address::BROADCAST.is_unicast());
        assert!(Address([0x01, 0, 0x5e, 0, 0, 1]).is_multicast());
        assert!(Address([0x02, 0, 0, 0, 0, 1]).is_local());
    }

    #[test]
    fn test_from_str() {
        let addr = Address([0x02, 0x00, 0x5e, 0x00, 0x53, 0x0a]);
        assert_eq!("02-00-5e-00-53-0a".parse(), Ok(addr));
        assert_eq!("02:00:5E:00:53:0A".parse(), Ok(addr));
        assert_eq!("02-00-5e-00-53".parse::<Address>(), Err(ParseError));
        assert_eq!("02-00-5e-00-53-0a-01".parse::<Address>(), Err(ParseError));
        assert_eq!("02-00-5e-00-53-+a".parse::<Address>(), Err(ParseError));
        assert_eq!("02:00-5e:00:53:0a".parse::<Address>(), Err(ParseError));
    }
}
