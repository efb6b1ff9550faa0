use crate::time::{Duration, Instant};
use crate::wire::{Ipv6Address, Ipv6AddressExt, Ipv6Cidr};

/// Lifetime value that never expires, as carried by router advertisements.
pub const INFINITE_LIFETIME: u32 = 0xffff_ffff;

/// Remaining valid lifetime below which an unauthenticated advertisement may
/// not shorten an autoconfigured address (RFC 4862 section 5.5.3 e).
const TWO_HOURS: Duration = Duration::from_secs(2 * 60 * 60);

/// Convert an advertised lifetime in seconds, `None` being infinite.
pub(crate) fn lifetime_from_secs(secs: u32) -> Option<Duration> {
    match secs {
        INFINITE_LIFETIME => None,
        secs => Some(Duration::from_secs(secs as u64)),
    }
}

/// An on-link IPv6 prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Prefix {
    pub(crate) cidr: Ipv6Cidr,
    /// `None` means "forever".
    pub(crate) expires_at: Option<Instant>,
}

impl Prefix {
    pub(crate) fn new(cidr: Ipv6Cidr) -> Self {
        Prefix {
            cidr,
            expires_at: None,
        }
    }

    pub fn cidr(&self) -> Ipv6Cidr {
        self.cidr
    }

    pub fn is_infinite(&self) -> bool {
        self.expires_at.is_none()
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Restart the countdown; [INFINITE_LIFETIME] disables it.
    pub(crate) fn set_timer(&mut self, now: Instant, lifetime: u32) {
        self.expires_at = lifetime_from_secs(lifetime).map(|d| now + d);
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    /// Whether the first `len` bits of `addr` match this prefix.
    pub(crate) fn matches(&self, addr: &Ipv6Address, len: u8) -> bool {
        addr.mask(len) == self.cidr.address().mask(len)
    }
}

/// The prefix information option of a router advertisement (RFC 4861
/// section 4.6.2), already decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PrefixInformation {
    pub prefix: Ipv6Address,
    pub prefix_len: u8,
    /// The prefix may be used for on-link determination.
    pub on_link: bool,
    /// The prefix may be used for stateless address autoconfiguration.
    pub autonomous: bool,
    /// Seconds, [INFINITE_LIFETIME] for infinity.
    pub valid_lifetime: u32,
    /// Seconds, [INFINITE_LIFETIME] for infinity.
    pub preferred_lifetime: u32,
}

impl PrefixInformation {
    /// Whether the option may be acted upon at all (RFC 4862 section 5.5.3
    /// a to c).
    pub(crate) fn is_valid(&self) -> bool {
        !self.prefix.is_link_local()
            && !self.prefix.is_multicast()
            && self.prefix_len <= 128
            && self.preferred_lifetime <= self.valid_lifetime
    }

    pub(crate) fn cidr(&self) -> Option<Ipv6Cidr> {
        Ipv6Cidr::new_masked(self.prefix, self.prefix_len)
    }

    /// The valid lifetime an existing autoconfigured address gets when this
    /// option refreshes it, `None` being infinite.
    ///
    /// `remaining` is the valid lifetime the address has left.
    pub(crate) fn refreshed_valid(&self, remaining: Option<Duration>) -> Option<Duration> {
        let advertised = lifetime_from_secs(self.valid_lifetime);
        match (advertised, remaining) {
            (None, _) => None,
            (Some(adv), _) if adv > TWO_HOURS => Some(adv),
            (Some(adv), Some(rem)) if adv > rem => Some(adv),
            (Some(_), Some(rem)) if rem <= TWO_HOURS => Some(rem),
            _ => Some(TWO_HOURS),
        }
    }
}
