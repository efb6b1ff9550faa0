use heapless::Vec;

use super::IfaceId;
use crate::config::IFACE_MAX_ROUTER_COUNT;
use crate::time::{Duration, Instant};
use crate::wire::{IpAddress, IpVersion};
use crate::{Error, Result};

/// A router learned from an advertisement or configured by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Router {
    pub iface: IfaceId,
    pub address: IpAddress,
    pub is_default: bool,
    /// When the lifetime was last (re)started.
    pub life_start: Instant,
    /// Seconds; `0` means the router never expires.
    pub lifetime: u16,
}

impl Router {
    fn new(iface: IfaceId, address: IpAddress, is_default: bool, lifetime: u16, now: Instant) -> Self {
        Router {
            iface,
            address,
            is_default,
            life_start: now,
            lifetime,
        }
    }

    /// `None` means "forever".
    pub fn expires_at(&self) -> Option<Instant> {
        match self.lifetime {
            0 => None,
            secs => Some(self.life_start + Duration::from_secs(secs as u64)),
        }
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at(), Some(at) if at <= now)
    }

    fn same_router(&self, iface: IfaceId, address: &IpAddress) -> bool {
        self.iface == iface && self.address == *address
    }
}

/// The router table shared by all interfaces.
#[derive(Debug)]
pub struct Routers {
    storage: Vec<Router, IFACE_MAX_ROUTER_COUNT>,
}

impl Routers {
    pub(crate) fn new() -> Self {
        Self {
            storage: Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Router> {
        self.storage.iter()
    }

    pub fn lookup(&self, iface: IfaceId, address: &IpAddress) -> Option<&Router> {
        self.storage.iter().find(|r| r.same_router(iface, address))
    }

    /// Add a router, or return the existing entry unchanged.
    ///
    /// Returns the entry and whether it was newly created.
    pub(crate) fn add(
        &mut self,
        iface: IfaceId,
        address: IpAddress,
        is_default: bool,
        lifetime: u16,
        now: Instant,
    ) -> Result<(Router, bool)> {
        if let Some(router) = self.lookup(iface, &address) {
            return Ok((*router, false));
        }
        let router = Router::new(iface, address, is_default, lifetime, now);
        self.storage.push(router).map_err(|_| Error::Exhausted)?;
        Ok((router, true))
    }

    /// Restart the lifetime of a router.
    pub(crate) fn update_lifetime(
        &mut self,
        iface: IfaceId,
        address: &IpAddress,
        lifetime: u16,
        now: Instant,
    ) -> Result<()> {
        let router = self
            .storage
            .iter_mut()
            .find(|r| r.same_router(iface, address))
            .ok_or(Error::NotFound)?;
        router.life_start = now;
        router.lifetime = lifetime;
        Ok(())
    }

    pub(crate) fn remove(&mut self, iface: IfaceId, address: &IpAddress) -> Result<Router> {
        let index = self
            .storage
            .iter()
            .position(|r| r.same_router(iface, address))
            .ok_or(Error::NotFound)?;
        Ok(self.storage.remove(index))
    }

    /// The first default router of `version`, on `iface` if given.
    pub fn find_default(&self, iface: Option<IfaceId>, version: IpVersion) -> Option<&Router> {
        self.storage.iter().find(|r| {
            r.is_default
                && r.address.version() == version
                && iface.map_or(true, |iface| r.iface == iface)
        })
    }

    /// Drop every expired router, handing each to `f`.
    pub(crate) fn remove_expired<F: FnMut(&Router)>(&mut self, now: Instant, mut f: F) -> bool {
        let before = self.storage.len();
        self.storage.retain(|r| {
            if r.is_expired(now) {
                f(r);
                false
            } else {
                true
            }
        });
        before != self.storage.len()
    }

    pub(crate) fn poll_at(&self) -> Option<Instant> {
        self.storage.iter().filter_map(|r| r.expires_at()).min()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[cfg(feature = "proto-ipv6")]
    mod mock {
        use super::super::*;
        use crate::wire::Ipv6Address;
        pub const VERSION: IpVersion = IpVersion::Ipv6;
        pub const ADDR_1: IpAddress =
            IpAddress::Ipv6(Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 1));
        pub const ADDR_2: IpAddress =
            IpAddress::Ipv6(Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 2));
    }

    #[cfg(all(feature = "proto-ipv4", not(feature = "proto-ipv6")))]
    mod mock {
        use super::super::*;
        use crate::wire::Ipv4Address;
        pub const VERSION: IpVersion = IpVersion::Ipv4;
        pub const ADDR_1: IpAddress = IpAddress::Ipv4(Ipv4Address::new(192, 0, 2, 1));
        pub const ADDR_2: IpAddress = IpAddress::Ipv4(Ipv4Address::new(192, 0, 2, 2));
    }

    use self::mock::*;

    const IFACE_1: IfaceId = IfaceId::new(1);
    const IFACE_2: IfaceId = IfaceId::new(2);

    #[test]
    fn test_add_is_idempotent() {
        let mut routers = Routers::new();
        let now = Instant::ZERO;
        let (router, created) = routers.add(IFACE_1, ADDR_1, true, 30, now).unwrap();
        assert!(created);
        assert_eq!(router.expires_at(), Some(Instant::from_secs(30)));

        let (again, created) = routers
            .add(IFACE_1, ADDR_1, false, 0, Instant::from_secs(5))
            .unwrap();
        assert!(!created);
        assert_eq!(again, router);
        assert_eq!(routers.iter().count(), 1);
    }

    #[test]
    fn test_find_default() {
        let mut routers = Routers::new();
        let now = Instant::ZERO;
        routers.add(IFACE_1, ADDR_1, false, 0, now).unwrap();
        assert_eq!(routers.find_default(None, VERSION), None);

        routers.add(IFACE_2, ADDR_2, true, 0, now).unwrap();
        assert_eq!(
            routers.find_default(None, VERSION).map(|r| r.address),
            Some(ADDR_2)
        );
        assert_eq!(routers.find_default(Some(IFACE_1), VERSION), None);
        assert_eq!(
            routers.find_default(Some(IFACE_2), VERSION).map(|r| r.iface),
            Some(IFACE_2)
        );
    }

    #[test]
    fn test_expiry() {
        let mut routers = Routers::new();
        routers.add(IFACE_1, ADDR_1, true, 10, Instant::ZERO).unwrap();
        routers.add(IFACE_1, ADDR_2, false, 0, Instant::ZERO).unwrap();
        assert_eq!(routers.poll_at(), Some(Instant::from_secs(10)));

        routers
            .update_lifetime(IFACE_1, &ADDR_1, 20, Instant::from_secs(5))
            .unwrap();
        assert_eq!(routers.poll_at(), Some(Instant::from_secs(25)));

        let mut expired = 0;
        assert!(!routers.remove_expired(Instant::from_secs(24), |_| expired += 1));
        assert!(routers.remove_expired(Instant::from_secs(25), |r| {
            assert_eq!(r.address, ADDR_1);
            expired += 1
        }));
        assert_eq!(expired, 1);
        assert_eq!(routers.poll_at(), None);
    }

    #[test]
    fn test_remove() {
        let mut routers = Routers::new();
        routers.add(IFACE_1, ADDR_1, true, 0, Instant::ZERO).unwrap();
        assert_eq!(routers.remove(IFACE_2, &ADDR_1), Err(Error::NotFound));
        assert!(routers.remove(IFACE_1, &ADDR_1).is_ok());
        assert_eq!(routers.lookup(IFACE_1, &ADDR_1), None);
    }
}
