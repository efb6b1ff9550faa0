use core::fmt;

use heapless::Deque;

use super::IfaceId;
use crate::config::IFACE_MAX_EVENT_COUNT;
#[cfg(feature = "proto-ipv4")]
use crate::wire::Ipv4Address;
#[cfg(feature = "proto-ipv6")]
use crate::wire::{Ipv6Address, Ipv6Cidr};
use crate::wire::IpAddress;

/// What happened on an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventKind {
    /// The interface became operationally up.
    IfUp,
    /// The interface left the operational up state.
    IfDown,
    IfAdminUp,
    IfAdminDown,

    #[cfg(feature = "proto-ipv6")]
    Ipv6AddrAdd(Ipv6Address),
    #[cfg(feature = "proto-ipv6")]
    Ipv6AddrDel(Ipv6Address),
    #[cfg(feature = "proto-ipv6")]
    Ipv6AddrDeprecated(Ipv6Address),
    #[cfg(feature = "proto-ipv6")]
    Ipv6MaddrAdd(Ipv6Address),
    #[cfg(feature = "proto-ipv6")]
    Ipv6MaddrDel(Ipv6Address),
    #[cfg(feature = "proto-ipv6")]
    Ipv6PrefixAdd(Ipv6Cidr),
    #[cfg(feature = "proto-ipv6")]
    Ipv6PrefixDel(Ipv6Cidr),
    #[cfg(feature = "proto-ipv6")]
    Ipv6RouterAdd(Ipv6Address),
    #[cfg(feature = "proto-ipv6")]
    Ipv6RouterDel(Ipv6Address),
    #[cfg(feature = "proto-ipv6")]
    Ipv6DadSucceeded(Ipv6Address),
    #[cfg(feature = "proto-ipv6")]
    Ipv6DadFailed(Ipv6Address),

    #[cfg(feature = "proto-ipv4")]
    Ipv4AddrAdd(Ipv4Address),
    #[cfg(feature = "proto-ipv4")]
    Ipv4AddrDel(Ipv4Address),
    #[cfg(feature = "proto-ipv4")]
    Ipv4AddrDeprecated(Ipv4Address),
    #[cfg(feature = "proto-ipv4")]
    Ipv4MaddrAdd(Ipv4Address),
    #[cfg(feature = "proto-ipv4")]
    Ipv4MaddrDel(Ipv4Address),
    #[cfg(feature = "proto-ipv4")]
    Ipv4RouterAdd(Ipv4Address),
    #[cfg(feature = "proto-ipv4")]
    Ipv4RouterDel(Ipv4Address),
    #[cfg(feature = "proto-ipv4")]
    Ipv4AcdSucceeded(Ipv4Address),
    #[cfg(feature = "proto-ipv4")]
    Ipv4AcdFailed(Ipv4Address),
    /// A conflict on an address in use could not be defended.
    #[cfg(feature = "proto-ipv4")]
    Ipv4AcdConflict(Ipv4Address),

    /// A multicast group was joined.
    McastJoin(IpAddress),
    /// A multicast group was left.
    McastLeave(IpAddress),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Event {
    pub iface: IfaceId,
    pub kind: EventKind,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {:?}", self.iface, self.kind)
    }
}

/// Bounded queue of events waiting for the application.
#[derive(Debug)]
pub(crate) struct Events {
    queue: Deque<Event, IFACE_MAX_EVENT_COUNT>,
}

impl Events {
    pub(crate) fn new() -> Self {
        Events {
            queue: Deque::new(),
        }
    }

    /// Queue an event. When the queue is full the oldest event is dropped.
    pub(crate) fn push(&mut self, iface: IfaceId, kind: EventKind) {
        let event = Event { iface, kind };
        if self.queue.is_full() {
            if let Some(lost) = self.queue.pop_front() {
                net_debug!("event queue full, dropping {}", lost);
            }
        }
        let _ = self.queue.push_back(event);
    }

    pub(crate) fn pop(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}
