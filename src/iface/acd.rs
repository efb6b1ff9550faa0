//! IPv4 Address Conflict Detection, [RFC 5227].
//!
//! [RFC 5227]: https://www.rfc-editor.org/rfc/rfc5227

use core::fmt;

use crate::rand::Rand;
use crate::time::{Duration, Instant};

pub const PROBE_WAIT: Duration = Duration::from_secs(1);
pub const PROBE_NUM: u8 = 3;
pub const PROBE_MIN: Duration = Duration::from_secs(1);
pub const PROBE_MAX: Duration = Duration::from_secs(2);
pub const ANNOUNCE_WAIT: Duration = Duration::from_secs(2);
pub const ANNOUNCE_NUM: u8 = 2;
pub const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(2);
pub const MAX_CONFLICTS: u8 = 10;
pub const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFEND_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcdState {
    /// Probing for other users of the address. The address is tentative.
    Probing,
    /// The address is in use and being announced.
    Announcing,
    /// All announcements sent; only conflicts are watched for.
    Announced,
}

impl fmt::Display for AcdState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AcdState::Probing => write!(f, "probing"),
            AcdState::Announcing => write!(f, "announcing"),
            AcdState::Announced => write!(f, "announced"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AcdStep {
    Wait(Instant),
    /// Send an ARP probe.
    Probe,
    /// The last probe went unanswered: the address may be used.
    Bound,
    /// Send an ARP announcement.
    Announce,
}

/// Outcome of a conflicting ARP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Conflict {
    /// Another host probes or owns the address while we are still probing.
    Failed,
    /// First conflict in a while: announce once to keep the address.
    Defend,
    /// Repeated conflict: stop using the address.
    GiveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Acd {
    state: AcdState,
    /// Probes or announcements sent in the current state.
    count: u8,
    retry_at: Instant,
    last_conflict: Option<Instant>,
    defend_pending: bool,
}

impl Acd {
    /// Start probing. `conflicts` is the number of conflicts the interface
    /// has seen so far; past [MAX_CONFLICTS] probing is rate limited.
    pub(crate) fn start(now: Instant, rand: &mut Rand, conflicts: u8) -> Self {
        let delay = if conflicts >= MAX_CONFLICTS {
            RATE_LIMIT_INTERVAL
        } else {
            rand.rand_duration(Duration::ZERO, PROBE_WAIT)
        };
        Acd {
            state: AcdState::Probing,
            count: 0,
            retry_at: now + delay,
            last_conflict: None,
            defend_pending: false,
        }
    }

    pub(crate) fn state(&self) -> AcdState {
        self.state
    }

    pub(crate) fn count(&self) -> u8 {
        self.count
    }

    pub(crate) fn next(&self, now: Instant) -> AcdStep {
        if self.defend_pending {
            return AcdStep::Announce;
        }
        match self.state {
            AcdState::Announced => AcdStep::Wait(Instant::from_micros(i64::MAX)),
            _ if now < self.retry_at => AcdStep::Wait(self.retry_at),
            AcdState::Probing if self.count < PROBE_NUM => AcdStep::Probe,
            AcdState::Probing => AcdStep::Bound,
            AcdState::Announcing => AcdStep::Announce,
        }
    }

    pub(crate) fn probe_sent(&mut self, now: Instant, rand: &mut Rand) {
        self.count += 1;
        self.retry_at = if self.count < PROBE_NUM {
            now + rand.rand_duration(PROBE_MIN, PROBE_MAX)
        } else {
            now + ANNOUNCE_WAIT
        };
    }

    /// Switch to announcing once probing found no other user.
    pub(crate) fn bind(&mut self, now: Instant) {
        self.state = AcdState::Announcing;
        self.count = 0;
        self.retry_at = now;
    }

    pub(crate) fn announce_sent(&mut self, now: Instant) {
        if self.defend_pending {
            self.defend_pending = false;
            return;
        }
        self.count += 1;
        if self.count < ANNOUNCE_NUM {
            self.retry_at = now + ANNOUNCE_INTERVAL;
        } else {
            self.state = AcdState::Announced;
        }
    }

    pub(crate) fn conflict(&mut self, now: Instant) -> Conflict {
        if self.state == AcdState::Probing {
            return Conflict::Failed;
        }
        match self.last_conflict {
            Some(at) if now - at < DEFEND_INTERVAL => Conflict::GiveUp,
            _ => {
                self.last_conflict = Some(now);
                self.defend_pending = true;
                Conflict::Defend
            }
        }
    }

    pub(crate) fn poll_at(&self) -> Option<Instant> {
        if self.defend_pending {
            return Some(Instant::ZERO);
        }
        match self.state {
            AcdState::Announced => None,
            _ => Some(self.retry_at),
        }
    }
}
