use crate::time::{Duration, Instant};

/// Time to wait for a conflicting advertisement after each neighbor
/// solicitation.
pub const DAD_TIMEOUT: Duration = Duration::from_millis(100);

/// What the duplicate address detection of one address needs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DadStep {
    /// Nothing before the deadline.
    Wait(Instant),
    /// Send a neighbor solicitation for the address now.
    Probe,
    /// Every probe went unanswered: the address is unique.
    Done,
}

/// Duplicate address detection state of a tentative IPv6 address (RFC 4862
/// section 5.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dad {
    /// Neighbor solicitations sent so far.
    sent: u8,
    started_at: Instant,
    retry_at: Instant,
}

impl Dad {
    pub(crate) fn new(now: Instant) -> Self {
        Dad {
            sent: 0,
            started_at: now,
            retry_at: now,
        }
    }

    pub(crate) fn count(&self) -> u8 {
        self.sent
    }

    pub(crate) fn started_at(&self) -> Instant {
        self.started_at
    }

    pub(crate) fn next(&self, now: Instant, transmits: u8) -> DadStep {
        if now < self.retry_at {
            DadStep::Wait(self.retry_at)
        } else if self.sent < transmits {
            DadStep::Probe
        } else {
            DadStep::Done
        }
    }

    /// Must be called after the solicitation was handed to the link.
    pub(crate) fn probe_sent(&mut self, now: Instant) {
        self.sent = self.sent.saturating_add(1);
        self.retry_at = now + DAD_TIMEOUT;
    }

    pub(crate) fn poll_at(&self) -> Instant {
        self.retry_at
    }
}
