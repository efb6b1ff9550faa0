use crate::time::{Duration, Instant};

/// Solicitations sent before giving up on finding a router.
pub const RS_COUNT: u8 = 3;
pub const RS_TIMEOUT: Duration = Duration::from_secs(1);

/// Router solicitation state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    Start,
    Discovering,
    Maintaining,
    None,
}

/// Router solicitation runtime state of one interface (RFC 4861 section 6.3.7).
#[derive(Debug, Clone, Copy)]
pub struct Solicit {
    phase: Phase,
    /// Time to next router solicitation.
    retry_rs_at: Instant,
    /// Number of solicitations left.
    num_solicitations: u8,
}

impl Solicit {
    /// A state machine that sends nothing until started.
    pub(crate) const fn new() -> Self {
        Self {
            phase: Phase::None,
            retry_rs_at: Instant::ZERO,
            num_solicitations: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn start(&mut self, now: Instant) {
        self.phase = Phase::Start;
        self.retry_rs_at = now;
        self.num_solicitations = RS_COUNT;
    }

    /// A router advertisement arrived: stop soliciting.
    pub(crate) fn stop(&mut self) {
        if self.phase != Phase::None {
            self.phase = Phase::Maintaining;
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    /// Get whether a router solicitation must be emitted.
    pub(crate) fn rs_required(&self, now: Instant) -> bool {
        matches!(self.phase, Phase::Start | Phase::Discovering)
            && self.retry_rs_at <= now
            && self.num_solicitations > 0
    }

    /// Update router solicitation tracking state
    ///
    /// Must be called after sending a router solicitation on the interface.
    pub(crate) fn rs_sent(&mut self, now: Instant) {
        if self.rs_required(now) {
            self.num_solicitations -= 1;
            self.phase = Phase::Discovering;
            self.retry_rs_at = now + RS_TIMEOUT;
        }
    }

    /// Give up once the last solicitation timed out.
    pub(crate) fn update(&mut self, now: Instant) -> bool {
        if self.phase == Phase::Discovering && self.num_solicitations == 0 && self.retry_rs_at <= now
        {
            self.phase = Phase::None;
            return true;
        }
        false
    }

    /// Get the next time the state must be polled for updates.
    pub(crate) fn poll_at(&self) -> Option<Instant> {
        match self.phase {
            Phase::Discovering | Phase::Start => Some(self.retry_rs_at),
            _ => None,
        }
    }
}
