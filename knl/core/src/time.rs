//! Ticks and pend timeouts

use core::fmt;

/// Monotonic system tick count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Tick(pub u64);

impl Tick {
    /// Tick zero, the value at kernel initialization
    pub const ZERO: Self = Self(0);

    /// Get the raw tick count
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Tick `delta` ticks after this one, saturating at the end of time
    pub const fn after(self, delta: u64) -> Self {
        Self(self.0.saturating_add(delta))
    }

    /// Whether this deadline has been reached at `now`
    pub const fn is_reached(self, now: Tick) -> bool {
        now.0 >= self.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ticks", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Tick {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}ticks", self.0);
    }
}

/// How long a pend may block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Do not block; fail with `PendNoWait` if nothing is available
    NoWait,
    /// Block for at most this many ticks
    Ticks(u64),
    /// Block until signaled or destroyed
    Forever,
}

impl Timeout {
    /// Whether the caller refuses to block
    pub const fn is_no_wait(self) -> bool {
        matches!(self, Self::NoWait | Self::Ticks(0))
    }

    /// Deadline of a wait registered at `now`, `None` for an unbounded wait
    pub const fn deadline(self, now: Tick) -> Option<Tick> {
        match self {
            Self::NoWait => Some(now),
            Self::Ticks(ticks) => Some(now.after(ticks)),
            Self::Forever => None,
        }
    }
}

impl From<u64> for Timeout {
    fn from(ticks: u64) -> Self {
        match ticks {
            0 => Self::NoWait,
            u64::MAX => Self::Forever,
            ticks => Self::Ticks(ticks),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Timeout {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::NoWait => defmt::write!(fmt, "NoWait"),
            Self::Ticks(ticks) => defmt::write!(fmt, "Ticks({})", ticks),
            Self::Forever => defmt::write!(fmt, "Forever"),
        }
    }
}
