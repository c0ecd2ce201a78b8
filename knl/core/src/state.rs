//! Kernel state: run flag, interrupt nesting, scheduler-lock nesting and
//! the tick count.
//!
//! The nesting depths decide when blocking is legal and when a reschedule
//! may be attempted: only with no interrupt active and no scheduler lock
//! held.

use core::cell::RefCell;
use critical_section::Mutex;

use crate::{KernelConfig, KnlError, KnlResult, Scheduler, Tick};

#[derive(Debug, Clone, Copy, Default)]
struct StateInner {
    running: bool,
    irq_nesting: u8,
    sched_lock_nesting: u8,
    tick: Tick,
}

/// Point-in-time copy of the kernel state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnlSnapshot {
    pub running: bool,
    pub irq_nesting: u8,
    pub sched_lock_nesting: u8,
    pub tick: u64,
}

/// Kernel-wide state record.
///
/// One instance per kernel; it is owned by the application and passed by
/// reference to every operation that needs it.
pub struct KernelState {
    config: KernelConfig,
    inner: Mutex<RefCell<StateInner>>,
}

impl KernelState {
    /// Create a stopped kernel with the given configuration
    pub const fn new(config: KernelConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(RefCell::new(StateInner {
                running: false,
                irq_nesting: 0,
                sched_lock_nesting: 0,
                tick: Tick::ZERO,
            })),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Reset to the stopped state with both depths at zero
    pub fn init(&self) {
        critical_section::with(|cs| {
            *self.inner.borrow_ref_mut(cs) = StateInner::default();
        });
        log::debug!("kernel '{}' initialized", self.config.name);
    }

    /// Start multitasking
    pub fn start(&self) -> KnlResult<()> {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if inner.running {
                return Err(KnlError::KnlRunning);
            }
            inner.running = true;
            Ok(())
        })?;
        log::debug!("kernel '{}' started", self.config.name);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).running)
    }

    /// Record entry into an interrupt handler.
    ///
    /// Ignored before the kernel starts. At the nesting limit the call is
    /// rejected and the depth stays unchanged.
    pub fn irq_enter(&self) -> KnlResult<()> {
        let limit = self.config.irq_nesting_limit;
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if !inner.running {
                return Ok(());
            }
            if inner.irq_nesting >= limit {
                log::warn!("irq nesting overflow at depth {}", inner.irq_nesting);
                return Err(KnlError::IrqNestingOverflow);
            }
            inner.irq_nesting += 1;
            Ok(())
        })
    }

    /// Record exit from an interrupt handler; reschedules when the
    /// outermost handler returns and the scheduler is unlocked.
    pub fn irq_leave<S: Scheduler + ?Sized>(&self, sched: &S) -> KnlResult<()> {
        let reschedule = critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if !inner.running {
                return Ok(false);
            }
            if inner.irq_nesting == 0 {
                log::warn!("irq leave without matching enter");
                return Err(KnlError::IrqNotEntered);
            }
            inner.irq_nesting -= 1;
            Ok(inner.irq_nesting == 0 && inner.sched_lock_nesting == 0)
        })?;

        if reschedule {
            sched.reschedule();
        }
        Ok(())
    }

    pub fn is_in_irq(&self) -> bool {
        self.irq_nesting() > 0
    }

    pub fn irq_nesting(&self) -> u8 {
        critical_section::with(|cs| self.inner.borrow_ref(cs).irq_nesting)
    }

    /// Prevent task switches until the matching [`sched_unlock`](Self::sched_unlock)
    pub fn sched_lock(&self) -> KnlResult<()> {
        let limit = self.config.sched_lock_nesting_limit;
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if !inner.running {
                return Err(KnlError::KnlNotRunning);
            }
            if inner.sched_lock_nesting >= limit {
                log::warn!("sched lock nesting overflow at depth {}", inner.sched_lock_nesting);
                return Err(KnlError::LockNestingOverflow);
            }
            inner.sched_lock_nesting += 1;
            Ok(())
        })
    }

    /// Undo one [`sched_lock`](Self::sched_lock); reschedules when the last
    /// lock is released outside interrupt context.
    pub fn sched_unlock<S: Scheduler + ?Sized>(&self, sched: &S) -> KnlResult<()> {
        let reschedule = critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if !inner.running {
                return Err(KnlError::KnlNotRunning);
            }
            if inner.sched_lock_nesting == 0 {
                return Err(KnlError::SchedNotLocked);
            }
            inner.sched_lock_nesting -= 1;
            Ok(inner.sched_lock_nesting == 0 && inner.irq_nesting == 0)
        })?;

        if reschedule {
            sched.reschedule();
        }
        Ok(())
    }

    pub fn is_sched_locked(&self) -> bool {
        self.sched_lock_nesting() > 0
    }

    pub fn sched_lock_nesting(&self) -> u8 {
        critical_section::with(|cs| self.inner.borrow_ref(cs).sched_lock_nesting)
    }

    /// Whether a task switch may happen right now
    pub fn can_reschedule(&self) -> bool {
        critical_section::with(|cs| {
            let inner = self.inner.borrow_ref(cs);
            inner.running && inner.irq_nesting == 0 && inner.sched_lock_nesting == 0
        })
    }

    /// Request a reschedule if one is allowed; returns whether it was requested.
    ///
    /// Inside an interrupt the switch is deferred to the outermost
    /// [`irq_leave`](Self::irq_leave).
    pub fn sched<S: Scheduler + ?Sized>(&self, sched: &S) -> bool {
        if self.can_reschedule() {
            sched.reschedule();
            true
        } else {
            false
        }
    }

    /// Advance the tick count by one and return the new value
    pub fn tick(&self) -> Tick {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            inner.tick = inner.tick.after(1);
            inner.tick
        })
    }

    pub fn now(&self) -> Tick {
        critical_section::with(|cs| self.inner.borrow_ref(cs).tick)
    }

    pub fn snapshot(&self) -> KnlSnapshot {
        critical_section::with(|cs| {
            let inner = self.inner.borrow_ref(cs);
            KnlSnapshot {
                running: inner.running,
                irq_nesting: inner.irq_nesting,
                sched_lock_nesting: inner.sched_lock_nesting,
                tick: inner.tick.ticks(),
            }
        })
    }
}

impl Default for KernelState {
    fn default() -> Self {
        Self::new(KernelConfig::DEFAULT)
    }
}
