//! Scheduler capability consumed by blocking primitives.
//!
//! The synchronization layer never switches contexts itself. It registers a
//! wait, leaves its critical section and asks the scheduler to suspend the
//! calling task; whoever resolves the wait later hands the outcome back
//! through [`Scheduler::resume`].

use crate::{KnlError, KnlResult, Message, Task, TaskId};

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendOutcome {
    /// Woken by a post; carries the handed-off message, if any
    Signaled(Option<Message>),
    /// The deadline elapsed first
    TimedOut,
    /// The object was destroyed
    Destroyed,
}

impl PendOutcome {
    /// Map the outcome onto the error taxonomy
    pub fn into_result(self) -> KnlResult<Option<Message>> {
        match self {
            Self::Signaled(msg) => Ok(msg),
            Self::TimedOut => Err(KnlError::PendTimeout),
            Self::Destroyed => Err(KnlError::PendDestroy),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PendOutcome {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Signaled(Some(msg)) => defmt::write!(fmt, "Signaled({})", msg),
            Self::Signaled(None) => defmt::write!(fmt, "Signaled"),
            Self::TimedOut => defmt::write!(fmt, "TimedOut"),
            Self::Destroyed => defmt::write!(fmt, "Destroyed"),
        }
    }
}

/// Task suspension and wake-up, provided by the kernel port.
///
/// `resume` can be called for a task whose `suspend` has not started yet,
/// when a post lands between wait registration and suspension. The
/// implementation must latch the outcome and let the later `suspend` return
/// it at once.
pub trait Scheduler {
    /// The task running in the caller's context
    fn current(&self) -> Task;

    /// Suspend `task` until it is resumed and return the outcome it was
    /// resumed with. Never called inside a critical section.
    fn suspend(&self, task: TaskId) -> PendOutcome;

    /// Make `task` ready again with `outcome`. Called inside a critical
    /// section, possibly from interrupt context; must not block.
    fn resume(&self, task: TaskId, outcome: PendOutcome);

    /// Switch to the highest-priority ready task if it is not the current one
    fn reschedule(&self) {}
}

impl<S: Scheduler + ?Sized> Scheduler for &S {
    fn current(&self) -> Task {
        (**self).current()
    }

    fn suspend(&self, task: TaskId) -> PendOutcome {
        (**self).suspend(task)
    }

    fn resume(&self, task: TaskId, outcome: PendOutcome) {
        (**self).resume(task, outcome)
    }

    fn reschedule(&self) {
        (**self).reschedule()
    }
}
