//! Task identity and priority as seen by the synchronization layer

use core::fmt;

/// Identifier of a task known to the external scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u16);

impl TaskId {
    /// Get the raw identifier
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TaskId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Task({})", self.0);
    }
}

/// Task priority; a larger value is more urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    /// Lowest priority a task can run at
    pub const MIN: Priority = Priority(1);

    /// Highest priority a task can run at
    pub const MAX: Priority = Priority(255);

    /// Reserved for the idle task
    pub const IDLE: Priority = Priority(0);

    /// Create a new priority level; the idle level is rejected
    pub const fn new(priority: u8) -> Option<Self> {
        if priority == 0 {
            None
        } else {
            Some(Priority(priority))
        }
    }

    /// Create priority without validation (const fn)
    pub const fn new_unchecked(priority: u8) -> Self {
        Priority(priority)
    }

    /// Get the raw priority value
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Whether this is the idle level
    pub const fn is_idle(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Priority({})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Priority {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Priority({})", self.0);
    }
}

/// A task as handed to the synchronization layer by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub priority: Priority,
}

impl Task {
    pub const fn new(id: TaskId, priority: Priority) -> Self {
        Self { id, priority }
    }
}

/// Macro to create compile-time priority constants
#[macro_export]
macro_rules! priority {
    ($value:literal) => {
        $crate::Priority::new_unchecked($value)
    };
}
