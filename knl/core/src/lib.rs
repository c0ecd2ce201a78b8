#![no_std]
#![forbid(unsafe_code)]

//! # knl core
//!
//! Kernel-wide types shared by every synchronization primitive: the error
//! taxonomy, the kernel configuration, the kernel state (interrupt and
//! scheduler-lock nesting), checked object tags, task identities, ticks and
//! the scheduler capability that blocking primitives suspend through.
//!
//! The crate holds no global state. A [`KernelState`] is an ordinary value
//! that callers own and pass by reference, so several kernels can coexist
//! in one test binary.

use thiserror::Error;

pub mod config;
pub mod message;
pub mod object;
pub mod sched;
pub mod state;
pub mod task;
pub mod time;

pub use config::*;
pub use message::*;
pub use object::*;
pub use sched::*;
pub use state::*;
pub use task::*;
pub use time::*;

/// knl core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used throughout the kernel core
pub type KnlResult<T> = Result<T, KnlError>;

/// Error codes returned by kernel operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KnlError {
    /// A payload or object address was null
    #[error("null object or payload address")]
    ObjPtrNull,
    /// The object is uninitialized, destroyed or of another type
    #[error("invalid kernel object")]
    ObjInvalid,
    /// No message slot is left to buffer the message
    #[error("message queue is full")]
    QueueFull,
    /// The message queue holds no entries
    #[error("message queue is empty")]
    QueueEmpty,
    /// No queued message carries the requested address
    #[error("message does not exist in queue")]
    MsgNotExist,
    /// The message pool freelist is empty
    #[error("message pool exhausted")]
    PoolExhausted,
    /// The pool still has slots handed out
    #[error("message pool has outstanding slots")]
    PoolInUse,
    /// The slot index is out of range or in the wrong state
    #[error("invalid message slot")]
    InvalidSlot,
    /// Nothing available and the caller asked not to wait
    #[error("pend would block and no wait was requested")]
    PendNoWait,
    /// Blocking is illegal while the scheduler is locked
    #[error("pend while scheduler is locked")]
    PendSchedLocked,
    /// Blocking is illegal from interrupt context
    #[error("pend from interrupt context")]
    PendInIrq,
    /// The wait timed out
    #[error("pend timed out")]
    PendTimeout,
    /// The object was destroyed while waiting
    #[error("pend object destroyed")]
    PendDestroy,
    /// The wait set of the object has no room for another waiter
    #[error("wait set is full")]
    WaitSetFull,
    /// The kernel has not been started
    #[error("kernel is not running")]
    KnlNotRunning,
    /// The kernel has already been started
    #[error("kernel is already running")]
    KnlRunning,
    /// Interrupt nesting reached its limit
    #[error("interrupt nesting overflow")]
    IrqNestingOverflow,
    /// `irq_leave` without a matching `irq_enter`
    #[error("interrupt leave without enter")]
    IrqNotEntered,
    /// Scheduler-lock nesting reached its limit
    #[error("scheduler lock nesting overflow")]
    LockNestingOverflow,
    /// `sched_unlock` without a matching `sched_lock`
    #[error("scheduler is not locked")]
    SchedNotLocked,
}

/// Broad category of a [`KnlError`], telling the caller how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Out of a bounded resource; retry, drop or escalate
    Exhaustion,
    /// Expected outcome of a non-blocking probe
    Absence,
    /// A bounded wait elapsed
    Temporal,
    /// The object went away; not retryable
    Cancellation,
    /// Programming error in the caller's lifecycle or lock discipline
    Misuse,
}

impl KnlError {
    /// Returns the category of this error
    pub const fn class(self) -> ErrorClass {
        match self {
            Self::QueueFull | Self::PoolExhausted | Self::WaitSetFull => ErrorClass::Exhaustion,
            Self::QueueEmpty | Self::MsgNotExist | Self::PendNoWait => ErrorClass::Absence,
            Self::PendTimeout => ErrorClass::Temporal,
            Self::PendDestroy => ErrorClass::Cancellation,
            Self::ObjPtrNull
            | Self::ObjInvalid
            | Self::PoolInUse
            | Self::InvalidSlot
            | Self::PendSchedLocked
            | Self::PendInIrq
            | Self::KnlNotRunning
            | Self::KnlRunning
            | Self::IrqNestingOverflow
            | Self::IrqNotEntered
            | Self::LockNestingOverflow
            | Self::SchedNotLocked => ErrorClass::Misuse,
        }
    }

    /// Short symbolic name, used for target-side formatting
    pub const fn name(self) -> &'static str {
        match self {
            Self::ObjPtrNull => "ObjPtrNull",
            Self::ObjInvalid => "ObjInvalid",
            Self::QueueFull => "QueueFull",
            Self::QueueEmpty => "QueueEmpty",
            Self::MsgNotExist => "MsgNotExist",
            Self::PoolExhausted => "PoolExhausted",
            Self::PoolInUse => "PoolInUse",
            Self::InvalidSlot => "InvalidSlot",
            Self::PendNoWait => "PendNoWait",
            Self::PendSchedLocked => "PendSchedLocked",
            Self::PendInIrq => "PendInIrq",
            Self::PendTimeout => "PendTimeout",
            Self::PendDestroy => "PendDestroy",
            Self::WaitSetFull => "WaitSetFull",
            Self::KnlNotRunning => "KnlNotRunning",
            Self::KnlRunning => "KnlRunning",
            Self::IrqNestingOverflow => "IrqNestingOverflow",
            Self::IrqNotEntered => "IrqNotEntered",
            Self::LockNestingOverflow => "LockNestingOverflow",
            Self::SchedNotLocked => "SchedNotLocked",
        }
    }

    /// Whether the error signals a bug in the caller rather than a runtime condition
    pub const fn is_misuse(self) -> bool {
        matches!(self.class(), ErrorClass::Misuse)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for KnlError {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=str}", self.name());
    }
}
