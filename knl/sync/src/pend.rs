//! The pend object: an ordered wait set of suspended tasks and the wake
//! policies built on it.
//!
//! A pend object owns no data. The primitive embedding it (a queue, a
//! semaphore) checks its own data first and, inside the same critical
//! section, registers the caller here when it has to wait. The caller then
//! leaves the section and blocks through the scheduler. Exactly one of
//! post, post-all, destroy or timeout later removes the entry and resumes
//! the task with the matching [`PendOutcome`].

use core::cell::RefCell;
use critical_section::{CriticalSection, Mutex};
use heapless::Vec;

use knl_core::{
    KernelState, KnlError, KnlObj, KnlObjType, KnlResult, Message, PendOutcome, Priority,
    Scheduler, Task, TaskId, Tick, Timeout,
};

/// Default number of tasks that can wait on one object at a time
pub const DEFAULT_WAIT_SET_CAPACITY: usize = 16;

/// A task suspended on a pend object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitEntry {
    pub task: TaskId,
    pub priority: Priority,
    /// Tick at which the wait times out, `None` to wait forever
    pub deadline: Option<Tick>,
}

/// Generic blocking/wake engine.
///
/// The wait set is kept ordered: higher priority first, equal priorities
/// in arrival order. `post` therefore always wakes the head.
pub struct PendObject<const W: usize = DEFAULT_WAIT_SET_CAPACITY> {
    kind: KnlObjType,
    obj: KnlObj,
    waiters: Mutex<RefCell<Vec<WaitEntry, W>>>,
}

impl<const W: usize> PendObject<W> {
    /// A live pend object owned by a primitive of type `kind`
    pub const fn new(kind: KnlObjType) -> Self {
        Self {
            kind,
            obj: KnlObj::new(kind),
            waiters: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    /// Re-arm a destroyed object; a live object is left untouched
    pub fn init(&self) {
        if !self.obj.is(self.kind) {
            self.obj.init(self.kind);
        }
    }

    pub fn verify(&self) -> KnlResult<()> {
        self.obj.verify(self.kind)
    }

    pub fn is_alive(&self) -> bool {
        self.obj.is(self.kind)
    }

    pub fn kind(&self) -> KnlObjType {
        self.kind
    }

    /// Register `task` in the wait set.
    ///
    /// `cs` is the critical section in which the caller found no data, so
    /// no post can slip in between the check and the registration.
    pub fn register(
        &self,
        cs: CriticalSection<'_>,
        knl: &KernelState,
        task: Task,
        timeout: Timeout,
    ) -> KnlResult<()> {
        self.verify()?;
        if timeout.is_no_wait() {
            return Err(KnlError::PendNoWait);
        }
        if knl.is_in_irq() {
            return Err(KnlError::PendInIrq);
        }
        if knl.is_sched_locked() {
            return Err(KnlError::PendSchedLocked);
        }

        let entry = WaitEntry {
            task: task.id,
            priority: task.priority,
            deadline: timeout.deadline(knl.now()),
        };

        let mut waiters = self.waiters.borrow_ref_mut(cs);
        debug_assert!(
            waiters.iter().all(|w| w.task != task.id),
            "task registered twice in one wait set"
        );
        let pos = waiters
            .iter()
            .position(|w| w.priority < entry.priority)
            .unwrap_or(waiters.len());
        waiters
            .insert(pos, entry)
            .map_err(|_| KnlError::WaitSetFull)?;

        log::trace!("{} waits on {:?} until {:?}", task.id, self.kind, entry.deadline);
        Ok(())
    }

    /// Suspend a registered task and translate how its wait ended.
    ///
    /// Must be called outside any critical section.
    pub fn block<S: Scheduler + ?Sized>(&self, sched: &S, task: TaskId) -> KnlResult<Option<Message>> {
        let outcome = sched.suspend(task);
        log::trace!("{} resumed from {:?}: {:?}", task, self.kind, outcome);
        outcome.into_result()
    }

    /// Register the current task and block; for primitives without a data
    /// fast path of their own.
    pub fn pend<S: Scheduler + ?Sized>(
        &self,
        knl: &KernelState,
        sched: &S,
        timeout: Timeout,
    ) -> KnlResult<Option<Message>> {
        let task = sched.current();
        critical_section::with(|cs| self.register(cs, knl, task, timeout))?;
        self.block(sched, task.id)
    }

    /// Wake the highest-priority waiter with `payload`.
    ///
    /// Returns `false` when nobody was waiting; the caller decides whether
    /// the post should be buffered instead.
    pub fn post<S: Scheduler + ?Sized>(&self, sched: &S, payload: Option<Message>) -> bool {
        critical_section::with(|cs| {
            let mut waiters = self.waiters.borrow_ref_mut(cs);
            if waiters.is_empty() {
                return false;
            }
            let entry = waiters.remove(0);
            sched.resume(entry.task, PendOutcome::Signaled(payload));
            true
        })
    }

    /// Wake every waiter with `payload`, highest priority first
    pub fn post_all<S: Scheduler + ?Sized>(&self, sched: &S, payload: Option<Message>) -> usize {
        self.wake_all(sched, PendOutcome::Signaled(payload))
    }

    /// Wake every waiter with [`PendOutcome::Destroyed`] and invalidate the
    /// object for future waits.
    pub fn destroy<S: Scheduler + ?Sized>(&self, sched: &S) -> KnlResult<usize> {
        self.verify()?;
        let woken = critical_section::with(|_| {
            let woken = self.wake_all(sched, PendOutcome::Destroyed);
            self.obj.deinit();
            woken
        });
        log::debug!("{:?} destroyed, {} waiter(s) cancelled", self.kind, woken);
        Ok(woken)
    }

    /// Time out every waiter whose deadline has been reached.
    ///
    /// Driven by the kernel tick after [`KernelState::tick`].
    pub fn expire<S: Scheduler + ?Sized>(&self, knl: &KernelState, sched: &S) -> usize {
        let now = knl.now();
        critical_section::with(|cs| {
            let mut waiters = self.waiters.borrow_ref_mut(cs);
            let before = waiters.len();
            waiters.retain(|w| match w.deadline {
                Some(deadline) if deadline.is_reached(now) => {
                    sched.resume(w.task, PendOutcome::TimedOut);
                    false
                }
                _ => true,
            });
            before - waiters.len()
        })
    }

    /// Earliest deadline among the current waiters
    pub fn next_expiry(&self) -> Option<Tick> {
        critical_section::with(|cs| {
            self.waiters
                .borrow_ref(cs)
                .iter()
                .filter_map(|w| w.deadline)
                .min()
        })
    }

    pub fn has_waiters(&self) -> bool {
        self.waiter_count() > 0
    }

    pub fn waiter_count(&self) -> usize {
        critical_section::with(|cs| self.waiters.borrow_ref(cs).len())
    }

    pub fn is_waiting(&self, task: TaskId) -> bool {
        critical_section::with(|cs| self.waiters.borrow_ref(cs).iter().any(|w| w.task == task))
    }

    /// The task `post` would wake next
    pub fn highest_waiter(&self) -> Option<WaitEntry> {
        critical_section::with(|cs| self.waiters.borrow_ref(cs).first().copied())
    }

    fn wake_all<S: Scheduler + ?Sized>(&self, sched: &S, outcome: PendOutcome) -> usize {
        critical_section::with(|cs| {
            let mut waiters = self.waiters.borrow_ref_mut(cs);
            for entry in waiters.iter() {
                sched.resume(entry.task, outcome);
            }
            let woken = waiters.len();
            waiters.clear();
            woken
        })
    }
}
