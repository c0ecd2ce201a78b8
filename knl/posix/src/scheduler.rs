//! Thread-backed scheduler for running knl primitives on a host OS.
//!
//! Every task is an OS thread. A suspended task parks on its own condition
//! variable until another thread latches an outcome for it; the OS decides
//! which runnable thread actually runs, so priorities only affect which
//! waiter a primitive wakes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use knl_core::{PendOutcome, Priority, Scheduler, Task, TaskId};

struct TaskSlot {
    task: Task,
    outcome: Mutex<Option<PendOutcome>>,
    wake: Condvar,
}

impl TaskSlot {
    fn new(task: Task) -> Self {
        Self {
            task,
            outcome: Mutex::new(None),
            wake: Condvar::new(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// [`Scheduler`] over OS threads
pub struct HostScheduler {
    threads: Mutex<HashMap<ThreadId, Arc<TaskSlot>>>,
    tasks: Mutex<HashMap<TaskId, Arc<TaskSlot>>>,
    next_id: AtomicU16,
    reschedules: AtomicUsize,
}

impl HostScheduler {
    pub fn new() -> Self {
        Self {
            threads: Mutex::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU16::new(1),
            reschedules: AtomicUsize::new(0),
        }
    }

    /// Register the calling thread as a task running at `priority`.
    ///
    /// Adopting a thread twice returns the task it already is.
    pub fn adopt(&self, priority: Priority) -> Task {
        let mut threads = lock(&self.threads);
        let slot = threads.entry(thread::current().id()).or_insert_with(|| {
            let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
            let slot = Arc::new(TaskSlot::new(Task::new(id, priority)));
            lock(&self.tasks).insert(id, Arc::clone(&slot));
            log::debug!("{} adopted at priority {}", id, priority.raw());
            slot
        });
        slot.task
    }

    /// Forget the calling thread's task
    pub fn release(&self) {
        if let Some(slot) = lock(&self.threads).remove(&thread::current().id()) {
            lock(&self.tasks).remove(&slot.task.id);
        }
    }

    pub fn task_count(&self) -> usize {
        lock(&self.tasks).len()
    }

    /// Reschedule requests seen so far
    pub fn reschedules(&self) -> usize {
        self.reschedules.load(Ordering::Relaxed)
    }

    fn slot(&self, task: TaskId) -> Option<Arc<TaskSlot>> {
        lock(&self.tasks).get(&task).cloned()
    }
}

impl Default for HostScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for HostScheduler {
    /// Threads that never called [`adopt`](HostScheduler::adopt) run at
    /// [`Priority::MIN`].
    fn current(&self) -> Task {
        self.adopt(Priority::MIN)
    }

    fn suspend(&self, task: TaskId) -> PendOutcome {
        let Some(slot) = self.slot(task) else {
            log::warn!("suspend of unknown {}", task);
            return PendOutcome::Destroyed;
        };

        let mut outcome = lock(&slot.outcome);
        loop {
            if let Some(resolved) = outcome.take() {
                return resolved;
            }
            outcome = slot
                .wake
                .wait(outcome)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn resume(&self, task: TaskId, outcome: PendOutcome) {
        match self.slot(task) {
            Some(slot) => {
                *lock(&slot.outcome) = Some(outcome);
                slot.wake.notify_one();
            }
            None => log::warn!("resume of unknown {}", task),
        }
    }

    fn reschedule(&self) {
        self.reschedules.fetch_add(1, Ordering::Relaxed);
        thread::yield_now();
    }
}
