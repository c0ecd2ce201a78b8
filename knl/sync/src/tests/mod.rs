//! In-crate tests driven by a single-threaded recording scheduler.
//!
//! What "other tasks" do while a task is suspended is scripted with a hook
//! that runs inside `suspend`.

extern crate std;

use core::cell::{Cell, RefCell};
use std::boxed::Box;
use std::vec;
use std::vec::Vec;

use knl_core::{
    KernelState, KnlError, KnlObjType, Message, PendOutcome, Priority, Scheduler, Task, TaskId,
    Tick, Timeout,
};
use knl_mem::MessagePool;

use crate::{MessageQueue, PendObject, PutOrder, Queue};

type Hook<'a> = Box<dyn FnOnce(&RecordingScheduler<'a>) + 'a>;

struct RecordingScheduler<'a> {
    current: Cell<Task>,
    latched: RefCell<Vec<(TaskId, PendOutcome)>>,
    resumed: RefCell<Vec<(TaskId, PendOutcome)>>,
    reschedules: Cell<usize>,
    on_suspend: RefCell<Option<Hook<'a>>>,
}

impl<'a> RecordingScheduler<'a> {
    fn new(current: Task) -> Self {
        Self {
            current: Cell::new(current),
            latched: RefCell::new(Vec::new()),
            resumed: RefCell::new(Vec::new()),
            reschedules: Cell::new(0),
            on_suspend: RefCell::new(None),
        }
    }

    fn run_as(&self, task: Task) {
        self.current.set(task);
    }

    /// Script what happens while the next task is suspended
    fn on_suspend(&self, hook: impl FnOnce(&RecordingScheduler<'a>) + 'a) {
        *self.on_suspend.borrow_mut() = Some(Box::new(hook));
    }

    fn resumed(&self) -> Vec<(TaskId, PendOutcome)> {
        self.resumed.borrow().clone()
    }
}

impl Scheduler for RecordingScheduler<'_> {
    fn current(&self) -> Task {
        self.current.get()
    }

    fn suspend(&self, task: TaskId) -> PendOutcome {
        let hook = self.on_suspend.borrow_mut().take();
        if let Some(hook) = hook {
            hook(self);
        }
        let mut latched = self.latched.borrow_mut();
        let pos = latched
            .iter()
            .position(|(t, _)| *t == task)
            .expect("task would block forever");
        latched.remove(pos).1
    }

    fn resume(&self, task: TaskId, outcome: PendOutcome) {
        self.latched.borrow_mut().push((task, outcome));
        self.resumed.borrow_mut().push((task, outcome));
    }

    fn reschedule(&self) {
        self.reschedules.set(self.reschedules.get() + 1);
    }
}

fn task(id: u16, priority: u8) -> Task {
    Task::new(TaskId(id), Priority::new(priority).unwrap())
}

fn msg(addr: usize) -> Message {
    Message::new(addr, 4)
}

fn running() -> KernelState {
    let knl = KernelState::default();
    knl.start().unwrap();
    knl
}

fn register<const W: usize>(pend: &PendObject<W>, knl: &KernelState, t: Task, timeout: Timeout) {
    critical_section::with(|cs| pend.register(cs, knl, t, timeout)).unwrap();
}

fn drain<const N: usize>(queue: &MessageQueue<'_, N>) -> Vec<usize> {
    let mut addrs = Vec::new();
    while let Ok(m) = queue.get() {
        addrs.push(m.addr);
    }
    addrs
}

// pend object

#[test]
fn test_wait_set_priority_then_arrival_order() {
    let knl = running();
    let pend: PendObject<8> = PendObject::new(KnlObjType::Queue);
    let sched = RecordingScheduler::new(task(9, 1));

    register(&pend, &knl, task(1, 2), Timeout::Forever);
    register(&pend, &knl, task(2, 5), Timeout::Forever);
    register(&pend, &knl, task(3, 2), Timeout::Forever);
    register(&pend, &knl, task(4, 5), Timeout::Forever);
    assert_eq!(pend.highest_waiter().map(|w| w.task), Some(TaskId(2)));

    while pend.post(&sched, None) {}

    let order: Vec<u16> = sched.resumed().iter().map(|(t, _)| t.raw()).collect();
    assert_eq!(order, vec![2, 4, 1, 3]);
    assert!(!pend.has_waiters());
}

#[test]
fn test_post_without_waiters() {
    let pend: PendObject<4> = PendObject::new(KnlObjType::Queue);
    let sched = RecordingScheduler::new(task(1, 1));
    assert!(!pend.post(&sched, Some(msg(0x10))));
    assert!(sched.resumed().is_empty());
}

#[test]
fn test_post_all_wakes_every_waiter_highest_first() {
    let knl = running();
    let pend: PendObject<4> = PendObject::new(KnlObjType::Queue);
    let sched = RecordingScheduler::new(task(9, 1));

    register(&pend, &knl, task(1, 1), Timeout::Forever);
    register(&pend, &knl, task(2, 3), Timeout::Ticks(50));
    register(&pend, &knl, task(3, 2), Timeout::Forever);

    assert_eq!(pend.post_all(&sched, Some(msg(0xAA))), 3);
    let signaled = PendOutcome::Signaled(Some(msg(0xAA)));
    assert_eq!(
        sched.resumed(),
        vec![(TaskId(2), signaled), (TaskId(3), signaled), (TaskId(1), signaled)]
    );
    assert_eq!(pend.waiter_count(), 0);
    assert_eq!(pend.post_all(&sched, None), 0);
}

#[test]
fn test_destroy_cancels_every_waiter() {
    let knl = running();
    let pend: PendObject<4> = PendObject::new(KnlObjType::Queue);
    let sched = RecordingScheduler::new(task(9, 1));

    register(&pend, &knl, task(1, 1), Timeout::Forever);
    register(&pend, &knl, task(2, 1), Timeout::Ticks(5));

    assert_eq!(pend.destroy(&sched), Ok(2));
    assert_eq!(
        sched.resumed(),
        vec![
            (TaskId(1), PendOutcome::Destroyed),
            (TaskId(2), PendOutcome::Destroyed)
        ]
    );
    assert!(!pend.is_alive());
    assert_eq!(pend.next_expiry(), None);
}

#[cfg(feature = "object-verify")]
#[test]
fn test_destroyed_object_refuses_waits() {
    let knl = running();
    let pend: PendObject<4> = PendObject::new(KnlObjType::Queue);
    let sched = RecordingScheduler::new(task(1, 1));

    pend.destroy(&sched).unwrap();
    let err = critical_section::with(|cs| pend.register(cs, &knl, task(1, 1), Timeout::Forever));
    assert_eq!(err, Err(KnlError::ObjInvalid));
    assert_eq!(pend.destroy(&sched), Err(KnlError::ObjInvalid));

    pend.init();
    register(&pend, &knl, task(1, 1), Timeout::Forever);
    assert_eq!(pend.waiter_count(), 1);
}

#[test]
fn test_expire_only_reached_deadlines() {
    let knl = running();
    let pend: PendObject<4> = PendObject::new(KnlObjType::Queue);
    let sched = RecordingScheduler::new(task(9, 1));

    register(&pend, &knl, task(1, 1), Timeout::Ticks(2));
    register(&pend, &knl, task(2, 1), Timeout::Ticks(5));
    register(&pend, &knl, task(3, 1), Timeout::Forever);
    assert_eq!(pend.next_expiry(), Some(Tick(2)));

    knl.tick();
    assert_eq!(pend.expire(&knl, &sched), 0);
    knl.tick();
    assert_eq!(pend.expire(&knl, &sched), 1);
    assert_eq!(sched.resumed(), vec![(TaskId(1), PendOutcome::TimedOut)]);
    assert_eq!(pend.next_expiry(), Some(Tick(5)));

    for _ in 0..3 {
        knl.tick();
    }
    assert_eq!(pend.expire(&knl, &sched), 1);
    assert!(pend.is_waiting(TaskId(3)));
    assert_eq!(pend.next_expiry(), None);
}

#[test]
fn test_register_refusals() {
    let knl = running();
    let pend: PendObject<4> = PendObject::new(KnlObjType::Queue);
    let sched = RecordingScheduler::new(task(9, 1));
    let try_register = |timeout| {
        critical_section::with(|cs| pend.register(cs, &knl, task(1, 1), timeout))
    };

    assert_eq!(try_register(Timeout::NoWait), Err(KnlError::PendNoWait));
    assert_eq!(try_register(Timeout::Ticks(0)), Err(KnlError::PendNoWait));

    knl.irq_enter().unwrap();
    assert_eq!(try_register(Timeout::Forever), Err(KnlError::PendInIrq));
    knl.irq_leave(&sched).unwrap();

    knl.sched_lock().unwrap();
    assert_eq!(try_register(Timeout::Forever), Err(KnlError::PendSchedLocked));
    knl.sched_unlock(&sched).unwrap();

    assert_eq!(pend.waiter_count(), 0);
}

#[test]
fn test_wait_set_full() {
    let knl = running();
    let pend: PendObject<2> = PendObject::new(KnlObjType::Queue);

    register(&pend, &knl, task(1, 1), Timeout::Forever);
    register(&pend, &knl, task(2, 1), Timeout::Forever);
    let err = critical_section::with(|cs| pend.register(cs, &knl, task(3, 9), Timeout::Forever));
    assert_eq!(err, Err(KnlError::WaitSetFull));
    assert!(!pend.is_waiting(TaskId(3)));
}

#[test]
fn test_block_returns_latched_outcome() {
    let pend: PendObject<2> = PendObject::new(KnlObjType::Queue);
    let sched = RecordingScheduler::new(task(1, 1));

    sched.resume(TaskId(1), PendOutcome::Signaled(Some(msg(0x40))));
    assert_eq!(pend.block(&sched, TaskId(1)), Ok(Some(msg(0x40))));

    sched.resume(TaskId(1), PendOutcome::TimedOut);
    assert_eq!(pend.block(&sched, TaskId(1)), Err(KnlError::PendTimeout));

    sched.resume(TaskId(1), PendOutcome::Destroyed);
    assert_eq!(pend.block(&sched, TaskId(1)), Err(KnlError::PendDestroy));
}

#[test]
fn test_pend_without_data_path() {
    let knl = running();
    let pend: PendObject<2> = PendObject::new(KnlObjType::Queue);
    let sched = RecordingScheduler::new(task(1, 4));
    let p = &pend;

    sched.on_suspend(move |s| {
        assert!(p.is_waiting(TaskId(1)));
        p.post(s, None);
    });
    assert_eq!(pend.pend(&knl, &sched, Timeout::Forever), Ok(None));
}

// message queue

#[test]
fn test_fifo_order() {
    let pool: MessagePool<4> = MessagePool::new();
    let queue = MessageQueue::new(&pool);
    for addr in [0xA, 0xB, 0xC, 0xD] {
        queue.put(msg(addr), PutOrder::Fifo).unwrap();
    }
    assert_eq!(drain(&queue), vec![0xA, 0xB, 0xC, 0xD]);
    assert_eq!(queue.get(), Err(KnlError::QueueEmpty));
}

#[test]
fn test_lifo_jumps_ahead() {
    let pool: MessagePool<4> = MessagePool::new();
    let queue = MessageQueue::new(&pool);
    queue.put(msg(0xA), PutOrder::Fifo).unwrap();
    queue.put(msg(0xB), PutOrder::Fifo).unwrap();
    queue.put(msg(0x1), PutOrder::Lifo).unwrap();
    assert_eq!(drain(&queue), vec![0x1, 0xA, 0xB]);
}

#[test]
fn test_full_at_pool_capacity() {
    let pool: MessagePool<4> = MessagePool::new();
    let queue = MessageQueue::new(&pool);
    for addr in 1..=4 {
        queue.put(msg(addr), PutOrder::Fifo).unwrap();
    }
    assert_eq!(queue.put(msg(5), PutOrder::Fifo), Err(KnlError::QueueFull));
    assert_eq!(queue.put(msg(5), PutOrder::Lifo), Err(KnlError::QueueFull));
    assert_eq!(queue.len(), 4);

    queue.get().unwrap();
    assert_eq!(queue.put(msg(5), PutOrder::Fifo), Ok(()));
}

#[test]
fn test_remove_every_match() {
    let pool: MessagePool<8> = MessagePool::new();
    let queue = MessageQueue::new(&pool);
    for addr in [0xA, 0xB, 0xA, 0xC, 0xA] {
        queue.put(msg(addr), PutOrder::Fifo).unwrap();
    }

    assert_eq!(queue.remove(0xA), Ok(()));
    assert_eq!(queue.len(), 2);
    assert_eq!(pool.free_count(), 6);
    assert_eq!(queue.remove(0xA), Err(KnlError::MsgNotExist));
    assert_eq!(queue.remove(0xB), Ok(()));
    assert_eq!(drain(&queue), vec![0xC]);
}

#[test]
fn test_null_message_rejected() {
    let pool: MessagePool<2> = MessagePool::new();
    let queue = MessageQueue::new(&pool);
    assert_eq!(queue.put(Message::new(0, 4), PutOrder::Fifo), Err(KnlError::ObjPtrNull));
    assert_eq!(pool.free_count(), 2);
}

#[cfg(feature = "object-verify")]
#[test]
fn test_destroyed_message_queue() {
    let pool: MessagePool<4> = MessagePool::new();
    let queue = MessageQueue::new(&pool);
    queue.put(msg(1), PutOrder::Fifo).unwrap();
    queue.put(msg(2), PutOrder::Fifo).unwrap();

    queue.destroy().unwrap();
    assert_eq!(pool.free_count(), 4);
    assert_eq!(queue.put(msg(3), PutOrder::Fifo), Err(KnlError::ObjInvalid));
    assert_eq!(queue.get(), Err(KnlError::ObjInvalid));
    assert_eq!(queue.remove(1), Err(KnlError::ObjInvalid));
    assert_eq!(queue.destroy(), Err(KnlError::ObjInvalid));
    queue.flush();

    queue.create().unwrap();
    assert!(queue.is_empty());
    queue.put(msg(3), PutOrder::Fifo).unwrap();
    assert_eq!(queue.get(), Ok(msg(3)));
}

#[test]
fn test_queues_share_pool() {
    let pool: MessagePool<3> = MessagePool::new();
    let first = MessageQueue::new(&pool);
    let second = MessageQueue::new(&pool);

    first.put(msg(1), PutOrder::Fifo).unwrap();
    first.put(msg(2), PutOrder::Fifo).unwrap();
    second.put(msg(3), PutOrder::Fifo).unwrap();
    assert_eq!(second.put(msg(4), PutOrder::Fifo), Err(KnlError::QueueFull));
    assert_eq!(first.len() + second.len() + pool.free_count(), pool.capacity());

    first.flush();
    assert_eq!(pool.free_count(), 2);
    assert_eq!(second.get(), Ok(msg(3)));
}

// queue

#[test]
fn test_pend_takes_buffered_message() {
    let knl = running();
    let pool: MessagePool<4> = MessagePool::new();
    let queue: Queue<'_, 4> = Queue::new(&pool);
    let sched = RecordingScheduler::new(task(1, 1));

    queue.post(&knl, &sched, msg(0x10)).unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(sched.reschedules.get(), 0);

    assert_eq!(queue.pend(&knl, &sched, Timeout::NoWait), Ok(msg(0x10)));
    assert!(sched.resumed().is_empty());
}

#[test]
fn test_empty_queue_without_waiting() {
    let knl = running();
    let pool: MessagePool<4> = MessagePool::new();
    let queue: Queue<'_, 4> = Queue::new(&pool);
    let sched = RecordingScheduler::new(task(1, 1));

    assert_eq!(queue.pend(&knl, &sched, Timeout::NoWait), Err(KnlError::PendNoWait));
    assert_eq!(queue.try_pend(), Err(nb::Error::WouldBlock));
    assert_eq!(queue.waiter_count(), 0);

    queue.post(&knl, &sched, msg(0x20)).unwrap();
    assert_eq!(queue.try_pend(), Ok(msg(0x20)));
}

#[test]
fn test_post_hands_message_to_waiter() {
    let knl = running();
    let pool: MessagePool<4> = MessagePool::new();
    let queue: Queue<'_, 4> = Queue::new(&pool);
    let sched = RecordingScheduler::new(task(1, 3));
    let (q, k) = (&queue, &knl);

    sched.on_suspend(move |s| {
        assert_eq!(q.waiter_count(), 1);
        q.post(k, s, msg(0x30)).unwrap();
        assert!(q.is_empty());
    });

    assert_eq!(queue.pend(&knl, &sched, Timeout::Forever), Ok(msg(0x30)));
    assert_eq!(pool.free_count(), 4);
    assert_eq!(sched.reschedules.get(), 1);
}

#[test]
fn test_pend_times_out() {
    let knl = running();
    let pool: MessagePool<4> = MessagePool::new();
    let queue: Queue<'_, 4> = Queue::new(&pool);
    let sched = RecordingScheduler::new(task(1, 3));
    let (q, k) = (&queue, &knl);

    sched.on_suspend(move |s| {
        for _ in 0..3 {
            k.tick();
        }
        assert_eq!(q.next_expiry(), Some(Tick(3)));
        assert_eq!(q.expire(k, s), 1);
    });

    assert_eq!(queue.pend(&knl, &sched, Timeout::Ticks(3)), Err(KnlError::PendTimeout));
    assert_eq!(queue.waiter_count(), 0);

    // a late post finds nobody waiting and is buffered
    queue.post(&knl, &sched, msg(0x40)).unwrap();
    assert_eq!(queue.len(), 1);
}

#[cfg(feature = "object-verify")]
#[test]
fn test_destroy_while_pending() {
    let knl = running();
    let pool: MessagePool<4> = MessagePool::new();
    let queue: Queue<'_, 4> = Queue::new(&pool);
    let sched = RecordingScheduler::new(task(1, 3));
    let (q, k) = (&queue, &knl);

    sched.on_suspend(move |s| q.destroy(k, s).unwrap());

    assert_eq!(queue.pend(&knl, &sched, Timeout::Forever), Err(KnlError::PendDestroy));
    assert!(!queue.is_alive());
    assert_eq!(queue.post(&knl, &sched, msg(0x50)), Err(KnlError::ObjInvalid));
    assert_eq!(queue.try_pend(), Err(nb::Error::Other(KnlError::ObjInvalid)));
    assert_eq!(queue.remove(0x50), Err(KnlError::ObjInvalid));

    queue.create().unwrap();
    queue.post(&knl, &sched, msg(0x50)).unwrap();
    assert_eq!(queue.try_pend(), Ok(msg(0x50)));
}

#[test]
fn test_flush_leaves_waiters_suspended() {
    let knl = running();
    let pool: MessagePool<4> = MessagePool::new();
    let queue: Queue<'_, 4> = Queue::new(&pool);
    let sched = RecordingScheduler::new(task(1, 3));
    let (q, k) = (&queue, &knl);

    sched.on_suspend(move |s| {
        q.flush();
        assert_eq!(q.waiter_count(), 1);
        assert!(s.resumed().is_empty());
        q.post(k, s, msg(0x60)).unwrap();
    });

    assert_eq!(queue.pend(&knl, &sched, Timeout::Forever), Ok(msg(0x60)));
}

#[test]
fn test_post_all_hands_same_message_to_every_waiter() {
    let knl = running();
    let pool: MessagePool<4> = MessagePool::new();
    let queue: Queue<'_, 4> = Queue::new(&pool);
    let sched = RecordingScheduler::new(task(1, 3));
    let (q, k) = (&queue, &knl);

    sched.on_suspend(move |s| {
        s.run_as(task(2, 7));
        s.on_suspend(move |s| q.post_all(k, s, msg(0x70)).unwrap());
        assert_eq!(q.pend(k, s, Timeout::Forever), Ok(msg(0x70)));
    });

    assert_eq!(queue.pend(&knl, &sched, Timeout::Forever), Ok(msg(0x70)));
    let order: Vec<u16> = sched.resumed().iter().map(|(t, _)| t.raw()).collect();
    assert_eq!(order, vec![2, 1]);
    assert!(queue.is_empty());

    // nobody waiting: buffered once
    queue.post_all(&knl, &sched, msg(0x71)).unwrap();
    assert_eq!(queue.len(), 1);
}

#[test]
fn test_post_from_irq_defers_reschedule() {
    let knl = running();
    let pool: MessagePool<4> = MessagePool::new();
    let queue: Queue<'_, 4> = Queue::new(&pool);
    let sched = RecordingScheduler::new(task(1, 3));
    let (q, k) = (&queue, &knl);

    sched.on_suspend(move |s| {
        k.irq_enter().unwrap();
        q.post(k, s, msg(0x80)).unwrap();
        assert_eq!(s.reschedules.get(), 0);
        k.irq_leave(s).unwrap();
        assert_eq!(s.reschedules.get(), 1);
    });

    assert_eq!(queue.pend(&knl, &sched, Timeout::Forever), Ok(msg(0x80)));
}

#[test]
fn test_queue_remove_and_flush() {
    let knl = running();
    let pool: MessagePool<4> = MessagePool::new();
    let queue: Queue<'_, 4> = Queue::new(&pool);
    let sched = RecordingScheduler::new(task(1, 1));

    for addr in [0xA, 0xB, 0xA] {
        queue.post(&knl, &sched, msg(addr)).unwrap();
    }
    assert_eq!(queue.post(&knl, &sched, Message::new(0, 0)), Err(KnlError::ObjPtrNull));

    queue.remove(0xA).unwrap();
    assert_eq!(queue.remove(0xA), Err(KnlError::MsgNotExist));
    assert_eq!(queue.len(), 1);

    queue.flush();
    assert!(queue.is_empty());
    assert_eq!(pool.free_count(), 4);
}
