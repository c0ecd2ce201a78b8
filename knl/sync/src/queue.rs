//! Blocking queue: a [`MessageQueue`] guarded by a [`PendObject`].
//!
//! A post to a queue with waiters never touches the buffer. The message is
//! handed straight to the highest-priority waiter as its wake outcome, so a
//! third task can never steal it between the wake and the moment the
//! waiter runs.

use knl_core::{KernelState, KnlError, KnlObjType, KnlResult, Message, Scheduler, Tick, Timeout};
use knl_mem::MessagePool;

use crate::{MessageQueue, PendObject, PutOrder, DEFAULT_WAIT_SET_CAPACITY};

pub struct Queue<'p, const N: usize, const W: usize = DEFAULT_WAIT_SET_CAPACITY> {
    msgs: MessageQueue<'p, N>,
    pend: PendObject<W>,
}

impl<'p, const N: usize, const W: usize> Queue<'p, N, W> {
    pub const fn new(pool: &'p MessagePool<N>) -> Self {
        Self {
            msgs: MessageQueue::new(pool),
            pend: PendObject::new(KnlObjType::Queue),
        }
    }

    /// Re-create a destroyed queue; a live queue is left as it is
    pub fn create(&self) -> KnlResult<()> {
        critical_section::with(|_| {
            self.msgs.create()?;
            self.pend.init();
            Ok(())
        })
    }

    /// Cancel every wait with [`KnlError::PendDestroy`], drop the buffered
    /// messages and invalidate the queue.
    pub fn destroy<S: Scheduler + ?Sized>(&self, knl: &KernelState, sched: &S) -> KnlResult<()> {
        let woken = critical_section::with(|_| {
            let woken = self.pend.destroy(sched)?;
            self.msgs.destroy()?;
            Ok::<_, KnlError>(woken)
        })?;
        if woken > 0 {
            knl.sched(sched);
        }
        Ok(())
    }

    /// Take the head message, waiting up to `timeout` for one to arrive
    pub fn pend<S: Scheduler + ?Sized>(
        &self,
        knl: &KernelState,
        sched: &S,
        timeout: Timeout,
    ) -> KnlResult<Message> {
        self.pend.verify()?;
        let task = sched.current();

        let ready = critical_section::with(|cs| match self.msgs.get() {
            Ok(msg) => Ok(Some(msg)),
            Err(KnlError::QueueEmpty) => self.pend.register(cs, knl, task, timeout).map(|()| None),
            Err(err) => Err(err),
        })?;
        if let Some(msg) = ready {
            return Ok(msg);
        }

        match self.pend.block(sched, task.id)? {
            Some(msg) => Ok(msg),
            // woken without a payload, fall back to the buffer
            None => self.msgs.get(),
        }
    }

    /// Take the head message without waiting; safe in interrupt context
    pub fn try_pend(&self) -> nb::Result<Message, KnlError> {
        self.pend.verify()?;
        self.msgs.get().map_err(|err| match err {
            KnlError::QueueEmpty => nb::Error::WouldBlock,
            other => nb::Error::Other(other),
        })
    }

    /// Hand `msg` to the highest-priority waiter, or buffer it when nobody
    /// waits. Never blocks.
    pub fn post<S: Scheduler + ?Sized>(&self, knl: &KernelState, sched: &S, msg: Message) -> KnlResult<()> {
        self.pend.verify()?;
        let msg = msg.check()?;

        let woke = critical_section::with(|_| {
            if self.pend.post(sched, Some(msg)) {
                Ok(true)
            } else {
                self.msgs.put(msg, PutOrder::Fifo).map(|()| false)
            }
        })?;

        if woke {
            knl.sched(sched);
        }
        Ok(())
    }

    /// Hand the same `msg` to every waiter, or buffer it once when nobody
    /// waits.
    pub fn post_all<S: Scheduler + ?Sized>(
        &self,
        knl: &KernelState,
        sched: &S,
        msg: Message,
    ) -> KnlResult<()> {
        self.pend.verify()?;
        let msg = msg.check()?;

        let woken = critical_section::with(|_| {
            match self.pend.post_all(sched, Some(msg)) {
                0 => self.msgs.put(msg, PutOrder::Fifo).map(|()| 0),
                n => Ok(n),
            }
        })?;

        if woken > 0 {
            log::trace!("{:?} handed to {} waiter(s)", msg, woken);
            knl.sched(sched);
        }
        Ok(())
    }

    /// Drop the buffered messages; waiters stay suspended
    pub fn flush(&self) {
        self.msgs.flush();
    }

    pub fn remove(&self, addr: usize) -> KnlResult<()> {
        self.pend.verify()?;
        self.msgs.remove(addr)
    }

    /// Time out the waiters whose deadline has passed
    pub fn expire<S: Scheduler + ?Sized>(&self, knl: &KernelState, sched: &S) -> usize {
        let expired = self.pend.expire(knl, sched);
        if expired > 0 {
            knl.sched(sched);
        }
        expired
    }

    pub fn next_expiry(&self) -> Option<Tick> {
        self.pend.next_expiry()
    }

    pub fn waiter_count(&self) -> usize {
        self.pend.waiter_count()
    }

    pub fn len(&self) -> usize {
        self.msgs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.msgs.is_empty()
    }

    pub fn is_alive(&self) -> bool {
        self.pend.is_alive()
    }
}
