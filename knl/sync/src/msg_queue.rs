//! Non-blocking message queue over a shared [`MessagePool`].

use core::cell::RefCell;
use critical_section::Mutex;

use knl_core::{KnlError, KnlObj, KnlObjType, KnlResult, Message};
use knl_mem::{MessagePool, SlotList};

/// Where `put` inserts a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOrder {
    /// At the tail, behind everything already queued
    Fifo,
    /// At the head, ahead of everything already queued
    Lifo,
}

/// Ordered sequence of messages whose storage comes from a pool.
///
/// Several queues can share one pool; a full pool makes every queue on it
/// full.
pub struct MessageQueue<'p, const N: usize> {
    pool: &'p MessagePool<N>,
    obj: KnlObj,
    list: Mutex<RefCell<SlotList>>,
}

impl<'p, const N: usize> MessageQueue<'p, N> {
    /// A live, empty queue
    pub const fn new(pool: &'p MessagePool<N>) -> Self {
        Self {
            pool,
            obj: KnlObj::new(KnlObjType::MsgQueue),
            list: Mutex::new(RefCell::new(SlotList::new())),
        }
    }

    /// Bring a destroyed queue back to life, empty
    pub fn create(&self) -> KnlResult<()> {
        if self.obj.is(KnlObjType::MsgQueue) {
            return Ok(());
        }
        critical_section::with(|cs| {
            *self.list.borrow_ref_mut(cs) = SlotList::new();
            self.obj.init(KnlObjType::MsgQueue);
        });
        Ok(())
    }

    /// Return every queued slot to the pool and invalidate the queue
    pub fn destroy(&self) -> KnlResult<()> {
        self.verify()?;
        critical_section::with(|_| {
            self.flush();
            self.obj.deinit();
        });
        log::debug!("message queue destroyed");
        Ok(())
    }

    pub fn verify(&self) -> KnlResult<()> {
        self.obj.verify(KnlObjType::MsgQueue)
    }

    pub fn put(&self, msg: Message, order: PutOrder) -> KnlResult<()> {
        self.verify()?;
        let msg = msg.check()?;

        critical_section::with(|cs| {
            let mut arena = self.pool.borrow_mut(cs);
            let mut list = self.list.borrow_ref_mut(cs);
            let id = arena.alloc(msg).map_err(|err| match err {
                KnlError::PoolExhausted => KnlError::QueueFull,
                other => other,
            })?;
            match order {
                PutOrder::Fifo => arena.push_back(&mut list, id),
                PutOrder::Lifo => arena.push_front(&mut list, id),
            }
        })?;

        log::trace!("put {:?} ({:?})", msg, order);
        Ok(())
    }

    /// Remove and return the head message
    pub fn get(&self) -> KnlResult<Message> {
        self.verify()?;
        critical_section::with(|cs| {
            let mut arena = self.pool.borrow_mut(cs);
            let mut list = self.list.borrow_ref_mut(cs);
            let head = list.head().ok_or(KnlError::QueueEmpty)?;
            arena.release(&mut list, head)
        })
    }

    /// Drop every queued message whose address is `addr`
    pub fn remove(&self, addr: usize) -> KnlResult<()> {
        self.verify()?;
        let removed = critical_section::with(|cs| {
            let mut arena = self.pool.borrow_mut(cs);
            let mut list = self.list.borrow_ref_mut(cs);
            let mut removed = 0usize;
            let mut cursor = list.head();
            while let Some(id) = cursor {
                cursor = arena.next(id);
                if arena.message(id)?.addr == addr {
                    arena.release(&mut list, id)?;
                    removed += 1;
                }
            }
            Ok::<_, KnlError>(removed)
        })?;

        if removed == 0 {
            return Err(KnlError::MsgNotExist);
        }
        log::trace!("removed {} message(s) at {:#x}", removed, addr);
        Ok(())
    }

    /// Drop every queued message; does nothing on an invalid queue
    pub fn flush(&self) {
        if self.verify().is_err() {
            return;
        }
        let released = critical_section::with(|cs| {
            let mut arena = self.pool.borrow_mut(cs);
            let mut list = self.list.borrow_ref_mut(cs);
            arena.release_all(&mut list)
        });
        if released > 0 {
            log::trace!("flushed {} message(s)", released);
        }
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.list.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pool(&self) -> &'p MessagePool<N> {
        self.pool
    }
}
