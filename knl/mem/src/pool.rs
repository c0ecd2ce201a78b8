//! Fixed message pool with an index-based freelist and intrusive lists.
//!
//! Slots are linked by index, never by reference. Each slot is in one of
//! three states: on the freelist, detached (allocated but not linked yet or
//! any more), or linked into exactly one [`SlotList`].

use core::cell::{RefCell, RefMut};
use critical_section::{CriticalSection, Mutex};

use knl_core::{KnlError, KnlResult, Message};

use crate::PoolStats;

/// Largest pool a [`SlotId`] can address
pub const MAX_POOL_CAPACITY: usize = u16::MAX as usize;

/// Index of a slot inside one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(u16);

impl SlotId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    Detached,
    Linked,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    msg: Message,
    prev: Option<SlotId>,
    next: Option<SlotId>,
    state: SlotState,
}

impl Slot {
    const FREE: Slot = Slot {
        msg: Message::new(0, 0),
        prev: None,
        next: None,
        state: SlotState::Free,
    };
}

/// Ends and length of one ordered sequence of slots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotList {
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
}

impl SlotList {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn head(&self) -> Option<SlotId> {
        self.head
    }
}

/// Slot storage of a pool, reachable only inside a critical section
pub struct SlotArena<const N: usize> {
    slots: [Slot; N],
    free_head: Option<SlotId>,
    stats: PoolStats,
}

impl<const N: usize> SlotArena<N> {
    const fn new() -> Self {
        assert!(N <= MAX_POOL_CAPACITY, "pool capacity exceeds slot index range");

        let mut slots = [Slot::FREE; N];
        let mut i = 0;
        while i < N {
            if i + 1 < N {
                slots[i].next = Some(SlotId((i + 1) as u16));
            }
            i += 1;
        }

        Self {
            slots,
            free_head: if N > 0 { Some(SlotId(0)) } else { None },
            stats: PoolStats::new(N),
        }
    }

    fn slot(&self, id: SlotId) -> KnlResult<&Slot> {
        self.slots.get(id.index()).ok_or(KnlError::InvalidSlot)
    }

    fn slot_mut(&mut self, id: SlotId) -> KnlResult<&mut Slot> {
        self.slots.get_mut(id.index()).ok_or(KnlError::InvalidSlot)
    }

    fn expect_state(&self, id: SlotId, state: SlotState) -> KnlResult<()> {
        if self.slot(id)?.state == state {
            Ok(())
        } else {
            Err(KnlError::InvalidSlot)
        }
    }

    /// Take a slot off the freelist and store `msg` in it
    pub fn alloc(&mut self, msg: Message) -> KnlResult<SlotId> {
        let id = self.free_head.ok_or(KnlError::PoolExhausted)?;
        let next = self.slots[id.index()].next;
        self.free_head = next;
        self.slots[id.index()] = Slot {
            msg,
            prev: None,
            next: None,
            state: SlotState::Detached,
        };
        self.stats.on_alloc();
        Ok(id)
    }

    /// Return a detached slot to the freelist.
    ///
    /// A slot that is already free or still linked is rejected.
    pub fn free(&mut self, id: SlotId) -> KnlResult<()> {
        self.expect_state(id, SlotState::Detached)?;
        let free_head = self.free_head;
        *self.slot_mut(id)? = Slot {
            next: free_head,
            ..Slot::FREE
        };
        self.free_head = Some(id);
        self.stats.on_free();
        Ok(())
    }

    /// Message stored in an allocated slot
    pub fn message(&self, id: SlotId) -> KnlResult<Message> {
        let slot = self.slot(id)?;
        match slot.state {
            SlotState::Free => Err(KnlError::InvalidSlot),
            _ => Ok(slot.msg),
        }
    }

    /// Slot after `id` in its list
    pub fn next(&self, id: SlotId) -> Option<SlotId> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.state == SlotState::Linked)
            .and_then(|slot| slot.next)
    }

    /// Link a detached slot at the tail of `list`
    pub fn push_back(&mut self, list: &mut SlotList, id: SlotId) -> KnlResult<()> {
        self.expect_state(id, SlotState::Detached)?;
        let tail = list.tail;
        {
            let slot = self.slot_mut(id)?;
            slot.prev = tail;
            slot.next = None;
            slot.state = SlotState::Linked;
        }
        match tail {
            Some(tail) => self.slots[tail.index()].next = Some(id),
            None => list.head = Some(id),
        }
        list.tail = Some(id);
        list.len += 1;
        Ok(())
    }

    /// Link a detached slot at the head of `list`
    pub fn push_front(&mut self, list: &mut SlotList, id: SlotId) -> KnlResult<()> {
        self.expect_state(id, SlotState::Detached)?;
        let head = list.head;
        {
            let slot = self.slot_mut(id)?;
            slot.prev = None;
            slot.next = head;
            slot.state = SlotState::Linked;
        }
        match head {
            Some(head) => self.slots[head.index()].prev = Some(id),
            None => list.tail = Some(id),
        }
        list.head = Some(id);
        list.len += 1;
        Ok(())
    }

    /// Detach a linked slot from `list`; the slot stays allocated.
    ///
    /// The caller guarantees `id` belongs to `list`.
    pub fn unlink(&mut self, list: &mut SlotList, id: SlotId) -> KnlResult<Message> {
        self.expect_state(id, SlotState::Linked)?;
        let Slot { msg, prev, next, .. } = self.slots[id.index()];

        match prev {
            Some(prev) => self.slots[prev.index()].next = next,
            None => list.head = next,
        }
        match next {
            Some(next) => self.slots[next.index()].prev = prev,
            None => list.tail = prev,
        }
        list.len -= 1;

        let slot = &mut self.slots[id.index()];
        slot.prev = None;
        slot.next = None;
        slot.state = SlotState::Detached;
        Ok(msg)
    }

    /// Unlink `id` from `list` and return it to the freelist
    pub fn release(&mut self, list: &mut SlotList, id: SlotId) -> KnlResult<Message> {
        let msg = self.unlink(list, id)?;
        self.free(id)?;
        Ok(msg)
    }

    /// Release every slot of `list`; returns how many were freed
    pub fn release_all(&mut self, list: &mut SlotList) -> usize {
        let mut released = 0;
        while let Some(id) = list.head {
            if self.release(list, id).is_err() {
                // a corrupted list is dropped rather than walked further
                log::warn!("slot {} in unexpected state, dropping list", id.index());
                *list = SlotList::new();
                break;
            }
            released += 1;
        }
        released
    }

    pub fn free_count(&self) -> usize {
        self.stats.free
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}

/// A fixed pool of `N` message slots shared by the queues built on it
pub struct MessagePool<const N: usize> {
    arena: Mutex<RefCell<SlotArena<N>>>,
}

impl<const N: usize> MessagePool<N> {
    /// A pool with all `N` slots on the freelist
    pub const fn new() -> Self {
        Self {
            arena: Mutex::new(RefCell::new(SlotArena::new())),
        }
    }

    /// Rebuild the freelist; refused while slots are handed out
    pub fn init(&self) -> KnlResult<()> {
        critical_section::with(|cs| {
            let mut arena = self.arena.borrow_ref_mut(cs);
            if arena.stats.used > 0 {
                return Err(KnlError::PoolInUse);
            }
            *arena = SlotArena::new();
            Ok(())
        })
    }

    /// Slot storage for use inside the caller's critical section
    pub fn borrow_mut<'cs>(&'cs self, cs: CriticalSection<'cs>) -> RefMut<'cs, SlotArena<N>> {
        self.arena.borrow_ref_mut(cs)
    }

    pub fn alloc(&self, msg: Message) -> KnlResult<SlotId> {
        critical_section::with(|cs| self.borrow_mut(cs).alloc(msg))
    }

    pub fn free(&self, id: SlotId) -> KnlResult<()> {
        critical_section::with(|cs| self.borrow_mut(cs).free(id))
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn free_count(&self) -> usize {
        critical_section::with(|cs| self.borrow_mut(cs).free_count())
    }

    pub fn stats(&self) -> PoolStats {
        critical_section::with(|cs| self.borrow_mut(cs).stats())
    }
}

impl<const N: usize> Default for MessagePool<N> {
    fn default() -> Self {
        Self::new()
    }
}
