#![no_std]
#![forbid(unsafe_code)]

//! # knl sync
//!
//! Blocking primitives on top of the kernel core:
//!
//! - [`PendObject`]: a priority-ordered wait set with post, post-all,
//!   destroy and timeout wake policies
//! - [`MessageQueue`]: a FIFO/LIFO message buffer drawing its storage from
//!   a shared [`knl_mem::MessagePool`]
//! - [`Queue`]: the two combined into a queue tasks can block on
//!
//! ```ignore
//! static POOL: MessagePool<8> = MessagePool::new();
//! static QUEUE: Queue<'static, 8> = Queue::new(&POOL);
//!
//! QUEUE.post(&knl, &sched, Message::from_ref(&FRAME))?;
//! let msg = QUEUE.pend(&knl, &sched, Timeout::Ticks(10))?;
//! ```

pub mod msg_queue;
pub mod pend;
pub mod queue;

pub use msg_queue::*;
pub use pend::*;
pub use queue::*;

#[cfg(test)]
mod tests;
