//! Host port for the knl kernel core.
//!
//! Runs the blocking primitives on OS threads: [`HostScheduler`] parks and
//! wakes threads in place of a context switch, and [`Ticker`] drives the
//! kernel tick from a background thread. Critical sections come from the
//! `critical-section` crate's `std` implementation, a process-wide
//! re-entrant lock.

mod scheduler;
mod ticker;

pub use scheduler::HostScheduler;
pub use ticker::{tick_period, Ticker, MAX_TICK_RATE_HZ};

use knl_core::{KernelState, KnlResult};

/// Reset `knl` and start multitasking on the host
pub fn boot(knl: &KernelState) -> KnlResult<()> {
    knl.init();
    knl.start()?;
    log::info!(
        "kernel '{}' running on host, {} Hz tick",
        knl.config().name,
        knl.config().tick_rate_hz
    );
    Ok(())
}
