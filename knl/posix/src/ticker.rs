//! Clock tick service for the host port.
//!
//! A dedicated thread invokes a callback at a fixed rate. It sleeps until
//! the next absolute tick time rather than for a relative period, so the
//! rate does not drift with callback run time.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use knl_core::KernelConfig;

/// Nanoseconds per second
const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Highest tick rate the host port accepts
pub const MAX_TICK_RATE_HZ: u32 = 10_000;

/// Tick period for a rate, clamped to `1..=MAX_TICK_RATE_HZ`
pub fn tick_period(rate_hz: u32) -> Duration {
    let rate = rate_hz.clamp(1, MAX_TICK_RATE_HZ);
    Duration::from_nanos(NSEC_PER_SEC / rate as u64)
}

/// Handle to a running tick thread; stops it when dropped
pub struct Ticker {
    running: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawn a tick thread calling `on_tick` `rate_hz` times per second
    pub fn start<F>(rate_hz: u32, mut on_tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let period = tick_period(rate_hz);
        let running = Arc::new(AtomicBool::new(true));
        let ticks = Arc::new(AtomicU64::new(0));

        let handle = {
            let running = Arc::clone(&running);
            let ticks = Arc::clone(&ticks);
            thread::spawn(move || {
                let mut next_tick = Instant::now();
                while running.load(Ordering::Relaxed) {
                    next_tick += period;
                    let now = Instant::now();
                    if next_tick > now {
                        thread::sleep(next_tick - now);
                    }
                    if !running.load(Ordering::Relaxed) {
                        break;
                    }
                    on_tick();
                    ticks.fetch_add(1, Ordering::Relaxed);
                }
            })
        };

        log::debug!("ticker started, period {:?}", period);
        Self {
            running,
            ticks,
            period,
            handle: Some(handle),
        }
    }

    /// Spawn a tick thread at the configured kernel tick rate
    pub fn for_kernel<F>(config: &KernelConfig, on_tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::start(config.tick_rate_hz, on_tick)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Callbacks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop the thread and wait for it to finish
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("tick callback panicked");
            }
            log::debug!("ticker stopped after {} tick(s)", self.ticks());
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
