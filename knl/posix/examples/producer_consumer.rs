//! Producer/consumer over a knl queue on the host.
//!
//! A producer thread posts sensor frames, a consumer pends on the queue
//! with a timeout, and a ticker thread drives the kernel tick so that the
//! consumer's final wait times out once the producer is done.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use knl_core::{priority, KernelConfig, KernelState, KnlError, Message, Timeout};
use knl_mem::MessagePool;
use knl_posix::{HostScheduler, Ticker};
use knl_sync::Queue;

static KNL: KernelState = KernelState::new(KernelConfig::DEFAULT);
static POOL: MessagePool<4> = MessagePool::new();
static QUEUE: Queue<'static, 4> = Queue::new(&POOL);

static FRAMES: [u32; 12] = [
    0x0101, 0x0202, 0x0303, 0x0404, 0x0505, 0x0606, 0x0707, 0x0808, 0x0909, 0x0A0A, 0x0B0B,
    0x0C0C,
];

fn main() -> Result<(), KnlError> {
    knl_posix::boot(&KNL)?;
    let sched = Arc::new(HostScheduler::new());

    let mut ticker = {
        let sched = Arc::clone(&sched);
        Ticker::for_kernel(KNL.config(), move || {
            KNL.tick();
            QUEUE.expire(&KNL, &*sched);
        })
    };

    let received = thread::scope(|s| {
        let consumer = s.spawn(|| {
            let task = sched.adopt(priority!(5));
            let mut received = 0usize;
            loop {
                match QUEUE.pend(&KNL, &*sched, Timeout::Ticks(200)) {
                    Ok(msg) => {
                        let frame = FRAMES.iter().find(|f| Message::from_ref(*f) == msg);
                        println!("{} <- {:?} at {}", task.id, frame, KNL.now());
                        received += 1;
                    }
                    Err(KnlError::PendTimeout) => {
                        println!("{} idle for 200 ticks, stopping", task.id);
                        break received;
                    }
                    Err(err) => {
                        println!("{} pend failed: {}", task.id, err);
                        break received;
                    }
                }
            }
        });

        s.spawn(|| {
            let task = sched.adopt(priority!(3));
            for frame in FRAMES.iter() {
                match QUEUE.post(&KNL, &*sched, Message::from_ref(frame)) {
                    Ok(()) => println!("{} -> {:#06x}", task.id, frame),
                    Err(KnlError::QueueFull) => println!("{} queue full, dropped {:#06x}", task.id, frame),
                    Err(err) => println!("{} post failed: {}", task.id, err),
                }
                thread::sleep(Duration::from_millis(5));
            }
        });

        consumer.join().unwrap_or(0)
    });

    ticker.stop();
    println!(
        "consumer received {} of {} frame(s); {} reschedule request(s); pool {:?}",
        received,
        FRAMES.len(),
        sched.reschedules(),
        POOL.stats()
    );

    QUEUE.destroy(&KNL, &*sched)?;
    Ok(())
}
