//! Stress driver for the monitor implementation.
//!
//! ```text
//! cargo run --release -- --threads 8 --iterations 100000 mixed
//! ```
use std::{
    cell::UnsafeCell,
    sync::Arc,
    time::{Duration, Instant},
};

use clap::{Parser, ValueEnum};
use vmsync::{
    object_model::{MonitorSlot, Synchronized},
    options::{set_options, Options},
    sync::Monitor,
    threading::Thread,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scenario {
    /// Increment a shared counter under the lock.
    Handoff,
    /// Producer/consumer pairs using wait and pulse.
    WaitPulse,
    /// Threads racing enter, timed enter, wait and pulse on the same object.
    Mixed,
}

#[derive(Parser)]
struct Args {
    #[clap(value_enum, default_value_t = Scenario::Mixed)]
    scenario: Scenario,

    #[clap(long, default_value_t = 4)]
    threads: usize,

    #[clap(long, default_value_t = 10_000)]
    iterations: usize,

    #[clap(flatten)]
    options: Options,
}

/// A counter only ever touched under its own monitor.
struct Counter {
    slot: MonitorSlot,
    value: UnsafeCell<usize>,
}

unsafe impl Sync for Counter {}

impl Synchronized for Counter {
    fn monitor_slot(&self) -> &MonitorSlot {
        &self.slot
    }
}

impl Counter {
    fn new() -> Self {
        Self {
            slot: MonitorSlot::new(),
            value: UnsafeCell::new(0),
        }
    }

    /// # Safety
    ///
    /// Caller must hold the counter's monitor.
    unsafe fn get(&self) -> &mut usize {
        unsafe { &mut *self.value.get() }
    }
}

fn spawn_workers<F>(threads: usize, work: F) -> Vec<std::thread::JoinHandle<Option<()>>>
where
    F: Fn(usize) + Send + Sync + 'static,
{
    let work = Arc::new(work);
    (0..threads)
        .map(|index| {
            let work = work.clone();
            match Thread::spawn(Some(format!("worker-{}", index)), move || work(index)) {
                Ok((_, handle)) => handle,
                Err(err) => panic!("failed to start worker {}: {}", index, err),
            }
        })
        .collect()
}

fn run(scenario: Scenario, threads: usize, iterations: usize) -> usize {
    let counter = Arc::new(Counter::new());
    let handles = match scenario {
        Scenario::Handoff => {
            let counter = counter.clone();
            spawn_workers(threads, move |_| {
                for _ in 0..iterations {
                    let _guard = Monitor::lock(&*counter);
                    unsafe { *counter.get() += 1 };
                }
            })
        }
        Scenario::WaitPulse => {
            let counter = counter.clone();
            // even workers produce, odd workers consume one item per iteration
            let threads = threads.max(2) & !1;
            spawn_workers(threads, move |index| {
                for _ in 0..iterations {
                    let guard = Monitor::lock(&*counter);
                    if index % 2 == 0 {
                        unsafe { *counter.get() += 1 };
                        guard.pulse_all();
                    } else {
                        while unsafe { *counter.get() } == 0 {
                            if let Err(err) = guard.wait(None) {
                                log::error!("wait failed: {}", err);
                                return;
                            }
                        }
                        unsafe { *counter.get() -= 1 };
                    }
                }
            })
        }
        Scenario::Mixed => {
            let counter = counter.clone();
            spawn_workers(threads, move |index| {
                for i in 0..iterations {
                    match (index + i) % 3 {
                        0 => {
                            let _guard = Monitor::lock(&*counter);
                            unsafe { *counter.get() += 1 };
                        }
                        1 => {
                            let timeout = Some(Duration::from_micros(50));
                            while !Monitor::try_enter(&*counter, timeout) {}
                            unsafe { *counter.get() += 1 };
                            let _ = Monitor::pulse(&*counter);
                            let _ = Monitor::exit(&*counter);
                        }
                        _ => {
                            let guard = Monitor::lock(&*counter);
                            unsafe { *counter.get() += 1 };
                            let _ = guard.wait(Some(Duration::from_micros(10)));
                        }
                    }
                }
            })
        }
    };

    for handle in handles {
        if handle.join().ok().flatten().is_none() {
            log::error!("worker panicked");
        }
    }
    let _guard = Monitor::lock(&*counter);
    unsafe { *counter.get() }
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if set_options(args.options).is_err() {
        log::warn!("options were already initialized");
    }

    let start = Instant::now();
    let count = run(args.scenario, args.threads, args.iterations);
    let expected = match args.scenario {
        Scenario::WaitPulse => 0,
        _ => args.threads * args.iterations,
    };
    println!(
        "{:?}: {} threads x {} iterations in {:?}, counter = {} (expected {})",
        args.scenario,
        args.threads,
        args.iterations,
        start.elapsed(),
        count,
        expected
    );
    println!("{:?}", Monitor::pool_stats());
    if count != expected {
        std::process::exit(1);
    }
}
