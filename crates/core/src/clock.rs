use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;

/// Time source for every wait in the automation loop.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    fn elapsed_since(&self, start: Instant) -> Duration {
        self.now().saturating_duration_since(start)
    }
}

/// Wall clock backed by `Instant` and `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration) {
        thread::sleep(d);
    }
}

/// Virtual clock: `sleep` returns immediately after advancing time.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { base: Instant::now(), offset: Mutex::new(Duration::ZERO) }
    }

    pub fn advance(&self, d: Duration) {
        if let Ok(mut offset) = self.offset.lock() {
            *offset += d;
        }
    }

    /// Total virtual time elapsed since construction.
    pub fn elapsed(&self) -> Duration {
        self.offset.lock().map(|o| *o).unwrap_or_default()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

/// Sleep for `secs` seconds with +/-30% random jitter.
pub fn sleep_jitter(clock: &dyn Clock, secs: f64) {
    let jitter = secs * 0.3;
    let actual = if jitter > 0.0 {
        secs + rand::thread_rng().gen_range(-jitter..jitter)
    } else {
        secs
    };
    clock.sleep(Duration::from_secs_f64(actual.max(0.01)));
}
