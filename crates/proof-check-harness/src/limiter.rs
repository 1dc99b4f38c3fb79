//! Bounded admission for harness startup.

use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};

/// Permits available in [`StartupLimiter::global`].
pub const DEFAULT_STARTUP_PERMITS: usize = 8;

/// A counting semaphore limiting how many harnesses initialize at once.
///
/// Initialization spawns the lookup tool and a checker process; the limiter keeps a burst of
/// harness constructions from spawning them all simultaneously.
#[derive(Debug)]
pub struct StartupLimiter {
    available: Mutex<usize>,
    released: Condvar,
    capacity: usize,
}

impl StartupLimiter {
    /// A limiter with `permits` slots. Zero is treated as one.
    pub fn new(permits: usize) -> Self {
        let capacity = permits.max(1);
        Self {
            available: Mutex::new(capacity),
            released: Condvar::new(),
            capacity,
        }
    }

    /// The process-wide limiter with [`DEFAULT_STARTUP_PERMITS`] slots.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<StartupLimiter>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new(DEFAULT_STARTUP_PERMITS))))
    }

    /// Block until a slot is free and take it.
    pub fn acquire(&self) -> StartupPermit<'_> {
        let mut available = self.available.lock().unwrap_or_else(PoisonError::into_inner);
        while *available == 0 {
            available = self
                .released
                .wait(available)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *available -= 1;
        StartupPermit { limiter: self }
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<StartupPermit<'_>> {
        let mut available = self.available.lock().unwrap_or_else(PoisonError::into_inner);
        if *available == 0 {
            return None;
        }
        *available -= 1;
        Some(StartupPermit { limiter: self })
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        *self.available.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Total slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn release(&self) {
        let mut available = self.available.lock().unwrap_or_else(PoisonError::into_inner);
        *available += 1;
        self.released.notify_one();
    }
}

/// A held startup slot, returned on drop.
#[derive(Debug)]
pub struct StartupPermit<'a> {
    limiter: &'a StartupLimiter,
}

impl Drop for StartupPermit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}
