use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

/// Run state of the engine. Exactly one variant holds once initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Stopped,
    Running,
}

/// How many sweeps a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Finiteness {
    /// Sweep until stopped.
    #[default]
    Continuous,
    /// Exit after this many completed sweeps.
    Finite(u64),
    /// Exit after a single sweep.
    OneShot,
}

const LIFECYCLE_STOPPED: u8 = 0;
const LIFECYCLE_RUNNING: u8 = 1;

/// Flags and counters shared between the control thread and the transfer
/// context. The pipeline polls these without holding any lock, so a stop
/// request may be observed one block late.
pub(crate) struct Shared {
    lifecycle: AtomicU8,
    exiting: AtomicBool,
    bypass_fft: AtomicBool,
    sweep_count: AtomicU64,
    byte_count: AtomicU64,
}

impl Shared {
    pub fn new() -> Self {
        Self {
            lifecycle: AtomicU8::new(LIFECYCLE_STOPPED),
            exiting: AtomicBool::new(false),
            bypass_fft: AtomicBool::new(false),
            sweep_count: AtomicU64::new(0),
            byte_count: AtomicU64::new(0),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self.lifecycle.load(Ordering::SeqCst) {
            LIFECYCLE_RUNNING => Lifecycle::Running,
            _ => Lifecycle::Stopped,
        }
    }

    pub fn set_lifecycle(&self, state: Lifecycle) {
        let raw = match state {
            Lifecycle::Stopped => LIFECYCLE_STOPPED,
            Lifecycle::Running => LIFECYCLE_RUNNING,
        };
        self.lifecycle.store(raw, Ordering::SeqCst);
    }

    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::SeqCst)
    }

    pub fn set_exiting(&self, value: bool) {
        self.exiting.store(value, Ordering::SeqCst);
    }

    pub fn bypass_fft(&self) -> bool {
        self.bypass_fft.load(Ordering::SeqCst)
    }

    pub fn set_bypass_fft(&self, value: bool) {
        self.bypass_fft.store(value, Ordering::SeqCst);
    }

    pub fn sweep_count(&self) -> u64 {
        self.sweep_count.load(Ordering::Relaxed)
    }

    pub fn increment_sweeps(&self) -> u64 {
        self.sweep_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn byte_count(&self) -> u64 {
        self.byte_count.load(Ordering::Relaxed)
    }

    pub fn add_bytes(&self, n: u64) {
        self.byte_count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn reset_byte_count(&self) {
        self.byte_count.store(0, Ordering::Relaxed);
    }

    pub fn reset_counters(&self) {
        self.sweep_count.store(0, Ordering::Relaxed);
        self.byte_count.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_is_exclusive() {
        let shared = Shared::new();
        assert_eq!(shared.lifecycle(), Lifecycle::Stopped);
        shared.set_lifecycle(Lifecycle::Running);
        assert_eq!(shared.lifecycle(), Lifecycle::Running);
        shared.set_lifecycle(Lifecycle::Stopped);
        assert_eq!(shared.lifecycle(), Lifecycle::Stopped);
    }

    #[test]
    fn counters() {
        let shared = Shared::new();
        assert_eq!(shared.increment_sweeps(), 1);
        assert_eq!(shared.increment_sweeps(), 2);
        shared.add_bytes(512);
        shared.add_bytes(512);
        assert_eq!(shared.byte_count(), 1024);
        shared.reset_counters();
        assert_eq!(shared.sweep_count(), 0);
        assert_eq!(shared.byte_count(), 0);
    }
}
