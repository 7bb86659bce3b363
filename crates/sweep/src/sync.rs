use std::sync::Arc;

/// Caller-supplied mutex wrapped around sensitive writes to the sweep state.
///
/// The engine invokes `lock`/`unlock` around every control-side mutation of
/// flags, callback slots, and the sink while a sweep may be active, so a
/// host application can interleave its own accesses safely. When no mutex
/// is installed the writes proceed unguarded.
pub trait WriteMutex: Send + Sync {
    fn lock(&self);
    fn unlock(&self);
}

/// Default hook pair that does nothing.
#[derive(Debug, Default)]
pub struct NopWriteMutex;

impl WriteMutex for NopWriteMutex {
    fn lock(&self) {}
    fn unlock(&self) {}
}

/// RAII wrapper over the optional hook pair.
pub(crate) struct WriteGuard<'a>(Option<&'a dyn WriteMutex>);

impl<'a> WriteGuard<'a> {
    pub fn lock(hooks: &'a Option<Arc<dyn WriteMutex>>) -> Self {
        match hooks {
            Some(h) => {
                h.lock();
                Self(Some(h.as_ref()))
            }
            None => Self(None),
        }
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if let Some(h) = self.0 {
            h.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Counting {
        locks: AtomicU32,
        unlocks: AtomicU32,
    }

    impl WriteMutex for Counting {
        fn lock(&self) {
            self.locks.fetch_add(1, Ordering::SeqCst);
        }
        fn unlock(&self) {
            self.unlocks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn guard_is_balanced() {
        let hooks: Arc<Counting> = Arc::new(Counting::default());
        let slot: Option<Arc<dyn WriteMutex>> = Some(hooks.clone());
        {
            let _g = WriteGuard::lock(&slot);
            assert_eq!(hooks.locks.load(Ordering::SeqCst), 1);
            assert_eq!(hooks.unlocks.load(Ordering::SeqCst), 0);
        }
        assert_eq!(hooks.unlocks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn absent_hooks_are_a_nop() {
        let slot: Option<Arc<dyn WriteMutex>> = None;
        let _g = WriteGuard::lock(&slot);
    }
}
