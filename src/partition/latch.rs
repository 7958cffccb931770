use std::cell::UnsafeCell;
use std::hint::spin_loop;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

/// Test-test-and-set spin latch for critical sections that only touch a
/// queue. Never hold one across I/O.
pub struct SpinLatch<T> {
    acquired: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for SpinLatch<T> {}
unsafe impl<T: Send> Sync for SpinLatch<T> {}

impl<T> SpinLatch<T> {
    pub const fn new(data: T) -> Self {
        Self {
            acquired: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    #[inline]
    pub fn lock(&self) -> SpinLatchGuard<'_, T> {
        loop {
            while self.acquired.load(Ordering::Relaxed) {
                spin_loop();
            }
            if self
                .acquired
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return SpinLatchGuard { latch: self };
            }
        }
    }

    pub fn try_lock(&self) -> Option<SpinLatchGuard<'_, T>> {
        self.acquired
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinLatchGuard { latch: self })
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

pub struct SpinLatchGuard<'a, T> {
    latch: &'a SpinLatch<T>,
}

impl<T> Deref for SpinLatchGuard<'_, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the guard exists only while `acquired` is held.
        unsafe { &*self.latch.data.get() }
    }
}

impl<T> DerefMut for SpinLatchGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard exists only while `acquired` is held.
        unsafe { &mut *self.latch.data.get() }
    }
}

impl<T> Drop for SpinLatchGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.latch.acquired.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::SpinLatch;
    use std::sync::Arc;

    #[test]
    fn try_lock_fails_while_held() {
        let latch = SpinLatch::new(0u32);
        let guard = latch.lock();
        assert!(latch.try_lock().is_none());
        drop(guard);
        assert!(latch.try_lock().is_some());
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let latch = Arc::new(SpinLatch::new(0u64));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let latch = Arc::clone(&latch);
                std::thread::spawn(move || {
                    for _ in 0..10_000 {
                        *latch.lock() += 1;
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().expect("thread");
        }
        assert_eq!(*latch.lock(), 80_000);
    }
}
