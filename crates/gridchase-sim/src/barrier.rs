//! Countdown rendezvous bounded by the tick deadline.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Instant;

/// Rendezvous sized to the number of active controller hosts for one tick.
///
/// The scheduler waits with [`ActionBarrier::wait_until`]; each host calls
/// [`ActionBarrier::arrive`] exactly once per session. Timing out is a
/// normal outcome, and an arrival on a barrier the scheduler has already
/// discarded decrements a counter nobody reads, which is the intended
/// "silently ignored" behavior for late signals.
#[derive(Debug, Clone)]
pub struct ActionBarrier {
    inner: Arc<BarrierInner>,
}

#[derive(Debug)]
struct BarrierInner {
    remaining: Mutex<usize>,
    all_arrived: Condvar,
}

impl ActionBarrier {
    /// New barrier expecting `count` arrivals.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            inner: Arc::new(BarrierInner {
                remaining: Mutex::new(count),
                all_arrived: Condvar::new(),
            }),
        }
    }

    /// Record one session completion.
    pub fn arrive(&self) {
        let mut remaining = self
            .inner
            .remaining
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *remaining > 0 {
            *remaining -= 1;
            if *remaining == 0 {
                self.inner.all_arrived.notify_all();
            }
        }
    }

    /// Outstanding arrivals; zero once every host has checked in.
    #[must_use]
    pub fn pending(&self) -> usize {
        *self
            .inner
            .remaining
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until every expected arrival happened or `deadline` passed.
    ///
    /// Returns `true` when all hosts arrived in time. Spurious wakeups are
    /// absorbed by re-checking the count and the clock.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut remaining = self
            .inner
            .remaining
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if *remaining == 0 {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _timed_out) = self
                .inner
                .all_arrived
                .wait_timeout(remaining, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            remaining = guard;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_returns_true_once_all_arrive() {
        let barrier = ActionBarrier::new(2);
        let remote = barrier.clone();
        let worker = thread::spawn(move || {
            remote.arrive();
            remote.arrive();
        });
        assert!(barrier.wait_until(Instant::now() + Duration::from_secs(2)));
        assert_eq!(barrier.pending(), 0);
        worker.join().expect("worker");
    }

    #[test]
    fn wait_times_out_when_an_arrival_is_missing() {
        let barrier = ActionBarrier::new(2);
        barrier.arrive();
        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(!barrier.wait_until(deadline));
        assert!(Instant::now() >= deadline);
        assert_eq!(barrier.pending(), 1);
    }

    #[test]
    fn late_arrival_on_discarded_barrier_is_ignored() {
        let barrier = ActionBarrier::new(1);
        let stale = barrier.clone();
        assert!(!barrier.wait_until(Instant::now() + Duration::from_millis(5)));
        drop(barrier);
        // The host side still holds its clone; arriving now must not panic
        // or affect anything the scheduler can observe.
        stale.arrive();
        stale.arrive();
        assert_eq!(stale.pending(), 0);
    }

    #[test]
    fn zero_sized_barrier_is_immediately_satisfied() {
        let barrier = ActionBarrier::new(0);
        assert!(barrier.wait_until(Instant::now()));
    }
}
