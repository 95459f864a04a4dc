use std::time::Instant;

/// Time source for the control loop.
///
/// The engine captures an epoch `Instant` when it is built and afterwards
/// only ever asks for elapsed milliseconds, so the trait stays this small.
pub trait Clock {
    fn now(&self) -> Instant;

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        self.now().saturating_duration_since(epoch).as_millis() as u64
    }
}

/// Wall clock backed by `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic clock for tests and simulation. Not `cfg(test)`-gated:
/// the engine's integration tests live in downstream crates.
pub mod test_clock {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, Instant};

    use super::Clock;

    /// Clock that only moves when a test advances it.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        offset_ms: Arc<AtomicU64>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset_ms: Arc::new(AtomicU64::new(0)),
            }
        }

        /// Advance the clock; every clone of this handle observes the jump.
        pub fn advance(&self, d: Duration) {
            self.offset_ms
                .fetch_add(d.as_millis() as u64, Ordering::Relaxed);
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.origin + Duration::from_millis(self.offset_ms.load(Ordering::Relaxed))
        }
    }
}
