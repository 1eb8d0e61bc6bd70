use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Monotonic time source for the session timer.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = duration_ms(by);
        // The closure always returns `Some`, so the update cannot fail.
        let _ = self
            .offset_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |offset| {
                Some(offset.saturating_add(by))
            });
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

/// Elapsed-time measurement anchored at an instant taken from a [`Clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopwatch {
    anchor: Instant,
}

impl Stopwatch {
    pub fn started_at(anchor: Instant) -> Self {
        Self { anchor }
    }

    pub fn elapsed_ms(&self, now: Instant) -> u64 {
        duration_ms(now.saturating_duration_since(self.anchor))
    }

    pub fn anchor(&self) -> Instant {
        self.anchor
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let clock = ManualClock::new();
        let shared = clock.clone();
        let before = clock.now();

        assert_eq!(clock.now(), before);
        shared.advance(Duration::from_secs(3));
        assert_eq!(clock.now() - before, Duration::from_secs(3));
    }

    #[test]
    fn stopwatch_never_goes_negative() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(Duration::from_millis(1500));
        let watch = Stopwatch::started_at(clock.now());

        assert_eq!(watch.elapsed_ms(start), 0);
        clock.advance(Duration::from_millis(250));
        assert_eq!(watch.elapsed_ms(clock.now()), 250);
    }

    #[test]
    fn huge_durations_saturate_instead_of_wrapping() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);

        let clock = ManualClock::new();
        clock.advance(Duration::from_millis(5));
        clock.advance(Duration::MAX);
        assert_eq!(clock.offset_ms.load(Ordering::SeqCst), u64::MAX);
    }
}
