use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for one sampling loop, shared between its threads.
#[derive(Debug, Default)]
pub struct SamplingStats {
    ticks_admitted: AtomicU64,
    ticks_dropped_not_ready: AtomicU64,
    ticks_dropped_busy: AtomicU64,
    frames_not_ready: AtomicU64,
    cycles_published: AtomicU64,
    cycles_discarded: AtomicU64,
    cycle_failures: AtomicU64,
}

/// Point-in-time copy of [`SamplingStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub ticks_admitted: u64,
    /// Ticks that arrived before models were ready or media was open.
    pub ticks_dropped_not_ready: u64,
    /// Ticks that arrived while a cycle was in flight.
    pub ticks_dropped_busy: u64,
    pub frames_not_ready: u64,
    pub cycles_published: u64,
    /// Completed after teardown; result thrown away.
    pub cycles_discarded: u64,
    pub cycle_failures: u64,
}

impl SamplingStats {
    pub fn record_admitted(&self) {
        self.ticks_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_not_ready(&self) {
        self.ticks_dropped_not_ready.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_busy(&self) {
        self.ticks_dropped_busy.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_not_ready(&self) {
        self.frames_not_ready.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.cycles_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.cycles_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.cycle_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks_admitted: self.ticks_admitted.load(Ordering::Relaxed),
            ticks_dropped_not_ready: self.ticks_dropped_not_ready.load(Ordering::Relaxed),
            ticks_dropped_busy: self.ticks_dropped_busy.load(Ordering::Relaxed),
            frames_not_ready: self.frames_not_ready.load(Ordering::Relaxed),
            cycles_published: self.cycles_published.load(Ordering::Relaxed),
            cycles_discarded: self.cycles_discarded.load(Ordering::Relaxed),
            cycle_failures: self.cycle_failures.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    pub fn ticks_dropped(&self) -> u64 {
        self.ticks_dropped_not_ready + self.ticks_dropped_busy
    }
}
