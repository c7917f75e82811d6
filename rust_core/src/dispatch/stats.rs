use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for the distribution loop.
#[derive(Debug, Default)]
pub struct DispatchStats {
    ticks: AtomicU64,
    failed_ticks: AtomicU64,
    deliveries: AtomicU64,
    evictions: AtomicU64,
}

impl DispatchStats {
    pub(crate) fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_tick(&self) {
        self.failed_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deliveries(&self, count: u64) {
        self.deliveries.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            failed_ticks: self.failed_ticks.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStatsSnapshot {
    pub ticks: u64,
    pub failed_ticks: u64,
    pub deliveries: u64,
    pub evictions: u64,
}
