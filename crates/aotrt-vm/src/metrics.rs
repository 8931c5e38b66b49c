use aotrt_types::{array_types::CacheStat, DispatchSlot};
use aotrt_utils::sync::{AtomicU64, Ordering};
use serde::Serialize;
use std::time::Duration;

/// Metrics counters.
///
/// All counters use `Ordering::Relaxed` because they are independent and do not
/// synchronize memory between threads. We only care that they are updated
/// atomically, not when those updates become visible to other threads relative
/// to other memory operations.
#[derive(Debug, Default)]
pub struct RuntimeMetrics {
    enabled: bool,
    pub objects_allocated: AtomicU64,
    pub arrays_allocated: AtomicU64,
    pub bytes_allocated: AtomicU64,
    pub objects_cloned: AtomicU64,
    /// Interface calls resolved from a single-entry slot
    pub dispatch_single: AtomicU64,
    /// Interface calls resolved by scanning a multi-entry slot
    pub dispatch_multi: AtomicU64,
    pub dispatch_misses: AtomicU64,
    /// Number of times a thread had to block waiting for a monitor
    pub lock_contention_count: AtomicU64,
    /// Total time spent waiting for monitors (in microseconds)
    pub lock_contention_total_us: AtomicU64,
}

impl RuntimeMetrics {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn bump(&self, counter: &AtomicU64, by: u64) {
        if self.enabled {
            counter.fetch_add(by, Ordering::Relaxed);
        }
    }

    pub fn record_allocation(&self, bytes: usize, is_array: bool) {
        if is_array {
            self.bump(&self.arrays_allocated, 1);
        } else {
            self.bump(&self.objects_allocated, 1);
        }
        self.bump(&self.bytes_allocated, bytes as u64);
    }

    pub fn record_clone(&self, bytes: usize) {
        self.bump(&self.objects_cloned, 1);
        self.bump(&self.bytes_allocated, bytes as u64);
    }

    pub fn record_dispatch(&self, slot: &DispatchSlot, resolved: bool) {
        match (slot, resolved) {
            (_, false) => self.bump(&self.dispatch_misses, 1),
            (DispatchSlot::Multi(_), true) => self.bump(&self.dispatch_multi, 1),
            (_, true) => self.bump(&self.dispatch_single, 1),
        }
    }

    pub fn record_lock_contention(&self, duration: Duration) {
        self.bump(&self.lock_contention_count, 1);
        self.bump(&self.lock_contention_total_us, duration.as_micros() as u64);
    }

    pub fn snapshot(&self, array_types: CacheStat) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            objects_allocated: load(&self.objects_allocated),
            arrays_allocated: load(&self.arrays_allocated),
            bytes_allocated: load(&self.bytes_allocated),
            objects_cloned: load(&self.objects_cloned),
            dispatch_single: load(&self.dispatch_single),
            dispatch_multi: load(&self.dispatch_multi),
            dispatch_misses: load(&self.dispatch_misses),
            lock_contention_count: load(&self.lock_contention_count),
            lock_contention_total_us: load(&self.lock_contention_total_us),
            array_types,
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub objects_allocated: u64,
    pub arrays_allocated: u64,
    pub bytes_allocated: u64,
    pub objects_cloned: u64,
    pub dispatch_single: u64,
    pub dispatch_multi: u64,
    pub dispatch_misses: u64,
    pub lock_contention_count: u64,
    pub lock_contention_total_us: u64,
    pub array_types: CacheStat,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Runtime Metrics:")?;
        writeln!(
            f,
            "  Allocations:        {} objects, {} arrays, {} bytes",
            self.objects_allocated, self.arrays_allocated, self.bytes_allocated
        )?;
        writeln!(f, "  Clones:             {}", self.objects_cloned)?;
        writeln!(
            f,
            "  Interface Dispatch: single: {}, multi: {}, misses: {}",
            self.dispatch_single, self.dispatch_multi, self.dispatch_misses
        )?;
        writeln!(
            f,
            "  Lock Contention:    {} waits, {} us",
            self.lock_contention_count, self.lock_contention_total_us
        )?;
        writeln!(f, "  Array Type Cache:   {}", self.array_types)?;
        Ok(())
    }
}
