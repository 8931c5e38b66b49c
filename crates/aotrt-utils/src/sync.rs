//! Basic synchronization primitives.
//!
//! Low-level crates depend on this module instead of naming `parking_lot`
//! directly, so the whole workspace agrees on one lock implementation.
use crate::ThreadId;
use std::cell::Cell;

pub use parking_lot::{Condvar, Mutex, RwLock};
pub use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Cached runtime thread ID for the current thread
    static RUNTIME_THREAD_ID: Cell<Option<ThreadId>> = const { Cell::new(None) };
}

/// Get the current thread's runtime ID, assigning one on first use.
pub fn get_current_thread_id() -> ThreadId {
    RUNTIME_THREAD_ID.with(|id| match id.get() {
        Some(existing) => existing,
        None => {
            let fresh = ThreadId(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed));
            id.set(Some(fresh));
            fresh
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_thread_id_is_stable_per_thread() {
        let first = get_current_thread_id();
        assert_ne!(first, ThreadId(0));
        assert_eq!(first, get_current_thread_id());
    }

    #[test]
    fn test_thread_ids_differ_across_threads() {
        let here = get_current_thread_id();
        let there = thread::spawn(get_current_thread_id).join().unwrap();
        assert_ne!(here, there);
    }
}
