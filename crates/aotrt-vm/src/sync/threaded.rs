use crate::{
    metrics::RuntimeMetrics,
    sync::{SyncBlockOps, SyncManagerOps},
};
use aotrt_utils::{
    sync::{Arc, Condvar, Mutex},
    ThreadId,
};
use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct MonitorState {
    owner: Option<ThreadId>,
    /// Nested enters by `owner`.
    depth: usize,
    /// Threads blocked in `acquire`.
    waiters: usize,
}

impl MonitorState {
    /// Takes the monitor for `thread` if it is free or already held by `thread`.
    fn claim(&mut self, thread: ThreadId) -> bool {
        match self.owner {
            None => {
                self.owner = Some(thread);
                self.depth = 1;
                true
            }
            Some(owner) if owner == thread => {
                self.depth += 1;
                true
            }
            Some(_) => false,
        }
    }
}

/// Monitor state for one object.
#[derive(Debug, Default)]
pub struct SyncBlock {
    state: Mutex<MonitorState>,
    released: Condvar,
}

impl SyncBlock {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Blocks until `thread` owns the monitor or `deadline` passes.
    /// `None` waits forever.
    fn acquire(
        &self,
        thread: ThreadId,
        deadline: Option<Instant>,
        metrics: &RuntimeMetrics,
    ) -> bool {
        let mut state = self.state.lock();
        if state.claim(thread) {
            return true;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return false;
        }

        let started = Instant::now();
        state.waiters += 1;
        let acquired = loop {
            if state.claim(thread) {
                break true;
            }
            match deadline {
                None => self.released.wait(&mut state),
                Some(deadline) => {
                    if self.released.wait_until(&mut state, deadline).timed_out() {
                        break state.claim(thread);
                    }
                }
            }
        };
        state.waiters -= 1;
        metrics.record_lock_contention(started.elapsed());
        acquired
    }

    fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.owner.is_none() && state.waiters == 0
    }
}

impl SyncBlockOps for SyncBlock {
    fn try_enter(&self, thread_id: ThreadId) -> bool {
        self.state.lock().claim(thread_id)
    }

    fn enter(&self, thread_id: ThreadId, metrics: &RuntimeMetrics) {
        self.acquire(thread_id, None, metrics);
    }

    fn enter_with_timeout(
        &self,
        thread_id: ThreadId,
        timeout_ms: u64,
        metrics: &RuntimeMetrics,
    ) -> bool {
        // An unrepresentable deadline is as good as none.
        let deadline = Instant::now().checked_add(Duration::from_millis(timeout_ms));
        match deadline {
            Some(deadline) => self.acquire(thread_id, Some(deadline), metrics),
            None => self.acquire(thread_id, None, metrics),
        }
    }

    fn exit(&self, thread_id: ThreadId) -> bool {
        let mut state = self.state.lock();
        if state.owner != Some(thread_id) {
            return false;
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            if state.waiters > 0 {
                self.released.notify_one();
            }
        }
        true
    }

    fn is_held_by(&self, thread_id: ThreadId) -> bool {
        self.state.lock().owner == Some(thread_id)
    }
}

/// Sync blocks keyed by object address, which is an object's identity since
/// objects never move.
///
/// A block lives only while some thread owns it, waits on it, or holds a
/// handle to it; [`SyncManagerOps::release_if_idle`] drops it afterwards.
#[derive(Default)]
pub struct SyncBlockManager {
    blocks: DashMap<usize, Arc<SyncBlock>>,
}

impl SyncBlockManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncManagerOps for SyncBlockManager {
    type Block = SyncBlock;

    fn get_or_create_sync_block(&self, address: usize) -> Arc<SyncBlock> {
        self.blocks
            .entry(address)
            .or_insert_with(|| Arc::new(SyncBlock::new()))
            .clone()
    }

    fn get_sync_block(&self, address: usize) -> Option<Arc<SyncBlock>> {
        self.blocks.get(&address).map(|block| block.clone())
    }

    fn release_if_idle(&self, address: usize) -> bool {
        // Handles are only cloned under the shard lock `remove_if` holds, so a
        // count of one means no thread can still reach this block.
        self.blocks
            .remove_if(&address, |_, block| {
                Arc::strong_count(block) == 1 && block.is_idle()
            })
            .is_some()
    }

    fn len(&self) -> usize {
        self.blocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Barrier, thread};

    #[test]
    fn test_recursive_enter_and_exit() {
        let metrics = RuntimeMetrics::new(true);
        let block = SyncBlock::new();
        let me = ThreadId(1);
        block.enter(me, &metrics);
        assert!(block.try_enter(me));
        assert!(block.is_held_by(me));
        assert!(block.exit(me));
        assert!(block.is_held_by(me));
        assert!(block.exit(me));
        assert!(!block.is_held_by(me));
        assert!(!block.exit(me));
        assert!(block.is_idle());
    }

    #[test]
    fn test_other_thread_cannot_exit_or_enter() {
        let metrics = RuntimeMetrics::new(true);
        let block = SyncBlock::new();
        assert!(block.try_enter(ThreadId(1)));
        assert!(!block.try_enter(ThreadId(2)));
        assert!(!block.exit(ThreadId(2)));
        assert!(!block.enter_with_timeout(ThreadId(2), 0, &metrics));
        assert!(!block.enter_with_timeout(ThreadId(2), 20, &metrics));
        assert!(block.exit(ThreadId(1)));
        assert!(block.enter_with_timeout(ThreadId(2), 20, &metrics));
        assert!(block.is_held_by(ThreadId(2)));
    }

    #[test]
    fn test_huge_timeout_still_acquires_free_block() {
        let metrics = RuntimeMetrics::new(true);
        let block = SyncBlock::new();
        assert!(block.enter_with_timeout(ThreadId(1), u64::MAX, &metrics));
    }

    #[test]
    fn test_waiter_acquires_after_release() {
        let metrics = Arc::new(RuntimeMetrics::new(true));
        let block = Arc::new(SyncBlock::new());
        let barrier = Arc::new(Barrier::new(2));
        block.enter(ThreadId(1), &metrics);

        let waiter = {
            let (block, barrier, metrics) = (block.clone(), barrier.clone(), metrics.clone());
            thread::spawn(move || {
                barrier.wait();
                block.enter(ThreadId(2), &metrics);
                let held = block.is_held_by(ThreadId(2));
                block.exit(ThreadId(2));
                held
            })
        };

        barrier.wait();
        thread::sleep(Duration::from_millis(20));
        assert!(block.exit(ThreadId(1)));
        assert!(waiter.join().unwrap());
        assert!(block.is_idle());
    }

    #[test]
    fn test_manager_reuses_blocks() {
        let manager = SyncBlockManager::new();
        assert!(manager.get_sync_block(0x1000).is_none());
        let a = manager.get_or_create_sync_block(0x1000);
        let b = manager.get_or_create_sync_block(0x1000);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.len(), 1);
        assert!(manager.get_sync_block(0x1000).is_some());
    }

    #[test]
    fn test_manager_drops_idle_blocks() {
        let metrics = RuntimeMetrics::new(true);
        let manager = SyncBlockManager::new();
        manager
            .get_or_create_sync_block(0x1000)
            .enter(ThreadId(1), &metrics);

        // Owned: kept even with no outstanding handles.
        assert!(!manager.release_if_idle(0x1000));
        assert_eq!(manager.len(), 1);

        let block = manager.get_sync_block(0x1000).unwrap();
        assert!(block.exit(ThreadId(1)));
        // Unowned, but this test still holds a handle.
        assert!(!manager.release_if_idle(0x1000));
        drop(block);
        assert!(manager.release_if_idle(0x1000));
        assert!(manager.is_empty());
        assert!(!manager.release_if_idle(0x1000));
    }
}
