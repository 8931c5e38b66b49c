use crate::metrics::RuntimeMetrics;
use aotrt_utils::{sync::Arc, ThreadId};

mod threaded;

pub use threaded::*;

/// A re-entrant monitor attached to one heap object.
pub trait SyncBlockOps {
    fn try_enter(&self, thread_id: ThreadId) -> bool;
    fn enter(&self, thread_id: ThreadId, metrics: &RuntimeMetrics);
    fn enter_with_timeout(&self, thread_id: ThreadId, timeout_ms: u64, metrics: &RuntimeMetrics)
        -> bool;
    /// Releases one level of ownership. Returns `false` if `thread_id` does not own the block.
    fn exit(&self, thread_id: ThreadId) -> bool;
    fn is_held_by(&self, thread_id: ThreadId) -> bool;
}

pub trait SyncManagerOps {
    type Block: SyncBlockOps;

    /// The block for the object at `address`, created on first use.
    fn get_or_create_sync_block(&self, address: usize) -> Arc<Self::Block>;

    fn get_sync_block(&self, address: usize) -> Option<Arc<Self::Block>>;

    /// Forgets the block at `address` if no thread owns, waits on, or holds
    /// it. Returns whether it was dropped.
    fn release_if_idle(&self, address: usize) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
