use crate::{
    error::{SyncError, VmError},
    state::Runtime,
    sync::{SyncBlockOps, SyncManagerOps},
};
use aotrt_utils::sync::get_current_thread_id;
use aotrt_value::{MemoryError, ObjectRef};
use tracing::{trace, warn};

impl Runtime {
    /// `Interlocked.CompareExchange(ref object, object, object)` on the
    /// reference field at `offset` of `object`.
    ///
    /// Stores `new` only if the field currently holds `comparand` and always
    /// returns the value observed before the operation.
    pub fn compare_exchange_reference(
        &self,
        object: ObjectRef<'_>,
        offset: usize,
        new: Option<ObjectRef<'_>>,
        comparand: Option<ObjectRef<'_>>,
    ) -> Result<Option<ObjectRef<'_>>, VmError> {
        let new_word = new.map_or(0, |o| o.address());
        let comparand_word = comparand.map_or(0, |o| o.address());
        let previous = object.compare_exchange_word(offset, new_word, comparand_word)?;
        trace!(
            "CompareExchange at {:#x}+{}: {:#x} (expected {:#x}, stored {})",
            object.address(),
            offset,
            previous,
            comparand_word,
            previous == comparand_word
        );
        if previous == 0 {
            return Ok(None);
        }
        self.heap
            .object_at(previous)
            .map(Some)
            .ok_or_else(|| MemoryError::InvalidReference(previous).into())
    }

    /// `Monitor.Enter`: blocks until the calling thread owns `object`'s monitor.
    pub fn monitor_enter(&self, object: ObjectRef<'_>) {
        let thread_id = get_current_thread_id();
        self.monitors
            .get_or_create_sync_block(object.address())
            .enter(thread_id, &self.metrics);
    }

    /// `Monitor.TryEnter`. A zero timeout never blocks.
    pub fn monitor_try_enter(&self, object: ObjectRef<'_>, timeout_ms: u64) -> bool {
        let thread_id = get_current_thread_id();
        let acquired = self
            .monitors
            .get_or_create_sync_block(object.address())
            .enter_with_timeout(thread_id, timeout_ms, &self.metrics);
        if !acquired {
            self.monitors.release_if_idle(object.address());
        }
        acquired
    }

    /// `Monitor.Exit`. Fails if the calling thread does not own the monitor.
    pub fn monitor_exit(&self, object: ObjectRef<'_>) -> Result<(), VmError> {
        let thread_id = get_current_thread_id();
        let released = self
            .monitors
            .get_sync_block(object.address())
            .is_some_and(|block| block.exit(thread_id));
        if released {
            self.monitors.release_if_idle(object.address());
            Ok(())
        } else {
            warn!("{} released a monitor it does not own on {:?}", thread_id, object);
            Err(SyncError::NotOwner { thread: thread_id }.into())
        }
    }

    /// `Monitor.IsEntered`: whether the calling thread owns `object`'s monitor.
    pub fn monitor_is_entered(&self, object: ObjectRef<'_>) -> bool {
        let thread_id = get_current_thread_id();
        self.monitors
            .get_sync_block(object.address())
            .is_some_and(|block| block.is_held_by(thread_id))
    }
}

#[cfg(test)]
mod tests {
    use crate::{error::SyncError, sync::SyncManagerOps, Runtime, RuntimeConfig, VmError};
    use aotrt_types::{FieldType, TypeDefinition, TypeHandle};
    use aotrt_utils::sync::{get_current_thread_id, Arc};
    use aotrt_value::MemoryError;
    use std::{sync::Barrier, thread, time::Duration};

    fn runtime_with_node() -> (Runtime, TypeHandle) {
        let (runtime, types) = Runtime::with_corlib(RuntimeConfig::default()).unwrap();
        let node = runtime
            .types()
            .define(
                TypeDefinition::class("Node")
                    .extends(types.object)
                    .field("next", FieldType::reference()),
            )
            .unwrap();
        (runtime, node)
    }

    #[test]
    fn test_compare_exchange_reference() {
        let (runtime, node) = runtime_with_node();
        let holder = runtime.allocate_object(node).unwrap();
        let a = runtime.allocate_object(node).unwrap();
        let b = runtime.allocate_object(node).unwrap();
        let next = holder.field_offset("next").unwrap();

        // null -> a succeeds and returns the old null.
        assert_eq!(
            runtime.compare_exchange_reference(holder, next, Some(a), None),
            Ok(None)
        );
        // Comparand mismatch: nothing stored, current value returned.
        assert_eq!(
            runtime.compare_exchange_reference(holder, next, Some(b), None),
            Ok(Some(a))
        );
        assert_eq!(holder.read_word(next).unwrap(), a.address());
        // a -> b succeeds.
        assert_eq!(
            runtime.compare_exchange_reference(holder, next, Some(b), Some(a)),
            Ok(Some(a))
        );
        assert_eq!(holder.read_word(next).unwrap(), b.address());
    }

    #[test]
    fn test_compare_exchange_rejects_foreign_values() {
        let (runtime, node) = runtime_with_node();
        let holder = runtime.allocate_object(node).unwrap();
        let next = holder.field_offset("next").unwrap();
        holder.write_bytes(next, &0x10usize.to_ne_bytes()).unwrap();
        assert_eq!(
            runtime.compare_exchange_reference(holder, next, None, None),
            Err(VmError::Memory(MemoryError::InvalidReference(0x10)))
        );
        assert!(matches!(
            runtime.compare_exchange_reference(holder, 0, None, None),
            Err(VmError::Memory(MemoryError::HeaderWrite(0)))
        ));
    }

    #[test]
    fn test_compare_exchange_has_one_winner() {
        let (runtime, node) = runtime_with_node();
        let runtime = Arc::new(runtime);
        let holder = runtime.allocate_object(node).unwrap().address();
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let (runtime, barrier) = (runtime.clone(), barrier.clone());
                thread::spawn(move || {
                    let holder = runtime.heap().object_at(holder).unwrap();
                    let mine = runtime.allocate_object(node).unwrap();
                    let next = holder.field_offset("next").unwrap();
                    barrier.wait();
                    let previous = runtime
                        .compare_exchange_reference(holder, next, Some(mine), None)
                        .unwrap();
                    previous.is_none()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_monitor_is_reentrant() {
        let (runtime, node) = runtime_with_node();
        let obj = runtime.allocate_object(node).unwrap();
        assert!(!runtime.monitor_is_entered(obj));
        runtime.monitor_enter(obj);
        assert!(runtime.monitor_try_enter(obj, 0));
        assert!(runtime.monitor_is_entered(obj));
        runtime.monitor_exit(obj).unwrap();
        assert!(runtime.monitor_is_entered(obj));
        runtime.monitor_exit(obj).unwrap();
        assert!(!runtime.monitor_is_entered(obj));
        assert!(runtime.monitors.is_empty());
        assert_eq!(
            runtime.monitor_exit(obj),
            Err(VmError::Sync(SyncError::NotOwner {
                thread: get_current_thread_id()
            }))
        );
    }

    #[test]
    fn test_monitor_excludes_other_threads() {
        let (runtime, node) = runtime_with_node();
        let runtime = Arc::new(runtime);
        let address = runtime.allocate_object(node).unwrap().address();
        let obj = runtime.heap().object_at(address).unwrap();
        runtime.monitor_enter(obj);

        let barrier = Arc::new(Barrier::new(2));
        let contender = {
            let (runtime, barrier) = (runtime.clone(), barrier.clone());
            thread::spawn(move || {
                let obj = runtime.heap().object_at(address).unwrap();
                let early = runtime.monitor_try_enter(obj, 10);
                let exit_without_owning = runtime.monitor_exit(obj).is_err();
                barrier.wait();
                let late = runtime.monitor_try_enter(obj, 5_000);
                if late {
                    runtime.monitor_exit(obj).unwrap();
                }
                (early, exit_without_owning, late)
            })
        };

        barrier.wait();
        thread::sleep(Duration::from_millis(10));
        runtime.monitor_exit(obj).unwrap();
        let (early, exit_without_owning, late) = contender.join().unwrap();
        assert!(!early);
        assert!(exit_without_owning);
        assert!(late);
        assert!(runtime.monitors.is_empty());
    }

    #[test]
    fn test_monitor_blocks_do_not_accumulate() {
        let (runtime, node) = runtime_with_node();
        for _ in 0..16 {
            let obj = runtime.allocate_object(node).unwrap();
            runtime.monitor_enter(obj);
            assert_eq!(runtime.monitors.len(), 1);
            runtime.monitor_exit(obj).unwrap();
        }
        assert!(runtime.monitors.is_empty());
    }
}
