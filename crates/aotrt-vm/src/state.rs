use crate::{
    config::RuntimeConfig,
    error::VmError,
    memory::HeapManager,
    metrics::{MetricsSnapshot, RuntimeMetrics},
    sync::SyncBlockManager,
};
use aotrt_types::{
    corlib::{self, CorlibTypes},
    TypeDescriptor, TypeHandle, TypeTable,
};
use aotrt_utils::sync::Arc;
use tracing::info;

/// Everything compiled code calls into: the loaded types, the heap that
/// holds their instances and the per-object monitors.
///
/// All entry points take `&self`, so a `Runtime` can be shared between
/// threads behind an `Arc`.
pub struct Runtime {
    pub(crate) types: Arc<TypeTable>,
    pub(crate) heap: HeapManager,
    pub(crate) monitors: SyncBlockManager,
    pub(crate) metrics: RuntimeMetrics,
    pub(crate) config: RuntimeConfig,
}

impl Runtime {
    pub fn new(types: Arc<TypeTable>, config: RuntimeConfig) -> Self {
        Self {
            heap: HeapManager::new(config.max_object_size),
            monitors: SyncBlockManager::new(),
            metrics: RuntimeMetrics::new(config.metrics),
            types,
            config,
        }
    }

    /// A runtime over a fresh table holding only the core library types.
    pub fn with_corlib(config: RuntimeConfig) -> Result<(Self, CorlibTypes), VmError> {
        let types = Arc::new(TypeTable::new());
        let corlib = corlib::bootstrap(&types)?;
        info!("Runtime initialized with {} core types", types.len());
        Ok((Self::new(types, config), corlib))
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn shared_types(&self) -> Arc<TypeTable> {
        self.types.clone()
    }

    pub fn heap(&self) -> &HeapManager {
        &self.heap
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn metrics(&self) -> &RuntimeMetrics {
        &self.metrics
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.types.array_cache_stats())
    }

    pub fn descriptor(&self, handle: TypeHandle) -> Result<&'static TypeDescriptor, VmError> {
        Ok(self.types.get(handle)?)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Arc::new(TypeTable::new()), RuntimeConfig::default())
    }
}
