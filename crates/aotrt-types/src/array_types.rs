//! Canonical single-dimensional array types.
//!
//! Descriptor identity is type identity, so the cache must never hand out two
//! descriptors for the same element type. Creation happens under the map's
//! per-key entry lock: the first caller builds and publishes the descriptor,
//! and every racing caller blocks on the entry and then reads the published
//! handle.
use crate::{descriptor::TypeHandle, error::TypeLoadError, table::TypeTable};
use aotrt_utils::sync::{AtomicU64, Ordering};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct CacheStat {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
}

impl CacheStat {
    pub fn new(hits: u64, misses: u64, size: usize) -> Self {
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };
        Self {
            hits,
            misses,
            hit_rate,
            size,
        }
    }
}

impl std::fmt::Display for CacheStat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "hits: {:>8}, misses: {:>8}, hit_rate: {:>6.2}%, size: {:>8}",
            self.hits,
            self.misses,
            self.hit_rate * 100.0,
            self.size
        )
    }
}

#[derive(Default)]
pub struct ArrayTypeCache {
    /// element type -> array type
    entries: DashMap<TypeHandle, TypeHandle>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ArrayTypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(
        &self,
        table: &TypeTable,
        element: TypeHandle,
    ) -> Result<TypeHandle, TypeLoadError> {
        if let Some(existing) = self.entries.get(&element) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(*existing);
        }

        match self.entries.entry(element) {
            Entry::Occupied(published) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(*published.get())
            }
            Entry::Vacant(slot) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let array = table.register_array(element)?;
                debug!("Created array type {} for element {}", array, element);
                slot.insert(array);
                Ok(array)
            }
        }
    }

    pub fn get(&self, element: TypeHandle) -> Option<TypeHandle> {
        self.entries.get(&element).map(|entry| *entry)
    }

    pub fn stats(&self) -> CacheStat {
        CacheStat::new(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.entries.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        corlib,
        definition::TypeDefinition,
        descriptor::TypeKind,
        layout::{ARRAY_DATA_OFFSET, Scalar},
    };
    use aotrt_utils::{sync::Arc, POINTER_SIZE};
    use std::thread;

    #[test]
    fn test_array_type_is_canonical() {
        let table = TypeTable::new();
        let types = corlib::bootstrap(&table).unwrap();
        let first = table.get_array_type(types.int32).unwrap();
        let second = table.get_array_type(types.int32).unwrap();
        assert_eq!(first, second);
        assert!(std::ptr::eq(table.get(first).unwrap(), table.get(second).unwrap()));

        let stats = table.array_cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_array_descriptor_shape() {
        let table = TypeTable::new();
        let types = corlib::bootstrap(&table).unwrap();
        let point = table
            .define(
                TypeDefinition::value_type("Point")
                    .extends(types.value_type)
                    .field("x", Scalar::Int32)
                    .field("y", Scalar::Int32),
            )
            .unwrap();

        let ints = table.get(table.get_array_type(types.int32).unwrap()).unwrap();
        assert_eq!(ints.name, "System.Int32[]");
        assert_eq!(ints.kind, TypeKind::Array { element: types.int32 });
        assert_eq!(ints.element_size, 4);
        assert_eq!(ints.object_size as usize, ARRAY_DATA_OFFSET);
        assert_eq!(ints.base_type, Some(types.array));

        let points = table.get(table.get_array_type(point).unwrap()).unwrap();
        assert_eq!(points.element_size, 8);

        let objects = table.get(table.get_array_type(types.object).unwrap()).unwrap();
        assert_eq!(objects.element_size as usize, POINTER_SIZE);

        let jagged = table.get(table.get_array_type(objects.handle).unwrap()).unwrap();
        assert_eq!(jagged.name, "System.Object[][]");
        assert_eq!(jagged.element_size as usize, POINTER_SIZE);
    }

    #[test]
    fn test_array_base_falls_back_to_root() {
        let table = TypeTable::new();
        let root = table.define(TypeDefinition::class("Root")).unwrap();
        let array = table.get(table.get_array_type(root).unwrap()).unwrap();
        assert_eq!(array.base_type, Some(root));
    }

    #[test]
    fn test_array_of_unknown_element_fails() {
        let table = TypeTable::new();
        table.define(TypeDefinition::class("Root")).unwrap();
        assert_eq!(
            table.get_array_type(TypeHandle(42)),
            Err(TypeLoadError::UnknownHandle(TypeHandle(42)))
        );
        assert_eq!(table.array_cache_stats().size, 0);
    }

    #[test]
    fn test_concurrent_first_requests_converge() {
        let table = Arc::new(TypeTable::new());
        let types = corlib::bootstrap(&table).unwrap();
        let before = table.len();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    [types.int64, types.double, types.object]
                        .map(|element| table.get_array_type(element).unwrap())
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(results.iter().all(|r| *r == results[0]));
        assert_eq!(table.len(), before + 3);
        assert_eq!(table.array_cache_stats().misses, 3);
    }
}
