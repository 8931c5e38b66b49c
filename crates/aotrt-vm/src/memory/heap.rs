use crate::error::AllocationError;
use aotrt_types::{layout::ARRAY_DATA_OFFSET, layout::ARRAY_LENGTH_OFFSET, TypeDescriptor};
use aotrt_utils::sync::{AtomicUsize, Mutex, Ordering};
use aotrt_value::{ArrayRef, ObjectRef};
use std::{
    alloc::{alloc, alloc_zeroed, dealloc, Layout},
    collections::BTreeMap,
    mem::align_of,
    ptr::{self, NonNull},
};
use tracing::{trace, warn};

/// Owns every block handed out as an [`ObjectRef`].
///
/// There is no collector: blocks stay allocated until the heap is dropped.
/// The block registry is keyed by start address, which lets interior
/// pointers be mapped back to their object.
pub struct HeapManager {
    blocks: Mutex<BTreeMap<usize, Layout>>,
    live_bytes: AtomicUsize,
    max_object_size: usize,
}

impl HeapManager {
    pub fn new(max_object_size: usize) -> Self {
        Self {
            blocks: Mutex::new(BTreeMap::new()),
            live_bytes: AtomicUsize::new(0),
            max_object_size,
        }
    }

    fn allocate_block(&self, size: usize, zeroed: bool) -> Result<NonNull<u8>, AllocationError> {
        if size > self.max_object_size {
            warn!(
                "Refusing allocation of {} bytes (limit {})",
                size, self.max_object_size
            );
            return Err(AllocationError::ExceedsLimit {
                size,
                limit: self.max_object_size,
            });
        }
        let layout = Layout::from_size_align(size, align_of::<usize>())
            .map_err(|_| AllocationError::SizeOverflow)?;
        // SAFETY: every block holds at least a header, so `layout` is never zero-sized.
        let raw = unsafe {
            if zeroed {
                alloc_zeroed(layout)
            } else {
                alloc(layout)
            }
        };
        let block = NonNull::new(raw).ok_or(AllocationError::OutOfMemory { size })?;
        self.blocks.lock().insert(block.as_ptr() as usize, layout);
        self.live_bytes.fetch_add(size, Ordering::Relaxed);
        Ok(block)
    }

    /// Allocates a zero-filled instance of `descriptor` with its header set.
    pub fn allocate_object(
        &self,
        descriptor: &'static TypeDescriptor,
    ) -> Result<ObjectRef<'_>, AllocationError> {
        if !descriptor.is_instantiable() {
            return Err(AllocationError::InvalidAllocation(descriptor.name.clone()));
        }
        let size = descriptor.object_size as usize;
        let block = self.allocate_block(size, true)?;
        trace!("Allocated {} ({} bytes) at {:p}", descriptor.name, size, block);
        // SAFETY: fresh, pointer-aligned block of `object_size` bytes.
        unsafe {
            (block.as_ptr() as *mut &'static TypeDescriptor).write(descriptor);
            Ok(ObjectRef::from_raw(block))
        }
    }

    /// Allocates a zero-filled array whose type is `array_type`.
    pub fn allocate_array(
        &self,
        array_type: &'static TypeDescriptor,
        length: usize,
    ) -> Result<ArrayRef<'_>, AllocationError> {
        if !array_type.is_array() {
            return Err(AllocationError::InvalidAllocation(array_type.name.clone()));
        }
        let stored_length = u32::try_from(length).map_err(|_| AllocationError::SizeOverflow)?;
        let size = length
            .checked_mul(array_type.element_size as usize)
            .and_then(|bytes| bytes.checked_add(ARRAY_DATA_OFFSET))
            .ok_or(AllocationError::SizeOverflow)?;
        let block = self.allocate_block(size, true)?;
        trace!(
            "Allocated {} of length {} ({} bytes) at {:p}",
            array_type.name,
            length,
            size,
            block
        );
        // SAFETY: fresh block large enough for the header, length and elements.
        let object = unsafe {
            (block.as_ptr() as *mut &'static TypeDescriptor).write(array_type);
            (block.as_ptr().add(ARRAY_LENGTH_OFFSET) as *mut u32).write(stored_length);
            ObjectRef::from_raw(block)
        };
        // The descriptor was checked above, so the view cannot fail.
        ArrayRef::try_from(object)
            .map_err(|_| AllocationError::InvalidAllocation(array_type.name.clone()))
    }

    /// Shallow byte-for-byte copy of `source`, header included.
    pub fn clone_object(&self, source: ObjectRef<'_>) -> Result<ObjectRef<'_>, AllocationError> {
        let size = source.byte_size();
        let block = self.allocate_block(size, false)?;
        // SAFETY: both blocks are `size` bytes and distinct.
        unsafe {
            ptr::copy_nonoverlapping(source.as_ptr(), block.as_ptr(), size);
            Ok(ObjectRef::from_raw(block))
        }
    }

    /// The object whose block contains `address`, if any.
    pub fn find_object(&self, address: usize) -> Option<ObjectRef<'_>> {
        let blocks = self.blocks.lock();
        let (&start, layout) = blocks.range(..=address).next_back()?;
        if address < start + layout.size() {
            // SAFETY: `start` is a live block created by this heap.
            Some(unsafe { ObjectRef::from_raw(NonNull::new(start as *mut u8)?) })
        } else {
            None
        }
    }

    /// The object starting exactly at `address`, if any.
    pub fn object_at(&self, address: usize) -> Option<ObjectRef<'_>> {
        self.find_object(address)
            .filter(|object| object.address() == address)
    }

    pub fn live_objects(&self) -> usize {
        self.blocks.lock().len()
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Relaxed)
    }
}

impl Drop for HeapManager {
    fn drop(&mut self) {
        let blocks = std::mem::take(self.blocks.get_mut());
        for (start, layout) in blocks {
            // SAFETY: each entry was produced by `alloc`/`alloc_zeroed` with this layout.
            unsafe { dealloc(start as *mut u8, layout) };
        }
    }
}
