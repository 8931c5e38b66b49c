use crate::error::MemoryError;
use aotrt_types::{
    layout::{ARRAY_DATA_OFFSET, ARRAY_LENGTH_OFFSET, HEADER_SIZE},
    TypeDescriptor, TypeHandle,
};
use aotrt_utils::{
    atomic::{Atomic, AtomicAccess, StandardAtomicAccess},
    sync::Ordering,
    validate_alignment, POINTER_SIZE,
};
use std::{
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
    ptr::{self, NonNull},
};

/// A reference to a live heap object.
///
/// The first word of the block is the object's `&'static TypeDescriptor`,
/// written once at allocation and never changed afterwards. `'heap` ties the
/// reference to the allocator that owns the block.
#[derive(Copy, Clone)]
pub struct ObjectRef<'heap> {
    ptr: NonNull<u8>,
    _marker: PhantomData<&'heap ()>,
}

// SAFETY: the header is immutable after allocation and every field access
// goes through bounds-checked, atomic-where-possible reads and writes.
unsafe impl Send for ObjectRef<'_> {}
unsafe impl Sync for ObjectRef<'_> {}

impl<'heap> ObjectRef<'heap> {
    /// # Safety
    ///
    /// `ptr` must point to a pointer-aligned block that stays allocated for
    /// `'heap`, whose first word is a valid `&'static TypeDescriptor`, and
    /// which is at least as large as that descriptor (and, for arrays, the
    /// stored length) requires.
    pub unsafe fn from_raw(ptr: NonNull<u8>) -> Self {
        validate_alignment(ptr.as_ptr(), POINTER_SIZE);
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    pub fn as_ptr(self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn address(self) -> usize {
        self.ptr.as_ptr() as usize
    }

    pub fn ptr_eq(self, other: ObjectRef<'_>) -> bool {
        self.address() == other.address()
    }

    pub fn descriptor(self) -> &'static TypeDescriptor {
        // SAFETY: guaranteed by `from_raw`.
        unsafe { ptr::read(self.ptr.as_ptr() as *const &'static TypeDescriptor) }
    }

    pub fn type_handle(self) -> TypeHandle {
        self.descriptor().handle
    }

    pub fn is_array(self) -> bool {
        self.descriptor().is_array()
    }

    /// Element count of an array object. The caller has checked `is_array`.
    pub(crate) fn raw_array_length(self) -> usize {
        // SAFETY: array blocks always extend past the length word.
        unsafe { ptr::read(self.ptr.as_ptr().add(ARRAY_LENGTH_OFFSET) as *const u32) as usize }
    }

    /// Total size of the block, header included.
    pub fn byte_size(self) -> usize {
        let descriptor = self.descriptor();
        if descriptor.is_array() {
            ARRAY_DATA_OFFSET + self.raw_array_length() * descriptor.element_size as usize
        } else {
            descriptor.object_size as usize
        }
    }

    /// First offset that compiled code may write through field accessors.
    fn first_writable_offset(self) -> usize {
        if self.is_array() {
            ARRAY_DATA_OFFSET
        } else {
            HEADER_SIZE
        }
    }

    fn check_range(self, offset: usize, len: usize) -> Result<(), MemoryError> {
        let size = self.byte_size();
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(()),
            _ => Err(MemoryError::AccessViolation { offset, len, size }),
        }
    }

    fn check_writable(self, offset: usize, len: usize) -> Result<(), MemoryError> {
        self.check_range(offset, len)?;
        if offset < self.first_writable_offset() {
            return Err(MemoryError::HeaderWrite(offset));
        }
        Ok(())
    }

    pub fn read_bytes(self, offset: usize, out: &mut [u8]) -> Result<(), MemoryError> {
        self.check_range(offset, out.len())?;
        // SAFETY: range checked above.
        unsafe { Atomic::load_field(self.ptr.as_ptr().add(offset), out, Ordering::Acquire) };
        Ok(())
    }

    pub fn write_bytes(self, offset: usize, value: &[u8]) -> Result<(), MemoryError> {
        self.check_writable(offset, value.len())?;
        // SAFETY: range checked above.
        unsafe { Atomic::store_field(self.ptr.as_ptr().add(offset), value, Ordering::Release) };
        Ok(())
    }

    pub fn read_i32(self, offset: usize) -> Result<i32, MemoryError> {
        let mut buf = [0u8; 4];
        self.read_bytes(offset, &mut buf)?;
        Ok(i32::from_ne_bytes(buf))
    }

    pub fn write_i32(self, offset: usize, value: i32) -> Result<(), MemoryError> {
        self.write_bytes(offset, &value.to_ne_bytes())
    }

    pub fn read_i64(self, offset: usize) -> Result<i64, MemoryError> {
        let mut buf = [0u8; 8];
        self.read_bytes(offset, &mut buf)?;
        Ok(i64::from_ne_bytes(buf))
    }

    pub fn write_i64(self, offset: usize, value: i64) -> Result<(), MemoryError> {
        self.write_bytes(offset, &value.to_ne_bytes())
    }

    /// Reads a pointer-sized word, e.g. the raw address held by a reference field.
    pub fn read_word(self, offset: usize) -> Result<usize, MemoryError> {
        let mut buf = [0u8; POINTER_SIZE];
        self.read_bytes(offset, &mut buf)?;
        Ok(usize::from_ne_bytes(buf))
    }

    /// Stores `value` (or null) into the reference field at `offset`.
    pub fn write_ref(self, offset: usize, value: Option<ObjectRef<'_>>) -> Result<(), MemoryError> {
        let word = value.map_or(0, |v| v.address());
        self.write_bytes(offset, &word.to_ne_bytes())
    }

    /// Atomic compare-and-swap of the pointer-sized word at `offset`.
    ///
    /// Returns the value observed before the operation, whether or not the
    /// new value was stored.
    pub fn compare_exchange_word(
        self,
        offset: usize,
        new: usize,
        comparand: usize,
    ) -> Result<usize, MemoryError> {
        self.check_writable(offset, POINTER_SIZE)?;
        if offset % POINTER_SIZE != 0 {
            return Err(MemoryError::Misaligned {
                offset,
                align: POINTER_SIZE,
            });
        }
        // SAFETY: in bounds and aligned, since the block itself is pointer-aligned.
        let observed = unsafe {
            StandardAtomicAccess::compare_exchange_word(
                self.ptr.as_ptr().add(offset),
                comparand,
                new,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
        };
        Ok(observed.unwrap_or_else(|current| current))
    }

    /// Byte offset of a named instance field, accounting for the box header
    /// in front of value-type payloads.
    pub fn field_offset(self, name: &str) -> Result<usize, MemoryError> {
        let descriptor = self.descriptor();
        let field = descriptor
            .layout
            .get_field(name)
            .ok_or_else(|| MemoryError::UnknownField {
                ty: descriptor.name.clone(),
                field: name.to_string(),
            })?;
        if descriptor.is_value_type() {
            Ok(HEADER_SIZE + field.position)
        } else {
            Ok(field.position)
        }
    }
}

impl Debug for ObjectRef<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({} @ {:#x})", self.descriptor().name, self.address())
    }
}

impl PartialEq for ObjectRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(*other)
    }
}

impl Eq for ObjectRef<'_> {}
