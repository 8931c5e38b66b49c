use crate::{error::MemoryError, object::ObjectRef};
use aotrt_types::{layout::ARRAY_DATA_OFFSET, TypeHandle};
use std::{
    fmt::{self, Debug, Formatter},
    ops::Range,
};

/// An [`ObjectRef`] known to point at a single-dimensional, zero-based array.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ArrayRef<'heap>(ObjectRef<'heap>);

impl<'heap> TryFrom<ObjectRef<'heap>> for ArrayRef<'heap> {
    type Error = MemoryError;

    fn try_from(object: ObjectRef<'heap>) -> Result<Self, Self::Error> {
        if object.is_array() {
            Ok(Self(object))
        } else {
            Err(MemoryError::NotAnArray(object.descriptor().name.clone()))
        }
    }
}

impl<'heap> From<ArrayRef<'heap>> for ObjectRef<'heap> {
    fn from(array: ArrayRef<'heap>) -> Self {
        array.0
    }
}

impl<'heap> ArrayRef<'heap> {
    pub fn as_object(self) -> ObjectRef<'heap> {
        self.0
    }

    pub fn len(self) -> usize {
        self.0.raw_array_length()
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    pub fn element_size(self) -> usize {
        self.0.descriptor().element_size as usize
    }

    pub fn element_type(self) -> Option<TypeHandle> {
        self.0.descriptor().element_type()
    }

    /// Size of the element buffer in bytes.
    pub fn byte_len(self) -> usize {
        self.len() * self.element_size()
    }

    pub fn data_ptr(self) -> *mut u8 {
        // SAFETY: every array block extends at least to the data offset.
        unsafe { self.0.as_ptr().add(ARRAY_DATA_OFFSET) }
    }

    /// Byte range, relative to the element buffer, covering `count` elements
    /// starting at `start`.
    pub fn element_range(self, start: usize, count: usize) -> Result<Range<usize>, MemoryError> {
        let length = self.len();
        let end = start
            .checked_add(count)
            .filter(|&end| end <= length)
            .ok_or(MemoryError::IndexOutOfRange {
                index: start.saturating_add(count),
                length,
            })?;
        let size = self.element_size();
        Ok(start * size..end * size)
    }

    /// Object-relative offset of element `index`.
    pub fn element_offset(self, index: usize) -> Result<usize, MemoryError> {
        let range = self.element_range(index, 1).map_err(|_| MemoryError::IndexOutOfRange {
            index,
            length: self.len(),
        })?;
        Ok(ARRAY_DATA_OFFSET + range.start)
    }

    pub fn read_element(self, index: usize, out: &mut [u8]) -> Result<(), MemoryError> {
        self.check_element_size(out.len())?;
        self.0.read_bytes(self.element_offset(index)?, out)
    }

    pub fn write_element(self, index: usize, value: &[u8]) -> Result<(), MemoryError> {
        self.check_element_size(value.len())?;
        self.0.write_bytes(self.element_offset(index)?, value)
    }

    fn check_element_size(self, actual: usize) -> Result<(), MemoryError> {
        let expected = self.element_size();
        if actual == expected {
            Ok(())
        } else {
            Err(MemoryError::SizeMismatch { expected, actual })
        }
    }
}

impl Debug for ArrayRef<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ArrayRef({} @ {:#x}, len {})",
            self.0.descriptor().name,
            self.0.address(),
            self.len()
        )
    }
}
