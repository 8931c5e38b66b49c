use crate::{error::VmError, state::Runtime};
use aotrt_types::TypeHandle;
use aotrt_value::{ArrayRef, MemoryError};
use std::ptr;
use tracing::{debug, trace};

/// Checks that `offset..offset + count` lies inside a buffer of `length` bytes.
fn check_byte_range(offset: usize, count: usize, length: usize) -> Result<(), MemoryError> {
    match offset.checked_add(count) {
        Some(end) if end <= length => Ok(()),
        end => Err(MemoryError::IndexOutOfRange {
            index: end.unwrap_or(usize::MAX),
            length,
        }),
    }
}

fn check_dimension(dimension: usize) -> Result<(), VmError> {
    if dimension == 0 {
        Ok(())
    } else {
        Err(VmError::Unsupported(format!(
            "dimension {} of a single-dimensional array",
            dimension
        )))
    }
}

impl Runtime {
    /// Allocates a zeroed array of `length` elements of `element`, creating
    /// the canonical array type on first use.
    pub fn allocate_array(
        &self,
        element: TypeHandle,
        length: usize,
    ) -> Result<ArrayRef<'_>, VmError> {
        let array_type = self.descriptor(self.types.get_array_type(element)?)?;
        let array = self.heap.allocate_array(array_type, length)?;
        self.metrics
            .record_allocation(array.as_object().byte_size(), true);
        Ok(array)
    }

    /// `Array.CreateInstance`. Only single-dimensional, zero-based arrays exist.
    pub fn create_instance(
        &self,
        element: TypeHandle,
        lengths: &[i64],
        lower_bounds: Option<&[i64]>,
    ) -> Result<ArrayRef<'_>, VmError> {
        if lower_bounds.is_some() {
            return Err(VmError::Unsupported(
                "arrays with explicit lower bounds".to_string(),
            ));
        }
        let length = match lengths {
            [length] => *length,
            _ => {
                return Err(VmError::Unsupported(format!(
                    "arrays of rank {}",
                    lengths.len()
                )))
            }
        };
        let length = usize::try_from(length)
            .map_err(|_| VmError::ArgumentOutOfRange(format!("array length {}", length)))?;
        self.allocate_array(element, length)
    }

    /// Zero-fills `count` elements starting at `start`.
    pub fn clear_array_range(
        &self,
        array: ArrayRef<'_>,
        start: usize,
        count: usize,
    ) -> Result<(), VmError> {
        let range = array.element_range(start, count)?;
        trace!("Clearing bytes {:?} of {:?}", range, array);
        // SAFETY: `range` was checked against the element buffer.
        unsafe { ptr::write_bytes(array.data_ptr().add(range.start), 0, range.len()) };
        Ok(())
    }

    /// Copies `count` elements between two arrays of compatible element types.
    ///
    /// The byte count is derived from the source element size. Returns `false`
    /// without copying anything if either range is out of bounds.
    pub fn copy_array_range(
        &self,
        source: ArrayRef<'_>,
        source_index: usize,
        dest: ArrayRef<'_>,
        dest_index: usize,
        count: usize,
    ) -> bool {
        let Ok(source_range) = source.element_range(source_index, count) else {
            return false;
        };
        if dest.element_range(dest_index, count).is_err() {
            return false;
        }
        let Some(dest_start) = dest_index.checked_mul(source.element_size()) else {
            return false;
        };
        if check_byte_range(dest_start, source_range.len(), dest.byte_len()).is_err() {
            return false;
        }
        // SAFETY: both byte ranges were checked; `ptr::copy` tolerates overlap.
        unsafe {
            ptr::copy(
                source.data_ptr().add(source_range.start),
                dest.data_ptr().add(dest_start),
                source_range.len(),
            );
        }
        true
    }

    /// `Buffer.BlockCopy`: byte-granular copy between element buffers.
    /// Overlapping ranges behave like `memmove`.
    pub fn block_copy(
        &self,
        source: ArrayRef<'_>,
        source_offset: usize,
        dest: ArrayRef<'_>,
        dest_offset: usize,
        count: usize,
    ) -> Result<(), VmError> {
        check_byte_range(source_offset, count, source.byte_len())?;
        check_byte_range(dest_offset, count, dest.byte_len())?;
        // SAFETY: both byte ranges were checked above.
        unsafe {
            ptr::copy(
                source.data_ptr().add(source_offset),
                dest.data_ptr().add(dest_offset),
                count,
            );
        }
        Ok(())
    }

    pub fn get_length(&self, array: ArrayRef<'_>, dimension: usize) -> Result<usize, VmError> {
        check_dimension(dimension)?;
        Ok(array.len())
    }

    pub fn get_rank(&self, _array: ArrayRef<'_>) -> usize {
        1
    }

    pub fn get_lower_bound(&self, _array: ArrayRef<'_>, dimension: usize) -> Result<i64, VmError> {
        check_dimension(dimension)?;
        Ok(0)
    }

    /// `RuntimeHelpers.InitializeArray`: fills `array` from a static data blob
    /// that must cover the element buffer exactly.
    pub fn initialize_array(&self, array: ArrayRef<'_>, data: &[u8]) -> Result<(), VmError> {
        let expected = array.byte_len();
        if data.len() != expected {
            return Err(MemoryError::SizeMismatch {
                expected,
                actual: data.len(),
            }
            .into());
        }
        debug!("Initializing {:?} from {} bytes of static data", array, expected);
        // SAFETY: `data` is exactly as long as the element buffer.
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), array.data_ptr(), expected) };
        Ok(())
    }
}
