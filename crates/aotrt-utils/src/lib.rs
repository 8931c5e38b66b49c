//! # aotrt-utils
//!
//! Shared utilities for the aotrt workspace: synchronization re-exports,
//! raw atomic access, the runtime thread id and alignment helpers.
use std::mem::align_of;

pub mod atomic;
pub mod newtypes;
pub mod sync;

pub use newtypes::ThreadId;

pub const POINTER_SIZE: usize = std::mem::size_of::<usize>();

pub fn align_up(value: usize, align: usize) -> usize {
    let misalignment = value % align;
    if misalignment == 0 {
        value
    } else {
        value + align - misalignment
    }
}

/// Like [`align_up`], but reports overflow instead of wrapping.
pub fn checked_align_up(value: usize, align: usize) -> Option<usize> {
    let misalignment = value % align;
    if misalignment == 0 {
        Some(value)
    } else {
        value.checked_add(align - misalignment)
    }
}

pub fn is_ptr_aligned_to_field(ptr: *const u8, field_size: usize) -> bool {
    match field_size {
        0 | 1 => true,
        2 => (ptr as usize) % align_of::<u16>() == 0,
        4 => (ptr as usize) % align_of::<u32>() == 0,
        8 => (ptr as usize) % align_of::<u64>() == 0,
        _ => (ptr as usize) % field_size == 0,
    }
}

#[cfg(feature = "memory-validation")]
pub fn validate_alignment(ptr: *const u8, align: usize) {
    if (ptr as usize) % align != 0 {
        panic!(
            "Alignment violation: pointer {:p} is not aligned to {}",
            ptr, align
        );
    }
}

#[cfg(not(feature = "memory-validation"))]
#[inline(always)]
pub fn validate_alignment(_ptr: *const u8, _align: usize) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 8), 8);
        assert_eq!(align_up(8, 8), 8);
        assert_eq!(align_up(13, 4), 16);
    }

    #[test]
    fn test_checked_align_up_overflow() {
        assert_eq!(checked_align_up(usize::MAX, 8), None);
        assert_eq!(checked_align_up(usize::MAX - 7, 8), Some(usize::MAX - 7));
    }

    #[test]
    fn test_field_alignment() {
        let word = 0usize;
        let ptr = &word as *const usize as *const u8;
        assert!(is_ptr_aligned_to_field(ptr, 1));
        assert!(is_ptr_aligned_to_field(ptr, POINTER_SIZE));
        assert!(!is_ptr_aligned_to_field(ptr.wrapping_add(1), 2));
    }
}
