use crate::{is_ptr_aligned_to_field, sync::Ordering};
use std::{
    ptr,
    sync::atomic::{AtomicU16, AtomicU32, AtomicU64, AtomicU8, AtomicUsize},
};

#[cfg(feature = "memory-validation")]
use std::{cell::RefCell, collections::HashSet};

#[cfg(feature = "memory-validation")]
thread_local! {
    static ATOMIC_LOCATIONS: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
    static NON_ATOMIC_LOCATIONS: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

#[cfg(feature = "memory-validation")]
pub fn validate_atomic_access(ptr: *const u8, is_atomic: bool) {
    let address = ptr as usize;
    let (seen_as, record_in) = if is_atomic {
        (&NON_ATOMIC_LOCATIONS, &ATOMIC_LOCATIONS)
    } else {
        (&ATOMIC_LOCATIONS, &NON_ATOMIC_LOCATIONS)
    };
    seen_as.with(|locations| {
        if locations.borrow().contains(&address) {
            tracing::warn!(
                "Mixed atomic and non-atomic access to the same location detected: {:#x}",
                address
            );
        }
    });
    record_in.with(|locations| {
        locations.borrow_mut().insert(address);
    });
}

#[cfg(not(feature = "memory-validation"))]
#[inline(always)]
pub fn validate_atomic_access(_ptr: *const u8, _is_atomic: bool) {}

/// Operand widths the hardware can access atomically.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AtomicWidth {
    U8,
    U16,
    U32,
    U64,
}

impl AtomicWidth {
    pub fn from_size(size: usize) -> Option<Self> {
        match size {
            1 => Some(Self::U8),
            2 => Some(Self::U16),
            4 => Some(Self::U32),
            8 => Some(Self::U64),
            _ => None,
        }
    }

    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }
}

/// Unified atomic memory access operations.
///
/// This trait provides a consistent interface for atomic loads and stores
/// on raw memory locations, regardless of the underlying type size.
pub trait AtomicAccess {
    /// Atomically load a value of the given width from the pointer.
    ///
    /// # Safety
    /// - `ptr` must be valid and aligned for the operation
    /// - The pointed memory must be valid for reads
    unsafe fn load_atomic(ptr: *const u8, width: AtomicWidth, ordering: Ordering) -> u64;

    /// Atomically store a value of the given width to the pointer.
    ///
    /// # Safety
    /// - `ptr` must be valid and aligned for the operation
    /// - The pointed memory must be valid for writes
    unsafe fn store_atomic(ptr: *mut u8, width: AtomicWidth, value: u64, ordering: Ordering);

    /// Atomically compare and exchange a pointer-sized word.
    ///
    /// Returns `Ok(previous)` when the swap happened and `Err(observed)` otherwise.
    ///
    /// # Safety
    /// - `ptr` must be valid and aligned to `usize`
    /// - The pointed memory must be valid for reads and writes
    unsafe fn compare_exchange_word(
        ptr: *mut u8,
        expected: usize,
        new: usize,
        success: Ordering,
        failure: Ordering,
    ) -> Result<usize, usize>;
}

/// Concrete implementation using `AtomicT::from_ptr`
pub struct StandardAtomicAccess;

impl AtomicAccess for StandardAtomicAccess {
    unsafe fn load_atomic(ptr: *const u8, width: AtomicWidth, ordering: Ordering) -> u64 {
        validate_atomic_access(ptr, true);
        match width {
            AtomicWidth::U8 => unsafe { AtomicU8::from_ptr(ptr as *mut u8) }.load(ordering) as u64,
            AtomicWidth::U16 => {
                unsafe { AtomicU16::from_ptr(ptr as *mut u16) }.load(ordering) as u64
            }
            AtomicWidth::U32 => {
                unsafe { AtomicU32::from_ptr(ptr as *mut u32) }.load(ordering) as u64
            }
            AtomicWidth::U64 => unsafe { AtomicU64::from_ptr(ptr as *mut u64) }.load(ordering),
        }
    }

    unsafe fn store_atomic(ptr: *mut u8, width: AtomicWidth, value: u64, ordering: Ordering) {
        validate_atomic_access(ptr as *const u8, true);
        match width {
            AtomicWidth::U8 => unsafe { AtomicU8::from_ptr(ptr) }.store(value as u8, ordering),
            AtomicWidth::U16 => {
                unsafe { AtomicU16::from_ptr(ptr as *mut u16) }.store(value as u16, ordering)
            }
            AtomicWidth::U32 => {
                unsafe { AtomicU32::from_ptr(ptr as *mut u32) }.store(value as u32, ordering)
            }
            AtomicWidth::U64 => unsafe { AtomicU64::from_ptr(ptr as *mut u64) }.store(value, ordering),
        }
    }

    unsafe fn compare_exchange_word(
        ptr: *mut u8,
        expected: usize,
        new: usize,
        success: Ordering,
        failure: Ordering,
    ) -> Result<usize, usize> {
        validate_atomic_access(ptr as *const u8, true);
        unsafe { AtomicUsize::from_ptr(ptr as *mut usize) }
            .compare_exchange(expected, new, success, failure)
    }
}

/// Field-granular loads and stores that use atomics whenever the width and
/// alignment allow it, so concurrent readers never observe torn scalars.
pub struct Atomic;

impl Atomic {
    /// # Safety
    /// Caller must ensure `ptr` is valid for `out.len()` bytes.
    pub unsafe fn load_field(ptr: *const u8, out: &mut [u8], ordering: Ordering) {
        match AtomicWidth::from_size(out.len()) {
            Some(width) if is_ptr_aligned_to_field(ptr, out.len()) => {
                let val = unsafe { StandardAtomicAccess::load_atomic(ptr, width, ordering) };
                match width {
                    AtomicWidth::U8 => out.copy_from_slice(&(val as u8).to_ne_bytes()),
                    AtomicWidth::U16 => out.copy_from_slice(&(val as u16).to_ne_bytes()),
                    AtomicWidth::U32 => out.copy_from_slice(&(val as u32).to_ne_bytes()),
                    AtomicWidth::U64 => out.copy_from_slice(&val.to_ne_bytes()),
                }
            }
            _ => {
                validate_atomic_access(ptr, false);
                unsafe { ptr::copy_nonoverlapping(ptr, out.as_mut_ptr(), out.len()) };
            }
        }
    }

    /// # Safety
    /// Caller must ensure `ptr` is valid for `value.len()` bytes.
    pub unsafe fn store_field(ptr: *mut u8, value: &[u8], ordering: Ordering) {
        match AtomicWidth::from_size(value.len()) {
            Some(width) if is_ptr_aligned_to_field(ptr, value.len()) => {
                let mut word = [0u8; 8];
                word[..value.len()].copy_from_slice(value);
                let val = match width {
                    AtomicWidth::U8 => value[0] as u64,
                    AtomicWidth::U16 => u16::from_ne_bytes([word[0], word[1]]) as u64,
                    AtomicWidth::U32 => {
                        u32::from_ne_bytes([word[0], word[1], word[2], word[3]]) as u64
                    }
                    AtomicWidth::U64 => u64::from_ne_bytes(word),
                };
                unsafe { StandardAtomicAccess::store_atomic(ptr, width, val, ordering) };
            }
            _ => {
                validate_atomic_access(ptr as *const u8, false);
                unsafe { ptr::copy_nonoverlapping(value.as_ptr(), ptr, value.len()) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Arc;
    use std::thread;

    #[test]
    fn test_width_from_size() {
        assert_eq!(AtomicWidth::from_size(4), Some(AtomicWidth::U32));
        assert_eq!(AtomicWidth::from_size(3), None);
        assert_eq!(AtomicWidth::U64.size(), 8);
    }

    #[test]
    fn test_field_round_trip_through_atomics() {
        let mut slot = 0u64;
        let ptr = &mut slot as *mut u64 as *mut u8;
        unsafe { Atomic::store_field(ptr, &0x1234_5678u32.to_ne_bytes(), Ordering::SeqCst) };
        let mut out = [0u8; 4];
        unsafe { Atomic::load_field(ptr, &mut out, Ordering::SeqCst) };
        assert_eq!(u32::from_ne_bytes(out), 0x1234_5678);
    }

    #[test]
    fn test_unaligned_field_falls_back_to_copy() {
        let mut buf = [0u8; 16];
        let ptr = unsafe { buf.as_mut_ptr().add(1) };
        unsafe { Atomic::store_field(ptr, &[1, 2, 3], Ordering::SeqCst) };
        assert_eq!(&buf[1..4], &[1, 2, 3]);
    }

    #[test]
    fn test_compare_exchange_word() {
        let mut word = 5usize;
        let ptr = &mut word as *mut usize as *mut u8;
        let hit = unsafe {
            StandardAtomicAccess::compare_exchange_word(ptr, 5, 9, Ordering::SeqCst, Ordering::SeqCst)
        };
        assert_eq!(hit, Ok(5));
        let miss = unsafe {
            StandardAtomicAccess::compare_exchange_word(ptr, 5, 1, Ordering::SeqCst, Ordering::SeqCst)
        };
        assert_eq!(miss, Err(9));
        assert_eq!(word, 9);
    }

    #[test]
    fn test_compare_exchange_word_is_atomic_under_contention() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    let ptr = counter.as_ptr() as *mut u8;
                    for _ in 0..1000 {
                        loop {
                            let seen = counter.load(Ordering::SeqCst);
                            let swapped = unsafe {
                                StandardAtomicAccess::compare_exchange_word(
                                    ptr,
                                    seen,
                                    seen + 1,
                                    Ordering::SeqCst,
                                    Ordering::SeqCst,
                                )
                            };
                            if swapped.is_ok() {
                                break;
                            }
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 8000);
    }
}
