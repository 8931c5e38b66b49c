use aotrt_types::{DispatchError, TypeLoadError};
use aotrt_utils::ThreadId;
use aotrt_value::MemoryError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VmError {
    #[error("Type loading failed: {0}")]
    TypeLoad(#[from] TypeLoadError),

    #[error("Interface dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Memory access violation: {0}")]
    Memory(#[from] MemoryError),

    #[error("Allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Synchronization failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Unable to cast object of type {from} to type {to}")]
    InvalidCast { from: String, to: String },

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Argument out of range: {0}")]
    ArgumentOutOfRange(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocationError {
    #[error("Out of memory allocating {size} bytes")]
    OutOfMemory { size: usize },
    #[error("Allocation size overflow")]
    SizeOverflow,
    #[error("Allocation of {size} bytes exceeds the limit of {limit} bytes")]
    ExceedsLimit { size: usize, limit: usize },
    #[error("Cannot create an instance of {0}")]
    InvalidAllocation(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    #[error("Object synchronization method was called by {thread}, which does not own the lock")]
    NotOwner { thread: ThreadId },
}
