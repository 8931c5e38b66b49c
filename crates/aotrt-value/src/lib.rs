//! # aotrt-value
//!
//! Typed views over raw heap blocks: object references, arrays and their
//! bounds-checked field accessors.
pub mod array;
pub mod error;
pub mod object;

#[cfg(test)]
mod object_tests;

pub use aotrt_types::layout::{ARRAY_DATA_OFFSET, ARRAY_LENGTH_OFFSET, HEADER_SIZE};
pub use array::ArrayRef;
pub use error::MemoryError;
pub use object::ObjectRef;
