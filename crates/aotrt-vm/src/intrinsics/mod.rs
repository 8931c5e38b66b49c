//! Runtime services called directly by compiled code.
//!
//! Each submodule adds an `impl Runtime` block for one family of entry
//! points:
//!
//! - [`object_ops`]: allocation, cloning and object identity
//! - [`array_ops`]: array allocation, range clears and copies, array reflection
//! - [`threading`]: atomic reference exchange and monitors
pub mod array_ops;
pub mod object_ops;
pub mod threading;
