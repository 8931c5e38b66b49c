use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MemoryError {
    #[error("Index {index} out of range for length {length}")]
    IndexOutOfRange { index: usize, length: usize },
    #[error("Access violation: {len} bytes at offset {offset} in an object of {size} bytes")]
    AccessViolation { offset: usize, len: usize, size: usize },
    #[error("Write into object header at offset {0}")]
    HeaderWrite(usize),
    #[error("Misaligned access at offset {offset} (requires alignment {align})")]
    Misaligned { offset: usize, align: usize },
    #[error("Expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("Object of type {0} is not an array")]
    NotAnArray(String),
    #[error("Field not found: {ty}.{field}")]
    UnknownField { ty: String, field: String },
    #[error("Address {0:#x} is not the start of a live object")]
    InvalidReference(usize),
}
