use crate::{descriptor::TypeHandle, imt::MethodId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeLoadError {
    #[error("Type not found: {0}")]
    TypeNotFound(String),
    #[error("Invalid type handle: {0}")]
    UnknownHandle(TypeHandle),
    #[error("Duplicate type definition: {0}")]
    DuplicateType(String),
    #[error("Type name {0} is reserved for array types")]
    InvalidTypeName(String),
    #[error("Duplicate field {field} in {owner}")]
    DuplicateField { owner: String, field: String },
    #[error("Type {0} has no base type, but {1} is already the root type")]
    SecondRoot(String, String),
    #[error("Invalid base type for {ty}: {reason}")]
    InvalidBase { ty: String, reason: String },
    #[error("Type {ty} lists {interface} as an interface, but it is not one")]
    NotAnInterface { ty: String, interface: String },
    #[error("Could not find matching method for {method} in {ty}")]
    MissingInterfaceMethod { ty: String, method: String },
    #[error("Explicit implementation {method} in {ty} does not name an implemented interface method")]
    UnknownInterfaceMethod { ty: String, method: String },
    #[error("Method id {id} of {method} collides with another method in {ty}")]
    MethodIdCollision {
        ty: String,
        method: String,
        id: MethodId,
    },
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("No applicable method for method id {0}")]
    NoApplicableMethod(MethodId),
    #[error("Virtual slot {slot} out of range for {ty} (vtable size {size})")]
    VirtualSlotOutOfRange { ty: String, slot: usize, size: usize },
    #[error("Multi-entry dispatch slot must not be empty")]
    EmptyMultiSlot,
}
