//! # aotrt-types
//!
//! Runtime type descriptors and the queries compiled code makes against them:
//! the type table, interface method tables, subtype checks and canonical
//! array types.
pub mod array_types;
pub mod comparer;
pub mod corlib;
pub mod definition;
pub mod descriptor;
pub mod error;
pub mod imt;
pub mod layout;
pub mod table;


pub use comparer::TypeComparer;
pub use definition::{FieldType, TypeDefinition};
pub use descriptor::{TypeDescriptor, TypeHandle, TypeKind};
pub use error::{DispatchError, TypeLoadError};
pub use imt::{resolve_interface_call, DispatchSlot, MethodAddress, MethodId, IMT_SIZE};
pub use table::TypeTable;
