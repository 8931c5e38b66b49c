use crate::{
    imt::{ImtEntry, InterfaceMethodTable, MethodAddress, MethodId},
    layout::FieldLayoutManager,
};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Stable index of a descriptor in its [`TypeTable`](crate::TypeTable).
///
/// Handle equality is type identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeHandle(pub u32);

impl Display for TypeHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TypeKind {
    Class { is_abstract: bool },
    ValueType,
    Interface,
    Array { element: TypeHandle },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MethodSlot {
    pub name: String,
    pub address: MethodAddress,
}

/// A method declared by an interface, with its precomputed dispatch identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InterfaceMethod {
    pub name: String,
    pub signature: String,
    pub id: MethodId,
}

/// Immutable runtime metadata for one type.
///
/// Every heap object's header points at one of these. Descriptors are created
/// once by the loader (or lazily for array types) and live for the rest of the
/// process.
#[derive(Debug, Serialize)]
pub struct TypeDescriptor {
    pub handle: TypeHandle,
    pub name: String,
    pub kind: TypeKind,
    /// Byte size of a scalar instance, header included. Zero for interfaces.
    pub object_size: u32,
    /// Byte size of one element. Only meaningful for array types.
    pub element_size: u32,
    /// Bytes a value of this type occupies inside a field or array element.
    pub storage_size: u32,
    pub base_type: Option<TypeHandle>,
    /// Implemented interfaces: inherited ones first, then declared ones.
    pub interfaces: Vec<TypeHandle>,
    /// Number of base types between this type and the root.
    pub depth: u32,
    pub imt: InterfaceMethodTable,
    /// Every interface method implementation, ordered as the IMT was built.
    pub interface_impls: Vec<ImtEntry>,
    pub vtable: Vec<MethodSlot>,
    /// Non-virtual methods declared by this type.
    pub methods: Vec<MethodSlot>,
    /// Methods declared by an interface type; empty for everything else.
    pub interface_methods: Vec<InterfaceMethod>,
    /// Instance fields. Offsets are from the start of the object for
    /// reference types and from the start of the payload for value types.
    pub layout: FieldLayoutManager,
}

impl TypeDescriptor {
    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TypeKind::Interface)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::ValueType)
    }

    pub fn is_abstract(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Class { is_abstract: true } | TypeKind::Interface
        )
    }

    pub fn element_type(&self) -> Option<TypeHandle> {
        match self.kind {
            TypeKind::Array { element } => Some(element),
            _ => None,
        }
    }

    /// Whether `AllocateObject` may produce an instance of this type.
    /// Arrays go through the array allocator instead.
    pub fn is_instantiable(&self) -> bool {
        !self.is_abstract() && !self.is_array()
    }

    pub fn implements(&self, interface: TypeHandle) -> bool {
        self.interfaces.contains(&interface)
    }

    pub fn find_virtual(&self, name: &str) -> Option<usize> {
        self.vtable.iter().position(|slot| slot.name == name)
    }

    pub fn find_interface_method(&self, name: &str) -> Option<&InterfaceMethod> {
        self.interface_methods.iter().find(|m| m.name == name)
    }
}

impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
