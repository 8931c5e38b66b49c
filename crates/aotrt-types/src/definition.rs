//! Loader-side description of a type, consumed by [`TypeTable::define`](crate::TypeTable::define).
use crate::{
    descriptor::TypeHandle,
    imt::MethodAddress,
    layout::{LayoutKind, Scalar},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    Scalar(Scalar),
    /// A value type stored inline.
    Inline(TypeHandle),
}

impl FieldType {
    pub fn reference() -> Self {
        FieldType::Scalar(Scalar::ObjectRef)
    }
}

impl From<Scalar> for FieldType {
    fn from(s: Scalar) -> Self {
        FieldType::Scalar(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub ty: FieldType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodDefinition {
    pub name: String,
    pub address: MethodAddress,
    pub is_virtual: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DefinitionKind {
    Class { is_abstract: bool },
    ValueType,
    Interface,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeDefinition {
    pub name: String,
    pub kind: DefinitionKind,
    pub base: Option<TypeHandle>,
    pub interfaces: Vec<TypeHandle>,
    pub fields: Vec<FieldDefinition>,
    pub layout: LayoutKind,
    pub methods: Vec<MethodDefinition>,
    /// Interface methods declared by an interface type, by simple name.
    pub interface_methods: Vec<String>,
    /// Explicit implementations keyed by full signature, e.g. `"IShape.Area"`.
    pub explicit_impls: Vec<(String, MethodAddress)>,
}

impl TypeDefinition {
    fn new(name: impl Into<String>, kind: DefinitionKind, layout: LayoutKind) -> Self {
        Self {
            name: name.into(),
            kind,
            base: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            layout,
            methods: Vec::new(),
            interface_methods: Vec::new(),
            explicit_impls: Vec::new(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, DefinitionKind::Class { is_abstract: false }, LayoutKind::Automatic)
    }

    pub fn abstract_class(name: impl Into<String>) -> Self {
        Self::new(name, DefinitionKind::Class { is_abstract: true }, LayoutKind::Automatic)
    }

    pub fn value_type(name: impl Into<String>) -> Self {
        Self::new(name, DefinitionKind::ValueType, LayoutKind::Sequential)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, DefinitionKind::Interface, LayoutKind::Automatic)
    }

    pub fn extends(mut self, base: TypeHandle) -> Self {
        self.base = Some(base);
        self
    }

    pub fn implements(mut self, interface: TypeHandle) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn with_layout(mut self, layout: LayoutKind) -> Self {
        self.layout = layout;
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        self.fields.push(FieldDefinition {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    pub fn method(mut self, name: impl Into<String>, address: MethodAddress) -> Self {
        self.methods.push(MethodDefinition {
            name: name.into(),
            address,
            is_virtual: false,
        });
        self
    }

    /// Declares a virtual method; a name already in the base vtable overrides it.
    pub fn virtual_method(mut self, name: impl Into<String>, address: MethodAddress) -> Self {
        self.methods.push(MethodDefinition {
            name: name.into(),
            address,
            is_virtual: true,
        });
        self
    }

    pub fn interface_method(mut self, name: impl Into<String>) -> Self {
        self.interface_methods.push(name.into());
        self
    }

    pub fn explicit_impl(mut self, signature: impl Into<String>, address: MethodAddress) -> Self {
        self.explicit_impls.push((signature.into(), address));
        self
    }
}
