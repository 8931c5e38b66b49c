use crate::{
    descriptor::{TypeDescriptor, TypeHandle},
    table::TypeTable,
};
use tracing::warn;

/// Subtype and assignability queries over a [`TypeTable`].
///
/// All relations compare descriptors by handle. The base-chain queries
/// deliberately ignore interface lists; use
/// [`is_assignable_from_including_interfaces`](Self::is_assignable_from_including_interfaces)
/// when interface implementation should count.
pub struct TypeComparer<'a> {
    table: &'a TypeTable,
}

impl<'a> TypeComparer<'a> {
    pub fn new(table: &'a TypeTable) -> Self {
        Self { table }
    }

    fn lookup(&self, handle: TypeHandle) -> Option<&'static TypeDescriptor> {
        match self.table.get(handle) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                warn!("Type relation query on unknown type: {}", e);
                None
            }
        }
    }

    /// `candidate` followed by each of its base types, ending at the root.
    pub fn ancestors(&self, candidate: TypeHandle) -> Ancestors<'a> {
        Ancestors {
            table: self.table,
            next: Some(candidate),
        }
    }

    pub fn is_subtype_of(&self, candidate: TypeHandle, target: TypeHandle) -> bool {
        self.ancestors(candidate).any(|ancestor| ancestor.handle == target)
    }

    /// Whether a value of type `candidate` can be stored in a location of type `target`.
    pub fn is_assignable_from(&self, target: TypeHandle, candidate: TypeHandle) -> bool {
        self.is_subtype_of(candidate, target)
    }

    pub fn implements_interface(&self, descriptor: TypeHandle, interface: TypeHandle) -> bool {
        self.lookup(descriptor)
            .is_some_and(|d| d.interfaces.iter().any(|&i| i == interface))
    }

    /// [`is_assignable_from`](Self::is_assignable_from), extended so that an
    /// interface target accepts any type implementing it.
    pub fn is_assignable_from_including_interfaces(
        &self,
        target: TypeHandle,
        candidate: TypeHandle,
    ) -> bool {
        if self.is_subtype_of(candidate, target) {
            return true;
        }
        self.lookup(target).is_some_and(|t| t.is_interface())
            && self.implements_interface(candidate, target)
    }
}

pub struct Ancestors<'a> {
    table: &'a TypeTable,
    next: Option<TypeHandle>,
}

impl Iterator for Ancestors<'_> {
    type Item = &'static TypeDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        let descriptor = self.table.get(self.next?).ok()?;
        self.next = descriptor.base_type;
        Some(descriptor)
    }
}
