use crate::{
    array_types::{ArrayTypeCache, CacheStat},
    comparer::TypeComparer,
    definition::{DefinitionKind, FieldType, TypeDefinition},
    descriptor::{InterfaceMethod, MethodSlot, TypeDescriptor, TypeHandle, TypeKind},
    error::TypeLoadError,
    imt::{ImtEntry, InterfaceMethodTable, MethodAddress, MethodId},
    layout::{FieldLayoutManager, HasLayout, LayoutManager, ARRAY_DATA_OFFSET, HEADER_SIZE},
};
use aotrt_utils::{checked_align_up, sync::RwLock, POINTER_SIZE};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

#[derive(Default)]
struct TableState {
    types: Vec<&'static TypeDescriptor>,
    names: HashMap<String, TypeHandle>,
    root: Option<TypeHandle>,
    array_base: Option<TypeHandle>,
}

impl TableState {
    fn get(&self, handle: TypeHandle) -> Result<&'static TypeDescriptor, TypeLoadError> {
        self.types
            .get(handle.0 as usize)
            .copied()
            .ok_or(TypeLoadError::UnknownHandle(handle))
    }

    fn next_handle(&self) -> TypeHandle {
        TypeHandle(self.types.len() as u32)
    }
}

/// Append-only registry of every runtime type.
///
/// Descriptors are leaked on registration, so references handed out by
/// [`get`](Self::get) stay valid for the life of the process. Apart from the
/// lazily created array types, the table is only written while loading.
pub struct TypeTable {
    state: RwLock<TableState>,
    array_types: ArrayTypeCache,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TableState::default()),
            array_types: ArrayTypeCache::new(),
        }
    }

    pub fn get(&self, handle: TypeHandle) -> Result<&'static TypeDescriptor, TypeLoadError> {
        self.state.read().get(handle)
    }

    pub fn find(&self, name: &str) -> Option<TypeHandle> {
        self.state.read().names.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Result<&'static TypeDescriptor, TypeLoadError> {
        let state = self.state.read();
        let handle = state
            .names
            .get(name)
            .copied()
            .ok_or_else(|| TypeLoadError::TypeNotFound(name.to_string()))?;
        state.get(handle)
    }

    pub fn root(&self) -> Option<TypeHandle> {
        self.state.read().root
    }

    pub fn array_base(&self) -> Option<TypeHandle> {
        self.state.read().array_base
    }

    /// Registers the class every array type derives from.
    pub fn set_array_base(&self, handle: TypeHandle) -> Result<(), TypeLoadError> {
        let mut state = self.state.write();
        let descriptor = state.get(handle)?;
        if !matches!(descriptor.kind, TypeKind::Class { .. }) {
            return Err(TypeLoadError::InvalidBase {
                ty: descriptor.name.clone(),
                reason: "array base must be a class".to_string(),
            });
        }
        state.array_base = Some(handle);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.read().types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all descriptors in handle order.
    pub fn descriptors(&self) -> Vec<&'static TypeDescriptor> {
        self.state.read().types.clone()
    }

    pub fn comparer(&self) -> TypeComparer<'_> {
        TypeComparer::new(self)
    }

    /// Canonical single-dimensional array type for `element`.
    pub fn get_array_type(&self, element: TypeHandle) -> Result<TypeHandle, TypeLoadError> {
        self.array_types.get_or_create(self, element)
    }

    pub fn array_cache_stats(&self) -> CacheStat {
        self.array_types.stats()
    }

    pub fn define(&self, def: TypeDefinition) -> Result<TypeHandle, TypeLoadError> {
        // `Foo[]` belongs to the array type cache.
        if def.name.ends_with("[]") {
            return Err(TypeLoadError::InvalidTypeName(def.name));
        }
        let mut state = self.state.write();
        if state.names.contains_key(&def.name) {
            return Err(TypeLoadError::DuplicateType(def.name));
        }
        let handle = state.next_handle();
        let descriptor = build_descriptor(&state, handle, def)?;
        Ok(publish(&mut state, descriptor))
    }

    /// Builds and registers the array type of `element`. Only the array type
    /// cache calls this, once per element type.
    pub(crate) fn register_array(&self, element: TypeHandle) -> Result<TypeHandle, TypeLoadError> {
        let mut state = self.state.write();
        let element_desc = state.get(element)?;
        let name = format!("{}[]", element_desc.name);
        if state.names.contains_key(&name) {
            return Err(TypeLoadError::DuplicateType(name));
        }
        let base_handle = match state.array_base.or(state.root) {
            Some(handle) => handle,
            None => {
                return Err(TypeLoadError::InvalidBase {
                    ty: name,
                    reason: "no root type is defined".to_string(),
                })
            }
        };
        let base = state.get(base_handle)?;

        let descriptor = TypeDescriptor {
            handle: state.next_handle(),
            name,
            kind: TypeKind::Array { element },
            object_size: ARRAY_DATA_OFFSET as u32,
            element_size: element_desc.storage_size,
            storage_size: POINTER_SIZE as u32,
            base_type: Some(base_handle),
            interfaces: base.interfaces.clone(),
            depth: base.depth + 1,
            imt: base.imt.clone(),
            interface_impls: base.interface_impls.clone(),
            vtable: base.vtable.clone(),
            methods: Vec::new(),
            interface_methods: Vec::new(),
            layout: base.layout.clone(),
        };
        Ok(publish(&mut state, descriptor))
    }
}

fn publish(state: &mut TableState, descriptor: TypeDescriptor) -> TypeHandle {
    let descriptor: &'static TypeDescriptor = Box::leak(Box::new(descriptor));
    let handle = descriptor.handle;
    debug!(
        "Registered type {} as {} (size {}, base {:?})",
        descriptor.name, handle, descriptor.object_size, descriptor.base_type
    );
    if descriptor.base_type.is_none() && !descriptor.is_interface() {
        state.root = Some(handle);
    }
    state.names.insert(descriptor.name.clone(), handle);
    state.types.push(descriptor);
    handle
}

fn to_u32(value: usize, ty: &str) -> Result<u32, TypeLoadError> {
    u32::try_from(value)
        .map_err(|_| TypeLoadError::InvalidLayout(format!("{} is too large ({} bytes)", ty, value)))
}

fn resolve_base(
    state: &TableState,
    def: &TypeDefinition,
) -> Result<Option<&'static TypeDescriptor>, TypeLoadError> {
    let invalid = |reason: &str| TypeLoadError::InvalidBase {
        ty: def.name.clone(),
        reason: reason.to_string(),
    };

    let Some(base_handle) = def.base else {
        return match def.kind {
            DefinitionKind::Interface => Ok(None),
            DefinitionKind::ValueType => Err(invalid("value types must derive from a class")),
            DefinitionKind::Class { .. } => match state.root {
                Some(root) => Err(TypeLoadError::SecondRoot(
                    def.name.clone(),
                    state.get(root)?.name.clone(),
                )),
                None => Ok(None),
            },
        };
    };

    let base = state.get(base_handle)?;
    match (def.kind, base.kind) {
        (DefinitionKind::Interface, _) => Err(invalid("interfaces cannot have a base type")),
        (_, TypeKind::Interface) => Err(invalid("cannot derive from an interface")),
        (_, TypeKind::ValueType) => Err(invalid("value types are sealed")),
        (_, TypeKind::Array { .. }) => Err(invalid("array types are sealed")),
        (_, TypeKind::Class { .. }) => Ok(Some(base)),
    }
}

/// Inherited interfaces first, then each declared interface preceded by the
/// interfaces it extends. Duplicates keep their first position.
fn collect_interfaces(
    state: &TableState,
    def: &TypeDefinition,
    base: Option<&TypeDescriptor>,
) -> Result<Vec<TypeHandle>, TypeLoadError> {
    let mut interfaces = base.map(|b| b.interfaces.clone()).unwrap_or_default();
    for &declared in &def.interfaces {
        let interface = state.get(declared)?;
        if !interface.is_interface() {
            return Err(TypeLoadError::NotAnInterface {
                ty: def.name.clone(),
                interface: interface.name.clone(),
            });
        }
        for &handle in interface.interfaces.iter().chain(std::iter::once(&declared)) {
            if !interfaces.contains(&handle) {
                interfaces.push(handle);
            }
        }
    }
    Ok(interfaces)
}

fn build_layout(
    state: &TableState,
    def: &TypeDefinition,
    base: Option<&TypeDescriptor>,
) -> Result<FieldLayoutManager, TypeLoadError> {
    let inherited = match (def.kind, base) {
        (DefinitionKind::Interface, _) => {
            if !def.fields.is_empty() {
                return Err(TypeLoadError::InvalidLayout(format!(
                    "interface {} cannot declare instance fields",
                    def.name
                )));
            }
            return Ok(FieldLayoutManager::default());
        }
        (DefinitionKind::ValueType, _) => FieldLayoutManager::default(),
        (DefinitionKind::Class { .. }, Some(base)) => base.layout.clone(),
        (DefinitionKind::Class { .. }, None) => FieldLayoutManager::starting_at(HEADER_SIZE),
    };

    let mut fields = Vec::with_capacity(def.fields.len());
    for field in &def.fields {
        let layout = match field.ty {
            FieldType::Scalar(scalar) => LayoutManager::from(scalar),
            FieldType::Inline(handle) => {
                let inline = state.get(handle)?;
                if !inline.is_value_type() {
                    return Err(TypeLoadError::InvalidLayout(format!(
                        "field {}.{} inlines non-value type {}",
                        def.name, field.name, inline.name
                    )));
                }
                LayoutManager::from(inline.layout.clone())
            }
        };
        fields.push((field.name.as_str(), layout));
    }

    FieldLayoutManager::extend(&inherited, fields, def.layout).map_err(|field| {
        TypeLoadError::DuplicateField {
            owner: def.name.clone(),
            field,
        }
    })
}

fn build_vtable(
    def: &TypeDefinition,
    base: Option<&TypeDescriptor>,
) -> (Vec<MethodSlot>, Vec<MethodSlot>) {
    let mut vtable = base.map(|b| b.vtable.clone()).unwrap_or_default();
    let mut methods = Vec::new();
    for method in &def.methods {
        let slot = MethodSlot {
            name: method.name.clone(),
            address: method.address,
        };
        if !method.is_virtual {
            methods.push(slot);
        } else if let Some(existing) = vtable.iter_mut().find(|s| s.name == method.name) {
            trace!("{} overrides {}", def.name, method.name);
            existing.address = method.address;
        } else {
            vtable.push(slot);
        }
    }
    (vtable, methods)
}

fn build_interface_impls(
    state: &TableState,
    def: &TypeDefinition,
    base: Option<&TypeDescriptor>,
    interfaces: &[TypeHandle],
    vtable: &[MethodSlot],
) -> Result<Vec<ImtEntry>, TypeLoadError> {
    let explicit: HashMap<&str, MethodAddress> = def
        .explicit_impls
        .iter()
        .map(|(signature, address)| (signature.as_str(), *address))
        .collect();
    let mut claimed = HashSet::new();
    let mut seen: HashMap<MethodId, &str> = HashMap::new();
    let mut entries = Vec::new();
    let is_abstract = matches!(def.kind, DefinitionKind::Class { is_abstract: true });

    for &handle in interfaces {
        let interface = state.get(handle)?;
        for method in &interface.interface_methods {
            let address = explicit
                .get(method.signature.as_str())
                .copied()
                .or_else(|| {
                    def.methods
                        .iter()
                        .find(|m| m.name == method.name)
                        .map(|m| m.address)
                })
                .or_else(|| {
                    base.and_then(|b| {
                        b.interface_impls
                            .iter()
                            .find(|e| e.method_id == method.id)
                            .map(|e| e.address)
                    })
                })
                .or_else(|| {
                    vtable
                        .iter()
                        .find(|slot| slot.name == method.name)
                        .map(|slot| slot.address)
                });

            let Some(address) = address else {
                if is_abstract {
                    continue;
                }
                return Err(TypeLoadError::MissingInterfaceMethod {
                    ty: def.name.clone(),
                    method: method.signature.clone(),
                });
            };

            if let Some(previous) = seen.insert(method.id, method.signature.as_str()) {
                if previous != method.signature {
                    return Err(TypeLoadError::MethodIdCollision {
                        ty: def.name.clone(),
                        method: method.signature.clone(),
                        id: method.id,
                    });
                }
                continue;
            }
            claimed.insert(method.signature.as_str());
            entries.push(ImtEntry::new(method.id, address));
        }
    }

    if let Some((signature, _)) = def
        .explicit_impls
        .iter()
        .find(|(signature, _)| !claimed.contains(signature.as_str()))
    {
        return Err(TypeLoadError::UnknownInterfaceMethod {
            ty: def.name.clone(),
            method: signature.clone(),
        });
    }

    Ok(entries)
}

fn build_interface_methods(def: &TypeDefinition) -> Result<Vec<InterfaceMethod>, TypeLoadError> {
    let mut declared: Vec<InterfaceMethod> = Vec::with_capacity(def.interface_methods.len());
    for name in &def.interface_methods {
        let signature = format!("{}.{}", def.name, name);
        let id = MethodId::from_signature(&signature);
        if declared.iter().any(|m| m.id == id) {
            return Err(TypeLoadError::MethodIdCollision {
                ty: def.name.clone(),
                method: signature,
                id,
            });
        }
        declared.push(InterfaceMethod {
            name: name.clone(),
            signature,
            id,
        });
    }
    Ok(declared)
}

fn build_descriptor(
    state: &TableState,
    handle: TypeHandle,
    def: TypeDefinition,
) -> Result<TypeDescriptor, TypeLoadError> {
    let base = resolve_base(state, &def)?;
    let interfaces = collect_interfaces(state, &def, base)?;
    let layout = build_layout(state, &def, base)?;

    let pointer_aligned = |size: Option<usize>| {
        size.and_then(|size| checked_align_up(size, POINTER_SIZE))
            .ok_or_else(|| TypeLoadError::InvalidLayout(format!("{} is too large", def.name)))
    };
    let (kind, object_size, storage_size) = match def.kind {
        DefinitionKind::Class { is_abstract } => (
            TypeKind::Class { is_abstract },
            pointer_aligned(Some(layout.size().max(HEADER_SIZE)))?,
            POINTER_SIZE,
        ),
        DefinitionKind::ValueType => (
            TypeKind::ValueType,
            pointer_aligned(HEADER_SIZE.checked_add(layout.size()))?,
            layout.size().max(1),
        ),
        DefinitionKind::Interface => {
            if !def.methods.is_empty() || !def.explicit_impls.is_empty() {
                return Err(TypeLoadError::InvalidLayout(format!(
                    "interface {} cannot declare method bodies",
                    def.name
                )));
            }
            (TypeKind::Interface, 0, POINTER_SIZE)
        }
    };

    let (vtable, methods) = build_vtable(&def, base);
    let (interface_methods, interface_impls) = match def.kind {
        DefinitionKind::Interface => (build_interface_methods(&def)?, Vec::new()),
        _ => (
            Vec::new(),
            build_interface_impls(state, &def, base, &interfaces, &vtable)?,
        ),
    };

    Ok(TypeDescriptor {
        handle,
        object_size: to_u32(object_size, &def.name)?,
        element_size: 0,
        storage_size: to_u32(storage_size, &def.name)?,
        base_type: base.map(|b| b.handle),
        depth: base.map_or(0, |b| b.depth + 1),
        imt: InterfaceMethodTable::build(&interface_impls),
        interface_impls,
        interfaces,
        vtable,
        methods,
        interface_methods,
        layout,
        kind,
        name: def.name,
    })
}
