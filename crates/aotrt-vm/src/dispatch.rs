use crate::{error::VmError, state::Runtime};
use aotrt_types::{
    resolve_interface_call, DispatchError, MethodAddress, MethodId, TypeHandle, TypeLoadError,
};
use aotrt_value::ObjectRef;
use tracing::{trace, warn};

impl Runtime {
    /// Interface call on `receiver`: loads slot `method_id % IMT_SIZE` from the
    /// receiver's IMT and resolves it.
    pub fn resolve_interface_call(
        &self,
        receiver: ObjectRef<'_>,
        method_id: MethodId,
    ) -> Result<MethodAddress, VmError> {
        let descriptor = receiver.descriptor();
        let slot = descriptor.imt.slot(method_id);
        let resolved = resolve_interface_call(method_id, slot);
        self.metrics.record_dispatch(slot, resolved.is_ok());
        match resolved {
            Ok(address) => {
                trace!(
                    "IMT[{}] of {} resolved {} to {}",
                    method_id.slot_index(),
                    descriptor.name,
                    method_id,
                    address
                );
                Ok(address)
            }
            Err(e) => {
                warn!("Interface dispatch on {} failed: {}", descriptor.name, e);
                Err(e.into())
            }
        }
    }

    /// Convenience form of [`resolve_interface_call`](Self::resolve_interface_call)
    /// that looks the method id up by interface and method name.
    pub fn resolve_interface_method(
        &self,
        receiver: ObjectRef<'_>,
        interface: TypeHandle,
        method: &str,
    ) -> Result<MethodAddress, VmError> {
        let iface = self.descriptor(interface)?;
        let declared = iface.find_interface_method(method).ok_or_else(|| {
            TypeLoadError::UnknownInterfaceMethod {
                ty: iface.name.clone(),
                method: method.to_string(),
            }
        })?;
        let descriptor = receiver.descriptor();
        if !descriptor.implements(interface) {
            return Err(VmError::InvalidCast {
                from: descriptor.name.clone(),
                to: iface.name.clone(),
            });
        }
        self.resolve_interface_call(receiver, declared.id)
    }

    /// Virtual call through vtable slot `slot` of the receiver's type.
    pub fn resolve_virtual_call(
        &self,
        receiver: ObjectRef<'_>,
        slot: usize,
    ) -> Result<MethodAddress, VmError> {
        let descriptor = receiver.descriptor();
        descriptor
            .vtable
            .get(slot)
            .map(|method| method.address)
            .ok_or_else(|| {
                DispatchError::VirtualSlotOutOfRange {
                    ty: descriptor.name.clone(),
                    slot,
                    size: descriptor.vtable.len(),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::{Runtime, RuntimeConfig, VmError};
    use aotrt_types::{
        DispatchError, DispatchSlot, MethodAddress, MethodId, TypeDefinition, TypeHandle,
        TypeLoadError, IMT_SIZE,
    };

    struct Fixture {
        runtime: Runtime,
        circle: TypeHandle,
        drawable: TypeHandle,
        scalable: TypeHandle,
    }

    fn fixture() -> Fixture {
        let (runtime, types) = Runtime::with_corlib(RuntimeConfig::default()).unwrap();
        let table = runtime.types();
        let drawable = table
            .define(TypeDefinition::interface("IDrawable").interface_method("Draw"))
            .unwrap();
        let scalable = table
            .define(TypeDefinition::interface("IScalable").interface_method("Scale"))
            .unwrap();
        let shape = table
            .define(
                TypeDefinition::abstract_class("Shape")
                    .extends(types.object)
                    .implements(drawable)
                    .virtual_method("Area", MethodAddress(0x100))
                    .virtual_method("Draw", MethodAddress(0x110)),
            )
            .unwrap();
        let circle = table
            .define(
                TypeDefinition::class("Circle")
                    .extends(shape)
                    .implements(scalable)
                    .virtual_method("Area", MethodAddress(0x200))
                    .method("Scale", MethodAddress(0x210)),
            )
            .unwrap();
        Fixture {
            runtime,
            circle,
            drawable,
            scalable,
        }
    }

    #[test]
    fn test_interface_calls_resolve() {
        let f = fixture();
        let circle = f.runtime.allocate_object(f.circle).unwrap();
        assert_eq!(
            f.runtime
                .resolve_interface_call(circle, MethodId::from_signature("IDrawable.Draw"))
                .unwrap(),
            MethodAddress(0x110)
        );
        assert_eq!(
            f.runtime
                .resolve_interface_method(circle, f.scalable, "Scale")
                .unwrap(),
            MethodAddress(0x210)
        );
        assert_eq!(
            f.runtime
                .resolve_interface_method(circle, f.drawable, "Draw")
                .unwrap(),
            MethodAddress(0x110)
        );
        let snapshot = f.runtime.metrics_snapshot();
        assert_eq!(snapshot.dispatch_single + snapshot.dispatch_multi, 3);
    }

    #[test]
    fn test_empty_slot_is_a_dispatch_error() {
        let f = fixture();
        let circle = f.runtime.allocate_object(f.circle).unwrap();
        let descriptor = circle.descriptor();
        let empty = (1..=IMT_SIZE as u32)
            .map(|raw| MethodId::new(raw).unwrap())
            .find(|id| matches!(descriptor.imt.slot(*id), DispatchSlot::Empty))
            .unwrap();
        assert_eq!(
            f.runtime.resolve_interface_call(circle, empty),
            Err(VmError::Dispatch(DispatchError::NoApplicableMethod(empty)))
        );
        assert_eq!(f.runtime.metrics_snapshot().dispatch_misses, 1);
    }

    #[test]
    fn test_interface_method_lookup_errors() {
        let f = fixture();
        let (runtime, types) = (&f.runtime, f.runtime.types());
        let circle = runtime.allocate_object(f.circle).unwrap();
        assert!(matches!(
            runtime.resolve_interface_method(circle, f.drawable, "Erase"),
            Err(VmError::TypeLoad(TypeLoadError::UnknownInterfaceMethod { .. }))
        ));

        let unrelated = types
            .define(TypeDefinition::interface("IUnrelated").interface_method("Draw"))
            .unwrap();
        assert_eq!(
            runtime.resolve_interface_method(circle, unrelated, "Draw"),
            Err(VmError::InvalidCast {
                from: "Circle".to_string(),
                to: "IUnrelated".to_string()
            })
        );
    }

    #[test]
    fn test_virtual_calls() {
        let f = fixture();
        let circle = f.runtime.allocate_object(f.circle).unwrap();
        let descriptor = circle.descriptor();
        let area = descriptor.find_virtual("Area").unwrap();
        let draw = descriptor.find_virtual("Draw").unwrap();
        assert_eq!(
            f.runtime.resolve_virtual_call(circle, area).unwrap(),
            MethodAddress(0x200)
        );
        assert_eq!(
            f.runtime.resolve_virtual_call(circle, draw).unwrap(),
            MethodAddress(0x110)
        );
        assert_eq!(
            f.runtime.resolve_virtual_call(circle, 99),
            Err(VmError::Dispatch(DispatchError::VirtualSlotOutOfRange {
                ty: "Circle".to_string(),
                slot: 99,
                size: descriptor.vtable.len()
            }))
        );
    }
}
