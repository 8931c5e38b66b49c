use crate::{error::VmError, state::Runtime};
use aotrt_types::TypeHandle;
use aotrt_value::ObjectRef;

impl Runtime {
    fn is_instance_of(&self, object: ObjectRef<'_>, target: TypeHandle) -> Result<bool, VmError> {
        let target_desc = self.descriptor(target)?;
        let descriptor = object.descriptor();
        if target_desc.is_interface() {
            Ok(descriptor.implements(target))
        } else {
            Ok(self.types.comparer().is_subtype_of(descriptor.handle, target))
        }
    }

    /// `isinst`: the object itself if it is an instance of `target`, otherwise null.
    /// Null passes through.
    pub fn is_instance<'o>(
        &self,
        object: Option<ObjectRef<'o>>,
        target: TypeHandle,
    ) -> Result<Option<ObjectRef<'o>>, VmError> {
        match object {
            Some(o) if self.is_instance_of(o, target)? => Ok(Some(o)),
            Some(_) => Ok(None),
            None => Ok(None),
        }
    }

    /// `castclass`: like [`is_instance`](Self::is_instance) but a failed
    /// check is an error.
    pub fn cast_class<'o>(
        &self,
        object: Option<ObjectRef<'o>>,
        target: TypeHandle,
    ) -> Result<Option<ObjectRef<'o>>, VmError> {
        match object {
            Some(o) if !self.is_instance_of(o, target)? => Err(VmError::InvalidCast {
                from: o.descriptor().name.clone(),
                to: self.descriptor(target)?.name.clone(),
            }),
            other => Ok(other),
        }
    }

    pub fn is_subtype_of(&self, candidate: TypeHandle, target: TypeHandle) -> bool {
        self.types.comparer().is_subtype_of(candidate, target)
    }

    /// Whether a `candidate` value can be stored in a `target` location.
    ///
    /// Follows only the base chain unless
    /// [`RuntimeConfig::interface_assignability`](crate::RuntimeConfig::interface_assignability)
    /// is set.
    pub fn is_assignable_from(&self, target: TypeHandle, candidate: TypeHandle) -> bool {
        let comparer = self.types.comparer();
        if self.config.interface_assignability {
            comparer.is_assignable_from_including_interfaces(target, candidate)
        } else {
            comparer.is_assignable_from(target, candidate)
        }
    }

    pub fn implements_interface(&self, ty: TypeHandle, interface: TypeHandle) -> bool {
        self.types.comparer().implements_interface(ty, interface)
    }
}
