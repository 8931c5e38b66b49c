use crate::{error::VmError, state::Runtime};
use aotrt_types::TypeHandle;
use aotrt_value::ObjectRef;
use tracing::{debug, trace};

impl Runtime {
    /// Allocates a zeroed instance of `ty`. Interfaces, abstract classes and
    /// array types are rejected.
    pub fn allocate_object(&self, ty: TypeHandle) -> Result<ObjectRef<'_>, VmError> {
        let descriptor = self.descriptor(ty)?;
        let object = self.heap.allocate_object(descriptor)?;
        self.metrics
            .record_allocation(descriptor.object_size as usize, false);
        Ok(object)
    }

    /// Shallow copy of `source`. Reference fields are copied as raw addresses.
    pub fn clone_object(&self, source: ObjectRef<'_>) -> Result<ObjectRef<'_>, VmError> {
        let clone = self.heap.clone_object(source)?;
        let size = source.byte_size();
        self.metrics.record_clone(size);
        debug!(
            "Cloned {} ({} bytes) {:#x} -> {:#x}",
            source.descriptor().name,
            size,
            source.address(),
            clone.address()
        );
        Ok(clone)
    }

    /// `Object.MemberwiseClone`.
    pub fn memberwise_clone(&self, source: ObjectRef<'_>) -> Result<ObjectRef<'_>, VmError> {
        self.clone_object(source)
    }

    /// The descriptor handle stored in the object's header. Mapping it to a
    /// reflection object is left to the caller.
    pub fn get_type(&self, object: ObjectRef<'_>) -> TypeHandle {
        let handle = object.type_handle();
        trace!("get_type({:#x}) = {}", object.address(), handle);
        handle
    }

    pub fn type_equals(&self, a: TypeHandle, b: TypeHandle) -> bool {
        a == b
    }

    pub fn reference_equals(&self, a: Option<ObjectRef<'_>>, b: Option<ObjectRef<'_>>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            (None, None) => true,
            _ => false,
        }
    }
}
