//! The handful of core library types every program needs before its own types load.
use crate::{
    definition::TypeDefinition, descriptor::TypeHandle, error::TypeLoadError, layout::Scalar,
    table::TypeTable,
};

pub const OBJECT: &str = "System.Object";
pub const VALUE_TYPE: &str = "System.ValueType";
pub const ENUM: &str = "System.Enum";
pub const ARRAY: &str = "System.Array";

const PRIMITIVE_FIELD: &str = "m_value";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CorlibTypes {
    pub object: TypeHandle,
    pub value_type: TypeHandle,
    pub enum_: TypeHandle,
    pub array: TypeHandle,
    pub boolean: TypeHandle,
    pub char: TypeHandle,
    pub sbyte: TypeHandle,
    pub byte: TypeHandle,
    pub int16: TypeHandle,
    pub uint16: TypeHandle,
    pub int32: TypeHandle,
    pub uint32: TypeHandle,
    pub int64: TypeHandle,
    pub uint64: TypeHandle,
    pub intptr: TypeHandle,
    pub uintptr: TypeHandle,
    pub single: TypeHandle,
    pub double: TypeHandle,
}

/// Defines the core types in `table` and registers `System.Array` as the
/// base of every array type. The table must not have a root type yet.
pub fn bootstrap(table: &TypeTable) -> Result<CorlibTypes, TypeLoadError> {
    let object = table.define(TypeDefinition::class(OBJECT))?;
    let value_type = table.define(TypeDefinition::abstract_class(VALUE_TYPE).extends(object))?;
    let enum_ = table.define(TypeDefinition::abstract_class(ENUM).extends(value_type))?;
    let array = table.define(TypeDefinition::abstract_class(ARRAY).extends(object))?;
    table.set_array_base(array)?;

    let primitive = |name: &str, scalar: Scalar| {
        table.define(
            TypeDefinition::value_type(name)
                .extends(value_type)
                .field(PRIMITIVE_FIELD, scalar),
        )
    };

    Ok(CorlibTypes {
        object,
        value_type,
        enum_,
        array,
        boolean: primitive("System.Boolean", Scalar::UInt8)?,
        char: primitive("System.Char", Scalar::UInt16)?,
        sbyte: primitive("System.SByte", Scalar::Int8)?,
        byte: primitive("System.Byte", Scalar::UInt8)?,
        int16: primitive("System.Int16", Scalar::Int16)?,
        uint16: primitive("System.UInt16", Scalar::UInt16)?,
        int32: primitive("System.Int32", Scalar::Int32)?,
        uint32: primitive("System.UInt32", Scalar::Int32)?,
        int64: primitive("System.Int64", Scalar::Int64)?,
        uint64: primitive("System.UInt64", Scalar::Int64)?,
        intptr: primitive("System.IntPtr", Scalar::NativeInt)?,
        uintptr: primitive("System.UIntPtr", Scalar::NativeInt)?,
        single: primitive("System.Single", Scalar::Float32)?,
        double: primitive("System.Double", Scalar::Float64)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::HEADER_SIZE;
    use aotrt_utils::POINTER_SIZE;

    #[test]
    fn test_bootstrap_defines_root_and_array_base() {
        let table = TypeTable::new();
        let types = bootstrap(&table).unwrap();
        assert_eq!(table.root(), Some(types.object));
        assert_eq!(table.array_base(), Some(types.array));
        assert_eq!(table.find(OBJECT), Some(types.object));
        assert_eq!(table.by_name("System.Double").unwrap().handle, types.double);
    }

    #[test]
    fn test_primitive_sizes() {
        let table = TypeTable::new();
        let types = bootstrap(&table).unwrap();
        let storage = |h| table.get(h).unwrap().storage_size as usize;
        assert_eq!(storage(types.boolean), 1);
        assert_eq!(storage(types.char), 2);
        assert_eq!(storage(types.int32), 4);
        assert_eq!(storage(types.int64), 8);
        assert_eq!(storage(types.intptr), POINTER_SIZE);
        assert_eq!(storage(types.double), 8);
        assert_eq!(storage(types.object), POINTER_SIZE);

        let boxed_int = table.get(types.int32).unwrap();
        assert_eq!(boxed_int.object_size as usize, 2 * POINTER_SIZE);
        assert_eq!(table.get(types.object).unwrap().object_size as usize, HEADER_SIZE);
    }

    #[test]
    fn test_bootstrap_twice_fails() {
        let table = TypeTable::new();
        bootstrap(&table).unwrap();
        assert!(matches!(
            bootstrap(&table),
            Err(TypeLoadError::DuplicateType(name)) if name == OBJECT
        ));
    }
}
