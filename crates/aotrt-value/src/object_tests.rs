#[cfg(test)]
mod tests {
    use crate::{
        array::ArrayRef, error::MemoryError, object::ObjectRef, ARRAY_DATA_OFFSET,
        ARRAY_LENGTH_OFFSET, HEADER_SIZE,
    };
    use aotrt_types::{
        corlib, layout::Scalar, FieldType, TypeDefinition, TypeDescriptor, TypeHandle, TypeTable,
    };
    use aotrt_utils::POINTER_SIZE;
    use std::ptr::NonNull;

    /// Hand-builds a leaked, zeroed block stamped with `descriptor`.
    fn fake_object(descriptor: &'static TypeDescriptor, length: Option<u32>) -> ObjectRef<'static> {
        let size = match length {
            Some(len) => ARRAY_DATA_OFFSET + len as usize * descriptor.element_size as usize,
            None => descriptor.object_size as usize,
        };
        let words = size.div_ceil(POINTER_SIZE).max(1);
        let block: &'static mut [usize] = Box::leak(vec![0usize; words].into_boxed_slice());
        let base = block.as_mut_ptr() as *mut u8;
        unsafe {
            (base as *mut &'static TypeDescriptor).write(descriptor);
            if let Some(len) = length {
                (base.add(ARRAY_LENGTH_OFFSET) as *mut u32).write(len);
            }
            ObjectRef::from_raw(NonNull::new_unchecked(base))
        }
    }

    struct Fixture {
        table: TypeTable,
        node: TypeHandle,
        point: TypeHandle,
        int32: TypeHandle,
    }

    fn fixture() -> Fixture {
        let table = TypeTable::new();
        let types = corlib::bootstrap(&table).unwrap();
        let node = table
            .define(
                TypeDefinition::class("Node")
                    .extends(types.object)
                    .field("value", Scalar::Int32)
                    .field("next", FieldType::reference()),
            )
            .unwrap();
        let point = table
            .define(
                TypeDefinition::value_type("Point")
                    .extends(types.value_type)
                    .field("x", Scalar::Int32)
                    .field("y", Scalar::Int32),
            )
            .unwrap();
        Fixture {
            table,
            node,
            point,
            int32: types.int32,
        }
    }

    #[test]
    fn test_header_identifies_descriptor() {
        let f = fixture();
        let obj = fake_object(f.table.get(f.node).unwrap(), None);
        assert_eq!(obj.type_handle(), f.node);
        assert_eq!(obj.descriptor().name, "Node");
        assert!(!obj.is_array());
        assert_eq!(obj.byte_size(), HEADER_SIZE + 2 * POINTER_SIZE);
        assert_eq!(obj.read_word(0).unwrap(), f.table.get(f.node).unwrap() as *const _ as usize);
    }

    #[test]
    fn test_field_access_by_name() {
        let f = fixture();
        let obj = fake_object(f.table.get(f.node).unwrap(), None);
        let value = obj.field_offset("value").unwrap();
        obj.write_i32(value, -17).unwrap();
        assert_eq!(obj.read_i32(value).unwrap(), -17);

        let next = obj.field_offset("next").unwrap();
        assert_eq!(obj.read_word(next).unwrap(), 0);
        obj.write_ref(next, Some(obj)).unwrap();
        assert_eq!(obj.read_word(next).unwrap(), obj.address());
        obj.write_ref(next, None).unwrap();
        assert_eq!(obj.read_word(next).unwrap(), 0);

        assert_eq!(
            obj.field_offset("missing"),
            Err(MemoryError::UnknownField {
                ty: "Node".to_string(),
                field: "missing".to_string()
            })
        );
    }

    #[test]
    fn test_boxed_value_type_fields_follow_header() {
        let f = fixture();
        let boxed = fake_object(f.table.get(f.point).unwrap(), None);
        assert_eq!(boxed.field_offset("x").unwrap(), HEADER_SIZE);
        assert_eq!(boxed.field_offset("y").unwrap(), HEADER_SIZE + 4);
    }

    #[test]
    fn test_header_and_bounds_are_protected() {
        let f = fixture();
        let obj = fake_object(f.table.get(f.node).unwrap(), None);
        assert_eq!(obj.write_i32(0, 1), Err(MemoryError::HeaderWrite(0)));
        let size = obj.byte_size();
        assert_eq!(
            obj.read_i64(size - 4),
            Err(MemoryError::AccessViolation {
                offset: size - 4,
                len: 8,
                size
            })
        );
        assert!(obj.read_i32(usize::MAX).is_err());
    }

    #[test]
    fn test_compare_exchange_word() {
        let f = fixture();
        let obj = fake_object(f.table.get(f.node).unwrap(), None);
        let other = fake_object(f.table.get(f.node).unwrap(), None);
        let next = obj.field_offset("next").unwrap();

        // Comparand matches null: stores and reports the old null.
        assert_eq!(obj.compare_exchange_word(next, other.address(), 0), Ok(0));
        // Comparand no longer matches: nothing stored, current value reported.
        assert_eq!(
            obj.compare_exchange_word(next, obj.address(), 0),
            Ok(other.address())
        );
        assert_eq!(obj.read_word(next).unwrap(), other.address());

        assert_eq!(
            obj.compare_exchange_word(next + 1, 0, 0),
            Err(MemoryError::Misaligned {
                offset: next + 1,
                align: POINTER_SIZE
            })
        );
        assert_eq!(obj.compare_exchange_word(0, 0, 0), Err(MemoryError::HeaderWrite(0)));
    }

    #[test]
    fn test_array_view() {
        let f = fixture();
        let ints = f.table.get_array_type(f.int32).unwrap();
        let obj = fake_object(f.table.get(ints).unwrap(), Some(5));
        let array = ArrayRef::try_from(obj).unwrap();
        assert_eq!(array.len(), 5);
        assert_eq!(array.element_size(), 4);
        assert_eq!(array.element_type(), Some(f.int32));
        assert_eq!(array.byte_len(), 20);
        assert_eq!(obj.byte_size(), ARRAY_DATA_OFFSET + 20);

        array.write_element(4, &7i32.to_ne_bytes()).unwrap();
        let mut out = [0u8; 4];
        array.read_element(4, &mut out).unwrap();
        assert_eq!(i32::from_ne_bytes(out), 7);

        assert_eq!(
            array.write_element(5, &[0; 4]),
            Err(MemoryError::IndexOutOfRange { index: 5, length: 5 })
        );
        assert_eq!(
            array.write_element(0, &[0; 8]),
            Err(MemoryError::SizeMismatch { expected: 4, actual: 8 })
        );
        assert_eq!(array.element_range(1, 3), Ok(4..16));
        assert!(array.element_range(3, 3).is_err());
        assert_eq!(
            obj.write_i32(ARRAY_LENGTH_OFFSET, 100),
            Err(MemoryError::HeaderWrite(ARRAY_LENGTH_OFFSET))
        );
    }

    #[test]
    fn test_non_array_is_rejected() {
        let f = fixture();
        let obj = fake_object(f.table.get(f.node).unwrap(), None);
        assert_eq!(
            ArrayRef::try_from(obj),
            Err(MemoryError::NotAnArray("Node".to_string()))
        );
    }
}
