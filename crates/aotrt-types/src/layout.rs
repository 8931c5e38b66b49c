//! Binary layout of heap objects and their fields.
//!
//! ```text
//! object: [ descriptor ptr | fields ...                       ]
//! array:  [ descriptor ptr | length: u32 | pad | elements ... ]
//! ```
//! The offsets below are part of the contract with compiled code.
use aotrt_utils::{align_up, POINTER_SIZE};
use enum_dispatch::enum_dispatch;
use serde::Serialize;
use std::collections::HashMap;

/// Size of the object header: a single descriptor pointer.
pub const HEADER_SIZE: usize = POINTER_SIZE;
/// Offset of the `u32` element count in an array object.
pub const ARRAY_LENGTH_OFFSET: usize = HEADER_SIZE;
/// Offset of the first array element. The length word is padded to 8 bytes
/// so that elements of every primitive type start naturally aligned.
pub const ARRAY_DATA_OFFSET: usize = ARRAY_LENGTH_OFFSET + 8;

#[enum_dispatch]
pub trait HasLayout {
    fn size(&self) -> usize;
    fn alignment(&self) -> usize;
}

#[enum_dispatch(HasLayout)]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum LayoutManager {
    FieldLayoutManager,
    Scalar,
}

impl LayoutManager {
    pub fn type_tag(&self) -> &'static str {
        match &self {
            LayoutManager::FieldLayoutManager(_) => "struct",
            LayoutManager::Scalar(s) => s.type_tag(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Scalar {
    ObjectRef,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    Int64,
    NativeInt,
    Float32,
    Float64,
}

impl Scalar {
    pub fn type_tag(self) -> &'static str {
        match self {
            Scalar::ObjectRef => "obj",
            Scalar::Int8 | Scalar::UInt8 => "i8",
            Scalar::Int16 | Scalar::UInt16 => "i16",
            Scalar::Int32 => "i32",
            Scalar::Int64 => "i64",
            Scalar::NativeInt => "ptr",
            Scalar::Float32 => "f32",
            Scalar::Float64 => "f64",
        }
    }
}

impl HasLayout for Scalar {
    fn size(&self) -> usize {
        match self {
            Scalar::Int8 | Scalar::UInt8 => 1,
            Scalar::Int16 | Scalar::UInt16 => 2,
            Scalar::Int32 | Scalar::Float32 => 4,
            Scalar::Int64 | Scalar::Float64 => 8,
            Scalar::ObjectRef | Scalar::NativeInt => POINTER_SIZE,
        }
    }

    fn alignment(&self) -> usize {
        self.size()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldLayout {
    pub position: usize,
    pub layout: LayoutManager,
}

/// How a type's own fields are placed after whatever it inherits.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum LayoutKind {
    /// Every field gets a pointer-aligned slot.
    #[default]
    Automatic,
    /// Declaration order, each field at its natural alignment. The total
    /// size is padded to the strictest field alignment so that consecutive
    /// array elements stay aligned.
    Sequential,
}

#[derive(Clone, Debug, PartialEq, Default, Serialize)]
pub struct FieldLayoutManager {
    pub fields: HashMap<String, FieldLayout>,
    pub total_size: usize,
    pub alignment: usize,
}

impl HasLayout for FieldLayoutManager {
    fn size(&self) -> usize {
        self.total_size
    }

    fn alignment(&self) -> usize {
        self.alignment.max(1)
    }
}

impl FieldLayoutManager {
    /// Lays out `fields` after `inherited`, whose fields keep their offsets.
    ///
    /// Returns the name of the first field that is declared twice.
    pub fn extend<'a>(
        inherited: &FieldLayoutManager,
        fields: impl IntoIterator<Item = (&'a str, LayoutManager)>,
        kind: LayoutKind,
    ) -> Result<Self, String> {
        let mut mapping = inherited.fields.clone();
        let mut offset = inherited.total_size;
        let mut alignment = inherited.alignment.max(1);

        for (name, layout) in fields {
            let (position, advance) = match kind {
                LayoutKind::Automatic => (offset, align_up(layout.size(), POINTER_SIZE)),
                LayoutKind::Sequential => (align_up(offset, layout.alignment()), layout.size()),
            };
            alignment = alignment.max(layout.alignment());
            if mapping.contains_key(name) {
                return Err(name.to_string());
            }
            mapping.insert(name.to_string(), FieldLayout { position, layout });
            offset = position + advance;
        }

        let total_size = match kind {
            LayoutKind::Automatic => offset,
            LayoutKind::Sequential => align_up(offset, alignment),
        };
        Ok(Self {
            fields: mapping,
            total_size,
            alignment,
        })
    }

    /// An empty layout whose fields start at `offset`.
    pub fn starting_at(offset: usize) -> Self {
        Self {
            fields: HashMap::new(),
            total_size: offset,
            alignment: 1,
        }
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.get(name)
    }

    /// Fields ordered by offset.
    pub fn ordered(&self) -> Vec<(&str, &FieldLayout)> {
        let mut fields: Vec<_> = self
            .fields
            .iter()
            .map(|(name, field)| (name.as_str(), field))
            .collect();
        fields.sort_by_key(|(_, field)| field.position);
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_offsets() {
        assert_eq!(ARRAY_LENGTH_OFFSET, HEADER_SIZE);
        assert_eq!(ARRAY_DATA_OFFSET % 8, 0);
        assert!(ARRAY_DATA_OFFSET >= ARRAY_LENGTH_OFFSET + 4);
    }

    #[test]
    fn test_automatic_layout_is_pointer_slotted() {
        let base = FieldLayoutManager::starting_at(HEADER_SIZE);
        let layout = FieldLayoutManager::extend(
            &base,
            [
                ("flag", LayoutManager::from(Scalar::UInt8)),
                ("count", LayoutManager::from(Scalar::Int32)),
            ],
            LayoutKind::Automatic,
        )
        .unwrap();
        assert_eq!(layout.get_field("flag").unwrap().position, HEADER_SIZE);
        assert_eq!(
            layout.get_field("count").unwrap().position,
            HEADER_SIZE + POINTER_SIZE
        );
        assert_eq!(layout.size(), HEADER_SIZE + 2 * POINTER_SIZE);
    }

    #[test]
    fn test_sequential_layout_uses_natural_alignment() {
        let layout = FieldLayoutManager::extend(
            &FieldLayoutManager::default(),
            [
                ("a", LayoutManager::from(Scalar::UInt8)),
                ("b", LayoutManager::from(Scalar::Int32)),
                ("c", LayoutManager::from(Scalar::Int16)),
            ],
            LayoutKind::Sequential,
        )
        .unwrap();
        let order: Vec<_> = layout.ordered().into_iter().map(|(n, f)| (n, f.position)).collect();
        assert_eq!(order, vec![("a", 0), ("b", 4), ("c", 8)]);
        // Trailing padding up to the 4-byte alignment.
        assert_eq!(layout.size(), 12);
        assert_eq!(layout.alignment(), 4);
    }

    #[test]
    fn test_duplicate_field_is_reported() {
        let first = FieldLayoutManager::extend(
            &FieldLayoutManager::default(),
            [("x", LayoutManager::from(Scalar::Int32))],
            LayoutKind::Sequential,
        )
        .unwrap();
        let err = FieldLayoutManager::extend(&first, [("x", LayoutManager::from(Scalar::Int64))], LayoutKind::Automatic);
        assert_eq!(err, Err("x".to_string()));
    }

    #[test]
    fn test_type_tags() {
        let nested: LayoutManager = FieldLayoutManager::extend(
            &FieldLayoutManager::default(),
            [("next", LayoutManager::from(Scalar::ObjectRef))],
            LayoutKind::Automatic,
        )
        .unwrap()
        .into();
        assert_eq!(nested.type_tag(), "struct");
        assert_eq!(LayoutManager::from(Scalar::Float64).type_tag(), "f64");
        assert_eq!(LayoutManager::from(Scalar::ObjectRef).type_tag(), "obj");
    }
}
