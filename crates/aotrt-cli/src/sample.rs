//! A small demonstration hierarchy loaded by `--sample`.
use aotrt_types::{
    corlib::CorlibTypes, layout::Scalar, FieldType, MethodAddress, TypeDefinition, TypeHandle,
    TypeLoadError, TypeTable,
};

#[derive(Copy, Clone, Debug)]
pub struct SampleTypes {
    pub drawable: TypeHandle,
    pub scalable: TypeHandle,
    pub shape: TypeHandle,
    pub circle: TypeHandle,
    pub square: TypeHandle,
    pub point: TypeHandle,
}

pub fn load(table: &TypeTable, corlib: &CorlibTypes) -> Result<SampleTypes, TypeLoadError> {
    let drawable = table.define(TypeDefinition::interface("Sample.IDrawable").interface_method("Draw"))?;
    let scalable = table.define(
        TypeDefinition::interface("Sample.IScalable")
            .implements(drawable)
            .interface_method("Scale"),
    )?;
    let point = table.define(
        TypeDefinition::value_type("Sample.Point")
            .extends(corlib.value_type)
            .field("X", Scalar::Int32)
            .field("Y", Scalar::Int32),
    )?;
    let shape = table.define(
        TypeDefinition::abstract_class("Sample.Shape")
            .extends(corlib.object)
            .implements(drawable)
            .field("Origin", FieldType::Inline(point))
            .field("Next", FieldType::reference())
            .virtual_method("Area", MethodAddress(0x1000))
            .virtual_method("Draw", MethodAddress(0x1010)),
    )?;
    let circle = table.define(
        TypeDefinition::class("Sample.Circle")
            .extends(shape)
            .implements(scalable)
            .field("Radius", Scalar::Float64)
            .virtual_method("Area", MethodAddress(0x2000))
            .method("Scale", MethodAddress(0x2010)),
    )?;
    let square = table.define(
        TypeDefinition::class("Sample.Square")
            .extends(shape)
            .field("Side", Scalar::Float64)
            .virtual_method("Area", MethodAddress(0x3000))
            .explicit_impl("Sample.IDrawable.Draw", MethodAddress(0x3010)),
    )?;
    Ok(SampleTypes {
        drawable,
        scalable,
        shape,
        circle,
        square,
        point,
    })
}
