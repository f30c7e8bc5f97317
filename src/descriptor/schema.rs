//! Schema descriptions for JSON body and response types.
//!
//! `#[derive(ApiSchema)]` implements [`ApiSchema`] and [`SchemaField`] for a struct; the
//! OpenAPI generator turns the resulting [`ObjectSchema`] into a component schema.

use std::any::TypeId;
use std::fmt;

use super::types::{EnumMembers, SchemaType};

/// A structured type that can appear as a JSON body or a declared response.
pub trait ApiSchema: 'static {
    /// Component name, the type's simple name unless overridden.
    fn schema_name() -> &'static str;

    /// Properties in declaration order.
    fn properties() -> Vec<PropertySchema>;
}

/// A type that can appear as a property of an [`ApiSchema`] type.
pub trait SchemaField {
    fn schema_type() -> SchemaType;

    fn is_nullable() -> bool {
        false
    }
}

impl<T: SchemaField> SchemaField for Option<T> {
    fn schema_type() -> SchemaType {
        T::schema_type()
    }

    fn is_nullable() -> bool {
        true
    }
}

impl<T: SchemaField> SchemaField for Vec<T> {
    fn schema_type() -> SchemaType {
        SchemaType::Array(Box::new(T::schema_type()))
    }
}

impl<T: SchemaField> SchemaField for Box<T> {
    fn schema_type() -> SchemaType {
        T::schema_type()
    }

    fn is_nullable() -> bool {
        T::is_nullable()
    }
}

/// Schema of an enum property; used by `#[derive(BindableEnum)]`.
#[must_use]
pub fn enum_schema<T: EnumMembers>() -> SchemaType {
    fn names<T: EnumMembers>() -> Vec<&'static str> {
        T::members().iter().map(|(name, _)| *name).collect()
    }
    SchemaType::Enum { members: names::<T> }
}

/// Lazily described reference to an [`ApiSchema`] type.
#[derive(Clone, Copy)]
pub struct ObjectRef {
    pub type_id: TypeId,
    pub name: &'static str,
    pub type_path: &'static str,
    pub describe: fn() -> ObjectSchema,
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("name", &self.name)
            .field("type_path", &self.type_path)
            .finish_non_exhaustive()
    }
}

fn describe<T: ApiSchema>() -> ObjectSchema {
    ObjectSchema {
        type_path: std::any::type_name::<T>(),
        properties: T::properties(),
    }
}

#[must_use]
pub fn object_ref<T: ApiSchema>() -> ObjectRef {
    ObjectRef {
        type_id: TypeId::of::<T>(),
        name: T::schema_name(),
        type_path: std::any::type_name::<T>(),
        describe: describe::<T>,
    }
}

/// Fully described object schema.
#[derive(Debug, Clone)]
pub struct ObjectSchema {
    pub type_path: &'static str,
    pub properties: Vec<PropertySchema>,
}

/// One property of an [`ObjectSchema`].
#[derive(Debug, Clone)]
pub struct PropertySchema {
    /// Rust field name, used for documentation lookups.
    pub field: &'static str,
    /// Name on the wire.
    pub name: String,
    pub schema: SchemaType,
    pub nullable: bool,
    pub example: Option<&'static str>,
}

impl PropertySchema {
    #[must_use]
    pub fn of<F: SchemaField>(field: &'static str, name: impl Into<String>) -> Self {
        Self {
            field,
            name: name.into(),
            schema: F::schema_type(),
            nullable: F::is_nullable(),
            example: None,
        }
    }

    #[must_use]
    pub fn with_example(mut self, example: &'static str) -> Self {
        self.example = Some(example);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Address;

    impl ApiSchema for Address {
        fn schema_name() -> &'static str {
            "Address"
        }

        fn properties() -> Vec<PropertySchema> {
            vec![
                PropertySchema::of::<String>("street", "street"),
                PropertySchema::of::<Option<u16>>("zip_code", "zipCode").with_example("90210"),
            ]
        }
    }

    #[test]
    fn test_object_ref_describes_lazily() {
        let r = object_ref::<Address>();
        assert_eq!(r.name, "Address");
        let schema = (r.describe)();
        assert_eq!(schema.properties.len(), 2);
        assert!(schema.properties[1].nullable);
        assert_eq!(schema.properties[1].example, Some("90210"));
        assert_eq!(
            schema.properties[1].schema.type_and_format(),
            ("integer", "uint16")
        );
    }

    #[test]
    fn test_vec_property_is_array() {
        let schema = <Vec<i32> as SchemaField>::schema_type();
        match schema {
            SchemaType::Array(item) => assert_eq!(item.type_and_format(), ("integer", "int32")),
            other => panic!("expected array, got {other:?}"),
        }
    }
}
