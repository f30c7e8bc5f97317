//! Static type information for bindable field types.
//!
//! [`TypeInfo`] is what the plan builder and the OpenAPI generator know about a field's
//! type: its identity, its shape (scalar, enum, string list, file, ambient, object), the
//! OpenAPI primitive it maps to, and the conversion hooks the parser registry falls back
//! to when the type is not registered directly.

use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::fmt;

use super::schema::{enum_schema, ObjectRef, SchemaField};

/// A parsed value on its way into a field. The concrete type is the field's type with any
/// `Option` wrapper removed.
pub type ParsedValue = Box<dyn Any + Send>;

/// String to value conversion. `None` means the input did not parse.
pub type RawParser = fn(&str) -> Option<ParsedValue>;

/// Whole-payload JSON deserialization into a body field's type.
pub type JsonReader = fn(&[u8]) -> Result<ParsedValue, serde_json::Error>;

/// Which ambient per-request object a field receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbientKind {
    Context,
    Request,
    Response,
}

/// Coarse classification of a field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape {
    /// String, numbers, bool, date/time kinds, identifiers, byte arrays.
    Scalar,
    /// Unit-only enum parsed by member name.
    Enum,
    /// Repeated string values (`Vec<String>`).
    StringList,
    /// One uploaded file.
    File,
    /// Every uploaded file.
    FileCollection,
    /// Per-request context object, never parsed.
    Ambient(AmbientKind),
    /// Structured type read from a JSON body.
    Object,
}

impl TypeShape {
    /// Whether binding-source inference may assign this shape to route or query.
    #[must_use]
    pub fn is_inferable(self) -> bool {
        matches!(self, TypeShape::Scalar | TypeShape::Enum)
    }
}

/// OpenAPI schema of a field or property.
#[derive(Clone)]
pub enum SchemaType {
    Primitive {
        ty: &'static str,
        format: &'static str,
    },
    /// String enum listing member names.
    Enum { members: fn() -> Vec<&'static str> },
    Array(Box<SchemaType>),
    /// Reference to a component schema.
    Object(ObjectRef),
}

impl SchemaType {
    #[must_use]
    pub const fn primitive(ty: &'static str, format: &'static str) -> Self {
        SchemaType::Primitive { ty, format }
    }

    /// `(type, format)` as written on a parameter or form property.
    ///
    /// Enums are strings; arrays and objects report their outer type with an empty format.
    #[must_use]
    pub fn type_and_format(&self) -> (&'static str, &'static str) {
        match self {
            SchemaType::Primitive { ty, format } => (ty, format),
            SchemaType::Enum { .. } => ("string", "string"),
            SchemaType::Array(_) => ("array", ""),
            SchemaType::Object(_) => ("object", ""),
        }
    }
}

impl fmt::Debug for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaType::Primitive { ty, format } => write!(f, "{ty}({format})"),
            SchemaType::Enum { members } => f.debug_tuple("Enum").field(&members()).finish(),
            SchemaType::Array(item) => f.debug_tuple("Array").field(item).finish(),
            SchemaType::Object(obj) => f.debug_tuple("Object").field(&obj.name).finish(),
        }
    }
}

/// Everything known statically about a field type.
#[derive(Clone)]
pub struct TypeInfo {
    /// Identity of the type with any `Option` wrapper removed. Parser registry key.
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub shape: TypeShape,
    /// The field is `Option<_>`.
    pub nullable: bool,
    pub schema: SchemaType,
    pub enum_parser: Option<RawParser>,
    pub try_parse: Option<RawParser>,
    pub json_reader: Option<JsonReader>,
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("type_name", &self.type_name)
            .field("shape", &self.shape)
            .field("nullable", &self.nullable)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl TypeInfo {
    fn base<T: 'static>(shape: TypeShape, schema: SchemaType) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            shape,
            nullable: false,
            schema,
            enum_parser: None,
            try_parse: None,
            json_reader: None,
        }
    }

    /// A scalar resolved through the parser registry.
    #[must_use]
    pub fn scalar<T: 'static>(ty: &'static str, format: &'static str) -> Self {
        Self::base::<T>(TypeShape::Scalar, SchemaType::primitive(ty, format))
    }

    /// A unit enum parsed case-insensitively by member name.
    #[must_use]
    pub fn enumeration<T: EnumMembers>() -> Self {
        let mut info = Self::base::<T>(TypeShape::Enum, enum_schema::<T>());
        info.enum_parser = Some(parse_enum::<T>);
        info
    }

    /// A scalar that is not registered but knows how to parse itself.
    #[must_use]
    pub fn parsable<T: TryParse + Send + 'static>(ty: &'static str, format: &'static str) -> Self {
        let mut info = Self::scalar::<T>(ty, format);
        info.try_parse = Some(parse_with::<T>);
        info
    }

    #[must_use]
    pub fn string_list<T: 'static>() -> Self {
        Self::base::<T>(
            TypeShape::StringList,
            SchemaType::Array(Box::new(SchemaType::primitive("string", "string"))),
        )
    }

    #[must_use]
    pub fn file<T: 'static>() -> Self {
        Self::base::<T>(TypeShape::File, SchemaType::primitive("string", "binary"))
    }

    #[must_use]
    pub fn file_collection<T: 'static>() -> Self {
        Self::base::<T>(
            TypeShape::FileCollection,
            SchemaType::primitive("string", "binary"),
        )
    }

    #[must_use]
    pub fn ambient<T: 'static>(kind: AmbientKind) -> Self {
        Self::base::<T>(
            TypeShape::Ambient(kind),
            SchemaType::primitive("string", "string"),
        )
    }

    /// A structured type deserialized from a JSON body.
    #[must_use]
    pub fn object<T: SchemaField + DeserializeOwned + Send + 'static>() -> Self {
        let mut info = Self::base::<T>(TypeShape::Object, T::schema_type());
        info.nullable = T::is_nullable();
        info.json_reader = Some(read_json::<T>);
        info
    }

    #[must_use]
    pub fn into_nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// A type that can appear as a field of an endpoint request.
///
/// Implemented for the primitive and well-known scalar types, `Option<T>`, `Vec<String>`,
/// `Vec<u8>`, the uploaded-file types and the ambient context types. Enums get it from
/// `#[derive(BindableEnum)]`; other self-parsing types implement [`TryParse`] and return
/// [`TypeInfo::parsable`].
pub trait Bindable: Sized + Send + 'static {
    fn type_info() -> TypeInfo;

    /// Recover a field value from the registry's output.
    fn from_parsed(value: ParsedValue) -> Option<Self> {
        value.downcast::<Self>().ok().map(|v| *v)
    }
}

impl<T: Bindable> Bindable for Option<T> {
    fn type_info() -> TypeInfo {
        T::type_info().into_nullable()
    }

    fn from_parsed(value: ParsedValue) -> Option<Self> {
        T::from_parsed(value).map(Some)
    }
}

/// Types that parse themselves from a single string.
pub trait TryParse: Sized {
    fn try_parse(input: &str) -> Option<Self>;
}

/// Unit enums with a fixed, named member list.
pub trait EnumMembers: Copy + Send + 'static {
    fn members() -> &'static [(&'static str, Self)];
}

fn parse_enum<T: EnumMembers>(input: &str) -> Option<ParsedValue> {
    let input = input.trim();
    T::members()
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(input))
        .map(|(_, member)| Box::new(*member) as ParsedValue)
}

fn parse_with<T: TryParse + Send + 'static>(input: &str) -> Option<ParsedValue> {
    T::try_parse(input).map(|v| Box::new(v) as ParsedValue)
}

fn read_json<T: DeserializeOwned + Send + 'static>(bytes: &[u8]) -> Result<ParsedValue, serde_json::Error> {
    serde_json::from_slice::<T>(bytes).map(|v| Box::new(v) as ParsedValue)
}

macro_rules! scalar_types {
    ($($ty:ty => ($oa_type:literal, $format:literal)),* $(,)?) => {
        $(
            impl Bindable for $ty {
                fn type_info() -> TypeInfo {
                    TypeInfo::scalar::<$ty>($oa_type, $format)
                }
            }

            impl SchemaField for $ty {
                fn schema_type() -> SchemaType {
                    SchemaType::primitive($oa_type, $format)
                }
            }
        )*
    };
}

scalar_types! {
    String => ("string", "string"),
    char => ("string", "string"),
    bool => ("boolean", "boolean"),
    i8 => ("integer", "int32"),
    u8 => ("integer", "int32"),
    i16 => ("integer", "int16"),
    u16 => ("integer", "uint16"),
    i32 => ("integer", "int32"),
    u32 => ("integer", "uint32"),
    i64 => ("integer", "int64"),
    u64 => ("integer", "uint64"),
    isize => ("integer", "int64"),
    usize => ("integer", "uint64"),
    f32 => ("number", "float"),
    f64 => ("number", "double"),
    rust_decimal::Decimal => ("number", "decimal"),
    uuid::Uuid => ("string", "uuid"),
    chrono::NaiveDate => ("string", "date"),
    chrono::NaiveTime => ("string", "time"),
    chrono::NaiveDateTime => ("string", "date-time"),
    chrono::DateTime<chrono::Utc> => ("string", "date-time"),
    chrono::DateTime<chrono::FixedOffset> => ("string", "date-time"),
    std::time::Duration => ("string", "duration"),
}

impl Bindable for Vec<u8> {
    fn type_info() -> TypeInfo {
        TypeInfo::scalar::<Vec<u8>>("string", "byte")
    }
}

impl Bindable for Vec<String> {
    fn type_info() -> TypeInfo {
        TypeInfo::string_list::<Vec<String>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Color {
        Red,
        Green,
    }

    impl EnumMembers for Color {
        fn members() -> &'static [(&'static str, Self)] {
            &[("Red", Color::Red), ("Green", Color::Green)]
        }
    }

    #[test]
    fn test_option_reports_inner_type() {
        let info = <Option<i64> as Bindable>::type_info();
        assert!(info.nullable);
        assert_eq!(info.type_id, TypeId::of::<i64>());
        assert_eq!(info.schema.type_and_format(), ("integer", "int64"));

        let value: ParsedValue = Box::new(5_i64);
        assert_eq!(<Option<i64> as Bindable>::from_parsed(value), Some(Some(5)));
    }

    #[test]
    fn test_enum_parser_ignores_case() {
        let info = TypeInfo::enumeration::<Color>();
        let parse = info.enum_parser.unwrap();
        let parsed = parse("green").unwrap();
        assert_eq!(*parsed.downcast::<Color>().unwrap(), Color::Green);
        assert!(parse("blue").is_none());
        assert!(info.shape.is_inferable());
    }

    #[test]
    fn test_byte_array_is_scalar_string_list_is_not() {
        assert_eq!(<Vec<u8> as Bindable>::type_info().shape, TypeShape::Scalar);
        let list = <Vec<String> as Bindable>::type_info();
        assert_eq!(list.shape, TypeShape::StringList);
        assert!(!list.shape.is_inferable());
    }

    #[test]
    fn test_from_parsed_rejects_wrong_type() {
        let value: ParsedValue = Box::new("text".to_string());
        assert_eq!(<i32 as Bindable>::from_parsed(value), None);
    }
}
