//! Field setters: one resolved conversion plus the write into one field.

use std::fmt;
use tracing::debug;

use super::parser::ValueParser;
use super::source::BindingSource;
use crate::descriptor::{FieldWriter, JsonReader, ParsedValue};

enum Strategy {
    /// Parse the first value.
    Parsed(ValueParser),
    /// Hand over every value as `Vec<String>`.
    StringList,
}

/// Writes one route, query, header or form value into a field.
///
/// Built once with the plan and shared read-only by every request bound against it.
pub struct FieldSetter<T> {
    field: &'static str,
    key: String,
    source: BindingSource,
    strategy: Strategy,
    writer: FieldWriter<T>,
}

impl<T> fmt::Debug for FieldSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSetter")
            .field("field", &self.field)
            .field("key", &self.key)
            .field("source", &self.source)
            .field(
                "strategy",
                &match self.strategy {
                    Strategy::Parsed(_) => "parsed",
                    Strategy::StringList => "string-list",
                },
            )
            .finish()
    }
}

impl<T> FieldSetter<T> {
    pub(crate) fn parsed(
        field: &'static str,
        key: String,
        source: BindingSource,
        parser: ValueParser,
        writer: FieldWriter<T>,
    ) -> Self {
        Self {
            field,
            key,
            source,
            strategy: Strategy::Parsed(parser),
            writer,
        }
    }

    pub(crate) fn string_list(
        field: &'static str,
        key: String,
        source: BindingSource,
        writer: FieldWriter<T>,
    ) -> Self {
        Self {
            field,
            key,
            source,
            strategy: Strategy::StringList,
            writer,
        }
    }

    #[must_use]
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Key looked up in the request (alias, route parameter name, or field name).
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn source(&self) -> BindingSource {
        self.source
    }

    /// Convert `values` and write the result. Scalars use the first value.
    ///
    /// Returns whether the field was written; a value that does not parse leaves the field
    /// untouched.
    pub fn apply(&self, target: &mut T, values: &[&str]) -> bool {
        match &self.strategy {
            Strategy::StringList => {
                let list: Vec<String> = values.iter().map(|v| (*v).to_string()).collect();
                (self.writer)(target, Box::new(list))
            }
            Strategy::Parsed(parse) => {
                let Some(raw) = values.first() else {
                    return false;
                };
                match parse(raw) {
                    Some(value) => (self.writer)(target, value),
                    None => {
                        debug!(
                            field = self.field,
                            key = %self.key,
                            source = %self.source,
                            "Value did not parse; field keeps its default"
                        );
                        false
                    }
                }
            }
        }
    }
}

/// Field receiving a whole-body JSON document.
pub struct BodyField<T> {
    pub(crate) field: &'static str,
    pub(crate) type_name: &'static str,
    pub(crate) reader: JsonReader,
    pub(crate) writer: FieldWriter<T>,
}

impl<T> fmt::Debug for BodyField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyField")
            .field("field", &self.field)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl<T> BodyField<T> {
    #[must_use]
    pub fn field(&self) -> &'static str {
        self.field
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Field receiving a value the binder produces itself (uploaded files, ambient objects).
pub struct ValueSlot<T> {
    pub(crate) field: &'static str,
    pub(crate) writer: FieldWriter<T>,
}

impl<T> fmt::Debug for ValueSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSlot")
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

impl<T> ValueSlot<T> {
    #[must_use]
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub(crate) fn write(&self, target: &mut T, value: ParsedValue) -> bool {
        (self.writer)(target, value)
    }
}
