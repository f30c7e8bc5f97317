use std::fmt;

/// Error raised while building a binding plan or materializing a request.
///
/// [`BindingError::UnsupportedType`] is a declaration error and surfaces when the plan is
/// built. The other variants are per-request and become a `400` (or, for cancellation,
/// no response at all) at the point where the request is being constructed.
#[derive(Debug)]
pub enum BindingError {
    /// A route/query/header/form field has a type with no parser.
    UnsupportedType {
        /// Field name on the request type
        field: &'static str,
        /// Rust type name of the field
        type_name: &'static str,
    },
    /// The JSON body could not be deserialized into a body field.
    MalformedJson {
        /// Target type of the body field
        type_name: &'static str,
        /// Underlying deserializer message
        message: String,
    },
    /// The request was explicitly rejected while binding (e.g. malformed multipart).
    Rejected(String),
    /// The request was cancelled before binding completed.
    Cancelled,
    /// Reading the request body failed.
    Io(std::io::Error),
}

impl BindingError {
    /// Whether the error belongs to the client's request rather than the declaration.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BindingError::MalformedJson { .. } | BindingError::Rejected(_) | BindingError::Io(_)
        )
    }
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingError::UnsupportedType { field, type_name } => {
                write!(
                    f,
                    "Binding error: no parser for field '{field}' of type '{type_name}'. \
                    Register a parser, implement TryParse, or bind the field from the body."
                )
            }
            BindingError::MalformedJson { type_name, message } => {
                write!(f, "Malformed JSON body for '{type_name}': {message}")
            }
            BindingError::Rejected(reason) => write!(f, "Request rejected: {reason}"),
            BindingError::Cancelled => write!(f, "Request cancelled while binding"),
            BindingError::Io(err) => write!(f, "Failed to read request body: {err}"),
        }
    }
}

impl std::error::Error for BindingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BindingError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BindingError {
    fn from(err: std::io::Error) -> Self {
        BindingError::Io(err)
    }
}
