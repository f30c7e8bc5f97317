//! The set of endpoint request types an application serves.

use std::any::TypeId;
use std::fmt;

use super::core::RouteBindApp;
use crate::descriptor::{EndpointMetadata, EndpointRequest};

type MapFn = fn(&mut RouteBindApp) -> anyhow::Result<()>;

/// One endpoint request type, erased.
#[derive(Clone, Copy)]
pub struct EndpointEntry {
    type_id: TypeId,
    type_name: &'static str,
    metadata: fn() -> EndpointMetadata,
    map: MapFn,
}

impl fmt::Debug for EndpointEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointEntry")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

fn metadata_of<T: EndpointRequest>() -> EndpointMetadata {
    T::descriptor().into_parts().0
}

fn map_of<T: EndpointRequest>(app: &mut RouteBindApp) -> anyhow::Result<()> {
    app.map_request::<T>()
}

impl EndpointEntry {
    #[must_use]
    pub fn of<T: EndpointRequest>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            metadata: metadata_of::<T>,
            map: map_of::<T>,
        }
    }

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Describe the type. Runs its descriptor on every call.
    #[must_use]
    pub fn metadata(&self) -> EndpointMetadata {
        (self.metadata)()
    }

    pub(crate) fn map_into(&self, app: &mut RouteBindApp) -> anyhow::Result<()> {
        (self.map)(app)
    }
}

/// A named collection of endpoint request types.
///
/// The name selects the documentation file (`<docs_dir>/<name>.xml`).
///
/// ```rust,ignore
/// let module = EndpointModule::new("sample_project")
///     .endpoint::<SampleGetRequest>()
///     .endpoint::<CreateUserRequest>();
/// ```
#[derive(Debug, Clone)]
pub struct EndpointModule {
    name: String,
    entries: Vec<EndpointEntry>,
}

impl EndpointModule {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Add `T`. Adding the same type twice keeps the first entry.
    #[must_use]
    pub fn endpoint<T: EndpointRequest>(mut self) -> Self {
        let entry = EndpointEntry::of::<T>();
        if !self.entries.iter().any(|e| e.type_id == entry.type_id) {
            self.entries.push(entry);
        }
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn entries(&self) -> &[EndpointEntry] {
        &self.entries
    }

    /// Metadata of every type, in the order they were added.
    #[must_use]
    pub fn metadata(&self) -> Vec<EndpointMetadata> {
        self.entries.iter().map(EndpointEntry::metadata).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::RequestDescriptor;
    use crate::route::RouteTemplate;

    #[derive(Default)]
    struct First;

    impl EndpointRequest for First {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::new().route(RouteTemplate::get("/first"))
        }
    }

    #[derive(Default)]
    struct Second;

    impl EndpointRequest for Second {
        fn descriptor() -> RequestDescriptor<Self> {
            RequestDescriptor::new().route(RouteTemplate::post("/second"))
        }
    }

    #[test]
    fn test_entries_keep_order_without_duplicates() {
        let module = EndpointModule::new("probe")
            .endpoint::<First>()
            .endpoint::<Second>()
            .endpoint::<First>();
        assert_eq!(module.len(), 2);
        let metadata = module.metadata();
        assert_eq!(metadata[0].simple_name(), "First");
        assert_eq!(metadata[1].routes[0].template, "/second");
        assert_eq!(module.entries()[1].type_id(), TypeId::of::<Second>());
    }
}
