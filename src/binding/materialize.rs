//! Applying a cached plan to a live request.

use tracing::debug;

use super::cache::PlanCache;
use super::error::BindingError;
use super::form::{
    is_form_content_type, is_json_content_type, parse_form, FormData, FormLimits, UploadedFiles,
};
use crate::context::{AbortSignal, HttpContext};
use crate::descriptor::EndpointRequest;

/// Bytes requested from the host per body read.
pub const BODY_CHUNK_SIZE: usize = 8 * 1024;

/// What the binder needs from the host's request object.
///
/// Lookups are ASCII case-insensitive. Multi-valued keys return every value in order.
pub trait IncomingRequest {
    fn route_value(&self, name: &str) -> Option<&str>;

    fn query_values(&self, name: &str) -> Vec<&str>;

    fn header_values(&self, name: &str) -> Vec<&str>;

    fn content_type(&self) -> Option<&str>;

    /// Copy the next part of the body into `buf`; `Ok(0)` at the end.
    ///
    /// # Errors
    ///
    /// Any I/O failure from the underlying connection.
    fn read_body(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// Populates endpoint request types from incoming requests.
#[derive(Debug, Clone, Copy)]
pub struct Materializer<'a> {
    plans: &'a PlanCache,
    limits: FormLimits,
}

impl<'a> Materializer<'a> {
    #[must_use]
    pub fn new(plans: &'a PlanCache) -> Self {
        Self {
            plans,
            limits: FormLimits::default(),
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: FormLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Build a `T` from `request`.
    ///
    /// Values that are absent or do not parse leave their fields at the default. The body
    /// is read at most once and only when the plan needs it; the context's abort signal is
    /// checked between body chunks and before the instance is returned.
    ///
    /// # Errors
    ///
    /// - [`BindingError::UnsupportedType`] if the plan cannot be built
    /// - [`BindingError::MalformedJson`] if a JSON body does not deserialize (including an
    ///   empty body)
    /// - [`BindingError::Rejected`] for an oversized or structurally invalid form body
    /// - [`BindingError::Cancelled`] if the request was aborted
    /// - [`BindingError::Io`] if reading the body fails
    pub fn materialize<T, R>(&self, request: &mut R, context: &HttpContext) -> Result<T, BindingError>
    where
        T: EndpointRequest,
        R: IncomingRequest,
    {
        let plan = self.plans.get_or_build::<T>()?;
        let signal = context.signal();
        let mut target = T::default();

        for setter in plan.query_setters() {
            let values = request.query_values(setter.key());
            if !values.is_empty() {
                setter.apply(&mut target, &values);
            }
        }

        for setter in plan.route_setters() {
            if let Some(value) = request.route_value(setter.key()) {
                setter.apply(&mut target, &[value]);
            }
        }

        let content_type = request.content_type().map(str::to_string);
        let wants_form = is_form_content_type(content_type.as_deref())
            && (plan.expects_form_body() || plan.expects_file() || plan.expects_file_collection());
        let wants_json =
            is_json_content_type(content_type.as_deref()) && plan.expects_json_body();

        let body = if wants_form || wants_json {
            Some(self.read_body(request, signal)?)
        } else {
            None
        };

        let form: Option<FormData> = match (&body, &content_type) {
            (Some(bytes), Some(content_type)) if wants_form => Some(
                parse_form(content_type, bytes, self.limits)
                    .map_err(|e| BindingError::Rejected(e.to_string()))?,
            ),
            _ => None,
        };

        if let Some(form) = &form {
            for setter in plan.form_setters() {
                let values = form.values(setter.key());
                if !values.is_empty() {
                    setter.apply(&mut target, &values);
                }
            }
        }

        if let (true, Some(bytes)) = (wants_json, &body) {
            for field in plan.body_fields() {
                let value = (field.reader)(bytes).map_err(|e| BindingError::MalformedJson {
                    type_name: field.type_name(),
                    message: e.to_string(),
                })?;
                (field.writer)(&mut target, value);
            }
        }

        if let Some(slot) = &plan.file_collection {
            let files = form.as_ref().map(|f| f.files().to_vec()).unwrap_or_default();
            slot.write(&mut target, Box::new(UploadedFiles(files)));
        } else if let Some(slot) = &plan.single_file {
            if let Some(file) = form.as_ref().and_then(|f| f.files().first()) {
                slot.write(&mut target, Box::new(file.clone()));
            }
        }

        for setter in plan.header_setters() {
            let values = request.header_values(setter.key());
            if !values.is_empty() {
                setter.apply(&mut target, &values);
            }
        }

        let ambient = plan.ambient();
        if let Some(slot) = &ambient.context {
            slot.write(&mut target, Box::new(context.clone()));
        }
        if let Some(slot) = &ambient.request {
            slot.write(&mut target, Box::new(context.request().clone()));
        }
        if let Some(slot) = &ambient.response {
            slot.write(&mut target, Box::new(context.response().clone()));
        }

        if signal.is_aborted() {
            return Err(BindingError::Cancelled);
        }

        debug!(
            request_id = %context.request_id(),
            type_name = plan.type_name(),
            body_bytes = body.as_ref().map_or(0, Vec::len),
            "Request materialized"
        );
        Ok(target)
    }

    fn read_body<R: IncomingRequest>(
        &self,
        request: &mut R,
        signal: &AbortSignal,
    ) -> Result<Vec<u8>, BindingError> {
        let mut body = Vec::new();
        let mut chunk = vec![0u8; BODY_CHUNK_SIZE];
        loop {
            if signal.is_aborted() {
                return Err(BindingError::Cancelled);
            }
            let read = request.read_body(&mut chunk)?;
            if read == 0 {
                return Ok(body);
            }
            body.extend_from_slice(&chunk[..read]);
            if body.len() > self.limits.max_total_size {
                return Err(BindingError::Rejected(format!(
                    "request body exceeds {} bytes",
                    self.limits.max_total_size
                )));
            }
        }
    }
}
