//! Endpoint request types.

use routebind::binding::UploadedFile;
use routebind::context::HttpContext;
use routebind::EndpointRequest;

use crate::filters::ExampleFilter;
use crate::models::{TestModel, UploadResult, User, UserList, UserRole};

/// Route, query and header binding side by side. `SampleString` and `RouteInt` come
/// from the template, `IntegerValue` from the query string.
#[derive(Debug, Default, EndpointRequest)]
#[endpoint(get = "/test/{SampleString}/{RouteInt:int}", name = "sampleGet", group = "Samples")]
#[endpoint(produces(status = 200, body = TestModel), filter = ExampleFilter)]
pub struct SampleGetRequest {
    #[bind(name = "SampleString")]
    pub sample_string: String,
    #[bind(name = "RouteInt")]
    pub route_int: i32,
    #[bind(name = "IntegerValue")]
    pub integer_value: i32,
    #[bind(header, name = "x-tenant")]
    pub tenant: Option<String>,
    #[bind(skip)]
    pub computed: String,
    pub context: HttpContext,
}

#[derive(Debug, Default, EndpointRequest)]
#[endpoint(post = "/users", name = "createUser", group = "Users")]
#[endpoint(produces(status = 201, body = User))]
pub struct CreateUserRequest {
    #[bind(body)]
    pub user: User,
}

#[derive(Debug, Default, EndpointRequest)]
#[endpoint(get = "/users", name = "listUsers", group = "Users")]
#[endpoint(produces(status = 200, body = UserList))]
pub struct ListUsersRequest {
    pub role: Option<UserRole>,
    #[bind(query, name = "tag")]
    pub tags: Vec<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, EndpointRequest)]
#[endpoint(post = "/upload", name = "uploadFile", group = "Files")]
#[endpoint(produces(status = 200, body = UploadResult))]
pub struct UploadFileRequest {
    #[bind(form, required)]
    pub description: String,
    #[bind(body)]
    pub file: Option<UploadedFile>,
}
