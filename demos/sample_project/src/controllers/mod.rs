//! Handlers for the sample endpoints.

mod sample;
mod upload;
mod users;

pub use sample::SampleGetController;
pub use upload::UploadFileController;
pub use users::{CreateUserController, ListUsersController, UserStore};
