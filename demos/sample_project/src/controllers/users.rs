use routebind::context::AbortSignal;
use routebind::dispatcher::{Handler, HandlerResponse, Json};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::models::{User, UserList};
use crate::requests::{CreateUserRequest, ListUsersRequest};

/// In-memory users shared by the user controllers.
#[derive(Debug, Clone, Default)]
pub struct UserStore(Arc<Mutex<Vec<User>>>);

impl UserStore {
    pub fn insert(&self, user: User) {
        if let Ok(mut users) = self.0.lock() {
            users.push(user);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<User> {
        self.0.lock().map(|users| users.clone()).unwrap_or_default()
    }
}

pub struct CreateUserController {
    pub store: UserStore,
}

impl Handler for CreateUserController {
    type Request = CreateUserRequest;
    type Response = HandlerResponse;

    fn handle(&self, req: CreateUserRequest, _signal: &AbortSignal) -> HandlerResponse {
        info!(name = %req.user.name, "Creating user");
        self.store.insert(req.user.clone());
        match serde_json::to_value(&req.user) {
            Ok(body) => HandlerResponse::json(201, body),
            Err(e) => HandlerResponse::error(500, &e.to_string()),
        }
    }
}

pub struct ListUsersController {
    pub store: UserStore,
}

impl Handler for ListUsersController {
    type Request = ListUsersRequest;
    type Response = Json<UserList>;

    fn handle(&self, req: ListUsersRequest, _signal: &AbortSignal) -> Json<UserList> {
        let users: Vec<User> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|u| req.role.map_or(true, |role| u.role == role))
            .filter(|u| req.tags.is_empty() || req.tags.iter().any(|t| u.name.contains(t.as_str())))
            .take(req.limit.unwrap_or(usize::MAX))
            .collect();
        let total = users.len();
        Json(UserList { users, total })
    }
}
