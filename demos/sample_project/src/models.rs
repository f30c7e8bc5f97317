//! Body and response types of the sample endpoints.

use chrono::{DateTime, NaiveDate, Utc};
use routebind::{ApiSchema, BindableEnum};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, BindableEnum)]
pub enum UserRole {
    #[default]
    Member,
    Admin,
    #[serde(rename = "read-only")]
    ReadOnly,
}

/// A user account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ApiSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct User {
    #[api(example = "Ada Lovelace")]
    pub name: String,
    pub email: Option<String>,
    pub age: Option<u32>,
    pub role: UserRole,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ApiSchema)]
pub struct UserList {
    pub users: Vec<User>,
    pub total: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ApiSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: usize,
    pub description: String,
}

/// Echo of every primitive kind the binder understands.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ApiSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestModel {
    pub string_value: String,
    pub char_value: char,
    pub bool_value: bool,
    pub byte_value: u8,
    pub short_value: i16,
    pub int_value: i32,
    pub long_value: i64,
    pub unsigned_value: u64,
    pub float_value: f32,
    pub double_value: f64,
    pub decimal_value: Decimal,
    pub guid_value: Uuid,
    pub date_value: NaiveDate,
    pub timestamp_value: DateTime<Utc>,
    pub nullable_int: Option<i32>,
    pub role: UserRole,
}
