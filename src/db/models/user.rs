// src/db/models/user.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Full user row, including the password hash. Never serialized to clients.
#[derive(Debug, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub department: String,
    pub role: String,
    pub phone: Option<String>,
    pub password_hash: String,
}

/// Client-facing view of a user.
#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub department: String,
    pub role: String,
    pub phone: Option<String>,
}
