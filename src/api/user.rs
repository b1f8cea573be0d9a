use axum::{routing::get, Router};
use sqlx::PgPool;

use crate::db::queries::user::*;

pub fn user_routes() -> Router<PgPool> {
    Router::new()
        .route("/users", get(get_users))
        .route("/users/me", get(get_me))
}
