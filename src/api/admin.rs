use axum::{routing::post, Router};
use sqlx::PgPool;

use crate::db::queries::admin::*;

pub fn admin_routes() -> Router<PgPool> {
    Router::new()
        .route("/admin/requests/clear", post(clear_requests))
        .route("/admin/seed", post(seed_database))
}
