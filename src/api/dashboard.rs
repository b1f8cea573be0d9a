use axum::{routing::get, Router};
use sqlx::PgPool;

use crate::db::queries::dashboard::*;

pub fn dashboard_routes() -> Router<PgPool> {
    Router::new().route("/dashboard/summary", get(dashboard_summary))
}
