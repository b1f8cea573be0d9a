use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

use crate::db::queries::department::*;

pub fn department_routes() -> Router<PgPool> {
    Router::new().route("/departments", get(get_departments).post(create_department))
}
