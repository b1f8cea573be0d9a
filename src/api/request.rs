use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

use crate::db::queries::request::*;

pub fn request_routes() -> Router<PgPool> {
    Router::new()
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/{request_id}", get(get_request).delete(delete_request))
        .route("/requests/{request_id}/accept", post(accept_request))
        .route("/requests/{request_id}/complete", post(complete_request))
        .route("/requests/{request_id}/reject", post(reject_request))
        .route("/requests/{request_id}/archive", post(archive_request))
        .route(
            "/requests/{request_id}/rejections/{rejection_id}/hide",
            post(hide_rejection),
        )
}
