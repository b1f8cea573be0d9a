use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use serde_json::json;
use sqlx::PgPool;

use crate::db::models::user::UserInfo;
use crate::middleware::auth::UserContext;
use crate::utils::api_response::ApiResponse;

const USER_COLUMNS: &str = "id, username, full_name, email, department, role, phone";

/// Lists all users. Password hashes never leave the database layer.
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "List of users", body = Vec<UserInfo>),
        (status = 500, description = "Failed to retrieve users")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_users(
    State(pool): State<PgPool>,
) -> Result<ApiResponse<Vec<UserInfo>>, ApiResponse<()>> {
    let users = sqlx::query_as::<_, UserInfo>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY username"
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve users",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(StatusCode::OK, "Users", users))
}

/// Returns the authenticated caller's own profile.
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current user", body = UserInfo),
        (status = 404, description = "User no longer exists")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<UserContext>,
) -> Result<ApiResponse<UserInfo>, ApiResponse<()>> {
    let user = sqlx::query_as::<_, UserInfo>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(ctx.user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve user",
            Some(json!({ "error": e.to_string() })),
        )
    })?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "User not found", None))?;

    Ok(ApiResponse::success(StatusCode::OK, "Current user", user))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(get_users, get_me),
    components(schemas(UserInfo)),
    tags(
        (name = "Users", description = "User directory endpoints")
    )
)]
pub struct UserDoc;
