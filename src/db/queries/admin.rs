use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::db::seed;
use crate::middleware::auth::UserContext;
use crate::utils::api_response::ApiResponse;

fn require_admin(ctx: &UserContext) -> Result<(), ApiResponse<()>> {
    if !ctx.is_admin() {
        warn!("🔒 Non-admin {} hit an admin endpoint", ctx.username);
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can perform this action",
            None,
        ));
    }
    Ok(())
}

/// Deletes every request record, including rejections and completion marks.
#[utoipa::path(
    post,
    path = "/admin/requests/clear",
    responses(
        (status = 200, description = "All requests cleared"),
        (status = 403, description = "Caller is not an admin"),
        (status = 500, description = "Failed to clear requests")
    ),
    tag = "Admin",
    security(("bearerAuth" = []))
)]
pub async fn clear_requests(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<UserContext>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    require_admin(&ctx)?;

    let result = sqlx::query("DELETE FROM requests")
        .execute(&pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to clear requests",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    info!(
        "🗑️ Admin {} cleared {} request(s)",
        ctx.username,
        result.rows_affected()
    );
    Ok(ApiResponse::success(
        StatusCode::OK,
        "All requests have been cleared",
        (),
    ))
}

/// Replaces all data with the sample dataset.
#[utoipa::path(
    post,
    path = "/admin/seed",
    responses(
        (status = 200, description = "Database seeded"),
        (status = 403, description = "Caller is not an admin"),
        (status = 500, description = "Seeding failed")
    ),
    tag = "Admin",
    security(("bearerAuth" = []))
)]
pub async fn seed_database(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<UserContext>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    require_admin(&ctx)?;

    seed::run(&pool).await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Seeding failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    info!("🌱 Admin {} reseeded the database", ctx.username);
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Database seeded successfully",
        (),
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(clear_requests, seed_database),
    tags(
        (name = "Admin", description = "Administrative maintenance endpoints")
    )
)]
pub struct AdminDoc;
