use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::db::models::request::Request;
use crate::middleware::auth::UserContext;
use crate::utils::api_response::ApiResponse;

/// How many of the caller's items the summary carries.
const RECENT_LIMIT: i64 = 3;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct StatusCounts {
    pub total: i64,
    pub pending: i64,
    pub in_process: i64,
    pub completed: i64,
    pub rejected: i64,
}

/// Aggregate dashboard payload: status counts over all active records plus
/// the caller's most recent items (created or accepted).
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardSummary {
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub recent: Vec<Request>,
}

/// Returns the dashboard status counts and the caller's recent items.
///
/// Archived and expired records are excluded from both.
#[utoipa::path(
    get,
    path = "/dashboard/summary",
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardSummary),
        (status = 500, description = "Failed to build summary")
    ),
    tag = "Dashboard",
    security(("bearerAuth" = []))
)]
pub async fn dashboard_summary(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<UserContext>,
) -> Result<ApiResponse<DashboardSummary>, ApiResponse<()>> {
    let db_error = |e: sqlx::Error| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build summary",
            Some(json!({ "error": e.to_string() })),
        )
    };

    let counts = sqlx::query_as::<_, StatusCounts>(
        r#"
        SELECT COUNT(*) AS total,
               COUNT(*) FILTER (WHERE status = 'pending') AS pending,
               COUNT(*) FILTER (WHERE status = 'in_process') AS in_process,
               COUNT(*) FILTER (WHERE status = 'completed') AS completed,
               COUNT(*) FILTER (WHERE status = 'rejected') AS rejected
        FROM requests
        WHERE is_expired = FALSE AND archived = FALSE
        "#,
    )
    .fetch_one(&pool)
    .await
    .map_err(db_error)?;

    let recent = sqlx::query_as::<_, Request>(
        r#"
        SELECT id, title, description, kind, status, department, departments, multi_department,
               creator, creator_department, creator_role, accepted_by, users_needed, priority,
               is_expired, archived, archived_at, created_at, last_status_update, status_changed_by
        FROM requests
        WHERE is_expired = FALSE AND archived = FALSE
          AND (creator = $1 OR $1 = ANY(accepted_by))
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(&ctx.username)
    .bind(RECENT_LIMIT)
    .fetch_all(&pool)
    .await
    .map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Dashboard summary",
        DashboardSummary { counts, recent },
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(dashboard_summary),
    components(schemas(DashboardSummary, StatusCounts)),
    tags(
        (name = "Dashboard", description = "Aggregate status endpoints")
    )
)]
pub struct DashboardDoc;
