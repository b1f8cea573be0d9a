use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::db::models::request::{
    NewRequest, ParticipantCompletion, RejectPayload, Rejection, Request, RequestDetails,
    RequestKind, RequestStatus,
};
use crate::lifecycle::{LifecycleError, MIN_PARTICIPANTS};
use crate::middleware::auth::UserContext;
use crate::utils::api_response::ApiResponse;

const REQUEST_COLUMNS: &str = "id, title, description, kind, status, department, departments, \
     multi_department, creator, creator_department, creator_role, accepted_by, users_needed, \
     priority, is_expired, archived, archived_at, created_at, last_status_update, status_changed_by";

fn db_error(e: sqlx::Error) -> ApiResponse<()> {
    ApiResponse::<()>::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Database error",
        Some(json!({ "error": e.to_string() })),
    )
}

fn lifecycle_error(err: LifecycleError) -> ApiResponse<()> {
    let status = match err {
        LifecycleError::AlreadyAccepted
        | LifecycleError::AlreadyCompleted
        | LifecycleError::AlreadyResolved
        | LifecycleError::Archived
        | LifecycleError::ParticipantsFull => StatusCode::CONFLICT,
        LifecycleError::NotParticipant | LifecycleError::NotCreator => StatusCode::FORBIDDEN,
        LifecycleError::NotAcceptable
        | LifecycleError::NotInProcess
        | LifecycleError::NotArchivable
        | LifecycleError::NotDeletable => StatusCode::BAD_REQUEST,
    };
    ApiResponse::<()>::error(status, err.to_string(), None)
}

/// Fetch one request row, locked for the rest of the transaction.
async fn fetch_request_for_update(
    tx: &mut Transaction<'_, Postgres>,
    request_id: Uuid,
) -> Result<Request, ApiResponse<()>> {
    sqlx::query_as::<_, Request>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1 FOR UPDATE"
    ))
    .bind(request_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Request not found", None))
}

async fn fetch_completed_usernames(
    tx: &mut Transaction<'_, Postgres>,
    request_id: Uuid,
) -> Result<Vec<String>, ApiResponse<()>> {
    sqlx::query_scalar::<_, String>(
        "SELECT username FROM participants_completed WHERE request_id = $1 ORDER BY completed_at",
    )
    .bind(request_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(db_error)
}

/// Attach rejection history and completion marks to a batch of requests.
async fn attach_details(
    pool: &PgPool,
    requests: Vec<Request>,
) -> Result<Vec<RequestDetails>, ApiResponse<()>> {
    let ids: Vec<Uuid> = requests.iter().map(|r| r.id).collect();

    let rejections = sqlx::query_as::<_, Rejection>(
        r#"
        SELECT id, request_id, username, reason, rejected_at, hidden
        FROM rejections
        WHERE request_id = ANY($1) AND hidden = FALSE
        ORDER BY rejected_at
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    let completions = sqlx::query_as::<_, ParticipantCompletion>(
        r#"
        SELECT id, request_id, username, completed_at
        FROM participants_completed
        WHERE request_id = ANY($1)
        ORDER BY completed_at
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    let mut rejections_by_request: HashMap<Uuid, Vec<Rejection>> = HashMap::new();
    for rejection in rejections {
        rejections_by_request
            .entry(rejection.request_id)
            .or_default()
            .push(rejection);
    }
    let mut completed_by_request: HashMap<Uuid, Vec<String>> = HashMap::new();
    for completion in completions {
        completed_by_request
            .entry(completion.request_id)
            .or_default()
            .push(completion.username);
    }

    Ok(requests
        .into_iter()
        .map(|request| {
            let rejections = rejections_by_request.remove(&request.id).unwrap_or_default();
            let participants_completed =
                completed_by_request.remove(&request.id).unwrap_or_default();
            RequestDetails {
                request,
                rejections,
                participants_completed,
            }
        })
        .collect())
}

/// Creates a new request or project.
///
/// Projects seed the creator into the acceptor list, mirroring how the
/// rest of the lifecycle counts them as a participant.
#[utoipa::path(
    post,
    path = "/requests",
    request_body = NewRequest,
    responses(
        (status = 201, description = "Request created", body = Request),
        (status = 400, description = "No target department given"),
        (status = 500, description = "Failed to insert request")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn create_request(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<UserContext>,
    axum::Json(payload): axum::Json<NewRequest>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    if payload.title.trim().is_empty() {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Title must not be empty",
            None,
        ));
    }
    if payload.department.is_none() && payload.departments.is_empty() {
        return Err(ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "At least one target department is required",
            None,
        ));
    }

    let multi_department = payload.departments.len() >= 2;
    let users_needed = payload
        .users_needed
        .unwrap_or(MIN_PARTICIPANTS as i32)
        .max(MIN_PARTICIPANTS as i32);
    // Project creators participate from the start.
    let accepted_by: Vec<String> = if payload.kind == RequestKind::Project {
        vec![ctx.username.clone()]
    } else {
        Vec::new()
    };

    let request = sqlx::query_as::<_, Request>(&format!(
        r#"
        INSERT INTO requests (
            id, title, description, kind, status, department, departments, multi_department,
            creator, creator_department, creator_role, accepted_by, users_needed, priority
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {REQUEST_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.kind)
    .bind(RequestStatus::Pending)
    .bind(&payload.department)
    .bind(&payload.departments)
    .bind(multi_department)
    .bind(&ctx.username)
    .bind(&ctx.department)
    .bind(&ctx.role)
    .bind(&accepted_by)
    .bind(users_needed)
    .bind(&payload.priority)
    .fetch_one(&pool)
    .await
    .map_err(db_error)?;

    info!("📨 Request '{}' created by {}", request.title, ctx.username);
    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Request created",
        request,
    ))
}

/// Filters accepted by `GET /requests`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub department: Option<String>,
    pub creator: Option<String>,
    pub participant: Option<String>,
    /// Only items the caller created or accepted.
    pub mine: Option<bool>,
    pub include_archived: Option<bool>,
}

/// Build the filtered list query. Kept separate from the handler so the
/// generated SQL can be checked without a live connection.
fn build_list_query<'a>(filter: &'a RequestFilter, caller: &'a str) -> QueryBuilder<'a, Postgres> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE is_expired = FALSE"
    ));
    if !filter.include_archived.unwrap_or(false) {
        qb.push(" AND archived = FALSE");
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(department) = &filter.department {
        qb.push(" AND (department = ")
            .push_bind(department)
            .push(" OR ")
            .push_bind(department)
            .push(" = ANY(departments))");
    }
    if let Some(creator) = &filter.creator {
        qb.push(" AND creator = ").push_bind(creator);
    }
    if let Some(participant) = &filter.participant {
        qb.push(" AND ").push_bind(participant).push(" = ANY(accepted_by)");
    }
    if filter.mine.unwrap_or(false) {
        qb.push(" AND (creator = ")
            .push_bind(caller)
            .push(" OR ")
            .push_bind(caller)
            .push(" = ANY(accepted_by))");
    }
    qb.push(" ORDER BY created_at DESC");
    qb
}

/// Lists active requests with rejection history and completion marks
/// attached. Expired records are never returned.
#[utoipa::path(
    get,
    path = "/requests",
    params(RequestFilter),
    responses(
        (status = 200, description = "List of requests", body = Vec<RequestDetails>),
        (status = 500, description = "Failed to retrieve requests")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn list_requests(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<UserContext>,
    Query(filter): Query<RequestFilter>,
) -> Result<ApiResponse<Vec<RequestDetails>>, ApiResponse<()>> {
    let mut qb = build_list_query(&filter, &ctx.username);
    let requests = qb
        .build_query_as::<Request>()
        .fetch_all(&pool)
        .await
        .map_err(db_error)?;

    let details = attach_details(&pool, requests).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Requests", details))
}

/// Retrieves a single request with its full history.
#[utoipa::path(
    get,
    path = "/requests/{request_id}",
    params(("request_id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request retrieved", body = RequestDetails),
        (status = 404, description = "Request not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_request(
    State(pool): State<PgPool>,
    Path(request_id): Path<Uuid>,
) -> Result<ApiResponse<RequestDetails>, ApiResponse<()>> {
    let request = sqlx::query_as::<_, Request>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1"
    ))
    .bind(request_id)
    .fetch_optional(&pool)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Request not found", None))?;

    let mut details = attach_details(&pool, vec![request]).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request retrieved",
        details.remove(0),
    ))
}

/// Accepts a request or project on behalf of the caller.
///
/// Single requests move to "In Process" immediately; projects and
/// multi-department requests do so once two users have joined.
#[utoipa::path(
    post,
    path = "/requests/{request_id}/accept",
    params(("request_id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request accepted", body = Request),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Already accepted or already resolved")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn accept_request(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<UserContext>,
    Path(request_id): Path<Uuid>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let mut tx = pool.begin().await.map_err(db_error)?;

    let request = fetch_request_for_update(&mut tx, request_id).await?;
    let completed = fetch_completed_usernames(&mut tx, request_id).await?;
    let new_status = request
        .lifecycle(&completed)
        .accept(&ctx.username)
        .map_err(lifecycle_error)?;

    let updated = sqlx::query_as::<_, Request>(&format!(
        r#"
        UPDATE requests
        SET accepted_by = array_append(accepted_by, $1),
            status = $2,
            last_status_update = CASE WHEN status IS DISTINCT FROM $2 THEN NOW() ELSE last_status_update END,
            status_changed_by = CASE WHEN status IS DISTINCT FROM $2 THEN $1 ELSE status_changed_by END
        WHERE id = $3
        RETURNING {REQUEST_COLUMNS}
        "#
    ))
    .bind(&ctx.username)
    .bind(new_status)
    .bind(request_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error)?;

    tx.commit().await.map_err(db_error)?;

    info!(
        "🤝 {} accepted request '{}' ({} participant(s))",
        ctx.username,
        updated.title,
        updated.accepted_by.len()
    );
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request accepted",
        updated,
    ))
}

/// Records the caller's completion mark.
///
/// The request resolves to "Completed" once the lifecycle rules say every
/// accepted participant is done.
#[utoipa::path(
    post,
    path = "/requests/{request_id}/complete",
    params(("request_id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Completion recorded", body = Request),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Already completed")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn complete_request(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<UserContext>,
    Path(request_id): Path<Uuid>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let mut tx = pool.begin().await.map_err(db_error)?;

    let request = fetch_request_for_update(&mut tx, request_id).await?;
    let completed = fetch_completed_usernames(&mut tx, request_id).await?;
    let new_status = request
        .lifecycle(&completed)
        .complete(&ctx.username)
        .map_err(lifecycle_error)?;

    sqlx::query(
        "INSERT INTO participants_completed (id, request_id, username) VALUES ($1, $2, $3)",
    )
    .bind(Uuid::new_v4())
    .bind(request_id)
    .bind(&ctx.username)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    let updated = if new_status != request.status {
        sqlx::query_as::<_, Request>(&format!(
            r#"
            UPDATE requests
            SET status = $1, last_status_update = NOW(), status_changed_by = $2
            WHERE id = $3
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(new_status)
        .bind(&ctx.username)
        .bind(request_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?
    } else {
        request
    };

    tx.commit().await.map_err(db_error)?;

    if updated.status == RequestStatus::Completed {
        info!("✅ Request '{}' completed", updated.title);
    }
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Completion recorded",
        updated,
    ))
}

/// Rejects a request, recording who rejected it and why.
#[utoipa::path(
    post,
    path = "/requests/{request_id}/reject",
    params(("request_id" = Uuid, Path, description = "Request ID")),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Request rejected", body = Request),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already resolved")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn reject_request(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<UserContext>,
    Path(request_id): Path<Uuid>,
    axum::Json(payload): axum::Json<RejectPayload>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let mut tx = pool.begin().await.map_err(db_error)?;

    let request = fetch_request_for_update(&mut tx, request_id).await?;
    let completed = fetch_completed_usernames(&mut tx, request_id).await?;
    let new_status = request
        .lifecycle(&completed)
        .reject()
        .map_err(lifecycle_error)?;

    sqlx::query(
        "INSERT INTO rejections (id, request_id, username, reason) VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(request_id)
    .bind(&ctx.username)
    .bind(&payload.reason)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    let updated = sqlx::query_as::<_, Request>(&format!(
        r#"
        UPDATE requests
        SET status = $1, last_status_update = NOW(), status_changed_by = $2
        WHERE id = $3
        RETURNING {REQUEST_COLUMNS}
        "#
    ))
    .bind(new_status)
    .bind(&ctx.username)
    .bind(request_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error)?;

    tx.commit().await.map_err(db_error)?;

    info!("🚫 Request '{}' rejected by {}", updated.title, ctx.username);
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request rejected",
        updated,
    ))
}

/// Archives a pending project, removing it from active views.
/// Archived items are purged by the sweeper after the retention window.
#[utoipa::path(
    post,
    path = "/requests/{request_id}/archive",
    params(("request_id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Project archived", body = Request),
        (status = 400, description = "Not a pending project"),
        (status = 403, description = "Caller is not the creator"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Already archived")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn archive_request(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<UserContext>,
    Path(request_id): Path<Uuid>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let mut tx = pool.begin().await.map_err(db_error)?;

    let request = fetch_request_for_update(&mut tx, request_id).await?;
    request
        .lifecycle(&[])
        .archive(&ctx.username)
        .map_err(lifecycle_error)?;

    let updated = sqlx::query_as::<_, Request>(&format!(
        r#"
        UPDATE requests
        SET archived = TRUE, archived_at = $1
        WHERE id = $2
        RETURNING {REQUEST_COLUMNS}
        "#
    ))
    .bind(Utc::now())
    .bind(request_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error)?;

    tx.commit().await.map_err(db_error)?;

    info!("📦 Project '{}' archived by {}", updated.title, ctx.username);
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Project archived",
        updated,
    ))
}

/// Deletes a pending request. Creator only.
#[utoipa::path(
    delete,
    path = "/requests/{request_id}",
    params(("request_id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request deleted"),
        (status = 400, description = "Request is no longer pending"),
        (status = 403, description = "Caller is not the creator"),
        (status = 404, description = "Request not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn delete_request(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<UserContext>,
    Path(request_id): Path<Uuid>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let mut tx = pool.begin().await.map_err(db_error)?;

    let request = fetch_request_for_update(&mut tx, request_id).await?;
    request
        .lifecycle(&[])
        .delete(&ctx.username)
        .map_err(lifecycle_error)?;

    sqlx::query("DELETE FROM requests WHERE id = $1")
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    tx.commit().await.map_err(db_error)?;

    info!("🗑️ Request '{}' deleted by {}", request.title, ctx.username);
    Ok(ApiResponse::success(StatusCode::OK, "Request deleted", ()))
}

fn may_hide_rejection(ctx: &UserContext, request_creator: &str) -> bool {
    ctx.is_admin() || ctx.username == request_creator
}

/// Hides a rejection from activity feeds. The record itself is kept.
/// Request creator or admin only.
#[utoipa::path(
    post,
    path = "/requests/{request_id}/rejections/{rejection_id}/hide",
    params(
        ("request_id" = Uuid, Path, description = "Request ID"),
        ("rejection_id" = Uuid, Path, description = "Rejection ID")
    ),
    responses(
        (status = 200, description = "Rejection hidden"),
        (status = 403, description = "Caller may not hide this rejection"),
        (status = 404, description = "Request or rejection not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn hide_rejection(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<UserContext>,
    Path((request_id, rejection_id)): Path<(Uuid, Uuid)>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let mut tx = pool.begin().await.map_err(db_error)?;

    let request = fetch_request_for_update(&mut tx, request_id).await?;
    if !may_hide_rejection(&ctx, &request.creator) {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only the request creator or an admin can hide rejections",
            None,
        ));
    }

    let result = sqlx::query("UPDATE rejections SET hidden = TRUE WHERE id = $1 AND request_id = $2")
        .bind(rejection_id)
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Rejection not found",
            None,
        ));
    }

    tx.commit().await.map_err(db_error)?;

    info!(
        "Rejection {} on '{}' hidden by {}",
        rejection_id, request.title, ctx.username
    );
    Ok(ApiResponse::success(StatusCode::OK, "Rejection hidden", ()))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        create_request,
        list_requests,
        get_request,
        accept_request,
        complete_request,
        reject_request,
        archive_request,
        delete_request,
        hide_rejection
    ),
    components(schemas(
        Request,
        RequestDetails,
        NewRequest,
        RejectPayload,
        Rejection,
        RequestStatus,
        RequestKind
    )),
    tags(
        (name = "Requests", description = "Request and project lifecycle endpoints")
    )
)]
pub struct RequestDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_filter_generates_valid_sql() {
        let filter = RequestFilter {
            participant: Some("alex.wong".to_string()),
            ..Default::default()
        };
        let sql = build_list_query(&filter, "jane.smith").into_sql();
        assert_eq!(sql.matches('(').count(), sql.matches(')').count());
        assert!(sql.ends_with("AND $1 = ANY(accepted_by) ORDER BY created_at DESC"));
    }

    #[test]
    fn combined_filters_stay_balanced() {
        let filter = RequestFilter {
            department: Some("Design".to_string()),
            participant: Some("sarah.miller".to_string()),
            mine: Some(true),
            include_archived: Some(true),
            ..Default::default()
        };
        let sql = build_list_query(&filter, "jane.smith").into_sql();
        assert_eq!(sql.matches('(').count(), sql.matches(')').count());
        assert!(!sql.contains("archived = FALSE"));
        assert!(sql.contains("(department = $1 OR $2 = ANY(departments))"));
        assert!(sql.contains("(creator = $4 OR $5 = ANY(accepted_by))"));
    }

    #[test]
    fn default_filter_excludes_archived_and_expired() {
        let sql = build_list_query(&RequestFilter::default(), "jane.smith").into_sql();
        assert!(sql.contains("is_expired = FALSE AND archived = FALSE"));
        assert!(sql.ends_with("ORDER BY created_at DESC"));
    }

    #[test]
    fn hiding_rejections_is_creator_or_admin_only() {
        let creator = UserContext {
            user_id: Uuid::new_v4(),
            username: "jane.smith".to_string(),
            department: "Marketing".to_string(),
            role: "user".to_string(),
        };
        assert!(may_hide_rejection(&creator, "jane.smith"));
        assert!(!may_hide_rejection(&creator, "alex.wong"));

        let admin = UserContext {
            user_id: Uuid::new_v4(),
            username: "admin".to_string(),
            department: "HR".to_string(),
            role: "admin".to_string(),
        };
        assert!(may_hide_rejection(&admin, "alex.wong"));
    }
}
