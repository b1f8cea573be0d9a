use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::department::{Department, NewDepartment};
use crate::middleware::auth::UserContext;
use crate::utils::api_response::ApiResponse;

/// Lists all departments.
#[utoipa::path(
    get,
    path = "/departments",
    responses(
        (status = 200, description = "List of departments", body = Vec<Department>),
        (status = 500, description = "Failed to retrieve departments")
    ),
    tag = "Departments",
    security(("bearerAuth" = []))
)]
pub async fn get_departments(
    State(pool): State<PgPool>,
) -> Result<ApiResponse<Vec<Department>>, ApiResponse<()>> {
    let departments = sqlx::query_as::<_, Department>(
        "SELECT id, name, icon, color FROM departments ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve departments",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(StatusCode::OK, "Departments", departments))
}

/// Creates a department. Admin only.
#[utoipa::path(
    post,
    path = "/departments",
    request_body = NewDepartment,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 403, description = "Caller is not an admin"),
        (status = 409, description = "Department name already exists"),
        (status = 500, description = "Failed to insert department")
    ),
    tag = "Departments",
    security(("bearerAuth" = []))
)]
pub async fn create_department(
    State(pool): State<PgPool>,
    Extension(ctx): Extension<UserContext>,
    Json(payload): Json<NewDepartment>,
) -> Result<ApiResponse<Department>, ApiResponse<()>> {
    if !ctx.is_admin() {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Only admins can create departments",
            None,
        ));
    }

    let result = sqlx::query_as::<_, Department>(
        r#"
        INSERT INTO departments (id, name, icon, color)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, icon, color
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&payload.name)
    .bind(&payload.icon)
    .bind(&payload.color)
    .fetch_one(&pool)
    .await;

    match result {
        Ok(department) => Ok(ApiResponse::success(
            StatusCode::CREATED,
            "Department created",
            department,
        )),
        Err(e) => {
            if let Some(db_err) = e.as_database_error() {
                if db_err.code().map(|code| code == "23505").unwrap_or(false) {
                    return Err(ApiResponse::<()>::error(
                        StatusCode::CONFLICT,
                        "Department name already exists",
                        None,
                    ));
                }
            }
            Err(ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to insert department",
                Some(json!({ "error": e.to_string() })),
            ))
        }
    }
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(get_departments, create_department),
    components(schemas(Department, NewDepartment)),
    tags(
        (name = "Departments", description = "Department directory endpoints")
    )
)]
pub struct DepartmentDoc;
