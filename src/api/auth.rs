use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::db::models::user::{User, UserInfo};
use crate::utils::api_response::ApiResponse;

/// Represents a request to register a new user.
#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Desired username
    pub username: String,
    /// User password
    pub password: String,
    pub full_name: String,
    pub email: String,
    /// Department the user belongs to (must exist)
    pub department: String,
    pub phone: Option<String>,
}

/// JWT Claims used for authentication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject - User ID as String
    pub sub: String,
    /// The username of the authenticated user.
    pub username: String,
    /// The role assigned to the user
    pub role: String,
    /// Expiration timestamp (UNIX TIME)
    pub exp: usize,
}

/// Represents a request to log in
#[derive(Serialize, Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Represents a successful login response returning a JWT token.
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub role: String,
    pub user: UserInfo,
}

/// Handles user login.
///
/// # Returns
/// * `200 OK` - Returns a JWT token if authentication is successful.
/// * `401 Unauthorized` - If credentials are incorrect.
/// * `500 Internal Server Error` - If a database or token generation error occurs.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body(
        content = LoginRequest,
        description = "User login details",
    ),
    responses(
        (status = 200, description = "Successful login", body = LoginResponse),
        (status = 401, description = "Invalid username or password"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn login(
    State(pool): State<PgPool>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiResponse<()>> {
    let config = Config::get();

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, full_name, email, department, role, phone, password_hash
        FROM users
        WHERE username = $1
        "#,
    )
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database error",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let Some(user) = user else {
        warn!("❌ Login attempt for non-existent user: {}", payload.username);
        return Err(ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid username or password.",
            None,
        ));
    };

    let valid = verify(&payload.password, &user.password_hash).unwrap_or(false);
    if !valid {
        warn!("❌ Invalid password attempt for user: {}", payload.username);
        return Err(ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid username or password.",
            None,
        ));
    }

    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        role: user.role.clone(),
        exp: chrono::Utc::now().timestamp() as usize + 36000, // 10 hour expiration
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Token generation failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    info!("✅ Login successful for user: {}", payload.username);
    Ok(Json(LoginResponse {
        token,
        role: user.role.clone(),
        user: UserInfo {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            department: user.department,
            role: user.role,
            phone: user.phone,
        },
    }))
}

/// Handles user registration.
///
/// New accounts always start with the `user` role; admins are promoted
/// out of band.
///
/// # Returns
/// * `201 Created` - If registration is successful.
/// * `409 Conflict` - If the username is already taken.
/// * `500 Internal Server Error` - If a database error occurs.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "Authentication",
    responses(
        (status = 201, description = "User registered", body = UserInfo),
        (status = 409, description = "Username already taken"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<ApiResponse<UserInfo>, ApiResponse<()>> {
    let password_hash = hash(&payload.password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let user_id = Uuid::new_v4();
    let result = sqlx::query_as::<_, UserInfo>(
        r#"
        INSERT INTO users (id, username, full_name, email, department, role, phone, password_hash)
        VALUES ($1, $2, $3, $4, $5, 'user', $6, $7)
        RETURNING id, username, full_name, email, department, role, phone
        "#,
    )
    .bind(user_id)
    .bind(&payload.username)
    .bind(&payload.full_name)
    .bind(&payload.email)
    .bind(&payload.department)
    .bind(&payload.phone)
    .bind(&password_hash)
    .fetch_one(&pool)
    .await;

    match result {
        Ok(user) => Ok(ApiResponse::success(
            StatusCode::CREATED,
            "User registered",
            user,
        )),
        Err(e) => {
            if let Some(db_err) = e.as_database_error() {
                if let Some((status, message)) =
                    db_err.code().as_deref().and_then(registration_error_status)
                {
                    return Err(ApiResponse::<()>::error(status, message, None));
                }
            }
            Err(ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some(json!({ "error": e.to_string() })),
            ))
        }
    }
}

/// Maps constraint-violation SQLSTATEs raised during registration to
/// client errors: duplicate username (unique) and unknown department
/// (foreign key).
fn registration_error_status(code: &str) -> Option<(StatusCode, &'static str)> {
    match code {
        "23505" => Some((StatusCode::CONFLICT, "Username already taken")),
        "23503" => Some((StatusCode::BAD_REQUEST, "Unknown department")),
        _ => None,
    }
}

/// Registers the public authentication routes for the API.
///
/// # Routes
/// - `POST /auth/register` → Register a new user.
/// - `POST /auth/login` → Authenticate a user and return a JWT token.
pub fn auth_routes() -> Router<PgPool> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::Components;
use utoipa::Modify;
use utoipa::OpenApi;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.clone().unwrap_or(Components::default());
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        openapi.components = Some(components);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(login, register),
    components(schemas(LoginRequest, LoginResponse, RegisterRequest, UserInfo)),
    tags(
        (name = "Authentication", description = "User Auth Endpoints")
    ),
    modifiers(&SecurityAddon)
)]
pub struct AuthDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_constraint_codes_map_to_client_errors() {
        assert_eq!(
            registration_error_status("23505"),
            Some((StatusCode::CONFLICT, "Username already taken"))
        );
        assert_eq!(
            registration_error_status("23503"),
            Some((StatusCode::BAD_REQUEST, "Unknown department"))
        );
        // Anything else falls through to the generic 500 path.
        assert_eq!(registration_error_status("40001"), None);
    }
}
