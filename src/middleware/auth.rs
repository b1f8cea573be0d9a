use axum::{
    body::Body,
    extract::{Extension, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use moka::sync::Cache; // High-performance TTL cache
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use uuid::Uuid;

use crate::api::auth::Claims;
use crate::config::Config;
use crate::utils::api_response::ApiResponse;
use serde_json::json;

/// Per-user context cache keyed by user id, TTL-bounded with `moka`.
pub type UserContextCache = Arc<Cache<Uuid, UserContext>>;

pub fn create_user_context_cache() -> UserContextCache {
    Arc::new(
        Cache::builder()
            .time_to_live(Duration::from_secs(600)) // TTL = 10 minutes
            .build(),
    )
}

/// **JWT Middleware** (Handles Token Authentication)
pub async fn jwt_middleware(mut req: Request<Body>, next: Next) -> Result<Response, Response> {
    // Step 1: Extract Authorization header
    let auth_header = req.headers().get("Authorization").ok_or_else(|| {
        tracing::error!("Missing Authorization header");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing Authorization header", None)
            .into_response()
    })?;

    // Step 2: Convert header to string
    let token_str = auth_header.to_str().map_err(|_| {
        tracing::error!("Invalid Authorization header format");
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid Authorization header format",
            None,
        )
        .into_response()
    })?;

    // Step 3: Strip "Bearer " prefix
    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::error!("Invalid token format (missing 'Bearer ' prefix)");
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid token format (missing 'Bearer ' prefix)",
            None,
        )
        .into_response()
    })?;

    // Step 4: Decode the JWT token
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::error!("JWT decoding failed: {:?}", e);
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid token",
            Some(json!({ "error": e.to_string() })),
        )
        .into_response()
    })?;

    // Step 5: Insert claims into request extensions
    req.extensions_mut().insert(token_data.claims);

    // Step 6: Proceed to the next middleware
    Ok(next.run(req).await)
}

/// The authenticated caller, as the rest of the API sees them.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserContext {
    pub user_id: Uuid,
    pub username: String,
    pub department: String,
    pub role: String,
}

impl UserContext {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Resolves the caller's department and role from the `users` table and
/// attaches a [`UserContext`] to the request, consulting the cache first.
pub async fn user_context_middleware(
    State(db_pool): State<PgPool>,
    Extension(context_cache): Extension<UserContextCache>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions().get::<Claims>().cloned().ok_or_else(|| {
        error!("Missing JWT claims in request");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing JWT claims in request", None)
            .into_response()
    })?;

    let user_id: Uuid = claims.sub.parse().map_err(|_| {
        error!("Invalid user ID format in JWT claims");
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid user ID format in JWT claims",
            None,
        )
        .into_response()
    })?;

    // Check cache first before querying DB
    if let Some(cached) = context_cache.get(&user_id) {
        req.extensions_mut().insert(cached);
        return Ok(next.run(req).await);
    }

    let context = match fetch_user_context(user_id, &db_pool).await {
        Ok(context) => context,
        Err(err) => {
            error!("Failed to load user context: {:?}", err);
            return Err(ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load user context",
                Some(json!({ "error": err.to_string() })),
            )
            .into_response());
        }
    };

    context_cache.insert(user_id, context.clone());
    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

async fn fetch_user_context(user_id: Uuid, pool: &PgPool) -> Result<UserContext, sqlx::Error> {
    let row = sqlx::query_as::<_, (String, String, String)>(
        "SELECT username, department, role FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(UserContext {
        user_id,
        username: row.0,
        department: row.1,
        role: row.2,
    })
}
