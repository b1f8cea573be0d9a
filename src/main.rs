use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Extension, Router};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod config;
mod db;
mod lifecycle;
mod middleware;
mod sweeper;
mod utils;

use crate::api::auth::AuthDoc;
use crate::config::Config;
use crate::db::queries::admin::AdminDoc;
use crate::db::queries::dashboard::DashboardDoc;
use crate::db::queries::department::DepartmentDoc;
use crate::db::queries::request::RequestDoc;
use crate::db::queries::user::UserDoc;
use crate::middleware::auth::{create_user_context_cache, jwt_middleware, user_context_middleware};

#[tokio::main]
async fn main() {
    Config::init();

    std::fs::create_dir_all("logs").expect("Failed to create logs directory");
    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .with_writer(non_blocking)
        .init();

    let pool = db::pool::get_db_pool().await;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let merged_doc = AuthDoc::openapi()
        .merge_from(DepartmentDoc::openapi())
        .merge_from(UserDoc::openapi())
        .merge_from(RequestDoc::openapi())
        .merge_from(DashboardDoc::openapi())
        .merge_from(AdminDoc::openapi());

    let user_context_cache = create_user_context_cache();

    // Public routes
    let public_routes = Router::new().merge(api::auth::auth_routes());

    // Private routes
    let private_routes = Router::new()
        .merge(api::department::department_routes())
        .merge(api::user::user_routes())
        .merge(api::request::request_routes())
        .merge(api::dashboard::dashboard_routes())
        .merge(api::admin::admin_routes())
        .route_layer(from_fn_with_state(pool.clone(), user_context_middleware))
        .route_layer(from_fn(jwt_middleware));

    let app = Router::new()
        .merge(api::health::health_routes())
        .merge(public_routes)
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .layer(Extension(user_context_cache.clone()))
        .with_state(pool.clone());

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let sweeper_task = tokio::spawn(sweeper::run_sweeper(
        pool.clone(),
        shutdown_tx.subscribe(),
    ));
    let server_task = tokio::spawn(run_server(app, shutdown_tx.clone(), pool.clone()));

    server_task.await.ok();
    sweeper_task.await.ok();
    info!("Shutdown complete.");
}

async fn shutdown_signal(mut shutdown_rx: broadcast::Receiver<()>, pool: PgPool) {
    tokio::select! {
        _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down..."),
        _ = shutdown_rx.recv() => info!("Received shutdown signal."),
    }
    info!("🛠️ Closing database pool...");
    pool.close().await;
    info!("✅ Database pool closed. Server shutting down.");
}

async fn run_server(app: Router, shutdown_tx: broadcast::Sender<()>, pool: PgPool) {
    let addr = SocketAddr::from(([127, 0, 0, 1], Config::get().port));
    info!("Server running at http://{}", addr);

    let listener = TcpListener::bind(&addr).await.expect("Failed to bind listener");

    let shutdown = shutdown_signal(shutdown_tx.subscribe(), pool.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("Server encountered an error");

    // Wake the sweeper so it exits too.
    let _ = shutdown_tx.send(());
}
