//! Route table: public endpoints, then the authenticated API surface.

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{middleware, Json, Router};
use chrono::Utc;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::core::middleware::authenticate;
use crate::core::rate_limit::auth_rate_limit;
use crate::core::shared::state::AppState;
use crate::core::shared::ApiResponse;
use crate::dashboard;
use crate::employees;
use crate::leads;
use crate::leads::import::MAX_UPLOAD_BYTES;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "CRM API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn not_found() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            message: Some("Route not found".to_string()),
            errors: None,
            pagination: None,
        }),
    )
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/", get(health))
        .route("/api/auth/login", post(auth::login));

    let protected = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route(
            "/api/auth/profile",
            get(auth::get_profile).put(auth::update_profile),
        )
        .route("/api/auth/change-password", put(auth::change_password))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/verify", get(auth::verify))
        .merge(employees::configure())
        .merge(leads::configure())
        .merge(dashboard::configure())
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .merge(public)
        .merge(protected)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_rate_limit,
        ))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
