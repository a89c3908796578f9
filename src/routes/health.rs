use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::db;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub database: String,
    pub redis: String,
}

/// Health check endpoint - public
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let redis_check = async {
        match &state.cache {
            Some(cache) => Some(cache.health_check().await.is_ok()),
            None => None,
        }
    };
    let db_check = async {
        state.client.is_connected() && db::health_check(state.client.pool()).await
    };
    let (db_ok, redis_ok) = tokio::join!(db_check, redis_check);

    let redis_status = match redis_ok {
        Some(true) => "ok",
        Some(false) => "error",
        None => "disabled",
    };

    // Redis only degrades; the database is critical
    let status = match (db_ok, redis_ok) {
        (false, _) => "unhealthy",
        (true, Some(false)) => "degraded",
        (true, _) => "healthy",
    };
    let status_code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            services: ServiceHealth {
                database: if db_ok { "ok" } else { "error" }.to_string(),
                redis: redis_status.to_string(),
            },
        }),
    )
}
