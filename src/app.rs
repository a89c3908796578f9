use axum::{
    body::Body,
    http::{HeaderValue, Request},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::auth::JwtKeys;
use crate::client::{Client, TransactionOptions};
use crate::config::Settings;
use crate::middleware::{request_id_layer, RequestIdExt};
use crate::routes;
use crate::services::RedisCache;

/// Largest accepted request body; batch material uploads are the biggest payloads
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared application state
pub struct AppState {
    pub client: Client,
    pub settings: Settings,
    /// `None` when Redis is not configured or unreachable at startup
    pub cache: Option<RedisCache>,
    pub jwt: JwtKeys,
}

impl AppState {
    pub fn new(client: Client, settings: Settings, cache: Option<RedisCache>) -> Arc<Self> {
        let jwt = JwtKeys::new(
            &settings.jwt_secret,
            &settings.jwt_issuer,
            settings.jwt_ttl_seconds,
        );
        let client = client.with_transaction_defaults(TransactionOptions {
            max_wait: settings.transaction_max_wait,
            timeout: settings.transaction_timeout,
            isolation_level: None,
        });

        Arc::new(Self {
            client,
            settings,
            cache,
            jwt,
        })
    }
}

/// Build the complete application with all middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.settings);

    // Spans at DEBUG to keep INFO quiet; the request ID ties log lines together
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::debug_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = request.headers().request_id().unwrap_or("-"),
            )
        })
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    let (set_request_id, propagate_request_id) = request_id_layer();

    Router::new()
        .merge(routes::api_router())
        // Middleware stack (applied bottom-up)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(propagate_request_id)
        .layer(trace_layer)
        .layer(set_request_id)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // Longer preflight cache in development
    let max_age = if settings.env.is_dev() {
        std::time::Duration::from_secs(86400)
    } else {
        std::time::Duration::from_secs(3600)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::list([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::HeaderName::from_static("x-request-id"),
        ]))
        .allow_credentials(true)
        .max_age(max_age)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    /// State over a pool that never connects unless a handler reaches the
    /// database.
    pub fn lazy_state() -> Arc<AppState> {
        let settings = Settings::for_tests();
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy(&settings.database_url)
            .expect("valid test database url");
        AppState::new(Client::new(pool), settings, None)
    }
}
