//! API layer - HTTP handlers and routing
//!
//! The JSON API lives under `/api/v1`; the HTML pages from [`crate::web`]
//! are merged into the same router.

pub mod articles;
pub mod auth;
pub mod comments;
pub mod common;
pub mod generate;
pub mod images;
pub mod middleware;
pub mod paragraphs;
pub mod responses;
pub mod tags;
pub mod upload;


use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser, CurrentUser, OptionalUser};

/// Build the JSON API router
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .nest("/articles", articles::router())
        .nest("/paragraphs", paragraphs::router())
        .nest("/images", images::router())
        .nest("/tags", tags::router())
        .nest("/comments", comments::router())
        .nest("/auth", auth::router())
        .nest("/generate", generate::router())
        .layer(axum_middleware::from_fn(middleware::log_api_request))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let media = ServeDir::new(&state.config.upload.path);
    // Multipart framing on top of the largest accepted image
    let body_limit = state.config.upload.max_file_size as usize + 64 * 1024;

    Router::new()
        .nest("/api/v1", build_api_router().layer(cors_layer(&state.config.server.cors_origin)))
        .merge(crate::web::router(state.clone()))
        .nest_service("/media", media)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// CORS for the API. `*` allows any origin without cookies; an unparseable
/// origin disables cross-origin access.
fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    if origin.trim() == "*" {
        return cors.allow_origin(Any);
    }
    let cors = cors.allow_credentials(true);

    match origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
            cors
        }
    }
}
