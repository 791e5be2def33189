//! REST API layer: route handlers and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; `/health` and the
//! websocket endpoint live at the root.

pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Request timeout used by [`build_app`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// Full application: REST, websocket and HTTP middleware, bound to `state`.
pub fn build_app(state: AppState) -> Router {
    build_app_with_timeout(state, DEFAULT_REQUEST_TIMEOUT)
}

/// Same as [`build_app`] with an explicit per-request timeout.
///
/// The timeout answers `408` once elapsed. Upgraded websocket sessions
/// outlive it since the upgrade response returns immediately.
pub fn build_app_with_timeout(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .merge(build_router())
        .route("/ws/{clinic_id}", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::manager::Database;

    fn app() -> Router {
        let Ok(pool) = PgPoolOptions::new().connect_lazy("postgres://postgres@127.0.0.1:1/none")
        else {
            panic!("lazy pool");
        };
        build_app(AppState::new(Database::from_pool(pool), 4))
    }

    async fn status_of(uri: &str) -> StatusCode {
        let Ok(request) = Request::builder().uri(uri).body(Body::empty()) else {
            panic!("request");
        };
        let Ok(response) = app().oneshot(request).await else {
            panic!("router is infallible");
        };
        response.status()
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        assert_eq!(status_of("/api/v1/nothing").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn users_and_tokens_are_not_exposed() {
        assert_eq!(status_of("/api/v1/users").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of("/api/v1/tokens").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_filter_is_rejected_before_the_database() {
        assert_eq!(
            status_of("/api/v1/holidays?level__between=1").await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn non_numeric_id_is_bad_request() {
        assert_eq!(status_of("/api/v1/desks/abc").await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn slow_request_answers_request_timeout() {
        // Accepts connections but never speaks the Postgres protocol.
        let Ok(silent) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind");
        };
        let Ok(addr) = silent.local_addr() else {
            panic!("local addr");
        };
        let Ok(pool) = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_lazy(&format!("postgres://postgres@{addr}/none"))
        else {
            panic!("lazy pool");
        };
        let app = build_app_with_timeout(
            AppState::new(Database::from_pool(pool), 4),
            Duration::from_millis(100),
        );

        let Ok(request) = Request::builder().uri("/api/v1/desks/1").body(Body::empty()) else {
            panic!("request");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("router is infallible");
        };
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        drop(silent);
    }
}
