use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{middleware as axum_middleware, Json, Router};

use crate::middleware::auth::auth_middleware;
use crate::state::AppState;
use crate::websocket::handlers::ws_handler;

pub mod conversations;
pub mod envelope;
pub mod messages;

use envelope::ApiEnvelope;

async fn health() -> (StatusCode, Json<ApiEnvelope<&'static str>>) {
    ApiEnvelope::success(StatusCode::OK, "service healthy", "ok")
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    use utoipa::OpenApi;
    Json(crate::openapi::ApiDoc::openapi())
}

/// Assemble the full router: public introspection endpoints, the
/// authenticated API surface, and the websocket upgrade endpoint.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/conversations", get(conversations::list))
        .route(
            "/conversations/direct/:other_user_id",
            get(conversations::get_or_create_direct),
        )
        .route("/conversations/group", post(conversations::create_group))
        .route("/conversations/:id/messages", get(messages::history))
        .route("/conversations/:id/read", post(conversations::mark_read))
        .route(
            "/conversations/:id/participant",
            put(conversations::update_participant),
        )
        .route(
            "/conversations/:id/flag",
            post(conversations::flag).delete(conversations::unflag),
        )
        .route("/conversations/:id", axum::routing::delete(conversations::soft_delete))
        .route("/messages", post(messages::send))
        .route(
            "/messages/:id",
            put(messages::edit).delete(messages::remove),
        )
        .route("/ws", get(ws_handler));

    let router = Router::new()
        .route("/health", get(health))
        .route("/openapi.json", get(openapi_json))
        .nest("/api/v1", api)
        .layer(axum_middleware::from_fn(auth_middleware));

    crate::middleware::with_defaults(router).with_state(state)
}
