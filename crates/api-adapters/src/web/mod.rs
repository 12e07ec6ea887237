//! # Web (axum)
//!
//! Routes, middleware and shared state.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

use axum::extract::{DefaultBodyLimit, MatchedPath, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, patch, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiResult};
pub use extract::{AuthUser, PostForm};
pub use state::AppState;

use handlers::{accounts, ai, feed, media, system};

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Builds the full application router.
///
/// `body_limit` caps request bodies in bytes; post uploads are the large ones.
pub fn router(state: AppState, body_limit: usize) -> Router {
    let api = Router::new()
        .route("/signup", post(accounts::signup))
        .route("/username-check", post(accounts::username_check))
        .route("/auth/signin", post(accounts::sign_in))
        .route("/profile", get(accounts::profile))
        .route("/profile/password", post(accounts::change_password))
        .route("/feed", get(feed::list_feed))
        .route("/posts", post(feed::create_post))
        .route("/posts/{id}", patch(feed::edit_post).delete(feed::delete_post))
        .route("/posts/{id}/like", post(feed::toggle_like))
        .route("/posts/{id}/comments", get(feed::list_comments).post(feed::add_comment))
        .route("/users/{id}/block", post(feed::block_user))
        .route("/ai/analyze", post(ai::analyze))
        .route("/ai/feedback", post(ai::feedback))
        .route("/stats/users", get(system::user_count));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .expose_headers([REQUEST_ID]);

    Router::new()
        .nest("/api", api)
        .route("/health", get(system::health))
        .route("/metrics", get(system::metrics))
        .route("/media/{bucket}/{*path}", get(media::serve))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(REQUEST_ID, MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
                    let request_id = req.headers().get(&REQUEST_ID).and_then(|v| v.to_str().ok()).unwrap_or("-");
                    tracing::info_span!("http", method = %req.method(), uri = %req.uri(), request_id)
                }))
                .layer(PropagateRequestIdLayer::new(REQUEST_ID))
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Counts every routed request by method, matched route and status.
async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;
    state.metrics.record_http(&method, &route, response.status().as_u16());
    response
}
