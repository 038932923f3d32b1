pub mod v1;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Create the main API router with all versions
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", v1::create_v1_router())
        .layer(TraceLayer::new_for_http())
}

/// Router with state applied, ready to serve.
pub fn create_app(state: AppState) -> Router {
    create_api_router().with_state(state)
}
