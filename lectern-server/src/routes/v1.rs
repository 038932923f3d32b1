use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState,
    handlers::{media, sessions},
};

/// Create all v1 API routes
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route(
            "/sessions/devices",
            post(sessions::login_device).get(sessions::list_devices),
        )
        .route("/sessions/devices/logout", post(sessions::logout_device))
        .route("/sessions/devices/usage", get(sessions::device_usage))
        .route("/media/tokens", post(media::issue_media_token))
        .route(
            "/courses/{course_id}/lessons/{lesson_id}/token",
            get(media::issue_lesson_token),
        )
        .route(
            "/courses/{course_id}/video-tokens",
            get(media::issue_course_tokens),
        )
}
