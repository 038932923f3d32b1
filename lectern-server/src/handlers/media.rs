use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use lectern_core::access::MediaAccessToken;
use lectern_core::media::StreamUrls;
use serde::{Deserialize, Serialize};

use crate::auth::BearerToken;
use crate::infra::app_state::AppState;
use crate::infra::errors::AppResult;

#[derive(Debug, Clone, Deserialize)]
pub struct MediaTokenRequest {
    pub video_id: String,
    pub course_id: String,
    #[serde(default)]
    pub ttl_hours: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TtlQuery {
    #[serde(default)]
    pub ttl_hours: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaTokenResponse {
    pub token: String,
    pub video_id: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamUrls>,
}

impl MediaTokenResponse {
    fn new(token: MediaAccessToken, customer_code: Option<&str>) -> Self {
        let stream = customer_code.map(|code| StreamUrls::for_token(code, &token.token));
        Self {
            token: token.token,
            video_id: token.video_id,
            expires_at: token.expires_at,
            expires_in_seconds: token.expires_in_seconds,
            stream,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseTokensResponse {
    pub course_id: String,
    /// Keyed by lesson id
    pub tokens: BTreeMap<String, MediaTokenResponse>,
}

pub async fn issue_media_token(
    State(state): State<AppState>,
    BearerToken(bearer): BearerToken,
    Json(request): Json<MediaTokenRequest>,
) -> AppResult<Json<MediaTokenResponse>> {
    let deadline = state.deadline();
    let user_id = state.authenticate(&bearer, deadline).await?;

    let token = state
        .media_tokens
        .issue(
            &request.video_id,
            user_id,
            &request.course_id,
            request.ttl_hours,
            deadline,
        )
        .await?;

    Ok(Json(MediaTokenResponse::new(
        token,
        state.settings.stream_customer_code.as_deref(),
    )))
}

pub async fn issue_lesson_token(
    State(state): State<AppState>,
    BearerToken(bearer): BearerToken,
    Path((course_id, lesson_id)): Path<(String, String)>,
    Query(query): Query<TtlQuery>,
) -> AppResult<Json<MediaTokenResponse>> {
    let deadline = state.deadline();
    let user_id = state.authenticate(&bearer, deadline).await?;

    let token = state
        .media_tokens
        .issue_for_lesson(user_id, &course_id, &lesson_id, query.ttl_hours, deadline)
        .await?;

    Ok(Json(MediaTokenResponse::new(
        token,
        state.settings.stream_customer_code.as_deref(),
    )))
}

pub async fn issue_course_tokens(
    State(state): State<AppState>,
    BearerToken(bearer): BearerToken,
    Path(course_id): Path<String>,
    Query(query): Query<TtlQuery>,
) -> AppResult<Json<CourseTokensResponse>> {
    let deadline = state.deadline();
    let user_id = state.authenticate(&bearer, deadline).await?;

    let minted = state
        .media_tokens
        .issue_for_course(user_id, &course_id, query.ttl_hours, deadline)
        .await?;

    let customer_code = state.settings.stream_customer_code.as_deref();
    let tokens = minted
        .into_iter()
        .map(|(lesson_id, token)| (lesson_id, MediaTokenResponse::new(token, customer_code)))
        .collect();

    Ok(Json(CourseTokensResponse { course_id, tokens }))
}
