//! JSON API for the Telegram Mini App front-end.
//!
//! Game endpoints authenticate with the Web App init data Telegram hands to the
//! page; the leaderboard and health check are public. Everything that is not
//! an API route is served from the static directory.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::core::config;
use crate::core::error::AppError;
use crate::game::{
    AnswerOutcome, GameError, IgnoreReason, LeaderboardEntry, Level, PlayOutcome, PlayerId, QuestionView,
    ScoreStore, SessionManager, SessionReport, Topic,
};
use crate::telegram::webapp_auth::{self, WebAppUser};

// ============================================================================
// REQUESTS AND RESPONSES
// ============================================================================

/// `initData` may also travel in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    #[serde(rename = "initData")]
    pub init_data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    #[serde(alias = "level")]
    pub topic: Topic,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub seq: u32,
    pub answer: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    /// `school`, `university`, or any topic key of the level
    pub level: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlayResponse {
    Started { question: QuestionView },
    Resumed { question: QuestionView },
    Finished { report: SessionReport },
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerResponse {
    Correct { points: u32, question: QuestionView },
    Finished { report: SessionReport },
    Ignored { reason: IgnoreReason },
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionResponse {
    Active { question: QuestionView },
    Finished { report: SessionReport },
    Idle,
}

// ============================================================================
// STATE
// ============================================================================

/// Shared state for all endpoints
#[derive(Clone)]
pub struct WebAppState {
    pub manager: Arc<SessionManager>,
    pub store: Arc<dyn ScoreStore>,
    pub bot_token: String,
    pub static_dir: PathBuf,
}

impl WebAppState {
    pub fn new(manager: Arc<SessionManager>, bot_token: impl Into<String>) -> Self {
        Self {
            store: Arc::clone(manager.store()),
            manager,
            bot_token: bot_token.into(),
            static_dir: PathBuf::from(config::WEBAPP_STATIC_DIR.as_str()),
        }
    }

    #[must_use]
    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = dir.into();
        self
    }
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(msg) => ApiError::BadRequest(msg),
            AppError::Game(GameError::InvalidSelection(msg)) => ApiError::BadRequest(msg),
            other => {
                log::error!("Mini App request failed: {}", other);
                ApiError::Internal("Internal error".to_string())
            }
        }
    }
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        AppError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Validates the init data from the header (or the `initData` query parameter).
fn authenticate(headers: &HeaderMap, query: &AuthQuery, bot_token: &str) -> Result<WebAppUser, ApiError> {
    let init_data = headers
        .get(config::webapp::INIT_DATA_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .or(query.init_data.as_deref().filter(|v| !v.is_empty()))
        .ok_or_else(|| ApiError::Unauthorized("Missing Telegram init data".to_string()))?;

    webapp_auth::validate_telegram_webapp_data(init_data, bot_token)
        .map_err(|e| ApiError::Unauthorized(format!("Invalid init data: {}", e)))
}

/// Parses `school`, `university`/`uni` or a topic key into a level.
fn parse_level(value: &str) -> Result<Level, ApiError> {
    Level::from_str(value)
        .or_else(|_| Topic::from_str(value).map(Topic::level))
        .map_err(|_| ApiError::BadRequest(format!("Unknown level: {}", value)))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Builds the Mini App router
pub fn create_webapp_router(state: WebAppState) -> Router {
    let static_files = ServeDir::new(&state.static_dir);

    // Mini App pages are served from Telegram's origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/play", post(handle_play))
        .route("/api/answer", post(handle_answer))
        .route("/api/session", get(handle_session))
        .route("/api/stop", post(handle_stop))
        .route("/api/leaderboard", get(handle_leaderboard))
        .fallback_service(static_files)
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Runs the Mini App web server until it fails
pub async fn run_webapp_server(port: u16, state: WebAppState) -> anyhow::Result<()> {
    let app = create_webapp_router(state);

    let addr = format!("0.0.0.0:{}", port);
    log::info!("🌐 Starting Mini App web server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// API HANDLERS
// ============================================================================

/// Health check endpoint
async fn health_check(State(state): State<Arc<WebAppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mathgame-webapp",
        "active_sessions": state.manager.active_sessions()
    }))
}

/// POST /api/play - start (or resume) a session
async fn handle_play(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Query(auth): Query<AuthQuery>,
    Json(req): Json<PlayRequest>,
) -> Result<Json<PlayResponse>, ApiError> {
    let user = authenticate(&headers, &auth, &state.bot_token)?;
    let player = PlayerId(user.id);

    if !state.store.is_registered(player).await? {
        let name = user.leaderboard_name();
        state.store.register(player, &name).await?;
        log::info!("Registered Mini App player {} as {}", player, name);
    }

    let outcome = state
        .manager
        .start(player, req.topic.level(), req.topic)
        .await?;

    Ok(Json(match outcome {
        PlayOutcome::Started(question) => PlayResponse::Started { question },
        PlayOutcome::Resumed(question) => PlayResponse::Resumed { question },
        PlayOutcome::Finished(report) => PlayResponse::Finished { report },
    }))
}

/// POST /api/answer - answer the current question
async fn handle_answer(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Query(auth): Query<AuthQuery>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let user = authenticate(&headers, &auth, &state.bot_token)?;

    let outcome = state
        .manager
        .submit_answer(PlayerId(user.id), req.seq, req.answer)
        .await;

    Ok(Json(match outcome {
        AnswerOutcome::Correct { points, next } => AnswerResponse::Correct { points, question: next },
        AnswerOutcome::Finished(report) => AnswerResponse::Finished { report },
        AnswerOutcome::Ignored(reason) => AnswerResponse::Ignored { reason },
    }))
}

/// GET /api/session - the current question, or how the last session ended
async fn handle_session(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Query(auth): Query<AuthQuery>,
) -> Result<Json<SessionResponse>, ApiError> {
    let user = authenticate(&headers, &auth, &state.bot_token)?;
    let player = PlayerId(user.id);

    let response = if let Some(question) = state.manager.current(player) {
        SessionResponse::Active { question }
    } else if let Some(report) = state.manager.last_report(player) {
        SessionResponse::Finished { report }
    } else {
        SessionResponse::Idle
    };
    Ok(Json(response))
}

/// POST /api/stop - end the session and commit its score
async fn handle_stop(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Query(auth): Query<AuthQuery>,
) -> Result<Json<SessionReport>, ApiError> {
    let user = authenticate(&headers, &auth, &state.bot_token)?;

    state
        .manager
        .stop(PlayerId(user.id))
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No active session".to_string()))
}

/// GET /api/leaderboard?level=school&limit=10
async fn handle_leaderboard(
    State(state): State<Arc<WebAppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    let level = match query.level.as_deref() {
        Some(value) => parse_level(value)?,
        None => Level::School,
    };
    let limit = query
        .limit
        .unwrap_or(config::players::LEADERBOARD_SIZE)
        .min(config::players::LEADERBOARD_MAX_LIMIT);

    Ok(Json(state.store.leaderboard(level, limit).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_accepts_topic_keys() {
        assert_eq!(parse_level("school").unwrap(), Level::School);
        assert_eq!(parse_level("uni").unwrap(), Level::University);
        assert_eq!(parse_level("school_medium").unwrap(), Level::School);
        assert_eq!(parse_level("uni_discrete").unwrap(), Level::University);
        assert!(matches!(parse_level("mixed"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_empty_init_data_counts_as_missing() {
        let query = AuthQuery {
            init_data: Some(String::new()),
        };
        let err = authenticate(&HeaderMap::new(), &query, "token").unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(msg) if msg.contains("Missing")));
    }

    #[test]
    fn test_validation_errors_map_to_bad_request() {
        let err: ApiError = AppError::Validation("name must not be empty".into()).into();
        assert!(matches!(err, ApiError::BadRequest(_)));
        let err: ApiError = GameError::InvalidSelection("x".into()).into();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
