//! HTTP route definitions

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info};

use crate::app::AppState;
use crate::game::session::FireOutcome;
use crate::game::validate::{FireRequest, GameOverRequest, RegisterRequest};
use crate::game::{Phase, SessionError};
use crate::http::middleware::rate_limit;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::Slot;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let cors = match state.config.allowed_origins() {
        None => cors.allow_origin(Any),
        Some(origins) => cors.allow_origin(
            origins
                .into_iter()
                .filter_map(|s| s.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ),
    };

    let public_routes = Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/ws", get(ws_handler));

    let api_routes = Router::new()
        .route("/api/v1/register", post(register_handler))
        .route("/api/v1/fire", post(fire_handler))
        .route("/api/v1/game-over", post(game_over_handler))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    uptime: u64,
    players: usize,
    connected: usize,
    phase: Phase,
    /// Only while a game is running
    game_id: Option<u32>,
    #[serde(rename = "playerId_turn")]
    turn: Option<Slot>,
    version: &'static str,
}

async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let summary = state.session.summary().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime: uptime_secs(),
        players: summary.registered,
        connected: summary.connected,
        phase: summary.phase,
        game_id: summary.session_id,
        turn: summary.turn,
        version: env!("CARGO_PKG_VERSION"),
    }))
}

// ============================================================================
// Session endpoints
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    player_id: Slot,
}

async fn register_handler(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, AppError> {
    let Json(req) = body.map_err(reject_body)?;
    let name = req.into_name()?;

    let slot = state.session.register(name).await?;
    info!(slot = %slot, "Registration accepted");

    Ok(Json(RegisterResponse { player_id: slot }))
}

async fn fire_handler(
    State(state): State<AppState>,
    body: Result<Json<FireRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(req) = body.map_err(reject_body)?;
    let cmd = req.into_command()?;

    match state.session.fire(cmd).await? {
        FireOutcome::TurnPassed(next) => debug!(next = %next, "Turn passed"),
        FireOutcome::GameOver { winner } => info!(winner = %winner, "Shot ended the game"),
    }
    Ok(StatusCode::OK)
}

async fn game_over_handler(
    State(state): State<AppState>,
    body: Result<Json<GameOverRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(req) = body.map_err(reject_body)?;
    let cmd = req.into_command()?;

    state.session.report_outcome(cmd).await?;
    Ok(StatusCode::OK)
}

fn reject_body(rejection: JsonRejection) -> SessionError {
    debug!(error = %rejection, "Unreadable request body");
    SessionError::invalid("Invalid JSON body")
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        let message = e.to_string();
        match e {
            SessionError::DuplicateName(_) => AppError::Conflict(message),
            SessionError::SessionFull | SessionError::OutcomeNotAccepted => {
                AppError::Forbidden(message)
            }
            SessionError::Unavailable => AppError::Internal(message),
            _ => AppError::BadRequest(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests".to_string(),
            ),
            AppError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let body = serde_json::json!({
            "details": message
        });

        (status, Json(body)).into_response()
    }
}
