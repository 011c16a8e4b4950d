//! Request throttling middleware

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::app::AppState;
use crate::http::routes::AppError;

/// Reject requests once the shared API quota is spent
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.api_limiter.check().is_err() {
        warn!(path = %request.uri().path(), "Rate limited API request");
        return Err(AppError::TooManyRequests);
    }

    Ok(next.run(request).await)
}
