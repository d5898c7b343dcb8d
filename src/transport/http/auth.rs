use crate::crypto::secrets_match;
use crate::transport::http::types::{ApiResponse, AppState};
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;

/// Gate for admin routes: `Authorization: Bearer <ADMIN_API_KEY>`.
/// Without a configured key every request passes.
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.admin_api_key.as_deref() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(key) if secrets_match(key.trim(), expected) => next.run(request).await,
        _ => {
            warn!(
                method = %request.method(),
                path = %request.uri().path(),
                "rejected admin request"
            );
            (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::failure("unauthorized")),
            )
                .into_response()
        }
    }
}
