use crate::domain::error::CdnError;
use crate::transport::http::types::ApiResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value as JsonValue;
use tracing::{error, warn};

pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

pub fn status_for(err: &CdnError) -> StatusCode {
    match err {
        CdnError::ModuleNotFound(_)
        | CdnError::ApplicationNotFound(_)
        | CdnError::LicenseNotFound(_)
        | CdnError::FileNotFound { .. } => StatusCode::NOT_FOUND,
        CdnError::InvalidLicense | CdnError::AccessDenied(_) => StatusCode::FORBIDDEN,
        CdnError::Validation(_) => StatusCode::BAD_REQUEST,
        CdnError::Storage(_) | CdnError::Database(_) | CdnError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Client-facing message. Internal failures are logged here and replaced by a generic text.
pub fn public_message(err: &CdnError) -> String {
    if err.is_internal() {
        error!(error = %err, "request failed");
        return INTERNAL_ERROR_MESSAGE.to_string();
    }
    if let CdnError::AccessDenied(reason) = err {
        warn!(%reason, "download denied");
    }
    err.to_string()
}

impl IntoResponse for CdnError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        (status, Json(ApiResponse::failure(public_message(&self)))).into_response()
    }
}

pub fn ok_json(data: JsonValue) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
}

pub fn created_json(data: JsonValue) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::ok(data))).into_response()
}

/// Numeric path ids; anything else cannot name a record.
pub fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}
