use crate::domain::error::CdnError;
use crate::domain::license;
use crate::transport::http::handlers::common::{ok_json, parse_id, public_message, status_for};
use crate::transport::http::types::{
    json_422, ApiResponse, AppState, LicenseActiveRequest, VerifyLicenseRequest,
    VerifyLicenseResponse,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::info;

#[utoipa::path(
    post,
    path = "/license/verify",
    request_body = VerifyLicenseRequest,
    responses(
        (status = 200, description = "License accepted (or module is free)", body = VerifyLicenseResponse),
        (status = 400, description = "Missing license or moduleFilename", body = VerifyLicenseResponse),
        (status = 403, description = "Invalid or inactive license", body = VerifyLicenseResponse),
        (status = 404, description = "Unknown module", body = VerifyLicenseResponse),
        (status = 500, description = "Internal server error", body = VerifyLicenseResponse)
    )
)]
pub async fn verify_license_handler(
    State(state): State<AppState>,
    request: Result<Json<VerifyLicenseRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => {
            return rejected(
                StatusCode::BAD_REQUEST,
                format!(
                    "Invalid JSON body: {} (expected: {{\"license\": \"...\", \"moduleFilename\": \"...\"}})",
                    e
                ),
            )
        }
    };

    let outcome = license::verify(
        &state.db_service,
        &state.tokens,
        &request.license,
        &request.module_filename,
    )
    .await;

    match outcome {
        Ok(verification) => {
            let body = match verification.token {
                Some(issued) => VerifyLicenseResponse {
                    valid: true,
                    message: "license valid".to_string(),
                    download_token: Some(issued.token),
                    expires_in_seconds: Some(issued.expires_in.as_secs()),
                },
                None => VerifyLicenseResponse {
                    valid: true,
                    message: "free module, no license required".to_string(),
                    download_token: None,
                    expires_in_seconds: None,
                },
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => rejected(status_for(&e), public_message(&e)),
    }
}

fn rejected(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(VerifyLicenseResponse {
            valid: false,
            message,
            download_token: None,
            expires_in_seconds: None,
        }),
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/licenses",
    responses(
        (status = 200, description = "All license keys", body = ApiResponse),
        (status = 401, description = "Unauthorized", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_licenses_handler(State(state): State<AppState>) -> Result<Response, CdnError> {
    let licenses = state.db_service.list_licenses().await?;
    Ok(ok_json(json!({ "licenses": licenses })))
}

#[utoipa::path(
    patch,
    path = "/licenses/{id}",
    params(("id" = i64, Path, description = "License id")),
    request_body = LicenseActiveRequest,
    responses(
        (status = 200, description = "License updated", body = ApiResponse),
        (status = 404, description = "License not found", body = ApiResponse),
        (status = 422, description = "Invalid JSON body", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn set_license_active_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    request: Result<Json<LicenseActiveRequest>, JsonRejection>,
) -> Result<Response, CdnError> {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return Ok(json_422(e, "{\"active\": true|false}").into_response()),
    };
    let id = parse_id(&key).ok_or_else(|| CdnError::LicenseNotFound(key.clone()))?;

    let license = state
        .db_service
        .set_license_active(id, request.active)
        .await?
        .ok_or_else(|| CdnError::LicenseNotFound(key.clone()))?;

    info!(license_id = id, active = request.active, "license status changed");
    Ok(ok_json(json!({ "license": license })))
}
