use crate::domain::error::CdnError;
use crate::domain::model::{
    is_allowed_application_file, NewApplication, UpdateCheck, APPLICATIONS_KIND,
    APPLICATION_EXTENSIONS,
};
use crate::transport::http::handlers::common::{created_json, ok_json, parse_id};
use crate::transport::http::types::{
    present, ApiResponse, AppState, ApplicationsQuery, UploadApplicationQuery,
};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde_json::json;
use tracing::{info, warn};

/// Upload limit for application binaries.
pub const MAX_APPLICATION_UPLOAD_BYTES: usize = 500 * 1024 * 1024;

#[utoipa::path(
    get,
    path = "/applications",
    params(("platform" = Option<String>, Query, description = "Restrict to one platform")),
    responses(
        (status = 200, description = "Applications ordered by platform then name", body = ApiResponse)
    )
)]
pub async fn list_applications_handler(
    State(state): State<AppState>,
    Query(query): Query<ApplicationsQuery>,
) -> Result<Response, CdnError> {
    let applications = state
        .db_service
        .list_applications(present(&query.platform))
        .await?;
    Ok(ok_json(json!({ "applications": applications })))
}

#[utoipa::path(
    get,
    path = "/applications/{id}",
    params(("id" = i64, Path, description = "Application id")),
    responses(
        (status = 200, description = "Application detail", body = ApiResponse),
        (status = 404, description = "Application not found", body = ApiResponse)
    )
)]
pub async fn application_detail_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, CdnError> {
    let id = parse_id(&key).ok_or_else(|| CdnError::ApplicationNotFound(key.clone()))?;
    let application = state
        .db_service
        .get_application(id)
        .await?
        .ok_or_else(|| CdnError::ApplicationNotFound(key.clone()))?;
    let download_url = application.download_url();
    Ok(ok_json(json!({
        "application": application,
        "downloadUrl": download_url,
    })))
}

#[utoipa::path(
    get,
    path = "/updates/{platform}/{name}/{current_version}",
    params(
        ("platform" = String, Path, description = "Client platform"),
        ("name" = String, Path, description = "Application name"),
        ("current_version" = String, Path, description = "Version the client runs")
    ),
    responses(
        (status = 200, description = "Update check result", body = UpdateCheck)
    )
)]
pub async fn check_update_handler(
    State(state): State<AppState>,
    Path((platform, name, current_version)): Path<(String, String, String)>,
) -> Result<Response, CdnError> {
    let latest = state.db_service.latest_application(&platform, &name).await?;
    let check = UpdateCheck::evaluate(latest.as_ref(), &current_version);
    Ok(ok_json(json!(check)))
}

#[utoipa::path(
    post,
    path = "/applications",
    params(
        ("name" = String, Query, description = "Application name"),
        ("platform" = String, Query, description = "Target platform"),
        ("version" = String, Query, description = "Release version"),
        ("filename" = String, Query, description = "Original file name"),
        ("changelog" = Option<String>, Query, description = "Changelog text"),
        ("release_notes" = Option<String>, Query, description = "Release notes")
    ),
    request_body(content = Vec<u8>, description = "Raw application binary", content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Application stored", body = ApiResponse),
        (status = 400, description = "Missing field or unsupported file type", body = ApiResponse),
        (status = 413, description = "Binary larger than 500 MiB"),
        (status = 401, description = "Unauthorized", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn upload_application_handler(
    State(state): State<AppState>,
    Query(query): Query<UploadApplicationQuery>,
    body: Bytes,
) -> Result<Response, CdnError> {
    let (Some(name), Some(platform), Some(version), Some(original)) = (
        present(&query.name),
        present(&query.platform),
        present(&query.version),
        present(&query.filename),
    ) else {
        return Err(CdnError::validation(
            "name, platform, version and filename are required",
        ));
    };
    if !is_allowed_application_file(original) {
        return Err(CdnError::validation(format!(
            "unsupported file type, expected one of {}",
            APPLICATION_EXTENSIONS.join(" ")
        )));
    }
    if body.is_empty() {
        return Err(CdnError::validation("file body is empty"));
    }

    let stored = state.storage.store(APPLICATIONS_KIND, original, &body).await?;
    let new = NewApplication {
        name: name.to_string(),
        platform: platform.to_string(),
        version: version.to_string(),
        filename: stored.clone(),
        changelog: present(&query.changelog).unwrap_or_default().to_string(),
        release_notes: present(&query.release_notes).unwrap_or_default().to_string(),
    };

    let application = match state.db_service.insert_application(&new).await {
        Ok(a) => a,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete(APPLICATIONS_KIND, &stored).await {
                warn!(filename = %stored, error = %cleanup, "failed to remove orphaned upload");
            }
            return Err(e);
        }
    };

    info!(
        application_id = application.id,
        name = %application.name,
        platform = %application.platform,
        version = %application.version,
        size = body.len(),
        "application uploaded"
    );
    Ok(created_json(json!({ "application": application })))
}

#[utoipa::path(
    delete,
    path = "/applications/{id}",
    params(("id" = i64, Path, description = "Application id")),
    responses(
        (status = 200, description = "Application deleted", body = ApiResponse),
        (status = 404, description = "Application not found", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn delete_application_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, CdnError> {
    let id = parse_id(&key).ok_or_else(|| CdnError::ApplicationNotFound(key.clone()))?;
    let application = state
        .db_service
        .delete_application(id)
        .await?
        .ok_or_else(|| CdnError::ApplicationNotFound(key.clone()))?;

    if let Err(e) = state
        .storage
        .delete(APPLICATIONS_KIND, &application.filename)
        .await
    {
        warn!(application_id = id, filename = %application.filename, error = %e, "stored file not removed");
    }

    info!(application_id = id, "application deleted");
    Ok(ok_json(json!({ "deleted": id })))
}
