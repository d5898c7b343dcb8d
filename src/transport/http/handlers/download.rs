use crate::domain::download::resolve_download;
use crate::domain::error::CdnError;
use crate::transport::http::types::{ApiResponse, AppState, DownloadQuery};
use axum::body::Body;
use axum::extract::{Path, Query, Request, State};
use axum::http::header::CONTENT_DISPOSITION;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

#[utoipa::path(
    get,
    path = "/download/{type}/{filename}",
    params(
        ("type" = String, Path, description = "Module type directory (plugins, themes, applications, ...)"),
        ("filename" = String, Path, description = "Stored file name"),
        ("token" = Option<String>, Query, description = "Single-use download token, required for premium modules")
    ),
    responses(
        (status = 200, description = "File contents as an attachment", content_type = "application/octet-stream"),
        (status = 403, description = "Premium module without a valid token", body = ApiResponse),
        (status = 404, description = "No such file", body = ApiResponse)
    )
)]
pub async fn download_handler(
    State(state): State<AppState>,
    Path((kind, filename)): Path<(String, String)>,
    Query(query): Query<DownloadQuery>,
    request: Request,
) -> Result<Response, CdnError> {
    let handle = resolve_download(
        &state.db_service,
        &state.storage,
        &state.tokens,
        &kind,
        &filename,
        query.token.as_deref(),
    )
    .await?;

    let served = ServeFile::new(&handle.path)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});
    let mut response = served.map(Body::new).into_response();

    let disposition = format!("attachment; filename=\"{}\"", handle.filename.replace('"', "_"));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response.headers_mut().insert(CONTENT_DISPOSITION, value);
    }
    debug!(kind = %handle.kind, filename = %handle.filename, size = handle.size, "serving file");
    Ok(response)
}
