use crate::domain::error::CdnError;
use crate::domain::model::{ModuleUpdate, NewModule, Price, DEFAULT_VERSION};
use crate::domain::versioning;
use crate::transport::http::handlers::common::{created_json, ok_json, parse_id};
use crate::transport::http::types::{
    json_422, present, ApiResponse, AppState, MarketplaceEntry, ModuleDetail,
    ModuleMetadataRequest, StoredModuleEntry, UnregisteredModule, UpdateModuleRequest,
    UploadModuleQuery,
};
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Upload limit for module archives.
pub const MAX_MODULE_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[utoipa::path(
    get,
    path = "/modules",
    responses(
        (status = 200, description = "One entry per module name, newest revision first", body = ApiResponse),
        (status = 401, description = "Unauthorized", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_module_groups_handler(
    State(state): State<AppState>,
) -> Result<Response, CdnError> {
    let modules = state.db_service.list_modules().await?;
    let groups = versioning::group(modules);
    Ok(ok_json(json!({ "modules": groups })))
}

#[utoipa::path(
    get,
    path = "/modules/{id}",
    params(("id" = i64, Path, description = "Module id")),
    responses(
        (status = 200, description = "Module detail", body = ApiResponse),
        (status = 404, description = "Module not found", body = ApiResponse)
    )
)]
pub async fn module_detail_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, CdnError> {
    let module = match parse_id(&key) {
        Some(id) => state.db_service.get_module(id).await?,
        None => None,
    }
    .ok_or_else(|| CdnError::ModuleNotFound(key.clone()))?;

    let install_override = state.db_service.install_override(&module.filename).await?;
    let detail = ModuleDetail::new(&module, install_override.as_deref());
    Ok(ok_json(json!({ "module": detail })))
}

#[utoipa::path(
    get,
    path = "/module-info/{type}/{filename}",
    params(
        ("type" = String, Path, description = "Type directory"),
        ("filename" = String, Path, description = "Stored file name")
    ),
    responses(
        (status = 200, description = "Registered detail, or defaults for an unregistered file", body = ApiResponse),
        (status = 404, description = "No such file", body = ApiResponse)
    )
)]
pub async fn module_info_handler(
    State(state): State<AppState>,
    Path((kind, filename)): Path<(String, String)>,
) -> Result<Response, CdnError> {
    if !state.storage.exists(&kind, &filename).await? {
        return Err(CdnError::FileNotFound { kind, filename });
    }

    let install_override = state.db_service.install_override(&filename).await?;
    let data = match state.db_service.find_module(&filename, &kind).await? {
        Some(module) => json!({
            "registered": true,
            "module": ModuleDetail::new(&module, install_override.as_deref()),
        }),
        None => json!({
            "registered": false,
            "module": UnregisteredModule::new(&kind, &filename, install_override.as_deref()),
        }),
    };
    Ok(ok_json(data))
}

#[utoipa::path(
    get,
    path = "/modules/type/{type}",
    params(("type" = String, Path, description = "Type directory to list")),
    responses(
        (status = 200, description = "Archives stored under the type, registered or not", body = ApiResponse),
        (status = 400, description = "Invalid type name", body = ApiResponse)
    )
)]
pub async fn modules_of_type_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Response, CdnError> {
    let mut modules = Vec::new();
    for filename in state.storage.list(&kind, ".zip").await? {
        let module = state.db_service.find_module(&filename, &kind).await?;
        modules.push(StoredModuleEntry::new(&kind, filename, module.as_ref()));
    }
    Ok(ok_json(json!({
        "moduleType": kind,
        "modules": modules,
    })))
}

#[utoipa::path(
    get,
    path = "/modules/{name}/versions",
    params(("name" = String, Path, description = "Module name (case-insensitive)")),
    responses(
        (status = 200, description = "Every revision, newest first; the first is current", body = ApiResponse),
        (status = 404, description = "No module with that name", body = ApiResponse)
    )
)]
pub async fn module_versions_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, CdnError> {
    let modules = state.db_service.list_modules().await?;
    let versions = versioning::list_versions(modules, &name);
    if versions.is_empty() {
        return Err(CdnError::ModuleNotFound(name));
    }
    Ok(ok_json(json!({
        "name": name.to_lowercase(),
        "versions": versions,
    })))
}

#[utoipa::path(
    get,
    path = "/marketplace",
    responses(
        (status = 200, description = "Modules grouped by type", body = ApiResponse)
    )
)]
pub async fn marketplace_handler(State(state): State<AppState>) -> Result<Response, CdnError> {
    let mut by_type: BTreeMap<String, Vec<MarketplaceEntry>> = BTreeMap::new();
    for module in state.db_service.list_modules_by_type().await? {
        by_type
            .entry(module.kind.clone())
            .or_default()
            .push(MarketplaceEntry::from(&module));
    }
    Ok(ok_json(json!({ "modules": by_type })))
}

#[utoipa::path(
    post,
    path = "/modules",
    params(
        ("name" = String, Query, description = "Display name"),
        ("type" = String, Query, description = "Type directory, e.g. plugins"),
        ("filename" = String, Query, description = "Original file name, must end in .zip"),
        ("price" = Option<String>, Query, description = "free (default) or premium"),
        ("version" = Option<String>, Query, description = "Defaults to 1.0.0"),
        ("description" = Option<String>, Query, description = "Free text"),
        ("install_command" = Option<String>, Query, description = "Install command shown to users")
    ),
    request_body(content = Vec<u8>, description = "Raw .zip archive", content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Module stored", body = ApiResponse),
        (status = 400, description = "Missing field or not a .zip", body = ApiResponse),
        (status = 413, description = "Archive larger than 50 MiB"),
        (status = 401, description = "Unauthorized", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn upload_module_handler(
    State(state): State<AppState>,
    Query(query): Query<UploadModuleQuery>,
    body: Bytes,
) -> Result<Response, CdnError> {
    let name = present(&query.name).ok_or_else(|| CdnError::validation("name is required"))?;
    let kind = present(&query.kind).ok_or_else(|| CdnError::validation("type is required"))?;
    let original =
        present(&query.filename).ok_or_else(|| CdnError::validation("filename is required"))?;
    if !original.to_lowercase().ends_with(".zip") {
        return Err(CdnError::validation("only .zip archives are accepted"));
    }
    if body.is_empty() {
        return Err(CdnError::validation("file body is empty"));
    }

    let stored = state.storage.store(kind, original, &body).await?;
    let new = NewModule {
        name: name.to_string(),
        filename: stored.clone(),
        kind: kind.to_string(),
        price: present(&query.price).map(Price::parse).unwrap_or_default(),
        description: present(&query.description).unwrap_or_default().to_string(),
        version: present(&query.version).unwrap_or(DEFAULT_VERSION).to_string(),
        install_command: present(&query.install_command).map(String::from),
    };

    let module = match state.db_service.insert_module(&new).await {
        Ok(m) => m,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete(kind, &stored).await {
                warn!(kind, filename = %stored, error = %cleanup, "failed to remove orphaned upload");
            }
            return Err(e);
        }
    };

    info!(
        module_id = module.id,
        name = %module.name,
        kind = %module.kind,
        filename = %module.filename,
        price = %module.price,
        size = body.len(),
        "module uploaded"
    );
    Ok(created_json(json!({ "module": ModuleDetail::new(&module, None) })))
}

#[utoipa::path(
    put,
    path = "/modules/{id}",
    params(("id" = i64, Path, description = "Module id")),
    request_body = UpdateModuleRequest,
    responses(
        (status = 200, description = "Updated module", body = ApiResponse),
        (status = 400, description = "Missing name or type, or the file already exists under the new type", body = ApiResponse),
        (status = 404, description = "Module not found", body = ApiResponse),
        (status = 422, description = "Invalid JSON body", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update_module_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    request: Result<Json<UpdateModuleRequest>, JsonRejection>,
) -> Result<Response, CdnError> {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => {
            return Ok(json_422(
                e,
                "{\"name\", \"type\", \"version\", \"price\", \"description\", \"install_command\"}",
            )
            .into_response())
        }
    };

    let (Some(name), Some(kind)) = (present(&request.name), present(&request.kind)) else {
        return Err(CdnError::validation("name and type are required"));
    };
    let update = ModuleUpdate {
        name: name.to_string(),
        kind: kind.to_string(),
        version: present(&request.version).unwrap_or(DEFAULT_VERSION).to_string(),
        price: present(&request.price).map(Price::parse).unwrap_or_default(),
        description: request.description.clone().unwrap_or_default(),
        install_command: present(&request.install_command).map(String::from),
    };

    let id = parse_id(&key).ok_or_else(|| CdnError::ModuleNotFound(key.clone()))?;
    let current = state
        .db_service
        .get_module(id)
        .await?
        .ok_or_else(|| CdnError::ModuleNotFound(key.clone()))?;

    // The stored file follows its row into the new type directory.
    state.storage.path(&update.kind, &current.filename)?;
    let moved_from = if current.kind != update.kind
        && state.storage.exists(&current.kind, &current.filename).await?
    {
        state
            .storage
            .relocate(&current.kind, &update.kind, &current.filename)
            .await?;
        Some(current.kind.as_str())
    } else {
        if current.kind != update.kind {
            warn!(module_id = id, filename = %current.filename, "stored file missing, type changed without moving it");
        }
        None
    };

    let updated = state
        .db_service
        .update_module(id, &update)
        .await
        .and_then(|m| m.ok_or_else(|| CdnError::ModuleNotFound(key.clone())));
    let module = match updated {
        Ok(m) => m,
        Err(e) => {
            if let Some(old_kind) = moved_from {
                if let Err(rollback) = state
                    .storage
                    .relocate(&update.kind, old_kind, &current.filename)
                    .await
                {
                    warn!(module_id = id, filename = %current.filename, error = %rollback, "failed to move file back");
                }
            }
            return Err(e);
        }
    };

    info!(
        module_id = id,
        price = %module.price,
        moved = moved_from.is_some(),
        "module updated"
    );
    let install_override = state.db_service.install_override(&module.filename).await?;
    Ok(ok_json(json!({
        "module": ModuleDetail::new(&module, install_override.as_deref())
    })))
}

#[utoipa::path(
    delete,
    path = "/modules/{id}",
    params(("id" = i64, Path, description = "Module id")),
    responses(
        (status = 200, description = "Module deleted", body = ApiResponse),
        (status = 404, description = "Module not found", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn delete_module_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, CdnError> {
    let id = parse_id(&key).ok_or_else(|| CdnError::ModuleNotFound(key.clone()))?;
    let module = state
        .db_service
        .delete_module(id)
        .await?
        .ok_or_else(|| CdnError::ModuleNotFound(key.clone()))?;

    // The record is gone either way; a missing file is not an error.
    if let Err(e) = state.storage.delete(&module.kind, &module.filename).await {
        warn!(module_id = id, filename = %module.filename, error = %e, "stored file not removed");
    }

    info!(module_id = id, name = %module.name, "module deleted");
    Ok(ok_json(json!({ "deleted": id })))
}

#[utoipa::path(
    post,
    path = "/module-metadata",
    request_body = ModuleMetadataRequest,
    responses(
        (status = 200, description = "Override replaced", body = ApiResponse),
        (status = 201, description = "Override created", body = ApiResponse),
        (status = 400, description = "filename is required", body = ApiResponse),
        (status = 422, description = "Invalid JSON body", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn module_metadata_handler(
    State(state): State<AppState>,
    request: Result<Json<ModuleMetadataRequest>, JsonRejection>,
) -> Result<Response, CdnError> {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => {
            return Ok(json_422(e, "{\"filename\": \"...\", \"installCommand\": \"...\"}")
                .into_response())
        }
    };

    let filename = request.filename.trim();
    if filename.is_empty() {
        return Err(CdnError::validation("filename is required"));
    }
    let install_command = present(&request.install_command);

    let created = state
        .db_service
        .upsert_install_override(filename, install_command)
        .await?;
    let data = json!({ "filename": filename, "installCommand": install_command });
    Ok(if created {
        created_json(data)
    } else {
        ok_json(data)
    })
}
