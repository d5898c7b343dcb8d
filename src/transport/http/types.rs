use crate::app::database_service::DatabaseService;
use crate::domain::model::{
    default_install_command, download_path, resolve_install_command, Module, Price,
    DEFAULT_VERSION,
};
use crate::domain::token::DownloadTokenManager;
use crate::storage::DiskStorage;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub db_service: Arc<DatabaseService>,
    pub storage: Arc<DiskStorage>,
    pub tokens: Arc<DownloadTokenManager>,
    /// Bearer key guarding admin routes; `None` leaves them open.
    pub admin_api_key: Option<Arc<str>>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(data: JsonValue) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

// --- License verification ---

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyLicenseRequest {
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub module_filename: String,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyLicenseResponse {
    pub valid: bool,
    pub message: String,
    /// Present only for premium modules; single use, bound to `moduleFilename`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<u64>,
}

#[derive(Deserialize, Serialize, Debug, ToSchema)]
pub struct LicenseActiveRequest {
    pub active: bool,
}

// --- Downloads ---

#[derive(Deserialize, Debug, ToSchema)]
pub struct DownloadQuery {
    #[serde(default)]
    pub token: Option<String>,
}

// --- Modules ---

/// Module as presented by detail endpoints, with the install command resolved.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDetail {
    pub id: i64,
    pub name: String,
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub version: String,
    pub price: Price,
    pub install_command: String,
    /// `null` for premium modules.
    pub download_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModuleDetail {
    pub fn new(module: &Module, install_override: Option<&str>) -> Self {
        ModuleDetail {
            id: module.id,
            name: module.name.clone(),
            filename: module.filename.clone(),
            kind: module.kind.clone(),
            description: module.description.clone().unwrap_or_default(),
            version: module.version_or_default().to_string(),
            price: module.price,
            install_command: resolve_install_command(module, install_override),
            download_url: module.download_url(),
            created_at: module.created_at,
            updated_at: module.updated_at,
        }
    }
}

/// Defaults describing a stored file that has no `modules` row. Such files are
/// served free.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnregisteredModule {
    pub name: String,
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub version: String,
    pub price: Price,
    pub install_command: String,
    pub download_url: String,
}

impl UnregisteredModule {
    pub fn new(kind: &str, filename: &str, install_override: Option<&str>) -> Self {
        let install_command = install_override
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .unwrap_or_else(|| default_install_command(filename));
        UnregisteredModule {
            name: filename.replacen(".zip", "", 1),
            filename: filename.to_string(),
            kind: kind.to_string(),
            description: "module not registered in database".to_string(),
            version: DEFAULT_VERSION.to_string(),
            price: Price::Free,
            install_command,
            download_url: download_path(kind, filename),
        }
    }
}

/// One archive found in a type directory, priced from its row when registered.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredModuleEntry {
    pub filename: String,
    pub price: Price,
    pub registered: bool,
    /// `null` for premium modules.
    pub download_url: Option<String>,
}

impl StoredModuleEntry {
    pub fn new(kind: &str, filename: String, module: Option<&Module>) -> Self {
        match module {
            Some(m) => StoredModuleEntry {
                price: m.price,
                registered: true,
                download_url: m.download_url(),
                filename,
            },
            None => StoredModuleEntry {
                price: Price::Free,
                registered: false,
                download_url: Some(download_path(kind, &filename)),
                filename,
            },
        }
    }
}

/// Marketplace listing entry; `installCommand` is only what the operator set.
#[derive(Serialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceEntry {
    pub id: i64,
    pub name: String,
    pub filename: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub price: Price,
    pub install_command: Option<String>,
    pub download_url: Option<String>,
}

impl From<&Module> for MarketplaceEntry {
    fn from(module: &Module) -> Self {
        MarketplaceEntry {
            id: module.id,
            name: module.name.clone(),
            filename: module.filename.clone(),
            description: module.description.clone(),
            version: module.version.clone(),
            price: module.price,
            install_command: module.install_command.clone().filter(|c| !c.is_empty()),
            download_url: module.download_url(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Default, ToSchema)]
pub struct UpdateModuleRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub install_command: Option<String>,
}

/// Query string of a raw-body module upload.
#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct UploadModuleQuery {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Original file name; must end in `.zip`.
    pub filename: Option<String>,
    pub price: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub install_command: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleMetadataRequest {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub install_command: Option<String>,
}

// --- Applications ---

#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct ApplicationsQuery {
    pub platform: Option<String>,
}

/// Query string of a raw-body application upload.
#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct UploadApplicationQuery {
    pub name: Option<String>,
    pub platform: Option<String>,
    pub version: Option<String>,
    pub filename: Option<String>,
    pub changelog: Option<String>,
    pub release_notes: Option<String>,
}

/// Trimmed, non-empty value of an optional input field.
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn json_422(err: JsonRejection, expected: &str) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::failure(format!(
            "Invalid JSON body: {} (expected: {})",
            err, expected
        ))),
    )
}
