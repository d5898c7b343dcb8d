use crate::domain::model::module::download_path;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Storage directory for application binaries.
pub const APPLICATIONS_KIND: &str = "applications";

/// Accepted application binary extensions (compared case-insensitively).
pub const APPLICATION_EXTENSIONS: &[&str] =
    &[".exe", ".dmg", ".deb", ".appimage", ".apk", ".zip", ".tar.gz"];

/// A released application binary.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema, sqlx::FromRow)]
pub struct Application {
    pub id: i64,
    pub name: String,
    pub platform: String,
    pub version: String,
    pub filename: String,
    pub changelog: Option<String>,
    pub release_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn download_url(&self) -> String {
        download_path(APPLICATIONS_KIND, &self.filename)
    }
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub name: String,
    pub platform: String,
    pub version: String,
    pub filename: String,
    pub changelog: String,
    pub release_notes: String,
}

pub fn is_allowed_application_file(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    APPLICATION_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Outcome of comparing a client's installed version with the newest release.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheck {
    pub update_available: bool,
    pub current_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    pub download_url: Option<String>,
    pub changelog: Option<String>,
    pub release_notes: Option<String>,
}

impl UpdateCheck {
    /// Any difference from the latest version counts as an update (versions are free text).
    pub fn evaluate(latest: Option<&Application>, current_version: &str) -> Self {
        let Some(app) = latest else {
            return UpdateCheck {
                update_available: false,
                current_version: current_version.to_string(),
                latest_version: None,
                download_url: None,
                changelog: None,
                release_notes: None,
            };
        };

        let needs_update = app.version != current_version;
        UpdateCheck {
            update_available: needs_update,
            current_version: current_version.to_string(),
            latest_version: Some(app.version.clone()),
            download_url: needs_update.then(|| app.download_url()),
            changelog: if needs_update { app.changelog.clone() } else { None },
            release_notes: if needs_update { app.release_notes.clone() } else { None },
        }
    }
}
