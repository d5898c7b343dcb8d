use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use utoipa::ToSchema;

/// Version recorded when an upload or update does not name one.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Price tier of a module. Anything other than `premium` in the store reads as free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Price {
    #[default]
    Free,
    Premium,
}

impl Price {
    pub fn as_str(&self) -> &'static str {
        match self {
            Price::Free => "free",
            Price::Premium => "premium",
        }
    }

    pub fn is_premium(&self) -> bool {
        matches!(self, Price::Premium)
    }

    /// Lenient parse used for request input and stored rows.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("premium") {
            Price::Premium
        } else {
            Price::Free
        }
    }
}

impl TryFrom<String> for Price {
    type Error = Infallible;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Price::parse(&value))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded module file as stored in the `modules` table.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: i64,
    pub name: String,
    /// Storage key inside the type directory (carries the upload suffix).
    pub filename: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    #[sqlx(try_from = "String")]
    pub price: Price,
    pub description: Option<String>,
    pub version: Option<String>,
    pub install_command: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Module {
    /// Case-insensitive key shared by every revision of the same module.
    pub fn group_key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn version_or_default(&self) -> &str {
        self.version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_VERSION)
    }

    /// Public download path, or `None` for premium modules (they go through license
    /// verification first).
    pub fn download_url(&self) -> Option<String> {
        if self.price.is_premium() {
            None
        } else {
            Some(download_path(&self.kind, &self.filename))
        }
    }
}

/// Fields for a freshly uploaded module row.
#[derive(Debug, Clone)]
pub struct NewModule {
    pub name: String,
    pub filename: String,
    pub kind: String,
    pub price: Price,
    pub description: String,
    pub version: String,
    pub install_command: Option<String>,
}

/// Full replacement of the editable module fields (last writer wins).
#[derive(Debug, Clone)]
pub struct ModuleUpdate {
    pub name: String,
    pub kind: String,
    pub version: String,
    pub price: Price,
    pub description: String,
    pub install_command: Option<String>,
}

/// Install command shown to users.
///
/// Precedence: the module's own command, then the operator override stored in
/// `module_metadata` for its filename, then `cd src/{stem} && composer install`.
pub fn resolve_install_command(module: &Module, metadata_override: Option<&str>) -> String {
    let explicit = module
        .install_command
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let fallback = metadata_override.map(str::trim).filter(|c| !c.is_empty());

    match explicit.or(fallback) {
        Some(cmd) => cmd.to_string(),
        None => default_install_command(&module.filename),
    }
}

/// Public path serving `kind/filename`.
pub fn download_path(kind: &str, filename: &str) -> String {
    format!("/download/{}/{}", kind, filename)
}

pub fn default_install_command(filename: &str) -> String {
    let stem = filename.replacen(".zip", "", 1);
    format!("cd src/{} && composer install", stem)
}
