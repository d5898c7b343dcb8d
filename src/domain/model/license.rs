use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Keys seeded when `LICENSE_KEYS` is not configured.
pub const DEFAULT_LICENSE_KEYS: &[&str] = &["EXNET-PIZZA-2024-001", "EXNET-PIZZA-2024-002"];

/// A license key from the static allow-list. `active = false` is a soft revocation.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema, sqlx::FromRow)]
pub struct License {
    pub id: i64,
    pub license_key: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
