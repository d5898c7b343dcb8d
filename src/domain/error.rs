//! Error taxonomy shared by the domain services and the HTTP layer.

use thiserror::Error;

/// Why a download token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("a download token is required")]
    Missing,
    #[error("download token not found")]
    NotFound,
    #[error("download token was issued for a different file")]
    Mismatch,
    #[error("download token expired")]
    Expired,
}

#[derive(Debug, Error)]
pub enum CdnError {
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    #[error("application not found: {0}")]
    ApplicationNotFound(String),

    #[error("license not found: {0}")]
    LicenseNotFound(String),

    #[error("file not found: {kind}/{filename}")]
    FileNotFound { kind: String, filename: String },

    #[error("invalid license")]
    InvalidLicense,

    /// Every token failure surfaces as access denied; the reason is kept for logs and tests.
    #[error("access denied: {0}")]
    AccessDenied(#[from] TokenError),

    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CdnError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CdnError::Validation(msg.into())
    }

    /// True for errors that must not leak details to clients.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            CdnError::Storage(_) | CdnError::Database(_) | CdnError::Internal(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CdnError>;
