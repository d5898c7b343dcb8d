//! License verification for premium downloads.

use crate::app::database_service::DatabaseService;
use crate::domain::error::{CdnError, Result};
use crate::domain::token::{DownloadTokenManager, IssuedToken};
use tracing::{debug, info};

/// Outcome of a successful verification.
#[derive(Debug, Clone)]
pub struct Verification {
    /// False for free modules: the file can be downloaded directly.
    pub requires_token: bool,
    pub token: Option<IssuedToken>,
}

/// Checks `license_key` for the module stored as `module_filename` and, for premium
/// modules, mints a download token bound to that filename.
///
/// The module is looked up first, so free modules never consult the license table and
/// an unknown module is reported as such whatever key was presented.
pub async fn verify(
    db: &DatabaseService,
    tokens: &DownloadTokenManager,
    license_key: &str,
    module_filename: &str,
) -> Result<Verification> {
    let license_key = license_key.trim();
    let module_filename = module_filename.trim();
    if license_key.is_empty() || module_filename.is_empty() {
        return Err(CdnError::validation(
            "license and moduleFilename are required",
        ));
    }

    let module = db
        .find_module_by_filename(module_filename)
        .await?
        .ok_or_else(|| CdnError::ModuleNotFound(module_filename.to_string()))?;

    if !module.price.is_premium() {
        debug!(module = %module_filename, "free module, no license needed");
        return Ok(Verification {
            requires_token: false,
            token: None,
        });
    }

    let license = db
        .find_active_license(license_key)
        .await?
        .ok_or(CdnError::InvalidLicense)?;

    let issued = tokens.issue(&module.filename).await;
    info!(license_id = license.id, module = %module.filename, "license accepted, download token issued");

    Ok(Verification {
        requires_token: true,
        token: Some(issued),
    })
}
