use crate::app::database_service::DatabaseService;
use crate::domain::error::{CdnError, Result, TokenError};
use crate::domain::token::DownloadTokenManager;
use crate::storage::{DiskStorage, FileHandle};
use tracing::{debug, info};

/// Decides whether `kind/filename` may be served for this request.
///
/// Order matters: the file must exist before the record store is consulted, and the
/// premium check is redone on every call because a module's price can be edited at any
/// time. Files without a module record are treated as free. For premium modules the
/// token is consumed here; any token failure becomes [`CdnError::AccessDenied`].
pub async fn resolve_download(
    db: &DatabaseService,
    storage: &DiskStorage,
    tokens: &DownloadTokenManager,
    kind: &str,
    filename: &str,
    token: Option<&str>,
) -> Result<FileHandle> {
    if !storage.exists(kind, filename).await? {
        return Err(CdnError::FileNotFound {
            kind: kind.to_string(),
            filename: filename.to_string(),
        });
    }

    match db.find_module(filename, kind).await? {
        Some(module) if module.price.is_premium() => {
            let token = token
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or(TokenError::Missing)?;
            tokens.validate_and_consume(token, filename).await?;
            info!(kind, filename, "premium download authorized");
        }
        Some(_) => debug!(kind, filename, "free module download"),
        None => debug!(kind, filename, "unregistered file served as free"),
    }

    storage.open(kind, filename).await
}
