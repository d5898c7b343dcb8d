pub mod app;
pub mod crypto;
pub mod domain;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::database_service::DatabaseService;
pub use domain::error::{CdnError, Result, TokenError};
pub use domain::token::DownloadTokenManager;
pub use infra::config::Config;
pub use storage::DiskStorage;
pub use transport::http::AppState;
