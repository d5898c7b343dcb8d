pub mod manager;

pub use manager::{DownloadTokenManager, IssuedToken, DEFAULT_TOKEN_CAPACITY, DOWNLOAD_TOKEN_TTL};
