pub mod download;
pub mod error;
pub mod license;
pub mod model;
pub mod token;
pub mod versioning;

pub use error::{CdnError, TokenError};
