pub mod auth;
pub mod router;
pub mod types;
pub mod handlers {
    pub mod applications;
    pub mod common;
    pub mod download;
    pub mod health;
    pub mod license;
    pub mod modules;
}

pub use router::{build_app, create_router, ApiDoc};
pub use types::AppState;
