pub mod keys;

pub use keys::{generate_token, secrets_match};
