pub mod resolver;

pub use resolver::resolve_download;
