pub mod grouper;

pub use grouper::{group, list_versions, ModuleVersion, ModuleVersionGroup};
