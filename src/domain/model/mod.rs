//! Record types for modules, applications and licenses.

pub mod application;
pub mod license;
pub mod module;

pub use application::{
    is_allowed_application_file, Application, NewApplication, UpdateCheck, APPLICATIONS_KIND,
    APPLICATION_EXTENSIONS,
};
pub use license::{License, DEFAULT_LICENSE_KEYS};
pub use module::{
    default_install_command, download_path, resolve_install_command, Module, ModuleUpdate,
    NewModule, Price, DEFAULT_VERSION,
};
