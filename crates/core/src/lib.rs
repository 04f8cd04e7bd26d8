pub mod config;
pub mod domain;
pub mod errors;

pub use domain::server::{BackendAddress, ServerState};
pub use errors::{BootstrapError, RegistryError, RouterError};
