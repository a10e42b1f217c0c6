//! The provider surface: host schemas, CRUD handlers and the service the host
//! runtime drives.

pub mod data_source;
pub mod factory;
pub mod host;
pub mod resource_factory;

pub use factory::{OpenApiProvider, ProviderFactory};
pub use host::{ProviderSchema, ProviderService, ResourceState};
