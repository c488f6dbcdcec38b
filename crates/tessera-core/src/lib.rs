//! Tessera core types.
//!
//! Shared by every Tessera crate:
//! - [`document`]: the ordered JSON document model and key helpers
//! - [`method`]: request methods and the query/write split
//! - [`role`]: request roles and the `@role` extraction function
//! - [`config`]: YAML configuration and the policy catalog

pub mod config;
pub mod document;
pub mod method;
pub mod role;

pub use config::{
    CatalogEntry, ConfigError, DatabaseConfig, PolicyCatalog, StructureConfig, TesseraConfig,
};
pub use document::{Document, KEY_COUNT, KEY_ID, KEY_ROLE, KEY_USER_ID};
pub use method::{RequestMethod, UnknownMethod};
pub use role::{RequestRole, UnknownRole};
