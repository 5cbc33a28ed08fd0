//! Shared types for the Ember chat backend: API DTOs, domain enums, and the
//! structured store error. Kept free of storage and HTTP dependencies so both
//! ember-db and ember-api can build on it.

pub mod api;
pub mod error;
pub mod models;

pub use error::StoreError;
pub use models::{GroupRole, MessageKind};
