//! schema-views - access-mode views derived from canonical record schemas
//!
//! A schema author marks fields with access modes; a [`views::Builder`]
//! derives restricted views (`Load`, `Update`, `CreateResult`, `Create`, or
//! custom ones) and the [`views::Projector`] moves data between records and
//! their views.

pub mod config;
pub mod observability;
pub mod schema;
pub mod views;

pub use config::{CatalogConfig, MissingViewPolicy, ViewsConfig};
pub use schema::{AccessMode, Catalog, Record, Schema, SchemaError, SchemaResult};
pub use views::{Builder, Projector, ViewOptions};
