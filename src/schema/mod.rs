//! Schemas, their catalog and the record runtime
//!
//! # Design Principles
//!
//! - Schemas are explicit data, interpreted at run time
//! - Schemas are immutable once registered
//! - Ambiguous access modes are rejected when a schema is registered
//! - Validation is deterministic and never mutates its input

pub mod access;
pub mod catalog;
mod errors;
mod loader;
pub mod types;
pub mod validator;

pub use access::AccessMode;
pub use catalog::{Catalog, ViewEntry, ViewRegistry};
pub use errors::{SchemaError, SchemaErrorCode, SchemaResult, ValidationDetails};
pub use loader::SchemaLoader;
pub use types::{
    Annotation, Constraint, DefaultFactory, Derivation, FieldDefault, FieldSpec, Schema,
    SchemaKind, Slot, TupleItem, TypeExpr, ViewOrigin,
};
pub use validator::{Record, RecordValidator};
