//! Access-mode views of schemas
//!
//! A view is a schema synthesized from a source schema by a [`Builder`]:
//! filtered by access mode, with nested schema references replaced by their
//! views of the same name. The [`Projector`] moves data between a record and
//! its views.

pub mod builder;
pub mod options;
pub mod projection;
pub mod rewrite;

pub use builder::Builder;
pub use options::ViewOptions;
pub use projection::Projector;
pub use rewrite::{make_nullable, rewrite, shape_nullable, shape_root_nullable, strip_nullable};
