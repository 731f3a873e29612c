//! View builder
//!
//! A [`Builder`] synthesizes the view `<Schema><View>` of a schema:
//! - fields are kept when unconditional or when their access mode is requested
//! - nested schema references are replaced by the nested schema's view of
//!   the same name, built on demand
//! - the shaping options reshape kept types and defaults
//! - the result is registered in the catalog and in the source's registry
//!
//! Building is idempotent: a second request for the same view returns the
//! registered schema. Views built along the way are published together once
//! the whole build succeeds; a failed build publishes nothing.
//!
//! Views are attributed to the context that constructed the builder, unless
//! [`Builder::module`] names another one.

use std::panic::Location;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::options::ViewOptions;
use super::rewrite::{rewrite, shape_nullable, shape_root_nullable};
use crate::config::{MissingViewPolicy, ViewDefinition};
use crate::schema::access::{access_mode, is_included, strip_access};
use crate::schema::catalog::{Catalog, ViewEntry, ViewRegistry, ViewSlot};
use crate::schema::types::{FieldDefault, FieldSpec, Schema, ViewOrigin};
use crate::schema::{AccessMode, SchemaError, SchemaResult};

/// Synthesizes views of a given name and shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Builder {
    name: String,
    options: ViewOptions,
    /// Context the synthesized views are attributed to
    module: String,
}

impl Builder {
    #[track_caller]
    pub fn new(
        name: impl Into<String>,
        access_modes: impl IntoIterator<Item = AccessMode>,
    ) -> Self {
        Self::from_options(name, ViewOptions::new(access_modes))
    }

    #[track_caller]
    pub fn from_options(name: impl Into<String>, options: ViewOptions) -> Self {
        Self {
            name: name.into(),
            options,
            module: caller_context(Location::caller()),
        }
    }

    #[track_caller]
    pub fn from_definition(definition: &ViewDefinition) -> Self {
        let builder = Self::from_options(&definition.name, definition.options.clone());
        match &definition.module {
            Some(module) => builder.module(module),
            None => builder,
        }
    }

    /// Fields readable after the record exists.
    #[track_caller]
    pub fn load() -> Self {
        Self::new("Load", [AccessMode::ReadOnly, AccessMode::ReadAndWrite])
            .include_computed_fields(true)
    }

    /// Fields writable on an existing record.
    #[track_caller]
    pub fn update() -> Self {
        Self::new("Update", [AccessMode::WriteOnly, AccessMode::ReadAndWrite])
    }

    /// Fields returned in response to a creation.
    #[track_caller]
    pub fn create_result() -> Self {
        Self::new(
            "CreateResult",
            [
                AccessMode::ReadOnly,
                AccessMode::ReadOnlyOnCreation,
                AccessMode::ReadAndWrite,
            ],
        )
        .include_computed_fields(true)
    }

    /// Fields accepted when creating a record.
    #[track_caller]
    pub fn create() -> Self {
        Self::new(
            "Create",
            [
                AccessMode::WriteOnly,
                AccessMode::WriteOnlyOnCreation,
                AccessMode::ReadAndWrite,
            ],
        )
    }

    /// The four standard builders: load, update, create result, create.
    #[track_caller]
    pub fn standard() -> [Builder; 4] {
        [Self::load(), Self::update(), Self::create_result(), Self::create()]
    }

    pub fn all_nullable(mut self, enabled: bool) -> Self {
        self.options.all_nullable = enabled;
        self
    }

    pub fn all_optional(mut self, enabled: bool) -> Self {
        self.options.all_optional = enabled;
        self
    }

    pub fn hide_default_null(mut self, enabled: bool) -> Self {
        self.options.hide_default_null = enabled;
        self
    }

    pub fn include_computed_fields(mut self, enabled: bool) -> Self {
        self.options.include_computed_fields = enabled;
        self
    }

    /// Attributes the synthesized views to `module` instead of the
    /// constructing context.
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Context the synthesized views are attributed to.
    pub fn context(&self) -> &str {
        &self.module
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    /// Builds (or returns the registered) view of `schema`.
    ///
    /// # Errors
    ///
    /// - `VIEW_UNKNOWN_SCHEMA` when `schema` or a nested schema is unknown
    /// - `VIEW_CONFLICT` when the view name is taken by a different view
    /// - `VIEW_NAME_COLLISION` when `<Schema><View>` names an existing schema
    /// - `VIEW_MISSING` under [`MissingViewPolicy::Error`]
    ///
    /// A failed build publishes no view, nested ones included.
    pub fn build_view(&self, catalog: &Catalog, schema: &str) -> SchemaResult<Arc<Schema>> {
        let _guard = catalog.build_guard();

        let mut session = BuildSession {
            builder: self,
            catalog,
            reserved: Vec::new(),
            staged: Vec::new(),
        };
        session
            .build(schema)
            .and_then(|view| session.commit().map(|()| view))
            .inspect_err(|err| {
                warn!(schema, view = %self.name, error = %err, "view build failed");
                session.rollback();
            })
    }

    /// Builds the view of every named schema, in order.
    pub fn build_all<'s>(
        &self,
        catalog: &Catalog,
        schemas: impl IntoIterator<Item = &'s str>,
    ) -> SchemaResult<Vec<Arc<Schema>>> {
        schemas.into_iter().map(|schema| self.build_view(catalog, schema)).collect()
    }
}

fn caller_context(location: &Location<'_>) -> String {
    file_context(location.file())
}

/// Module-path style context of a source file: `src/api/users.rs` and
/// `tests/api/users.rs` both become `api::users`.
fn file_context(file: &str) -> String {
    const SOURCE_ROOTS: [&str; 4] = ["src", "tests", "examples", "benches"];

    let file = file.replace('\\', "/");
    let stem = file.strip_suffix(".rs").unwrap_or(&file);
    let mut segments: Vec<&str> = stem
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    if let Some(root) = segments.iter().rposition(|s| SOURCE_ROOTS.contains(s)) {
        segments.drain(..=root);
    }
    if matches!(segments.last(), Some(&("mod" | "lib" | "main"))) {
        segments.pop();
    }
    segments.join("::")
}

/// One top-level build.
///
/// Views are staged until the whole build succeeds; until then their
/// registry slots stay reserved, so recursive references resolve to them
/// while readers see nothing.
struct BuildSession<'a> {
    builder: &'a Builder,
    catalog: &'a Catalog,
    reserved: Vec<Arc<ViewRegistry>>,
    staged: Vec<(Arc<ViewRegistry>, Arc<Schema>)>,
}

impl BuildSession<'_> {
    fn view(&self) -> &str {
        &self.builder.name
    }

    fn options(&self) -> &ViewOptions {
        &self.builder.options
    }

    fn conflict(&self, schema: &str) -> SchemaError {
        SchemaError::ViewConflict {
            schema: schema.to_string(),
            view: self.view().to_string(),
        }
    }

    fn build(&mut self, name: &str) -> SchemaResult<Arc<Schema>> {
        let source = self.catalog.require(name)?;
        let registry = self.catalog.ensure_views(name)?;

        match registry.slot(self.view()) {
            Some(ViewSlot::Ready(ViewEntry::Built { schema, options }))
                if options == *self.options() =>
            {
                return Ok(schema)
            }
            Some(_) => return Err(self.conflict(name)),
            None => {}
        }

        let view_name = format!("{}{}", source.name, self.view());
        if self.catalog.contains(&view_name) {
            return Err(SchemaError::NameCollision(view_name));
        }

        // Reserve first so recursive references resolve to this view
        registry.reserve(self.view(), &view_name, self.options())?;
        self.reserved.push(Arc::clone(&registry));

        let fields = if source.is_root() {
            self.root_fields(&source)?
        } else {
            self.record_fields(&source)?
        };

        let view = Arc::new(Schema {
            name: view_name,
            module: self.builder.module.clone(),
            description: Some(format!(
                "View `{}` of schema `{}`",
                self.view(),
                source.qualified_name()
            )),
            kind: source.kind,
            fields,
            origin: Some(ViewOrigin {
                source: source.name.clone(),
                view: self.view().to_string(),
            }),
        });

        self.staged.push((registry, Arc::clone(&view)));
        debug!(
            schema = %source.name,
            view = %self.view(),
            fields = view.fields.len(),
            "built view {}",
            view.name
        );
        Ok(view)
    }

    fn root_fields(&mut self, source: &Schema) -> SchemaResult<Vec<FieldSpec>> {
        let mut fields = Vec::with_capacity(1);
        for field in &source.fields {
            let mut ty = rewrite(&field.ty, &mut |nested: &str| self.resolve(nested))?;
            if self.options().all_nullable {
                ty = shape_root_nullable(&ty);
            }
            let mut root = field.clone();
            root.ty = ty;
            root.metadata = strip_access(&field.metadata);
            fields.push(root);
        }
        Ok(fields)
    }

    fn record_fields(&mut self, source: &Schema) -> SchemaResult<Vec<FieldSpec>> {
        let mut fields = Vec::new();
        for field in &source.fields {
            if field.is_computed() {
                if self.options().include_computed_fields {
                    fields.push(field.clone());
                }
                continue;
            }

            let mode = access_mode(&source.name, field)?;
            if !is_included(mode, &self.options().access_modes) {
                trace!(schema = %source.name, field = %field.name, "field filtered out");
                continue;
            }

            let mut ty = rewrite(&field.ty, &mut |nested: &str| self.resolve(nested))?;
            if self.options().all_nullable {
                ty = shape_nullable(&ty);
            }

            let mut out = field.clone();
            out.ty = ty;
            out.metadata = strip_access(&field.metadata);
            let hide_null = self.options().hide_default_null && field.default.is_null();
            if self.options().all_optional || hide_null {
                out.default = FieldDefault::Unset;
            }
            fields.push(out);
        }
        Ok(fields)
    }

    /// Name to reference in place of the nested schema `name`.
    fn resolve(&mut self, name: &str) -> SchemaResult<String> {
        let registry = self.catalog.ensure_views(name)?;
        match registry.slot(self.view()) {
            Some(ViewSlot::Ready(ViewEntry::Built { schema, options })) => {
                if options == *self.options() {
                    Ok(schema.name.clone())
                } else {
                    Err(self.conflict(name))
                }
            }
            Some(ViewSlot::Reserved { view_schema, options }) => {
                if options == *self.options() {
                    trace!(schema = name, view = %self.view(), "resolved to reserved view");
                    Ok(view_schema)
                } else {
                    Err(self.conflict(name))
                }
            }
            Some(ViewSlot::Ready(ViewEntry::PassThrough(schema))) => Ok(schema.name.clone()),
            None => match self.catalog.config().missing_view_policy {
                MissingViewPolicy::Build => self.build(name).map(|view| view.name.clone()),
                MissingViewPolicy::PassThrough => {
                    trace!(schema = name, view = %self.view(), "no view, keeping schema");
                    Ok(name.to_string())
                }
                MissingViewPolicy::Error => Err(SchemaError::MissingView {
                    schema: name.to_string(),
                    view: self.view().to_string(),
                }),
            },
        }
    }

    /// Publishes every staged view: catalog first, then registries.
    fn commit(&mut self) -> SchemaResult<()> {
        let staged = std::mem::take(&mut self.staged);

        let mut published = Vec::with_capacity(staged.len());
        for (_, view) in &staged {
            if let Err(err) = self.catalog.insert_view(Arc::clone(view)) {
                for name in published {
                    self.catalog.remove(name);
                }
                return Err(err);
            }
            published.push(view.name.as_str());
        }

        for (registry, view) in staged {
            registry.complete(self.view(), view, self.options().clone());
        }
        self.reserved.clear();
        Ok(())
    }

    fn rollback(&mut self) {
        self.staged.clear();
        for registry in self.reserved.drain(..) {
            registry.release(&self.builder.name);
            debug!(
                schema = %registry.source().name,
                view = %self.builder.name,
                "released view reservation"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::TypeExpr;
    use serde_json::{json, Value};

    fn setup_catalog() -> Catalog {
        let catalog = Catalog::new();
        catalog
            .register(Schema::new(
                "Node",
                "graph",
                vec![
                    FieldSpec::new("id", TypeExpr::Int).access(AccessMode::ReadOnly),
                    FieldSpec::new("label", TypeExpr::Str),
                    FieldSpec::new("secret", TypeExpr::optional(TypeExpr::Str))
                        .access(AccessMode::WriteOnly)
                        .default_value(Value::Null),
                    FieldSpec::new("children", TypeExpr::list(TypeExpr::reference("Node")))
                        .default_value(json!([])),
                ],
            ))
            .unwrap();
        catalog
    }

    #[test]
    fn test_presets() {
        assert_eq!(Builder::load().name(), "Load");
        assert!(Builder::load().options().include_computed_fields);
        assert!(!Builder::update().options().include_computed_fields);
        assert_eq!(
            Builder::create().options().access_modes,
            [AccessMode::WriteOnly, AccessMode::WriteOnlyOnCreation, AccessMode::ReadAndWrite]
                .into_iter()
                .collect()
        );
        assert_eq!(Builder::create_result().options().access_modes.len(), 3);
    }

    #[test]
    fn test_self_reference_resolves_to_same_view() {
        let catalog = setup_catalog();
        let view = Builder::load().build_view(&catalog, "Node").unwrap();

        assert_eq!(view.name, "NodeLoad");
        assert_eq!(view.field_names().collect::<Vec<_>>(), vec!["id", "label", "children"]);
        assert_eq!(
            view.field("children").unwrap().ty,
            TypeExpr::list(TypeExpr::reference("NodeLoad"))
        );
        assert_eq!(view.module, "views::builder");
        assert_eq!(
            view.description.as_deref(),
            Some("View `Load` of schema `graph::Node`")
        );
    }

    #[test]
    fn test_build_is_idempotent() {
        let catalog = setup_catalog();
        let first = Builder::update().build_view(&catalog, "Node").unwrap();
        let second = Builder::update().build_view(&catalog, "Node").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_conflicting_options_rejected() {
        let catalog = setup_catalog();
        Builder::update().build_view(&catalog, "Node").unwrap();

        let err = Builder::update()
            .all_optional(true)
            .build_view(&catalog, "Node")
            .unwrap_err();
        assert_eq!(err.code().code(), "VIEW_CONFLICT");
    }

    #[test]
    fn test_name_collision() {
        let catalog = setup_catalog();
        catalog
            .register(Schema::new("NodeLoad", "", vec![FieldSpec::new("x", TypeExpr::Int)]))
            .unwrap();

        let err = Builder::load().build_view(&catalog, "Node").unwrap_err();
        assert_eq!(err.code().code(), "VIEW_NAME_COLLISION");
        // Nothing of the failed build stays registered
        assert!(catalog.ensure_views("Node").unwrap().slot("Load").is_none());
    }

    #[test]
    fn test_caller_module_attribution() {
        let catalog = setup_catalog();
        let view = Builder::create()
            .module("api::nodes")
            .build_view(&catalog, "Node")
            .unwrap();
        assert_eq!(view.module, "api::nodes");
        assert_eq!(view.origin.as_ref().unwrap().source, "Node");

        // Without an override the constructing context wins over the source's
        let view = Builder::update().build_view(&catalog, "Node").unwrap();
        assert_eq!(view.module, "views::builder");
        assert_ne!(view.module, catalog.get("Node").unwrap().module);
    }

    #[test]
    fn test_file_context() {
        assert_eq!(file_context("src/api/users.rs"), "api::users");
        assert_eq!(file_context("tests/view_builder.rs"), "view_builder");
        assert_eq!(file_context("src/api/mod.rs"), "api");
        assert_eq!(file_context(r"crates\app\src\handlers.rs"), "handlers");
        assert_eq!(file_context("/deps/dep-1.0/src/lib.rs"), "");
    }
}
