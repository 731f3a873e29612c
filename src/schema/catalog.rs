//! Schema catalog and per-schema view registries
//!
//! Every schema lives in a [`Catalog`] under its unique name; references
//! between schemas are resolved by name through it. Each schema owns a
//! [`ViewRegistry`], created on first access, mapping view names to the
//! views built from it.
//!
//! Registry invariants:
//! - at most one entry per (schema, view name), never replaced
//! - a view's slot is reserved before its fields are rewritten, so a
//!   recursive reference finds the reservation instead of re-entering the
//!   builder
//! - view construction is serialized by the catalog's build lock
//! - a build's views become visible together, once the whole build succeeded

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock};

use serde_json::Value;
use tracing::debug;

use super::errors::{SchemaError, SchemaResult};
use super::types::Schema;
use super::validator::{Record, RecordValidator};
use crate::config::CatalogConfig;
use crate::views::ViewOptions;

/// A registered view, or the source schema registered as its own view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEntry {
    /// Synthesized by a builder with these options
    Built { schema: Arc<Schema>, options: ViewOptions },
    /// The source schema itself, all fields unchanged
    PassThrough(Arc<Schema>),
}

impl ViewEntry {
    pub fn schema(&self) -> &Arc<Schema> {
        match self {
            ViewEntry::Built { schema, .. } => schema,
            ViewEntry::PassThrough(schema) => schema,
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self, ViewEntry::PassThrough(_))
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ViewSlot {
    /// Under construction; `view_schema` is the name it will be registered as
    Reserved { view_schema: String, options: ViewOptions },
    Ready(ViewEntry),
}

/// Mapping from view name to view for a single source schema.
#[derive(Debug)]
pub struct ViewRegistry {
    source: Arc<Schema>,
    slots: RwLock<BTreeMap<String, ViewSlot>>,
}

impl ViewRegistry {
    fn new(source: Arc<Schema>) -> Self {
        Self {
            source,
            slots: RwLock::new(BTreeMap::new()),
        }
    }

    /// The schema these views are derived from.
    pub fn source(&self) -> &Arc<Schema> {
        &self.source
    }

    /// Gets a completed view by name.
    pub fn get(&self, view: &str) -> Option<ViewEntry> {
        match self.read().get(view) {
            Some(ViewSlot::Ready(entry)) => Some(entry.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, view: &str) -> bool {
        self.get(view).is_some()
    }

    /// Names of completed views, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries().into_iter().map(|(name, _)| name).collect()
    }

    /// Completed views, sorted by name.
    pub fn entries(&self) -> Vec<(String, ViewEntry)> {
        self.read()
            .iter()
            .filter_map(|(name, slot)| match slot {
                ViewSlot::Ready(entry) => Some((name.clone(), entry.clone())),
                ViewSlot::Reserved { .. } => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers the source schema itself under `view`.
    ///
    /// Registering the same pass-through twice returns the existing entry;
    /// any other entry under `view` is a conflict.
    pub fn register_pass_through(&self, view: &str) -> SchemaResult<ViewEntry> {
        let mut slots = self.write();
        match slots.get(view) {
            Some(ViewSlot::Ready(entry @ ViewEntry::PassThrough(_))) => Ok(entry.clone()),
            Some(_) => Err(SchemaError::ViewConflict {
                schema: self.source.name.clone(),
                view: view.to_string(),
            }),
            None => {
                let entry = ViewEntry::PassThrough(Arc::clone(&self.source));
                slots.insert(view.to_string(), ViewSlot::Ready(entry.clone()));
                debug!(schema = %self.source.name, view, "registered pass-through view");
                Ok(entry)
            }
        }
    }

    pub(crate) fn slot(&self, view: &str) -> Option<ViewSlot> {
        self.read().get(view).cloned()
    }

    /// First writer wins: fails when `view` is already taken.
    pub(crate) fn reserve(
        &self,
        view: &str,
        view_schema: &str,
        options: &ViewOptions,
    ) -> SchemaResult<()> {
        let mut slots = self.write();
        if slots.contains_key(view) {
            return Err(SchemaError::ViewConflict {
                schema: self.source.name.clone(),
                view: view.to_string(),
            });
        }
        slots.insert(
            view.to_string(),
            ViewSlot::Reserved {
                view_schema: view_schema.to_string(),
                options: options.clone(),
            },
        );
        Ok(())
    }

    pub(crate) fn complete(&self, view: &str, schema: Arc<Schema>, options: ViewOptions) {
        self.write()
            .insert(view.to_string(), ViewSlot::Ready(ViewEntry::Built { schema, options }));
    }

    pub(crate) fn release(&self, view: &str) {
        self.write().remove(view);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, ViewSlot>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, ViewSlot>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
struct SchemaEntry {
    schema: Arc<Schema>,
    views: OnceLock<Arc<ViewRegistry>>,
}

impl SchemaEntry {
    fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            views: OnceLock::new(),
        }
    }

    fn views(&self) -> Arc<ViewRegistry> {
        Arc::clone(
            self.views
                .get_or_init(|| Arc::new(ViewRegistry::new(Arc::clone(&self.schema)))),
        )
    }
}

/// In-memory registry of schemas and their views.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: RwLock<HashMap<String, Arc<SchemaEntry>>>,
    build_lock: Mutex<()>,
    config: CatalogConfig,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CatalogConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Registers a schema.
    ///
    /// The structure is validated first, so ambiguous access modes are
    /// rejected here rather than when a view is built. Schemas are immutable:
    /// registering a name twice fails.
    pub fn register(&self, schema: Schema) -> SchemaResult<Arc<Schema>> {
        schema.validate_structure()?;
        let schema = self.insert(Arc::new(schema))?;
        debug!(schema = %schema.name, fields = schema.fields.len(), "registered schema");
        Ok(schema)
    }

    /// Gets a schema by name.
    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.entry(name).map(|e| Arc::clone(&e.schema))
    }

    /// Gets a schema by name, failing with `VIEW_UNKNOWN_SCHEMA`.
    pub fn require(&self, name: &str) -> SchemaResult<Arc<Schema>> {
        self.get(name).ok_or_else(|| SchemaError::UnknownSchema(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// All schema names (views included), sorted.
    pub fn schema_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn schema_count(&self) -> usize {
        self.read().len()
    }

    /// Returns the schema's view registry, creating it on first access.
    pub fn ensure_views(&self, name: &str) -> SchemaResult<Arc<ViewRegistry>> {
        self.entry(name)
            .map(|e| e.views())
            .ok_or_else(|| SchemaError::UnknownSchema(name.to_string()))
    }

    /// Looks up a completed view of `schema`.
    pub fn view(&self, schema: &str, view: &str) -> Option<ViewEntry> {
        self.ensure_views(schema).ok().and_then(|registry| registry.get(view))
    }

    /// Validates `input` against the named schema and materializes a record.
    pub fn construct(&self, schema: &str, input: Value) -> SchemaResult<Record> {
        RecordValidator::new(self).construct(schema, input)
    }

    pub(crate) fn insert_view(&self, schema: Arc<Schema>) -> SchemaResult<()> {
        let name = schema.name.clone();
        self.insert(schema)
            .map(drop)
            .map_err(|_| SchemaError::NameCollision(name))
    }

    pub(crate) fn remove(&self, name: &str) {
        self.write().remove(name);
    }

    pub(crate) fn build_guard(&self) -> MutexGuard<'_, ()> {
        self.build_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, schema: Arc<Schema>) -> SchemaResult<Arc<Schema>> {
        let mut entries = self.write();
        if entries.contains_key(&schema.name) {
            return Err(SchemaError::SchemaImmutable(schema.name.clone()));
        }
        let entry = SchemaEntry::new(Arc::clone(&schema));
        entries.insert(schema.name.clone(), Arc::new(entry));
        Ok(schema)
    }

    fn entry(&self, name: &str) -> Option<Arc<SchemaEntry>> {
        self.read().get(name).cloned()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<SchemaEntry>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<SchemaEntry>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{FieldSpec, TypeExpr};
    use crate::schema::AccessMode;

    fn sample_schema() -> Schema {
        Schema::new(
            "Users",
            "accounts",
            vec![
                FieldSpec::new("id", TypeExpr::Int).access(AccessMode::ReadOnly),
                FieldSpec::new("name", TypeExpr::Str),
            ],
        )
    }

    #[test]
    fn test_register_and_get() {
        let catalog = Catalog::new();
        catalog.register(sample_schema()).unwrap();

        let schema = catalog.get("Users").unwrap();
        assert_eq!(schema.name, "Users");
        assert!(catalog.contains("Users"));
        assert_eq!(catalog.schema_count(), 1);
    }

    #[test]
    fn test_schema_immutability() {
        let catalog = Catalog::new();
        catalog.register(sample_schema()).unwrap();

        let err = catalog.register(sample_schema()).unwrap_err();
        assert_eq!(err.code().code(), "VIEW_SCHEMA_IMMUTABLE");
    }

    #[test]
    fn test_ambiguous_schema_never_registered() {
        let catalog = Catalog::new();
        let schema = Schema::new(
            "Bad",
            "",
            vec![FieldSpec::new("x", TypeExpr::Int)
                .access(AccessMode::ReadOnly)
                .access(AccessMode::ReadAndWrite)],
        );
        assert!(catalog.register(schema).is_err());
        assert!(!catalog.contains("Bad"));
    }

    #[test]
    fn test_unknown_schema() {
        let catalog = Catalog::new();
        assert!(catalog.get("nonexistent").is_none());
        assert_eq!(
            catalog.ensure_views("nonexistent").unwrap_err().code().code(),
            "VIEW_UNKNOWN_SCHEMA"
        );
    }

    #[test]
    fn test_registry_created_once() {
        let catalog = Catalog::new();
        catalog.register(sample_schema()).unwrap();

        let first = catalog.ensure_views("Users").unwrap();
        let second = catalog.ensure_views("Users").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_empty());
    }

    #[test]
    fn test_pass_through_is_idempotent() {
        let catalog = Catalog::new();
        let schema = catalog.register(sample_schema()).unwrap();
        let registry = catalog.ensure_views("Users").unwrap();

        let first = registry.register_pass_through("Replica").unwrap();
        let second = registry.register_pass_through("Replica").unwrap();
        assert!(first.is_pass_through());
        assert!(Arc::ptr_eq(first.schema(), second.schema()));
        assert!(Arc::ptr_eq(first.schema(), &schema));
        assert_eq!(registry.names(), vec!["Replica".to_string()]);
    }

    #[test]
    fn test_reserved_slot_blocks_other_writers() {
        let catalog = Catalog::new();
        catalog.register(sample_schema()).unwrap();
        let registry = catalog.ensure_views("Users").unwrap();

        registry.reserve("Update", "UsersUpdate", &ViewOptions::default()).unwrap();
        assert!(registry.get("Update").is_none());
        assert!(registry.register_pass_through("Update").is_err());
        assert!(registry
            .reserve("Update", "UsersUpdate", &ViewOptions::default())
            .is_err());

        registry.release("Update");
        assert!(registry.register_pass_through("Update").is_ok());
    }
}
