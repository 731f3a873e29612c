//! Configuration
//!
//! A [`ViewsConfig`] is read from a JSON file and describes:
//! - the catalog policy for nested schemas without a view
//! - the named builders to run (the four standard ones by default)
//! - where schema definition files live
//!
//! Every field has a default, so an empty object is a valid configuration.
//! [`ViewsConfig::open_catalog`] turns a configuration into a ready catalog.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::observability::init_tracing;
use crate::schema::{Catalog, SchemaError, SchemaLoader, SchemaResult};
use crate::views::{Builder, ViewOptions};

/// What a builder does with a nested schema that has no view of the
/// requested name yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingViewPolicy {
    /// Build the nested view with the same builder
    #[default]
    Build,
    /// Keep referencing the nested schema itself
    PassThrough,
    /// Fail with `VIEW_MISSING`
    Error,
}

/// Catalog behavior.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub missing_view_policy: MissingViewPolicy,
}

/// A named builder, as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub name: String,
    #[serde(flatten)]
    pub options: ViewOptions,
    /// Context the views are attributed to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl ViewDefinition {
    fn from_builder(builder: &Builder) -> Self {
        Self {
            name: builder.name().to_string(),
            options: builder.options().clone(),
            module: None,
        }
    }
}

fn standard_views() -> Vec<ViewDefinition> {
    Builder::standard().iter().map(ViewDefinition::from_builder).collect()
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewsConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default = "standard_views")]
    pub views: Vec<ViewDefinition>,
    /// Directory of schema definition files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_dir: Option<PathBuf>,
    /// Tracing filter used when `RUST_LOG` is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            views: standard_views(),
            schema_dir: None,
            log_filter: None,
        }
    }
}

impl ViewsConfig {
    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> SchemaResult<Self> {
        let source = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::malformed(&source, format!("Failed to read file: {}", e))
        })?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| SchemaError::malformed(&source, format!("Invalid JSON: {}", e)))?;
        config
            .validate()
            .map_err(|reason| SchemaError::malformed(&source, reason))?;
        Ok(config)
    }

    /// View names must be non-empty and unique.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for view in &self.views {
            if view.name.is_empty() {
                return Err("view name must not be empty".to_string());
            }
            if !seen.insert(view.name.as_str()) {
                return Err(format!("view '{}' is defined twice", view.name));
            }
        }
        Ok(())
    }

    /// One builder per configured view, attributed to the caller unless the
    /// definition names a module.
    #[track_caller]
    pub fn builders(&self) -> Vec<Builder> {
        let mut builders = Vec::with_capacity(self.views.len());
        for definition in &self.views {
            builders.push(Builder::from_definition(definition));
        }
        builders
    }

    /// Builds a catalog from this configuration.
    ///
    /// Installs tracing with `log_filter` (unless a subscriber is already
    /// set), loads every schema file under `schema_dir`, then builds each
    /// configured view of each loaded source schema. Views already loaded
    /// from the directory are kept as they are.
    #[track_caller]
    pub fn open_catalog(&self) -> SchemaResult<Catalog> {
        init_tracing(self.log_filter.as_deref());

        let catalog = Catalog::with_config(self.catalog.clone());
        let Some(dir) = &self.schema_dir else {
            debug!("no schema directory configured");
            return Ok(catalog);
        };
        SchemaLoader::new(dir).load_all(&catalog)?;

        let sources: Vec<String> = catalog
            .schema_names()
            .into_iter()
            .filter(|name| catalog.get(name).is_some_and(|schema| !schema.is_view()))
            .collect();

        for builder in self.builders() {
            for source in &sources {
                let view_schema = format!("{}{}", source, builder.name());
                let loaded = catalog
                    .get(&view_schema)
                    .and_then(|schema| schema.origin.clone())
                    .is_some_and(|origin| {
                        origin.source == *source && origin.view == builder.name()
                    });
                if loaded {
                    debug!(schema = %source, view = %builder.name(), "view loaded from disk");
                    continue;
                }
                builder.build_view(&catalog, source)?;
            }
        }

        info!(
            schemas = catalog.schema_count(),
            dir = %dir.display(),
            "opened schema catalog"
        );
        Ok(catalog)
    }
}
