//! Schema loader for schema definition files
//!
//! - One JSON file per schema, any name ending in `.json`
//! - Files are read in file-name order and registered into a [`Catalog`]
//! - A malformed file aborts the load
//! - Saved files are never overwritten
//!
//! Computed fields carry closures: their derivation is exported by name
//! only, and a file declaring one is rejected on load.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use super::catalog::Catalog;
use super::errors::{SchemaError, SchemaResult};
use super::types::Schema;

/// Reads and writes schema definition files in one directory.
#[derive(Debug, Clone)]
pub struct SchemaLoader {
    /// Directory containing schema files
    schema_dir: PathBuf,
}

impl SchemaLoader {
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
        }
    }

    /// Returns the schema directory path.
    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    /// Registers every schema file of the directory into `catalog`.
    ///
    /// A missing directory holds no schemas. Returns the number of schemas
    /// registered.
    pub fn load_all(&self, catalog: &Catalog) -> SchemaResult<usize> {
        if !self.schema_dir.exists() {
            debug!(dir = %self.schema_dir.display(), "schema directory missing, nothing to load");
            return Ok(0);
        }

        let entries = fs::read_dir(&self.schema_dir).map_err(|e| {
            SchemaError::malformed(
                self.schema_dir.display().to_string(),
                format!("Failed to read schema directory: {}", e),
            )
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SchemaError::malformed(
                    self.schema_dir.display().to_string(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();

            // Skip non-JSON files
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            paths.push(path);
        }
        paths.sort();

        for path in &paths {
            let schema = self.read_schema_file(path)?;
            catalog.register(schema)?;
        }

        info!(dir = %self.schema_dir.display(), count = paths.len(), "loaded schemas");
        Ok(paths.len())
    }

    /// Parses a single schema file without registering it.
    pub fn read_schema_file(&self, path: &Path) -> SchemaResult<Schema> {
        let source = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::malformed(&source, format!("Failed to read file: {}", e))
        })?;

        let raw: Value = serde_json::from_str(&content)
            .map_err(|e| SchemaError::malformed(&source, format!("Invalid JSON: {}", e)))?;

        if let Some(field) = computed_field(&raw) {
            return Err(SchemaError::malformed(
                source,
                format!("Computed field '{}' cannot be loaded", field),
            ));
        }

        let schema: Schema = serde_json::from_value(raw)
            .map_err(|e| SchemaError::malformed(&source, format!("Invalid schema: {}", e)))?;

        schema.validate_structure()?;
        Ok(schema)
    }

    /// Writes a schema (a synthesized view, typically) to `schema_<name>.json`.
    pub fn save_schema(&self, schema: &Schema) -> SchemaResult<PathBuf> {
        let path = self.schema_dir.join(format!("schema_{}.json", schema.name));

        // Check if file already exists (immutability)
        if path.exists() {
            return Err(SchemaError::SchemaImmutable(schema.name.clone()));
        }

        if !self.schema_dir.exists() {
            fs::create_dir_all(&self.schema_dir).map_err(|e| {
                SchemaError::malformed(
                    self.schema_dir.display().to_string(),
                    format!("Failed to create schema directory: {}", e),
                )
            })?;
        }

        let source = path.display().to_string();
        let content = serde_json::to_string_pretty(schema).map_err(|e| {
            SchemaError::malformed(&source, format!("Failed to serialize schema: {}", e))
        })?;

        fs::write(&path, content).map_err(|e| {
            SchemaError::malformed(&source, format!("Failed to write file: {}", e))
        })?;

        debug!(schema = %schema.name, path = %path.display(), "saved schema");
        Ok(path)
    }
}

fn computed_field(raw: &Value) -> Option<&str> {
    raw.get("fields")?
        .as_array()?
        .iter()
        .find(|field| field.get("computed").is_some())
        .map(|field| field.get("name").and_then(Value::as_str).unwrap_or("?"))
}
