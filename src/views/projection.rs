//! Moving data between records and their views
//!
//! - `build_from` projects a source record onto one of its views, keeping
//!   only what the view declares, recursively through nested records and
//!   containers
//! - `apply_to` / `apply` deep-merge what a view (or a patch of the source
//!   schema itself) explicitly holds into a target record
//!
//! Both produce new records; inputs are never modified. Results are checked
//! by the record runtime, so type errors surface as validation failures.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use super::rewrite::strip_nullable;
use crate::schema::catalog::Catalog;
use crate::schema::types::{Schema, TypeExpr};
use crate::schema::validator::{tuple_positions, Record, RecordValidator};
use crate::schema::{SchemaError, SchemaResult};

/// Projection and deep merge over the schemas of a catalog.
pub struct Projector<'a> {
    catalog: &'a Catalog,
    validator: RecordValidator<'a>,
}

impl<'a> Projector<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            validator: RecordValidator::new(catalog),
        }
    }

    /// Builds an instance of `view` from the data of `source`.
    ///
    /// Fields the source lacks take the view's defaults.
    ///
    /// # Errors
    ///
    /// - `VIEW_SOURCE_MISMATCH` when `view` is not derived from the source's schema
    /// - `VIEW_VALIDATION_FAILED` when the projected data does not fit the view
    pub fn build_from(&self, view: &str, source: &Record) -> SchemaResult<Record> {
        let view = self.catalog.require(view)?;
        self.check_origin(&view, source.schema())?;

        let mut fields = Map::new();
        for field in &view.fields {
            if field.is_computed() && !view.is_view() {
                continue;
            }
            if let Some(value) = source.get(&field.name) {
                fields.insert(field.name.clone(), self.project(&field.ty, value)?);
            }
        }

        debug!(view = %view.name, source = %source.schema_name(), "built view from record");
        self.validator.construct_fields(&view, &fields)
    }

    /// Merges what `view` explicitly holds into `target`.
    ///
    /// # Errors
    ///
    /// - `VIEW_SOURCE_MISMATCH` when `view` is not derived from the target's schema
    /// - `VIEW_VALIDATION_FAILED` when the merged data does not fit the target
    pub fn apply_to(&self, view: &Record, target: &Record) -> SchemaResult<Record> {
        self.check_origin(view.schema(), target.schema())?;
        self.merge(target, view)
    }

    /// Merges `patch` into `target`; `patch` may be of the target's own schema.
    pub fn apply(&self, target: &Record, patch: &Record) -> SchemaResult<Record> {
        self.apply_to(patch, target)
    }

    fn check_origin(&self, view: &Schema, source: &Schema) -> SchemaResult<()> {
        let derived = view
            .origin
            .as_ref()
            .is_some_and(|origin| origin.source == source.name);
        if derived || view.name == source.name {
            Ok(())
        } else {
            let expected = view
                .origin
                .as_ref()
                .map_or_else(|| view.name.clone(), |o| o.source.clone());
            Err(SchemaError::SourceMismatch {
                expected,
                actual: source.name.clone(),
            })
        }
    }

    fn merge(&self, target: &Record, patch: &Record) -> SchemaResult<Record> {
        let schema = target.schema();
        let mut data = target.data().clone();

        for (name, incoming) in patch.explicit() {
            let Some(field) = schema.field(name) else {
                continue;
            };
            if field.is_computed() {
                continue;
            }
            let merged = self.merge_value(&field.ty, data.get(name), incoming)?;
            data.insert(name.clone(), merged);
        }

        let mut explicit = target.explicit().clone();
        overlay(&mut explicit, patch.explicit());

        debug!(
            schema = %schema.name,
            patch = %patch.schema_name(),
            fields = patch.explicit().len(),
            "applied patch"
        );
        self.validator.revalidate(schema, &data, explicit)
    }

    fn merge_value(
        &self,
        ty: &TypeExpr,
        existing: Option<&Value>,
        incoming: &Value,
    ) -> SchemaResult<Value> {
        if incoming.is_null() {
            return Ok(Value::Null);
        }

        match strip_nullable(ty) {
            TypeExpr::Ref { schema } => {
                let nested = self.catalog.require(schema)?;
                if let Some(root_ty) = nested.root_type() {
                    return self.merge_value(root_ty, existing, incoming);
                }
                let Value::Object(fields) = incoming else {
                    return Ok(incoming.clone());
                };
                let mut base = match existing {
                    Some(Value::Object(current)) => current.clone(),
                    _ => self.validator.defaults_of(&nested),
                };
                for (name, value) in fields {
                    let merged = match nested.field(name) {
                        Some(field) => self.merge_value(&field.ty, base.get(name), value)?,
                        None => value.clone(),
                    };
                    base.insert(name.clone(), merged);
                }
                Ok(Value::Object(base))
            }
            TypeExpr::Map { value: value_ty, .. } if self.is_record_ref(value_ty) => {
                let Value::Object(entries) = incoming else {
                    return Ok(incoming.clone());
                };
                let mut base = match existing {
                    Some(Value::Object(current)) => current.clone(),
                    _ => Map::new(),
                };
                for (key, value) in entries {
                    let merged = self.merge_value(value_ty, base.get(key), value)?;
                    base.insert(key.clone(), merged);
                }
                Ok(Value::Object(base))
            }
            _ => Ok(incoming.clone()),
        }
    }

    fn is_record_ref(&self, ty: &TypeExpr) -> bool {
        match strip_nullable(ty) {
            TypeExpr::Ref { schema } => self.catalog.get(schema).is_some_and(|s| !s.is_root()),
            _ => false,
        }
    }

    /// Keeps only what `ty` declares, element-wise through containers.
    fn project(&self, ty: &TypeExpr, value: &Value) -> SchemaResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match ty {
            TypeExpr::Ref { schema } => {
                let nested: Arc<Schema> = self.catalog.require(schema)?;
                if let Some(root_ty) = nested.root_type() {
                    return self.project(root_ty, value);
                }
                let Value::Object(object) = value else {
                    return Ok(value.clone());
                };
                let mut out = Map::new();
                for field in &nested.fields {
                    if field.is_computed() && !nested.is_view() {
                        continue;
                    }
                    if let Some(v) = object.get(&field.name) {
                        out.insert(field.name.clone(), self.project(&field.ty, v)?);
                    }
                }
                Ok(Value::Object(out))
            }
            TypeExpr::List { item } | TypeExpr::Set { item } => match value {
                Value::Array(items) => items
                    .iter()
                    .map(|v| self.project(item, v))
                    .collect::<SchemaResult<Vec<_>>>()
                    .map(Value::Array),
                other => Ok(other.clone()),
            },
            TypeExpr::Tuple { items } => match value {
                Value::Array(values) => match tuple_positions(items, values.len()) {
                    Some(types) => types
                        .into_iter()
                        .zip(values)
                        .map(|(t, v)| self.project(t, v))
                        .collect::<SchemaResult<Vec<_>>>()
                        .map(Value::Array),
                    None => Ok(value.clone()),
                },
                other => Ok(other.clone()),
            },
            TypeExpr::Map { value: value_ty, .. } => match value {
                Value::Object(entries) => {
                    let mut out = Map::new();
                    for (k, v) in entries {
                        out.insert(k.clone(), self.project(value_ty, v)?);
                    }
                    Ok(Value::Object(out))
                }
                other => Ok(other.clone()),
            },
            TypeExpr::Union { members } => {
                match members
                    .iter()
                    .find(|m| !matches!(m, TypeExpr::Null) && m.matches_shape(value))
                {
                    Some(member) => self.project(member, value),
                    None => Ok(value.clone()),
                }
            }
            _ => Ok(value.clone()),
        }
    }
}

/// Deep overlay of explicit data: nested objects are combined, anything
/// else is replaced.
fn overlay(base: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match (base.get_mut(key), value) {
            (Some(Value::Object(current)), Value::Object(incoming)) => overlay(current, incoming),
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}
