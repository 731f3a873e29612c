//! Record construction and validation
//!
//! Validation semantics:
//! - Input keys are matched by alias first, then by field name
//! - Undeclared keys are rejected
//! - Types are matched exactly (ints are accepted where floats are declared)
//! - Omitted fields take their default; required fields must be present
//! - Unset defaults leave the field out of the record entirely
//! - Computed fields are derived after every other field is known
//!
//! A [`Record`] keeps two trees: the materialized data, and the explicit data
//! the caller actually provided. Both use canonical field names.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::catalog::Catalog;
use super::errors::{SchemaError, SchemaResult, ValidationDetails};
use super::types::{Annotation, Constraint, FieldSpec, Schema, Slot, TupleItem, TypeExpr};

/// An instance of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<Schema>,
    data: Map<String, Value>,
    explicit: Map<String, Value>,
}

impl Record {
    pub(crate) fn from_parts(
        schema: Arc<Schema>,
        data: Map<String, Value>,
        explicit: Map<String, Value>,
    ) -> Self {
        Self { schema, data, explicit }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn schema_name(&self) -> &str {
        &self.schema.name
    }

    /// Materialized value of a field; `None` when the field is unset.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// The field as a slot: its value, or `Unset` when it was never set.
    pub fn slot(&self, field: &str) -> Slot {
        self.data.get(field).cloned().map_or(Slot::Unset, Slot::Value)
    }

    /// Whether the field holds a value (possibly `null`) rather than unset.
    pub fn is_set(&self, field: &str) -> bool {
        self.data.contains_key(field)
    }

    /// Whether the caller provided the field explicitly.
    pub fn is_explicit(&self, field: &str) -> bool {
        self.explicit.contains_key(field)
    }

    /// Materialized data, keyed by canonical field name.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Explicitly provided data, keyed by canonical field name.
    pub fn explicit(&self) -> &Map<String, Value> {
        &self.explicit
    }

    /// The wrapped value of a root record.
    pub fn root(&self) -> Option<&Value> {
        if self.schema.is_root() {
            self.data.get(Schema::ROOT_FIELD)
        } else {
            None
        }
    }

    /// The record as a JSON value; root records yield their root value.
    pub fn to_value(&self) -> Value {
        match self.root() {
            Some(root) => root.clone(),
            None => Value::Object(self.data.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// External input: aliases accepted, computed fields only on views
    Input,
    /// Materialized data: canonical names, computed fields re-derived
    Revalidate,
}

enum Failure {
    Invalid(ValidationDetails),
    Fatal(SchemaError),
}

impl From<SchemaError> for Failure {
    fn from(err: SchemaError) -> Self {
        Failure::Fatal(err)
    }
}

type Coercion<T> = Result<T, Failure>;

struct Coerced {
    explicit: Value,
    full: Value,
}

impl Coerced {
    fn same(value: &Value) -> Self {
        Self {
            explicit: value.clone(),
            full: value.clone(),
        }
    }
}

/// Builds and checks records against the schemas of a catalog.
///
/// Validation does not mutate its input and is deterministic.
pub struct RecordValidator<'a> {
    catalog: &'a Catalog,
}

impl<'a> RecordValidator<'a> {
    /// Creates a new validator backed by the given catalog.
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Validates `input` against the named schema and materializes a record.
    ///
    /// Root schemas take the raw root value (a list, a map...) as input.
    ///
    /// # Errors
    ///
    /// - `VIEW_UNKNOWN_SCHEMA` for an unknown schema, here or nested
    /// - `VIEW_VALIDATION_FAILED` when the input violates the schema
    pub fn construct(&self, schema: &str, input: Value) -> SchemaResult<Record> {
        let schema = self.catalog.require(schema)?;
        self.construct_with(&schema, input)
    }

    pub fn construct_with(&self, schema: &Arc<Schema>, input: Value) -> SchemaResult<Record> {
        let object = if schema.is_root() {
            let mut object = Map::new();
            object.insert(Schema::ROOT_FIELD.to_string(), input);
            object
        } else {
            match input {
                Value::Object(object) => object,
                other => {
                    return Err(SchemaError::validation_failed(
                        &schema.name,
                        ValidationDetails::type_mismatch("$root", "object", json_type_name(&other)),
                    ))
                }
            }
        };
        self.materialize(schema, &object, Mode::Input, Map::new())
    }

    /// Constructs from canonical field data (a root record's `root` included).
    pub(crate) fn construct_fields(
        &self,
        schema: &Arc<Schema>,
        fields: &Map<String, Value>,
    ) -> SchemaResult<Record> {
        self.materialize(schema, fields, Mode::Input, Map::new())
    }

    /// Re-checks materialized data, e.g. after a merge, keeping `explicit`.
    pub fn revalidate(
        &self,
        schema: &Arc<Schema>,
        data: &Map<String, Value>,
        explicit: Map<String, Value>,
    ) -> SchemaResult<Record> {
        self.materialize(schema, data, Mode::Revalidate, explicit)
    }

    /// Defaults of every non-computed field, as a fresh object.
    ///
    /// Required and unset fields are left out.
    pub fn defaults_of(&self, schema: &Schema) -> Map<String, Value> {
        schema
            .fields
            .iter()
            .filter(|f| !f.is_computed())
            .filter_map(|f| match f.default.produce() {
                Some(Slot::Value(value)) => Some((f.name.clone(), value)),
                _ => None,
            })
            .collect()
    }

    /// Serializes a record, renaming fields to their aliases when `by_alias`.
    pub fn dump(&self, record: &Record, by_alias: bool) -> SchemaResult<Value> {
        let value = self.dump_record(record.schema(), record.data(), by_alias)?;
        Ok(match (record.schema().is_root(), value) {
            (true, Value::Object(mut object)) => {
                object.remove(Schema::ROOT_FIELD).unwrap_or(Value::Null)
            }
            (_, value) => value,
        })
    }

    fn materialize(
        &self,
        schema: &Arc<Schema>,
        object: &Map<String, Value>,
        mode: Mode,
        explicit_override: Map<String, Value>,
    ) -> SchemaResult<Record> {
        match self.coerce_record(schema, object, "", mode) {
            Ok((explicit, full)) => {
                let explicit = if mode == Mode::Revalidate { explicit_override } else { explicit };
                Ok(Record::from_parts(Arc::clone(schema), full, explicit))
            }
            Err(Failure::Invalid(details)) => {
                Err(SchemaError::validation_failed(&schema.name, details))
            }
            Err(Failure::Fatal(err)) => Err(err),
        }
    }

    fn coerce_record(
        &self,
        schema: &Schema,
        object: &Map<String, Value>,
        path: &str,
        mode: Mode,
    ) -> Coercion<(Map<String, Value>, Map<String, Value>)> {
        // Check for extra fields (no undeclared fields allowed)
        for key in object.keys() {
            let declared = schema.fields.iter().any(|f| {
                f.name == *key || (mode == Mode::Input && f.alias.as_deref() == Some(key.as_str()))
            });
            if !declared {
                return Err(Failure::Invalid(ValidationDetails::extra_field(make_path(path, key))));
            }
        }

        let mut explicit = Map::new();
        let mut full = Map::new();

        for field in &schema.fields {
            let field_path = make_path(path, &field.name);
            let provided = match mode {
                Mode::Input => field
                    .alias
                    .as_ref()
                    .and_then(|alias| object.get(alias))
                    .or_else(|| object.get(&field.name)),
                Mode::Revalidate => object.get(&field.name),
            };

            if field.is_computed() {
                match (provided, mode, schema.is_view()) {
                    (Some(value), _, true) => {
                        let coerced = self.coerce_value(&field.ty, value, &field_path, mode)?;
                        explicit.insert(field.name.clone(), coerced.explicit);
                        full.insert(field.name.clone(), coerced.full);
                    }
                    (Some(_), Mode::Input, false) => {
                        return Err(Failure::Invalid(ValidationDetails::computed_field(field_path)));
                    }
                    _ => {}
                }
                continue;
            }

            match provided {
                Some(value) => {
                    let coerced = self.coerce_value(&field.ty, value, &field_path, mode)?;
                    check_constraints(field, &coerced.full, &field_path)?;
                    explicit.insert(field.name.clone(), coerced.explicit);
                    full.insert(field.name.clone(), coerced.full);
                }
                None => match field.default.produce() {
                    None => {
                        let details = ValidationDetails::missing_field(field_path);
                        return Err(Failure::Invalid(details));
                    }
                    Some(Slot::Value(value)) => {
                        full.insert(field.name.clone(), value);
                    }
                    Some(Slot::Unset) => {}
                },
            }
        }

        for field in &schema.fields {
            if let Some(derivation) = &field.computed {
                if !full.contains_key(&field.name) {
                    let value = derivation.derive(&full);
                    full.insert(field.name.clone(), value);
                }
            }
        }

        Ok((explicit, full))
    }

    fn coerce_value(
        &self,
        ty: &TypeExpr,
        value: &Value,
        path: &str,
        mode: Mode,
    ) -> Coercion<Coerced> {
        match ty {
            TypeExpr::Any => Ok(Coerced::same(value)),
            TypeExpr::Null | TypeExpr::Bool | TypeExpr::Int | TypeExpr::Float | TypeExpr::Str => {
                if ty.matches_shape(value) {
                    Ok(Coerced::same(value))
                } else {
                    Err(type_error(path, ty.type_name(), value))
                }
            }
            TypeExpr::Literal { values } => {
                if values.contains(value) {
                    Ok(Coerced::same(value))
                } else {
                    Err(Failure::Invalid(ValidationDetails::new(
                        path,
                        format!("one of {}", ty),
                        value.to_string(),
                    )))
                }
            }
            TypeExpr::Ref { schema } => {
                let nested = self.catalog.require(schema)?;
                if let Some(root_ty) = nested.root_type() {
                    return self.coerce_value(root_ty, value, path, mode);
                }
                let object = value.as_object().ok_or_else(|| type_error(path, "object", value))?;
                let (explicit, full) = self.coerce_record(&nested, object, path, mode)?;
                Ok(Coerced {
                    explicit: Value::Object(explicit),
                    full: Value::Object(full),
                })
            }
            TypeExpr::List { item } => {
                let array = value.as_array().ok_or_else(|| type_error(path, "list", value))?;
                self.coerce_elements(array.iter().map(|v| (item.as_ref(), v)), path, mode)
            }
            TypeExpr::Set { item } => {
                let array = value.as_array().ok_or_else(|| type_error(path, "set", value))?;
                let elements = array.iter().map(|v| (item.as_ref(), v));
                let coerced = self.coerce_elements(elements, path, mode)?;
                if let Value::Array(items) = &coerced.full {
                    for (i, item) in items.iter().enumerate() {
                        if items[..i].contains(item) {
                            return Err(Failure::Invalid(ValidationDetails::new(
                                format!("{}[{}]", path, i),
                                "distinct set members",
                                "duplicate",
                            )));
                        }
                    }
                }
                Ok(coerced)
            }
            TypeExpr::Tuple { items } => {
                let array = value.as_array().ok_or_else(|| type_error(path, "tuple", value))?;
                let element_types = tuple_positions(items, array.len())
                    .ok_or_else(|| type_error(path, &ty.to_string(), value))?;
                self.coerce_elements(element_types.into_iter().zip(array.iter()), path, mode)
            }
            TypeExpr::Map { key, value: value_ty } => {
                let object = value.as_object().ok_or_else(|| type_error(path, "map", value))?;
                let mut explicit = Map::new();
                let mut full = Map::new();
                for (k, v) in object {
                    let entry_path = format!("{}[{}]", path, k);
                    if !key_matches(key, k) {
                        return Err(Failure::Invalid(ValidationDetails::new(
                            entry_path,
                            format!("key of type {}", key),
                            format!("'{}'", k),
                        )));
                    }
                    let coerced = self.coerce_value(value_ty, v, &entry_path, mode)?;
                    explicit.insert(k.clone(), coerced.explicit);
                    full.insert(k.clone(), coerced.full);
                }
                Ok(Coerced {
                    explicit: Value::Object(explicit),
                    full: Value::Object(full),
                })
            }
            TypeExpr::Union { members } => {
                // Report the failure of the first member the value looked like
                let mut closest = None;
                for member in members {
                    match self.coerce_value(member, value, path, mode) {
                        Ok(coerced) => return Ok(coerced),
                        Err(Failure::Invalid(details)) => {
                            if closest.is_none() && member.matches_shape(value) {
                                closest = Some(details);
                            }
                        }
                        Err(fatal) => return Err(fatal),
                    }
                }
                Err(match closest {
                    Some(details) => Failure::Invalid(details),
                    None => type_error(path, &ty.to_string(), value),
                })
            }
        }
    }

    fn coerce_elements<'v>(
        &self,
        elements: impl Iterator<Item = (&'v TypeExpr, &'v Value)>,
        path: &str,
        mode: Mode,
    ) -> Coercion<Coerced> {
        let mut explicit = Vec::new();
        let mut full = Vec::new();
        for (i, (ty, value)) in elements.enumerate() {
            let coerced = self.coerce_value(ty, value, &format!("{}[{}]", path, i), mode)?;
            explicit.push(coerced.explicit);
            full.push(coerced.full);
        }
        Ok(Coerced {
            explicit: Value::Array(explicit),
            full: Value::Array(full),
        })
    }

    fn dump_record(
        &self,
        schema: &Schema,
        data: &Map<String, Value>,
        by_alias: bool,
    ) -> SchemaResult<Value> {
        let mut out = Map::new();
        for (name, value) in data {
            match schema.field(name) {
                Some(field) => {
                    let key = if by_alias { field.external_name() } else { field.name.as_str() };
                    out.insert(key.to_string(), self.dump_value(&field.ty, value, by_alias)?);
                }
                None => {
                    out.insert(name.clone(), value.clone());
                }
            }
        }
        Ok(Value::Object(out))
    }

    fn dump_value(&self, ty: &TypeExpr, value: &Value, by_alias: bool) -> SchemaResult<Value> {
        if !by_alias {
            return Ok(value.clone());
        }
        match (ty, value) {
            (TypeExpr::Ref { schema }, _) => {
                let nested = self.catalog.require(schema)?;
                match (nested.root_type(), value) {
                    (Some(root_ty), _) => self.dump_value(root_ty, value, by_alias),
                    (None, Value::Object(object)) => self.dump_record(&nested, object, by_alias),
                    _ => Ok(value.clone()),
                }
            }
            (TypeExpr::List { item } | TypeExpr::Set { item }, Value::Array(array)) => array
                .iter()
                .map(|v| self.dump_value(item, v, by_alias))
                .collect::<SchemaResult<Vec<_>>>()
                .map(Value::Array),
            (TypeExpr::Tuple { items }, Value::Array(array)) => {
                match tuple_positions(items, array.len()) {
                    Some(types) => types
                        .into_iter()
                        .zip(array)
                        .map(|(t, v)| self.dump_value(t, v, by_alias))
                        .collect::<SchemaResult<Vec<_>>>()
                        .map(Value::Array),
                    None => Ok(value.clone()),
                }
            }
            (TypeExpr::Map { value: value_ty, .. }, Value::Object(object)) => {
                let mut out = Map::new();
                for (k, v) in object {
                    out.insert(k.clone(), self.dump_value(value_ty, v, by_alias)?);
                }
                Ok(Value::Object(out))
            }
            (TypeExpr::Union { members }, _) => match members
                .iter()
                .find(|m| !matches!(m, TypeExpr::Null) && m.matches_shape(value))
            {
                Some(member) => self.dump_value(member, value, by_alias),
                None => Ok(value.clone()),
            },
            _ => Ok(value.clone()),
        }
    }
}

/// Element type of every position of a tuple value of length `len`, or
/// `None` when the arity does not fit.
///
/// The element right before a `...` marker repeats to fill the value.
pub(crate) fn tuple_positions(items: &[TupleItem], len: usize) -> Option<Vec<&TypeExpr>> {
    let fixed: Vec<&TypeExpr> = items
        .iter()
        .filter_map(|item| match item {
            TupleItem::Item(ty) => Some(ty),
            TupleItem::Ellipsis => None,
        })
        .collect();
    let variadic = items.iter().any(|item| matches!(item, TupleItem::Ellipsis));

    if !variadic {
        return (fixed.len() == len).then_some(fixed);
    }

    let (repeated, prefix) = fixed.split_last()?;
    if len < prefix.len() {
        return None;
    }
    Some((0..len).map(|i| prefix.get(i).copied().unwrap_or(*repeated)).collect())
}

fn key_matches(key_ty: &TypeExpr, key: &str) -> bool {
    match key_ty {
        TypeExpr::Any | TypeExpr::Str => true,
        TypeExpr::Int => key.parse::<i64>().is_ok(),
        TypeExpr::Literal { values } => values.iter().any(|v| v.as_str() == Some(key)),
        TypeExpr::Union { members } => members.iter().any(|m| key_matches(m, key)),
        _ => false,
    }
}

fn check_constraints(field: &FieldSpec, value: &Value, path: &str) -> Coercion<()> {
    for annotation in &field.metadata {
        let Annotation::Constraint(constraint) = annotation else {
            continue;
        };
        let violated = match constraint {
            Constraint::Ge(bound) => value.as_f64().map(|n| n < *bound),
            Constraint::Le(bound) => value.as_f64().map(|n| n > *bound),
            Constraint::MinLength(min) => value_len(value).map(|len| len < *min),
            Constraint::MaxLength(max) => value_len(value).map(|len| len > *max),
        };
        if violated == Some(true) {
            return Err(Failure::Invalid(ValidationDetails::new(
                path,
                format!("{:?}", constraint),
                value.to_string(),
            )));
        }
    }
    Ok(())
}

fn value_len(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(a) => Some(a.len()),
        Value::Object(o) => Some(o.len()),
        _ => None,
    }
}

/// Returns the JSON type name for error messages.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "int"
            } else {
                "float"
            }
        }
        Value::String(_) => "str",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Creates a field path from prefix and field name.
fn make_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

/// Creates a type mismatch failure.
fn type_error(path: &str, expected: &str, actual: &Value) -> Failure {
    Failure::Invalid(ValidationDetails::type_mismatch(path, expected, json_type_name(actual)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{DefaultFactory, Derivation, FieldDefault};
    use serde_json::json;

    fn setup_catalog() -> Catalog {
        let catalog = Catalog::new();
        catalog
            .register(Schema::new(
                "Address",
                "",
                vec![
                    FieldSpec::new("city", TypeExpr::Str),
                    FieldSpec::new("zip", TypeExpr::Str).default_value(json!("00000")),
                ],
            ))
            .unwrap();
        catalog
            .register(Schema::new(
                "User",
                "",
                vec![
                    FieldSpec::new("name", TypeExpr::Str).alias("userName"),
                    FieldSpec::new("age", TypeExpr::optional(TypeExpr::Int))
                        .default_value(Value::Null)
                        .annotate(Annotation::Constraint(Constraint::Ge(0.0))),
                    FieldSpec::new("address", TypeExpr::optional(TypeExpr::reference("Address")))
                        .default_value(Value::Null),
                    FieldSpec::new("tags", TypeExpr::set(TypeExpr::Str))
                        .default_factory(DefaultFactory::empty_list()),
                    FieldSpec::new("pair", TypeExpr::tuple([TypeExpr::Int, TypeExpr::Str]))
                        .default_value(json!([0, ""])),
                    FieldSpec::computed(
                        "label",
                        TypeExpr::Str,
                        Derivation::new("label", |data| {
                            let name = data.get("name").and_then(Value::as_str).unwrap_or("");
                            json!(format!("user:{}", name))
                        }),
                    ),
                ],
            ))
            .unwrap();
        catalog
    }

    #[test]
    fn test_construct_fills_defaults() {
        let catalog = setup_catalog();
        let validator = RecordValidator::new(&catalog);

        let record = validator
            .construct("User", json!({"userName": "ada", "address": {"city": "Paris"}}))
            .unwrap();

        assert_eq!(record.get("name"), Some(&json!("ada")));
        assert_eq!(record.get("age"), Some(&Value::Null));
        assert_eq!(record.get("address"), Some(&json!({"city": "Paris", "zip": "00000"})));
        assert_eq!(record.get("tags"), Some(&json!([])));
        assert_eq!(record.get("label"), Some(&json!("user:ada")));

        assert!(record.is_explicit("name"));
        assert!(!record.is_explicit("age"));
        assert_eq!(record.explicit().get("address"), Some(&json!({"city": "Paris"})));
    }

    #[test]
    fn test_name_accepted_when_alias_declared() {
        let catalog = setup_catalog();
        let record = catalog.construct("User", json!({"name": "bob"})).unwrap();
        assert_eq!(record.get("name"), Some(&json!("bob")));
    }

    #[test]
    fn test_missing_required_field() {
        let catalog = setup_catalog();
        let err = catalog.construct("User", json!({})).unwrap_err();
        assert_eq!(err.details().unwrap().field, "name");
    }

    #[test]
    fn test_extra_field_rejected() {
        let catalog = setup_catalog();
        let err = catalog
            .construct("User", json!({"name": "a", "address": {"city": "x", "country": "y"}}))
            .unwrap_err();
        assert_eq!(err.details().unwrap().field, "address.country");
    }

    #[test]
    fn test_type_mismatch() {
        let catalog = setup_catalog();
        let err = catalog.construct("User", json!({"name": 5})).unwrap_err();
        let details = err.details().unwrap();
        assert_eq!(details.expected, "str");
        assert_eq!(details.actual, "int");
    }

    #[test]
    fn test_constraint_enforced() {
        let catalog = setup_catalog();
        assert!(catalog.construct("User", json!({"name": "a", "age": -1})).is_err());
        assert!(catalog.construct("User", json!({"name": "a", "age": 3})).is_ok());
    }

    #[test]
    fn test_set_members_distinct() {
        let catalog = setup_catalog();
        let err = catalog
            .construct("User", json!({"name": "a", "tags": ["x", "x"]}))
            .unwrap_err();
        assert_eq!(err.details().unwrap().field, "tags[1]");
    }

    #[test]
    fn test_tuple_arity() {
        let catalog = setup_catalog();
        assert!(catalog.construct("User", json!({"name": "a", "pair": [1]})).is_err());
        assert!(catalog.construct("User", json!({"name": "a", "pair": [1, "b"]})).is_ok());
    }

    #[test]
    fn test_computed_field_cannot_be_set() {
        let catalog = setup_catalog();
        let err = catalog.construct("User", json!({"name": "a", "label": "x"})).unwrap_err();
        assert_eq!(err.details().unwrap().field, "label");
    }

    #[test]
    fn test_unset_default_leaves_field_out() {
        let catalog = Catalog::new();
        let mut field = FieldSpec::new("note", TypeExpr::optional(TypeExpr::Str));
        field.default = FieldDefault::Unset;
        catalog.register(Schema::new("Patch", "", vec![field])).unwrap();

        let omitted = catalog.construct("Patch", json!({})).unwrap();
        assert!(!omitted.is_set("note"));

        let nulled = catalog.construct("Patch", json!({"note": null})).unwrap();
        assert!(nulled.is_set("note"));
        assert_eq!(nulled.get("note"), Some(&Value::Null));
    }

    #[test]
    fn test_root_record() {
        let catalog = setup_catalog();
        catalog
            .register(Schema::root("Addresses", "", TypeExpr::list(TypeExpr::reference("Address"))))
            .unwrap();

        let record = catalog.construct("Addresses", json!([{"city": "Oslo"}])).unwrap();
        assert_eq!(record.to_value(), json!([{"city": "Oslo", "zip": "00000"}]));
    }

    #[test]
    fn test_variadic_tuple_positions() {
        let items = vec![
            TupleItem::Item(TypeExpr::Str),
            TupleItem::Item(TypeExpr::Int),
            TupleItem::Ellipsis,
        ];
        let positions = tuple_positions(&items, 3).unwrap();
        assert_eq!(positions, vec![&TypeExpr::Str, &TypeExpr::Int, &TypeExpr::Int]);
        assert!(tuple_positions(&items, 0).is_none());
    }

    #[test]
    fn test_dump_by_alias() {
        let catalog = setup_catalog();
        let validator = RecordValidator::new(&catalog);
        let record = validator.construct("User", json!({"userName": "ada"})).unwrap();

        let dumped = validator.dump(&record, true).unwrap();
        assert_eq!(dumped["userName"], json!("ada"));
        assert!(dumped.get("name").is_none());
    }

    #[test]
    fn test_revalidate_rederives_computed() {
        let catalog = setup_catalog();
        let validator = RecordValidator::new(&catalog);
        let record = validator.construct("User", json!({"name": "ada"})).unwrap();

        let mut data = record.data().clone();
        data.insert("name".into(), json!("grace"));
        let updated = validator
            .revalidate(record.schema(), &data, record.explicit().clone())
            .unwrap();
        assert_eq!(updated.get("label"), Some(&json!("user:grace")));
    }
}
