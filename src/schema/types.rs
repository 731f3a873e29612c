//! Schema type definitions
//!
//! Supported type expressions:
//! - any, null, bool, int, float, str: terminal types
//! - literal: a closed set of allowed values
//! - ref: a reference, by name, to another schema in the same catalog
//! - list, set: homogeneous sequences
//! - tuple: fixed arity, or variable arity with a trailing `...` marker
//! - map: string-keyed mapping with a typed value
//! - union: any of its members (`T | null` is an optional `T`)

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::access::{self, AccessMode};
use super::errors::{SchemaError, SchemaResult};

/// A type expression attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypeExpr {
    /// Accepts any value
    Any,
    /// Only `null`
    Null,
    /// Boolean
    Bool,
    /// 64-bit integer
    Int,
    /// 64-bit floating point (integers accepted)
    Float,
    /// UTF-8 string
    Str,
    /// One of a closed set of values
    Literal { values: Vec<Value> },
    /// Another schema, resolved through the catalog
    Ref { schema: String },
    /// Ordered sequence
    List { item: Box<TypeExpr> },
    /// Sequence of distinct values
    Set { item: Box<TypeExpr> },
    /// Positional tuple
    Tuple { items: Vec<TupleItem> },
    /// String-keyed mapping
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    /// Any of the members
    Union { members: Vec<TypeExpr> },
}

/// A tuple position: an element type, or the variadic marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TupleItem {
    Item(TypeExpr),
    /// Repeats the preceding element type
    Ellipsis,
}

impl TypeExpr {
    pub fn reference(schema: impl Into<String>) -> Self {
        TypeExpr::Ref { schema: schema.into() }
    }

    pub fn literal(values: impl IntoIterator<Item = Value>) -> Self {
        TypeExpr::Literal {
            values: values.into_iter().collect(),
        }
    }

    pub fn list(item: TypeExpr) -> Self {
        TypeExpr::List { item: Box::new(item) }
    }

    pub fn set(item: TypeExpr) -> Self {
        TypeExpr::Set { item: Box::new(item) }
    }

    /// Fixed-arity tuple.
    pub fn tuple(items: impl IntoIterator<Item = TypeExpr>) -> Self {
        TypeExpr::Tuple {
            items: items.into_iter().map(TupleItem::Item).collect(),
        }
    }

    /// Variable-arity tuple `tuple[item, ...]`.
    pub fn var_tuple(item: TypeExpr) -> Self {
        TypeExpr::Tuple {
            items: vec![TupleItem::Item(item), TupleItem::Ellipsis],
        }
    }

    pub fn map(key: TypeExpr, value: TypeExpr) -> Self {
        TypeExpr::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn union(members: impl IntoIterator<Item = TypeExpr>) -> Self {
        TypeExpr::Union {
            members: members.into_iter().collect(),
        }
    }

    /// `inner | null`
    pub fn optional(inner: TypeExpr) -> Self {
        TypeExpr::union([inner, TypeExpr::Null])
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, TypeExpr::Literal { .. })
    }

    /// Whether `null` is an accepted value.
    pub fn is_nullable(&self) -> bool {
        match self {
            TypeExpr::Null | TypeExpr::Any => true,
            TypeExpr::Union { members } => members.iter().any(TypeExpr::is_nullable),
            _ => false,
        }
    }

    /// Whether this is a list, set, tuple or map.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            TypeExpr::List { .. }
                | TypeExpr::Set { .. }
                | TypeExpr::Tuple { .. }
                | TypeExpr::Map { .. }
        )
    }

    /// Whether the tuple ends in a variadic marker.
    pub fn is_variadic(&self) -> bool {
        match self {
            TypeExpr::Tuple { items } => items.iter().any(|i| matches!(i, TupleItem::Ellipsis)),
            _ => false,
        }
    }

    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            TypeExpr::Any => "any",
            TypeExpr::Null => "null",
            TypeExpr::Bool => "bool",
            TypeExpr::Int => "int",
            TypeExpr::Float => "float",
            TypeExpr::Str => "str",
            TypeExpr::Literal { .. } => "literal",
            TypeExpr::Ref { .. } => "object",
            TypeExpr::List { .. } => "list",
            TypeExpr::Set { .. } => "set",
            TypeExpr::Tuple { .. } => "tuple",
            TypeExpr::Map { .. } => "map",
            TypeExpr::Union { .. } => "union",
        }
    }

    /// Cheap structural check: could `value` belong to this type?
    ///
    /// Schema references are not resolved, so a `Ref` admits any object or
    /// array (root wrappers hold arrays).
    pub fn matches_shape(&self, value: &Value) -> bool {
        match self {
            TypeExpr::Any => true,
            TypeExpr::Null => value.is_null(),
            TypeExpr::Bool => value.is_boolean(),
            TypeExpr::Int => value.is_i64() || value.is_u64(),
            TypeExpr::Float => value.is_number(),
            TypeExpr::Str => value.is_string(),
            TypeExpr::Literal { values } => values.contains(value),
            TypeExpr::Ref { .. } => value.is_object() || value.is_array(),
            TypeExpr::List { .. } | TypeExpr::Set { .. } | TypeExpr::Tuple { .. } => {
                value.is_array()
            }
            TypeExpr::Map { .. } => value.is_object(),
            TypeExpr::Union { members } => members.iter().any(|m| m.matches_shape(value)),
        }
    }

    /// Names of every schema referenced anywhere in the expression.
    pub fn schema_refs(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TypeExpr::Ref { schema } => out.push(schema),
            TypeExpr::List { item } | TypeExpr::Set { item } => item.collect_refs(out),
            TypeExpr::Tuple { items } => {
                for item in items {
                    if let TupleItem::Item(ty) = item {
                        ty.collect_refs(out);
                    }
                }
            }
            TypeExpr::Map { key, value } => {
                key.collect_refs(out);
                value.collect_refs(out);
            }
            TypeExpr::Union { members } => {
                for member in members {
                    member.collect_refs(out);
                }
            }
            _ => {}
        }
    }

    /// Describes the first malformed tuple in the expression. A variadic
    /// marker must follow an element type and close the tuple.
    fn tuple_defect(&self) -> Option<String> {
        match self {
            TypeExpr::List { item } | TypeExpr::Set { item } => item.tuple_defect(),
            TypeExpr::Map { key, value } => key.tuple_defect().or_else(|| value.tuple_defect()),
            TypeExpr::Union { members } => members.iter().find_map(TypeExpr::tuple_defect),
            TypeExpr::Tuple { items } => {
                let markers = items
                    .iter()
                    .filter(|item| matches!(item, TupleItem::Ellipsis))
                    .count();
                let ends_variadic = matches!(items.last(), Some(TupleItem::Ellipsis));
                if markers > 1 {
                    Some(format!("{} has more than one '...'", self))
                } else if markers == 1 && !ends_variadic {
                    Some(format!("'...' must be the last item of {}", self))
                } else if matches!(items.first(), Some(TupleItem::Ellipsis)) {
                    Some(format!("'...' must follow an element type in {}", self))
                } else {
                    items.iter().find_map(|item| match item {
                        TupleItem::Item(ty) => ty.tuple_defect(),
                        TupleItem::Ellipsis => None,
                    })
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Literal { values } => {
                write!(f, "Literal[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            TypeExpr::Ref { schema } => write!(f, "{}", schema),
            TypeExpr::List { item } => write!(f, "list[{}]", item),
            TypeExpr::Set { item } => write!(f, "set[{}]", item),
            TypeExpr::Tuple { items } => {
                write!(f, "tuple[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        TupleItem::Item(ty) => write!(f, "{}", ty)?,
                        TupleItem::Ellipsis => write!(f, "...")?,
                    }
                }
                write!(f, "]")
            }
            TypeExpr::Map { key, value } => write!(f, "map[{}, {}]", key, value),
            TypeExpr::Union { members } => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", member)?;
                }
                Ok(())
            }
            other => write!(f, "{}", other.type_name()),
        }
    }
}

/// Value constraint carried in field metadata, enforced on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Number greater than or equal to
    Ge(f64),
    /// Number less than or equal to
    Le(f64),
    /// Minimum length of a string, list, set, tuple or map
    MinLength(usize),
    /// Maximum length of a string, list, set, tuple or map
    MaxLength(usize),
}

/// One entry of a field's metadata list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Annotation {
    Access(AccessMode),
    Constraint(Constraint),
    /// Free-form marker, carried through views untouched
    Tag(String),
}

type FactoryFn = dyn Fn() -> Value + Send + Sync;
type DeriveFn = dyn Fn(&Map<String, Value>) -> Value + Send + Sync;

/// Named closure producing a fresh default value.
///
/// Two factories are equal when they share the same closure, so a field
/// copied into a view keeps a factory equal to its source's.
#[derive(Clone)]
pub struct DefaultFactory {
    name: String,
    produce: Arc<FactoryFn>,
}

impl DefaultFactory {
    pub fn new(
        name: impl Into<String>,
        produce: impl Fn() -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            produce: Arc::new(produce),
        }
    }

    /// `{}`
    pub fn empty_map() -> Self {
        Self::new("dict", || Value::Object(Map::new()))
    }

    /// `[]`
    pub fn empty_list() -> Self {
        Self::new("list", || Value::Array(Vec::new()))
    }

    /// Factories available to schema definition files.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "dict" => Some(Self::empty_map()),
            "list" => Some(Self::empty_list()),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self) -> Value {
        (self.produce)()
    }
}

impl PartialEq for DefaultFactory {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.produce, &other.produce)
    }
}

impl fmt::Debug for DefaultFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DefaultFactory({})", self.name)
    }
}

/// Derivation of a computed field from the record's other data.
#[derive(Clone)]
pub struct Derivation {
    name: String,
    derive: Arc<DeriveFn>,
}

impl Derivation {
    pub fn new(
        name: impl Into<String>,
        derive: impl Fn(&Map<String, Value>) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            derive: Arc::new(derive),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn derive(&self, data: &Map<String, Value>) -> Value {
        (self.derive)(data)
    }
}

impl PartialEq for Derivation {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.derive, &other.derive)
    }
}

impl fmt::Debug for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Derivation({})", self.name)
    }
}

impl Serialize for Derivation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// A resolved default: a concrete value, or the unset marker.
///
/// `Unset` never equals any field value, `null` included; an unset field is
/// left out of the record instead of being stored.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Value(Value),
    Unset,
}

impl Slot {
    pub fn is_unset(&self) -> bool {
        matches!(self, Slot::Unset)
    }
}

/// How a field obtains a value when the input omits it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "DefaultRepr", try_from = "DefaultRepr")]
pub enum FieldDefault {
    /// No default: the field must be provided
    #[default]
    Required,
    /// Fixed value
    Value(Value),
    /// Fresh value per construction
    Factory(DefaultFactory),
    /// Omitted fields stay unset
    Unset,
}

impl FieldDefault {
    pub fn is_required(&self) -> bool {
        matches!(self, FieldDefault::Required)
    }

    /// Exactly `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldDefault::Value(Value::Null))
    }

    /// Resolves the default; `None` for a required field.
    pub fn produce(&self) -> Option<Slot> {
        match self {
            FieldDefault::Required => None,
            FieldDefault::Value(value) => Some(Slot::Value(value.clone())),
            FieldDefault::Factory(factory) => Some(Slot::Value(factory.call())),
            FieldDefault::Unset => Some(Slot::Unset),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum DefaultRepr {
    Required,
    Unset,
    Value(Value),
    Factory(String),
}

impl From<FieldDefault> for DefaultRepr {
    fn from(default: FieldDefault) -> Self {
        match default {
            FieldDefault::Required => DefaultRepr::Required,
            FieldDefault::Value(value) => DefaultRepr::Value(value),
            FieldDefault::Factory(factory) => DefaultRepr::Factory(factory.name),
            FieldDefault::Unset => DefaultRepr::Unset,
        }
    }
}

impl TryFrom<DefaultRepr> for FieldDefault {
    type Error = String;

    fn try_from(repr: DefaultRepr) -> Result<Self, Self::Error> {
        Ok(match repr {
            DefaultRepr::Required => FieldDefault::Required,
            DefaultRepr::Value(value) => FieldDefault::Value(value),
            DefaultRepr::Factory(name) => {
                let factory = DefaultFactory::builtin(&name)
                    .ok_or_else(|| format!("unknown default factory '{}'", name))?;
                FieldDefault::Factory(factory)
            }
            DefaultRepr::Unset => FieldDefault::Unset,
        })
    }
}

fn serialize_derivation<S: Serializer>(
    derivation: &Option<Derivation>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match derivation {
        Some(d) => d.serialize(serializer),
        None => serializer.serialize_none(),
    }
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Canonical field name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub ty: TypeExpr,
    #[serde(default)]
    pub default: FieldDefault,
    /// External name used in input and `dump(by_alias)`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Deprecation message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<Annotation>,
    /// Set for computed fields
    #[serde(
        default,
        skip_deserializing,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_derivation"
    )]
    pub computed: Option<Derivation>,
}

impl FieldSpec {
    /// Create a required field
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
            default: FieldDefault::Required,
            alias: None,
            alias_priority: None,
            title: None,
            description: None,
            deprecated: None,
            discriminator: None,
            metadata: Vec::new(),
            computed: None,
        }
    }

    /// Create a computed field
    pub fn computed(name: impl Into<String>, ty: TypeExpr, derivation: Derivation) -> Self {
        let mut field = Self::new(name, ty);
        field.computed = Some(derivation);
        field
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = FieldDefault::Value(value);
        self
    }

    pub fn default_factory(mut self, factory: DefaultFactory) -> Self {
        self.default = FieldDefault::Factory(factory);
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn alias_priority(mut self, priority: i32) -> Self {
        self.alias_priority = Some(priority);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = Some(message.into());
        self
    }

    pub fn discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = Some(discriminator.into());
        self
    }

    /// Adds an access-mode annotation.
    pub fn access(mut self, mode: AccessMode) -> Self {
        self.metadata.push(Annotation::Access(mode));
        self
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.metadata.push(annotation);
        self
    }

    pub fn is_computed(&self) -> bool {
        self.computed.is_some()
    }

    pub fn is_required(&self) -> bool {
        !self.is_computed() && self.default.is_required()
    }

    /// Name expected in external input and alias dumps.
    pub fn external_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Whether a schema is a plain record or wraps a single `root` container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    #[default]
    Record,
    Root,
}

/// Where a synthesized view came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewOrigin {
    /// Source schema name
    pub source: String,
    /// View name, e.g. "Update"
    pub view: String,
}

/// Complete schema definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Unique schema name within a catalog
    pub name: String,
    /// Defining context, e.g. `billing::models`
    #[serde(default)]
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub kind: SchemaKind,
    /// Field definitions, in declaration order
    pub fields: Vec<FieldSpec>,
    /// Set on synthesized views
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<ViewOrigin>,
}

impl Schema {
    /// Name of the single field of a root wrapper.
    pub const ROOT_FIELD: &'static str = "root";

    /// Create a new record schema
    pub fn new(name: impl Into<String>, module: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            description: None,
            kind: SchemaKind::Record,
            fields,
            origin: None,
        }
    }

    /// Create a root wrapper around a container type
    pub fn root(name: impl Into<String>, module: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            description: None,
            kind: SchemaKind::Root,
            fields: vec![FieldSpec::new(Self::ROOT_FIELD, ty)],
            origin: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn is_root(&self) -> bool {
        self.kind == SchemaKind::Root
    }

    pub fn is_view(&self) -> bool {
        self.origin.is_some()
    }

    /// Type of the `root` field of a root wrapper.
    pub fn root_type(&self) -> Option<&TypeExpr> {
        if self.is_root() {
            self.field(Self::ROOT_FIELD).map(|f| &f.ty)
        } else {
            None
        }
    }

    /// `module::Name`, or just the name when no module is recorded.
    pub fn qualified_name(&self) -> String {
        if self.module.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.module, self.name)
        }
    }

    /// Validates the schema structure itself (not an instance).
    pub fn validate_structure(&self) -> SchemaResult<()> {
        if self.name.is_empty() {
            return Err(SchemaError::invalid_schema(
                "<unnamed>",
                "schema name must not be empty",
            ));
        }

        for (i, field) in self.fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(SchemaError::invalid_schema(
                    &self.name,
                    format!("field #{} has no name", i),
                ));
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::invalid_schema(
                    &self.name,
                    format!("field '{}' is declared twice", field.name),
                ));
            }
            if let Some(defect) = field.ty.tuple_defect() {
                return Err(SchemaError::invalid_schema(
                    &self.name,
                    format!("field '{}': {}", field.name, defect),
                ));
            }

            let mode = access::access_mode(&self.name, field)?;
            if field.is_computed() && mode.is_some() {
                return Err(SchemaError::invalid_schema(
                    &self.name,
                    format!("computed field '{}' cannot carry an access mode", field.name),
                ));
            }
        }

        if self.is_root() {
            let root = match self.fields.as_slice() {
                [only] if only.name == Self::ROOT_FIELD => only,
                _ => {
                    return Err(SchemaError::invalid_schema(
                        &self.name,
                        "a root wrapper must have exactly one field named 'root'",
                    ))
                }
            };
            if !root.ty.is_container() {
                return Err(SchemaError::invalid_schema(
                    &self.name,
                    format!("root type must be a list, set, tuple or map, got {}", root.ty),
                ));
            }
        }

        Ok(())
    }
}
