//! Type rewriting for views
//!
//! Rules, applied bottom-up:
//! - literals are never rewritten nor made nullable
//! - a schema reference is replaced by whatever the resolver returns
//! - list and set elements are rewritten in place
//! - tuple elements are rewritten by position; the `...` marker stays put
//! - map values are rewritten, keys are left alone
//! - union members are rewritten one by one
//!
//! Nullable shaping runs after substitution. It wraps tuple elements and map
//! values individually, never list or set elements.

use crate::schema::types::{TupleItem, TypeExpr};
use crate::schema::SchemaResult;

/// Rewrites every schema reference in `ty` through `resolve`.
///
/// `resolve` receives a referenced schema name and returns the name to
/// reference instead (a view, or the same schema).
pub fn rewrite<F>(ty: &TypeExpr, resolve: &mut F) -> SchemaResult<TypeExpr>
where
    F: FnMut(&str) -> SchemaResult<String>,
{
    Ok(match ty {
        TypeExpr::Ref { schema } => TypeExpr::Ref {
            schema: resolve(schema)?,
        },
        TypeExpr::List { item } => TypeExpr::list(rewrite(item, resolve)?),
        TypeExpr::Set { item } => TypeExpr::set(rewrite(item, resolve)?),
        TypeExpr::Tuple { items } => TypeExpr::Tuple {
            items: items
                .iter()
                .map(|item| match item {
                    TupleItem::Item(ty) => rewrite(ty, resolve).map(TupleItem::Item),
                    TupleItem::Ellipsis => Ok(TupleItem::Ellipsis),
                })
                .collect::<SchemaResult<_>>()?,
        },
        TypeExpr::Map { key, value } => TypeExpr::Map {
            key: key.clone(),
            value: Box::new(rewrite(value, resolve)?),
        },
        TypeExpr::Union { members } => TypeExpr::Union {
            members: members
                .iter()
                .map(|member| rewrite(member, resolve))
                .collect::<SchemaResult<_>>()?,
        },
        // Literals and terminal types
        other => other.clone(),
    })
}

/// `ty | null`, flattened into an existing union.
///
/// Literals and already-nullable types are returned unchanged.
pub fn make_nullable(ty: &TypeExpr) -> TypeExpr {
    if ty.is_literal() || ty.is_nullable() {
        return ty.clone();
    }
    match ty {
        TypeExpr::Union { members } => {
            let mut members = members.clone();
            members.push(TypeExpr::Null);
            TypeExpr::Union { members }
        }
        other => TypeExpr::optional(other.clone()),
    }
}

/// Nullable shaping of the inside of a type, leaving the outer occurrence.
pub fn shape_inner(ty: &TypeExpr) -> TypeExpr {
    match ty {
        TypeExpr::Tuple { items } => TypeExpr::Tuple {
            items: items
                .iter()
                .map(|item| match item {
                    TupleItem::Item(ty) => TupleItem::Item(make_nullable(ty)),
                    TupleItem::Ellipsis => TupleItem::Ellipsis,
                })
                .collect(),
        },
        TypeExpr::Map { key, value } => TypeExpr::Map {
            key: key.clone(),
            value: Box::new(make_nullable(value)),
        },
        TypeExpr::Union { members } => TypeExpr::Union {
            members: members.iter().map(shape_inner).collect(),
        },
        other => other.clone(),
    }
}

/// Nullable shaping of a field type: inner positions, then the field itself.
pub fn shape_nullable(ty: &TypeExpr) -> TypeExpr {
    make_nullable(&shape_inner(ty))
}

/// Nullable shaping of a root wrapper's type.
///
/// A root value is always present, so only the inner positions are wrapped.
pub fn shape_root_nullable(ty: &TypeExpr) -> TypeExpr {
    shape_inner(ty)
}

/// The non-null part of an optional type, or the type itself.
pub fn strip_nullable(ty: &TypeExpr) -> &TypeExpr {
    match ty {
        TypeExpr::Union { members } => {
            let mut non_null = members.iter().filter(|m| !matches!(m, TypeExpr::Null));
            match (non_null.next(), non_null.next()) {
                (Some(only), None) => only,
                _ => ty,
            }
        }
        other => other,
    }
}
