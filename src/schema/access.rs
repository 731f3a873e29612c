//! Access-mode annotations
//!
//! A field carries at most one access mode in its metadata. A field without
//! one is unconditional and appears in every view.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{SchemaError, SchemaResult};
use super::types::{Annotation, FieldSpec};

/// Per-field access annotation controlling which views include the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Returned by reads, never accepted on writes
    ReadOnly,
    /// Accepted on writes, never returned
    WriteOnly,
    /// Returned only in the response to a creation
    ReadOnlyOnCreation,
    /// Accepted only when creating
    WriteOnlyOnCreation,
    /// Returned by reads and accepted on writes
    ReadAndWrite,
    /// Never part of a standard view
    Hidden,
}

impl AccessMode {
    /// Every access mode, in declaration order.
    pub const ALL: [AccessMode; 6] = [
        AccessMode::ReadOnly,
        AccessMode::WriteOnly,
        AccessMode::ReadOnlyOnCreation,
        AccessMode::WriteOnlyOnCreation,
        AccessMode::ReadAndWrite,
        AccessMode::Hidden,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::ReadOnly => "read_only",
            AccessMode::WriteOnly => "write_only",
            AccessMode::ReadOnlyOnCreation => "read_only_on_creation",
            AccessMode::WriteOnlyOnCreation => "write_only_on_creation",
            AccessMode::ReadAndWrite => "read_and_write",
            AccessMode::Hidden => "hidden",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| format!("unknown access mode '{}'", s))
    }
}

/// Returns the field's access mode, `None` when the field is unconditional.
///
/// # Errors
///
/// `VIEW_AMBIGUOUS_ACCESS_MODE` when the metadata holds more than one mode.
pub fn access_mode(schema: &str, field: &FieldSpec) -> SchemaResult<Option<AccessMode>> {
    let mut modes = field.metadata.iter().filter_map(|annotation| match annotation {
        Annotation::Access(mode) => Some(*mode),
        _ => None,
    });

    let first = modes.next();
    if modes.next().is_some() {
        return Err(SchemaError::AmbiguousAccessMode {
            schema: schema.to_string(),
            field: field.name.clone(),
        });
    }
    Ok(first)
}

/// Whether a field with `mode` belongs in a view requesting `requested`.
pub fn is_included(mode: Option<AccessMode>, requested: &BTreeSet<AccessMode>) -> bool {
    match mode {
        None => true,
        Some(mode) => requested.contains(&mode),
    }
}

/// Copies metadata without its access annotations.
pub fn strip_access(metadata: &[Annotation]) -> Vec<Annotation> {
    metadata
        .iter()
        .filter(|annotation| !matches!(annotation, Annotation::Access(_)))
        .cloned()
        .collect()
}
