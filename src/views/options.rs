//! Shaping options of a view

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::schema::AccessMode;

/// Which fields a view keeps and how it reshapes them.
///
/// Two builders sharing a view name must agree on these options; the first
/// one to build a schema's view owns the name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewOptions {
    /// Fields annotated with one of these modes are kept
    #[serde(default)]
    pub access_modes: BTreeSet<AccessMode>,
    /// Every kept field (and tuple element / map value) accepts `null`
    #[serde(default)]
    pub all_nullable: bool,
    /// Every kept field defaults to unset
    #[serde(default)]
    pub all_optional: bool,
    /// Fields defaulting to `null` default to unset instead
    #[serde(default)]
    pub hide_default_null: bool,
    /// Computed fields are copied into the view
    #[serde(default)]
    pub include_computed_fields: bool,
}

impl ViewOptions {
    pub fn new(access_modes: impl IntoIterator<Item = AccessMode>) -> Self {
        Self {
            access_modes: access_modes.into_iter().collect(),
            ..Self::default()
        }
    }
}
