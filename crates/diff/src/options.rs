//! Per-kind diff configuration: ignored fields, value normalizers, list keys.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Normalizes a value before comparison. Applied to both sides.
pub type FieldMutator = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Path that applies a mutator to every scalar.
pub const ALL_SCALARS: &str = "*";

/// Options controlling a single diff.
///
/// Paths are `/`-separated field names from the root, with list positions
/// elided: a `protocol` field inside elements of the `ports` list lives at
/// `/ports/protocol`.
#[derive(Clone, Default)]
pub struct DiffOptions {
    ignore_keys: BTreeSet<String>,
    mutators: BTreeMap<String, FieldMutator>,
    list_keys: BTreeMap<String, String>,
}

impl DiffOptions {
    /// Create empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore a field, either by bare name (`id`) or by full path (`/moniker/stack`).
    #[must_use]
    pub fn ignore(mut self, key: impl Into<String>) -> Self {
        self.ignore_keys.insert(key.into());
        self
    }

    /// Ignore several fields.
    #[must_use]
    pub fn ignore_all<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Normalize the value at `path` (or every scalar, for [`ALL_SCALARS`]).
    #[must_use]
    pub fn mutate<F>(mut self, path: impl Into<String>, mutator: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.mutators.insert(path.into(), Arc::new(mutator));
        self
    }

    /// Match elements of the list at `list_path` by their `field` value.
    #[must_use]
    pub fn list_key(mut self, list_path: impl Into<String>, field: impl Into<String>) -> Self {
        self.list_keys.insert(list_path.into(), field.into());
        self
    }

    pub(crate) fn is_ignored(&self, name: &str, path: &str) -> bool {
        self.ignore_keys.contains(name) || self.ignore_keys.contains(path)
    }

    pub(crate) fn path_mutator(&self, path: &str) -> Option<&FieldMutator> {
        self.mutators.get(path)
    }

    pub(crate) fn scalar_mutator(&self) -> Option<&FieldMutator> {
        self.mutators.get(ALL_SCALARS)
    }

    pub(crate) fn list_key_for(&self, path: &str) -> Option<&str> {
        self.list_keys.get(path).map(String::as_str)
    }
}

impl fmt::Debug for DiffOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffOptions")
            .field("ignore_keys", &self.ignore_keys)
            .field("mutators", &self.mutators.keys().collect::<Vec<_>>())
            .field("list_keys", &self.list_keys)
            .finish()
    }
}

/// Lowercase string values, leaving everything else untouched.
#[must_use]
pub fn lowercase(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_lowercase()),
        other => other.clone(),
    }
}

/// Trim surrounding whitespace from string values.
#[must_use]
pub fn trimmed(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}
