//! Diff result types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// How a single path differs between current and desired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiffState {
    /// Present only in the desired state.
    Added,
    /// Present only in the current state.
    Removed,
    /// Present in both, with different values.
    Changed,
}

impl fmt::Display for DiffState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "ADDED"),
            Self::Removed => write!(f, "REMOVED"),
            Self::Changed => write!(f, "CHANGED"),
        }
    }
}

/// One differing path.
///
/// `working` is the desired value, `base` the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub state: DiffState,
    pub working: Option<Value>,
    pub base: Option<Value>,
}

impl DiffEntry {
    #[must_use]
    pub const fn added(working: Value) -> Self {
        Self {
            state: DiffState::Added,
            working: Some(working),
            base: None,
        }
    }

    #[must_use]
    pub const fn removed(base: Value) -> Self {
        Self {
            state: DiffState::Removed,
            working: None,
            base: Some(base),
        }
    }

    #[must_use]
    pub const fn changed(working: Value, base: Value) -> Self {
        Self {
            state: DiffState::Changed,
            working: Some(working),
            base: Some(base),
        }
    }
}

/// The full set of differing paths, ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diff {
    entries: BTreeMap<String, DiffEntry>,
}

impl Diff {
    pub(crate) const fn from_entries(entries: BTreeMap<String, DiffEntry>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&DiffEntry> {
        self.entries.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DiffEntry)> {
        self.entries.iter().map(|(path, entry)| (path.as_str(), entry))
    }

    /// Differing paths in order.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Paths present on both sides with different values.
    #[must_use]
    pub fn changed_paths(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.state == DiffState::Changed)
            .map(|(path, _)| path.as_str())
            .collect()
    }

    /// Render as `{path: {state, desired, current}}`, the shape recorded on
    /// delta events.
    #[must_use]
    pub fn to_delta_json(&self) -> Value {
        let rendered: Map<String, Value> = self
            .entries
            .iter()
            .map(|(path, entry)| {
                let mut fields = json!({ "state": entry.state });
                if let Some(obj) = fields.as_object_mut() {
                    if let Some(working) = &entry.working {
                        obj.insert("desired".to_string(), working.clone());
                    }
                    if let Some(base) = &entry.base {
                        obj.insert("current".to_string(), base.clone());
                    }
                }
                (path.clone(), fields)
            })
            .collect();
        Value::Object(rendered)
    }

    /// One line per path, for change summaries.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(path, entry)| match (&entry.base, &entry.working) {
                (Some(base), Some(working)) => format!("{path} changed from {base} to {working}"),
                (None, Some(working)) => format!("{path} added: {working}"),
                (Some(base), None) => format!("{path} removed: {base}"),
                (None, None) => format!("{path} {}", entry.state),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Diff {
        let mut entries = BTreeMap::new();
        entries.insert("/capacity/max".to_string(), DiffEntry::changed(json!(5), json!(3)));
        entries.insert("/tags[#1]".to_string(), DiffEntry::added(json!("b")));
        Diff::from_entries(entries)
    }

    #[test]
    fn delta_json_uses_desired_and_current_names() {
        let rendered = sample().to_delta_json();
        assert_eq!(
            rendered,
            json!({
                "/capacity/max": {"state": "CHANGED", "desired": 5, "current": 3},
                "/tags[#1]": {"state": "ADDED", "desired": "b"}
            })
        );
    }

    #[test]
    fn messages_describe_each_path() {
        assert_eq!(
            sample().messages(),
            vec![
                "/capacity/max changed from 3 to 5".to_string(),
                "/tags[#1] added: \"b\"".to_string(),
            ]
        );
    }

    #[test]
    fn changed_paths_skip_additions() {
        let d = sample();
        assert_eq!(d.paths(), vec!["/capacity/max", "/tags[#1]"]);
        assert_eq!(d.changed_paths(), vec!["/capacity/max"]);
    }

    #[test]
    fn empty_diff_has_no_changes() {
        let d = Diff::default();
        assert!(d.is_empty());
        assert!(!d.has_changes());
        assert_eq!(d.len(), 0);
    }
}
