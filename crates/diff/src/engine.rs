//! Structural comparison of two JSON-shaped representations.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::{DiffError, Result, Shape};
use crate::options::DiffOptions;
use crate::types::{Diff, DiffEntry};

/// Compare `current` (base) against `desired` (working).
///
/// Both sides are normalized first: ignored fields are dropped, mutators are
/// applied, `null` object members are treated as absent and integral floats
/// compare equal to integers. Object members are then compared by name and
/// list elements by natural key (see [`DiffOptions::list_key`]) or, failing
/// that, by value.
///
/// # Errors
///
/// Returns `DiffError::TypeMismatch` if the two roots are of different shapes
/// (object vs list vs scalar). That is a caller error, never swallowed.
pub fn diff(current: &Value, desired: &Value, options: &DiffOptions) -> Result<Diff> {
    let (current_shape, desired_shape) = (Shape::of(current), Shape::of(desired));
    if current_shape != desired_shape {
        return Err(DiffError::TypeMismatch {
            current: current_shape,
            desired: desired_shape,
        });
    }

    let differ = Differ { options };
    let base = differ.normalize("", current);
    let working = differ.normalize("", desired);

    let mut entries = BTreeMap::new();
    differ.compare("", "", &base, &working, &mut entries);
    Ok(Diff::from_entries(entries))
}

/// Diff a desired value against an absent current state.
///
/// Every desired field is reported as added.
#[must_use]
pub fn diff_against_absent(desired: &Value, options: &DiffOptions) -> Diff {
    let absent = empty_like(desired);
    // Shapes match by construction.
    diff(&absent, desired, options).unwrap_or_default()
}

/// Diff two values of the same serializable type.
///
/// # Errors
///
/// Returns `DiffError::Serialization` if either side cannot be represented as
/// JSON.
pub fn diff_structs<T: Serialize>(current: &T, desired: &T, options: &DiffOptions) -> Result<Diff> {
    let current = serde_json::to_value(current).map_err(|e| DiffError::serialization(e.to_string()))?;
    let desired = serde_json::to_value(desired).map_err(|e| DiffError::serialization(e.to_string()))?;
    diff(&current, &desired, options)
}

/// An empty value of the same shape.
#[must_use]
pub fn empty_like(value: &Value) -> Value {
    match value {
        Value::Object(_) => Value::Object(Map::new()),
        Value::Array(_) => Value::Array(Vec::new()),
        _ => Value::Null,
    }
}

struct Differ<'a> {
    options: &'a DiffOptions,
}

impl Differ<'_> {
    fn normalize(&self, path: &str, value: &Value) -> Value {
        match self.options.path_mutator(path) {
            Some(mutator) => self.normalize_children(path, mutator(value)),
            None => self.normalize_children(path, value.clone()),
        }
    }

    fn normalize_children(&self, path: &str, value: Value) -> Value {
        match value {
            Value::Object(members) => Value::Object(
                members
                    .into_iter()
                    .filter_map(|(name, member)| {
                        let child = child_path(path, &name);
                        if self.options.is_ignored(&name, &child) {
                            return None;
                        }
                        let member = self.normalize(&child, &member);
                        (!member.is_null()).then_some((name, member))
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.normalize_children(path, item))
                    .collect(),
            ),
            scalar => {
                let scalar = match self.options.scalar_mutator() {
                    Some(mutator) => mutator(&scalar),
                    None => scalar,
                };
                canonical_number(scalar)
            }
        }
    }

    fn compare(
        &self,
        at: &str,
        schema: &str,
        base: &Value,
        working: &Value,
        out: &mut BTreeMap<String, DiffEntry>,
    ) {
        match (base, working) {
            (Value::Object(base), Value::Object(working)) => {
                let names: BTreeSet<&String> = base.keys().chain(working.keys()).collect();
                for name in names {
                    let child_at = child_path(at, name);
                    match (base.get(name.as_str()), working.get(name.as_str())) {
                        (Some(b), Some(w)) => {
                            self.compare(&child_at, &child_path(schema, name), b, w, out);
                        }
                        (None, Some(w)) => record(out, &child_at, DiffEntry::added(w.clone())),
                        (Some(b), None) => record(out, &child_at, DiffEntry::removed(b.clone())),
                        (None, None) => {}
                    }
                }
            }
            (Value::Array(base), Value::Array(working)) => {
                self.compare_lists(at, schema, base, working, out);
            }
            (b, w) if b == w => {}
            (Value::Null, w) => record(out, at, DiffEntry::added(w.clone())),
            (b, Value::Null) => record(out, at, DiffEntry::removed(b.clone())),
            (b, w) => record(out, at, DiffEntry::changed(w.clone(), b.clone())),
        }
    }

    fn compare_lists(
        &self,
        at: &str,
        schema: &str,
        base: &[Value],
        working: &[Value],
        out: &mut BTreeMap<String, DiffEntry>,
    ) {
        let key_field = self.options.list_key_for(schema);
        let (base_keyed, base_pool) = partition(key_field, base);
        let (working_keyed, working_pool) = partition(key_field, working);

        let keys: BTreeSet<&String> = base_keyed.keys().chain(working_keyed.keys()).collect();
        for key in keys {
            let element_at = format!("{at}[{key}]");
            match (base_keyed.get(key), working_keyed.get(key)) {
                (Some(b), Some(w)) => self.compare(&element_at, schema, b, w, out),
                (None, Some(w)) => record(out, &element_at, DiffEntry::added((*w).clone())),
                (Some(b), None) => record(out, &element_at, DiffEntry::removed((*b).clone())),
                (None, None) => {}
            }
        }

        compare_by_value(at, &base_pool, &working_pool, out);
    }
}

/// Split list elements into those with a unique natural key and the rest.
fn partition<'v>(
    key_field: Option<&str>,
    items: &'v [Value],
) -> (BTreeMap<String, &'v Value>, Vec<(usize, &'v Value)>) {
    let Some(field) = key_field else {
        return (BTreeMap::new(), items.iter().enumerate().collect());
    };

    let keys: Vec<Option<String>> = items.iter().map(|item| element_key(item, field)).collect();
    let counts = keys.iter().flatten().counts();

    let mut keyed = BTreeMap::new();
    let mut pool = Vec::new();
    for (index, (item, key)) in items.iter().zip(keys.iter()).enumerate() {
        match key {
            Some(key) if counts.get(key) == Some(&1) => {
                keyed.insert(key.clone(), item);
            }
            _ => pool.push((index, item)),
        }
    }
    (keyed, pool)
}

fn element_key(item: &Value, field: &str) -> Option<String> {
    match item.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Match unkeyed elements by equality, ignoring order.
///
/// Entries render their position as `[#n]` so they never share a path with
/// an element whose natural key is `n`.
/// Unmatched desired elements are added, unmatched current elements removed.
/// When both sides leave an element unmatched at the same position the entry
/// is reported once, as changed.
fn compare_by_value(
    at: &str,
    base: &[(usize, &Value)],
    working: &[(usize, &Value)],
    out: &mut BTreeMap<String, DiffEntry>,
) {
    let mut used = BTreeSet::new();
    let mut added = BTreeMap::new();
    for &(index, w) in working {
        match base
            .iter()
            .copied()
            .find(|&(j, b)| !used.contains(&j) && b == w)
        {
            Some((j, _)) => {
                used.insert(j);
            }
            None => {
                added.insert(index, w);
            }
        }
    }
    let removed: BTreeMap<usize, &Value> = base
        .iter()
        .copied()
        .filter(|(j, _)| !used.contains(j))
        .collect();

    let positions: BTreeSet<&usize> = added.keys().chain(removed.keys()).collect();
    for position in positions {
        let element_at = format!("{at}[#{position}]");
        match (removed.get(position), added.get(position)) {
            (Some(b), Some(w)) => {
                record(out, &element_at, DiffEntry::changed((*w).clone(), (*b).clone()));
            }
            (None, Some(w)) => record(out, &element_at, DiffEntry::added((*w).clone())),
            (Some(b), None) => record(out, &element_at, DiffEntry::removed((*b).clone())),
            (None, None) => {}
        }
    }
}

fn child_path(parent: &str, name: &str) -> String {
    format!("{parent}/{name}")
}

fn record(out: &mut BTreeMap<String, DiffEntry>, at: &str, entry: DiffEntry) {
    let path = if at.is_empty() { "/" } else { at };
    out.insert(path.to_string(), entry);
}

/// Integral floats become integers so `2.0` and `2` compare equal.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::float_cmp)]
fn canonical_number(value: Value) -> Value {
    match &value {
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                Value::Number(Number::from(f as i64))
            }
            _ => value,
        },
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use serde_json::json;

    use super::*;
    use crate::options::lowercase;
    use crate::types::DiffState;

    fn cluster() -> Value {
        json!({
            "id": "sg-1234",
            "moniker": {"app": "fnord", "stack": "test"},
            "capacity": {"min": 1, "max": 3},
            "ports": [
                {"port": 8080, "protocol": "tcp"},
                {"port": 443, "protocol": "tcp"}
            ],
            "tags": ["a", "b"]
        })
    }

    #[test]
    fn identical_values_have_no_diff() {
        let d = diff(&cluster(), &cluster(), &DiffOptions::new()).unwrap();
        assert!(d.is_empty());
    }

    #[test]
    fn detects_changed_nested_scalar() {
        let mut desired = cluster();
        desired["capacity"]["max"] = json!(5);

        let d = diff(&cluster(), &desired, &DiffOptions::new()).unwrap();
        let entry = d.get("/capacity/max").unwrap();
        assert_eq!(entry.state, DiffState::Changed);
        assert_eq!(entry.working, Some(json!(5)));
        assert_eq!(entry.base, Some(json!(3)));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn missing_members_are_added_or_removed() {
        let current = json!({"a": 1, "b": 2});
        let desired = json!({"a": 1, "c": 3});

        let d = diff(&current, &desired, &DiffOptions::new()).unwrap();
        assert_eq!(d.get("/c").map(|e| e.state), Some(DiffState::Added));
        assert_eq!(d.get("/b").map(|e| e.state), Some(DiffState::Removed));
    }

    #[test]
    fn ignored_keys_never_show_up() {
        let mut current = cluster();
        current["id"] = json!("sg-9999");
        current["moniker"]["detail"] = json!("server-assigned");

        let options = DiffOptions::new().ignore("id").ignore("/moniker/detail");
        let d = diff(&current, &cluster(), &options).unwrap();
        assert!(d.is_empty(), "unexpected diff: {:?}", d.paths());
    }

    #[test]
    fn mutators_apply_to_both_sides() {
        let current = json!({"name": "FNORD-main"});
        let desired = json!({"name": "fnord-MAIN"});
        let options = DiffOptions::new().mutate("/name", lowercase);

        assert!(diff(&current, &desired, &options).unwrap().is_empty());
        assert!(diff(&desired, &current, &options).unwrap().is_empty());
    }

    #[test]
    fn null_members_equal_absent_members() {
        let current = json!({"a": 1, "b": null});
        let desired = json!({"a": 1});
        assert!(diff(&current, &desired, &DiffOptions::new()).unwrap().is_empty());
    }

    #[test]
    fn integral_floats_equal_integers() {
        let current = json!({"cpu": 2.0});
        let desired = json!({"cpu": 2});
        assert!(diff(&current, &desired, &DiffOptions::new()).unwrap().is_empty());
    }

    #[test]
    fn unkeyed_lists_ignore_order() {
        let current = json!({"tags": ["b", "a"]});
        let desired = json!({"tags": ["a", "b"]});
        assert!(diff(&current, &desired, &DiffOptions::new()).unwrap().is_empty());
    }

    #[test]
    fn unkeyed_list_reports_added_element() {
        let current = json!({"tags": ["a"]});
        let desired = json!({"tags": ["a", "b"]});

        let d = diff(&current, &desired, &DiffOptions::new()).unwrap();
        let entry = d.get("/tags[#1]").unwrap();
        assert_eq!(entry.state, DiffState::Added);
        assert_eq!(entry.working, Some(json!("b")));
    }

    #[test]
    fn keyed_lists_diff_inside_matched_elements() {
        let mut desired = cluster();
        desired["ports"][1]["protocol"] = json!("udp");
        let options = DiffOptions::new().list_key("/ports", "port");

        let d = diff(&cluster(), &desired, &options).unwrap();
        assert_eq!(d.paths(), vec!["/ports[443]/protocol"]);
    }

    #[test]
    fn keyed_lists_report_unmatched_elements_by_key() {
        let current = json!({"ports": [{"port": 80}]});
        let desired = json!({"ports": [{"port": 443}]});
        let options = DiffOptions::new().list_key("/ports", "port");

        let d = diff(&current, &desired, &options).unwrap();
        assert_eq!(d.get("/ports[443]").map(|e| e.state), Some(DiffState::Added));
        assert_eq!(d.get("/ports[80]").map(|e| e.state), Some(DiffState::Removed));
    }

    /// Given a keyed list holding one element keyed `1` and two elements
    ///   sharing a key, so they fall back to matching by value
    /// When the keyed element and the second pooled element both change
    /// Then each change keeps its own path
    #[test]
    fn natural_keys_do_not_collide_with_pool_positions() {
        let current = json!({"ports": [
            {"port": 1, "protocol": "tcp"},
            {"port": 7, "protocol": "tcp"},
            {"port": 7, "protocol": "udp"},
        ]});
        let desired = json!({"ports": [
            {"port": 1, "protocol": "udp"},
            {"port": 7, "protocol": "tcp"},
            {"port": 7, "protocol": "sctp"},
        ]});
        let options = DiffOptions::new().list_key("/ports", "port");

        let d = diff(&current, &desired, &options).unwrap();

        assert_eq!(d.paths(), vec!["/ports[#2]", "/ports[1]/protocol"]);
        assert_eq!(d.get("/ports[#2]").map(|e| e.state), Some(DiffState::Changed));
        assert_eq!(
            d.get("/ports[1]/protocol").and_then(|e| e.working.clone()),
            Some(json!("udp"))
        );
    }

    #[test]
    fn mismatched_roots_are_a_caller_error() {
        let err = diff(&json!({}), &json!([]), &DiffOptions::new()).unwrap_err();
        assert!(matches!(err, DiffError::TypeMismatch { .. }));
    }

    #[test]
    fn nested_shape_change_is_reported_as_changed() {
        let current = json!({"capacity": 3});
        let desired = json!({"capacity": {"min": 1}});

        let d = diff(&current, &desired, &DiffOptions::new()).unwrap();
        assert_eq!(d.get("/capacity").map(|e| e.state), Some(DiffState::Changed));
    }

    #[test]
    fn absent_current_reports_every_field_added() {
        let d = diff_against_absent(&cluster(), &DiffOptions::new().ignore("id"));
        assert!(d.iter().all(|(_, e)| e.state == DiffState::Added));
        assert_eq!(d.paths(), vec!["/capacity", "/moniker", "/ports", "/tags"]);
    }

    #[test]
    fn absent_scalar_is_added_at_root() {
        let d = diff_against_absent(&json!("v1.2.3"), &DiffOptions::new());
        assert_eq!(d.get("/").map(|e| e.state), Some(DiffState::Added));
    }

    #[test]
    fn diff_structs_compares_typed_values() {
        #[derive(Serialize)]
        struct Capacity {
            min: u32,
            max: u32,
        }

        let d = diff_structs(
            &Capacity { min: 1, max: 2 },
            &Capacity { min: 1, max: 4 },
            &DiffOptions::new(),
        )
        .unwrap();
        assert_eq!(d.paths(), vec!["/max"]);
    }

    #[test]
    fn output_order_is_stable() {
        let current = json!({"z": 1, "a": 1, "m": 1});
        let desired = json!({"z": 2, "a": 2, "m": 2});

        let first = diff(&current, &desired, &DiffOptions::new()).unwrap();
        let second = diff(&current, &desired, &DiffOptions::new()).unwrap();
        assert_eq!(first.paths(), vec!["/a", "/m", "/z"]);
        assert_eq!(first, second);
    }
}
