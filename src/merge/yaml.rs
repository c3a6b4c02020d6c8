//! YAML deep merge
//!
//! Merges two `serde_yaml::Value` trees, the second operand (the overlay)
//! taking precedence:
//!
//! - a null on either side yields the other side
//! - two mappings merge key by key, recursing on shared keys
//! - sequences are atomic: the overlay replaces the base wholesale
//! - on a type mismatch the overlay wins entirely (logged at `warn`)
//!
//! An overlay entry that is a deletion sentinel removes the key from the
//! result. The sentinel is either a mapping whose `delete` field is the
//! boolean `true` or a value tagged `!delete`. Merging never mutates its
//! inputs; the outcome for each entry is an explicit [`Merged`] value rather
//! than a marker left behind in the data.
//!
//! ## Example
//!
//! ```
//! use blade_provider::merge::merge;
//!
//! let base: serde_yaml::Value =
//!     serde_yaml::from_str("rules:\n  ssh: {port: 22}\n  web: {port: 80}").unwrap();
//! let overlay: serde_yaml::Value =
//!     serde_yaml::from_str("rules:\n  ssh: {delete: true}").unwrap();
//!
//! let merged = merge(&base, &overlay);
//! assert!(merged["rules"].get("ssh").is_none());
//! assert_eq!(merged["rules"]["web"]["port"], serde_yaml::Value::from(80));
//! ```

use log::{trace, warn};
use serde_yaml::{Mapping, Value as YamlValue};

use super::PathSegment;

/// Tag that marks a value as a deletion sentinel (`rule_x: !delete`).
pub const DELETE_TAG: &str = "delete";

/// Field that marks a mapping as a deletion sentinel (`rule_x: {delete: true}`).
pub const DELETE_FIELD: &str = "delete";

/// The outcome of merging one entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Merged {
    /// The entry survives with this value.
    Keep(YamlValue),
    /// The entry must be left out of the enclosing mapping.
    Omit,
}

impl Merged {
    /// Convert into a plain value, `Omit` becoming null.
    pub fn into_value(self) -> YamlValue {
        match self {
            Merged::Keep(value) => value,
            Merged::Omit => YamlValue::Null,
        }
    }
}

/// Whether an overlay value asks for the corresponding key to be removed.
pub fn is_delete_sentinel(value: &YamlValue) -> bool {
    match value {
        YamlValue::Tagged(tagged) => tagged.tag == DELETE_TAG,
        YamlValue::Mapping(map) => matches!(map.get(DELETE_FIELD), Some(YamlValue::Bool(true))),
        _ => false,
    }
}

/// Merge `overlay` onto `base`, returning a new value.
///
/// A top-level sentinel merges to null.
pub fn merge(base: &YamlValue, overlay: &YamlValue) -> YamlValue {
    merge_values(base, overlay, "").into_value()
}

/// Merge `overlay` onto `base` at `path` (used for log messages only).
pub fn merge_values(base: &YamlValue, overlay: &YamlValue, path: &str) -> Merged {
    if is_delete_sentinel(overlay) {
        trace!("Deleting entry at path '{}'", path);
        return Merged::Omit;
    }

    match (base, overlay) {
        (_, YamlValue::Null) => Merged::Keep(base.clone()),
        (YamlValue::Mapping(base_map), YamlValue::Mapping(overlay_map)) => {
            Merged::Keep(YamlValue::Mapping(merge_mappings(base_map, overlay_map, path)))
        }
        (YamlValue::Null, _) => Merged::Keep(fresh(overlay, path)),
        (YamlValue::Sequence(_), YamlValue::Sequence(_)) => Merged::Keep(overlay.clone()),
        (YamlValue::Mapping(_), _) | (YamlValue::Sequence(_), _) | (_, YamlValue::Mapping(_))
        | (_, YamlValue::Sequence(_)) => {
            warn!(
                "Type mismatch at path '{}': replacing {} with {}",
                path,
                get_yaml_type_name(base),
                get_yaml_type_name(overlay)
            );
            Merged::Keep(fresh(overlay, path))
        }
        _ => Merged::Keep(overlay.clone()),
    }
}

/// An overlay value that has nothing underneath it. Nested sentinels are
/// still honored, so merging onto an empty mapping strips them.
fn fresh(overlay: &YamlValue, path: &str) -> YamlValue {
    match overlay {
        YamlValue::Mapping(map) => YamlValue::Mapping(merge_mappings(&Mapping::new(), map, path)),
        other => other.clone(),
    }
}

/// Merge two mappings entry by entry.
///
/// Unlike [`merge_values`], the overlay mapping itself is never treated as a
/// sentinel; only its entries are.
pub fn merge_mappings(base: &Mapping, overlay: &Mapping, path: &str) -> Mapping {
    let mut merged = Mapping::new();

    for (key, value) in base {
        match overlay.get(key) {
            Some(over) => {
                if let Merged::Keep(v) = merge_values(value, over, &child_path(path, key)) {
                    merged.insert(key.clone(), v);
                }
            }
            None => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    for (key, value) in overlay {
        if base.contains_key(key) {
            continue;
        }
        if let Merged::Keep(v) = merge_values(&YamlValue::Null, value, &child_path(path, key)) {
            merged.insert(key.clone(), v);
        }
    }

    merged
}

fn child_path(path: &str, key: &YamlValue) -> String {
    let key_str = match key {
        YamlValue::String(s) => s.clone(),
        other => format!("{:?}", other),
    };
    if path.is_empty() {
        key_str
    } else {
        format!("{}.{}", path, key_str)
    }
}

/// Navigate to a path within a YAML value without modifying it.
///
/// Returns `None` when any segment is missing or addresses the wrong kind of
/// value.
pub fn lookup<'a>(value: &'a YamlValue, path: &[PathSegment]) -> Option<&'a YamlValue> {
    path.iter().try_fold(value, |current, segment| match segment {
        PathSegment::Key(key) => current.as_mapping()?.get(key.as_str()),
        PathSegment::Index(idx) => current.as_sequence()?.get(*idx),
    })
}

/// [`lookup`] starting from a mapping.
pub fn lookup_in<'a>(mapping: &'a Mapping, path: &[PathSegment]) -> Option<&'a YamlValue> {
    let (first, rest) = path.split_first()?;
    let PathSegment::Key(key) = first else {
        return None;
    };
    lookup(mapping.get(key.as_str())?, rest)
}

/// Get a human-readable type name for a YAML value
///
/// Used for logging and error messages to describe the type of a value.
pub fn get_yaml_type_name(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "Null",
        YamlValue::Bool(_) => "Bool",
        YamlValue::Number(_) => "Number",
        YamlValue::String(_) => "String",
        YamlValue::Sequence(_) => "Sequence",
        YamlValue::Mapping(_) => "Mapping",
        YamlValue::Tagged(_) => "Tagged",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::parse_path;

    fn yaml(s: &str) -> YamlValue {
        serde_yaml::from_str(s).unwrap()
    }

    mod merge_rules {
        use super::*;

        #[test]
        fn test_null_sides() {
            let value = yaml("a: 1");
            assert_eq!(merge(&YamlValue::Null, &value), value);
            assert_eq!(merge(&value, &YamlValue::Null), value);
            assert_eq!(merge(&YamlValue::Null, &YamlValue::Null), YamlValue::Null);
        }

        #[test]
        fn test_mappings_merge_key_by_key() {
            let base = yaml("keep: 1\nshared:\n  x: 1\n  y: 2");
            let overlay = yaml("added: 3\nshared:\n  y: 20\n  z: 30");
            let merged = merge(&base, &overlay);
            assert_eq!(merged, yaml("keep: 1\nshared:\n  x: 1\n  y: 20\n  z: 30\nadded: 3"));
        }

        #[test]
        fn test_null_overlay_entry_keeps_base() {
            let merged = merge(&yaml("zone: us-central1-a"), &yaml("zone: null"));
            assert_eq!(merged["zone"], YamlValue::from("us-central1-a"));
        }

        #[test]
        fn test_sequences_replace_wholesale() {
            let merged = merge(&yaml("ip_addrs: [a, b, c]"), &yaml("ip_addrs: [x]"));
            assert_eq!(merged["ip_addrs"], yaml("[x]"));
        }

        #[test]
        fn test_type_mismatch_overlay_wins() {
            let merged = merge(&yaml("disk: {size: 10}"), &yaml("disk: 20"));
            assert_eq!(merged["disk"], YamlValue::from(20));

            let merged = merge(&yaml("disk: 20"), &yaml("disk: {size: 10}"));
            assert_eq!(merged["disk"]["size"], YamlValue::from(10));
        }

        #[test]
        fn test_type_mismatch_is_logged() {
            testing_logger::setup();
            merge(&yaml("disk: {size: 10}"), &yaml("disk: [1]"));
            testing_logger::validate(|captured| {
                assert!(captured
                    .iter()
                    .any(|entry| entry.level == log::Level::Warn
                        && entry.body.contains("Type mismatch at path 'disk'")));
            });
        }

        #[test]
        fn test_merge_does_not_mutate_inputs() {
            let base = yaml("a: {b: 1}");
            let overlay = yaml("a: {c: 2}");
            let base_before = base.clone();
            let overlay_before = overlay.clone();
            let _ = merge(&base, &overlay);
            assert_eq!(base, base_before);
            assert_eq!(overlay, overlay_before);
        }
    }

    mod sentinel {
        use super::*;

        #[test]
        fn test_delete_field_sentinel_removes_key() {
            let base = yaml("rules:\n  rule_x: {port: 22}\n  rule_y: {port: 80}");
            let overlay = yaml("rules:\n  rule_x: {delete: true}");
            let merged = merge(&base, &overlay);
            assert!(merged["rules"].get("rule_x").is_none());
            assert!(merged["rules"].get("rule_y").is_some());
        }

        #[test]
        fn test_delete_tag_sentinel_removes_key() {
            let merged = merge(&yaml("rules:\n  rule_x: {port: 22}"), &yaml("rules:\n  rule_x: !delete"));
            assert!(merged["rules"].as_mapping().unwrap().is_empty());
        }

        #[test]
        fn test_sentinel_without_base_entry_is_dropped() {
            let merged = merge(&yaml("rules: {}"), &yaml("rules:\n  ghost: {delete: true}"));
            assert!(merged["rules"].get("ghost").is_none());

            let merged = merge(&YamlValue::Null, &yaml("rules:\n  ghost: {delete: true}"));
            assert!(merged["rules"].get("ghost").is_none());
        }

        #[test]
        fn test_delete_false_is_ordinary_data() {
            let merged = merge(&yaml("job: {delete: false}"), &yaml("job: {delete: false, keep: 1}"));
            assert_eq!(merged["job"]["delete"], YamlValue::Bool(false));
            assert_eq!(merged["job"]["keep"], YamlValue::from(1));
        }

        #[test]
        fn test_merge_values_reports_omit() {
            assert_eq!(
                merge_values(&yaml("{port: 22}"), &yaml("{delete: true}"), "rule"),
                Merged::Omit
            );
        }
    }

    mod lookup_tests {
        use super::*;

        #[test]
        fn test_lookup_nested_key_and_index() {
            let value = yaml("blade_interconnect:\n  ip_addrs: [10.0.0.1, 10.0.0.2]");
            let found = lookup(&value, &parse_path("blade_interconnect.ip_addrs[1]"));
            assert_eq!(found, Some(&YamlValue::from("10.0.0.2")));
        }

        #[test]
        fn test_lookup_missing_or_wrong_type() {
            let value = yaml("count: 3");
            assert!(lookup(&value, &parse_path("count.x")).is_none());
            assert!(lookup(&value, &parse_path("hostname")).is_none());
            assert!(lookup(&value, &parse_path("count[0]")).is_none());
        }

        #[test]
        fn test_lookup_empty_path_is_root() {
            let value = yaml("a: 1");
            assert_eq!(lookup(&value, &[]), Some(&value));
        }
    }

    #[test]
    fn test_get_yaml_type_name_all_types() {
        assert_eq!(get_yaml_type_name(&YamlValue::Null), "Null");
        assert_eq!(get_yaml_type_name(&YamlValue::Bool(true)), "Bool");
        assert_eq!(get_yaml_type_name(&YamlValue::Number(42.into())), "Number");
        assert_eq!(get_yaml_type_name(&YamlValue::Sequence(vec![])), "Sequence");
        assert_eq!(get_yaml_type_name(&YamlValue::Mapping(Default::default())), "Mapping");
    }
}
