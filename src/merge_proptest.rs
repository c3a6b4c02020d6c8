//! Property-based tests for deep merge and class resolution.
//!
//! Generated payloads keep a fixed type per key (`n` is a number, `s` a
//! sequence, `t` a string, `child` a nested payload) with nulls allowed
//! anywhere, which is the shape real class payloads have.

#[cfg(test)]
mod proptest_tests {
    use std::collections::BTreeMap;

    use crate::classes::{resolve_classes, ClassDefinition, ClassResolver, ResourceKind};
    use crate::merge::{merge, merge_mappings};
    use proptest::option;
    use proptest::prelude::*;
    use serde_yaml::{Mapping, Value as YamlValue};

    fn number() -> impl Strategy<Value = YamlValue> {
        prop_oneof![Just(YamlValue::Null), (-50i64..50).prop_map(YamlValue::from)]
    }

    fn list() -> impl Strategy<Value = YamlValue> {
        prop_oneof![
            Just(YamlValue::Null),
            proptest::collection::vec(0u64..10, 0..3)
                .prop_map(|v| YamlValue::Sequence(v.into_iter().map(YamlValue::from).collect()))
        ]
    }

    fn text() -> impl Strategy<Value = YamlValue> {
        prop_oneof![Just(YamlValue::Null), "[a-z]{1,4}".prop_map(YamlValue::from)]
    }

    fn payload(depth: u32) -> BoxedStrategy<YamlValue> {
        let child = if depth == 0 {
            Just(YamlValue::Null).boxed()
        } else {
            prop_oneof![Just(YamlValue::Null), payload(depth - 1)].boxed()
        };
        (
            option::of(number()),
            option::of(list()),
            option::of(text()),
            option::of(child),
        )
            .prop_map(|(n, s, t, child)| {
                let mut map = Mapping::new();
                for (key, value) in [("n", n), ("s", s), ("t", t), ("child", child)] {
                    if let Some(value) = value {
                        map.insert(YamlValue::from(key), value);
                    }
                }
                YamlValue::Mapping(map)
            })
            .boxed()
    }

    fn as_mapping(value: &YamlValue) -> Mapping {
        value.as_mapping().cloned().unwrap_or_default()
    }

    // ============================================================================
    // merge properties
    // ============================================================================

    proptest! {
        /// Property: merging along a chain does not depend on grouping
        #[test]
        fn merge_is_associative(a in payload(2), b in payload(2), c in payload(2)) {
            let left = merge(&merge(&a, &b), &c);
            let right = merge(&a, &merge(&b, &c));
            prop_assert_eq!(left, right);
        }

        /// Property: merge is a pure function of its inputs
        #[test]
        fn merge_is_deterministic(a in payload(2), b in payload(2)) {
            let a_before = a.clone();
            let b_before = b.clone();
            prop_assert_eq!(merge(&a, &b), merge(&a, &b));
            prop_assert_eq!(a, a_before);
            prop_assert_eq!(b, b_before);
        }

        /// Property: null is an identity on both sides
        #[test]
        fn merge_null_identity(a in payload(2)) {
            prop_assert_eq!(merge(&a, &YamlValue::Null), a.clone());
            prop_assert_eq!(merge(&YamlValue::Null, &a), a);
        }

        /// Property: merging a value onto itself changes nothing
        #[test]
        fn merge_is_idempotent(a in payload(2)) {
            prop_assert_eq!(merge(&a, &a), a);
        }

        /// Property: a sentinel always removes the key, whatever was inherited
        #[test]
        fn sentinel_removes_key(a in payload(2)) {
            let overlay: YamlValue = serde_yaml::from_str("child: {delete: true}").unwrap();
            let merged = merge(&a, &overlay);
            prop_assert!(merged.get("child").is_none());
            prop_assert_eq!(merged.get("n"), a.get("n"));
        }
    }

    // ============================================================================
    // resolution properties
    // ============================================================================

    proptest! {
        /// Property: a resolved class equals its resolved parent with its own
        /// payload merged on top
        #[test]
        fn resolution_folds_chain(payloads in proptest::collection::vec(payload(1), 1..6)) {
            let mut classes = BTreeMap::new();
            for (i, p) in payloads.iter().enumerate() {
                let mut class = ClassDefinition::new(format!("c{}", i))
                    .pure()
                    .with_payload(as_mapping(p));
                if i > 0 {
                    class = class.with_parent(format!("c{}", i - 1));
                }
                classes.insert(format!("c{}", i), class);
            }

            let resolved = resolve_classes(ResourceKind::BladeInterconnect, &classes).unwrap();
            prop_assert_eq!(resolved.len(), payloads.len());

            let mut expected = Mapping::new();
            for (i, p) in payloads.iter().enumerate() {
                expected = merge_mappings(&expected, &as_mapping(p), "");
                let name = format!("c{}", i);
                prop_assert_eq!(&resolved[&name].payload, &expected);
            }
        }

        /// Property: memoization never changes the result
        #[test]
        fn memoized_resolution_matches_fresh(payloads in proptest::collection::vec(payload(1), 2..6)) {
            let mut classes = BTreeMap::new();
            for (i, p) in payloads.iter().enumerate() {
                let mut class = ClassDefinition::new(format!("c{}", i))
                    .pure()
                    .with_payload(as_mapping(p));
                if i > 0 {
                    class = class.with_parent(format!("c{}", i - 1));
                }
                classes.insert(format!("c{}", i), class);
            }
            let leaf = format!("c{}", payloads.len() - 1);

            let mut warm = ClassResolver::new(ResourceKind::BladeInterconnect, &classes);
            for i in 0..payloads.len() {
                warm.resolve(&format!("c{}", i)).unwrap();
            }
            let warm_leaf = warm.resolve(&leaf).unwrap();

            let mut cold = ClassResolver::new(ResourceKind::BladeInterconnect, &classes);
            let cold_leaf = cold.resolve(&leaf).unwrap();

            prop_assert_eq!(warm_leaf, cold_leaf);
            prop_assert_eq!(cold.merge_count(), payloads.len());
        }

        /// Property: any parent cycle is reported, naming a class on the cycle
        #[test]
        fn cycles_are_always_detected(len in 1usize..6) {
            let mut classes = BTreeMap::new();
            for i in 0..len {
                classes.insert(
                    format!("c{}", i),
                    ClassDefinition::new(format!("c{}", i)).with_parent(format!("c{}", (i + 1) % len)),
                );
            }
            let err = resolve_classes(ResourceKind::BladeInterconnect, &classes).unwrap_err();
            match err {
                crate::error::Error::CyclicInheritance { class, .. } => {
                    prop_assert!(classes.contains_key(&class));
                }
                other => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }
}
