//! Integration tests for configuration resolution.
//!
//! These tests drive the public library API from a whole configuration
//! document through class resolution and instantiation.

use blade_provider::classes::{resolve_classes, ClassDefinition, ResourceKind};
use blade_provider::config::{apply_overlays, parse_document, ProviderConfig};
use blade_provider::error::{Error, ErrorKind};
use serde_yaml::Value as YamlValue;

fn resolve(text: &str) -> Result<ProviderConfig, Error> {
    ProviderConfig::resolve(&parse_document(text)?)
}

const CHAIN: &str = r#"
organization: {name: acme}
project: {base_name: lab}
blade_interconnects:
  net: {network_name: cluster, ipv4_cidr: 10.0.0.0/24}
virtual_blades:
  root:
    pure_base_class: true
    machine_type: n1-standard-4
    hostname: node
    count: 1
    blade_interconnect:
      subnetwork: cluster
      ip_addrs: [10.0.0.2, 10.0.0.3, 10.0.0.4]
  child:
    parent_class: root
    count: 3
"#;

#[test]
fn test_two_level_chain_end_to_end() {
    let config = resolve(CHAIN).unwrap();
    let child = &config.classes(ResourceKind::VirtualBlade)["child"];
    assert_eq!(child.str_field("machine_type").unwrap(), "n1-standard-4");
    assert_eq!(child.get("count"), Some(&YamlValue::from(3)));
    assert_eq!(child.ancestry, vec!["root", "child"]);

    let blades = config.blades();
    assert_eq!(blades.len(), 3);
    for (index, blade) in blades.iter().enumerate() {
        assert_eq!(blade.class, "child");
        assert_eq!(blade.index, index);
        assert_eq!(blade.fields, blades[0].fields);
    }
    let addresses: Vec<_> = blades.iter().filter_map(|b| b.address.as_deref()).collect();
    assert_eq!(addresses, vec!["10.0.0.2", "10.0.0.3", "10.0.0.4"]);
}

#[test]
fn test_instance_listing() {
    let config = resolve(CHAIN).unwrap();
    let listing = config
        .blades()
        .iter()
        .map(|b| {
            format!(
                "{} {} {} {}",
                b.class,
                b.name,
                b.hostname,
                b.address.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    insta::assert_snapshot!(listing, @r"
    child node-1 node-1 10.0.0.2
    child node-2 node-2 10.0.0.3
    child node-3 node-3 10.0.0.4
    ");
}

#[test]
fn test_resolution_is_idempotent() {
    let document = parse_document(CHAIN).unwrap();
    let first = ProviderConfig::resolve(&document).unwrap();
    let second = ProviderConfig::resolve(&document).unwrap();
    assert_eq!(
        first.classes(ResourceKind::VirtualBlade),
        second.classes(ResourceKind::VirtualBlade)
    );
    assert_eq!(first.blades(), second.blades());
    assert_eq!(
        serde_yaml::to_string(first.document()).unwrap(),
        serde_yaml::to_string(second.document()).unwrap()
    );
}

#[test]
fn test_independent_resolutions_coexist() {
    let small = resolve(CHAIN).unwrap();
    let document = apply_overlays(
        parse_document(CHAIN).unwrap(),
        [&parse_document("virtual_blades:\n  child:\n    count: 2\n").unwrap()],
    );
    let smaller = ProviderConfig::resolve(&document).unwrap();
    assert_eq!(small.blades().len(), 3);
    assert_eq!(smaller.blades().len(), 2);
}

#[test]
fn test_keyed_entry_deleted_in_derived_class_only() {
    let config = resolve(
        r#"
organization: {name: acme}
project: {base_name: lab}
blade_interconnects:
  base:
    network_name: base-net
    ipv4_cidr: 10.0.0.0/24
    firewall_rules:
      - {name: rule_x, ports: [22]}
      - {name: rule_y, ports: [443]}
  derived:
    parent_class: base
    network_name: derived-net
    firewall_rules:
      rule_x: {delete: true}
"#,
    )
    .unwrap();

    let classes = config.classes(ResourceKind::BladeInterconnect);
    assert!(classes["base"].get("firewall_rules.rule_x").is_some());
    assert!(classes["derived"].get("firewall_rules.rule_x").is_none());
    assert!(classes["derived"].get("firewall_rules.rule_y").is_some());
}

#[test]
fn test_pool_exhaustion_and_exact_fit() {
    let failing = CHAIN.replace("count: 3", "count: 5");
    let err = resolve(&failing).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourcePool);
    assert!(matches!(
        err,
        Error::InsufficientAddressPool {
            count: 5,
            available: 3,
            ..
        }
    ));

    let config = resolve(CHAIN).unwrap();
    assert_eq!(config.blade_ip("child", 2, "cluster").unwrap(), Some("10.0.0.4"));
}

#[test]
fn test_naming_conventions() {
    let config = resolve(
        r#"
organization: {name: acme}
project: {base_name: lab}
blade_interconnects:
  net: {network_name: cluster, ipv4_cidr: 10.0.0.0/24}
virtual_blades:
  suffixed:
    name_prefix: blade
    hostname: node
    add_hostname_suffix: true
    count: 2
    machine_type: e2-small
    blade_interconnect: {subnetwork: cluster}
  single:
    hostname: solo
    add_hostname_suffix: false
    count: 1
    machine_type: e2-small
    blade_interconnect: {subnetwork: cluster}
"#,
    )
    .unwrap();
    let names: Vec<&str> = config.blades().iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["solo", "blade-1", "blade-2"]);
}

#[test]
fn test_every_class_resolves_once() {
    let classes: std::collections::BTreeMap<_, _> = (0..20)
        .map(|i| {
            let mut class = ClassDefinition::new(format!("c{:02}", i)).pure();
            if i > 0 {
                class = class.with_parent(format!("c{:02}", (i - 1) / 2));
            }
            (format!("c{:02}", i), class)
        })
        .collect();
    let resolved = resolve_classes(ResourceKind::VirtualBlade, &classes).unwrap();
    assert_eq!(resolved.len(), classes.len());
    assert_eq!(resolved["c19"].ancestry, vec!["c00", "c01", "c04", "c09", "c19"]);
}

#[test]
fn test_cycle_names_class_on_cycle() {
    let err = resolve(
        r#"
organization: {name: acme}
project: {base_name: lab}
virtual_blades:
  leaf: {parent_class: a}
  a: {parent_class: b}
  b: {parent_class: a}
"#,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    match err {
        Error::CyclicInheritance { class, .. } => assert!(class == "a" || class == "b"),
        other => panic!("expected a cycle, got {}", other),
    }
}

#[test]
fn test_unknown_subnetwork() {
    let err = resolve(&CHAIN.replace("subnetwork: cluster", "subnetwork: elsewhere")).unwrap_err();
    assert!(err.to_string().contains("elsewhere"));
}
