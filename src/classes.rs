//! # Class Resolution
//!
//! Virtual blades and blade interconnects are declared as named classes. A
//! class may name a `parent_class` and may be flagged `pure_base_class`,
//! meaning it only exists to be inherited from. Resolution flattens every
//! class's ancestry into one self-contained payload.
//!
//! ## Algorithm
//!
//! 1.  **Ancestry walk**: follow `parent_class` links iteratively from the
//!     class to its root, failing on a revisited class (cycle) or a parent
//!     that does not exist.
//! 2.  **Fold**: merge the payloads root first, each class overriding its
//!     ancestors, the class's own payload applied last. Every intermediate
//!     result is memoized, so classes sharing a prefix of their ancestry reuse
//!     it and a chain of depth D costs O(D) merges overall.
//! 3.  **Validation**: classes that will be instantiated must carry every
//!     field their [`ResourceKind`] requires, non-null and non-empty.
//!
//! `pure_base_class` is never inherited: each class's own flag decides
//! whether it is instantiated. Resolved payloads keep neither
//! `parent_class` nor `pure_base_class`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use log::debug;
use serde::Serialize;
use serde_yaml::{Mapping, Value as YamlValue};

use crate::error::{Error, Result};
use crate::merge::{keyed, lookup_in, merge_mappings, parse_path};

/// Field naming a class's parent.
pub const PARENT_CLASS: &str = "parent_class";

/// Field marking a class as inheritance-only.
pub const PURE_BASE_CLASS: &str = "pure_base_class";

/// The kinds of resource a class can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A class of compute instances.
    VirtualBlade,
    /// A class of networks.
    BladeInterconnect,
}

impl ResourceKind {
    /// Top-level configuration section holding classes of this kind.
    pub fn section(self) -> &'static str {
        match self {
            ResourceKind::VirtualBlade => "virtual_blades",
            ResourceKind::BladeInterconnect => "blade_interconnects",
        }
    }

    /// Fields that must be present and non-empty after resolution.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            ResourceKind::VirtualBlade => &[
                "count",
                "hostname",
                "machine_type",
                "blade_interconnect.subnetwork",
            ],
            ResourceKind::BladeInterconnect => &["network_name", "ipv4_cidr"],
        }
    }

    /// List fields re-keyed into mappings before inheritance, with the item
    /// field used as key.
    pub fn keyed_sequences(self) -> &'static [(&'static str, &'static str)] {
        match self {
            ResourceKind::VirtualBlade => &[],
            ResourceKind::BladeInterconnect => &[("firewall_rules", "name")],
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::VirtualBlade => write!(f, "virtual blade class"),
            ResourceKind::BladeInterconnect => write!(f, "blade interconnect class"),
        }
    }
}

/// A named node in an inheritance tree, as declared in configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDefinition {
    pub name: String,
    pub parent_class: Option<String>,
    pub pure_base_class: bool,
    /// Every other field of the class.
    pub payload: Mapping,
}

impl ClassDefinition {
    /// Create a root class with an empty payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_class: None,
            pure_base_class: false,
            payload: Mapping::new(),
        }
    }

    /// Set the parent class.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_class = Some(parent.into());
        self
    }

    /// Mark the class as a pure base class.
    pub fn pure(mut self) -> Self {
        self.pure_base_class = true;
        self
    }

    /// Replace the payload.
    pub fn with_payload(mut self, payload: Mapping) -> Self {
        self.payload = payload;
        self
    }

    /// Build a definition from its configuration value.
    pub fn from_value(kind: ResourceKind, name: &str, value: &YamlValue) -> Result<Self> {
        let mut payload = match value {
            YamlValue::Mapping(map) => map.clone(),
            YamlValue::Null => Mapping::new(),
            _ => {
                return Err(Error::ConfigParse {
                    message: format!("{} '{}' must be a mapping", kind, name),
                    hint: None,
                })
            }
        };

        let parent_class = match payload.remove(PARENT_CLASS) {
            None | Some(YamlValue::Null) => None,
            Some(YamlValue::String(parent)) => Some(parent),
            Some(_) => {
                return Err(Error::InvalidField {
                    class: name.to_string(),
                    field: PARENT_CLASS.to_string(),
                    message: "must be a class name".to_string(),
                })
            }
        };

        let pure_base_class = match payload.remove(PURE_BASE_CLASS) {
            None | Some(YamlValue::Null) => false,
            Some(YamlValue::Bool(flag)) => flag,
            Some(_) => {
                return Err(Error::InvalidField {
                    class: name.to_string(),
                    field: PURE_BASE_CLASS.to_string(),
                    message: "must be a boolean".to_string(),
                })
            }
        };

        for (field, key_field) in kind.keyed_sequences() {
            keyed::rekey_in_place(name, &mut payload, &parse_path(field), key_field)?;
        }

        Ok(Self {
            name: name.to_string(),
            parent_class,
            pure_base_class,
            payload,
        })
    }
}

/// Parse a configuration section into class definitions keyed by name.
pub fn parse_classes(
    kind: ResourceKind,
    section: &YamlValue,
) -> Result<BTreeMap<String, ClassDefinition>> {
    let map = section.as_mapping().ok_or_else(|| Error::ConfigParse {
        message: format!("'{}' must be a mapping of class names to classes", kind.section()),
        hint: None,
    })?;

    map.iter()
        .map(|(key, value)| {
            let name = key.as_str().ok_or_else(|| Error::ConfigParse {
                message: format!("class names in '{}' must be strings", kind.section()),
                hint: None,
            })?;
            Ok((name.to_string(), ClassDefinition::from_value(kind, name, value)?))
        })
        .collect()
}

/// A class with its whole ancestry merged in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedClass {
    pub name: String,
    pub kind: ResourceKind,
    /// The class's own flag; never inherited.
    pub pure_base_class: bool,
    /// Class names from the root down to this class.
    pub ancestry: Vec<String>,
    pub payload: Mapping,
}

impl ResolvedClass {
    /// Whether this class is expanded into resources.
    pub fn is_instantiable(&self) -> bool {
        !self.pure_base_class
    }

    /// Look up a dotted field path in the payload.
    pub fn get(&self, path: &str) -> Option<&YamlValue> {
        lookup_in(&self.payload, &parse_path(path))
    }

    /// A required string field.
    pub fn str_field(&self, path: &str) -> Result<&str> {
        match self.get(path) {
            None | Some(YamlValue::Null) => Err(Error::MissingRequiredField {
                class: self.name.clone(),
                field: path.to_string(),
            }),
            Some(value) => value.as_str().ok_or_else(|| Error::InvalidField {
                class: self.name.clone(),
                field: path.to_string(),
                message: "must be a string".to_string(),
            }),
        }
    }

    /// An optional boolean field.
    pub fn bool_field(&self, path: &str) -> Result<Option<bool>> {
        match self.get(path) {
            None | Some(YamlValue::Null) => Ok(None),
            Some(YamlValue::Bool(flag)) => Ok(Some(*flag)),
            Some(_) => Err(Error::InvalidField {
                class: self.name.clone(),
                field: path.to_string(),
                message: "must be a boolean".to_string(),
            }),
        }
    }

    /// The resolved class as it appears in a resolved configuration document.
    pub fn to_document_value(&self) -> YamlValue {
        let mut map = self.payload.clone();
        map.insert(
            YamlValue::from(PURE_BASE_CLASS),
            YamlValue::Bool(self.pure_base_class),
        );
        YamlValue::Mapping(map)
    }
}

/// Resolve every class of one kind.
///
/// Returns one [`ResolvedClass`] per input class, pure base classes included
/// (flagged). Any failure aborts the whole resolution; classes are resolved
/// in name order so the reported error is deterministic.
pub fn resolve_classes(
    kind: ResourceKind,
    classes: &BTreeMap<String, ClassDefinition>,
) -> Result<BTreeMap<String, ResolvedClass>> {
    let mut resolver = ClassResolver::new(kind, classes);
    classes
        .keys()
        .map(|name| Ok((name.clone(), resolver.resolve(name)?)))
        .collect()
}

/// Memoizing resolver over one set of class definitions.
pub struct ClassResolver<'a> {
    kind: ResourceKind,
    classes: &'a BTreeMap<String, ClassDefinition>,
    memo: HashMap<&'a str, Mapping>,
    merges: usize,
}

impl<'a> ClassResolver<'a> {
    pub fn new(kind: ResourceKind, classes: &'a BTreeMap<String, ClassDefinition>) -> Self {
        Self {
            kind,
            classes,
            memo: HashMap::new(),
            merges: 0,
        }
    }

    /// Number of merge steps performed so far.
    pub fn merge_count(&self) -> usize {
        self.merges
    }

    /// The chain of class names from `name` up to its root, leaf first.
    pub fn ancestry(&self, name: &str) -> Result<Vec<&'a str>> {
        let (mut current, _) =
            self.classes
                .get_key_value(name)
                .ok_or_else(|| Error::UnknownClass {
                    kind: self.kind.to_string(),
                    class: name.to_string(),
                })?;

        let mut chain: Vec<&'a str> = Vec::new();
        let mut seen: HashSet<&'a str> = HashSet::new();
        loop {
            if !seen.insert(current.as_str()) {
                let start = chain.iter().position(|c| *c == current.as_str()).unwrap_or(0);
                let mut cycle: Vec<&str> = chain[start..].to_vec();
                cycle.push(current.as_str());
                return Err(Error::CyclicInheritance {
                    class: current.clone(),
                    cycle: cycle.join(" -> "),
                });
            }
            chain.push(current.as_str());

            let Some(parent) = &self.classes[current].parent_class else {
                break;
            };
            current = match self.classes.get_key_value(parent) {
                Some((key, _)) => key,
                None => {
                    return Err(Error::UnknownParent {
                        class: current.clone(),
                        parent: parent.clone(),
                    })
                }
            };
        }
        Ok(chain)
    }

    /// Resolve one class.
    pub fn resolve(&mut self, name: &str) -> Result<ResolvedClass> {
        let chain = self.ancestry(name)?;

        let cached = chain.iter().position(|class| self.memo.contains_key(class));
        let (mut merged, pending) = match cached {
            Some(idx) => (self.memo[chain[idx]].clone(), &chain[..idx]),
            None => (Mapping::new(), &chain[..]),
        };

        for class in pending.iter().rev() {
            merged = merge_mappings(&merged, &self.classes[*class].payload, class);
            self.merges += 1;
            self.memo.insert(*class, merged.clone());
        }

        let definition = &self.classes[chain[0]];
        let resolved = ResolvedClass {
            name: definition.name.clone(),
            kind: self.kind,
            pure_base_class: definition.pure_base_class,
            ancestry: chain.iter().rev().map(|c| c.to_string()).collect(),
            payload: merged,
        };
        debug!(
            "Resolved {} '{}' through {}",
            self.kind,
            resolved.name,
            resolved.ancestry.join(" -> ")
        );

        if resolved.is_instantiable() {
            validate_required(&resolved)?;
        }
        Ok(resolved)
    }
}

/// Check the mandatory fields of an instantiable class.
pub fn validate_required(class: &ResolvedClass) -> Result<()> {
    for field in class.kind.required_fields() {
        match class.get(field) {
            Some(value) if !is_empty_value(value) => {}
            _ => {
                return Err(Error::MissingRequiredField {
                    class: class.name.clone(),
                    field: field.to_string(),
                })
            }
        }
    }
    Ok(())
}

fn is_empty_value(value: &YamlValue) -> bool {
    match value {
        YamlValue::Null => true,
        YamlValue::String(s) => s.trim().is_empty(),
        YamlValue::Sequence(seq) => seq.is_empty(),
        YamlValue::Mapping(map) => map.is_empty(),
        _ => false,
    }
}

/// A class and the classes deriving from it, for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassTree {
    pub name: String,
    pub pure_base_class: bool,
    pub children: Vec<ClassTree>,
}

/// Arrange class definitions into inheritance trees, roots in name order.
///
/// Classes whose parent does not exist are shown as roots; classes on a cycle
/// are not reachable from any root and are left out.
pub fn hierarchy(classes: &BTreeMap<String, ClassDefinition>) -> Vec<ClassTree> {
    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut roots = Vec::new();
    for (name, class) in classes {
        match class.parent_class.as_deref() {
            Some(parent) if classes.contains_key(parent) => {
                children.entry(parent).or_default().push(name)
            }
            _ => roots.push(name.as_str()),
        }
    }

    fn build(
        name: &str,
        classes: &BTreeMap<String, ClassDefinition>,
        children: &BTreeMap<&str, Vec<&str>>,
    ) -> ClassTree {
        ClassTree {
            name: name.to_string(),
            pure_base_class: classes[name].pure_base_class,
            children: children
                .get(name)
                .map(|kids| kids.iter().map(|kid| build(kid, classes, children)).collect())
                .unwrap_or_default(),
        }
    }

    roots
        .into_iter()
        .map(|root| build(root, classes, &children))
        .collect()
}
