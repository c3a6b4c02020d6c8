//! # Provider Configuration
//!
//! Loads the provider's configuration document and resolves it into a
//! [`ProviderConfig`], the immutable value every other component reads.
//!
//! ## Document
//!
//! ```yaml
//! provider:            # optional wrapper, unwrapped on load
//!   organization: {name: acme}
//!   project: {base_name: lab, zone: us-central1-a}
//!   commands: {backend: terragrunt, cloud: gcloud}
//!   blade_interconnects: {<class>: {...}}
//!   virtual_blades: {<class>: {...}}
//!   secrets: {<key>: {name: ..., labels: {...}}}
//! ```
//!
//! Overlay documents are deep-merged onto the base document in order before
//! any class is resolved.
//!
//! ## Resolution
//!
//! [`ProviderConfig::resolve`] resolves both class sections, instantiates
//! every blade and interconnect, and checks the result as a whole: blade
//! subnetworks must name a declared interconnect, and network and instance
//! names must be unique. Resolution either succeeds completely or returns the
//! first error; a resolved value is never patched afterwards.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as YamlValue};

use crate::classes::{parse_classes, resolve_classes, ClassDefinition, ResolvedClass, ResourceKind};
use crate::error::{Error, Result};
use crate::instances::{self, Interconnect, ResourceInstance};
use crate::merge::{self, parse_path};
use crate::secrets::SecretsManager;

/// Root key some documents wrap their content in.
pub const PROVIDER_ROOT: &str = "provider";

/// Default name of the configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "provider.yaml";

/// Parse a configuration document from YAML text.
pub fn parse_document(text: &str) -> Result<YamlValue> {
    let value: YamlValue = serde_yaml::from_str(text)?;
    match value {
        YamlValue::Null => Ok(YamlValue::Mapping(Mapping::new())),
        YamlValue::Mapping(mut map) => {
            if map.len() == 1 {
                if let Some(inner) = map.remove(PROVIDER_ROOT) {
                    return match inner {
                        YamlValue::Mapping(_) => Ok(inner),
                        YamlValue::Null => Ok(YamlValue::Mapping(Mapping::new())),
                        _ => Err(Error::config("'provider' must be a mapping")),
                    };
                }
            }
            Ok(YamlValue::Mapping(map))
        }
        _ => Err(Error::ConfigParse {
            message: "the configuration document must be a mapping".to_string(),
            hint: Some("start the file with 'provider:' or a top-level section".to_string()),
        }),
    }
}

/// Read and parse one configuration file.
pub fn read_document(path: &Path) -> Result<YamlValue> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::ConfigParse {
        message: format!("cannot read '{}': {}", path.display(), e),
        hint: None,
    })?;
    parse_document(&text).map_err(|e| match e {
        Error::Yaml(yaml) => Error::ConfigParse {
            message: format!("'{}': {}", path.display(), yaml),
            hint: None,
        },
        other => other,
    })
}

/// Apply overlay documents onto a base document, in order.
pub fn apply_overlays<'a>(
    base: YamlValue,
    overlays: impl IntoIterator<Item = &'a YamlValue>,
) -> YamlValue {
    overlays
        .into_iter()
        .fold(base, |merged, overlay| merge::merge(&merged, overlay))
}

/// Load the base document and its overlays from disk.
pub fn load_document(base: &Path, overlays: &[PathBuf]) -> Result<YamlValue> {
    let document = read_document(base)?;
    let overlay_docs = overlays
        .iter()
        .map(|path| {
            debug!("Applying overlay {}", path.display());
            read_document(path)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(apply_overlays(document, &overlay_docs))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationSettings {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub base_name: String,
    #[serde(default)]
    pub zone: Option<String>,
}

/// External programs the provider runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSettings {
    #[serde(default = "default_backend_command")]
    pub backend: String,
    #[serde(default = "default_cloud_command")]
    pub cloud: String,
}

fn default_backend_command() -> String {
    "terragrunt".to_string()
}

fn default_cloud_command() -> String {
    "gcloud".to_string()
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            backend: default_backend_command(),
            cloud: default_cloud_command(),
        }
    }
}

/// Typed settings read from the document's non-class sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub organization: OrganizationSettings,
    pub project: ProjectSettings,
    #[serde(default)]
    pub commands: CommandSettings,
}

impl ProviderSettings {
    /// Extract the settings from a document.
    pub fn from_document(document: &YamlValue) -> Result<Self> {
        let mut sections = Mapping::new();
        for key in ["organization", "project", "commands"] {
            if let Some(value) = document.get(key) {
                sections.insert(YamlValue::from(key), value.clone());
            }
        }
        serde_yaml::from_value(YamlValue::Mapping(sections)).map_err(|e| Error::ConfigParse {
            message: format!("invalid provider settings: {}", e),
            hint: Some("'organization.name' and 'project.base_name' are required".to_string()),
        })
    }

    /// The cloud project name, `<organization>-<base_name>`.
    pub fn project_name(&self) -> String {
        format!("{}-{}", self.organization.name, self.project.base_name)
    }

    /// The project zone.
    pub fn zone(&self) -> Result<&str> {
        self.project.zone.as_deref().ok_or_else(|| Error::ConfigParse {
            message: "no zone is configured".to_string(),
            hint: Some("set 'project.zone'".to_string()),
        })
    }
}

/// A fully resolved provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    settings: ProviderSettings,
    blade_definitions: BTreeMap<String, ClassDefinition>,
    interconnect_definitions: BTreeMap<String, ClassDefinition>,
    blade_classes: BTreeMap<String, ResolvedClass>,
    interconnect_classes: BTreeMap<String, ResolvedClass>,
    blades: Vec<ResourceInstance>,
    interconnects: Vec<Interconnect>,
    protected: Vec<String>,
    secrets: SecretsManager,
    document: YamlValue,
}

fn class_section(
    document: &YamlValue,
    kind: ResourceKind,
) -> Result<BTreeMap<String, ClassDefinition>> {
    match document.get(kind.section()) {
        None | Some(YamlValue::Null) => Ok(BTreeMap::new()),
        Some(section) => parse_classes(kind, section),
    }
}

impl ProviderConfig {
    /// Resolve a loaded document.
    pub fn resolve(document: &YamlValue) -> Result<Self> {
        let settings = ProviderSettings::from_document(document)?;

        let interconnect_definitions = class_section(document, ResourceKind::BladeInterconnect)?;
        let blade_definitions = class_section(document, ResourceKind::VirtualBlade)?;
        let interconnect_classes =
            resolve_classes(ResourceKind::BladeInterconnect, &interconnect_definitions)?;
        let blade_classes = resolve_classes(ResourceKind::VirtualBlade, &blade_definitions)?;

        let mut interconnects = Vec::new();
        let mut networks: HashMap<String, String> = HashMap::new();
        for class in interconnect_classes.values() {
            let Some(record) = instances::interconnect(class)? else {
                continue;
            };
            if let Some(first) = networks.insert(record.network_name.clone(), class.name.clone()) {
                return Err(Error::NameCollision {
                    name: record.network_name,
                    first,
                    second: class.name.clone(),
                });
            }
            interconnects.push(record);
        }

        let mut blades = Vec::new();
        let mut names: HashMap<String, String> = HashMap::new();
        for class in blade_classes.values().filter(|c| c.is_instantiable()) {
            let subnetwork = class.str_field("blade_interconnect.subnetwork")?;
            if !networks.contains_key(subnetwork) {
                return Err(Error::InvalidField {
                    class: class.name.clone(),
                    field: "blade_interconnect.subnetwork".to_string(),
                    message: format!("no blade interconnect has network_name '{}'", subnetwork),
                });
            }
            for instance in instances::instantiate(class)? {
                if let Some(first) = names.insert(instance.name.clone(), class.name.clone()) {
                    return Err(Error::NameCollision {
                        name: instance.name,
                        first,
                        second: class.name.clone(),
                    });
                }
                blades.push(instance);
            }
        }

        let mut protected = Vec::new();
        for class in interconnect_classes
            .values()
            .chain(blade_classes.values())
            .filter(|c| c.is_instantiable())
        {
            if class.bool_field("deletion_protection")? == Some(true) {
                protected.push(class.name.clone());
            }
        }

        let secrets = SecretsManager::from_config(document.get("secrets"))?;

        let mut resolved = document.as_mapping().cloned().unwrap_or_default();
        for (kind, classes) in [
            (ResourceKind::BladeInterconnect, &interconnect_classes),
            (ResourceKind::VirtualBlade, &blade_classes),
        ] {
            let section: Mapping = classes
                .iter()
                .map(|(name, class)| (YamlValue::from(name.as_str()), class.to_document_value()))
                .collect();
            resolved.insert(YamlValue::from(kind.section()), YamlValue::Mapping(section));
        }

        info!(
            "Resolved {} blade classes ({} instances) and {} interconnects",
            blade_classes.len(),
            blades.len(),
            interconnects.len()
        );

        Ok(Self {
            settings,
            blade_definitions,
            interconnect_definitions,
            blade_classes,
            interconnect_classes,
            blades,
            interconnects,
            protected,
            secrets,
            document: YamlValue::Mapping(resolved),
        })
    }

    /// Load and resolve a configuration from disk.
    pub fn load(base: &Path, overlays: &[PathBuf]) -> Result<Self> {
        Self::resolve(&load_document(base, overlays)?)
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub fn project_name(&self) -> String {
        self.settings.project_name()
    }

    /// The resolved document: class sections hold resolved payloads.
    pub fn document(&self) -> &YamlValue {
        &self.document
    }

    /// Look up a dotted path in the resolved document.
    pub fn lookup(&self, path: &str) -> Option<&YamlValue> {
        merge::lookup(&self.document, &parse_path(path))
    }

    /// Class definitions as declared, before resolution.
    pub fn definitions(&self, kind: ResourceKind) -> &BTreeMap<String, ClassDefinition> {
        match kind {
            ResourceKind::VirtualBlade => &self.blade_definitions,
            ResourceKind::BladeInterconnect => &self.interconnect_definitions,
        }
    }

    /// Every resolved class of a kind, pure base classes included.
    pub fn classes(&self, kind: ResourceKind) -> &BTreeMap<String, ResolvedClass> {
        match kind {
            ResourceKind::VirtualBlade => &self.blade_classes,
            ResourceKind::BladeInterconnect => &self.interconnect_classes,
        }
    }

    /// All blade instances, by class name then index.
    pub fn blades(&self) -> &[ResourceInstance] {
        &self.blades
    }

    /// All interconnects, by class name.
    pub fn interconnects(&self) -> &[Interconnect] {
        &self.interconnects
    }

    pub fn secrets(&self) -> &SecretsManager {
        &self.secrets
    }

    /// Instances of one blade class.
    pub fn blade_instances<'a>(
        &'a self,
        class: &'a str,
    ) -> impl Iterator<Item = &'a ResourceInstance> + 'a {
        self.blades.iter().filter(move |b| b.class == class)
    }

    fn blade_class(&self, class: &str) -> Result<&ResolvedClass> {
        self.blade_classes
            .get(class)
            .filter(|c| c.is_instantiable())
            .ok_or_else(|| Error::UnknownClass {
                kind: ResourceKind::VirtualBlade.to_string(),
                class: class.to_string(),
            })
    }

    fn blade_instance(&self, class: &str, instance: usize) -> Result<&ResourceInstance> {
        let count = self.blade_count(class)?;
        self.blades
            .iter()
            .filter(|b| b.class == class)
            .nth(instance)
            .ok_or_else(|| Error::InstanceOutOfRange {
                class: class.to_string(),
                instance,
                count,
            })
    }

    /// Names of the blade classes that are instantiated.
    pub fn blade_types(&self) -> Vec<&str> {
        self.blade_classes
            .values()
            .filter(|c| c.is_instantiable())
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn blade_count(&self, class: &str) -> Result<usize> {
        instances::count(self.blade_class(class)?)
    }

    pub fn blade_hostname(&self, class: &str, instance: usize) -> Result<&str> {
        Ok(&self.blade_instance(class, instance)?.hostname)
    }

    /// The address of a blade instance on `interconnect`.
    ///
    /// `None` when the class leaves addressing to the backend.
    pub fn blade_ip(&self, class: &str, instance: usize, interconnect: &str) -> Result<Option<&str>> {
        let attached = self.blade_interconnects(class)?;
        if !attached.contains(&interconnect) {
            return Err(Error::InvalidField {
                class: class.to_string(),
                field: "blade_interconnect.subnetwork".to_string(),
                message: format!("not attached to interconnect '{}'", interconnect),
            });
        }
        Ok(self.blade_instance(class, instance)?.address.as_deref())
    }

    /// Network names a blade class is attached to.
    pub fn blade_interconnects(&self, class: &str) -> Result<Vec<&str>> {
        Ok(vec![self.blade_class(class)?.str_field("blade_interconnect.subnetwork")?])
    }

    /// Name of the secret holding a blade class's SSH key.
    pub fn blade_ssh_key_secret(&self, class: &str) -> Result<&str> {
        self.blade_class(class)?.str_field("ssh_key_secret")
    }

    /// Network names of all instantiated interconnects.
    pub fn interconnect_names(&self) -> Vec<&str> {
        self.interconnects
            .iter()
            .map(|i| i.network_name.as_str())
            .collect()
    }

    /// The IPv4 CIDR of the interconnect with `network_name`.
    pub fn ipv4_cidr(&self, network_name: &str) -> Result<&str> {
        self.interconnects
            .iter()
            .find(|i| i.network_name == network_name)
            .map(|i| i.ipv4_cidr.as_str())
            .ok_or_else(|| Error::UnknownClass {
                kind: "blade interconnect".to_string(),
                class: network_name.to_string(),
            })
    }

    /// Instantiated classes flagged `deletion_protection: true`.
    pub fn protected_resources(&self) -> &[String] {
        &self.protected
    }
}
