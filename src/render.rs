//! Backend input rendering
//!
//! The provisioning backend reads its inputs from a directory tree under the
//! build directory. [`BuildTree`] owns that layout and writes it from a
//! resolved [`ProviderConfig`]:
//!
//! ```text
//! <build_dir>/
//!   backend/
//!     provider.yaml
//!     project.auto.tfvars.json
//!     system/platform/blade-interconnect/<class>/interconnect.auto.tfvars.json
//!     system/platform/virtual-blade/<class>/blade.auto.tfvars.json
//!   blade_ssh_keys/<secret>/id_rsa{,.pub}
//!   logs/
//! ```
//!
//! Every render starts from an empty `backend/` directory, so the tree
//! always matches the configuration it was rendered from.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;
use serde_json::json;
use serde_yaml::{Mapping, Value as YamlValue};

use crate::classes::ResourceKind;
use crate::config::{ProviderConfig, PROVIDER_ROOT};
use crate::error::Result;
use crate::instances::ResourceInstance;
use crate::process::OutputLog;

/// Backend subtree holding interconnect modules.
pub const INTERCONNECT_SUBTREE: &str = "system/platform/blade-interconnect";

/// Backend subtree holding virtual blade modules.
pub const VIRTUAL_BLADE_SUBTREE: &str = "system/platform/virtual-blade";

/// The on-disk layout of one build directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTree {
    root: PathBuf,
}

#[derive(Serialize)]
struct BladeVars<'a> {
    class: &'a str,
    count: usize,
    instances: Vec<InstanceVars<'a>>,
    config: &'a Mapping,
}

#[derive(Serialize)]
struct InstanceVars<'a> {
    index: usize,
    name: &'a str,
    hostname: &'a str,
    address: Option<&'a str>,
}

impl<'a> From<&'a ResourceInstance> for InstanceVars<'a> {
    fn from(instance: &'a ResourceInstance) -> Self {
        Self {
            index: instance.index,
            name: &instance.name,
            hostname: &instance.hostname,
            address: instance.address.as_deref(),
        }
    }
}

impl BuildTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working directory of the provisioning backend.
    pub fn backend_dir(&self) -> PathBuf {
        self.root.join("backend")
    }

    /// The part of the backend tree that holds only virtual blades.
    pub fn virtual_blade_dir(&self) -> PathBuf {
        self.backend_dir().join(VIRTUAL_BLADE_SUBTREE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn output_log(&self) -> OutputLog {
        OutputLog::new(self.logs_dir())
    }

    /// Directory holding the key pair stored in `secret`.
    pub fn ssh_key_dir(&self, secret: &str) -> PathBuf {
        self.root.join("blade_ssh_keys").join(secret)
    }

    /// Write the backend tree for `config`, replacing any previous one.
    ///
    /// Returns the files written, in write order.
    pub fn render(&self, config: &ProviderConfig) -> Result<Vec<PathBuf>> {
        let backend = self.backend_dir();
        if backend.exists() {
            debug!("Removing previous backend tree {}", backend.display());
            fs::remove_dir_all(&backend)?;
        }
        fs::create_dir_all(&backend)?;

        let mut written = Vec::new();

        let mut wrapped = Mapping::new();
        wrapped.insert(YamlValue::from(PROVIDER_ROOT), config.document().clone());
        written.push(write_file(
            &backend.join("provider.yaml"),
            &serde_yaml::to_string(&wrapped)?,
        )?);

        let settings = config.settings();
        let project = json!({
            "organization": settings.organization.name,
            "project_name": settings.project_name(),
            "zone": settings.project.zone,
        });
        written.push(write_json(&backend.join("project.auto.tfvars.json"), &project)?);

        for interconnect in config.interconnects() {
            let path = backend
                .join(INTERCONNECT_SUBTREE)
                .join(&interconnect.class)
                .join("interconnect.auto.tfvars.json");
            written.push(write_json(&path, interconnect)?);
        }

        for class in config.blade_types() {
            let instances: Vec<InstanceVars> =
                config.blade_instances(class).map(InstanceVars::from).collect();
            let vars = BladeVars {
                class,
                count: instances.len(),
                instances,
                config: &config.classes(ResourceKind::VirtualBlade)[class].payload,
            };
            let path = backend
                .join(VIRTUAL_BLADE_SUBTREE)
                .join(class)
                .join("blade.auto.tfvars.json");
            written.push(write_json(&path, &vars)?);
        }

        info!("Rendered {} backend files under {}", written.len(), backend.display());
        Ok(written)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    write_file(path, &text)
}

fn write_file(path: &Path, contents: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_document;

    const CONFIG: &str = r#"
organization: {name: acme}
project: {base_name: lab}
blade_interconnects:
  base-net: {network_name: cluster, ipv4_cidr: 10.0.0.0/24}
virtual_blades:
  compute:
    hostname: node
    machine_type: n1-standard-4
    count: 2
    blade_interconnect: {subnetwork: cluster, ip_addrs: [10.0.0.2, 10.0.0.3]}
"#;

    fn config() -> ProviderConfig {
        ProviderConfig::resolve(&parse_document(CONFIG).unwrap()).unwrap()
    }

    #[test]
    fn test_render_layout() {
        let dir = tempfile::tempdir().unwrap();
        let tree = BuildTree::new(dir.path());
        tree.render(&config()).unwrap();

        let backend = tree.backend_dir();
        assert!(backend.join("provider.yaml").is_file());
        assert!(backend.join("project.auto.tfvars.json").is_file());
        assert!(backend
            .join("system/platform/blade-interconnect/base-net/interconnect.auto.tfvars.json")
            .is_file());

        let blade: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(tree.virtual_blade_dir().join("compute/blade.auto.tfvars.json"))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(blade["count"], 2);
        assert_eq!(blade["instances"][1]["name"], "node-2");
        assert_eq!(blade["instances"][1]["address"], "10.0.0.3");
    }

    #[test]
    fn test_render_replaces_previous_tree() {
        let dir = tempfile::tempdir().unwrap();
        let tree = BuildTree::new(dir.path());
        let stale = tree.backend_dir().join("system/platform/virtual-blade/old");
        fs::create_dir_all(&stale).unwrap();

        tree.render(&config()).unwrap();
        assert!(!stale.exists());
    }

    #[test]
    fn test_render_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let tree = BuildTree::new(dir.path());
        let config = config();

        let read_all = |files: &[PathBuf]| -> Vec<String> {
            files
                .iter()
                .map(|f| fs::read_to_string(f).unwrap())
                .collect()
        };
        let first = read_all(&tree.render(&config).unwrap());
        let second = read_all(&tree.render(&config).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_provider_yaml_wraps_resolved_document() {
        let dir = tempfile::tempdir().unwrap();
        let tree = BuildTree::new(dir.path());
        tree.render(&config()).unwrap();
        let text = fs::read_to_string(tree.backend_dir().join("provider.yaml")).unwrap();
        let doc: YamlValue = serde_yaml::from_str(&text).unwrap();
        assert_eq!(
            doc["provider"]["virtual_blades"]["compute"]["machine_type"],
            YamlValue::from("n1-standard-4")
        );
    }
}
